fn main() {
    if let Err(err) = table_mapper::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
