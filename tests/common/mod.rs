#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use table_mapper::llm::{LlmClient, LlmError};
use tempfile::{TempDir, tempdir};

pub const ORDERS_CSV: &str = "order_date,amt,customer\n2024-01-01,10.5,Alice\n2024-01-02,7,Bob\n";
pub const TEMPLATE_CSV: &str = "Date,Amount\n";

/// Returns the absolute path to a sample file under the crate's `data` directory.
pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}

/// Backend stub replaying canned responses and recording the prompts it saw.
pub struct ScriptedClient {
    responses: RefCell<VecDeque<String>>,
    pub prompts: RefCell<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl LlmClient for ScriptedClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("No more scripted responses".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
