use std::borrow::Cow;

use heck::{ToSnakeCase, ToTitleCase};

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Returns an uppercase representation, avoiding allocation when unnecessary.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

/// Trims leading/trailing whitespace while borrowing the original.
pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Converts identifiers to `snake_case`.
pub fn snake_case(input: &str) -> Cow<'_, str> {
    let converted = input.to_snake_case();
    if converted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(converted)
    }
}

/// Converts words to `Title Case`.
pub fn title_case(input: &str) -> Cow<'_, str> {
    let converted = input.to_title_case();
    if converted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(converted)
    }
}

/// Replaces every occurrence of `from`, borrowing when there is nothing to replace.
pub fn replace<'a>(input: &'a str, from: &str, to: &str) -> Cow<'a, str> {
    if from.is_empty() || !input.contains(from) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.replace(from, to))
    }
}
