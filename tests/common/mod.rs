#![allow(dead_code)]

use std::error::Error;
use std::io::Write;

use tempfile::NamedTempFile;

use substreams_orchestrator::types::Module;

pub use substreams_orchestrator_test_utils::{builders, init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Write `contents` to a temporary manifest file kept alive by the handle.
pub fn manifest_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

pub fn names(modules: &[&Module]) -> Vec<String> {
    modules.iter().map(|m| m.name.clone()).collect()
}
