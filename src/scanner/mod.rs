//! On-target unit-test list extraction.
//!
//! Walks a source tree, picks out the C files that register on-target test
//! suites, pulls suite and test-case records out of them with regular
//! expressions and flattens the result into a CSV report.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::Result;

pub mod discovery;
pub mod parse;
pub mod report;

pub use discovery::{discover, Candidate};
pub use parse::parse_source;

/// One test case. Fields serialize in key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    pub funcptr: String,
    pub testid: String,
    pub testname: String,
}

/// A named, numbered group of test cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suite {
    pub suiteid: String,
    pub suitename: String,
    pub suiteptr: String,
    /// Keyed by test function pointer.
    pub tests: BTreeMap<String, TestCase>,
    pub testsptr: String,
}

/// Everything extracted from one suite file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFile {
    pub buildfile: String,
    pub filename: String,
    pub filepath: String,
    /// Keyed by suite pointer.
    pub suites: BTreeMap<String, Suite>,
}

impl SourceFile {
    pub fn test_count(&self) -> usize {
        self.suites.values().map(|suite| suite.tests.len()).sum()
    }
}

/// A scanned tree: suite files keyed by their full path, in discovery order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TestList {
    pub files: Vec<(String, SourceFile)>,
}

impl TestList {
    pub fn test_count(&self) -> usize {
        self.files.iter().map(|(_, file)| file.test_count()).sum()
    }
}

/// Discovers and parses every suite file under `root`.
pub fn scan(root: &Path) -> Result<TestList> {
    let mut list = TestList::default();
    for candidate in discover(root)? {
        let path = candidate.path();
        let suites = parse_source(&path, &candidate.text)?;
        list.files.push((
            path.display().to_string(),
            SourceFile {
                buildfile: candidate.buildfile,
                filename: candidate.filename,
                filepath: candidate.dir.display().to_string(),
                suites,
            },
        ));
    }
    info!(
        files = list.files.len(),
        tests = list.test_count(),
        "scan complete"
    );
    Ok(list)
}
