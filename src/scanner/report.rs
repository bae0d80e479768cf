//! CSV and JSON renderings of a [`TestList`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::info;

use super::{SourceFile, TestList};
use crate::error::Result;

pub const DEFAULT_OUTPUT_NAME: &str = "on_target_test_list.csv";

pub const CSV_HEADER: &str = "filename,suitename,suiteid,testname,testid,buildfile,filepath,";

const JSON_INDENT: &[u8] = b"      ";

pub fn output_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Writes the header and one row per test case; returns the row count.
///
/// Every line carries a trailing comma. Fields are written verbatim.
pub fn write_csv<W: Write>(list: &TestList, out: &mut W) -> Result<usize> {
    writeln!(out, "{CSV_HEADER}")?;
    let mut rows = 0;
    for (_, file) in &list.files {
        for suite in file.suites.values() {
            for test in suite.tests.values() {
                writeln!(
                    out,
                    "{},{},{},{},{},{},{},",
                    file.filename,
                    suite.suitename,
                    suite.suiteid,
                    test.testname,
                    test.testid,
                    file.buildfile,
                    file.filepath
                )?;
                rows += 1;
            }
        }
    }
    Ok(rows)
}

/// Writes the CSV report to `path`, creating or truncating it.
pub fn save_csv(list: &TestList, path: &Path) -> Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let rows = write_csv(list, &mut out)?;
    out.flush()?;
    info!(path = %path.display(), rows, "report written");
    Ok(rows)
}

/// The full mapping as JSON: an array of single-key objects, one per file,
/// keys sorted, six-space indentation.
pub fn to_json(list: &TestList) -> Result<String> {
    let entries: Vec<BTreeMap<&str, &SourceFile>> = list
        .files
        .iter()
        .map(|(key, file)| BTreeMap::from([(key.as_str(), file)]))
        .collect();

    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(JSON_INDENT));
    entries.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
