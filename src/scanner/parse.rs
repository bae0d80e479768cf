//! Regex extraction of suite and test-case records from one C source file.
//!
//! Two coding styles coexist, sometimes in the same file:
//!
//! * legacy: suites and test tables are static initialisers,
//!   `static unitTestSuite_t s = {100, &(list[0]), "Name"};` followed by a
//!   `static unitTest_t list[] = {` table of `{id, &func, "name"},` rows;
//! * current: suites and tests are registered through calls,
//!   `initUnitTestSuite(&s, 11, &(list[0]), "Name");` and
//!   `appendUnitTestCaseToList(&(list[0]), &idx, 2, &func, "name");`, which
//!   may be wrapped over several lines.
//!
//! Both styles register suites with `appendUnitTestSuite(&s);`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{escape, Regex};
use tracing::{debug, trace};

use super::{Suite, TestCase};
use crate::error::{Error, Result};

static SUITE_PTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+appendUnitTestSuite\(&(\S+)\);\s*$").expect("suite pointer pattern")
});

static LEGACY_TEST_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+\{(\d+), &(\S+), "(\S+)"\},\s*$"#).expect("legacy test row pattern")
});

#[derive(Debug, Clone, PartialEq)]
struct SuiteInfo {
    suiteid: String,
    testsptr: String,
    suitename: String,
}

/// Every suite registered in `text`, keyed by suite pointer.
///
/// A registered suite whose definition cannot be found makes the file
/// malformed.
pub fn parse_source(path: &Path, text: &str) -> Result<BTreeMap<String, Suite>> {
    let mut suites = BTreeMap::new();

    for suiteptr in suite_pointers(text) {
        let info = match current_suite_info(text, &suiteptr)? {
            Some(info) => info,
            None => legacy_suite_info(text, &suiteptr)?.ok_or_else(|| Error::MissingSuiteInfo {
                path: path.to_path_buf(),
                suite: suiteptr.clone(),
            })?,
        };

        let mut tests = BTreeMap::new();
        for test in legacy_tests(text, &info.testsptr)?
            .into_iter()
            .chain(current_tests(text, &info.testsptr)?)
        {
            tests.insert(test.funcptr.clone(), test);
        }
        debug!(suite = %suiteptr, tests = tests.len(), "parsed suite");

        suites.insert(
            suiteptr.clone(),
            Suite {
                suiteptr,
                suiteid: info.suiteid,
                suitename: info.suitename,
                testsptr: info.testsptr,
                tests,
            },
        );
    }

    Ok(suites)
}

/// Suite pointers passed to `appendUnitTestSuite`, in order, without repeats.
fn suite_pointers(text: &str) -> Vec<String> {
    let mut ptrs: Vec<String> = Vec::new();
    for caps in text.lines().filter_map(|line| SUITE_PTR.captures(line)) {
        let ptr = caps[1].to_string();
        if !ptrs.contains(&ptr) {
            ptrs.push(ptr);
        }
    }
    ptrs
}

// Later definitions win, matching a re-initialised suite.
fn legacy_suite_info(text: &str, suiteptr: &str) -> Result<Option<SuiteInfo>> {
    let pattern = Regex::new(&format!(
        r#"^\s*static unitTestSuite_t {} = \{{(\d+), &\((\S+)\[\d+\]\), "(\S+)"\}};\s*$"#,
        escape(suiteptr)
    ))?;
    Ok(text
        .lines()
        .filter_map(|line| pattern.captures(line))
        .map(|caps| SuiteInfo {
            suiteid: caps[1].to_string(),
            testsptr: caps[2].to_string(),
            suitename: caps[3].to_string(),
        })
        .last())
}

fn current_suite_info(text: &str, suiteptr: &str) -> Result<Option<SuiteInfo>> {
    let pattern = Regex::new(&format!(
        r#"(?s)\s*initUnitTestSuite\(&{},.*?(\d+),.*?&\((\S+)\[\d+\]\),.*?"(\S+)"\);"#,
        escape(suiteptr)
    ))?;
    Ok(pattern
        .captures_iter(text)
        .map(|caps| SuiteInfo {
            suiteid: caps[1].to_string(),
            testsptr: caps[2].to_string(),
            suitename: caps[3].to_string(),
        })
        .last())
}

/// Rows of the `static unitTest_t <testsptr>[] = {` table. The table ends at
/// the first row that is not a test, normally the `{0, (unitTestFunctionPtr_t)0, ""}`
/// terminator.
fn legacy_tests(text: &str, testsptr: &str) -> Result<Vec<TestCase>> {
    let start = Regex::new(&format!(
        r"^static unitTest_t {}\[\] = \{{\s*$",
        escape(testsptr)
    ))?;

    let mut tests = Vec::new();
    let mut capturing = false;
    for line in text.lines() {
        if start.is_match(line) {
            capturing = true;
            continue;
        }
        if !capturing {
            continue;
        }
        match LEGACY_TEST_ROW.captures(line) {
            Some(caps) => {
                trace!(row = line, "legacy test row");
                tests.push(TestCase {
                    testid: caps[1].to_string(),
                    funcptr: caps[2].to_string(),
                    testname: caps[3].to_string(),
                });
            }
            None => capturing = false,
        }
    }
    Ok(tests)
}

fn current_tests(text: &str, testsptr: &str) -> Result<Vec<TestCase>> {
    let pattern = Regex::new(&format!(
        r#"(?s)\s*appendUnitTestCaseToList\(&\({}\[\d+\]\),\s*(?:\n|\r\n|\r)*\s*\S+,.*?(\d+),.*?&(\S+),.*?"(\S+)"\);\s*"#,
        escape(testsptr)
    ))?;
    Ok(pattern
        .captures_iter(text)
        .map(|caps| TestCase {
            testid: caps[1].to_string(),
            funcptr: caps[2].to_string(),
            testname: caps[3].to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LEGACY: &str = r#"
#include "unitTest.h"

static void exampleUnitTest(void);
static void exampleOtherUnitTest(void);

static unitTest_t exampleTestList[] = {
    {10, &exampleUnitTest, "HelloWorld"},
    {11, &exampleOtherUnitTest, "Goodbye"},
    {0, (unitTestFunctionPtr_t)0, ""}
};

static unitTestSuite_t exampleSuite = {100, &(exampleTestList[0]), "Example"};

void initActiveOnTargetUnitTestSuite(void)
{
    appendUnitTestSuite(&exampleSuite);
}
"#;

    const CURRENT: &str = r#"
static unitTestSuite_t bufferManagementSuite;
static unitTest_t bufferManagementTestList[3];

void initActiveOnTargetUnitTestSuite(void)
{
    uint32_t tcIdx = 0;

    initUnitTestSuite(&bufferManagementSuite,
                      11,
                      &(bufferManagementTestList[0]),
                      "BufferManagement");
    appendUnitTestCaseToList(&(bufferManagementTestList[0]), &tcIdx, 2, &bufferManagementDdrInitUnitTest, "InitDDR");
    appendUnitTestCaseToList(&(bufferManagementTestList[0]),
                             &tcIdx, 3, &bufferManagementAllocUnitTest, "Alloc");
    appendUnitTestSuite(&bufferManagementSuite);
}
"#;

    fn parse(text: &str) -> BTreeMap<String, Suite> {
        parse_source(Path::new("fixture.c"), text).unwrap()
    }

    #[test]
    fn legacy_style_suite_and_table() {
        let suites = parse(LEGACY);
        let suite = &suites["exampleSuite"];
        assert_eq!(suite.suiteid, "100");
        assert_eq!(suite.suitename, "Example");
        assert_eq!(suite.testsptr, "exampleTestList");
        assert_eq!(suite.tests.len(), 2);
        assert_eq!(
            suite.tests["exampleUnitTest"],
            TestCase {
                testid: "10".into(),
                funcptr: "exampleUnitTest".into(),
                testname: "HelloWorld".into(),
            }
        );
        assert_eq!(suite.tests["exampleOtherUnitTest"].testid, "11");
    }

    #[test]
    fn current_style_calls_across_lines() {
        let suites = parse(CURRENT);
        let suite = &suites["bufferManagementSuite"];
        assert_eq!(suite.suiteid, "11");
        assert_eq!(suite.suitename, "BufferManagement");
        assert_eq!(suite.testsptr, "bufferManagementTestList");
        assert_eq!(
            suite.tests.keys().collect::<Vec<_>>(),
            vec!["bufferManagementAllocUnitTest", "bufferManagementDdrInitUnitTest"]
        );
        assert_eq!(suite.tests["bufferManagementDdrInitUnitTest"].testname, "InitDDR");
        assert_eq!(suite.tests["bufferManagementAllocUnitTest"].testid, "3");
    }

    #[test]
    fn mixed_styles_in_one_file() {
        let text = format!("{LEGACY}\n{CURRENT}");
        let suites = parse(&text);
        assert_eq!(suites.len(), 2);
        let total: usize = suites.values().map(|s| s.tests.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn legacy_table_stops_at_first_non_row() {
        let text = r#"
static unitTest_t listA[] = {
    {1, &first, "First"},
    {0, (unitTestFunctionPtr_t)0, ""}
};
    {2, &stray, "Stray"},
static unitTestSuite_t suiteA = {7, &(listA[0]), "A"};
    appendUnitTestSuite(&suiteA);
"#;
        let suites = parse(text);
        assert_eq!(suites["suiteA"].tests.keys().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn suite_pointers_are_regex_escaped() {
        let text = r#"
static unitTest_t list_1[] = {
    {1, &t, "T"},
};
static unitTestSuite_t s.1 = {5, &(list_1[0]), "Dotted"};
    appendUnitTestSuite(&s.1);
"#;
        let suites = parse(text);
        assert_eq!(suites["s.1"].suitename, "Dotted");
    }

    #[test]
    fn missing_suite_info_is_an_error() {
        let text = "    appendUnitTestSuite(&ghostSuite);\n";
        let err = parse_source(Path::new("ghost.c"), text).unwrap_err();
        match err {
            Error::MissingSuiteInfo { suite, .. } => assert_eq!(suite, "ghostSuite"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn suite_registration_needs_indentation() {
        // The registration is only recognised inside a function body.
        let text = "appendUnitTestSuite(&topLevel);\n";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn current_initialiser_overrides_legacy_one() {
        let text = r#"
static unitTestSuite_t dualSuite = {5, &(oldList[0]), "OldName"};

void initActiveOnTargetUnitTestSuite(void)
{
    initUnitTestSuite(&dualSuite, 42, &(newList[0]), "NewName");
    appendUnitTestCaseToList(&(newList[0]), &tcIdx, 1, &newUnitTest, "New");
    appendUnitTestSuite(&dualSuite);
}
"#;
        let suites = parse(text);
        let suite = &suites["dualSuite"];
        assert_eq!(suite.suiteid, "42");
        assert_eq!(suite.suitename, "NewName");
        assert_eq!(suite.testsptr, "newList");
        assert_eq!(suite.tests.keys().collect::<Vec<_>>(), vec!["newUnitTest"]);
    }

    #[test]
    fn crlf_wrapped_test_registration() {
        let text = CURRENT.replace('\n', "\r\n");
        let suites = parse(&text);
        let suite = &suites["bufferManagementSuite"];
        assert_eq!(suite.suiteid, "11");
        assert_eq!(suite.tests.len(), 2);
        assert_eq!(suite.tests["bufferManagementAllocUnitTest"].testid, "3");
        assert_eq!(suite.tests["bufferManagementAllocUnitTest"].testname, "Alloc");
    }
}
