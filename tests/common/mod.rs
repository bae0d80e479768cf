#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;

pub fn powerctl() -> Command {
    let mut cmd = Command::cargo_bin("powerctl").unwrap();
    cmd.env_remove("POWERCTL_COMPORT").env_remove("RUST_LOG");
    cmd
}

pub fn testlist() -> Command {
    let mut cmd = Command::cargo_bin("testlist").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

pub const LEGACY_SUITE: &str = r#"#include "unitTest.h"

static void exampleUnitTest(void);
static void exampleSecondUnitTest(void);

static unitTest_t exampleTestList[] = {
    {10, &exampleUnitTest, "HelloWorld"},
    {11, &exampleSecondUnitTest, "Second"},
    {0, (unitTestFunctionPtr_t)0, ""}
};

static unitTestSuite_t exampleSuite = {100, &(exampleTestList[0]), "Example"};

void initActiveOnTargetUnitTestSuite(void)
{
    appendUnitTestSuite(&exampleSuite);
}
"#;

pub const CURRENT_SUITE: &str = r#"#include "unitTest.h"

static unitTestSuite_t bufferManagementSuite;
static unitTest_t bufferManagementTestList[4];

void initActiveOnTargetUnitTestSuite(void)
{
    uint32_t tcIdx = 0;

    initUnitTestSuite(&bufferManagementSuite, 11, &(bufferManagementTestList[0]), "BufferManagement");
    appendUnitTestCaseToList(&(bufferManagementTestList[0]), &tcIdx, 2, &bufferManagementDdrInitUnitTest, "InitDDR");
    appendUnitTestCaseToList(&(bufferManagementTestList[0]),
                             &tcIdx, 3, &bufferManagementAllocUnitTest, "Alloc");
    appendUnitTestCaseToList(&(bufferManagementTestList[0]), &tcIdx, 4, &bufferManagementFreeUnitTest, "Free");
    appendUnitTestSuite(&bufferManagementSuite);
}
"#;

/// Lays out a small firmware tree with one suite file per coding style.
pub fn firmware_tree(root: &Path) {
    let template = root.join("hw-integration/template");
    let buffers = root.join("hwvalidation/bufferManagement");
    fs::create_dir_all(&template).unwrap();
    fs::create_dir_all(&buffers).unwrap();

    fs::write(template.join("templateOnTargetUnitTest.c"), LEGACY_SUITE).unwrap();
    fs::write(template.join("template.gpj"), "").unwrap();
    fs::write(buffers.join("bufferManagement.c"), CURRENT_SUITE).unwrap();
    fs::write(buffers.join("bufferManagement.gpj"), "").unwrap();
    fs::write(buffers.join("bufferPool.c"), "int pool;\n").unwrap();
}
