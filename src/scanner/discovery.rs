//! Finding the C files that define on-target unit-test suites.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

// Present in every suite file, whatever its coding style.
static SUITE_ENTRY_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^void\s+initActiveOnTargetUnitTestSuite\s*\(").expect("entry point pattern")
});

/// A C file that registers test suites.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Directory holding the file, as reached from the scan root.
    pub dir: PathBuf,
    pub filename: String,
    /// The `*.gpj` project file next to it; empty when there is none.
    pub buildfile: String,
    /// File content, decoded lossily.
    pub text: String,
}

impl Candidate {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

/// Plain files and symlinks that resolve to a file. Dangling links are not.
fn is_regular_file(entry: &DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    entry.path_is_symlink()
        && fs::metadata(entry.path())
            .map(|meta| meta.is_file())
            .unwrap_or(false)
}

/// Walks `root` and returns every suite file, ordered by directory then name.
pub fn discover(root: &Path) -> Result<Vec<Candidate>> {
    let mut dirs: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            // Only the root itself is fatal; unreadable subtrees are skipped.
            Err(source) if source.depth() > 0 => {
                warn!(error = %source, "skipping unreadable entry");
                continue;
            }
            Err(source) => {
                return Err(Error::Walk {
                    path: root.to_path_buf(),
                    source,
                })
            }
        };
        if !is_regular_file(&entry) {
            continue;
        }
        let path = entry.into_path();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        dirs.entry(dir).or_default().push(path);
    }

    let mut candidates = Vec::new();
    for (dir, files) in dirs {
        let buildfile = files
            .iter()
            .filter(|p| p.extension() == Some(OsStr::new("gpj")))
            .filter_map(|p| p.file_name())
            .last()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        for path in files.iter().filter(|p| p.extension() == Some(OsStr::new("c"))) {
            let bytes = fs::read(path)?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if !text.lines().any(|line| SUITE_ENTRY_POINT.is_match(line)) {
                continue;
            }
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(dir = %dir.display(), %filename, %buildfile, "suite file");
            candidates.push(Candidate {
                dir: dir.clone(),
                filename,
                buildfile: buildfile.clone(),
                text,
            });
        }
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const ENTRY: &str = "void initActiveOnTargetUnitTestSuite(void)\n{\n}\n";

    #[test]
    fn finds_suite_files_with_their_build_file() {
        let root = tempdir().unwrap();
        let hw = root.path().join("hw");
        fs::create_dir_all(&hw).unwrap();
        fs::write(hw.join("suite.c"), ENTRY).unwrap();
        fs::write(hw.join("helper.c"), "int helper(void) { return 0; }\n").unwrap();
        fs::write(hw.join("hw.gpj"), "").unwrap();
        fs::write(root.path().join("top.c"), ENTRY).unwrap();

        let found = discover(root.path()).unwrap();
        let names: Vec<_> = found.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["top.c", "suite.c"]);
        assert_eq!(found[0].buildfile, "");
        assert_eq!(found[1].buildfile, "hw.gpj");
        assert_eq!(found[1].path(), hw.join("suite.c"));
    }

    #[test]
    fn entry_point_must_start_the_line() {
        let root = tempdir().unwrap();
        fs::write(
            root.path().join("decl.c"),
            "extern void initActiveOnTargetUnitTestSuite(void);\n",
        )
        .unwrap();
        fs::write(
            root.path().join("spaced.c"),
            "void   initActiveOnTargetUnitTestSuite (void)\n",
        )
        .unwrap();

        let found = discover(root.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "spaced.c");
    }

    #[test]
    fn only_c_extension_is_scanned() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("suite.h"), ENTRY).unwrap();
        fs::write(root.path().join("suite.cpp"), ENTRY).unwrap();
        assert!(discover(root.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = tempdir().unwrap();
        let err = discover(&root.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Walk { .. }));
    }

    #[test]
    fn last_build_file_in_name_order_wins() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("suite.c"), ENTRY).unwrap();
        fs::write(root.path().join("alpha.gpj"), "").unwrap();
        fs::write(root.path().join("omega.gpj"), "").unwrap();

        let found = discover(root.path()).unwrap();
        assert_eq!(found[0].buildfile, "omega.gpj");
    }

    #[test]
    fn non_utf8_source_is_decoded_lossily() {
        let root = tempdir().unwrap();
        let mut bytes = b"/* caf\xe9 */\n".to_vec();
        bytes.extend_from_slice(ENTRY.as_bytes());
        fs::write(root.path().join("latin1.c"), bytes).unwrap();

        let found = discover(root.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].text.starts_with("/* caf\u{FFFD} */"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_suite_file_is_found() {
        use std::os::unix::fs::symlink;

        let shared = tempdir().unwrap();
        fs::write(shared.path().join("suite.c"), ENTRY).unwrap();
        let root = tempdir().unwrap();
        symlink(shared.path().join("suite.c"), root.path().join("linked.c")).unwrap();
        symlink(shared.path().join("gone.c"), root.path().join("dangling.c")).unwrap();

        let found = discover(root.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "linked.c");
        assert_eq!(found[0].text, ENTRY);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempdir().unwrap();
        let locked = root.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.c"), ENTRY).unwrap();
        fs::write(root.path().join("open.c"), ENTRY).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory.
        let still_readable = fs::read_dir(&locked).is_ok();
        let found = discover(root.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let found = found.unwrap();
        if !still_readable {
            let names: Vec<_> = found.iter().map(|c| c.filename.as_str()).collect();
            assert_eq!(names, vec!["open.c"]);
        }
    }
}
