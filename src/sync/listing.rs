//! File listings on both sides of a sync, keyed by relative POSIX path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{OrchestrateError, Result};
use crate::exec::ProcessExecutor;

/// Relative path -> size in bytes.
pub type Listing = BTreeMap<String, u64>;

/// Files plus directories (no trailing `/`) under one root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub files: Listing,
    pub dirs: BTreeSet<String>,
}

/// Walk everything under `root`. A missing root is an empty tree.
pub fn local_tree(root: &Path) -> Result<Tree> {
    let mut tree = Tree::default();
    if !root.exists() {
        return Ok(tree);
    }
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            tree.dirs.insert(rel);
        } else if entry.file_type().is_file() {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            tree.files.insert(rel, size);
        }
    }
    debug!(
        root = %root.display(),
        files = tree.files.len(),
        dirs = tree.dirs.len(),
        "local listing"
    );
    Ok(tree)
}

/// List the remote recursively via `lsf --format sp`. A non-zero exit is
/// `ExternalProcessFailure`; whether that is fatal is up to the caller.
pub fn remote_tree(executor: &dyn ProcessExecutor, tool: &str, remote: &str) -> Result<Tree> {
    let args: Vec<String> = [
        "lsf",
        remote,
        "--recursive",
        "--fast-list",
        "--format",
        "sp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let out = executor.capture(tool, &args)?;
    if !out.code.success() {
        return Err(OrchestrateError::ExternalProcessFailure {
            program: tool.to_string(),
            code: out.code.code(),
        });
    }
    let tree = parse_lsf(&out.stdout);
    debug!(%remote, files = tree.files.len(), dirs = tree.dirs.len(), "remote listing");
    Ok(tree)
}

/// Parse `size;path` lines. Directory entries end in `/` and carry no
/// usable size; lines that do not parse are skipped.
pub fn parse_lsf(stdout: &str) -> Tree {
    let mut tree = Tree::default();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((size, path)) = line.split_once(';') else {
            continue;
        };
        if let Some(dir) = path.strip_suffix('/') {
            if !dir.is_empty() {
                tree.dirs.insert(dir.to_string());
            }
        } else if let Ok(size) = size.trim().parse::<u64>() {
            tree.files.insert(path.to_string(), size);
        }
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{Captured, ExitCode, MockProcessExecutor};

    #[test]
    fn test_parse_lsf_splits_dirs_and_drops_junk() {
        let out = "12;0001/production.csv\n-1;0001/\n-1;0003/empty/\n\nnot-a-line\n7;a;b.txt\n";
        let tree = parse_lsf(out);
        assert_eq!(tree.files.len(), 2);
        assert_eq!(tree.files["0001/production.csv"], 12);
        assert_eq!(tree.files["a;b.txt"], 7);
        assert_eq!(
            tree.dirs.iter().collect::<Vec<_>>(),
            vec!["0001", "0003/empty"]
        );
    }

    #[test]
    fn test_local_tree_relative_posix_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("0001/sub")).unwrap();
        std::fs::write(dir.path().join("0001/sub/a.csv"), b"abc").unwrap();
        std::fs::write(dir.path().join("top.txt"), b"").unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let tree = local_tree(dir.path()).unwrap();
        assert_eq!(
            tree.files.keys().collect::<Vec<_>>(),
            vec!["0001/sub/a.csv", "top.txt"]
        );
        assert_eq!(tree.files["0001/sub/a.csv"], 3);
        assert_eq!(
            tree.dirs.iter().collect::<Vec<_>>(),
            vec!["0001", "0001/sub", "empty"]
        );
    }

    #[test]
    fn test_local_tree_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(local_tree(&dir.path().join("nope")).unwrap(), Tree::default());
    }

    #[test]
    fn test_remote_listing_failure_carries_exit_code() {
        let mut exec = MockProcessExecutor::new();
        exec.expect_capture().returning(|_, _| {
            Ok(Captured {
                code: ExitCode(3),
                stdout: "1;x\n".to_string(),
            })
        });
        match remote_tree(&exec, "rclone", "s3aer:bucket/Data") {
            Err(OrchestrateError::ExternalProcessFailure { code, .. }) => assert_eq!(code, 3),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_remote_listing_invokes_lsf() {
        let mut exec = MockProcessExecutor::new();
        exec.expect_capture()
            .withf(|tool, args| {
                tool == "rclone" && args[0] == "lsf" && args[1] == "s3aer:bucket/Data"
            })
            .times(1)
            .returning(|_, _| {
                Ok(Captured {
                    code: ExitCode::SUCCESS,
                    stdout: "5;0001/sheets.txt\n".to_string(),
                })
            });
        let tree = remote_tree(&exec, "rclone", "s3aer:bucket/Data").unwrap();
        assert_eq!(tree.files["0001/sheets.txt"], 5);
    }
}
