//! SyncGate: one directional sync between a local tree and a remote URI.
//!
//! The transfer itself is delegated to an rclone-compatible tool. Before
//! invoking it the gate lists both sides and computes the candidate set,
//! so the summary is the same with or without `--dry-run`.
//!
//! Mutation rules:
//! - push never overwrites remote objects and never deletes anything.
//! - pull/full may delete local entries that are absent remotely, except
//!   paths covered by the exclude rules.
//! - pull/copy only adds.

pub mod filter;
pub mod listing;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{OrchestrateError, Result};
use crate::exec::{render_command, ProcessExecutor};

pub use filter::{FilterRule, FilterSet};
pub use listing::{Listing, Tree};

/// Scratch directories the worker leaves behind while running.
pub const TEMP_WORKER_PATTERN: &str = "_tmp_worker_*";
/// Remote lock objects held by running workers.
pub const LOCKS_PATTERN: &str = "locks/**";
/// Manifest files fetched by a manifest-only pull.
pub const MANIFEST_PATTERN: &str = "*/sheets.txt";
pub const MANIFEST_MAX_DEPTH: usize = 3;
/// Partial files the worker renames into place once complete.
pub const PARTIAL_FILE_PATTERN: &str = "*.tmp";
const OS_ARTIFACTS: [&str; 2] = [".DS_Store", "Thumbs.db"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Pull,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Make the destination match the source; may delete at a pull destination.
    Full,
    /// Add missing files only.
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSpec {
    pub local: PathBuf,
    pub remote: String,
    pub direction: Direction,
    pub mode: SyncMode,
    pub filters: Vec<FilterRule>,
    pub max_depth: Option<usize>,
    pub dry_run: bool,
}

impl SyncSpec {
    /// Upload new local files, skipping anything already present remotely.
    pub fn push(local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        let mut filters = vec![
            FilterRule::Exclude(TEMP_WORKER_PATTERN.to_string()),
            FilterRule::Exclude(LOCKS_PATTERN.to_string()),
            FilterRule::Exclude(PARTIAL_FILE_PATTERN.to_string()),
        ];
        filters.extend(OS_ARTIFACTS.iter().map(|p| FilterRule::Exclude(p.to_string())));
        Self {
            local: local.into(),
            remote: remote.into(),
            direction: Direction::Push,
            mode: SyncMode::Copy,
            filters,
            max_depth: None,
            dry_run: false,
        }
    }

    /// Mirror the remote into `local`, compared by size only.
    pub fn pull_full(local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
            direction: Direction::Pull,
            mode: SyncMode::Full,
            filters: vec![
                FilterRule::Exclude(TEMP_WORKER_PATTERN.to_string()),
                FilterRule::Exclude(LOCKS_PATTERN.to_string()),
            ],
            max_depth: None,
            dry_run: false,
        }
    }

    /// Fetch only per-well `sheets.txt` manifests.
    pub fn pull_manifests(local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
            direction: Direction::Pull,
            mode: SyncMode::Copy,
            filters: vec![FilterRule::Include(MANIFEST_PATTERN.to_string())],
            max_depth: Some(MANIFEST_MAX_DEPTH),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(OrchestrateError::invalid("remote URI must not be empty"));
        }
        if self.direction == Direction::Push && self.mode == SyncMode::Full {
            return Err(OrchestrateError::invalid(
                "full sync is only allowed for pull; push must use copy mode",
            ));
        }
        if self.max_depth == Some(0) {
            return Err(OrchestrateError::invalid("max depth must be >= 1"));
        }
        Ok(())
    }

    /// Tool arguments, without the program name.
    pub fn tool_args(&self, push_tuning: &[String]) -> Vec<String> {
        let local = self.local.display().to_string();
        let mut args = Vec::new();
        if self.dry_run {
            args.push("--dry-run".to_string());
        }
        let (subcommand, src, dst) = match (self.direction, self.mode) {
            (Direction::Pull, SyncMode::Full) => ("sync", self.remote.clone(), local),
            (Direction::Pull, SyncMode::Copy) => ("copy", self.remote.clone(), local),
            (Direction::Push, _) => ("copy", local, self.remote.clone()),
        };
        args.extend([subcommand.to_string(), src, dst]);

        match (self.direction, self.mode) {
            (Direction::Pull, SyncMode::Full) => args.push("--size-only".to_string()),
            (Direction::Push, _) => {
                args.push("--ignore-existing".to_string());
                args.push("--create-empty-src-dirs".to_string());
            }
            (Direction::Pull, SyncMode::Copy) => args.push("--ignore-existing".to_string()),
        }
        args.extend(self.filters.iter().flat_map(FilterRule::to_args));
        if let Some(depth) = self.max_depth {
            args.push("--max-depth".to_string());
            args.push(depth.to_string());
        }
        if self.direction == Direction::Push {
            args.extend(push_tuning.iter().cloned());
        }
        args
    }
}

/// A push needs its local source; a pull creates its destination.
fn check_source(spec: &SyncSpec) -> Result<()> {
    if spec.direction == Direction::Push && !spec.local.exists() {
        return Err(OrchestrateError::LocalPathMissing {
            path: spec.local.display().to_string(),
        });
    }
    Ok(())
}

/// What a sync would do (or did).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Source files that pass the filters.
    pub considered: usize,
    pub transfers: Vec<String>,
    pub deletions: Vec<String>,
    /// Push only: local directories, empty ones included, absent remotely.
    pub dirs_to_create: Vec<String>,
}

impl SyncPlan {
    fn is_noop(&self) -> bool {
        self.transfers.is_empty() && self.deletions.is_empty() && self.dirs_to_create.is_empty()
    }
}

/// Compute the candidate set from the two listings. Pure.
///
/// Pull/full compares by size, matching `--size-only`; pull/copy and push
/// only ever add what the destination lacks, matching `--ignore-existing`.
pub fn plan(spec: &SyncSpec, local: &Tree, remote: &Tree) -> Result<SyncPlan> {
    let filters = FilterSet::compile(&spec.filters, spec.max_depth)?;
    let (source, dest) = match spec.direction {
        Direction::Push => (&local.files, &remote.files),
        Direction::Pull => (&remote.files, &local.files),
    };

    let mut plan = SyncPlan::default();
    for (path, size) in source.iter().filter(|(p, _)| filters.allows(p)) {
        plan.considered += 1;
        let needed = match (spec.mode, dest.get(path)) {
            (_, None) => true,
            (SyncMode::Full, Some(existing)) => existing != size,
            (SyncMode::Copy, Some(_)) => false,
        };
        if needed {
            plan.transfers.push(path.clone());
        }
    }

    match (spec.direction, spec.mode) {
        (Direction::Pull, SyncMode::Full) => {
            plan.deletions = local
                .files
                .keys()
                .filter(|p| filters.allows(p) && !remote.files.contains_key(*p))
                .cloned()
                .collect();
        }
        (Direction::Push, _) => {
            plan.dirs_to_create = local
                .dirs
                .iter()
                .filter(|d| filters.allows(d) && !remote.dirs.contains(*d))
                .cloned()
                .collect();
        }
        (Direction::Pull, SyncMode::Copy) => {}
    }
    Ok(plan)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub direction: Direction,
    pub mode: SyncMode,
    pub dry_run: bool,
    /// False when the gate decided there was nothing to hand to the tool.
    pub invoked: bool,
    pub files_considered: usize,
    pub files_to_transfer: usize,
    pub files_to_delete: usize,
    pub dirs_to_create: usize,
    /// Planned uploads seen on the remote after a non-dry-run push.
    pub uploaded: Option<usize>,
    pub plan: SyncPlan,
}

impl SyncSummary {
    fn skipped(spec: &SyncSpec, plan: SyncPlan) -> Self {
        Self::from_plan(spec, plan, false)
    }

    fn from_plan(spec: &SyncSpec, plan: SyncPlan, invoked: bool) -> Self {
        Self {
            direction: spec.direction,
            mode: spec.mode,
            dry_run: spec.dry_run,
            invoked,
            files_considered: plan.considered,
            files_to_transfer: plan.transfers.len(),
            files_to_delete: plan.deletions.len(),
            dirs_to_create: plan.dirs_to_create.len(),
            uploaded: None,
            plan,
        }
    }
}

/// Default transfer tuning appended to push invocations.
pub fn default_push_tuning() -> Vec<String> {
    [
        "--transfers",
        "16",
        "--checkers",
        "32",
        "--contimeout",
        "15s",
        "--timeout",
        "30m",
        "--retries",
        "3",
        "--low-level-retries",
        "5",
        "--s3-no-check-bucket",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub struct SyncGate<'a> {
    executor: &'a dyn ProcessExecutor,
    tool: String,
    push_tuning: Vec<String>,
}

impl<'a> SyncGate<'a> {
    pub fn new(executor: &'a dyn ProcessExecutor, tool: impl Into<String>) -> Self {
        Self {
            executor,
            tool: tool.into(),
            push_tuning: default_push_tuning(),
        }
    }

    pub fn with_push_tuning(mut self, tuning: Vec<String>) -> Self {
        self.push_tuning = tuning;
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Fail with `RemoteToolUnavailable` unless the tool can be launched.
    pub fn ensure_available(&self) -> Result<()> {
        if self.executor.is_available(&self.tool) {
            Ok(())
        } else {
            Err(OrchestrateError::RemoteToolUnavailable {
                tool: self.tool.clone(),
            })
        }
    }

    /// Run one sync. A non-zero tool exit is returned verbatim as
    /// `ExternalProcessFailure`.
    pub fn run(&self, spec: &SyncSpec) -> Result<SyncSummary> {
        self.run_stage(spec, None)
    }

    /// Same as [`SyncGate::run`], with push log lines tagged by `stage`
    /// (`upload(pre): ...`).
    pub fn run_stage(&self, spec: &SyncSpec, stage: Option<&str>) -> Result<SyncSummary> {
        spec.validate()?;

        match check_source(spec) {
            Err(OrchestrateError::LocalPathMissing { path }) => {
                info!(local = %path, "[info] push source absent, nothing to upload");
                return Ok(SyncSummary::skipped(spec, SyncPlan::default()));
            }
            other => other?,
        }

        self.ensure_available()?;

        let local = listing::local_tree(&spec.local)?;
        let remote = self.remote_tree(spec)?;
        let plan = plan(spec, &local, &remote)?;
        let tag = stage.map(|s| format!("({s})")).unwrap_or_default();

        if spec.direction == Direction::Push {
            info!(
                new_dirs = plan.dirs_to_create.len(),
                "[info] upload{tag}: dismissed existing={}, will upload new={}",
                plan.considered - plan.transfers.len(),
                plan.transfers.len()
            );
            if plan.is_noop() {
                info!("[info] nothing to upload{tag}");
                return Ok(SyncSummary::skipped(spec, plan));
            }
        } else {
            info!(
                considered = plan.considered,
                transfers = plan.transfers.len(),
                deletions = plan.deletions.len(),
                "[info] pull plan"
            );
        }

        let args = spec.tool_args(&self.push_tuning);
        info!("[info] run: {}", render_command(&self.tool, &args));
        let code = self.executor.execute(&self.tool, &args)?;
        info!(tool = %self.tool, dry_run = spec.dry_run, "[done] exit={}", code);

        if !code.success() {
            return Err(OrchestrateError::ExternalProcessFailure {
                program: self.tool.clone(),
                code: code.code(),
            });
        }

        let mut summary = SyncSummary::from_plan(spec, plan, true);
        if spec.direction == Direction::Push && !spec.dry_run {
            summary.uploaded = self.confirm_uploads(spec, &summary.plan, &tag);
        }
        Ok(summary)
    }

    /// A push treats an unlistable remote as empty (usually a prefix that
    /// does not exist yet). A pull reads from it, so the failure stands.
    fn remote_tree(&self, spec: &SyncSpec) -> Result<Tree> {
        match listing::remote_tree(self.executor, &self.tool, &spec.remote) {
            Err(e) if spec.direction == Direction::Push => {
                warn!(remote = %spec.remote, error = %e, "remote listing failed, treating as empty");
                Ok(Tree::default())
            }
            result => result,
        }
    }

    fn confirm_uploads(&self, spec: &SyncSpec, plan: &SyncPlan, tag: &str) -> Option<usize> {
        match listing::remote_tree(self.executor, &self.tool, &spec.remote) {
            Ok(after) => {
                let uploaded = plan
                    .transfers
                    .iter()
                    .filter(|p| after.files.contains_key(*p))
                    .count();
                info!("[info] uploaded{tag}: {uploaded} new");
                Some(uploaded)
            }
            Err(e) => {
                warn!(remote = %spec.remote, error = %e, "could not re-list remote after upload");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{Captured, ExitCode, MockProcessExecutor};
    use std::sync::{Arc, Mutex};

    const REMOTE: &str = "s3aer:aer-scrape-prod/Data";

    fn tree(files: &[(&str, u64)]) -> Tree {
        Tree {
            files: files.iter().map(|(p, s)| (p.to_string(), *s)).collect(),
            dirs: Default::default(),
        }
    }

    fn lsf_output(tree: &Tree) -> String {
        let dirs = tree.dirs.iter().map(|d| format!("-1;{d}/\n"));
        let files = tree.files.iter().map(|(p, s)| format!("{s};{p}\n"));
        dirs.chain(files).collect()
    }

    fn lsf_ok(stdout: &str) -> Result<Captured> {
        Ok(Captured {
            code: ExitCode::SUCCESS,
            stdout: stdout.to_string(),
        })
    }

    #[test]
    fn test_push_args() {
        let spec = SyncSpec::push("Data", REMOTE);
        let args = spec.tool_args(&[]);
        assert_eq!(
            args,
            vec![
                "copy",
                "Data",
                REMOTE,
                "--ignore-existing",
                "--create-empty-src-dirs",
                "--exclude",
                "_tmp_worker_*",
                "--exclude",
                "locks/**",
                "--exclude",
                "*.tmp",
                "--exclude",
                ".DS_Store",
                "--exclude",
                "Thumbs.db",
            ]
        );
    }

    #[test]
    fn test_pull_full_args() {
        let args = SyncSpec::pull_full("Data", REMOTE).tool_args(&default_push_tuning());
        assert_eq!(
            args,
            vec![
                "sync",
                REMOTE,
                "Data",
                "--size-only",
                "--exclude",
                "_tmp_worker_*",
                "--exclude",
                "locks/**",
            ]
        );
    }

    #[test]
    fn test_pull_manifest_args() {
        let args = SyncSpec::pull_manifests("Data", REMOTE).tool_args(&[]);
        assert_eq!(
            args,
            vec![
                "copy",
                REMOTE,
                "Data",
                "--ignore-existing",
                "--include",
                "*/sheets.txt",
                "--max-depth",
                "3"
            ]
        );
    }

    #[test]
    fn test_dry_run_is_first_token() {
        for spec in [
            SyncSpec::push("Data", REMOTE),
            SyncSpec::pull_full("Data", REMOTE),
            SyncSpec::pull_manifests("Data", REMOTE),
        ] {
            let args = spec.with_dry_run(true).tool_args(&default_push_tuning());
            assert_eq!(args[0], "--dry-run");
            assert_eq!(args.iter().filter(|a| *a == "--dry-run").count(), 1);
        }
    }

    #[test]
    fn test_push_full_is_rejected() {
        let mut spec = SyncSpec::push("Data", REMOTE);
        spec.mode = SyncMode::Full;
        assert!(matches!(
            spec.validate(),
            Err(OrchestrateError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_plan_push_skips_existing_and_filtered() {
        let spec = SyncSpec::push("Data", REMOTE);
        let local = tree(&[
            ("0001/a.csv", 1),
            ("0001/b.csv", 2),
            ("0001/production.csv.tmp", 2),
            ("_tmp_worker_0/x", 3),
            ("0002/.DS_Store", 4),
        ]);
        let remote = tree(&[("0001/a.csv", 99)]);
        let plan = plan(&spec, &local, &remote).unwrap();
        assert_eq!(plan.considered, 2);
        assert_eq!(plan.transfers, vec!["0001/b.csv"]);
        assert!(plan.deletions.is_empty());
    }

    #[test]
    fn test_plan_push_new_directories() {
        let spec = SyncSpec::push("Data", REMOTE);
        let mut local = tree(&[("0001/a.csv", 1)]);
        local.dirs = ["0001", "0003", "0003/empty", "_tmp_worker_1", "_tmp_worker_1/sub"]
            .iter()
            .map(|d| d.to_string())
            .collect();
        let mut remote = tree(&[("0001/a.csv", 1)]);
        remote.dirs.insert("0001".to_string());

        let plan = plan(&spec, &local, &remote).unwrap();
        assert!(plan.transfers.is_empty());
        assert_eq!(plan.dirs_to_create, vec!["0003", "0003/empty"]);
    }

    #[test]
    fn test_plan_full_pull_leaves_excluded_destination_entries() {
        let spec = SyncSpec::pull_full("Data", REMOTE);
        let remote = tree(&[("0001/a.csv", 10), ("0001/b.csv", 5)]);
        let local = tree(&[
            ("0001/a.csv", 10),
            ("0001/b.csv", 4),
            ("0001/stale.csv", 1),
            ("_tmp_worker_2/partial.csv", 1),
            ("locks/0001.lock", 1),
        ]);
        let plan = plan(&spec, &local, &remote).unwrap();
        assert_eq!(plan.transfers, vec!["0001/b.csv"]);
        assert_eq!(plan.deletions, vec!["0001/stale.csv"]);
        assert!(plan.dirs_to_create.is_empty());
    }

    #[test]
    fn test_plan_manifest_pull_only_adds_missing() {
        let spec = SyncSpec::pull_manifests("Data", REMOTE);
        let remote = tree(&[
            ("0001/sheets.txt", 10),
            ("0002/sheets.txt", 10),
            ("0001/production.csv", 10),
            ("a/b/c/sheets.txt", 10),
        ]);
        let local = tree(&[("0001/sheets.txt", 9), ("old/sheets.txt", 1)]);
        let plan = plan(&spec, &local, &remote).unwrap();
        assert_eq!(plan.considered, 2);
        assert_eq!(plan.transfers, vec!["0002/sheets.txt"]);
        assert!(plan.deletions.is_empty());
    }

    #[test]
    fn test_push_absent_source_never_invokes_tool() {
        let dir = tempfile::tempdir().unwrap();
        let exec = MockProcessExecutor::new();
        let gate = SyncGate::new(&exec, "rclone");
        let summary = gate
            .run(&SyncSpec::push(dir.path().join("missing"), REMOTE))
            .unwrap();
        assert!(!summary.invoked);
        assert_eq!(summary.files_to_transfer, 0);
    }

    #[test]
    fn test_missing_tool_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = MockProcessExecutor::new();
        exec.expect_is_available().return_const(false);
        let gate = SyncGate::new(&exec, "rclone");
        let err = gate
            .run(&SyncSpec::pull_full(dir.path(), REMOTE))
            .unwrap_err();
        assert!(matches!(err, OrchestrateError::RemoteToolUnavailable { .. }));
    }

    #[test]
    fn test_tool_failure_surfaces_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = MockProcessExecutor::new();
        exec.expect_is_available().return_const(true);
        exec.expect_capture()
            .returning(|_, _| lsf_ok("3;0001/sheets.txt\n"));
        exec.expect_execute().returning(|_, _| Ok(ExitCode(5)));
        let gate = SyncGate::new(&exec, "rclone");
        let err = gate
            .run(&SyncSpec::pull_manifests(dir.path(), REMOTE))
            .unwrap_err();
        match err {
            OrchestrateError::ExternalProcessFailure { code, .. } => assert_eq!(code, 5),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_pull_with_failed_listing_stops_before_tool() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.csv"), b"x").unwrap();
        let mut exec = MockProcessExecutor::new();
        exec.expect_is_available().return_const(true);
        exec.expect_capture().returning(|_, _| {
            Ok(Captured {
                code: ExitCode(1),
                stdout: String::new(),
            })
        });
        exec.expect_execute().times(0);
        let gate = SyncGate::new(&exec, "rclone");

        let err = gate
            .run(&SyncSpec::pull_full(dir.path(), REMOTE).with_dry_run(true))
            .unwrap_err();
        match err {
            OrchestrateError::ExternalProcessFailure { code, .. } => assert_eq!(code, 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(dir.path().join("keep.csv").exists());
    }

    #[test]
    fn test_push_with_failed_listing_uploads_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), b"x").unwrap();
        let mut exec = MockProcessExecutor::new();
        exec.expect_is_available().return_const(true);
        exec.expect_capture().returning(|_, _| {
            Ok(Captured {
                code: ExitCode(3),
                stdout: String::new(),
            })
        });
        exec.expect_execute().times(1).returning(|_, _| Ok(ExitCode::SUCCESS));
        let gate = SyncGate::new(&exec, "rclone");

        let summary = gate.run(&SyncSpec::push(dir.path(), REMOTE)).unwrap();
        assert!(summary.invoked);
        assert_eq!(summary.files_to_transfer, 1);
        assert_eq!(summary.uploaded, None);
    }

    /// Fake remote: `lsf` reports what has been "uploaded" so far, and a
    /// non-dry-run `copy` records the whole local tree as uploaded.
    fn fake_remote(
        exec: &mut MockProcessExecutor,
        local_root: PathBuf,
        remote: Arc<Mutex<Tree>>,
        calls: Arc<Mutex<Vec<Vec<String>>>>,
    ) {
        exec.expect_is_available().return_const(true);
        let seen = remote.clone();
        exec.expect_capture()
            .returning(move |_, _| lsf_ok(&lsf_output(&seen.lock().unwrap())));
        exec.expect_execute().returning(move |_, args| {
            calls.lock().unwrap().push(args.to_vec());
            if args[0] != "--dry-run" {
                let local = listing::local_tree(&local_root).unwrap();
                let mut remote = remote.lock().unwrap();
                for (path, size) in local.files {
                    remote.files.entry(path).or_insert(size);
                }
                remote.dirs.extend(local.dirs);
            }
            Ok(ExitCode::SUCCESS)
        });
    }

    #[test]
    fn test_push_twice_transfers_nothing_the_second_time() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("0001")).unwrap();
        std::fs::write(dir.path().join("0001/a.csv"), b"a").unwrap();
        std::fs::write(dir.path().join("0001/b.csv"), b"bb").unwrap();

        let remote = Arc::new(Mutex::new(Tree::default()));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut exec = MockProcessExecutor::new();
        fake_remote(&mut exec, dir.path().to_path_buf(), remote.clone(), calls.clone());

        let gate = SyncGate::new(&exec, "rclone");
        let spec = SyncSpec::push(dir.path(), REMOTE);

        let first = gate.run_stage(&spec, Some("pre")).unwrap();
        assert_eq!(first.files_to_transfer, 2);
        assert_eq!(first.dirs_to_create, 1);
        assert_eq!(first.uploaded, Some(2));
        assert!(first.invoked);

        let second = gate.run_stage(&spec, Some("post")).unwrap();
        assert_eq!(second.files_to_transfer, 0);
        assert!(!second.invoked);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_push_of_empty_directories_invokes_tool() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("0003/empty")).unwrap();

        let remote = Arc::new(Mutex::new(Tree::default()));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut exec = MockProcessExecutor::new();
        fake_remote(&mut exec, dir.path().to_path_buf(), remote.clone(), calls.clone());
        let gate = SyncGate::new(&exec, "rclone");
        let spec = SyncSpec::push(dir.path(), REMOTE);

        let summary = gate.run(&spec).unwrap();
        assert!(summary.invoked);
        assert_eq!(summary.files_to_transfer, 0);
        assert_eq!(summary.plan.dirs_to_create, vec!["0003", "0003/empty"]);
        assert!(calls.lock().unwrap()[0].contains(&"--create-empty-src-dirs".to_string()));

        assert!(!gate.run(&spec).unwrap().invoked);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dry_run_reports_same_candidates_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("new.csv"), b"abc").unwrap();

        let remote = Arc::new(Mutex::new(tree(&[("old.csv", 1)])));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut exec = MockProcessExecutor::new();
        fake_remote(&mut exec, dir.path().to_path_buf(), remote.clone(), calls.clone());
        let gate = SyncGate::new(&exec, "rclone");

        let dry = gate
            .run(&SyncSpec::push(dir.path(), REMOTE).with_dry_run(true))
            .unwrap();
        assert!(dry.dry_run);
        assert_eq!(dry.uploaded, None);
        assert_eq!(remote.lock().unwrap().files.len(), 1);
        assert_eq!(calls.lock().unwrap()[0][0], "--dry-run");

        let wet = gate.run(&SyncSpec::push(dir.path(), REMOTE)).unwrap();
        assert_eq!(dry.plan, wet.plan);
        assert_eq!(remote.lock().unwrap().files.len(), 2);
    }

    #[test]
    fn test_full_pull_dry_run_matches_real_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("0001")).unwrap();
        std::fs::write(dir.path().join("0001/a.csv"), b"1234").unwrap();
        std::fs::write(dir.path().join("0001/stale.csv"), b"x").unwrap();

        let calls = Arc::new(Mutex::new(Vec::<Vec<String>>::new()));
        let mut exec = MockProcessExecutor::new();
        exec.expect_is_available().return_const(true);
        exec.expect_capture()
            .returning(|_, _| lsf_ok("-1;0001/\n10;0001/a.csv\n3;0002/b.csv\n"));
        let recorded = calls.clone();
        exec.expect_execute().returning(move |_, args| {
            recorded.lock().unwrap().push(args.to_vec());
            Ok(ExitCode::SUCCESS)
        });
        let gate = SyncGate::new(&exec, "rclone");

        let dry = gate
            .run(&SyncSpec::pull_full(dir.path(), REMOTE).with_dry_run(true))
            .unwrap();
        let wet = gate.run(&SyncSpec::pull_full(dir.path(), REMOTE)).unwrap();

        assert_eq!(dry.plan, wet.plan);
        assert_eq!(dry.plan.transfers, vec!["0001/a.csv", "0002/b.csv"]);
        assert_eq!(dry.plan.deletions, vec!["0001/stale.csv"]);
        assert!(dry.dry_run && !wet.dry_run);

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0][0], "--dry-run");
        assert_eq!(calls[1][0], "sync");
        assert_eq!(calls[0][1..], calls[1][..]);
    }
}
