use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use wellrun::clock::SystemClock;
use wellrun::config::{LoggingConfig, WellrunConfig};
use wellrun::cycle::Cycle;
use wellrun::exec::{render_command, SystemExecutor};
use wellrun::runner::TimeBoxedRunner;
use wellrun::sync::{SyncGate, SyncSpec, SyncSummary};
use wellrun::worker::RunConfiguration;
use wellrun::OrchestrateError;

#[derive(Parser)]
#[command(
    name = "wellrun",
    about = "Time-boxed scraper runs with object-storage sync bracketing",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $WELLRUN_CONFIG, then ./wellrun.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-run the worker until the time window closes
    Loop {
        /// Window length in minutes
        #[arg(long, allow_negative_numbers = true)]
        minutes: Option<i64>,

        /// Pause between runs in seconds
        #[arg(long)]
        pause_secs: Option<u64>,

        #[command(flatten)]
        run: RunArgs,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one sync between the local data directory and the remote
    Sync {
        #[arg(value_enum)]
        kind: SyncKind,

        /// Local directory (default: [sync].local_dir)
        #[arg(long)]
        local: Option<PathBuf>,

        /// Remote URI, e.g. s3aer:bucket/Data (default: built from [sync])
        #[arg(long)]
        remote_uri: Option<String>,

        /// Report what would change without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Push existing output, run the worker once, push new output
    Cycle {
        /// Wells subset to process (e.g. wells_parts/wells_10.txt)
        wells_file: PathBuf,

        /// Local output directory (default: [sync].local_dir)
        #[arg(long)]
        out_base: Option<PathBuf>,

        /// Remote URI (default: built from [sync])
        #[arg(long)]
        remote_uri: Option<String>,

        #[command(flatten)]
        run: RunArgs,

        #[arg(long)]
        json: bool,
    },

    /// Split a master wells list into N part files
    Split {
        /// Master wells file
        #[arg(default_value = "wells.txt")]
        master: PathBuf,

        /// Output directory for parts
        #[arg(long, default_value = "wells_parts")]
        outdir: PathBuf,

        /// Number of parts
        #[arg(long, default_value = "30")]
        parts: usize,
    },

    /// Print the worker command line that would be run
    Args {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SyncKind {
    /// Upload new local files (never overwrites)
    Push,
    /// Mirror the remote locally, size-only comparison
    PullFull,
    /// Fetch only */sheets.txt manifests
    PullManifests,
}

/// Worker settings; anything unset falls back to the [run] config section.
#[derive(Args)]
struct RunArgs {
    /// Parallel browser workers
    #[arg(long, allow_negative_numbers = true)]
    workers: Option<i64>,

    /// Wells list path
    #[arg(long)]
    wells: Option<PathBuf>,

    /// Comma list of dashboards or 'all'
    #[arg(long)]
    dashboards: Option<String>,

    /// Comma list of sheets or 'all'
    #[arg(long)]
    sheets: Option<String>,

    /// Per-operation timeout in seconds
    #[arg(long, allow_negative_numbers = true)]
    timeout: Option<i64>,

    /// Delay between actions in seconds
    #[arg(long, allow_negative_numbers = true)]
    delay: Option<f64>,

    #[arg(long)]
    headless: bool,

    /// Re-download even if files exist
    #[arg(long)]
    force: bool,

    /// Let the worker upload each well as it finishes
    #[arg(long)]
    push_to_s3: bool,

    /// Delete local files after a successful upload
    #[arg(long)]
    purge_local: bool,

    /// Delete a well's directory after it is processed
    #[arg(long)]
    purge_well: bool,

    /// Skip wells already present remotely
    #[arg(long)]
    check_remote: bool,
}

impl RunArgs {
    fn apply(&self, base: &RunConfiguration) -> RunConfiguration {
        let mut cfg = base.clone();
        if let Some(v) = self.workers {
            cfg.workers = v;
        }
        if let Some(v) = &self.wells {
            cfg.wells = v.clone();
        }
        if let Some(v) = &self.dashboards {
            cfg.dashboards = v.clone();
        }
        if let Some(v) = &self.sheets {
            cfg.sheets = v.clone();
        }
        if let Some(v) = self.timeout {
            cfg.timeout_secs = v;
        }
        if let Some(v) = self.delay {
            cfg.delay_secs = v;
        }
        let flags = &mut cfg.flags;
        flags.headless |= self.headless;
        flags.force |= self.force;
        flags.push_to_remote |= self.push_to_s3;
        flags.purge_local |= self.purge_local;
        flags.purge_well |= self.purge_well;
        flags.check_remote |= self.check_remote;
        cfg
    }
}

fn init_tracing(logging: &LoggingConfig, force_json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if force_json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_sync_summary(label: &str, summary: &SyncSummary) {
    println!(
        "{:<10} considered={} transfer={} delete={} new_dirs={}{}{}",
        label,
        summary.files_considered,
        summary.files_to_transfer,
        summary.files_to_delete,
        summary.dirs_to_create,
        if summary.dry_run { " (dry run)" } else { "" },
        if summary.invoked { "" } else { " (tool not invoked)" },
    );
}

fn run(cli: Cli) -> Result<()> {
    let config = WellrunConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.log_json);

    let executor = SystemExecutor;
    let clock = SystemClock;
    let mut gate = SyncGate::new(&executor, config.sync.tool.clone());
    if let Some(tuning) = &config.sync.push_tuning {
        gate = gate.with_push_tuning(tuning.clone());
    }

    match cli.command {
        Commands::Loop {
            minutes,
            pause_secs,
            run,
            json,
        } => {
            let minutes = minutes.or(config.runner.minutes).ok_or_else(|| {
                OrchestrateError::invalid("--minutes is required (or set [loop] minutes)")
            })?;
            let duration = chrono::Duration::try_minutes(minutes)
                .ok_or_else(|| OrchestrateError::invalid("--minutes is out of range"))?;
            let pause = pause_secs.unwrap_or(config.runner.pause_secs);
            let run_cfg = run.apply(&config.run);
            tracing::info!(%minutes, pause_secs = pause, "Starting time-boxed loop");

            let report = TimeBoxedRunner::new(
                &executor,
                &clock,
                config.worker.clone(),
                run_cfg,
                duration,
            )?
            .with_pause(std::time::Duration::from_secs(pause))
            .run()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Window {} -> {}: {} runs, {} failed",
                    report.window.start.to_rfc3339(),
                    report.window.end.to_rfc3339(),
                    report.runs,
                    report.failures
                );
            }
        }
        Commands::Sync {
            kind,
            local,
            remote_uri,
            dry_run,
            json,
        } => {
            let local = local.unwrap_or_else(|| config.sync.local_dir.clone());
            let remote = remote_uri.unwrap_or_else(|| config.sync.remote_uri());
            let spec = match kind {
                SyncKind::Push => SyncSpec::push(local, remote),
                SyncKind::PullFull => SyncSpec::pull_full(local, remote),
                SyncKind::PullManifests => SyncSpec::pull_manifests(local, remote),
            }
            .with_dry_run(dry_run);

            let summary = gate.run(&spec)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_sync_summary("sync", &summary);
            }
        }
        Commands::Cycle {
            wells_file,
            out_base,
            remote_uri,
            run,
            json,
        } => {
            let out_base = out_base.unwrap_or_else(|| config.sync.local_dir.clone());
            let remote = remote_uri.unwrap_or_else(|| config.sync.remote_uri());
            let run_cfg = run.apply(&config.run);

            let cycle = Cycle::new(&executor, &clock, gate, config.worker.clone());
            let report = cycle.run(&run_cfg, &wells_file, &out_base, &remote)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_sync_summary("pre-push", &report.pre_push);
                print_sync_summary("post-push", &report.post_push);
            }
        }
        Commands::Split {
            master,
            outdir,
            parts,
        } => {
            let written = wellrun::partition::split_wells(&master, &outdir, parts)?;
            println!("Wrote {} parts to {}", written.len(), outdir.display());
        }
        Commands::Args { run } => {
            let run_cfg = run.apply(&config.run);
            let argv = config.worker.argv(&run_cfg)?;
            println!("{}", render_command(&config.worker.program, &argv));
        }
    }

    Ok(())
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {e:#}");
            let code = e
                .downcast_ref::<OrchestrateError>()
                .map(OrchestrateError::exit_code)
                .unwrap_or(1);
            std::process::ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
