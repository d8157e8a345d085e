//! jobledger CLI
//!
//! Entry point for the `jobledger` command-line tool.

use clap::{Parser, Subcommand};
use jobledger::{
    EffectiveConfig, IntegrityReport, JobRegistry, JobService, JobStatus, RegistrySnapshot,
    ServiceStatus,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobledger")]
#[command(about = "Integrity-tracked job registry and resource scheduler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a workload and run admission cycles until it drains or stalls
    Simulate {
        /// Path to a TOML config file with a [[jobs]] workload
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Override scheduler.max_cycles
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Override log_level
        #[arg(long)]
        log_level: Option<String>,

        /// Write the final registry snapshot to this file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check a registry snapshot against its recorded digests
    Verify {
        /// Snapshot file written by `simulate --snapshot`
        #[arg(long, short = 's')]
        snapshot: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compare two registry snapshots
    Diff {
        left: PathBuf,
        right: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Result of a `simulate` run
#[derive(Debug, Serialize)]
struct SimulationSummary {
    cycles: u64,
    stalled: bool,
    admission_order: Vec<String>,
    never_admitted: Vec<String>,
    status: ServiceStatus,
    integrity: IntegrityReport,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            max_cycles,
            log_level,
            snapshot,
            json,
        } => run_simulate(config, max_cycles, log_level, snapshot, json),
        Commands::Verify { snapshot, json } => {
            init_tracing("warn");
            run_verify(&snapshot, json);
        }
        Commands::Diff { left, right, json } => {
            init_tracing("warn");
            run_diff(&left, &right, json);
        }
    }
}

/// RUST_LOG wins over the configured level
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, err);
    process::exit(1);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("Error serializing output", e),
    }
}

fn run_simulate(
    config_path: Option<PathBuf>,
    max_cycles: Option<u64>,
    log_level: Option<String>,
    snapshot_path: Option<PathBuf>,
    json_output: bool,
) {
    let mut overrides = serde_json::Map::new();
    if let Some(n) = max_cycles {
        overrides.insert("scheduler".to_string(), serde_json::json!({ "max_cycles": n }));
    }
    if let Some(level) = log_level {
        overrides.insert("log_level".to_string(), serde_json::Value::String(level));
    }
    let overrides = (!overrides.is_empty()).then_some(serde_json::Value::Object(overrides));

    let config = match EffectiveConfig::build(config_path.as_deref(), overrides) {
        Ok(c) => c,
        Err(e) => fail("Error loading config", e),
    };
    init_tracing(config.log_level());

    let capacity = match config.capacity() {
        Ok(c) => c,
        Err(e) => fail("Error loading config", e),
    };
    let jobs = match config.jobs() {
        Ok(j) => j,
        Err(e) => fail("Error loading config", e),
    };

    let service = JobService::new(capacity, config.batch_updates());
    for spec in jobs {
        if let Err(e) = service.submit(spec.id, spec.priority, spec.user_id, spec.resources, spec.command) {
            fail("Error submitting job", e);
        }
    }

    let mut cycles = 0;
    let mut stalled = false;
    let mut admission_order = Vec::new();
    while !service.is_idle() && cycles < config.max_cycles() {
        cycles += 1;
        let report = service.run_cycle();
        if report.admitted.is_empty() {
            // Nothing is running, so nothing will ever free capacity
            stalled = true;
            break;
        }
        admission_order.extend(report.admitted);

        for id in service.running_ids() {
            if let Err(e) = service.complete(&id) {
                fail("Error completing job", e);
            }
        }
    }

    let never_admitted: Vec<String> = service.with_registry(|r| {
        r.list_by_status(JobStatus::Queued)
            .into_iter()
            .map(|j| j.id().to_string())
            .collect()
    });

    let integrity = match service.integrity(None) {
        Ok(i) => i,
        Err(e) => fail("Error checking integrity", e),
    };

    if let Some(path) = snapshot_path {
        let written = service
            .snapshot()
            .map_err(|e| e.to_string())
            .and_then(|s| s.write_to_file(&path).map_err(|e| e.to_string()));
        if let Err(e) = written {
            fail("Error writing snapshot", e);
        }
    }

    let summary = SimulationSummary {
        cycles,
        stalled,
        admission_order,
        never_admitted,
        status: service.status(),
        integrity,
    };

    if json_output {
        print_json(&summary);
    } else {
        println!("Simulation finished after {} cycle(s)", summary.cycles);
        if summary.stalled {
            println!("  Stalled: remaining jobs exceed available capacity");
        }
        println!("  Admission order: {}", summary.admission_order.join(", "));
        if !summary.never_admitted.is_empty() {
            println!("  Never admitted: {}", summary.never_admitted.join(", "));
        }
        println!(
            "  Jobs: {} completed, {} queued, {} failed",
            summary.status.completed, summary.status.queued, summary.status.failed
        );
        println!("  Available: {}", summary.status.resources.available);
        println!("  Root hash: {}", summary.integrity.root_hash);
        println!("  Integrity: {}", if summary.integrity.verified { "ok" } else { "MISMATCH" });
    }

    if !summary.integrity.verified {
        process::exit(1);
    }
}

fn load_registry(path: &Path) -> Result<JobRegistry, String> {
    let snapshot = RegistrySnapshot::from_file(path).map_err(|e| e.to_string())?;
    snapshot
        .restore()
        .map_err(|e| format!("{}: {}", path.display(), e))
}

fn run_verify(path: &Path, json_output: bool) {
    let result = load_registry(path);

    if json_output {
        let output = match &result {
            Ok(registry) => serde_json::json!({
                "verified": true,
                "root_hash": registry.root_hash(),
                "jobs": registry.len(),
                "history": registry.history().len(),
            }),
            Err(e) => serde_json::json!({
                "verified": false,
                "error": e,
            }),
        };
        print_json(&output);
    } else {
        match &result {
            Ok(registry) => {
                println!("Snapshot verified: {}", path.display());
                println!("  Root hash: {}", registry.root_hash());
                println!("  Active jobs: {}", registry.len());
                println!("  Archived jobs: {}", registry.history().len());
            }
            Err(e) => eprintln!("Snapshot verification failed: {}", e),
        }
    }

    if result.is_err() {
        process::exit(1);
    }
}

fn run_diff(left_path: &Path, right_path: &Path, json_output: bool) {
    let left = match load_registry(left_path) {
        Ok(r) => r,
        Err(e) => fail("Error loading snapshot", e),
    };
    let right = match load_registry(right_path) {
        Ok(r) => r,
        Err(e) => fail("Error loading snapshot", e),
    };

    let diff = left.diff(&right);
    if json_output {
        print_json(&diff);
    } else {
        println!("{}", diff.summary());
    }

    if !diff.is_empty() {
        process::exit(1);
    }
}
