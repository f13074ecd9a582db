//! CLI entrypoint for the tagheap replay harness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tagheap_core::{HeapConfig, LogLevel};
use tagheap_harness::{
    HarnessError, LogEmitter, LogEntry, Outcome, TraceRunner, TraceSet, fixture_digest,
    synth_trace,
};

/// Replay tooling for the tagheap allocator.
#[derive(Debug, Parser)]
#[command(name = "tagheap")]
#[command(about = "Trace-replay harness for the tagheap allocator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a trace fixture and print or write a report.
    Replay {
        /// Trace fixture JSON path.
        #[arg(long)]
        fixture: PathBuf,
        /// Output report path (markdown). If omitted, prints to stdout.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Optional heap configuration JSON path.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay with the consistency checker after every operation.
    Verify {
        /// Trace fixture JSON path.
        #[arg(long)]
        fixture: PathBuf,
        /// Output report path (markdown). If omitted, prints to stdout.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Optional heap configuration JSON path.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Generate a deterministic synthetic trace fixture.
    Synth {
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Number of operations to generate.
        #[arg(long, default_value_t = 256)]
        steps: u32,
        /// Output fixture path.
        #[arg(long)]
        output: PathBuf,
    },
}

fn parse_seed(raw: &str) -> Result<u64, String> {
    let cleaned = raw.replace('_', "");
    let parsed = if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else {
        cleaned.parse()
    };
    parsed.map_err(|_| format!("invalid seed: {raw}"))
}

fn load_config(path: Option<&PathBuf>) -> Result<HeapConfig, HarnessError> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        }
        None => Ok(HeapConfig::from_env()),
    }
}

fn replay(
    fixture: &PathBuf,
    report_path: Option<&PathBuf>,
    log_path: Option<&PathBuf>,
    config_path: Option<&PathBuf>,
    check_every_op: bool,
) -> Result<bool, HarnessError> {
    let raw = std::fs::read(fixture)?;
    let set = TraceSet::from_json(std::str::from_utf8(&raw).map_err(std::io::Error::other)?)?;
    let config = load_config(config_path)?;

    let mut emitter = match log_path {
        Some(path) => Some(LogEmitter::to_file(path, &set.name)?),
        None => None,
    };
    if let Some(emitter) = emitter.as_mut() {
        emitter.emit(LogLevel::Info, "replay_start")?;
    }

    let runner = TraceRunner::new(config, check_every_op);
    let report = runner.run(&set).with_digest(fixture_digest(&raw));

    if let Some(emitter) = emitter.as_mut() {
        let outcome = if report.passed {
            Outcome::Pass
        } else {
            Outcome::Fail
        };
        let entry = LogEntry::new(
            format!("{}::summary", set.name),
            if report.passed {
                LogLevel::Info
            } else {
                LogLevel::Error
            },
            "replay_done",
        )
        .with_outcome(outcome)
        .with_details(serde_json::json!({
            "ops": report.ops_executed,
            "failures": report.failures.len(),
            "violations": report.violations.len(),
            "utilization": report.utilization,
        }));
        emitter.emit_entry(&entry)?;
        emitter.flush()?;
    }

    let markdown = report.render_markdown();
    match report_path {
        Some(path) => std::fs::write(path, markdown)?,
        None => print!("{markdown}"),
    }
    Ok(report.passed)
}

fn run(cli: Cli) -> Result<bool, HarnessError> {
    match cli.command {
        Command::Replay {
            fixture,
            report,
            log,
            config,
        } => replay(&fixture, report.as_ref(), log.as_ref(), config.as_ref(), false),
        Command::Verify {
            fixture,
            report,
            config,
        } => replay(&fixture, report.as_ref(), None, config.as_ref(), true),
        Command::Synth {
            seed,
            steps,
            output,
        } => {
            let seed = parse_seed(&seed).map_err(std::io::Error::other)?;
            let set = synth_trace(seed, steps);
            std::fs::write(&output, set.to_json()?)?;
            println!("wrote {} ops to {}", set.ops.len(), output.display());
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("tagheap: {err}");
            ExitCode::from(2)
        }
    }
}
