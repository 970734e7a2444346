//! Simulator for the undo and audit scenarios

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use ctrack_core::telemetry::init_tracing;
use ctrack_core::TrackerConfig;
use std::path::PathBuf;
use std::time::Duration;

mod scenarios;

fn cli() -> Command {
    Command::new("ctrack-sim")
        .version(ctrack_core::VERSION)
        .about("Control tracker undo and audit simulator")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("scenarios")
                .about("Run the undo and audit scenarios")
                .arg(
                    Arg::new("window-ms")
                        .long("window-ms")
                        .default_value("200")
                        .value_parser(value_parser!(u64))
                        .help("Reversal window; short so the run finishes quickly"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("demo").about("Delete a control with its tasks, then undo it"))
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TrackerConfig> {
    let config = match path {
        Some(path) => TrackerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let config = load_config(matches.get_one::<PathBuf>("config"))?;
    init_tracing(&config.telemetry);

    match matches.subcommand() {
        Some(("scenarios", args)) => {
            let window_ms = args.get_one::<u64>("window-ms").copied().unwrap_or(200);
            let config = config.with_undo_window(Duration::from_millis(window_ms));
            let reports = scenarios::run_all(&config).await;
            let passed = reports.iter().all(|r| r.passed);

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                println!("Undo & Audit Scenarios (window {window_ms}ms)");
                println!("=========================================");
                for report in &reports {
                    let status = if report.passed { "PASS" } else { "FAIL" };
                    println!("  [{status}] {} ({}ms): {}", report.name, report.elapsed_ms, report.detail);
                }
            }
            std::process::exit(if passed { 0 } else { 1 });
        }
        Some(("demo", _)) => scenarios::demo(&config).await,
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
