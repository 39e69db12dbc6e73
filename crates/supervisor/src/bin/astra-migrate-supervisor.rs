//! Supervisor CLI entry point: `status`, `stop`, `check-migration`, or (with
//! no subcommand) starts the watch loop that spawns and restarts the
//! orchestrator.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use supervisor::{Supervisor, SupervisorConfig, WatchOutcome};

#[derive(Parser)]
#[command(name = "astra-migrate-supervisor", about = "Watchdog for the astra-migrate orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding the journal's local state files.
    #[arg(long, default_value = "/var/lib/astra-migrate")]
    state_dir: PathBuf,

    /// Path to the orchestrator binary to spawn.
    #[arg(long, default_value = "astra-migrate")]
    orchestrator_path: PathBuf,

    /// Configuration file forwarded to the orchestrator as `--config`.
    #[arg(long, default_value = "/etc/astra-migrate/config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (info, then debug).
    #[arg(short, action = clap::ArgAction::Count)]
    v: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the current supervisor projection as JSON and exits 0.
    Status,
    /// Signals the running supervisor to stop.
    Stop,
    /// Exits 0 if the journal shows terminal success, 1 otherwise.
    CheckMigration,
}

fn main() {
    let cli = Cli::parse();
    logging::init(logging::Verbosity::from_flag_count(cli.v));

    let projection_path = cli.state_dir.join("supervisor_projection.json");
    let pid_path = cli.state_dir.join("supervisor.pid");

    let code = match cli.command {
        Some(Command::Status) => match supervisor::status_json(&projection_path) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(e) => {
                eprintln!("{e}");
                1
            }
        },
        Some(Command::Stop) => match supervisor::stop(&pid_path) {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                eprintln!("{e}");
                1
            }
        },
        Some(Command::CheckMigration) => i32::from(!supervisor::check_migration(&projection_path)),
        None => run_watch_loop(&cli, &projection_path, &pid_path),
    };

    std::process::exit(code);
}

fn run_watch_loop(cli: &Cli, projection_path: &std::path::Path, pid_path: &std::path::Path) -> i32 {
    if let Err(e) = std::fs::create_dir_all(&cli.state_dir) {
        eprintln!("failed to create state directory {}: {e}", cli.state_dir.display());
        return 1;
    }
    let _pid_file = match platform::PidFile::write(pid_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let stop_flag = match platform::install_termination_flag() {
        Ok(flag) => flag,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let config = SupervisorConfig {
        orchestrator_path: cli.orchestrator_path.clone(),
        orchestrator_args: vec!["--config".to_string(), cli.config.display().to_string()],
        projection_path: projection_path.to_path_buf(),
        pid_path: pid_path.to_path_buf(),
    };

    let mut sup = Supervisor::new(config);
    let outcome = sup.watch(
        || stop_flag.load(std::sync::atomic::Ordering::SeqCst),
        std::thread::sleep,
    );

    match outcome {
        Ok(WatchOutcome::Success | WatchOutcome::CompletedAfterRestarts) => 0,
        Ok(WatchOutcome::SignalledStop) => 0,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}
