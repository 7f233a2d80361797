use color_eyre::Result;
use devwheel_core::{BuildOptions, CommandStatus, Config, ExecutionOutcome};
use serde_json::json;

mod cli;

use clap::Parser;
use cli::{CommandArgs, DevwheelCli};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = DevwheelCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let outcome = execute(&cli.command);
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = log_level(trace, verbose);

    let filter = format!("devwheel={level},devwheel_core={level},devwheel_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn log_level(trace: bool, verbose: u8) -> &'static str {
    if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn execute(command: &CommandArgs) -> ExecutionOutcome {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            return ExecutionOutcome::user_error(
                format!("{err:#}"),
                json!({ "reason": "invalid_environment" }),
            )
        }
    };
    let result = match command {
        CommandArgs::Editable(args) => devwheel_core::build_editable(&BuildOptions::from(args), &config),
        CommandArgs::DistInfo(args) => devwheel_core::write_dist_info(&BuildOptions::from(args), &config),
    };
    result.unwrap_or_else(|err| {
        tracing::debug!(error = ?err, "command failed");
        ExecutionOutcome::failure(format!("{err:#}"), json!({ "reason": "build_failed" }))
    })
}

fn emit_output(cli: &DevwheelCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    if cli.json {
        let payload = json!({
            "status": outcome.status,
            "message": outcome.message,
            "details": outcome.details,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if outcome.status == CommandStatus::Ok {
        if !cli.quiet {
            println!("{}", outcome.message);
        }
    } else {
        eprintln!("error: {}", outcome.message);
    }
    Ok(code)
}
