use std::process;
use std::sync::Arc;

use anyhow::Context;
use doorman::{AdmissionMonitor, DOORMAN_VERSION, Simulation};

mod args;
mod logging;

use args::{Args, USAGE, parse_args};

fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    logging::init_tracing();

    let result = if args.force_violation {
        force_violation()
    } else {
        run(args)
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(simulate(args))
}

async fn simulate(args: Args) -> anyhow::Result<()> {
    let Args {
        config, duration, ..
    } = args;
    config.validate().context("invalid simulation settings")?;
    tracing::info!(
        version = DOORMAN_VERSION,
        config = %serde_json::to_string(&config)?,
        "Opening the club"
    );

    let monitor = Arc::new(AdmissionMonitor::new(config.capacity)?);
    let simulation = Simulation::start(monitor, &config)?;
    let stop = simulation.stop_handle();
    let mut join = tokio::task::spawn_blocking(move || simulation.join());

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };

    let joined = tokio::select! {
        joined = &mut join => joined,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            stop.stop();
            join.await
        }
        _ = deadline => {
            tracing::info!("Duration elapsed");
            stop.stop();
            join.await
        }
    };

    let report = joined.context("simulation join task failed")??;
    if report.anomalies > 0 {
        tracing::warn!(anomalies = report.anomalies, "Occupants sampled inconsistent state");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Put one goth and one hipster in the same room. The monitor must terminate
/// the process before this returns.
fn force_violation() -> anyhow::Result<()> {
    let monitor = AdmissionMonitor::new(1)?;
    monitor.force_occupancy(1, 1);
    anyhow::bail!("forced violation went undetected")
}
