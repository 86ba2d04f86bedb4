use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyping::headless::run_headless;
use rustyping::monitor::{
    init_logging, spawn_sinks, Config, CsvLog, LogTarget, NoticeBoard, SampleSink, Scheduler,
    Session, SessionSettings, Target,
};
use rustyping::probe::build_prober;
use rustyping::tui::{Dashboard, Theme};
use std::io::{self, IsTerminal};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

fn main() {
    // Parse CLI arguments
    let config = Config::parse();

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let headless = config.no_tui || !io::stdout().is_terminal();

    // The dashboard owns the terminal, so logs go to a file or nowhere
    let log_target = match (&config.log_file, headless) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, true) => LogTarget::Stderr,
        (None, false) => LogTarget::Discard,
    };
    if let Err(e) = init_logging(&config.log_level, config.is_json_format(), log_target) {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config, headless)) {
        error!(error = %e, "RustyPing failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config, headless: bool) -> Result<()> {
    let mut targets = Vec::with_capacity(config.targets.len());
    for address in &config.targets {
        let target = Target::resolve(address)
            .await
            .with_context(|| format!("Cannot probe {}", address))?;
        targets.push(target);
    }

    let notices = Arc::new(NoticeBoard::new());
    let prober = build_prober(config.mode, config.port, &targets, &notices)
        .context("Failed to set up probing")?;
    let session = Session::new(targets, prober, Arc::clone(&notices), SessionSettings::from(&config));

    let csv = config
        .csv
        .as_deref()
        .map(CsvLog::open)
        .transpose()
        .context("Failed to open CSV log")?;

    info!(
        targets = session.targets().len(),
        method = %session.method(),
        interval_ms = config.interval.as_millis(),
        headless,
        "RustyPing starting"
    );

    if headless {
        if let Some(notice) = notices.current() {
            eprintln!("{}", notice.as_str().yellow());
        }
        run_headless(session, csv).await?;
        return Ok(());
    }

    run_dashboard(session, csv, &config).await
}

async fn run_dashboard(session: Arc<Session>, csv: Option<CsvLog>, config: &Config) -> Result<()> {
    let (scheduler, sink_task) = match csv {
        Some(csv) => {
            let (tx, rx) = mpsc::unbounded_channel();
            let sinks: Vec<Box<dyn SampleSink>> = vec![Box::new(csv)];
            (
                Scheduler::new(Arc::clone(&session)).with_sink(tx),
                Some(spawn_sinks(rx, sinks)),
            )
        }
        None => (Scheduler::new(Arc::clone(&session)), None),
    };

    let signals = session.spawn_signal_handler();
    let probes = scheduler.spawn();

    let dashboard = Dashboard::new(
        Arc::clone(&session),
        Theme::select(config.monotone),
        config.frame_interval(),
    );
    let result = dashboard.run().await;

    session.shutdown();
    probes.join().await;
    if let Err(e) = signals.await {
        warn!(error = %e, "Signal handler ended abnormally");
    }
    if let Some(sink_task) = sink_task {
        if let Err(e) = sink_task.await {
            warn!(error = %e, "CSV output ended abnormally");
        }
    }
    debug!(runtime_ms = session.runtime().as_millis(), "Dashboard session ended");

    result.context("Dashboard failed")
}
