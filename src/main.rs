#![forbid(unsafe_code)]

use anyhow::Result;
use log::{error, info};
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use fanmon::models::MonitorConfiguration;
use fanmon::monitor::{self, Monitor, MonitorContext};
use fanmon::{cli, config, logging, output};

fn main() -> Result<()> {
    let args = cli::parse_args()?;
    logging::init_logger(args.verbosity)?;

    let file = config::load_config_file(args.config_path.as_deref())?;
    let config = config::resolve(file.as_ref(), |key| std::env::var(key).ok(), &args.overrides)?;

    let own_pid = std::process::id() as i32;
    let context = MonitorContext::from_configuration(&config, own_pid)?;

    let channel = monitor::open_channel(&config)?;

    // Set up interrupt handling
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;

    if !config.quiet {
        print_banner(&config);
    }

    let mut monitor = Monitor::new(channel, context, io::stdout().lock(), io::stderr());
    let summary = match monitor.run(&shutdown) {
        Ok(summary) => summary,
        Err(err) => {
            error!("monitoring aborted: {err:#}");
            return Err(err);
        }
    };

    info!("{summary:?}");
    if !config.quiet {
        eprint!("{}", output::format_summary(&summary));
    }
    Ok(())
}

fn print_banner(config: &MonitorConfiguration) {
    eprintln!(
        "Watching {} ({}) for {}. Press Ctrl+C to stop.",
        config.mount_point.display(),
        config.scope.as_str(),
        config.events.names().join(", ")
    );
}
