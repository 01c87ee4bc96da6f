use anyhow::{Context, Result};
use beacon::{Tracker, TrackerConfig};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use transport::{Http, Transport};

mod cli;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn init_logging() {
    let _ = pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("SENDLOG_LOG")
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let matches = cli::command().get_matches();
    let opts = cli::parse(&matches)?;

    let mut config = TrackerConfig::from_env()?;
    if let Some(origin) = &opts.origin {
        config = config.with_origin(origin)?;
    }
    if opts.redirect.is_some() {
        config.redirect_url = opts.redirect.clone();
    }
    config.debug |= opts.debug;

    let mut http = Http::current().context("failed to initialize transport")?;
    if let Some(origin) = &config.origin {
        http = http.with_base(origin.clone());
    }

    log::info!("sending through {} transport", http.name());
    #[cfg(debug_assertions)]
    log::debug!("tracker config: {config:?}");

    let tracker = Tracker::builder(Arc::new(http)).config(config).build();
    tracker.create(opts.url.as_str(), opts.globals).send(opts.params);

    let deadline = Instant::now() + opts.wait;
    while tracker.in_flight() > 0 && Instant::now() < deadline {
        sleep(POLL_INTERVAL).await;
    }

    match tracker.in_flight() {
        0 => log::info!("beacon settled"),
        n => log::warn!("{n} beacon(s) still in flight after {:?}", opts.wait),
    }

    Ok(())
}
