//! Watch directories and print changes until interrupted

use crate::{output, util};
use anyhow::{Context, Result};
use dirwatch::{ChangeKind, WatchSession};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::{debug, info};

pub struct WatchOptions {
    pub paths: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub no_recursive: bool,
    pub kinds: Vec<ChangeKind>,
    pub count: Option<usize>,
}

pub async fn run(options: WatchOptions) -> Result<()> {
    // 1. Resolve configuration, command line flags win
    let (mut config, source) = util::load_config(options.config.as_deref())?;
    if let Some(source) = source {
        debug!("Using config {}", source.display());
    }
    if options.no_recursive {
        config.recursive = false;
    }
    if !options.kinds.is_empty() {
        config.kinds = options.kinds.clone();
    }

    // 2. Register roots
    let mut session = WatchSession::new().context("Failed to start watch session")?;
    for path in &options.paths {
        session
            .apply_config(path, &config)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }
    eprintln!(
        "{} {} ({} directories)",
        "Watching".green().bold(),
        options
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        session.registration_count()
    );

    // 3. Ctrl-C closes the session, which unblocks the take() loop
    let handle = session.close_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, closing watch session");
            handle.close();
        }
    });

    let limit = options.count;
    let printed = tokio::task::spawn_blocking(move || pump(session, limit))
        .await
        .context("Watch loop panicked")??;
    ctrl_c.abort();

    eprintln!("{} {} events", "Stopped after".dimmed(), printed);
    Ok(())
}

/// Print events until the session closes or `limit` events were printed
fn pump(mut session: WatchSession, limit: Option<usize>) -> Result<usize> {
    let mut printed = 0;

    loop {
        let events = match session.take() {
            Ok(events) => events,
            Err(e) if e.is_closed() => break,
            Err(e) => return Err(e.into()),
        };

        for event in &events {
            println!("{}", output::format_event(event));
            printed += 1;

            if limit.is_some_and(|n| printed >= n) {
                session.close()?;
                return Ok(printed);
            }
        }
    }

    Ok(printed)
}
