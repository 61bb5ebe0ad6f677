//! Watch command - follow the live feed and keep a map session in sync.
//!
//! Reads simple commands from stdin while running:
//!
//! ```text
//! select <trip id>   select a vehicle, as if its marker was clicked
//! clear              clear the selection
//! status             print the session status
//! quit               stop and tear down the map
//! ```

use std::time::Duration;

use console::style;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trainmap::app::{AppConfig, TrainMapApp};
use trainmap::deep_link::DeepLink;

use crate::error::CliError;
use crate::runner::CliRunner;

const STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// Arguments for the watch command.
#[derive(Debug, Default)]
pub struct WatchArgs {
    pub feed: Option<String>,
    pub api: Option<String>,
    pub select: Option<String>,
}

/// A line typed on stdin.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Select(String),
    Clear,
    Status,
    Quit,
    Empty,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command {
            "" => Input::Empty,
            "select" if !rest.is_empty() => Input::Select(rest.to_string()),
            "clear" => Input::Clear,
            "status" => Input::Status,
            "quit" | "exit" => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        }
    }
}

/// Run the watch command.
pub fn run(args: WatchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("watch");

    let mut config = AppConfig::from_config_file(runner.config())
        .with_deep_link(args.select.as_deref().and_then(DeepLink::parse));
    if let Some(feed) = args.feed {
        config = config.with_feed_url(feed);
    }
    if let Some(api) = args.api {
        config = config.with_api_url(api);
    }

    println!("Feed:    {}", config.feed.url);
    println!("Backend: {}", config.api.url);
    if let Some(link) = &config.session.deep_link {
        println!("Select:  {}", link.as_str());
    }
    println!();
    println!("Commands: select <id>, clear, status, quit");
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, removing map layers...");
        shutdown_clone.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    runner.runtime().block_on(async move {
        let app = TrainMapApp::start(config)?;
        let result = interact(&app, &shutdown).await;

        let stats = app.shutdown().await?;
        println!();
        println!("{}", style("Session summary").bold());
        println!("{}", stats);
        result
    })
}

async fn interact(app: &TrainMapApp, shutdown: &CancellationToken) -> Result<(), CliError> {
    let mut lines = spawn_input_reader();
    let mut status_timer = tokio::time::interval(STATUS_INTERVAL);
    status_timer.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => return Ok(()),

            line = lines.recv() => {
                let Some(line) = line else {
                    // stdin closed, keep following the feed until Ctrl+C
                    shutdown.cancelled().await;
                    return Ok(());
                };
                match Input::parse(&line) {
                    Input::Select(id) => {
                        app.select(id.as_str()).await?;
                        println!("{} {}", style("selecting").cyan(), id);
                    }
                    Input::Clear => {
                        app.clear().await?;
                        println!("{}", style("selection cleared").cyan());
                    }
                    Input::Status => println!("{}", app.status().await?),
                    Input::Quit => return Ok(()),
                    Input::Empty => {}
                    Input::Unknown(text) => {
                        println!("{} {}", style("unknown command:").yellow(), text);
                    }
                }
            }

            _ = status_timer.tick() => {
                let status = app.status().await?;
                println!(
                    "[{}] {} vehicles, {} snapshots, feed {}",
                    style("status").dim(),
                    status.tracked,
                    status.stats.snapshots_applied,
                    status.feed
                );
            }
        }
    }
}

/// Read stdin on a plain thread; a pending read would otherwise block
/// runtime shutdown.
fn spawn_input_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_keeps_id_with_pipes() {
        assert_eq!(
            Input::parse("select 1|234|0|80|16102026"),
            Input::Select("1|234|0|80|16102026".to_string())
        );
    }

    #[test]
    fn test_parse_select_without_id_is_unknown() {
        assert_eq!(Input::parse("select"), Input::Unknown("select".to_string()));
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Input::parse("clear"), Input::Clear);
        assert_eq!(Input::parse("  status "), Input::Status);
        assert_eq!(Input::parse("quit"), Input::Quit);
        assert_eq!(Input::parse("exit"), Input::Quit);
        assert_eq!(Input::parse(""), Input::Empty);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Input::parse("zoom 3"), Input::Unknown("zoom 3".to_string()));
    }
}
