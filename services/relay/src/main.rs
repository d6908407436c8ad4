//! usersync relay
//!
//! Standalone driver for the user-sync listener. Reads host events as JSON
//! lines on stdin and relays the ones the forwarding policy selects:
//!
//! ```text
//! {"kind":"user","type":"REGISTER","userId":"u1","details":{"username":"ada"}}
//! {"kind":"admin","resourceType":"USER","operationType":"DELETE","resourcePath":"users/u1"}
//! ```
//!
//! Host properties are passed as `-D key=value`, environment variables fill
//! in the rest.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use usersync_events::HostEvent;
use usersync_relay::{
    Config, EventListenerProvider, EventListenerProviderFactory, UserSyncListenerFactory,
};

/// How long to wait for in-flight forwards after input ends.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "user-sync-relay", version, about = "Relay identity-server user events to a webhook")]
struct Args {
    /// Host property, e.g. `-D keycloak.realm=acme`. May be repeated.
    #[arg(short = 'D', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty property name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let properties: HashMap<String, String> = args.properties.into_iter().collect();

    // Load configuration
    let config = Config::from_properties(&properties).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting user sync relay");

    let mut factory = UserSyncListenerFactory::new();
    factory.init_with_config(config)?;
    factory.post_init();
    let listener = factory.create()?;
    info!(provider_id = factory.id(), "Listener ready");

    let received = pump(
        BufReader::new(tokio::io::stdin()),
        tokio::signal::ctrl_c(),
        |event| listener.on_host_event(&event),
    )
    .await;

    listener.close();
    factory.close();

    // Forwards are detached; give the ones in flight a chance to finish
    info!(received, "Waiting for in-flight forwards...");
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    info!("User sync relay shutdown complete");
    Ok(())
}

/// Feed JSON lines from `input` to `handle` until EOF, a read error or
/// `shutdown` resolves. Returns the number of events handled.
async fn pump<R, S, H>(input: R, shutdown: S, mut handle: H) -> u64
where
    R: AsyncBufRead + Unpin,
    S: Future,
    H: FnMut(HostEvent),
{
    let mut lines = input.lines();
    let mut received = 0u64;

    // Created once so a signal arriving between lines is not lost
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match HostEvent::from_json(line) {
                            Ok(event) => {
                                received += 1;
                                handle(event);
                            }
                            Err(e) => warn!(error = %e, "Skipping unreadable event"),
                        }
                    }
                    Ok(None) => {
                        debug!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }
        }
    }

    received
}
