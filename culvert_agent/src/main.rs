//! Bridge agent binary: config, device auth, and the tunnel run loop.

mod auth;
mod catalog;
mod config;
mod upload;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use culvert_core::bridge::RpcBridge;
use culvert_core::coordinator::Coordinator;
use culvert_core::relay::FrameRelay;
use culvert_websocket::{Credentials, PairDialer, SocketConfig};
use tokio_util::sync::CancellationToken;
use tungstenite::http::Uri;

use crate::config::Config;
use crate::upload::HttpFileRelay;

#[derive(Debug, Parser)]
#[command(version, about = "Bridges a private device controller to a cloud relay")]
struct Arguments {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Use the debug endpoints from the configuration.
    #[arg(long)]
    debug: bool,

    /// Forward frames without interpreting them.
    #[arg(long)]
    passthrough: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Arguments::parse();
    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let hostname = config.hostname(args.debug).to_string();

    let plain = reqwest::Client::new();
    let token = match config.token.clone() {
        None => {
            let code = auth::fetch_device_code(&plain, &hostname)
                .await
                .context("fetching device code")?;
            println!(
                "Authorize this device at {} with code {}",
                code.verification_url, code.user_code
            );
            let token = auth::poll_token(&plain, &hostname, &code)
                .await
                .context("waiting for authorization")?;
            config
                .store_token(&args.config, token.clone())
                .context("storing token")?;
            token
        }
        Some(stored) => {
            let token = auth::refresh_token(&plain, &hostname, &stored)
                .await
                .context("refreshing token")?;
            config
                .store_token(&args.config, token.clone())
                .context("storing token")?;
            token
        }
    };

    let (client, cookie) = auth::establish_session(&hostname, &token)
        .await
        .context("establishing session")?;
    let credentials = Credentials::cookie(&cookie).context("building dial credentials")?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_ok() {
                    match hits.fetch_add(1, Ordering::Relaxed) {
                        0 => {
                            eprintln!(
                                "Ctrl+C — attempting graceful shutdown… (press again to force)"
                            );
                            shutdown.cancel();
                        }
                        _ => {
                            eprintln!("Force exiting.");
                            std::process::exit(130);
                        }
                    }
                }
            }
        });
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let t = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut term) = signal(SignalKind::terminate()) {
                term.recv().await;
                eprintln!("SIGTERM — graceful shutdown…");
                t.cancel();
            }
        });
    }

    let device: Uri = config
        .moonraker_ws
        .parse()
        .context("parsing device endpoint")?;
    let cloud: Uri = config
        .upstream(args.debug)
        .parse()
        .context("parsing cloud endpoint")?;
    let dialer = PairDialer::new(
        device,
        cloud,
        credentials,
        SocketConfig::default(),
        shutdown.clone(),
    );

    if args.passthrough {
        Coordinator::new(dialer, FrameRelay, shutdown).run().await;
    } else {
        let relay = HttpFileRelay::new(client, config.moonraker_http.clone(), hostname);
        let bridge = RpcBridge::new(catalog::method_table(), relay);
        Coordinator::new(dialer, bridge, shutdown).run().await;
    }

    tracing::info!("agent stopped");
    Ok(())
}
