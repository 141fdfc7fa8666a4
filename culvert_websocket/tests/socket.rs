use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use async_tungstenite::tokio::{accept_async, accept_hdr_async};
use culvert_core::session::Role;
use culvert_websocket::{dial, Credentials, DialError, PairDialer, SocketConfig};
use culvert_core::coordinator::Dial;
use futures_util::{SinkExt, StreamExt};
use testresult::TestResult;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tungstenite::http::Uri;
use tungstenite::Message;

static TRACING: OnceLock<()> = OnceLock::new();

fn init_tracing() {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    });
}

async fn bind() -> TestResult<(TcpListener, Uri)> {
    let addr: SocketAddr = "127.0.0.1:0".parse()?;
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    let uri: Uri = format!("ws://{}:{}", bound.ip(), bound.port()).parse()?;
    Ok((listener, uri))
}

/// A dead endpoint: bound once, then dropped.
async fn dead_endpoint() -> TestResult<Uri> {
    let (listener, uri) = bind().await?;
    drop(listener);
    Ok(uri)
}

fn quick() -> SocketConfig {
    SocketConfig {
        ping_interval: Duration::from_millis(50),
        silence_window: Duration::from_millis(300),
        write_deadline: Duration::from_secs(1),
        handshake_timeout: Duration::from_secs(2),
        ..SocketConfig::default()
    }
}

#[tokio::test]
async fn round_trip_through_a_live_leg() -> TestResult {
    init_tracing();
    let (listener, uri) = bind().await?;

    tokio::spawn(async move {
        let (tcp, _peer) = listener.accept().await?;
        let mut ws = accept_async(tcp).await?;
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                ws.send(Message::Text(format!("echo:{text}"))).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    let shutdown = CancellationToken::new();
    let leg = dial(
        &uri,
        Role::Device,
        &Credentials::none(),
        &SocketConfig::default(),
        &shutdown,
    )
    .await?;

    leg.outbound().send("hello".into()).await?;
    let answer = tokio::time::timeout(Duration::from_secs(2), leg.inbound().recv()).await??;
    assert_eq!(answer, "echo:hello");

    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn cookie_credential_rides_the_handshake() -> TestResult {
    init_tracing();
    let (listener, uri) = bind().await?;
    let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _peer) = listener.accept().await?;
        let _ws = accept_hdr_async(
            tcp,
            move |request: &tungstenite::handshake::server::Request, response| {
                let cookie = request
                    .headers()
                    .get("cookie")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                let _ = seen_tx.send(cookie);
                Ok(response)
            },
        )
        .await?;
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<(), anyhow::Error>(())
    });

    let shutdown = CancellationToken::new();
    let credentials = Credentials::cookie("session=s3cr3t")?;
    let _leg = dial(&uri, Role::Cloud, &credentials, &SocketConfig::default(), &shutdown).await?;

    let cookie = tokio::time::timeout(Duration::from_secs(2), seen_rx).await??;
    assert_eq!(cookie.as_deref(), Some("session=s3cr3t"));

    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn keepalive_probes_reach_the_peer() -> TestResult {
    init_tracing();
    let (listener, uri) = bind().await?;
    let (ping_tx, ping_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _peer) = listener.accept().await?;
        let mut ws = accept_async(tcp).await?;
        let mut ping_tx = Some(ping_tx);
        while let Some(Ok(message)) = ws.next().await {
            if matches!(message, Message::Ping(_)) {
                if let Some(ping_tx) = ping_tx.take() {
                    let _ = ping_tx.send(());
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    let shutdown = CancellationToken::new();
    let _leg = dial(&uri, Role::Device, &Credentials::none(), &quick(), &shutdown).await?;

    tokio::time::timeout(Duration::from_secs(2), ping_rx).await??;
    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn silence_past_the_window_tears_the_leg_down() -> TestResult {
    init_tracing();
    let (listener, uri) = bind().await?;

    tokio::spawn(async move {
        let (tcp, _peer) = listener.accept().await?;
        // Complete the handshake, then go silent: no reads, no pongs.
        let _ws = accept_async(tcp).await?;
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<(), anyhow::Error>(())
    });

    let shutdown = CancellationToken::new();
    let leg = dial(&uri, Role::Device, &Credentials::none(), &quick(), &shutdown).await?;

    let dead = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if leg.inbound().recv().await.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(dead.is_ok(), "leg must die within the silence window");

    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn shutdown_sends_a_close_frame() -> TestResult {
    init_tracing();
    let (listener, uri) = bind().await?;
    let (close_tx, close_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _peer) = listener.accept().await?;
        let mut ws = accept_async(tcp).await?;
        let mut close_tx = Some(close_tx);
        while let Some(Ok(message)) = ws.next().await {
            if matches!(message, Message::Close(_)) {
                if let Some(close_tx) = close_tx.take() {
                    let _ = close_tx.send(());
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    let shutdown = CancellationToken::new();
    let _leg = dial(
        &uri,
        Role::Cloud,
        &Credentials::none(),
        &SocketConfig::default(),
        &shutdown,
    )
    .await?;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), close_rx).await??;
    Ok(())
}

#[tokio::test]
async fn closed_queue_sends_a_close_frame() -> TestResult {
    init_tracing();
    let (listener, uri) = bind().await?;
    let (close_tx, close_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _peer) = listener.accept().await?;
        let mut ws = accept_async(tcp).await?;
        let mut close_tx = Some(close_tx);
        while let Some(Ok(message)) = ws.next().await {
            if matches!(message, Message::Close(_)) {
                if let Some(close_tx) = close_tx.take() {
                    let _ = close_tx.send(());
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    let shutdown = CancellationToken::new();
    let leg = dial(
        &uri,
        Role::Device,
        &Credentials::none(),
        &SocketConfig::default(),
        &shutdown,
    )
    .await?;

    // Dropping the only handle closes the outbound queue.
    drop(leg);
    tokio::time::timeout(Duration::from_secs(2), close_rx).await??;

    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn refused_dial_reports_an_error() -> TestResult {
    init_tracing();
    let uri = dead_endpoint().await?;

    let shutdown = CancellationToken::new();
    let refused = dial(
        &uri,
        Role::Cloud,
        &Credentials::none(),
        &SocketConfig::default(),
        &shutdown,
    )
    .await;
    assert!(matches!(refused, Err(DialError::WebSocket(_))));
    Ok(())
}

#[tokio::test]
async fn pair_dialer_establishes_both_legs() -> TestResult {
    init_tracing();
    let (cloud_listener, cloud_uri) = bind().await?;
    let (device_listener, device_uri) = bind().await?;

    for listener in [cloud_listener, device_listener] {
        tokio::spawn(async move {
            let (tcp, _peer) = listener.accept().await?;
            let mut ws = accept_async(tcp).await?;
            while ws.next().await.is_some() {}
            Ok::<(), anyhow::Error>(())
        });
    }

    let shutdown = CancellationToken::new();
    let dialer = PairDialer::new(
        device_uri,
        cloud_uri,
        Credentials::none(),
        SocketConfig::default(),
        shutdown.clone(),
    );

    let pair = dialer.dial().await?;
    assert_eq!(pair.device.role(), Role::Device);
    assert_eq!(pair.cloud.role(), Role::Cloud);

    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn device_dial_failure_closes_the_cloud_leg() -> TestResult {
    init_tracing();
    let (cloud_listener, cloud_uri) = bind().await?;
    let device_uri = dead_endpoint().await?;
    let (close_tx, close_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _peer) = cloud_listener.accept().await?;
        let mut ws = accept_async(tcp).await?;
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                _ => {}
            }
        }
        let _ = close_tx.send(());
        Ok::<(), anyhow::Error>(())
    });

    let shutdown = CancellationToken::new();
    let dialer = PairDialer::new(
        device_uri,
        cloud_uri,
        Credentials::none(),
        SocketConfig::default(),
        shutdown.clone(),
    );

    assert!(dialer.dial().await.is_err());
    tokio::time::timeout(Duration::from_secs(2), close_rx).await??;
    Ok(())
}
