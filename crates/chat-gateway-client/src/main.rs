//! Gateway replay tool
//!
//! Feeds recorded gateway frames (one JSON frame per line) through a
//! `GatewayConnection` and logs every event as the delivery queue releases
//! it. Useful for checking how a queue configuration copes with a captured
//! out-of-order stream.
//!
//! Run with:
//! ```bash
//! GATEWAY_QUEUE_ENABLE_BUFFERING=true cargo run -p chat-gateway-client -- frames.ndjson
//! ```
//!
//! Reads stdin when no file is given. Configuration is loaded from
//! environment variables.

use anyhow::Context;
use chat_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use chat_gateway_client::connection::GatewayConnection;
use chat_gateway_client::protocol::RecoveryAction;
use chat_gateway_client::queue::{handler_fn, provider_for, SequencedPayload};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Time given to the dispatch worker to finish after the input ends
const SETTLE_GRACE: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Replay failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Failed to load configuration")?;

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        buffering = config.queue.enable_buffering,
        capacity = config.queue.buffer_capacity,
        overflow = %config.queue.overflow_strategy,
        timeout = %config.queue.timeout_strategy,
        "Configuration loaded"
    );

    let provider = provider_for(&config.queue)?;
    let handler = handler_fn(|payload: SequencedPayload| async move {
        info!(
            sequence = payload.sequence(),
            event = payload.event_type().unwrap_or("?"),
            "Delivered"
        );
        Ok(())
    });
    let mut connection = GatewayConnection::new(provider, handler)?;
    let token = config.gateway.token.clone().unwrap_or_default();

    match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {path}"))?;
            replay(&mut connection, BufReader::new(file), &token).await?;
        }
        None => replay(&mut connection, BufReader::new(tokio::io::stdin()), &token).await?,
    }

    let settle = config.queue.wait_timeout.unwrap_or_default() + SETTLE_GRACE;
    tokio::time::sleep(settle).await;
    if let Some(request) = connection.try_reconnect_request().await {
        warn!(reason = %request.reason, "Queue asked for a full reconnect");
    }

    connection.shutdown().await;
    info!("Replay finished");
    Ok(())
}

async fn replay<R>(connection: &mut GatewayConnection, reader: R, token: &str) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }

        let action = match connection.handle_frame(frame).await {
            Ok(action) => action,
            Err(e) => {
                warn!(line = line_no, error = %e, "Frame rejected");
                continue;
            }
        };

        if let Some(request) = connection.try_reconnect_request().await {
            warn!(line = line_no, reason = %request.reason, "Queue asked for a full reconnect");
        }

        match action {
            Some(RecoveryAction::Resume) => match connection.begin_resume(token).await? {
                Some(resume) => info!(
                    line = line_no,
                    session_id = %resume.session_id,
                    seq = resume.seq,
                    "Would resume"
                ),
                None => info!(line = line_no, "Nothing to resume, would identify"),
            },
            Some(RecoveryAction::FullReconnect) => {
                info!(line = line_no, "Would reconnect and identify");
            }
            Some(RecoveryAction::Terminate) => {
                warn!(line = line_no, "Gateway ended the session for good");
                break;
            }
            None => {}
        }
    }
    Ok(())
}
