//! One WebSocket connection, from dial to close.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval, interval_at},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::ORIGIN},
        protocol::Message,
    },
};

use crate::{
    batcher::FLUSH_INTERVAL,
    clock::SMOOTHING_STEP_INTERVAL,
    config::ClientConfig,
    engine::{Engine, Intent, PING_INTERVAL},
    error::ClientError,
};

/// How long a closing connection may take to flush its Close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run one connection attempt to completion.
///
/// Intents keep being served while dialing and while connected. Every exit
/// path goes through [`Engine::on_close`]; its reconnect delay is returned.
pub(crate) async fn run_session(
    engine: &mut Engine,
    intents: &mut mpsc::UnboundedReceiver<Intent>,
) -> Option<Duration> {
    let request = match build_request(engine.config()) {
        Ok(request) => request,
        Err(e) => {
            engine.on_transport_error(&e.to_string());
            return engine.on_close(Some(e.to_string()));
        }
    };

    let connect = connect_async(request);
    tokio::pin!(connect);
    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    let error = ClientError::Connection(e.to_string());
                    engine.on_transport_error(&error.to_string());
                    return engine.on_close(Some(error.to_string()));
                }
            },
            intent = intents.recv() => {
                if !serve_intent(engine, intent) {
                    tracing::info!("Connection attempt cancelled");
                    return engine.on_close(None);
                }
            }
        }
    };

    let (write, mut read) = ws_stream.split();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel::<String>();
    let mut writer = tokio::spawn(write_loop(write, outbox_rx));
    engine.on_open(outbox_tx);

    // The first ping went out with the handshake
    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    let mut flush = interval(FLUSH_INTERVAL);
    let mut smoothing = interval(SMOOTHING_STEP_INTERVAL);
    smoothing.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut was_smoothing = false;

    let reason = loop {
        let smoothing_now = engine.is_smoothing();
        if smoothing_now && !was_smoothing {
            smoothing.reset();
        }
        was_smoothing = smoothing_now;

        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => engine.on_frame(text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Server closed the connection");
                    break frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|reason| !reason.is_empty());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let error = ClientError::Transport(e.to_string());
                    engine.on_transport_error(&error.to_string());
                    break Some(error.to_string());
                }
                None => break Some("connection closed".to_string()),
            },
            intent = intents.recv() => {
                if !serve_intent(engine, intent) {
                    break None;
                }
            }
            _ = ping.tick() => engine.on_ping_tick(),
            _ = flush.tick() => engine.on_flush_tick(),
            _ = smoothing.tick(), if smoothing_now => {
                engine.on_smoothing_tick();
            }
        }
    };

    // Dropping the outbox lets the writer send Close and finish
    let delay = engine.on_close(reason);
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Writer task failed: {}", e),
        Err(_) => {
            tracing::warn!("Timed out closing the connection");
            writer.abort();
        }
    }
    delay
}

/// Apply one intent. Returns `false` when the connection must end.
fn serve_intent(engine: &mut Engine, intent: Option<Intent>) -> bool {
    match intent {
        Some(intent) => {
            engine.handle_intent(intent);
            engine.can_connect()
        }
        None => {
            tracing::info!("All client handles dropped, shutting down");
            engine.shutdown();
            false
        }
    }
}

fn build_request(config: &ClientConfig) -> Result<Request, ClientError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ClientError::Connection(e.to_string()))?;

    if let Some(origin) = &config.origin {
        let value = HeaderValue::from_str(origin)
            .map_err(|e| ClientError::Connection(format!("invalid origin: {}", e)))?;
        request.headers_mut().insert(ORIGIN, value);
    }

    Ok(request)
}

/// Forward outbound frames to the socket until the outbox is dropped.
async fn write_loop<S>(mut sink: S, mut outbox: mpsc::UnboundedReceiver<String>)
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(json) = outbox.recv().await {
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            tracing::warn!("Failed to send frame: {}", e);
            return;
        }
    }

    if let Err(e) = sink.send(Message::Close(None)).await {
        tracing::debug!("Failed to send close frame: {}", e);
    }
    if let Err(e) = sink.close().await {
        tracing::debug!("Failed to close the socket: {}", e);
    }
}
