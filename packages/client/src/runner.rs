//! Engine task: connection loop with reconnection support.

use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};

use crate::{
    engine::{Engine, Intent},
    session::run_session,
};

/// Drive `engine` until it is shut down or every handle is dropped.
pub(crate) async fn run_engine(mut engine: Engine, mut intents: mpsc::UnboundedReceiver<Intent>) {
    while !engine.is_shut_down() {
        if !engine.wants_connection() {
            match intents.recv().await {
                Some(intent) => engine.handle_intent(intent),
                None => engine.shutdown(),
            }
            continue;
        }

        engine.begin_connecting();
        let Some(delay) = run_session(&mut engine, &mut intents).await else {
            continue;
        };

        // Keep serving intents while waiting; a stop cancels the reconnect
        let wake_at = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(wake_at) => break,
                intent = intents.recv() => match intent {
                    Some(intent) => {
                        engine.handle_intent(intent);
                        if !engine.can_connect() {
                            tracing::info!("Reconnect cancelled");
                            break;
                        }
                    }
                    None => {
                        engine.shutdown();
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("Client engine stopped");
}
