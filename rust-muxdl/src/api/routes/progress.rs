//! Mux progress over WebSocket.
//!
//! Every connected client receives each progress event as a JSON text frame,
//! `{"progress": <percent>}`. Events published before a client connects are
//! not replayed.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::server::AppState;
use crate::pipeline::ProgressEvent;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(progress_ws))
}

async fn progress_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the upgrade so nothing published in between is lost.
    let rx = state.download_service.progress().subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(socket: WebSocket, mut progress_rx: broadcast::Receiver<ProgressEvent>) {
    let (mut sender, mut receiver) = socket.split();
    debug!("Progress subscriber connected");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            result = progress_rx.recv() => {
                match result {
                    Ok(event) => {
                        let text = match encode_event(&event) {
                            Some(text) => text,
                            None => continue,
                        };
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Too slow; skip what was missed.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        }
    }
    debug!("Progress subscriber disconnected");
}

fn encode_event(event: &ProgressEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "Cannot encode progress event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_support;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[test]
    fn test_encode_event() {
        assert_eq!(
            encode_event(&ProgressEvent::new(37.5)).as_deref(),
            Some(r#"{"progress":37.5}"#)
        );
    }

    #[tokio::test]
    async fn test_plain_get_is_not_upgraded() {
        let dir = TempDir::new().unwrap();
        let (state, _) = test_support::state(dir.path());
        let app = Router::new().nest("/api/progress", router()).with_state(state);

        let response = app
            .oneshot(Request::builder().uri("/api/progress").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert!(response.status().is_client_error());
    }
}
