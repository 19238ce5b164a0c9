//! WebSocket transport for web terminals.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use term_bridge_core::{EmitError, ErrorCode, ErrorPayload, EventEmitter, events};
use term_bridge_session::{ClientConnection, SessionOrchestrator};
use tokio::sync::mpsc;

use crate::protocol::{EventFrame, FrameError};

/// Default bound on frames queued for one client.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// WebSocket handler state.
#[derive(Clone)]
pub struct WsState {
    pub orchestrator: SessionOrchestrator,
    /// Frames queued per client before emitters wait.
    pub outbound_capacity: usize,
}

impl WsState {
    #[must_use]
    pub const fn new(orchestrator: SessionOrchestrator, outbound_capacity: usize) -> Self {
        Self {
            orchestrator,
            outbound_capacity,
        }
    }
}

/// Emits events into a client's bounded outbound queue.
#[derive(Clone)]
pub struct WsEmitter {
    tx: mpsc::Sender<EventFrame>,
}

impl WsEmitter {
    #[must_use]
    pub const fn new(tx: mpsc::Sender<EventFrame>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventEmitter for WsEmitter {
    async fn emit(&self, event: &str, data: Option<Value>) -> Result<(), EmitError> {
        self.tx
            .send(EventFrame::new(event, data))
            .await
            .map_err(|_| EmitError::Disconnected)
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<EventFrame>(state.outbound_capacity.max(1));

    // Forward queued frames to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.to_text() {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let emitter = WsEmitter::new(tx);
    let client = state
        .orchestrator
        .connect_client(Arc::new(emitter.clone()))
        .await;
    let registry = state.orchestrator.registry();
    let active = registry.len().await;
    tracing::debug!(client_id = %client.id(), active_sessions = active, "websocket attached");

    serve_client(&client, &emitter, receiver).await;

    client.handle_event(events::DISCONNECTION, None).await;
    send_task.abort();
    let active = registry.len().await;
    tracing::info!(client_id = %client.id(), active_sessions = active, "websocket closed");
}

/// Dispatch inbound messages to the client's handlers until the socket closes.
///
/// Handlers run one at a time in arrival order.
async fn serve_client<S, E>(client: &ClientConnection, emitter: &WsEmitter, mut inbound: S)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(msg) = inbound.next().await {
        let frame = match decode(msg) {
            Inbound::Frame(frame) => frame,
            Inbound::Skip => continue,
            Inbound::Closed => break,
            Inbound::Invalid(e) => {
                tracing::warn!(client_id = %client.id(), "Invalid client frame: {e}");
                let payload = ErrorPayload::new(ErrorCode::InvalidRequest, e.to_string());
                if emitter.emit(events::ERROR, Some(payload.to_value())).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if frame.event == events::DISCONNECTION {
            tracing::debug!(client_id = %client.id(), "ignoring reserved event from client");
            continue;
        }
        client.handle_event(&frame.event, frame.data).await;
    }
}

#[derive(Debug)]
enum Inbound {
    Frame(EventFrame),
    Invalid(FrameError),
    Skip,
    Closed,
}

fn decode<E: std::fmt::Display>(msg: Result<Message, E>) -> Inbound {
    match msg {
        Ok(Message::Text(text)) => EventFrame::parse(text.as_str()).map_or_else(Inbound::Invalid, Inbound::Frame),
        Ok(Message::Binary(data)) => EventFrame::parse_bytes(&data).map_or_else(Inbound::Invalid, Inbound::Frame),
        Ok(Message::Close(_)) => Inbound::Closed,
        Ok(_) => Inbound::Skip,
        Err(e) => {
            tracing::warn!("WebSocket error: {e}");
            Inbound::Closed
        }
    }
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(orchestrator, DEFAULT_OUTBOUND_CAPACITY));
/// ```
#[must_use]
pub fn create_ws_router(orchestrator: SessionOrchestrator, outbound_capacity: usize) -> axum::Router {
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(WsState::new(orchestrator, outbound_capacity))
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::CloseFrame;
    use serde_json::json;
    use term_bridge_core::{
        BackendError, ExecBackend, ExecRequest, ExecTarget, RemoteProcess,
    };
    use term_bridge_session::SessionConfig;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    struct NoPods;

    #[async_trait]
    impl ExecBackend for NoPods {
        async fn resolve(&self, target: &ExecTarget) -> Result<(), BackendError> {
            Err(BackendError::NotFound(target.to_string()))
        }

        async fn open(&self, _request: &ExecRequest) -> Result<Box<dyn RemoteProcess>, BackendError> {
            Err(BackendError::Open("unreachable".into()))
        }
    }

    fn text(s: &str) -> Result<Message, String> {
        Ok(Message::Text(s.to_string().into()))
    }

    fn drain(rx: &mut mpsc::Receiver<EventFrame>) -> Vec<EventFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_decode() {
        assert!(matches!(
            decode(text(r#"{"event":"term:stdin","data":"a"}"#)),
            Inbound::Frame(f) if f.event == "term:stdin"
        ));
        assert!(matches!(decode(text("{")), Inbound::Invalid(_)));
        assert!(matches!(
            decode::<String>(Ok(Message::Binary(br#"{"event":"x"}"#.to_vec().into()))),
            Inbound::Frame(_)
        ));
        assert!(matches!(
            decode::<String>(Ok(Message::Close(Some(CloseFrame {
                code: 1000,
                reason: "bye".into(),
            })))),
            Inbound::Closed
        ));
        assert!(matches!(
            decode::<String>(Ok(Message::Ping(Vec::new().into()))),
            Inbound::Skip
        ));
        assert!(matches!(decode::<String>(Err("reset".into())), Inbound::Closed));
    }

    #[tokio::test]
    async fn test_emitter_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let emitter = WsEmitter::new(tx);
        assert!(matches!(
            emitter.emit(events::STDOUT, Some(json!("x"))).await,
            Err(EmitError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_emitter_waits_when_queue_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let emitter = WsEmitter::new(tx);
        emitter.emit(events::STDOUT, Some(json!("a"))).await.unwrap();

        let mut blocked = task::spawn(emitter.emit(events::STDOUT, Some(json!("b"))));
        assert_pending!(blocked.poll());

        assert_eq!(rx.recv().await.unwrap().data, Some(json!("a")));
        assert!(blocked.is_woken());
        assert_ready!(blocked.poll()).unwrap();
        assert_eq!(rx.recv().await.unwrap().data, Some(json!("b")));
    }

    #[tokio::test]
    async fn test_serve_client_dispatches_until_close() {
        let orchestrator = SessionOrchestrator::new(Arc::new(NoPods), SessionConfig::default());
        let (tx, mut rx) = mpsc::channel(16);
        let emitter = WsEmitter::new(tx);
        let client = orchestrator.connect_client(Arc::new(emitter.clone())).await;

        let inbound = futures::stream::iter(vec![
            text("garbage"),
            text(r#"{"event":"term:connect","data":{"pod":"mongo-0"}}"#),
            Ok(Message::Close(None)),
            text(r#"{"event":"term:connect","data":{"pod":"never-seen"}}"#),
        ]);
        serve_client(&client, &emitter, inbound).await;

        let frames = drain(&mut rx);
        let names: Vec<&str> = frames.iter().map(|f| f.event.as_str()).collect();
        assert_eq!(names, vec![events::OPEN, events::ERROR, events::ERROR]);
        assert_eq!(frames[1].data.as_ref().unwrap()["code"], "invalid_request");
        assert_eq!(frames[2].data.as_ref().unwrap()["code"], "target_not_found");
        assert_eq!(orchestrator.registry().len().await, 0);
    }
}
