//! Session orchestrator: turns client events into remote terminal sessions.
//!
//! A session moves through `Validating → Opening → Streaming → Terminated`.
//! Validation and target resolution run inline in the connect handler; the
//! exec stream is opened and driven by one spawned task per session.

use std::sync::Arc;

use serde_json::Value;
use term_bridge_core::{
    BackendError, ClientId, ConnectRequest, ErrorCode, ErrorPayload, EventEmitter, EventSink,
    ExecBackend, ExecRequest, ExecTarget, ExitStatus, RequestError, ResizeRequest, SessionId,
    StreamKind, events,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    SessionConfig, SessionRegistry,
    config::ConnectPolicy,
    registry::{Reservation, Reserved},
    stream::{self, StreamEnd, StreamError, StreamOptions},
};

/// Why a `term:connect` did not start a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid connect request: {0}")]
    Invalid(#[from] RequestError),
    #[error("Session already running: {0}")]
    SessionActive(SessionId),
    #[error("Target resolution failed: {0}")]
    Resolve(#[from] BackendError),
}

/// How a spawned session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The exec stream could not be opened.
    OpenFailed(BackendError),
    /// The client went away before `term:connected` could be delivered.
    ClientGone,
    /// The remote stream ended on its own.
    Completed(ExitStatus),
    /// The session was aborted by disconnect or replacement.
    Aborted,
    /// The stream loop failed.
    Failed(StreamError),
}

/// Handle to a spawned session task.
#[derive(Debug)]
pub struct SessionTask {
    pub session_id: SessionId,
    pub handle: JoinHandle<SessionOutcome>,
}

struct Inner {
    backend: Arc<dyn ExecBackend>,
    registry: SessionRegistry,
    config: SessionConfig,
}

/// Opens remote sessions on behalf of connected clients.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    /// Create an orchestrator over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ExecBackend>, config: SessionConfig) -> Self {
        let registry = SessionRegistry::new(config.stdin_capacity, config.resize_capacity);
        Self {
            inner: Arc::new(Inner {
                backend,
                registry,
                config,
            }),
        }
    }

    /// Register a newly connected client and send it `open`.
    pub async fn connect_client(&self, emitter: Arc<dyn EventEmitter>) -> ClientConnection {
        let client = ClientConnection {
            id: Uuid::new_v4(),
            emitter,
            inner: Arc::clone(&self.inner),
        };
        tracing::info!(client_id = %client.id, "client connected");
        if let Err(e) = client.emitter.emit(events::OPEN, None).await {
            tracing::warn!(client_id = %client.id, "Failed to send open: {e}");
        }
        client
    }

    /// Active session registry.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

/// Event handlers for one client connection.
pub struct ClientConnection {
    id: ClientId,
    emitter: Arc<dyn EventEmitter>,
    inner: Arc<Inner>,
}

impl ClientConnection {
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Dispatch an inbound event by name.
    pub async fn handle_event(&self, event: &str, data: Option<Value>) {
        match event {
            events::CONNECT => {
                let _ = self.on_connect(data.as_ref()).await;
            }
            events::STDIN => self.on_stdin(data.as_ref()).await,
            events::RESIZE => self.on_resize(data.as_ref()).await,
            events::DISCONNECTION => self.on_disconnect().await,
            other => tracing::debug!(client_id = %self.id, event = other, "ignoring unknown event"),
        }
    }

    /// Handle `term:connect`.
    ///
    /// Failures are logged and reported to the client as `term:error`; the
    /// returned error is informational.
    ///
    /// # Errors
    /// Returns error if the request is invalid, a session is already running
    /// under the reject policy, or the target cannot be resolved.
    pub async fn on_connect(&self, data: Option<&Value>) -> Result<SessionTask, ConnectError> {
        let config = &self.inner.config;

        let target = match ConnectRequest::from_payload(data)
            .and_then(|req| req.into_target(&config.default_namespace))
        {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(client_id = %self.id, "Rejected connect request: {e}");
                self.send_error(ErrorCode::InvalidRequest, e.to_string()).await;
                return Err(e.into());
            }
        };

        let replace = config.on_duplicate_connect == ConnectPolicy::Replace;
        let reservation = match self.inner.registry.reserve(self.id, target.clone(), replace).await {
            Reserved::Fresh(reservation) => reservation,
            Reserved::Replaced {
                reservation,
                previous,
            } => {
                tracing::info!(client_id = %self.id, previous = %previous, "replacing running session");
                reservation
            }
            Reserved::Occupied(existing) => {
                tracing::warn!(client_id = %self.id, session_id = %existing, "session already running");
                self.send_error(ErrorCode::SessionActive, "a session is already running")
                    .await;
                return Err(ConnectError::SessionActive(existing));
            }
        };
        let session_id = reservation.session_id;

        if let Err(e) = self.inner.backend.resolve(&target).await {
            tracing::warn!(client_id = %self.id, exec_target = %target, "Target not found: {e}");
            self.inner.registry.release(self.id, session_id).await;
            self.send_error(e.code(), e.to_string()).await;
            return Err(e.into());
        }

        let handle = tokio::spawn(run_session(
            Arc::clone(&self.inner),
            Arc::clone(&self.emitter),
            self.id,
            target,
            reservation,
        ));

        Ok(SessionTask { session_id, handle })
    }

    /// Handle `term:stdin`. Waits while the session's stdin queue is full.
    pub async fn on_stdin(&self, data: Option<&Value>) {
        let bytes = match self.inner.config.encoding.decode_value(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(client_id = %self.id, "Invalid stdin payload: {e}");
                return;
            }
        };
        let Some(input) = self.inner.registry.input(self.id).await else {
            tracing::debug!(client_id = %self.id, "no active session, discarding stdin");
            return;
        };
        if input.accept(bytes).await.is_err() {
            tracing::debug!(client_id = %self.id, "session ended, discarding stdin");
        }
    }

    /// Handle `term:resize`. Waits while the session's resize queue is full.
    pub async fn on_resize(&self, data: Option<&Value>) {
        let size = match ResizeRequest::from_payload(data) {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(client_id = %self.id, "Invalid resize payload: {e}");
                return;
            }
        };
        let Some(resize) = self.inner.registry.resize(self.id).await else {
            tracing::debug!(client_id = %self.id, "no active session, discarding resize");
            return;
        };
        if resize.push(size.cols, size.rows).await.is_err() {
            tracing::debug!(client_id = %self.id, "session ended, discarding resize");
        }
    }

    /// Handle `disconnection`: abort the client's session, if any.
    pub async fn on_disconnect(&self) {
        match self.inner.registry.abort(self.id).await {
            Some(session_id) => {
                tracing::info!(client_id = %self.id, session_id = %session_id, "client disconnected, aborting session");
            }
            None => tracing::info!(client_id = %self.id, "client disconnected"),
        }
    }

    async fn send_error(&self, code: ErrorCode, message: impl Into<String>) {
        send_error(self.emitter.as_ref(), self.id, code, message).await;
    }
}

async fn send_error(
    emitter: &dyn EventEmitter,
    client_id: ClientId,
    code: ErrorCode,
    message: impl Into<String>,
) {
    let payload = ErrorPayload::new(code, message).to_value();
    if let Err(e) = emitter.emit(events::ERROR, Some(payload)).await {
        tracing::debug!(%client_id, "Failed to send error event: {e}");
    }
}

/// Open the exec stream and drive it to completion.
async fn run_session(
    inner: Arc<Inner>,
    emitter: Arc<dyn EventEmitter>,
    client_id: ClientId,
    target: ExecTarget,
    reservation: Reservation,
) -> SessionOutcome {
    let Reservation {
        session_id,
        input,
        resize,
        abort,
    } = reservation;
    let config = &inner.config;

    let request = ExecRequest::new(target, config.command.clone(), config.tty);
    tracing::info!(
        %client_id,
        %session_id,
        exec_target = %request.target,
        command = ?request.command,
        tty = request.tty,
        "sending exec request"
    );

    let mut process = match inner.backend.open(&request).await {
        Ok(process) => process,
        Err(e) => {
            tracing::error!(%client_id, %session_id, "Failed to open exec stream: {e}");
            inner.registry.release(client_id, session_id).await;
            send_error(emitter.as_ref(), client_id, e.code(), e.to_string()).await;
            return SessionOutcome::OpenFailed(e);
        }
    };

    if !inner.registry.mark_streaming(client_id, session_id).await {
        tracing::info!(%client_id, %session_id, "session superseded while opening");
        process.abort().await;
        return SessionOutcome::Aborted;
    }

    if let Err(e) = emitter.emit(events::CONNECTED, None).await {
        tracing::warn!(%client_id, %session_id, "Failed to confirm session: {e}");
        process.abort().await;
        inner.registry.release(client_id, session_id).await;
        return SessionOutcome::ClientGone;
    }

    let opts = StreamOptions {
        stdin: Box::new(input),
        stdout: Arc::new(EventSink::new(Arc::clone(&emitter), StreamKind::Stdout, config.encoding)),
        stderr: Arc::new(EventSink::new(Arc::clone(&emitter), StreamKind::Stderr, config.encoding)),
        resize,
    };

    let outcome = match stream::run(process.as_mut(), opts, abort).await {
        Ok(StreamEnd::Completed(status)) => {
            tracing::info!(
                %client_id,
                %session_id,
                code = ?status.code,
                reason = ?status.reason,
                "exec connection terminated"
            );
            SessionOutcome::Completed(status)
        }
        Ok(StreamEnd::Aborted) => {
            tracing::info!(%client_id, %session_id, "exec connection aborted");
            SessionOutcome::Aborted
        }
        Err(e) => {
            tracing::error!(%client_id, %session_id, "Exec stream failed: {e}");
            send_error(emitter.as_ref(), client_id, ErrorCode::StreamFailed, e.to_string()).await;
            SessionOutcome::Failed(e)
        }
    };

    if !inner.registry.release(client_id, session_id).await
        && matches!(outcome, SessionOutcome::Aborted)
        && inner.registry.get(client_id).await.is_some()
    {
        // A newer session owns the client now and reports its own lifecycle.
        tracing::debug!(%client_id, %session_id, "session replaced, not reporting termination");
        return outcome;
    }

    if let Err(e) = emitter.emit(events::TERMINATED, None).await {
        tracing::debug!(%client_id, %session_id, "Failed to send termination: {e}");
    }

    outcome
}
