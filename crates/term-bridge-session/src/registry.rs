//! Registry of active sessions, one per client connection.

use std::collections::HashMap;

use term_bridge_core::{
    ClientId, ExecTarget, InputHandle, InputSource, ResizeHandle, ResizeQueue, SessionId,
    input_source, resize_queue,
};
use tokio::sync::{RwLock, oneshot};
use uuid::Uuid;

/// Lifecycle stage of a registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Target is being resolved or the exec stream is being opened.
    Opening,
    /// `term:connected` was sent and the stream loop is running.
    Streaming,
}

/// Snapshot of a registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub client_id: ClientId,
    pub session_id: SessionId,
    pub target: ExecTarget,
    pub state: SessionState,
}

/// Registry-side state of a session.
struct ActiveSession {
    session_id: SessionId,
    target: ExecTarget,
    state: SessionState,
    input: InputHandle,
    resize: ResizeHandle,
    abort_tx: Option<oneshot::Sender<()>>,
}

impl ActiveSession {
    fn abort(mut self) {
        if let Some(tx) = self.abort_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Consumer halves handed to the session task on reservation.
pub struct Reservation {
    pub session_id: SessionId,
    pub input: InputSource,
    pub resize: ResizeQueue,
    pub abort: oneshot::Receiver<()>,
}

/// Outcome of [`SessionRegistry::reserve`].
pub enum Reserved {
    /// The slot was free.
    Fresh(Reservation),
    /// A prior session was aborted to make room.
    Replaced {
        reservation: Reservation,
        previous: SessionId,
    },
    /// The client already has a session.
    Occupied(SessionId),
}

/// Maps each client to its single active session.
pub struct SessionRegistry {
    stdin_capacity: usize,
    resize_capacity: usize,
    sessions: RwLock<HashMap<ClientId, ActiveSession>>,
}

impl SessionRegistry {
    /// Create an empty registry whose sessions use the given queue depths.
    #[must_use]
    pub fn new(stdin_capacity: usize, resize_capacity: usize) -> Self {
        Self {
            stdin_capacity,
            resize_capacity,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Claim the client's session slot and create the session's adapters.
    ///
    /// With `replace` set, an existing session is aborted and superseded;
    /// otherwise the existing session is left alone and `Occupied` returned.
    pub async fn reserve(&self, client_id: ClientId, target: ExecTarget, replace: bool) -> Reserved {
        let mut sessions = self.sessions.write().await;

        let existing = sessions.get(&client_id).map(|s| s.session_id);
        let previous = match existing {
            Some(session_id) if !replace => return Reserved::Occupied(session_id),
            Some(_) => sessions.remove(&client_id),
            None => None,
        };

        let (input, input_source) = input_source(self.stdin_capacity);
        let (resize, resize_queue) = resize_queue(self.resize_capacity);
        let (abort_tx, abort_rx) = oneshot::channel();
        let session_id = Uuid::new_v4();

        sessions.insert(
            client_id,
            ActiveSession {
                session_id,
                target,
                state: SessionState::Opening,
                input,
                resize,
                abort_tx: Some(abort_tx),
            },
        );
        drop(sessions);

        let reservation = Reservation {
            session_id,
            input: input_source,
            resize: resize_queue,
            abort: abort_rx,
        };

        match previous {
            Some(old) => {
                let previous = old.session_id;
                old.abort();
                Reserved::Replaced {
                    reservation,
                    previous,
                }
            }
            None => Reserved::Fresh(reservation),
        }
    }

    /// Mark a session as streaming. Returns false if it is no longer registered.
    pub async fn mark_streaming(&self, client_id: ClientId, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&client_id) {
            Some(session) if session.session_id == session_id => {
                session.state = SessionState::Streaming;
                true
            }
            _ => false,
        }
    }

    /// Drop a session's slot, but only if it still belongs to `session_id`.
    pub async fn release(&self, client_id: ClientId, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(&client_id)
            .is_some_and(|s| s.session_id == session_id)
        {
            sessions.remove(&client_id);
            true
        } else {
            false
        }
    }

    /// Abort and remove whatever session the client has.
    pub async fn abort(&self, client_id: ClientId) -> Option<SessionId> {
        let session = self.sessions.write().await.remove(&client_id)?;
        let session_id = session.session_id;
        session.abort();
        Some(session_id)
    }

    /// Stdin producer for the client's session.
    pub async fn input(&self, client_id: ClientId) -> Option<InputHandle> {
        self.sessions
            .read()
            .await
            .get(&client_id)
            .map(|s| s.input.clone())
    }

    /// Resize producer for the client's session.
    pub async fn resize(&self, client_id: ClientId) -> Option<ResizeHandle> {
        self.sessions
            .read()
            .await
            .get(&client_id)
            .map(|s| s.resize.clone())
    }

    /// Snapshot of one client's session.
    pub async fn get(&self, client_id: ClientId) -> Option<SessionInfo> {
        self.sessions
            .read()
            .await
            .get(&client_id)
            .map(|s| info(client_id, s))
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn info(client_id: ClientId, session: &ActiveSession) -> SessionInfo {
    SessionInfo {
        client_id,
        session_id: session.session_id,
        target: session.target.clone(),
        state: session.state,
    }
}

#[cfg(test)]
mod tests {
    use term_bridge_core::ByteSource;

    use super::*;

    fn target(pod: &str) -> ExecTarget {
        ExecTarget {
            namespace: "default".into(),
            pod: pod.into(),
            container: None,
        }
    }

    fn fresh(reserved: Reserved) -> Reservation {
        match reserved {
            Reserved::Fresh(r) => r,
            _ => panic!("expected a fresh reservation"),
        }
    }

    #[tokio::test]
    async fn test_second_reserve_is_rejected() {
        let registry = SessionRegistry::new(4, 4);
        let client = Uuid::new_v4();

        let first = fresh(registry.reserve(client, target("a"), false).await);
        match registry.reserve(client, target("b"), false).await {
            Reserved::Occupied(id) => assert_eq!(id, first.session_id),
            _ => panic!("expected occupied"),
        }
        assert_eq!(registry.get(client).await.unwrap().target.pod, "a");
    }

    #[tokio::test]
    async fn test_replace_aborts_previous() {
        let registry = SessionRegistry::new(4, 4);
        let client = Uuid::new_v4();

        let mut first = fresh(registry.reserve(client, target("a"), false).await);
        let Reserved::Replaced {
            reservation,
            previous,
        } = registry.reserve(client, target("b"), true).await
        else {
            panic!("expected replacement");
        };

        assert_eq!(previous, first.session_id);
        assert!((&mut first.abort).await.is_ok());
        // The old input producer is gone, so the old source ends.
        assert!(first.input.read().await.is_none());
        assert_eq!(
            registry.get(client).await.unwrap().session_id,
            reservation.session_id
        );
    }

    #[tokio::test]
    async fn test_release_ignores_stale_session() {
        let registry = SessionRegistry::new(4, 4);
        let client = Uuid::new_v4();

        let first = fresh(registry.reserve(client, target("a"), false).await);
        let Reserved::Replaced { reservation, .. } = registry.reserve(client, target("b"), true).await
        else {
            panic!("expected replacement");
        };

        assert!(!registry.release(client, first.session_id).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.release(client, reservation.session_id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_routes_input_to_session() {
        let registry = SessionRegistry::new(4, 4);
        let client = Uuid::new_v4();
        assert!(registry.input(client).await.is_none());

        let mut reservation = fresh(registry.reserve(client, target("a"), false).await);
        registry.input(client).await.unwrap().accept(&b"ls\r"[..]).await.unwrap();
        registry.resize(client).await.unwrap().push(100, 30).await.unwrap();

        assert_eq!(reservation.input.read().await.unwrap(), &b"ls\r"[..]);
        assert_eq!(reservation.resize.next().await.unwrap().cols, 100);
    }

    #[tokio::test]
    async fn test_mark_streaming_and_abort() {
        let registry = SessionRegistry::new(4, 4);
        let client = Uuid::new_v4();
        let reservation = fresh(registry.reserve(client, target("a"), false).await);

        assert_eq!(registry.get(client).await.unwrap().state, SessionState::Opening);
        assert!(registry.mark_streaming(client, reservation.session_id).await);
        assert_eq!(registry.get(client).await.unwrap().state, SessionState::Streaming);

        assert_eq!(registry.abort(client).await, Some(reservation.session_id));
        assert!(reservation.abort.await.is_ok());
        assert!(registry.abort(client).await.is_none());
    }
}
