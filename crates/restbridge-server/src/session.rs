//! Session tracking for the streamable HTTP transport.
//!
//! Session ids carry 128 bits of cryptographic randomness (`getrandom`),
//! hex-formatted with an `mcp-` prefix, so they are unguessable and unique
//! for the life of the process.
//!
//! Each session owns at most one outbound SSE sink. Responses produced
//! while no stream is attached are buffered up to a bound, dropping the
//! oldest on overflow; attaching a stream flushes the buffer in arrival
//! order. A session's cancellation token is the parent of every in-flight
//! request task, so `DELETE /mcp`, TTL expiry and shutdown all abort
//! outstanding upstream calls promptly.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default idle TTL before a session is garbage-collected.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

/// Responses buffered per session while no SSE stream is attached.
const BUFFER_LIMIT: usize = 256;

/// Something flowing out of a session's SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A serialized JSON-RPC response frame.
    Message(String),
    /// The server is closing the stream.
    Close,
}

/// Generate a fresh unguessable session id.
///
/// # Panics
///
/// Panics when the OS random source is unavailable; a predictable session
/// id would be worse than refusing to start.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).expect("OS random source unavailable");
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("mcp-{hex}")
}

struct Session {
    created_at: Instant,
    last_activity: Instant,
    sink: Option<mpsc::UnboundedSender<SessionEvent>>,
    buffer: VecDeque<String>,
    cancel: CancellationToken,
}

impl Session {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            created_at: now,
            last_activity: now,
            sink: None,
            buffer: VecDeque::new(),
            cancel: CancellationToken::new(),
        }
    }
}

/// The session table.
#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionManager {
    /// Manager with the given idle TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Create a session and return its id.
    pub fn create(&self) -> String {
        let id = generate_session_id();
        self.sessions.insert(id.clone(), Session::new());
        debug!(session = %id, "session created");
        id
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Refresh a session's activity stamp. Returns false for unknown ids.
    pub fn touch(&self, id: &str) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// A child cancellation token for a request running in this session.
    pub fn request_token(&self, id: &str) -> Option<CancellationToken> {
        self.sessions
            .get(id)
            .map(|session| session.cancel.child_token())
    }

    /// Deliver a response: straight to the SSE sink when one is attached,
    /// otherwise into the bounded buffer (oldest dropped on overflow).
    pub fn deliver(&self, id: &str, response: String) -> bool {
        let Some(mut session) = self.sessions.get_mut(id) else {
            return false;
        };
        session.last_activity = Instant::now();
        if let Some(sink) = &session.sink {
            if sink.send(SessionEvent::Message(response.clone())).is_ok() {
                return true;
            }
            // Receiver went away; fall back to buffering.
            session.sink = None;
        }
        if session.buffer.len() >= BUFFER_LIMIT {
            warn!(session = %id, "response buffer full, dropping oldest");
            session.buffer.pop_front();
        }
        session.buffer.push_back(response);
        true
    }

    /// Attach an SSE stream, replacing any previous one (at most one stream
    /// per session). Buffered responses are flushed into the new stream in
    /// arrival order.
    pub fn attach_stream(&self, id: &str) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        let mut session = self.sessions.get_mut(id)?;
        session.last_activity = Instant::now();
        if let Some(previous) = session.sink.take() {
            let _ = previous.send(SessionEvent::Close);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        for buffered in session.buffer.drain(..) {
            let _ = tx.send(SessionEvent::Message(buffered));
        }
        session.sink = Some(tx);
        Some(rx)
    }

    /// Terminate a session: cancel in-flight work, close the stream, drop
    /// state. Returns false for unknown ids.
    pub fn remove(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.cancel.cancel();
                if let Some(sink) = session.sink {
                    let _ = sink.send(SessionEvent::Close);
                }
                debug!(session = %id, "session terminated");
                true
            }
            None => false,
        }
    }

    /// Drop sessions idle past the TTL. Returns how many were collected.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| now.duration_since(entry.last_activity) > self.ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for id in &expired {
            debug!(session = %id, "session expired");
            self.remove(id);
        }
        expired.len()
    }

    /// Close every session (server shutdown).
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.remove(&id);
        }
    }

    /// Age of a session since creation, for diagnostics.
    pub fn age(&self, id: &str) -> Option<Duration> {
        self.sessions
            .get(id)
            .map(|session| session.created_at.elapsed())
    }
}
