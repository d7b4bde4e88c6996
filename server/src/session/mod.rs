pub mod actor;
pub mod handler;
pub mod store;

use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::state::AppState;

/// Type alias for the sender half of a subscriber's delivery channel.
/// The actor enqueues serialized counter records; the HTTP response body
/// drains them. Sends never block; a closed receiver surfaces as a send
/// error on the next delivery.
pub type DeliverySender = mpsc::UnboundedSender<axum::response::sse::Event>;

/// One live, push-only delivery channel, valid for the duration of one
/// client connection. Resuming a session always creates a brand-new
/// Subscriber — there is no cross-request identity.
pub struct Subscriber {
    pub id: u64,
    pub tx: DeliverySender,
}

/// Commands accepted by a session actor. All session state mutation goes
/// through this channel so the actor task remains the single writer.
pub enum SessionCommand {
    Attach(Subscriber),
    Detach { subscriber_id: u64 },
}

/// Handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::UnboundedSender<SessionCommand>,
}

/// Session registry: maps session identifier -> live actor handle.
/// Entries are created lazily on first visit and removed when the actor
/// deactivates after its idle timeout.
pub type SessionRegistry = Arc<DashMap<String, SessionHandle>>;

/// Create a new empty session registry.
pub fn new_session_registry() -> SessionRegistry {
    Arc::new(DashMap::new())
}

/// Process-wide allocator for opaque per-connection subscriber handles.
static SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

fn next_subscriber_id() -> u64 {
    SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Generate a 16-character alphanumeric session identifier. Identifier
/// entropy is the only guessing resistance the server provides.
pub fn generate_session_id() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Attach a new subscriber to a session, activating the actor if it is not
/// resident. Returns the subscriber id, the receiving half of the delivery
/// channel, and the actor's command sender (for detach-on-disconnect).
///
/// The actor may deactivate between the registry lookup and the attach
/// send; in that case the stale entry is dropped and a fresh actor is
/// spawned, which re-reads the durable counter.
pub fn subscribe(
    state: &AppState,
    session_id: &str,
) -> (
    u64,
    mpsc::UnboundedReceiver<axum::response::sse::Event>,
    mpsc::UnboundedSender<SessionCommand>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscriber_id = next_subscriber_id();

    loop {
        let handle = state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| actor::spawn(state, session_id))
            .clone();

        let attach = SessionCommand::Attach(Subscriber {
            id: subscriber_id,
            tx: tx.clone(),
        });
        match handle.command_tx.send(attach) {
            Ok(()) => return (subscriber_id, rx, handle.command_tx),
            Err(_) => {
                // Actor deactivated under us. Remove the dead handle (but
                // never a successor spawned by a racing attach) and retry.
                state.sessions.remove_if(session_id, |_, existing| {
                    existing.command_tx.same_channel(&handle.command_tx)
                });
            }
        }
    }
}
