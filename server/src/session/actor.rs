use axum::response::sse::Event;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::store::CounterStore;
use super::{SessionCommand, SessionHandle, SessionRegistry, Subscriber};
use crate::state::AppState;

/// A session actor: the single owner of one session's counter and live
/// subscriber set. Runs as a dedicated task; attach/detach arrive over the
/// command channel and the tick timer is selected in the same loop, so no
/// two operations ever touch the state concurrently.
pub struct SessionActor {
    session_id: String,
    store: CounterStore,
    registry: SessionRegistry,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    /// Live delivery channels; transient, rebuilt on each activation.
    subscribers: Vec<Subscriber>,
    /// In-memory counter. May run ahead of `committed` while a persist
    /// is failing; never rolled back.
    counter: u64,
    /// Last durably committed value. Broadcast and catch-up only ever
    /// deliver this.
    committed: u64,
    tick_interval: Duration,
    idle_timeout: Duration,
    /// Some iff `subscribers` is non-empty. The actor owns the timer and
    /// stops it exactly once at the Idle transition.
    ticker: Option<Interval>,
    last_activity: Instant,
}

/// Spawn the actor task for a session and return its handle.
pub fn spawn(state: &AppState, session_id: &str) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let actor = SessionActor {
        session_id: session_id.to_string(),
        store: CounterStore::new(state.db.clone()),
        registry: state.sessions.clone(),
        command_tx: command_tx.clone(),
        command_rx,
        subscribers: Vec::new(),
        counter: 0,
        committed: 0,
        tick_interval: state.settings.tick_interval,
        idle_timeout: state.settings.idle_timeout,
        ticker: None,
        last_activity: Instant::now(),
    };
    tokio::spawn(actor.run());
    SessionHandle { command_tx }
}

/// Serialize a counter value into its wire record.
fn counter_record(value: u64) -> Event {
    Event::default().data(value.to_string())
}

/// Poll the tick timer, or park forever while the loop is idle.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl SessionActor {
    async fn run(mut self) {
        // Activation: load the durable counter exactly once. A read error
        // is non-fatal — the session starts from zero and the next persist
        // re-establishes the row.
        match self.store.load(&self.session_id).await {
            Ok(Some(value)) => {
                self.counter = value;
                self.committed = value;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %err,
                    "counter load failed, starting from 0"
                );
            }
        }

        tracing::info!(
            session_id = %self.session_id,
            counter = self.counter,
            "session actor activated"
        );

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(SessionCommand::Attach(subscriber)) => self.attach(subscriber),
                    Some(SessionCommand::Detach { subscriber_id }) => self.detach(subscriber_id),
                    // Registry dropped — server is shutting down.
                    None => break,
                },
                _ = next_tick(&mut self.ticker) => {
                    self.tick().await;
                }
                _ = time::sleep_until(self.last_activity + self.idle_timeout),
                    if self.subscribers.is_empty() =>
                {
                    break;
                }
            }
        }

        // Deactivation: drop our own registry entry, never a successor's.
        self.registry.remove_if(&self.session_id, |_, handle| {
            handle.command_tx.same_channel(&self.command_tx)
        });
        tracing::info!(
            session_id = %self.session_id,
            counter = self.committed,
            "session actor deactivated"
        );
    }

    /// Register a new subscriber. The first subscriber of an activation
    /// window starts the tick loop and waits for the next tick; a
    /// subscriber joining a running loop instead gets one immediate
    /// catch-up record carrying the last committed value.
    fn attach(&mut self, subscriber: Subscriber) {
        self.last_activity = Instant::now();

        if self.ticker.is_none() {
            let mut ticker =
                time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
            tracing::debug!(
                session_id = %self.session_id,
                subscriber_id = subscriber.id,
                "first subscriber attached, tick loop started"
            );
        } else if subscriber.tx.send(counter_record(self.committed)).is_err() {
            // Client vanished before the catch-up record could be queued.
            tracing::debug!(
                session_id = %self.session_id,
                subscriber_id = subscriber.id,
                "subscriber gone before catch-up"
            );
            return;
        }

        self.subscribers.push(subscriber);
    }

    /// Remove a subscriber. Idempotent: detaching an unknown or
    /// already-detached subscriber is a no-op.
    fn detach(&mut self, subscriber_id: u64) {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != subscriber_id);
        if self.subscribers.len() == before {
            return;
        }

        self.last_activity = Instant::now();
        if self.subscribers.is_empty() {
            self.ticker = None;
            tracing::debug!(
                session_id = %self.session_id,
                "last subscriber detached, tick loop stopped"
            );
        }
    }

    /// One tick: increment, persist, fan out. Ticks never overlap — the
    /// actor awaits the persist before polling the timer again.
    async fn tick(&mut self) {
        self.counter += 1;

        // Persist before broadcast: no subscriber may observe a value that
        // is not durable. A failed write skips this tick's broadcast; the
        // next tick's upsert covers the missed value.
        if let Err(err) = self.store.save(&self.session_id, self.counter).await {
            tracing::warn!(
                session_id = %self.session_id,
                counter = self.counter,
                error = %err,
                "counter persist failed, broadcast skipped"
            );
            return;
        }
        self.committed = self.counter;

        let session_id = self.session_id.as_str();
        let value = self.committed;
        self.subscribers.retain(|subscriber| {
            match subscriber.tx.send(counter_record(value)) {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!(
                        session_id = %session_id,
                        subscriber_id = subscriber.id,
                        "delivery failed, detaching subscriber"
                    );
                    false
                }
            }
        });

        if self.subscribers.is_empty() {
            self.ticker = None;
            self.last_activity = Instant::now();
            tracing::debug!(
                session_id = %session_id,
                "all subscribers gone after broadcast, tick loop stopped"
            );
        }
    }
}
