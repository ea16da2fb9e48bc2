//! Dispatch of integration events to an executor

use crate::engine::RuleEngine;
use crate::error::IntegrationError;
use crate::model::{AutomationAction, EventType, IntegrationEvent};
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

/// Destination for actions produced by the rule engine
pub trait ActionSink {
    /// Hand an action to the executor
    fn send(&self, action: &AutomationAction) -> Result<(), IntegrationError>;
}

/// Sink forwarding actions into an in-process channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AutomationAction>,
}

impl ChannelSink {
    /// Create a sink and the receiver the executor reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AutomationAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ActionSink for ChannelSink {
    fn send(&self, action: &AutomationAction) -> Result<(), IntegrationError> {
        self.tx
            .send(action.clone())
            .map_err(|_| IntegrationError::Sink("executor channel closed".to_string()))
    }
}

/// Sink writing each action as one line of JSON
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write> ActionSink for JsonLinesSink<W> {
    fn send(&self, action: &AutomationAction) -> Result<(), IntegrationError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| IntegrationError::Sink("writer lock poisoned".to_string()))?;

        let mut line = serde_json::to_vec(action)?;
        line.push(b'\n');
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Events emitted by the dispatcher
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// An action was produced and delivered
    Matched { event_id: String, action_id: String },
    /// No rule applies to the event
    NoRule {
        event_id: String,
        event_type: EventType,
    },
    /// The sink refused the action
    Failed { event_id: String, error: String },
}

/// Snapshot of dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub received: u64,
    pub matched: u64,
    pub no_rule: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    matched: AtomicU64,
    no_rule: AtomicU64,
    failed: AtomicU64,
}

/// Runs events through the rule engine and forwards resulting actions
pub struct Dispatcher<S> {
    engine: RuleEngine,
    sink: S,
    event_tx: broadcast::Sender<DispatchEvent>,
    counters: Counters,
}

impl<S: ActionSink> Dispatcher<S> {
    /// Create a dispatcher delivering to the given sink
    pub fn new(sink: S) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            engine: RuleEngine::new(),
            sink,
            event_tx,
            counters: Counters::default(),
        }
    }

    /// Subscribe to dispatch events
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.event_tx.subscribe()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the dispatcher, returning its sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Evaluate an event and deliver the resulting action, if any
    pub fn dispatch(
        &self,
        event: &IntegrationEvent,
    ) -> Result<Option<AutomationAction>, IntegrationError> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let Some(action) = self.engine.evaluate(event) else {
            self.counters.no_rule.fetch_add(1, Ordering::Relaxed);
            let _ = self.event_tx.send(DispatchEvent::NoRule {
                event_id: event.event_id.clone(),
                event_type: event.event_type.clone(),
            });
            return Ok(None);
        };

        if let Err(e) = self.sink.send(&action) {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                "Failed to deliver action {} for event {}: {}",
                action.action_id,
                event.event_id,
                e
            );
            let _ = self.event_tx.send(DispatchEvent::Failed {
                event_id: event.event_id.clone(),
                error: e.to_string(),
            });
            return Err(e);
        }

        self.counters.matched.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "Dispatched {:?} to {:?} for {} event {}",
            action.command_type,
            action.target_zones,
            event.event_type,
            event.event_id
        );
        let _ = self.event_tx.send(DispatchEvent::Matched {
            event_id: event.event_id.clone(),
            action_id: action.action_id.clone(),
        });

        Ok(Some(action))
    }

    /// Current counters
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            received: self.counters.received.load(Ordering::Relaxed),
            matched: self.counters.matched.load(Ordering::Relaxed),
            no_rule: self.counters.no_rule.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}
