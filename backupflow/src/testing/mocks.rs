//! Mock stages and clients for testing.

use crate::config::ServerConfig;
use crate::context::{keys, ContextValue, ExecutionContext};
use crate::errors::DataConflictError;
use crate::management::{ClientConnection, ClientMessage, ResultEnvelope};
use crate::stages::{Phase, Stage, StageOutput};
use crate::verify::{record_entry, VerifyEntry, VerifyReport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A shared, ordered log of `stage:phase` calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Creates an empty call log.
#[must_use]
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A stage that records each phase call and optionally fails one phase.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: CallLog,
    fail_at: Option<Phase>,
    drops: Option<Arc<AtomicUsize>>,
}

impl RecordingStage {
    /// Creates a stage recording into `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: Arc::clone(log),
            fail_at: None,
            drops: None,
        }
    }

    /// Makes the given phase fail.
    #[must_use]
    pub fn failing_at(mut self, phase: Phase) -> Self {
        self.fail_at = Some(phase);
        self
    }

    /// Increments `counter` when the stage is dropped.
    #[must_use]
    pub fn with_drop_counter(mut self, counter: &Arc<AtomicUsize>) -> Self {
        self.drops = Some(Arc::clone(counter));
        self
    }

    fn record(&self, phase: Phase) -> StageOutput {
        self.log.lock().push(format!("{}:{phase}", self.name));
        if self.fail_at == Some(phase) {
            StageOutput::fail(format!("{} failed during {phase}", self.name))
        } else {
            StageOutput::ok()
        }
    }
}

impl Drop for RecordingStage {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self, _server: &ServerConfig, _backup_id: &str, _ctx: &mut ExecutionContext) -> StageOutput {
        self.record(Phase::Setup)
    }

    async fn execute(&self, _server: &ServerConfig, _backup_id: &str, _ctx: &mut ExecutionContext) -> StageOutput {
        self.record(Phase::Execute)
    }

    async fn teardown(&self, _server: &ServerConfig, _backup_id: &str, _ctx: &mut ExecutionContext) -> StageOutput {
        self.record(Phase::Teardown)
    }
}

/// A stage publishing fixed results during execute.
///
/// Publishes `output` and `identifier` when set, and when given verify
/// entries creates the `failed`/`all` lists and records every entry.
#[derive(Debug, Default)]
pub struct ResultStage {
    output: Option<String>,
    identifier: Option<String>,
    entries: Option<Vec<VerifyEntry>>,
    seen_inputs: Mutex<Vec<(String, String)>>,
}

impl ResultStage {
    /// Creates a stage publishing both results.
    #[must_use]
    pub fn new(output: &str, identifier: &str) -> Self {
        Self {
            output: Some(output.to_string()),
            identifier: Some(identifier.to_string()),
            ..Self::default()
        }
    }

    /// Creates a stage publishing only `output`.
    #[must_use]
    pub fn output_only(output: &str) -> Self {
        Self {
            output: Some(output.to_string()),
            ..Self::default()
        }
    }

    /// Also records verify entries.
    #[must_use]
    pub fn with_entries(mut self, entries: Vec<VerifyEntry>) -> Self {
        self.entries = Some(entries);
        self
    }

    fn publish(&self, ctx: &mut ExecutionContext) -> Result<(), DataConflictError> {
        if let Some(output) = &self.output {
            ctx.insert(keys::OUTPUT, output.as_str())?;
        }
        if let Some(identifier) = &self.identifier {
            ctx.insert(keys::IDENTIFIER, identifier.as_str())?;
        }
        if self.entries.is_some() {
            ctx.insert(keys::FAILED, Vec::<ContextValue>::new())?;
            ctx.insert(keys::ALL, Vec::<ContextValue>::new())?;
        }
        Ok(())
    }

    /// Returns the string inputs found in the context during execute.
    #[must_use]
    pub fn seen_inputs(&self) -> Vec<(String, String)> {
        self.seen_inputs.lock().clone()
    }
}

#[async_trait]
impl Stage for ResultStage {
    fn name(&self) -> &str {
        "result"
    }

    async fn execute(&self, _server: &ServerConfig, _backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        {
            let mut seen = self.seen_inputs.lock();
            for key in [keys::POSITION, keys::DIRECTORY, keys::FILES] {
                if let Ok(value) = ctx.get_str(key) {
                    seen.push((key.to_string(), value.to_string()));
                }
            }
        }

        if let Err(e) = self.publish(ctx) {
            return StageOutput::fail(e.to_string());
        }

        for entry in self.entries.iter().flatten() {
            if let Err(e) = record_entry(ctx, entry) {
                return StageOutput::fail(e.to_string());
            }
        }
        StageOutput::ok()
    }
}

/// A client connection keeping every message in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingConnection {
    messages: Arc<Mutex<Vec<ClientMessage>>>,
    disconnected: Arc<AtomicUsize>,
}

impl CollectingConnection {
    /// Creates an empty connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all messages written so far.
    #[must_use]
    pub fn messages(&self) -> Vec<ClientMessage> {
        self.messages.lock().clone()
    }

    /// Returns the last result envelope written.
    #[must_use]
    pub fn result(&self) -> Option<ResultEnvelope> {
        self.messages.lock().iter().rev().find_map(|m| match m {
            ClientMessage::Result(envelope) => Some(envelope.clone()),
            ClientMessage::Verify(_) => None,
        })
    }

    /// Returns the verify report written, if any.
    #[must_use]
    pub fn verify_report(&self) -> Option<VerifyReport> {
        self.messages.lock().iter().find_map(|m| match m {
            ClientMessage::Verify(report) => Some(report.clone()),
            ClientMessage::Result(_) => None,
        })
    }

    /// Returns how many times the connection was closed.
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientConnection for CollectingConnection {
    async fn send(&mut self, message: &ClientMessage) -> io::Result<()> {
        self.messages.lock().push(message.clone());
        Ok(())
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
