//! Reporting operation results back to the requesting client.
//!
//! Every restore or verify call ends by writing a [`ResultEnvelope`] to its
//! client and disconnecting it. Verify additionally writes the
//! [`VerifyReport`] before the envelope.

use crate::pipeline::WorkflowKind;
use crate::utils::Timestamp;
use crate::verify::VerifyReport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// The outcome of one maintenance operation, as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// The operation that ran.
    pub operation: WorkflowKind,
    /// Name of the server the operation ran for.
    pub server: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Unique id of this operation.
    pub operation_id: Uuid,
    /// When the operation finished.
    pub time: Timestamp,
    /// Wall-clock duration as `HH:MM:SS`.
    pub elapsed: String,
}

/// A message written to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Verify results.
    Verify(VerifyReport),
    /// Final result of an operation.
    Result(ResultEnvelope),
}

/// A connection to the client that requested an operation.
#[async_trait]
pub trait ClientConnection: Send {
    /// Writes one message.
    async fn send(&mut self, message: &ClientMessage) -> io::Result<()>;

    /// Closes the connection.
    async fn disconnect(&mut self) -> io::Result<()>;

    /// Writes the verify results.
    async fn write_verify(&mut self, report: &VerifyReport) -> io::Result<()> {
        self.send(&ClientMessage::Verify(report.clone())).await
    }

    /// Writes the final result.
    async fn write_result(&mut self, envelope: &ResultEnvelope) -> io::Result<()> {
        self.send(&ClientMessage::Result(envelope.clone())).await
    }
}

/// A client connection writing newline-delimited JSON to any async writer.
#[derive(Debug)]
pub struct StreamConnection<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> StreamConnection<W> {
    /// Wraps a writer.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ClientConnection for StreamConnection<W> {
    async fn send(&mut self, message: &ClientMessage) -> io::Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}
