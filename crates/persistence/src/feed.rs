//! LISTEN/NOTIFY change feed for the applications table.
//!
//! The `applications_notify_change` trigger publishes
//! `{op, record, old_id}` JSON on the `applications_changes` channel.

use async_trait::async_trait;
use domain::models::{Application, ChangeEvent};
use domain::store::{ChangeFeed, FeedError};
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const CHANNEL: &str = "applications_changes";

#[derive(Debug, Deserialize)]
struct ChangePayload {
    op: String,
    record: Option<Application>,
    old_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown operation {0}")]
    UnknownOp(String),

    #[error("Missing {0} in {1} payload")]
    Missing(&'static str, String),
}

/// Decodes one notification payload.
pub fn decode_payload(payload: &str) -> Result<ChangeEvent, DecodeError> {
    let change: ChangePayload = serde_json::from_str(payload)?;
    match change.op.as_str() {
        "INSERT" => change
            .record
            .map(ChangeEvent::Insert)
            .ok_or(DecodeError::Missing("record", change.op)),
        "UPDATE" => change
            .record
            .map(ChangeEvent::Update)
            .ok_or(DecodeError::Missing("record", change.op)),
        "DELETE" => change
            .old_id
            .map(|id| ChangeEvent::Delete { id })
            .ok_or(DecodeError::Missing("old_id", change.op)),
        _ => Err(DecodeError::UnknownOp(change.op)),
    }
}

/// Change feed backed by a dedicated listener connection.
#[derive(Clone)]
pub struct PgChangeFeed {
    pool: PgPool,
    buffer: usize,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, buffer: 128 }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>, FeedError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| FeedError::Subscribe(e.to_string()))?;
        listener
            .listen(CHANNEL)
            .await
            .map_err(|e| FeedError::Subscribe(e.to_string()))?;

        let (tx, rx) = mpsc::channel(self.buffer);

        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    n = listener.try_recv() => n,
                    _ = tx.closed() => break,
                };

                match notification {
                    Ok(Some(notification)) => match decode_payload(notification.payload()) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Skipping undecodable change notification"),
                    },
                    // Connection lost; events may have been missed.
                    Ok(None) => {
                        tracing::warn!("Change feed connection lost");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Change feed listener failed");
                        break;
                    }
                }
            }
            tracing::debug!("Change feed forwarder stopped");
        });

        Ok(rx)
    }
}
