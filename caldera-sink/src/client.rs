//! The batching client
//!
//! [`CalderaClient`] owns one bounded queue per record kind and the transport
//! that delivers due batches. Callers construct records through the client,
//! enqueue them one at a time, and the client flushes a queue when it fills
//! or when asked explicitly. [`SyncClient`] wraps the same client behind a
//! blocking interface for callers without an async runtime.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::BatchQueue;
use crate::record::{Record, RecordKind, TrackEvent, UserRecord};
use crate::transport::{BatchPayload, HttpTransport, NoopTransport, Transport};

/// Publishing statistics
#[derive(Debug, Default, Clone)]
pub struct PublishStats {
    /// User-attribute objects delivered successfully
    pub users_sent: usize,
    /// Event objects delivered successfully
    pub events_sent: usize,
    /// Number of delivery attempts made
    pub api_calls: usize,
    /// Number of failed delivery attempts
    pub api_failures: usize,
}

/// Client for the Caldera bulk endpoint.
///
/// Owns one queue of pending user-attribute updates and one of pending track
/// events. A queue flushes automatically when it reaches the configured batch
/// size (unless `auto_flush` is off) and on explicit [`flush`].
///
/// [`flush`]: CalderaClient::flush
pub struct CalderaClient {
    config: Config,
    transport: Arc<dyn Transport>,
    users: BatchQueue,
    events: BatchQueue,
    stats: PublishStats,
}

impl CalderaClient {
    /// Create a client from configuration.
    ///
    /// With `send` enabled the client delivers over HTTP; otherwise it runs
    /// against a [`NoopTransport`] and never touches the network.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let transport: Arc<dyn Transport> = if config.send {
            Arc::new(HttpTransport::new(&config)?)
        } else {
            Arc::new(NoopTransport::new())
        };

        Self::with_transport(config, transport)
    }

    /// Create a client with an injected transport.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let users = BatchQueue::new(RecordKind::User, config.batch_size)?;
        let events = BatchQueue::new(RecordKind::Event, config.batch_size)?;

        tracing::debug!(
            endpoint = %config.endpoint,
            batch_size = config.batch_size,
            send = config.send,
            "Caldera client initialized"
        );

        Ok(Self {
            config,
            transport,
            users,
            events,
            stats: PublishStats::default(),
        })
    }

    /// Construct a user-attribute record, un-enqueued.
    pub fn user(&self, external_id: impl Into<String>) -> Result<UserRecord> {
        UserRecord::new(external_id)
    }

    /// Construct a track event, un-enqueued.
    pub fn event(
        &self,
        external_id: impl Into<String>,
        name: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Result<TrackEvent> {
        TrackEvent::new(external_id, name, time)
    }

    /// Enqueue a record into the queue matching its kind.
    ///
    /// When `auto_flush` is on and the queue reaches capacity, the queue is
    /// flushed before this call returns: afterwards the record is either
    /// pending or already delivered as part of a full batch.
    pub async fn enqueue(&mut self, record: impl Into<Record>) -> Result<()> {
        let record = record.into();
        let kind = record.kind();

        match kind {
            RecordKind::User => self.users.push(record)?,
            RecordKind::Event => self.events.push(record)?,
        }

        let full = match kind {
            RecordKind::User => self.users.is_full(),
            RecordKind::Event => self.events.is_full(),
        };

        if self.config.auto_flush && full {
            self.flush_kind(kind).await?;
        }

        Ok(())
    }

    /// Flush both queues: users first, then events.
    ///
    /// Each queue is drained in requests of at most `batch_size` objects, so
    /// a queue that grew past capacity while flushing was deferred still
    /// never produces an oversize request.
    pub async fn flush(&mut self) -> Result<()> {
        self.flush_kind(RecordKind::User).await?;
        self.flush_kind(RecordKind::Event).await
    }

    /// Flush pending user-attribute updates only.
    pub async fn flush_users(&mut self) -> Result<()> {
        self.flush_kind(RecordKind::User).await
    }

    /// Flush pending track events only.
    pub async fn flush_events(&mut self) -> Result<()> {
        self.flush_kind(RecordKind::Event).await
    }

    /// Flush one queue, draining it in capacity-sized batches. No-op when
    /// empty.
    ///
    /// On delivery failure the queue keeps its undelivered records so a
    /// later flush resends them in the same order.
    async fn flush_kind(&mut self, kind: RecordKind) -> Result<()> {
        loop {
            let queue = match kind {
                RecordKind::User => &self.users,
                RecordKind::Event => &self.events,
            };

            if queue.is_empty() {
                return Ok(());
            }

            let batch_len = queue.len().min(queue.capacity());
            let payload = build_payload(&queue.records()[..batch_len], kind);

            self.stats.api_calls += 1;

            match self.transport.deliver(&payload).await {
                Ok(response) => {
                    match kind {
                        RecordKind::User => {
                            self.users.remove_front(batch_len);
                            self.stats.users_sent += batch_len;
                        }
                        RecordKind::Event => {
                            self.events.remove_front(batch_len);
                            self.stats.events_sent += batch_len;
                        }
                    }

                    tracing::debug!(
                        kind = kind.as_str(),
                        objects = batch_len,
                        attributes_processed = response.attributes_processed,
                        events_processed = response.events_processed,
                        "Delivered batch"
                    );

                    if !self.config.pause().is_zero() {
                        tokio::time::sleep(self.config.pause()).await;
                    }
                }
                Err(e) => {
                    self.stats.api_failures += 1;
                    tracing::warn!(
                        kind = kind.as_str(),
                        objects = batch_len,
                        error = %e,
                        "Failed to deliver batch, records remain queued"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Number of pending user-attribute updates
    pub fn pending_users(&self) -> usize {
        self.users.len()
    }

    /// Number of pending track events
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Whether either queue holds records
    pub fn has_pending(&self) -> bool {
        !self.users.is_empty() || !self.events.is_empty()
    }

    /// Current publishing statistics
    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    /// The configuration the client was built with
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Serialize a slice of pending records into a request body.
fn build_payload(records: &[Record], kind: RecordKind) -> BatchPayload {
    let mut payload = BatchPayload::default();

    match kind {
        RecordKind::User => {
            payload.attributes = Some(
                records
                    .iter()
                    .filter_map(|r| match r {
                        Record::User(user) => Some(user.clone()),
                        _ => None,
                    })
                    .collect(),
            );
        }
        RecordKind::Event => {
            payload.events = Some(
                records
                    .iter()
                    .filter_map(|r| match r {
                        Record::Event(event) => Some(event.clone()),
                        _ => None,
                    })
                    .collect(),
            );
        }
    }

    payload
}

/// Blocking wrapper for [`CalderaClient`]
///
/// Owns a current-thread runtime so synchronous callers can enqueue and
/// flush without touching async code.
pub struct SyncClient {
    inner: CalderaClient,
    runtime: tokio::runtime::Runtime,
}

impl SyncClient {
    /// Create a blocking client from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let runtime = build_runtime()?;
        Ok(Self {
            inner: CalderaClient::new(config)?,
            runtime,
        })
    }

    /// Create a blocking client with an injected transport.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let runtime = build_runtime()?;
        Ok(Self {
            inner: CalderaClient::with_transport(config, transport)?,
            runtime,
        })
    }

    /// Construct a user-attribute record, un-enqueued.
    pub fn user(&self, external_id: impl Into<String>) -> Result<UserRecord> {
        self.inner.user(external_id)
    }

    /// Construct a track event, un-enqueued.
    pub fn event(
        &self,
        external_id: impl Into<String>,
        name: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Result<TrackEvent> {
        self.inner.event(external_id, name, time)
    }

    /// Enqueue a record (blocking).
    pub fn enqueue(&mut self, record: impl Into<Record>) -> Result<()> {
        self.runtime.block_on(self.inner.enqueue(record))
    }

    /// Flush both queues (blocking).
    pub fn flush(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.flush())
    }

    /// Flush pending user-attribute updates only (blocking).
    pub fn flush_users(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.flush_users())
    }

    /// Flush pending track events only (blocking).
    pub fn flush_events(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.flush_events())
    }

    /// Number of pending user-attribute updates
    pub fn pending_users(&self) -> usize {
        self.inner.pending_users()
    }

    /// Number of pending track events
    pub fn pending_events(&self) -> usize {
        self.inner.pending_events()
    }

    /// Whether either queue holds records
    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    /// Current publishing statistics
    pub fn stats(&self) -> &PublishStats {
        self.inner.stats()
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Transport(format!("failed to create runtime: {}", e)))
}
