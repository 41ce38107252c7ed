//! # caldera-sink
//!
//! Batching sink client for the Caldera engagement platform.
//!
//! Callers hand the client one user-attribute update or track event at a
//! time; the client accumulates them in bounded queues and submits them to
//! the bulk `/users/track` endpoint as the queues fill, so nothing upstream
//! has to track batch boundaries. The endpoint accepts at most 75 objects of
//! each kind per call, and the queues enforce that limit.
//!
//! Delivery goes through a [`Transport`]: live HTTP in normal operation, a
//! recording no-op in dry-run mode (`send = false`), so test and production
//! runs exercise the same code path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use caldera_sink::{CalderaClient, Config};
//!
//! # async fn demo() -> caldera_sink::Result<()> {
//! let config = Config::new("https://rest.caldera.example", "cs-live-xxxxxxxx");
//! let mut client = CalderaClient::new(config)?;
//!
//! let user = client.user("user-42")?.set("plan", "pro").set("seats", 4);
//! client.enqueue(user).await?;
//!
//! // Deliver whatever is still pending
//! client.flush().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Synchronous callers can use [`SyncClient`], which wraps the same client
//! behind blocking methods.

// Re-export commonly used items at the crate root
pub use client::{CalderaClient, PublishStats, SyncClient};
pub use config::{Config, MAX_BATCH_SIZE};
pub use error::{Error, Result};
pub use queue::BatchQueue;
pub use record::{AttrValue, Attributes, Record, RecordKind, TrackEvent, UserRecord};
pub use transport::{BatchPayload, HttpTransport, NoopTransport, TrackResponse, Transport};

// Public modules
pub mod campaigns;
pub mod client;
pub mod config;
pub mod error;
pub mod queue;
pub mod record;
pub mod transport;
