//! anchorpq-daemon - the AnchorPQ integrity verification server.
//!
//! Composition of the core library into a running service:
//!
//! - [`state::ServerState`]: one-time key initialization and the
//!   complete decapsulate → derive → open → decide request flow.
//! - [`repository::SqliteRecordRepository`]: durable canonical records.
//! - [`http`]: the axum transport surface (`/public-key`, `/verify`,
//!   `/admin/records`).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod http;
pub mod repository;
pub mod state;

pub use repository::SqliteRecordRepository;
pub use state::ServerState;
