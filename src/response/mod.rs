//! Response lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Request processing (any thread)
//!     → handler.rs (set_header / add_to_body / flush / on_request_complete)
//!     → state.rs (one-shot flags, metadata guard, write guard)
//!     → Channel::write
//!     → tracker.rs (latency on success, close connection on failure)
//!
//! Failure path:
//!     on_request_complete(Some(cause))
//!     → error_map.rs (cause → status + reason)
//!     → full error response, if metadata not yet sent
//! ```
//!
//! # Design Decisions
//! - Metadata goes out lazily, exactly once, before any body chunk
//! - Writes are serialized internally; no ordering against other channel owners
//! - Completion is idempotent and always ends in a single scheduled close
//! - The peer sees a well-formed response or a closed connection, never half of one

pub mod connection;
pub mod error_map;
pub mod handler;
pub mod state;
pub mod tracker;

pub use connection::{ConnectionHandler, ConnectionId};
pub use error_map::ErrorResponse;
pub use handler::ResponseHandler;
pub use state::ResponseState;
pub use tracker::WriteTracker;
