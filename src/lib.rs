//! Thread-safe response writer for streaming network transports.

pub mod channel;
pub mod config;
pub mod error;
pub mod observability;
pub mod response;

pub use channel::{Channel, Frame, WriteHandle};
pub use config::ResponderConfig;
pub use error::{ResponseError, RestServiceError, RestServiceErrorCode};
pub use response::{ConnectionHandler, ResponseHandler};
