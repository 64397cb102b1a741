//! Client library for the Platypus WOW API.
//!
//! The WOW API is a line-oriented, length-framed TCP protocol carrying a
//! custom XML dialect (`PLATXML`). Each call opens a fresh plaintext
//! connection, sends one `content-length:`-framed request, blocks until
//! the framed response is fully read, and closes after a `QUIT` handshake.
//!
//! - `value` - field values and the two row encodings of collection fields
//! - `request` - PLATXML request serialization
//! - `transport` - framed exchange over one TCP connection per call
//! - `response` - response normalization, classification, row extraction
//! - `client` - the [`WowClient`] call surface
//!
//! # Usage
//!
//! ```ignore
//! use platwow::{Credentials, Fields, ServerConfig, WowClient};
//!
//! let client = WowClient::new(
//!     ServerConfig::new("wow.example.net", 9001),
//!     Credentials::new("staffuser", "secret"),
//! );
//!
//! // a plat function with one parameter
//! let parameters = Fields::new().field("login", "jdoe");
//! let data = client.call("GetCustData", &Fields::new(), &parameters).await?;
//!
//! // ticket functions go through the wombat object
//! let statuses = client
//!     .call_ticket("ticket_Get_Status_List", &Fields::new(), &Fields::new())
//!     .await?;
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod transport;
pub mod value;

pub use client::{WowClient, WowError};
pub use request::{BuildError, Credentials, ObjectKind};
pub use response::{ResponseCode, Value};
pub use transport::{ServerConfig, TransportError};
pub use value::{FieldValue, Fields, RowSet};
