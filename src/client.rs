//! WOW API client.
//!
//! `WowClient` issues one call per connection: build the PLATXML request,
//! exchange it over the framed transport, normalize the reply, classify
//! its response code, and hand back the data rows or a typed error.
//!
//! Failures are also reported through `tracing` - transport problems at
//! `error`, server-reported codes at `debug` - with the method name for
//! context and never the credentials.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error};

use crate::request::{self, BuildError, Credentials, ObjectKind};
use crate::response::{self, ResponseCode, Value};
use crate::transport::{self, ServerConfig, TransportError, DEFAULT_IDLE_TIMEOUT};
use crate::value::Fields;

/// Any failure of a WOW API call.
///
/// Every variant is terminal for the current call; retry policy belongs to
/// the caller.
#[derive(Debug, Error)]
pub enum WowError {
    /// Connection, framing, or socket-level failure.
    #[error("WOW API request error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be serialized.
    #[error("invalid request: {0}")]
    Request(#[from] BuildError),

    /// The response body could not be parsed into a PLATXML tree.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The server reported a recognized failure code.
    #[error("{message}")]
    Protocol {
        code: ResponseCode,
        message: String,
    },

    /// The server reported a code missing from the documented table.
    #[error("unrecognized error code: {0}")]
    UnknownCode(String),
}

/// Client for the WOW API.
///
/// Holds the server address, the acting credentials, and the idle read
/// timeout. Every call opens and closes its own connection, so a shared
/// `WowClient` is safe to use from concurrent tasks.
///
/// # Example
///
/// ```ignore
/// use platwow::{Credentials, Fields, ServerConfig, WowClient};
///
/// let client = WowClient::new(
///     ServerConfig::new("wow.example.net", 9001),
///     Credentials::new("staffuser", "secret"),
/// );
///
/// let parameters = Fields::new().field("login", "jdoe");
/// let data = client.call("GetCustData", &Fields::new(), &parameters).await?;
/// ```
pub struct WowClient {
    config: ServerConfig,
    credentials: Credentials,
    idle_timeout: Duration,
}

impl WowClient {
    pub fn new(config: ServerConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Override the 240 s idle read timeout.
    pub fn set_idle_timeout(&mut self, idle_timeout: Duration) {
        self.idle_timeout = idle_timeout;
    }

    /// Call a plat function (object kind `addusr`).
    ///
    /// On success, returns the data rows: a single row comes back bare, a
    /// row set as a [`Value::List`] (empty when the server sent none).
    pub async fn call(
        &self,
        method: &str,
        properties: &Fields,
        parameters: &Fields,
    ) -> Result<Value, WowError> {
        self.call_object(method, properties, parameters, ObjectKind::AddUsr)
            .await
    }

    /// Call a ticket function; the object kind is fixed to `wombat`.
    pub async fn call_ticket(
        &self,
        method: &str,
        properties: &Fields,
        parameters: &Fields,
    ) -> Result<Value, WowError> {
        self.call_object(method, properties, parameters, ObjectKind::Wombat)
            .await
    }

    /// Call a function on an explicit server object.
    pub async fn call_object(
        &self,
        method: &str,
        properties: &Fields,
        parameters: &Fields,
        object: ObjectKind,
    ) -> Result<Value, WowError> {
        let request = self.build_request_xml(method, properties, parameters, object)?;
        self.call_with_request(method, &request).await
    }

    /// Build the request document without sending it.
    ///
    /// For callers that need to inspect or customize a request before
    /// handing it to [`WowClient::call_with_request`].
    pub fn build_request_xml(
        &self,
        method: &str,
        properties: &Fields,
        parameters: &Fields,
        object: ObjectKind,
    ) -> Result<String, WowError> {
        Ok(request::build_request(
            method,
            properties,
            parameters,
            object,
            &self.credentials,
        )?)
    }

    /// Send a pre-built request document.
    ///
    /// `method` is used for diagnostics only.
    pub async fn call_with_request(&self, method: &str, request: &str) -> Result<Value, WowError> {
        let body = transport::exchange(&self.config, request, self.idle_timeout)
            .await
            .map_err(|e| {
                error!(method, error = %e, "WOW API request failed");
                WowError::from(e)
            })?;

        let tree = response::parse_document(&body).map_err(|e| {
            error!(method, error = %e, "WOW API response is not valid XML");
            WowError::MalformedResponse(e.to_string())
        })?;
        let tree = response::normalize(tree);

        classify(method, tree)
    }
}

/// Check the response code and extract data rows on success.
fn classify(method: &str, tree: Value) -> Result<Value, WowError> {
    let Some(code_text) = tree
        .path(&["body", "data_block", "response_code"])
        .and_then(Value::as_text)
    else {
        error!(method, "WOW API response carries no response_code");
        return Err(WowError::MalformedResponse("response_code missing".to_string()));
    };

    let response_text = tree
        .path(&["body", "data_block", "response_text"])
        .and_then(Value::as_text)
        .unwrap_or("")
        .to_string();

    match ResponseCode::parse(code_text) {
        Some(ResponseCode::Success) => Ok(response::data_rows(tree)),
        Some(code) => {
            let message = response::compose_message(code, &response_text);
            debug!(method, code = code.as_str(), %message, "WOW API call failed");
            Err(WowError::Protocol { code, message })
        }
        None => {
            let code = code_text.to_string();
            debug!(method, %code, %response_text, "WOW API returned an unrecognized code");
            Err(WowError::UnknownCode(code))
        }
    }
}
