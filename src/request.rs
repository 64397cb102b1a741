//! PLATXML request serialization.
//!
//! Builds the exact document the WOW server expects: a fixed skeleton of
//! login and routing tags followed by an optional `<parameters>` block and
//! then an optional `<properties>` block. Generation is deterministic and
//! order-preserving; an empty block is omitted entirely, never emitted.
//!
//! Field text is inserted without XML escaping. The protocol assumes a
//! trusted caller, and the server's own parser predates entity handling.

use std::fmt;

use thiserror::Error;

use crate::value::{FieldValue, Fields, NamedField, RowSet};

/// Which server object a call addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectKind {
    /// Plat functions (the default).
    #[default]
    AddUsr,
    /// Ticket functions.
    Wombat,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::AddUsr => "addusr",
            ObjectKind::Wombat => "wombat",
        }
    }
}

/// Login credentials injected into every request at serialization time.
///
/// Supplied by the embedding application's identity context; never stored
/// on a request. `Debug` redacts the password so credentials cannot leak
/// through error or log formatting.
#[derive(Clone, serde::Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Request construction failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Properties carry scalars and booleans only; row collections are a
    /// parameters-block concept.
    #[error("property {0:?} cannot carry a row collection")]
    RowsInProperties(String),
}

/// Serialize one request document.
///
/// `parameters` precede `properties` in the output. Each block appears
/// only when its field set is non-empty.
///
/// # Errors
///
/// Returns [`BuildError::RowsInProperties`] if a properties field carries
/// a row collection.
pub fn build_request(
    method: &str,
    properties: &Fields,
    parameters: &Fields,
    object: ObjectKind,
    credentials: &Credentials,
) -> Result<String, BuildError> {
    let mut out = String::with_capacity(512);
    out.push_str("<?xml version=\"1.0\"?>\n");
    out.push_str("<PLATXML>\n<header></header>\n<body>\n<data_block>\n");
    out.push_str("<protocol>Plat</protocol>\n");
    out.push_str(&format!("<object>{}</object>\n", object.as_str()));
    out.push_str(&format!("<action>{method}</action>\n"));
    out.push_str(&format!("<username>{}</username>\n", credentials.username));
    out.push_str(&format!("<password>{}</password>\n", credentials.password));
    out.push_str("<logintype>staff</logintype>\n");

    if !parameters.is_empty() {
        out.push_str("<parameters>\n");
        for (key, value) in parameters.iter() {
            write_field(&mut out, key, value, true)?;
        }
        out.push_str("</parameters>\n");
    }

    if !properties.is_empty() {
        out.push_str("<properties>\n");
        for (key, value) in properties.iter() {
            write_field(&mut out, key, value, false)?;
        }
        out.push_str("</properties>\n");
    }

    out.push_str("</data_block>\n</body>\n</PLATXML>\n");
    Ok(out)
}

fn write_field(
    out: &mut String,
    key: &str,
    value: &FieldValue,
    rows_allowed: bool,
) -> Result<(), BuildError> {
    let field = NamedField::parse(key);
    if !rows_allowed && matches!(value, FieldValue::Rows(_)) {
        return Err(BuildError::RowsInProperties(field.name.to_string()));
    }

    out.push('<');
    out.push_str(field.name);
    match (field.type_attr, value) {
        // an explicit attribute always wins, even over a row collection
        (Some(attr), _) => {
            out.push(' ');
            out.push_str(attr);
        }
        (None, FieldValue::False) => out.push_str(" type=\"boolean\""),
        (None, FieldValue::Rows(_)) => out.push_str(" type=\"array\""),
        (None, FieldValue::Text(_)) => {}
    }
    out.push('>');

    match value {
        FieldValue::Text(text) => out.push_str(text),
        FieldValue::False => out.push_str("false"),
        FieldValue::Rows(rows) => write_rows(out, rows),
    }

    out.push_str("</");
    out.push_str(field.name);
    out.push_str(">\n");
    Ok(())
}

/// The row sequence follows the opening field tag directly; each `<row>`
/// and each row child sits on its own line.
fn write_rows(out: &mut String, rows: &RowSet) {
    match rows {
        RowSet::NameValue(pairs) => {
            for (name, value) in pairs {
                out.push_str("<row>\n");
                out.push_str(&format!("<col_name>{name}</col_name>\n"));
                out.push_str(&format!("<col_value>{value}</col_value>\n"));
                out.push_str("</row>\n");
            }
        }
        RowSet::Records(records) => {
            for record in records {
                out.push_str("<row>\n");
                for (tag, value) in record {
                    out.push_str(&format!("<{tag}>{value}</{tag}>\n"));
                }
                out.push_str("</row>\n");
            }
        }
    }
}
