//! Response parsing, normalization, and classification.
//!
//! The server replies with a PLATXML document. It is parsed into an
//! ordered tree, normalized so that no container is ever empty (empty
//! elements become empty-string leaves, recursively), then classified by
//! `body.data_block.response_code` before data rows are extracted from
//! `body.data_block.attributes`.

use std::fmt;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// A node of a parsed response.
///
/// Child elements preserve document order; repeated sibling tags collapse
/// into a `List` at the position of the first occurrence, mirroring the
/// generic XML-to-map conversion consumers of this protocol rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Leaf text (possibly empty).
    Text(String),
    /// Element with named children, in document order.
    Map(Vec<(String, Value)>),
    /// Repeated sibling elements.
    List(Vec<Value>),
}

impl Value {
    /// Look up a named child of a `Map` node.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Walk nested map keys.
    pub fn path(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Leaf text, if this node is a leaf.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Response document failure.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("{0}")]
    Structure(&'static str),
}

/// Parse a PLATXML response body into a raw (unnormalized) tree.
///
/// The returned value holds the document element's children; the root tag
/// itself is discarded, so `body` and `header` sit at the top level. An
/// element with neither child elements nor text parses as an empty `Map`
/// and is collapsed to `""` by [`normalize`].
pub fn parse_document(xml: &str) -> Result<Value, ParseError> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    config.expand_empty_elements = true;

    // one (name, children, text) frame per open element
    let mut stack: Vec<(String, Vec<(String, Value)>, String)> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push((name, Vec::new(), String::new()));
            }
            Event::Text(text) => {
                if let Some((_, _, buffer)) = stack.last_mut() {
                    let unescaped = text.unescape().map_err(quick_xml::Error::from)?;
                    buffer.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some((_, _, buffer)) = stack.last_mut() {
                    let bytes = data.into_inner();
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
            }
            Event::End(_) => {
                let Some((name, children, text)) = stack.pop() else {
                    return Err(ParseError::Structure("unbalanced end tag"));
                };
                let node = if !children.is_empty() {
                    Value::Map(children)
                } else if !text.is_empty() {
                    Value::Text(text)
                } else {
                    Value::Map(Vec::new())
                };
                match stack.last_mut() {
                    Some((_, siblings, _)) => insert_child(siblings, name, node),
                    None if root.is_none() => root = Some(node),
                    None => return Err(ParseError::Structure("multiple document elements")),
                }
            }
            Event::Eof => break,
            // declaration, comments, processing instructions
            _ => {}
        }
    }

    root.ok_or(ParseError::Structure("empty document"))
}

/// Append a child, promoting repeated sibling tags to a `List` in place.
fn insert_child(entries: &mut Vec<(String, Value)>, name: String, node: Value) {
    if let Some((_, existing)) = entries.iter_mut().find(|(k, _)| *k == name) {
        match existing {
            Value::List(items) => items.push(node),
            _ => {
                let first = std::mem::replace(existing, Value::List(Vec::new()));
                if let Value::List(items) = existing {
                    items.push(first);
                    items.push(node);
                }
            }
        }
    } else {
        entries.push((name, node));
    }
}

/// Collapse empty containers to empty-string leaves, bottom-up.
///
/// Post-condition: no `Map` or `List` anywhere in the result is empty.
/// Normalizing an already-normalized tree is a no-op.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Text(text) => Value::Text(text),
        Value::Map(entries) => {
            let entries: Vec<_> = entries
                .into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect();
            if entries.is_empty() {
                Value::Text(String::new())
            } else {
                Value::Map(entries)
            }
        }
        Value::List(items) => {
            let items: Vec<_> = items.into_iter().map(normalize).collect();
            if items.is_empty() {
                Value::Text(String::new())
            } else {
                Value::List(items)
            }
        }
    }
}

/// Extract the data rows from a normalized response.
///
/// Rows live under `body.data_block.attributes`. Iteration follows the
/// collection's own order: a `List`'s elements, or a `Map`'s entry values.
/// Exactly one row comes back bare - a contract callers depend on - while
/// zero or several come back as a `List`.
pub fn data_rows(response: Value) -> Value {
    let attributes = take(response, "body")
        .and_then(|body| take(body, "data_block"))
        .and_then(|block| take(block, "attributes"));
    let mut rows: Vec<Value> = match attributes {
        Some(Value::List(items)) => items,
        Some(Value::Map(entries)) => entries.into_iter().map(|(_, value)| value).collect(),
        _ => Vec::new(),
    };
    if rows.len() == 1 {
        rows.remove(0)
    } else {
        Value::List(rows)
    }
}

fn take(value: Value, key: &str) -> Option<Value> {
    match value {
        Value::Map(entries) => entries.into_iter().find(|(k, _)| k == key).map(|(_, v)| v),
        _ => None,
    }
}

/// Protocol-level status codes, per the WOW API documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    ParamError,
    KeyError,
    OdbcError,
    DataError,
    XmlParseError,
    XmlError,
    LoginError,
    PropertyError,
    PermitError,
    TransIdError,
}

impl ResponseCode {
    /// Parse a wire code; unknown codes return `None`.
    pub fn parse(code: &str) -> Option<Self> {
        Some(match code {
            "SUCCESS" => Self::Success,
            "PARAM_ERROR" => Self::ParamError,
            "KEY_ERROR" => Self::KeyError,
            "ODBC_ERROR" => Self::OdbcError,
            "DATA_ERROR" => Self::DataError,
            "XML_PARSE_ERROR" => Self::XmlParseError,
            "XML_ERROR" => Self::XmlError,
            "LOGIN_ERROR" => Self::LoginError,
            "PROPERTY_ERROR" => Self::PropertyError,
            "PERMIT_ERROR" => Self::PermitError,
            "TRANSID_ERROR" => Self::TransIdError,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::ParamError => "PARAM_ERROR",
            Self::KeyError => "KEY_ERROR",
            Self::OdbcError => "ODBC_ERROR",
            Self::DataError => "DATA_ERROR",
            Self::XmlParseError => "XML_PARSE_ERROR",
            Self::XmlError => "XML_ERROR",
            Self::LoginError => "LOGIN_ERROR",
            Self::PropertyError => "PROPERTY_ERROR",
            Self::PermitError => "PERMIT_ERROR",
            Self::TransIdError => "TRANSID_ERROR",
        }
    }

    /// Human-readable category message; empty for the generic DATA_ERROR.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "",
            Self::ParamError => {
                "An invalid parameter type or an invalid number of parameters was passed"
            }
            Self::KeyError => {
                "The Platypus key in your database is expired or corrupt or you haven't \
                 purchased a license that gives you access to the web object"
            }
            Self::OdbcError => "An error occurred attempting to connect to the database",
            Self::DataError => "",
            Self::XmlParseError => "The XML request or response is not valid XML",
            Self::XmlError => "An XML parse error occurred",
            Self::LoginError => "The login information supplied is invalid",
            Self::PropertyError => "A required property is not set or is an invalid type",
            Self::PermitError => {
                "The logged in staff/customer member does not have security to run this method"
            }
            Self::TransIdError => "Unable to generate a new transaction id",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the final error message for a failure code, appending the
/// server's `response_text` when present (joined with `": "` when the
/// category message is non-empty).
pub fn compose_message(code: ResponseCode, response_text: &str) -> String {
    let mut message = code.message().to_string();
    if !response_text.is_empty() {
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(response_text);
    }
    message
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    fn wrap_data_block(inner: Value) -> Value {
        map(vec![
            ("header", text("")),
            ("body", map(vec![("data_block", inner)])),
        ])
    }

    #[test]
    fn leaf_elements_parse_to_text() {
        let tree = parse_document(
            "<?xml version=\"1.0\"?>\n<PLATXML><body><data_block>\
             <response_code>SUCCESS</response_code>\
             </data_block></body></PLATXML>",
        )
        .unwrap();
        assert_eq!(
            tree.path(&["body", "data_block", "response_code"])
                .and_then(Value::as_text),
            Some("SUCCESS"),
        );
    }

    #[test]
    fn empty_elements_parse_to_empty_maps() {
        let tree = parse_document("<PLATXML><header></header><body/></PLATXML>").unwrap();
        assert_eq!(tree.get("header"), Some(&Value::Map(Vec::new())));
        assert_eq!(tree.get("body"), Some(&Value::Map(Vec::new())));
    }

    #[test]
    fn repeated_siblings_promote_to_a_list_in_place() {
        let tree = parse_document(
            "<PLATXML><data><row>1</row><other>x</other><row>2</row><row>3</row></data></PLATXML>",
        )
        .unwrap();
        let data = tree.get("data").unwrap();
        // the list sits at the first occurrence's position
        let Value::Map(entries) = data else {
            panic!("expected map, got {data:?}");
        };
        assert_eq!(entries[0].0, "row");
        assert_eq!(entries[1].0, "other");
        assert_eq!(
            entries[0].1,
            Value::List(vec![text("1"), text("2"), text("3")]),
        );
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(parse_document("this is not xml<<<").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_document("<PLATXML><body></PLATXML>").is_err());
    }

    #[test]
    fn normalize_collapses_empty_containers_at_every_depth() {
        let raw = map(vec![
            ("a", text("x")),
            (
                "b",
                map(vec![("c", text("y")), ("d", Value::Map(Vec::new()))]),
            ),
            ("e", Value::Map(Vec::new())),
        ]);
        let expected = map(vec![
            ("a", text("x")),
            ("b", map(vec![("c", text("y")), ("d", text(""))])),
            ("e", text("")),
        ]);
        assert_eq!(normalize(raw), expected);
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = map(vec![
            ("a", text("x")),
            ("b", map(vec![("c", Value::List(Vec::new()))])),
        ]);
        let once = normalize(raw);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn single_attributes_row_is_unwrapped() {
        let row = map(vec![("servicename", text("dialup")), ("cost", text("9.95"))]);
        let response = wrap_data_block(map(vec![
            ("response_code", text("SUCCESS")),
            ("attributes", Value::List(vec![row.clone()])),
        ]));
        assert_eq!(data_rows(response), row);
    }

    #[test]
    fn multiple_attributes_rows_stay_a_list() {
        let first = map(vec![("servicename", text("dialup"))]);
        let second = map(vec![("servicename", text("dsl"))]);
        let response = wrap_data_block(map(vec![
            ("response_code", text("SUCCESS")),
            ("attributes", Value::List(vec![first.clone(), second.clone()])),
        ]));
        assert_eq!(data_rows(response), Value::List(vec![first, second]));
    }

    #[test]
    fn map_attributes_iterate_entry_values() {
        let response = wrap_data_block(map(vec![
            ("response_code", text("SUCCESS")),
            (
                "attributes",
                map(vec![
                    ("row", map(vec![("a", text("1"))])),
                    ("extra", map(vec![("b", text("2"))])),
                ]),
            ),
        ]));
        assert_eq!(
            data_rows(response),
            Value::List(vec![
                map(vec![("a", text("1"))]),
                map(vec![("b", text("2"))]),
            ]),
        );
    }

    #[test]
    fn missing_or_scalar_attributes_mean_no_rows() {
        let missing = wrap_data_block(map(vec![("response_code", text("SUCCESS"))]));
        assert_eq!(data_rows(missing), Value::List(Vec::new()));

        // an empty <attributes></attributes> normalizes to "" and is not a
        // collection
        let scalar = wrap_data_block(map(vec![
            ("response_code", text("SUCCESS")),
            ("attributes", text("")),
        ]));
        assert_eq!(data_rows(scalar), Value::List(Vec::new()));
    }

    #[test]
    fn code_table_round_trips() {
        for code in [
            "SUCCESS",
            "PARAM_ERROR",
            "KEY_ERROR",
            "ODBC_ERROR",
            "DATA_ERROR",
            "XML_PARSE_ERROR",
            "XML_ERROR",
            "LOGIN_ERROR",
            "PROPERTY_ERROR",
            "PERMIT_ERROR",
            "TRANSID_ERROR",
        ] {
            let parsed = ResponseCode::parse(code).expect(code);
            assert_eq!(parsed.as_str(), code);
        }
        assert_eq!(ResponseCode::parse("FROB_ERROR"), None);
    }

    #[test]
    fn login_error_message_includes_response_text() {
        let message = compose_message(ResponseCode::LoginError, "bad pw");
        assert_eq!(message, "The login information supplied is invalid: bad pw");
    }

    #[test]
    fn generic_data_error_is_just_the_response_text() {
        assert_eq!(compose_message(ResponseCode::DataError, "row locked"), "row locked");
        assert_eq!(compose_message(ResponseCode::DataError, ""), "");
    }

    #[test]
    fn message_without_response_text_has_no_separator() {
        assert_eq!(
            compose_message(ResponseCode::OdbcError, ""),
            "An error occurred attempting to connect to the database",
        );
    }
}
