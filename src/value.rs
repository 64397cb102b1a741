//! Field values for WOW API requests.
//!
//! A request carries two ordered bags of named fields, "properties" and
//! "parameters". A field name may smuggle an explicit type attribute after
//! a space (`"test3 type=\"integer\""`); a field value is plain text, an
//! explicit boolean `false`, or a collection of rows. Which of the two row
//! encodings applies is decided here, once, from the shape of the input -
//! not by branching deep inside the serializer.

/// A single field value in a request.
///
/// The wire protocol has two special cases on top of plain text:
///
/// - boolean `false` is sent as `type="boolean"` with the literal text
///   `false`, usually to blank an optional parameter;
/// - a collection is sent as `type="array"` with `<row>` children.
///
/// Boolean `true` has no special form: the server takes its plain text
/// rendering, so `From<bool>` maps `true` to the text `"true"`. The
/// asymmetry is part of the wire contract and must not be "fixed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Plain text, inserted into the document verbatim.
    Text(String),
    /// Explicit boolean false.
    False,
    /// A collection of rows. Only valid under `<parameters>`.
    Rows(RowSet),
}

impl FieldValue {
    /// Collection field from a flat name/value map: one row per pair,
    /// rendered as `<col_name>`/`<col_value>` children.
    pub fn name_value_rows<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        FieldValue::Rows(RowSet::NameValue(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Collection field from a list of records: one row per record,
    /// rendered with the record's own tag names.
    pub fn record_rows<K, V, R, I>(records: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        R: IntoIterator<Item = (K, V)>,
        I: IntoIterator<Item = R>,
    {
        FieldValue::Rows(RowSet::Records(
            records
                .into_iter()
                .map(|record| record.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
                .collect(),
        ))
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        if value {
            FieldValue::Text("true".to_string())
        } else {
            FieldValue::False
        }
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Vec<(String, String)>> for FieldValue {
    fn from(pairs: Vec<(String, String)>) -> Self {
        FieldValue::Rows(RowSet::NameValue(pairs))
    }
}

impl From<Vec<Vec<(String, String)>>> for FieldValue {
    fn from(records: Vec<Vec<(String, String)>>) -> Self {
        FieldValue::Rows(RowSet::Records(records))
    }
}

/// The two row encodings of a collection-valued field.
///
/// Resolved when the value is built: a flat name/value map becomes
/// `NameValue`; a list of records becomes `Records`. Row order equals the
/// input's iteration order, never reordered or deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSet {
    /// One `<row>` per pair, with `<col_name>`/`<col_value>` children.
    NameValue(Vec<(String, String)>),
    /// One `<row>` per record, with the record's tag names verbatim.
    Records(Vec<Vec<(String, String)>>),
}

/// A field name with its optional explicit type attribute.
///
/// Derived by splitting the caller-supplied key on its first space: the
/// left part is the emitted tag name, the right part (when non-empty) goes
/// verbatim inside the opening tag. An explicit attribute suppresses the
/// implied `type="boolean"` / `type="array"` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedField<'a> {
    pub name: &'a str,
    pub type_attr: Option<&'a str>,
}

impl<'a> NamedField<'a> {
    pub fn parse(key: &'a str) -> Self {
        match key.split_once(' ') {
            Some((name, attr)) if !attr.is_empty() => Self {
                name,
                type_attr: Some(attr),
            },
            Some((name, _)) => Self {
                name,
                type_attr: None,
            },
            None => Self {
                name: key,
                type_attr: None,
            },
        }
    }
}

/// An ordered bag of named fields.
///
/// Iteration order is emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a field, builder-style.
    ///
    /// ```
    /// use platwow::value::{FieldValue, Fields};
    ///
    /// let parameters = Fields::new()
    ///     .field("login", "jdoe")
    ///     .field("suspend", false)
    ///     .field("phonearray", FieldValue::name_value_rows([("number", "5551234")]));
    /// assert_eq!(parameters.len(), 3);
    /// ```
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_key_has_no_attribute() {
        let field = NamedField::parse("login");
        assert_eq!(field.name, "login");
        assert_eq!(field.type_attr, None);
    }

    #[test]
    fn key_splits_on_first_space() {
        let field = NamedField::parse("test3 type=\"integer\"");
        assert_eq!(field.name, "test3");
        assert_eq!(field.type_attr, Some("type=\"integer\""));
    }

    #[test]
    fn trailing_space_means_no_attribute() {
        let field = NamedField::parse("login ");
        assert_eq!(field.name, "login");
        assert_eq!(field.type_attr, None);
    }

    #[test]
    fn booleans_are_asymmetric() {
        // only false gets the boolean special case on the wire
        assert_eq!(FieldValue::from(false), FieldValue::False);
        assert_eq!(FieldValue::from(true), FieldValue::Text("true".to_string()));
    }

    #[test]
    fn integers_render_as_text() {
        assert_eq!(FieldValue::from(123), FieldValue::Text("123".to_string()));
    }

    #[test]
    fn flat_pairs_resolve_to_name_value_rows() {
        let value = FieldValue::name_value_rows([("number", "1234567890"), ("ph_comment", "notes")]);
        let FieldValue::Rows(RowSet::NameValue(pairs)) = value else {
            panic!("expected name/value rows");
        };
        assert_eq!(pairs[0], ("number".to_string(), "1234567890".to_string()));
        assert_eq!(pairs[1], ("ph_comment".to_string(), "notes".to_string()));
    }

    #[test]
    fn nested_records_resolve_to_tagged_rows() {
        let value = FieldValue::record_rows([
            [("columnname", "name1"), ("newvalue", "abc")],
            [("columnname", "name2"), ("newvalue", "def")],
        ]);
        let FieldValue::Rows(RowSet::Records(records)) = value else {
            panic!("expected record rows");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][0], ("columnname".to_string(), "name2".to_string()));
    }

    #[test]
    fn owned_collections_convert_by_shape() {
        let flat: FieldValue = vec![("number".to_string(), "1234567890".to_string())].into();
        assert!(matches!(flat, FieldValue::Rows(RowSet::NameValue(_))));

        let nested: FieldValue = vec![vec![("columnname".to_string(), "name1".to_string())]].into();
        assert!(matches!(nested, FieldValue::Rows(RowSet::Records(_))));
    }

    #[test]
    fn fields_preserve_insertion_order() {
        let fields = Fields::new()
            .field("b", "2")
            .field("a", "1")
            .field("b", "3");
        let keys: Vec<&str> = fields.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["b", "a", "b"]);
    }
}
