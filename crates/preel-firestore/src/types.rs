//! Firestore REST API wire types.
//!
//! Firestore's JSON encoding tags every value with its type
//! (`stringValue`, `integerValue`, ...) and carries int64 as strings.
//! The conversion traits at the bottom keep that noise out of the
//! repositories.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Firestore document value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// Firestore encodes int64 as a JSON string
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

impl Value {
    /// Build a map value from a field map
    pub fn map(fields: HashMap<String, Value>) -> Self {
        Value::MapValue(MapValue {
            fields: Some(fields),
        })
    }

    /// Build an array value from elements
    pub fn array(values: Vec<Value>) -> Self {
        Value::ArrayValue(ArrayValue {
            values: Some(values),
        })
    }

    /// Inner fields if this is a map value
    pub fn map_fields(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::MapValue(map) => map.fields.as_ref(),
            _ => None,
        }
    }

    /// Inner string if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ArrayValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MapValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Value>>,
}

/// A Firestore document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Document {
    /// Full resource name, set by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Value>>,

    #[serde(rename = "createTime", skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,

    #[serde(rename = "updateTime", skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Document body for a write, fields only
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Look up a top-level field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.as_ref()?.get(name)
    }

    /// Document id, the last segment of the resource name
    pub fn doc_id(&self) -> Option<&str> {
        self.name.as_deref()?.rsplit('/').next()
    }
}

/// Response from listing documents
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

// =============================================================================
// Structured Queries
// =============================================================================

/// A structured query over one collection
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,

    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

impl StructuredQuery {
    /// Query over a single collection id
    pub fn collection(id: impl Into<String>) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: id.into(),
            }],
            filter: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

/// Query filter, either a single field comparison or an AND of several
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    CompositeFilter(CompositeFilter),
    FieldFilter(FieldFilter),
}

impl Filter {
    /// `field == value` filter
    pub fn field_equals(path: impl Into<String>, value: Value) -> Self {
        Filter::FieldFilter(FieldFilter {
            field: FieldReference {
                field_path: path.into(),
            },
            op: "EQUAL".to_string(),
            value,
        })
    }

    /// AND of several filters
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::CompositeFilter(CompositeFilter {
            op: "AND".to_string(),
            filters,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositeFilter {
    pub op: String,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

/// Request body for `documents:runQuery`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

/// One element of the `runQuery` response stream.
///
/// Elements without a `document` are progress markers and get skipped.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub read_time: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
}

// =============================================================================
// Value Conversions
// =============================================================================

/// Trait for converting Rust types to Firestore values
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

/// Trait for converting Firestore values to Rust types
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue((*self).to_string())
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Vec<T> {
    fn to_firestore_value(&self) -> Value {
        Value::array(self.iter().map(|v| v.to_firestore_value()).collect())
    }
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for f64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::DoubleValue(f) => Some(*f),
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) | Value::StringValue(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }
}

impl<T: FromFirestoreValue> FromFirestoreValue for Vec<T> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::ArrayValue(arr) => arr
                .values
                .as_ref()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(T::from_firestore_value)
                        .collect::<Vec<T>>()
                })
                .or_else(|| Some(Vec::new())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_serialization_shapes() {
        let json = serde_json::to_string(&Value::StringValue("abc".to_string())).unwrap();
        assert_eq!(json, r#"{"stringValue":"abc"}"#);

        let json = serde_json::to_string(&42i64.to_firestore_value()).unwrap();
        assert_eq!(json, r#"{"integerValue":"42"}"#);

        let json = serde_json::to_string(&Value::BooleanValue(true)).unwrap();
        assert_eq!(json, r#"{"booleanValue":true}"#);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let now = Utc::now();
        let value = now.to_firestore_value();
        let back = DateTime::<Utc>::from_firestore_value(&value).unwrap();
        assert_eq!(back, now);
    }

    #[test]
    fn test_string_vec_roundtrip() {
        let days = vec!["Monday".to_string(), "Thursday".to_string()];
        let value = days.to_firestore_value();
        let back = Vec::<String>::from_firestore_value(&value).unwrap();
        assert_eq!(back, days);
    }

    #[test]
    fn test_filter_wire_shape() {
        let filter = Filter::and(vec![
            Filter::field_equals("user_id", Value::StringValue("u1".to_string())),
            Filter::field_equals("is_active", Value::BooleanValue(true)),
        ]);
        let query = StructuredQuery::collection("schedules")
            .with_filter(filter)
            .with_limit(5);
        let json = serde_json::to_value(RunQueryRequest {
            structured_query: query,
        })
        .unwrap();

        assert_eq!(
            json["structuredQuery"]["from"][0]["collectionId"],
            "schedules"
        );
        assert_eq!(
            json["structuredQuery"]["where"]["compositeFilter"]["op"],
            "AND"
        );
        assert_eq!(
            json["structuredQuery"]["where"]["compositeFilter"]["filters"][0]["fieldFilter"]
                ["field"]["fieldPath"],
            "user_id"
        );
        assert_eq!(json["structuredQuery"]["limit"], 5);
    }

    #[test]
    fn test_document_helpers() {
        let mut fields = HashMap::new();
        fields.insert("email".to_string(), Value::StringValue("a@b.c".to_string()));
        let doc = Document {
            name: Some(
                "projects/p/databases/(default)/documents/schedules/abc123".to_string(),
            ),
            fields: Some(fields),
            create_time: None,
            update_time: None,
        };

        assert_eq!(doc.doc_id(), Some("abc123"));
        assert_eq!(doc.field("email").and_then(Value::as_str), Some("a@b.c"));
        assert!(doc.field("missing").is_none());
    }

    #[test]
    fn test_run_query_response_skips_markers() {
        let body = r#"[{"readTime":"2026-01-01T00:00:00Z"},{"document":{"name":"projects/p/databases/(default)/documents/videos/v1"}}]"#;
        let parsed: Vec<RunQueryResponse> = serde_json::from_str(body).unwrap();
        let docs: Vec<Document> = parsed.into_iter().filter_map(|r| r.document).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_id(), Some("v1"));
    }
}
