//! # schema: Datastore v1 REST wire types
//!
//! Request and response bodies exchanged with the Datastore v1 JSON API.
//! Field names follow the API (camelCase on the wire), absent optionals are
//! omitted, and every 64-bit integer travels as a JSON string.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serde adapters for int64 values, which the API encodes as strings.
pub(crate) mod int64 {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(Int64Visitor)
    }

    struct Int64Visitor;

    impl<'de> Visitor<'de> for Int64Visitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an int64 as a string or number")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom(format!("{v} overflows int64")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.parse::<i64>()
                .map_err(|e| E::custom(format!("invalid int64 {v:?}: {e}")))
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super")] i64);

        pub fn serialize<S: Serializer>(
            value: &Option<i64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<i64>, D::Error> {
            Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
}

/// One (kind, identifier) step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathElement {
    pub kind: String,
    #[serde(
        default,
        with = "int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Entity key. The last path element identifies the entity itself; any
/// preceding elements are its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<PartitionId>,
    #[serde(default)]
    pub path: Vec<PathElement>,
}

impl Key {
    fn single(kind: &str, id: Option<i64>, name: Option<String>) -> Self {
        Key {
            partition_id: None,
            path: vec![PathElement {
                kind: kind.to_string(),
                id,
                name,
            }],
        }
    }

    pub fn from_id(kind: &str, id: i64) -> Self {
        Self::single(kind, Some(id), None)
    }

    pub fn from_name(kind: &str, name: impl Into<String>) -> Self {
        Self::single(kind, None, Some(name.into()))
    }

    /// A key the datastore completes with an allocated id on insert.
    pub fn incomplete(kind: &str) -> Self {
        Self::single(kind, None, None)
    }

    fn leaf(&self) -> Option<&PathElement> {
        self.path.last()
    }

    pub fn kind(&self) -> Option<&str> {
        self.leaf().map(|e| e.kind.as_str())
    }

    pub fn id(&self) -> Option<i64> {
        self.leaf().and_then(|e| e.id)
    }

    pub fn name(&self) -> Option<&str> {
        self.leaf().and_then(|e| e.name.as_deref())
    }

    /// True when the entity's own path element carries an id or a name.
    pub fn is_complete(&self) -> bool {
        self.leaf()
            .map(|e| e.id.is_some() || e.name.is_some())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

/// Newtype carrying an int64 through the string encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Int64(#[serde(with = "int64")] pub i64);

/// The single typed payload of a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(Int64),
    DoubleValue(f64),
    TimestampValue(String),
    KeyValue(Key),
    StringValue(String),
    BlobValue(String),
    GeoPointValue(LatLng),
    EntityValue(Entity),
    ArrayValue(ArrayValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_from_indexes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<i32>,
    #[serde(flatten)]
    pub kind: ValueKind,
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Value {
            exclude_from_indexes: None,
            meaning: None,
            kind,
        }
    }

    pub fn null() -> Self {
        Self::new(ValueKind::NullValue(()))
    }

    pub fn boolean(v: bool) -> Self {
        Self::new(ValueKind::BooleanValue(v))
    }

    pub fn integer(v: i64) -> Self {
        Self::new(ValueKind::IntegerValue(Int64(v)))
    }

    pub fn double(v: f64) -> Self {
        Self::new(ValueKind::DoubleValue(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::new(ValueKind::StringValue(v.into()))
    }

    pub fn key(v: Key) -> Self {
        Self::new(ValueKind::KeyValue(v))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::ArrayValue(ArrayValue { values }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::NullValue(()))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityResult {
    pub entity: Entity,
    #[serde(
        default,
        with = "int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

impl ReadOptions {
    pub fn in_transaction(transaction: impl Into<String>) -> Self {
        ReadOptions {
            transaction: Some(transaction.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_options: Option<ReadOptions>,
    pub keys: Vec<Key>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    #[serde(default)]
    pub found: Vec<EntityResult>,
    #[serde(default)]
    pub missing: Vec<EntityResult>,
    #[serde(default)]
    pub deferred: Vec<Key>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindExpression {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyReference {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyOperator {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    NotEqual,
    HasAncestor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: PropertyReference,
    pub op: PropertyOperator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub property_filter: PropertyFilter,
}

impl Filter {
    pub fn equal(property: &str, value: Value) -> Self {
        Filter {
            property_filter: PropertyFilter {
                property: PropertyReference {
                    name: property.to_string(),
                },
                op: PropertyOperator::Equal,
                value,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub kind: Vec<KindExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_options: Option<ReadOptions>,
    pub query: Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoreResultsType {
    MoreResultsTypeUnspecified,
    NotFinished,
    MoreResultsAfterLimit,
    MoreResultsAfterCursor,
    NoMoreResults,
}

impl MoreResultsType {
    /// Whether the query may yield further entities past this batch.
    pub fn may_have_more(self) -> bool {
        matches!(
            self,
            MoreResultsType::NotFinished
                | MoreResultsType::MoreResultsAfterLimit
                | MoreResultsType::MoreResultsAfterCursor
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_result_type: Option<String>,
    #[serde(default)]
    pub entity_results: Vec<EntityResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
    pub more_results: MoreResultsType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunQueryResponse {
    pub batch: QueryResultBatch,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeginTransactionRequest {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginTransactionResponse {
    pub transaction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitMode {
    Transactional,
    NonTransactional,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upsert: Option<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Key>,
    #[serde(
        default,
        with = "int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    #[serde(
        default,
        with = "int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<i64>,
    #[serde(default)]
    pub conflict_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub mode: CommitMode,
    pub mutations: Vec<Mutation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub mutation_results: Vec<MutationResult>,
    #[serde(default)]
    pub index_updates: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub transaction: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RollbackResponse {}
