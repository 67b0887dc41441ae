//! Mapping between Rust values and datastore entities.
//!
//! [`DatastoreEntity`] is the intermediate form every derived type converts
//! to and from. Property conversions go through [`IntoDatastoreValue`] and
//! [`FromDatastoreValue`].

use std::collections::HashMap;

use crate::error::{DatastoreParseError, DatastorersError};
use crate::schema::{Entity, EntityResult, Key, Value, ValueKind};

/// Converts a Rust value into a datastore value. `None` means "leave the
/// property out of the entity".
pub trait IntoDatastoreValue {
    fn into_datastore_value(self) -> Option<Value>;
}

/// Converts a datastore property (possibly absent) into a Rust value.
pub trait FromDatastoreValue: Sized {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError>;
}

/// Unwraps a present, non-null value or reports it missing.
fn present(value: Option<Value>) -> Result<ValueKind, DatastoreParseError> {
    match value {
        Some(v) if !v.is_null() => Ok(v.kind),
        _ => Err(DatastoreParseError::NoSuchValue),
    }
}

impl IntoDatastoreValue for String {
    fn into_datastore_value(self) -> Option<Value> {
        Some(Value::string(self))
    }
}

impl IntoDatastoreValue for &str {
    fn into_datastore_value(self) -> Option<Value> {
        Some(Value::string(self))
    }
}

impl FromDatastoreValue for String {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        match present(value)? {
            ValueKind::StringValue(s) => Ok(s),
            _ => Err(DatastoreParseError::UnexpectedValueType),
        }
    }
}

impl IntoDatastoreValue for bool {
    fn into_datastore_value(self) -> Option<Value> {
        Some(Value::boolean(self))
    }
}

impl FromDatastoreValue for bool {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        match present(value)? {
            ValueKind::BooleanValue(b) => Ok(b),
            _ => Err(DatastoreParseError::UnexpectedValueType),
        }
    }
}

impl IntoDatastoreValue for i64 {
    fn into_datastore_value(self) -> Option<Value> {
        Some(Value::integer(self))
    }
}

impl FromDatastoreValue for i64 {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        match present(value)? {
            ValueKind::IntegerValue(i) => Ok(i.0),
            _ => Err(DatastoreParseError::UnexpectedValueType),
        }
    }
}

impl IntoDatastoreValue for i32 {
    fn into_datastore_value(self) -> Option<Value> {
        Some(Value::integer(i64::from(self)))
    }
}

impl FromDatastoreValue for i32 {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        let wide = i64::from_datastore_value(value)?;
        i32::try_from(wide).map_err(|_| DatastoreParseError::IntegerOutOfRange)
    }
}

impl IntoDatastoreValue for f64 {
    fn into_datastore_value(self) -> Option<Value> {
        Some(Value::double(self))
    }
}

impl FromDatastoreValue for f64 {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        match present(value)? {
            ValueKind::DoubleValue(d) => Ok(d),
            _ => Err(DatastoreParseError::UnexpectedValueType),
        }
    }
}

impl IntoDatastoreValue for Key {
    fn into_datastore_value(self) -> Option<Value> {
        Some(Value::key(self))
    }
}

impl FromDatastoreValue for Key {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        match present(value)? {
            ValueKind::KeyValue(k) => Ok(k),
            _ => Err(DatastoreParseError::UnexpectedValueType),
        }
    }
}

impl<T: IntoDatastoreValue> IntoDatastoreValue for Option<T> {
    fn into_datastore_value(self) -> Option<Value> {
        self.and_then(IntoDatastoreValue::into_datastore_value)
    }
}

impl<T: FromDatastoreValue> FromDatastoreValue for Option<T> {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        match value {
            Some(v) if !v.is_null() => T::from_datastore_value(Some(v)).map(Some),
            _ => Ok(None),
        }
    }
}

impl<T: IntoDatastoreValue> IntoDatastoreValue for Vec<T> {
    fn into_datastore_value(self) -> Option<Value> {
        let values = self
            .into_iter()
            .map(|v| v.into_datastore_value().unwrap_or_else(Value::null))
            .collect();
        Some(Value::array(values))
    }
}

impl<T: FromDatastoreValue> FromDatastoreValue for Vec<T> {
    fn from_datastore_value(value: Option<Value>) -> Result<Self, DatastoreParseError> {
        match present(value)? {
            ValueKind::ArrayValue(array) => array
                .values
                .into_iter()
                .map(|v| T::from_datastore_value(Some(v)))
                .collect(),
            _ => Err(DatastoreParseError::UnexpectedValueType),
        }
    }
}

/// The value a property filter compares against. Absent values compare as null.
#[doc(hidden)]
pub fn query_value<V: IntoDatastoreValue>(value: V) -> Value {
    value.into_datastore_value().unwrap_or_else(Value::null)
}

/// Named properties of an entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatastoreProperties {
    values: HashMap<String, Value>,
}

impl DatastoreProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`. Values that convert to nothing (`None`
    /// options) leave the property out. With `indexed` false the value is
    /// excluded from indexes; for arrays the flag goes on each element, since
    /// the service rejects it on the array itself.
    pub fn set<V: IntoDatastoreValue>(&mut self, name: &str, value: V, indexed: bool) {
        let Some(mut value) = value.into_datastore_value() else {
            self.values.remove(name);
            return;
        };
        if !indexed {
            match &mut value.kind {
                ValueKind::ArrayValue(array) => {
                    for element in array.values.iter_mut() {
                        element.exclude_from_indexes = Some(true);
                    }
                }
                _ => value.exclude_from_indexes = Some(true),
            }
        }
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Removes the property and converts it into `V`.
    pub fn take_value<V: FromDatastoreValue>(
        &mut self,
        name: &str,
    ) -> Result<V, DatastoreParseError> {
        let value = self.take(name);
        V::from_datastore_value(value).inspect_err(|e| {
            tracing::debug!(property = name, error = %e, "Failed to convert datastore property");
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, Value>> for DatastoreProperties {
    fn from(values: HashMap<String, Value>) -> Self {
        DatastoreProperties { values }
    }
}

impl From<DatastoreProperties> for HashMap<String, Value> {
    fn from(properties: DatastoreProperties) -> Self {
        properties.values
    }
}

/// An entity together with the version it was read at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatastoreEntity {
    key: Option<Key>,
    properties: DatastoreProperties,
    version: Option<i64>,
}

impl DatastoreEntity {
    pub fn new(key: Option<Key>, properties: DatastoreProperties, version: Option<i64>) -> Self {
        DatastoreEntity {
            key,
            properties,
            version,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: Option<Key>) {
        self.key = key;
    }

    pub fn version(&self) -> Option<i64> {
        self.version
    }

    pub fn set_version(&mut self, version: Option<i64>) {
        self.version = version;
    }

    pub fn properties(&self) -> &DatastoreProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut DatastoreProperties {
        &mut self.properties
    }

    pub fn into_parts(self) -> (Option<Key>, DatastoreProperties, Option<i64>) {
        (self.key, self.properties, self.version)
    }

    /// Fails with [`DatastoreParseError::KindMismatch`] unless the key (if any) is of `kind`.
    pub fn expect_kind(&self, kind: &str) -> Result<(), DatastoreParseError> {
        match self.key.as_ref().and_then(Key::kind) {
            Some(actual) if actual != kind => {
                tracing::debug!(expected = kind, actual, "Entity kind does not match");
                Err(DatastoreParseError::KindMismatch)
            }
            _ => Ok(()),
        }
    }
}

impl From<EntityResult> for DatastoreEntity {
    fn from(result: EntityResult) -> Self {
        DatastoreEntity {
            key: result.entity.key,
            properties: result.entity.properties.into(),
            version: result.version,
        }
    }
}

impl From<DatastoreEntity> for Entity {
    fn from(entity: DatastoreEntity) -> Self {
        Entity {
            key: entity.key,
            properties: entity.properties.into(),
        }
    }
}

/// A type stored as a datastore entity of kind [`Self::KIND`]. Usually
/// derived with `#[derive(DatastoreManaged)]`.
pub trait DatastoreManaged:
    Sized
    + Send
    + TryFrom<DatastoreEntity, Error = DatastorersError>
    + TryInto<DatastoreEntity, Error = DatastorersError>
{
    const KIND: &'static str;
    const PAGE_SIZE: i32;
}
