//! Serialization codec
//!
//! Values are persisted as a `(code_name, bytes)` pair. Types without a
//! serializer of their own can delegate to another type through
//! `serialize_as`; values of types with neither are simply not persisted.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{TypeKey, Value};
use crate::errors::CodecError;
use crate::registry::TypeRegistry;

/// Byte codec for values of one registered type.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn deserialize(&self, native: TypeKey, bytes: &[u8]) -> Result<Value, CodecError>;

    /// Deserialization must happen on the primary execution context.
    fn must_sync_deserialization(&self) -> bool {
        false
    }
}

/// Tagged payload as written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedValue {
    pub code_name: String,
    pub bytes: Vec<u8>,
}

impl SerializedValue {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// `bincode` codec for any serde type.
pub struct BincodeSerializer<T> {
    synchronous: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeSerializer<T> {
    pub fn new() -> Self {
        Self {
            synchronous: false,
            _marker: PhantomData,
        }
    }

    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }
}

impl<T> Default for BincodeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BincodeSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BincodeSerializer")
            .field("type", &std::any::type_name::<T>())
            .field("synchronous", &self.synchronous)
            .finish()
    }
}

impl<T> Serializer for BincodeSerializer<T>
where
    T: Serialize + DeserializeOwned + Any + Send + Sync,
{
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let data = value.downcast_ref::<T>().ok_or(CodecError::UnexpectedPayload {
            expected: std::any::type_name::<T>(),
        })?;
        Ok(bincode::serialize(data)?)
    }

    fn deserialize(&self, native: TypeKey, bytes: &[u8]) -> Result<Value, CodecError> {
        let data: T = bincode::deserialize(bytes)?;
        Ok(Value::new(native, data))
    }

    fn must_sync_deserialization(&self) -> bool {
        self.synchronous
    }
}

/// JSON codec for any serde type.
pub struct JsonSerializer<T> {
    synchronous: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            synchronous: false,
            _marker: PhantomData,
        }
    }

    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSerializer")
            .field("type", &std::any::type_name::<T>())
            .field("synchronous", &self.synchronous)
            .finish()
    }
}

impl<T> Serializer for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned + Any + Send + Sync,
{
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let data = value.downcast_ref::<T>().ok_or(CodecError::UnexpectedPayload {
            expected: std::any::type_name::<T>(),
        })?;
        Ok(serde_json::to_vec(data)?)
    }

    fn deserialize(&self, native: TypeKey, bytes: &[u8]) -> Result<Value, CodecError> {
        let data: T = serde_json::from_slice(bytes)?;
        Ok(Value::new(native, data))
    }

    fn must_sync_deserialization(&self) -> bool {
        self.synchronous
    }
}

impl TypeRegistry {
    /// Encode a value, following `serialize_as` redirections.
    ///
    /// Returns `None` for values that cannot be persisted. Values whose
    /// serializer requires synchronous deserialization should be serialized
    /// on the primary context; this is only checked with a warning.
    pub fn serialize(&self, value: &Value) -> Option<SerializedValue> {
        let mut entry = self.closest_entry(value.ty())?;
        let mut value = value.clone();
        let mut hops = 0;

        while let Some(target) = entry.serialize_as() {
            hops += 1;
            if hops > self.entries.len() {
                warn!("serialize-as loop starting at '{}'", entry.code_name());
                return None;
            }
            value = self.convert(&value, target)?;
            entry = self.exact_entry(target)?;
        }

        let serializer = entry.serializer()?;
        if serializer.must_sync_deserialization() && !self.is_primary_context() {
            warn!(
                "'{}' values must be serialized on the primary context",
                entry.code_name()
            );
        }

        match serializer.serialize(&value) {
            Ok(bytes) => Some(SerializedValue {
                code_name: entry.code_name().to_string(),
                bytes,
            }),
            Err(e) => {
                warn!("Failed to serialize a '{}' value: {}", entry.code_name(), e);
                None
            }
        }
    }

    /// Decode a payload. An unknown code name means the value is lost.
    pub fn deserialize(&self, code_name: &str, bytes: &[u8]) -> Option<Value> {
        let Some(entry) = self.entry_by_code_name(code_name) else {
            debug!("No type entry named '{}', value lost", code_name);
            return None;
        };
        let serializer = entry.serializer()?;

        match serializer.deserialize(entry.native(), bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to deserialize a '{}' value: {}", code_name, e);
                None
            }
        }
    }

    pub fn deserialize_payload(&self, payload: &SerializedValue) -> Option<Value> {
        self.deserialize(&payload.code_name, &payload.bytes)
    }
}
