//! Tokens and the payload kinds they carry

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Shared mutable mapping carried by a context token.
///
/// Cloning the handle shares the underlying mapping, so an action can
/// mutate workflow state in place while the kernel retains the owning
/// token for restore and pass-through routing. A context place has
/// capacity 1 and every user consumes-and-returns its single token, so
/// at most one firing holds the mapping at a time.
#[derive(Clone, Default)]
pub struct ContextHandle {
    entries: Arc<Mutex<Map<String, Value>>>,
}

impl ContextHandle {
    /// Create a handle over an initially empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Insert a value, returning the previous one if present.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.lock().insert(key.into(), value)
    }

    /// Apply a closure to the mapping under its lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        f(&mut self.entries.lock())
    }

    /// Copy the current mapping out for inspection.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.lock().clone()
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextHandle")
            .field(&*self.entries.lock())
            .finish()
    }
}

/// Payload kinds a token can carry.
#[derive(Debug, Clone)]
pub enum TokenPayload {
    /// Business data flowing through channels
    Data(Value),
    /// Permit tagged with the resource it belongs to
    Resource(String),
    /// Shared workflow state
    Context(ContextHandle),
    /// Labelled marker with no business data (completion signals,
    /// generated fill tokens)
    Synthetic(String),
}

/// An opaque payload carrier flowing between places.
///
/// Identity is the `id` handle, stable for diagnostics; equality of
/// payloads carries no meaning to the kernel. Tokens are moved between
/// places as a single logical act during firing.
#[derive(Debug, Clone)]
pub struct Token {
    id: String,
    payload: TokenPayload,
}

impl Token {
    /// A token carrying business data.
    pub fn data(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            payload: TokenPayload::Data(value),
        }
    }

    /// A permit token tagged with its resource id.
    pub fn resource(id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: TokenPayload::Resource(resource_id.into()),
        }
    }

    /// A token carrying the shared context mapping.
    pub fn context(id: impl Into<String>, handle: ContextHandle) -> Self {
        Self {
            id: id.into(),
            payload: TokenPayload::Context(handle),
        }
    }

    /// A labelled marker token.
    pub fn synthetic(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: TokenPayload::Synthetic(label.into()),
        }
    }

    /// Stable identifier of this token.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The carried payload.
    pub fn payload(&self) -> &TokenPayload {
        &self.payload
    }

    /// The data value, if this token carries one.
    pub fn as_data(&self) -> Option<&Value> {
        match &self.payload {
            TokenPayload::Data(value) => Some(value),
            _ => None,
        }
    }

    /// The resource id, if this token is a permit.
    pub fn as_resource(&self) -> Option<&str> {
        match &self.payload {
            TokenPayload::Resource(resource_id) => Some(resource_id),
            _ => None,
        }
    }

    /// The shared context handle, if this token carries one.
    pub fn as_context(&self) -> Option<&ContextHandle> {
        match &self.payload {
            TokenPayload::Context(handle) => Some(handle),
            _ => None,
        }
    }
}
