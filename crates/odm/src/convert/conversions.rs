//! Custom value conversions.
//!
//! A converter attached to a property wins over everything else. A converter
//! registered in [`CustomConversions`] applies to every property declaring the
//! matching value type.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Converts a property value between its serde form and its document form.
pub trait PropertyValueConverter: Send + Sync {
    /// Converts the serde value into the value written to the document.
    fn write(&self, value: &Value) -> Result<Value, String>;

    /// Converts a document value back into the serde value.
    fn read(&self, value: &Value) -> Result<Value, String>;
}

/// A converter built from two closures.
pub struct FnConverter<W, R> {
    write: W,
    read: R,
}

impl<W, R> FnConverter<W, R>
where
    W: Fn(&Value) -> Result<Value, String> + Send + Sync,
    R: Fn(&Value) -> Result<Value, String> + Send + Sync,
{
    /// Creates a converter from write and read closures.
    pub fn new(write: W, read: R) -> Self {
        Self { write, read }
    }
}

impl<W, R> PropertyValueConverter for FnConverter<W, R>
where
    W: Fn(&Value) -> Result<Value, String> + Send + Sync,
    R: Fn(&Value) -> Result<Value, String> + Send + Sync,
{
    fn write(&self, value: &Value) -> Result<Value, String> {
        (self.write)(value)
    }

    fn read(&self, value: &Value) -> Result<Value, String> {
        (self.read)(value)
    }
}

/// Type-level converters keyed by the Rust value type.
#[derive(Clone, Default)]
pub struct CustomConversions {
    converters: HashMap<TypeId, (&'static str, Arc<dyn PropertyValueConverter>)>,
}

impl CustomConversions {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter for values of type `V`, replacing any earlier one.
    pub fn register<V: 'static>(mut self, converter: Arc<dyn PropertyValueConverter>) -> Self {
        self.converters
            .insert(TypeId::of::<V>(), (type_name::<V>(), converter));
        self
    }

    /// Looks up the converter for a value type.
    pub fn get(&self, type_id: TypeId) -> Option<&Arc<dyn PropertyValueConverter>> {
        self.converters.get(&type_id).map(|(_, converter)| converter)
    }

    /// Returns true if no converters are registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for CustomConversions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.converters.values().map(|(name, _)| name))
            .finish()
    }
}
