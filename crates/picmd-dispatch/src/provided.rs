use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::HandlerError;

/// Named values handlers can pull from their context.
///
/// Values are stored as-is; callables are never invoked on the handler's
/// behalf. Closures cannot be named, so store them as function pointers or
/// boxed trait objects:
///
/// ```
/// use picmd_dispatch::ProvidedValues;
///
/// let values = ProvidedValues::new()
///     .with("offset", 1u64)
///     .with("bump", (|v: u64| v + 1) as fn(u64) -> u64);
/// assert_eq!(values.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct ProvidedValues {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ProvidedValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind `value` to `name`, replacing any previous binding.
    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Arc::new(value));
    }

    /// Merge `other` into this table. Entries in `other` win on collision.
    pub fn extend(&mut self, other: ProvidedValues) {
        self.values.extend(other.values);
    }

    /// Look up `name` as a `T`.
    pub fn get<T: Any>(&self, name: &str) -> Result<&T, HandlerError> {
        let value = self.values.get(name).ok_or_else(|| HandlerError::Unresolved {
            name: name.to_string(),
        })?;
        value
            .as_ref()
            .downcast_ref::<T>()
            .ok_or_else(|| HandlerError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bound names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ProvidedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ProvidedValues")
            .field("names", &names)
            .finish()
    }
}
