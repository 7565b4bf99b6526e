use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DispatchError, Result};
use crate::handler::{Handler, HandlerContext, HandlerResult};

/// A table of command handlers keyed by command id.
///
/// Build one per feature area and import them into a
/// [`Dispatcher`](crate::Dispatcher) during setup; the importer does not need
/// to know what the handlers do.
#[derive(Clone, Default)]
pub struct HandlerRegister {
    handlers: BTreeMap<u8, Arc<dyn Handler>>,
}

impl HandlerRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler function for `id`.
    ///
    /// Fails with [`DispatchError::InvalidCommandId`] if `id` does not fit in
    /// a byte and with [`DispatchError::DuplicateHandler`] if `id` is taken.
    pub fn register<F>(&mut self, id: u16, handler: F) -> Result<()>
    where
        F: Fn(&HandlerContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_handler(id, Arc::new(handler))
    }

    /// Register a shared handler object for `id`.
    pub fn register_handler(&mut self, id: u16, handler: Arc<dyn Handler>) -> Result<()> {
        let id = u8::try_from(id).map_err(|_| DispatchError::InvalidCommandId(id))?;
        if self.handlers.contains_key(&id) {
            return Err(DispatchError::DuplicateHandler(id));
        }
        debug!(id, "registered handler");
        self.handlers.insert(id, handler);
        Ok(())
    }

    /// Copy every handler of `other` into this table.
    ///
    /// Colliding ids fail with [`DispatchError::DuplicateHandler`] and leave
    /// this table unchanged.
    pub fn import(&mut self, other: &HandlerRegister) -> Result<()> {
        if let Some(id) = other
            .handlers
            .keys()
            .find(|id| self.handlers.contains_key(*id))
        {
            return Err(DispatchError::DuplicateHandler(*id));
        }
        for (id, handler) in &other.handlers {
            self.handlers.insert(*id, Arc::clone(handler));
        }
        debug!(count = other.len(), "imported handler register");
        Ok(())
    }

    /// The handler registered for `id`.
    pub fn get(&self, id: u8) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(&id)
    }

    pub fn contains(&self, id: u8) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegister")
            .field("ids", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
