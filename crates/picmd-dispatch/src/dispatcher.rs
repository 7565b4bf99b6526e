use std::sync::Arc;

use picmd_frame::{
    CommandRequest, Response, COMMAND_FAIL_ERROR, INVALID_PARITY_ERROR, MAX_DATA_LENGTH,
};
use tracing::{debug, trace, warn};

use crate::error::{DispatchError, Result};
use crate::handler::{Handler, HandlerContext, HandlerError, HandlerResult};
use crate::provided::ProvidedValues;
use crate::register::HandlerRegister;

/// Routes validated commands to their handlers and shapes the outcome into
/// a [`Response`].
#[derive(Debug, Default)]
pub struct Dispatcher {
    handlers: HandlerRegister,
    provided: ProvidedValues,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler function for `id` (`0..=255`).
    pub fn register<F>(&mut self, id: u16, handler: F) -> Result<()>
    where
        F: Fn(&HandlerContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.register(id, handler)
    }

    /// Register a shared handler object for `id` (`0..=255`).
    pub fn register_handler(&mut self, id: u16, handler: Arc<dyn Handler>) -> Result<()> {
        self.handlers.register_handler(id, handler)
    }

    /// Merge named values into the table handlers read through
    /// [`HandlerContext::get`]. Later values replace earlier ones.
    pub fn provide(&mut self, values: ProvidedValues) {
        self.provided.extend(values);
    }

    /// Add every handler of `register`. Fails without changes if any id is
    /// already taken.
    pub fn import_register(&mut self, register: &HandlerRegister) -> Result<()> {
        self.handlers.import(register)
    }

    /// The handler registered for the request's id.
    pub fn get_handler(&self, request: &CommandRequest) -> Result<Arc<dyn Handler>> {
        self.handlers
            .get(request.id)
            .cloned()
            .ok_or(DispatchError::CommandNotFound(request.id))
    }

    /// Run one command and build its response.
    ///
    /// An unknown id and an unresolvable provided value are errors for the
    /// caller. Everything the handler itself reports becomes a response:
    /// a parity mismatch or a declared size that disagrees with the payload
    /// skips the handler entirely, and failures other than a well-formed
    /// domain error are answered with [`COMMAND_FAIL_ERROR`].
    pub fn execute_command(&self, request: &CommandRequest) -> Result<Response> {
        let handler = self.get_handler(request)?;

        if !request.size_ok() {
            debug!(
                id = request.id,
                declared = request.size,
                actual = request.payload.len(),
                "size mismatch"
            );
            return Ok(Response::error(INVALID_PARITY_ERROR));
        }

        if !request.parity_ok() {
            debug!(
                id = request.id,
                declared = request.parity,
                expected = request.expected_parity(),
                "parity mismatch"
            );
            return Ok(Response::error(INVALID_PARITY_ERROR));
        }

        let ctx = HandlerContext::new(request, &self.provided);
        match handler.call(&ctx) {
            Ok(reply) => {
                let data = reply.into_bytes();
                if data.len() > MAX_DATA_LENGTH {
                    warn!(id = request.id, len = data.len(), "handler result too large");
                    return Ok(Response::error(COMMAND_FAIL_ERROR));
                }
                trace!(id = request.id, len = data.len(), "handler succeeded");
                Ok(Response::ok(data))
            }
            Err(HandlerError::Domain {
                status,
                description,
            }) => match u8::try_from(status) {
                Ok(code) if code != 0 && description.len() <= MAX_DATA_LENGTH => {
                    debug!(id = request.id, status = code, "handler reported domain error");
                    Ok(Response::error_with(code, description))
                }
                _ => {
                    warn!(
                        id = request.id,
                        status,
                        len = description.len(),
                        "malformed domain error"
                    );
                    Ok(Response::error(COMMAND_FAIL_ERROR))
                }
            },
            Err(HandlerError::Failure(err)) => {
                warn!(id = request.id, error = %err, "handler failed");
                Ok(Response::error(COMMAND_FAIL_ERROR))
            }
            Err(HandlerError::Unresolved { name }) => Err(DispatchError::UnresolvedParameter {
                id: request.id,
                name,
            }),
            Err(HandlerError::TypeMismatch { name, expected }) => {
                Err(DispatchError::ProvidedTypeMismatch {
                    id: request.id,
                    name,
                    expected,
                })
            }
        }
    }

    /// The handler table.
    pub fn handlers(&self) -> &HandlerRegister {
        &self.handlers
    }

    /// The provided-values table.
    pub fn provided(&self) -> &ProvidedValues {
        &self.provided
    }
}
