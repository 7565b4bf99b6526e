//! Command dispatch for picmd devices.
//!
//! Register a handler per command id, optionally provide named values the
//! handlers can pull from their [`HandlerContext`], then hand the
//! [`Dispatcher`] to a [`Runner`] that serves a transport until stopped.
//!
//! Handler bundles can be built independently as [`HandlerRegister`]s and
//! imported into a dispatcher during setup.

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod provided;
pub mod register;
pub mod runner;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
pub use handler::{Handler, HandlerContext, HandlerError, HandlerResult, Reply};
pub use provided::ProvidedValues;
pub use register::HandlerRegister;
pub use runner::{Runner, RunnerConfig, RunnerStats, StopHandle, UnknownCommandPolicy};
