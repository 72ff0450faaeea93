//! Core logic of the assistant session: the turn loop, tool dispatching,
//! output budgeting and the persistence of outputs and identifiers.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod budget;
mod controller;
mod dispatcher;
pub mod env_store;
pub mod log_store;
pub mod session;
pub mod tool;

pub use controller::{
    BudgetScope, ControllerBuilder, ControllerError, ControllerEvent,
    DEFAULT_PROMPT, RetryPolicy, RunState, SessionController, Stimulus,
    TurnSummary,
};
pub use dispatcher::{ToolCallResult, ToolDispatcher};
