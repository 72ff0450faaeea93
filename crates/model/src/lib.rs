//! An abstraction layer for remote assistant services.
//!
//! The agent talks to a service that keeps a capability profile and a
//! persistent conversation on its side. Local code only appends messages,
//! starts runs, polls them and answers the tool calls a run asks for. This
//! crate establishes that protocol, so that the core loop doesn't depend on
//! any particular vendor.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
