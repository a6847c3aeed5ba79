//! Declarative workflows and their compilation into nets
//!
//! This module contains the high-level workflow vocabulary:
//! - [`Workflow`] and its sections: [`Resource`], [`Context`],
//!   [`Channel`], [`Task`], [`Gateway`]
//! - [`validate`] for structural checks before compilation
//! - [`compile`] for translation into a seeded
//!   [`PetriNet`](crate::net::PetriNet)
//! - [`TaskAction`] / [`TaskInput`], the "input payload in, output
//!   payload out" contract task bodies are written against
//!
//! The expected pipeline is build → [`validate`] → [`compile`] → run.

mod action;
mod compile;
mod model;
mod validate;

pub use action::{TaskAction, TaskInput};
pub use compile::{compile, CompileError};
pub use model::{
    Channel, ChannelOrdering, Context, Gateway, GatewayKind, Resource, ResourceKind, Task, Workflow,
};
pub use validate::{validate, ValidationError};
