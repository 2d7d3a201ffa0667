// src/kernel/mod.rs
pub mod ast;
pub mod condition;
pub mod config;
pub mod context;
pub mod fs_guard;
pub mod packet_catalog;
pub mod runtime;
pub mod values;

pub use ast::{Action, ElifBranch, Params};
pub use config::Config;
pub use context::Context;
pub use packet_catalog::{ActionRegistry, Handler, RegistryBuilder, Reply};
pub use runtime::{Outcome, Runtime, TraceEntry};
