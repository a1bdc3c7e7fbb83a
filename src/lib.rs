//! Cadence is a conversational flow execution engine. Hosts load declarative
//! flow definitions (directed graphs of nodes holding actions and routers),
//! build sessions for a contact, and drive them with triggers and resumes.
//! Each engine call produces a sprint of events; sessions serialize to JSON
//! between calls so a wait never holds a stack frame.
//!
//! The crate splits into three layers:
//!
//! 1. `excellent` - the expression language embedded in flow text via
//!    `@name` / `@(expr)` sigils, with its own value system and function
//!    library.
//! 2. `flows` - the flow object model (nodes, actions, routers, waits) and
//!    the session engine that walks it.
//! 3. `envs` / `assets` - the environment (timezone, formats, clock) and the
//!    immutable asset store shared by sessions.

pub mod assets;
pub mod envs;
pub mod excellent;
pub mod flows;
pub mod utils;

pub use envs::{Environment, EnvironmentBuilder};
pub use excellent::types::Value;
pub use flows::engine::{Engine, EngineBuilder, Session, Sprint};
