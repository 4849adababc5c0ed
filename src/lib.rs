//! thinkchat is a chat gateway and terminal client for reasoning models that
//! wrap their chain of thought in `<think>…</think>` markers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`gateway`] is the HTTP service: it validates a conversation, prepends
//!   the reasoning directive, and relays the provider's stream unchanged.
//! - [`core`] owns the client-side domain: the incremental think scanner,
//!   conversation state, the gateway client, and configuration.
//! - [`ui`] renders the terminal interface and runs the interactive event loop.
//! - [`api`] defines the wire payloads shared by the gateway and the client.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod gateway;
pub mod logging;
pub mod ui;
