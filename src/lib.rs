//! Passerelle is a streaming chat relay and headless client for
//! conversational AI backends.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the wire types: the NDJSON [`api::Event`] stream
//!   and the buffered [`api::AgentReply`] shape.
//! - [`core`] owns the incremental frame decoder, turn state and event
//!   dispatch, the client-side streaming service, and configuration.
//! - [`relay`] implements the HTTP relay that fronts the upstream AI
//!   backend and shapes its failures into well-formed wire payloads.
//! - [`render`] provides the Markdown and diagram render seams consumed
//!   by the dispatcher.
//! - [`cli`] parses command-line arguments and runs the `serve` and
//!   `say` commands.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod relay;
pub mod render;
pub mod utils;
