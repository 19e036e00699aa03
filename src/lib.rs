#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

//! A micro-language for network measurements.
//!
//! Programs are trees of operations serialized as JSON ([`ast`]). They are
//! built with [`dsl`], compiled with [`compiler`], and evaluated by
//! [`engine`] using the network primitives in [`probes`].

pub mod ast;
pub mod compiler;
pub mod config;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod probes;
pub mod report;
pub mod types;

pub use compiler::Compiler;
pub use config::Config;
pub use error::{ProbeError, Result};
