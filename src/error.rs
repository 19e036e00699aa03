use thiserror::Error;

use crate::engine::Exception;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `microprobe`.
///
/// Construction, compilation and configuration each get their own enum.
/// Runtime measurement failures are *not* represented here: they travel
/// through the graph as [`crate::engine::Value`] sentinels.
#[derive(Debug, Error)]
pub enum ProbeError {
    // ── Program builder ─────────────────────────────────────────────────
    #[error("build: {0}")]
    Build(#[from] BuildError),

    // ── Compiler ────────────────────────────────────────────────────────
    #[error("compile: {0}")]
    Compile(#[from] CompileError),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Evaluation ended with an exception ──────────────────────────────
    #[error("evaluation: {0}")]
    Exception(#[from] Exception),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Builder errors ─────────────────────────────────────────────────────────

/// Construction-time failures of the program builder. These are programmer
/// errors and abort graph construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("{context}: wrong type {found}; expected {expected}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("{name}: input type {input} differs from output type {output}")]
    NotAFilter {
        name: String,
        input: String,
        output: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}: expected at least one function")]
    EmptyComposition(&'static str),
}

// ─── Compiler errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no such template: {0}")]
    NoSuchTemplate(String),

    #[error("{func}: malformed arguments: {source}")]
    InvalidArguments {
        func: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{func}: invalid argument: {message}")]
    InvalidArgumentValue { func: String, message: String },

    #[error("{func}: invalid number of children: expected {expected}, found {found}")]
    InvalidNumberOfChildren {
        func: String,
        expected: String,
        found: usize,
    },

    #[error("malformed program: {0}")]
    MalformedProgram(#[from] serde_json::Error),
}

// ─── Config errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results carrying a [`ProbeError`].
pub type Result<T> = std::result::Result<T, ProbeError>;
