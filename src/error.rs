//! Crate-wide error taxonomy.
//!
//! Mirrors the five-way split in §7 of the design: config, transport,
//! schema/parse, invariant, and cancellation errors each carry different
//! recovery semantics in the pipeline (see `orchestrator::Orchestrator::run_stage`).

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credentials, malformed config file. Fatal at stage start.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Mail provider / LLM / NER connection, timeout, 5xx. Retried with
    /// backoff by the caller; surfaced here only once retries are exhausted.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed LLM JSON, unparseable date. Item-level, non-fatal to the stage.
    #[error("parse error: {0}")]
    Parse(String),

    /// Foreign-key missing, unexpected enum value. Fatal to the current batch.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Cooperative cancellation observed mid-run.
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        AppError::Config(msg.into())
    }

    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        AppError::Invariant(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        AppError::Transport(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        AppError::Parse(msg.into())
    }
}
