//! Evaluates a compiled program and summarizes the outcome.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{Context, Failure, Func, Observations, Runtime, Value, run_void};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Exception,
}

/// What one evaluation produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub started_at: DateTime<Utc>,
    pub runtime_secs: f64,
    pub result: Outcome,

    /// Reason of the exception that aborted the program.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,

    /// Error left in the final value, if any. Not an evaluation failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_error: Option<Failure>,

    pub observations: Observations,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.result == Outcome::Ok
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs `func` on `Void`, drains the observations and closes the runtime.
pub async fn evaluate(func: &dyn Func, ctx: &Context, rtx: &Runtime) -> Report {
    let started_at = Utc::now();
    let started = Instant::now();

    let result = match ctx.deadline() {
        Some(_) => run_void(func, ctx, rtx).await,
        None => match rtx.config().timeouts.evaluation() {
            Some(timeout) => run_void(func, &ctx.with_timeout(timeout), rtx).await,
            None => run_void(func, ctx, rtx).await,
        },
    };

    let observations = Observations::reduce(rtx.extract_observations());
    rtx.close();

    let runtime_secs = started.elapsed().as_secs_f64();
    match result {
        Ok(value) => {
            let final_error = match value {
                Value::Error(failure) => Some(failure),
                _ => None,
            };
            tracing::info!(
                runtime_secs,
                observations = observations.len(),
                "evaluation completed"
            );
            Report {
                started_at,
                runtime_secs,
                result: Outcome::Ok,
                exception: None,
                final_error,
                observations,
            }
        }
        Err(exc) => {
            tracing::warn!(reason = %exc.reason, "evaluation aborted by exception");
            Report {
                started_at,
                runtime_secs,
                result: Outcome::Exception,
                exception: Some(exc.reason),
                final_error: None,
                observations,
            }
        }
    }
}
