//! Fatal sweep errors.
//!
//! Pruned configurations and recoverable resource-exhaustion failures are
//! not errors; everything here aborts the sweep.

use gridtune_backend::BackendError;
use gridtune_space::{ExprError, ParamValue, SpaceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuneError {
    #[error("configuration {instance}: {source}")]
    Backend {
        instance: String,
        #[source]
        source: BackendError,
    },
    #[error("configuration {instance} failed correctness check")]
    FailedCorrectness { instance: String },
    #[error("invalid grid divisor {expr:?}: {source}")]
    InvalidDivisor {
        expr: String,
        #[source]
        source: ExprError,
    },
    #[error("grid divisor product {product} must be positive")]
    NonPositiveDivisor { product: i64 },
    #[error("parameter {name} must be a positive integer work-group dimension, got {value}")]
    InvalidBlockDim { name: String, value: ParamValue },
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error("answer has {answers} entries but the kernel takes {arguments} arguments")]
    AnswerLength { answers: usize, arguments: usize },
}
