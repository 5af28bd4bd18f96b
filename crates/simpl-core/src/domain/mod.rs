//! Domain types for the evaluation service.

pub mod error;
pub mod scorer;

pub use error::{EvalError, Result};
pub use scorer::{
    Aggregation, BuiltinConfig, JudgeConfig, JudgeExample, DEFAULT_JUDGE_MODEL,
    DEFAULT_MAX_WORKERS,
};
