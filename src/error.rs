//! Error types for the simulation engine

use thiserror::Error;

/// A simulation parameter that makes the run meaningless or unstable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Hooke's-law term overshoots without bound for k >= 1
    #[error("spring constant must be less than 1 (got {0})")]
    SpringConstantTooLarge(f32),

    #[error("repulsive constant must be finite (got {0})")]
    NonFiniteRepulsiveConstant(f32),

    #[error("max displacement must be positive (got {0})")]
    InvalidMaxDisplacement(f32),

    #[error("weight divisor must be positive (got {0})")]
    InvalidWeightDivisor(f32),

    /// Unparseable weight normalization policy
    #[error("unknown weight normalization: {0} (expected raw, clamp or scale:<divisor>)")]
    UnknownWeightNormalization(String),
}

/// Failure reported by a compute backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// No usable device or thread pool
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected one kernel dispatch
    #[error("dispatch rejected: {0}")]
    Rejected(String),

    /// Positions could not be copied back from the backend
    #[error("readback failed: {0}")]
    Readback(String),

    /// `step` or `read_positions` called before `prepare`
    #[error("backend not prepared")]
    NotPrepared,
}

pub type DispatchResult<T> = Result<T, DispatchError>;
