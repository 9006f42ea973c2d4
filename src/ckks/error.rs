use thiserror::Error;

/// Every way a CKKS operation can fail. All of them are recoverable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CkksError {
    #[error("crypto context is not initialized, call key_gen first")]
    UninitializedContext,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("level mismatch: left operand at level {left}, right operand at level {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("slot mismatch: left operand has {left} slots, right operand has {right}")]
    SlotMismatch { left: usize, right: usize },

    #[error("scale mismatch: left operand scale {left}, right operand scale {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("multiplicative depth exhausted: ciphertext is already at level 0")]
    DepthExhausted,

    #[error("missing rotation key for shift {0}")]
    MissingRotationKey(usize),

    #[error("missing relinearization key")]
    MissingRelinearizationKey,
}

pub type Result<T> = std::result::Result<T, CkksError>;
