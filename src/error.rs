//! Central error handling for the ember3d core.
//!
//! Provides a unified EngineError enum with consistent categorization.
//! Device-class errors are non-recoverable by contract: the frame loop that
//! receives one is expected to log it and stop. Contract violations (bad
//! quadtree insertions, unbalanced config stacks) panic at the violation
//! site instead of flowing through this type.

/// Centralized error type for all engine operations
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convenience constructors for common error types
    pub fn device<T: ToString>(msg: T) -> Self {
        EngineError::Device(msg.to_string())
    }

    pub fn upload<T: ToString>(msg: T) -> Self {
        EngineError::Upload(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        EngineError::Readback(msg.to_string())
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        EngineError::Config(msg.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
