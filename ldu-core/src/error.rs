use thiserror::Error;

pub type Result<T> = std::result::Result<T, LduError>;

#[derive(Error, Debug)]
pub enum LduError {
    #[error("WGPU initialization failed: {0}")]
    WgpuInitError(String),

    #[error("WGPU error: {0}")]
    WgpuError(String),

    /// Operands of an elementwise, permutation or matrix operation disagree in length.
    #[error("Size mismatch in {operation}: expected {expected} elements, found {found}")]
    SizeMismatch {
        operation: String,
        expected: usize,
        found: usize,
    },

    /// Addressing tables inconsistent with owner/neighbour, or a matrix used
    /// against a topology that has since been rebuilt.
    #[error("Invalid topology: {0}")]
    TopologyInvalid(String),

    #[error("Unsupported element type `{type_name}` for {operation}")]
    UnsupportedElementType {
        type_name: &'static str,
        operation: String,
    },

    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LduError {
    /// Builds a `SizeMismatch` and logs it; mismatches abort the current operation.
    pub(crate) fn size_mismatch(operation: impl Into<String>, expected: usize, found: usize) -> Self {
        let operation = operation.into();
        log::error!(
            "incompatible fields for operation {}: {} != {}",
            operation,
            expected,
            found
        );
        LduError::SizeMismatch {
            operation,
            expected,
            found,
        }
    }

    pub(crate) fn topology(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("topology check failed: {}", msg);
        LduError::TopologyInvalid(msg)
    }
}

/// Fails with `SizeMismatch` unless both lengths agree.
pub(crate) fn check_sizes(operation: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(LduError::size_mismatch(operation, expected, found));
    }
    Ok(())
}
