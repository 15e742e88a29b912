/// Error types for the Prism render core

use std::fmt;

/// Result type alias for Prism operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (device call failed, contract broken by the backend)
    BackendError(String),
    /// Out of GPU memory
    OutOfMemory,
    /// Invalid resource (unknown name, wrong kind, wrong backend type)
    InvalidResource(String),
    /// Initialization failed (instance, device, swapchain)
    InitializationFailed(String),
    /// The swapchain no longer matches the surface and must be recreated
    SwapchainOutOfDate,
    /// A fence wait exceeded the configured watchdog timeout
    Timeout(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
