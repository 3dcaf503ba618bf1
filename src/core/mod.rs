// Public modules
pub mod dispatch;
pub mod error;
pub mod git;
pub mod http;
pub mod manifest;
pub mod pipeline;
pub mod python;
pub mod toolchain;
pub mod version;
pub mod workspace;

// Internal modules - not part of public API
pub(crate) mod paths;

// Public modules for CLI access
pub mod defaults;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
