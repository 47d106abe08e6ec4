//! Error handling for reelstats
//!
//! All fallible library operations return one of the error enums defined in
//! [`types`]; the binary and bootstrap code use `anyhow` on top of them.

pub mod types;

pub use types::*;

/// Result alias for application level operations
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result alias for refresh orchestration
pub type RefreshResult<T> = Result<T, RefreshError>;
