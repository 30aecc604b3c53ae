//! OpenBSD change-watching agent.
//!
//! Watches official documents and the snapshot distribution for changes,
//! stages verified snapshot sets, and rotates them through on-disk
//! generations.

pub mod checks;
pub mod config;
pub mod docwatch;
pub mod feedback;
pub mod snapshot;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::AgentError;
pub type Result<T> = std::result::Result<T, AgentError>;
