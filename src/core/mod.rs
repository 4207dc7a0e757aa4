/*!
 * Core Module
 * Fundamental harness types, limits and error handling
 */

pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::HarnessError;
pub use types::*;
