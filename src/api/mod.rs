/*!
 * API Module
 * Host-facing entry points and value conversions
 */

mod bridge;
pub mod conversions;

// Re-export for convenience
pub use bridge::HostBridge;
pub use conversions::{error_to_value, outcome_to_value, process_to_value};
