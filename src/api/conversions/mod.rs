/*!
 * Conversion utilities for host values
 */

pub mod request;
pub mod response;

pub use request::{argv_from_values, command_arg, int_arg};
pub use response::{error_to_value, outcome_to_value, process_to_value};
