/*!
 * Data Structures
 *
 * Specialized data structures for kernel operations:
 * - Inline strings for stack-allocated error payloads
 */

mod inline_string;

pub use inline_string::InlineString;
