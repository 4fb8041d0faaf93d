/*!
 * Inline Strings
 * Error payloads that skip the heap when short
 */

use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;

/// Inline-optimized string that stores short strings (≤23 bytes) without heap allocation
///
/// Error payloads in this crate are mostly short ("bad descriptor 7",
/// "echo: not found") and are created on hot failure paths such as
/// non-blocking lock contention.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InlineString {
    inner: SmartString,
}

impl InlineString {
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    /// Whether the payload fits without a heap allocation
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inner.is_inline()
    }
}

impl From<&str> for InlineString {
    #[inline]
    fn from(s: &str) -> Self {
        Self {
            inner: SmartString::from(s),
        }
    }
}

impl From<String> for InlineString {
    #[inline]
    fn from(s: String) -> Self {
        Self {
            inner: SmartString::from(s),
        }
    }
}

impl AsRef<str> for InlineString {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for InlineString {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for InlineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for InlineString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
