/*!
 * Serde Helpers
 * Predicates for `skip_serializing_if`
 */

/// Skip serializing None values
#[inline]
pub fn is_none<T>(value: &Option<T>) -> bool {
    value.is_none()
}

/// Skip serializing zero sizes
#[inline]
pub fn is_zero_usize(value: &usize) -> bool {
    *value == 0
}

/// Skip serializing empty vectors
#[inline]
pub fn is_empty_vec<T>(value: &Vec<T>) -> bool {
    value.is_empty()
}
