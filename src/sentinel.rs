//! Public sentinel constants (§6).
//!
//! These are preserved as plain integers only at the public boundary; internally they are
//! converted to `Option`s as soon as possible (§9 design note "Wildcards encoded as
//! sentinels").

/// Match a send from any source.
pub const ANY_SOURCE: i32 = -1;
/// Match a send with any tag.
pub const ANY_TAG: i32 = -1;
/// Used by [`crate::comm::split`] to mean "exclude me from every result communicator".
pub const UNDEFINED: i32 = -1;

/// Convert a public tag sentinel to its internal `Option` form.
pub(crate) fn tag_filter(tag: i32) -> Option<i32> {
    if tag == ANY_TAG { None } else { Some(tag) }
}
