//! Decides whether a fetched document differs from the applied one.

/// Returns true when `candidate` must be applied.
///
/// Both inputs are canonical encodings, so plain byte equality is enough.
pub fn should_apply(candidate: &[u8], last_applied: &[u8]) -> bool {
    candidate != last_applied
}
