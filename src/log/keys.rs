//! Store key layout for log state.
//!
//! Log keys are embedded verbatim, so a log key must not itself look like
//! `offset_<n>` or `committed_<n>`.

/// Highest offset allocated for `key`.
pub fn offset_key(key: &str) -> String {
    format!("offset_{}", key)
}

/// Value appended to `key` at `offset`.
pub fn entry_key(key: &str, offset: u64) -> String {
    format!("{}_{}", key, offset)
}

/// Consumer offset last committed for `key`.
pub fn committed_key(key: &str) -> String {
    format!("committed_{}", key)
}
