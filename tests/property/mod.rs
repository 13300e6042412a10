//! Property-based tests for store and memo guarantees

mod memo_keys;
mod store_roundtrip;
