//! Integration tests for the strata experiment state system

mod experiment_driver;
mod memo_cache;
mod replicate_engine;
mod store_persistence;
mod test_utils;
