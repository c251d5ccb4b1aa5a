#[path = "../common/mod.rs"]
mod common;

mod rating_store_tests;
mod test_helpers;
