#[path = "../common/mod.rs"]
mod common;

mod cache_tests;
mod cli_tests;
mod service_tests;
