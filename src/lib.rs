pub mod args;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod messaging;
pub mod model;
pub mod monitor;
pub mod service;
pub mod utils;
