pub mod calculator;
pub mod confidence;
pub mod constants;
pub mod conversion;
pub mod international;
pub mod statistics;
pub mod structures;
