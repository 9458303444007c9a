// src/utils/mod.rs
pub mod linalg;
pub mod logger;
pub mod report;
pub mod units;
