// lib.rs
pub mod bed;
pub mod interval;
pub mod merge;
pub mod overlap;
pub mod pool;
pub mod report;
