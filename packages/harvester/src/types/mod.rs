//! Data types shared across the pipeline.

pub mod batch;
pub mod config;
pub mod item;
pub mod report;
