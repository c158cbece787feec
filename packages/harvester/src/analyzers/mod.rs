//! Vision analyzer implementations.

pub mod llava;

pub use llava::{parse_label_analysis, select_model, LabelAnalysis, LlavaAnalyzer, DEFAULT_MODEL};
