//! Core trait abstractions for the harvester.
//!
//! These traits are the seams between the pipeline and its collaborators:
//! the catalog, image downloads, the vision model, and tabular storage.

pub mod analyzer;
pub mod catalog;
pub mod image;
pub mod store;
