/// Configuration, types, and shared structures for tclass.
///
/// This crate contains the sample and feature types, the pipeline error
/// enum, the configuration loader, and the classifier capability shared
/// across the tclass workspace.

pub mod config;
pub mod error;
pub mod matrix;
pub mod sample;
pub mod traits;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use matrix::FeatureMatrix;
pub use sample::{ClassId, Sample, TrafficClass};
pub use traits::Classifier;
