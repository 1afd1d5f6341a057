// Windowing, feature extraction, normalization and smoothing for tclass.

pub mod dataset;
pub mod extract;
pub mod normalize;
pub mod profiler;
pub mod scalogram;
pub mod segment;
pub mod silence;
pub mod smoothing;
pub mod stats;
