//! Classifier variants, the bulk/silence-specialist ensemble and binary
//! evaluation for tclass.

pub mod centroid;
pub mod ensemble;
pub mod evaluate;
pub mod forest;
pub mod gaussian;
pub mod labels;
pub mod mlp;
pub mod model;
pub mod svm;

pub use ensemble::{ClassifierEnsemble, EnsembleInput};
pub use evaluate::{BinaryScores, ConfusionMatrix, binary_scores, class_share};
pub use model::{ClassifierKind, Model};
