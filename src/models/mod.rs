//! Model artifacts, ensemble combination, and the inference context

pub mod classifier;
pub mod ensemble;
pub mod inference;
pub mod store;

pub use classifier::CalibratedModel;
pub use ensemble::{EnsembleCombiner, WeightPolicy};
pub use inference::InferenceContext;
pub use store::{ArtifactBundle, ArtifactStore, BundleManifest};
