//! A sparse, hashed linear model for structured-prediction classifiers,
//! trained online with averaged perceptron updates.

mod cache;
mod config;
mod diagnostics;
mod error;
mod features;
mod model;
mod scoring;
mod serialization;
mod storage;
mod training;
mod update;

pub use cache::{CacheSlot, ScoresCache, hash_features};
pub use config::{CacheConfig, LearnerConfig};
pub use diagnostics::{IterationSummary, MemoryStats};
pub use error::{ModelErr, Result};
pub use features::{ClassId, Extractor, FeatureKey, TemplateId, Weight};
pub use model::{LinearModel, Phase};
pub use scoring::{accumulate, gather};
pub use storage::{
    FeatureHandle, FeatureMap, LINE_SIZE, MetaCell, TrainCell, TrainView, WeightLine, WeightsView,
};
pub use training::{argmax, perceptron_batch};
pub use update::UpdateBatch;
