use std::{fmt, num::NonZeroUsize};

use log::info;
use ndarray::Array1;

use crate::{
    cache::{CacheSlot, ScoresCache},
    config::LearnerConfig,
    diagnostics::{IterationSummary, MemoryStats},
    error::{ModelErr, Result},
    features::Weight,
    scoring,
    storage::{FeatureMap, WeightLine, WeightsView, nr_rows},
    update::UpdateBatch,
};

/// The stage of a model's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fresh model, accepts updates.
    Training,
    /// `end_training` replaced the weights by their averages.
    Averaged,
    /// Restored from a dump, carries no averaging metadata.
    Loaded,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Training => f.write_str("training"),
            Phase::Averaged => f.write_str("averaged"),
            Phase::Loaded => f.write_str("loaded"),
        }
    }
}

/// A sparse multi-class linear model trained with averaged perceptron updates.
///
/// Every operation that mutates the model takes `&mut self` and no locking is
/// done. The model is not meant to be scored and updated from several threads
/// at once; callers that share it must serialize access themselves. Score
/// slices borrow the model, so they can't outlive the next update or flush.
#[derive(Debug)]
pub struct LinearModel {
    nr_class: usize,
    time: u64,
    phase: Phase,
    map: FeatureMap,
    gather: Vec<WeightLine>,
    scores: Vec<Weight>,
    cache: Option<ScoresCache>,
    n_correct: u64,
    n_total: u64,
}

impl LinearModel {
    /// Creates a new empty `LinearModel`.
    ///
    /// # Arguments
    /// * `config` - The model's configuration.
    ///
    /// # Returns
    /// A new model or `ModelErr::InvalidConfig` if the configuration is invalid.
    pub fn new(config: &LearnerConfig) -> Result<Self> {
        config.validate()?;
        let nr_class = config.nr_class;

        let cache = match NonZeroUsize::new(config.cache.max_size) {
            Some(max_size) if config.cache.enabled => Some(ScoresCache::new(nr_class, max_size)?),
            _ => None,
        };

        Ok(Self {
            nr_class,
            time: 0,
            phase: Phase::Training,
            map: FeatureMap::new(nr_class),
            gather: Vec::with_capacity(nr_rows(nr_class) * config.nr_templates),
            scores: vec![0.; nr_class],
            cache,
            n_correct: 0,
            n_total: 0,
        })
    }

    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    /// The amount of training steps taken so far, effective updates and ticks.
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The amount of features that can be scored.
    pub fn nr_features(&self) -> usize {
        self.map.weights().len()
    }

    /// Read-only access to the scoring weights.
    pub fn weights(&self) -> WeightsView<'_> {
        self.map.weights()
    }

    pub fn cache(&self) -> Option<&ScoresCache> {
        self.cache.as_ref()
    }

    pub(crate) fn feature_map_mut(&mut self) -> &mut FeatureMap {
        &mut self.map
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Scores every class for a set of active features.
    ///
    /// Position `i` of `features` holds the feature id of template `i`, `0`
    /// marks an absent feature. Scores of a sequence seen earlier in this
    /// epoch come from the cache, even if the weights changed since.
    ///
    /// # Returns
    /// The dense score vector, `nr_class` long.
    pub fn score(&mut self, features: &[u64]) -> &[Weight] {
        let Self {
            map,
            gather,
            scores,
            cache,
            ..
        } = self;

        let out = match cache {
            Some(cache) => match cache.lookup(features) {
                CacheSlot::Hit(cached) => return cached,
                CacheSlot::Miss(slot) | CacheSlot::Full(slot) => slot,
            },
            None => scores.as_mut_slice(),
        };

        scoring::gather(&map.weights(), features, gather);
        scoring::accumulate(out, gather);
        out
    }

    /// Scores every class without going through the cache.
    pub fn score_uncached(&mut self, features: &[u64]) -> &[Weight] {
        scoring::gather(&self.map.weights(), features, &mut self.gather);
        scoring::accumulate(&mut self.scores, &self.gather);
        &self.scores
    }

    /// Scores every class into an owned array for a dense backend.
    pub fn score_array(&mut self, features: &[u64]) -> Array1<Weight> {
        Array1::from_vec(self.score(features).to_vec())
    }

    fn ensure_training(&self) -> Result<()> {
        match self.phase {
            Phase::Training => Ok(()),
            phase => Err(ModelErr::NotTrainable { phase }),
        }
    }

    /// Applies the weight deltas of one example.
    ///
    /// Model time advances once per call carrying at least one nonzero
    /// delta. Zero deltas don't touch any weight or metadata, a batch made
    /// only of them leaves the model untouched.
    ///
    /// # Arguments
    /// * `batch` - The deltas, grouped by class.
    ///
    /// # Returns
    /// `ModelErr::ClassOutOfRange` before mutating anything if a class is
    /// invalid, `ModelErr::NotTrainable` unless the model is in the training phase.
    pub fn update(&mut self, batch: &UpdateBatch) -> Result<()> {
        self.ensure_training()?;

        if let Some(class) = batch.max_class() {
            if class >= self.nr_class {
                return Err(ModelErr::ClassOutOfRange {
                    class,
                    nr_class: self.nr_class,
                });
            }
        }

        if !batch.is_effective() {
            return Ok(());
        }

        self.time += 1;
        let time = self.time;
        let mut train = self.map.train();

        for (class, key, delta) in batch.iter() {
            if delta == 0. {
                continue;
            }

            let handle = train.get_or_create(key)?;
            train.bump_freq(handle);

            let mut cell = train.cell(handle, class)?;
            cell.update_accumulator(time);
            cell.update_count(1);
            cell.update_weight(delta);
        }

        Ok(())
    }

    /// Advances model time by one step without touching any weight.
    ///
    /// Used for examples that need no update, so the average still
    /// counts the steps the current weights survived.
    pub fn tick(&mut self) -> Result<()> {
        self.ensure_training()?;
        self.time += 1;
        Ok(())
    }

    /// Replaces every trained weight by its time-accumulated total.
    ///
    /// Must be called once, after the last update. The model then only
    /// supports scoring and dumping.
    pub fn end_training(&mut self) -> Result<()> {
        self.ensure_training()?;

        let lines = self.map.train().finalize(self.time);
        self.phase = Phase::Averaged;

        if let Some(cache) = &mut self.cache {
            cache.flush();
        }

        info!(
            "averaged {lines} weight lines of {} features at time {}",
            self.nr_features(),
            self.time
        );
        Ok(())
    }

    /// Records whether the caller's prediction for an example was correct.
    pub fn record_outcome(&mut self, correct: bool) {
        self.n_total += 1;
        if correct {
            self.n_correct += 1;
        }
    }

    /// Summarizes the iteration, then resets the accuracy counters and flushes the cache.
    ///
    /// # Arguments
    /// * `iter` - The number of the iteration that just ended.
    pub fn end_train_iter(&mut self, iter: usize) -> IterationSummary {
        let summary = IterationSummary {
            iter,
            n_correct: self.n_correct,
            n_total: self.n_total,
            cache_hit_ratio: self.cache.as_ref().map_or(0., ScoresCache::utilization),
            memory: self.memory(),
        };

        info!("{summary}");

        self.n_correct = 0;
        self.n_total = 0;
        self.flush_cache();
        summary
    }

    /// Forgets every cached score vector.
    pub fn flush_cache(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.flush();
        }
    }

    pub fn memory(&self) -> MemoryStats {
        let arena = self.map.arena();

        MemoryStats {
            lines: arena.nr_lines(),
            line_bytes: arena.line_bytes(),
            meta_bytes: arena.meta_bytes(),
            table_bytes: arena.table_bytes(),
            map_bytes: self.map.map_bytes(),
            cache_bytes: self.cache.as_ref().map_or(0, ScoresCache::memory_bytes),
        }
    }
}
