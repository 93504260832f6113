use std::collections::BTreeMap;

use crate::features::{ClassId, FeatureKey, TemplateId, Weight};

/// The weight deltas of one training example, grouped by class.
///
/// Deltas for the same class and feature accumulate. Absent features
/// (id `0`) are dropped on insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    deltas: BTreeMap<ClassId, BTreeMap<FeatureKey, Weight>>,
}

impl UpdateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the weight of a feature for `class`.
    ///
    /// # Arguments
    /// * `class` - The class whose weight changes.
    /// * `template` - The template that produced the feature.
    /// * `feature` - The feature id, `0` is ignored.
    /// * `delta` - The signed change.
    pub fn add(&mut self, class: ClassId, template: TemplateId, feature: u64, delta: Weight) {
        if let Some(key) = FeatureKey::new(template, feature) {
            self.add_key(class, key, delta);
        }
    }

    pub fn add_key(&mut self, class: ClassId, key: FeatureKey, delta: Weight) {
        *self
            .deltas
            .entry(class)
            .or_default()
            .entry(key)
            .or_insert(0.) += delta;
    }

    /// Adds `delta` for `class` to every active feature, position `i` of
    /// `features` being the feature of template `i`.
    pub fn add_features(&mut self, class: ClassId, features: &[u64], delta: Weight) {
        for (template, &feature) in features.iter().enumerate() {
            self.add(class, template as TemplateId, feature, delta);
        }
    }

    /// Iterates over every (class, feature, delta) triple, zero deltas included.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, FeatureKey, Weight)> + '_ {
        self.deltas.iter().flat_map(|(&class, feats)| {
            feats.iter().map(move |(&key, &delta)| (class, key, delta))
        })
    }

    /// Returns whether applying the batch would change any weight.
    pub fn is_effective(&self) -> bool {
        self.iter().any(|(_, _, delta)| delta != 0.)
    }

    /// Returns the highest class the batch touches.
    pub fn max_class(&self) -> Option<ClassId> {
        self.deltas.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn clear(&mut self) {
        self.deltas.clear();
    }
}

impl FromIterator<(ClassId, TemplateId, u64, Weight)> for UpdateBatch {
    fn from_iter<I: IntoIterator<Item = (ClassId, TemplateId, u64, Weight)>>(iter: I) -> Self {
        let mut batch = Self::new();
        for (class, template, feature, delta) in iter {
            batch.add(class, template, feature, delta);
        }
        batch
    }
}
