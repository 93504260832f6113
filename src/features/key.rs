use std::{fmt, num::NonZeroU64};

/// Identifies a feature-extraction slot.
pub type TemplateId = u32;

/// Index of an output class.
pub type ClassId = usize;

/// The scalar type of every weight and score.
pub type Weight = f32;

/// Identifies one sparse weight vector of the model.
///
/// Feature id `0` is reserved as the "absent feature" sentinel, so a
/// `FeatureKey` can't be built from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey {
    template: TemplateId,
    feature: NonZeroU64,
}

impl FeatureKey {
    /// Creates a new `FeatureKey`.
    ///
    /// # Arguments
    /// * `template` - The template that produced the feature.
    /// * `feature` - The feature id.
    ///
    /// # Returns
    /// `None` if `feature` is the absent sentinel.
    pub fn new(template: TemplateId, feature: u64) -> Option<Self> {
        NonZeroU64::new(feature).map(|feature| Self { template, feature })
    }

    pub fn template(&self) -> TemplateId {
        self.template
    }

    pub fn feature(&self) -> u64 {
        self.feature.get()
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.template, self.feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_sentinel_is_rejected() {
        assert!(FeatureKey::new(3, 0).is_none());

        let key = FeatureKey::new(3, 42).unwrap();
        assert_eq!(key.template(), 3);
        assert_eq!(key.feature(), 42);
        assert_eq!(key.to_string(), "3:42");
    }

    #[test]
    fn test_keys_order_by_template_first() {
        let a = FeatureKey::new(0, 99).unwrap();
        let b = FeatureKey::new(1, 1).unwrap();
        assert!(a < b);
    }
}
