mod extractor;
mod key;

pub use extractor::Extractor;
pub use key::{ClassId, FeatureKey, TemplateId, Weight};
