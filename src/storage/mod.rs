mod arena;
mod line;
mod map;

pub use line::{LINE_SIZE, MetaCell, TrainCell, WeightLine, nr_rows};
pub use map::{FeatureHandle, FeatureMap, TrainView, WeightsView};
