use crate::features::{ClassId, Weight};

/// Amount of classes covered by one row of weights.
pub const LINE_SIZE: usize = 7;

/// Returns how many rows a feature needs to cover `nr_class` classes.
#[inline]
pub fn nr_rows(nr_class: usize) -> usize {
    nr_class.div_ceil(LINE_SIZE)
}

/// Returns the row and the column inside that row holding `class`.
#[inline]
pub fn row_col(class: ClassId) -> (usize, usize) {
    (class / LINE_SIZE, class % LINE_SIZE)
}

/// A row of weights covering the classes `[start, start + LINE_SIZE)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightLine {
    pub start: usize,
    pub line: [Weight; LINE_SIZE],
}

impl WeightLine {
    pub fn new(row: usize) -> Self {
        Self {
            start: row * LINE_SIZE,
            line: [0.; LINE_SIZE],
        }
    }

    pub fn row(&self) -> usize {
        self.start / LINE_SIZE
    }
}

/// Averaging bookkeeping of a single weight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetaCell {
    /// Amount of updates received.
    pub count: u32,
    /// Model time of the last touch.
    pub last_time: u64,
    /// Time-weighted sum of the weight, valid up to `last_time`.
    pub total: f64,
}

/// Averaging bookkeeping of a whole `WeightLine`.
pub type MetaLine = [MetaCell; LINE_SIZE];

/// Mutable access to one weight and its averaging metadata.
///
/// A touch must call `update_accumulator` before `update_weight`, so the
/// accumulator sees the weight value that held since the previous touch.
#[derive(Debug)]
pub struct TrainCell<'a> {
    weight: &'a mut Weight,
    meta: &'a mut MetaCell,
}

impl<'a> TrainCell<'a> {
    pub fn new(weight: &'a mut Weight, meta: &'a mut MetaCell) -> Self {
        Self { weight, meta }
    }

    pub fn weight(&self) -> Weight {
        *self.weight
    }

    pub fn meta(&self) -> &MetaCell {
        self.meta
    }

    #[inline]
    pub fn update_count(&mut self, inc: u32) {
        self.meta.count += inc;
    }

    /// Fast-forwards the running total over every step since the last touch.
    ///
    /// # Arguments
    /// * `time` - The current model time, never behind `last_time`.
    #[inline]
    pub fn update_accumulator(&mut self, time: u64) {
        let elapsed = time - self.meta.last_time;
        self.meta.total += elapsed as f64 * f64::from(*self.weight);
        self.meta.last_time = time;
    }

    #[inline]
    pub fn update_weight(&mut self, delta: Weight) {
        *self.weight += delta;
    }

    /// Fast-forwards through `final_time` inclusive and replaces the weight
    /// with the accumulated total.
    ///
    /// The total is not divided by the elapsed time.
    pub fn finalize_average(&mut self, final_time: u64) {
        let elapsed = (final_time + 1) - self.meta.last_time;
        self.meta.total += elapsed as f64 * f64::from(*self.weight);
        *self.weight = self.meta.total as Weight;
    }
}
