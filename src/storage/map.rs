use std::mem;

use rustc_hash::FxHashMap;

use super::{
    arena::{LineId, RowArena, TableId},
    line::{LINE_SIZE, TrainCell, WeightLine, row_col},
};
use crate::{
    error::Result,
    features::{ClassId, FeatureKey, Weight},
};

/// Handle to the weights of one feature, valid for the lifetime of its `FeatureMap`.
pub type FeatureHandle = TableId;

/// Maps feature keys to their rows.
///
/// Two maps share one arena: the inference map holds every feature that can
/// be scored, the training map holds the features that carry averaging
/// metadata. A feature present in both points to the same row table.
#[derive(Debug)]
pub struct FeatureMap {
    arena: RowArena,
    weights: FxHashMap<FeatureKey, TableId>,
    train: FxHashMap<FeatureKey, TableId>,
}

impl FeatureMap {
    /// Creates a new empty `FeatureMap`.
    ///
    /// # Arguments
    /// * `nr_class` - The amount of classes every feature covers.
    pub fn new(nr_class: usize) -> Self {
        Self {
            arena: RowArena::new(nr_class),
            weights: FxHashMap::default(),
            train: FxHashMap::default(),
        }
    }

    /// The read-only view used for scoring.
    pub fn weights(&self) -> WeightsView<'_> {
        WeightsView {
            map: &self.weights,
            arena: &self.arena,
        }
    }

    /// The read/write view used for training.
    pub fn train(&mut self) -> TrainView<'_> {
        TrainView {
            weights: &mut self.weights,
            train: &mut self.train,
            arena: &mut self.arena,
        }
    }

    /// Overwrites one row of a feature's weights in the inference map only.
    ///
    /// Used when restoring a persisted model, the row gets no metadata that
    /// could be averaged later.
    ///
    /// # Arguments
    /// * `key` - The feature to write.
    /// * `row` - The row index, must be below `nr_rows`.
    /// * `line` - The weights of the row.
    /// * `freq` - The persisted update frequency of the feature.
    pub fn insert_line(
        &mut self,
        key: FeatureKey,
        row: usize,
        line: &[Weight; LINE_SIZE],
        freq: u64,
    ) -> Result<()> {
        let table = match self.weights.get(&key) {
            Some(&table) => table,
            None => {
                let table = self.arena.alloc_table()?;
                self.weights.insert(key, table);
                table
            }
        };

        let id = self.arena.ensure_line(table, row)?;
        self.arena.line_mut(id).line = *line;
        self.arena.set_freq(table, freq);
        Ok(())
    }

    pub fn arena(&self) -> &RowArena {
        &self.arena
    }

    /// Bytes reserved by both hash maps.
    pub fn map_bytes(&self) -> usize {
        // one control byte per bucket
        let bucket = mem::size_of::<(FeatureKey, TableId)>() + 1;
        (self.weights.capacity() + self.train.capacity()) * bucket
    }
}

/// Read-only access to the inference map.
#[derive(Debug, Clone, Copy)]
pub struct WeightsView<'a> {
    map: &'a FxHashMap<FeatureKey, TableId>,
    arena: &'a RowArena,
}

impl<'a> WeightsView<'a> {
    pub fn get(&self, key: FeatureKey) -> Option<FeatureHandle> {
        self.map.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the allocated rows of a feature.
    pub fn lines(&self, handle: FeatureHandle) -> impl Iterator<Item = &'a WeightLine> + 'a {
        self.arena.lines_of(handle).map(|(_, line)| line)
    }

    /// Returns the weight of a feature for `class`, `0` if its row was never written.
    pub fn weight(&self, handle: FeatureHandle, class: ClassId) -> Weight {
        let (row, col) = row_col(class);

        self.arena
            .rows(handle)
            .get(row)
            .copied()
            .flatten()
            .map_or(0., |id| self.arena.line(id).line[col])
    }

    pub fn freq(&self, handle: FeatureHandle) -> u64 {
        self.arena.freq(handle)
    }

    /// Iterates over every feature of the inference map in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureKey, FeatureHandle)> + 'a {
        self.map.iter().map(|(&key, &table)| (key, table))
    }
}

/// Read/write access to the training map.
#[derive(Debug)]
pub struct TrainView<'a> {
    weights: &'a mut FxHashMap<FeatureKey, TableId>,
    train: &'a mut FxHashMap<FeatureKey, TableId>,
    arena: &'a mut RowArena,
}

impl TrainView<'_> {
    pub fn get(&self, key: FeatureKey) -> Option<FeatureHandle> {
        self.train.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    /// Returns the training entry of `key`, creating it if needed.
    ///
    /// A new entry gets an empty row table that is registered in the
    /// inference map too. If the inference map already knows the key, its
    /// table is reused.
    pub fn get_or_create(&mut self, key: FeatureKey) -> Result<FeatureHandle> {
        if let Some(&table) = self.train.get(&key) {
            return Ok(table);
        }

        let table = match self.weights.get(&key) {
            Some(&table) => table,
            None => {
                let table = self.arena.alloc_table()?;
                self.weights.insert(key, table);
                table
            }
        };

        self.train.insert(key, table);
        Ok(table)
    }

    /// Borrows the cell of a feature for `class`, allocating its row if
    /// it was never written.
    ///
    /// # Arguments
    /// * `handle` - A handle from `get_or_create`.
    /// * `class` - The class, must be below the map's `nr_class`.
    pub fn cell(&mut self, handle: FeatureHandle, class: ClassId) -> Result<TrainCell<'_>> {
        let (row, col) = row_col(class);
        let id = self.arena.ensure_line(handle, row)?;
        self.arena.train_cell(id, col)
    }

    /// Counts one more update for the feature as a whole.
    pub fn bump_freq(&mut self, handle: FeatureHandle) {
        self.arena.add_freq(handle, 1);
    }

    /// Replaces every trained weight by its time-accumulated total.
    ///
    /// Only rows that carry training metadata are visited.
    ///
    /// # Returns
    /// The amount of lines that were finalized.
    pub fn finalize(&mut self, final_time: u64) -> usize {
        let mut ids: Vec<LineId> = Vec::new();
        let mut finalized = 0;

        for &table in self.train.values() {
            ids.clear();
            ids.extend(self.arena.rows(table).iter().flatten());

            for &id in &ids {
                if self.arena.finalize_line(id, final_time) {
                    finalized += 1;
                }
            }
        }

        finalized
    }
}
