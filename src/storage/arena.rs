use std::mem;

use super::line::{MetaLine, TrainCell, WeightLine, nr_rows};
use crate::error::{ModelErr, Result};

/// Handle to the row table of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u32);

/// Handle to one weight line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineId(u32);

/// Owns every row table, weight line and metadata line of a model.
///
/// Storage only grows, handles stay valid until the arena is dropped.
/// A feature's row table is the `nr_rows` long range of `row_ptrs`
/// starting at `table * nr_rows`, every entry is `None` until that row
/// is first written.
///
/// Metadata lines only exist for lines that were trained. `meta_ptrs` is
/// indexed by line and stays empty until the first training touch, so a
/// restored model carries weights only.
#[derive(Debug)]
pub struct RowArena {
    nr_rows: usize,
    row_ptrs: Vec<Option<LineId>>,
    freqs: Vec<u64>,
    lines: Vec<WeightLine>,
    meta_ptrs: Vec<Option<u32>>,
    meta: Vec<MetaLine>,
}

fn next_id(len: usize, what: &'static str) -> Result<u32> {
    u32::try_from(len).map_err(|_| ModelErr::Allocation { what })
}

impl RowArena {
    /// Creates a new `RowArena`.
    ///
    /// # Arguments
    /// * `nr_class` - The amount of classes every feature covers.
    pub fn new(nr_class: usize) -> Self {
        Self {
            nr_rows: nr_rows(nr_class),
            row_ptrs: Vec::new(),
            freqs: Vec::new(),
            lines: Vec::new(),
            meta_ptrs: Vec::new(),
            meta: Vec::new(),
        }
    }

    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    pub fn nr_tables(&self) -> usize {
        self.freqs.len()
    }

    pub fn nr_lines(&self) -> usize {
        self.lines.len()
    }

    /// Allocates an empty row table.
    ///
    /// # Returns
    /// The handle of the new table or `ModelErr::Allocation` if memory ran out.
    pub fn alloc_table(&mut self) -> Result<TableId> {
        let id = next_id(self.freqs.len(), "row table")?;

        self.row_ptrs
            .try_reserve(self.nr_rows)
            .map_err(|_| ModelErr::Allocation { what: "row table" })?;
        self.freqs
            .try_reserve(1)
            .map_err(|_| ModelErr::Allocation { what: "row table" })?;

        self.row_ptrs
            .extend(std::iter::repeat_n(None, self.nr_rows));
        self.freqs.push(0);
        Ok(TableId(id))
    }

    /// Returns the row table of a feature, one entry per row.
    pub fn rows(&self, table: TableId) -> &[Option<LineId>] {
        let base = table.0 as usize * self.nr_rows;
        &self.row_ptrs[base..base + self.nr_rows]
    }

    pub fn line(&self, id: LineId) -> &WeightLine {
        &self.lines[id.0 as usize]
    }

    pub fn line_mut(&mut self, id: LineId) -> &mut WeightLine {
        &mut self.lines[id.0 as usize]
    }

    /// Returns the metadata of a line, `None` if it was never trained.
    pub fn meta(&self, id: LineId) -> Option<&MetaLine> {
        let meta = self.meta_ptrs.get(id.0 as usize).copied().flatten()?;
        Some(&self.meta[meta as usize])
    }

    /// Iterates over the lines a feature has allocated.
    pub fn lines_of(&self, table: TableId) -> impl Iterator<Item = (LineId, &WeightLine)> + '_ {
        self.rows(table)
            .iter()
            .flatten()
            .map(|&id| (id, self.line(id)))
    }

    /// Returns the line holding `row` of a feature, allocating a zeroed
    /// weight line if the row was never written.
    ///
    /// # Arguments
    /// * `table` - The feature's row table.
    /// * `row` - The row index, must be below `nr_rows`.
    pub fn ensure_line(&mut self, table: TableId, row: usize) -> Result<LineId> {
        let slot = table.0 as usize * self.nr_rows + row;

        if let Some(id) = self.row_ptrs[slot] {
            return Ok(id);
        }

        let id = LineId(next_id(self.lines.len(), "weight line")?);

        self.lines
            .try_reserve(1)
            .map_err(|_| ModelErr::Allocation { what: "weight line" })?;

        self.lines.push(WeightLine::new(row));
        self.row_ptrs[slot] = Some(id);
        Ok(id)
    }

    /// Returns the index of a line's metadata, allocating a zeroed
    /// metadata line on the first training touch.
    fn ensure_meta(&mut self, id: LineId) -> Result<usize> {
        let idx = id.0 as usize;

        if self.meta_ptrs.len() <= idx {
            let missing = self.lines.len() - self.meta_ptrs.len();
            self.meta_ptrs
                .try_reserve(missing)
                .map_err(|_| ModelErr::Allocation { what: "metadata index" })?;
            self.meta_ptrs.resize(self.lines.len(), None);
        }

        if let Some(meta) = self.meta_ptrs[idx] {
            return Ok(meta as usize);
        }

        let meta = next_id(self.meta.len(), "metadata line")?;
        self.meta
            .try_reserve(1)
            .map_err(|_| ModelErr::Allocation { what: "metadata line" })?;

        self.meta.push(MetaLine::default());
        self.meta_ptrs[idx] = Some(meta);
        Ok(meta as usize)
    }

    /// Borrows the weight in column `col` of a line along with its metadata,
    /// allocating the metadata line if the line was never trained.
    pub fn train_cell(&mut self, id: LineId, col: usize) -> Result<TrainCell<'_>> {
        let meta = self.ensure_meta(id)?;
        let idx = id.0 as usize;
        Ok(TrainCell::new(
            &mut self.lines[idx].line[col],
            &mut self.meta[meta][col],
        ))
    }

    /// Finalizes the average of every cell of a line.
    ///
    /// # Returns
    /// Whether the line carried metadata, untrained lines are left as is.
    pub fn finalize_line(&mut self, id: LineId, final_time: u64) -> bool {
        let idx = id.0 as usize;
        let Some(meta) = self.meta_ptrs.get(idx).copied().flatten() else {
            return false;
        };

        let (weights, meta) = (&mut self.lines[idx].line, &mut self.meta[meta as usize]);
        for (weight, cell) in weights.iter_mut().zip(meta.iter_mut()) {
            TrainCell::new(weight, cell).finalize_average(final_time);
        }
        true
    }

    /// Returns how many updates a feature received across all classes.
    pub fn freq(&self, table: TableId) -> u64 {
        self.freqs[table.0 as usize]
    }

    pub fn add_freq(&mut self, table: TableId, inc: u64) {
        self.freqs[table.0 as usize] += inc;
    }

    pub fn set_freq(&mut self, table: TableId, freq: u64) {
        self.freqs[table.0 as usize] = freq;
    }

    /// Bytes reserved by the weight lines.
    pub fn line_bytes(&self) -> usize {
        self.lines.capacity() * mem::size_of::<WeightLine>()
    }

    /// Bytes reserved by the metadata lines and their index.
    pub fn meta_bytes(&self) -> usize {
        self.meta.capacity() * mem::size_of::<MetaLine>()
            + self.meta_ptrs.capacity() * mem::size_of::<Option<u32>>()
    }

    /// Bytes reserved by the row tables and frequencies.
    pub fn table_bytes(&self) -> usize {
        self.row_ptrs.capacity() * mem::size_of::<Option<LineId>>()
            + self.freqs.capacity() * mem::size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LINE_SIZE;

    #[test]
    fn test_new_table_has_no_lines() {
        let mut arena = RowArena::new(10);
        let table = arena.alloc_table().unwrap();

        assert_eq!(arena.nr_rows(), 2);
        assert_eq!(arena.rows(table), &[None, None]);
        assert_eq!(arena.nr_lines(), 0);
        assert_eq!(arena.freq(table), 0);
    }

    #[test]
    fn test_lines_are_allocated_per_row() {
        let mut arena = RowArena::new(10);
        let a = arena.alloc_table().unwrap();
        let b = arena.alloc_table().unwrap();

        let line = arena.ensure_line(a, 1).unwrap();
        assert_eq!(arena.nr_lines(), 1);
        assert_eq!(arena.rows(a), &[None, Some(line)]);
        assert_eq!(arena.rows(b), &[None, None]);
        assert_eq!(arena.line(line).start, 7);

        let again = arena.ensure_line(a, 1).unwrap();
        assert_eq!(line, again);
        assert_eq!(arena.nr_lines(), 1);
    }

    #[test]
    fn test_train_cell_writes_through() {
        let mut arena = RowArena::new(3);
        let table = arena.alloc_table().unwrap();
        let line = arena.ensure_line(table, 0).unwrap();

        {
            let mut cell = arena.train_cell(line, 2).unwrap();
            cell.update_accumulator(4);
            cell.update_count(1);
            cell.update_weight(1.5);
        }

        let meta = arena.meta(line).unwrap();
        assert_eq!(meta[2].count, 1);
        assert_eq!(meta[2].last_time, 4);
        assert_eq!(arena.line(line).line[2], 1.5);
        assert_eq!(arena.line(line).line[0], 0.);
    }

    #[test]
    fn test_weight_lines_carry_no_metadata_until_trained() {
        let mut arena = RowArena::new(7);
        let table = arena.alloc_table().unwrap();
        let restored = arena.ensure_line(table, 0).unwrap();
        arena.line_mut(restored).line = [1.; LINE_SIZE];

        assert!(arena.meta(restored).is_none());
        assert_eq!(arena.meta_bytes(), 0);
        assert!(!arena.finalize_line(restored, 10));
        assert_eq!(arena.line(restored).line, [1.; LINE_SIZE]);

        let other = arena.alloc_table().unwrap();
        let trained = arena.ensure_line(other, 0).unwrap();
        arena.train_cell(trained, 0).unwrap().update_weight(2.);

        assert!(arena.meta(restored).is_none());
        assert!(arena.meta(trained).is_some());
        assert!(arena.finalize_line(trained, 0));
        assert_eq!(arena.line(trained).line[0], 2.);
    }

    #[test]
    fn test_lines_of_skips_absent_rows() {
        let mut arena = RowArena::new(21);
        let table = arena.alloc_table().unwrap();
        arena.ensure_line(table, 2).unwrap();
        arena.ensure_line(table, 0).unwrap();

        let starts: Vec<_> = arena.lines_of(table).map(|(_, line)| line.start).collect();
        assert_eq!(starts, [0, 14]);
    }
}
