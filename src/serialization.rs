//! Plain-text persistence of a model's weights.
//!
//! Every record is one line of tab-separated fields:
//!
//! ```text
//! freq  template  feature  row  start  w0  w1  w2  w3  w4  w5  w6
//! ```
//!
//! `freq` is the total amount of updates the feature received, `start` the
//! first class covered by the row and the weights are written truncated to
//! integers. Only rows with a nonzero truncated weight are written. There
//! is no header or footer.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use log::info;

use crate::{
    config::LearnerConfig,
    error::{ModelErr, Result},
    features::{FeatureKey, TemplateId, Weight},
    model::{LinearModel, Phase},
    storage::{LINE_SIZE, nr_rows},
};

const NR_FIELDS: usize = 5 + LINE_SIZE;

/// One parsed line of a dump.
#[derive(Debug, Clone, PartialEq)]
struct Record {
    freq: u64,
    key: FeatureKey,
    row: usize,
    line: [Weight; LINE_SIZE],
}

/// Returns whether a row would be written as all zeros once truncated.
fn is_blank(line: &[Weight; LINE_SIZE]) -> bool {
    line.iter().all(|&w| w as i64 == 0)
}

fn format_err(line: usize, reason: impl Into<String>) -> ModelErr {
    ModelErr::Format {
        line,
        reason: reason.into(),
    }
}

fn parse_field<T: FromStr>(field: &str, name: &str, line: usize) -> Result<T> {
    field
        .parse()
        .map_err(|_| format_err(line, format!("{name} is not a valid number: {field:?}")))
}

impl Record {
    /// Parses a record, `line` being its 1-based position for error reports.
    fn parse(s: &str, line: usize, nr_rows: usize) -> Result<Self> {
        let fields: Vec<&str> = s.split('\t').map(str::trim).collect();
        if fields.len() != NR_FIELDS {
            return Err(format_err(
                line,
                format!("expected {NR_FIELDS} fields, got {}", fields.len()),
            ));
        }

        let freq = parse_field(fields[0], "freq", line)?;
        let template: TemplateId = parse_field(fields[1], "template", line)?;
        let feature: u64 = parse_field(fields[2], "feature", line)?;
        let row: usize = parse_field(fields[3], "row", line)?;
        let start: usize = parse_field(fields[4], "start", line)?;

        let key = FeatureKey::new(template, feature)
            .ok_or_else(|| format_err(line, "feature id 0 is reserved"))?;

        if row >= nr_rows {
            return Err(format_err(
                line,
                format!("row {row} is out of range for {nr_rows} rows"),
            ));
        }

        if start != row * LINE_SIZE {
            return Err(format_err(
                line,
                format!("start {start} doesn't match row {row}"),
            ));
        }

        let mut weights = [0.; LINE_SIZE];
        for (w, field) in weights.iter_mut().zip(&fields[5..]) {
            let value: i64 = parse_field(field, "weight", line)?;
            *w = value as Weight;
        }

        Ok(Self {
            freq,
            key,
            row,
            line: weights,
        })
    }

    fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        write!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            self.freq,
            self.key.template(),
            self.key.feature(),
            self.row,
            self.row * LINE_SIZE
        )?;

        for w in self.line {
            write!(writer, "\t{}", w as i64)?;
        }

        writeln!(writer)?;
        Ok(())
    }
}

impl LinearModel {
    /// Writes every nonzero row of the scoring weights.
    ///
    /// # Arguments
    /// * `writer` - The destination of the records.
    /// * `freq_thresh` - Features updated fewer times than this are left out.
    ///
    /// # Returns
    /// The amount of records written.
    pub fn dump<W: Write>(&self, mut writer: W, freq_thresh: u64) -> Result<usize> {
        let weights = self.weights();
        let mut features: Vec<_> = weights
            .iter()
            .filter(|&(_, handle)| weights.freq(handle) >= freq_thresh)
            .collect();
        features.sort_unstable_by_key(|&(key, _)| key);

        let mut written = 0;
        for (key, handle) in features {
            let freq = weights.freq(handle);

            for line in weights.lines(handle).filter(|line| !is_blank(&line.line)) {
                let record = Record {
                    freq,
                    key,
                    row: line.row(),
                    line: line.line,
                };
                record.write(&mut writer)?;
                written += 1;
            }
        }

        writer.flush()?;
        info!("dumped {written} weight records, freq_thresh={freq_thresh}");
        Ok(written)
    }

    /// Dumps the model into a file, replacing it if it exists.
    pub fn dump_to_path<P: AsRef<Path>>(&self, path: P, freq_thresh: u64) -> Result<usize> {
        let file = File::create(path)?;
        self.dump(BufWriter::new(file), freq_thresh)
    }

    /// Restores a model for scoring from records written by `dump`.
    ///
    /// Only the scoring weights are rebuilt, the model can't be trained
    /// further. A later record for the same feature and row replaces an
    /// earlier one.
    ///
    /// # Arguments
    /// * `config` - The configuration of the model being restored.
    /// * `reader` - The source of the records.
    /// * `freq_thresh` - Records of features updated fewer times than this are skipped.
    ///
    /// # Returns
    /// The restored model or `ModelErr::Format` for the first malformed line.
    pub fn load<R: BufRead>(config: &LearnerConfig, reader: R, freq_thresh: u64) -> Result<Self> {
        let mut model = Self::new(config)?;
        let nr_rows = nr_rows(model.nr_class());
        let mut loaded = 0;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record = Record::parse(&line, i + 1, nr_rows)?;
            if record.freq < freq_thresh {
                continue;
            }

            model
                .feature_map_mut()
                .insert_line(record.key, record.row, &record.line, record.freq)?;
            loaded += 1;
        }

        model.set_phase(Phase::Loaded);
        info!(
            "loaded {loaded} weight records for {} features",
            model.nr_features()
        );
        Ok(model)
    }

    /// Restores a model from a file written by `dump_to_path`.
    pub fn load_from_path<P: AsRef<Path>>(
        config: &LearnerConfig,
        path: P,
        freq_thresh: u64,
    ) -> Result<Self> {
        let file = File::open(path)?;
        Self::load(config, BufReader::new(file), freq_thresh)
    }
}
