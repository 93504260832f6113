use std::fmt;

use serde::Serialize;

/// Memory reserved by a model, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Amount of allocated weight lines.
    pub lines: usize,
    pub line_bytes: usize,
    pub meta_bytes: usize,
    /// Row tables and per-feature frequencies.
    pub table_bytes: usize,
    /// Both feature hash maps.
    pub map_bytes: usize,
    pub cache_bytes: usize,
}

impl MemoryStats {
    /// Returns the total footprint in bytes.
    pub const fn total(&self) -> usize {
        self.line_bytes + self.meta_bytes + self.table_bytes + self.map_bytes + self.cache_bytes
    }

    pub fn megabytes(&self) -> f64 {
        self.total() as f64 / 1_000_000.
    }
}

/// Report produced at the end of a training iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationSummary {
    pub iter: usize,
    pub n_correct: u64,
    pub n_total: u64,
    /// Ratio of score lookups served by the cache.
    pub cache_hit_ratio: f64,
    pub memory: MemoryStats,
}

impl IterationSummary {
    /// Returns the accuracy as a percentage, `0` when nothing was recorded.
    pub fn accuracy(&self) -> f64 {
        if self.n_total == 0 {
            return 0.;
        }

        self.n_correct as f64 / self.n_total as f64 * 100.
    }
}

impl fmt::Display for IterationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}: Moves {}/{}={:.1} {:.3} cache hit {:.1}mb",
            self.iter,
            self.n_correct,
            self.n_total,
            self.accuracy(),
            self.cache_hit_ratio,
            self.memory.megabytes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let summary = IterationSummary {
            iter: 2,
            n_correct: 3,
            n_total: 4,
            cache_hit_ratio: 0.25,
            memory: MemoryStats {
                line_bytes: 1_500_000,
                ..Default::default()
            },
        };

        assert_eq!(summary.accuracy(), 75.);
        assert_eq!(summary.to_string(), "#2: Moves 3/4=75.0 0.250 cache hit 1.5mb");
    }

    #[test]
    fn test_empty_summary_has_zero_accuracy() {
        let summary = IterationSummary {
            iter: 0,
            n_correct: 0,
            n_total: 0,
            cache_hit_ratio: 0.,
            memory: MemoryStats::default(),
        };
        assert_eq!(summary.accuracy(), 0.);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = IterationSummary {
            iter: 1,
            n_correct: 1,
            n_total: 1,
            cache_hit_ratio: 1.,
            memory: MemoryStats::default(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["n_correct"], 1);
        assert_eq!(json["memory"]["lines"], 0);
    }
}
