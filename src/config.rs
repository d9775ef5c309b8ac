//! Engine configuration. `cap_min` doubles as the cache capacity and the
//! level-0 table-size unit; `cap_max` is the largest level's nominal
//! capacity. Level count and per-level byte caps are derived once here so
//! compaction doesn't recompute them on every decision.

use std::path::{Path, PathBuf};

/// `base` of the level-count geometric progression.
const LEVEL_BASE: f64 = 4.0;

/// Table-count compaction threshold, constant across every level.
const TABLE_COUNT_CAP: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub cap_min: u64,
    pub cap_max: u64,
    level_count: usize,
    level_byte_caps_mb: Vec<u64>,
}

impl Config {
    /// Both `cap_min` and `cap_max` must be positive and `cap_max >=
    /// cap_min`; this is a construction-time programmer invariant, not a
    /// recoverable runtime condition, so it panics rather than returning
    /// `Result` (there is no corresponding `Error` variant for it).
    pub fn new(data_dir: impl AsRef<Path>, cap_min: u64, cap_max: u64) -> Config {
        assert!(cap_min > 0, "cap_min must be positive");
        assert!(cap_max > 0, "cap_max must be positive");
        assert!(cap_max >= cap_min, "cap_max must be >= cap_min");

        let ratio = cap_max as f64 / cap_min as f64;
        let computed = ratio.log(LEVEL_BASE).floor();
        let level_count = if computed < 1.0 { 1 } else { computed as usize };

        let level_byte_caps_mb = (0..level_count).map(|i| 10u64.pow(i as u32 + 1)).collect();

        Config {
            data_dir: data_dir.as_ref().to_path_buf(),
            cap_min,
            cap_max,
            level_count,
            level_byte_caps_mb,
        }
    }

    pub fn level_count(&self) -> usize {
        self.level_count
    }

    /// Table-count compaction threshold: a constant 10 at every level.
    pub fn table_count_cap(&self, _level: usize) -> usize {
        TABLE_COUNT_CAP
    }

    /// Per-level on-disk byte cap, in megabytes: `[10, 100, 1000, ...]`.
    pub fn byte_cap_mb(&self, level: usize) -> u64 {
        self.level_byte_caps_mb[level]
    }

    /// Cache capacity in bytes, and the unit level-0 table capacity.
    pub fn cache_capacity(&self) -> u64 {
        self.cap_min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_level_count_from_ratio() {
        let config = Config::new("/tmp/hlsm", 1_000, 1_000_000);
        // 1_000_000 / 1_000 = 1_000 = 4^x -> x = log4(1000) ~= 4.98 -> floor 4
        assert_eq!(config.level_count(), 4);
        assert_eq!(config.table_count_cap(0), 10);
        assert_eq!(config.table_count_cap(1), 10);
        assert_eq!(config.byte_cap_mb(0), 10);
        assert_eq!(config.byte_cap_mb(1), 100);
    }

    #[test]
    fn never_derives_zero_levels() {
        let config = Config::new("/tmp/hlsm", 1_000, 1_000);
        assert_eq!(config.level_count(), 1);
    }

    #[test]
    #[should_panic]
    fn rejects_cap_max_below_cap_min() {
        Config::new("/tmp/hlsm", 1_000, 100);
    }
}
