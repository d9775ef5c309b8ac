//! The level tree: a sequence of in-memory-indexed, on-disk table levels
//! plus an on-demand top-level block tier.

mod level;

use std::path::PathBuf;
use std::sync::RwLock;

use level::Level;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::Result;
use crate::record::Record;
use crate::table::{Lookup, Table, TableName};

struct Inner {
    levels: Vec<Level>,
    next_index: Vec<u64>,
    top_count: u64,
}

pub struct Tree {
    data_dir: PathBuf,
    level_count: usize,
    table_count_caps: Vec<usize>,
    byte_cap_mb: Vec<u64>,
    cache_cap: u64,
    inner: RwLock<Inner>,
}

impl Tree {
    pub fn new(config: &Config) -> Tree {
        let level_count = config.level_count();
        Tree {
            data_dir: config.data_dir.clone(),
            level_count,
            table_count_caps: (0..level_count).map(|l| config.table_count_cap(l)).collect(),
            byte_cap_mb: (0..level_count).map(|l| config.byte_cap_mb(l)).collect(),
            cache_cap: config.cache_capacity(),
            inner: RwLock::new(Inner {
                levels: (0..level_count).map(|_| Level::default()).collect(),
                next_index: vec![0; level_count],
                top_count: 0,
            }),
        }
    }

    pub fn level_count(&self) -> usize {
        self.level_count
    }

    /// Register a table discovered on disk at startup, keeping each
    /// level's table list ordered ascending by index.
    pub fn register_level_table(&self, level: usize, index: u64, table: Table) {
        let mut inner = self.inner.write().expect("tree lock poisoned");
        if level >= inner.levels.len() {
            log::warn!("ignoring table for out-of-range level {level}");
            return;
        }
        inner.next_index[level] = inner.next_index[level].max(index + 1);
        let tables = &mut inner.levels[level].tables;
        let pos = tables.partition_point(|(i, _)| *i < index);
        tables.insert(pos, (index, table));
    }

    /// Record a top-level block discovered on disk at startup. Top blocks
    /// are counted, never loaded.
    pub fn note_top_block(&self, n: u64) {
        let mut inner = self.inner.write().expect("tree lock poisoned");
        inner.top_count = inner.top_count.max(n);
    }

    pub fn top_block_count(&self) -> u64 {
        self.inner.read().expect("tree lock poisoned").top_count
    }

    /// Build and register a new table at `level` from records already
    /// sorted ascending by key.
    pub fn insert(&self, level: usize, records: &[Record]) -> Result<()> {
        let mut inner = self.inner.write().expect("tree lock poisoned");
        self.insert_locked(&mut inner, level, records)
    }

    fn insert_locked(&self, inner: &mut Inner, level: usize, records: &[Record]) -> Result<()> {
        let index = inner.next_index[level];
        inner.next_index[level] += 1;
        let name = TableName::Level {
            level: level as u32,
            index,
        };
        let path = self.data_dir.join(name.to_file_name());
        let table = Table::build(&path, records)?;
        inner.levels[level].tables.push((index, table));
        log::info!("flushed {} records to level {level} as {:?}", records.len(), path);
        Ok(())
    }

    /// A top-level block is the terminal merge: a tombstone here has no
    /// older copy left to shadow anywhere in the tree, so it is dropped
    /// rather than carried forward.
    fn persist_top_block_locked(&self, inner: &mut Inner, records: &[Record]) -> Result<()> {
        let live: Vec<Record> = records.iter().filter(|r| !r.tombstone).cloned().collect();
        inner.top_count += 1;
        let n = inner.top_count;
        let name = TableName::Top { n };
        let path = self.data_dir.join(name.to_file_name());
        Table::build(&path, &live)?;
        log::info!("coalesced {} records into top block {:?}", live.len(), path);
        Ok(())
    }

    /// Compact level `level` if it has crossed either its table-count or
    /// byte-size threshold, cascading into subsequent levels as needed.
    /// The whole operation runs under one exclusive lock: there is no
    /// background compaction thread to make a finer-grained split worth
    /// the complexity.
    pub fn compact(&self, level: usize) -> Result<()> {
        if level >= self.level_count {
            return Ok(());
        }

        let mut inner = self.inner.write().expect("tree lock poisoned");
        let table_count = inner.levels[level].tables.len();
        let byte_size_mb = inner.levels[level].on_disk_size() / 1024 / 1024;
        if table_count < self.table_count_caps[level] && byte_size_mb < self.byte_cap_mb[level] {
            return Ok(());
        }

        log::info!(
            "compacting level {level}: {table_count} tables, {byte_size_mb} MB on disk"
        );

        let tables = std::mem::take(&mut inner.levels[level].tables);
        let merge_cache = Cache::new(self.cache_cap);
        for (_, table) in &tables {
            for record in table.scan() {
                if record.tombstone {
                    merge_cache.erase(&record.key);
                } else {
                    merge_cache.insert(&record.key, record.value);
                }
            }
        }
        for (_, table) in tables {
            table.delete()?;
        }
        inner.next_index[level] = 0;

        let drained = merge_cache.drain_sorted();
        if !drained.is_empty() {
            if level + 1 >= self.level_count {
                self.persist_top_block_locked(&mut inner, &drained)?;
            } else {
                self.insert_locked(&mut inner, level + 1, &drained)?;
            }
        }

        drop(inner);
        self.compact(level + 1)
    }

    /// Probe levels `0..level_count`, newest table first within each
    /// level. Returns on the first hit (value or tombstone).
    pub fn get(&self, key: &str) -> Lookup {
        let inner = self.inner.read().expect("tree lock poisoned");
        for level in &inner.levels {
            for (_, table) in level.tables.iter().rev() {
                match table.get(key) {
                    Lookup::Absent => continue,
                    hit => return hit,
                }
            }
        }
        Lookup::Absent
    }

    /// Probe top-level blocks newest (`n`) first, opening and closing each
    /// file handle on demand rather than holding them open.
    pub fn get_top_blocks(&self, key: &str) -> Lookup {
        let top_count = self.top_block_count();
        for n in (1..=top_count).rev() {
            let name = TableName::Top { n };
            let path = self.data_dir.join(name.to_file_name());
            let table = match Table::open(&path) {
                Ok(table) => table,
                Err(e) => {
                    log::warn!("failed to open top block {:?}: {e}", path);
                    continue;
                }
            };
            match table.get(key) {
                Lookup::Absent => continue,
                hit => return hit,
            }
        }
        Lookup::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hlsm-tree-test-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn insert_then_get_finds_newest_table_first() {
        let dir = temp_dir("lookup");
        let config = Config::new(&dir, 64, 4096);
        let tree = Tree::new(&config);

        tree.insert(0, &[Record::new("a", json!(1))]).unwrap();
        tree.insert(0, &[Record::new("a", json!(2))]).unwrap();

        match tree.get("a") {
            Lookup::Value(v) => assert_eq!(v, json!(2)),
            _ => panic!("expected value"),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn compact_merges_level_and_clears_source_tables() {
        let dir = temp_dir("compact");
        let config = Config::new(&dir, 64, 4096);
        let tree = Tree::new(&config);

        for i in 0..config.table_count_cap(0) {
            tree.insert(0, &[Record::new(format!("k{i}"), json!(i))]).unwrap();
        }
        tree.compact(0).unwrap();

        assert_eq!(tree.inner.read().unwrap().levels[0].tables.len(), 0);
        match tree.get("k0") {
            Lookup::Value(v) => assert_eq!(v, json!(0)),
            _ => panic!("expected merged record to have moved up a level or to a top block"),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn tombstone_shadows_older_value_across_tables() {
        let dir = temp_dir("tombstone");
        let config = Config::new(&dir, 64, 4096);
        let tree = Tree::new(&config);

        tree.insert(0, &[Record::new("a", json!(1))]).unwrap();
        tree.insert(0, &[Record::tombstone("a")]).unwrap();

        match tree.get("a") {
            Lookup::Tombstone => {}
            _ => panic!("expected tombstone to shadow the older value"),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn top_block_drops_tombstones_once_merged() {
        let dir = temp_dir("top-tombstone");
        // cap_max == cap_min floors the derived level count to 1, so
        // compacting level 0 spills straight into a top block.
        let config = Config::new(&dir, 64, 64);
        let tree = Tree::new(&config);

        tree.insert(0, &[Record::new("a", json!(1))]).unwrap();
        tree.insert(0, &[Record::tombstone("a")]).unwrap();
        for i in 0..(config.table_count_cap(0) - 2) {
            tree.insert(0, &[Record::new(format!("k{i}"), json!(i))]).unwrap();
        }
        tree.compact(0).unwrap();

        assert_eq!(tree.top_block_count(), 1);
        match tree.get_top_blocks("a") {
            Lookup::Absent => {}
            _ => panic!("expected the tombstone to be dropped rather than carried into the top block"),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
