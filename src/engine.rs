//! The engine façade: the only type most callers touch. Wires together the
//! cache, durability log, level tree, and single-flight gate into
//! `insert`/`erase`/`get`.

use std::fs;
use std::sync::Mutex;

use fs2::FileExt;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::flight::Flight;
use crate::record::Record;
use crate::table::{Lookup, Table, TableName};
use crate::tree::Tree;
use crate::wal::Wal;

pub struct Engine {
    config: Config,
    cache: Cache,
    tree: Tree,
    wal: Mutex<Wal>,
    /// Serializes the multi-step write path (log append, cache apply, and
    /// the decision to flush+compact). Reads never take it: `get` only
    /// touches the cache's own reader-writer lock, the tree's own
    /// reader-writer lock, and the single-flight gate's mutex.
    write_lock: Mutex<()>,
    flight: Flight<Option<serde_json::Value>>,
}

impl Engine {
    /// Open (or create) the store at `config.data_dir`. Acquires an
    /// advisory exclusive lock on the durability log, which stands in as a
    /// sentinel for the whole directory, replays any log contents into the
    /// cache, then enumerates existing table files.
    pub fn open(config: Config) -> Result<Engine> {
        fs::create_dir_all(&config.data_dir)?;

        let mut wal = Wal::open(&config.data_dir)?;
        wal.file()
            .try_lock_exclusive()
            .map_err(|_| Error::DirectoryLocked(config.data_dir.clone()))?;

        let cache = Cache::new(config.cache_capacity());
        let replayed = wal.replay()?;
        let replayed_count = replayed.len();
        cache.put(replayed);
        if replayed_count > 0 {
            log::info!("replayed {replayed_count} durability-log records into the cache");
        }

        let tree = Tree::new(&config);
        Engine::load_tables(&config, &tree)?;

        Ok(Engine {
            config,
            cache,
            tree,
            wal: Mutex::new(wal),
            write_lock: Mutex::new(()),
            flight: Flight::new(),
        })
    }

    fn load_tables(config: &Config, tree: &Tree) -> Result<()> {
        for entry in fs::read_dir(&config.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if file_name == crate::wal::FILE_NAME {
                continue;
            }
            match TableName::parse(file_name) {
                Some(TableName::Level { level, index }) => match Table::open(&path) {
                    Ok(table) => tree.register_level_table(level as usize, index, table),
                    Err(e) => log::warn!("failed to open level table {path:?}: {e}"),
                },
                Some(TableName::Top { n }) => tree.note_top_block(n),
                None => log::debug!("ignoring unrecognized file {path:?}"),
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn insert(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let _guard = self.write_lock.lock().expect("engine write lock poisoned");
        self.write_with_retry(Record::new(key, value))
    }

    pub fn erase(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().expect("engine write lock poisoned");
        self.write_with_retry(Record::tombstone(key))
    }

    fn write_with_retry(&self, record: Record) -> Result<()> {
        self.append_log(&record)?;
        if self.apply_to_cache(&record) {
            return Ok(());
        }

        log::info!("cache full, flushing level 0 and compacting before retrying write");
        self.flush_and_compact()?;

        // The record that triggered the flush was logged into the file we
        // just reset and deleted; it must be re-logged against the fresh
        // log before retrying, or an acknowledged write could be lost on a
        // crash between the reset and this retry.
        self.append_log(&record)?;
        if self.apply_to_cache(&record) {
            Ok(())
        } else {
            Err(Error::CacheOverflow {
                cap: self.cache.capacity(),
                needed: record.footprint(),
            })
        }
    }

    fn append_log(&self, record: &Record) -> Result<()> {
        self.wal.lock().expect("wal lock poisoned").append(record)
    }

    fn apply_to_cache(&self, record: &Record) -> bool {
        if record.tombstone {
            self.cache.erase(&record.key)
        } else {
            self.cache.insert(&record.key, record.value.clone())
        }
    }

    fn flush_and_compact(&self) -> Result<()> {
        let drained = self.cache.drain_sorted();
        if !drained.is_empty() {
            self.tree.insert(0, &drained)?;
            self.tree.compact(0)?;
        }
        self.wal.lock().expect("wal lock poisoned").reset()
    }

    /// Cache probe first; on miss, a single-flight-deduplicated lookup
    /// through the level tree and then the top-blocks. A hit is written
    /// back into the cache (populate-on-read). A miss returns `Ok(None)`
    /// without mutating anything — a cache-miss read never poisons the
    /// key with a tombstone.
    pub fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if let Some(record) = self.cache.get(key) {
            return Ok(if record.tombstone { None } else { Some(record.value) });
        }

        let tree = &self.tree;
        let result = self.flight.do_call(key, || -> Result<Option<serde_json::Value>> {
            match tree.get(key) {
                Lookup::Value(v) => return Ok(Some(v)),
                Lookup::Tombstone => return Ok(None),
                Lookup::Absent => {}
            }
            match tree.get_top_blocks(key) {
                Lookup::Value(v) => Ok(Some(v)),
                Lookup::Tombstone | Lookup::Absent => Ok(None),
            }
        })?;

        if let Some(value) = &result {
            self.cache.insert(key, value.clone());
        }
        Ok(result)
    }
}
