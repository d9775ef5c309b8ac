//! Immutable on-disk table: `[data region][JSON sparse index][fixed footer]`.
//! Built once from a sorted batch of records, then opened read-only many
//! times over its lifetime.

mod footer;
mod name;
mod pread;

pub use footer::Footer;
pub use name::TableName;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Record;

/// Byte span of one record in the data region, plus whether it is a
/// tombstone — recorded directly in the index so a lookup never needs to
/// read the data region to answer "is this key deleted".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub offset: u64,
    pub length: u64,
    pub tombstone: bool,
}

/// Result of a point lookup against a single table.
pub enum Lookup {
    Absent,
    Tombstone,
    Value(serde_json::Value),
}

pub struct Table {
    path: PathBuf,
    file: File,
    footer: Footer,
    index: HashMap<String, Position>,
    keys: Vec<String>,
}

impl Table {
    /// Build a new table file from records already sorted ascending by key
    /// and write it at `path`. Returns the opened `Table` ready for reads.
    pub fn build(path: &Path, records: &[Record]) -> Result<Table> {
        let mut data = Vec::new();
        let mut index = HashMap::with_capacity(records.len());
        for record in records {
            let offset = data.len() as u64;
            let bytes = record.encode()?;
            let length = bytes.len() as u64;
            data.extend_from_slice(&bytes);
            index.insert(
                record.key.clone(),
                Position {
                    offset,
                    length,
                    tombstone: record.tombstone,
                },
            );
        }
        let data_len = data.len() as i64;
        let index_bytes = serde_json::to_vec(&index)?;
        let index_len = index_bytes.len() as i64;
        let footer = Footer {
            version: footer::VERSION,
            data_start: 0,
            data_len,
            index_start: data_len,
            index_len,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .read(true)
            .open(path)?;
        file.write_all(&data)?;
        file.write_all(&index_bytes)?;
        file.write_all(&footer.encode())?;
        file.sync_all()?;

        let mut keys: Vec<String> = index.keys().cloned().collect();
        keys.sort();

        log::debug!("built table {:?} with {} records", path, keys.len());

        Ok(Table {
            path: path.to_path_buf(),
            file,
            footer,
            index,
            keys,
        })
    }

    /// Open a table by its file name within `dir`, requiring that the name
    /// parse as a recognized table-naming scheme. Unlike the startup
    /// loader's directory scan (which skips unrecognized names silently —
    /// this is for callers that already expect `name`
    /// to be a table and want a hard error otherwise.
    pub fn open_named(dir: &Path, name: &str) -> Result<(TableName, Table)> {
        let parsed = TableName::parse(name).ok_or_else(|| Error::InvalidFileName(dir.join(name)))?;
        let table = Table::open(&dir.join(name))?;
        Ok((parsed, table))
    }

    /// Open an existing table file, reading its footer and sparse index
    /// into memory. The data region is left on disk and read positionally.
    pub fn open(path: &Path) -> Result<Table> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size < footer::LEN {
            return Err(Error::InvalidTableFile {
                path: path.to_path_buf(),
                reason: format!("file is only {size} bytes, too small for a footer"),
            });
        }
        let footer_bytes = pread::read_exact_at(&file, size - footer::LEN, footer::LEN as usize)?;
        let footer = Footer::decode(path, &footer_bytes)?;

        let index_bytes = pread::read_exact_at(
            &file,
            footer.index_start as u64,
            footer.index_len as usize,
        )?;
        let index: HashMap<String, Position> =
            serde_json::from_slice(&index_bytes).map_err(|e| Error::InvalidTableFile {
                path: path.to_path_buf(),
                reason: format!("sparse index is not valid JSON: {e}"),
            })?;

        let mut keys: Vec<String> = index.keys().cloned().collect();
        keys.sort();

        log::debug!("opened table {:?} with {} records", path, keys.len());

        Ok(Table {
            path: path.to_path_buf(),
            file,
            footer,
            index,
            keys,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Size of the whole table file on disk, used for level byte-cap
    /// accounting.
    pub fn on_disk_size(&self) -> u64 {
        footer::LEN + self.footer.index_len as u64 + self.footer.data_len as u64
    }

    /// Binary-search the sorted key list, then resolve through the sparse
    /// index with a positional read.
    pub fn get(&self, key: &str) -> Lookup {
        if self.keys.binary_search_by(|k| k.as_str().cmp(key)).is_err() {
            return Lookup::Absent;
        }
        let position = match self.index.get(key) {
            Some(p) => *p,
            None => return Lookup::Absent,
        };
        if position.tombstone {
            return Lookup::Tombstone;
        }
        match self.read_record(position) {
            Some(record) => Lookup::Value(record.value),
            None => Lookup::Absent,
        }
    }

    /// Read every record in the table, in sorted-key order. Used by
    /// compaction; a record that fails to decode is skipped and logged,
    /// never propagated.
    pub fn scan(&self) -> Vec<Record> {
        let mut out = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            if let Some(&position) = self.index.get(key) {
                if let Some(record) = self.read_record(position) {
                    out.push(record);
                } else if !position.tombstone {
                    log::warn!("skipping undecodable record for key {key:?} in {:?}", self.path);
                }
            }
        }
        out
    }

    fn read_record(&self, position: Position) -> Option<Record> {
        let bytes = match pread::read_exact_at(&self.file, position.offset, position.length as usize) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("read failure in table {:?}: {e}", self.path);
                return None;
            }
        };
        match Record::decode(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("decode failure in table {:?}: {e}", self.path);
                None
            }
        }
    }

    /// Close and remove the table file from disk. Consumes the table since
    /// further reads after deletion make no sense.
    pub fn delete(self) -> Result<()> {
        drop(self.file);
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("hlsm-table-test-{}-{}", std::process::id(), name));
        dir
    }

    #[test]
    fn build_then_open_roundtrips_values_and_tombstones() {
        let path = temp_path("roundtrip");
        let records = vec![
            Record::new("a", json!(1)),
            Record::new("b", json!("two")),
            Record::tombstone("c"),
        ];
        Table::build(&path, &records).unwrap();

        let table = Table::open(&path).unwrap();
        assert_eq!(table.len(), 3);
        match table.get("a") {
            Lookup::Value(v) => assert_eq!(v, json!(1)),
            _ => panic!("expected value"),
        }
        match table.get("c") {
            Lookup::Tombstone => {}
            _ => panic!("expected tombstone"),
        }
        match table.get("missing") {
            Lookup::Absent => {}
            _ => panic!("expected absent"),
        }

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn scan_returns_records_in_sorted_key_order() {
        let path = temp_path("scan");
        let records = vec![
            Record::new("b", json!(2)),
            Record::new("a", json!(1)),
            Record::new("c", json!(3)),
        ];
        Table::build(&path, &records).unwrap();
        let table = Table::open(&path).unwrap();
        let scanned = table.scan();
        let keys: Vec<&str> = scanned.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn open_rejects_truncated_file() {
        let path = temp_path("truncated");
        fs::write(&path, b"not a table file").unwrap();
        assert!(Table::open(&path).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn delete_removes_the_file() {
        let path = temp_path("delete");
        Table::build(&path, &[Record::new("a", json!(1))]).unwrap();
        assert!(path.exists());
        let table = Table::open(&path).unwrap();
        table.delete().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn open_named_parses_the_file_name_and_rejects_unrecognized_ones() {
        let dir = temp_path("named-dir");
        fs::create_dir_all(&dir).unwrap();
        let file_name = TableName::Level { level: 0, index: 1 }.to_file_name();
        Table::build(&dir.join(&file_name), &[Record::new("a", json!(1))]).unwrap();

        let (parsed, _table) = Table::open_named(&dir, &file_name).unwrap();
        assert_eq!(parsed, TableName::Level { level: 0, index: 1 });

        assert!(Table::open_named(&dir, "not-a-table.txt").is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
