//! Append-only durability log. Every mutation is written here before it is
//! applied to the cache, so replaying the log after a crash reconstructs
//! the cache's pre-crash state exactly.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::record::Record;

pub const FILE_NAME: &str = "cache.db";

pub struct Wal {
    path: PathBuf,
    file: File,
}

impl Wal {
    /// Open (creating if absent) the log file at `dir/cache.db`.
    pub fn open(dir: &Path) -> Result<Wal> {
        let path = dir.join(FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Wal { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Append one record as `length (i64 LE) || JSON bytes`, fsyncing
    /// before returning so the append is durable by the time the caller
    /// observes success.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        let bytes = record.encode()?;
        let len = bytes.len() as i64;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Read every record currently in the log, in append order. Used for
    /// startup replay.
    pub fn replay(&mut self) -> Result<Vec<Record>> {
        let mut contents = Vec::new();
        self.file.read_to_end(&mut contents)?;

        let mut records = Vec::new();
        let mut pos = 0usize;
        while pos + 8 <= contents.len() {
            let mut len_bytes = [0u8; 8];
            len_bytes.copy_from_slice(&contents[pos..pos + 8]);
            let len = i64::from_le_bytes(len_bytes) as usize;
            pos += 8;
            if pos + len > contents.len() {
                log::warn!(
                    "durability log {:?} ends mid-record, ignoring trailing bytes",
                    self.path
                );
                break;
            }
            match Record::decode(&contents[pos..pos + len]) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("skipping undecodable log record: {e}"),
            }
            pos += len;
        }
        Ok(records)
    }

    /// Close, delete, and recreate the log empty. Called after a
    /// successful flush to level 0.
    pub fn reset(&mut self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)?;
        self.file = file;
        log::info!("durability log {:?} reset after flush", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hlsm-wal-test-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn append_then_replay_recovers_all_records() {
        let dir = temp_dir("replay");
        let mut wal = Wal::open(&dir).unwrap();
        wal.append(&Record::new("a", json!(1))).unwrap();
        wal.append(&Record::tombstone("b")).unwrap();

        let mut reopened = Wal::open(&dir).unwrap();
        let records = reopened.replay().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "a");
        assert!(records[1].tombstone);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reset_empties_the_log() {
        let dir = temp_dir("reset");
        let mut wal = Wal::open(&dir).unwrap();
        wal.append(&Record::new("a", json!(1))).unwrap();
        wal.reset().unwrap();
        let records = wal.replay().unwrap();
        assert!(records.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn replay_ignores_trailing_partial_record() {
        let dir = temp_dir("partial");
        let mut wal = Wal::open(&dir).unwrap();
        wal.append(&Record::new("a", json!(1))).unwrap();
        // corrupt by appending a length prefix with no payload
        wal.file.write_all(&999i64.to_le_bytes()).unwrap();

        let mut reopened = Wal::open(&dir).unwrap();
        let records = reopened.replay().unwrap();
        assert_eq!(records.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
