//! Fixed 5 x int64-LE footer trailing every table file.

use crate::error::{Error, Result};

pub const LEN: u64 = 40;
pub const VERSION: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub version: i64,
    pub data_start: i64,
    pub data_len: i64,
    pub index_start: i64,
    pub index_len: i64,
}

impl Footer {
    pub fn encode(self) -> [u8; LEN as usize] {
        let mut buf = [0u8; LEN as usize];
        buf[0..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.data_start.to_le_bytes());
        buf[16..24].copy_from_slice(&self.data_len.to_le_bytes());
        buf[24..32].copy_from_slice(&self.index_start.to_le_bytes());
        buf[32..40].copy_from_slice(&self.index_len.to_le_bytes());
        buf
    }

    pub fn decode(path: &std::path::Path, bytes: &[u8]) -> Result<Footer> {
        if bytes.len() != LEN as usize {
            return Err(Error::InvalidTableFile {
                path: path.to_path_buf(),
                reason: format!("footer is {} bytes, expected {}", bytes.len(), LEN),
            });
        }
        let field = |range: std::ops::Range<usize>| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&bytes[range]);
            i64::from_le_bytes(arr)
        };
        let footer = Footer {
            version: field(0..8),
            data_start: field(8..16),
            data_len: field(16..24),
            index_start: field(24..32),
            index_len: field(32..40),
        };
        if footer.version != VERSION {
            return Err(Error::InvalidTableFile {
                path: path.to_path_buf(),
                reason: format!("unsupported table format version {}", footer.version),
            });
        }
        if footer.data_start != 0 || footer.index_start != footer.data_len {
            return Err(Error::InvalidTableFile {
                path: path.to_path_buf(),
                reason: "footer offsets are inconsistent".to_string(),
            });
        }
        Ok(footer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn round_trips_through_bytes() {
        let footer = Footer {
            version: VERSION,
            data_start: 0,
            data_len: 100,
            index_start: 100,
            index_len: 42,
        };
        let bytes = footer.encode();
        let back = Footer::decode(Path::new("t.db"), &bytes).unwrap();
        assert_eq!(footer, back);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Footer::decode(Path::new("t.db"), &[0u8; 10]).is_err());
    }

    #[test]
    fn rejects_inconsistent_offsets() {
        let footer = Footer {
            version: VERSION,
            data_start: 1,
            data_len: 100,
            index_start: 100,
            index_len: 42,
        };
        assert!(Footer::decode(Path::new("t.db"), &footer.encode()).is_err());
    }
}
