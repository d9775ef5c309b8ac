//! Parsing and formatting for the two on-disk table naming schemes. Treating
//! a file name as its own small type keeps the format's parsing and
//! formatting logic in one place instead of ad-hoc string splitting at
//! every call site.

pub const SUFFIX: &str = "db";
pub const TOP_PREFIX: &str = "hlsm";

/// The identity a table file name encodes: either a leveled table
/// (`<level>.<index>.db`) or a top-level block (`hlsm.<n>.db`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableName {
    Level { level: u32, index: u64 },
    Top { n: u64 },
}

impl TableName {
    pub fn to_file_name(self) -> String {
        match self {
            TableName::Level { level, index } => format!("{level}.{index}.{SUFFIX}"),
            TableName::Top { n } => format!("{TOP_PREFIX}.{n}.{SUFFIX}"),
        }
    }

    /// Parse a bare file name (no directory components). Returns `None` for
    /// anything that doesn't match either scheme — callers treat that as
    /// "not a table file", not an error.
    pub fn parse(file_name: &str) -> Option<TableName> {
        let mut parts = file_name.split('.');
        let first = parts.next()?;
        let second = parts.next()?;
        let suffix = parts.next()?;
        if parts.next().is_some() || suffix != SUFFIX {
            return None;
        }
        if first == TOP_PREFIX {
            let n: u64 = second.parse().ok()?;
            Some(TableName::Top { n })
        } else {
            let level: u32 = first.parse().ok()?;
            let index: u64 = second.parse().ok()?;
            Some(TableName::Level { level, index })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_table_round_trips() {
        let name = TableName::Level { level: 2, index: 17 };
        let file_name = name.to_file_name();
        assert_eq!(file_name, "2.17.db");
        assert_eq!(TableName::parse(&file_name), Some(name));
    }

    #[test]
    fn top_block_round_trips() {
        let name = TableName::Top { n: 5 };
        let file_name = name.to_file_name();
        assert_eq!(file_name, "hlsm.5.db");
        assert_eq!(TableName::parse(&file_name), Some(name));
    }

    #[test]
    fn unrelated_names_do_not_parse() {
        assert_eq!(TableName::parse("cache.db"), None);
        assert_eq!(TableName::parse("readme.txt"), None);
        assert_eq!(TableName::parse("notes"), None);
        assert_eq!(TableName::parse("a.b.c.db"), None);
    }
}
