//! One level's table list, ordered ascending by flush/compaction index.

use crate::table::Table;

#[derive(Default)]
pub struct Level {
    pub tables: Vec<(u64, Table)>,
}

impl Level {
    pub fn on_disk_size(&self) -> u64 {
        self.tables.iter().map(|(_, t)| t.on_disk_size()).sum()
    }
}
