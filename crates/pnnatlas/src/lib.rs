pub mod atlas;
pub mod config;
pub mod table;

pub use atlas::{Atlas, ObsoletePolicy, ReferenceSet, RegionDescription};
pub use config::{Config, Flags};
pub use table::{
    KEY_COLUMNS, KeyedRow, ReindexReport, Row, TableError, parse_flat_table, read_flat_table,
};
