//! jetdb reads and writes database files in the Microsoft Access family
//! (the Jet/ACE ".mdb"/".accdb" formats).
//!
//! The crate centers on the row cursor: a restartable, bidirectional
//! iterator over the rows of a table stored across fixed-size pages, robust
//! to rows being deleted or appended while iteration is in flight.  On top
//! of that it provides relationship creation between tables, with the
//! validation and index bookkeeping that entails.
//!
//! The file's catalog of tables and its index B-trees are outside this
//! crate; callers attach table definitions (`table::TableDef`) they obtained
//! elsewhere and work through `database::Database`.

// System layers, bottom up:
//
// "dbheader" - validates the header page and identifies the format generation.
pub mod dbheader;
// "format" - the layout constants of each format generation.
pub mod format;
// "page_channel" - maps page numbers to byte buffers, and owns the
// exclusive-write latch that serializes structural changes.
pub mod page_channel;
// "usage_map" - decodes which pages a table owns and iterates over them.
pub mod usage_map;
// "record" - encodes and decodes the byte payload of one row.
pub mod record;
// "data_type" / "value" - the logical column types and the values they hold.
pub mod data_type;
pub mod value;
// "rowid" / "row_state" - row identity, and the per-cursor scratch buffer.
pub mod row_state;
pub mod rowid;
// "direction" - forward/reverse traversal primitives.
pub mod direction;
// "table" / "matcher" / "cursor" - the table surface and the row cursor.
pub mod cursor;
pub mod matcher;
pub mod table;
// "relationship" / "database" - cross-table constraints and the owning
// database object.
pub mod database;
pub mod relationship;

#[cfg(test)]
mod testdb;
