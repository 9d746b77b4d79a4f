//! Represents access to one table of an open database file.
//!
//! A `Table` borrows its `Database` (and through it the page channel) and
//! carries the table's column metadata plus the decoded set of pages the
//! file's usage map attributes to the table.  Reading rows goes through a
//! `RowState`; deleting a row marks its tombstone bit on disk under the
//! page channel's exclusive-write latch.

use byteorder::{ByteOrder, LittleEndian};
use indexmap::IndexMap;
use itertools::Itertools;
use std::cell::RefCell;

use crate::data_type::DataType;
use crate::database::Database;
use crate::format::{self, page_types, JetFormat, PageNum, DELETED_ROW_MASK, OFFSET_MASK};
use crate::page_channel::PageChannel;
use crate::record;
use crate::row_state::RowState;
use crate::rowid::RowId;
use crate::usage_map::{PageCursor, UsageMap};
use crate::value::Value;

/// A materialized row: column name to value, in table column order.  A fresh
/// map is built for every read.
pub type Row = IndexMap<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Row {0} does not exist in this table.")]
    RowNotFound(RowId),
    #[error("Row {0} is deleted.")]
    RowDeleted(RowId),
    #[error("Column {0} not found in table.")]
    ColumnNotFound(String),
    #[error("Row has {actual} values but the table has {expected} columns.")]
    ColumnCountMismatch { expected: usize, actual: usize },
    #[error("Value stored for column {0} does not have the column's type.")]
    TypeMismatch(String),
    #[error("Page is not a data page.")]
    NotDataPage,
    #[error("No room left on the page for the row.")]
    PageFull,
    #[error("Error decoding row: {0}")]
    Record(#[from] record::Error),
    #[error("Error in row state: {0}")]
    RowState(#[from] crate::row_state::Error),
    #[error("Error accessing page: {0}")]
    Channel(#[from] crate::page_channel::Error),
    #[error("Error reading usage map: {0}")]
    UsageMap(#[from] crate::usage_map::Error),
}

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data_type: DataType,
}

impl Column {
    pub fn new(name: &str, data_type: DataType) -> Column {
        Column {
            name: name.to_string(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Metadata for one index on a table.  Only the metadata is modeled; index
/// pages themselves are outside this crate's scope.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    column_names: Vec<String>,
    unique: bool,
}

impl Index {
    pub fn new(name: &str, column_names: &[&str], unique: bool) -> Index {
        Index {
            name: name.to_string(),
            column_names: column_names.iter().map(|n| n.to_string()).collect(),
            unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// True if this index is over exactly `columns`, in order.
    pub fn covers(&self, columns: &[String]) -> bool {
        self.column_names == columns
    }
}

/// The definition of a table as attached to a `Database`: its name, its
/// columns, the page its usage map lives on, and its indexes.  Parsing
/// these out of the file's catalog is a collaborator's job; callers attach
/// definitions they obtained elsewhere.
#[derive(Debug)]
pub struct TableDef {
    name: String,
    columns: Vec<Column>,
    usage_map_page: PageNum,
    indexes: RefCell<Vec<Index>>,
}

impl TableDef {
    pub fn new(name: &str, columns: Vec<Column>, usage_map_page: PageNum) -> TableDef {
        TableDef {
            name: name.to_string(),
            columns,
            usage_map_page,
            indexes: RefCell::new(Vec::new()),
        }
    }

    pub fn with_index(self, index: Index) -> TableDef {
        self.indexes.borrow_mut().push(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct Table<'db> {
    db: &'db Database,
    def: &'db TableDef,
    usage_map: UsageMap,
}

impl<'db> Table<'db> {
    /// Opens a table from its attached definition, decoding its usage map.
    pub(crate) fn open(db: &'db Database, def: &'db TableDef) -> Result<Table<'db>, Error> {
        let usage_map = UsageMap::read(db.channel(), def.usage_map_page)?;
        Ok(Table { db, def, usage_map })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    pub fn format(&self) -> &'static JetFormat {
        self.db.format()
    }

    pub fn page_channel(&self) -> &'db PageChannel {
        self.db.channel()
    }

    pub fn columns(&self) -> &[Column] {
        &self.def.columns
    }

    pub fn column(&self, name: &str) -> Result<&Column, Error> {
        self.def
            .columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn index_names(&self) -> Vec<String> {
        self.def.indexes.borrow().iter().map(|i| i.name.clone()).collect()
    }

    /// Finds an index over exactly `columns` with the given uniqueness, if
    /// one exists.
    pub fn find_index(&self, columns: &[String], unique: bool) -> Option<Index> {
        self.def
            .indexes
            .borrow()
            .iter()
            .find(|i| i.unique == unique && i.covers(columns))
            .cloned()
    }

    pub(crate) fn add_index(&self, index: Index) {
        self.def.indexes.borrow_mut().push(index);
    }

    /// Tests the deleted bit of an unmasked row-start entry.
    pub fn is_deleted_row(row_start: u16) -> bool {
        format::is_deleted_row(row_start)
    }

    pub fn create_row_state(&self) -> RowState<'db> {
        RowState::new(self.page_channel(), self.format())
    }

    /// A cursor over the pages this table owns, in page-number order.
    pub fn owned_pages_cursor(&self) -> PageCursor<'_> {
        self.usage_map.cursor()
    }

    pub fn owned_page_count(&self) -> usize {
        self.usage_map.page_count()
    }

    /// Seats `row_state` on `row_id` and returns the row's content bytes,
    /// refusing sentinels, out-of-range slots and tombstoned rows.
    fn read_row_bytes(&self, row_state: &mut RowState<'_>, row_id: RowId) -> Result<Vec<u8>, Error> {
        if !row_id.is_valid_row() {
            return Err(Error::RowNotFound(row_id));
        }
        row_state.set_page(row_id.page_number())?;
        if row_id.row_number() >= row_state.rows_on_page() {
            return Err(Error::RowNotFound(row_id));
        }
        let start = row_state.row_start(row_id.row_number())?;
        if Self::is_deleted_row(start) {
            return Err(Error::RowDeleted(row_id));
        }
        row_state.set_row(row_id.row_number())?;
        Ok(row_state.final_row_bytes()?)
    }

    /// Reads the row identified by `row_id` as a name-to-value mapping in
    /// table column order, restricted to `columns` when given.
    pub fn get_row(
        &self,
        row_state: &mut RowState<'_>,
        row_id: RowId,
        columns: Option<&[&str]>,
    ) -> Result<Row, Error> {
        if let Some(names) = columns {
            for name in names {
                self.column(name)?;
            }
        }
        let data = self.read_row_bytes(row_state, row_id)?;
        let values = record::decode_values(&data)?;
        if values.len() != self.def.columns.len() {
            return Err(Error::ColumnCountMismatch {
                expected: self.def.columns.len(),
                actual: values.len(),
            });
        }
        let mut row = Row::new();
        for (col, value) in self.def.columns.iter().zip_eq(values) {
            if !col.data_type.accepts(&value) {
                return Err(Error::TypeMismatch(col.name.clone()));
            }
            let wanted = match columns {
                Some(names) => names.iter().any(|n| *n == col.name),
                None => true,
            };
            if wanted {
                row.insert(col.name.clone(), value);
            }
        }
        Ok(row)
    }

    /// Reads a single column of the row identified by `row_id`.
    pub fn get_row_value(
        &self,
        row_state: &mut RowState<'_>,
        row_id: RowId,
        column: &str,
    ) -> Result<Value, Error> {
        let mut row = self.get_row(row_state, row_id, Some(&[column]))?;
        row.shift_remove(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))
    }

    /// Marks the row identified by `row_id` deleted on disk.  The tombstone
    /// bit is set in the row-start entry of the row's primary page and the
    /// page is flushed, all under the exclusive-write latch.
    pub fn delete_row(&self, row_state: &mut RowState<'_>, row_id: RowId) -> Result<(), Error> {
        if !row_id.is_valid_row() {
            return Err(Error::RowNotFound(row_id));
        }
        row_state.set_page(row_id.page_number())?;
        if row_id.row_number() >= row_state.rows_on_page() {
            return Err(Error::RowNotFound(row_id));
        }
        let start = row_state.row_start(row_id.row_number())?;
        if Self::is_deleted_row(start) {
            return Err(Error::RowDeleted(row_id));
        }
        let channel = self.page_channel();
        let latch = channel.start_exclusive_write()?;
        {
            let page = channel.get_page(row_id.page_number())?;
            let mut buf = page.borrow_mut();
            let offset = self.format().row_start_offset(row_id.row_number());
            LittleEndian::write_u16(&mut buf[offset..], start | DELETED_ROW_MASK);
        }
        channel.write_page(row_id.page_number(), &latch)?;
        log::debug!("deleted row {} in table {}", row_id, self.name());
        Ok(())
    }
}

/// Returns a blank data page for `format`.
pub fn new_data_page(format: &JetFormat) -> Vec<u8> {
    let mut page = vec![0_u8; format.page_size];
    page[0] = page_types::DATA;
    page[1] = 0x01;
    let free = format.page_size - format.offset_row_start;
    LittleEndian::write_u16(&mut page[2..], free as u16);
    page
}

/// Appends one row to a data page image and returns its slot number.  Row
/// content packs downward from the page end while the row-start table grows
/// upward; the append fails when the two would collide.
pub fn append_row(page: &mut [u8], format: &JetFormat, row: &[u8]) -> Result<u16, Error> {
    if page[0] != page_types::DATA {
        return Err(Error::NotDataPage);
    }
    let num_rows = LittleEndian::read_u16(&page[format.offset_num_rows_on_data_page..]);
    let new_slot = num_rows as i16;
    let mut low = page.len();
    for r in 0..new_slot {
        let start = (LittleEndian::read_u16(&page[format.row_start_offset(r)..]) & OFFSET_MASK)
            as usize;
        low = low.min(start);
    }
    let table_end = format.row_start_offset(new_slot) + format.size_row_location;
    if low < table_end + row.len() {
        return Err(Error::PageFull);
    }
    let start = low - row.len();
    page[start..low].copy_from_slice(row);
    LittleEndian::write_u16(&mut page[format.row_start_offset(new_slot)..], start as u16);
    LittleEndian::write_u16(
        &mut page[format.offset_num_rows_on_data_page..],
        num_rows + 1,
    );
    LittleEndian::write_u16(&mut page[2..], (start - table_end) as u16);
    Ok(num_rows)
}
