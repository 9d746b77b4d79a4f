//! Defines `Database`, which represents one disk-backed database file.
//!
//! A `Database` opens the file, reads enough of the header page to know
//! which format generation wrote it, and owns the page channel every other
//! component reads and writes through.  Parsing the file's catalog of
//! tables is a collaborator's concern: callers attach the `TableDef`s they
//! obtained elsewhere and open tables against them.

use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

use crate::dbheader;
use crate::format::{page_types, JetFormat, PageNum};
use crate::page_channel::{ExclusiveWrite, PageChannel};
use crate::record;
use crate::relationship::Relationship;
use crate::row_state;
use crate::table::{self, Table, TableDef};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error opening database file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error in database header: {0}")]
    DbHdr(#[from] dbheader::Error),
    #[error("Error in page channel: {0}")]
    Channel(#[from] crate::page_channel::Error),
    #[error("Table {0} not attached to this database.")]
    TableNameNotFound(String),
    #[error("Error opening table: {0}")]
    Table(#[from] table::Error),
    #[error("No relationships page has been attached to this database.")]
    NoRelationshipsPage,
    #[error("The relationships page is not a data page.")]
    BadRelationshipsPage,
    #[error("A stored relationship record is malformed.")]
    BadRelationshipRecord,
    #[error("Error decoding relationship record: {0}")]
    Record(#[from] record::Error),
    #[error("Error reading relationship rows: {0}")]
    RowState(#[from] row_state::Error),
}

pub struct Database {
    channel: PageChannel,
    format: &'static JetFormat,
    table_defs: HashMap<String, TableDef>,
    relationships_page: Option<PageNum>,
}

impl Database {
    /// Opens a database file read-write and verifies its header.
    pub fn open(path: &str) -> Result<Database, Error> {
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(false)
            .open(path)?;
        let hdr = dbheader::get_header_clone(&mut file)?;
        let channel = PageChannel::new(file, hdr.format)?;
        log::debug!(
            "opened {} as {} with {} pages",
            path,
            hdr.format.name,
            channel.num_pages()
        );
        Ok(Database {
            channel,
            format: hdr.format,
            table_defs: HashMap::new(),
            relationships_page: None,
        })
    }

    pub fn format(&self) -> &'static JetFormat {
        self.format
    }

    pub fn channel(&self) -> &PageChannel {
        &self.channel
    }

    /// Attaches a table definition so the table can be opened by name.
    pub fn attach_table(&mut self, def: TableDef) {
        self.table_defs.insert(def.name().to_string(), def);
    }

    /// Names the data page relationship records are persisted on.
    pub fn attach_relationships_page(&mut self, pn: PageNum) {
        self.relationships_page = Some(pn);
    }

    pub fn table_names(&self) -> Vec<String> {
        self.table_defs.keys().cloned().collect()
    }

    /// Opens an attached table, decoding its usage map.
    pub fn open_table(&self, name: &str) -> Result<Table<'_>, Error> {
        let def = self
            .table_defs
            .get(name)
            .ok_or_else(|| Error::TableNameNotFound(name.to_string()))?;
        Ok(Table::open(self, def)?)
    }

    /// Validates and persists a relationship between two tables of this
    /// database.  See `relationship::RelationshipCreator`.
    pub fn create_relationship(
        &self,
        primary: &Table<'_>,
        secondary: &Table<'_>,
        builder: crate::relationship::RelationshipBuilder,
    ) -> Result<Relationship, crate::relationship::Error> {
        crate::relationship::RelationshipCreator::create_relationship(
            self, primary, secondary, builder,
        )
    }

    /// Appends `relationship` to the relationships page.  The caller must
    /// hold the exclusive-write latch; the guard is taken as witness.
    pub fn write_relationship(
        &self,
        relationship: &Relationship,
        latch: &ExclusiveWrite<'_>,
    ) -> Result<(), Error> {
        let pn = self.relationships_page.ok_or(Error::NoRelationshipsPage)?;
        let row = record::encode_values(&relationship.to_values())?;
        let page = self.channel.get_page(pn)?;
        table::append_row(&mut page.borrow_mut(), self.format, &row)?;
        self.channel.write_page(pn, latch)?;
        Ok(())
    }

    /// Reads every live relationship record back off the relationships
    /// page.
    pub fn relationships(&self) -> Result<Vec<Relationship>, Error> {
        let pn = self.relationships_page.ok_or(Error::NoRelationshipsPage)?;
        let page = self.channel.get_page(pn)?;
        let buf = page.borrow();
        if buf[0] != page_types::DATA {
            return Err(Error::BadRelationshipsPage);
        }
        let num_rows =
            LittleEndian::read_u16(&buf[self.format.offset_num_rows_on_data_page..]) as i16;
        let mut relationships = Vec::new();
        for row in 0..num_rows {
            let offset = self.format.row_start_offset(row);
            let start = LittleEndian::read_u16(&buf[offset..]);
            if crate::format::is_deleted_row(start) {
                continue;
            }
            let bytes = row_state::row_bytes(&buf, self.format, row)?;
            let values = record::decode_values(&bytes)?;
            let relationship = Relationship::from_values(values)
                .map_err(|_| Error::BadRelationshipRecord)?;
            relationships.push(relationship);
        }
        Ok(relationships)
    }
}
