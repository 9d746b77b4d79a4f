//! Test fixtures: fabricates complete database files (header page, data
//! pages, usage-map pages) in temp files, using the crate's own writer
//! helpers, and opens them with the standard table definitions the tests
//! expect.

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

use crate::data_type::DataType;
use crate::database::Database;
use crate::dbheader;
use crate::format::{JetFormat, PageNum, DELETED_ROW_MASK, JET3, JET4, OVERFLOW_ROW_MASK};
use crate::record;
use crate::table::{self, Column, Index, TableDef};
use crate::usage_map;
use crate::value::Value;

pub(crate) const MAP_PAGE: PageNum = 1;
pub(crate) const RELS_PAGE: PageNum = 2;
pub(crate) const PARENT_MAP_PAGE: PageNum = 3;
pub(crate) const CHILD_MAP_PAGE: PageNum = 4;
pub(crate) const DATA_PAGE: PageNum = 7;
pub(crate) const SECOND_DATA_PAGE: PageNum = 11;

pub(crate) struct TestDb {
    file: tempfile::NamedTempFile,
    attach: Box<dyn Fn(&mut Database)>,
    pub db: Database,
}

impl TestDb {
    /// Opens the same file again as a fresh `Database` with the same
    /// attachments, to observe what actually reached the disk.
    pub fn reopen(&self) -> Database {
        let mut db = Database::open(self.file.path().to_str().unwrap())
            .expect("Should have reopened db.");
        (self.attach)(&mut db);
        db
    }
}

pub(crate) struct Builder {
    format: &'static JetFormat,
    pages: BTreeMap<PageNum, Vec<u8>>,
}

impl Builder {
    pub fn new(format: &'static JetFormat) -> Builder {
        let mut header = vec![0_u8; format.page_size];
        dbheader::write_header(&mut header, format);
        let mut pages = BTreeMap::new();
        pages.insert(0, header);
        Builder { format, pages }
    }

    pub fn data_page(&mut self, pn: PageNum, rows: &[Vec<Value>]) {
        let encoded: Vec<Vec<u8>> = rows
            .iter()
            .map(|r| record::encode_values(r).expect("Should have encoded fixture row."))
            .collect();
        self.raw_data_page(pn, &encoded);
    }

    pub fn raw_data_page(&mut self, pn: PageNum, rows: &[Vec<u8>]) {
        let mut page = table::new_data_page(self.format);
        for row in rows {
            table::append_row(&mut page, self.format, row)
                .expect("Should have appended fixture row.");
        }
        self.pages.insert(pn, page);
    }

    fn or_row_flag(&mut self, pn: PageNum, row: i16, mask: u16) {
        let page = self.pages.get_mut(&pn).expect("Fixture page not built yet.");
        let offset = self.format.row_start_offset(row);
        let raw = LittleEndian::read_u16(&page[offset..]);
        LittleEndian::write_u16(&mut page[offset..], raw | mask);
    }

    pub fn mark_deleted(&mut self, pn: PageNum, row: i16) {
        self.or_row_flag(pn, row, DELETED_ROW_MASK);
    }

    pub fn mark_overflow(&mut self, pn: PageNum, row: i16) {
        self.or_row_flag(pn, row, OVERFLOW_ROW_MASK);
    }

    pub fn usage_map(&mut self, pn: PageNum, start: PageNum, owned: &[PageNum]) {
        let page = usage_map::new_map_page(self.format, start, owned)
            .expect("Should have built usage map page.");
        self.pages.insert(pn, page);
    }

    pub fn build(self, attach: Box<dyn Fn(&mut Database)>) -> TestDb {
        let max_page = *self.pages.keys().max().expect("Fixture has no pages.");
        let mut bytes = Vec::new();
        for pn in 0..=max_page {
            match self.pages.get(&pn) {
                Some(page) => bytes.extend_from_slice(page),
                None => bytes.extend_from_slice(&vec![0_u8; self.format.page_size]),
            }
        }
        let file = tempfile::NamedTempFile::new().expect("Should have made temp file.");
        std::fs::write(file.path(), &bytes).expect("Should have written fixture file.");
        let mut db =
            Database::open(file.path().to_str().unwrap()).expect("Should have opened fixture db.");
        attach(&mut db);
        TestDb { file, attach, db }
    }
}

pub(crate) fn row(id: i32, v: &str) -> Vec<Value> {
    vec![Value::Long(id), Value::Text(v.to_string())]
}

fn standard_def() -> TableDef {
    TableDef::new(
        "t",
        vec![
            Column::new("id", DataType::Long),
            Column::new("v", DataType::Text),
        ],
        MAP_PAGE,
    )
}

fn attach_standard(db: &mut Database) {
    db.attach_table(standard_def());
    db.attach_relationships_page(RELS_PAGE);
}

/// Table "t" with rows 1/one, 2/two, 3/three on one page.
pub(crate) fn single_page_db() -> TestDb {
    let mut b = Builder::new(&JET4);
    b.data_page(DATA_PAGE, &[row(1, "one"), row(2, "two"), row(3, "three")]);
    b.usage_map(MAP_PAGE, 1, &[DATA_PAGE]);
    b.data_page(RELS_PAGE, &[]);
    b.build(Box::new(attach_standard))
}

/// Table "t" that owns no pages at all.
pub(crate) fn empty_table_db() -> TestDb {
    let mut b = Builder::new(&JET4);
    b.usage_map(MAP_PAGE, 1, &[]);
    b.data_page(RELS_PAGE, &[]);
    b.build(Box::new(attach_standard))
}

/// Table "t" split across two owned pages: rows 1, 2 then row 3.
pub(crate) fn two_page_db() -> TestDb {
    let mut b = Builder::new(&JET4);
    b.data_page(DATA_PAGE, &[row(1, "A"), row(2, "B")]);
    b.data_page(SECOND_DATA_PAGE, &[row(3, "C")]);
    b.usage_map(MAP_PAGE, 1, &[DATA_PAGE, SECOND_DATA_PAGE]);
    b.data_page(RELS_PAGE, &[]);
    b.build(Box::new(attach_standard))
}

/// The two-page layout in the Jet3 (2kB page) geometry.
pub(crate) fn two_page_db_jet3() -> TestDb {
    let mut b = Builder::new(&JET3);
    b.data_page(DATA_PAGE, &[row(1, "A"), row(2, "B")]);
    b.data_page(SECOND_DATA_PAGE, &[row(3, "C")]);
    b.usage_map(MAP_PAGE, 1, &[DATA_PAGE, SECOND_DATA_PAGE]);
    b.data_page(RELS_PAGE, &[]);
    b.build(Box::new(attach_standard))
}

/// Table "t" whose middle row is already tombstoned in the file image.
pub(crate) fn tombstoned_db() -> TestDb {
    let mut b = Builder::new(&JET4);
    b.data_page(DATA_PAGE, &[row(1, "one"), row(2, "two"), row(3, "three")]);
    b.mark_deleted(DATA_PAGE, 1);
    b.usage_map(MAP_PAGE, 1, &[DATA_PAGE]);
    b.data_page(RELS_PAGE, &[]);
    b.build(Box::new(attach_standard))
}

/// Table "t" with rows 1/x, 2/y, 3/y for the find scenarios.
pub(crate) fn find_db() -> TestDb {
    let mut b = Builder::new(&JET4);
    b.data_page(DATA_PAGE, &[row(1, "x"), row(2, "y"), row(3, "y")]);
    b.usage_map(MAP_PAGE, 1, &[DATA_PAGE]);
    b.data_page(RELS_PAGE, &[]);
    b.build(Box::new(attach_standard))
}

/// Table "t" whose middle row has been rewritten onto an overflow page.
/// The overflow page is not in the table's usage map; the row is reached
/// only through the pointer in its original slot.
pub(crate) fn overflow_db() -> TestDb {
    let mut b = Builder::new(&JET4);
    let pointer = vec![0_u8, SECOND_DATA_PAGE as u8, 0, 0];
    b.raw_data_page(
        DATA_PAGE,
        &[
            record::encode_values(&row(1, "one")).unwrap(),
            pointer,
            record::encode_values(&row(3, "three")).unwrap(),
        ],
    );
    b.mark_overflow(DATA_PAGE, 1);
    b.data_page(SECOND_DATA_PAGE, &[row(2, "moved")]);
    b.usage_map(MAP_PAGE, 1, &[DATA_PAGE]);
    b.data_page(RELS_PAGE, &[]);
    b.build(Box::new(attach_standard))
}

/// Like `single_page_db`, but with no relationships page attached.
pub(crate) fn db_without_relationships_page() -> TestDb {
    let mut b = Builder::new(&JET4);
    b.data_page(DATA_PAGE, &[row(1, "one")]);
    b.usage_map(MAP_PAGE, 1, &[DATA_PAGE]);
    b.build(Box::new(|db: &mut Database| {
        db.attach_table(standard_def());
    }))
}

fn relationship_pages(b: &mut Builder) {
    b.data_page(DATA_PAGE, &[row(1, "alice"), row(2, "bob")]);
    b.data_page(SECOND_DATA_PAGE, &[row(1, "a")]);
    b.usage_map(PARENT_MAP_PAGE, 1, &[DATA_PAGE]);
    b.usage_map(CHILD_MAP_PAGE, 1, &[SECOND_DATA_PAGE]);
    b.data_page(RELS_PAGE, &[]);
}

fn parent_def() -> TableDef {
    TableDef::new(
        "parent",
        vec![
            Column::new("id", DataType::Long),
            Column::new("name", DataType::Text),
        ],
        PARENT_MAP_PAGE,
    )
}

fn child_def() -> TableDef {
    TableDef::new(
        "child",
        vec![
            Column::new("parent_id", DataType::Long),
            Column::new("tag", DataType::Text),
        ],
        CHILD_MAP_PAGE,
    )
}

/// Tables "parent" (id, name) and "child" (parent_id, tag) for the
/// relationship scenarios.
pub(crate) fn relationship_db() -> TestDb {
    let mut b = Builder::new(&JET4);
    relationship_pages(&mut b);
    b.build(Box::new(|db: &mut Database| {
        db.attach_table(parent_def());
        db.attach_table(child_def());
        db.attach_relationships_page(RELS_PAGE);
    }))
}

/// The relationship fixture with pre-existing unique indexes on the parent
/// (over a column set the creator will not reuse), to exercise the
/// name-collision scheme.
pub(crate) fn relationship_db_with_parent_indexes(names: &[&str]) -> TestDb {
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let mut b = Builder::new(&JET4);
    relationship_pages(&mut b);
    b.build(Box::new(move |db: &mut Database| {
        let mut def = parent_def();
        for name in &names {
            def = def.with_index(Index::new(name, &["name"], true));
        }
        db.attach_table(def);
        db.attach_table(child_def());
        db.attach_relationships_page(RELS_PAGE);
    }))
}
