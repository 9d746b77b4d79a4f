//! Shared helpers for the integration tests: fabricates a small library
//! database (a "books" table, a "loans" table and a relationships page)
//! through the crate's public writer helpers.

use std::collections::BTreeMap;

use jetdb::data_type::DataType;
use jetdb::database::Database;
use jetdb::dbheader;
use jetdb::format::{JetFormat, PageNum};
use jetdb::record;
use jetdb::table::{self, Column, TableDef};
use jetdb::usage_map;
use jetdb::value::Value;

pub const BOOKS_MAP_PAGE: PageNum = 1;
pub const RELS_PAGE: PageNum = 2;
pub const LOANS_MAP_PAGE: PageNum = 3;
pub const BOOKS_PAGE: PageNum = 7;
pub const BOOKS_SECOND_PAGE: PageNum = 11;
pub const LOANS_PAGE: PageNum = 12;

pub fn book(id: i32, title: &str) -> Vec<Value> {
    vec![Value::Long(id), Value::Text(title.to_string())]
}

fn data_page(format: &JetFormat, rows: &[Vec<Value>]) -> Vec<u8> {
    let mut page = table::new_data_page(format);
    for row in rows {
        let bytes = record::encode_values(row).expect("Should have encoded fixture row.");
        table::append_row(&mut page, format, &bytes).expect("Should have appended fixture row.");
    }
    page
}

/// Writes a complete database file for `format` and returns the temp file
/// holding it.
pub fn write_library_file(format: &'static JetFormat) -> tempfile::NamedTempFile {
    let mut pages: BTreeMap<PageNum, Vec<u8>> = BTreeMap::new();

    let mut header = vec![0_u8; format.page_size];
    dbheader::write_header(&mut header, format);
    pages.insert(0, header);

    pages.insert(
        BOOKS_PAGE,
        data_page(format, &[book(1, "Dune"), book(2, "Emma")]),
    );
    pages.insert(BOOKS_SECOND_PAGE, data_page(format, &[book(3, "Hild")]));
    pages.insert(LOANS_PAGE, data_page(format, &[book(1, "on loan")]));
    pages.insert(RELS_PAGE, data_page(format, &[]));
    pages.insert(
        BOOKS_MAP_PAGE,
        usage_map::new_map_page(format, 1, &[BOOKS_PAGE, BOOKS_SECOND_PAGE])
            .expect("Should have built books usage map."),
    );
    pages.insert(
        LOANS_MAP_PAGE,
        usage_map::new_map_page(format, 1, &[LOANS_PAGE])
            .expect("Should have built loans usage map."),
    );

    let max_page = *pages.keys().max().unwrap();
    let mut bytes = Vec::new();
    for pn in 0..=max_page {
        match pages.get(&pn) {
            Some(page) => bytes.extend_from_slice(page),
            None => bytes.extend_from_slice(&vec![0_u8; format.page_size]),
        }
    }
    let file = tempfile::NamedTempFile::new().expect("Should have made temp file.");
    std::fs::write(file.path(), &bytes).expect("Should have written fixture file.");
    file
}

/// Attaches the library's table definitions and relationships page.
pub fn attach_library(db: &mut Database) {
    db.attach_table(TableDef::new(
        "books",
        vec![
            Column::new("id", DataType::Long),
            Column::new("title", DataType::Text),
        ],
        BOOKS_MAP_PAGE,
    ));
    db.attach_table(TableDef::new(
        "loans",
        vec![
            Column::new("book_id", DataType::Long),
            Column::new("note", DataType::Text),
        ],
        LOANS_MAP_PAGE,
    ));
    db.attach_relationships_page(RELS_PAGE);
}

pub fn open_library(path: &str) -> Database {
    let mut db = Database::open(path).expect("Should have opened library db.");
    attach_library(&mut db);
    db
}
