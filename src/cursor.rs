//! cursor provides a restartable, bidirectional iterator over the rows of a
//! table.
//!
//! A cursor is seated on one row id at a time: either a real (page, slot)
//! pair or one of the two sentinels bracketing the table.  Stepping walks
//! the table's owned pages through a `PageCursor` and the slots within each
//! page through the shared `RowState`, skipping tombstoned rows.  Because
//! the row count and the row-start entries are re-read from the page buffer
//! on every visit, deletions and appends made by other cursors on pages
//! this cursor has not yet passed are observed mid-scan.
//!
//! A cursor is a single-task resource; distinct cursors over the same table
//! may be interleaved freely and share only the page channel.

use streaming_iterator::StreamingIterator;

use crate::direction::Direction;
use crate::format::{INVALID_PAGE_NUMBER, INVALID_ROW_NUMBER};
use crate::matcher::{ColumnMatcher, SimpleColumnMatcher};
use crate::row_state::RowState;
use crate::rowid::{RowId, FIRST_ROW_ID, LAST_ROW_ID};
use crate::table::{Row, Table};
use crate::usage_map::PageCursor;
use crate::value::Value;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Cursor is not seated on a valid, live row.")]
    InvalidCursorPosition,
    #[error("Cursor operation failed on the table: {0}")]
    Table(#[from] crate::table::Error),
    #[error("Cursor operation failed in the row state: {0}")]
    RowState(#[from] crate::row_state::Error),
    #[error("Cursor operation failed reading a page: {0}")]
    Channel(#[from] crate::page_channel::Error),
}

pub struct Cursor<'t> {
    table: &'t Table<'t>,
    row_state: RowState<'t>,
    pages: PageCursor<'t>,
    current_row_id: RowId,
    matcher: Box<dyn ColumnMatcher>,
}

impl<'t> Cursor<'t> {
    /// Creates a table-scan cursor seated before the first row.
    pub fn create(table: &'t Table<'t>) -> Cursor<'t> {
        let mut pages = table.owned_pages_cursor();
        pages.reset(true);
        Cursor {
            table,
            row_state: table.create_row_state(),
            pages,
            current_row_id: FIRST_ROW_ID,
            matcher: Box::new(SimpleColumnMatcher),
        }
    }

    pub fn table(&self) -> &'t Table<'t> {
        self.table
    }

    pub fn current_row_id(&self) -> RowId {
        self.current_row_id
    }

    /// Replaces the matcher used by the find operations.
    pub fn set_column_matcher(&mut self, matcher: Box<dyn ColumnMatcher>) {
        self.matcher = matcher;
    }

    fn reset_to(&mut self, dir: Direction) {
        self.current_row_id = dir.beginning_row_id();
        self.pages.reset(dir.is_forward());
        self.row_state.reset();
    }

    /// Seats the cursor before the first row.
    pub fn reset(&mut self) {
        self.reset_to(Direction::Forward);
    }

    /// Seats the cursor before the first row.
    pub fn before_first(&mut self) {
        self.reset_to(Direction::Forward);
    }

    /// Seats the cursor after the last row.
    pub fn after_last(&mut self) {
        self.reset_to(Direction::Reverse);
    }

    /// True iff the cursor is seated on a real row, not a sentinel.
    pub fn is_current_row_valid(&self) -> bool {
        self.current_row_id.is_valid_row()
            && self.current_row_id != FIRST_ROW_ID
            && self.current_row_id != LAST_ROW_ID
    }

    /// Advances to the next non-deleted row.  Returns false iff there is
    /// none, in which case the cursor is seated after the last row.
    pub fn move_to_next_row(&mut self) -> Result<bool, Error> {
        self.move_to_another_row(Direction::Forward)
    }

    /// Steps back to the previous non-deleted row.  Returns false iff there
    /// is none, in which case the cursor is seated before the first row.
    pub fn move_to_previous_row(&mut self) -> Result<bool, Error> {
        self.move_to_another_row(Direction::Reverse)
    }

    fn move_to_another_row(&mut self, dir: Direction) -> Result<bool, Error> {
        let end = dir.end_row_id();
        if self.current_row_id == end {
            return Ok(false);
        }
        let another = self.find_another_row_id(self.current_row_id, dir)?;
        self.current_row_id = another;
        Ok(another != end)
    }

    /// The scan step: starting from `current`, finds the id of the next
    /// non-deleted row in `dir`, or the direction's end sentinel.
    ///
    /// The page cursor is re-seated on the current page first, so the walk
    /// is correct whichever direction the previous step used.  The row
    /// count of each page is read when the page is loaded and the row-start
    /// entry of each slot is read unmasked on every visit, which is what
    /// makes concurrent deletes and appends visible.
    fn find_another_row_id(&mut self, current: RowId, dir: Direction) -> Result<RowId, Error> {
        self.row_state.reset();
        let mut page_number = current.page_number();
        let mut row_number = current.row_number();
        self.pages.restore_position(page_number);
        self.row_state.set_page(page_number)?;
        let mut rows_on_page = self.row_state.rows_on_page();
        let row_inc = dir.row_increment();
        loop {
            row_number += row_inc;
            if row_number >= 0 && row_number < rows_on_page {
                let start = self.row_state.row_start(row_number)?;
                if Table::is_deleted_row(start) {
                    continue;
                }
                self.row_state.set_row(row_number)?;
                return Ok(RowId::new(page_number, row_number));
            }
            row_number = INVALID_ROW_NUMBER;
            page_number = dir.another_page(&mut self.pages);
            if page_number == INVALID_PAGE_NUMBER {
                self.row_state.reset();
                return Ok(dir.end_row_id());
            }
            self.row_state.set_page(page_number)?;
            rows_on_page = self.row_state.rows_on_page();
            row_number = dir.initial_row_number(rows_on_page);
        }
    }

    /// Fails unless the cursor is seated on a real row that is still live.
    fn ensure_seated(&mut self) -> Result<(), Error> {
        if !self.is_current_row_valid() {
            return Err(Error::InvalidCursorPosition);
        }
        self.row_state.set_page(self.current_row_id.page_number())?;
        if self.current_row_id.row_number() >= self.row_state.rows_on_page() {
            return Err(Error::InvalidCursorPosition);
        }
        let start = self.row_state.row_start(self.current_row_id.row_number())?;
        if Table::is_deleted_row(start) {
            return Err(Error::InvalidCursorPosition);
        }
        Ok(())
    }

    /// Returns the row the cursor is seated on, optionally restricted to
    /// `columns`.  The mapping is freshly built on every call and its keys
    /// follow the table's column order.
    pub fn current_row(&mut self, columns: Option<&[&str]>) -> Result<Row, Error> {
        self.ensure_seated()?;
        Ok(self
            .table
            .get_row(&mut self.row_state, self.current_row_id, columns)?)
    }

    /// Returns a single column of the row the cursor is seated on.
    pub fn current_row_value(&mut self, column: &str) -> Result<Value, Error> {
        self.ensure_seated()?;
        Ok(self
            .table
            .get_row_value(&mut self.row_state, self.current_row_id, column)?)
    }

    /// Advances and returns the next row, or `None` at the end.
    pub fn get_next_row(&mut self, columns: Option<&[&str]>) -> Result<Option<Row>, Error> {
        if self.move_to_next_row()? {
            Ok(Some(self.current_row(columns)?))
        } else {
            Ok(None)
        }
    }

    /// Steps back and returns the previous row, or `None` at the beginning.
    pub fn get_previous_row(&mut self, columns: Option<&[&str]>) -> Result<Option<Row>, Error> {
        if self.move_to_previous_row()? {
            Ok(Some(self.current_row(columns)?))
        } else {
            Ok(None)
        }
    }

    /// Deletes the row the cursor is seated on.  The cursor stays seated on
    /// the deleted row id; the next move steps over it.
    pub fn delete_current_row(&mut self) -> Result<(), Error> {
        self.ensure_seated()?;
        self.table
            .delete_row(&mut self.row_state, self.current_row_id)?;
        Ok(())
    }

    fn current_row_matches(&mut self, row_pattern: &Row) -> Result<bool, Error> {
        let names: Vec<&str> = row_pattern.keys().map(|s| s.as_str()).collect();
        let row = self
            .table
            .get_row(&mut self.row_state, self.current_row_id, Some(&names))?;
        for (name, expected) in row_pattern {
            let actual = row.get(name).unwrap_or(&Value::Null);
            if !self.matcher.matches(self.table, name, actual, expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Scans forward from the start for the first row matching
    /// `row_pattern` on all of the pattern's keys.  On a hit the cursor is
    /// seated on the match; on a miss it is left after the last row.
    pub fn find_row(&mut self, row_pattern: &Row) -> Result<bool, Error> {
        self.before_first();
        while self.move_to_next_row()? {
            if self.current_row_matches(row_pattern)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Scans forward from the start for the first row whose
    /// `column_pattern` value matches `value_pattern`.
    pub fn find_row_by_value(
        &mut self,
        column_pattern: &str,
        value_pattern: &Value,
    ) -> Result<bool, Error> {
        self.before_first();
        while self.move_to_next_row()? {
            let actual =
                self.table
                    .get_row_value(&mut self.row_state, self.current_row_id, column_pattern)?;
            if self
                .matcher
                .matches(self.table, column_pattern, &actual, value_pattern)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Steps forward up to `n` rows, returning how many steps succeeded.
    pub fn skip_next_rows(&mut self, n: usize) -> Result<usize, Error> {
        for skipped in 0..n {
            if !self.move_to_next_row()? {
                return Ok(skipped);
            }
        }
        Ok(n)
    }

    /// Steps back up to `n` rows, returning how many steps succeeded.
    pub fn skip_previous_rows(&mut self, n: usize) -> Result<usize, Error> {
        for skipped in 0..n {
            if !self.move_to_previous_row()? {
                return Ok(skipped);
            }
        }
        Ok(n)
    }

    /// Convenience: finds the first row of `table` matching `row_pattern`
    /// using a throwaway cursor.
    pub fn find_row_in(table: &'t Table<'t>, row_pattern: &Row) -> Result<Option<Row>, Error> {
        let mut cursor = Cursor::create(table);
        if cursor.find_row(row_pattern)? {
            Ok(Some(cursor.current_row(None)?))
        } else {
            Ok(None)
        }
    }

    /// Convenience: returns `column` of the first row of `table` whose
    /// `column_pattern` value matches `value_pattern`.
    pub fn find_value_in(
        table: &'t Table<'t>,
        column: &str,
        column_pattern: &str,
        value_pattern: &Value,
    ) -> Result<Option<Value>, Error> {
        let mut cursor = Cursor::create(table);
        if cursor.find_row_by_value(column_pattern, value_pattern)? {
            Ok(Some(cursor.current_row_value(column)?))
        } else {
            Ok(None)
        }
    }

    /// Resets the cursor and returns a pre-fetching iterator over its rows
    /// in forward order.
    pub fn rows(&mut self) -> RowIterator<'_, 't> {
        self.reset();
        let mut it = RowIterator {
            cursor: self,
            prefetched: None,
            returned_row_id: None,
            done: false,
        };
        it.fetch_next();
        it
    }

    /// Resets the cursor and returns a streaming iterator over its rows in
    /// forward order.
    pub fn streaming_rows(&mut self) -> StreamingRowIterator<'_, 't> {
        self.reset();
        StreamingRowIterator {
            cursor: self,
            item: None,
        }
    }
}

/// Iterates over a cursor's rows, pre-fetching one row ahead so that
/// [`RowIterator::has_next`] is answered without moving on `next`.
///
/// Because of the pre-fetch, the cursor is already seated on the row
/// *after* the one `next` most recently returned.  Deleting through the
/// iterator therefore goes through the remembered id of the returned row,
/// not the cursor's seat.
pub struct RowIterator<'c, 't> {
    cursor: &'c mut Cursor<'t>,
    prefetched: Option<Result<(RowId, Row), Error>>,
    returned_row_id: Option<RowId>,
    done: bool,
}

impl<'c, 't> RowIterator<'c, 't> {
    fn fetch_next(&mut self) {
        if self.done {
            self.prefetched = None;
            return;
        }
        self.prefetched = match self.cursor.move_to_next_row() {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                let row_id = self.cursor.current_row_id();
                match self.cursor.current_row(None) {
                    Ok(row) => Some(Ok((row_id, row))),
                    Err(e) => {
                        self.done = true;
                        Some(Err(e))
                    }
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        };
    }

    /// True if another row is already fetched and waiting.
    pub fn has_next(&self) -> bool {
        self.prefetched.is_some()
    }

    /// Deletes the row most recently returned by `next`.  Each returned row
    /// may be deleted at most once.
    pub fn delete_returned_row(&mut self) -> Result<(), Error> {
        let row_id = self
            .returned_row_id
            .take()
            .ok_or(Error::InvalidCursorPosition)?;
        self.cursor
            .table
            .delete_row(&mut self.cursor.row_state, row_id)?;
        Ok(())
    }
}

impl<'c, 't> Iterator for RowIterator<'c, 't> {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.prefetched.take() {
            None => None,
            Some(Ok((row_id, row))) => {
                self.returned_row_id = Some(row_id);
                self.fetch_next();
                Some(Ok(row))
            }
            // After an error the iterator is exhausted.
            Some(Err(e)) => Some(Err(e)),
        }
    }
}

/// Iterates over a cursor's rows without yielding ownership of each row.
pub struct StreamingRowIterator<'c, 't> {
    cursor: &'c mut Cursor<'t>,
    item: Option<Row>,
}

impl<'c, 't> StreamingIterator for StreamingRowIterator<'c, 't> {
    type Item = Row;

    #[inline]
    fn advance(&mut self) {
        self.item = self
            .cursor
            .get_next_row(None)
            .expect("Should have read the next row."); // TODO: surface read errors through a fallible streaming adapter.
    }

    #[inline]
    fn get(&self) -> Option<&Row> {
        self.item.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::CaseInsensitiveColumnMatcher;
    use crate::testdb::{self, DATA_PAGE, SECOND_DATA_PAGE};

    fn ids(rows: &[Row]) -> Vec<i32> {
        rows.iter().map(|r| *r["id"].as_long().unwrap()).collect()
    }

    #[test]
    fn test_empty_table() {
        // Scenario: a table that owns no pages at all.
        let fixture = testdb::empty_table_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        assert_eq!(table.owned_page_count(), 0);
        let mut c = Cursor::create(&table);
        assert!(!c.move_to_next_row().unwrap());
        assert_eq!(c.current_row_id(), LAST_ROW_ID);
        assert!(!c.is_current_row_valid());
    }

    #[test]
    fn test_single_page_forward() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);

        let mut rows = Vec::new();
        while let Some(row) = c.get_next_row(None).unwrap() {
            rows.push(row);
        }
        assert_eq!(ids(&rows), vec![1, 2, 3]);
        assert_eq!(c.current_row_id(), LAST_ROW_ID);

        // After exhausting, the last real seat was (page, slot 2).
        c.reset();
        c.skip_next_rows(3).unwrap();
        assert_eq!(c.current_row_id(), RowId::new(DATA_PAGE, 2));
        assert!(!c.move_to_next_row().unwrap());
        assert_eq!(c.current_row_id(), LAST_ROW_ID);
    }

    #[test]
    fn test_deleted_middle_row_both_directions() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        {
            let mut c = Cursor::create(&table);
            c.move_to_next_row().unwrap();
            c.move_to_next_row().unwrap();
            assert_eq!(c.current_row_id(), RowId::new(DATA_PAGE, 1));
            c.delete_current_row().expect("Should have deleted row.");
            // The seat does not move on delete.
            assert_eq!(c.current_row_id(), RowId::new(DATA_PAGE, 1));
        }
        let mut c = Cursor::create(&table);
        let mut forward = Vec::new();
        while let Some(row) = c.get_next_row(None).unwrap() {
            forward.push(row);
        }
        assert_eq!(ids(&forward), vec![1, 3]);

        c.after_last();
        let mut reverse = Vec::new();
        while let Some(row) = c.get_previous_row(None).unwrap() {
            reverse.push(row);
        }
        assert_eq!(ids(&reverse), vec![3, 1]);
        assert_eq!(c.current_row_id(), FIRST_ROW_ID);
    }

    #[test]
    fn test_preexisting_tombstone_skipped() {
        // The tombstone was written by whoever produced the file, not by
        // this session.
        let fixture = testdb::tombstoned_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        let mut rows = Vec::new();
        while let Some(row) = c.get_next_row(None).unwrap() {
            rows.push(row);
        }
        assert_eq!(ids(&rows), vec![1, 3]);
    }

    #[test]
    fn test_two_pages_round_trip() {
        let fixture = testdb::two_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);

        let mut forward = Vec::new();
        while let Some(row) = c.get_next_row(None).unwrap() {
            forward.push(row);
        }
        assert_eq!(ids(&forward), vec![1, 2, 3]);
        assert_eq!(
            forward[2]["v"],
            Value::Text(String::from("C"))
        );
        assert!(!c.move_to_next_row().unwrap());

        c.after_last();
        let mut reverse = Vec::new();
        while let Some(row) = c.get_previous_row(None).unwrap() {
            reverse.push(row);
        }
        assert_eq!(ids(&reverse), vec![3, 2, 1]);
    }

    #[test]
    fn test_direction_change_mid_scan() {
        let fixture = testdb::two_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        // Forward onto the second page, then step back across the boundary.
        c.skip_next_rows(3).unwrap();
        assert_eq!(c.current_row_id(), RowId::new(SECOND_DATA_PAGE, 0));
        assert!(c.move_to_previous_row().unwrap());
        assert_eq!(c.current_row_id(), RowId::new(DATA_PAGE, 1));
        assert!(c.move_to_next_row().unwrap());
        assert_eq!(c.current_row_id(), RowId::new(SECOND_DATA_PAGE, 0));
    }

    #[test]
    fn test_find_row_seats_on_first_match() {
        let fixture = testdb::find_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        let pattern = Row::from([(String::from("v"), Value::Text(String::from("y")))]);
        assert!(c.find_row(&pattern).unwrap());
        assert_eq!(c.current_row_id(), RowId::new(DATA_PAGE, 1));
        assert_eq!(c.current_row_value("id").unwrap(), Value::Long(2));
    }

    #[test]
    fn test_find_row_miss_leaves_sentinel() {
        let fixture = testdb::find_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        let pattern = Row::from([(String::from("v"), Value::Text(String::from("zzz")))]);
        assert!(!c.find_row(&pattern).unwrap());
        assert!(!c.is_current_row_valid());
        assert_eq!(c.current_row_id(), LAST_ROW_ID);
    }

    #[test]
    fn test_find_row_by_value_with_case_insensitive_matcher() {
        let fixture = testdb::find_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        let wanted = Value::Text(String::from("Y"));
        assert!(!c.find_row_by_value("v", &wanted).unwrap());
        c.set_column_matcher(Box::new(CaseInsensitiveColumnMatcher));
        assert!(c.find_row_by_value("v", &wanted).unwrap());
        assert_eq!(c.current_row_value("id").unwrap(), Value::Long(2));
    }

    #[test]
    fn test_find_helpers_use_throwaway_cursors() {
        let fixture = testdb::find_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let pattern = Row::from([(String::from("id"), Value::Long(3))]);
        let row = Cursor::find_row_in(&table, &pattern)
            .unwrap()
            .expect("Should have found row.");
        assert_eq!(row["v"], Value::Text(String::from("y")));

        let v = Cursor::find_value_in(&table, "id", "v", &Value::Text(String::from("x")))
            .unwrap()
            .expect("Should have found value.");
        assert_eq!(v, Value::Long(1));
        assert_eq!(
            Cursor::find_value_in(&table, "id", "v", &Value::Text(String::from("nope"))).unwrap(),
            None
        );
    }

    #[test]
    fn test_skip_counts() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        assert_eq!(c.skip_next_rows(2).unwrap(), 2);
        assert_eq!(c.skip_next_rows(5).unwrap(), 1);
        assert_eq!(c.skip_next_rows(1).unwrap(), 0);
        assert_eq!(c.skip_previous_rows(9).unwrap(), 3);
        assert_eq!(c.current_row_id(), FIRST_ROW_ID);
    }

    #[test]
    fn test_current_row_on_sentinel_fails() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        assert!(matches!(
            c.current_row(None),
            Err(Error::InvalidCursorPosition)
        ));
        c.move_to_next_row().unwrap();
        assert!(c.current_row(None).is_ok());
    }

    #[test]
    fn test_delete_current_row_twice_fails() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        c.move_to_next_row().unwrap();
        c.delete_current_row().expect("Should have deleted row.");
        assert!(matches!(
            c.delete_current_row(),
            Err(Error::InvalidCursorPosition)
        ));
        assert!(matches!(
            c.current_row(None),
            Err(Error::InvalidCursorPosition)
        ));
    }

    #[test]
    fn test_delete_observed_by_other_cursor_on_same_table() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut reader = Cursor::create(&table);
        reader.move_to_next_row().unwrap();

        // A second cursor deletes a row ahead of the reader.
        let mut writer = Cursor::create(&table);
        writer.skip_next_rows(2).unwrap();
        writer.delete_current_row().expect("Should have deleted row.");

        // The reader re-reads tombstones as it goes and skips the row.
        let mut rest = Vec::new();
        while let Some(row) = reader.get_next_row(None).unwrap() {
            rest.push(row);
        }
        assert_eq!(ids(&rest), vec![3]);
    }

    #[test]
    fn test_overflow_row_content_comes_from_final_page() {
        let fixture = testdb::overflow_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        let mut rows = Vec::new();
        while let Some(row) = c.get_next_row(None).unwrap() {
            rows.push(row);
        }
        assert_eq!(ids(&rows), vec![1, 2, 3]);
        assert_eq!(rows[1]["v"], Value::Text(String::from("moved")));
    }

    #[test]
    fn test_row_iterator_prefetch_and_remove() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        {
            let mut it = c.rows();
            assert!(it.has_next());
            // Deleting before any row was returned is an error.
            assert!(it.delete_returned_row().is_err());
            let first = it.next().unwrap().unwrap();
            assert_eq!(first["id"], Value::Long(1));
            // Deletes the returned row, not the pre-fetched one.
            it.delete_returned_row().expect("Should have deleted row.");
            // A second delete of the same returned row is refused.
            assert!(it.delete_returned_row().is_err());
            let second = it.next().unwrap().unwrap();
            assert_eq!(second["id"], Value::Long(2));
        }
        let remaining: Vec<Row> = c.rows().map(|r| r.unwrap()).collect();
        assert_eq!(ids(&remaining), vec![2, 3]);
    }

    #[test]
    fn test_streaming_rows() {
        let fixture = testdb::single_page_db();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        let mut it = c.streaming_rows();
        let mut seen = Vec::new();
        while let Some(row) = it.next() {
            seen.push(*row["id"].as_long().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_jet3_geometry_scans_too() {
        let fixture = testdb::two_page_db_jet3();
        let table = fixture.db.open_table("t").expect("Should have opened table.");
        let mut c = Cursor::create(&table);
        let mut rows = Vec::new();
        while let Some(row) = c.get_next_row(None).unwrap() {
            rows.push(row);
        }
        assert_eq!(ids(&rows), vec![1, 2, 3]);
    }
}
