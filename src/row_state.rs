//! row_state is the per-cursor scratch holding the most recently read page
//! and row slot.
//!
//! The row a cursor is seated on is identified by its primary (page, slot)
//! pair, but the row *content* may live elsewhere: when the row-start entry
//! carries the overflow bit, the slot holds a pointer (a 1-byte row number
//! followed by a 3-byte little-endian page number) to the page the row was
//! rewritten onto.  `set_row` resolves that indirection, and the final
//! page/row pair is what `final_row_bytes` reads from.

use byteorder::{ByteOrder, LittleEndian};

use crate::format::{
    is_overflow_row, page_types, JetFormat, PageNum, INVALID_PAGE_NUMBER, INVALID_ROW_NUMBER,
    OFFSET_MASK,
};
use crate::page_channel::{Page, PageChannel};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No page is loaded into the row state.")]
    NoPage,
    #[error("Row {0} is not a slot on the loaded page.")]
    RowOutOfRange(i16),
    #[error("Row boundaries on the page are corrupt.")]
    Corrupt,
    #[error("An overflow row points at an invalid page.")]
    BadOverflowPointer,
    #[error("Error reading page: {0}")]
    Channel(#[from] crate::page_channel::Error),
}

pub struct RowState<'c> {
    channel: &'c PageChannel,
    format: &'static JetFormat,
    page_number: PageNum,
    page: Option<Page>,
    row_number: i16,
    final_page_number: PageNum,
    final_page: Option<Page>,
    final_row_number: i16,
}

impl<'c> RowState<'c> {
    pub fn new(channel: &'c PageChannel, format: &'static JetFormat) -> RowState<'c> {
        RowState {
            channel,
            format,
            page_number: INVALID_PAGE_NUMBER,
            page: None,
            row_number: INVALID_ROW_NUMBER,
            final_page_number: INVALID_PAGE_NUMBER,
            final_page: None,
            final_row_number: INVALID_ROW_NUMBER,
        }
    }

    pub fn reset(&mut self) {
        self.page_number = INVALID_PAGE_NUMBER;
        self.page = None;
        self.clear_row();
    }

    fn clear_row(&mut self) {
        self.row_number = INVALID_ROW_NUMBER;
        self.final_page_number = INVALID_PAGE_NUMBER;
        self.final_page = None;
        self.final_row_number = INVALID_ROW_NUMBER;
    }

    pub fn page_number(&self) -> PageNum {
        self.page_number
    }

    pub fn row_number(&self) -> i16 {
        self.row_number
    }

    /// Loads `pn` as the current page.  Page numbers that do not name a real
    /// page (the sentinels, or anything past the end of the file) simply
    /// leave the state with no buffer, so `rows_on_page` reports 0.
    pub fn set_page(&mut self, pn: PageNum) -> Result<(), Error> {
        if pn == self.page_number && self.page.is_some() {
            self.clear_row();
            return Ok(());
        }
        self.page_number = pn;
        self.clear_row();
        self.page = if self.channel.valid_page(pn) {
            Some(self.channel.get_page(pn)?)
        } else {
            None
        };
        Ok(())
    }

    /// Number of row slots on the loaded page.  Re-read from the buffer on
    /// every call, so rows appended by another cursor are observed.  0 for
    /// anything that is not a data page.
    pub fn rows_on_page(&self) -> i16 {
        match &self.page {
            Some(page) => {
                let buf = page.borrow();
                if buf[0] != page_types::DATA {
                    return 0;
                }
                LittleEndian::read_u16(&buf[self.format.offset_num_rows_on_data_page..]) as i16
            }
            None => 0,
        }
    }

    /// The unmasked 16-bit row-start entry for slot `row` on the loaded
    /// page.  The deleted and overflow flag bits are left in place.
    pub fn row_start(&self, row: i16) -> Result<u16, Error> {
        let page = self.page.as_ref().ok_or(Error::NoPage)?;
        if row < 0 || row >= self.rows_on_page() {
            return Err(Error::RowOutOfRange(row));
        }
        let buf = page.borrow();
        let offset = self.format.row_start_offset(row);
        if offset + 2 > buf.len() {
            return Err(Error::Corrupt);
        }
        Ok(LittleEndian::read_u16(&buf[offset..]))
    }

    /// Seats the state on slot `row` and resolves the final page/row pair,
    /// following the overflow pointer if the slot carries one.
    pub fn set_row(&mut self, row: i16) -> Result<(), Error> {
        let start = self.row_start(row)?;
        self.row_number = row;
        if is_overflow_row(start) {
            let page = self.page.as_ref().ok_or(Error::NoPage)?;
            let ptr = row_bytes(&page.borrow(), self.format, row)?;
            if ptr.len() < 4 {
                return Err(Error::BadOverflowPointer);
            }
            let overflow_row = ptr[0] as i16;
            let overflow_page = u32::from_le_bytes([ptr[1], ptr[2], ptr[3], 0]);
            if !self.channel.valid_page(overflow_page) {
                return Err(Error::BadOverflowPointer);
            }
            log::debug!(
                "row ({}, {}) overflows to ({}, {})",
                self.page_number,
                row,
                overflow_page,
                overflow_row
            );
            self.final_page = Some(self.channel.get_page(overflow_page)?);
            self.final_page_number = overflow_page;
            self.final_row_number = overflow_row;
        } else {
            self.final_page = self.page.clone();
            self.final_page_number = self.page_number;
            self.final_row_number = row;
        }
        Ok(())
    }

    /// Page number the row content actually lives on.  Differs from
    /// `page_number` only for overflow rows.
    pub fn final_page_number(&self) -> PageNum {
        self.final_page_number
    }

    pub fn final_row_number(&self) -> i16 {
        self.final_row_number
    }

    /// Copies out the content bytes of the seated row.
    pub fn final_row_bytes(&self) -> Result<Vec<u8>, Error> {
        let page = self.final_page.as_ref().ok_or(Error::NoPage)?;
        row_bytes(&page.borrow(), self.format, self.final_row_number)
    }
}

/// Extracts the content bytes of slot `row` from a data page image.  Row
/// content is packed downward from the page end: slot 0 ends at the page
/// boundary and slot n ends where slot n-1 starts.
pub(crate) fn row_bytes(buf: &[u8], format: &JetFormat, row: i16) -> Result<Vec<u8>, Error> {
    if row < 0 {
        return Err(Error::RowOutOfRange(row));
    }
    let offset = format.row_start_offset(row);
    if offset + 2 > buf.len() {
        return Err(Error::Corrupt);
    }
    let start = (LittleEndian::read_u16(&buf[offset..]) & OFFSET_MASK) as usize;
    let end = if row == 0 {
        buf.len()
    } else {
        let prev_offset = format.row_start_offset(row - 1);
        (LittleEndian::read_u16(&buf[prev_offset..]) & OFFSET_MASK) as usize
    };
    if start > end || end > buf.len() {
        return Err(Error::Corrupt);
    }
    Ok(buf[start..end].to_vec())
}

#[cfg(test)]
fn data_page_with_rows(format: &JetFormat, rows: &[&[u8]]) -> Vec<u8> {
    let mut page = vec![0_u8; format.page_size];
    page[0] = page_types::DATA;
    page[1] = 0x01;
    let mut low = format.page_size;
    for (i, r) in rows.iter().enumerate() {
        low -= r.len();
        page[low..low + r.len()].copy_from_slice(r);
        LittleEndian::write_u16(&mut page[format.row_start_offset(i as i16)..], low as u16);
    }
    LittleEndian::write_u16(
        &mut page[format.offset_num_rows_on_data_page..],
        rows.len() as u16,
    );
    page
}

#[cfg(test)]
fn channel_with_pages(format: &'static JetFormat, pages: &[Vec<u8>]) -> (tempfile::NamedTempFile, PageChannel) {
    let mut bytes = Vec::new();
    for p in pages {
        bytes.extend_from_slice(p);
    }
    let file = tempfile::NamedTempFile::new().expect("Should have made temp file.");
    std::fs::write(file.path(), &bytes).expect("Should have written file.");
    let f = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(file.path())
        .expect("Should have opened file.");
    let channel = PageChannel::new(f, format).expect("Should have made channel.");
    (file, channel)
}

#[test]
fn test_row_bytes_boundaries() {
    use crate::format::JET4;
    let page = data_page_with_rows(&JET4, &[b"aaaa", b"bb"]);
    assert_eq!(row_bytes(&page, &JET4, 0).unwrap(), b"aaaa");
    assert_eq!(row_bytes(&page, &JET4, 1).unwrap(), b"bb");
}

#[test]
fn test_rows_on_page_non_data_page() {
    use crate::format::JET4;
    let (_file, channel) = channel_with_pages(&JET4, &[vec![0_u8; JET4.page_size], vec![0_u8; JET4.page_size]]);
    let mut rs = RowState::new(&channel, &JET4);
    rs.set_page(1).expect("Should have set page.");
    assert_eq!(rs.rows_on_page(), 0);
}

#[test]
fn test_set_page_and_read_rows() {
    use crate::format::JET4;
    let data = data_page_with_rows(&JET4, &[b"first", b"second"]);
    let (_file, channel) = channel_with_pages(&JET4, &[vec![0_u8; JET4.page_size], data]);
    let mut rs = RowState::new(&channel, &JET4);
    rs.set_page(1).expect("Should have set page.");
    assert_eq!(rs.rows_on_page(), 2);
    rs.set_row(1).expect("Should have set row.");
    assert_eq!(rs.final_page_number(), 1);
    assert_eq!(rs.final_row_number(), 1);
    assert_eq!(rs.final_row_bytes().unwrap(), b"second");
}

#[test]
fn test_set_page_invalid_clears_buffer() {
    use crate::format::JET4;
    let data = data_page_with_rows(&JET4, &[b"x"]);
    let (_file, channel) = channel_with_pages(&JET4, &[vec![0_u8; JET4.page_size], data]);
    let mut rs = RowState::new(&channel, &JET4);
    rs.set_page(1).expect("Should have set page.");
    rs.set_page(INVALID_PAGE_NUMBER).expect("Should have cleared page.");
    assert_eq!(rs.rows_on_page(), 0);
    assert!(matches!(rs.row_start(0), Err(Error::NoPage)));
}

#[test]
fn test_overflow_row_resolution() {
    use crate::format::{JET4, OVERFLOW_ROW_MASK};
    // Page 1 slot 0 points at page 2 slot 1, which holds the real content.
    let ptr = [1_u8, 2, 0, 0]; // row 1, page 2 (3-byte LE)
    let mut primary = data_page_with_rows(&JET4, &[&ptr]);
    let start_off = JET4.row_start_offset(0);
    let raw = LittleEndian::read_u16(&primary[start_off..]);
    LittleEndian::write_u16(&mut primary[start_off..], raw | OVERFLOW_ROW_MASK);
    let overflow = data_page_with_rows(&JET4, &[b"slot zero", b"moved row"]);
    let (_file, channel) =
        channel_with_pages(&JET4, &[vec![0_u8; JET4.page_size], primary, overflow]);

    let mut rs = RowState::new(&channel, &JET4);
    rs.set_page(1).expect("Should have set page.");
    rs.set_row(0).expect("Should have set row.");
    assert_eq!(rs.page_number(), 1);
    assert_eq!(rs.final_page_number(), 2);
    assert_eq!(rs.final_row_number(), 1);
    assert_eq!(rs.final_row_bytes().unwrap(), b"moved row");
}
