//! usage_map decodes the set of pages owned by a table and iterates over it.
//!
//! An inline usage-map page holds a start page number and a bitmap; bit `i`
//! set means page `start + i` belongs to the table.  `PageCursor` walks the
//! decoded set in either direction, reporting `INVALID_PAGE_NUMBER` when it
//! runs off the end, and can be repositioned onto an arbitrary page so that
//! a row cursor can resume a scan from wherever it is seated.

use byteorder::{ByteOrder, LittleEndian};

use crate::format::{page_types, JetFormat, PageNum, INVALID_PAGE_NUMBER};
use crate::page_channel::PageChannel;

// Usage-map page layout:
//   Offset  Size  Description
//   0       1     page type code (0x05)
//   1       1     map format (0x00 = inline bitmap)
//   2       4     first page number covered by the bitmap
//   6       2     bitmap length in bytes
//   8       n     bitmap
const INLINE_MAP_FORMAT: u8 = 0x00;
const OFFSET_MAP_FORMAT: usize = 1;
const OFFSET_START_PAGE: usize = 2;
const OFFSET_BITMAP_LEN: usize = 6;
const OFFSET_BITMAP: usize = 8;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Page is not a usage map page (type code {0:#04x}).")]
    NotUsageMapPage(u8),
    #[error("The usage map format {0:#04x} is not supported by this code.")]
    UnsupportedMapFormat(u8),
    #[error("The usage map bitmap is longer than its page.")]
    TruncatedMap,
    #[error("Page {0} does not fit in the usage map bitmap.")]
    PageOutOfRange(PageNum),
    #[error("Error reading usage map page: {0}")]
    Channel(#[from] crate::page_channel::Error),
}

/// The decoded owned-page set of one table, in ascending page order.
#[derive(Debug, Clone)]
pub struct UsageMap {
    start_page: PageNum,
    pages: Vec<PageNum>,
}

impl UsageMap {
    /// Reads and decodes the usage map stored on page `map_page`.
    pub fn read(channel: &PageChannel, map_page: PageNum) -> Result<UsageMap, Error> {
        let page = channel.get_page(map_page)?;
        let buf = page.borrow();
        if buf[0] != page_types::USAGE_MAP {
            return Err(Error::NotUsageMapPage(buf[0]));
        }
        if buf[OFFSET_MAP_FORMAT] != INLINE_MAP_FORMAT {
            return Err(Error::UnsupportedMapFormat(buf[OFFSET_MAP_FORMAT]));
        }
        let start_page = LittleEndian::read_u32(&buf[OFFSET_START_PAGE..]);
        let bitmap_len = LittleEndian::read_u16(&buf[OFFSET_BITMAP_LEN..]) as usize;
        if OFFSET_BITMAP + bitmap_len > buf.len() {
            return Err(Error::TruncatedMap);
        }
        let mut pages = Vec::new();
        for (byte_idx, byte) in buf[OFFSET_BITMAP..OFFSET_BITMAP + bitmap_len].iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    pages.push(start_page + (byte_idx * 8 + bit) as PageNum);
                }
            }
        }
        Ok(UsageMap { start_page, pages })
    }

    pub fn start_page(&self) -> PageNum {
        self.start_page
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn contains(&self, pn: PageNum) -> bool {
        self.pages.binary_search(&pn).is_ok()
    }

    pub fn page_numbers(&self) -> &[PageNum] {
        &self.pages
    }

    pub fn cursor(&self) -> PageCursor<'_> {
        PageCursor {
            map: self,
            cur: INVALID_PAGE_NUMBER,
        }
    }
}

/// Builds an inline usage-map page covering `owned`, for writing new files.
pub fn new_map_page(
    format: &JetFormat,
    start_page: PageNum,
    owned: &[PageNum],
) -> Result<Vec<u8>, Error> {
    let mut page = vec![0_u8; format.page_size];
    page[0] = page_types::USAGE_MAP;
    page[OFFSET_MAP_FORMAT] = INLINE_MAP_FORMAT;
    LittleEndian::write_u32(&mut page[OFFSET_START_PAGE..], start_page);
    let bitmap_len = format.page_size - OFFSET_BITMAP;
    LittleEndian::write_u16(&mut page[OFFSET_BITMAP_LEN..], bitmap_len as u16);
    for &pn in owned {
        if pn < start_page {
            return Err(Error::PageOutOfRange(pn));
        }
        let bit = (pn - start_page) as usize;
        if bit / 8 >= bitmap_len {
            return Err(Error::PageOutOfRange(pn));
        }
        page[OFFSET_BITMAP + bit / 8] |= 1 << (bit % 8);
    }
    Ok(page)
}

/// A bidirectional position within a table's owned-page set.
///
/// The cursor models its position as "at page `cur`": `next_page` yields the
/// smallest owned page greater than `cur`, `prev_page` the largest owned
/// page smaller than `cur`.  The sentinels 0 and `u32::MAX` therefore mean
/// "before every page" and "after every page".
pub struct PageCursor<'m> {
    map: &'m UsageMap,
    cur: PageNum,
}

impl<'m> PageCursor<'m> {
    /// Seats the cursor before the first owned page (forward) or after the
    /// last one (reverse).
    pub fn reset(&mut self, move_forward: bool) {
        self.cur = if move_forward {
            INVALID_PAGE_NUMBER
        } else {
            PageNum::MAX
        };
    }

    /// Seats the cursor at `pn` so that `next_page`/`prev_page` step
    /// relative to it.  `pn` need not itself be an owned page.
    pub fn restore_position(&mut self, pn: PageNum) {
        self.cur = pn;
    }

    /// The next owned page, or `INVALID_PAGE_NUMBER` if there is none.
    pub fn next_page(&mut self) -> PageNum {
        let pages = &self.map.pages;
        let idx = pages.partition_point(|&p| p <= self.cur);
        match pages.get(idx) {
            Some(&p) => {
                self.cur = p;
                p
            }
            None => {
                self.cur = PageNum::MAX;
                INVALID_PAGE_NUMBER
            }
        }
    }

    /// The previous owned page, or `INVALID_PAGE_NUMBER` if there is none.
    pub fn prev_page(&mut self) -> PageNum {
        let pages = &self.map.pages;
        let idx = pages.partition_point(|&p| p < self.cur);
        if idx == 0 {
            self.cur = INVALID_PAGE_NUMBER;
            return INVALID_PAGE_NUMBER;
        }
        let p = pages[idx - 1];
        self.cur = p;
        p
    }
}

#[cfg(test)]
fn map_of(pages: &[PageNum]) -> UsageMap {
    UsageMap {
        start_page: 1,
        pages: pages.to_vec(),
    }
}

#[test]
fn test_map_page_round_trip() {
    use crate::format::JET4;
    let page_bytes = new_map_page(&JET4, 4, &[7, 11, 12]).expect("Should have built map page.");
    assert_eq!(page_bytes[0], page_types::USAGE_MAP);
    // Decode by hand the way `read` does, without a channel.
    let start = LittleEndian::read_u32(&page_bytes[OFFSET_START_PAGE..]);
    assert_eq!(start, 4);
    assert_eq!(page_bytes[OFFSET_BITMAP] & (1 << 3), 1 << 3); // page 7
    assert_eq!(page_bytes[OFFSET_BITMAP] & (1 << 7), 1 << 7); // page 11
    assert_eq!(page_bytes[OFFSET_BITMAP + 1] & 1, 1); // page 12
}

#[test]
fn test_read_decodes_map_page_through_channel() {
    use crate::format::JET4;
    let map_bytes = new_map_page(&JET4, 4, &[7, 11, 12]).expect("Should have built map page.");
    let mut file_bytes = vec![0_u8; JET4.page_size];
    file_bytes.extend_from_slice(&map_bytes);
    let file = tempfile::NamedTempFile::new().expect("Should have made temp file.");
    std::fs::write(file.path(), &file_bytes).expect("Should have written file.");
    let f = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(file.path())
        .expect("Should have opened file.");
    let channel = PageChannel::new(f, &JET4).expect("Should have made channel.");

    let map = UsageMap::read(&channel, 1).expect("Should have decoded map.");
    assert_eq!(map.start_page(), 4);
    assert_eq!(map.page_count(), 3);
    assert_eq!(map.page_numbers(), &[7, 11, 12]);
    assert!(map.contains(11));
    assert!(!map.contains(8));

    // A non-map page is refused.
    assert!(matches!(
        UsageMap::read(&channel, 0),
        Err(Error::NotUsageMapPage(_))
    ));
}

#[test]
fn test_map_page_rejects_out_of_range() {
    use crate::format::JET4;
    assert!(matches!(
        new_map_page(&JET4, 4, &[3]),
        Err(Error::PageOutOfRange(3))
    ));
}

#[test]
fn test_page_cursor_forward() {
    let map = map_of(&[7, 11]);
    let mut c = map.cursor();
    c.reset(true);
    assert_eq!(c.next_page(), 7);
    assert_eq!(c.next_page(), 11);
    assert_eq!(c.next_page(), INVALID_PAGE_NUMBER);
    assert_eq!(c.next_page(), INVALID_PAGE_NUMBER);
}

#[test]
fn test_page_cursor_reverse() {
    let map = map_of(&[7, 11]);
    let mut c = map.cursor();
    c.reset(false);
    assert_eq!(c.prev_page(), 11);
    assert_eq!(c.prev_page(), 7);
    assert_eq!(c.prev_page(), INVALID_PAGE_NUMBER);
}

#[test]
fn test_page_cursor_turns_around_at_end() {
    let map = map_of(&[7, 11]);
    let mut c = map.cursor();
    c.reset(true);
    while c.next_page() != INVALID_PAGE_NUMBER {}
    // Exhausted forward; stepping back returns the last owned page.
    assert_eq!(c.prev_page(), 11);
}

#[test]
fn test_page_cursor_restore_position() {
    let map = map_of(&[7, 11, 20]);
    let mut c = map.cursor();
    c.restore_position(11);
    assert_eq!(c.next_page(), 20);
    c.restore_position(11);
    assert_eq!(c.prev_page(), 7);
    // Restoring onto a page that is not owned still orders correctly.
    c.restore_position(13);
    assert_eq!(c.next_page(), 20);
}

#[test]
fn test_empty_map() {
    let map = map_of(&[]);
    let mut c = map.cursor();
    c.reset(true);
    assert_eq!(c.next_page(), INVALID_PAGE_NUMBER);
    c.reset(false);
    assert_eq!(c.prev_page(), INVALID_PAGE_NUMBER);
}
