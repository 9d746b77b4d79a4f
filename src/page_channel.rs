//! Defines `PageChannel`, which maps page numbers of one open database file
//! to fixed-size byte buffers.
//!
//! Pages are loaded on demand and shared as `Rc<RefCell<...>>` handles, so a
//! write made through one handle is observed by every holder of the same
//! page.  The channel also owns the exclusive-write latch: every on-disk
//! structural mutation (row delete, relationship write, index create) must
//! happen between `start_exclusive_write()` and the drop of the returned
//! guard.
//!
//! A `PageChannel` only supports single-threaded access.  Distinct cursors
//! over the same file share one channel and its cache.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use crate::format::{JetFormat, PageNum, INVALID_PAGE_NUMBER};

/// A shared handle to one in-memory page image.
pub type Page = Rc<RefCell<Vec<u8>>>;

// TODO: support databases with more on-disk pages, limiting memory usage by
// paging out unused pages.
const MAX_PAGE_NUM: PageNum = 10_000; // 10_000 * 4k page ~= 40MB

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Page number greater than the file or this code supports.")]
    PageNumberBeyondLimits,
    #[error("Error accessing database file: {0}")]
    Io(#[from] std::io::Error),
    #[error("An exclusive write is already in progress.")]
    WriteInProgress,
    #[error("Page {0} was written before it was read.")]
    PageNotLoaded(PageNum),
}

pub struct PageChannel {
    f: RefCell<std::fs::File>,
    /// Map from page number to the page image, or key not found if the page
    /// has not been read yet.
    pages: RefCell<HashMap<PageNum, Page>>,
    page_size: usize,
    num_pages: PageNum,
    write_latch: Cell<bool>,
}

impl PageChannel {
    /// Wraps an already-opened database file whose header named `format`.
    pub fn new(file: std::fs::File, format: &JetFormat) -> Result<Self, Error> {
        let len = file.metadata()?.len();
        let num_pages = (len / format.page_size as u64) as PageNum;
        if num_pages > MAX_PAGE_NUM {
            return Err(Error::PageNumberBeyondLimits);
        }
        Ok(PageChannel {
            f: RefCell::new(file),
            pages: RefCell::new(HashMap::new()),
            page_size: format.page_size,
            num_pages,
            write_latch: Cell::new(false),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> PageNum {
        self.num_pages
    }

    /// True if `pn` names a real page of this file other than the header
    /// page.  The sentinels (0 and u32::MAX) are never valid.
    pub fn valid_page(&self, pn: PageNum) -> bool {
        pn != INVALID_PAGE_NUMBER && pn < self.num_pages
    }

    fn read_page_from_file(&self, pn: PageNum) -> Result<Vec<u8>, Error> {
        let mut v = vec![0_u8; self.page_size];
        let mut f = self.f.borrow_mut();
        f.seek(SeekFrom::Start(pn as u64 * self.page_size as u64))?;
        f.read_exact(&mut v[..])?;
        Ok(v)
    }

    /// Returns a shared handle to page `pn`, reading it on first access.
    pub fn get_page(&self, pn: PageNum) -> Result<Page, Error> {
        if pn >= self.num_pages {
            return Err(Error::PageNumberBeyondLimits);
        }
        if let Some(page) = self.pages.borrow().get(&pn) {
            return Ok(page.clone());
        }
        log::debug!("reading page {} on demand", pn);
        let v = self.read_page_from_file(pn)?;
        let page: Page = Rc::new(RefCell::new(v));
        self.pages.borrow_mut().insert(pn, page.clone());
        Ok(page)
    }

    /// Takes the exclusive-write latch.  The latch is released when the
    /// returned guard drops, so it is paired on every exit path.
    pub fn start_exclusive_write(&self) -> Result<ExclusiveWrite<'_>, Error> {
        if self.write_latch.get() {
            return Err(Error::WriteInProgress);
        }
        self.write_latch.set(true);
        Ok(ExclusiveWrite { channel: self })
    }

    pub fn write_in_progress(&self) -> bool {
        self.write_latch.get()
    }

    /// Flushes the cached image of page `pn` back to the file.  Requires the
    /// exclusive-write guard as witness that the latch is held.
    pub fn write_page(&self, pn: PageNum, _latch: &ExclusiveWrite<'_>) -> Result<(), Error> {
        let page = {
            let pages = self.pages.borrow();
            pages.get(&pn).cloned().ok_or(Error::PageNotLoaded(pn))?
        };
        let buf = page.borrow();
        let mut f = self.f.borrow_mut();
        f.seek(SeekFrom::Start(pn as u64 * self.page_size as u64))?;
        f.write_all(&buf[..])?;
        f.flush()?;
        log::debug!("wrote page {} to disk", pn);
        Ok(())
    }
}

/// Guard for the exclusive-write latch; see
/// [`PageChannel::start_exclusive_write`].
pub struct ExclusiveWrite<'c> {
    channel: &'c PageChannel,
}

impl<'c> Drop for ExclusiveWrite<'c> {
    fn drop(&mut self) {
        self.channel.write_latch.set(false);
    }
}

#[cfg(test)]
fn two_page_channel() -> (tempfile::NamedTempFile, PageChannel) {
    use crate::format::JET4;
    let mut bytes = vec![0_u8; JET4.page_size * 2];
    bytes[JET4.page_size] = 0xab;
    let file = tempfile::NamedTempFile::new().expect("Should have made temp file.");
    std::fs::write(file.path(), &bytes).expect("Should have written file.");
    let f = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(file.path())
        .expect("Should have opened file.");
    let channel = PageChannel::new(f, &JET4).expect("Should have made channel.");
    (file, channel)
}

#[test]
fn test_get_page() {
    let (_file, channel) = two_page_channel();
    assert_eq!(channel.num_pages(), 2);
    let p1 = channel.get_page(1).expect("Should have gotten page.");
    assert_eq!(p1.borrow()[0], 0xab);
    // A second get returns the same cached image.
    let p1b = channel.get_page(1).expect("Should have gotten page.");
    assert!(Rc::ptr_eq(&p1, &p1b));
}

#[test]
fn test_get_page_beyond_limits() {
    let (_file, channel) = two_page_channel();
    assert!(matches!(
        channel.get_page(2),
        Err(Error::PageNumberBeyondLimits)
    ));
}

#[test]
fn test_valid_page() {
    let (_file, channel) = two_page_channel();
    assert!(!channel.valid_page(INVALID_PAGE_NUMBER));
    assert!(channel.valid_page(1));
    assert!(!channel.valid_page(2));
    assert!(!channel.valid_page(PageNum::MAX));
}

#[test]
fn test_exclusive_write_latch_pairs() {
    let (_file, channel) = two_page_channel();
    {
        let latch = channel.start_exclusive_write().expect("Should have latched.");
        assert!(channel.write_in_progress());
        assert!(matches!(
            channel.start_exclusive_write(),
            Err(Error::WriteInProgress)
        ));
        drop(latch);
    }
    assert!(!channel.write_in_progress());
    let _again = channel.start_exclusive_write().expect("Should have latched again.");
}

#[test]
fn test_write_page_round_trips_through_file() {
    let (file, channel) = two_page_channel();
    let page = channel.get_page(1).expect("Should have gotten page.");
    page.borrow_mut()[7] = 0x5a;
    let latch = channel.start_exclusive_write().expect("Should have latched.");
    channel.write_page(1, &latch).expect("Should have written page.");
    drop(latch);

    let on_disk = std::fs::read(file.path()).expect("Should have read file back.");
    assert_eq!(on_disk[crate::format::JET4.page_size + 7], 0x5a);
}
