//! dbheader reads the header page of a Jet/ACE database file.

use byteorder::ReadBytesExt;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::format::{JetFormat, ACE, JET3, JET4};

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("The magic bytes for this file are wrong.")]
    WrongMagic,
    #[error("The product string in the file header is not a known one.")]
    WrongProductString,
    #[error("The format version code {0:#04x} is not supported by this code.")]
    UnsupportedVersion(u8),
    #[error("The product string does not agree with the format version code.")]
    MismatchedProductString,
    #[error("Error reading file.")]
    ReadFailed,
}

// The header page starts with a fixed prefix:
//   Offset  Size  Description
//   0       4     magic: 00 01 00 00
//   4       16    product string, nul padded
//   20      1     format version code
const MAGIC: &[u8] = &[0x00, 0x01, 0x00, 0x00];
const JET_PRODUCT_STRING: &[u8] = b"Standard Jet DB\x00";
const ACE_PRODUCT_STRING: &[u8] = b"Standard ACE DB\x00";
const OFFSET_PRODUCT_STRING: usize = 4;
const OFFSET_VERSION: usize = 20;
const HEADER_PREFIX_BYTES: usize = 21;

lazy_static! {
    static ref FORMATS_BY_VERSION: HashMap<u8, &'static JetFormat> = {
        let mut m = HashMap::new();
        for fmt in [&JET3, &JET4, &ACE] {
            m.insert(fmt.version_code, fmt);
        }
        m
    };
}

/// The decoded file header: everything downstream code needs is which
/// format generation wrote the file.
#[derive(Debug, Clone)]
pub struct DbfileHeader {
    pub format: &'static JetFormat,
}

pub fn get_header_clone(f: &mut std::fs::File) -> Result<DbfileHeader, Error> {
    let mut v = vec![0_u8; HEADER_PREFIX_BYTES];
    f.seek(SeekFrom::Start(0)).map_err(|_| Error::ReadFailed)?;
    f.read_exact(&mut v[..]).map_err(|_| Error::ReadFailed)?;
    let mut c = Cursor::new(v);
    get_header(&mut c)
}

pub fn get_header<R: Read + Seek>(f: &mut R) -> Result<DbfileHeader, Error> {
    f.seek(SeekFrom::Start(0)).map_err(|_| Error::ReadFailed)?;

    let mut magic_buffer = [0; 4];
    f.read_exact(&mut magic_buffer)
        .map_err(|_| Error::ReadFailed)?;
    if magic_buffer != MAGIC {
        return Err(Error::WrongMagic);
    }

    let mut product_buffer = [0; 16];
    f.read_exact(&mut product_buffer)
        .map_err(|_| Error::ReadFailed)?;
    if product_buffer != JET_PRODUCT_STRING && product_buffer != ACE_PRODUCT_STRING {
        return Err(Error::WrongProductString);
    }

    let version = f.read_u8().map_err(|_| Error::ReadFailed)?;
    let format = *FORMATS_BY_VERSION
        .get(&version)
        .ok_or(Error::UnsupportedVersion(version))?;

    // Jet files carry the Jet product string, ACE files the ACE one.
    let expected: &[u8] = if format.version_code >= ACE.version_code {
        ACE_PRODUCT_STRING
    } else {
        JET_PRODUCT_STRING
    };
    if product_buffer != expected {
        return Err(Error::MismatchedProductString);
    }

    f.seek(SeekFrom::Start(0)).map_err(|_| Error::ReadFailed)?;
    Ok(DbfileHeader { format })
}

/// Writes the header prefix into a blank header page.  Used when fabricating
/// database files; the remainder of the page is left as the caller made it.
pub fn write_header(page: &mut [u8], format: &JetFormat) {
    page[..MAGIC.len()].copy_from_slice(MAGIC);
    let product: &[u8] = if format.version_code >= ACE.version_code {
        ACE_PRODUCT_STRING
    } else {
        JET_PRODUCT_STRING
    };
    page[OFFSET_PRODUCT_STRING..OFFSET_PRODUCT_STRING + product.len()].copy_from_slice(product);
    page[OFFSET_VERSION] = format.version_code;
}

#[cfg(test)]
fn header_page(format: &JetFormat) -> Vec<u8> {
    let mut page = vec![0_u8; format.page_size];
    write_header(&mut page, format);
    page
}

#[test]
fn test_get_header_jet4() {
    let page = header_page(&JET4);
    let hdr = get_header(&mut Cursor::new(page)).expect("Should have parsed header.");
    assert_eq!(hdr.format, &JET4);
}

#[test]
fn test_get_header_jet3() {
    let page = header_page(&JET3);
    let hdr = get_header(&mut Cursor::new(page)).expect("Should have parsed header.");
    assert_eq!(hdr.format, &JET3);
    assert_eq!(hdr.format.page_size, 2048);
}

#[test]
fn test_get_header_ace() {
    let page = header_page(&ACE);
    let hdr = get_header(&mut Cursor::new(page)).expect("Should have parsed header.");
    assert_eq!(hdr.format, &ACE);
}

#[test]
fn test_get_header_wrong_magic() {
    let mut page = header_page(&JET4);
    page[0] = 0xff;
    assert!(matches!(
        get_header(&mut Cursor::new(page)),
        Err(Error::WrongMagic)
    ));
}

#[test]
fn test_get_header_bad_version() {
    let mut page = header_page(&JET4);
    page[OFFSET_VERSION] = 0x7f;
    assert!(matches!(
        get_header(&mut Cursor::new(page)),
        Err(Error::UnsupportedVersion(0x7f))
    ));
}

#[test]
fn test_get_header_mismatched_product_string() {
    let mut page = header_page(&ACE);
    // ACE version code with the Jet product string.
    page[OFFSET_PRODUCT_STRING..OFFSET_PRODUCT_STRING + 16].copy_from_slice(JET_PRODUCT_STRING);
    assert!(matches!(
        get_header(&mut Cursor::new(page)),
        Err(Error::MismatchedProductString)
    ));
}
