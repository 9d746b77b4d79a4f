//! record encodes and decodes the byte payload of one table row.
//!
//! A row is stored self-describing: a little-endian 16-bit column count,
//! then one tagged value per column.  The tag identifies the stored type,
//! which need not be checked against the table schema until the row is
//! surfaced as typed values.
//!
//!   tag  payload
//!   0    none (NULL)
//!   1    1 byte, 0 or 1 (BOOL)
//!   2    4 bytes, little-endian two's complement (LONG)
//!   3    8 bytes, little-endian IEEE 754 (DOUBLE)
//!   4    2-byte length, then that many bytes of UTF-8 (TEXT)
//!   5    2-byte length, then that many raw bytes (BINARY)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::value::Value;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_LONG: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_TEXT: u8 = 4;
const TAG_BINARY: u8 = 5;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("The row ended before all of its values were read.")]
    Truncated,
    #[error("Unknown value type tag: {0}.")]
    UnknownTypeTag(u8),
    #[error("A text value is not valid UTF-8.")]
    InvalidString,
    #[error("A value is too long to be encoded in a row.")]
    ValueTooLong,
}

/// Decodes a row payload into its values, in stored column order.
pub fn decode_values(data: &[u8]) -> Result<Vec<Value>, Error> {
    let mut c = Cursor::new(data);
    let num_values = c
        .read_u16::<LittleEndian>()
        .map_err(|_| Error::Truncated)?;
    let mut values = Vec::with_capacity(num_values as usize);
    for _ in 0..num_values {
        let tag = c.read_u8().map_err(|_| Error::Truncated)?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_BOOL => Value::Bool(c.read_u8().map_err(|_| Error::Truncated)? != 0),
            TAG_LONG => Value::Long(
                c.read_i32::<LittleEndian>()
                    .map_err(|_| Error::Truncated)?,
            ),
            TAG_DOUBLE => Value::Double(
                c.read_f64::<LittleEndian>()
                    .map_err(|_| Error::Truncated)?,
            ),
            TAG_TEXT => {
                let len = c
                    .read_u16::<LittleEndian>()
                    .map_err(|_| Error::Truncated)? as usize;
                let mut buf = vec![0_u8; len];
                c.read_exact(&mut buf[..]).map_err(|_| Error::Truncated)?;
                Value::Text(String::from_utf8(buf).map_err(|_| Error::InvalidString)?)
            }
            TAG_BINARY => {
                let len = c
                    .read_u16::<LittleEndian>()
                    .map_err(|_| Error::Truncated)? as usize;
                let mut buf = vec![0_u8; len];
                c.read_exact(&mut buf[..]).map_err(|_| Error::Truncated)?;
                Value::Binary(buf)
            }
            b => return Err(Error::UnknownTypeTag(b)),
        };
        values.push(value);
    }
    Ok(values)
}

/// Encodes values into a row payload.
pub fn encode_values(values: &[Value]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    out.extend_from_slice(&(values.len() as u16).to_le_bytes());
    for value in values {
        match value {
            Value::Null => out.push(TAG_NULL),
            Value::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(*b as u8);
            }
            Value::Long(i) => {
                out.push(TAG_LONG);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Value::Double(d) => {
                out.push(TAG_DOUBLE);
                out.extend_from_slice(&d.to_le_bytes());
            }
            Value::Text(s) => {
                out.push(TAG_TEXT);
                let bytes = s.as_bytes();
                if bytes.len() > u16::MAX as usize {
                    return Err(Error::ValueTooLong);
                }
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Value::Binary(b) => {
                out.push(TAG_BINARY);
                if b.len() > u16::MAX as usize {
                    return Err(Error::ValueTooLong);
                }
                out.extend_from_slice(&(b.len() as u16).to_le_bytes());
                out.extend_from_slice(b);
            }
        }
    }
    Ok(out)
}

#[test]
fn test_decode_known_bytes() {
    // 3 columns: LONG 1 | TEXT "Ten" | NULL
    let row: &[u8] = &[
        0x03, 0x00, // count
        0x02, 0x01, 0x00, 0x00, 0x00, // LONG 1
        0x04, 0x03, 0x00, 0x54, 0x65, 0x6e, // TEXT "Ten"
        0x00, // NULL
    ];
    let values = decode_values(row).expect("Should have decoded row.");
    assert_eq!(values.len(), 3);
    assert_eq!(values[0], Value::Long(1));
    assert_eq!(values[1], Value::Text(String::from("Ten")));
    assert_eq!(values[2], Value::Null);
}

#[test]
fn test_encode_matches_decode_layout() {
    let values = vec![
        Value::Bool(true),
        Value::Double(3.1415),
        Value::Binary(vec![0xde, 0xad]),
    ];
    let bytes = encode_values(&values).expect("Should have encoded row.");
    assert_eq!(bytes[0..2], [0x03, 0x00]);
    assert_eq!(bytes[2], TAG_BOOL);
    let back = decode_values(&bytes).expect("Should have decoded row.");
    assert_eq!(back, values);
}

// From command: xxd on a row written by encode_values.
#[cfg(test)]
const TEST_ROW: &str = "0300 0207 0000 0003 0000 0000 0000 f83f 0502 00de ad";

#[test]
fn test_decode_hex_fixture() {
    use hex::FromHex;
    let row: Vec<u8> =
        Vec::from_hex(TEST_ROW.replace(&[' ', '\n'][..], "")).expect("Invalid Hex String");
    let values = decode_values(&row).expect("Should have decoded row.");
    assert_eq!(
        values,
        vec![
            Value::Long(7),
            Value::Double(1.5),
            Value::Binary(vec![0xde, 0xad]),
        ]
    );
}

#[test]
fn test_decode_truncated_row() {
    // Claims a LONG but only has two payload bytes.
    let row: &[u8] = &[0x01, 0x00, 0x02, 0x01, 0x00];
    assert!(matches!(decode_values(row), Err(Error::Truncated)));
}

#[test]
fn test_decode_unknown_tag() {
    let row: &[u8] = &[0x01, 0x00, 0x7e];
    assert!(matches!(decode_values(row), Err(Error::UnknownTypeTag(0x7e))));
}

#[test]
fn test_decode_bad_utf8() {
    let row: &[u8] = &[0x01, 0x00, 0x04, 0x02, 0x00, 0xff, 0xfe];
    assert!(matches!(decode_values(row), Err(Error::InvalidString)));
}
