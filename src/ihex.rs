// I8HEX firmware images: ':'-led records of hex-ASCII pairs, big-endian
// 16-bit load address, record types 00 (data) and 01 (end of file), and a
// two's-complement checksum over every byte of the record. Loader firmware
// for this target is laid out strictly contiguously from address zero, and
// the parser enforces that.

use std::io::{self, Write};
use thiserror::Error;

const RECORD_BYTE_COUNT_MAX: usize = 16;
const RECORD_TYPE_DATA: u8 = 0;
const RECORD_TYPE_END_OF_FILE: u8 = 1;

#[derive(Debug, Error)]
pub enum HexError {
    #[error("malformed record at line {line}")]
    BadRecord { line: usize },
    #[error("checksum mismatch at line {line}: expected {expected:02X}, found {found:02X}")]
    BadChecksum { line: usize, expected: u8, found: u8 },
    #[error("record at line {line} not contiguous: expected address {expected:04X}, found {found:04X}")]
    NonContiguous { line: usize, expected: u16, found: u16 },
    #[error("unsupported record type {record_type:02X} at line {line}")]
    UnsupportedType { line: usize, record_type: u8 },
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(10 + c - b'A'),
        _ => None,
    }
}

fn decode_pairs(text: &str) -> Option<Vec<u8>> {
    let raw = text.as_bytes();
    if raw.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(raw.len() / 2);
    for pair in raw.chunks(2) {
        bytes.push(hex_digit(pair[0])? * 16 + hex_digit(pair[1])?);
    }
    Some(bytes)
}

pub fn parse(text: &str) -> Result<Vec<u8>, HexError> {
    let mut data = Vec::new();
    let mut address_valid: u16 = 0;
    let mut end_of_file = false;
    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if end_of_file || !line.starts_with(':') {
            return Err(HexError::BadRecord { line: line_number });
        }
        let bytes = match decode_pairs(&line[1..]) {
            Some(bytes) if bytes.len() >= 5 => bytes,
            _ => return Err(HexError::BadRecord { line: line_number }),
        };
        let byte_count = bytes[0] as usize;
        if byte_count > RECORD_BYTE_COUNT_MAX || bytes.len() != byte_count + 5 {
            return Err(HexError::BadRecord { line: line_number });
        }
        let address = u16::from_be_bytes([bytes[1], bytes[2]]);
        let record_type = bytes[3];
        let sum: u8 = bytes[..bytes.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b));
        let expected = (!sum).wrapping_add(1);
        let found = bytes[bytes.len() - 1];
        if expected != found {
            return Err(HexError::BadChecksum { line: line_number, expected, found });
        }
        match record_type {
            RECORD_TYPE_DATA => {
                if address != address_valid {
                    return Err(HexError::NonContiguous {
                        line: line_number,
                        expected: address_valid,
                        found: address,
                    });
                }
                data.extend_from_slice(&bytes[4..4 + byte_count]);
                address_valid = address_valid.wrapping_add(byte_count as u16);
            }
            RECORD_TYPE_END_OF_FILE => {
                end_of_file = true;
            }
            record_type => {
                return Err(HexError::UnsupportedType { line: line_number, record_type })
            }
        }
    }
    Ok(data)
}

// Inverse of the parser: dump a byte image back out as contiguous data
// records from address zero, closed by an end-of-file record.
pub fn write_i8hex(data: &[u8], out: &mut dyn Write) -> io::Result<()> {
    let mut address: u16 = 0;
    for chunk in data.chunks(RECORD_BYTE_COUNT_MAX) {
        let mut checksum: u8 = chunk.len() as u8;
        checksum = checksum
            .wrapping_add((address >> 8) as u8)
            .wrapping_add(address as u8);
        for &b in chunk {
            checksum = checksum.wrapping_add(b);
        }
        checksum = (!checksum).wrapping_add(1);
        write!(out, ":{:02X}{:04X}00", chunk.len(), address)?;
        for &b in chunk {
            write!(out, "{:02X}", b)?;
        }
        writeln!(out, "{:02X}", checksum)?;
        address = address.wrapping_add(chunk.len() as u16);
    }
    writeln!(out, ":00000001FF")?;
    Ok(())
}
