//! Motorola S-Record loader: S1/S2/S3 carry data at 16/24/32-bit addresses,
//! S7/S8/S9 set the entry point, S0 header records are parsed and discarded.

use super::{LoadResult, LoaderError};
use crate::memory::MemoryController;

pub fn load(mem: &mut MemoryController, text: &str) -> LoadResult {
    let mut entry_point = None;
    let mut errors = Vec::new();
    let mut total_len = 0u32;
    let mut min_addr: Option<u32> = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('S') {
            continue;
        }
        match parse_record(line) {
            Ok(Record::Data { address, data }) => {
                mem.load(address, &data);
                total_len += data.len() as u32;
                min_addr = Some(min_addr.map_or(address, |m| m.min(address)));
            }
            Ok(Record::Entry(addr)) => entry_point = Some(addr),
            Ok(Record::Header) => {}
            Err(e) => errors.push(format!("line {}: {}", line_no + 1, e)),
        }
    }

    if !errors.is_empty() {
        return LoadResult { success: false, entry_point, errors, ..Default::default() };
    }
    let mut result = LoadResult::ok(entry_point);
    if let Some(addr) = min_addr {
        result.loaded_sections.push(super::LoadedSection { name: "srec".to_string(), address: addr, length: total_len });
    }
    result
}

enum Record {
    Data { address: u32, data: Vec<u8> },
    Entry(u32),
    Header,
}

fn parse_record(line: &str) -> Result<Record, LoaderError> {
    if line.len() < 4 {
        return Err(LoaderError::MalformedRecord("record too short".to_string()));
    }
    let record_type = line.as_bytes()[1];
    let byte_count = hex_byte(&line[2..4])? as usize;
    let data_hex = &line[4..];
    if data_hex.len() < byte_count * 2 {
        return Err(LoaderError::MalformedRecord("incomplete record".to_string()));
    }

    match record_type {
        b'0' => Ok(Record::Header),
        b'1' => {
            let address = hex_u32(&data_hex[0..4])?;
            let data = hex_bytes(&data_hex[4..data_hex.len() - 2])?;
            Ok(Record::Data { address, data })
        }
        b'2' => {
            let address = hex_u32(&data_hex[0..6])?;
            let data = hex_bytes(&data_hex[6..data_hex.len() - 2])?;
            Ok(Record::Data { address, data })
        }
        b'3' => {
            let address = hex_u32(&data_hex[0..8])?;
            let data = hex_bytes(&data_hex[8..data_hex.len() - 2])?;
            Ok(Record::Data { address, data })
        }
        b'7' => Ok(Record::Entry(hex_u32(&data_hex[0..8])?)),
        b'8' => Ok(Record::Entry(hex_u32(&data_hex[0..6])?)),
        b'9' => Ok(Record::Entry(hex_u32(&data_hex[0..4])?)),
        _ => Ok(Record::Header),
    }
}

fn hex_byte(s: &str) -> Result<u8, LoaderError> {
    u8::from_str_radix(s, 16).map_err(|_| LoaderError::MalformedRecord(format!("bad hex byte {:?}", s)))
}

fn hex_u32(s: &str) -> Result<u32, LoaderError> {
    u32::from_str_radix(s, 16).map_err(|_| LoaderError::MalformedRecord(format!("bad hex address {:?}", s)))
}

fn hex_bytes(s: &str) -> Result<Vec<u8>, LoaderError> {
    if s.len() % 2 != 0 {
        return Err(LoaderError::MalformedRecord("odd-length data field".to_string()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| hex_byte(&s[i..i + 2]))
        .collect()
}
