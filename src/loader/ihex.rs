//! Intel HEX loader: type 0x00 data records (relative to a running extended
//! address base), 0x01 EOF, 0x02 segment base (<<4), 0x04 linear base
//! (<<16), 0x05 start linear address (entry point).

use super::{LoadResult, LoaderError};
use crate::memory::MemoryController;

pub fn load(mem: &mut MemoryController, text: &str) -> LoadResult {
    let mut entry_point = None;
    let mut extended_address = 0u32;
    let mut errors = Vec::new();
    let mut total_len = 0u32;
    let mut min_addr: Option<u32> = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with(':') {
            continue;
        }
        match parse_record(&line[1..], &mut extended_address) {
            Ok(Some((address, data))) => {
                mem.load(address, &data);
                total_len += data.len() as u32;
                min_addr = Some(min_addr.map_or(address, |m| m.min(address)));
            }
            Ok(None) => {}
            Err(e) => errors.push(format!("line {}: {}", line_no + 1, e)),
        }
        if let Some(addr) = take_entry(&line[1..]) {
            entry_point = Some(addr);
        }
    }

    if !errors.is_empty() {
        return LoadResult { success: false, entry_point, errors, ..Default::default() };
    }
    let mut result = LoadResult::ok(entry_point);
    if let Some(addr) = min_addr {
        result.loaded_sections.push(super::LoadedSection { name: "ihex".to_string(), address: addr, length: total_len });
    }
    result
}

/// Re-parse a record purely to pull out a type-0x05 start address, since
/// the main pass only returns data records.
fn take_entry(record: &str) -> Option<u32> {
    if record.len() < 8 {
        return None;
    }
    let record_type = u8::from_str_radix(&record[6..8], 16).ok()?;
    if record_type != 0x05 {
        return None;
    }
    let data_hex = &record[8..record.len() - 2];
    u32::from_str_radix(data_hex, 16).ok()
}

fn parse_record(record: &str, extended_address: &mut u32) -> Result<Option<(u32, Vec<u8>)>, LoaderError> {
    if record.len() < 10 {
        return Err(LoaderError::MalformedRecord("record too short".to_string()));
    }
    let byte_count = u8::from_str_radix(&record[0..2], 16)
        .map_err(|_| LoaderError::MalformedRecord("bad byte count".to_string()))? as usize;
    let address = u16::from_str_radix(&record[2..6], 16)
        .map_err(|_| LoaderError::MalformedRecord("bad address".to_string()))? as u32;
    let record_type = u8::from_str_radix(&record[6..8], 16)
        .map_err(|_| LoaderError::MalformedRecord("bad record type".to_string()))?;
    let data_hex = &record[8..record.len() - 2];
    if data_hex.len() != byte_count * 2 {
        return Err(LoaderError::MalformedRecord("data length mismatch".to_string()));
    }

    match record_type {
        0x00 => {
            let data = hex_bytes(data_hex)?;
            Ok(Some((*extended_address + address, data)))
        }
        0x01 => Ok(None),
        0x02 => {
            let base = u32::from_str_radix(data_hex, 16)
                .map_err(|_| LoaderError::MalformedRecord("bad segment base".to_string()))?;
            *extended_address = base << 4;
            Ok(None)
        }
        0x03 => Ok(None),
        0x04 => {
            let base = u32::from_str_radix(data_hex, 16)
                .map_err(|_| LoaderError::MalformedRecord("bad linear base".to_string()))?;
            *extended_address = base << 16;
            Ok(None)
        }
        0x05 => Ok(None),
        _ => Ok(None),
    }
}

fn hex_bytes(s: &str) -> Result<Vec<u8>, LoaderError> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| LoaderError::MalformedRecord(format!("bad hex byte at {}", i))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_record_loads_at_extended_plus_address() {
        let mut mem = MemoryController::new();
        let text = ":02000004FFE0001A\n:04000000DEADBEEF3C\n";
        let result = load(&mut mem, text);
        assert!(result.success);
        assert_eq!(mem.dump(0xFFE0_0000, 4), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn start_linear_address_record_sets_entry_point() {
        let mut mem = MemoryController::new();
        let text = ":04000005FFE000001B\n";
        let result = load(&mut mem, text);
        assert_eq!(result.entry_point, Some(0xFFE0_0000));
    }
}
