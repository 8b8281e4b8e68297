//! ELF32 little-endian loader, `e_machine` must be RX (173). Iterates
//! PT_LOAD program headers, writing `p_filesz` bytes at `p_paddr` and
//! zero-filling the remaining `p_memsz - p_filesz` (BSS).

use super::{LoadResult, LoadedSection, LoaderError};
use crate::memory::MemoryController;

const EI_NIDENT: usize = 16;
const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;
const SHDR_SIZE: usize = 40;
const MACHINE_RX: u16 = 173;
const PT_LOAD: u32 = 1;
const SHT_SYMTAB: u32 = 2;

pub fn load(mem: &mut MemoryController, data: &[u8]) -> LoadResult {
    match try_load(mem, data) {
        Ok(result) => result,
        Err(e) => LoadResult { success: false, errors: vec![e.to_string()], ..Default::default() },
    }
}

fn try_load(mem: &mut MemoryController, data: &[u8]) -> Result<LoadResult, LoaderError> {
    if data.len() < EHDR_SIZE || &data[0..4] != b"\x7fELF" {
        return Err(LoaderError::MalformedRecord("invalid ELF header".to_string()));
    }

    let machine = u16_at(data, EI_NIDENT);
    if machine != MACHINE_RX {
        return Err(LoaderError::UnsupportedMachine(machine));
    }
    let entry_point = u32_at(data, EI_NIDENT + 2 + 2 + 4);
    let phoff = u32_at(data, EI_NIDENT + 12) as usize;
    let shoff = u32_at(data, EI_NIDENT + 16) as usize;
    let phentsize = u16_at(data, EI_NIDENT + 24) as usize;
    let phnum = u16_at(data, EI_NIDENT + 26) as usize;
    let shentsize = u16_at(data, EI_NIDENT + 32) as usize;
    let shnum = u16_at(data, EI_NIDENT + 34) as usize;
    let shstrndx = u16_at(data, EI_NIDENT + 36) as usize;

    let mut loaded_sections = Vec::new();
    for i in 0..phnum {
        let off = phoff + i * phentsize.max(PHDR_SIZE);
        if off + PHDR_SIZE > data.len() {
            break;
        }
        let p_type = u32_at(data, off);
        let p_offset = u32_at(data, off + 4) as usize;
        let p_vaddr = u32_at(data, off + 8);
        let p_paddr = u32_at(data, off + 12);
        let p_filesz = u32_at(data, off + 16) as usize;
        let p_memsz = u32_at(data, off + 20) as usize;

        if p_type != PT_LOAD {
            continue;
        }
        if p_filesz > 0 {
            if p_offset + p_filesz > data.len() {
                return Err(LoaderError::MalformedRecord("PT_LOAD segment out of bounds".to_string()));
            }
            mem.load(p_paddr, &data[p_offset..p_offset + p_filesz]);
            loaded_sections.push(LoadedSection { name: format!("LOAD@{:#010x}", p_vaddr), address: p_paddr, length: p_filesz as u32 });
        }
        if p_memsz > p_filesz {
            let bss = vec![0u8; p_memsz - p_filesz];
            mem.load(p_paddr.wrapping_add(p_filesz as u32), &bss);
        }
    }

    let symbols = parse_symbols(data, shoff, shentsize.max(SHDR_SIZE), shnum, shstrndx);

    let mut result = LoadResult::ok(Some(entry_point));
    result.loaded_sections = loaded_sections;
    result.symbols = symbols;
    Ok(result)
}

struct SectionHeader {
    sh_type: u32,
    sh_offset: usize,
    sh_size: usize,
    sh_link: usize,
}

fn section_headers(data: &[u8], shoff: usize, shentsize: usize, shnum: usize) -> Vec<SectionHeader> {
    let mut out = Vec::with_capacity(shnum);
    for i in 0..shnum {
        let off = shoff + i * shentsize;
        if off + SHDR_SIZE > data.len() {
            break;
        }
        out.push(SectionHeader {
            sh_type: u32_at(data, off + 4),
            sh_offset: u32_at(data, off + 16) as usize,
            sh_size: u32_at(data, off + 20) as usize,
            sh_link: u32_at(data, off + 24) as usize,
        });
    }
    out
}

fn parse_symbols(data: &[u8], shoff: usize, shentsize: usize, shnum: usize, shstrndx: usize) -> Vec<(String, u32)> {
    let sections = section_headers(data, shoff, shentsize, shnum);
    let Some(symtab) = sections.iter().find(|s| s.sh_type == SHT_SYMTAB) else { return Vec::new() };
    let Some(strtab) = sections.get(symtab.sh_link) else { return Vec::new() };
    if strtab.sh_offset + strtab.sh_size > data.len() {
        return Vec::new();
    }
    let strtab_bytes = &data[strtab.sh_offset..strtab.sh_offset + strtab.sh_size];

    let mut out = Vec::new();
    let entry_size = 16;
    let mut off = symtab.sh_offset;
    let end = symtab.sh_offset + symtab.sh_size;
    while off + entry_size <= end && off + entry_size <= data.len() {
        let st_name = u32_at(data, off) as usize;
        let st_value = u32_at(data, off + 4);
        if let Some(name) = cstr_at(strtab_bytes, st_name) {
            if !name.is_empty() {
                out.push((name, st_value));
            }
        }
        off += entry_size;
    }
    out
}

fn cstr_at(bytes: &[u8], offset: usize) -> Option<String> {
    if offset >= bytes.len() {
        return None;
    }
    let end = bytes[offset..].iter().position(|&b| b == 0).map_or(bytes.len(), |p| offset + p);
    Some(String::from_utf8_lossy(&bytes[offset..end]).into_owned())
}

fn u16_at(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

fn u32_at(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_elf(machine: u16) -> Vec<u8> {
        let mut data = vec![0u8; EHDR_SIZE + PHDR_SIZE];
        data[0..4].copy_from_slice(b"\x7fELF");
        data[4] = 1; // ELFCLASS32
        data[5] = 1; // little endian
        data[EI_NIDENT..EI_NIDENT + 2].copy_from_slice(&2u16.to_le_bytes()); // e_type
        data[EI_NIDENT + 2..EI_NIDENT + 4].copy_from_slice(&machine.to_le_bytes());
        data[EI_NIDENT + 8..EI_NIDENT + 12].copy_from_slice(&0xFFE0_0000u32.to_le_bytes()); // entry
        data[EI_NIDENT + 12..EI_NIDENT + 16].copy_from_slice(&(EHDR_SIZE as u32).to_le_bytes()); // phoff
        data[EI_NIDENT + 24..EI_NIDENT + 26].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes()); // phentsize
        data[EI_NIDENT + 26..EI_NIDENT + 28].copy_from_slice(&1u16.to_le_bytes()); // phnum

        let ph = EHDR_SIZE;
        data[ph..ph + 4].copy_from_slice(&PT_LOAD.to_le_bytes());
        data[ph + 4..ph + 8].copy_from_slice(&0u32.to_le_bytes()); // p_offset: reuse header region trivially
        data[ph + 12..ph + 16].copy_from_slice(&0xFFE0_0000u32.to_le_bytes()); // p_paddr
        data[ph + 16..ph + 20].copy_from_slice(&4u32.to_le_bytes()); // p_filesz
        data[ph + 20..ph + 24].copy_from_slice(&4u32.to_le_bytes()); // p_memsz
        data
    }

    #[test]
    fn unsupported_machine_is_rejected() {
        let mut mem = MemoryController::new();
        let data = minimal_elf(0x3E); // x86-64, not RX
        let result = load(&mut mem, &data);
        assert!(!result.success);
        assert!(result.errors[0].contains("machine"));
    }

    #[test]
    fn pt_load_segment_is_written_at_its_physical_address() {
        let mut mem = MemoryController::new();
        let data = minimal_elf(MACHINE_RX);
        let result = load(&mut mem, &data);
        assert!(result.success);
        assert_eq!(result.entry_point, Some(0xFFE0_0000));
        assert_eq!(mem.dump(0xFFE0_0000, 4), &data[0..4]);
    }
}
