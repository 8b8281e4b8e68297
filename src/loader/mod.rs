//! Program loaders: byte-writers into [`crate::memory::MemoryController`].
//! Each format lives in its own submodule; all four share the same
//! [`LoadResult`]/[`LoaderError`] vocabulary.

pub mod elf;
pub mod ihex;
pub mod raw;
pub mod srec;

use thiserror::Error;

use crate::memory::MemoryController;

/// One loaded section, for the CLI's listing and the inspection surface.
#[derive(Debug, Clone)]
pub struct LoadedSection {
    pub name: String,
    pub address: u32,
    pub length: u32,
}

/// Outcome of a loader run. A loader that returns `success: false` has not
/// mutated memory beyond records already processed successfully earlier in
/// the same file.
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    pub success: bool,
    pub entry_point: Option<u32>,
    pub loaded_sections: Vec<LoadedSection>,
    pub symbols: Vec<(String, u32)>,
    pub errors: Vec<String>,
}

impl LoadResult {
    fn ok(entry_point: Option<u32>) -> Self {
        Self { success: true, entry_point, ..Default::default() }
    }
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read image file: {0}")]
    Io(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("unsupported ELF machine type {0} (expected RX = 173)")]
    UnsupportedMachine(u16),
    #[error("not a recognized image format")]
    UnrecognizedFormat,
}

/// Pick a loader by file extension, sniffing `.hex` files to distinguish
/// S-Record from Intel HEX by their first non-whitespace byte.
pub fn load_file(mem: &mut MemoryController, path: &std::path::Path, address_override: Option<u32>) -> LoadResult {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => return failed(LoaderError::Io(e.to_string())),
    };

    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("elf") => elf::load(mem, &bytes),
        Some("hex") | Some("mot") | Some("srec") | Some("s19") | Some("s28") | Some("s37") => {
            let text = String::from_utf8_lossy(&bytes);
            match text.trim_start().as_bytes().first() {
                Some(b':') => ihex::load(mem, &text),
                Some(b'S') => srec::load(mem, &text),
                _ => failed(LoaderError::UnrecognizedFormat),
            }
        }
        _ => raw::load(mem, &bytes, address_override.unwrap_or(raw::DEFAULT_LOAD_ADDRESS)),
    }
}

fn failed(err: LoaderError) -> LoadResult {
    LoadResult { success: false, errors: vec![err.to_string()], ..Default::default() }
}
