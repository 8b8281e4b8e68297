//! Raw binary loader: the whole file, written verbatim at a caller-supplied
//! (or default) load address. Entry point is the load address itself.

use super::{LoadResult, LoadedSection};
use crate::memory::MemoryController;

/// Default load address for raw images with no `-a`/`--address` override,
/// matching the reference's `BinaryLoader.load_binary` default.
pub const DEFAULT_LOAD_ADDRESS: u32 = 0xFFE0_0000;

pub fn load(mem: &mut MemoryController, bytes: &[u8], address: u32) -> LoadResult {
    mem.load(address, bytes);
    let mut result = LoadResult::ok(Some(address));
    result.loaded_sections.push(LoadedSection { name: "raw".to_string(), address, length: bytes.len() as u32 });
    result
}
