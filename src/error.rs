//! Library error surface: the two genuine `Result::Err` conditions named by
//! the reset/execution model. Access anomalies (unmapped reads, read-only
//! writes) are not errors — they are silently recorded in the memory
//! controller's access log.

use thiserror::Error;

use crate::loader::LoaderError;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("undefined instruction {opcode:#04x} at {pc:#010x}")]
    Execution { pc: u32, opcode: u8 },
}

pub type EmuResult<T> = Result<T, EmuError>;
