//! ksym-utils
//!
//! 1. Load the kernel symbol table (`/proc/kallsyms`).
//! 2. Look up the well known symbols (`resolve::KERNEL_SYMBOLS`).
//! 3. Compute their offsets relative to `_text` and infer kernel config
//!    options from the presence of debug only symbols.
//! 4. Render the result as an offset record.
use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

pub mod kallsyms;
pub mod record;
pub mod resolve;
pub mod uname;

pub use kallsyms::{KernelSymbol, KernelSymbolTable, KALLSYMS_PATH, KSYM_NAME_LEN};
pub use record::OffsetRecord;
pub use resolve::{Resolution, ResolvedOffsets, SymbolRole, SymbolSpec, KERNEL_SYMBOLS};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open `{}`", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read symbol table")]
    Io(#[from] std::io::Error),
    #[error("failed to allocate symbol table")]
    ResourceExhausted(#[from] TryReserveError),
    #[error("symbol table contains no kernel symbols")]
    MalformedInput,
    #[error("failed to parse symbol {index}: {reason}")]
    Read { index: usize, reason: String },
    #[error("symbol `{0}` not found")]
    SymbolNotFound(String),
    #[error("failed to query kernel release: {0}")]
    HostInfo(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
