use crate::{Error, Result};
use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

pub const KALLSYMS_PATH: &str = "/proc/kallsyms";

/// Size of the name buffer of a symbol, including the terminating nul.
/// Longer names are truncated to `KSYM_NAME_LEN - 1` bytes.
pub const KSYM_NAME_LEN: usize = 512;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct KernelSymbol {
    name: String,
    kind: char,
    address: u64,
}

impl KernelSymbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `nm` style type tag (`T`, `t`, `D`, `W`, ...).
    pub fn kind(&self) -> char {
        self.kind
    }

    /// Load address. Zero when the kernel hides addresses from the reader.
    pub fn address(&self) -> u64 {
        self.address
    }
}

impl std::fmt::Display for KernelSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:016x} {} {}", self.address, self.kind, self.name)
    }
}

#[derive(Debug)]
pub struct KernelSymbolTable {
    symbols: Vec<KernelSymbol>,
}

impl KernelSymbolTable {
    pub fn load() -> Result<Self> {
        Self::load_path(KALLSYMS_PATH)
    }

    pub fn load_path<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading {}", path.display());
        let file = File::open(path).map_err(|source| Error::SourceUnavailable {
            path: path.to_owned(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parses a kallsyms formatted stream. Only the kernel proper symbols are
    /// loaded; everything from the first line carrying a module suffix
    /// (`\t[module]`) on is ignored.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let lines = count_kernel_lines(&data);
        if lines < 1 {
            return Err(Error::MalformedInput);
        }

        let mut symbols = Vec::new();
        symbols.try_reserve_exact(lines)?;
        for (index, line) in data.split(|&b| b == b'\n').take(lines).enumerate() {
            symbols.push(parse_line(index, &String::from_utf8_lossy(line))?);
        }
        log::debug!("loaded {} kernel symbols", symbols.len());
        Ok(Self { symbols })
    }

    /// Returns the first symbol called exactly `name`.
    pub fn find(&self, name: &str) -> Option<&KernelSymbol> {
        self.symbols.iter().find(|ksym| ksym.name == name)
    }
}

impl Deref for KernelSymbolTable {
    type Target = [KernelSymbol];

    fn deref(&self) -> &Self::Target {
        &self.symbols
    }
}

/// Number of newlines before the first tab.
fn count_kernel_lines(data: &[u8]) -> usize {
    data.iter()
        .take_while(|&&b| b != b'\t')
        .filter(|&&b| b == b'\n')
        .count()
}

fn parse_line(index: usize, line: &str) -> Result<KernelSymbol> {
    let err = |reason: String| Error::Read { index, reason };
    let mut columns = line.split_whitespace();
    let address = columns
        .next()
        .ok_or_else(|| err("expected address".into()))?;
    let kind = columns.next().ok_or_else(|| err("expected type".into()))?;
    let name = columns.next().ok_or_else(|| err("expected name".into()))?;

    let address = u64::from_str_radix(address, 16)
        .map_err(|e| err(format!("invalid address `{}`: {}", address, e)))?;
    let mut chars = kind.chars();
    let kind = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(err(format!("invalid type `{}`", kind))),
    };
    Ok(KernelSymbol {
        name: truncate_name(name).into_owned(),
        kind,
        address,
    })
}

fn truncate_name(name: &str) -> Cow<'_, str> {
    let max = KSYM_NAME_LEN - 1;
    if name.len() <= max {
        return Cow::Borrowed(name);
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(name[..end].to_string())
}
