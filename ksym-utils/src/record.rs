use crate::resolve::{ConfigFlag, Resolution, ResolvedOffsets};
use crate::{Error, Result};

pub const DEFAULT_DISTRO: &str = "distro_name";

/// One line of an offset table: config flags followed by offsets relative to
/// the reference symbol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OffsetRecord {
    pub distro: String,
    pub release: String,
    pub flags: Vec<bool>,
    pub offsets: Vec<u64>,
}

impl OffsetRecord {
    pub fn new(distro: &str, release: &str, resolution: &Resolution) -> Result<Self> {
        Self::from_parts(distro, release, resolution.flags(), resolution.offsets())
    }

    /// Fails if any offset is absent, so a record is either complete or not
    /// built at all.
    pub fn from_parts(
        distro: &str,
        release: &str,
        flags: &[ConfigFlag],
        offsets: &ResolvedOffsets,
    ) -> Result<Self> {
        let offsets = offsets
            .iter()
            .map(|(name, offset)| {
                offset.ok_or_else(|| Error::SymbolNotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let flags = flags.iter().map(|flag| flag.enabled).collect();
        Ok(Self {
            distro: distro.to_string(),
            release: release.to_string(),
            flags,
            offsets,
        })
    }
}

impl std::fmt::Display for OffsetRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{{\"{}\", \"{}\"", self.distro, self.release)?;
        for flag in &self.flags {
            write!(f, ", {}", flag)?;
        }
        for offset in &self.offsets {
            // `%#lx` prints zero without the prefix.
            if *offset == 0 {
                write!(f, ", 0")?;
            } else {
                write!(f, ", {:#x}", offset)?;
            }
        }
        write!(f, "}}")
    }
}
