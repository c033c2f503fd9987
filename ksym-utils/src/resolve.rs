use crate::kallsyms::{KernelSymbol, KernelSymbolTable};
use crate::{Error, Result};

/// Symbol all offsets are relative to, unless the symbol set names another.
pub const REFERENCE_SYMBOL: &str = "_text";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SymbolRole {
    /// Base address of the offsets. Required.
    Reference,
    /// Offset reported in the record. Required.
    Offset,
    /// Only exists when the named kernel config option is enabled. Optional.
    ConfigFlag(&'static str),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SymbolSpec {
    pub name: &'static str,
    pub role: SymbolRole,
}

impl SymbolSpec {
    pub const fn reference(name: &'static str) -> Self {
        Self {
            name,
            role: SymbolRole::Reference,
        }
    }

    pub const fn offset(name: &'static str) -> Self {
        Self {
            name,
            role: SymbolRole::Offset,
        }
    }

    pub const fn config_flag(name: &'static str, config: &'static str) -> Self {
        Self {
            name,
            role: SymbolRole::ConfigFlag(config),
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self.role, SymbolRole::ConfigFlag(_))
    }
}

/// The symbols making up an offset record, in record order.
pub const KERNEL_SYMBOLS: &[SymbolSpec] = &[
    SymbolSpec::reference("_text"),
    SymbolSpec::config_flag("rwlock_init", "CONFIG_DEBUG_SPINLOCK"),
    SymbolSpec::config_flag("lockdep_sys_exit_thunk", "CONFIG_DEBUG_LOCK_ALLOC"),
    SymbolSpec::config_flag("lock_contended", "CONFIG_LOCK_STAT"),
    SymbolSpec::config_flag("mutex_spin_on_owner", "CONFIG_MUTEX_SPIN_ON_OWNER"),
    SymbolSpec::config_flag("mutex_destroy", "CONFIG_DEBUG_MUTEXES"),
    SymbolSpec::offset("startup_xen"),
    SymbolSpec::offset("kernfs_pr_cont_buf"),
    SymbolSpec::offset("clk_change_rate"),
    SymbolSpec::offset("find_task_by_vpid"),
    SymbolSpec::offset("get_task_cred"),
    SymbolSpec::offset("memcpy"),
];

/// `target - reference`, wrapping around when the target lies below the
/// reference.
pub fn offset(target: &KernelSymbol, reference: &KernelSymbol) -> u64 {
    target.address().wrapping_sub(reference.address())
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolvedOffsets {
    offsets: Vec<(String, Option<u64>)>,
}

impl ResolvedOffsets {
    /// `None` if `name` was not requested or could not be resolved.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.offsets
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, offset)| *offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<u64>)> {
        self.offsets
            .iter()
            .map(|(name, offset)| (name.as_str(), *offset))
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, offset)| offset.is_none())
            .map(|(name, _)| name)
    }
}

/// Offsets of `names` relative to `reference`. Every offset is absent when
/// the reference itself is missing.
pub fn resolve_offsets<'a, I>(
    table: &KernelSymbolTable,
    reference: &str,
    names: I,
) -> ResolvedOffsets
where
    I: IntoIterator<Item = &'a str>,
{
    let reference = table.find(reference);
    let offsets = names
        .into_iter()
        .map(|name| {
            let delta = match (table.find(name), reference) {
                (Some(target), Some(reference)) => Some(offset(target, reference)),
                _ => None,
            };
            (name.to_string(), delta)
        })
        .collect();
    ResolvedOffsets { offsets }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ConfigFlag {
    pub symbol: &'static str,
    pub config: &'static str,
    pub enabled: bool,
}

#[derive(Clone, Debug)]
pub struct Resolution {
    reference: KernelSymbol,
    offsets: ResolvedOffsets,
    flags: Vec<ConfigFlag>,
}

impl Resolution {
    /// Looks up every symbol in `specs`. Fails on the first missing required
    /// symbol, checking the reference before the offsets.
    pub fn resolve(table: &KernelSymbolTable, specs: &[SymbolSpec]) -> Result<Self> {
        let reference_name = specs
            .iter()
            .find(|spec| spec.role == SymbolRole::Reference)
            .map(|spec| spec.name)
            .unwrap_or(REFERENCE_SYMBOL);
        let reference = table
            .find(reference_name)
            .ok_or_else(|| Error::SymbolNotFound(reference_name.to_string()))?;
        log::debug!("reference {}", reference);
        if reference.address() == 0 {
            log::warn!(
                "`{}` is at address zero, kernel addresses are probably hidden (kptr_restrict)",
                reference_name
            );
        }

        let mut offsets = Vec::new();
        let mut flags = Vec::new();
        for spec in specs {
            match spec.role {
                SymbolRole::Reference => {}
                SymbolRole::Offset => {
                    let ksym = table
                        .find(spec.name)
                        .ok_or_else(|| Error::SymbolNotFound(spec.name.to_string()))?;
                    log::debug!("resolved {}", ksym);
                    offsets.push((spec.name.to_string(), Some(offset(ksym, reference))));
                }
                SymbolRole::ConfigFlag(config) => {
                    let ksym = table.find(spec.name);
                    if ksym.is_none() {
                        log::info!("`{}` not found, assuming {} is unset", spec.name, config);
                    }
                    flags.push(ConfigFlag {
                        symbol: spec.name,
                        config,
                        enabled: ksym.is_some(),
                    });
                }
            }
        }

        Ok(Self {
            reference: reference.clone(),
            offsets: ResolvedOffsets { offsets },
            flags,
        })
    }

    pub fn reference(&self) -> &KernelSymbol {
        &self.reference
    }

    pub fn offsets(&self) -> &ResolvedOffsets {
        &self.offsets
    }

    pub fn flags(&self) -> &[ConfigFlag] {
        &self.flags
    }

    pub fn flag(&self, config: &str) -> Option<bool> {
        self.flags
            .iter()
            .find(|flag| flag.config == config)
            .map(|flag| flag.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const XEN: &str = "ffffffff81000000 T _text\nffffffff81400000 T startup_xen\n";

    const FULL: &str = "\
ffffffff81000000 T _text
ffffffff81400000 T startup_xen
ffffffff82a1c2e0 b kernfs_pr_cont_buf
ffffffff81a52c40 t clk_change_rate
ffffffff810c4f10 T find_task_by_vpid
ffffffff810cb6c0 T get_task_cred
ffffffff81e2d3a0 T memcpy
ffffffff810f7c50 T lock_contended
ffffffff810e9a60 T mutex_spin_on_owner
ffffffffc0000000 t rwlock_init\t[fake]
";

    fn table(src: &str) -> KernelSymbolTable {
        KernelSymbolTable::from_reader(Cursor::new(src)).unwrap()
    }

    #[test]
    fn test_startup_xen_offset() {
        let table = table(XEN);
        let offsets = resolve_offsets(&table, "_text", vec!["startup_xen"]);
        assert_eq!(offsets.get("startup_xen"), Some(0x400000));
    }

    #[test]
    fn test_reference_offset_is_zero() {
        let table = table(XEN);
        let text = table.find("_text").unwrap();
        assert_eq!(offset(text, text), 0);
    }

    #[test]
    fn test_offset_wraps() {
        let table = table("ffffffff81000000 T _text\nffffffff80fffff0 T below\n");
        let offsets = resolve_offsets(&table, "_text", vec!["below"]);
        assert_eq!(offsets.get("below"), Some(0xffff_ffff_ffff_fff0));
        assert_eq!(offsets.get("below"), Some(0u64.wrapping_sub(0x10)));
    }

    #[test]
    fn test_absent_offsets() {
        let table = table(XEN);
        let offsets = resolve_offsets(&table, "_text", vec!["startup_xen", "memcpy"]);
        assert_eq!(offsets.get("memcpy"), None);
        assert_eq!(offsets.missing().collect::<Vec<_>>(), ["memcpy"]);

        let offsets = resolve_offsets(&table, "_stext", vec!["startup_xen"]);
        assert_eq!(offsets.get("startup_xen"), None);
    }

    #[test]
    fn test_resolve_kernel_symbols() {
        let table = table(FULL);
        let res = Resolution::resolve(&table, KERNEL_SYMBOLS).unwrap();
        assert_eq!(res.reference().address(), 0xffff_ffff_8100_0000);
        let offsets: Vec<_> = res.offsets().iter().collect();
        assert_eq!(
            offsets,
            [
                ("startup_xen", Some(0x400000)),
                ("kernfs_pr_cont_buf", Some(0x1a1c2e0)),
                ("clk_change_rate", Some(0xa52c40)),
                ("find_task_by_vpid", Some(0xc4f10)),
                ("get_task_cred", Some(0xcb6c0)),
                ("memcpy", Some(0xe2d3a0)),
            ]
        );
        let flags: Vec<_> = res.flags().iter().map(|flag| flag.enabled).collect();
        assert_eq!(flags, [false, false, true, true, false]);
        assert_eq!(res.flag("CONFIG_DEBUG_SPINLOCK"), Some(false));
        assert_eq!(res.flag("CONFIG_LOCK_STAT"), Some(true));
        assert_eq!(res.flag("CONFIG_KASAN"), None);
    }

    #[test]
    fn test_missing_required_symbol() {
        let table = table("ffffffff81000000 T _text\n");
        match Resolution::resolve(&table, KERNEL_SYMBOLS) {
            Err(Error::SymbolNotFound(name)) => assert_eq!(name, "startup_xen"),
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_missing_reference_reported_first() {
        let table = table("ffffffff81400000 T startup_xen\n");
        match Resolution::resolve(&table, KERNEL_SYMBOLS) {
            Err(Error::SymbolNotFound(name)) => assert_eq!(name, "_text"),
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_each_required_symbol_checked() {
        let src = FULL.replace("clk_change_rate", "clk_set_rate");
        match Resolution::resolve(&table(&src), KERNEL_SYMBOLS) {
            Err(Error::SymbolNotFound(name)) => assert_eq!(name, "clk_change_rate"),
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_optional_symbol_absent() {
        let table = table(XEN);
        let specs = [
            SymbolSpec::reference("_text"),
            SymbolSpec::offset("startup_xen"),
            SymbolSpec::config_flag("rwlock_init", "CONFIG_DEBUG_SPINLOCK"),
        ];
        let res = Resolution::resolve(&table, &specs).unwrap();
        assert_eq!(res.flag("CONFIG_DEBUG_SPINLOCK"), Some(false));
        assert_eq!(res.offsets().get("startup_xen"), Some(0x400000));
    }

    #[test]
    fn test_default_reference() {
        let table = table(XEN);
        let res = Resolution::resolve(&table, &[SymbolSpec::offset("startup_xen")]).unwrap();
        assert_eq!(res.reference().name(), REFERENCE_SYMBOL);
    }

    #[test]
    fn test_required() {
        assert!(KERNEL_SYMBOLS[0].is_required());
        assert_eq!(KERNEL_SYMBOLS.iter().filter(|s| !s.is_required()).count(), 5);
    }
}
