use anyhow::Result;
use clap::Parser;
use ksym_utils::record::DEFAULT_DISTRO;
use ksym_utils::{KernelSymbolTable, OffsetRecord, Resolution, KALLSYMS_PATH, KERNEL_SYMBOLS};
use std::path::PathBuf;

/// Print the offsets of well known kernel symbols relative to `_text`.
#[derive(Parser)]
#[clap(version, about)]
struct Args {
    /// Kernel symbol table to read.
    #[clap(long, default_value = KALLSYMS_PATH)]
    kallsyms: PathBuf,
    /// Name placed in the first field of the record.
    #[clap(long, default_value = DEFAULT_DISTRO)]
    distro: String,
    /// Kernel release to report instead of querying `uname`.
    #[clap(long)]
    release: Option<String>,
    /// Don't re-run through sudo when not root.
    #[clap(long)]
    no_sudo: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.no_sudo {
        log::debug!("not escalating privileges");
    } else {
        sudo::escalate_if_needed().map_err(|err| anyhow::anyhow!("{}", err))?;
    }

    let table = KernelSymbolTable::load_path(&args.kallsyms)?;
    let resolution = Resolution::resolve(&table, KERNEL_SYMBOLS)?;
    drop(table);

    let release = match args.release {
        Some(release) => release,
        None => ksym_utils::uname::kernel_release()?,
    };
    log::debug!("kernel release {}", release);
    let record = OffsetRecord::new(&args.distro, &release, &resolution)?;
    println!("{}", record);
    Ok(())
}
