//! Update-symbols command implementation.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use barnhunt::{Namespaces, UpdateSymbolsOptions, load_symbols, update_symbols};

use super::common::{flag_value, read_document, set_input, split_flag, write_document};

/// Execute the update-symbols command.
pub fn cmd_update_symbols(args: &[String]) -> Result<()> {
    let mut input: Option<String> = None;
    let mut options = UpdateSymbolsOptions::default();

    let mut i = 0;
    while i < args.len() {
        let (name, inline) = split_flag(&args[i]);
        match name {
            "--symbol-set" => options.symbol_set = flag_value(args, &mut i, name, inline)?,
            "--data-path" => options
                .data_paths
                .push(PathBuf::from(flag_value(args, &mut i, name, inline)?)),
            "--tab" => {}
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            _ => set_input(&mut input, &args[i])?,
        }
        i += 1;
    }

    let mut doc = read_document(input.as_deref())?;
    let ns = Namespaces::default();
    let library = load_symbols(&options, &ns)?;
    let updated = update_symbols(&mut doc, &ns, &library);
    if updated.is_empty() {
        info!("No symbols to update");
    }
    write_document(&doc)
}

/// Print usage information.
pub fn print_usage() {
    eprintln!("barnhunt update-symbols - Refresh symbols from the symbol library");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    barnhunt update-symbols [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    --symbol-set <name>    Symbol set to load (default: bh-symbols)");
    eprintln!("    --data-path <dir>      Data directory to search (repeatable;");
    eprintln!("                           default: ask inkscape)");
}
