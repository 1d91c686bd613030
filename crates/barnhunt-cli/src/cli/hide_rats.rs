//! Hide-rats command implementation.

use anyhow::Result;
use tracing::debug;

use barnhunt::hide_rats::{self, HideRatsOptions};
use barnhunt::{Namespaces, select_by_ids};

use super::common::{flag_bool, flag_value, parse_number, read_document, set_input, split_flag, write_document};

/// Execute the hide-rats command.
pub fn cmd_hide_rats(args: &[String]) -> Result<()> {
    let mut input: Option<String> = None;
    let mut ids: Vec<String> = Vec::new();
    let mut options = HideRatsOptions::default();

    let mut i = 0;
    while i < args.len() {
        let (name, inline) = split_flag(&args[i]);
        match name {
            "--id" => ids.push(flag_value(args, &mut i, name, inline)?),
            "--restart" => options.restart = flag_bool(name, inline)?,
            "--newblind" | "--new-blind" => options.new_blind = flag_bool(name, inline)?,
            "--seed" => {
                let value = flag_value(args, &mut i, name, inline)?;
                options.seed = Some(parse_number(name, &value)?);
            }
            "--max-tries" => {
                let value = flag_value(args, &mut i, name, inline)?;
                options.max_tries = parse_number(name, &value)?;
            }
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
    let selection = select_by_ids(&doc, &ids)?;
    let report = hide_rats::run(&mut doc, &ns, &selection, &options)?;
    debug!("placed {} of {} rats", report.placements.len(), selection.len());
    write_document(&doc)
}

/// Print usage information.
pub fn print_usage() {
    eprintln!("barnhunt hide-rats - Randomize rat positions");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    barnhunt hide-rats --id=ID [--id=ID ...] [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    --id <id>              Selected rat (repeatable)");
    eprintln!("    --restart=<bool>       Clear rat exclusions from earlier runs");
    eprintln!("    --newblind=<bool>      Copy the rat layer into a new blind first");
    eprintln!("    --seed <n>             Seed for reproducible placement");
    eprintln!("    --max-tries <n>        Attempts per rat (default: 128)");
}
