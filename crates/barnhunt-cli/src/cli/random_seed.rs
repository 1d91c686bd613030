//! Random-seed command implementation.

use anyhow::Result;

use barnhunt::{Namespaces, set_random_seed};

use super::common::{read_document, set_input, split_flag, write_document};

/// Execute the random-seed command.
///
/// A drawing that already has a seed is not written back.
pub fn cmd_random_seed(args: &[String]) -> Result<()> {
    let mut input: Option<String> = None;

    for arg in args {
        match split_flag(arg).0 {
            "--tab" => {}
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            _ => set_input(&mut input, arg)?,
        }
    }

    let mut doc = read_document(input.as_deref())?;
    let mut rng = rand::rng();
    if set_random_seed(&mut doc, &Namespaces::default(), &mut rng).is_some() {
        write_document(&doc)?;
    }
    Ok(())
}

/// Print usage information.
pub fn print_usage() {
    eprintln!("barnhunt random-seed - Give the drawing a random seed");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    barnhunt random-seed [FILE]");
}
