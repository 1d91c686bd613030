//! Count-symbols command implementation.

use anyhow::{Result, bail};

use barnhunt::{CountSymbolsOptions, Namespaces, count_symbols};

use super::common::{flag_bool, flag_value, read_document, set_input, split_flag};

/// Output format for the tally.
#[derive(Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Execute the count-symbols command.
///
/// The tally goes to stderr, where Inkscape shows it to the user; the
/// drawing itself is left alone.
pub fn cmd_count_symbols(args: &[String]) -> Result<()> {
    let mut input: Option<String> = None;
    let mut options = CountSymbolsOptions::default();
    let mut format = OutputFormat::Text;

    let mut i = 0;
    while i < args.len() {
        let (name, inline) = split_flag(&args[i]);
        match name {
            "--include-hidden" => options.include_hidden = flag_bool(name, inline)?,
            "-f" | "--format" => {
                format = match flag_value(args, &mut i, name, inline)?.to_lowercase().as_str() {
                    "text" => OutputFormat::Text,
                    "json" => OutputFormat::Json,
                    other => bail!("Unknown format: {}. Use 'text' or 'json'.", other),
                };
            }
            "--json" => format = OutputFormat::Json,
            "--tab" => {}
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            _ => set_input(&mut input, &args[i])?,
        }
        i += 1;
    }

    let doc = read_document(input.as_deref())?;
    let counts = count_symbols(&doc, &Namespaces::default(), &options);
    match format {
        OutputFormat::Text => eprint!("{}", counts.to_text()),
        OutputFormat::Json => eprintln!("{}", serde_json::to_string_pretty(&counts)?),
    }
    Ok(())
}

/// Print usage information.
pub fn print_usage() {
    eprintln!("barnhunt count-symbols - Count symbol usage");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    barnhunt count-symbols [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    --include-hidden=<bool>  Also count symbols in hidden layers");
    eprintln!("    -f, --format <fmt>       Output format: text, json (default: text)");
}
