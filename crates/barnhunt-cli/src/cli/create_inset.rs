//! Create-inset command implementation.

use anyhow::{Result, anyhow};

use barnhunt::inset::{InsetOptions, create_inset, rasterizer};
use barnhunt::{Namespaces, Renderer};

use super::common::{flag_bool, flag_value, parse_number, read_document, set_input, split_flag, write_document};

/// Execute the create-inset command.
pub fn cmd_create_inset(args: &[String]) -> Result<()> {
    let mut input: Option<String> = None;
    let mut ids: Vec<String> = Vec::new();
    let mut options = InsetOptions::default();

    let mut i = 0;
    while i < args.len() {
        let (name, inline) = split_flag(&args[i]);
        match name {
            "--id" => ids.push(flag_value(args, &mut i, name, inline)?),
            "--scale" => options.scale = parse_number(name, &flag_value(args, &mut i, name, inline)?)?,
            "--dpi" => options.dpi = parse_number(name, &flag_value(args, &mut i, name, inline)?)?,
            "--background" => options.background = flag_value(args, &mut i, name, inline)?,
            "--optipng-level" => {
                options.optipng_level = parse_number(name, &flag_value(args, &mut i, name, inline)?)?
            }
            "--verbose" => options.verbose = flag_bool(name, inline)?,
            "--renderer" => {
                options.renderer = flag_value(args, &mut i, name, inline)?
                    .parse::<Renderer>()
                    .map_err(|e| anyhow!(e))?;
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
    let mut selection = Vec::with_capacity(ids.len());
    for id in &ids {
        let node = doc
            .elements_by_id(id)
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Selected element #{} not found in document", id))?;
        selection.push(node);
    }
    let renderer = rasterizer(options.renderer);
    create_inset(&mut doc, &ns, &selection, &options, renderer.as_ref())?;
    write_document(&doc)
}

/// Print usage information.
pub fn print_usage() {
    eprintln!("barnhunt create-inset - Embed a PNG snapshot of the selection");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    barnhunt create-inset --id=ID [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    --scale <n>            Inset size relative to the original (default: 0.5)");
    eprintln!("    --dpi <n>              Resolution of the embedded PNG (default: 144)");
    eprintln!("    --background <color>   Background color (default: #ffffff)");
    eprintln!("    --optipng-level <n>    optipng -o level, -1 to skip (default: 2)");
    eprintln!("    --verbose=<bool>       Show rasterizer output");
    eprintln!("    --renderer <name>      inkscape or resvg (default: inkscape)");
}
