//! Common utilities shared across CLI commands.
//!
//! Inkscape runs an effect as `barnhunt <command> --name=value ... FILE`:
//! values are attached with `=`, booleans are spelled out (`--restart=true`)
//! and the notebook tab the user was on arrives as `--tab=...`. Values given
//! as a separate argument (`--seed 42`) are accepted too, for humans.

use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result, bail};

use barnhunt::Document;

/// Split `--name=value` into `("--name", Some("value"))`.
pub fn split_flag(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((name, value)) if name.starts_with("--") => (name, Some(value)),
        _ => (arg, None),
    }
}

/// The value of a flag: inline after `=`, else the next argument.
pub fn flag_value(args: &[String], i: &mut usize, name: &str, inline: Option<&str>) -> Result<String> {
    if let Some(value) = inline {
        return Ok(value.to_string());
    }
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.clone()),
        None => bail!("{} requires a value", name),
    }
}

/// A boolean flag: bare (`--restart`) means true.
pub fn flag_bool(name: &str, inline: Option<&str>) -> Result<bool> {
    inline.map_or(Ok(true), |value| parse_bool(name, value))
}

/// Inkscape writes `true`/`false`; people write all sorts.
pub fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean for {}: {:?}", name, other),
    }
}

/// Parse a numeric flag value.
pub fn parse_number<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", name, value))
}

/// Set the input path, rejecting a second one.
pub fn set_input(input: &mut Option<String>, arg: &str) -> Result<()> {
    if arg.starts_with("--") {
        bail!("unknown option: {}", arg);
    }
    if let Some(first) = input {
        bail!("more than one input file: {} and {}", first, arg);
    }
    *input = Some(arg.to_string());
    Ok(())
}

/// Read the drawing from a file, or from stdin for `-` or no path.
pub fn read_document(path: Option<&str>) -> Result<Document> {
    let text = match path {
        None | Some("-") => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read SVG from stdin")?;
            text
        }
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?,
    };
    let doc = Document::parse(&text).with_context(|| format!("can not parse {}", path.unwrap_or("stdin")))?;
    Ok(doc)
}

/// Write the modified drawing to stdout.
pub fn write_document(doc: &Document) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(doc.to_xml_string().as_bytes())
        .and_then(|_| stdout.flush())
        .context("failed to write SVG to stdout")
}

/// Log to stderr only; stdout carries the document.
///
/// Messages are written bare, the way Inkscape shows extension output to
/// the user. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_ansi(false);
    // A second init (tests calling main twice) is harmless.
    let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_inline_values() {
        assert_eq!(split_flag("--id=rat1"), ("--id", Some("rat1")));
        assert_eq!(split_flag("--tab=\"main\""), ("--tab", Some("\"main\"")));
        assert_eq!(split_flag("--restart"), ("--restart", None));
        assert_eq!(split_flag("file=odd.svg"), ("file=odd.svg", None));
    }

    #[test]
    fn takes_separate_values() {
        let args = strings(&["--seed", "42", "in.svg"]);
        let mut i = 0;
        assert_eq!(flag_value(&args, &mut i, "--seed", None).unwrap(), "42");
        assert_eq!(i, 1);

        let args = strings(&["--seed"]);
        let mut i = 0;
        assert!(flag_value(&args, &mut i, "--seed", None).is_err());
    }

    #[test]
    fn booleans() {
        assert!(parse_bool("--restart", "True").unwrap());
        assert!(parse_bool("--restart", "1").unwrap());
        assert!(!parse_bool("--restart", "no").unwrap());
        assert!(parse_bool("--restart", "maybe").is_err());
        assert!(flag_bool("--restart", None).unwrap());
    }

    #[test]
    fn single_input() {
        let mut input = None;
        set_input(&mut input, "a.svg").unwrap();
        assert!(set_input(&mut input, "b.svg").is_err());
        assert!(set_input(&mut None, "--bogus").is_err());
        assert_eq!(parse_number::<u64>("--seed", " 7 ").unwrap(), 7);
        assert!(parse_number::<f64>("--dpi", "lots").is_err());
    }
}
