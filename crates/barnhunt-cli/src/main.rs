//! barnhunt - Inkscape extensions for Barn Hunt course design
//!
//! Usage:
//!   barnhunt hide-rats --id=ID... [options] [FILE]   Randomize rat positions
//!   barnhunt count-symbols [options] [FILE]          Tally symbol usage
//!   barnhunt update-symbols [options] [FILE]         Refresh symbol definitions
//!   barnhunt random-seed [FILE]                      Set bh:random-seed
//!   barnhunt create-inset --id=ID [options] [FILE]   Embed a PNG inset
//!
//! FILE defaults to stdin. Effects that change the drawing write it to
//! stdout; messages go to stderr.

mod cli;

use std::env;

use cli::{cmd_count_symbols, cmd_create_inset, cmd_hide_rats, cmd_random_seed, cmd_update_symbols};

fn main() {
    let mut args: Vec<String> = env::args().collect();
    cli::common::init_logging();

    // Inkscape can't pass a bare subcommand, so the .inx files send it as
    // a hidden `--effect=<command>` parameter.
    if let Some(pos) = args.iter().position(|a| a.starts_with("--effect=")) {
        let effect = args.remove(pos);
        let command = effect.trim_start_matches("--effect=").to_string();
        args.insert(1, command);
    }

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "hide-rats" => cmd_hide_rats(&args[2..]),
        "count-symbols" => cmd_count_symbols(&args[2..]),
        "update-symbols" => cmd_update_symbols(&args[2..]),
        "random-seed" => cmd_random_seed(&args[2..]),
        "create-inset" => cmd_create_inset(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            return;
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    eprintln!("barnhunt - Inkscape extensions for Barn Hunt course design");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {} hide-rats --id=ID [--id=ID ...] [options] [FILE]", prog);
    eprintln!("  {} count-symbols [--include-hidden=BOOL] [--format text|json] [FILE]", prog);
    eprintln!("  {} update-symbols [--symbol-set NAME] [--data-path DIR ...] [FILE]", prog);
    eprintln!("  {} random-seed [FILE]", prog);
    eprintln!("  {} create-inset --id=ID [options] [FILE]", prog);
    eprintln!("  {} <command> --help", prog);
    eprintln!();
    eprintln!("Hide-rats options:");
    eprintln!("  --restart=BOOL         Clear rat exclusions from earlier runs");
    eprintln!("  --newblind=BOOL        Copy the rat layer into a new blind first");
    eprintln!("  --seed <n>             Seed for reproducible placement");
    eprintln!();
    eprintln!("Stdin support:");
    eprintln!("  Omit FILE or use '-' to read the drawing from stdin:");
    eprintln!("  {} hide-rats --id=rat1 < course.svg > hidden.svg", prog);
    eprintln!();
    eprintln!("Logging:");
    eprintln!("  RUST_LOG=debug        Show placement details");
}
