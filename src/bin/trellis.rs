//! Command-line interface for trellis.
//! Compiles a grammar file (YAML or JSON) and either dumps the compiled
//! model or runs input text through it.
//!
//! Usage:
//!   trellis inspect `<grammar>`              - Print the compiled grammar outline
//!   trellis parse `<grammar>` `<input>`        - Parse a text file, print results as JSON
//!   trellis parse `<grammar>` --text `<text>`  - Parse a literal string instead of a file

use clap::{Arg, ArgAction, Command};
use std::process;

use trellis::engine::config::Loader;
use trellis::{GrammarSource, Parser, Results};

fn main() {
    let matches = Command::new("trellis")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Incremental grammar matching over character input")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("Configuration file layered over the built-in defaults")
                .global(true),
        )
        .subcommand(
            Command::new("inspect")
                .about("Compile a grammar and print its outline")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar file (YAML or JSON)")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse input text and print the results as JSON")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar file (YAML or JSON)")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("input")
                        .help("Path to the input text file")
                        .index(2),
                )
                .arg(
                    Arg::new("text")
                        .long("text")
                        .help("Parse this literal string instead of a file"),
                )
                .arg(
                    Arg::new("lenient")
                        .long("lenient")
                        .help("Keep parsing after reported errors")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    let config = load_config(matches.get_one::<String>("config"));

    match matches.subcommand() {
        Some(("inspect", sub)) => {
            let grammar = sub.get_one::<String>("grammar").expect("required arg");
            let parser = open_session(grammar, config);
            print!("{}", parser.aggregation().outline());
        }
        Some(("parse", sub)) => {
            let grammar = sub.get_one::<String>("grammar").expect("required arg");
            let lenient = sub.get_flag("lenient");
            let text = match (sub.get_one::<String>("text"), sub.get_one::<String>("input")) {
                (Some(text), _) => text.clone(),
                (None, Some(path)) => read_or_exit(path),
                (None, None) => {
                    eprintln!("Error: provide an input file or --text");
                    process::exit(2);
                }
            };
            let mut parser = open_session(grammar, config);
            parser.set_report_handler(Box::new(move |report| {
                eprintln!("{}", report);
                lenient
            }));
            let results = parser.parse_str(&text);
            print_results(&results);
        }
        _ => unreachable!(),
    }
}

fn load_config(path: Option<&String>) -> trellis::EngineConfig {
    let loader = match path {
        Some(path) => Loader::new().with_file(path),
        None => Loader::new(),
    };
    loader.build().unwrap_or_else(|e| {
        eprintln!("Error: invalid configuration: {}", e);
        process::exit(2);
    })
}

fn open_session(grammar_path: &str, config: trellis::EngineConfig) -> Parser {
    let raw = read_or_exit(grammar_path);
    // YAML is a superset of JSON, so one deserializer covers both
    let source: GrammarSource = serde_yaml::from_str(&raw).unwrap_or_else(|e| {
        eprintln!("Error: cannot read grammar {}: {}", grammar_path, e);
        process::exit(2);
    });
    Parser::from_source(source.name, source.definitions, config).unwrap_or_else(|e| {
        eprintln!("Error: grammar rejected: {}", e);
        process::exit(1);
    })
}

fn read_or_exit(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error: cannot read {}: {}", path, e);
        process::exit(2);
    })
}

fn print_results(results: &[Results]) {
    let json = serde_json::to_string_pretty(results).unwrap_or_else(|e| {
        eprintln!("Error: cannot serialize results: {}", e);
        process::exit(1);
    });
    println!("{}", json);
}
