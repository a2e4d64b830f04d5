//! Tally CLI

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tally::error::report_error;
use tally::sheet::{Line, LineKind, default_export_name, normalize_decimal_comma, render_text, write_export};
use tally::{Settings, Sheet};

#[derive(Parser)]
#[command(name = "tally", version, about = "Tally - a notepad calculator with running totals")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive calculator (the default)
    Repl,
    /// Evaluate a sheet file and print the rendered results
    Eval {
        /// Sheet file to evaluate
        file: PathBuf,
        /// Emit line view records as JSON instead of rendered text
        #[arg(long)]
        json: bool,
    },
    /// Re-evaluate a sheet file whenever it changes
    Watch {
        /// Sheet file to watch
        file: PathBuf,
    },
    /// Evaluate a sheet file and write the rendered results to a file
    Export {
        /// Sheet file to evaluate
        file: PathBuf,
        /// Output file (default: tally-<timestamp>.txt)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Tokenize each expression line and dump tokens (debug)
    Tokens {
        /// Sheet file to tokenize
        file: PathBuf,
    },
    /// Parse each expression line and dump ASTs as JSON (debug)
    Parse {
        /// Sheet file to parse
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => run_repl(),
        Command::Eval { file, json } => eval_file(&file, json),
        Command::Watch { file } => watch_file(&file),
        Command::Export { file, out } => export_file(&file, out),
        Command::Tokens { file } => tokenize_file(&file),
        Command::Parse { file } => parse_file(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_repl() -> Result<(), Box<dyn std::error::Error>> {
    let mut repl = tally::repl::Repl::new()?;
    repl.run()?;
    Ok(())
}

/// Evaluate a file as one batch pass; nothing counts as "being edited"
fn batch_lines(path: &PathBuf) -> Result<Vec<Line>, Box<dyn std::error::Error>> {
    let source = fs::read_to_string(path)?;
    let mut sheet = Sheet::from_text(source);
    sheet.recompute();
    let mut lines = sheet.lines().to_vec();
    for line in &mut lines {
        line.selected = false;
    }
    Ok(lines)
}

fn eval_file(path: &PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load();
    let lines = batch_lines(path)?;

    if json {
        let views = tally::sheet::views(&lines, &settings);
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        print!("{}", render_text(&lines, &settings));
    }
    Ok(())
}

fn watch_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load();
    tally::watch::watch_file(path, &settings)?;
    Ok(())
}

fn export_file(path: &PathBuf, out: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load();
    let lines = batch_lines(path)?;
    let out = out.unwrap_or_else(|| PathBuf::from(default_export_name()));
    write_export(&out, &lines, &settings)?;
    println!("Exported to {}", out.display());
    Ok(())
}

fn tokenize_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(path)?;
    let filename = path.display().to_string();

    for (index, text) in source.lines().enumerate() {
        let line = Line::new(index, text.to_string(), 0);
        if line.kind != LineKind::Expression {
            continue;
        }
        let normalized = normalize_decimal_comma(text);
        match tally::lexer::tokenize(&normalized) {
            Ok(tokens) => {
                println!("line {}:", index + 1);
                for (token, span) in &tokens {
                    println!("  {:?} @ {}", token, span);
                }
            }
            Err(err) => report_error(&filename, &normalized, &err),
        }
    }
    Ok(())
}

fn parse_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(path)?;
    let filename = path.display().to_string();

    for (index, text) in source.lines().enumerate() {
        let line = Line::new(index, text.to_string(), 0);
        if line.kind != LineKind::Expression {
            continue;
        }
        let normalized = normalize_decimal_comma(text);
        match tally::lexer::tokenize(&normalized).and_then(tally::parser::parse) {
            Ok(ast) => {
                println!("line {}:", index + 1);
                println!("{}", serde_json::to_string_pretty(&ast)?);
            }
            Err(err) => report_error(&filename, &normalized, &err),
        }
    }
    Ok(())
}
