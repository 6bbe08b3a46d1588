use std::io::{Read, Write};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use coinscript_core::coinscript::compile_source;
use coinscript_core::{PuzzleBuilder, SolutionBuilder, SolutionValue};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(
    name = "coinscript",
    about = "Compile CoinScript contracts and ChiaLisp puzzles to CLVM"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value_t = false)]
    pretty: bool,

    #[arg(long, default_value = "-")]
    output: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a .coins contract or .clsp puzzle to ChiaLisp, CLVM hex
    /// and mod hash
    Compile {
        /// Input path, or `-` for stdin
        input: String,

        /// Treat the input as ChiaLisp regardless of file extension
        #[arg(long, default_value_t = false)]
        chialisp: bool,
    },
    /// Print only the mod hash of a contract or puzzle
    Modhash {
        input: String,

        #[arg(long, default_value_t = false)]
        chialisp: bool,
    },
    /// Assemble a solution from space-separated values
    Solution {
        /// Values: integers, 0x-hex, or symbols
        values: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let value = match &cli.command {
        Command::Compile { input, chialisp } => {
            let source = read_input(input)?;
            if use_chialisp(input, *chialisp) {
                let puzzle = PuzzleBuilder::from_chialisp(&source)?.build()?;
                json!({
                    "chialisp": puzzle.to_chialisp()?,
                    "clvm_hex": puzzle.to_clvm_hex()?,
                    "mod_hash": puzzle.mod_hash_hex()?,
                })
            } else {
                let output = compile_source(&source)?;
                let mut additional = serde_json::Map::new();
                for (name, puzzle) in &output.additional_puzzles {
                    additional.insert(
                        name.clone(),
                        json!({
                            "clvm_hex": puzzle.to_clvm_hex()?,
                            "mod_hash": puzzle.mod_hash_hex()?,
                        }),
                    );
                }
                json!({
                    "chialisp": output.main_puzzle.to_chialisp()?,
                    "clvm_hex": output.main_puzzle.to_clvm_hex()?,
                    "mod_hash": output.main_puzzle.mod_hash_hex()?,
                    "additional_puzzles": additional,
                    "metadata": output.metadata,
                })
            }
        }
        Command::Modhash { input, chialisp } => {
            let source = read_input(input)?;
            let mod_hash = if use_chialisp(input, *chialisp) {
                PuzzleBuilder::from_chialisp(&source)?.build()?.mod_hash_hex()?
            } else {
                compile_source(&source)?.main_puzzle.mod_hash_hex()?
            };
            json!({ "mod_hash": mod_hash })
        }
        Command::Solution { values } => {
            let mut builder = SolutionBuilder::new();
            for value in values {
                builder.add(parse_value(value));
            }
            json!({
                "chialisp": builder.to_chialisp()?,
                "hex": builder.to_hex()?,
            })
        }
    };

    let serialized = if cli.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    write_output(&cli.output, &serialized)?;
    Ok(())
}

fn use_chialisp(input: &str, forced: bool) -> bool {
    forced || input.ends_with(".clsp") || input.ends_with(".clvm")
}

fn parse_value(text: &str) -> SolutionValue {
    if let Ok(value) = text.parse::<i64>() {
        return SolutionValue::Int(value.into());
    }
    SolutionValue::Text(text.to_string())
}

fn read_input(path_or_stdin: &str) -> Result<String> {
    if path_or_stdin == "-" {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    if !std::path::Path::new(path_or_stdin).exists() {
        bail!("input file not found: {path_or_stdin}");
    }
    Ok(std::fs::read_to_string(path_or_stdin)?)
}

fn write_output(path_or_stdout: &str, data: &str) -> Result<()> {
    if path_or_stdout == "-" {
        let mut stdout = std::io::stdout();
        stdout.write_all(data.as_bytes())?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        return Ok(());
    }
    std::fs::write(path_or_stdout, format!("{data}\n"))?;
    Ok(())
}
