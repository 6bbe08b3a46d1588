use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use coinscript_core::clvm::{compile_chialisp, ClvmProgram, DEFAULT_MAX_COST};
use coinscript_core::hash::tree_hash_hex;
use coinscript_core::parse::parse;
use coinscript_core::serialize::{serialize, SerializeOptions};

#[derive(Debug, Parser)]
#[command(
    name = "chialisp-workbench",
    about = "Parse, hash, curry and run ChiaLisp programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse ChiaLisp and echo it back, optionally pretty-printed
    Parse {
        input: String,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Compile ChiaLisp source (with include expansion) to hex
    Compile {
        input: String,
    },
    /// Decode CLVM hex to readable form
    Disassemble {
        input: String,
    },
    /// Tree-hash ChiaLisp source or CLVM hex
    Treehash {
        input: String,
    },
    /// Curry constant arguments onto a program
    Curry {
        program: String,
        args: Vec<String>,
    },
    /// Run a program against a solution
    Run {
        #[arg(long)]
        program: String,
        #[arg(long, default_value = "()")]
        solution: String,
        #[arg(long, default_value_t = false)]
        cost: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Parse { input, pretty } => {
            let node = parse(&input)?;
            let options = SerializeOptions {
                indent: pretty,
                ..SerializeOptions::default()
            };
            println!("{}", serialize(&node, &options)?);
        }
        Command::Compile { input } => {
            let program = compile_chialisp(&input)?;
            println!("0x{}", program.to_hex());
        }
        Command::Disassemble { input } => {
            let program = ClvmProgram::from_hex(&input)?;
            println!("{}", program.disassemble()?);
        }
        Command::Treehash { input } => {
            if looks_like_hex(&input) {
                let program = ClvmProgram::from_hex(&input)?;
                println!("{}", program.tree_hash_hex()?);
            } else {
                let node = parse(&input)?;
                println!("{}", tree_hash_hex(&node));
            }
        }
        Command::Curry { program, args } => {
            let program = load_program(&program)?;
            let args = args
                .iter()
                .map(|arg| parse(arg))
                .collect::<coinscript_core::Result<Vec<_>>>()?;
            let curried = program.curry(&args)?;
            println!("0x{}", curried.to_hex());
        }
        Command::Run {
            program,
            solution,
            cost,
        } => {
            let program = load_program(&program)?;
            let env = parse(&solution)?;
            let (result, run_cost) = program.run(&env, DEFAULT_MAX_COST)?;
            println!("{}", serialize(&result, &SerializeOptions::default())?);
            if cost {
                println!("cost: {run_cost}");
            }
        }
    }
    Ok(())
}

fn load_program(input: &str) -> Result<ClvmProgram> {
    if looks_like_hex(input) {
        return Ok(ClvmProgram::from_hex(input)?);
    }
    if input.trim_start().starts_with("(mod") {
        return Ok(compile_chialisp(input)?);
    }
    ClvmProgram::assemble(input).map_err(|e| anyhow!("{e}"))
}

fn looks_like_hex(input: &str) -> bool {
    let raw = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    !raw.is_empty() && raw.len() % 2 == 0 && raw.bytes().all(|b| b.is_ascii_hexdigit())
}
