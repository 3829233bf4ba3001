//! Mini compiler CLI
//!
//! Usage: minic <input.mini> [-o output.ll]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;

use minic::error::CompileError;

#[derive(ClapParser)]
#[command(name = "minic")]
#[command(version = "0.1.0")]
#[command(about = "Mini language compiler", long_about = None)]
struct Cli {
    /// Input Mini source file
    input: PathBuf,

    /// Output IR file (default: input with an .ll extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", cli.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match minic::compile(&source) {
        Ok(ir) => {
            let output = cli.output.unwrap_or_else(|| cli.input.with_extension("ll"));
            if let Err(e) = fs::write(&output, ir) {
                eprintln!("Error writing {}: {}", output.display(), e);
                return ExitCode::FAILURE;
            }
            println!("Compiled.");
            ExitCode::SUCCESS
        }
        Err(CompileError::Semantic { errors }) => {
            for error in &errors {
                eprintln!("{}", error);
            }
            println!("Not compiled.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            println!("Not compiled.");
            ExitCode::FAILURE
        }
    }
}
