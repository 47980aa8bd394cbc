use std::{fs, path::PathBuf, process::ExitCode};

use clap::Parser;
use procc::{
    driver::{self, CompileError, Options},
    scanner::{Scanner, DEFAULT_TAB_WIDTH},
    token::Token,
    util::BreakableIteratorExt,
};

#[derive(Parser)]
#[command(name = "procc", version)]
#[command(about = "Compiles a program into LLVM IR")]
struct Args {
    /// Path to the source file to compile
    input: PathBuf,

    /// Where to write the IR (defaults to the input path with an `.ll`
    /// extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of columns a tab advances in reported positions
    #[arg(long, default_value_t = DEFAULT_TAB_WIDTH)]
    tab_width: u32,

    /// Print the token stream and exit
    #[arg(long)]
    tokens: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.tokens {
        return print_tokens(&args);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("ll"));
    let options = Options {
        tab_width: args.tab_width,
        module_name: None,
    };
    match driver::compile_file(&args.input, &output, &options) {
        Ok(compilation) => {
            for diagnostic in &compilation.diagnostics {
                eprintln!("{diagnostic}");
            }
            ExitCode::SUCCESS
        }
        Err(CompileError::Failed(compilation)) => {
            for diagnostic in &compilation.diagnostics {
                eprintln!("{diagnostic}");
            }
            eprintln!("{}", CompileError::Failed(compilation));
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn print_tokens(args: &Args) -> ExitCode {
    let src = match fs::read_to_string(&args.input) {
        Ok(src) => src,
        Err(error) => {
            eprintln!("failed to read {}: {error}", args.input.display());
            return ExitCode::FAILURE;
        }
    };
    let scanner = Scanner::new(&src).with_tab_width(args.tab_width);
    for token in scanner.up_to(Token::is_eof) {
        println!("{} {:?} {:?}", token.pos, token.kind, token.span().substr(&src));
    }
    ExitCode::SUCCESS
}
