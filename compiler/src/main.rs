use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, MietteHandlerOpts, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use minic::compiler;
use minic::lexer;
use minic::parser;
use minic::utils::cc::assemble;

#[derive(Parser)]
#[command(
    name = "minic",
    version = "0.1.0",
    about = "minic compiler toolchain"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the token stream for a source file
    #[command(visible_aliases = &["lx"])]
    Lex {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the abstract syntax tree for a source file
    #[command(visible_aliases = &["p"])]
    Parse {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run semantic analysis only
    #[command(visible_aliases = &["ck"])]
    Check { input: PathBuf },
    /// Compile a source file to x86-64 assembly
    #[command(visible_aliases = &["c"])]
    Compile {
        input: PathBuf,
        #[arg(short, long, default_value = "./.build/out.s")]
        output: PathBuf,
        /// Assemble and link the output with the system driver
        #[arg(long)]
        link: bool,
    },
}

fn read_source(input: &Path) -> Result<(String, String)> {
    let src = std::fs::read_to_string(input).into_diagnostic()?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    Ok((name, src))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            MietteHandlerOpts::new()
                .color(true)
                .context_lines(3)
                .build(),
        )
    }))?;

    match cli.cmd {
        Cmd::Lex { input, json } => {
            let (name, src) = read_source(&input)?;
            let tokens = lexer::core::lex(&name, &src)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&tokens).into_diagnostic()?
                );
            } else {
                tokens.into_iter().for_each(|t| println!("{t:?}"));
            }
        }

        Cmd::Parse { input, json } => {
            let (name, src) = read_source(&input)?;
            let tokens = lexer::core::lex(&name, &src)?;
            let ast = parser::core::parse(&name, &src, &tokens)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ast).into_diagnostic()?);
            } else {
                println!("{ast:#?}");
            }
        }

        Cmd::Check { input } => {
            let (name, src) = read_source(&input)?;
            let tokens = lexer::core::lex(&name, &src)?;
            let ast = parser::core::parse(&name, &src, &tokens)?;
            compiler::semantics::check(&ast)?;
            println!("ok");
        }

        Cmd::Compile {
            input,
            output,
            link,
        } => {
            let (name, src) = read_source(&input)?;
            let tokens = lexer::core::lex(&name, &src)?;
            let ast = parser::core::parse(&name, &src, &tokens)?;
            let asm = compiler::core::compile(&ast)?;

            if let Some(parent) = output.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).into_diagnostic()?;
                }
            }
            std::fs::write(&output, asm).into_diagnostic()?;
            info!("wrote {}", output.display());

            if link {
                let mut exe_path = output.clone();
                exe_path.set_extension("");
                match assemble(
                    &output.to_string_lossy(),
                    &exe_path.to_string_lossy(),
                ) {
                    Ok(_) => println!("Compilation successful"),
                    Err(e) => {
                        eprintln!("Assembly failed: {e}");
                        std::process::exit(1);
                    }
                }
            } else {
                println!("Compilation successful");
            }
        }
    }

    Ok(())
}
