use a64_compiler::frontend::lexer;
use a64_compiler::{compile_to_asm, CompileError, Compilation};
use anyhow::{bail, Context};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(name = "a64c")]
#[command(about = "A compiler targeting AArch64 Mach-O")]
struct Args {
    /// Path to the source file to compile
    file: PathBuf,

    /// Dump the token stream and exit
    #[arg(long)]
    tokens: bool,

    /// Print the generated assembly to stdout and exit
    #[arg(long)]
    asm: bool,

    /// Path for the generated assembly file
    #[arg(short, long, default_value = "out.s")]
    output: PathBuf,

    /// Write the assembly but skip assembling, linking and running
    #[arg(long)]
    no_run: bool,
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> anyhow::Result<i32> {
    let src = fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    if args.tokens {
        for token in lexer::tokenize(&src)? {
            println!("{}:{}\t{:?}\t{}", token.line, token.col, token.kind, token.text);
        }
        return Ok(0);
    }

    let Compilation { asm, diagnostics } = match compile_to_asm(&src) {
        Ok(compilation) => compilation,
        Err(CompileError::Lexical(e)) => {
            eprintln!("{e}");
            if !e.context.is_empty() {
                eprintln!("  --> {}", e.context);
            }
            return Ok(1);
        }
    };

    if !diagnostics.is_empty() {
        for diagnostic in &diagnostics {
            eprintln!("{diagnostic}");
        }
        return Ok(1);
    }

    if args.asm {
        print!("{asm}");
        return Ok(0);
    }

    fs::write(&args.output, &asm)
        .with_context(|| format!("writing {}", args.output.display()))?;
    if args.no_run {
        return Ok(0);
    }

    println!("Generated Assembly Code:\n{asm}");
    assemble_and_link(&args.output)?;
    let status = Command::new("./out_exec")
        .status()
        .context("running out_exec")?;
    Ok(status.code().unwrap_or(1))
}

fn assemble_and_link(asm_path: &Path) -> anyhow::Result<()> {
    let status = Command::new("as")
        .args(["-o", "out.o"])
        .arg(asm_path)
        .status()
        .context("running as")?;
    if !status.success() {
        bail!("as failed");
    }

    let sdk = String::from_utf8(
        Command::new("xcrun")
            .args(["--show-sdk-path"])
            .output()
            .context("running xcrun")?
            .stdout,
    )?
    .trim()
    .to_string();

    let status = Command::new("ld")
        .args([
            "-arch",
            "arm64",
            "-o",
            "out_exec",
            "out.o",
            "-lSystem",
            "-syslibroot",
            &sdk,
            "-e",
            "_main",
        ])
        .status()
        .context("running ld")?;
    if !status.success() {
        bail!("ld failed");
    }
    Ok(())
}
