pub mod ast;
pub mod backend;
pub mod frontend;

use frontend::parser::{Diagnostic, ParsedProgram};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexical error: {0}")]
    Lexical(#[from] frontend::lexer::LexicalError),
}

/// Output of a full pipeline run: the assembly text plus whatever
/// recoverable problems the parser reported along the way. Callers decide
/// whether diagnostics gate further use of the assembly.
pub struct Compilation {
    pub asm: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn compile_to_ast(source: &str) -> Result<ParsedProgram, CompileError> {
    let tokens = frontend::lexer::tokenize(source)?;
    Ok(frontend::parser::parse(tokens))
}

/// Compile source text directly to AArch64 assembly.
pub fn compile_to_asm(source: &str) -> Result<Compilation, CompileError> {
    let parsed = compile_to_ast(source)?;
    let asm = backend::generate(&parsed.program);
    Ok(Compilation {
        asm,
        diagnostics: parsed.diagnostics,
    })
}
