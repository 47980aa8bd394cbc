//! Drives a compilation: parses the program one declaration or statement at a
//! time and lowers each as soon as it's parsed.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    ast::Stmt,
    codegen::Codegen,
    diagnostic::Diagnostic,
    ir::Module,
    parser::{Next, Parser},
    scanner::DEFAULT_TAB_WIDTH,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// The number of columns a tab advances, for reported positions.
    pub tab_width: u32,
    /// Defaults to the program's name ([`compile`]) or the input file's
    /// name ([`compile_file`]).
    pub module_name: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            tab_width: DEFAULT_TAB_WIDTH,
            module_name: None,
        }
    }
}

#[derive(Debug)]
pub struct Compilation {
    /// The lowered program. Parts with errors are left out.
    pub module: Module,
    /// In the order they were found.
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("compilation failed with {} error(s)", .0.error_count())]
    Failed(Compilation),
}

/// Compiles `src`. Errors don't stop the compilation unless the input ends
/// prematurely; the module holds everything that could be lowered.
pub fn compile(src: &str, options: &Options) -> Compilation {
    let mut parser = Parser::new(src, options);
    let mut diagnostics = Vec::new();

    let header = parser.parse_header();
    drain_parser_errors(&mut parser, &mut diagnostics);
    let Ok(name) = header else {
        let module_name = options.module_name.as_deref().unwrap_or_default();
        return Compilation {
            module: Module::new(module_name),
            diagnostics,
        };
    };

    let module_name = options.module_name.as_deref().unwrap_or(&*name);
    let mut cx = Codegen::new(module_name);
    if let Err(error) = cx.begin_program(&name) {
        diagnostics.push(Diagnostic::error(1, None, error.to_string()));
    }

    debug!("compiling declarations of {name}");
    let d = &mut diagnostics;
    let mut ended = run_section(&mut parser, &mut cx, d, Parser::parse_next_declaration);
    if ended {
        debug!("compiling statements of {name}");
        ended = run_section(&mut parser, &mut cx, d, Parser::parse_next_statement);
    }
    if !ended {
        info!("input ended prematurely, compilation stopped");
    }

    Compilation {
        module: cx.finish(),
        diagnostics,
    }
}

/// Parses and lowers the items of a section. Returns false if the input ended
/// before the section did.
fn run_section<'src>(
    parser: &mut Parser<'src>,
    cx: &mut Codegen,
    diagnostics: &mut Vec<Diagnostic>,
    mut next: impl FnMut(&mut Parser<'src>) -> Next<Stmt>,
) -> bool {
    loop {
        let item = next(parser);
        drain_parser_errors(parser, diagnostics);
        match item {
            Next::Item(mut stmt) => {
                stmt.lower(cx);
                diagnostics.extend(cx.take_warnings());
                diagnostics.extend(stmt.errors.iter().map(Diagnostic::from));
            }
            Next::Recovered => (),
            Next::End => return true,
            Next::Eof => return false,
        }
    }
}

fn drain_parser_errors(parser: &mut Parser<'_>, diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.extend(parser.take_errors().iter().map(Diagnostic::from));
}

/// Compiles the file at `input`, writing the module to `output` even if there
/// are errors.
pub fn compile_file(
    input: &Path,
    output: &Path,
    options: &Options,
) -> Result<Compilation, CompileError> {
    let src = fs::read_to_string(input).map_err(|source| CompileError::Read {
        path: input.to_owned(),
        source,
    })?;

    let mut options = options.clone();
    if options.module_name.is_none() {
        options.module_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
    }
    let compilation = compile(&src, &options);

    debug!("writing {}", output.display());
    fs::write(output, compilation.module.to_string()).map_err(|source| CompileError::Write {
        path: output.to_owned(),
        source,
    })?;

    if compilation.has_errors() {
        return Err(CompileError::Failed(compilation));
    }
    Ok(compilation)
}
