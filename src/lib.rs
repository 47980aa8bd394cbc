/// The scanner takes the source input, mapping it into a sequence of tokens.
pub mod scanner;

/// The parser takes a sequence of tokens, mapping it into an AST, one
/// declaration or statement at a time.
pub mod parser;

/// The code generator type checks the AST and lowers it into IR.
pub mod codegen;

/// The driver runs the stages above over a whole program.
pub mod driver;

pub mod ast;
pub mod diagnostic;
pub mod ir;
pub mod symbol_table;
pub mod token;
pub mod types;
pub mod util;
