// program ::= 'program' ID 'is' (declaration ';')* 'begin' (statement ';')* 'end' 'program' '.'
// declaration ::= ['global'] procedure | ['global'] variable | ['global'] type_decl
// procedure ::= 'procedure' ID ':' type_mark '(' [variable (',' variable)*] ')'
//               (declaration ';')* 'begin' (statement ';')* 'end' 'procedure'
// variable ::= 'variable' ID ':' type_mark ['[' INTEGER ']']
//            | builtin_type ID ['[' INTEGER ']']
// type_decl ::= 'type' ID 'is' type_mark
// type_mark ::= builtin_type | ID | 'enum' '{' ID (',' ID)* '}'
// statement ::= assignment
//             | 'if' '(' expr ')' 'then' (statement ';')* ['else' (statement ';')*] 'end' 'if'
//             | 'for' '(' assignment ';' expr ')' (statement ';')* 'end' 'for'
//             | 'return' expr
//             | ID '(' [expr (',' expr)*] ')'
// assignment ::= ID ['[' expr ']'] ':=' expr
// expr ::= ['not'] arith (('&' | '|') ['not'] arith)*
// arith ::= relation (('+' | '-') relation)*
// relation ::= term (('<' | '<=' | '>' | '>=' | '==' | '!=') term)*
// term ::= factor (('*' | '/') factor)*
// factor ::= '(' expr ')' | ID '(' [expr (',' expr)*] ')' | ['-'] ID ['[' expr ']']
//          | ['-'] INTEGER | ['-'] FLOAT | STRING | 'true' | 'false'

// Precedence (loosest first)
//
// & |
// not
// + -
// < <= > >= == !=
// * /
// unary -

use std::fmt;

use crate::{codegen, types::Type};

pub type Ident = Box<str>;

#[derive(Debug, PartialEq)]
pub struct Program {
    pub name: Ident,
    pub declarations: Vec<Stmt>,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
    /// Errors found while lowering this statement (and its children).
    pub errors: Vec<codegen::Error>,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: u32) -> Stmt {
        Stmt {
            kind,
            line,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Assignment(Assignment),
    Declaration(Declaration),
    TypeDeclaration {
        name: Ident,
        ty: TypeMark,
        is_global: bool,
    },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    Loop {
        init: Assignment,
        /// Evaluated before every iteration.
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return(Expr),
    Function(Procedure),
    /// A procedure call whose result is discarded.
    Call(Expr),
}

#[derive(Debug, PartialEq)]
pub struct Assignment {
    pub dest: VariableRef,
    pub expr: Expr,
}

/// A variable (or parameter) declaration.
#[derive(Debug, PartialEq)]
pub struct Declaration {
    pub name: Ident,
    pub ty: TypeMark,
    pub is_global: bool,
    /// The array length, if this declares an array.
    pub bound: Option<i64>,
    pub line: u32,
}

#[derive(Debug, PartialEq)]
pub struct Procedure {
    pub name: Ident,
    pub ret: TypeMark,
    pub params: Vec<Declaration>,
    /// Local declarations followed by the statements.
    pub body: Vec<Stmt>,
    pub is_global: bool,
}

#[derive(Debug, PartialEq)]
pub enum TypeMark {
    Builtin(Type),
    Named(Ident),
    Enum(Vec<Ident>),
}

impl fmt::Display for TypeMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeMark::Builtin(ty) => write!(f, "{ty}"),
            TypeMark::Named(name) => write!(f, "{name}"),
            TypeMark::Enum(variants) => write!(f, "enum {{{}}}", variants.join(", ")),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
    /// Filled in during lowering.
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, line: u32) -> Expr {
        Expr {
            kind,
            line,
            ty: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Variable(VariableRef),
    Literal(Literal),
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
}

#[derive(Debug, PartialEq)]
pub struct VariableRef {
    pub name: Ident,
    pub index: Option<Box<Expr>>,
    /// Whether the name was prefixed by `-`.
    pub negated: bool,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Integer(i32),
    Float(f32),
    Bool(bool),
    String(Box<str>),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Integer(_) => Type::Integer,
            Literal::Float(_) => Type::Float,
            Literal::Bool(_) => Type::Bool,
            Literal::String(_) => Type::String,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
}

impl BinaryOperator {
    pub fn is_relational(self) -> bool {
        use BinaryOperator::*;
        matches!(self, Less | LessEq | Greater | GreaterEq | Eq | NotEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOperator::*;
        let symbol = match self {
            And => "&",
            Or => "|",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Less => "<",
            LessEq => "<=",
            Greater => ">",
            GreaterEq => ">=",
            Eq => "==",
            NotEq => "!=",
        };
        f.write_str(symbol)
    }
}
