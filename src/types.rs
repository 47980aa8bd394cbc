use std::fmt;

use crate::{ir::IrType, token::TokenKind};

/// A source-level type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Integer,
    Float,
    Bool,
    String,
}

impl Type {
    pub fn of_token(kind: TokenKind) -> Option<Type> {
        let ty = match kind {
            TokenKind::IntegerType => Type::Integer,
            TokenKind::FloatType => Type::Float,
            TokenKind::BoolType => Type::Bool,
            TokenKind::StringType => Type::String,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Float)
    }

    /// The IR type a value of this type is represented as.
    pub fn ir(self) -> IrType {
        match self {
            Type::Integer => IrType::I32,
            Type::Float => IrType::Float,
            Type::Bool => IrType::I1,
            Type::String => IrType::Ptr,
        }
    }

    /// The IR type of an array of `len` elements of this type.
    pub fn ir_array(self, len: u32) -> IrType {
        IrType::Array(len, Box::new(self.ir()))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Integer => "integer",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::String => "string",
        };
        f.write_str(name)
    }
}
