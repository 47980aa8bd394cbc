//! Signatures of the routines provided by the runtime library.

use crate::{
    ir::{Builder, IrType, Value},
    symbol_table::{ParamShape, Symbol, SymbolKind, SymbolTable},
    types::Type,
};

pub struct RuntimeFunction {
    pub name: &'static str,
    pub params: &'static [Type],
    pub ret: Type,
}

/// The I/O routines, callable from programs.
pub const IO: &[RuntimeFunction] = &[
    RuntimeFunction {
        name: "getbool",
        params: &[],
        ret: Type::Bool,
    },
    RuntimeFunction {
        name: "getinteger",
        params: &[],
        ret: Type::Integer,
    },
    RuntimeFunction {
        name: "getfloat",
        params: &[],
        ret: Type::Float,
    },
    RuntimeFunction {
        name: "getstring",
        params: &[],
        ret: Type::String,
    },
    RuntimeFunction {
        name: "putbool",
        params: &[Type::Bool],
        ret: Type::Bool,
    },
    RuntimeFunction {
        name: "putinteger",
        params: &[Type::Integer],
        ret: Type::Bool,
    },
    RuntimeFunction {
        name: "putfloat",
        params: &[Type::Float],
        ret: Type::Bool,
    },
    RuntimeFunction {
        name: "putstring",
        params: &[Type::String],
        ret: Type::Bool,
    },
];

/// Compares two NUL-terminated strings.
pub const STRING_EQUALS: RuntimeFunction = RuntimeFunction {
    name: "StringEquals",
    params: &[Type::String, Type::String],
    ret: Type::Bool,
};

/// Adds the I/O routines to the global scope.
pub fn register(symbols: &mut SymbolTable) {
    for function in IO {
        let params = function
            .params
            .iter()
            .map(|&ty| ParamShape { ty, len: None })
            .collect();
        let symbol = Symbol::new(
            function.name,
            Value::global(IrType::Ptr, function.name),
            function.ret,
            SymbolKind::Function { params },
        );
        // The global scope is empty at this point.
        _ = symbols.add(symbol, true);
    }
}

/// Declares `name` in the module if it's a runtime routine not shadowed by a
/// defined function. Other names are ignored.
pub fn declare_if_runtime(builder: &mut Builder, name: &str) {
    if builder.module().function(name).is_some() {
        return;
    }
    let function = IO
        .iter()
        .chain([&STRING_EQUALS])
        .find(|function| function.name == name);
    if let Some(function) = function {
        let params = function.params.iter().map(|ty| ty.ir()).collect();
        builder.declare_function(function.name, function.ret.ir(), params);
    }
}
