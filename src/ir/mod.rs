//! An LLVM-compatible intermediate representation (opaque pointers).
//!
//! A [`Module`] is built through a [`Builder`] and rendered to LLVM textual IR
//! through its `Display` implementation.

pub mod builder;
mod printer;

pub use builder::{Builder, Cursor, NameTaken};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    I1,
    I8,
    I32,
    Float,
    Ptr,
    Array(u32, Box<IrType>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub ty: IrType,
    pub operand: Operand,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f32),
    Local(String),
    Global(String),
}

impl Value {
    pub fn int(value: i32) -> Value {
        Value {
            ty: IrType::I32,
            operand: Operand::Int(i64::from(value)),
        }
    }

    pub fn bool(value: bool) -> Value {
        Value {
            ty: IrType::I1,
            operand: Operand::Int(i64::from(value)),
        }
    }

    pub fn float(value: f32) -> Value {
        Value {
            ty: IrType::Float,
            operand: Operand::Float(value),
        }
    }

    pub fn local(ty: IrType, name: impl Into<String>) -> Value {
        Value {
            ty,
            operand: Operand::Local(name.into()),
        }
    }

    pub fn global(ty: IrType, name: impl Into<String>) -> Value {
        Value {
            ty,
            operand: Operand::Global(name.into()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
    And,
    Or,
    Xor,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// Float comparisons are unordered: they hold if either operand is NaN.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatPredicate {
    Ueq,
    Une,
    Ult,
    Ule,
    Ugt,
    Uge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Alloca {
        dest: String,
        ty: IrType,
    },
    Load {
        dest: String,
        ty: IrType,
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    Binary {
        dest: String,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        dest: String,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        dest: String,
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    FNeg {
        dest: String,
        operand: Value,
    },
    SIToFP {
        dest: String,
        operand: Value,
    },
    /// Computes `ptr + index * sizeof(elem_ty)`.
    GetElementPtr {
        dest: String,
        elem_ty: IrType,
        ptr: Value,
        index: Value,
    },
    Call {
        dest: String,
        ret: IrType,
        callee: String,
        args: Vec<Value>,
    },
    Br {
        target: String,
    },
    CondBr {
        cond: Value,
        then_target: String,
        else_target: String,
    },
    Ret {
        value: Value,
    },
    Unreachable,
}

impl Instr {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Br { .. } | Instr::CondBr { .. } | Instr::Ret { .. } | Instr::Unreachable
        )
    }
}

/// A basic block. Once terminated, no instruction may follow the terminator.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub label: String,
    pub instrs: Vec<Instr>,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Block {
        Block {
            label: label.into(),
            instrs: Vec::new(),
        }
    }

    /// Returns the terminator instruction if the block is terminated.
    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|i| i.is_terminator())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret: IrType,
    pub params: Vec<Param>,
    pub blocks: Vec<Block>,
    next_id: u32,
}

impl Function {
    pub fn new(name: impl Into<String>, ret: IrType, params: Vec<Param>) -> Function {
        Function {
            name: name.into(),
            ret,
            params,
            blocks: vec![Block::new("entry")],
            next_id: 0,
        }
    }

    /// Returns a name unique within this function, of the form `<hint>.<n>`.
    pub fn fresh_name(&mut self, hint: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{hint}.{id}")
    }
}

/// An external function, defined in the runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub ret: IrType,
    pub params: Vec<IrType>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GlobalKind {
    /// A zero initialized, mutable variable.
    Variable,
    /// A private NUL-terminated byte string.
    StringConstant(Box<str>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: IrType,
    pub kind: GlobalKind,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub declarations: Vec<Declaration>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            ..Module::default()
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Whether any module-level entity is named `name`.
    pub fn has_symbol(&self, name: &str) -> bool {
        self.function(name).is_some()
            || self.declaration(name).is_some()
            || self.global(name).is_some()
    }
}
