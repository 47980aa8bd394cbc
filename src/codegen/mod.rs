//! Lowering of the AST into IR, with type checking.
//!
//! Each statement lowers itself against a [`Codegen`] context, recording the
//! errors it finds in its own error list. A failed subtree yields no value and
//! lowering goes on with its siblings.

use log::debug;

use crate::{
    ast::{BinaryOperator, TypeMark},
    diagnostic::Diagnostic,
    ir::{Builder, IrType, Module, NameTaken, Value},
    symbol_table::{AddError, Symbol, SymbolTable, UpdateError},
    types::Type,
};

mod expr;
pub mod runtime;
mod stmt;

/// The name of the function the program body is lowered into.
pub const MAIN: &str = "main";

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub line: u32,
    pub kind: ErrorKind,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0} is not declared")]
    UndefinedName(Box<str>),
    #[error("undefined function {0}")]
    UndefinedFunction(Box<str>),
    #[error("{0} is not a procedure")]
    NotAFunction(Box<str>),
    #[error("procedure {0} used as a variable")]
    NotAVariable(Box<str>),
    #[error("{0} is not an array")]
    NotAnArray(Box<str>),
    #[error("array {0} used without an index")]
    WholeArray(Box<str>),
    #[error("cannot access {0}, which is local to an enclosing scope")]
    EnclosingLocal(Box<str>),
    #[error(transparent)]
    Duplicate(#[from] AddError),
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error(transparent)]
    NameTaken(#[from] NameTaken),
    #[error("incompatible operand types {lhs} and {rhs} for operator {op}")]
    IncompatibleOperands {
        op: BinaryOperator,
        lhs: Type,
        rhs: Type,
    },
    #[error("incompatible operand type {ty} for operator {op}")]
    IncompatibleOperand { op: &'static str, ty: Type },
    #[error("array index must be integer, but got {0}")]
    IndexType(Type),
    #[error("condition must be bool, but got {0}")]
    ConditionType(Type),
    #[error("{callee} expects {expected} arguments, but got {actual}")]
    ArgumentCount {
        callee: Box<str>,
        expected: usize,
        actual: usize,
    },
    #[error("argument {position} of {callee} expects {expected}, but got {actual}")]
    ArgumentType {
        callee: Box<str>,
        position: usize,
        expected: String,
        actual: String,
    },
    #[error("array bounds must be greater than 0 (got {bound} for {name})")]
    ArrayBounds { name: Box<str>, bound: i64 },
    #[error("unsupported type {0}")]
    UnsupportedType(String),
    #[error("return outside of a procedure")]
    ReturnOutsideProcedure,
    #[error("return after the end of the block")]
    ReturnAfterTerminator,
    #[error("expected return type {expected}, but got {actual}")]
    ReturnType { expected: Type, actual: Type },
    #[error("procedure {0} does not return a value")]
    MissingReturn(Box<str>),
}

/// Records an error and returns `None`, so that failures read as `return
/// report(...)`.
fn report<T>(errors: &mut Vec<Error>, line: u32, kind: impl Into<ErrorKind>) -> Option<T> {
    errors.push(Error {
        line,
        kind: kind.into(),
    });
    None
}

trait Report<T> {
    /// Converts into an `Option`, recording the error, if any.
    fn report(self, errors: &mut Vec<Error>, line: u32) -> Option<T>;
}

impl<T, E: Into<ErrorKind>> Report<T> for Result<T, E> {
    fn report(self, errors: &mut Vec<Error>, line: u32) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => report(errors, line, error),
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FrameKind {
    Program,
    Procedure { ret: Type },
}

/// The lowering context: the module under construction and the symbols in
/// scope.
pub struct Codegen {
    pub builder: Builder,
    pub symbols: SymbolTable,
    frames: Vec<FrameKind>,
    warnings: Vec<Diagnostic>,
}

impl Codegen {
    /// Creates a context with the runtime routines in the global scope.
    pub fn new(module_name: &str) -> Codegen {
        let mut symbols = SymbolTable::new();
        runtime::register(&mut symbols);
        Codegen {
            builder: Builder::new(Module::new(module_name)),
            symbols,
            frames: Vec::with_capacity(4),
            warnings: Vec::new(),
        }
    }

    /// Opens the program body: the `main` function and the outermost local
    /// scope, named after the program.
    pub fn begin_program(&mut self, name: &str) -> Result<(), NameTaken> {
        debug!("lowering program {name}");
        let entry = self.builder.define_function(MAIN, IrType::I32, Vec::new())?;
        self.builder.position_at_end(entry);
        self.symbols.push_scope(name);
        self.frames.push(FrameKind::Program);
        Ok(())
    }

    /// Returns the warnings found so far, leaving the list empty.
    pub fn take_warnings(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.warnings)
    }

    /// Closes the program body and returns the module.
    pub fn finish(mut self) -> Module {
        if self.builder.save_cursor().is_some() && !self.builder.is_terminated() {
            self.builder.ret(Value::int(0));
        }
        if self.frames.pop().is_some() {
            self.symbols.pop_scope();
        }
        self.builder.into_module()
    }

    /// Runs `f` within a new local scope and frame.
    fn with_scope<T>(
        &mut self,
        namespace: &str,
        kind: FrameKind,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.symbols.push_scope(namespace);
        self.frames.push(kind);
        let result = f(self);
        self.frames.pop();
        self.symbols.pop_scope();
        result
    }

    /// The return type of the innermost procedure, if lowering one.
    fn return_type(&self) -> Option<Type> {
        match self.frames.last()? {
            FrameKind::Procedure { ret } => Some(*ret),
            FrameKind::Program => None,
        }
    }

    /// Looks up a variable or array, checking that it's accessible from the
    /// current frame.
    fn variable(&self, name: &str) -> Result<Symbol, ErrorKind> {
        let Some(symbol) = self.symbols.lookup(name) else {
            return Err(ErrorKind::UndefinedName(name.into()));
        };
        if symbol.is_function() {
            return Err(ErrorKind::NotAVariable(name.into()));
        }
        if symbol.frame.is_some_and(|frame| frame != self.symbols.depth()) {
            return Err(ErrorKind::EnclosingLocal(name.into()));
        }
        Ok(symbol.clone())
    }

    /// Converts `value` from `from` to `to`. Only integer to float is implicit.
    fn coerce(&mut self, value: Value, from: Type, to: Type) -> Option<Value> {
        match (from, to) {
            (from, to) if from == to => Some(value),
            (Type::Integer, Type::Float) => Some(self.builder.sitofp(value, "conv")),
            _ => None,
        }
    }
}

fn can_coerce(from: Type, to: Type) -> bool {
    from == to || (from, to) == (Type::Integer, Type::Float)
}

/// Resolves a type mark to one of the builtin types.
fn resolve_type(mark: &TypeMark) -> Result<Type, ErrorKind> {
    match mark {
        TypeMark::Builtin(ty) => Ok(*ty),
        mark => Err(ErrorKind::UnsupportedType(mark.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use codegen;

        fn test_scenario_a() {
            let program = "program t is begin integer x; x := 3 + 2; end program .";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  %x.0 = alloca i32
                  %add.1 = add i32 3, 2
                  store i32 %add.1, ptr %x.0
                  ret i32 0
                }
            ";
        }

        fn test_promotion() {
            let program = "
                program t is
                    variable f : float;
                begin
                    f := 3 + 2.5;
                    f := 7;
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  %f.0 = alloca float
                  %fadd.1 = fadd float 0x4008000000000000, 0x4004000000000000
                  store float %fadd.1, ptr %f.0
                  store float 0x401C000000000000, ptr %f.0
                  ret i32 0
                }
            ";
        }

        fn test_promotion_of_loaded_integer() {
            let program = "
                program t is
                    integer i;
                    bool b;
                begin
                    b := i < 1.5;
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  %i.0 = alloca i32
                  %b.1 = alloca i1
                  %i.2 = load i32, ptr %i.0
                  %conv.3 = sitofp i32 %i.2 to float
                  %cmp.4 = fcmp ult float %conv.3, 0x3FF8000000000000
                  store i1 %cmp.4, ptr %b.1
                  ret i32 0
                }
            ";
        }

        fn test_scenario_b_array_bounds() {
            let program = "
                program t is
                    variable a : integer[0];
                    variable b : integer[-2];
                begin
                end program .
            ";
            let tree_error = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  ret i32 0
                }
            ";
            let expected_errors = &[
                "Error L3: array bounds must be greater than 0 (got 0 for a)",
                "Error L4: array bounds must be greater than 0 (got -2 for b)",
            ];
        }

        fn test_scenario_c_undefined_function() {
            let program = "
                program t is
                    integer x;
                begin
                    x := 1;
                    foo();
                    x := 2;
                end program .
            ";
            let tree_error = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  %x.0 = alloca i32
                  store i32 1, ptr %x.0
                  store i32 2, ptr %x.0
                  ret i32 0
                }
            ";
            let expected_errors = &["Error L6: undefined function foo"];
        }

        fn test_scenario_d_string_equality() {
            let program = r#"
                program t is
                    bool b;
                begin
                    b := "ab" == "ab";
                end program .
            "#;
            let tree_ok = r#"
                ; ModuleID = 't'
                source_filename = "t"

                @t.str.0 = private unnamed_addr constant [3 x i8] c"ab\00"
                @t.str.1 = private unnamed_addr constant [3 x i8] c"ab\00"

                declare i1 @StringEquals(ptr, ptr)

                define i32 @main() {
                entry:
                  %b.0 = alloca i1
                  %streq.1 = call i1 @StringEquals(ptr @t.str.0, ptr @t.str.1)
                  store i1 %streq.1, ptr %b.0
                  ret i32 0
                }
            "#;
        }

        fn test_if_else_blocks() {
            let program = "
                program t is
                    integer x;
                begin
                    if (x > 1) then
                        x := 1;
                    else
                        x := 2;
                    end if;
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  %x.0 = alloca i32
                  %x.1 = load i32, ptr %x.0
                  %cmp.2 = icmp sgt i32 %x.1, 1
                  br i1 %cmp.2, label %then.3, label %else.4

                then.3:
                  store i32 1, ptr %x.0
                  br label %merge.5

                else.4:
                  store i32 2, ptr %x.0
                  br label %merge.5

                merge.5:
                  ret i32 0
                }
            ";
        }

        fn test_loop_reevaluates_condition() {
            let program = "
                program t is
                    integer i;
                begin
                    for (i := 0; i < 10)
                        i := i + 1;
                    end for;
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  %i.0 = alloca i32
                  store i32 0, ptr %i.0
                  br label %loop.cond.1

                loop.cond.1:
                  %i.4 = load i32, ptr %i.0
                  %cmp.5 = icmp slt i32 %i.4, 10
                  br i1 %cmp.5, label %loop.body.2, label %loop.end.3

                loop.body.2:
                  %i.6 = load i32, ptr %i.0
                  %add.7 = add i32 %i.6, 1
                  store i32 %add.7, ptr %i.0
                  br label %loop.cond.1

                loop.end.3:
                  ret i32 0
                }
            ";
        }

        fn test_procedure_with_returns() {
            let program = "
                program t is
                    procedure sign : integer (variable n : integer)
                    begin
                        if (n < 0) then
                            return -1;
                        else
                            return 1;
                        end if;
                    end procedure;
                begin
                    putinteger(sign(-4));
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                declare i1 @putinteger(i32)

                define i32 @main() {
                entry:
                  %call.0 = call i32 @sign(i32 -4)
                  %call.1 = call i1 @putinteger(i32 %call.0)
                  ret i32 0
                }

                define i32 @sign(i32 %n.arg) {
                entry:
                  %n.0 = alloca i32
                  store i32 %n.arg, ptr %n.0
                  %n.1 = load i32, ptr %n.0
                  %cmp.2 = icmp slt i32 %n.1, 0
                  br i1 %cmp.2, label %then.3, label %else.4

                then.3:
                  ret i32 -1

                else.4:
                  ret i32 1

                merge.5:
                  unreachable
                }
            ";
        }

        fn test_implicit_return_and_nested_names() {
            let program = "
                program t is
                    procedure outer : float (float x)
                        procedure inner : integer ()
                        begin
                            return 2;
                        end procedure;
                    begin
                        x := x * inner();
                    end procedure;
                begin
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  ret i32 0
                }

                define float @outer(float %x.arg) {
                entry:
                  %x.0 = alloca float
                  store float %x.arg, ptr %x.0
                  %x.1 = load float, ptr %x.0
                  %call.2 = call i32 @outer.inner()
                  %conv.3 = sitofp i32 %call.2 to float
                  %fmul.4 = fmul float %x.1, %conv.3
                  store float %fmul.4, ptr %x.0
                  ret float %fmul.4
                }

                define i32 @outer.inner() {
                entry:
                  ret i32 2
                }
            ";
        }

        fn test_arrays_and_globals() {
            let program = "
                program t is
                    global variable total : integer;
                    procedure sum : integer (variable v : integer[3])
                        integer i;
                    begin
                        total := v[0] + v[2];
                        return total;
                    end procedure;
                    variable a : integer[3];
                begin
                    a[1] := -total;
                    total := sum(a);
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                @total = global i32 zeroinitializer

                define i32 @main() {
                entry:
                  %a.0 = alloca [3 x i32]
                  %total.1 = load i32, ptr @total
                  %neg.2 = sub i32 0, %total.1
                  %elem.3 = getelementptr i32, ptr %a.0, i32 1
                  store i32 %neg.2, ptr %elem.3
                  %call.4 = call i32 @sum(ptr %a.0)
                  store i32 %call.4, ptr @total
                  ret i32 0
                }

                define i32 @sum(ptr %v.arg) {
                entry:
                  %i.0 = alloca i32
                  %elem.1 = getelementptr i32, ptr %v.arg, i32 0
                  %v.2 = load i32, ptr %elem.1
                  %elem.3 = getelementptr i32, ptr %v.arg, i32 2
                  %v.4 = load i32, ptr %elem.3
                  %add.5 = add i32 %v.2, %v.4
                  store i32 %add.5, ptr @total
                  %total.6 = load i32, ptr @total
                  ret i32 %total.6
                }
            ";
        }

        fn test_type_errors() {
            let program = r#"
                program t is
                    integer x;
                    bool b;
                    string s;
                begin
                    x := "text";
                    b := b + 1;
                    b := s != s;
                    b := not 2.5;
                    if (s) then end if;
                end program .
            "#;
            let expected_errors = &[
                "Error L7: x expected a value of type integer, but got string",
                "Error L8: incompatible operand types bool and integer for operator +",
                "Error L9: incompatible operand types string and string for operator !=",
                "Error L10: incompatible operand type float for operator not",
                "Error L11: condition must be bool, but got string",
            ];
        }

        fn test_call_errors() {
            let program = "
                program t is
                    procedure f : integer (integer a, bool b)
                    begin
                        return a;
                    end procedure;
                    integer x;
                begin
                    x := f(1);
                    x := f(1, 2);
                    x := x(1);
                    x := f;
                end program .
            ";
            let expected_errors = &[
                "Error L9: f expects 2 arguments, but got 1",
                "Error L10: argument 2 of f expects bool, but got integer",
                "Error L11: x is not a procedure",
                "Error L12: procedure f used as a variable",
            ];
        }

        fn test_scope_errors() {
            let program = "
                program t is
                    integer x;
                    integer x;
                    procedure f : integer ()
                    begin
                        return x;
                    end procedure;
                begin
                    y := 1;
                end program .
            ";
            let expected_errors = &[
                "Error L4: x is already declared in this scope",
                "Error L7: cannot access x, which is local to an enclosing scope",
                "Error L10: y is not declared",
            ];
        }

        fn test_return_errors() {
            let program = "
                program t is
                    procedure f : integer ()
                    begin
                        return 1;
                        return 2;
                    end procedure;
                    procedure g : bool ()
                    begin
                        return 1.5;
                    end procedure;
                    procedure h : integer ()
                    begin
                    end procedure;
                begin
                    return 0;
                end program .
            ";
            let expected_errors = &[
                "Error L6: return after the end of the block",
                "Error L10: expected return type bool, but got float",
                "Error L12: procedure h does not return a value",
                "Error L16: return outside of a procedure",
            ];
        }

        fn test_parameter_named_like_a_block() {
            let program = "
                program t is
                    procedure f : integer (integer entry)
                    begin
                        return entry;
                    end procedure;
                begin
                end program .
            ";
            let tree_ok = "
                ; ModuleID = 't'
                source_filename = \"t\"

                define i32 @main() {
                entry:
                  ret i32 0
                }

                define i32 @f(i32 %entry.arg) {
                entry:
                  %entry.0 = alloca i32
                  store i32 %entry.arg, ptr %entry.0
                  %entry.1 = load i32, ptr %entry.0
                  ret i32 %entry.1
                }
            ";
        }

        fn test_unsupported_types() {
            let program = "
                program t is
                    type color is enum { red, green };
                    variable c : color;
                begin
                end program .
            ";
            let expected_errors = &[
                "Warning L3: type declaration color is ignored",
                "Error L4: unsupported type color",
            ];
        }
    );
}
