use std::fmt::{self, Display, Formatter, Write};

use super::{
    BinOp, Block, Declaration, FloatPredicate, Function, Global, GlobalKind, Instr, IntPredicate,
    IrType, Module, Operand, Value,
};

impl Display for IrType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IrType::I1 => f.write_str("i1"),
            IrType::I8 => f.write_str("i8"),
            IrType::I32 => f.write_str("i32"),
            IrType::Float => f.write_str("float"),
            IrType::Ptr => f.write_str("ptr"),
            IrType::Array(len, elem) => write!(f, "[{len} x {elem}]"),
        }
    }
}

/// Prints the operand only. Use [`Typed`] to prefix it with its type.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (&self.ty, &self.operand) {
            (IrType::I1, Operand::Int(0)) => f.write_str("false"),
            (IrType::I1, Operand::Int(_)) => f.write_str("true"),
            (_, Operand::Int(value)) => write!(f, "{value}"),
            // Float constants are written as the hex bits of the equivalent
            // double, which is exact.
            (_, Operand::Float(value)) => write!(f, "0x{:016X}", f64::from(*value).to_bits()),
            (_, Operand::Local(name)) => write!(f, "%{name}"),
            (_, Operand::Global(name)) => write!(f, "@{name}"),
        }
    }
}

struct Typed<'a>(&'a Value);

impl Display for Typed<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0.ty, self.0)
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        };
        f.write_str(name)
    }
}

impl Display for IntPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        };
        f.write_str(name)
    }
}

impl Display for FloatPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            FloatPredicate::Ueq => "ueq",
            FloatPredicate::Une => "une",
            FloatPredicate::Ult => "ult",
            FloatPredicate::Ule => "ule",
            FloatPredicate::Ugt => "ugt",
            FloatPredicate::Uge => "uge",
        };
        f.write_str(name)
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Alloca { dest, ty } => write!(f, "%{dest} = alloca {ty}"),
            Instr::Load { dest, ty, ptr } => write!(f, "%{dest} = load {ty}, {}", Typed(ptr)),
            Instr::Store { value, ptr } => write!(f, "store {}, {}", Typed(value), Typed(ptr)),
            Instr::Binary { dest, op, lhs, rhs } => {
                write!(f, "%{dest} = {op} {}, {rhs}", Typed(lhs))
            }
            Instr::ICmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(f, "%{dest} = icmp {pred} {}, {rhs}", Typed(lhs)),
            Instr::FCmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(f, "%{dest} = fcmp {pred} {}, {rhs}", Typed(lhs)),
            Instr::FNeg { dest, operand } => write!(f, "%{dest} = fneg {}", Typed(operand)),
            Instr::SIToFP { dest, operand } => {
                write!(f, "%{dest} = sitofp {} to float", Typed(operand))
            }
            Instr::GetElementPtr {
                dest,
                elem_ty,
                ptr,
                index,
            } => write!(
                f,
                "%{dest} = getelementptr {elem_ty}, {}, {}",
                Typed(ptr),
                Typed(index)
            ),
            Instr::Call {
                dest,
                ret,
                callee,
                args,
            } => {
                write!(f, "%{dest} = call {ret} @{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Typed(arg))?;
                }
                f.write_char(')')
            }
            Instr::Br { target } => write!(f, "br label %{target}"),
            Instr::CondBr {
                cond,
                then_target,
                else_target,
            } => write!(
                f,
                "br {}, label %{then_target}, label %{else_target}",
                Typed(cond)
            ),
            Instr::Ret { value } => write!(f, "ret {}", Typed(value)),
            Instr::Unreachable => f.write_str("unreachable"),
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for instr in &self.instrs {
            writeln!(f, "  {instr}")?;
        }
        Ok(())
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "define {} @{}(", self.ret, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} %{}", param.ty, param.name)?;
        }
        writeln!(f, ") {{")?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

impl Display for Declaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "declare {} @{}(", self.ret, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_char(')')
    }
}

impl Display for Global {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GlobalKind::Variable => write!(f, "@{} = global {} zeroinitializer", self.name, self.ty),
            GlobalKind::StringConstant(text) => write!(
                f,
                "@{} = private unnamed_addr constant {} c\"{}\\00\"",
                self.name,
                self.ty,
                Escaped(text)
            ),
        }
    }
}

/// Escapes a string for a `c"..."` constant.
struct Escaped<'a>(&'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0.bytes() {
            match byte {
                b'"' | b'\\' => write!(f, "\\{byte:02X}")?,
                0x20..=0x7E => f.write_char(char::from(byte))?,
                other => write!(f, "\\{other:02X}")?,
            }
        }
        Ok(())
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", Escaped(&self.name))?;
        if !self.globals.is_empty() {
            writeln!(f)?;
            for global in &self.globals {
                writeln!(f, "{global}")?;
            }
        }
        if !self.declarations.is_empty() {
            writeln!(f)?;
            for declaration in &self.declarations {
                writeln!(f, "{declaration}")?;
            }
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Builder, Param};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_print_module() {
        let mut b = Builder::new(Module::new("demo"));
        b.global_variable("count", IrType::I32).unwrap();
        let greeting = b.global_string("str.0", "say \"hi\"\n").unwrap();
        b.declare_function("putstring", IrType::I1, vec![IrType::Ptr]);
        let entry = b
            .define_function(
                "twice",
                IrType::Float,
                vec![Param {
                    name: "x".into(),
                    ty: IrType::Float,
                }],
            )
            .unwrap();
        b.position_at_end(entry);
        b.call("putstring", IrType::I1, vec![greeting], "call");
        let x = Value::local(IrType::Float, "x");
        let sum = b.binary(BinOp::FAdd, x, Value::float(2.5), "add");
        b.ret(sum);

        let expected = indoc! {r#"
            ; ModuleID = 'demo'
            source_filename = "demo"

            @count = global i32 zeroinitializer
            @str.0 = private unnamed_addr constant [10 x i8] c"say \22hi\22\0A\00"

            declare i1 @putstring(ptr)

            define float @twice(float %x) {
            entry:
              %call.0 = call i1 @putstring(ptr @str.0)
              %add.1 = fadd float %x, 0x4004000000000000
              ret float %add.1
            }
        "#};
        assert_eq!(b.into_module().to_string(), expected);
    }

    #[test]
    fn test_source_filename_is_escaped() {
        let module = Module::new(r#"odd "dir"\a.src"#);
        let text = module.to_string();
        let line = text.lines().nth(1).unwrap();
        assert_eq!(line, r#"source_filename = "odd \22dir\22\5Ca.src""#);
    }

    #[test]
    fn test_print_instrs() {
        let p = Value::local(IrType::Ptr, "p");
        let cases = [
            (
                Instr::GetElementPtr {
                    dest: "elem.3".into(),
                    elem_ty: IrType::I32,
                    ptr: p.clone(),
                    index: Value::int(2),
                },
                "%elem.3 = getelementptr i32, ptr %p, i32 2",
            ),
            (
                Instr::CondBr {
                    cond: Value::bool(true),
                    then_target: "then.0".into(),
                    else_target: "merge.1".into(),
                },
                "br i1 true, label %then.0, label %merge.1",
            ),
            (
                Instr::Store {
                    value: Value::float(-1.0),
                    ptr: p,
                },
                "store float 0xBFF0000000000000, ptr %p",
            ),
            (
                Instr::Alloca {
                    dest: "a.0".into(),
                    ty: IrType::Array(4, Box::new(IrType::I1)),
                },
                "%a.0 = alloca [4 x i1]",
            ),
        ];
        for (instr, expected) in cases {
            assert_eq!(instr.to_string(), expected);
        }
    }
}
