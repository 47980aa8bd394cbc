use log::trace;

use super::{report, runtime, Codegen, Error, ErrorKind, Report};
use crate::{
    ast::{BinaryOperator, Expr, ExprKind, Literal, UnaryOperator, VariableRef},
    ir::{BinOp, FloatPredicate, IntPredicate, Value},
    symbol_table::{ParamShape, Symbol, SymbolKind},
    types::Type,
};

impl Expr {
    /// Lowers the expression and fills in its type. On failure the errors are
    /// recorded and `None` is returned.
    pub fn lower(&mut self, cx: &mut Codegen, errors: &mut Vec<Error>) -> Option<(Value, Type)> {
        let line = self.line;
        let (value, ty) = match &mut self.kind {
            ExprKind::Literal(literal) => cx.literal(literal, line, errors)?,
            ExprKind::Variable(var) => cx.read_variable(var, errors)?,
            ExprKind::Unary {
                op: UnaryOperator::Not,
                operand,
            } => {
                let (value, ty) = operand.lower(cx, errors)?;
                let Some(value) = cx.not(value, ty) else {
                    let kind = ErrorKind::IncompatibleOperand { op: "not", ty };
                    return report(errors, line, kind);
                };
                (value, ty)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                // Both sides are lowered so that errors in either get reported.
                let lhs = lhs.lower(cx, errors);
                let rhs = rhs.lower(cx, errors);
                let ((lhs, lhs_ty), (rhs, rhs_ty)) = lhs.zip(rhs)?;
                match cx.binary(*op, lhs, lhs_ty, rhs, rhs_ty) {
                    Some(lowered) => lowered,
                    None => {
                        let kind = ErrorKind::IncompatibleOperands {
                            op: *op,
                            lhs: lhs_ty,
                            rhs: rhs_ty,
                        };
                        return report(errors, line, kind);
                    }
                }
            }
            ExprKind::Call { callee, args } => cx.call(callee, args, line, errors)?,
        };
        self.ty = Some(ty);
        Some((value, ty))
    }
}

impl Codegen {
    fn literal(
        &mut self,
        literal: &Literal,
        line: u32,
        errors: &mut Vec<Error>,
    ) -> Option<(Value, Type)> {
        let value = match literal {
            Literal::Integer(value) => Value::int(*value),
            Literal::Float(value) => Value::float(*value),
            Literal::Bool(value) => Value::bool(*value),
            Literal::String(text) => {
                let name = self.symbols.fresh_unique_name("str");
                self.builder.global_string(&name, text).report(errors, line)?
            }
        };
        Some((value, literal.ty()))
    }

    fn read_variable(
        &mut self,
        var: &mut VariableRef,
        errors: &mut Vec<Error>,
    ) -> Option<(Value, Type)> {
        let symbol = self.variable(&var.name).report(errors, var.line)?;
        let ptr = self.address(&symbol, var, errors)?;
        let value = self.builder.load(symbol.ty.ir(), ptr, &var.name);
        if !var.negated {
            return Some((value, symbol.ty));
        }
        let negated = match symbol.ty {
            Type::Integer => self.builder.binary(BinOp::Sub, Value::int(0), value, "neg"),
            Type::Float => self.builder.fneg(value, "neg"),
            ty => {
                let kind = ErrorKind::IncompatibleOperand { op: "-", ty };
                return report(errors, var.line, kind);
            }
        };
        Some((negated, symbol.ty))
    }

    /// Computes the address `var` refers to: the variable itself or one of
    /// the array's elements.
    pub(super) fn address(
        &mut self,
        symbol: &Symbol,
        var: &mut VariableRef,
        errors: &mut Vec<Error>,
    ) -> Option<Value> {
        let line = var.line;
        match (&symbol.kind, &mut var.index) {
            (SymbolKind::Variable, None) => Some(symbol.binding.clone()),
            (SymbolKind::Variable, Some(_)) => {
                report(errors, line, ErrorKind::NotAnArray(var.name.clone()))
            }
            (SymbolKind::Array { .. }, None) => {
                report(errors, line, ErrorKind::WholeArray(var.name.clone()))
            }
            (SymbolKind::Array { .. }, Some(index)) => {
                let (index, ty) = index.lower(self, errors)?;
                if ty != Type::Integer {
                    return report(errors, line, ErrorKind::IndexType(ty));
                }
                let elem_ty = symbol.ty.ir();
                Some(self.builder.gep(elem_ty, symbol.binding.clone(), index, "elem"))
            }
            (SymbolKind::Function { .. }, _) => {
                report(errors, line, ErrorKind::NotAVariable(var.name.clone()))
            }
        }
    }

    fn not(&mut self, value: Value, ty: Type) -> Option<Value> {
        let mask = match ty {
            Type::Bool => Value::bool(true),
            Type::Integer => Value::int(-1),
            _ => return None,
        };
        Some(self.builder.binary(BinOp::Xor, value, mask, "not"))
    }

    /// Lowers a binary operation, promoting integer operands to float when
    /// the other one is a float. Returns `None` if the operand types aren't
    /// accepted by the operator.
    fn binary(
        &mut self,
        op: BinaryOperator,
        lhs: Value,
        lhs_ty: Type,
        rhs: Value,
        rhs_ty: Type,
    ) -> Option<(Value, Type)> {
        use BinaryOperator as B;

        if op.is_logical() {
            if lhs_ty != rhs_ty || !matches!(lhs_ty, Type::Bool | Type::Integer) {
                return None;
            }
            let ir_op = if op == B::And { BinOp::And } else { BinOp::Or };
            let value = self.builder.binary(ir_op, lhs, rhs, hint(ir_op));
            return Some((value, lhs_ty));
        }

        if lhs_ty.is_numeric() && rhs_ty.is_numeric() {
            let float = lhs_ty == Type::Float || rhs_ty == Type::Float;
            let (lhs, rhs) = if float {
                let lhs = self.coerce(lhs, lhs_ty, Type::Float)?;
                (lhs, self.coerce(rhs, rhs_ty, Type::Float)?)
            } else {
                (lhs, rhs)
            };
            if op.is_relational() {
                let value = if float {
                    self.builder.fcmp(float_predicate(op)?, lhs, rhs, "cmp")
                } else {
                    self.builder.icmp(int_predicate(op)?, lhs, rhs, "cmp")
                };
                return Some((value, Type::Bool));
            }
            let ir_op = match (op, float) {
                (B::Add, false) => BinOp::Add,
                (B::Sub, false) => BinOp::Sub,
                (B::Mul, false) => BinOp::Mul,
                (B::Div, false) => BinOp::SDiv,
                (B::Add, true) => BinOp::FAdd,
                (B::Sub, true) => BinOp::FSub,
                (B::Mul, true) => BinOp::FMul,
                (B::Div, true) => BinOp::FDiv,
                _ => return None,
            };
            let ty = if float { Type::Float } else { Type::Integer };
            return Some((self.builder.binary(ir_op, lhs, rhs, hint(ir_op)), ty));
        }

        match (lhs_ty, rhs_ty, op) {
            (Type::Bool, Type::Bool, B::Eq | B::NotEq) => {
                let value = self.builder.icmp(int_predicate(op)?, lhs, rhs, "cmp");
                Some((value, Type::Bool))
            }
            (Type::String, Type::String, B::Eq) => {
                let equals = runtime::STRING_EQUALS;
                runtime::declare_if_runtime(&mut self.builder, equals.name);
                let value = self
                    .builder
                    .call(equals.name, equals.ret.ir(), vec![lhs, rhs], "streq");
                Some((value, Type::Bool))
            }
            _ => None,
        }
    }

    fn call(
        &mut self,
        callee: &str,
        args: &mut [Expr],
        line: u32,
        errors: &mut Vec<Error>,
    ) -> Option<(Value, Type)> {
        let Some(symbol) = self.symbols.lookup(callee).cloned() else {
            return report(errors, line, ErrorKind::UndefinedFunction(callee.into()));
        };
        let SymbolKind::Function { params } = &symbol.kind else {
            return report(errors, line, ErrorKind::NotAFunction(callee.into()));
        };
        trace!("lowering call to {}", symbol.ir_name());

        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter_mut().enumerate() {
            let value = self.argument(callee, i + 1, params.get(i).copied(), arg, errors);
            values.extend(value);
        }
        // The arguments are checked above, but a call with the wrong arity
        // would be ill-typed IR, so none is emitted.
        if params.len() != args.len() {
            let kind = ErrorKind::ArgumentCount {
                callee: callee.into(),
                expected: params.len(),
                actual: args.len(),
            };
            return report(errors, line, kind);
        }
        if values.len() != args.len() {
            return None;
        }

        runtime::declare_if_runtime(&mut self.builder, symbol.ir_name());
        let value = self
            .builder
            .call(symbol.ir_name(), symbol.ty.ir(), values, "call");
        Some((value, symbol.ty))
    }

    /// Lowers the argument at (1-based) `position`, checking it against the
    /// parameter. Whole arrays may only be passed to array parameters.
    fn argument(
        &mut self,
        callee: &str,
        position: usize,
        param: Option<ParamShape>,
        arg: &mut Expr,
        errors: &mut Vec<Error>,
    ) -> Option<Value> {
        let line = arg.line;
        let mismatch = |expected: String, actual: String| ErrorKind::ArgumentType {
            callee: callee.into(),
            position,
            expected,
            actual,
        };

        if let Some((array, len)) = self.whole_array(arg) {
            arg.ty = Some(array.ty);
            return match param {
                Some(param) if param.ty == array.ty && param.len == Some(len) => Some(array.binding),
                Some(param) => {
                    let kind = mismatch(param.to_string(), array.shape().to_string());
                    report(errors, line, kind)
                }
                None => Some(array.binding),
            };
        }

        let (value, ty) = arg.lower(self, errors)?;
        match param {
            Some(param) if param.len.is_none() && super::can_coerce(ty, param.ty) => {
                self.coerce(value, ty, param.ty)
            }
            Some(param) => report(errors, line, mismatch(param.to_string(), ty.to_string())),
            None => Some(value),
        }
    }

    /// Returns the array symbol and its length if `arg` is an unindexed array
    /// variable.
    fn whole_array(&self, arg: &Expr) -> Option<(Symbol, u32)> {
        let ExprKind::Variable(var) = &arg.kind else {
            return None;
        };
        if var.index.is_some() || var.negated {
            return None;
        }
        let symbol = self.variable(&var.name).ok()?;
        match symbol.kind {
            SymbolKind::Array { len } => Some((symbol, len)),
            _ => None,
        }
    }
}

fn hint(op: BinOp) -> &'static str {
    match op {
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
    }
}

fn int_predicate(op: BinaryOperator) -> Option<IntPredicate> {
    let pred = match op {
        BinaryOperator::Less => IntPredicate::Slt,
        BinaryOperator::LessEq => IntPredicate::Sle,
        BinaryOperator::Greater => IntPredicate::Sgt,
        BinaryOperator::GreaterEq => IntPredicate::Sge,
        BinaryOperator::Eq => IntPredicate::Eq,
        BinaryOperator::NotEq => IntPredicate::Ne,
        _ => return None,
    };
    Some(pred)
}

fn float_predicate(op: BinaryOperator) -> Option<FloatPredicate> {
    let pred = match op {
        BinaryOperator::Less => FloatPredicate::Ult,
        BinaryOperator::LessEq => FloatPredicate::Ule,
        BinaryOperator::Greater => FloatPredicate::Ugt,
        BinaryOperator::GreaterEq => FloatPredicate::Uge,
        BinaryOperator::Eq => FloatPredicate::Ueq,
        BinaryOperator::NotEq => FloatPredicate::Une,
        _ => return None,
    };
    Some(pred)
}
