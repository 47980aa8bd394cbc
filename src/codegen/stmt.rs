use log::{debug, trace, warn};

use super::{can_coerce, report, resolve_type, Codegen, Error, ErrorKind, FrameKind, Report};
use crate::{
    ast::{Assignment, Declaration, Expr, Procedure, Stmt, StmtKind},
    diagnostic::Diagnostic,
    ir::{IntPredicate, IrType, Param, Value},
    symbol_table::{AddError, ParamShape, Symbol, SymbolKind},
    types::Type,
};

impl Stmt {
    /// Lowers the statement at the builder's cursor, recording errors in
    /// `self.errors` (children's errors included). Returns the value computed
    /// by an assignment or a call.
    pub fn lower(&mut self, cx: &mut Codegen) -> Option<(Value, Type)> {
        let Stmt { kind, line, errors } = self;
        let line = *line;
        trace!("lowering statement at line {line}");
        match kind {
            StmtKind::Assignment(assignment) => cx.assign(assignment, line, errors),
            StmtKind::Call(expr) => expr.lower(cx, errors),
            StmtKind::Declaration(decl) => {
                cx.declare(decl, errors);
                None
            }
            StmtKind::TypeDeclaration { name, ty, .. } => {
                warn!("ignoring declaration of type {name} ({ty}) at line {line}");
                let message = format!("type declaration {name} is ignored");
                cx.warnings.push(Diagnostic::warning(line, message));
                None
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                cx.lower_if(cond, then_block, else_block.as_deref_mut(), errors);
                None
            }
            StmtKind::Loop { init, cond, body } => {
                cx.lower_loop(init, cond, body, line, errors);
                None
            }
            StmtKind::Return(expr) => {
                cx.lower_return(expr, line, errors);
                None
            }
            StmtKind::Function(procedure) => {
                cx.define_procedure(procedure, line, errors);
                None
            }
        }
    }
}

/// Lowers each statement in order, collecting their errors into `errors`.
fn lower_block(cx: &mut Codegen, stmts: &mut [Stmt], errors: &mut Vec<Error>) {
    for stmt in stmts {
        stmt.lower(cx);
        errors.extend(stmt.errors.iter().cloned());
    }
}

impl Codegen {
    fn assign(
        &mut self,
        assignment: &mut Assignment,
        line: u32,
        errors: &mut Vec<Error>,
    ) -> Option<(Value, Type)> {
        let (value, ty) = assignment.expr.lower(self, errors)?;
        let dest = &mut assignment.dest;
        let symbol = self.variable(&dest.name).report(errors, dest.line)?;

        // The table rejects the assigned type unless it's the declared one.
        let assigned_ty = if can_coerce(ty, symbol.ty) { symbol.ty } else { ty };
        let assigned = Symbol {
            ty: assigned_ty,
            ..symbol.clone()
        };
        self.symbols.update(assigned).report(errors, line)?;

        let value = self.coerce(value, ty, symbol.ty)?;
        let ptr = self.address(&symbol, dest, errors)?;
        self.builder.store(value.clone(), ptr);
        Some((value, symbol.ty))
    }

    fn declare(&mut self, decl: &Declaration, errors: &mut Vec<Error>) -> Option<()> {
        let line = decl.line;
        let ty = resolve_type(&decl.ty).report(errors, line)?;
        if self.symbols.is_declared(&decl.name, decl.is_global) {
            return report(errors, line, AddError::Duplicate(decl.name.clone()));
        }
        let (kind, ir_ty) = match decl.bound {
            None => (SymbolKind::Variable, ty.ir()),
            Some(bound) => {
                let len = array_len(&decl.name, bound).report(errors, line)?;
                (SymbolKind::Array { len }, ty.ir_array(len))
            }
        };

        let symbol = if decl.is_global {
            match self.builder.global_variable(&decl.name, ir_ty.clone()) {
                Ok(ptr) => Symbol::new(decl.name.clone(), ptr, ty, kind),
                Err(_) => {
                    // Taken by a procedure, use a fresh name in the module.
                    let unique = self.symbols.fresh_unique_name(&decl.name);
                    let ptr = self
                        .builder
                        .global_variable(&unique, ir_ty)
                        .report(errors, line)?;
                    Symbol::new(decl.name.clone(), ptr, ty, kind).with_unique_name(unique)
                }
            }
        } else {
            let ptr = self.builder.alloca(ir_ty, &decl.name);
            Symbol::new(decl.name.clone(), ptr, ty, kind)
        };
        self.symbols.add(symbol, decl.is_global).report(errors, line)
    }

    /// Lowers a condition to an `i1`.
    fn condition(&mut self, cond: &mut Expr, errors: &mut Vec<Error>) -> Option<Value> {
        let (value, ty) = cond.lower(self, errors)?;
        match ty {
            Type::Bool => Some(value),
            Type::Integer => Some(self.builder.icmp(IntPredicate::Ne, value, Value::int(0), "cond")),
            ty => report(errors, cond.line, ErrorKind::ConditionType(ty)),
        }
    }

    fn lower_if(
        &mut self,
        cond: &mut Expr,
        then_block: &mut [Stmt],
        else_block: Option<&mut [Stmt]>,
        errors: &mut Vec<Error>,
    ) {
        let cond = self.condition(cond, errors);
        let then_bb = self.builder.append_block("then");
        let else_bb = else_block.is_some().then(|| self.builder.append_block("else"));
        let merge_bb = self.builder.append_block("merge");
        match cond {
            Some(cond) => self.builder.cond_br(cond, then_bb, else_bb.unwrap_or(merge_bb)),
            None => self.builder.br(then_bb),
        }

        self.builder.position_at_end(then_bb);
        lower_block(self, then_block, errors);
        let then_terminated = self.builder.is_terminated();
        if !then_terminated {
            self.builder.br(merge_bb);
        }

        let mut else_terminated = false;
        if let (Some(else_bb), Some(else_block)) = (else_bb, else_block) {
            self.builder.position_at_end(else_bb);
            lower_block(self, else_block, errors);
            else_terminated = self.builder.is_terminated();
            if !else_terminated {
                self.builder.br(merge_bb);
            }
        }

        self.builder.position_at_end(merge_bb);
        if then_terminated && else_terminated {
            self.builder.unreachable();
        }
    }

    fn lower_loop(
        &mut self,
        init: &mut Assignment,
        cond: &mut Expr,
        body: &mut [Stmt],
        line: u32,
        errors: &mut Vec<Error>,
    ) {
        self.assign(init, line, errors);
        let cond_bb = self.builder.append_block("loop.cond");
        let body_bb = self.builder.append_block("loop.body");
        let end_bb = self.builder.append_block("loop.end");
        self.builder.br(cond_bb);

        self.builder.position_at_end(cond_bb);
        match self.condition(cond, errors) {
            Some(cond) => self.builder.cond_br(cond, body_bb, end_bb),
            None => self.builder.br(end_bb),
        }

        self.builder.position_at_end(body_bb);
        lower_block(self, body, errors);
        if !self.builder.is_terminated() {
            self.builder.br(cond_bb);
        }
        self.builder.position_at_end(end_bb);
    }

    fn lower_return(&mut self, expr: &mut Expr, line: u32, errors: &mut Vec<Error>) {
        let Some(ret) = self.return_type() else {
            report::<()>(errors, line, ErrorKind::ReturnOutsideProcedure);
            return;
        };
        if self.builder.is_terminated() {
            report::<()>(errors, line, ErrorKind::ReturnAfterTerminator);
            return;
        }
        let value = match expr.lower(self, errors) {
            Some((value, ty)) if can_coerce(ty, ret) => self.coerce(value, ty, ret),
            Some((_, actual)) => {
                report(errors, line, ErrorKind::ReturnType { expected: ret, actual })
            }
            None => None,
        };
        // A failed return still ends the block.
        match value {
            Some(value) => self.builder.ret(value),
            None => self.builder.unreachable(),
        }
    }

    fn define_procedure(
        &mut self,
        procedure: &mut Procedure,
        line: u32,
        errors: &mut Vec<Error>,
    ) -> Option<()> {
        let ret = resolve_type(&procedure.ret).report(errors, line);
        let params = self.resolve_params(&procedure.params, errors);
        let (ret, params) = ret.zip(params)?;
        if self.symbols.is_declared(&procedure.name, procedure.is_global) {
            return report(errors, line, AddError::Duplicate(procedure.name.clone()));
        }

        let ir_name = self.symbols.qualified_name(&procedure.name);
        let ir_params = params
            .iter()
            .map(|(decl, shape)| Param {
                name: arg_name(&decl.name),
                ty: if shape.len.is_some() { IrType::Ptr } else { shape.ty.ir() },
            })
            .collect();
        let saved = self.builder.save_cursor();
        let entry = self
            .builder
            .define_function(&ir_name, ret.ir(), ir_params)
            .report(errors, line)?;

        // Added before the body, so the procedure can call itself.
        let shapes = params.iter().map(|(_, shape)| *shape).collect();
        let binding = Value::global(IrType::Ptr, ir_name.as_str());
        let symbol = Symbol::new(
            procedure.name.clone(),
            binding,
            ret,
            SymbolKind::Function { params: shapes },
        )
        .with_unique_name(ir_name.as_str());
        self.symbols.add(symbol, procedure.is_global).report(errors, line)?;

        debug!("lowering procedure {ir_name}");
        self.builder.position_at_end(entry);
        let frame = FrameKind::Procedure { ret };
        self.with_scope(&procedure.name, frame, |cx| {
            cx.bind_params(&params, errors);
            let mut last = None;
            for stmt in &mut procedure.body {
                if let Some(value) = stmt.lower(cx) {
                    last = Some(value);
                }
                errors.extend(stmt.errors.iter().cloned());
            }
            if !cx.builder.is_terminated() {
                cx.implicit_return(&procedure.name, last, ret, line, errors);
            }
        });
        self.builder.restore_cursor(saved);
        Some(())
    }

    fn resolve_params<'a>(
        &mut self,
        params: &'a [Declaration],
        errors: &mut Vec<Error>,
    ) -> Option<Vec<(&'a Declaration, ParamShape)>> {
        let mut shapes = Vec::with_capacity(params.len());
        for param in params {
            let ty = resolve_type(&param.ty).report(errors, param.line);
            let len = match param.bound {
                Some(bound) => array_len(&param.name, bound).report(errors, param.line).map(Some),
                None => Some(None),
            };
            if let Some((ty, len)) = ty.zip(len) {
                shapes.push((param, ParamShape { ty, len }));
            }
        }
        (shapes.len() == params.len()).then_some(shapes)
    }

    /// Binds the parameters of the current function in the current scope.
    /// Scalars are copied into a stack slot, arrays are used in place.
    fn bind_params(&mut self, params: &[(&Declaration, ParamShape)], errors: &mut Vec<Error>) {
        for (decl, shape) in params {
            let name = arg_name(&decl.name);
            let symbol = match shape.len {
                Some(len) => {
                    let ptr = Value::local(IrType::Ptr, name);
                    Symbol::new(decl.name.clone(), ptr, shape.ty, SymbolKind::Array { len })
                }
                None => {
                    let slot = self.builder.alloca(shape.ty.ir(), &decl.name);
                    self.builder
                        .store(Value::local(shape.ty.ir(), name), slot.clone());
                    Symbol::new(decl.name.clone(), slot, shape.ty, SymbolKind::Variable)
                }
            };
            self.symbols.add(symbol, false).report(errors, decl.line);
        }
    }

    /// Returns the value computed last, for procedures whose body falls
    /// through.
    fn implicit_return(
        &mut self,
        name: &str,
        last: Option<(Value, Type)>,
        ret: Type,
        line: u32,
        errors: &mut Vec<Error>,
    ) {
        let value = match last {
            Some((value, ty)) if can_coerce(ty, ret) => self.coerce(value, ty, ret),
            Some((_, actual)) => {
                report(errors, line, ErrorKind::ReturnType { expected: ret, actual })
            }
            None => report(errors, line, ErrorKind::MissingReturn(name.into())),
        };
        match value {
            Some(value) => self.builder.ret(value),
            None => self.builder.unreachable(),
        }
    }
}

/// The IR name of a parameter. The suffix keeps it apart from block labels.
fn arg_name(name: &str) -> String {
    format!("{name}.arg")
}

fn array_len(name: &str, bound: i64) -> Result<u32, ErrorKind> {
    u32::try_from(bound)
        .ok()
        .filter(|&len| len > 0)
        .ok_or_else(|| ErrorKind::ArrayBounds {
            name: name.into(),
            bound,
        })
}
