use log::trace;

use super::{
    BinOp, Block, Declaration, FloatPredicate, Function, Global, GlobalKind, Instr, IntPredicate,
    IrType, Module, Operand, Param, Value,
};

/// An insertion point: the end of a block of some function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    function: usize,
    block: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("name {0} is already defined in the module")]
pub struct NameTaken(pub String);

/// Builds a [`Module`], appending instructions at the current cursor.
pub struct Builder {
    module: Module,
    cursor: Option<Cursor>,
}

impl Builder {
    pub fn new(module: Module) -> Builder {
        Builder {
            module,
            cursor: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn save_cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn restore_cursor(&mut self, cursor: Option<Cursor>) {
        self.cursor = cursor;
    }

    pub fn position_at_end(&mut self, cursor: Cursor) {
        self.cursor = Some(cursor);
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor.expect("builder has no insertion point")
    }

    /// Defines a new function, returning a cursor at its entry block.
    pub fn define_function(
        &mut self,
        name: &str,
        ret: IrType,
        params: Vec<Param>,
    ) -> Result<Cursor, NameTaken> {
        if self.module.has_symbol(name) {
            return Err(NameTaken(name.to_owned()));
        }
        trace!("defining function @{name}");
        self.module.functions.push(Function::new(name, ret, params));
        Ok(Cursor {
            function: self.module.functions.len() - 1,
            block: 0,
        })
    }

    /// Declares an external function. Declaring it again is a no-op.
    pub fn declare_function(&mut self, name: &str, ret: IrType, params: Vec<IrType>) {
        if self.module.declaration(name).is_some() {
            return;
        }
        self.module.declarations.push(Declaration {
            name: name.to_owned(),
            ret,
            params,
        });
    }

    /// Adds a zero initialized global variable, returning a pointer to it.
    pub fn global_variable(&mut self, name: &str, ty: IrType) -> Result<Value, NameTaken> {
        self.add_global(name, ty, GlobalKind::Variable)
    }

    /// Adds a constant string, returning a pointer to its first byte.
    pub fn global_string(&mut self, name: &str, text: &str) -> Result<Value, NameTaken> {
        let len = u32::try_from(text.len() + 1).unwrap_or(u32::MAX);
        let ty = IrType::Array(len, Box::new(IrType::I8));
        self.add_global(name, ty, GlobalKind::StringConstant(text.into()))
    }

    fn add_global(&mut self, name: &str, ty: IrType, kind: GlobalKind) -> Result<Value, NameTaken> {
        if self.module.has_symbol(name) {
            return Err(NameTaken(name.to_owned()));
        }
        self.module.globals.push(Global {
            name: name.to_owned(),
            ty,
            kind,
        });
        Ok(Value::global(IrType::Ptr, name))
    }

    /// Appends a new block to the current function. The cursor doesn't move.
    pub fn append_block(&mut self, hint: &str) -> Cursor {
        let function = self.cursor().function;
        let f = &mut self.module.functions[function];
        let label = f.fresh_name(hint);
        f.blocks.push(Block::new(label));
        Cursor {
            function,
            block: f.blocks.len() - 1,
        }
    }

    pub fn label(&self, cursor: Cursor) -> &str {
        &self.module.functions[cursor.function].blocks[cursor.block].label
    }

    /// Whether the block at the cursor already ends with a terminator.
    pub fn is_terminated(&self) -> bool {
        self.current_block().is_terminated()
    }

    pub fn current_function(&self) -> &Function {
        &self.module.functions[self.cursor().function]
    }

    fn current_block(&self) -> &Block {
        let Cursor { function, block } = self.cursor();
        &self.module.functions[function].blocks[block]
    }

    fn fresh(&mut self, hint: &str) -> String {
        let function = self.cursor().function;
        self.module.functions[function].fresh_name(hint)
    }

    /// Appends an instruction. Anything emitted after a terminator lands in a
    /// fresh block without predecessors.
    fn emit(&mut self, instr: Instr) {
        if self.is_terminated() {
            let dead = self.append_block("dead");
            self.position_at_end(dead);
        }
        let Cursor { function, block } = self.cursor();
        self.module.functions[function].blocks[block]
            .instrs
            .push(instr);
    }

    /// Reserves a stack slot in the entry block of the current function.
    pub fn alloca(&mut self, ty: IrType, hint: &str) -> Value {
        let dest = self.fresh(hint);
        let function = self.cursor().function;
        let entry = &mut self.module.functions[function].blocks[0];
        let at = entry
            .instrs
            .iter()
            .take_while(|i| matches!(i, Instr::Alloca { .. }))
            .count();
        entry.instrs.insert(
            at,
            Instr::Alloca {
                dest: dest.clone(),
                ty,
            },
        );
        Value::local(IrType::Ptr, dest)
    }

    pub fn load(&mut self, ty: IrType, ptr: Value, hint: &str) -> Value {
        let dest = self.fresh(hint);
        self.emit(Instr::Load {
            dest: dest.clone(),
            ty: ty.clone(),
            ptr,
        });
        Value::local(ty, dest)
    }

    pub fn store(&mut self, value: Value, ptr: Value) {
        self.emit(Instr::Store { value, ptr });
    }

    pub fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value, hint: &str) -> Value {
        let dest = self.fresh(hint);
        let ty = lhs.ty.clone();
        self.emit(Instr::Binary {
            dest: dest.clone(),
            op,
            lhs,
            rhs,
        });
        Value::local(ty, dest)
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value, hint: &str) -> Value {
        let dest = self.fresh(hint);
        self.emit(Instr::ICmp {
            dest: dest.clone(),
            pred,
            lhs,
            rhs,
        });
        Value::local(IrType::I1, dest)
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value, hint: &str) -> Value {
        let dest = self.fresh(hint);
        self.emit(Instr::FCmp {
            dest: dest.clone(),
            pred,
            lhs,
            rhs,
        });
        Value::local(IrType::I1, dest)
    }

    pub fn fneg(&mut self, operand: Value, hint: &str) -> Value {
        let dest = self.fresh(hint);
        self.emit(Instr::FNeg {
            dest: dest.clone(),
            operand,
        });
        Value::local(IrType::Float, dest)
    }

    /// Converts a signed integer to float. Constants are folded.
    #[allow(clippy::cast_precision_loss)]
    pub fn sitofp(&mut self, operand: Value, hint: &str) -> Value {
        if let Operand::Int(value) = operand.operand {
            return Value::float(value as f32);
        }
        let dest = self.fresh(hint);
        self.emit(Instr::SIToFP {
            dest: dest.clone(),
            operand,
        });
        Value::local(IrType::Float, dest)
    }

    pub fn gep(&mut self, elem_ty: IrType, ptr: Value, index: Value, hint: &str) -> Value {
        let dest = self.fresh(hint);
        self.emit(Instr::GetElementPtr {
            dest: dest.clone(),
            elem_ty,
            ptr,
            index,
        });
        Value::local(IrType::Ptr, dest)
    }

    pub fn call(&mut self, callee: &str, ret: IrType, args: Vec<Value>, hint: &str) -> Value {
        let dest = self.fresh(hint);
        self.emit(Instr::Call {
            dest: dest.clone(),
            ret: ret.clone(),
            callee: callee.to_owned(),
            args,
        });
        Value::local(ret, dest)
    }

    pub fn br(&mut self, target: Cursor) {
        let target = self.label(target).to_owned();
        self.emit(Instr::Br { target });
    }

    pub fn cond_br(&mut self, cond: Value, then_block: Cursor, else_block: Cursor) {
        let then_target = self.label(then_block).to_owned();
        let else_target = self.label(else_block).to_owned();
        self.emit(Instr::CondBr {
            cond,
            then_target,
            else_target,
        });
    }

    pub fn ret(&mut self, value: Value) {
        self.emit(Instr::Ret { value });
    }

    pub fn unreachable(&mut self) {
        self.emit(Instr::Unreachable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_allocas_stay_at_entry_start() {
        let mut b = Builder::new(Module::new("m"));
        let entry = b.define_function("f", IrType::I32, vec![]).unwrap();
        b.position_at_end(entry);
        let x = b.alloca(IrType::I32, "x");
        b.store(Value::int(1), x);
        let next = b.append_block("next");
        b.br(next);
        b.position_at_end(next);
        b.alloca(IrType::Float, "y");
        b.ret(Value::int(0));

        let f = b.module().function("f").unwrap();
        assert!(matches!(f.blocks[0].instrs[0], Instr::Alloca { .. }));
        assert!(matches!(f.blocks[0].instrs[1], Instr::Alloca { .. }));
        assert!(f.blocks[0].is_terminated());
        assert!(f.blocks[1].is_terminated());
    }

    #[test]
    fn test_emit_after_terminator_opens_dead_block() {
        let mut b = Builder::new(Module::new("m"));
        let entry = b.define_function("f", IrType::I32, vec![]).unwrap();
        b.position_at_end(entry);
        b.ret(Value::int(0));
        b.ret(Value::int(1));

        let f = b.module().function("f").unwrap();
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(f.blocks[1].label, "dead.0");
        assert!(f.blocks.iter().all(Block::is_terminated));
    }

    #[test]
    fn test_sitofp_folds_constants() {
        let mut b = Builder::new(Module::new("m"));
        let entry = b.define_function("f", IrType::Float, vec![]).unwrap();
        b.position_at_end(entry);
        assert_eq!(b.sitofp(Value::int(3), "conv"), Value::float(3.0));
        assert!(b.current_function().blocks[0].instrs.is_empty());
    }

    #[test]
    fn test_name_collisions() {
        let mut b = Builder::new(Module::new("m"));
        b.declare_function("putinteger", IrType::I1, vec![IrType::I32]);
        b.declare_function("putinteger", IrType::I1, vec![IrType::I32]);
        assert_eq!(b.module().declarations.len(), 1);
        assert_eq!(
            b.define_function("putinteger", IrType::I32, vec![]),
            Err(NameTaken("putinteger".into()))
        );
        b.global_variable("g", IrType::I32).unwrap();
        assert!(b.global_string("g", "text").is_err());
    }
}
