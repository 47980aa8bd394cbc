use std::{collections::HashMap, fmt};

use log::trace;

use crate::{ir::Value, types::Type};

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: Box<str>,
    /// For variables and arrays, a pointer to their storage. For functions, the
    /// function itself.
    pub binding: Value,
    /// The declared type. For functions, the return type.
    pub ty: Type,
    pub kind: SymbolKind,
    /// The name the symbol has in the emitted IR, if it differs from `name`.
    pub unique_name: Option<String>,
    /// The local scope depth the symbol was added at, or `None` if global.
    pub frame: Option<usize>,
}

impl Symbol {
    pub fn new(name: impl Into<Box<str>>, binding: Value, ty: Type, kind: SymbolKind) -> Symbol {
        Symbol {
            name: name.into(),
            binding,
            ty,
            kind,
            unique_name: None,
            frame: None,
        }
    }

    #[must_use]
    pub fn with_unique_name(mut self, unique_name: impl Into<String>) -> Symbol {
        self.unique_name = Some(unique_name.into());
        self
    }

    /// The name to use for this symbol in the emitted IR.
    pub fn ir_name(&self) -> &str {
        self.unique_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }

    pub fn shape(&self) -> Shape<'_> {
        Shape(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SymbolKind {
    Variable,
    Array { len: u32 },
    Function { params: Vec<ParamShape> },
}

/// The type of a procedure parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParamShape {
    pub ty: Type,
    /// Set for array parameters.
    pub len: Option<u32>,
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.len {
            Some(len) => write!(f, "{}[{len}]", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

/// Displays the type and kind of a symbol, as in `integer[4]`.
pub struct Shape<'a>(&'a Symbol);

impl fmt::Display for Shape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.0;
        match &symbol.kind {
            SymbolKind::Variable => write!(f, "{}", symbol.ty),
            SymbolKind::Array { len } => write!(f, "{}[{len}]", symbol.ty),
            SymbolKind::Function { .. } => write!(f, "procedure returning {}", symbol.ty),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddError {
    #[error("{0} is already declared in this scope")]
    Duplicate(Box<str>),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    #[error("{name} expected a value of type {expected}, but got {actual}")]
    TypeMismatch {
        name: Box<str>,
        expected: String,
        actual: String,
    },
    #[error("{0} is not declared")]
    NotFound(Box<str>),
}

struct Scope {
    namespace: Box<str>,
    symbols: HashMap<Box<str>, Symbol>,
}

/// Maps names to symbols. Local scopes form a stack on top of the global
/// scope; lookups go from the innermost local scope outwards.
pub struct SymbolTable {
    globals: HashMap<Box<str>, Symbol>,
    locals: Vec<Scope>,
    unique_counter: u32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            globals: HashMap::with_capacity(32),
            locals: Vec::with_capacity(4),
            unique_counter: 0,
        }
    }

    /// Adds a symbol to the innermost scope, or to the global scope if
    /// `is_global` is set or no local scope exists.
    pub fn add(&mut self, mut symbol: Symbol, is_global: bool) -> Result<(), AddError> {
        let depth = self.depth();
        let (table, frame) = match self.locals.last_mut() {
            Some(scope) if !is_global => (&mut scope.symbols, Some(depth)),
            _ => (&mut self.globals, None),
        };
        if table.contains_key(&symbol.name) {
            return Err(AddError::Duplicate(symbol.name));
        }
        trace!("adding symbol {} ({}) at {frame:?}", symbol.name, symbol.shape());
        symbol.frame = frame;
        table.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Replaces the binding of an existing symbol. The type and kind of the
    /// provided symbol must match the existing ones.
    pub fn update(&mut self, symbol: Symbol) -> Result<(), UpdateError> {
        let Some(existing) = self.lookup_mut(&symbol.name) else {
            return Err(UpdateError::NotFound(symbol.name));
        };
        if existing.ty != symbol.ty || existing.kind != symbol.kind {
            return Err(UpdateError::TypeMismatch {
                expected: existing.shape().to_string(),
                actual: symbol.shape().to_string(),
                name: symbol.name,
            });
        }
        existing.binding = symbol.binding;
        Ok(())
    }

    /// Finds a symbol, innermost scope first, global scope last.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
            .or_else(|| self.globals.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        for scope in self.locals.iter_mut().rev() {
            if let Some(symbol) = scope.symbols.get_mut(name) {
                return Some(symbol);
            }
        }
        self.globals.get_mut(name)
    }

    /// Whether the innermost scope (global if there are no local scopes)
    /// contains `name`.
    pub fn contains_in_current(&self, name: &str) -> bool {
        match self.locals.last() {
            Some(scope) => scope.symbols.contains_key(name),
            None => self.globals.contains_key(name),
        }
    }

    pub fn contains_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    /// Whether adding `name` to the scope selected by `is_global` (as in
    /// [`SymbolTable::add`]) would fail.
    pub fn is_declared(&self, name: &str, is_global: bool) -> bool {
        if is_global {
            self.contains_global(name)
        } else {
            self.contains_in_current(name)
        }
    }

    pub fn push_scope(&mut self, namespace: &str) {
        trace!("entering scope {namespace}");
        self.locals.push(Scope {
            namespace: namespace.into(),
            symbols: HashMap::with_capacity(16),
        });
    }

    pub fn pop_scope(&mut self) {
        let scope = self.locals.pop();
        debug_assert!(scope.is_some(), "unbalanced scope pop");
        if let Some(scope) = scope {
            trace!("leaving scope {}", scope.namespace);
        }
    }

    /// The number of local scopes.
    pub fn depth(&self) -> usize {
        self.locals.len()
    }

    /// The IR name for a procedure declared in the current scope. Procedures
    /// of the outermost scope keep their name, nested ones are prefixed by
    /// the enclosing procedures' names.
    pub fn qualified_name(&self, name: &str) -> String {
        let mut qualified = String::with_capacity(name.len());
        for scope in self.locals.iter().skip(1) {
            qualified.push_str(&scope.namespace);
            qualified.push('.');
        }
        qualified.push_str(name);
        qualified
    }

    /// Returns a name which no other call returns, namespaced by the current
    /// scopes.
    pub fn fresh_unique_name(&mut self, hint: &str) -> String {
        let id = self.unique_counter;
        self.unique_counter += 1;
        let mut unique = String::new();
        for scope in &self.locals {
            unique.push_str(&scope.namespace);
            unique.push('.');
        }
        unique.push_str(hint);
        unique.push('.');
        unique.push_str(&id.to_string());
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrType;
    use pretty_assertions::assert_eq;

    fn variable(name: &str, ty: Type) -> Symbol {
        let binding = Value::local(IrType::Ptr, format!("{name}.0"));
        Symbol::new(name, binding, ty, SymbolKind::Variable)
    }

    #[test]
    fn test_lookup_after_add() {
        let mut t = SymbolTable::new();
        t.push_scope("main");
        t.add(variable("x", Type::Float), false).unwrap();
        let x = t.lookup("x").unwrap();
        assert_eq!(x.ty, Type::Float);
        assert_eq!(x.frame, Some(1));
    }

    #[test]
    fn test_duplicates_in_same_scope() {
        let mut t = SymbolTable::new();
        t.push_scope("main");
        t.add(variable("x", Type::Integer), false).unwrap();
        assert_eq!(
            t.add(variable("x", Type::Bool), false),
            Err(AddError::Duplicate("x".into()))
        );
        // Shadowing in another scope is fine.
        t.add(variable("x", Type::Bool), true).unwrap();
        t.push_scope("f");
        t.add(variable("x", Type::String), false).unwrap();
        assert_eq!(t.lookup("x").unwrap().ty, Type::String);
    }

    #[test]
    fn test_lookup_order() {
        let mut t = SymbolTable::new();
        t.add(variable("g", Type::Integer), true).unwrap();
        t.push_scope("main");
        t.add(variable("g", Type::Float), false).unwrap();
        t.push_scope("f");
        assert_eq!(t.lookup("g").unwrap().ty, Type::Float);
        t.pop_scope();
        t.pop_scope();
        assert_eq!(t.lookup("g").unwrap().ty, Type::Integer);
        assert_eq!(t.lookup("g").unwrap().frame, None);
        assert!(t.lookup("missing").is_none());
    }

    #[test]
    fn test_update() {
        let mut t = SymbolTable::new();
        t.push_scope("main");
        t.add(variable("x", Type::Integer), false).unwrap();

        let mut next = variable("x", Type::Integer);
        next.binding = Value::local(IrType::Ptr, "x.9");
        t.update(next).unwrap();
        assert_eq!(t.lookup("x").unwrap().binding, Value::local(IrType::Ptr, "x.9"));

        assert_eq!(
            t.update(variable("x", Type::String)),
            Err(UpdateError::TypeMismatch {
                name: "x".into(),
                expected: "integer".into(),
                actual: "string".into(),
            })
        );
        let array = Symbol::new(
            "x",
            Value::local(IrType::Ptr, "x.0"),
            Type::Integer,
            SymbolKind::Array { len: 3 },
        );
        assert!(matches!(
            t.update(array),
            Err(UpdateError::TypeMismatch { .. })
        ));
        assert_eq!(
            t.update(variable("y", Type::Integer)),
            Err(UpdateError::NotFound("y".into()))
        );
    }

    #[test]
    fn test_qualified_and_unique_names() {
        let mut t = SymbolTable::new();
        assert_eq!(t.fresh_unique_name("str"), "str.0");
        t.push_scope("prog");
        assert_eq!(t.qualified_name("f"), "f");
        t.push_scope("f");
        assert_eq!(t.qualified_name("g"), "f.g");
        t.push_scope("g");
        assert_eq!(t.qualified_name("h"), "f.g.h");
        assert_eq!(t.fresh_unique_name("str"), "prog.f.g.str.1");
        assert_eq!(t.depth(), 3);
        assert!(!t.contains_in_current("h"));
        t.add(variable("h", Type::Bool), true).unwrap();
        assert!(t.contains_global("h"));
        assert!(t.is_declared("h", true));
        assert!(!t.is_declared("h", false));
    }
}
