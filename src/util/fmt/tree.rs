use std::io::Write;

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    writeln!(w, "program {}", program.name)?;
    for decl in &program.declarations {
        print_stmt(w, 1, decl)?;
    }
    sp(w, 1)?;
    writeln!(w, "begin")?;
    for stmt in &program.statements {
        print_stmt(w, 1, stmt)?;
    }
    Ok(())
}

pub fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    sp(w, i)?;
    let line = stmt.line;
    match &stmt.kind {
        StmtKind::Assignment(assignment) => print_assignment(w, i, assignment, line)?,
        StmtKind::Declaration(decl) => {
            print_declaration(w, decl)?;
            writeln!(w, " (L{line})")?;
        }
        StmtKind::TypeDeclaration {
            name,
            ty,
            is_global,
        } => {
            write_global(w, *is_global)?;
            writeln!(w, "type {name} is {ty} (L{line})")?;
        }
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            writeln!(w, "if (L{line})")?;
            print_expr(w, i + 1, cond)?;
            sp(w, i + 1)?;
            writeln!(w, "then")?;
            for stmt in then_block {
                print_stmt(w, i + 2, stmt)?;
            }
            if let Some(else_block) = else_block {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                for stmt in else_block {
                    print_stmt(w, i + 2, stmt)?;
                }
            }
        }
        StmtKind::Loop { init, cond, body } => {
            writeln!(w, "for (L{line})")?;
            sp(w, i + 1)?;
            print_assignment(w, i + 1, init, line)?;
            print_expr(w, i + 1, cond)?;
            sp(w, i + 1)?;
            writeln!(w, "do")?;
            for stmt in body {
                print_stmt(w, i + 2, stmt)?;
            }
        }
        StmtKind::Return(expr) => {
            writeln!(w, "return (L{line})")?;
            print_expr(w, i + 1, expr)?;
        }
        StmtKind::Function(procedure) => {
            write_global(w, procedure.is_global)?;
            write!(w, "procedure {}(", procedure.name)?;
            for (idx, param) in procedure.params.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                write!(w, "{}: {}", param.name, param.ty)?;
                if let Some(bound) = param.bound {
                    write!(w, "[{bound}]")?;
                }
            }
            writeln!(w, ") : {} (L{line})", procedure.ret)?;
            for stmt in &procedure.body {
                print_stmt(w, i + 1, stmt)?;
            }
        }
        StmtKind::Call(expr) => {
            writeln!(w, "call (L{line})")?;
            print_expr(w, i + 1, expr)?;
        }
    }
    Ok(())
}

/// Prints the declaration without a line break.
fn print_declaration(w: &mut impl Write, decl: &Declaration) -> std::io::Result<()> {
    write_global(w, decl.is_global)?;
    write!(w, "variable {}: {}", decl.name, decl.ty)?;
    if let Some(bound) = decl.bound {
        write!(w, "[{bound}]")?;
    }
    Ok(())
}

fn print_assignment(
    w: &mut impl Write,
    i: usize,
    assignment: &Assignment,
    line: u32,
) -> std::io::Result<()> {
    writeln!(w, "assign (L{line})")?;
    print_variable(w, i + 1, &assignment.dest)?;
    print_expr(w, i + 1, &assignment.expr)
}

fn print_variable(w: &mut impl Write, i: usize, var: &VariableRef) -> std::io::Result<()> {
    sp(w, i)?;
    let sign = if var.negated { "-" } else { "" };
    writeln!(w, "{sign}variable {}", var.name)?;
    if let Some(index) = &var.index {
        print_expr(w, i + 1, index)?;
    }
    Ok(())
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => {
            sp(w, i)?;
            writeln!(w, "binary {op:?}")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Unary { op, operand } => {
            sp(w, i)?;
            writeln!(w, "unary {op:?}")?;
            print_expr(w, i + 1, operand)?;
        }
        ExprKind::Variable(var) => print_variable(w, i, var)?,
        ExprKind::Literal(literal) => {
            sp(w, i)?;
            match literal {
                Literal::Integer(val) => writeln!(w, "integer {val}")?,
                Literal::Float(val) => writeln!(w, "float {val}")?,
                Literal::Bool(val) => writeln!(w, "bool {val}")?,
                Literal::String(val) => writeln!(w, "string {val:?}")?,
            }
        }
        ExprKind::Call { callee, args } => {
            sp(w, i)?;
            writeln!(w, "call {callee}")?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
    }
    Ok(())
}

fn write_global(w: &mut impl Write, is_global: bool) -> std::io::Result<()> {
    if is_global {
        write!(w, "global ")?;
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
