use log::{debug, trace};

use crate::{
    ast::{
        Assignment, BinaryOperator, Declaration, Expr, ExprKind, Ident, Literal, Procedure,
        Program, Stmt, StmtKind, TypeMark, UnaryOperator, VariableRef,
    },
    driver::Options,
    scanner::{extract, Scanner},
    token::{Pos, Positioned, Span, Token, TokenKind},
    types::Type,
};

type Result<T, E = ()> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T, (Option<T>, Vec<Positioned<Error>>)>;

/// Parses a whole program into memory.
pub fn parse_program(src: &str, options: &Options) -> ParseResult<Program> {
    let mut p = Parser::new(src, options);
    let program = p.parse_program();
    let errors = p.take_errors();
    match program {
        Ok(program) if errors.is_empty() => Ok(program),
        program => Err((program.ok(), errors)),
    }
}

/// Parses a standalone expression, which must span the whole input.
pub fn parse_expr(src: &str) -> ParseResult<Expr> {
    let mut p = Parser::new(src, &Options::default());
    let expr = p.parse_expr().and_then(|expr| {
        p.consume(TokenKind::Eof)?;
        Ok(expr)
    });
    let errors = p.take_errors();
    match expr {
        Ok(expr) if errors.is_empty() => Ok(expr),
        expr => Err((expr.ok(), errors)),
    }
}

/// The outcome of asking the parser for the next top-level item.
#[derive(Debug, PartialEq)]
pub enum Next<T> {
    Item(T),
    /// The item had a syntax error and the parser resynchronized at the next
    /// `;`. The error was recorded.
    Recovered,
    /// The current section is over (`begin` for declarations, `end program .`
    /// for statements).
    End,
    /// The input ended prematurely. The error was recorded.
    Eof,
}

pub struct Parser<'src> {
    src: &'src str,
    scanner: Scanner<'src>,
    current: Token,
    next: Token,
    errors: Vec<Positioned<Error>>,
}

impl<'src> Parser<'src> {
    pub fn new(src: &'src str, options: &Options) -> Parser<'src> {
        let scanner = Scanner::new(src).with_tab_width(options.tab_width);
        let placeholder = Token::new(TokenKind::Eof, Span::new_of_length(0, 0), Pos::default());
        let mut p = Parser {
            src,
            scanner,
            current: placeholder,
            next: placeholder,
            errors: Vec::with_capacity(8),
        };
        p.current = p.pull();
        p.next = p.pull();
        p
    }

    /// Returns all errors recorded so far, leaving the parser's list empty.
    pub fn take_errors(&mut self) -> Vec<Positioned<Error>> {
        std::mem::take(&mut self.errors)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Parses `program <name> is`.
    pub fn parse_header(&mut self) -> Result<Ident> {
        self.consume(TokenKind::Program)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::Is)?;
        debug!("parsed header of program {name}");
        Ok(name)
    }

    /// Parses the next declaration of the program's declaration section. The
    /// section ends at `begin`, which is consumed.
    pub fn parse_next_declaration(&mut self) -> Next<Stmt> {
        match self.peek().kind {
            TokenKind::Begin => {
                self.advance();
                Next::End
            }
            TokenKind::Eof => self.premature_eof(),
            _ => self.next_item(|p| p.terminated(Parser::parse_declaration)),
        }
    }

    /// Parses the next statement of the program's body. The body ends at
    /// `end program .`, which is consumed along with the end of input.
    pub fn parse_next_statement(&mut self) -> Next<Stmt> {
        match self.peek().kind {
            TokenKind::End if self.peek_next().kind == TokenKind::Program => {
                // Errors in the trailer don't affect the already parsed body.
                _ = self.parse_trailer();
                Next::End
            }
            TokenKind::Eof => self.premature_eof(),
            _ => self.next_item(|p| p.terminated(Parser::parse_statement)),
        }
    }

    /// Skips tokens until a `;` is consumed. Returns false if the input ended
    /// first.
    pub fn recover(&mut self) -> bool {
        debug!("recovering from syntax error at {}", self.peek().pos);
        loop {
            match self.advance().kind {
                TokenKind::Semicolon => return true,
                TokenKind::Eof => return false,
                _ => (),
            }
        }
    }

    fn next_item(&mut self, f: impl FnOnce(&mut Self) -> Result<Stmt>) -> Next<Stmt> {
        match f(self) {
            Ok(stmt) => {
                trace!("parsed item at line {}", stmt.line);
                Next::Item(stmt)
            }
            Err(()) if self.recover() => Next::Recovered,
            Err(()) => Next::Eof,
        }
    }

    fn premature_eof(&mut self) -> Next<Stmt> {
        let c = self.peek();
        self.error(c.pos.wrap(Error::UnexpectedEof));
        Next::Eof
    }

    fn parse_trailer(&mut self) -> Result<()> {
        self.consume(TokenKind::End)?;
        self.consume(TokenKind::Program)?;
        self.consume(TokenKind::Period)?;
        let c = self.peek();
        if !c.is_eof() {
            self.error(c.pos.wrap(Error::TrailingInput { actual: c.kind }));
            return Err(());
        }
        Ok(())
    }

    /// Parses a whole program using the incremental interface.
    fn parse_program(&mut self) -> Result<Program> {
        let name = self.parse_header()?;
        let mut declarations = Vec::new();
        loop {
            match self.parse_next_declaration() {
                Next::Item(decl) => declarations.push(decl),
                Next::Recovered => (),
                Next::End => break,
                Next::Eof => return Err(()),
            }
        }
        let mut statements = Vec::new();
        loop {
            match self.parse_next_statement() {
                Next::Item(stmt) => statements.push(stmt),
                Next::Recovered => (),
                Next::End => break,
                Next::Eof => return Err(()),
            }
        }
        Ok(Program {
            name,
            declarations,
            statements,
        })
    }

    /// Runs the provided production and consumes the following `;`.
    fn terminated(&mut self, f: impl FnOnce(&mut Self) -> Result<Stmt>) -> Result<Stmt> {
        let stmt = f(self)?;
        self.consume(TokenKind::Semicolon)?;
        Ok(stmt)
    }

    fn parse_declaration(&mut self) -> Result<Stmt> {
        let line = self.peek().pos.line;
        let is_global = self.take(TokenKind::Global);
        let kind = match self.peek().kind {
            TokenKind::Procedure => StmtKind::Function(self.parse_procedure(is_global)?),
            TokenKind::Variable => StmtKind::Declaration(self.parse_variable(is_global)?),
            kind if kind.is_builtin_type() => {
                StmtKind::Declaration(self.parse_short_variable(is_global)?)
            }
            TokenKind::Type => {
                self.advance();
                let name = self.parse_ident()?;
                self.consume(TokenKind::Is)?;
                let ty = self.parse_type_mark()?;
                StmtKind::TypeDeclaration {
                    name,
                    ty,
                    is_global,
                }
            }
            actual => {
                let pos = self.peek().pos;
                self.error(pos.wrap(Error::UnexpectedAny {
                    actual,
                    expected: Box::from([
                        TokenKind::Procedure,
                        TokenKind::Variable,
                        TokenKind::Type,
                    ]),
                }));
                return Err(());
            }
        };
        Ok(Stmt::new(kind, line))
    }

    fn parse_procedure(&mut self, is_global: bool) -> Result<Procedure> {
        self.consume(TokenKind::Procedure)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::Colon)?;
        let ret = self.parse_type_mark()?;

        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::Comma, |p| {
            if p.is(TokenKind::RParen) {
                return Ok(None);
            }
            p.parse_parameter().map(Some)
        })?;
        self.consume(TokenKind::RParen)?;

        let mut body = self.parse_block(&[TokenKind::Begin], |p| {
            p.terminated(Parser::parse_declaration)
        })?;
        self.consume(TokenKind::Begin)?;
        body.extend(self.parse_block(&[TokenKind::End], |p| {
            p.terminated(Parser::parse_statement)
        })?);
        self.consume(TokenKind::End)?;
        self.consume(TokenKind::Procedure)?;

        Ok(Procedure {
            name,
            ret,
            params,
            body,
            is_global,
        })
    }

    fn parse_parameter(&mut self) -> Result<Declaration> {
        if self.peek().kind.is_builtin_type() {
            self.parse_short_variable(false)
        } else {
            self.parse_variable(false)
        }
    }

    /// Parses `variable <name> : <type_mark> [ '[' <bound> ']' ]`.
    fn parse_variable(&mut self, is_global: bool) -> Result<Declaration> {
        let line = self.consume(TokenKind::Variable)?.pos.line;
        let name = self.parse_ident()?;
        self.consume(TokenKind::Colon)?;
        let ty = self.parse_type_mark()?;
        let bound = self.parse_bound()?;
        Ok(Declaration {
            name,
            ty,
            is_global,
            bound,
            line,
        })
    }

    /// Parses `<builtin_type> <name> [ '[' <bound> ']' ]`.
    fn parse_short_variable(&mut self, is_global: bool) -> Result<Declaration> {
        let c = self.advance();
        let ty = Type::of_token(c.kind).ok_or(())?;
        let name = self.parse_ident()?;
        let bound = self.parse_bound()?;
        Ok(Declaration {
            name,
            ty: TypeMark::Builtin(ty),
            is_global,
            bound,
            line: c.pos.line,
        })
    }

    fn parse_bound(&mut self) -> Result<Option<i64>> {
        if !self.take(TokenKind::LBracket) {
            return Ok(None);
        }
        let negated = self.take(TokenKind::Minus);
        let token = self.consume(TokenKind::Integer)?;
        let bound = extract::int(token, self.src).map_err(|_| {
            self.error(token.pos.wrap(Error::ParseInt));
        })?;
        self.consume(TokenKind::RBracket)?;
        Ok(Some(if negated { -bound } else { bound }))
    }

    fn parse_type_mark(&mut self) -> Result<TypeMark> {
        let c = self.peek();
        if let Some(ty) = Type::of_token(c.kind) {
            self.advance();
            return Ok(TypeMark::Builtin(ty));
        }
        match c.kind {
            TokenKind::Identifier => Ok(TypeMark::Named(self.parse_ident()?)),
            TokenKind::EnumType => {
                self.advance();
                self.consume(TokenKind::LBrace)?;
                let variants = self.parse_list(TokenKind::Comma, |p| p.parse_ident().map(Some))?;
                self.consume(TokenKind::RBrace)?;
                Ok(TypeMark::Enum(variants))
            }
            actual => {
                self.error(c.pos.wrap(Error::UnexpectedAny {
                    actual,
                    expected: Box::from([
                        TokenKind::IntegerType,
                        TokenKind::FloatType,
                        TokenKind::StringType,
                        TokenKind::BoolType,
                        TokenKind::Identifier,
                        TokenKind::EnumType,
                    ]),
                }));
                Err(())
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let c = self.peek();
        let line = c.pos.line;
        let kind = match c.kind {
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_loop()?,
            TokenKind::Return => {
                self.advance();
                StmtKind::Return(self.parse_expr()?)
            }
            TokenKind::Identifier if self.peek_next().kind == TokenKind::LParen => {
                StmtKind::Call(self.parse_call()?)
            }
            TokenKind::Identifier => StmtKind::Assignment(self.parse_assignment()?),
            TokenKind::Global | TokenKind::Variable | TokenKind::Procedure | TokenKind::Type => {
                return self.parse_declaration();
            }
            kind if kind.is_builtin_type() => return self.parse_declaration(),
            actual => {
                self.error(c.pos.wrap(Error::ExpectedStatement { actual }));
                return Err(());
            }
        };
        Ok(Stmt::new(kind, line))
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.consume(TokenKind::If)?;
        self.consume(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        self.consume(TokenKind::Then)?;

        let then_block = self.parse_block(&[TokenKind::Else, TokenKind::End], |p| {
            p.terminated(Parser::parse_statement)
        })?;
        let else_block = if self.take(TokenKind::Else) {
            let block = self.parse_block(&[TokenKind::End], |p| {
                p.terminated(Parser::parse_statement)
            })?;
            Some(block)
        } else {
            None
        };
        self.consume(TokenKind::End)?;
        self.consume(TokenKind::If)?;

        Ok(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_loop(&mut self) -> Result<StmtKind> {
        self.consume(TokenKind::For)?;
        self.consume(TokenKind::LParen)?;
        let init = self.parse_assignment()?;
        self.consume(TokenKind::Semicolon)?;
        let cond = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;

        let body = self.parse_block(&[TokenKind::End], |p| {
            p.terminated(Parser::parse_statement)
        })?;
        self.consume(TokenKind::End)?;
        self.consume(TokenKind::For)?;

        Ok(StmtKind::Loop { init, cond, body })
    }

    fn parse_assignment(&mut self) -> Result<Assignment> {
        let dest = self.parse_name(false)?;
        self.consume(TokenKind::Assign)?;
        let expr = self.parse_expr()?;
        Ok(Assignment { dest, expr })
    }

    /// Parses items until one of the `terminators` is current, which is not
    /// consumed. A malformed item is skipped up to its `;`.
    fn parse_block(
        &mut self,
        terminators: &[TokenKind],
        mut parse_item: impl FnMut(&mut Self) -> Result<Stmt>,
    ) -> Result<Vec<Stmt>> {
        let mut items = Vec::new();
        loop {
            let c = self.peek();
            if terminators.contains(&c.kind) {
                return Ok(items);
            }
            if c.is_eof() {
                self.error(c.pos.wrap(Error::UnexpectedEof));
                return Err(());
            }
            match parse_item(self) {
                Ok(item) => items.push(item),
                Err(()) if self.recover() => (),
                Err(()) => {
                    let pos = self.peek().pos;
                    self.error(pos.wrap(Error::UnexpectedEof));
                    return Err(());
                }
            }
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_operand()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Amp => BinaryOperator::And,
                TokenKind::Pipe => BinaryOperator::Or,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_operand()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Parses `[not] <arithOp>`.
    fn parse_operand(&mut self) -> Result<Expr> {
        let c = self.peek();
        if !self.take(TokenKind::Not) {
            return self.parse_arith();
        }
        let operand = self.parse_arith()?;
        let kind = ExprKind::Unary {
            op: UnaryOperator::Not,
            operand: Box::new(operand),
        };
        Ok(Expr::new(kind, c.pos.line))
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relation()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relation()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relation(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOperator::Less,
                TokenKind::LessEq => BinaryOperator::LessEq,
                TokenKind::Greater => BinaryOperator::Greater,
                TokenKind::GreaterEq => BinaryOperator::GreaterEq,
                TokenKind::EqEq => BinaryOperator::Eq,
                TokenKind::NotEq => BinaryOperator::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let c = self.peek();
        let line = c.pos.line;
        let kind = match c.kind {
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::Identifier if self.peek_next().kind == TokenKind::LParen => {
                return self.parse_call();
            }
            TokenKind::Identifier => ExprKind::Variable(self.parse_name(false)?),
            TokenKind::Minus => {
                self.advance();
                match self.peek().kind {
                    TokenKind::Identifier => ExprKind::Variable(self.parse_name(true)?),
                    TokenKind::Integer | TokenKind::Float => {
                        ExprKind::Literal(self.parse_number(true)?)
                    }
                    token => {
                        let pos = self.peek().pos;
                        self.error(pos.wrap(Error::UnexpectedTokenInExpr { token }));
                        return Err(());
                    }
                }
            }
            TokenKind::Integer | TokenKind::Float => ExprKind::Literal(self.parse_number(false)?),
            TokenKind::String => {
                self.advance();
                ExprKind::Literal(Literal::String(extract::string(c, self.src)))
            }
            TokenKind::True => self.advance_with(ExprKind::Literal(Literal::Bool(true))),
            TokenKind::False => self.advance_with(ExprKind::Literal(Literal::Bool(false))),
            token => {
                self.error(c.pos.wrap(Error::UnexpectedTokenInExpr { token }));
                return Err(());
            }
        };
        Ok(Expr::new(kind, line))
    }

    /// Parses a numeric literal, folding a preceding `-` into it.
    fn parse_number(&mut self, negated: bool) -> Result<Literal> {
        let c = self.advance();
        if c.kind == TokenKind::Float {
            let value = extract::float(c, self.src).map_err(|_| {
                self.error(c.pos.wrap(Error::ParseFloat));
            })?;
            return Ok(Literal::Float(if negated { -value } else { value }));
        }
        let value = extract::int(c, self.src)
            .ok()
            .map(|value| if negated { -value } else { value })
            .and_then(|value| i32::try_from(value).ok());
        match value {
            Some(value) => Ok(Literal::Integer(value)),
            None => {
                self.error(c.pos.wrap(Error::ParseInt));
                Err(())
            }
        }
    }

    /// Parses `<identifier> [ '[' <expression> ']' ]`.
    fn parse_name(&mut self, negated: bool) -> Result<VariableRef> {
        let line = self.peek().pos.line;
        let name = self.parse_ident()?;
        let index = if self.take(TokenKind::LBracket) {
            let index = self.parse_expr()?;
            self.consume(TokenKind::RBracket)?;
            Some(Box::new(index))
        } else {
            None
        };
        Ok(VariableRef {
            name,
            index,
            negated,
            line,
        })
    }

    fn parse_call(&mut self) -> Result<Expr> {
        let line = self.peek().pos.line;
        let callee = self.parse_ident()?;
        self.consume(TokenKind::LParen)?;
        let args = self.parse_list(TokenKind::Comma, |p| {
            if p.is(TokenKind::RParen) {
                return Ok(None);
            }
            p.parse_expr().map(Some)
        })?;
        self.consume(TokenKind::RParen)?;
        Ok(Expr::new(ExprKind::Call { callee, args }, line))
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(extract::ident(token, self.src))
    }

    /// Parses `item (separator item)*`. The first item may be absent (the
    /// parsing function returns `None`), in which case the list is empty.
    fn parse_list<T>(
        &mut self,
        separator: TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> Result<Option<T>>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let Some(first) = parse_item(self)? else {
            return Ok(items);
        };
        items.push(first);
        while self.take(separator) {
            match parse_item(self)? {
                Some(item) => items.push(item),
                None => {
                    let c = self.peek();
                    self.error(c.pos.wrap(Error::UnexpectedAny {
                        actual: c.kind,
                        expected: Box::from([TokenKind::Identifier]),
                    }));
                    return Err(());
                }
            }
        }
        Ok(items)
    }
}

impl Parser<'_> {
    /// Adds an error.
    fn error(&mut self, error: Positioned<Error>) {
        trace!("syntax error at {}: {}", error.pos, error.inner);
        self.errors.push(error);
    }

    /// Pulls the next non-trivia token from the scanner. Lexical error tokens
    /// are reported and skipped.
    fn pull(&mut self) -> Token {
        loop {
            let token = self.scanner.next_token();
            if token.kind.is_trivia() {
                continue;
            }
            if token.kind.is_error() {
                self.error(token.pos.wrap(Error::Lexer(token.kind)));
                continue;
            }
            return token;
        }
    }

    /// Returns the current token.
    fn peek(&self) -> Token {
        self.current
    }

    /// Returns the token after the current one.
    fn peek_next(&self) -> Token {
        self.next
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.current;
        if !c.is_eof() {
            self.current = self.next;
            self.next = self.pull();
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, records an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            self.error(c.pos.wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }));
            Err(())
        }
    }
}

fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr) -> Expr {
    let line = lhs.line;
    let kind = ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    };
    Expr::new(kind, line)
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected token {expected:?}, but got {actual:?}")]
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    #[error("expected one of {expected:?}, but got {actual:?}")]
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    #[error("unexpected token {token:?} in expression")]
    UnexpectedTokenInExpr { token: TokenKind },
    #[error("expected a statement, but got {actual:?}")]
    ExpectedStatement { actual: TokenKind },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected token {actual:?} after end of program")]
    TrailingInput { actual: TokenKind },
    #[error("integer literal out of range")]
    ParseInt,
    #[error("malformed float literal")]
    ParseFloat,
    /// A token kind which holds the [`TokenKind::is_error`] property.
    #[error("{}", describe_lexer_error(.0))]
    Lexer(TokenKind),
}

fn describe_lexer_error(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::ErrorUnclosedString => "unterminated string",
        TokenKind::ErrorUnclosedComment => "unterminated comment",
        _ => "unknown token",
    }
}
