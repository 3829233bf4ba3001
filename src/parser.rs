//! Mini parser
//!
//! Recursive descent parser producing the raw AST. Structural errors abort
//! parsing immediately; everything about names and types is left to the
//! binding pass.

use crate::ast::*;
use crate::error::{CompileError, Result};
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::types::Type;

/// Parser state
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

/// Parse a complete program
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source)?.parse_program()
}

impl Parser {
    pub fn new(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        Ok(Self { tokens, pos: 0 })
    }

    /// Parse the implicit top-level block: declarations, then statements,
    /// until end of input.
    pub fn parse_program(&mut self) -> Result<Program> {
        let line = self.current_line();
        let (declarations, statements) = self.parse_block_body(None)?;

        Ok(Program {
            block: Block {
                declarations,
                statements,
                line,
            },
        })
    }

    // =========================================================================
    // Token Management
    // =========================================================================

    fn current(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn current_token(&self) -> Option<&Token> {
        self.current().map(|t| &t.token)
    }

    fn current_line(&self) -> u32 {
        match self.current() {
            Some(t) => t.line,
            None => self.tokens.last().map(|t| t.line).unwrap_or(1),
        }
    }

    fn peek_token(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, expected: &Token) -> bool {
        self.current_token() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::parse(
                self.current_line(),
                format!("Expected {:?}", expected),
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current_token().cloned() {
            Some(Token::Identifier(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(CompileError::parse(
                self.current_line(),
                "Expected identifier",
            )),
        }
    }

    fn type_keyword(&self) -> Option<Type> {
        match self.current_token() {
            Some(Token::KwInt) => Some(Type::Int),
            Some(Token::KwDouble) => Some(Type::Double),
            Some(Token::KwBool) => Some(Type::Bool),
            _ => None,
        }
    }

    /// A type keyword followed by an identifier starts a declaration; a
    /// type keyword followed by `(` is an explicit conversion expression.
    fn is_declaration_start(&self) -> bool {
        self.type_keyword().is_some()
            && matches!(self.peek_token(1), Some(Token::Identifier(_)))
    }

    // =========================================================================
    // Declarations and Blocks
    // =========================================================================

    /// Parse declarations then statements, up to `closer` (or end of input
    /// for the top level).
    fn parse_block_body(
        &mut self,
        closer: Option<&Token>,
    ) -> Result<(Vec<Declaration>, Vec<Stmt>)> {
        let mut declarations = Vec::new();
        let mut statements = Vec::new();

        while self.is_declaration_start() {
            declarations.push(self.parse_declaration()?);
        }

        loop {
            match closer {
                Some(token) if self.check(token) => break,
                Some(token) if self.at_end() => {
                    return Err(CompileError::parse(
                        self.current_line(),
                        format!("Expected {:?}", token),
                    ));
                }
                None if self.at_end() => break,
                _ => {}
            }
            if self.is_declaration_start() {
                return Err(CompileError::parse(
                    self.current_line(),
                    "Declarations must precede statements in a block",
                ));
            }
            statements.push(self.parse_statement()?);
        }

        Ok((declarations, statements))
    }

    fn parse_declaration(&mut self) -> Result<Declaration> {
        let line = self.current_line();
        let ty = match self.type_keyword() {
            Some(ty) => ty,
            None => {
                return Err(CompileError::parse(line, "Expected type name"));
            }
        };
        self.advance();

        let mut declarators = vec![self.parse_declarator()?];
        while self.eat(&Token::Comma) {
            declarators.push(self.parse_declarator()?);
        }
        self.expect(Token::Semicolon)?;

        Ok(Declaration {
            ty,
            declarators,
            line,
        })
    }

    fn parse_declarator(&mut self) -> Result<Declarator> {
        let name = self.expect_identifier()?;
        let mut dims = Vec::new();
        while self.eat(&Token::LBracket) {
            match self.current_token().cloned() {
                Some(Token::Int(size)) => {
                    self.advance();
                    dims.push(size);
                }
                _ => {
                    return Err(CompileError::parse(
                        self.current_line(),
                        "Expected array dimension literal",
                    ));
                }
            }
            self.expect(Token::RBracket)?;
        }

        Ok(Declarator { name, dims })
    }

    fn parse_block(&mut self) -> Result<Block> {
        let line = self.current_line();
        self.expect(Token::LBrace)?;
        let (declarations, statements) = self.parse_block_body(Some(&Token::RBrace))?;
        self.expect(Token::RBrace)?;

        Ok(Block {
            declarations,
            statements,
            line,
        })
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statement(&mut self) -> Result<Stmt> {
        let line = self.current_line();

        match self.current_token() {
            Some(Token::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::Read) => self.parse_read(),
            Some(Token::Write) => self.parse_write(),
            Some(Token::Return) => {
                self.advance();
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Return { line })
            }
            Some(Token::Break) => {
                self.advance();
                let depth = self.parse_loop_depth()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Break { depth, line })
            }
            Some(Token::Continue) => {
                self.advance();
                let depth = self.parse_loop_depth()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Continue { depth, line })
            }
            Some(_) => {
                let expr = self.parse_expression()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Expr { expr, line })
            }
            None => Err(CompileError::parse(line, "Expected statement")),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let line = self.current_line();
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let then_body = Box::new(self.parse_statement()?);
        let else_body = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_body,
            else_body,
            line,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let line = self.current_line();
        self.expect(Token::While)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While {
            condition,
            body,
            line,
        })
    }

    fn parse_read(&mut self) -> Result<Stmt> {
        let line = self.current_line();
        self.expect(Token::Read)?;
        let name = self.expect_identifier()?;
        let hex = self.parse_hex_suffix()?;
        self.expect(Token::Semicolon)?;

        Ok(Stmt::Read { name, hex, line })
    }

    fn parse_write(&mut self) -> Result<Stmt> {
        let line = self.current_line();
        self.expect(Token::Write)?;

        if let Some(Token::String(raw)) = self.current_token().cloned() {
            self.advance();
            self.expect(Token::Semicolon)?;
            return Ok(Stmt::WriteString { raw, line });
        }

        let expr = self.parse_expression()?;
        let hex = self.parse_hex_suffix()?;
        self.expect(Token::Semicolon)?;

        Ok(Stmt::Write { expr, hex, line })
    }

    fn parse_hex_suffix(&mut self) -> Result<bool> {
        if self.eat(&Token::Comma) {
            self.expect(Token::Hex)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Optional depth literal after `break` / `continue`; defaults to 1.
    /// The resolver validates positivity against loop nesting.
    fn parse_loop_depth(&mut self) -> Result<i64> {
        match self.current_token() {
            Some(&Token::Int(depth)) => {
                self.advance();
                Ok(depth)
            }
            _ => Ok(1),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    /// Assignment is right-associative and only valid when the left side is
    /// an identifier or array access.
    fn parse_assignment(&mut self) -> Result<Expr> {
        let left = self.parse_logical()?;

        if self.check(&Token::Assign) {
            let line = self.current_line();
            if !matches!(left, Expr::Ident { .. } | Expr::ArrayAccess { .. }) {
                return Err(CompileError::parse(line, "Invalid assignment target"));
            }
            self.advance();
            let value = self.parse_assignment()?;
            return Ok(Expr::Assign {
                target: Box::new(left),
                value: Box::new(value),
                line,
            });
        }

        Ok(left)
    }

    fn parse_logical(&mut self) -> Result<Expr> {
        let mut left = self.parse_relation()?;

        loop {
            let op = match self.current_token() {
                Some(Token::AndAnd) => BinaryOp::And,
                Some(Token::OrOr) => BinaryOp::Or,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_relation()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }

        Ok(left)
    }

    fn parse_relation(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitwise()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_bitwise()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }

        Ok(left)
    }

    fn parse_bitwise(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Pipe) => BinaryOp::BitOr,
                Some(Token::Amp) => BinaryOp::BitAnd,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let line = self.current_line();

        let op = match self.current_token() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Tilde) => Some(UnaryOp::BitNot),
            Some(Token::Bang) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr::Unary { op, operand, line });
        }

        // Explicit conversions read as calls on the type name: int(e),
        // double(e).
        let cast = match self.current_token() {
            Some(Token::KwInt) => Some(UnaryOp::ToInt),
            Some(Token::KwDouble) => Some(UnaryOp::ToDouble),
            _ => None,
        };
        if let Some(op) = cast {
            self.advance();
            self.expect(Token::LParen)?;
            let operand = Box::new(self.parse_expression()?);
            self.expect(Token::RParen)?;
            return Ok(Expr::Unary { op, operand, line });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let line = self.current_line();

        match self.current_token().cloned() {
            Some(Token::Int(value)) => {
                self.advance();
                Ok(Expr::IntLit { value, line })
            }
            Some(Token::Double(value)) => {
                self.advance();
                Ok(Expr::DoubleLit { value, line })
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::BoolLit { value: true, line })
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::BoolLit { value: false, line })
            }
            Some(Token::Identifier(name)) => {
                self.advance();
                if self.check(&Token::LBracket) {
                    let mut indices = Vec::new();
                    while self.eat(&Token::LBracket) {
                        indices.push(self.parse_expression()?);
                        self.expect(Token::RBracket)?;
                    }
                    Ok(Expr::ArrayAccess {
                        name,
                        indices,
                        line,
                    })
                } else {
                    Ok(Expr::Ident { name, line })
                }
            }
            Some(Token::LParen) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            _ => Err(CompileError::parse(line, "Expected expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_declaration_and_statements() {
        let program = parse("int a; a = 5; write a;").unwrap();
        assert_eq!(program.block.declarations.len(), 1);
        assert_eq!(program.block.statements.len(), 2);
        let decl = &program.block.declarations[0];
        assert_eq!(decl.ty, Type::Int);
        assert_eq!(decl.declarators[0].name, "a");
        assert!(decl.declarators[0].dims.is_empty());
    }

    #[test]
    fn multi_declarator_with_dims() {
        let program = parse("double a, b[2][3];").unwrap();
        let decl = &program.block.declarations[0];
        assert_eq!(decl.declarators.len(), 2);
        assert_eq!(decl.declarators[1].dims, vec![2, 3]);
    }

    #[test]
    fn nested_blocks_and_if_else() {
        let program = parse("bool b; if (b) { write 1; } else write 2;").unwrap();
        match &program.block.statements[0] {
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                assert!(matches!(**then_body, Stmt::Block(_)));
                assert!(else_body.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn break_depth_defaults_to_one() {
        let program = parse("while (true) { break; break 2; continue; }").unwrap();
        let body = match &program.block.statements[0] {
            Stmt::While { body, .. } => body,
            other => panic!("expected while, got {:?}", other),
        };
        let stmts = match &**body {
            Stmt::Block(block) => &block.statements,
            other => panic!("expected block, got {:?}", other),
        };
        assert!(matches!(stmts[0], Stmt::Break { depth: 1, .. }));
        assert!(matches!(stmts[1], Stmt::Break { depth: 2, .. }));
        assert!(matches!(stmts[2], Stmt::Continue { depth: 1, .. }));
    }

    #[test]
    fn precedence_bitwise_binds_tighter_than_mul() {
        // 2 * 3 | 1 parses as 2 * (3 | 1)
        let program = parse("int a; a = 2 * 3 | 1;").unwrap();
        let expr = match &program.block.statements[0] {
            Stmt::Expr { expr, .. } => expr,
            other => panic!("expected expression, got {:?}", other),
        };
        match expr {
            Expr::Assign { value, .. } => match &**value {
                Expr::Binary {
                    op: BinaryOp::Mul,
                    right,
                    ..
                } => {
                    assert!(matches!(
                        **right,
                        Expr::Binary {
                            op: BinaryOp::BitOr,
                            ..
                        }
                    ));
                }
                other => panic!("expected mul at the top, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn cast_versus_declaration() {
        let program = parse("int a; a = int(2.5);").unwrap();
        let expr = match &program.block.statements[0] {
            Stmt::Expr { expr, .. } => expr,
            other => panic!("expected expression, got {:?}", other),
        };
        match expr {
            Expr::Assign { value, .. } => {
                assert!(matches!(
                    **value,
                    Expr::Unary {
                        op: UnaryOp::ToInt,
                        ..
                    }
                ));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn write_variants() {
        let program = parse("int a; write a; write a, hex; write \"hi\";").unwrap();
        assert!(matches!(
            program.block.statements[0],
            Stmt::Write { hex: false, .. }
        ));
        assert!(matches!(
            program.block.statements[1],
            Stmt::Write { hex: true, .. }
        ));
        assert!(
            matches!(&program.block.statements[2], Stmt::WriteString { raw, .. } if raw == "\"hi\"")
        );
    }

    #[test]
    fn declaration_after_statement_is_rejected() {
        let err = parse("int a; a = 1; int b;").unwrap_err();
        assert!(err.to_string().contains("Declarations must precede"));
    }

    #[test]
    fn invalid_assignment_target() {
        let err = parse("int a; 1 = a;").unwrap_err();
        assert!(err.to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn statement_lines_survive_parsing() {
        let program = parse("int a;\na = 1;\nwrite a;").unwrap();
        assert_eq!(program.block.statements[0].line(), 2);
        assert_eq!(program.block.statements[1].line(), 3);
    }
}
