use std::{collections::VecDeque, sync::Arc};

use crate::{
    ast::{
        BinOp, Block, Callee, ClassDecl, ClassMember, Expr, FuncDecl, ImportDecl, ImportSource,
        Literal, MemberKind, Param, Pos, Program, Stmt, TypeName, VarDecl,
    },
    error::SyntaxError,
    lexer::{Lexer, Token, TokenKind},
};

/// Parses a complete source text.
///
/// The parser never fails outright: it records every syntax error it meets,
/// resynchronizes at the next top-level boundary, and returns whatever
/// declarations it could make sense of alongside the error list. Callers
/// treat a non-empty error list as a compile failure but may still inspect
/// the partial program.
pub(crate) fn parse(source: &str) -> (Program, Vec<SyntaxError>) {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    (program, parser.errors)
}

/// Recursive-descent parser with two tokens of lookahead.
///
/// One token suffices everywhere except the argument-separator ambiguity:
/// inside an argument list `AN WIT` continues the list while a lone `AN` is
/// the logical operator, so the expression parser refuses to bind `AN` when
/// the token after it is `WIT`.
struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: VecDeque<Token>,
    errors: Vec<SyntaxError>,
}

type ParseResult<T> = Result<T, SyntaxError>;

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: VecDeque::with_capacity(2),
            errors: Vec::new(),
        }
    }

    fn fill(&mut self, n: usize) {
        while self.lookahead.len() < n {
            match self.lexer.next_token() {
                Ok(token) => self.lookahead.push_back(token),
                Err(err) => {
                    // lexing cannot continue reliably; surface the error and
                    // end the token stream
                    self.errors.push(SyntaxError {
                        message: err.message,
                        line: err.line,
                        column: 0,
                    });
                    self.lookahead.push_back(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        line: err.line,
                        column: 0,
                    });
                }
            }
        }
    }

    fn peek(&mut self) -> &Token {
        self.fill(1);
        &self.lookahead[0]
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    fn peek2_kind(&mut self) -> TokenKind {
        self.fill(2);
        self.lookahead[1].kind
    }

    fn advance(&mut self) -> Token {
        self.fill(1);
        self.lookahead.pop_front().expect("lookahead filled")
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        let token = self.peek().clone();
        Err(self.error_at(&token, format!("expected {kind} {context}, found '{}'", token.lexeme)))
    }

    fn expect_ident(&mut self, context: &str) -> ParseResult<Token> {
        if self.check(TokenKind::Ident) {
            return Ok(self.advance());
        }
        let token = self.peek().clone();
        Err(self.error_at(&token, format!("expected a name {context}, found '{}'", token.lexeme)))
    }

    fn error_at(&self, token: &Token, message: String) -> SyntaxError {
        SyntaxError {
            message,
            line: token.line,
            column: token.column,
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Takes the `BTW` block that sits directly above `decl_line`.
    ///
    /// Comments are doc lines only when they form a contiguous run whose last
    /// line is `decl_line - 1`. Consumed and stale entries are dropped;
    /// comments on later lines (already scanned through lookahead) survive
    /// for the next declaration.
    fn take_docs(&mut self, decl_line: u32) -> Vec<String> {
        let comments = self.lexer.recent_comments();
        let mut start = comments.len();
        let mut expected = decl_line;
        while start > 0 && comments[start - 1].line + 1 == expected {
            expected = comments[start - 1].line;
            start -= 1;
        }
        let docs: Vec<String> = comments[start..]
            .iter()
            .filter(|c| c.line < decl_line)
            .map(|c| c.text.clone())
            .collect();
        self.lexer.clear_recent_comments();
        docs
    }

    // ---- program & declarations ----

    fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::Eof) {
                return program;
            }
            match self.parse_statement() {
                Ok(stmt) => program.stmts.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
    }

    /// Skips ahead to the next top-level boundary (`HAI` or end of input).
    fn synchronize(&mut self) {
        // always make progress, even when already sitting on a HAI
        if !self.check(TokenKind::Eof) {
            self.advance();
        }
        while !self.check(TokenKind::Hai) && !self.check(TokenKind::Eof) {
            self.advance();
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind() {
            TokenKind::I => {
                if self.peek2_kind() == TokenKind::Can {
                    Ok(Stmt::Import(self.parse_import()?))
                } else {
                    Ok(Stmt::VarDecl(self.parse_local_var()?))
                }
            }
            TokenKind::Hai => self.parse_hai_decl(),
            TokenKind::Iz => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Givez => self.parse_return(),
            TokenKind::Mayb => self.parse_try(),
            TokenKind::Oops => {
                let pos = self.token_pos();
                self.advance();
                let value = self.parse_expr()?;
                Ok(Stmt::Throw { value, pos })
            }
            _ => self.parse_expr_or_assign(),
        }
    }

    fn token_pos(&mut self) -> Pos {
        let token = self.peek();
        Pos {
            line: token.line,
            column: token.column,
        }
    }

    /// `I CAN HAS module?` / `I CAN HAS "file"?` / `I CAN HAS A AN B FROM module?`
    fn parse_import(&mut self) -> ParseResult<ImportDecl> {
        let pos = self.token_pos();
        self.expect(TokenKind::I, "to start an import")?;
        self.expect(TokenKind::Can, "in import")?;
        self.expect(TokenKind::Has, "in import")?;

        if self.check(TokenKind::StringLit) {
            let path = self.advance().lexeme;
            self.expect(TokenKind::Question, "to end the import")?;
            return Ok(ImportDecl {
                source: ImportSource::File(path),
                names: Vec::new(),
                pos,
            });
        }

        let first = self.expect_ident("after I CAN HAS")?;
        if self.check(TokenKind::An) || self.check(TokenKind::From) {
            let mut names = vec![first.lexeme];
            while self.eat(TokenKind::An) {
                names.push(self.expect_ident("in import list")?.lexeme);
            }
            self.expect(TokenKind::From, "after import list")?;
            let source = if self.check(TokenKind::StringLit) {
                ImportSource::File(self.advance().lexeme)
            } else {
                ImportSource::Builtin(self.expect_ident("as import source")?.lexeme)
            };
            self.expect(TokenKind::Question, "to end the import")?;
            return Ok(ImportDecl { source, names, pos });
        }

        self.expect(TokenKind::Question, "to end the import")?;
        Ok(ImportDecl {
            source: ImportSource::Builtin(first.lexeme),
            names: Vec::new(),
            pos,
        })
    }

    /// `HAI ME TEH …` declaration dispatch.
    fn parse_hai_decl(&mut self) -> ParseResult<Stmt> {
        let hai = self.advance();
        let docs = self.take_docs(hai.line);
        let pos = Pos {
            line: hai.line,
            column: hai.column,
        };
        self.expect(TokenKind::Me, "after HAI")?;
        self.expect(TokenKind::Teh, "after HAI ME")?;
        match self.peek_kind() {
            TokenKind::Lockd => {
                self.advance();
                self.expect(TokenKind::Variable, "after LOCKD")?;
                Ok(Stmt::VarDecl(self.parse_var_tail(true, docs, pos)?))
            }
            TokenKind::Variable => {
                self.advance();
                Ok(Stmt::VarDecl(self.parse_var_tail(false, docs, pos)?))
            }
            TokenKind::Funcshun => {
                self.advance();
                Ok(Stmt::FuncDecl(self.parse_func_tail(docs, pos, TokenKind::Kthxbai)?))
            }
            TokenKind::Clas => {
                self.advance();
                Ok(Stmt::ClassDecl(self.parse_class_tail(docs, pos)?))
            }
            _ => {
                let token = self.peek().clone();
                Err(self.error_at(
                    &token,
                    format!("expected VARIABLE, FUNCSHUN or CLAS after HAI ME TEH, found '{}'", token.lexeme),
                ))
            }
        }
    }

    /// `I HAS A [LOCKD] VARIABLE name TEH type [ITZ expr]`
    fn parse_local_var(&mut self) -> ParseResult<VarDecl> {
        let i = self.advance();
        let docs = self.take_docs(i.line);
        let pos = Pos {
            line: i.line,
            column: i.column,
        };
        self.expect(TokenKind::Has, "after I")?;
        self.expect(TokenKind::A, "after I HAS")?;
        let locked = self.eat(TokenKind::Lockd);
        self.expect(TokenKind::Variable, "in variable declaration")?;
        self.parse_var_tail(locked, docs, pos)
    }

    fn parse_var_tail(&mut self, locked: bool, docs: Vec<String>, pos: Pos) -> ParseResult<VarDecl> {
        let name = self.expect_ident("for the variable")?.lexeme;
        self.expect(TokenKind::Teh, "before the variable type")?;
        let type_name = self.parse_type_name()?;
        let init = if self.eat(TokenKind::Itz) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(VarDecl {
            name,
            type_name,
            init,
            locked,
            docs,
            pos,
        })
    }

    /// `FUNCSHUN name [TEH type] [WIT p TEH t (AN WIT p TEH t)*] body END`
    fn parse_func_tail(&mut self, docs: Vec<String>, pos: Pos, end: TokenKind) -> ParseResult<FuncDecl> {
        let name = self.expect_ident("for the function")?.lexeme;
        let return_type = if self.eat(TokenKind::Teh) {
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let mut params = Vec::new();
        if self.eat(TokenKind::Wit) {
            loop {
                let pname = self.expect_ident("for the parameter")?.lexeme;
                self.expect(TokenKind::Teh, "before the parameter type")?;
                let ptype = self.parse_type_name()?;
                params.push(Param {
                    name: pname,
                    type_name: ptype,
                });
                if self.check(TokenKind::An) && self.peek2_kind() == TokenKind::Wit {
                    self.advance();
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let body = self.parse_block(&[end])?;
        self.expect(end, "to end the function")?;
        Ok(FuncDecl {
            name,
            return_type,
            params,
            body: Arc::new(body),
            shared: None,
            docs,
            pos,
        })
    }

    /// `CLAS name [KITTEH OF parent] members KTHXBAI`
    fn parse_class_tail(&mut self, docs: Vec<String>, pos: Pos) -> ParseResult<ClassDecl> {
        let name = self.expect_ident("for the class")?.lexeme;
        let parent = if self.eat(TokenKind::Kitteh) {
            self.expect(TokenKind::Of, "after KITTEH")?;
            Some(self.expect_ident("as the parent class")?.lexeme)
        } else {
            None
        };
        let mut members = Vec::new();
        let mut public = true; // visibility is sticky, public until changed
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                TokenKind::Kthxbai => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    let token = self.peek().clone();
                    return Err(self.error_at(&token, format!("class {name} is missing KTHXBAI")));
                }
                TokenKind::Evryone => {
                    self.advance();
                    public = true;
                }
                TokenKind::Mahself => {
                    self.advance();
                    public = false;
                }
                TokenKind::Dis => {
                    members.push(self.parse_member(public)?);
                }
                _ => {
                    let token = self.peek().clone();
                    return Err(self.error_at(
                        &token,
                        format!("expected DIS TEH, EVRYONE, MAHSELF or KTHXBAI in class body, found '{}'", token.lexeme),
                    ));
                }
            }
        }
        Ok(ClassDecl {
            name,
            parent,
            members,
            docs,
            pos,
        })
    }

    /// `DIS TEH [SHARD] ([LOCKD] VARIABLE … | FUNCSHUN …)`
    fn parse_member(&mut self, public: bool) -> ParseResult<ClassMember> {
        let dis = self.advance();
        let docs = self.take_docs(dis.line);
        let pos = Pos {
            line: dis.line,
            column: dis.column,
        };
        self.expect(TokenKind::Teh, "after DIS")?;
        let shared = self.eat(TokenKind::Shard);
        match self.peek_kind() {
            TokenKind::Lockd => {
                self.advance();
                self.expect(TokenKind::Variable, "after LOCKD")?;
                let decl = self.parse_var_tail(true, docs, pos)?;
                Ok(ClassMember {
                    public,
                    shared,
                    kind: MemberKind::Variable(decl),
                })
            }
            TokenKind::Variable => {
                self.advance();
                let decl = self.parse_var_tail(false, docs, pos)?;
                Ok(ClassMember {
                    public,
                    shared,
                    kind: MemberKind::Variable(decl),
                })
            }
            TokenKind::Funcshun => {
                self.advance();
                let mut decl = self.parse_func_tail(docs, pos, TokenKind::Kthxbai)?;
                decl.shared = Some(shared);
                Ok(ClassMember {
                    public,
                    shared,
                    kind: MemberKind::Function(decl),
                })
            }
            _ => {
                let token = self.peek().clone();
                Err(self.error_at(
                    &token,
                    format!("expected VARIABLE or FUNCSHUN in class member, found '{}'", token.lexeme),
                ))
            }
        }
    }

    // ---- statements ----

    fn parse_block(&mut self, terminators: &[TokenKind]) -> ParseResult<Block> {
        let mut block = Block::default();
        loop {
            self.skip_newlines();
            let kind = self.peek_kind();
            if terminators.contains(&kind) {
                return Ok(block);
            }
            if kind == TokenKind::Eof {
                let token = self.peek().clone();
                return Err(self.error_at(&token, "unexpected end of input inside a block".to_owned()));
            }
            block.stmts.push(self.parse_statement()?);
        }
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let pos = self.token_pos();
        self.advance(); // IZ
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Question, "after the IZ condition")?;
        let then_block = self.parse_block(&[TokenKind::Nope, TokenKind::Kthx])?;
        let else_block = if self.eat(TokenKind::Nope) {
            Some(self.parse_block(&[TokenKind::Kthx])?)
        } else {
            None
        };
        self.expect(TokenKind::Kthx, "to end IZ")?;
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
            pos,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let pos = self.token_pos();
        self.advance(); // WHILE
        let cond = self.parse_expr()?;
        let body = self.parse_block(&[TokenKind::Kthx])?;
        self.expect(TokenKind::Kthx, "to end WHILE")?;
        Ok(Stmt::While { cond, body, pos })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let pos = self.token_pos();
        self.advance(); // GIVEZ
        if self.eat(TokenKind::Up) {
            return Ok(Stmt::Return { value: None, pos });
        }
        let value = self.parse_expr()?;
        Ok(Stmt::Return {
            value: Some(value),
            pos,
        })
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        let pos = self.token_pos();
        self.advance(); // MAYB
        let body = self.parse_block(&[TokenKind::Oopsie])?;
        self.expect(TokenKind::Oopsie, "after the MAYB body")?;
        let catch_var = self.expect_ident("to bind the caught error")?.lexeme;
        let catch_body = self.parse_block(&[TokenKind::Alwayz, TokenKind::Kthx])?;
        let finally_body = if self.eat(TokenKind::Alwayz) {
            Some(self.parse_block(&[TokenKind::Kthx])?)
        } else {
            None
        };
        self.expect(TokenKind::Kthx, "to end MAYB")?;
        Ok(Stmt::Try {
            body,
            catch_var,
            catch_body,
            finally_body,
            pos,
        })
    }

    fn parse_expr_or_assign(&mut self) -> ParseResult<Stmt> {
        let pos = self.token_pos();
        let expr = self.parse_expr()?;
        if self.eat(TokenKind::Itz) {
            let value = self.parse_expr()?;
            if !matches!(expr, Expr::Identifier { .. } | Expr::Member { .. }) {
                return Err(SyntaxError {
                    message: "only a variable or member can be assigned with ITZ".to_owned(),
                    line: pos.line,
                    column: pos.column,
                });
            }
            return Ok(Stmt::Assign {
                target: expr,
                value,
                pos,
            });
        }
        Ok(Stmt::Expr(expr))
    }

    // ---- expressions, precedence ascending ----

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_an()?;
        while self.check(TokenKind::Or) {
            let pos = self.token_pos();
            self.advance();
            let right = self.parse_an()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_an(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality()?;
        // `AN WIT` belongs to an argument list, never to logic
        while self.check(TokenKind::An) && self.peek2_kind() != TokenKind::Wit {
            let pos = self.token_pos();
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinOp::An,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::Saem) {
            let pos = self.token_pos();
            self.advance();
            self.expect(TokenKind::As, "after SAEM")?;
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op: BinOp::SaemAs,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Biggr => BinOp::BiggrThan,
                TokenKind::Smallr => BinOp::SmallrThan,
                _ => return Ok(left),
            };
            let pos = self.token_pos();
            self.advance();
            self.expect(TokenKind::Than, "in comparison")?;
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Moar => BinOp::Moar,
                TokenKind::Les => BinOp::Les,
                _ => return Ok(left),
            };
            let pos = self.token_pos();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_cast()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Tiemz => BinOp::Tiemz,
                TokenKind::Dividez => BinOp::Dividez,
                _ => return Ok(left),
            };
            let pos = self.token_pos();
            self.advance();
            let right = self.parse_cast()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
    }

    fn parse_cast(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_unary()?;
        while self.check(TokenKind::As) {
            let pos = self.token_pos();
            self.advance();
            let target = self.parse_type_name()?;
            expr = Expr::Cast {
                expr: Box::new(expr),
                target,
                pos,
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.check(TokenKind::Not) {
            let pos = self.token_pos();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Not {
                operand: Box::new(operand),
                pos,
            });
        }
        self.parse_postfix()
    }

    /// Postfix chain: member access by juxtaposition and `DO` method calls.
    ///
    /// Member access never crosses a newline; the newline token breaks the
    /// chain naturally because only `Ident`/`Do` continue it.
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Ident => {
                    let token = self.advance();
                    expr = Expr::Member {
                        object: Box::new(expr),
                        member: token.lexeme,
                        pos: Pos {
                            line: token.line,
                            column: token.column,
                        },
                    };
                }
                TokenKind::Do => {
                    let pos = self.token_pos();
                    self.advance();
                    let name = self.expect_ident("after DO")?.lexeme;
                    let args = if self.eat(TokenKind::Wit) {
                        self.parse_args()?
                    } else {
                        Vec::new()
                    };
                    expr = Expr::Call {
                        callee: Callee::Method {
                            object: Box::new(expr),
                            name,
                        },
                        args,
                        pos,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let pos = Pos {
            line: token.line,
            column: token.column,
        };
        match token.kind {
            TokenKind::IntLit => {
                self.advance();
                let value = parse_int_literal(&token.lexeme).ok_or_else(|| {
                    self.error_at(&token, format!("integer literal '{}' is out of range", token.lexeme))
                })?;
                Ok(Expr::Literal {
                    value: Literal::Int(value),
                    pos,
                })
            }
            TokenKind::DubbleLit => {
                self.advance();
                let value: f64 = token.lexeme.parse().map_err(|_| {
                    self.error_at(&token, format!("malformed DUBBLE literal '{}'", token.lexeme))
                })?;
                Ok(Expr::Literal {
                    value: Literal::Dubble(value),
                    pos,
                })
            }
            TokenKind::StringLit => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Strin(token.lexeme),
                    pos,
                })
            }
            TokenKind::Yez => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(true),
                    pos,
                })
            }
            TokenKind::No => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(false),
                    pos,
                })
            }
            TokenKind::Nothin => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Nothin,
                    pos,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "to close the parenthesis")?;
                Ok(expr)
            }
            TokenKind::New => {
                self.advance();
                let class_name = self.expect_ident("after NEW")?.lexeme;
                let args = if self.eat(TokenKind::Wit) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                Ok(Expr::New {
                    class_name,
                    args,
                    pos,
                })
            }
            TokenKind::Ident => {
                self.advance();
                if self.eat(TokenKind::Wit) {
                    let args = self.parse_args()?;
                    return Ok(Expr::Call {
                        callee: Callee::Name(token.lexeme),
                        args,
                        pos,
                    });
                }
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    pos,
                })
            }
            _ => Err(self.error_at(&token, format!("unexpected token '{}'", token.lexeme))),
        }
    }

    /// Comma-less argument list: `expr (AN WIT expr)*`.
    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = vec![self.parse_expr()?];
        while self.check(TokenKind::An) && self.peek2_kind() == TokenKind::Wit {
            self.advance();
            self.advance();
            args.push(self.parse_expr()?);
        }
        Ok(args)
    }

    fn parse_type_name(&mut self) -> ParseResult<TypeName> {
        let token = self.peek().clone();
        let name = match token.kind {
            TokenKind::Nothin => TypeName::Nothin,
            TokenKind::Integr => TypeName::Integr,
            TokenKind::Dubble => TypeName::Dubble,
            TokenKind::Strin => TypeName::Strin,
            TokenKind::Bool => TypeName::Bool,
            TokenKind::Bukkit => TypeName::Bukkit,
            TokenKind::Baskit => TypeName::Baskit,
            TokenKind::Ident => TypeName::Class(token.lexeme.clone()),
            _ => {
                return Err(self.error_at(&token, format!("expected a type name, found '{}'", token.lexeme)));
            }
        };
        self.advance();
        Ok(name)
    }
}

/// Parses a decimal or `0x` hexadecimal integer literal, with optional sign.
fn parse_int_literal(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse(source);
        assert_eq!(errors, Vec::new(), "unexpected parse errors");
        program
    }

    #[test]
    fn hello_world_shape() {
        let program = parse_ok(r#"I CAN HAS STDIO? HAI ME TEH FUNCSHUN MAIN SAYZ WIT "Hello, World!" KTHXBAI"#);
        assert_eq!(program.stmts.len(), 2);
        assert!(matches!(&program.stmts[0], Stmt::Import(i) if i.source == ImportSource::Builtin("STDIO".into())));
        let Stmt::FuncDecl(main) = &program.stmts[1] else {
            panic!("expected MAIN declaration");
        };
        assert_eq!(main.name, "MAIN");
        assert_eq!(main.body.stmts.len(), 1);
    }

    #[test]
    fn operator_precedence() {
        // 10 MOAR 5 TIEMZ 2 parses as 10 MOAR (5 TIEMZ 2)
        let program = parse_ok("HAI ME TEH VARIABLE RESULT TEH INTEGR ITZ 10 MOAR 5 TIEMZ 2");
        let Stmt::VarDecl(decl) = &program.stmts[0] else {
            panic!("expected variable declaration");
        };
        let Some(Expr::Binary { op: BinOp::Moar, right, .. }) = &decl.init else {
            panic!("expected MOAR at the top");
        };
        assert!(matches!(**right, Expr::Binary { op: BinOp::Tiemz, .. }));
    }

    #[test]
    fn an_wit_separates_arguments() {
        let program = parse_ok("FOO WIT 1 AN WIT 2 AN WIT 3");
        let Stmt::Expr(Expr::Call { args, .. }) = &program.stmts[0] else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn lone_an_is_logic() {
        let program = parse_ok("FOO WIT YEZ AN NO");
        let Stmt::Expr(Expr::Call { args, .. }) = &program.stmts[0] else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(args[0], Expr::Binary { op: BinOp::An, .. }));
    }

    #[test]
    fn selective_import() {
        let program = parse_ok("I CAN HAS ABS AN MAX FROM MATH?");
        let Stmt::Import(import) = &program.stmts[0] else {
            panic!("expected import");
        };
        assert_eq!(import.names, vec!["ABS".to_owned(), "MAX".to_owned()]);
        assert_eq!(import.source, ImportSource::Builtin("MATH".into()));
    }

    #[test]
    fn class_with_visibility_sections() {
        let program = parse_ok(
            "HAI ME TEH CLAS DOGE KITTEH OF ANIMAL\n\
             MAHSELF\n\
             DIS TEH VARIABLE TREATZ TEH INTEGR ITZ 0\n\
             EVRYONE\n\
             DIS TEH FUNCSHUN BARK TEH STRIN\n\
             GIVEZ \"woof\"\n\
             KTHXBAI\n\
             KTHXBAI",
        );
        let Stmt::ClassDecl(class) = &program.stmts[0] else {
            panic!("expected class declaration");
        };
        assert_eq!(class.parent.as_deref(), Some("ANIMAL"));
        assert_eq!(class.members.len(), 2);
        assert!(!class.members[0].public);
        assert!(class.members[1].public);
    }

    #[test]
    fn doc_comments_attach_to_adjacent_declaration() {
        let program = parse_ok(
            "BTW stray note\n\n\
             BTW Adds one\n\
             BTW to its argument\n\
             HAI ME TEH FUNCSHUN INCR TEH INTEGR WIT X TEH INTEGR\n\
             GIVEZ X MOAR 1\n\
             KTHXBAI",
        );
        let Stmt::FuncDecl(func) = &program.stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(func.docs, vec!["Adds one".to_owned(), "to its argument".to_owned()]);
    }

    #[test]
    fn method_call_chain() {
        let program = parse_ok("ITEMS DO PUSH WIT 1");
        let Stmt::Expr(Expr::Call { callee, args, .. }) = &program.stmts[0] else {
            panic!("expected call");
        };
        let Callee::Method { name, .. } = callee else {
            panic!("expected method call");
        };
        assert_eq!(name, "PUSH");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn member_assignment() {
        let program = parse_ok("FIDO NAME ITZ \"rex\"");
        let Stmt::Assign { target, .. } = &program.stmts[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(target, Expr::Member { .. }));
    }

    #[test]
    fn member_access_does_not_cross_newlines() {
        let program = parse_ok("X\nY ITZ 2");
        assert_eq!(program.stmts.len(), 2);
        assert!(matches!(&program.stmts[0], Stmt::Expr(Expr::Identifier { name, .. }) if name == "X"));
    }

    #[test]
    fn errors_recover_at_next_declaration() {
        let (program, errors) = parse(
            "HAI ME TEH GARBAGE\n\
             HAI ME TEH VARIABLE X TEH INTEGR ITZ 1",
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(program.stmts.len(), 1);
        assert!(matches!(&program.stmts[0], Stmt::VarDecl(v) if v.name == "X"));
    }

    #[test]
    fn try_catch_finally() {
        let program = parse_ok(
            "MAYB\nOOPS \"boom\"\nOOPSIE E\nSAYZ WIT E\nALWAYZ\nSAYZ WIT \"end\"\nKTHX",
        );
        let Stmt::Try {
            catch_var,
            finally_body,
            ..
        } = &program.stmts[0]
        else {
            panic!("expected try");
        };
        assert_eq!(catch_var, "E");
        assert!(finally_body.is_some());
    }

    #[test]
    fn givez_up_returns_nothing() {
        let program = parse_ok("HAI ME TEH FUNCSHUN NOP\nGIVEZ UP\nKTHXBAI");
        let Stmt::FuncDecl(func) = &program.stmts[0] else {
            panic!("expected function");
        };
        assert!(matches!(func.body.stmts[0], Stmt::Return { value: None, .. }));
    }

    #[test]
    fn cast_binds_tighter_than_arithmetic() {
        let program = parse_ok("HAI ME TEH VARIABLE X TEH INTEGR ITZ Y AS INTEGR MOAR 1");
        let Stmt::VarDecl(decl) = &program.stmts[0] else {
            panic!("expected declaration");
        };
        let Some(Expr::Binary { op: BinOp::Moar, left, .. }) = &decl.init else {
            panic!("expected MOAR at the top");
        };
        assert!(matches!(**left, Expr::Cast { .. }));
    }
}
