use crate::coinscript::ast::*;
use crate::coinscript::lexer::{lex, Token, TokenKind};
use crate::error::{Error, Result};

pub fn parse_program(source: &str) -> Result<Program> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_ahead(&self, n: usize) -> &TokenKind {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token> {
        if self.peek() == &kind {
            Ok(self.advance())
        } else {
            Err(Error::parse(
                format!(
                    "expected {} {context}, found {}",
                    kind.describe(),
                    self.peek().describe()
                ),
                self.offset(),
            ))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<(String, usize)> {
        let offset = self.offset();
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, offset))
            }
            other => Err(Error::parse(
                format!("expected identifier {context}, found {}", other.describe()),
                offset,
            )),
        }
    }

    // --- declarations ---------------------------------------------------

    fn program(&mut self) -> Result<Program> {
        let mut program = Program::default();
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Use => {
                    let offset = self.offset();
                    self.advance();
                    let path = self.string_lit("after `use`")?;
                    self.expect(TokenKind::Semi, "after use declaration")?;
                    program.includes.push(IncludeDecl { path, offset });
                }
                TokenKind::Ident(name) if name == "include" => {
                    let offset = self.offset();
                    self.advance();
                    let path = self.string_lit("after `include`")?;
                    self.expect(TokenKind::Semi, "after include declaration")?;
                    program.includes.push(IncludeDecl { path, offset });
                }
                TokenKind::Const => program.consts.push(self.const_decl()?),
                TokenKind::Puzzle => program.puzzles.push(self.puzzle_decl()?),
                TokenKind::At | TokenKind::Coin => {
                    let decorators = self.decorators()?;
                    program.coins.push(self.coin_decl(decorators)?);
                }
                TokenKind::Compose => {
                    return Err(Error::parse(
                        "`compose` blocks are reserved and not supported",
                        self.offset(),
                    ));
                }
                other => {
                    return Err(Error::parse(
                        format!("expected top-level declaration, found {}", other.describe()),
                        self.offset(),
                    ));
                }
            }
        }
        Ok(program)
    }

    fn string_lit(&mut self, context: &str) -> Result<String> {
        match self.peek().clone() {
            TokenKind::StrLit(text) => {
                self.advance();
                Ok(text)
            }
            other => Err(Error::parse(
                format!("expected string literal {context}, found {}", other.describe()),
                self.offset(),
            )),
        }
    }

    fn decorators(&mut self) -> Result<Vec<Decorator>> {
        let mut decorators = Vec::new();
        while self.peek() == &TokenKind::At {
            let offset = self.offset();
            self.advance();
            let (name, _) = self.expect_ident("after `@`")?;
            let args = if self.eat(&TokenKind::LParen) {
                let args = self.call_args()?;
                self.expect(TokenKind::RParen, "after decorator arguments")?;
                args
            } else {
                Vec::new()
            };
            decorators.push(Decorator { name, args, offset });
        }
        Ok(decorators)
    }

    fn const_decl(&mut self) -> Result<ConstDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Const, "at constant declaration")?;
        let ty = self.type_name("after `const`")?;
        let (name, _) = self.expect_ident("for constant name")?;
        self.expect(TokenKind::Assign, "after constant name")?;
        let value = self.expr()?;
        self.expect(TokenKind::Semi, "after constant declaration")?;
        Ok(ConstDecl {
            ty,
            name,
            value,
            offset,
        })
    }

    fn type_name(&mut self, context: &str) -> Result<Type> {
        let ty = match self.peek() {
            TokenKind::TyAddress => Type::Address,
            TokenKind::TyUint256 => Type::Uint256,
            TokenKind::TyBool => Type::Bool,
            TokenKind::TyString => Type::StringTy,
            TokenKind::TyBytes32 => Type::Bytes32,
            TokenKind::TyBytes => Type::Bytes,
            other => {
                return Err(Error::parse(
                    format!("expected type {context}, found {}", other.describe()),
                    self.offset(),
                ));
            }
        };
        self.advance();
        Ok(ty)
    }

    fn is_type_token(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::TyAddress
                | TokenKind::TyUint256
                | TokenKind::TyBool
                | TokenKind::TyString
                | TokenKind::TyBytes32
                | TokenKind::TyBytes
        )
    }

    fn coin_decl(&mut self, decorators: Vec<Decorator>) -> Result<CoinDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Coin, "at contract declaration")?;
        let (name, _) = self.expect_ident("for coin name")?;
        self.expect(TokenKind::LBrace, "to open coin body")?;

        let mut coin = CoinDecl {
            name,
            decorators,
            storage: Vec::new(),
            state: Vec::new(),
            inners: Vec::new(),
            actions: Vec::new(),
            events: Vec::new(),
            modifiers: Vec::new(),
            layers: Vec::new(),
            consts: Vec::new(),
            offset,
        };

        while !self.eat(&TokenKind::RBrace) {
            match self.peek() {
                TokenKind::Storage => self.storage_decl(&mut coin)?,
                TokenKind::State => self.state_block(&mut coin)?,
                TokenKind::Inner => coin.inners.push(self.inner_decl()?),
                TokenKind::Event => coin.events.push(self.event_decl()?),
                TokenKind::Modifier => coin.modifiers.push(self.modifier_decl()?),
                TokenKind::Layer => coin.layers.push(self.layer_decl()?),
                TokenKind::Const => coin.consts.push(self.const_decl()?),
                TokenKind::At | TokenKind::Action => {
                    let decorators = self.decorators()?;
                    coin.actions.push(self.action_decl(decorators)?);
                }
                TokenKind::Eof => {
                    return Err(Error::parse("unclosed coin body", self.offset()));
                }
                other => {
                    return Err(Error::parse(
                        format!("unexpected {} in coin body", other.describe()),
                        self.offset(),
                    ));
                }
            }
        }
        Ok(coin)
    }

    /// `storage { … }` or the single-declaration form
    /// `storage <type> <name> = <expr>;`.
    fn storage_decl(&mut self, coin: &mut CoinDecl) -> Result<()> {
        self.expect(TokenKind::Storage, "at storage declaration")?;
        if self.eat(&TokenKind::LBrace) {
            while !self.eat(&TokenKind::RBrace) {
                coin.storage.push(self.storage_entry()?);
            }
        } else {
            coin.storage.push(self.storage_entry()?);
        }
        Ok(())
    }

    fn storage_entry(&mut self) -> Result<StorageDecl> {
        let offset = self.offset();
        let ty = self.type_name("for storage entry")?;
        let (name, _) = self.expect_ident("for storage entry name")?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi, "after storage entry")?;
        Ok(StorageDecl {
            ty,
            name,
            init,
            offset,
        })
    }

    fn state_block(&mut self, coin: &mut CoinDecl) -> Result<()> {
        self.expect(TokenKind::State, "at state block")?;
        self.expect(TokenKind::LBrace, "to open state block")?;
        while !self.eat(&TokenKind::RBrace) {
            let offset = self.offset();
            if self.eat(&TokenKind::Mapping) {
                self.expect(TokenKind::LParen, "after `mapping`")?;
                let key_ty = self.type_name("for mapping key")?;
                self.expect(TokenKind::FatArrow, "between mapping key and value types")?;
                let value_ty = self.type_name("for mapping value")?;
                self.expect(TokenKind::RParen, "after mapping value type")?;
                let ordered = self.eat(&TokenKind::Ident("ordered".to_string()));
                let (name, _) = self.expect_ident("for mapping name")?;
                self.expect(TokenKind::Semi, "after state mapping")?;
                coin.state.push(StateDecl::Map {
                    key_ty,
                    value_ty,
                    name,
                    ordered,
                    offset,
                });
            } else {
                let ty = self.type_name("for state field")?;
                let (name, _) = self.expect_ident("for state field name")?;
                self.expect(TokenKind::Semi, "after state field")?;
                coin.state.push(StateDecl::Field { ty, name, offset });
            }
        }
        Ok(())
    }

    fn inner_decl(&mut self) -> Result<InnerDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Inner, "at inner puzzle slot")?;
        self.expect(TokenKind::Puzzle, "after `inner`")?;
        let (name, _) = self.expect_ident("for inner puzzle name")?;
        if self.eat(&TokenKind::Semi) {
            return Ok(InnerDecl {
                name,
                inline: None,
                offset,
            });
        }
        let params = if self.eat(&TokenKind::LParen) {
            let params = self.params()?;
            self.expect(TokenKind::RParen, "after inner puzzle parameters")?;
            params
        } else {
            Vec::new()
        };
        let body = self.block()?;
        Ok(InnerDecl {
            name: name.clone(),
            inline: Some(PuzzleDecl {
                name,
                params,
                body,
                offset,
            }),
            offset,
        })
    }

    fn puzzle_decl(&mut self) -> Result<PuzzleDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Puzzle, "at puzzle declaration")?;
        let (name, _) = self.expect_ident("for puzzle name")?;
        let params = if self.eat(&TokenKind::LParen) {
            let params = self.params()?;
            self.expect(TokenKind::RParen, "after puzzle parameters")?;
            params
        } else {
            Vec::new()
        };
        let body = self.block()?;
        Ok(PuzzleDecl {
            name,
            params,
            body,
            offset,
        })
    }

    fn event_decl(&mut self) -> Result<EventDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Event, "at event declaration")?;
        let (name, _) = self.expect_ident("for event name")?;
        self.expect(TokenKind::LParen, "after event name")?;
        let params = self.params()?;
        self.expect(TokenKind::RParen, "after event parameters")?;
        self.expect(TokenKind::Semi, "after event declaration")?;
        Ok(EventDecl {
            name,
            params,
            offset,
        })
    }

    fn modifier_decl(&mut self) -> Result<ModifierDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Modifier, "at modifier declaration")?;
        let (name, _) = self.expect_ident("for modifier name")?;
        self.expect(TokenKind::LParen, "after modifier name")?;
        let params = self.params()?;
        self.expect(TokenKind::RParen, "after modifier parameters")?;
        let body = self.block()?;
        Ok(ModifierDecl {
            name,
            params,
            body,
            offset,
        })
    }

    fn layer_decl(&mut self) -> Result<LayerDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Layer, "at layer directive")?;
        let (name, _) = self.expect_ident("for layer name")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::LParen) {
            while self.peek() != &TokenKind::RParen {
                let (key, _) = self.expect_ident("for layer argument name")?;
                self.expect(TokenKind::Assign, "after layer argument name")?;
                args.push((key, self.expr()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "after layer arguments")?;
        }
        self.expect(TokenKind::Semi, "after layer directive")?;
        Ok(LayerDecl { name, args, offset })
    }

    fn action_decl(&mut self, decorators: Vec<Decorator>) -> Result<ActionDecl> {
        let offset = self.offset();
        self.expect(TokenKind::Action, "at action declaration")?;
        let (name, _) = self.expect_ident("for action name")?;
        self.expect(TokenKind::LParen, "after action name")?;
        let params = self.params()?;
        self.expect(TokenKind::RParen, "after action parameters")?;
        let body = self.block()?;
        Ok(ActionDecl {
            name,
            decorators,
            params,
            body,
            offset,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        if matches!(self.peek(), TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let offset = self.offset();
            let ty = self.type_name("for parameter")?;
            let (name, _) = self.expect_ident("for parameter name")?;
            params.push(Param { ty, name, offset });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    // --- statements -----------------------------------------------------

    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "to open block")?;
        let mut statements = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.peek() == &TokenKind::Eof {
                return Err(Error::parse("unclosed block", self.offset()));
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Stmt> {
        let offset = self.offset();
        match self.peek().clone() {
            TokenKind::Require => {
                self.advance();
                self.expect(TokenKind::LParen, "after `require`")?;
                let condition = self.expr()?;
                let message = if self.eat(&TokenKind::Comma) {
                    Some(self.string_lit("for require message")?)
                } else {
                    None
                };
                self.expect(TokenKind::RParen, "after require arguments")?;
                self.expect(TokenKind::Semi, "after require statement")?;
                Ok(Stmt {
                    kind: StmtKind::Require { condition, message },
                    offset,
                })
            }
            TokenKind::Revert => {
                self.advance();
                self.expect(TokenKind::LParen, "after `revert`")?;
                let message = if self.peek() != &TokenKind::RParen {
                    Some(self.string_lit("for revert message")?)
                } else {
                    None
                };
                self.expect(TokenKind::RParen, "after revert arguments")?;
                self.expect(TokenKind::Semi, "after revert statement")?;
                Ok(Stmt {
                    kind: StmtKind::Revert { message },
                    offset,
                })
            }
            TokenKind::If => self.if_statement(),
            TokenKind::Return => {
                self.advance();
                let value = if self.peek() == &TokenKind::Semi {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(TokenKind::Semi, "after return statement")?;
                Ok(Stmt {
                    kind: StmtKind::Return { value },
                    offset,
                })
            }
            TokenKind::Emit => {
                self.advance();
                let (event, _) = self.expect_ident("for event name after `emit`")?;
                self.expect(TokenKind::LParen, "after event name")?;
                let args = self.call_args()?;
                self.expect(TokenKind::RParen, "after event arguments")?;
                self.expect(TokenKind::Semi, "after emit statement")?;
                Ok(Stmt {
                    kind: StmtKind::Emit { event, args },
                    offset,
                })
            }
            TokenKind::Let => {
                self.advance();
                let (name, _) = self.expect_ident("after `let`")?;
                self.expect(TokenKind::Assign, "after variable name")?;
                let init = self.expr()?;
                self.expect(TokenKind::Semi, "after variable declaration")?;
                Ok(Stmt {
                    kind: StmtKind::VarDecl {
                        ty: None,
                        name,
                        init,
                    },
                    offset,
                })
            }
            // `uint256 x = e;` declares; `uint256(e)` is a cast call
            _ if self.is_type_token() && matches!(self.peek_ahead(1), TokenKind::Ident(_)) => {
                let ty = self.type_name("for variable declaration")?;
                let (name, _) = self.expect_ident("for variable name")?;
                self.expect(TokenKind::Assign, "after variable name")?;
                let init = self.expr()?;
                self.expect(TokenKind::Semi, "after variable declaration")?;
                Ok(Stmt {
                    kind: StmtKind::VarDecl {
                        ty: Some(ty),
                        name,
                        init,
                    },
                    offset,
                })
            }
            _ => {
                let target = self.expr()?;
                let op = match self.peek() {
                    TokenKind::Assign => Some(AssignOp::Assign),
                    TokenKind::PlusAssign => Some(AssignOp::AddAssign),
                    TokenKind::MinusAssign => Some(AssignOp::SubAssign),
                    _ => None,
                };
                match op {
                    Some(op) => {
                        self.advance();
                        let value = self.expr()?;
                        self.expect(TokenKind::Semi, "after assignment")?;
                        Ok(Stmt {
                            kind: StmtKind::Assign { target, op, value },
                            offset,
                        })
                    }
                    None => {
                        self.expect(TokenKind::Semi, "after expression statement")?;
                        Ok(Stmt {
                            kind: StmtKind::Expr(target),
                            offset,
                        })
                    }
                }
            }
        }
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let offset = self.offset();
        self.expect(TokenKind::If, "at if statement")?;
        self.expect(TokenKind::LParen, "after `if`")?;
        let condition = self.expr()?;
        self.expect(TokenKind::RParen, "after if condition")?;
        let then_branch = self.block()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.peek() == &TokenKind::If {
                Some(vec![self.if_statement()?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            offset,
        })
    }

    // --- expressions ----------------------------------------------------

    fn call_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == &TokenKind::RParen {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn expr(&mut self) -> Result<Expr> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr> {
        let condition = self.logical_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let offset = condition.offset;
        let then_value = self.expr()?;
        self.expect(TokenKind::Colon, "in ternary expression")?;
        let else_value = self.expr()?;
        Ok(Expr {
            kind: ExprKind::Ternary {
                condition: Box::new(condition),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
            offset,
        })
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut lhs = self.logical_and()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.logical_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut lhs = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.relational()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        if self.eat(&TokenKind::Bang) {
            let operand = self.unary()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                offset,
            });
        }
        if self.eat(&TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                offset,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let (field, _) = self.expect_ident("after `.`")?;
                let offset = expr.offset;
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        field,
                    },
                    offset,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expr()?;
                self.expect(TokenKind::RBracket, "after index expression")?;
                let offset = expr.offset;
                expr = Expr {
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    offset,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.peek().clone() {
            TokenKind::IntLit(value) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::IntLit(value),
                    offset,
                })
            }
            TokenKind::StrLit(text) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::StrLit(text),
                    offset,
                })
            }
            TokenKind::HexLit(bytes) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::HexLit(bytes),
                    offset,
                })
            }
            TokenKind::BoolLit(value) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::BoolLit(value),
                    offset,
                })
            }
            TokenKind::AddressLit(text) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::AddressLit(text),
                    offset,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    let args = self.call_args()?;
                    self.expect(TokenKind::RParen, "after call arguments")?;
                    Ok(Expr {
                        kind: ExprKind::Call { callee: name, args },
                        offset,
                    })
                } else {
                    Ok(Expr {
                        kind: ExprKind::Ident(name),
                        offset,
                    })
                }
            }
            // type-name casts read as calls: uint256(x)
            _ if self.is_type_token() => {
                let ty = self.type_name("in expression")?;
                self.expect(TokenKind::LParen, "after type cast")?;
                let args = self.call_args()?;
                self.expect(TokenKind::RParen, "after cast argument")?;
                Ok(Expr {
                    kind: ExprKind::Call {
                        callee: ty.name().to_string(),
                        args,
                    },
                    offset,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "to close parenthesized expression")?;
                Ok(inner)
            }
            other => Err(Error::parse(
                format!("expected expression, found {}", other.describe()),
                offset,
            )),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let offset = lhs.offset;
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = r#"
        coin Counter {
            state {
                uint256 count;
            }

            @stateful
            action increment() {
                state.count += 1;
                recreateSelf();
            }
        }
    "#;

    #[test]
    fn parses_counter_contract() {
        let program = parse_program(COUNTER).expect("parse");
        assert_eq!(program.coins.len(), 1);
        let coin = &program.coins[0];
        assert_eq!(coin.name, "Counter");
        assert_eq!(coin.state.len(), 1);
        assert_eq!(coin.actions.len(), 1);
        let action = &coin.actions[0];
        assert_eq!(action.name, "increment");
        assert_eq!(action.decorators[0].name, "stateful");
        assert_eq!(action.body.len(), 2);
        assert!(matches!(
            action.body[0].kind,
            StmtKind::Assign {
                op: AssignOp::AddAssign,
                ..
            }
        ));
    }

    #[test]
    fn parses_storage_forms() {
        let source = r#"
            coin Vault {
                storage address owner = 0x1111111111111111111111111111111111111111111111111111111111111111;
                storage {
                    uint256 fee = 10;
                    bool open;
                }
                action noop() { }
            }
        "#;
        let program = parse_program(source).expect("parse");
        let coin = &program.coins[0];
        assert_eq!(coin.storage.len(), 3);
        assert_eq!(coin.storage[0].name, "owner");
        assert!(coin.storage[2].init.is_none());
    }

    #[test]
    fn parses_require_send_and_events() {
        let source = r#"
            coin Escrow {
                storage address owner = 0x1111111111111111111111111111111111111111111111111111111111111111;
                event Released(address to, uint256 amount);
                action release(uint256 amount) {
                    require(msg.sender == owner, "Not owner");
                    send(owner, amount);
                    emit Released(owner, amount);
                }
            }
        "#;
        let program = parse_program(source).expect("parse");
        let coin = &program.coins[0];
        assert_eq!(coin.events.len(), 1);
        let action = &coin.actions[0];
        assert!(matches!(
            &action.body[0].kind,
            StmtKind::Require {
                message: Some(m),
                ..
            } if m == "Not owner"
        ));
        assert!(matches!(&action.body[2].kind, StmtKind::Emit { event, .. } if event == "Released"));
    }

    #[test]
    fn parses_layers_and_modifiers() {
        let source = r#"
            coin Token {
                layer singleton(launcher_id = 0x1111111111111111111111111111111111111111111111111111111111111111);
                modifier onlyAbove(uint256 threshold) {
                    require(msg.amount > threshold);
                }
                @onlyAbove(100)
                action spend() { }
            }
        "#;
        let program = parse_program(source).expect("parse");
        let coin = &program.coins[0];
        assert_eq!(coin.layers[0].name, "singleton");
        assert_eq!(coin.layers[0].args[0].0, "launcher_id");
        assert_eq!(coin.modifiers.len(), 1);
        assert_eq!(coin.actions[0].decorators[0].name, "onlyAbove");
    }

    #[test]
    fn parses_ternary_and_precedence() {
        let source = r#"
            coin T {
                action f(uint256 a, uint256 b) {
                    let x = a + b * 2 == 10 ? a : b;
                    send(0x1111111111111111111111111111111111111111111111111111111111111111, x);
                }
            }
        "#;
        let program = parse_program(source).expect("parse");
        let action = &program.coins[0].actions[0];
        let StmtKind::VarDecl { init, .. } = &action.body[0].kind else {
            panic!("expected var decl");
        };
        assert!(matches!(init.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn parses_state_mapping_and_index() {
        let source = r#"
            coin Ledger {
                state {
                    mapping(address => uint256) balances;
                }
                @stateful
                action credit(address who, uint256 amount) {
                    state.balances[who] += amount;
                }
            }
        "#;
        let program = parse_program(source).expect("parse");
        let coin = &program.coins[0];
        assert!(matches!(coin.state[0], StateDecl::Map { .. }));
        assert!(matches!(
            &coin.actions[0].body[0].kind,
            StmtKind::Assign { target, .. } if matches!(target.kind, ExprKind::Index { .. })
        ));
    }

    #[test]
    fn missing_semicolon_is_a_parse_error() {
        let source = "coin C { action f() { let x = 1 } }";
        let err = parse_program(source).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("`;`"), "{err}");
    }

    #[test]
    fn unclosed_brace_is_reported() {
        let err = parse_program("coin C { action f() {").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn if_else_chain() {
        let source = r#"
            coin C {
                action f(uint256 n) {
                    if (n == 1) { reserveFee(1); }
                    else if (n == 2) { reserveFee(2); }
                    else { revert(); }
                }
            }
        "#;
        let program = parse_program(source).expect("parse");
        let StmtKind::If { else_branch, .. } = &program.coins[0].actions[0].body[0].kind else {
            panic!("expected if");
        };
        let nested = else_branch.as_ref().expect("else");
        assert!(matches!(nested[0].kind, StmtKind::If { .. }));
    }
}
