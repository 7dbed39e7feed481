use crate::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::lexer::{Token, TokenKind};
use crate::parser::error::ParseError;

pub(crate) fn parse_script(
    tokens: Vec<Token>,
    source_len: usize,
    file_id: usize,
) -> Result<Vec<Stmt>, ParseError> {
    let mut p = Grammar::new(tokens, source_len, file_id);
    let mut statements = Vec::new();
    p.skip_newlines();
    while !p.at_end() {
        statements.push(p.parse_stmt()?);
        p.expect_terminator()?;
        p.skip_newlines();
    }
    Ok(statements)
}

pub(crate) fn parse_expression(
    tokens: Vec<Token>,
    source_len: usize,
    file_id: usize,
) -> Result<Expr, ParseError> {
    let mut p = Grammar::new(tokens, source_len, file_id);
    p.skip_newlines();
    if p.at_end() {
        return Err(p.error_here("expected an expression"));
    }
    let expr = p.parse_expr(0)?;
    p.skip_newlines();
    if !p.at_end() {
        return Err(p.error_here("expected end of input after expression"));
    }
    Ok(expr)
}

/// Left/right binding power for infix operators (Pratt parsing).
fn binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Or => (1, 2),
        BinaryOp::And => (3, 4),
        BinaryOp::Eq | BinaryOp::Ne => (5, 6),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => (7, 8),
        BinaryOp::Add | BinaryOp::Sub => (9, 10),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => (11, 12),
    }
}

fn infix_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::PipePipe => Some(BinaryOp::Or),
        TokenKind::AmpAmp => Some(BinaryOp::And),
        TokenKind::EqEq => Some(BinaryOp::Eq),
        TokenKind::BangEq => Some(BinaryOp::Ne),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::LtEq => Some(BinaryOp::Le),
        TokenKind::GtEq => Some(BinaryOp::Ge),
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        TokenKind::Percent => Some(BinaryOp::Rem),
        _ => None,
    }
}

struct Grammar {
    tokens: Vec<Token>,
    pos: usize,
    source_len: usize,
    file_id: usize,
}

impl Grammar {
    fn new(tokens: Vec<Token>, source_len: usize, file_id: usize) -> Self {
        Grammar {
            tokens,
            pos: 0,
            source_len,
            file_id,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek2_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| &t.kind)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn bump_if(&mut self, f: impl FnOnce(&TokenKind) -> bool) -> Option<Token> {
        match self.peek() {
            Some(t) if f(&t.kind) => self.bump(),
            _ => None,
        }
    }

    fn expect(&mut self, want: &TokenKind, what: &str) -> Result<Token, ParseError> {
        self.bump_if(|k| k == want)
            .ok_or_else(|| self.error_here(&format!("expected {}", what)))
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.bump_if(|k| matches!(k, TokenKind::Ident(_))) {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(name),
            _ => Err(self.error_here(&format!("expected {}", what))),
        }
    }

    /// Start position of the upcoming token, or end-of-source.
    fn here_start(&self) -> usize {
        self.peek().map(|t| t.span.start).unwrap_or(self.source_len)
    }

    /// End position of the most recently consumed token.
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            return 0;
        }
        self.tokens
            .get(self.pos - 1)
            .map(|t| t.span.end)
            .unwrap_or(self.source_len)
    }

    fn here_line(&self) -> usize {
        self.peek()
            .map(|t| t.line)
            .or_else(|| self.tokens.last().map(|t| t.line))
            .unwrap_or(1)
    }

    fn error_here(&self, message: &str) -> ParseError {
        let span = self
            .peek()
            .map(|t| t.span.clone())
            .unwrap_or(self.source_len..self.source_len);
        ParseError::new(message, span, self.here_line(), self.file_id)
    }

    fn skip_newlines(&mut self) {
        while self
            .bump_if(|k| matches!(k, TokenKind::Newline))
            .is_some()
        {}
    }

    /// A statement ends at a newline, end of input, or (inside a block)
    /// directly before the closing brace.
    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        match self.peek_kind() {
            None | Some(TokenKind::RBrace) => Ok(()),
            Some(TokenKind::Newline) => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error_here("expected end of statement")),
        }
    }

    // -- Statements ---------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Fn) => self.parse_fn_def(),
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::Ident(_)) if matches!(self.peek2_kind(), Some(TokenKind::Eq)) => {
                self.parse_assign()
            }
            _ => {
                let line = self.here_line();
                let start = self.here_start();
                let value = self.parse_expr(0)?;
                let span = start..self.prev_end();
                Ok(Stmt::Expr { value, line, span })
            }
        }
    }

    fn parse_assign(&mut self) -> Result<Stmt, ParseError> {
        let line = self.here_line();
        let start = self.here_start();
        let name = self.expect_ident("a variable name")?;
        self.expect(&TokenKind::Eq, "'='")?;
        let value = self.parse_expr(0)?;
        let span = start..self.prev_end();
        Ok(Stmt::Assign {
            name,
            value,
            line,
            span,
        })
    }

    fn parse_fn_def(&mut self) -> Result<Stmt, ParseError> {
        let line = self.here_line();
        let start = self.here_start();
        self.expect(&TokenKind::Fn, "'fn'")?;
        let name = self.expect_ident("a function name")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.bump_if(|k| matches!(k, TokenKind::RParen)).is_none() {
            loop {
                params.push(self.expect_ident("a parameter name")?);
                if self.bump_if(|k| matches!(k, TokenKind::Comma)).is_some() {
                    continue;
                }
                self.expect(&TokenKind::RParen, "')'")?;
                break;
            }
        }
        let body = self.parse_brace_block()?;
        let span = start..self.prev_end();
        Ok(Stmt::FnDef {
            name,
            params,
            body,
            line,
            span,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let line = self.here_line();
        let start = self.here_start();
        self.expect(&TokenKind::If, "'if'")?;
        let cond = self.parse_expr(0)?;
        let then_body = self.parse_brace_block()?;
        let else_body = if self.bump_if(|k| matches!(k, TokenKind::Else)).is_some() {
            if matches!(self.peek_kind(), Some(TokenKind::If)) {
                vec![self.parse_if()?]
            } else {
                self.parse_brace_block()?
            }
        } else {
            Vec::new()
        };
        let span = start..self.prev_end();
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
            line,
            span,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let line = self.here_line();
        let start = self.here_start();
        self.expect(&TokenKind::For, "'for'")?;
        let var = self.expect_ident("a loop variable")?;
        self.expect(&TokenKind::In, "'in'")?;
        let iter = self.parse_expr(0)?;
        let body = self.parse_brace_block()?;
        let span = start..self.prev_end();
        Ok(Stmt::For {
            var,
            iter,
            body,
            line,
            span,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let line = self.here_line();
        let start = self.here_start();
        self.expect(&TokenKind::Return, "'return'")?;
        let value = match self.peek_kind() {
            None | Some(TokenKind::Newline) | Some(TokenKind::RBrace) => None,
            _ => Some(self.parse_expr(0)?),
        };
        let span = start..self.prev_end();
        Ok(Stmt::Return { value, line, span })
    }

    fn parse_brace_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        self.skip_newlines();
        loop {
            if self.bump_if(|k| matches!(k, TokenKind::RBrace)).is_some() {
                return Ok(body);
            }
            if self.at_end() {
                return Err(self.error_here("expected '}'"));
            }
            body.push(self.parse_stmt()?);
            match self.peek_kind() {
                Some(TokenKind::Newline) => self.skip_newlines(),
                Some(TokenKind::RBrace) => {}
                None => return Err(self.error_here("expected '}'")),
                _ => return Err(self.error_here("expected end of statement")),
            }
        }
    }

    // -- Expressions --------------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let start = self.here_start();
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind().and_then(infix_op) {
                Some(op) => op,
                None => break,
            };
            let (lbp, rbp) = binding_power(op);
            if lbp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expr(rbp)?;
            let span = start..self.prev_end();
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.here_start();
        if let Some(t) = self.bump_if(|k| matches!(k, TokenKind::Minus | TokenKind::Bang)) {
            let op = if matches!(t.kind, TokenKind::Minus) {
                UnaryOp::Neg
            } else {
                UnaryOp::Not
            };
            let operand = self.parse_unary()?;
            let span = start..self.prev_end();
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.here_start();
        let mut expr = self.parse_primary()?;
        loop {
            if self.bump_if(|k| matches!(k, TokenKind::LParen)).is_some() {
                let (args, named) = self.parse_call_args()?;
                let span = start..self.prev_end();
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    named,
                    span,
                };
            } else if self
                .bump_if(|k| matches!(k, TokenKind::LBracket))
                .is_some()
            {
                let index = self.parse_expr(0)?;
                self.expect(&TokenKind::RBracket, "']'")?;
                let span = start..self.prev_end();
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Call arguments up to and including the closing parenthesis. Named
    /// arguments (`name=value`) must follow all positional arguments.
    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseError> {
        let mut args = Vec::new();
        let mut named: Vec<(String, Expr)> = Vec::new();
        if self.bump_if(|k| matches!(k, TokenKind::RParen)).is_some() {
            return Ok((args, named));
        }
        loop {
            let is_named = matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
                && matches!(self.peek2_kind(), Some(TokenKind::Eq));
            if is_named {
                let name = self.expect_ident("an argument name")?;
                self.expect(&TokenKind::Eq, "'='")?;
                let value = self.parse_expr(0)?;
                named.push((name, value));
            } else {
                if !named.is_empty() {
                    return Err(self.error_here("positional argument after named argument"));
                }
                args.push(self.parse_expr(0)?);
            }
            if self.bump_if(|k| matches!(k, TokenKind::Comma)).is_some() {
                continue;
            }
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok((args, named));
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = match self.bump() {
            Some(t) => t,
            None => return Err(self.error_here("expected an expression")),
        };
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Null => Ok(Expr::Null),
            TokenKind::Ident(name) => Ok(Expr::Var(name, token.span)),
            TokenKind::LParen => {
                let expr = self.parse_expr(0)?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if self
                    .bump_if(|k| matches!(k, TokenKind::RBracket))
                    .is_none()
                {
                    loop {
                        items.push(self.parse_expr(0)?);
                        if self.bump_if(|k| matches!(k, TokenKind::Comma)).is_some() {
                            // allow a trailing comma before the closing bracket
                            if self
                                .bump_if(|k| matches!(k, TokenKind::RBracket))
                                .is_some()
                            {
                                break;
                            }
                            continue;
                        }
                        self.expect(&TokenKind::RBracket, "']'")?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(ParseError::new(
                format!("unexpected {}", describe_token(&other)),
                token.span,
                token.line,
                self.file_id,
            )),
        }
    }
}

fn describe_token(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::Fn => "keyword 'fn'".to_string(),
        TokenKind::If => "keyword 'if'".to_string(),
        TokenKind::Else => "keyword 'else'".to_string(),
        TokenKind::For => "keyword 'for'".to_string(),
        TokenKind::In => "keyword 'in'".to_string(),
        TokenKind::Return => "keyword 'return'".to_string(),
        other => format!("token {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use crate::Parser;
    use crate::ast::{BinaryOp, Expr, Stmt};

    fn parse(source: &str) -> Vec<Stmt> {
        Parser::new(source.to_string(), 0)
            .parse()
            .expect("parse failed")
            .statements
    }

    #[test]
    fn assignment_and_expression_statements() {
        let stmts = parse("x = 1\nx + 2");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[0], Stmt::Assign { name, .. } if name == "x"));
        assert!(matches!(&stmts[1], Stmt::Expr { .. }));
    }

    #[test]
    fn statement_lines_are_first_token_lines() {
        let stmts = parse("a = 1\n\n\nb = [\n  2,\n  3,\n]\nc = 4");
        let lines: Vec<usize> = stmts.iter().map(|s| s.line()).collect();
        assert_eq!(lines, vec![1, 4, 8]);
    }

    #[test]
    fn precedence() {
        let stmts = parse("2 + 3 * 4");
        let Stmt::Expr { value, .. } = &stmts[0] else {
            panic!("expected expression statement");
        };
        let Expr::Binary { op, right, .. } = value else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn comparison_is_not_an_assignment() {
        let stmts = parse("x == 1");
        assert!(matches!(&stmts[0], Stmt::Expr { .. }));
    }

    #[test]
    fn function_definition_with_return() {
        let stmts = parse("fn add(a, b) {\n  return a + b\n}");
        let Stmt::FnDef { name, params, body, .. } = &stmts[0] else {
            panic!("expected fn definition");
        };
        assert_eq!(name, "add");
        assert_eq!(params, &vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(&body[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn if_else_chain() {
        let stmts = parse("if a {\n  1\n} else if b {\n  2\n} else {\n  3\n}");
        let Stmt::If { else_body, .. } = &stmts[0] else {
            panic!("expected if statement");
        };
        assert!(matches!(&else_body[0], Stmt::If { .. }));
    }

    #[test]
    fn named_call_arguments() {
        let stmts = parse("plot(xs, ys, title=\"t\", color=\"red\")");
        let Stmt::Expr {
            value: Expr::Call { args, named, .. },
            ..
        } = &stmts[0]
        else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert_eq!(named.len(), 2);
        assert_eq!(named[0].0, "title");
    }

    #[test]
    fn positional_after_named_is_an_error() {
        let err = Parser::new("f(a=1, 2)".to_string(), 0)
            .parse()
            .expect_err("should fail");
        assert!(err.message.contains("positional argument after named"));
    }

    #[test]
    fn unclosed_paren_is_an_error() {
        assert!(Parser::new("if (".to_string(), 0).parse().is_err());
    }

    #[test]
    fn expression_mode_accepts_a_single_expression() {
        let expr = Parser::new("\n\n1 + 2\n".to_string(), 0)
            .parse_expression()
            .expect("should parse");
        assert!(matches!(expr, Expr::Binary { .. }));
    }

    #[test]
    fn expression_mode_rejects_assignment() {
        assert!(
            Parser::new("x = 1".to_string(), 0)
                .parse_expression()
                .is_err()
        );
    }

    #[test]
    fn expression_mode_rejects_two_statements() {
        assert!(
            Parser::new("1\n2".to_string(), 0)
                .parse_expression()
                .is_err()
        );
    }

    #[test]
    fn expression_mode_rejects_statement_keywords() {
        assert!(
            Parser::new("return 1".to_string(), 0)
                .parse_expression()
                .is_err()
        );
    }
}
