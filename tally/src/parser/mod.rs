//! Hand-written recursive-descent parser for expression lines

use crate::ast::{BinOp, Expr, Span, Spanned, UnOp};
use crate::error::{CalcError, Result};
use crate::lexer::Token;

/// Parse a token stream into an expression tree
pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Spanned<Expr>> {
    if tokens.is_empty() {
        return Err(CalcError::syntax("empty expression", Span::new(0, 0)));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;

    if let Some((token, span)) = parser.peek() {
        return Err(CalcError::syntax(
            format!("unexpected {} after expression", token.describe()),
            *span,
        ));
    }

    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&(Token, Span)> {
        self.tokens.get(self.pos)
    }

    fn peek2(&self) -> Option<&(Token, Span)> {
        self.tokens.get(self.pos + 1)
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    /// Span just past the final token, for end-of-input errors
    fn end_span(&self) -> Span {
        match self.tokens.last() {
            Some((_, span)) => Span::new(span.end, span.end + 1),
            None => Span::new(0, 1),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<Span> {
        match self.advance() {
            Some((token, span)) if token == *expected => Ok(span),
            Some((token, span)) => Err(CalcError::syntax(
                format!("expected {what}, found {}", token.describe()),
                span,
            )),
            None => Err(CalcError::syntax(
                format!("expected {what}, found end of line"),
                self.end_span(),
            )),
        }
    }

    /// expression := IDENT '=' expression | comparison
    fn parse_expression(&mut self) -> Result<Spanned<Expr>> {
        if let (Some((Token::Ident(name), span)), Some((Token::Eq, _))) =
            (self.peek(), self.peek2())
        {
            let name = name.clone();
            let start = *span;
            self.advance(); // identifier
            self.advance(); // '='
            let value = self.parse_expression()?;
            let span = start.merge(value.span);
            return Ok(Spanned::new(
                Expr::Assign {
                    name,
                    value: Box::new(value),
                },
                span,
            ));
        }

        self.parse_comparison()
    }

    /// comparison := additive (CMPOP additive)*
    fn parse_comparison(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_additive()?;

        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Gt => BinOp::Gt,
                Token::LtEq => BinOp::Le,
                Token::GtEq => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// additive := multiplicative (('+'|'-') multiplicative)*
    fn parse_additive(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_multiplicative()?;

        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// multiplicative := unary (('*'|'/'|'%') unary)*
    fn parse_multiplicative(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_unary()?;

        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// unary := ('-'|'+') unary | power
    ///
    /// `-2^2` parses as `-(2^2)`: the power level sits below unary, so the
    /// minus applies to the whole exponentiation.
    fn parse_unary(&mut self) -> Result<Spanned<Expr>> {
        match self.peek() {
            Some((Token::Minus, span)) => {
                let start = *span;
                self.advance();
                let expr = self.parse_unary()?;
                let span = start.merge(expr.span);
                Ok(Spanned::new(
                    Expr::Unary {
                        op: UnOp::Neg,
                        expr: Box::new(expr),
                    },
                    span,
                ))
            }
            Some((Token::Plus, _)) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    /// power := primary ('^' unary)?   (right-associative)
    fn parse_power(&mut self) -> Result<Spanned<Expr>> {
        let base = self.parse_primary()?;

        if let Some((Token::Caret, _)) = self.peek() {
            self.advance();
            let exponent = self.parse_unary()?;
            let span = base.span.merge(exponent.span);
            return Ok(Spanned::new(
                Expr::Binary {
                    left: Box::new(base),
                    op: BinOp::Pow,
                    right: Box::new(exponent),
                },
                span,
            ));
        }

        Ok(base)
    }

    /// primary := literal | IDENT | IDENT '(' args ')' | '(' expression ')'
    fn parse_primary(&mut self) -> Result<Spanned<Expr>> {
        match self.advance() {
            Some((Token::IntLit(n), span)) => Ok(Spanned::new(Expr::IntLit(n), span)),
            Some((Token::FloatLit(x), span)) => Ok(Spanned::new(Expr::FloatLit(x), span)),
            Some((Token::StringLit(s), span)) => Ok(Spanned::new(Expr::StrLit(s), span)),
            Some((Token::True, span)) => Ok(Spanned::new(Expr::BoolLit(true), span)),
            Some((Token::False, span)) => Ok(Spanned::new(Expr::BoolLit(false), span)),
            Some((Token::Ident(name), span)) => {
                if let Some((Token::LParen, _)) = self.peek() {
                    self.advance();
                    let (args, close) = self.parse_args()?;
                    Ok(Spanned::new(
                        Expr::Call { func: name, args },
                        span.merge(close),
                    ))
                } else {
                    Ok(Spanned::new(Expr::Var(name), span))
                }
            }
            Some((Token::LParen, _)) => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(expr)
            }
            Some((token, span)) => Err(CalcError::syntax(
                format!("unexpected {}", token.describe()),
                span,
            )),
            None => Err(CalcError::syntax(
                "unexpected end of line",
                self.end_span(),
            )),
        }
    }

    /// Comma-separated argument list; the opening `(` is already consumed.
    /// Returns the arguments and the span of the closing `)`.
    fn parse_args(&mut self) -> Result<(Vec<Spanned<Expr>>, Span)> {
        let mut args = Vec::new();

        if let Some((Token::RParen, _)) = self.peek() {
            let (_, span) = self.advance().unwrap();
            return Ok((args, span));
        }

        loop {
            args.push(self.parse_expression()?);
            match self.advance() {
                Some((Token::Comma, _)) => continue,
                Some((Token::RParen, span)) => return Ok((args, span)),
                Some((token, span)) => {
                    return Err(CalcError::syntax(
                        format!("expected `,` or `)`, found {}", token.describe()),
                        span,
                    ));
                }
                None => {
                    return Err(CalcError::syntax(
                        "unclosed argument list",
                        self.end_span(),
                    ));
                }
            }
        }
    }
}
