use super::ast::{BinaryOp, Expr, LogicalOp, TemplateSegment, UnaryOp};
use super::lexer::{Punct, Spanned, TemplatePart, Token, tokenize};
use crate::{Error, Result};

const RED_ZONE: usize = 32 * 1024;
const STACK_CHUNK: usize = 1024 * 1024;

/// Parses a complete binding expression.
pub fn parse_expression(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sequence()?;
    let next = parser.peek();
    match &next.token {
        Token::Eof => Ok(expr),
        other => Err(unexpected(other, next.pos)),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Spanned {
        // The token stream always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned {
        let token = self.peek().clone();
        if !matches!(token.token, Token::Eof) {
            self.pos += 1;
        }
        token
    }

    fn peek_punct(&self) -> Option<Punct> {
        match self.peek().token {
            Token::Punct(punct) => Some(punct),
            _ => None,
        }
    }

    fn consume_punct(&mut self, punct: Punct) -> bool {
        if self.peek_punct() == Some(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: Punct) -> Result<()> {
        if self.consume_punct(punct) {
            Ok(())
        } else {
            Err(Error::ExpressionParse(format!(
                "expected '{}' at {}",
                punct.as_str(),
                self.peek().pos
            )))
        }
    }

    /// Comma operator; argument and literal lists parse their items below it.
    fn parse_sequence(&mut self) -> Result<Expr> {
        let first = self.parse_assignment()?;
        if self.peek_punct() != Some(Punct::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.consume_punct(Punct::Comma) {
            items.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        stacker::maybe_grow(RED_ZONE, STACK_CHUNK, || {
            let target = self.parse_conditional()?;
            if !self.consume_punct(Punct::Assign) {
                return Ok(target);
            }
            if !matches!(target, Expr::Member { .. } | Expr::Index { .. }) {
                return Err(Error::ExpressionParse(
                    "assignment target must be a property or index access".into(),
                ));
            }
            let value = self.parse_assignment()?;
            Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
            })
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(0)?;
        if !self.consume_punct(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(Punct::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let Some(punct) = self.peek_punct() else {
                break;
            };
            let Some(prec) = binary_precedence(punct) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.parse_binary(prec + 1)?;
            left = combine(punct, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        stacker::maybe_grow(RED_ZONE, STACK_CHUNK, || {
            let op = match &self.peek().token {
                Token::Punct(Punct::Not) => Some(UnaryOp::Not),
                Token::Punct(Punct::Minus) => Some(UnaryOp::Neg),
                Token::Punct(Punct::Plus) => Some(UnaryOp::Plus),
                Token::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 1;
                let operand = self.parse_unary()?;
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
            self.parse_postfix()
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_punct() {
                Some(Punct::Dot) => {
                    self.pos += 1;
                    let property = self.expect_property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                    };
                }
                Some(Punct::OptionalDot) => {
                    self.pos += 1;
                    expr = match self.peek_punct() {
                        Some(Punct::LBracket) => {
                            self.pos += 1;
                            let index = self.parse_assignment()?;
                            self.expect_punct(Punct::RBracket)?;
                            Expr::Index {
                                object: Box::new(expr),
                                index: Box::new(index),
                                optional: true,
                            }
                        }
                        Some(Punct::LParen) => {
                            self.pos += 1;
                            let args = self.parse_arguments()?;
                            Expr::Call {
                                callee: Box::new(expr),
                                args,
                                optional: true,
                            }
                        }
                        _ => {
                            let property = self.expect_property_name()?;
                            Expr::Member {
                                object: Box::new(expr),
                                property,
                                optional: true,
                            }
                        }
                    };
                }
                Some(Punct::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_assignment()?;
                    self.expect_punct(Punct::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    };
                }
                Some(Punct::LParen) => {
                    self.pos += 1;
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn expect_property_name(&mut self) -> Result<String> {
        let spanned = self.advance();
        match spanned.token {
            Token::Ident(name) => Ok(name),
            _ => Err(Error::ExpressionParse(format!(
                "expected property name at {}",
                spanned.pos
            ))),
        }
    }

    // Called after the opening parenthesis.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.consume_punct(Punct::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment()?);
            if self.consume_punct(Punct::Comma) {
                if self.consume_punct(Punct::RParen) {
                    return Ok(args);
                }
                continue;
            }
            self.expect_punct(Punct::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let spanned = self.advance();
        match spanned.token {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::Str(value) => Ok(Expr::String(value)),
            Token::Template(parts) => {
                let mut segments = Vec::with_capacity(parts.len());
                for part in parts {
                    segments.push(match part {
                        TemplatePart::Text(text) => TemplateSegment::Text(text),
                        TemplatePart::Expr(src) => TemplateSegment::Expr(parse_expression(&src)?),
                    });
                }
                Ok(Expr::Template(segments))
            }
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                _ => Expr::Ident(name),
            }),
            Token::Punct(Punct::LParen) => {
                let inner = self.parse_sequence()?;
                self.expect_punct(Punct::RParen)?;
                Ok(inner)
            }
            Token::Punct(Punct::LBracket) => self.parse_array_literal(),
            Token::Punct(Punct::LBrace) => self.parse_object_literal(),
            other => Err(unexpected(&other, spanned.pos)),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        let mut items = Vec::new();
        loop {
            if self.consume_punct(Punct::RBracket) {
                return Ok(Expr::Array(items));
            }
            items.push(self.parse_assignment()?);
            if !self.consume_punct(Punct::Comma) {
                self.expect_punct(Punct::RBracket)?;
                return Ok(Expr::Array(items));
            }
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        loop {
            if self.consume_punct(Punct::RBrace) {
                return Ok(Expr::Object(entries));
            }
            let key_token = self.advance();
            let key = match key_token.token {
                Token::Ident(name) => name,
                Token::Str(text) => text,
                Token::Number(value) => crate::value::format_number(value),
                _ => {
                    return Err(Error::ExpressionParse(format!(
                        "expected object key at {}",
                        key_token.pos
                    )));
                }
            };
            let value = if self.consume_punct(Punct::Colon) {
                self.parse_assignment()?
            } else {
                Expr::Ident(key.clone())
            };
            entries.push((key, value));
            if !self.consume_punct(Punct::Comma) {
                self.expect_punct(Punct::RBrace)?;
                return Ok(Expr::Object(entries));
            }
        }
    }
}

fn unexpected(token: &Token, pos: usize) -> Error {
    match token {
        Token::Eof => Error::ExpressionParse("unexpected end of expression".into()),
        Token::Punct(punct) => {
            Error::ExpressionParse(format!("unexpected '{}' at {pos}", punct.as_str()))
        }
        other => Error::ExpressionParse(format!("unexpected token {other:?} at {pos}")),
    }
}

fn binary_precedence(punct: Punct) -> Option<u8> {
    Some(match punct {
        Punct::Nullish => 1,
        Punct::Or => 2,
        Punct::And => 3,
        Punct::Eq | Punct::Ne | Punct::StrictEq | Punct::StrictNe => 4,
        Punct::Lt | Punct::Gt | Punct::Le | Punct::Ge => 5,
        Punct::Plus | Punct::Minus => 6,
        Punct::Star | Punct::Slash | Punct::Percent => 7,
        _ => return None,
    })
}

fn combine(punct: Punct, left: Expr, right: Expr) -> Expr {
    let (left, right) = (Box::new(left), Box::new(right));
    let logical = match punct {
        Punct::And => Some(LogicalOp::And),
        Punct::Or => Some(LogicalOp::Or),
        Punct::Nullish => Some(LogicalOp::Nullish),
        _ => None,
    };
    if let Some(op) = logical {
        return Expr::Logical { op, left, right };
    }
    let op = match punct {
        Punct::Plus => BinaryOp::Add,
        Punct::Minus => BinaryOp::Sub,
        Punct::Star => BinaryOp::Mul,
        Punct::Slash => BinaryOp::Div,
        Punct::Percent => BinaryOp::Rem,
        Punct::Lt => BinaryOp::Lt,
        Punct::Gt => BinaryOp::Gt,
        Punct::Le => BinaryOp::Le,
        Punct::Ge => BinaryOp::Ge,
        Punct::Eq => BinaryOp::LooseEq,
        Punct::Ne => BinaryOp::LooseNe,
        Punct::StrictEq => BinaryOp::StrictEq,
        _ => BinaryOp::StrictNe,
    };
    Expr::Binary { op, left, right }
}
