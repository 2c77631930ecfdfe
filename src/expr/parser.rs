//! Source rewriting and Pratt parser for the expression language.

use crate::error::{BaseError, Result};
use crate::expr::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use crate::expr::lexer::{is_identifier_char, is_identifier_start, tokenize, Token};

/// Alias that `if(...)` calls are rewritten to, so the global
/// function can coexist with the keyword in the grammar.
pub const IF_ALIAS: &str = "_if";
/// Alias that `file(...)` calls are rewritten to; bare `file` member
/// access is left untouched.
pub const FILE_FN_ALIAS: &str = "_fileFn";

/// Rewrite bare `if(` and `file(` calls to their aliases, preserving
/// single-, double- and backtick-quoted spans verbatim.
pub fn preprocess(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(source.len() + 8);
    let mut i = 0;

    while i < len {
        let ch = chars[i];

        // Copy quoted spans verbatim, honoring backslash escapes.
        if ch == '\'' || ch == '"' || ch == '`' {
            let quote = ch;
            out.push(ch);
            i += 1;
            while i < len {
                let c = chars[i];
                out.push(c);
                i += 1;
                if c == '\\' && i < len {
                    out.push(chars[i]);
                    i += 1;
                    continue;
                }
                if c == quote {
                    break;
                }
            }
            continue;
        }

        if is_identifier_start(ch) {
            let preceded_by_member = i > 0 && (is_identifier_char(chars[i - 1]) || chars[i - 1] == '.');
            let start = i;
            while i < len && is_identifier_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();

            if !preceded_by_member && (word == "if" || word == "file") {
                // A call only if the next significant char is `(`.
                let mut j = i;
                while j < len && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < len && chars[j] == '(' {
                    out.push_str(if word == "if" { IF_ALIAS } else { FILE_FN_ALIAS });
                    continue;
                }
            }
            out.push_str(&word);
            continue;
        }

        out.push(ch);
        i += 1;
    }

    out
}

/// Parse an expression source string into an AST.
pub fn parse(source: &str) -> Result<Expr> {
    let rewritten = preprocess(source);
    let tokens = tokenize(&rewritten).map_err(|e| relabel(e, source))?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_expression()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error(format!(
            "unexpected trailing token {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(expr)
}

/// Errors from the lexer mention the rewritten source; restore the
/// original text the user wrote.
fn relabel(err: BaseError, original: &str) -> BaseError {
    match err {
        BaseError::ExprParse { message, .. } => BaseError::ExprParse {
            source_text: original.to_string(),
            message,
        },
        other => other,
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

/// Binding power of a binary operator token, if it is one.
fn binary_power(token: &Token) -> Option<(BinaryOp, u8)> {
    let (op, power) = match token {
        Token::Op("|") => (BinaryOp::BitOr, 4),
        Token::Op("^") => (BinaryOp::BitXor, 5),
        Token::Op("&") => (BinaryOp::BitAnd, 6),
        Token::Op("==") => (BinaryOp::Eq, 7),
        Token::Op("!=") => (BinaryOp::NotEq, 7),
        Token::Op("===") => (BinaryOp::StrictEq, 7),
        Token::Op("!==") => (BinaryOp::StrictNotEq, 7),
        Token::Op("<") => (BinaryOp::Lt, 8),
        Token::Op(">") => (BinaryOp::Gt, 8),
        Token::Op("<=") => (BinaryOp::LtEq, 8),
        Token::Op(">=") => (BinaryOp::GtEq, 8),
        Token::Ident(word) if word == "in" => (BinaryOp::In, 8),
        Token::Ident(word) if word == "instanceof" => (BinaryOp::InstanceOf, 8),
        Token::Op("<<") => (BinaryOp::Shl, 9),
        Token::Op(">>") => (BinaryOp::Shr, 9),
        Token::Op(">>>") => (BinaryOp::UShr, 9),
        Token::Op("+") => (BinaryOp::Add, 10),
        Token::Op("-") => (BinaryOp::Sub, 10),
        Token::Op("*") => (BinaryOp::Mul, 11),
        Token::Op("/") => (BinaryOp::Div, 11),
        Token::Op("%") => (BinaryOp::Rem, 11),
        Token::Op("**") => (BinaryOp::Pow, 12),
        _ => return None,
    };
    Some((op, power))
}

fn logical_power(token: &Token) -> Option<(LogicalOp, u8)> {
    match token {
        Token::Op("??") => Some((LogicalOp::Nullish, 1)),
        Token::Op("||") => Some((LogicalOp::Or, 2)),
        Token::Op("&&") => Some((LogicalOp::And, 3)),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    fn error(&self, message: String) -> BaseError {
        BaseError::ExprParse {
            source_text: self.source.to_string(),
            message,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(found)) if *found == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &'static str) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`, got {:?}", op, self.peek())))
        }
    }

    /// Full expression: the ternary level.
    fn parse_expression(&mut self) -> Result<Expr> {
        let test = self.parse_binary(0)?;
        if self.eat_op("?") {
            let consequent = self.parse_expression()?;
            self.expect_op(":")?;
            let alternate = self.parse_expression()?;
            return Ok(Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }
        Ok(test)
    }

    /// Precedence climbing over both logical and arithmetic binary
    /// operators. `**` is right-associative; everything else binds
    /// left.
    fn parse_binary(&mut self, min_power: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let Some(token) = self.peek() else { break };

            if let Some((op, power)) = logical_power(token) {
                if power < min_power {
                    break;
                }
                self.pos += 1;
                let right = self.parse_binary(power + 1)?;
                left = Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            if let Some((op, power)) = binary_power(token) {
                if power < min_power {
                    break;
                }
                self.pos += 1;
                let next_min = if op == BinaryOp::Pow { power } else { power + 1 };
                let right = self.parse_binary(next_min)?;
                left = Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            break;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Op("!")) => Some(UnaryOp::Not),
            Some(Token::Op("+")) => Some(UnaryOp::Plus),
            Some(Token::Op("-")) => Some(UnaryOp::Minus),
            Some(Token::Op("~")) => Some(UnaryOp::BitNot),
            Some(Token::Ident(word)) if word == "typeof" => Some(UnaryOp::TypeOf),
            Some(Token::Ident(word)) if word == "void" => Some(UnaryOp::Void),
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
    }

    /// Member access, indexing, and calls bind tightest.
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat_op(".") {
                match self.advance() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property: name,
                        };
                    }
                    other => {
                        return Err(
                            self.error(format!("expected property name after `.`, got {:?}", other))
                        )
                    }
                }
                continue;
            }

            if self.eat_op("[") {
                let index = self.parse_expression()?;
                self.expect_op("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
                continue;
            }

            if self.eat_op("(") {
                let mut args = Vec::new();
                if !self.eat_op(")") {
                    loop {
                        args.push(self.parse_expression()?);
                        if self.eat_op(",") {
                            continue;
                        }
                        self.expect_op(")")?;
                        break;
                    }
                }
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
                continue;
            }

            break;
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Int(n)),
            Some(Token::Float(n)) => Ok(Expr::Float(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Regex { source, flags }) => Ok(Expr::Regex { source, flags }),
            Some(Token::Ident(word)) => Ok(match word.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                "NaN" => Expr::NaN,
                "Infinity" => Expr::Infinity,
                _ => Expr::Identifier(word),
            }),
            Some(Token::Op("(")) => {
                let expr = self.parse_expression()?;
                self.expect_op(")")?;
                Ok(expr)
            }
            Some(Token::Op("[")) => self.parse_array(),
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }

    /// Array literal; elisions (`[1,,3]`) become undefined holes.
    fn parse_array(&mut self) -> Result<Expr> {
        let mut elements = Vec::new();
        loop {
            if self.eat_op("]") {
                break;
            }
            if self.eat_op(",") {
                elements.push(Expr::Undefined);
                continue;
            }
            elements.push(self.parse_expression()?);
            if self.eat_op(",") {
                continue;
            }
            self.expect_op("]")?;
            break;
        }
        Ok(Expr::Array(elements))
    }
}
