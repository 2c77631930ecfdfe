//! Hand-written tokenizer for the expression language.
//!
//! The only context-sensitive production is the regex literal: a `/`
//! starts one when the previous token cannot end an operand (so
//! `a / b` divides while `/alpha/i` lexes as a regex).

use crate::error::{BaseError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Regex { source: String, flags: String },
    /// Operators and delimiters, as written.
    Op(&'static str),
}

/// Multi-character operators, longest first so greedy matching works.
const MULTI_OPS: &[&str] = &[
    "===", "!==", ">>>", "**", "==", "!=", "<=", ">=", "&&", "||", "??", "<<", ">>",
];

const SINGLE_OPS: &[char] = &[
    '+', '-', '*', '/', '%', '(', ')', '[', ']', ',', '.', '?', ':', '!', '~', '<', '>',
    '&', '|', '^',
];

pub fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

pub fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// True when the previous token could end an operand, which makes a
/// following `/` a division rather than a regex literal.
fn ends_operand(token: &Token) -> bool {
    match token {
        Token::Int(_) | Token::Float(_) | Token::Str(_) | Token::Ident(_) => true,
        Token::Regex { .. } => true,
        Token::Op(op) => matches!(*op, ")" | "]"),
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    let err = |message: String| BaseError::ExprParse {
        source_text: source.to_string(),
        message,
    };

    while i < len {
        let ch = chars[i];

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        // Numbers: digits with optional decimal and exponent, or a
        // leading `.` followed by digits.
        if ch.is_ascii_digit() || (ch == '.' && i + 1 < len && chars[i + 1].is_ascii_digit())
        {
            let start = i;
            let mut is_float = false;
            while i < len && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < len && chars[i] == '.' {
                is_float = true;
                i += 1;
                while i < len && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < len && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < len && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < len && chars[j].is_ascii_digit() {
                    is_float = true;
                    i = j;
                    while i < len && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            if is_float {
                let n: f64 = text
                    .parse()
                    .map_err(|_| err(format!("invalid number literal `{}`", text)))?;
                tokens.push(Token::Float(n));
            } else {
                match text.parse::<i64>() {
                    Ok(n) => tokens.push(Token::Int(n)),
                    // Too large for i64: fall back to float.
                    Err(_) => tokens.push(Token::Float(
                        text.parse::<f64>()
                            .map_err(|_| err(format!("invalid number literal `{}`", text)))?,
                    )),
                }
            }
            continue;
        }

        // Strings. Backtick literals are tolerated as opaque strings.
        if ch == '\'' || ch == '"' || ch == '`' {
            let quote = ch;
            i += 1;
            let mut s = String::new();
            let mut closed = false;
            while i < len {
                let c = chars[i];
                if c == quote {
                    closed = true;
                    i += 1;
                    break;
                }
                if c == '\\' && i + 1 < len {
                    i += 1;
                    s.push(unescape(chars[i], &chars, &mut i));
                    i += 1;
                    continue;
                }
                s.push(c);
                i += 1;
            }
            if !closed {
                return Err(err(format!("unterminated string starting with {}", quote)));
            }
            tokens.push(Token::Str(s));
            continue;
        }

        // Identifiers.
        if is_identifier_start(ch) {
            let start = i;
            while i < len && is_identifier_char(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        // Regex literal, when a `/` cannot be division.
        if ch == '/' && !tokens.last().map(ends_operand).unwrap_or(false) {
            i += 1;
            let mut pattern = String::new();
            let mut in_class = false;
            let mut closed = false;
            while i < len {
                let c = chars[i];
                if c == '\\' && i + 1 < len {
                    pattern.push(c);
                    i += 1;
                    pattern.push(chars[i]);
                    i += 1;
                    continue;
                }
                match c {
                    '[' => in_class = true,
                    ']' => in_class = false,
                    '/' if !in_class => {
                        closed = true;
                        i += 1;
                        break;
                    }
                    '\n' => return Err(err("unterminated regex literal".to_string())),
                    _ => {}
                }
                pattern.push(c);
                i += 1;
            }
            if !closed {
                return Err(err("unterminated regex literal".to_string()));
            }
            let mut flags = String::new();
            while i < len && chars[i].is_ascii_alphabetic() {
                flags.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::Regex {
                source: pattern,
                flags,
            });
            continue;
        }

        // Multi-character operators, longest first.
        let rest: String = chars[i..].iter().take(3).collect();
        if let Some(&op) = MULTI_OPS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token::Op(op));
            i += op.len();
            continue;
        }

        if let Some(pos) = SINGLE_OPS.iter().position(|c| *c == ch) {
            // Index back into a static table to get a 'static str.
            const NAMES: &[&str] = &[
                "+", "-", "*", "/", "%", "(", ")", "[", "]", ",", ".", "?", ":", "!", "~",
                "<", ">", "&", "|", "^",
            ];
            tokens.push(Token::Op(NAMES[pos]));
            i += 1;
            continue;
        }

        return Err(err(format!("unexpected character `{}`", ch)));
    }

    Ok(tokens)
}

/// Decode the character after a backslash. `i` points at that
/// character and is advanced further only for `\uXXXX`.
fn unescape(ch: char, chars: &[char], i: &mut usize) -> char {
    match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        '0' => '\0',
        'u' => {
            if *i + 4 < chars.len() {
                let hex: String = chars[*i + 1..*i + 5].iter().collect();
                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(decoded) = char::from_u32(code) {
                        *i += 4;
                        return decoded;
                    }
                }
            }
            'u'
        }
        other => other,
    }
}
