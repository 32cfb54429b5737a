//! Boolean tag queries.
//!
//! A query such as `project && (todo || "in progress") && !done` is compiled
//! once into a [`TagExpr`] and then evaluated any number of times against
//! different universes.
//!
//! Grammar (keywords case-insensitive):
//!
//! ```text
//! expr    := or
//! or      := and (("||" | "or") and)*
//! and     := unary (("&&" | "and") unary)*
//! unary   := ("!" | "not") unary | primary
//! primary := IDENT | "(" or ")"
//! ```
//!
//! Identifiers are bare runs of non-whitespace, non-operator characters or
//! single/double quoted strings with backslash escapes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tag query syntax errors, reported with the byte offset they occur at
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagExprError {
    #[error("tag query is empty")]
    Empty,

    #[error("single '{op}' near byte {position}, expected '{op}{op}'")]
    LoneOperator { op: char, position: usize },

    #[error("missing closing quote near byte {position}")]
    UnterminatedQuote { position: usize },

    #[error("missing closing ')' for '(' at byte {position}")]
    UnclosedParen { position: usize },

    #[error("unexpected {token} near byte {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("expected tag name but reached end of query")]
    UnexpectedEnd,
}

/// Compiled tag query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExpr {
    Tag(String),
    Not(Box<TagExpr>),
    And(Box<TagExpr>, Box<TagExpr>),
    Or(Box<TagExpr>, Box<TagExpr>),
}

impl TagExpr {
    /// Compile a query string
    pub fn parse(raw: &str) -> Result<Self, TagExprError> {
        let tokens = tokenize(raw)?;
        if tokens.is_empty() {
            return Err(TagExprError::Empty);
        }

        let mut parser = Parser { tokens, index: 0 };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(TagExprError::UnexpectedToken {
                token: token.kind.describe(),
                position: token.position,
            });
        }
        Ok(expr)
    }

    /// Evaluate against `universe`
    ///
    /// A tag evaluates to `resolve(tag)` as returned (the resolver is expected
    /// to restrict members to the relevant candidates), `!x` to
    /// `universe - x`, `a && b` to the intersection and `a || b` to the union.
    /// Evaluation never mutates the expression.
    pub fn evaluate<T, F>(&self, universe: &BTreeSet<T>, resolve: &F) -> BTreeSet<T>
    where
        T: Ord + Clone,
        F: Fn(&str) -> BTreeSet<T>,
    {
        match self {
            TagExpr::Tag(tag) => resolve(tag),
            TagExpr::Not(inner) => {
                let excluded = inner.evaluate(universe, resolve);
                universe.difference(&excluded).cloned().collect()
            }
            TagExpr::And(left, right) => {
                let left = left.evaluate(universe, resolve);
                if left.is_empty() {
                    return left;
                }
                let right = right.evaluate(universe, resolve);
                left.intersection(&right).cloned().collect()
            }
            TagExpr::Or(left, right) => {
                let mut union = left.evaluate(universe, resolve);
                union.extend(right.evaluate(universe, resolve));
                union
            }
        }
    }

    /// Check a single tag set against the query
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        let universe = BTreeSet::from([()]);
        let resolve = |tag: &str| {
            if tags.contains(tag) {
                universe.clone()
            } else {
                BTreeSet::new()
            }
        };
        !self.evaluate(&universe, &resolve).is_empty()
    }
}

impl FromStr for TagExpr {
    type Err = TagExprError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for TagExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagExpr::Tag(tag) => write_tag(f, tag),
            TagExpr::Not(inner) => write!(f, "!{}", inner),
            TagExpr::And(left, right) => write!(f, "({} && {})", left, right),
            TagExpr::Or(left, right) => write!(f, "({} || {})", left, right),
        }
    }
}

/// Bare when the tokenizer reads the name back unchanged, double quoted otherwise
fn write_tag(f: &mut fmt::Formatter<'_>, tag: &str) -> fmt::Result {
    let keyword = ["and", "or", "not"]
        .iter()
        .any(|k| tag.eq_ignore_ascii_case(k));
    let bare = !tag.is_empty()
        && !keyword
        && !tag.chars().any(|c| c.is_whitespace() || is_operator_char(c) || c == '\\');
    if bare {
        return f.write_str(tag);
    }

    f.write_str("\"")?;
    for ch in tag.chars() {
        if ch == '"' || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", ch)?;
    }
    f.write_str("\"")
}

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("tag '{}'", name),
            TokenKind::And => "'&&'".to_string(),
            TokenKind::Or => "'||'".to_string(),
            TokenKind::Not => "'!'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn parse_or(&mut self) -> Result<TagExpr, TagExprError> {
        let mut expr = self.parse_and()?;
        while self.consume(&TokenKind::Or) {
            let right = self.parse_and()?;
            expr = TagExpr::Or(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<TagExpr, TagExprError> {
        let mut expr = self.parse_unary()?;
        while self.consume(&TokenKind::And) {
            let right = self.parse_unary()?;
            expr = TagExpr::And(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<TagExpr, TagExprError> {
        if self.consume(&TokenKind::Not) {
            let inner = self.parse_unary()?;
            return Ok(TagExpr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<TagExpr, TagExprError> {
        let token = self.next().ok_or(TagExprError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Ident(name) => Ok(TagExpr::Tag(name)),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                if self.consume(&TokenKind::RParen) {
                    Ok(inner)
                } else {
                    Err(TagExprError::UnclosedParen {
                        position: token.position,
                    })
                }
            }
            other => Err(TagExprError::UnexpectedToken {
                token: other.describe(),
                position: token.position,
            }),
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        match self.peek() {
            Some(token) if &token.kind == kind => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn is_operator_char(ch: char) -> bool {
    matches!(ch, '(' | ')' | '!' | '&' | '|' | '"' | '\'')
}

fn tokenize(input: &str) -> Result<Vec<Token>, TagExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        if ch.is_whitespace() {
            continue;
        }

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '!' => TokenKind::Not,
            '&' | '|' => {
                if chars.next_if(|&(_, next)| next == ch).is_none() {
                    return Err(TagExprError::LoneOperator { op: ch, position });
                }
                if ch == '&' {
                    TokenKind::And
                } else {
                    TokenKind::Or
                }
            }
            '"' | '\'' => {
                let mut value = String::new();
                let mut escaped = false;
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if escaped {
                        value.push(next);
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == ch {
                        closed = true;
                        break;
                    } else {
                        value.push(next);
                    }
                }
                if !closed {
                    return Err(TagExprError::UnterminatedQuote { position });
                }
                TokenKind::Ident(value)
            }
            _ => {
                let mut word = String::from(ch);
                while let Some((_, next)) =
                    chars.next_if(|&(_, next)| !next.is_whitespace() && !is_operator_char(next))
                {
                    word.push(next);
                }
                if word.eq_ignore_ascii_case("and") {
                    TokenKind::And
                } else if word.eq_ignore_ascii_case("or") {
                    TokenKind::Or
                } else if word.eq_ignore_ascii_case("not") {
                    TokenKind::Not
                } else {
                    TokenKind::Ident(word)
                }
            }
        };
        tokens.push(Token { kind, position });
    }

    Ok(tokens)
}
