//! Tokenizer — trie-backed longest-match scan over keywords, operators,
//! symbols, identifiers, numbers, strings, f-strings, and comments.
//!
//! Grounded in the teacher's `cypher::lexer` (char-by-char `Peekable`
//! scanner), generalized per spec.md §4.A: keyword/operator/symbol
//! recognition is driven by an explicit character trie rather than a long
//! chain of direct character comparisons, since the component is named
//! "Tokenizer" with an 8% share of the core and is described as
//! "trie-backed" rather than incidental.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{Error, Result};

/// A node in the keyword/operator/symbol trie. Each path from the root to a
/// node marked `terminal` spells one recognized lexeme; `terminal` carries
/// the canonical (uppercased, for keywords) spelling so the scanner can
/// recover it without re-slicing the input.
#[derive(Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    terminal: Option<&'static str>,
}

/// Greedy longest-match trie over the fixed keyword/operator/symbol sets.
struct Trie {
    root: TrieNode,
}

impl Trie {
    fn new(words: &[&'static str]) -> Self {
        let mut root = TrieNode::default();
        for word in words {
            let mut node = &mut root;
            for ch in word.chars() {
                node = node.children.entry(ch).or_default();
            }
            node.terminal = Some(word);
        }
        Trie { root }
    }

    /// Longest match starting at `chars`'s current position, case-sensitive.
    /// Returns the matched canonical spelling and its length in chars.
    fn longest_match(&self, chars: &[char]) -> Option<(&'static str, usize)> {
        let mut node = &self.root;
        let mut best: Option<(&'static str, usize)> = None;
        for (i, ch) in chars.iter().enumerate() {
            match node.children.get(ch) {
                Some(next) => {
                    node = next;
                    if let Some(word) = node.terminal {
                        best = Some((word, i + 1));
                    }
                }
                None => break,
            }
        }
        best
    }
}

const KEYWORDS: &[&str] = &[
    "WITH", "UNWIND", "LOAD", "JSON", "FROM", "POST", "HEADERS", "AS", "MATCH", "OPTIONAL",
    "WHERE", "CALL", "YIELD", "CREATE", "VIRTUAL", "DELETE", "RETURN", "UNION", "ALL",
    "DISTINCT", "ORDER", "BY", "ASC", "DESC", "LIMIT", "SKIP", "AND", "OR", "XOR", "NOT", "IN",
    "IS", "NULL", "TRUE", "FALSE", "CASE", "WHEN", "THEN", "ELSE", "END", "CONTAINS", "STARTS",
    "ENDS",
];

// Longest operators/symbols first is not required — the trie naturally
// prefers the longest match regardless of registration order.
const OPERATORS: &[&str] = &[
    "->", "<-", "<=", ">=", "<>", "..", "=~", "+=",
    "+", "-", "*", "/", "%", "^", "=", "<", ">", "(", ")", "[", "]", "{", "}", ",", ".", ":",
    "|", "$",
];

fn keyword_trie() -> &'static Trie {
    use std::sync::OnceLock;
    static TRIE: OnceLock<Trie> = OnceLock::new();
    TRIE.get_or_init(|| Trie::new(KEYWORDS))
}

fn operator_trie() -> &'static Trie {
    use std::sync::OnceLock;
    static TRIE: OnceLock<Trie> = OnceLock::new();
    TRIE.get_or_init(|| Trie::new(OPERATORS))
}

/// One fragment of an f-string: a literal segment or an embedded
/// expression segment (re-lexed/parsed independently by the parser).
#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Str(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(&'static str),
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),
    FString(Vec<FStringPart>),
    Parameter(String),
    Operator(&'static str),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

struct Scanner<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner {
            input,
            chars: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.len)
    }

    fn remaining_chars(&self) -> Vec<char> {
        let pos = self
            .chars
            .clone()
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.len);
        self.input[pos..].chars().collect()
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if let Some((_, '*')) = lookahead.peek().copied() {
                        self.bump();
                        self.bump();
                        loop {
                            match self.bump() {
                                None => {
                                    return Err(Error::SyntaxError {
                                        position: self.pos(),
                                        message: "unterminated block comment".into(),
                                    })
                                }
                                Some((_, '*')) if self.peek_char() == Some('/') => {
                                    self.bump();
                                    break;
                                }
                                _ => {}
                            }
                        }
                    } else if let Some((_, '/')) = lookahead.peek().copied() {
                        self.bump();
                        self.bump();
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_string(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::SyntaxError {
                        position: self.pos(),
                        message: "unterminated string literal".into(),
                    })
                }
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.bump() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, c)) if c == quote => out.push(quote),
                    Some((_, c)) => out.push(c),
                    None => {
                        return Err(Error::SyntaxError {
                            position: self.pos(),
                            message: "unterminated escape in string literal".into(),
                        })
                    }
                },
                Some((_, c)) => out.push(c),
            }
        }
        Ok(out)
    }

    /// Scans an f-string body (after the opening `f"`/`f'`) into alternating
    /// literal/expression segments. `{{`/`}}` escape to literal braces.
    fn scan_fstring(&mut self, quote: char) -> Result<Vec<FStringPart>> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::SyntaxError {
                        position: self.pos(),
                        message: "unterminated f-string literal".into(),
                    })
                }
                Some((_, c)) if c == quote => break,
                Some((_, '{')) if self.peek_char() == Some('{') => {
                    self.bump();
                    literal.push('{');
                }
                Some((_, '}')) if self.peek_char() == Some('}') => {
                    self.bump();
                    literal.push('}');
                }
                Some((_, '{')) => {
                    if !literal.is_empty() {
                        parts.push(FStringPart::Str(std::mem::take(&mut literal)));
                    }
                    let mut expr = String::new();
                    let mut depth = 1;
                    loop {
                        match self.bump() {
                            None => {
                                return Err(Error::SyntaxError {
                                    position: self.pos(),
                                    message: "unterminated f-string expression".into(),
                                })
                            }
                            Some((_, '{')) => {
                                depth += 1;
                                expr.push('{');
                            }
                            Some((_, '}')) => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                expr.push('}');
                            }
                            Some((_, c)) => expr.push(c),
                        }
                    }
                    parts.push(FStringPart::Expr(expr));
                }
                Some((_, '\\')) => match self.bump() {
                    Some((_, 'n')) => literal.push('\n'),
                    Some((_, c)) => literal.push(c),
                    None => {
                        return Err(Error::SyntaxError {
                            position: self.pos(),
                            message: "unterminated escape in f-string".into(),
                        })
                    }
                },
                Some((_, c)) => literal.push(c),
            }
        }
        if !literal.is_empty() || parts.is_empty() {
            parts.push(FStringPart::Str(literal));
        }
        Ok(parts)
    }

    fn scan_number(&mut self, start: usize) -> (TokenKind, usize) {
        let mut end = start;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.bump();
                end = self.pos();
            } else {
                break;
            }
        }
        let mut is_float = false;
        if self.peek_char() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some((_, c)) if c.is_ascii_digit()) {
                is_float = true;
                self.bump();
                end = self.pos();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        self.bump();
                        end = self.pos();
                    } else {
                        break;
                    }
                }
            }
        }
        let text = &self.input[start..end];
        if is_float {
            (TokenKind::Float(text.parse().unwrap_or(0.0)), end)
        } else {
            (TokenKind::Integer(text.parse().unwrap_or(0)), end)
        }
    }

    fn scan_identifier(&mut self, start: usize) -> (String, usize) {
        let mut end = start;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
                end = self.pos();
            } else {
                break;
            }
        }
        (self.input[start..end].to_string(), end)
    }
}

/// Tokenizes `input` into a vector ending with `TokenKind::Eof`.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut scanner = Scanner::new(input);
    let mut tokens = Vec::new();

    loop {
        scanner.skip_whitespace_and_comments()?;
        let start = scanner.pos();
        let Some(c) = scanner.peek_char() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span { start, end: start },
            });
            break;
        };

        if c == '`' {
            scanner.bump();
            let name = scanner.scan_string('`')?;
            tokens.push(Token {
                kind: TokenKind::Identifier(name),
                span: Span { start, end: scanner.pos() },
            });
            continue;
        }

        if c == '\'' || c == '"' {
            scanner.bump();
            let s = scanner.scan_string(c)?;
            tokens.push(Token {
                kind: TokenKind::String(s),
                span: Span { start, end: scanner.pos() },
            });
            continue;
        }

        if (c == 'f' || c == 'F') && {
            let mut lookahead = scanner.chars.clone();
            lookahead.next();
            matches!(lookahead.peek(), Some((_, '\'')) | Some((_, '"')))
        } {
            scanner.bump();
            let quote = scanner.bump().unwrap().1;
            let parts = scanner.scan_fstring(quote)?;
            tokens.push(Token {
                kind: TokenKind::FString(parts),
                span: Span { start, end: scanner.pos() },
            });
            continue;
        }

        if c == '$' {
            scanner.bump();
            let pstart = scanner.pos();
            if matches!(scanner.peek_char(), Some(c) if c.is_alphabetic() || c == '_') {
                let (name, _) = scanner.scan_identifier(pstart);
                tokens.push(Token {
                    kind: TokenKind::Parameter(name),
                    span: Span { start, end: scanner.pos() },
                });
                continue;
            }
            return Err(Error::SyntaxError {
                position: pstart,
                message: "expected parameter name after '$'".into(),
            });
        }

        if c.is_ascii_digit() {
            let (kind, end) = scanner.scan_number(start);
            tokens.push(Token {
                kind,
                span: Span { start, end },
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let (ident, end) = scanner.scan_identifier(start);
            let upper = ident.to_ascii_uppercase();
            // Greedy longest-match over the keyword trie against the
            // upper-cased spelling; preserves user-identifier casing when
            // no keyword matches (spec.md §4.A).
            let chars: Vec<char> = upper.chars().collect();
            let kind = match keyword_trie().longest_match(&chars) {
                Some((kw, n)) if n == chars.len() => TokenKind::Keyword(kw),
                _ => TokenKind::Identifier(ident),
            };
            tokens.push(Token {
                kind,
                span: Span { start, end },
            });
            continue;
        }

        let remaining = scanner.remaining_chars();
        if let Some((op, n)) = operator_trie().longest_match(&remaining) {
            for _ in 0..n {
                scanner.bump();
            }
            tokens.push(Token {
                kind: TokenKind::Operator(op),
                span: Span { start, end: scanner.pos() },
            });
            continue;
        }

        return Err(Error::SyntaxError {
            position: start,
            message: format!("unexpected character '{c}'"),
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_keywords_case_insensitively() {
        assert_eq!(
            kinds("match WITH"),
            vec![TokenKind::Keyword("MATCH"), TokenKind::Keyword("WITH"), TokenKind::Eof]
        );
    }

    #[test]
    fn preserves_identifier_case_when_not_a_keyword() {
        let ks = kinds("Person");
        assert_eq!(ks[0], TokenKind::Identifier("Person".into()));
    }

    #[test]
    fn distinguishes_integer_and_float() {
        assert_eq!(kinds("42")[0], TokenKind::Integer(42));
        assert_eq!(kinds("3.14")[0], TokenKind::Float(3.14));
        assert_eq!(kinds("3.")[0], TokenKind::Integer(3));
    }

    #[test]
    fn longest_match_operator_precedence() {
        assert_eq!(kinds("<=")[0], TokenKind::Operator("<="));
        assert_eq!(kinds("<>")[0], TokenKind::Operator("<>"));
        assert_eq!(kinds("->")[0], TokenKind::Operator("->"));
        assert_eq!(kinds("*..")[0], TokenKind::Operator("*"));
    }

    #[test]
    fn backtick_escaped_identifier_can_shadow_keyword() {
        let ks = kinds("`return`");
        assert_eq!(ks[0], TokenKind::Identifier("return".into()));
    }

    #[test]
    fn parameter_token() {
        assert_eq!(kinds("$name")[0], TokenKind::Parameter("name".into()));
    }

    #[test]
    fn fstring_alternates_literal_and_expr_segments() {
        let ks = kinds(r#"f"hello {name}!""#);
        match &ks[0] {
            TokenKind::FString(parts) => {
                assert_eq!(
                    parts,
                    &vec![
                        FStringPart::Str("hello ".into()),
                        FStringPart::Expr("name".into()),
                        FStringPart::Str("!".into()),
                    ]
                );
            }
            other => panic!("expected f-string token, got {other:?}"),
        }
    }

    #[test]
    fn fstring_escapes_double_braces() {
        let ks = kinds(r#"f"{{literal}}""#);
        match &ks[0] {
            TokenKind::FString(parts) => {
                assert_eq!(parts, &vec![FStringPart::Str("{literal}".into())]);
            }
            other => panic!("expected f-string token, got {other:?}"),
        }
    }

    #[test]
    fn block_and_line_comments_are_skipped() {
        let ks = kinds("MATCH /* comment */ (n) // trailing\nRETURN n");
        assert!(matches!(ks[0], TokenKind::Keyword("MATCH")));
    }
}
