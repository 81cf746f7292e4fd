//! Tokenizer: turns SQL text into a flat token stream.
//!
//! Keyword matching is case-insensitive (the scanner upper-cases each
//! word candidate before looking it up); identifiers and string contents
//! are preserved verbatim.

use std::sync::OnceLock;

use regex::Regex;

use crate::common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Create,
    Table,
    Drop,
    Alter,
    Add,
    Column,
    Index,
    On,
    Update,
    Set,
    Delete,
    Order,
    By,
    Limit,
    Group,
    Inner,
    Join,
    As,
    And,
    Or,
    Explain,
    Int,
    Text,
    Float,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match word {
            "SELECT" => Select,
            "FROM" => From,
            "WHERE" => Where,
            "INSERT" => Insert,
            "INTO" => Into,
            "VALUES" => Values,
            "CREATE" => Create,
            "TABLE" => Table,
            "DROP" => Drop,
            "ALTER" => Alter,
            "ADD" => Add,
            "COLUMN" => Column,
            "INDEX" => Index,
            "ON" => On,
            "UPDATE" => Update,
            "SET" => Set,
            "DELETE" => Delete,
            "ORDER" => Order,
            "BY" => By,
            "LIMIT" => Limit,
            "GROUP" => Group,
            "INNER" => Inner,
            "JOIN" => Join,
            "AS" => As,
            "AND" => And,
            "OR" => Or,
            "EXPLAIN" => Explain,
            "INT" => Int,
            "TEXT" => Text,
            "FLOAT" => Float,
            "COUNT" => Count,
            "SUM" => Sum,
            "AVG" => Avg,
            "MIN" => Min,
            "MAX" => Max,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Ident(String),
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),
    Star,
    Comma,
    Dot,
    LParen,
    RParen,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Eof,
}

/// A token paired with the byte offset it started at, for parse-error
/// reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?P<ws>\s+)",
            r"|(?P<float>\d+\.\d+)",
            r"|(?P<int>\d+)",
            r"|(?P<string>'(?:[^']|'')*')",
            r"|(?P<ident>[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?)",
            r"|(?P<gte>>=)",
            r"|(?P<lte><=)",
            r"|(?P<neq>!=)",
            r"|(?P<gt>>)",
            r"|(?P<lt><)",
            r"|(?P<eq>=)",
            r"|(?P<star>\*)",
            r"|(?P<comma>,)",
            r"|(?P<dot>\.)",
            r"|(?P<lparen>\()",
            r"|(?P<rparen>\))",
        ))
        .expect("static tokenizer regex is valid")
    })
}

/// Scan `sql` into a token stream terminated by [`Token::Eof`].
///
/// An unrecognized character (or a dangling qualified identifier ending in
/// a trailing dot) produces a [`Error::ParseError`] naming its offset.
pub fn tokenize(sql: &str) -> Result<Vec<SpannedToken>> {
    let re = token_regex();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < sql.len() {
        let remaining = &sql[pos..];
        let Some(m) = re.find(remaining) else {
            return Err(Error::parse(pos, format!("unrecognized input: '{remaining}'")));
        };
        if m.start() != 0 {
            return Err(Error::parse(pos, format!("unrecognized character: '{}'", &remaining[..1])));
        }

        let caps = re.captures(remaining).expect("find succeeded so captures must too");
        let offset = pos;
        let matched = m.as_str();
        pos += matched.len();

        if caps.name("ws").is_some() {
            continue;
        } else if let Some(g) = caps.name("float") {
            let value: f64 = g
                .as_str()
                .parse()
                .map_err(|_| Error::parse(offset, format!("invalid float literal '{}'", g.as_str())))?;
            tokens.push(SpannedToken { token: Token::FloatLit(value), offset });
        } else if let Some(g) = caps.name("int") {
            let value: i64 = g
                .as_str()
                .parse()
                .map_err(|_| Error::parse(offset, format!("invalid integer literal '{}'", g.as_str())))?;
            tokens.push(SpannedToken { token: Token::IntLit(value), offset });
        } else if let Some(g) = caps.name("string") {
            let inner = &g.as_str()[1..g.as_str().len() - 1];
            tokens.push(SpannedToken { token: Token::StringLit(inner.replace("''", "'")), offset });
        } else if let Some(g) = caps.name("ident") {
            let word = g.as_str();
            match Keyword::lookup(&word.to_ascii_uppercase()) {
                Some(keyword) if !word.contains('.') => {
                    tokens.push(SpannedToken { token: Token::Keyword(keyword), offset });
                }
                _ => tokens.push(SpannedToken { token: Token::Ident(word.to_string()), offset }),
            }
        } else if caps.name("gte").is_some() {
            tokens.push(SpannedToken { token: Token::Gte, offset });
        } else if caps.name("lte").is_some() {
            tokens.push(SpannedToken { token: Token::Lte, offset });
        } else if caps.name("neq").is_some() {
            tokens.push(SpannedToken { token: Token::Neq, offset });
        } else if caps.name("gt").is_some() {
            tokens.push(SpannedToken { token: Token::Gt, offset });
        } else if caps.name("lt").is_some() {
            tokens.push(SpannedToken { token: Token::Lt, offset });
        } else if caps.name("eq").is_some() {
            tokens.push(SpannedToken { token: Token::Eq, offset });
        } else if caps.name("star").is_some() {
            tokens.push(SpannedToken { token: Token::Star, offset });
        } else if caps.name("comma").is_some() {
            tokens.push(SpannedToken { token: Token::Comma, offset });
        } else if caps.name("dot").is_some() {
            tokens.push(SpannedToken { token: Token::Dot, offset });
        } else if caps.name("lparen").is_some() {
            tokens.push(SpannedToken { token: Token::LParen, offset });
        } else if caps.name("rparen").is_some() {
            tokens.push(SpannedToken { token: Token::RParen, offset });
        } else {
            return Err(Error::parse(offset, format!("unrecognized token: '{matched}'")));
        }
    }

    tokens.push(SpannedToken { token: Token::Eof, offset: sql.len() });
    Ok(tokens)
}
