use num_bigint::BigInt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // declarations
    Coin,
    Puzzle,
    Storage,
    State,
    Action,
    Const,
    Event,
    Modifier,
    Layer,
    Inner,
    Use,
    Compose,
    Mapping,
    // statements
    If,
    Else,
    Return,
    Require,
    Revert,
    Emit,
    Let,
    // types
    TyAddress,
    TyUint256,
    TyBool,
    TyString,
    TyBytes32,
    TyBytes,
    // literals
    Ident(String),
    IntLit(BigInt),
    StrLit(String),
    HexLit(Vec<u8>),
    AddressLit(String),
    BoolLit(bool),
    // punctuation
    At,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Question,
    Colon,
    FatArrow,
    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::IntLit(_) => "integer literal".to_string(),
            TokenKind::StrLit(_) => "string literal".to_string(),
            TokenKind::HexLit(_) => "hex literal".to_string(),
            TokenKind::AddressLit(_) => "address literal".to_string(),
            TokenKind::BoolLit(_) => "boolean literal".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("`{}`", other.text()),
        }
    }

    fn text(&self) -> &'static str {
        match self {
            TokenKind::Coin => "coin",
            TokenKind::Puzzle => "puzzle",
            TokenKind::Storage => "storage",
            TokenKind::State => "state",
            TokenKind::Action => "action",
            TokenKind::Const => "const",
            TokenKind::Event => "event",
            TokenKind::Modifier => "modifier",
            TokenKind::Layer => "layer",
            TokenKind::Inner => "inner",
            TokenKind::Use => "use",
            TokenKind::Compose => "compose",
            TokenKind::Mapping => "mapping",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Return => "return",
            TokenKind::Require => "require",
            TokenKind::Revert => "revert",
            TokenKind::Emit => "emit",
            TokenKind::Let => "let",
            TokenKind::TyAddress => "address",
            TokenKind::TyUint256 => "uint256",
            TokenKind::TyBool => "bool",
            TokenKind::TyString => "string",
            TokenKind::TyBytes32 => "bytes32",
            TokenKind::TyBytes => "bytes",
            TokenKind::At => "@",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::FatArrow => "=>",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

pub fn lex(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if ch == b'/' && bytes.get(pos + 1) == Some(&b'/') {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        if ch == b'/' && bytes.get(pos + 1) == Some(&b'*') {
            let start = pos;
            pos += 2;
            loop {
                if pos + 1 >= bytes.len() {
                    return Err(Error::parse("unterminated block comment", start));
                }
                if bytes[pos] == b'*' && bytes[pos + 1] == b'/' {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        let offset = pos;
        if ch == b'"' {
            let (text, next) = lex_string(bytes, pos)?;
            tokens.push(Token {
                kind: TokenKind::StrLit(text),
                offset,
            });
            pos = next;
            continue;
        }
        if ch.is_ascii_digit() {
            let (kind, next) = lex_number(bytes, pos)?;
            tokens.push(Token { kind, offset });
            pos = next;
            continue;
        }
        if ch.is_ascii_alphabetic() || ch == b'_' {
            let (kind, next) = lex_word(source, bytes, pos);
            tokens.push(Token { kind, offset });
            pos = next;
            continue;
        }

        let (kind, width) = lex_operator(bytes, pos)?;
        tokens.push(Token { kind, offset });
        pos += width;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: bytes.len(),
    });
    Ok(tokens)
}

fn lex_string(bytes: &[u8], start: usize) -> Result<(String, usize)> {
    let mut pos = start + 1;
    let mut raw = Vec::new();
    loop {
        match bytes.get(pos) {
            None => return Err(Error::parse("unterminated string literal", start)),
            Some(b'"') => {
                let text = String::from_utf8(raw)
                    .map_err(|_| Error::parse("invalid UTF-8 in string literal", start))?;
                return Ok((text, pos + 1));
            }
            Some(b'\\') => {
                let escaped = bytes
                    .get(pos + 1)
                    .ok_or_else(|| Error::parse("unterminated string escape", pos))?;
                raw.push(match escaped {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'\\' => b'\\',
                    b'"' => b'"',
                    other => {
                        return Err(Error::parse(
                            format!("unknown string escape `\\{}`", *other as char),
                            pos,
                        ));
                    }
                });
                pos += 2;
            }
            Some(&byte) => {
                raw.push(byte);
                pos += 1;
            }
        }
    }
}

fn lex_number(bytes: &[u8], start: usize) -> Result<(TokenKind, usize)> {
    if bytes[start] == b'0' && matches!(bytes.get(start + 1), Some(b'x') | Some(b'X')) {
        let mut pos = start + 2;
        while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
            pos += 1;
        }
        let raw = std::str::from_utf8(&bytes[start + 2..pos]).expect("hex digits");
        if raw.is_empty() || raw.len() % 2 != 0 {
            return Err(Error::parse("hex literal must have even length", start));
        }
        let value = hex::decode(raw).expect("validated hex");
        return Ok((TokenKind::HexLit(value), pos));
    }

    let mut pos = start;
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
        pos += 1;
    }
    let raw: String = std::str::from_utf8(&bytes[start..pos])
        .expect("digits")
        .chars()
        .filter(|c| *c != '_')
        .collect();
    let value = BigInt::parse_bytes(raw.as_bytes(), 10)
        .ok_or_else(|| Error::parse("invalid integer literal", start))?;
    Ok((TokenKind::IntLit(value), pos))
}

fn lex_word(source: &str, bytes: &[u8], start: usize) -> (TokenKind, usize) {
    let mut pos = start;
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
    }
    let word = &source[start..pos];

    if is_address_literal(word) {
        return (TokenKind::AddressLit(word.to_string()), pos);
    }

    let kind = match word {
        "coin" => TokenKind::Coin,
        "puzzle" => TokenKind::Puzzle,
        "storage" => TokenKind::Storage,
        "state" => TokenKind::State,
        "action" => TokenKind::Action,
        "const" => TokenKind::Const,
        "event" => TokenKind::Event,
        "modifier" => TokenKind::Modifier,
        "layer" => TokenKind::Layer,
        "inner" => TokenKind::Inner,
        "use" => TokenKind::Use,
        "compose" => TokenKind::Compose,
        "mapping" => TokenKind::Mapping,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        "require" => TokenKind::Require,
        "revert" => TokenKind::Revert,
        "emit" => TokenKind::Emit,
        "let" => TokenKind::Let,
        "address" => TokenKind::TyAddress,
        "uint256" => TokenKind::TyUint256,
        "bool" => TokenKind::TyBool,
        "string" => TokenKind::TyString,
        "bytes32" => TokenKind::TyBytes32,
        "bytes" => TokenKind::TyBytes,
        "true" => TokenKind::BoolLit(true),
        "false" => TokenKind::BoolLit(false),
        other => TokenKind::Ident(other.to_string()),
    };
    (kind, pos)
}

/// Bech32m Chia addresses: `xch1`/`txch1` followed by at least the
/// 6-character checksum worth of data characters.
fn is_address_literal(word: &str) -> bool {
    let data = if let Some(rest) = word.strip_prefix("xch1") {
        rest
    } else if let Some(rest) = word.strip_prefix("txch1") {
        rest
    } else {
        return false;
    };
    data.len() >= 6
        && data
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

fn lex_operator(bytes: &[u8], pos: usize) -> Result<(TokenKind, usize)> {
    let two = |a: u8, b: u8| bytes[pos] == a && bytes.get(pos + 1) == Some(&b);
    if two(b'=', b'=') {
        return Ok((TokenKind::EqEq, 2));
    }
    if two(b'!', b'=') {
        return Ok((TokenKind::NotEq, 2));
    }
    if two(b'<', b'=') {
        return Ok((TokenKind::Le, 2));
    }
    if two(b'>', b'=') {
        return Ok((TokenKind::Ge, 2));
    }
    if two(b'&', b'&') {
        return Ok((TokenKind::AndAnd, 2));
    }
    if two(b'|', b'|') {
        return Ok((TokenKind::OrOr, 2));
    }
    if two(b'+', b'=') {
        return Ok((TokenKind::PlusAssign, 2));
    }
    if two(b'-', b'=') {
        return Ok((TokenKind::MinusAssign, 2));
    }
    if two(b'=', b'>') {
        return Ok((TokenKind::FatArrow, 2));
    }
    let kind = match bytes[pos] {
        b'@' => TokenKind::At,
        b'{' => TokenKind::LBrace,
        b'}' => TokenKind::RBrace,
        b'(' => TokenKind::LParen,
        b')' => TokenKind::RParen,
        b'[' => TokenKind::LBracket,
        b']' => TokenKind::RBracket,
        b';' => TokenKind::Semi,
        b',' => TokenKind::Comma,
        b'.' => TokenKind::Dot,
        b'?' => TokenKind::Question,
        b':' => TokenKind::Colon,
        b'+' => TokenKind::Plus,
        b'-' => TokenKind::Minus,
        b'*' => TokenKind::Star,
        b'/' => TokenKind::Slash,
        b'%' => TokenKind::Percent,
        b'=' => TokenKind::Assign,
        b'<' => TokenKind::Lt,
        b'>' => TokenKind::Gt,
        b'!' => TokenKind::Bang,
        other => {
            return Err(Error::parse(
                format!("unexpected character `{}`", other as char),
                pos,
            ));
        }
    };
    Ok((kind, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).expect("lex").into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_contract_skeleton() {
        let tokens = kinds("coin Counter { state { uint256 count; } }");
        assert_eq!(tokens[0], TokenKind::Coin);
        assert_eq!(tokens[1], TokenKind::Ident("Counter".to_string()));
        assert!(tokens.contains(&TokenKind::State));
        assert!(tokens.contains(&TokenKind::TyUint256));
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn lexes_operators_and_decorators() {
        let tokens = kinds("@stateful x += 1; y == z && !w");
        assert_eq!(tokens[0], TokenKind::At);
        assert!(tokens.contains(&TokenKind::PlusAssign));
        assert!(tokens.contains(&TokenKind::EqEq));
        assert!(tokens.contains(&TokenKind::AndAnd));
        assert!(tokens.contains(&TokenKind::Bang));
    }

    #[test]
    fn lexes_literals() {
        let tokens = kinds("1000 0xdead \"hi\" true false");
        assert_eq!(tokens[0], TokenKind::IntLit(1000.into()));
        assert_eq!(tokens[1], TokenKind::HexLit(vec![0xde, 0xad]));
        assert_eq!(tokens[2], TokenKind::StrLit("hi".to_string()));
        assert_eq!(tokens[3], TokenKind::BoolLit(true));
        assert_eq!(tokens[4], TokenKind::BoolLit(false));
    }

    #[test]
    fn lexes_address_literal() {
        let address = "xch1xf23pd3ludh8chksgaxcs6dkhcwpfm0gv64h02q9rmy6mwwp8w7qtsp7ph";
        let tokens = kinds(&format!("storage address owner = {address};"));
        assert!(tokens.contains(&TokenKind::AddressLit(address.to_string())));
    }

    #[test]
    fn short_xch_prefix_stays_identifier() {
        let tokens = kinds("xch1x");
        assert_eq!(tokens[0], TokenKind::Ident("xch1x".to_string()));
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = kinds("a // line\n /* block\n comment */ b");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], TokenKind::Ident("a".to_string()));
        assert_eq!(tokens[1], TokenKind::Ident("b".to_string()));
    }

    #[test]
    fn mapping_arrow() {
        let tokens = kinds("mapping(address => uint256) balances;");
        assert_eq!(tokens[0], TokenKind::Mapping);
        assert!(tokens.contains(&TokenKind::FatArrow));
    }

    #[test]
    fn errors_carry_offsets() {
        let err = lex("a \"unterminated").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(err.offset(), Some(2));
        let err = lex("a # b").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn odd_hex_literal_is_rejected() {
        let err = lex("0x123").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
