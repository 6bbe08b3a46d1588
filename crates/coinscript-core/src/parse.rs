use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::tree::{Atom, TreeNode};

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// ChiaLisp convention: `"text"` is a quoted symbol, not a byte
    /// string. Flip this to keep quoted text as string atoms.
    pub strings_as_symbols: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strings_as_symbols: true,
        }
    }
}

/// Parses one ChiaLisp expression; trailing whitespace and comments are
/// allowed, anything else is an error.
pub fn parse(source: &str) -> Result<TreeNode> {
    parse_with_options(source, &ParseOptions::default())
}

pub fn parse_with_options(source: &str, options: &ParseOptions) -> Result<TreeNode> {
    let mut reader = Reader {
        source: source.as_bytes(),
        pos: 0,
        options: *options,
    };
    reader.skip_trivia();
    let node = reader.expression()?;
    reader.skip_trivia();
    if reader.pos < reader.source.len() {
        return Err(Error::parse(
            "unexpected trailing content after expression",
            reader.pos,
        ));
    }
    Ok(node)
}

struct Reader<'a> {
    source: &'a [u8],
    pos: usize,
    options: ParseOptions,
}

impl Reader<'_> {
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.pos += 1;
            } else if ch == b';' {
                while let Some(ch) = self.peek() {
                    self.pos += 1;
                    if ch == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expression(&mut self) -> Result<TreeNode> {
        match self.peek() {
            None => Err(Error::parse_eof("unexpected end of input")),
            Some(b'(') => {
                self.pos += 1;
                self.list_tail()
            }
            Some(b')') => Err(Error::parse("unexpected `)`", self.pos)),
            Some(b'"') => self.quoted(),
            Some(_) => self.atom(),
        }
    }

    /// Everything after an opening paren, including dotted tails.
    fn list_tail(&mut self) -> Result<TreeNode> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(Error::parse_eof("unbalanced parentheses")),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(TreeNode::List(items));
                }
                Some(b'.') if self.is_lone_dot() => {
                    let dot_at = self.pos;
                    if items.is_empty() {
                        return Err(Error::parse("`.` at start of list", dot_at));
                    }
                    self.pos += 1;
                    self.skip_trivia();
                    let tail = self.expression()?;
                    self.skip_trivia();
                    match self.peek() {
                        Some(b')') => self.pos += 1,
                        Some(_) => {
                            return Err(Error::parse(
                                "`.` must be followed by a single expression and `)`",
                                self.pos,
                            ));
                        }
                        None => return Err(Error::parse_eof("unbalanced parentheses")),
                    }
                    let mut node = tail;
                    for item in items.into_iter().rev() {
                        node = TreeNode::cons(item, node);
                    }
                    return Ok(node.normalize());
                }
                Some(_) => items.push(self.expression()?),
            }
        }
    }

    /// A `.` only reads as a cons dot when it stands alone; `.5` or
    /// `.foo` fall through to atom parsing.
    fn is_lone_dot(&self) -> bool {
        match self.source.get(self.pos + 1) {
            None => true,
            Some(ch) => ch.is_ascii_whitespace() || *ch == b'(' || *ch == b')' || *ch == b';',
        }
    }

    fn quoted(&mut self) -> Result<TreeNode> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(Error::parse("unterminated string", start)),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| Error::parse("unterminated string escape", self.pos))?;
                    text.push(match escaped {
                        b'n' => '\n',
                        b'r' => '\r',
                        b't' => '\t',
                        b'\\' => '\\',
                        b'"' => '"',
                        other => {
                            return Err(Error::parse(
                                format!("unknown string escape `\\{}`", other as char),
                                self.pos,
                            ));
                        }
                    });
                    self.pos += 1;
                }
                Some(_) => {
                    // advance over one UTF-8 scalar
                    let rest = &self.source[self.pos..];
                    let step = utf8_len(rest[0]);
                    let chunk = std::str::from_utf8(&rest[..step.min(rest.len())])
                        .map_err(|_| Error::parse("invalid UTF-8 in string", self.pos))?;
                    text.push_str(chunk);
                    self.pos += step;
                }
            }
        }
        if self.options.strings_as_symbols {
            Ok(TreeNode::symbol(text))
        } else {
            Ok(TreeNode::string(text))
        }
    }

    fn atom(&mut self) -> Result<TreeNode> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() || matches!(ch, b'(' | b')' | b'"' | b';') {
                break;
            }
            self.pos += 1;
        }
        let token = std::str::from_utf8(&self.source[start..self.pos])
            .map_err(|_| Error::parse("invalid UTF-8 in atom", start))?;
        classify_atom(token, start)
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b & 0x80 == 0 => 1,
        b if b & 0xe0 == 0xc0 => 2,
        b if b & 0xf0 == 0xe0 => 3,
        _ => 4,
    }
}

fn classify_atom(token: &str, at: usize) -> Result<TreeNode> {
    if let Some(raw) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        if raw.len() % 2 != 0 {
            return Err(Error::parse("hex atom has odd length", at));
        }
        let bytes = hex::decode(raw).map_err(|_| Error::parse("invalid hex atom", at))?;
        return Ok(TreeNode::bytes(bytes));
    }
    if let Some(digits) = as_integer_digits(token) {
        let value = BigInt::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| Error::parse("invalid integer atom", at))?;
        return Ok(TreeNode::Atom(Atom::Int(value)));
    }
    Ok(TreeNode::symbol(token))
}

/// `-?[0-9]+` and the big-integer spelling `-?[0-9]+n`.
fn as_integer_digits(token: &str) -> Option<&str> {
    let trimmed = token.strip_suffix('n').unwrap_or(token);
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(trimmed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_list() {
        let node = parse("(mod (a b) (+ a b))").expect("parse");
        let items = node.proper_list().expect("list");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_symbol(), Some("mod"));
    }

    #[test]
    fn parses_dotted_pair() {
        let node = parse("(a b . c)").expect("parse");
        assert_eq!(
            node,
            TreeNode::cons(
                TreeNode::symbol("a"),
                TreeNode::cons(TreeNode::symbol("b"), TreeNode::symbol("c")),
            )
        );
    }

    #[test]
    fn dotted_nil_tail_is_proper() {
        let node = parse("(a . ())").expect("parse");
        assert_eq!(node, TreeNode::list(vec![TreeNode::symbol("a")]));
    }

    #[test]
    fn parses_atom_kinds() {
        assert_eq!(parse("0xdeadbeef").expect("hex"), TreeNode::bytes(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(parse("-42").expect("int"), TreeNode::int(-42));
        assert_eq!(parse("1000n").expect("bigint"), TreeNode::int(1000));
        assert_eq!(parse("()").expect("nil"), TreeNode::nil());
        assert_eq!(parse("sha256").expect("symbol"), TreeNode::symbol("sha256"));
    }

    #[test]
    fn quoted_strings_default_to_symbols() {
        assert_eq!(parse("\"hi there\"").expect("str"), TreeNode::symbol("hi there"));
        let opts = ParseOptions {
            strings_as_symbols: false,
        };
        assert_eq!(
            parse_with_options("\"hi\"", &opts).expect("str"),
            TreeNode::string("hi")
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            parse("\"a\\n\\t\\\\\\\"b\"").expect("escapes"),
            TreeNode::symbol("a\n\t\\\"b")
        );
    }

    #[test]
    fn comments_are_skipped() {
        let node = parse("; leading\n(a ; inline\n b)\n; trailing").expect("parse");
        assert_eq!(node.len(), Some(2));
    }

    #[test]
    fn error_positions() {
        let err = parse("(a b").expect_err("unbalanced");
        assert!(matches!(err, Error::Parse { .. }));
        let err = parse("(. a)").expect_err("leading dot");
        assert_eq!(err.offset(), Some(1));
        let err = parse("(a . b c)").expect_err("dot arity");
        assert!(matches!(err, Error::Parse { .. }));
        let err = parse("0x123").expect_err("odd hex");
        assert!(matches!(err, Error::Parse { .. }));
        let err = parse("(a))").expect_err("trailing");
        assert!(matches!(err, Error::Parse { .. }));
    }
}
