use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::opcodes;
use crate::tree::{Atom, TreeNode};

const MAX_WIDTH: usize = 80;
const INDENT: &str = "  ";

/// Rendering options. Output is deterministic for a given node and
/// option set.
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Pretty-print across multiple lines instead of a single line.
    pub indent: bool,
    /// Libraries assumed included: controls whether condition opcodes
    /// render symbolically and whether operator aliases are kept.
    pub included_libraries: BTreeSet<String>,
    /// Comment lines placed between a mod's parameter list and body.
    pub block_comments: Vec<String>,
    /// Comments aligned after individual mod parameters, by name.
    pub param_comments: BTreeMap<String, String>,
    /// Trailing comments for mod body forms, by form index (counting
    /// every form after the parameter list, includes first).
    pub body_comments: BTreeMap<usize, String>,
}

impl SerializeOptions {
    pub fn pretty() -> Self {
        Self {
            indent: true,
            ..Self::default()
        }
    }

    pub fn with_libraries(mut self, libraries: impl IntoIterator<Item = String>) -> Self {
        self.included_libraries.extend(libraries);
        self
    }

    fn has_condition_codes(&self) -> bool {
        self.included_libraries.contains("condition_codes.clib")
    }

    fn has_opcode_aliases(&self) -> bool {
        self.included_libraries.contains("opcodes.clib")
    }
}

pub fn serialize(node: &TreeNode, options: &SerializeOptions) -> Result<String> {
    if options.indent {
        render_pretty(node, options, 0)
    } else {
        render_flat(node, options, false)
    }
}

/// One-line rendering with default options.
pub fn to_source(node: &TreeNode) -> Result<String> {
    serialize(node, &SerializeOptions::default())
}

fn render_flat(node: &TreeNode, options: &SerializeOptions, head: bool) -> Result<String> {
    match node {
        TreeNode::Atom(atom) => render_atom(atom, options, head),
        _ => {
            let (items, tail) = flatten(node);
            if items.is_empty() {
                return match tail {
                    None => Ok("()".to_string()),
                    Some(t) => render_flat(t, options, false),
                };
            }
            let mut parts = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                parts.push(render_flat(item, options, index == 0)?);
            }
            let mut out = format!("({}", parts.join(" "));
            if let Some(t) = tail {
                out.push_str(" . ");
                out.push_str(&render_flat(t, options, false)?);
            }
            out.push(')');
            Ok(out)
        }
    }
}

/// Splits a node into its proper-list prefix and an improper tail, if
/// any. Nested cons chains and `List` spellings flatten identically.
fn flatten(node: &TreeNode) -> (Vec<&TreeNode>, Option<&TreeNode>) {
    let mut items = Vec::new();
    let mut current = node;
    loop {
        match current {
            TreeNode::Atom(atom) => {
                if atom.is_nil() {
                    return (items, None);
                }
                return (items, Some(current));
            }
            TreeNode::List(list) => {
                items.extend(list.iter());
                return (items, None);
            }
            TreeNode::Cons(first, rest) => {
                items.push(first);
                current = rest;
            }
        }
    }
}

fn render_atom(atom: &Atom, options: &SerializeOptions, head: bool) -> Result<String> {
    match atom {
        Atom::Nil => Ok("()".to_string()),
        Atom::Int(value) => {
            if head && options.has_condition_codes() {
                if let Ok(code) = u64::try_from(value.clone()) {
                    if let Some(name) = opcodes::condition_name(code) {
                        return Ok(name.to_string());
                    }
                }
            }
            Ok(value.to_string())
        }
        Atom::Bytes(bytes) => Ok(format!("0x{}", hex::encode(bytes))),
        Atom::Symbol(name) => {
            if head {
                if let Some(code) = opcodes::condition_opcode(name) {
                    if !options.has_condition_codes() {
                        return Ok(code.to_string());
                    }
                    return Ok(name.clone());
                }
                if let Some(keyword) = opcodes::operator_keyword(name) {
                    if !options.has_opcode_aliases() {
                        return Ok(keyword.to_string());
                    }
                    return Ok(name.clone());
                }
                if let Some(alias) = opcodes::operator_alias(name) {
                    if options.has_opcode_aliases() {
                        return Ok(alias.to_string());
                    }
                    return Ok(name.clone());
                }
            }
            render_symbol(name)
        }
        Atom::Str(text) => quote(text),
    }
}

fn render_symbol(name: &str) -> Result<String> {
    if name.is_empty() || needs_quoting(name) {
        quote(name)
    } else {
        Ok(name.to_string())
    }
}

/// A symbol must be quoted when re-parsing it would yield a different
/// atom (hex, integer) or fail to terminate where it should.
fn needs_quoting(name: &str) -> bool {
    if name
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | ';' | '\\'))
    {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("0x") && name[2..].bytes().all(|b| b.is_ascii_hexdigit()) {
        return true;
    }
    let digits = name.strip_prefix('-').unwrap_or(name);
    let digits = digits.strip_suffix('n').unwrap_or(digits);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn quote(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_control() => {
                return Err(Error::serialize(format!(
                    "cannot represent control character U+{:04X} in atom",
                    c as u32
                )));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(out)
}

fn render_pretty(node: &TreeNode, options: &SerializeOptions, depth: usize) -> Result<String> {
    let (items, tail) = flatten(node);
    if items.is_empty() || tail.is_some() {
        return render_flat(node, options, false);
    }

    match items[0].as_symbol() {
        Some("mod") => render_mod(&items, options, depth),
        Some("defun") | Some("defun-inline") | Some("defmacro") => {
            render_defun(&items, options, depth)
        }
        Some("include") | Some("defconstant") => render_flat(node, options, false),
        _ => render_generic(node, &items, options, depth),
    }
}

fn fits(text: &str, depth: usize) -> bool {
    !text.contains('\n') && depth * INDENT.len() + text.len() <= MAX_WIDTH
}

fn pad(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn render_generic(
    node: &TreeNode,
    items: &[&TreeNode],
    options: &SerializeOptions,
    depth: usize,
) -> Result<String> {
    let flat = render_flat(node, options, false)?;
    // `if` forms stay on one line only when short
    if fits(&flat, depth) {
        return Ok(flat);
    }
    let mut out = format!("({}", render_flat(items[0], options, true)?);
    for item in &items[1..] {
        out.push('\n');
        out.push_str(&pad(depth + 1));
        out.push_str(&render_pretty(item, options, depth + 1)?);
    }
    out.push_str("\n");
    out.push_str(&pad(depth));
    out.push(')');
    Ok(out)
}

fn render_defun(items: &[&TreeNode], options: &SerializeOptions, depth: usize) -> Result<String> {
    if items.len() < 3 {
        return render_flat(items[0], options, false);
    }
    let keyword = render_flat(items[0], options, true)?;
    let name = render_flat(items[1], options, false)?;
    let params = render_flat(items[2], options, false)?;
    let mut out = format!("({keyword} {name} {params}");
    for body in &items[3..] {
        out.push('\n');
        out.push_str(&pad(depth + 1));
        out.push_str(&render_pretty(body, options, depth + 1)?);
    }
    out.push('\n');
    out.push_str(&pad(depth));
    out.push(')');
    Ok(out)
}

fn render_mod(items: &[&TreeNode], options: &SerializeOptions, depth: usize) -> Result<String> {
    if items.len() < 2 {
        return Err(Error::serialize("mod form is missing its parameter list"));
    }
    let params = items[1];
    let mut out = String::from("(mod ");

    let param_names = params.proper_list();
    let multiline_params = match &param_names {
        Some(names) => names.len() > 3,
        None => false,
    };
    if multiline_params {
        let names = param_names.as_ref().expect("checked above");
        out.push('(');
        let rendered: Vec<String> = names
            .iter()
            .map(|p| render_flat(p, options, false))
            .collect::<Result<_>>()?;
        let width = rendered.iter().map(String::len).max().unwrap_or(0);
        for (index, text) in rendered.iter().enumerate() {
            if index > 0 {
                out.push('\n');
                out.push_str(&pad(depth + 3));
            }
            let comment = names[index]
                .as_symbol()
                .and_then(|name| options.param_comments.get(name));
            match comment {
                Some(comment) => {
                    out.push_str(&format!("{text:width$}  ; {comment}"));
                }
                None => out.push_str(text),
            }
        }
        out.push(')');
    } else {
        out.push_str(&render_flat(params, options, false)?);
    }

    for comment in &options.block_comments {
        out.push('\n');
        out.push_str(&pad(depth + 1));
        out.push_str(";; ");
        out.push_str(comment);
    }

    let mut seen_include = false;
    let mut blank_emitted = false;
    for (index, form) in items[2..].iter().enumerate() {
        let is_include = form
            .proper_list()
            .and_then(|f| f.first().and_then(|h| h.as_symbol().map(str::to_string)))
            .is_some_and(|head| head == "include");
        if is_include {
            seen_include = true;
        } else if seen_include && !blank_emitted {
            out.push('\n');
            blank_emitted = true;
        }
        out.push('\n');
        out.push_str(&pad(depth + 1));
        out.push_str(&render_pretty(form, options, depth + 1)?);
        if let Some(comment) = options.body_comments.get(&index) {
            out.push_str("  ; ");
            out.push_str(comment);
        }
    }
    out.push('\n');
    out.push_str(&pad(depth));
    out.push(')');
    Ok(out)
}
