//! Minimal CSS selector engine for [`MemoryDom`](crate::memory_dom::MemoryDom).
//!
//! Supported grammar: selector lists (`a, b`), descendant and child (`>`)
//! combinators, and compound selectors built from a type selector or `*`,
//! `#id`, `.class`, `[attr]` and `[attr=value]` (value bare, single- or
//! double-quoted).

use crate::dom::NodeId;

/// Read access to a tree, which is all matching needs.
pub trait SelectorTree {
    fn tag_name(&self, node: NodeId) -> &str;
    fn attribute_value(&self, node: NodeId, name: &str) -> Option<&str>;
    fn parent_element(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One complex selector, stored right to left: `ancestors[0]` is joined to the
/// subject by its combinator, `ancestors[1]` to `ancestors[0]`, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: &'static str,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let err = |reason| SelectorError {
            selector: input.to_string(),
            reason,
        };
        let mut alternatives = Vec::new();
        for group in split_top_level(input, ',').map_err(err)? {
            alternatives.push(parse_complex(group).map_err(err)?);
        }
        if alternatives.is_empty() {
            return Err(err("empty selector"));
        }
        Ok(Self { alternatives })
    }

    pub fn matches<T: SelectorTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|complex| match_complex(tree, node, &complex.subject, &complex.ancestors))
    }
}

fn split_top_level(input: &str, sep: char) -> Result<Vec<&str>, &'static str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1).ok_or("unbalanced ']'")?,
            (None, c) if c == sep && depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated string");
    }
    if depth != 0 {
        return Err("unbalanced '['");
    }
    parts.push(input[start..].trim());
    if parts.iter().any(|p| p.is_empty()) {
        return Err("empty selector in list");
    }
    Ok(parts)
}

fn parse_complex(input: &str) -> Result<Complex, &'static str> {
    // Tokenize into compounds and combinators.
    let mut compounds: Vec<Compound> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut rest = input.trim();
    let mut pending: Option<Combinator> = None;

    while !rest.is_empty() {
        let trimmed = rest.trim_start();
        let had_space = trimmed.len() != rest.len();
        rest = trimmed;
        if let Some(after) = rest.strip_prefix('>') {
            if compounds.is_empty() || pending == Some(Combinator::Child) {
                return Err("dangling '>'");
            }
            pending = Some(Combinator::Child);
            rest = after;
            continue;
        }
        if had_space && !compounds.is_empty() && pending.is_none() {
            pending = Some(Combinator::Descendant);
        }
        let (compound, remaining) = parse_compound(rest)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().ok_or("missing combinator")?);
        }
        compounds.push(compound);
        rest = remaining;
    }
    if pending == Some(Combinator::Child) {
        return Err("dangling '>'");
    }

    let subject = compounds.pop().ok_or("empty selector")?;
    let mut ancestors = Vec::with_capacity(compounds.len());
    while let Some(compound) = compounds.pop() {
        let combinator = combinators.pop().ok_or("missing combinator")?;
        ancestors.push((combinator, compound));
    }
    Ok(Complex { subject, ancestors })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(input: &str) -> (&str, &str) {
    let end = input
        .char_indices()
        .find(|&(_, c)| !is_ident_char(c))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    input.split_at(end)
}

fn parse_compound(input: &str) -> Result<(Compound, &str), &'static str> {
    let mut compound = Compound::default();
    let mut rest = input;
    let mut consumed_any = false;

    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
        consumed_any = true;
    } else {
        let (ident, after) = take_ident(rest);
        if !ident.is_empty() {
            compound.tag = Some(ident.to_ascii_lowercase());
            rest = after;
            consumed_any = true;
        }
    }

    loop {
        if let Some(after) = rest.strip_prefix('#') {
            let (ident, after) = take_ident(after);
            if ident.is_empty() {
                return Err("empty id selector");
            }
            compound.id = Some(ident.to_string());
            rest = after;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (ident, after) = take_ident(after);
            if ident.is_empty() {
                return Err("empty class selector");
            }
            compound.classes.push(ident.to_string());
            rest = after;
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or("unterminated attribute selector")?;
            compound.attrs.push(parse_attr(&after[..close])?);
            rest = &after[close + 1..];
        } else {
            break;
        }
        consumed_any = true;
    }

    if !consumed_any {
        return Err("unsupported selector syntax");
    }
    if let Some(c) = rest.chars().next() {
        if !c.is_whitespace() && c != '>' {
            return Err("unsupported selector syntax");
        }
    }
    Ok((compound, rest))
}

fn parse_attr(body: &str) -> Result<AttrTest, &'static str> {
    let Some((name, value)) = body.split_once('=') else {
        let name = body.trim();
        if name.is_empty() {
            return Err("empty attribute selector");
        }
        return Ok(AttrTest::Exists(name.to_ascii_lowercase()));
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err("unsupported attribute operator");
    }
    let value = value.trim();
    let value = match value.chars().next() {
        Some(q @ ('"' | '\'')) => value
            .strip_prefix(q)
            .and_then(|v| v.strip_suffix(q))
            .ok_or("unterminated attribute value")?,
        _ => value,
    };
    Ok(AttrTest::Equals(name.to_ascii_lowercase(), value.to_string()))
}

fn match_compound<T: SelectorTree + ?Sized>(tree: &T, node: NodeId, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if !tree.tag_name(node).eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if tree.attribute_value(node, "id") != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let class_attr = tree.attribute_value(node, "class").unwrap_or("");
        let has_all = compound
            .classes
            .iter()
            .all(|wanted| class_attr.split_whitespace().any(|c| c == wanted));
        if !has_all {
            return false;
        }
    }
    compound.attrs.iter().all(|test| match test {
        AttrTest::Exists(name) => tree.attribute_value(node, name).is_some(),
        AttrTest::Equals(name, value) => tree.attribute_value(node, name) == Some(value.as_str()),
    })
}

fn match_complex<T: SelectorTree + ?Sized>(
    tree: &T,
    node: NodeId,
    subject: &Compound,
    ancestors: &[(Combinator, Compound)],
) -> bool {
    if !match_compound(tree, node, subject) {
        return false;
    }
    let Some(((combinator, next), rest)) = ancestors.split_first() else {
        return true;
    };
    match combinator {
        Combinator::Child => tree
            .parent_element(node)
            .is_some_and(|parent| match_complex(tree, parent, next, rest)),
        Combinator::Descendant => {
            let mut current = tree.parent_element(node);
            while let Some(ancestor) = current {
                if match_complex(tree, ancestor, next, rest) {
                    return true;
                }
                current = tree.parent_element(ancestor);
            }
            false
        }
    }
}
