//! Tolerant parser for the HTML fragments carried in push events.
//!
//! Understands start and end tags with quoted, bare or boolean attributes,
//! void elements, comments and character references. `script` and `style`
//! content is raw text up to the matching end tag. A stray end tag is
//! dropped, an end tag for an outer element closes everything opened inside
//! it, and elements still open at the end of input are closed there. A `<`
//! that does not start a well-formed tag is taken literally as text.

/// A parsed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<Fragment>,
    },
    Text(String),
}

/// Elements whose content is never parsed as markup.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements that have no content and no end tag.
pub fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

pub fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

struct Open {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Fragment>,
}

impl Open {
    fn close(self) -> Fragment {
        Fragment::Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

#[derive(Default)]
struct Builder {
    roots: Vec<Fragment>,
    open: Vec<Open>,
}

impl Builder {
    fn siblings(&mut self) -> &mut Vec<Fragment> {
        match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        }
    }

    fn push(&mut self, fragment: Fragment) {
        self.siblings().push(fragment);
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let siblings = self.siblings();
        match siblings.last_mut() {
            Some(Fragment::Text(existing)) => existing.push_str(text),
            _ => siblings.push(Fragment::Text(text.to_string())),
        }
    }

    fn close(&mut self, tag: &str) {
        let Some(depth) = self.open.iter().rposition(|open| open.tag == tag) else {
            return;
        };
        while self.open.len() > depth {
            if let Some(open) = self.open.pop() {
                let fragment = open.close();
                self.push(fragment);
            }
        }
    }

    fn finish(mut self) -> Vec<Fragment> {
        while let Some(open) = self.open.pop() {
            let fragment = open.close();
            self.push(fragment);
        }
        self.roots
    }
}

struct StartTag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
    len: usize,
}

/// Parse `input` into a list of sibling fragments.
pub fn parse(input: &str) -> Vec<Fragment> {
    let mut builder = Builder::default();
    let mut pos = 0;
    while pos < input.len() {
        let rest = &input[pos..];

        if let Some(body) = rest.strip_prefix("<!--") {
            pos += match body.find("-->") {
                Some(end) => 4 + end + 3,
                None => rest.len(),
            };
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            pos += rest.find('>').map_or(rest.len(), |end| end + 1);
            continue;
        }
        if rest.starts_with("</") {
            if let Some((name, len)) = end_tag(rest) {
                if !name.is_empty() {
                    builder.close(&name);
                }
                pos += len;
                continue;
            }
        } else if let Some(tag) = start_tag(rest) {
            pos += tag.len;
            if is_raw_text(&tag.name) && !tag.self_closing {
                let (text, consumed) = raw_text(&input[pos..], &tag.name);
                pos += consumed;
                let children = if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Fragment::Text(text.to_string())]
                };
                builder.push(Fragment::Element {
                    tag: tag.name,
                    attributes: tag.attributes,
                    children,
                });
            } else if tag.self_closing || is_void(&tag.name) {
                builder.push(Fragment::Element {
                    tag: tag.name,
                    attributes: tag.attributes,
                    children: Vec::new(),
                });
            } else {
                builder.open.push(Open {
                    tag: tag.name,
                    attributes: tag.attributes,
                    children: Vec::new(),
                });
            }
            continue;
        }

        // Text runs to the next `<` that is not the first character.
        let first = rest.chars().next().map_or(1, char::len_utf8);
        let end = rest[first..].find('<').map_or(rest.len(), |i| i + first);
        builder.push_text(&decode_entities(&rest[..end]));
        pos += end;
    }
    builder.finish()
}

fn is_name_end(c: char) -> bool {
    c.is_ascii_whitespace() || c == '/' || c == '>'
}

fn start_tag(rest: &str) -> Option<StartTag> {
    let after = rest.strip_prefix('<')?;
    if !after.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = after.find(is_name_end).unwrap_or(after.len());
    let name = after[..name_len].to_ascii_lowercase();
    let mut i = 1 + name_len;
    let mut attributes: Vec<(String, String)> = Vec::new();

    loop {
        let tail = &rest[i..];
        let trimmed = tail.trim_start();
        i += tail.len() - trimmed.len();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('>') {
            return Some(StartTag {
                name,
                attributes,
                self_closing: false,
                len: i + 1,
            });
        }
        if trimmed.starts_with("/>") {
            return Some(StartTag {
                name,
                attributes,
                self_closing: true,
                len: i + 2,
            });
        }
        if trimmed.starts_with('/') {
            i += 1;
            continue;
        }

        let attr_len = trimmed
            .find(|c: char| is_name_end(c) || c == '=')
            .unwrap_or(trimmed.len());
        let attr = trimmed[..attr_len].to_ascii_lowercase();
        i += attr_len;

        let tail = &rest[i..];
        let after_ws = tail.trim_start();
        let value = if let Some(after_eq) = after_ws.strip_prefix('=') {
            let value_src = after_eq.trim_start();
            i += tail.len() - value_src.len();
            match value_src.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let close = value_src[1..].find(quote)?;
                    i += close + 2;
                    decode_entities(&value_src[1..1 + close])
                }
                _ => {
                    let len = value_src
                        .find(|c: char| c.is_ascii_whitespace() || c == '>')
                        .unwrap_or(value_src.len());
                    i += len;
                    decode_entities(&value_src[..len])
                }
            }
        } else {
            String::new()
        };

        if !attr.is_empty() && !attributes.iter().any(|(existing, _)| *existing == attr) {
            attributes.push((attr, value));
        }
    }
}

fn end_tag(rest: &str) -> Option<(String, usize)> {
    let after = rest.strip_prefix("</")?;
    let close = after.find('>')?;
    let name_len = after[..close].find(is_name_end).unwrap_or(close);
    Some((after[..name_len].to_ascii_lowercase(), 2 + close + 1))
}

/// Raw content of a `script`/`style` element and the bytes consumed,
/// including its end tag when present.
fn raw_text<'a>(rest: &'a str, tag: &str) -> (&'a str, usize) {
    let needle = format!("</{}", tag);
    let Some(start) = rest.to_ascii_lowercase().find(&needle) else {
        return (rest, rest.len());
    };
    let end = rest[start..].find('>').map_or(rest.len(), |i| start + i + 1);
    (&rest[..start], end)
}

/// Replace character references in `text`. Unknown or malformed references
/// are kept as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_reference(rest) {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(reference: &str) -> Option<(char, usize)> {
    let semi = reference.find(';')?;
    if semi > 10 {
        return None;
    }
    let name = &reference[1..semi];
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some((c, semi + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, attributes: &[(&str, &str)], children: Vec<Fragment>) -> Fragment {
        Fragment::Element {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    fn text(s: &str) -> Fragment {
        Fragment::Text(s.to_string())
    }

    #[test]
    fn test_nested_elements_and_text() {
        assert_eq!(
            parse(r#"<div id="card" class=a>old <b>x</b></div>tail"#),
            vec![
                el(
                    "div",
                    &[("id", "card"), ("class", "a")],
                    vec![text("old "), el("b", &[], vec![text("x")])]
                ),
                text("tail"),
            ]
        );
    }

    #[test]
    fn test_boolean_and_single_quoted_attributes() {
        assert_eq!(
            parse("<input disabled value='a \"b\"'>"),
            vec![el("input", &[("disabled", ""), ("value", "a \"b\"")], vec![])]
        );
    }

    #[test]
    fn test_tag_and_attribute_names_are_lowercased() {
        assert_eq!(
            parse(r#"<DIV ID="x"></DIV>"#),
            vec![el("div", &[("id", "x")], vec![])]
        );
    }

    #[test]
    fn test_void_and_self_closing() {
        assert_eq!(
            parse("<br><img src=/a.png/><span/>x"),
            vec![
                el("br", &[], vec![]),
                el("img", &[("src", "/a.png/")], vec![]),
                el("span", &[], vec![]),
                text("x"),
            ]
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(
            parse("a &amp; b &lt;c&gt; &#65;&#x42; &bogus; &"),
            vec![text("a & b <c> AB &bogus; &")]
        );
        assert_eq!(
            parse(r#"<a title="x &quot;y&quot;"></a>"#),
            vec![el("a", &[("title", "x \"y\"")], vec![])]
        );
    }

    #[test]
    fn test_comments_and_doctype_are_skipped() {
        assert_eq!(
            parse("<!DOCTYPE html><!-- <p>no</p> --><p>yes</p><!-- open"),
            vec![el("p", &[], vec![text("yes")])]
        );
    }

    #[test]
    fn test_script_content_is_raw() {
        assert_eq!(
            parse("<script>if (a < b && c) { x('</p>') }</SCRIPT><p>after</p>"),
            vec![
                el("script", &[], vec![text("if (a < b && c) { x('</p>') }")]),
                el("p", &[], vec![text("after")]),
            ]
        );
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(parse("a < b <3"), vec![text("a < b <3")]);
        assert_eq!(parse("<div"), vec![text("<div")]);
    }

    #[test]
    fn test_mismatched_end_tags() {
        // Stray end tag is dropped.
        assert_eq!(parse("a</p>b"), vec![text("ab")]);
        // Closing an outer element closes the inner one.
        assert_eq!(
            parse("<ul><li>one</ul>two"),
            vec![
                el("ul", &[], vec![el("li", &[], vec![text("one")])]),
                text("two"),
            ]
        );
        // Unclosed elements close at the end.
        assert_eq!(
            parse("<div><p>x"),
            vec![el("div", &[], vec![el("p", &[], vec![text("x")])])]
        );
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(parse("é<b>ü</b>"), vec![text("é"), el("b", &[], vec![text("ü")])]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
    }
}
