//! Structured theme registry rendered into the `dynamic-themes` style element.

/// Theme name rendered as `:root { … }` instead of a `data-theme` selector.
pub const ROOT_THEME: &str = "root";

/// Ordered CSS custom-property declarations for one theme.
pub type ThemeVars = Vec<(String, String)>;

/// Ordered map of theme name to declarations. Each name owns exactly one
/// rule block in the rendered stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeRegistry {
    preamble: String,
    themes: Vec<(String, ThemeVars)>,
}

impl ThemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from existing stylesheet text.
    ///
    /// Top-level `:root { … }` and `[data-theme="name"] { … }` rules that hold
    /// only declarations become theme blocks, merged in source order. Every
    /// other rule is kept, in order, as a preamble rendered ahead of the
    /// blocks.
    pub fn parse(css: &str) -> Self {
        let mut registry = Self::new();
        let mut other: Vec<&str> = Vec::new();
        for rule in top_level_rules(css) {
            match theme_rule(rule) {
                Some((name, vars)) => registry.add(&name, vars),
                None => other.push(rule),
            }
        }
        registry.preamble = other.join("\n");
        registry
    }

    /// Stylesheet text that is not a theme block.
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.themes.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&[(String, String)]> {
        self.themes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, vars)| vars.as_slice())
    }

    /// Merge `vars` into `name`: existing properties are overwritten in place,
    /// new ones appended. Unknown names are appended at the end.
    pub fn add(&mut self, name: &str, vars: ThemeVars) {
        match self.themes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => {
                for (property, value) in vars {
                    match existing.iter_mut().find(|(p, _)| *p == property) {
                        Some((_, v)) => *v = value,
                        None => existing.push((property, value)),
                    }
                }
            }
            None => self.themes.push((name.to_string(), dedup(vars))),
        }
    }

    /// Drop the block for `name`. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.themes.len();
        self.themes.retain(|(n, _)| n != name);
        self.themes.len() != before
    }

    /// Remove `name` then append it with exactly `vars`.
    pub fn replace(&mut self, name: &str, vars: ThemeVars) {
        self.remove(name);
        self.themes.push((name.to_string(), dedup(vars)));
    }

    /// Render the stylesheet text.
    pub fn render(&self) -> String {
        let mut css = String::new();
        let preamble = self.preamble.trim_end();
        if !preamble.is_empty() {
            css.push_str(preamble);
            css.push('\n');
        }
        for (name, vars) in &self.themes {
            css.push_str(&rule_block(name, vars));
        }
        css
    }
}

/// Selector a theme's block is emitted under.
pub fn selector_for(name: &str) -> String {
    if name == ROOT_THEME {
        ":root".to_string()
    } else {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("[data-theme=\"{}\"]", escaped)
    }
}

fn rule_block(name: &str, vars: &[(String, String)]) -> String {
    if vars.is_empty() {
        return format!("{} {{ }}\n", selector_for(name));
    }
    let decls: String = vars
        .iter()
        .map(|(property, value)| format!("{}: {}; ", property, value))
        .collect();
    format!("{} {{ {}}}\n", selector_for(name), decls)
}

/// Split stylesheet text into trimmed top-level rules: `selector { … }`
/// blocks and `;`-terminated statements. Trailing unterminated text is
/// returned as a final rule.
fn top_level_rules(css: &str) -> Vec<&str> {
    let bytes = css.as_bytes();
    let mut rules = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => i = skip_string(bytes, i, quote),
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    rules.push(&css[start..=i]);
                    start = i + 1;
                }
            }
            b';' if depth == 0 => {
                rules.push(&css[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < css.len() {
        rules.push(&css[start..]);
    }
    rules
        .into_iter()
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .collect()
}

/// Index of the closing quote of the string opened at `open`, or the end.
fn skip_string(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() && bytes[i] != quote {
        if bytes[i] == b'\\' {
            i += 1;
        }
        i += 1;
    }
    i
}

fn theme_rule(rule: &str) -> Option<(String, ThemeVars)> {
    if rule.contains("/*") {
        return None;
    }
    let (selector, rest) = rule.split_once('{')?;
    let body = rest.strip_suffix('}')?;
    let name = theme_name(selector.trim())?;
    let mut vars = Vec::new();
    for decl in split_declarations(body)? {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        let (property, value) = decl.split_once(':')?;
        let property = property.trim();
        if property.is_empty() {
            return None;
        }
        vars.push((property.to_string(), value.trim().to_string()));
    }
    Some((name, vars))
}

/// Split a declaration block on `;` outside strings and parentheses. `None`
/// when the block nests other blocks.
fn split_declarations(body: &str) -> Option<Vec<&str>> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut parens = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => i = skip_string(bytes, i, quote),
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b'{' | b'}' => return None,
            b';' if parens == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&body[start.min(body.len())..]);
    Some(parts)
}

/// Theme name for a selector produced by [`selector_for`].
fn theme_name(selector: &str) -> Option<String> {
    if selector == ":root" {
        return Some(ROOT_THEME.to_string());
    }
    let inner = selector.strip_prefix('[')?.strip_suffix(']')?.trim();
    let value = inner
        .strip_prefix("data-theme")?
        .trim_start()
        .strip_prefix('=')?
        .trim();
    let name = match value.chars().next()? {
        quote @ ('"' | '\'') => unescape(value[1..].strip_suffix(quote)?, quote)?,
        _ if value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_') =>
        {
            value.to_string()
        }
        _ => return None,
    };
    // `root` always renders as `:root`, so this block cannot be owned.
    if name == ROOT_THEME {
        return None;
    }
    Some(name)
}

fn unescape(quoted: &str, quote: char) -> Option<String> {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            c if c == quote => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

// Later duplicates win, keeping the position of the first occurrence.
fn dedup(vars: ThemeVars) -> ThemeVars {
    let mut out: ThemeVars = Vec::with_capacity(vars.len());
    for (property, value) in vars {
        match out.iter_mut().find(|(p, _)| *p == property) {
            Some((_, v)) => *v = value,
            None => out.push((property, value)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> ThemeVars {
        pairs
            .iter()
            .map(|(p, v)| (p.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_root_and_named() {
        let mut reg = ThemeRegistry::new();
        reg.add("root", vars(&[("--c", "red")]));
        reg.add("dark", vars(&[("--c", "black"), ("--bg", "#000")]));
        assert_eq!(
            reg.render(),
            ":root { --c: red; }\n[data-theme=\"dark\"] { --c: black; --bg: #000; }\n"
        );
    }

    #[test]
    fn test_add_existing_merges() {
        let mut reg = ThemeRegistry::new();
        reg.add("dark", vars(&[("--c", "black"), ("--bg", "#000")]));
        reg.add("dark", vars(&[("--c", "navy"), ("--fg", "#fff")]));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.get("dark").unwrap(),
            vars(&[("--c", "navy"), ("--bg", "#000"), ("--fg", "#fff")]).as_slice()
        );
    }

    #[test]
    fn test_remove_only_named_block() {
        let mut reg = ThemeRegistry::new();
        reg.add("root", vars(&[("--c", "red")]));
        reg.add("dark", vars(&[("--c", "black")]));
        assert!(reg.remove("dark"));
        assert!(!reg.remove("dark"));
        assert_eq!(reg.render(), ":root { --c: red; }\n");
    }

    #[test]
    fn test_replace_moves_block_to_end() {
        let mut reg = ThemeRegistry::new();
        reg.add("dark", vars(&[("--c", "black"), ("--bg", "#000")]));
        reg.add("light", vars(&[("--c", "white")]));
        reg.replace("dark", vars(&[("--c", "blue")]));
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["light", "dark"]);
        assert_eq!(reg.get("dark").unwrap(), vars(&[("--c", "blue")]).as_slice());
    }

    #[test]
    fn test_preamble_is_kept() {
        let mut reg = ThemeRegistry::parse("body { margin: 0 }\n\n");
        assert!(reg.is_empty());
        reg.add("dark", vars(&[("--c", "black")]));
        assert_eq!(
            reg.render(),
            "body { margin: 0 }\n[data-theme=\"dark\"] { --c: black; }\n"
        );
    }

    #[test]
    fn test_parse_recovers_theme_blocks() {
        let css = ":root { --c: red; }\n\
                   @import url(\"a.css\");\n\
                   [data-theme=\"dark\"] { --c: black; --font: \"A;B\", serif }\n\
                   body { margin: 0 }\n\
                   [data-theme='sol\\'ar']{--c:gold}\n\
                   [data-theme=plain] { }";
        let reg = ThemeRegistry::parse(css);
        assert_eq!(
            reg.names().collect::<Vec<_>>(),
            vec!["root", "dark", "sol'ar", "plain"]
        );
        assert_eq!(
            reg.get("dark").unwrap(),
            vars(&[("--c", "black"), ("--font", "\"A;B\", serif")]).as_slice()
        );
        assert_eq!(reg.get("sol'ar").unwrap(), vars(&[("--c", "gold")]).as_slice());
        assert!(reg.get("plain").unwrap().is_empty());
        assert_eq!(reg.preamble(), "@import url(\"a.css\");\nbody { margin: 0 }");
    }

    #[test]
    fn test_parse_keeps_unrecognized_rules_verbatim() {
        let css = "@media (prefers-color-scheme: dark) { :root { --c: black; } }\n\
                   [data-theme=\"root\"] { --c: x; }\n\
                   /* note */ :root { --c: y; }\n\
                   .card, :root { --c: z; }";
        let reg = ThemeRegistry::parse(css);
        assert!(reg.is_empty());
        assert_eq!(
            reg.preamble(),
            "@media (prefers-color-scheme: dark) { :root { --c: black; } }\n\
             [data-theme=\"root\"] { --c: x; }\n\
             /* note */ :root { --c: y; }\n\
             .card, :root { --c: z; }"
        );
    }

    #[test]
    fn test_parse_round_trips_rendered_text() {
        let mut reg = ThemeRegistry::new();
        reg.add("root", vars(&[("--c", "red")]));
        reg.add("we\"ird", vars(&[("--bg", "url(a;b)")]));
        reg.add("empty", Vec::new());
        assert_eq!(ThemeRegistry::parse(&reg.render()), reg);
    }

    #[test]
    fn test_empty_block_and_escaping() {
        let mut reg = ThemeRegistry::new();
        reg.add("we\"ird", Vec::new());
        assert_eq!(reg.render(), "[data-theme=\"we\\\"ird\"] { }\n");
    }

    #[test]
    fn test_duplicate_properties_collapse() {
        let mut reg = ThemeRegistry::new();
        reg.replace("dark", vars(&[("--c", "a"), ("--c", "b")]));
        assert_eq!(reg.get("dark").unwrap(), vars(&[("--c", "b")]).as_slice());
    }
}
