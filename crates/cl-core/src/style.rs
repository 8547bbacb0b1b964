//! Inline `style` attribute parsing.
//!
//! Style snapshots are stored as the raw attribute text. Restoring one must
//! only touch the properties that encode position and size, so the saved
//! text is parsed into declarations and filtered.

use smallvec::SmallVec;
use winnow::prelude::*;
use winnow::token::take_while;

/// Inline properties that encode a node's position or size.
pub const POSITIONAL_PROPERTIES: [&str; 5] = ["left", "top", "width", "height", "transform"];

/// One `name: value` declaration. Names are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StyleDecl {
    name: String,
    value: String,
}

/// Parsed inline style, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    decls: SmallVec<[StyleDecl; 6]>,
}

impl InlineStyle {
    /// Parse attribute text. Malformed declarations are skipped, never fatal:
    /// the host may hand us anything.
    pub fn parse(text: &str) -> Self {
        let mut decls = SmallVec::new();
        let mut rest = text;
        loop {
            skip_separators(&mut rest);
            if rest.is_empty() {
                break;
            }
            let checkpoint = rest;
            match parse_declaration.parse_next(&mut rest) {
                Ok(Some(decl)) => decls.push(decl),
                Ok(None) => {}
                Err(_) => {
                    rest = checkpoint;
                    skip_value(&mut rest);
                }
            }
        }
        Self { decls }
    }

    /// Value of `name`; the last declaration wins, as in CSS.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.decls
            .iter()
            .rev()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    /// Whether any positional property is declared.
    pub fn has_positional(&self) -> bool {
        POSITIONAL_PROPERTIES.iter().any(|p| self.get(p).is_some())
    }

    /// Positional properties as `(name, value)`, `None` when not declared.
    pub fn positional(&self) -> [(&'static str, Option<&str>); 5] {
        POSITIONAL_PROPERTIES.map(|p| (p, self.get(p)))
    }

    /// Positional properties differ from `other`.
    pub fn positional_differs(&self, other: &InlineStyle) -> bool {
        POSITIONAL_PROPERTIES
            .iter()
            .any(|p| self.get(p) != other.get(p))
    }

    /// Set or remove one property, replacing every earlier declaration of it.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        let name = name.to_ascii_lowercase();
        let first = self.decls.iter().position(|d| d.name == name);
        self.decls.retain(|d| d.name != name);
        if let Some(value) = value {
            let decl = StyleDecl {
                name,
                value: value.to_string(),
            };
            match first {
                Some(i) => self.decls.insert(i.min(self.decls.len()), decl),
                None => self.decls.push(decl),
            }
        }
    }

    /// Serialize back to attribute text.
    pub fn to_css_text(&self) -> String {
        self.decls
            .iter()
            .map(|d| format!("{}: {};", d.name, d.value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn skip_separators(input: &mut &str) {
    *input = input.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
}

fn parse_property_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_').parse_next(input)
}

/// `name : value`. Yields `None` for an empty value (`left:;`).
fn parse_declaration(input: &mut &str) -> ModalResult<Option<StyleDecl>> {
    let name = parse_property_name.parse_next(input)?;
    *input = input.trim_start();
    let _ = ':'.parse_next(input)?;
    let value = skip_value(input).trim();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(StyleDecl {
        name: name.to_ascii_lowercase(),
        value: value.to_string(),
    }))
}

/// Consume up to the next `;` outside parentheses and quotes. Returns the
/// consumed slice (without the `;`).
fn skip_value<'a>(input: &mut &'a str) -> &'a str {
    let start = *input;
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut end = start.len();
    for (i, c) in start.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let value = &start[..end];
    *input = start.get(end + 1..).unwrap_or("");
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_declarations_in_order() {
        let style = InlineStyle::parse("left: 10px; TOP:20px;width: 300px ;");
        assert_eq!(style.get("left"), Some("10px"));
        assert_eq!(style.get("top"), Some("20px"));
        assert_eq!(style.get("width"), Some("300px"));
        assert_eq!(style.to_css_text(), "left: 10px; top: 20px; width: 300px;");
    }

    #[test]
    fn semicolons_inside_functions_and_quotes_do_not_split() {
        let style = InlineStyle::parse(
            "background: url(\"a;b.png\"); transform: translate(10px, 20px) scale(1); font-family: 'x;y'",
        );
        assert_eq!(style.get("background"), Some("url(\"a;b.png\")"));
        assert_eq!(style.get("transform"), Some("translate(10px, 20px) scale(1)"));
        assert_eq!(style.get("font-family"), Some("'x;y'"));
    }

    #[test]
    fn last_declaration_wins() {
        let style = InlineStyle::parse("left: 1px; left: 2px !important");
        assert_eq!(style.get("left"), Some("2px !important"));
    }

    #[test]
    fn malformed_declarations_are_skipped() {
        let style = InlineStyle::parse("garbage; :nope; left:; top: 5px");
        assert_eq!(style.get("top"), Some("5px"));
        assert_eq!(style.get("left"), None);
        assert_eq!(style.to_css_text(), "top: 5px;");
    }

    #[test]
    fn set_replaces_in_place_and_serializes() {
        let mut style = InlineStyle::parse("left: 1px; color: red; left: 2px");
        style.set("left", Some("9px"));
        assert_eq!(style.to_css_text(), "left: 9px; color: red;");
        style.set("left", None);
        style.set("top", Some("3px"));
        assert_eq!(style.to_css_text(), "color: red; top: 3px;");
    }

    #[test]
    fn positional_comparison_ignores_other_properties() {
        let saved = InlineStyle::parse("transform: translate(0px, 0px); opacity: 1");
        let live = InlineStyle::parse("transform: translate(0px, 0px); opacity: 0.5");
        assert!(!saved.positional_differs(&live));

        let dragged = InlineStyle::parse("transform: translate(40px, 0px); opacity: 1");
        assert!(saved.positional_differs(&dragged));
        assert!(saved.has_positional());
        assert!(!InlineStyle::parse("color: red").has_positional());
    }
}
