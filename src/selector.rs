use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::HintError;

// One simple selector at the start of the remaining input: tag, `*`, `.class`, `#id` or an
// attribute test with an optional (quoted or bare) value.
static SIMPLE_SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:(\*)|([A-Za-z][\w-]*)|\.([\w-]+)|#([\w-]+)|\[\s*([\w-]+)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([\w-]+))\s*)?\])"#,
    )
    .unwrap()
});

/// Read access to the parts of an element a selector can test.
pub trait Matchable {
    fn tag(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<&str>;

    fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Simple {
    Tag(String),
    Class(String),
    Id(String),
    Attr { name: String, value: Option<String> },
}

impl Simple {
    fn matches<M: Matchable + ?Sized>(&self, el: &M) -> bool {
        match self {
            Simple::Tag(tag) => el.tag().eq_ignore_ascii_case(tag),
            Simple::Class(class) => el.has_class(class),
            Simple::Id(id) => el.attribute("id") == Some(id.as_str()),
            Simple::Attr { name, value: None } => el.attribute(name).is_some(),
            Simple::Attr { name, value: Some(value) } => el.attribute(name) == Some(value.as_str()),
        }
    }
}

/// A selector list such as `.page-ref, .recent-item` or `a[data-ref]`.
///
/// Only compound selectors are supported; combinators (descendant, child, ...) are not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Vec<Simple>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, HintError> {
        let mut alternatives = Vec::new();
        for part in source.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(HintError::InvalidSelector(format!("empty selector in `{source}`")));
            }
            alternatives.push(parse_compound(part)?);
        }
        Ok(Self { source: source.trim().to_string(), alternatives })
    }

    pub fn matches<M: Matchable + ?Sized>(&self, el: &M) -> bool {
        self.alternatives
            .iter()
            .any(|compound| compound.iter().all(|simple| simple.matches(el)))
    }
}

impl FromStr for Selector {
    type Err = HintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_compound(input: &str) -> Result<Vec<Simple>, HintError> {
    let mut rest = input;
    let mut parts = Vec::new();

    while !rest.is_empty() {
        let caps = SIMPLE_SELECTOR.captures(rest).ok_or_else(|| {
            HintError::InvalidSelector(format!("unexpected `{rest}` in `{input}`"))
        })?;
        let whole = caps.get(0).map_or(0, |m| m.end());

        if caps.get(1).is_some() {
            // universal selector matches everything
        } else if let Some(tag) = caps.get(2) {
            if !parts.is_empty() {
                return Err(HintError::InvalidSelector(format!(
                    "tag `{}` must come first in `{input}`",
                    tag.as_str()
                )));
            }
            parts.push(Simple::Tag(tag.as_str().to_string()));
        } else if let Some(class) = caps.get(3) {
            parts.push(Simple::Class(class.as_str().to_string()));
        } else if let Some(id) = caps.get(4) {
            parts.push(Simple::Id(id.as_str().to_string()));
        } else if let Some(name) = caps.get(5) {
            let value = caps
                .get(6)
                .or_else(|| caps.get(7))
                .or_else(|| caps.get(8))
                .map(|m| m.as_str().to_string());
            parts.push(Simple::Attr { name: name.as_str().to_string(), value });
        }

        rest = &rest[whole..];
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct El {
        tag: &'static str,
        attrs: HashMap<&'static str, &'static str>,
    }

    impl Matchable for El {
        fn tag(&self) -> &str {
            self.tag
        }

        fn attribute(&self, name: &str) -> Option<&str> {
            self.attrs.get(name).copied()
        }
    }

    fn el(tag: &'static str, attrs: &[(&'static str, &'static str)]) -> El {
        El { tag, attrs: attrs.iter().copied().collect() }
    }

    #[test]
    fn matches_any_alternative() {
        let sel = Selector::parse(".page-ref, .recent-item").unwrap();
        assert!(sel.matches(&el("a", &[("class", "page-ref")])));
        assert!(sel.matches(&el("div", &[("class", "title recent-item")])));
        assert!(!sel.matches(&el("div", &[("class", "ls-block")])));
    }

    #[test]
    fn compound_requires_every_part() {
        let sel = Selector::parse("a[data-ref]").unwrap();
        assert!(sel.matches(&el("a", &[("data-ref", "Rust")])));
        assert!(!sel.matches(&el("span", &[("data-ref", "Rust")])));
        assert!(!sel.matches(&el("a", &[])));
    }

    #[test]
    fn attribute_values_may_be_quoted() {
        let sel = Selector::parse(r#"div[blockid="b-1"], #main"#).unwrap();
        assert!(sel.matches(&el("div", &[("blockid", "b-1")])));
        assert!(!sel.matches(&el("div", &[("blockid", "b-2")])));
        assert!(sel.matches(&el("section", &[("id", "main")])));
    }

    #[test]
    fn rejects_combinators_and_empty_parts() {
        assert!(matches!(Selector::parse("div a"), Err(HintError::InvalidSelector(_))));
        assert!(matches!(Selector::parse("a,"), Err(HintError::InvalidSelector(_))));
        assert!(matches!(Selector::parse(".x div"), Err(HintError::InvalidSelector(_))));
    }
}
