use std::collections::BTreeMap;

/// Prefix tree from hint labels to the values they select.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trie<T> {
    value: Option<T>,
    children: BTreeMap<char, Trie<T>>,
}

/// What a typed prefix resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution<'a, T> {
    /// A terminal node. Terminals win even when they also have children.
    Match(&'a T),
    /// More input is needed.
    Ambiguous,
    NoMatch,
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self { value: None, children: BTreeMap::new() }
    }
}

impl<T> Trie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T, path: &str) {
        let mut node = self;
        for ch in path.chars() {
            node = node.children.entry(ch).or_default();
        }
        node.value = Some(value);
    }

    /// Walks `path` from this node; an empty path returns the node itself.
    pub fn get_node(&self, path: &str) -> Option<&Trie<T>> {
        let mut node = self;
        for ch in path.chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Looks up a typed prefix, lower-casing it first.
    pub fn resolve(&self, input: &str) -> Resolution<'_, T> {
        let normalized = input.to_lowercase();
        match self.get_node(&normalized) {
            None => Resolution::NoMatch,
            Some(node) => match node.value() {
                Some(value) => Resolution::Match(value),
                // a non-terminal leaf cannot be reached through `insert`, except the empty root
                None if !node.has_children() => Resolution::NoMatch,
                None => Resolution::Ambiguous,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trie<&'static str> {
        let mut trie = Trie::new();
        trie.insert("A", "xx");
        trie.insert("B", "xy");
        trie.insert("C", "yx");
        trie
    }

    #[test]
    fn resolves_prefixes_incrementally() {
        let trie = sample();
        assert_eq!(trie.resolve(""), Resolution::Ambiguous);
        assert_eq!(trie.resolve("x"), Resolution::Ambiguous);
        assert_eq!(trie.resolve("xx"), Resolution::Match(&"A"));
        assert_eq!(trie.resolve("yx"), Resolution::Match(&"C"));
        assert_eq!(trie.resolve("yy"), Resolution::NoMatch);
        assert_eq!(trie.resolve("z"), Resolution::NoMatch);
        assert_eq!(trie.resolve("xxx"), Resolution::NoMatch);
    }

    #[test]
    fn input_is_lower_cased() {
        assert_eq!(sample().resolve("XY"), Resolution::Match(&"B"));
    }

    #[test]
    fn terminal_with_children_resolves_to_terminal() {
        let mut trie = Trie::new();
        trie.insert(1, "a");
        trie.insert(2, "ab");
        assert_eq!(trie.resolve("a"), Resolution::Match(&1));
        assert_eq!(trie.resolve("ab"), Resolution::Match(&2));
    }

    #[test]
    fn empty_trie_matches_nothing() {
        let trie: Trie<u8> = Trie::new();
        assert!(!trie.has_children());
        assert_eq!(trie.resolve(""), Resolution::NoMatch);
        assert_eq!(trie.resolve("f"), Resolution::NoMatch);
    }

    #[test]
    fn get_node_walks_paths() {
        let trie = sample();
        assert!(trie.get_node("x").is_some_and(|n| n.has_children() && n.value().is_none()));
        assert!(trie.get_node("q").is_none());
    }
}
