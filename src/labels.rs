use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use crate::error::HintError;
use crate::trie::Trie;

/// Labels assigned to one batch of candidates.
#[derive(Debug)]
pub struct Allocation<T> {
    pub trie: Trie<T>,
    pub reverse: IndexMap<T, String>,
    pub label_len: usize,
}

/// Lower-cases the configured keys, drops whitespace and duplicates, keeps first-seen order.
pub fn hint_alphabet(keys: &str) -> Result<Vec<char>, HintError> {
    let set: IndexSet<char> = keys
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if set.is_empty() {
        return Err(HintError::EmptyAlphabet);
    }
    Ok(set.into_iter().collect())
}

/// Smallest `len >= 1` with `alphabet_size.pow(len) >= count`, if one exists.
pub fn label_len(alphabet_size: usize, count: usize) -> Option<usize> {
    match alphabet_size {
        0 if count > 0 => return None,
        1 if count > 1 => return None,
        _ => {}
    }
    let mut len = 1;
    let mut capacity = alphabet_size;
    while capacity < count {
        len += 1;
        capacity = capacity.saturating_mul(alphabet_size);
    }
    Some(len)
}

/// Every `len`-character string over `keys`, first character varying slowest.
pub fn key_combos(keys: &[char], len: usize) -> Vec<String> {
    if len < 2 {
        return keys.iter().map(|k| k.to_string()).collect();
    }
    let tails = key_combos(keys, len - 1);
    keys.iter()
        .flat_map(|k| tails.iter().map(move |tail| format!("{k}{tail}")))
        .collect()
}

/// Assigns the i-th combination to the i-th candidate and indexes them in a [`Trie`].
pub fn allocate<T, I>(candidates: I, keys: &str) -> Result<Allocation<T>, HintError>
where
    T: Copy + Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let alphabet = hint_alphabet(keys)?;
    let candidates: Vec<T> = candidates.into_iter().collect();
    let len = label_len(alphabet.len(), candidates.len())
        .ok_or(HintError::AlphabetTooSmall(alphabet.len()))?;
    let combos = if candidates.is_empty() { Vec::new() } else { key_combos(&alphabet, len) };
    assert!(combos.len() >= candidates.len(), "label space smaller than candidate set");

    let mut trie = Trie::new();
    let mut reverse = IndexMap::with_capacity(candidates.len());
    for (candidate, label) in candidates.into_iter().zip(combos) {
        trie.insert(candidate, &label);
        reverse.insert(candidate, label);
    }

    Ok(Allocation { trie, reverse, label_len: len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::Resolution;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn label_length_is_minimal() {
        assert_eq!(label_len(2, 0), Some(1));
        assert_eq!(label_len(2, 2), Some(1));
        assert_eq!(label_len(2, 3), Some(2));
        assert_eq!(label_len(2, 4), Some(2));
        assert_eq!(label_len(2, 5), Some(3));
        assert_eq!(label_len(13, 13), Some(1));
        assert_eq!(label_len(13, 14), Some(2));
        assert_eq!(label_len(1, 1), Some(1));
        assert_eq!(label_len(1, 2), None);
    }

    #[test]
    fn combos_vary_last_character_fastest() {
        assert_eq!(key_combos(&['f', 'j'], 2), vec!["ff", "fj", "jf", "jj"]);
    }

    #[test]
    fn alphabet_collapses_duplicates_and_case() {
        assert_eq!(hint_alphabet("fFj f").unwrap(), vec!['f', 'j']);
        assert!(matches!(hint_alphabet(" \t"), Err(HintError::EmptyAlphabet)));
    }

    #[test]
    fn three_candidates_over_two_keys() {
        let alloc = allocate(['A', 'B', 'C'], "xy").unwrap();
        assert_eq!(alloc.label_len, 2);
        assert_eq!(alloc.reverse.get(&'A').map(String::as_str), Some("xx"));
        assert_eq!(alloc.reverse.get(&'B').map(String::as_str), Some("xy"));
        assert_eq!(alloc.reverse.get(&'C').map(String::as_str), Some("yx"));
        assert_eq!(alloc.trie.resolve("x"), Resolution::Ambiguous);
        assert_eq!(alloc.trie.resolve("xx"), Resolution::Match(&'A'));
        assert_eq!(alloc.trie.resolve("z"), Resolution::NoMatch);
    }

    #[test]
    fn labels_are_unique_and_every_one_resolves_back() {
        let keys = "fjdkslaghrucm";
        for n in [1usize, 12, 13, 14, 169, 170] {
            let alloc = allocate(0..n, keys).unwrap();
            let expected_len = label_len(13, n).unwrap();
            let labels: HashSet<&String> = alloc.reverse.values().collect();
            assert_eq!(labels.len(), n);

            for (&candidate, label) in &alloc.reverse {
                assert_eq!(label.chars().count(), expected_len);
                let chars: Vec<char> = label.chars().collect();
                for end in 1..chars.len() {
                    let prefix: String = chars[..end].iter().collect();
                    assert_eq!(alloc.trie.resolve(&prefix), Resolution::Ambiguous);
                }
                assert_eq!(alloc.trie.resolve(label), Resolution::Match(&candidate));
            }
        }
    }

    #[test]
    fn empty_candidates_assign_nothing() {
        let alloc = allocate(Vec::<u32>::new(), "ab").unwrap();
        assert!(alloc.reverse.is_empty());
        assert!(!alloc.trie.has_children());
        assert_eq!(alloc.label_len, 1);
    }

    #[test]
    fn empty_alphabet_is_a_configuration_error() {
        assert!(matches!(allocate([1, 2], ""), Err(HintError::EmptyAlphabet)));
    }

    #[test]
    fn single_key_cannot_label_two_candidates() {
        assert!(matches!(allocate([1], "f"), Ok(_)));
        assert!(matches!(allocate([1, 2], "ff"), Err(HintError::AlphabetTooSmall(1))));
    }
}
