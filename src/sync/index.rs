//! Keyed Indexer

use std::collections::HashMap;
use std::hash::Hash;

/// Index items by a natural key.
///
/// Natural keys are expected to be unique, but upstream data can be briefly
/// inconsistent; when two items share a key the later one wins.
pub fn index_by<T, K, I, F>(items: I, mut key_of: F) -> HashMap<K, T>
where
    K: Eq + Hash,
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> K,
{
    let items = items.into_iter();
    let mut map = HashMap::with_capacity(items.size_hint().0);
    for item in items {
        map.insert(key_of(&item), item);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        uuid: u32,
    }

    #[test]
    fn test_duplicate_key_keeps_later_item() {
        let items = vec![
            Item { name: "X", uuid: 1 },
            Item { name: "Y", uuid: 2 },
            Item { name: "X", uuid: 3 },
        ];

        let map = index_by(items, |it| it.name);

        assert_eq!(map.len(), 2);
        assert_eq!(map["X"].uuid, 3);
        assert_eq!(map["Y"].uuid, 2);
    }

    #[test]
    fn test_empty_sequence() {
        let map = index_by(Vec::<Item>::new(), |it| it.name);
        assert!(map.is_empty());
    }

    #[test]
    fn test_composite_key() {
        let items = vec![("MAVEN", "central"), ("NPM", "central"), ("MAVEN", "internal")];
        let map = index_by(items, |(ty, id)| format!("{}/{}", ty, id));

        assert_eq!(map.len(), 3);
        assert!(map.contains_key("NPM/central"));
    }
}
