//! Tag Index Module
//!
//! Bidirectional tag <-> key membership used for bulk invalidation.

use std::collections::{HashMap, HashSet};

// == Tag Index ==
/// Forward (`tag -> keys`) and reverse (`key -> tags`) maps kept as exact
/// inverses: a key is listed under a tag iff the tag is listed under the key.
/// No tag or key is ever left mapped to an empty set.
///
/// Every tagged key also carries a generation, bumped whenever the key is
/// written. Callers that decide to drop a key's tags after awaiting a backend
/// snapshot the generation first and use [`TagIndex::remove_tags_if`], so a
/// write that lands in between keeps its tags.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_tag: HashMap<String, HashSet<String>>,
    by_key: HashMap<String, HashSet<String>>,
    generations: HashMap<String, u64>,
    next_generation: u64,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // == Set Tags ==
    /// Replaces every tag membership of `key` with `tags`.
    pub fn set_tags<I, S>(&mut self, key: &str, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_tags(key);

        let tags: HashSet<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            return;
        }

        for tag in &tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.by_key.insert(key.to_string(), tags);
        self.bump(key);
    }

    /// Marks a tagged key as rewritten without changing its tags.
    pub fn touch(&mut self, key: &str) {
        if self.by_key.contains_key(key) {
            self.bump(key);
        }
    }

    /// Current generation of `key`, `None` if it has no tags.
    pub fn generation(&self, key: &str) -> Option<u64> {
        self.generations.get(key).copied()
    }

    fn bump(&mut self, key: &str) {
        self.next_generation += 1;
        self.generations.insert(key.to_string(), self.next_generation);
    }

    // == Remove Tags ==
    /// Drops `key` from every tag it belongs to, removing tags left empty.
    /// Returns false if the key had no tags.
    pub fn remove_tags(&mut self, key: &str) -> bool {
        let Some(tags) = self.by_key.remove(key) else {
            return false;
        };
        self.generations.remove(key);

        for tag in tags {
            if let Some(keys) = self.by_tag.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(&tag);
                }
            }
        }
        true
    }

    /// [`TagIndex::remove_tags`], but only if `key` has not been written
    /// since `seen` was read from [`TagIndex::generation`].
    pub fn remove_tags_if(&mut self, key: &str, seen: Option<u64>) -> bool {
        match seen {
            Some(generation) if self.generation(key) == Some(generation) => self.remove_tags(key),
            _ => false,
        }
    }

    /// Keys currently carrying `tag`, sorted.
    pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Tags attached to `key`, sorted.
    pub fn tags_for_key(&self, key: &str) -> Vec<String> {
        let mut tags: Vec<String> = self
            .by_key
            .get(key)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    /// Every key that has at least one tag.
    pub fn tagged_keys(&self) -> Vec<String> {
        self.by_key.keys().cloned().collect()
    }

    pub fn is_tagged(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    pub fn tag_count(&self) -> usize {
        self.by_tag.len()
    }

    pub fn clear(&mut self) {
        self.by_tag.clear();
        self.by_key.clear();
        self.generations.clear();
    }

    /// Whether the forward and reverse maps are exact inverses.
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.by_tag.iter().all(|(tag, keys)| {
            !keys.is_empty()
                && keys
                    .iter()
                    .all(|k| self.by_key.get(k).is_some_and(|t| t.contains(tag)))
        });
        let reverse_ok = self.by_key.iter().all(|(key, tags)| {
            !tags.is_empty()
                && tags
                    .iter()
                    .all(|t| self.by_tag.get(t).is_some_and(|k| k.contains(key)))
        });
        let generations_ok = self.generations.len() == self.by_key.len()
            && self.by_key.keys().all(|k| self.generations.contains_key(k));
        forward_ok && reverse_ok && generations_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_tags_links_both_directions() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["t", "u"]);
        index.set_tags("b", ["t"]);

        assert_eq!(index.keys_for_tag("t"), vec!["a", "b"]);
        assert_eq!(index.keys_for_tag("u"), vec!["a"]);
        assert_eq!(index.tags_for_key("a"), vec!["t", "u"]);
        assert_eq!(index.tag_count(), 2);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_retag_drops_stale_memberships() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["old"]);
        index.set_tags("a", ["new"]);

        assert!(!index.contains_tag("old"));
        assert_eq!(index.keys_for_tag("new"), vec!["a"]);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_set_empty_tags_untags_key() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["t"]);
        index.set_tags("a", Vec::<String>::new());

        assert!(!index.is_tagged("a"));
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn test_remove_tags_prunes_empty_tags() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["t"]);
        index.set_tags("b", ["t", "u"]);

        assert!(index.remove_tags("a"));
        assert_eq!(index.keys_for_tag("t"), vec!["b"]);

        assert!(index.remove_tags("b"));
        assert!(!index.contains_tag("t"));
        assert!(!index.contains_tag("u"));
        assert!(!index.remove_tags("b"));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_duplicate_tags_collapse() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["t", "t"]);
        assert_eq!(index.tags_for_key("a"), vec!["t"]);
    }

    #[test]
    fn test_unknown_lookups_are_empty() {
        let index = TagIndex::new();
        assert!(index.keys_for_tag("nope").is_empty());
        assert!(index.tags_for_key("nope").is_empty());
        assert!(index.tagged_keys().is_empty());
    }

    #[test]
    fn test_conditional_remove_skips_rewritten_key() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["t"]);
        let seen = index.generation("a");

        index.set_tags("a", ["t"]);
        assert!(!index.remove_tags_if("a", seen));
        assert_eq!(index.keys_for_tag("t"), vec!["a"]);

        let seen = index.generation("a");
        index.touch("a");
        assert!(!index.remove_tags_if("a", seen));

        let seen = index.generation("a");
        assert!(index.remove_tags_if("a", seen));
        assert!(!index.contains_tag("t"));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_conditional_remove_of_untagged_key() {
        let mut index = TagIndex::new();
        let seen = index.generation("a");
        assert_eq!(seen, None);

        index.set_tags("a", ["t"]);
        assert!(!index.remove_tags_if("a", seen));
        assert!(index.is_tagged("a"));
    }

    #[test]
    fn test_retagging_after_removal_gets_new_generation() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["t"]);
        let seen = index.generation("a");
        index.remove_tags("a");
        index.set_tags("a", ["t"]);

        assert_ne!(index.generation("a"), seen);
        assert!(!index.remove_tags_if("a", seen));
    }

    #[test]
    fn test_clear() {
        let mut index = TagIndex::new();
        index.set_tags("a", ["t"]);
        index.clear();
        assert_eq!(index.tag_count(), 0);
        assert!(!index.is_tagged("a"));
    }
}
