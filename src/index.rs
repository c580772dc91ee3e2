use std::collections::HashMap;

/// Keyword → indices of the messages containing it.
///
/// Keywords iterate in first-seen order, which ranking uses to break ties. Index lists
/// are strictly increasing as long as messages are recorded in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordIndex {
    order: Vec<String>,
    occurrences: HashMap<String, Vec<usize>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, keyword: &str, index: usize) {
        match self.occurrences.get_mut(keyword) {
            Some(indices) => indices.push(index),
            None => {
                self.order.push(keyword.to_string());
                self.occurrences.insert(keyword.to_string(), vec![index]);
            }
        }
    }

    /// Appends `other`, shifting each of its indices by `base`.
    pub fn extend_rebased(&mut self, other: KeywordIndex, base: usize) {
        let KeywordIndex {
            order,
            mut occurrences,
        } = other;
        for keyword in order {
            let Some(indices) = occurrences.remove(&keyword) else {
                continue;
            };
            let rebased = indices.into_iter().map(|i| i + base);
            match self.occurrences.get_mut(&keyword) {
                Some(existing) => existing.extend(rebased),
                None => {
                    self.occurrences.insert(keyword.clone(), rebased.collect());
                    self.order.push(keyword);
                }
            }
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&[usize]> {
        self.occurrences.get(keyword).map(Vec::as_slice)
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.order
            .iter()
            .map(|k| (k.as_str(), self.occurrences[k].as_slice()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_first_seen_order() {
        let mut index = KeywordIndex::new();
        index.record("b", 0);
        index.record("a", 0);
        index.record("b", 2);
        let entries: Vec<_> = index.iter().collect();
        assert_eq!(entries, vec![("b", &[0, 2][..]), ("a", &[0][..])]);
    }

    #[test]
    fn extend_rebased_shifts_and_appends() {
        let mut global = KeywordIndex::new();
        global.record("x", 1);
        let mut chunk = KeywordIndex::new();
        chunk.record("y", 0);
        chunk.record("x", 2);
        global.extend_rebased(chunk, 10);
        assert_eq!(global.get("x"), Some(&[1, 12][..]));
        assert_eq!(global.get("y"), Some(&[10][..]));
        assert_eq!(global.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(global.len(), 2);
    }
}
