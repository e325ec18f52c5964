use std::collections::HashSet;
use std::hash::Hash;

/// Returns every label in 'published' that is not in 'new', in the order of 'published'
///
/// # Arguments
///
/// * 'published' - labels from the previous successful publish
/// * 'new' - labels about to be published
pub fn reconcile<L: Eq + Hash + Clone>(published: &[L], new: &[L]) -> Vec<L> {
    let keep: HashSet<&L> = new.iter().collect();

    published.iter()
        .filter(|l| !keep.contains(l))
        .cloned()
        .collect()
}

/// The label set of the last successful publish, kept for the lifetime of the process
pub struct PublishedLabels<L> {
    labels: Vec<L>,
}

impl<L: Eq + Hash + Clone> PublishedLabels<L> {
    pub fn new() -> PublishedLabels<L> {
        PublishedLabels { labels: Vec::new() }
    }

    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    /// Labels that will go stale once 'new' is published
    ///
    /// # Arguments
    ///
    /// * 'new' - labels about to be published
    pub fn stale(&self, new: &[L]) -> Vec<L> {
        reconcile(&self.labels, new)
    }

    /// Replaces the published set wholesale. Must only be called once the new labels
    /// have actually been published. Duplicates are collapsed keeping first occurrence.
    ///
    /// # Arguments
    ///
    /// * 'new' - the labels just published
    pub fn advance(&mut self, new: Vec<L>) {
        let mut seen = HashSet::with_capacity(new.len());
        self.labels = new.into_iter()
            .filter(|l| seen.insert(l.clone()))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_is_published_minus_new_in_published_order() {
        let published = ["d", "a", "c", "b"];
        let new = ["b", "e", "a"];

        assert_eq!(reconcile(&published, &new), vec!["d", "c"]);
    }

    #[test]
    fn reconcile_with_itself_is_empty() {
        let set = ["a", "b", "c"];
        assert!(reconcile(&set, &set).is_empty());
    }

    #[test]
    fn everything_is_stale_when_nothing_is_new() {
        let published = ["a", "b"];
        assert_eq!(reconcile(&published, &[]), vec!["a", "b"]);
    }

    #[test]
    fn nothing_is_stale_initially() {
        let labels: PublishedLabels<&str> = PublishedLabels::new();
        assert!(labels.stale(&["a"]).is_empty());
    }

    #[test]
    fn advance_replaces_wholesale() {
        let mut labels = PublishedLabels::new();
        labels.advance(vec!["a", "b", "c"]);
        assert_eq!(labels.stale(&["b"]), vec!["a", "c"]);

        labels.advance(vec!["b"]);
        assert_eq!(labels.labels(), &["b"]);
        assert!(labels.stale(&["b"]).is_empty());
    }

    #[test]
    fn advance_collapses_duplicates() {
        let mut labels = PublishedLabels::new();
        labels.advance(vec!["a", "b", "a", "c", "b"]);

        assert_eq!(labels.labels(), &["a", "b", "c"]);
    }
}
