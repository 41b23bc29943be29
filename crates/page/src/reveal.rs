//! One-shot reveal of page sections as they scroll into view.

use std::collections::BTreeSet;

use tracing::debug;

/// Fraction of an element that has to be visible before it is revealed.
pub const DEFAULT_THRESHOLD: f32 = 0.15;

/// Visibility report for one observed element.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub id: String,
    pub is_intersecting: bool,
    /// Visible fraction of the element's area, `0.0..=1.0`.
    pub ratio: f32,
}

impl IntersectionEntry {
    pub fn new(id: impl Into<String>, ratio: f32) -> Self {
        Self {
            id: id.into(),
            is_intersecting: ratio > 0.0,
            ratio,
        }
    }
}

/// Marks elements as revealed the first time they become visible enough,
/// then stops watching them. Nothing is ever un-revealed.
#[derive(Debug, Clone)]
pub struct RevealObserver {
    threshold: f32,
    observed: BTreeSet<String>,
    revealed: BTreeSet<String>,
}

impl Default for RevealObserver {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl RevealObserver {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            observed: BTreeSet::new(),
            revealed: BTreeSet::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Starts watching `id`. Already revealed elements are not watched again.
    pub fn observe(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.revealed.contains(&id) {
            return false;
        }
        self.observed.insert(id)
    }

    pub fn unobserve(&mut self, id: &str) -> bool {
        self.observed.remove(id)
    }

    pub fn is_observed(&self, id: &str) -> bool {
        self.observed.contains(id)
    }

    pub fn is_revealed(&self, id: &str) -> bool {
        self.revealed.contains(id)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Applies a batch of visibility reports and returns the ids revealed by
    /// this batch, in report order.
    pub fn process(&mut self, entries: &[IntersectionEntry]) -> Vec<String> {
        let mut newly_revealed = Vec::new();
        for entry in entries {
            if !self.observed.contains(&entry.id) {
                continue;
            }
            if entry.is_intersecting && entry.ratio >= self.threshold {
                self.observed.remove(&entry.id);
                self.revealed.insert(entry.id.clone());
                debug!(id = %entry.id, ratio = entry.ratio, "element revealed");
                newly_revealed.push(entry.id.clone());
            }
        }
        newly_revealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveals_once_at_threshold_and_unobserves() {
        let mut observer = RevealObserver::default();
        observer.observe("about");
        observer.observe("lessons");

        let revealed = observer.process(&[
            IntersectionEntry::new("about", 0.15),
            IntersectionEntry::new("lessons", 0.1),
        ]);
        assert_eq!(revealed, vec!["about".to_string()]);
        assert!(observer.is_revealed("about"));
        assert!(!observer.is_observed("about"));
        assert!(observer.is_observed("lessons"));

        assert!(observer
            .process(&[IntersectionEntry::new("about", 1.0)])
            .is_empty());
    }

    #[test]
    fn below_threshold_does_not_reveal() {
        let mut observer = RevealObserver::new(0.5);
        observer.observe("contact");
        assert!(observer
            .process(&[IntersectionEntry::new("contact", 0.49)])
            .is_empty());
        assert!(!observer.is_revealed("contact"));
    }

    #[test]
    fn reveal_is_permanent() {
        let mut observer = RevealObserver::default();
        observer.observe("hero");
        observer.process(&[IntersectionEntry::new("hero", 0.9)]);
        observer.process(&[IntersectionEntry::new("hero", 0.0)]);
        assert!(observer.is_revealed("hero"));
        assert!(!observer.observe("hero"));
    }

    #[test]
    fn ignores_unobserved_elements() {
        let mut observer = RevealObserver::default();
        assert!(observer
            .process(&[IntersectionEntry::new("stray", 1.0)])
            .is_empty());
        assert!(!observer.is_revealed("stray"));
    }
}
