//! Navigation history.
//!
//! Browser-style: a back stack, a forward stack, and the current entry
//! kept by the router. A new navigation clears the forward stack. Both
//! stacks are bounded; when one overflows, its oldest entry is dropped.

use std::collections::VecDeque;
use std::time::Instant;

use atrium_core::RouteParams;

/// A visited route and the params it was entered with.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub path: String,
    pub params: RouteParams,
    pub timestamp: Instant,
}

impl HistoryEntry {
    pub fn new(path: impl Into<String>, params: RouteParams) -> Self {
        Self {
            path: path.into(),
            params,
            timestamp: Instant::now(),
        }
    }
}

/// Bounded back/forward stacks.
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    /// Most recent entry at the back
    back: VecDeque<HistoryEntry>,
    /// Nearest entry at the back
    forward: VecDeque<HistoryEntry>,
    /// Maximum entries per stack
    max_depth: usize,
}

impl NavigationHistory {
    /// Creates empty history holding at most `max_depth` entries per stack.
    pub fn new(max_depth: usize) -> Self {
        Self {
            back: VecDeque::with_capacity(max_depth.min(64)),
            forward: VecDeque::new(),
            max_depth,
        }
    }

    /// Records the entry being left by a fresh navigation.
    ///
    /// Clears the forward stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.forward.clear();
        Self::push_bounded(&mut self.back, entry, self.max_depth);
    }

    /// Steps back from `current`. Returns the entry to activate, or `None`
    /// when there is nothing to go back to.
    pub fn back(&mut self, current: &HistoryEntry) -> Option<HistoryEntry> {
        let target = self.back.pop_back()?;
        Self::push_bounded(&mut self.forward, current.clone(), self.max_depth);
        Some(target)
    }

    /// Steps forward from `current`.
    pub fn forward(&mut self, current: &HistoryEntry) -> Option<HistoryEntry> {
        let target = self.forward.pop_back()?;
        Self::push_bounded(&mut self.back, current.clone(), self.max_depth);
        Some(target)
    }

    fn push_bounded(stack: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, max_depth: usize) {
        stack.push_back(entry);
        while stack.len() > max_depth {
            stack.pop_front();
        }
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    pub fn back_len(&self) -> usize {
        self.back.len()
    }

    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Back stack, oldest first.
    pub fn back_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.back.iter()
    }

    /// Clears both stacks.
    pub fn clear(&mut self) {
        self.back.clear();
        self.forward.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(path: &str) -> HistoryEntry {
        HistoryEntry::new(path, RouteParams::new())
    }

    #[test]
    fn test_back_and_forward() {
        let mut history = NavigationHistory::new(10);
        history.push(entry("a"));
        history.push(entry("b"));

        let current = entry("c");
        let target = history.back(&current).unwrap();
        assert_eq!(target.path, "b");
        assert!(history.can_go_forward());

        let again = history.forward(&target).unwrap();
        assert_eq!(again.path, "c");
        assert_eq!(history.back_len(), 2);
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_push_clears_forward() {
        let mut history = NavigationHistory::new(10);
        history.push(entry("a"));
        history.back(&entry("b")).unwrap();
        assert_eq!(history.forward_len(), 1);

        history.push(entry("a"));
        assert_eq!(history.forward_len(), 0);
    }

    #[test]
    fn test_empty_stacks() {
        let mut history = NavigationHistory::new(3);
        assert!(history.back(&entry("a")).is_none());
        assert!(history.forward(&entry("a")).is_none());
        assert_eq!(history.forward_len(), 0);
    }

    #[test]
    fn test_oldest_dropped() {
        let mut history = NavigationHistory::new(2);
        for path in ["a", "b", "c"] {
            history.push(entry(path));
        }
        let paths: Vec<_> = history.back_entries().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["b", "c"]);
    }

    proptest! {
        #[test]
        fn stacks_never_exceed_depth(depth in 0usize..6, ops in prop::collection::vec(0u8..3, 0..60)) {
            let mut history = NavigationHistory::new(depth);
            let mut current = entry("start");
            for (i, op) in ops.into_iter().enumerate() {
                match op {
                    0 => {
                        history.push(current.clone());
                        current = entry(&format!("p{i}"));
                    }
                    1 => {
                        if let Some(target) = history.back(&current) {
                            current = target;
                        }
                    }
                    _ => {
                        if let Some(target) = history.forward(&current) {
                            current = target;
                        }
                    }
                }
                prop_assert!(history.back_len() <= depth);
                prop_assert!(history.forward_len() <= depth);
            }
        }
    }
}
