//! Observation primitives the hinting core consumes from its host.
//!
//! The host owns the element tree and its layout; the core only ever sees it through
//! [`ElementTree`] and [`Layout`], plus the [`MutationRecord`]s the host produces when its
//! tree changes.

use indexmap::IndexMap;

use crate::models::{DomRect, ElementId};
use crate::selector::Selector;

/// Structural queries over the host tree.
pub trait ElementTree {
    /// Matching descendants of `root` (excluding `root`) in document order.
    fn query_selector_all(&self, root: ElementId, selector: &Selector) -> Vec<ElementId>;
    fn matches(&self, element: ElementId, selector: &Selector) -> bool;
    fn has_child_nodes(&self, element: ElementId) -> bool;
}

/// Geometry of the host tree.
pub trait Layout {
    /// The visible area, in the same coordinate space as [`Layout::bounding_client_rect`].
    fn viewport(&self) -> DomRect;
    /// `None` for elements that are detached or not rendered.
    fn bounding_client_rect(&self, element: ElementId) -> Option<DomRect>;
}

/// One `childList` change under an observed root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationRecord {
    pub added: Vec<ElementId>,
    pub removed: Vec<ElementId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub target: ElementId,
    pub is_intersecting: bool,
    pub bounding_client_rect: DomRect,
}

/// Reports when observed elements enter or leave the viewport.
///
/// Every target gets an entry on its first evaluation after `observe`; after that an entry
/// is produced only when its intersecting state flips.
#[derive(Debug, Default)]
pub struct IntersectionObserver {
    targets: IndexMap<ElementId, Option<bool>>,
}

impl IntersectionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, target: ElementId) {
        self.targets.entry(target).or_insert(None);
    }

    pub fn unobserve(&mut self, target: ElementId) {
        self.targets.shift_remove(&target);
    }

    pub fn disconnect(&mut self) {
        self.targets.clear();
    }

    pub fn observed_count(&self) -> usize {
        self.targets.len()
    }

    /// Evaluates every target against `layout` and drains the pending entries.
    pub fn take_records<L: Layout + ?Sized>(&mut self, layout: &L) -> Vec<IntersectionEntry> {
        let viewport = layout.viewport();
        let mut entries = Vec::new();

        for (&target, last) in self.targets.iter_mut() {
            let rect = layout.bounding_client_rect(target);
            let is_intersecting = rect.is_some_and(|r| r.intersects(&viewport));
            if *last != Some(is_intersecting) {
                *last = Some(is_intersecting);
                entries.push(IntersectionEntry {
                    target,
                    is_intersecting,
                    bounding_client_rect: rect.unwrap_or_default(),
                });
            }
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixed {
        viewport: DomRect,
        rects: HashMap<ElementId, DomRect>,
    }

    impl Layout for Fixed {
        fn viewport(&self) -> DomRect {
            self.viewport
        }

        fn bounding_client_rect(&self, element: ElementId) -> Option<DomRect> {
            self.rects.get(&element).copied()
        }
    }

    #[test]
    fn reports_initial_state_then_only_changes() {
        let mut layout = Fixed {
            viewport: DomRect::new(0, 0, 10, 10),
            rects: HashMap::from([
                (ElementId(1), DomRect::new(0, 0, 3, 1)),
                (ElementId(2), DomRect::new(0, 20, 3, 1)),
            ]),
        };
        let mut obs = IntersectionObserver::new();
        obs.observe(ElementId(1));
        obs.observe(ElementId(2));

        let first = obs.take_records(&layout);
        assert_eq!(first.len(), 2);
        assert!(first[0].is_intersecting);
        assert!(!first[1].is_intersecting);

        assert!(obs.take_records(&layout).is_empty());

        layout.rects.insert(ElementId(2), DomRect::new(0, 5, 3, 1));
        let changed = obs.take_records(&layout);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].target, ElementId(2));
        assert!(changed[0].is_intersecting);
    }

    #[test]
    fn missing_layout_counts_as_not_intersecting() {
        let layout = Fixed { viewport: DomRect::new(0, 0, 10, 10), rects: HashMap::new() };
        let mut obs = IntersectionObserver::new();
        obs.observe(ElementId(7));
        let entries = obs.take_records(&layout);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_intersecting);
    }
}
