//! Keeps the live set of selector matches that currently intersect the viewport.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::models::{DomRect, ElementId};
use crate::observer::{ElementTree, IntersectionEntry, IntersectionObserver, Layout, MutationRecord};
use crate::selector::Selector;
use crate::utils::next_tick;

/// Point-in-time positions of the visible candidates, in visible-set order.
pub type Snapshot = IndexMap<ElementId, DomRect>;

#[derive(Debug)]
pub struct VisibilityTracker {
    selector: Selector,
    intersections: IntersectionObserver,
    visible: IndexSet<ElementId>,
}

impl VisibilityTracker {
    /// Scans `root` for matches and starts tracking them.
    pub fn create<T: ElementTree + ?Sized>(tree: &T, root: ElementId, selector: Selector) -> Self {
        let mut intersections = IntersectionObserver::new();
        for el in find(tree, root, &selector) {
            intersections.observe(el);
        }
        debug!(selector = %selector, observed = intersections.observed_count(), "tracker created");
        Self { selector, intersections, visible: IndexSet::new() }
    }

    /// Registers matches added under the root and forgets removed ones.
    pub fn process_mutations<T: ElementTree + ?Sized>(&mut self, tree: &T, records: &[MutationRecord]) {
        for record in records {
            for &node in &record.added {
                for el in find(tree, node, &self.selector) {
                    self.intersections.observe(el);
                }
            }
            for &node in &record.removed {
                for el in find(tree, node, &self.selector) {
                    self.intersections.unobserve(el);
                    self.visible.shift_remove(&el);
                }
            }
        }
        trace!(selector = %self.selector, records = records.len(), "processed mutations");
    }

    pub fn process_intersections(&mut self, entries: &[IntersectionEntry]) {
        for entry in entries {
            if entry.is_intersecting {
                self.visible.insert(entry.target);
            } else {
                self.visible.shift_remove(&entry.target);
            }
        }
    }

    /// Lets the long-lived observer evaluate the current layout.
    pub fn refresh<L: Layout + ?Sized>(&mut self, layout: &L) {
        let entries = self.intersections.take_records(layout);
        if !entries.is_empty() {
            trace!(selector = %self.selector, changed = entries.len(), "intersections changed");
            self.process_intersections(&entries);
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.visible.iter().copied()
    }

    /// Re-measures the visible set with a one-shot observer.
    ///
    /// Resolves after one scheduler tick; elements that stopped intersecting in the meantime
    /// are left out.
    pub async fn snapshot<L: Layout + ?Sized>(&self, layout: &L) -> Snapshot {
        let mut once = IntersectionObserver::new();
        for &el in &self.visible {
            once.observe(el);
        }

        next_tick().await;

        let snapshot: Snapshot = once
            .take_records(layout)
            .into_iter()
            .filter(|e| e.is_intersecting)
            .map(|e| (e.target, e.bounding_client_rect))
            .collect();
        debug!(selector = %self.selector, candidates = snapshot.len(), "snapshot taken");
        snapshot
    }

    pub fn dispose(&mut self) {
        self.intersections.disconnect();
        self.visible.clear();
    }
}

/// `node` itself when it matches, then its matching descendants.
fn find<T: ElementTree + ?Sized>(tree: &T, node: ElementId, selector: &Selector) -> Vec<ElementId> {
    let mut found = Vec::new();
    if tree.matches(node, selector) {
        found.push(node);
    }
    if tree.has_child_nodes(node) {
        found.extend(tree.query_selector_all(node, selector));
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeSpec, test_document};
    use pretty_assertions::assert_eq;

    fn links() -> Selector {
        Selector::parse(".page-ref").unwrap()
    }

    #[tokio::test]
    async fn snapshot_holds_only_visible_matches() {
        // three blocks, viewport of three rows: scroll one row to hide the first link
        let mut doc = test_document(4);
        let mut tracker = VisibilityTracker::create(&doc, doc.root(), links());
        tracker.refresh(&doc);

        let all = doc.query_selector_all(doc.root(), &links());
        let snap = tracker.snapshot(&doc).await;
        assert_eq!(snap.keys().copied().collect::<Vec<_>>(), all[..3].to_vec());
        assert_eq!(snap[&all[0]], DomRect::new(8, 0, 5, 1));

        doc.scroll_by(1);
        tracker.refresh(&doc);
        let snap = tracker.snapshot(&doc).await;
        let mut keys: Vec<_> = snap.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, all[1..4].to_vec());
        assert_eq!(snap[&all[1]], DomRect::new(8, 0, 5, 1));
    }

    #[tokio::test]
    async fn tracks_inserted_and_removed_elements() {
        let mut doc = test_document(1);
        let mut tracker = VisibilityTracker::create(&doc, doc.root(), links());
        tracker.refresh(&doc);
        assert_eq!(tracker.snapshot(&doc).await.len(), 1);

        let main = doc.get_element_by_id("main-content").unwrap();
        let block = doc.create(
            &NodeSpec::element("div")
                .attr("class", "ls-block")
                .child(NodeSpec::element("a").attr("class", "page-ref").child(NodeSpec::text("new"))),
        );
        doc.append_child(main, block);
        let records = doc.take_mutations();
        tracker.process_mutations(&doc, &records);
        tracker.refresh(&doc);
        assert_eq!(tracker.snapshot(&doc).await.len(), 2);

        doc.remove_child(main, block);
        let records = doc.take_mutations();
        tracker.process_mutations(&doc, &records);
        tracker.refresh(&doc);
        assert_eq!(tracker.visible().count(), 1);
        assert_eq!(tracker.snapshot(&doc).await.len(), 1);
    }

    #[tokio::test]
    async fn a_lone_matching_node_is_its_own_candidate() {
        let mut doc = test_document(0);
        let mut tracker = VisibilityTracker::create(&doc, doc.root(), links());
        let main = doc.get_element_by_id("main-content").unwrap();

        // an element with no children at all still gets picked up once laid out
        let link = doc.create(&NodeSpec::element("a").attr("class", "page-ref"));
        doc.append_child(main, link);
        let records = doc.take_mutations();
        tracker.process_mutations(&doc, &records);
        assert_eq!(tracker.intersections.observed_count(), 1);
    }

    #[tokio::test]
    async fn empty_visible_set_gives_empty_snapshot() {
        let doc = test_document(0);
        let tracker = VisibilityTracker::create(&doc, doc.root(), links());
        assert!(tracker.snapshot(&doc).await.is_empty());
    }

    #[tokio::test]
    async fn dispose_stops_tracking() {
        let doc = test_document(2);
        let mut tracker = VisibilityTracker::create(&doc, doc.root(), links());
        tracker.refresh(&doc);
        tracker.dispose();
        tracker.refresh(&doc);
        assert!(tracker.snapshot(&doc).await.is_empty());
    }
}
