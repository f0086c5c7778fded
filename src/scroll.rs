use std::collections::HashMap;

use crate::outline::Heading;

/// How far below the raw scroll offset the comparison point sits
pub const ACTIVATION_OFFSET: f32 = 100.0;

/// Vertical extent of a rendered heading element, in content coordinates
/// (0.0 is the top of the document).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingSpan {
    pub top: f32,
    pub height: f32,
}

impl HeadingSpan {
    pub fn new(top: f32, height: f32) -> Self {
        Self { top, height }
    }

    /// Half-open containment: `[top, top + height)`
    pub fn contains(&self, y: f32) -> bool {
        y >= self.top && y < self.top + self.height
    }
}

/// Rendered positions of heading elements, keyed by heading id.
///
/// Rebuilt every frame from whatever is laid out. Headings without a recorded
/// span are simply not candidates.
#[derive(Clone, Debug, Default)]
pub struct HeadingPositions {
    spans: HashMap<String, HeadingSpan>,
}

impl HeadingPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a span. When several elements share an id the first one wins,
    /// like an id lookup in a rendered page.
    pub fn record(&mut self, id: &str, span: HeadingSpan) {
        self.spans.entry(id.to_string()).or_insert(span);
    }

    pub fn get(&self, id: &str) -> Option<HeadingSpan> {
        self.spans.get(id).copied()
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }
}

/// Scroll offset that brings `span` near the top of the viewport with the
/// comparison point inside it. Never negative.
pub fn reveal_offset(span: HeadingSpan, activation_offset: f32) -> f32 {
    let inset = (span.height / 2.0).min(20.0);
    (span.top + inset - activation_offset).max(0.0)
}

/// First heading, in document order, whose span contains `point`.
pub fn find_active<'a>(
    headings: &'a [Heading],
    positions: &HeadingPositions,
    point: f32,
) -> Option<&'a Heading> {
    headings.iter().find(|heading| {
        positions
            .get(&heading.id)
            .is_some_and(|span| span.contains(point))
    })
}

/// Tracks which heading is active as the viewport scrolls.
///
/// Only exists while there are headings to track: [`ScrollTracker::attach`]
/// refuses an empty sequence, and the owner drops the tracker when the
/// document is cleared, so a stale tracker can never be fed new offsets.
#[derive(Debug)]
pub struct ScrollTracker {
    activation_offset: f32,
    active: Option<String>,
    last_offset: Option<f32>,
    /// Target offset of a scroll started by [`ScrollTracker::focus`]
    settling: Option<f32>,
}

impl ScrollTracker {
    pub fn attach(headings: &[Heading], activation_offset: f32) -> Option<Self> {
        if headings.is_empty() {
            return None;
        }
        log::debug!("Scroll tracking attached for {} headings", headings.len());
        Some(Self {
            activation_offset,
            active: None,
            last_offset: None,
            settling: None,
        })
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Mark `id` active while the viewport scrolls towards `target_offset`.
    ///
    /// Offsets passed through on the way are not evaluated, so headings the
    /// animation crosses never steal the highlight. Tracking resumes once the
    /// offset reaches the target or stops moving short of it.
    pub fn focus(&mut self, id: &str, target_offset: f32) {
        self.active = Some(id.to_string());
        self.last_offset = None;
        self.settling = Some(target_offset);
    }

    pub fn is_settling(&self) -> bool {
        self.settling.is_some()
    }

    /// Feed the current viewport offset.
    ///
    /// Recomputes only when the offset moved since the last call (or on the
    /// first call). When no heading contains the comparison point the previous
    /// active heading is kept. Returns `true` if the active heading changed.
    pub fn on_scroll(
        &mut self,
        scroll_offset: f32,
        headings: &[Heading],
        positions: &HeadingPositions,
    ) -> bool {
        if let Some(target) = self.settling {
            let stalled = self.last_offset == Some(scroll_offset);
            self.last_offset = Some(scroll_offset);
            if stalled || (scroll_offset - target).abs() < 0.5 {
                self.settling = None;
            }
            return false;
        }
        if self.last_offset == Some(scroll_offset) {
            return false;
        }
        self.last_offset = Some(scroll_offset);

        let point = scroll_offset + self.activation_offset;
        let Some(heading) = find_active(headings, positions, point) else {
            return false;
        };
        if self.active.as_deref() == Some(heading.id.as_str()) {
            return false;
        }
        log::trace!("Active heading: {}", heading.id);
        self.active = Some(heading.id.clone());
        true
    }
}

impl Drop for ScrollTracker {
    fn drop(&mut self) {
        log::debug!("Scroll tracking detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::extract_headings;

    fn two_headings() -> (Vec<Heading>, HeadingPositions) {
        let headings = extract_headings("# First\n\n## Second\n");
        let mut positions = HeadingPositions::new();
        positions.record("h1-first", HeadingSpan::new(100.0, 100.0));
        positions.record("h2-second", HeadingSpan::new(200.0, 50.0));
        (headings, positions)
    }

    #[test]
    fn span_is_half_open() {
        let span = HeadingSpan::new(100.0, 100.0);
        assert!(span.contains(100.0));
        assert!(span.contains(199.9));
        assert!(!span.contains(200.0));
        assert!(!span.contains(99.9));
    }

    #[test]
    fn boundary_belongs_to_next_heading() {
        let (headings, positions) = two_headings();
        assert_eq!(find_active(&headings, &positions, 100.0).map(|h| h.id.as_str()), Some("h1-first"));
        assert_eq!(find_active(&headings, &positions, 200.0).map(|h| h.id.as_str()), Some("h2-second"));
        assert!(find_active(&headings, &positions, 250.0).is_none());
    }

    #[test]
    fn first_match_in_document_order_wins() {
        let headings = extract_headings("# A\n# B\n");
        let mut positions = HeadingPositions::new();
        positions.record("h1-b", HeadingSpan::new(0.0, 100.0));
        positions.record("h1-a", HeadingSpan::new(50.0, 100.0));
        assert_eq!(find_active(&headings, &positions, 60.0).map(|h| h.id.as_str()), Some("h1-a"));
    }

    #[test]
    fn unrendered_headings_are_skipped() {
        let headings = extract_headings("# Hidden\n# Shown\n");
        let mut positions = HeadingPositions::new();
        positions.record("h1-shown", HeadingSpan::new(0.0, 40.0));
        assert_eq!(find_active(&headings, &positions, 10.0).map(|h| h.id.as_str()), Some("h1-shown"));
    }

    #[test]
    fn duplicate_ids_keep_first_span() {
        let mut positions = HeadingPositions::new();
        positions.record("h1-a", HeadingSpan::new(0.0, 10.0));
        positions.record("h1-a", HeadingSpan::new(500.0, 10.0));
        assert_eq!(positions.get("h1-a"), Some(HeadingSpan::new(0.0, 10.0)));
    }

    #[test]
    fn attach_requires_headings() {
        assert!(ScrollTracker::attach(&[], ACTIVATION_OFFSET).is_none());
        let (headings, _) = two_headings();
        assert!(ScrollTracker::attach(&headings, ACTIVATION_OFFSET).is_some());
    }

    #[test]
    fn tracker_applies_activation_offset() {
        let (headings, positions) = two_headings();
        let mut tracker = ScrollTracker::attach(&headings, ACTIVATION_OFFSET).unwrap();

        assert!(tracker.on_scroll(0.0, &headings, &positions));
        assert_eq!(tracker.active(), Some("h1-first"));

        assert!(tracker.on_scroll(100.0, &headings, &positions));
        assert_eq!(tracker.active(), Some("h2-second"));
    }

    #[test]
    fn tracker_retains_previous_heading_without_match() {
        let (headings, positions) = two_headings();
        let mut tracker = ScrollTracker::attach(&headings, ACTIVATION_OFFSET).unwrap();

        tracker.on_scroll(120.0, &headings, &positions);
        assert_eq!(tracker.active(), Some("h2-second"));

        assert!(!tracker.on_scroll(900.0, &headings, &positions));
        assert_eq!(tracker.active(), Some("h2-second"));
    }

    #[test]
    fn tracker_starts_without_active_heading_above_first() {
        let (headings, positions) = two_headings();
        let mut tracker = ScrollTracker::attach(&headings, 0.0).unwrap();
        assert!(!tracker.on_scroll(0.0, &headings, &positions));
        assert_eq!(tracker.active(), None);
    }

    #[test]
    fn unchanged_offset_is_not_a_scroll() {
        let (headings, mut positions) = two_headings();
        let mut tracker = ScrollTracker::attach(&headings, ACTIVATION_OFFSET).unwrap();
        tracker.on_scroll(0.0, &headings, &positions);

        // Layout moved but the viewport did not: nothing to recompute.
        positions.clear();
        positions.record("h2-second", HeadingSpan::new(0.0, 500.0));
        assert!(!tracker.on_scroll(0.0, &headings, &positions));
        assert_eq!(tracker.active(), Some("h1-first"));
    }

    #[test]
    fn reveal_offset_puts_point_inside_heading() {
        let span = HeadingSpan::new(300.0, 30.0);
        let offset = reveal_offset(span, ACTIVATION_OFFSET);
        assert!(span.contains(offset + ACTIVATION_OFFSET));
        assert_eq!(reveal_offset(HeadingSpan::new(0.0, 40.0), ACTIVATION_OFFSET), 0.0);
    }

    #[test]
    fn focus_ignores_offsets_until_target_reached() {
        let (headings, positions) = two_headings();
        let mut tracker = ScrollTracker::attach(&headings, ACTIVATION_OFFSET).unwrap();
        tracker.focus("h1-first", 20.0);

        assert!(!tracker.on_scroll(110.0, &headings, &positions));
        assert_eq!(tracker.active(), Some("h1-first"));
        assert!(!tracker.on_scroll(20.0, &headings, &positions));
        assert!(!tracker.is_settling());

        assert!(tracker.on_scroll(110.0, &headings, &positions));
        assert_eq!(tracker.active(), Some("h2-second"));
    }
}
