//! Node placement for the release timeline.
//!
//! Placement runs as explicit passes over an arena of per-event slots,
//! indexed by the event's position in the input:
//!
//! 1. Time scale: dates map linearly onto the canvas width minus margins.
//! 2. Same-day fan-out: events sharing a date are spread symmetrically
//!    around the date's x, ordered by build number.
//! 3. Minimum distance: walking events chronologically, any event closer
//!    than `min_node_distance` to its predecessor is pushed right to exactly
//!    that distance.
//! 4. Branch assignment: a fold over the date-ordered events groups branch
//!    events under the branch context that was open when they occurred.
//! 5. Label offsets: version labels alternate up/down when an earlier node
//!    sits horizontally close.
//!
//! Pass 3 needs every position from pass 2, so the two stay separate.

use crate::models::{EventType, ReleaseEvent};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Canvas margins in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Tunables for timeline layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Minimum canvas width
    pub min_width: f64,
    /// Width added per event when the timeline is crowded
    pub width_per_event: f64,
    /// Constant width added on top of the per-event width
    pub width_padding: f64,
    /// Canvas height
    pub height: f64,
    /// Canvas margins
    pub margins: Margins,
    /// Extra inset on the right of the time scale (room for the arrowhead)
    pub scale_inset: f64,
    /// Upper bound for spacing between events sharing a date
    pub max_day_spacing: f64,
    /// Minimum horizontal distance between chronologically adjacent nodes
    pub min_node_distance: f64,
    /// Distance from the main line to the first branch row
    pub branch_offset: f64,
    /// Distance between successive branch rows
    pub branch_spacing: f64,
    /// Corner radius where branch lines leave and rejoin the main line
    pub corner_radius: f64,
    /// How far the main line runs past the right margin
    pub arrow_extension: f64,
    /// Nodes closer than this trigger label staggering
    pub label_distance: f64,
    /// Default label distance above a node
    pub label_offset: f64,
    /// Staggered label distance above a node (even index)
    pub label_offset_raised: f64,
    /// Staggered label distance above a node (odd index)
    pub label_offset_lowered: f64,
    /// Distance of the date label below a node
    pub date_label_offset: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_width: 1200.0,
            width_per_event: 100.0,
            width_padding: 100.0,
            height: 400.0,
            margins: Margins {
                top: 60.0,
                right: 80.0,
                bottom: 60.0,
                left: 50.0,
            },
            scale_inset: 50.0,
            max_day_spacing: 100.0,
            min_node_distance: 40.0,
            branch_offset: 120.0,
            branch_spacing: 60.0,
            corner_radius: 20.0,
            arrow_extension: 20.0,
            label_distance: 50.0,
            label_offset: 20.0,
            label_offset_raised: 35.0,
            label_offset_lowered: 5.0,
            date_label_offset: 30.0,
        }
    }
}

impl LayoutConfig {
    /// Canvas width for `count` events.
    pub fn canvas_width(&self, count: usize) -> f64 {
        self.min_width
            .max(count as f64 * self.width_per_event + self.width_padding)
    }

    /// Y of the main line.
    pub fn main_y(&self) -> f64 {
        self.height / 2.0
    }

    /// Y of the branch row with the given index.
    pub fn branch_y(&self, index: usize) -> f64 {
        self.main_y() + self.branch_offset + index as f64 * self.branch_spacing
    }
}

/// Linear date -> x mapping across the usable canvas width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    min_date: NaiveDate,
    range_days: i64,
    left: f64,
    span: f64,
}

impl TimeScale {
    /// Build a scale over the event dates. Returns `None` for no events.
    pub fn new(events: &[ReleaseEvent], width: f64, config: &LayoutConfig) -> Option<Self> {
        let min_date = events.iter().map(|e| e.date).min()?;
        let max_date = events.iter().map(|e| e.date).max()?;
        Some(Self {
            min_date,
            range_days: (max_date - min_date).num_days(),
            left: config.margins.left,
            span: width - config.margins.left - config.margins.right - config.scale_inset,
        })
    }

    /// Number of whole days between the earliest and latest event.
    pub fn range_days(&self) -> i64 {
        self.range_days
    }

    /// X for a date. With a zero-day range everything sits on the left margin.
    pub fn x(&self, date: NaiveDate) -> f64 {
        if self.range_days == 0 {
            return self.left;
        }
        let elapsed = (date - self.min_date).num_days() as f64;
        self.left + elapsed / self.range_days as f64 * self.span
    }

    /// Pixel width of one day, capped at `max`.
    pub fn day_spacing(&self, max: f64) -> f64 {
        if self.range_days == 0 {
            return max;
        }
        (self.span / self.range_days as f64).min(max)
    }
}

/// Compare two events by build number, the same-day tie-break.
fn by_build(a: &ReleaseEvent, b: &ReleaseEvent) -> std::cmp::Ordering {
    a.build_number().cmp(&b.build_number())
}

/// Pass 2: base x per event, fanning out events that share a date.
pub fn same_day_positions(
    events: &[ReleaseEvent],
    scale: &TimeScale,
    config: &LayoutConfig,
) -> Vec<f64> {
    let mut groups: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, event) in events.iter().enumerate() {
        groups.entry(event.date).or_default().push(idx);
    }

    let spacing = scale.day_spacing(config.max_day_spacing);
    let mut xs = vec![0.0; events.len()];

    for (date, mut members) in groups {
        let base_x = scale.x(date);
        if members.len() == 1 {
            xs[members[0]] = base_x;
            continue;
        }

        members.sort_by(|&a, &b| by_build(&events[a], &events[b]));
        let start_x = base_x - (members.len() - 1) as f64 * spacing / 2.0;
        for (slot, idx) in members.into_iter().enumerate() {
            xs[idx] = start_x + slot as f64 * spacing;
        }
    }
    xs
}

/// Event indices in strict chronological order (date, then build number).
pub fn chronological_order(events: &[ReleaseEvent]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by(|&a, &b| {
        events[a]
            .date
            .cmp(&events[b].date)
            .then_with(|| by_build(&events[a], &events[b]))
    });
    order
}

/// Event indices ordered by date only, keeping input order within a day.
pub fn date_order(events: &[ReleaseEvent]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by_key(|&idx| events[idx].date);
    order
}

/// Pass 3: push nodes right so adjacent nodes in `order` are at least
/// `min_distance` apart.
pub fn enforce_min_distance(xs: &mut [f64], order: &[usize], min_distance: f64) {
    for pair in order.windows(2) {
        let (prev, current) = (pair[0], pair[1]);
        if xs[current] - xs[prev] < min_distance {
            tracing::debug!(
                index = current,
                from = xs[current],
                to = xs[prev] + min_distance,
                "pushing timeline node right"
            );
            xs[current] = xs[prev] + min_distance;
        }
    }
}

/// A branch context derived from the event sequence.
///
/// Indices refer to positions in the laid-out event slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    /// The `branch-start` event that opened the context
    pub start: usize,
    /// The start event followed by every `branch` event in the context
    pub events: Vec<usize>,
    /// The `branch-merge` event that closed the context, if any
    pub end: Option<usize>,
    /// Whether the branch was merged back into the main line
    pub merged: bool,
}

impl Branch {
    fn open(start: usize) -> Self {
        Self {
            start,
            events: vec![start],
            end: None,
            merged: false,
        }
    }

    /// Number of drawn points on the branch, including the merge point.
    pub fn point_count(&self) -> usize {
        self.events.len() + usize::from(self.end.is_some())
    }
}

/// Result of the branch fold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchAssignment {
    /// Branches in the order they were closed; unmerged ones last
    pub branches: Vec<Branch>,
    /// Main-line points in date order
    pub main_points: Vec<usize>,
    /// `branch` events that occurred with no open branch context
    pub orphans: Vec<usize>,
}

impl BranchAssignment {
    /// Branch index owning each event, by event index.
    pub fn branch_of(&self, len: usize) -> Vec<Option<usize>> {
        let mut owner = vec![None; len];
        for (branch_idx, branch) in self.branches.iter().enumerate() {
            for &idx in branch.events.iter().skip(1) {
                owner[idx] = Some(branch_idx);
            }
        }
        owner
    }
}

/// Accumulator for the branch fold.
#[derive(Debug, Default)]
struct BranchFold {
    open: Vec<Branch>,
    closed: Vec<Branch>,
    main_points: Vec<usize>,
    orphans: Vec<usize>,
}

impl BranchFold {
    fn step(mut self, (idx, event): (usize, &ReleaseEvent)) -> Self {
        match event.event_type {
            EventType::BranchStart => {
                self.open.push(Branch::open(idx));
                self.main_points.push(idx);
            }
            EventType::Branch => match self.open.last_mut() {
                Some(branch) => branch.events.push(idx),
                None => self.orphans.push(idx),
            },
            EventType::BranchMerge => {
                if let Some(mut branch) = self.open.pop() {
                    branch.end = Some(idx);
                    branch.merged = true;
                    self.closed.push(branch);
                }
                self.main_points.push(idx);
            }
            EventType::Main => self.main_points.push(idx),
        }
        self
    }

    fn finish(mut self) -> BranchAssignment {
        self.closed.append(&mut self.open);
        BranchAssignment {
            branches: self.closed,
            main_points: self.main_points,
            orphans: self.orphans,
        }
    }
}

/// Pass 4: group events into branch contexts.
///
/// A `branch-merge` closes the most recently opened branch; a merge with
/// nothing open is just a main-line point. Branches still open at the end
/// stay unmerged.
pub fn assign_branches(events: &[ReleaseEvent]) -> BranchAssignment {
    date_order(events)
        .into_iter()
        .map(|idx| (idx, &events[idx]))
        .fold(BranchFold::default(), BranchFold::step)
        .finish()
}

/// Pass 5: label y offsets relative to each node.
///
/// If any earlier node (input order) is within `label_distance`, even
/// indices raise the label and odd indices lower it. This is a visual
/// heuristic only; three or more close nodes can still collide.
pub fn label_offsets(xs: &[f64], config: &LayoutConfig) -> Vec<f64> {
    xs.iter()
        .enumerate()
        .map(|(idx, &x)| {
            let crowded = xs[..idx]
                .iter()
                .any(|&prev| (x - prev).abs() < config.label_distance);
            match (crowded, idx % 2 == 0) {
                (false, _) => -config.label_offset,
                (true, true) => -config.label_offset_raised,
                (true, false) => -config.label_offset_lowered,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    fn event(version: &str, d: &str, ty: EventType) -> ReleaseEvent {
        ReleaseEvent::new(version, date(d), ty)
    }

    #[test]
    fn test_canvas_width() {
        let config = LayoutConfig::default();
        assert_eq!(config.canvas_width(3), 1200.0);
        assert_eq!(config.canvas_width(20), 2100.0);
    }

    #[test]
    fn test_time_scale_maps_range() {
        let config = LayoutConfig::default();
        let events = vec![
            event("1", "2025-03-01", EventType::Main),
            event("2", "2025-03-11", EventType::Main),
        ];
        let scale = TimeScale::new(&events, 1200.0, &config).unwrap();
        // span = 1200 - 50 - 80 - 50
        assert_eq!(scale.range_days(), 10);
        assert_eq!(scale.x(date("2025-03-01")), 50.0);
        assert_eq!(scale.x(date("2025-03-11")), 1070.0);
        assert_eq!(scale.x(date("2025-03-06")), 560.0);
        assert_eq!(scale.day_spacing(100.0), 100.0);
        assert_eq!(scale.day_spacing(50.0), 50.0);
    }

    #[test]
    fn test_time_scale_zero_range() {
        let config = LayoutConfig::default();
        let events = vec![event("1", "2025-03-01", EventType::Main)];
        let scale = TimeScale::new(&events, 1200.0, &config).unwrap();
        assert_eq!(scale.x(date("2025-03-01")), 50.0);
        assert_eq!(scale.day_spacing(100.0), 100.0);
        assert!(TimeScale::new(&[], 1200.0, &config).is_none());
    }

    #[test]
    fn test_same_day_fan_out_orders_by_build() {
        let config = LayoutConfig::default();
        let events = vec![
            event("1.0.1", "2025-03-01", EventType::Main),
            event("1.0.15(182)", "2025-03-11", EventType::Main),
            event("1.0.15(181)", "2025-03-11", EventType::Main),
            event("1.0.15", "2025-03-11", EventType::Main),
        ];
        let scale = TimeScale::new(&events, 1200.0, &config).unwrap();
        let xs = same_day_positions(&events, &scale, &config);

        // Spacing capped at 100; three nodes centered on 1070.
        assert_eq!(xs[0], 50.0);
        assert_eq!(xs[3], 970.0);
        assert_eq!(xs[2], 1070.0);
        assert_eq!(xs[1], 1170.0);
    }

    #[test]
    fn test_chronological_order_ties_by_build() {
        let events = vec![
            event("b(5)", "2025-03-02", EventType::Main),
            event("a(9)", "2025-03-01", EventType::Main),
            event("c(2)", "2025-03-02", EventType::Main),
        ];
        assert_eq!(chronological_order(&events), vec![1, 2, 0]);
        assert_eq!(date_order(&events), vec![1, 0, 2]);
    }

    #[test]
    fn test_enforce_min_distance_pushes_to_exact_distance() {
        let mut xs = vec![100.0, 110.0, 300.0];
        enforce_min_distance(&mut xs, &[0, 1, 2], 40.0);
        assert_eq!(xs, vec![100.0, 140.0, 300.0]);
    }

    #[test]
    fn test_enforce_min_distance_cascades() {
        let mut xs = vec![100.0, 101.0, 102.0, 103.0];
        enforce_min_distance(&mut xs, &[0, 1, 2, 3], 40.0);
        assert_eq!(xs, vec![100.0, 140.0, 180.0, 220.0]);
    }

    #[test]
    fn test_enforce_min_distance_follows_order_not_input() {
        let mut xs = vec![500.0, 100.0];
        enforce_min_distance(&mut xs, &[1, 0], 40.0);
        assert_eq!(xs, vec![500.0, 100.0]);

        let mut xs = vec![100.0, 500.0];
        enforce_min_distance(&mut xs, &[1, 0], 40.0);
        assert_eq!(xs, vec![540.0, 500.0]);
    }

    #[test]
    fn test_assign_branches_merged() {
        let events = vec![
            event("1", "2025-03-01", EventType::Main),
            event("2", "2025-03-02", EventType::BranchStart),
            event("3", "2025-03-03", EventType::Branch),
            event("4", "2025-03-04", EventType::BranchMerge),
            event("5", "2025-03-05", EventType::Main),
        ];
        let assignment = assign_branches(&events);

        assert_eq!(assignment.branches.len(), 1);
        let branch = &assignment.branches[0];
        assert!(branch.merged);
        assert_eq!(branch.events.len(), 2);
        assert_eq!(branch.start, 1);
        assert_eq!(branch.end, Some(3));
        assert_eq!(assignment.main_points, vec![0, 1, 3, 4]);
        assert!(assignment.orphans.is_empty());
    }

    #[test]
    fn test_assign_branches_open_at_end() {
        let events = vec![
            event("1", "2025-03-01", EventType::Main),
            event("2", "2025-03-02", EventType::BranchStart),
            event("3", "2025-03-03", EventType::Branch),
        ];
        let assignment = assign_branches(&events);

        assert_eq!(assignment.branches.len(), 1);
        assert!(!assignment.branches[0].merged);
        assert_eq!(assignment.branches[0].end, None);
        assert_eq!(assignment.branches[0].point_count(), 2);
    }

    #[test]
    fn test_merge_without_open_branch_is_main_point() {
        let events = vec![
            event("1", "2025-03-01", EventType::Main),
            event("2", "2025-03-02", EventType::BranchMerge),
        ];
        let assignment = assign_branches(&events);
        assert!(assignment.branches.is_empty());
        assert_eq!(assignment.main_points, vec![0, 1]);
    }

    #[test]
    fn test_nested_merge_closes_most_recent() {
        let events = vec![
            event("a", "2025-03-01", EventType::BranchStart),
            event("b", "2025-03-02", EventType::BranchStart),
            event("c", "2025-03-03", EventType::Branch),
            event("d", "2025-03-04", EventType::BranchMerge),
            event("e", "2025-03-05", EventType::Branch),
        ];
        let assignment = assign_branches(&events);

        assert_eq!(assignment.branches.len(), 2);
        assert_eq!(assignment.branches[0].start, 1);
        assert_eq!(assignment.branches[0].events, vec![1, 2]);
        assert!(assignment.branches[0].merged);
        assert_eq!(assignment.branches[1].start, 0);
        assert_eq!(assignment.branches[1].events, vec![0, 4]);
        assert!(!assignment.branches[1].merged);

        let owner = assignment.branch_of(events.len());
        assert_eq!(owner, vec![None, None, Some(0), None, Some(1)]);
    }

    #[test]
    fn test_orphan_branch_event() {
        let events = vec![event("x", "2025-03-01", EventType::Branch)];
        let assignment = assign_branches(&events);
        assert!(assignment.branches.is_empty());
        assert!(assignment.main_points.is_empty());
        assert_eq!(assignment.orphans, vec![0]);
    }

    #[test]
    fn test_assign_branches_uses_date_order() {
        let events = vec![
            event("merge", "2025-03-04", EventType::BranchMerge),
            event("start", "2025-03-01", EventType::BranchStart),
        ];
        let assignment = assign_branches(&events);
        assert_eq!(assignment.branches.len(), 1);
        assert!(assignment.branches[0].merged);
        assert_eq!(assignment.main_points, vec![1, 0]);
    }

    #[test]
    fn test_label_offsets_alternate_when_crowded() {
        let config = LayoutConfig::default();
        let offsets = label_offsets(&[100.0, 120.0, 400.0, 430.0, 800.0], &config);
        assert_eq!(offsets, vec![-20.0, -5.0, -20.0, -5.0, -20.0]);

        let offsets = label_offsets(&[100.0, 400.0, 110.0], &config);
        assert_eq!(offsets, vec![-20.0, -20.0, -35.0]);
    }
}
