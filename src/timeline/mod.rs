//! Branch-aware release timeline layout.
//!
//! Turns a list of [`ReleaseEvent`]s into node coordinates, labels and
//! connector paths ready for a viewer to draw:
//!
//! - `layout`: time scale, same-day fan-out, minimum-distance pass,
//!   branch assignment and label staggering
//! - `path`: main-line and branch-line connector synthesis

pub mod layout;
pub mod path;

pub use layout::{Branch, BranchAssignment, LayoutConfig, Margins, TimeScale, assign_branches};
pub use path::{Connector, PathPoint};

use crate::models::{EventType, ReleaseEvent};
use chrono::{Datelike, NaiveDate};
use path::BranchGeometry;
use serde::Serialize;

/// Note marker for releases published to the app store.
pub const STORE_RELEASE_MARKER: &str = "主线版本(商店发布)";

/// Visual style of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStyle {
    Main,
    Branch,
    BranchStart,
    BranchMerge,
    StoreRelease,
}

impl NodeStyle {
    fn for_event(event: &ReleaseEvent) -> Self {
        if event.note.contains(STORE_RELEASE_MARKER) {
            return NodeStyle::StoreRelease;
        }
        match event.event_type {
            EventType::Main => NodeStyle::Main,
            EventType::Branch => NodeStyle::Branch,
            EventType::BranchStart => NodeStyle::BranchStart,
            EventType::BranchMerge => NodeStyle::BranchMerge,
        }
    }
}

/// A positioned timeline node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineNode {
    pub version: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    pub style: NodeStyle,
    pub store_release: bool,
    pub x: f64,
    pub y: f64,
    /// Branch index for branch events that belong to a branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<usize>,
    /// Short version label (last dotted component)
    pub label: String,
    pub label_y: f64,
    /// `M.D` date label
    pub date_label: String,
    pub date_label_y: f64,
}

/// A drawn branch line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchLine {
    pub index: usize,
    pub y: f64,
    pub merged: bool,
    pub start_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_version: Option<String>,
    /// SVG path data
    pub d: String,
    pub dash_array: &'static str,
    pub connector: Connector,
}

/// The main line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainLine {
    /// SVG path data
    pub d: String,
    pub connector: Connector,
}

/// Complete timeline layout document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineLayout {
    pub width: f64,
    pub height: f64,
    pub main_y: f64,
    /// Nodes in input order
    pub nodes: Vec<TimelineNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_line: Option<MainLine>,
    pub branches: Vec<BranchLine>,
}

impl TimelineLayout {
    /// Node for a version, if present.
    pub fn node(&self, version: &str) -> Option<&TimelineNode> {
        self.nodes.iter().find(|n| n.version == version)
    }
}

/// Last `.`-separated component of a version.
pub fn short_label(version: &str) -> String {
    version.rsplit('.').next().unwrap_or(version).to_string()
}

/// `M.D` label for a date.
pub fn date_label(date: NaiveDate) -> String {
    format!("{}.{}", date.month(), date.day())
}

/// Lay out a timeline for `events`.
pub fn layout_timeline(events: &[ReleaseEvent], config: &LayoutConfig) -> TimelineLayout {
    let width = config.canvas_width(events.len());
    let main_y = config.main_y();
    let mut timeline = TimelineLayout {
        width,
        height: config.height,
        main_y,
        nodes: Vec::new(),
        main_line: None,
        branches: Vec::new(),
    };

    let Some(scale) = TimeScale::new(events, width, config) else {
        return timeline;
    };

    let mut xs = layout::same_day_positions(events, &scale, config);
    let order = layout::chronological_order(events);
    layout::enforce_min_distance(&mut xs, &order, config.min_node_distance);

    let assignment = assign_branches(events);
    let owner = assignment.branch_of(events.len());
    let label_offsets = layout::label_offsets(&xs, config);

    timeline.nodes = events
        .iter()
        .enumerate()
        .map(|(idx, event)| {
            let y = match event.event_type {
                EventType::Branch => config.branch_y(owner[idx].unwrap_or(0)),
                _ => main_y,
            };
            TimelineNode {
                version: event.version.clone(),
                date: event.date,
                event_type: event.event_type,
                note: event.note.clone(),
                style: NodeStyle::for_event(event),
                store_release: event.note.contains(STORE_RELEASE_MARKER),
                x: xs[idx],
                y,
                branch: owner[idx],
                label: short_label(&event.version),
                label_y: y + label_offsets[idx],
                date_label: date_label(event.date),
                date_label_y: y + config.date_label_offset,
            }
        })
        .collect();

    let main_xs: Vec<f64> = assignment.main_points.iter().map(|&i| xs[i]).collect();
    let end_x = width - config.margins.right + config.arrow_extension;
    timeline.main_line = path::main_line(&main_xs, main_y, end_x).map(|connector| MainLine {
        d: connector.to_svg(),
        connector,
    });

    for (index, branch) in assignment.branches.iter().enumerate() {
        if branch.point_count() < 2 {
            continue;
        }
        let point_xs: Vec<f64> = branch.events.iter().skip(1).map(|&i| xs[i]).collect();
        let branch_y = config.branch_y(index);
        let connector = path::branch_line(&BranchGeometry {
            start_x: xs[branch.start],
            point_xs: &point_xs,
            merge_x: branch.end.map(|i| xs[i]),
            main_y,
            branch_y,
            radius: config.corner_radius,
        });
        timeline.branches.push(BranchLine {
            index,
            y: branch_y,
            merged: branch.merged,
            start_version: events[branch.start].version.clone(),
            end_version: branch.end.map(|i| events[i].version.clone()),
            d: connector.to_svg(),
            dash_array: connector.dash_array(),
            connector,
        });
    }

    tracing::info!(
        nodes = timeline.nodes.len(),
        branches = timeline.branches.len(),
        "timeline laid out"
    );
    timeline
}
