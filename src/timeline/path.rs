//! Connector paths for the release timeline.
//!
//! Paths are built as abstract [`PathPoint`] sequences and can be rendered
//! to SVG path data with [`Connector::to_svg`].

use serde::Serialize;
use std::fmt::Write;

/// A point in a connector path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathPoint {
    /// Move to a point without drawing
    MoveTo { x: f64, y: f64 },
    /// Draw a line to a point
    LineTo { x: f64, y: f64 },
    /// Draw a quadratic bezier curve
    QuadraticTo { cx: f64, cy: f64, x: f64, y: f64 },
}

/// A drawable connector: a path plus its stroke style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub points: Vec<PathPoint>,
    /// Dashed stroke (unmerged branches)
    pub dashed: bool,
}

impl Connector {
    /// Render as SVG path data (`M x y L x y Q cx cy, x y`).
    pub fn to_svg(&self) -> String {
        let mut d = String::new();
        for (i, point) in self.points.iter().enumerate() {
            if i > 0 {
                d.push(' ');
            }
            // Writing to a String cannot fail.
            let _ = match point {
                PathPoint::MoveTo { x, y } => write!(d, "M {} {}", x, y),
                PathPoint::LineTo { x, y } => write!(d, "L {} {}", x, y),
                PathPoint::QuadraticTo { cx, cy, x, y } => {
                    write!(d, "Q {} {}, {} {}", cx, cy, x, y)
                }
            };
        }
        d
    }

    /// SVG `stroke-dasharray` value for this connector.
    pub fn dash_array(&self) -> &'static str {
        if self.dashed { "5,5" } else { "0" }
    }
}

/// Main line through `xs` at `y`, extended to `end_x` for the arrowhead.
///
/// Returns `None` with fewer than two main-line points.
pub fn main_line(xs: &[f64], y: f64, end_x: f64) -> Option<Connector> {
    let (first, rest) = xs.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let mut points = Vec::with_capacity(xs.len() + 1);
    points.push(PathPoint::MoveTo { x: *first, y });
    points.extend(rest.iter().map(|&x| PathPoint::LineTo { x, y }));
    points.push(PathPoint::LineTo { x: end_x, y });

    Some(Connector {
        points,
        dashed: false,
    })
}

/// Geometry of one branch line.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchGeometry<'a> {
    /// X of the branch start on the main line
    pub start_x: f64,
    /// X of every branch point after the start, in order
    pub point_xs: &'a [f64],
    /// X of the merge point, if merged
    pub merge_x: Option<f64>,
    pub main_y: f64,
    pub branch_y: f64,
    pub radius: f64,
}

/// Branch line: descend from the main line with a rounded corner, run
/// through the branch points, and either rise back at the merge point with
/// a mirrored corner (solid) or stop at the last point (dashed).
pub fn branch_line(geometry: &BranchGeometry<'_>) -> Connector {
    let BranchGeometry {
        start_x,
        point_xs,
        merge_x,
        main_y,
        branch_y,
        radius,
    } = *geometry;

    let mut points = vec![
        PathPoint::MoveTo {
            x: start_x,
            y: main_y,
        },
        PathPoint::LineTo {
            x: start_x,
            y: branch_y - radius,
        },
        PathPoint::QuadraticTo {
            cx: start_x,
            cy: branch_y,
            x: start_x + radius,
            y: branch_y,
        },
    ];
    points.extend(point_xs.iter().map(|&x| PathPoint::LineTo { x, y: branch_y }));

    if let Some(end_x) = merge_x {
        points.push(PathPoint::LineTo {
            x: end_x - radius,
            y: branch_y,
        });
        points.push(PathPoint::QuadraticTo {
            cx: end_x,
            cy: branch_y,
            x: end_x,
            y: branch_y - radius,
        });
        points.push(PathPoint::LineTo {
            x: end_x,
            y: main_y,
        });
    }

    Connector {
        points,
        dashed: merge_x.is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_line_extends_past_last_point() {
        let line = main_line(&[50.0, 150.0, 300.0], 200.0, 1140.0).unwrap();
        assert_eq!(line.to_svg(), "M 50 200 L 150 200 L 300 200 L 1140 200");
        assert!(!line.dashed);
    }

    #[test]
    fn test_main_line_needs_two_points() {
        assert!(main_line(&[50.0], 200.0, 1140.0).is_none());
        assert!(main_line(&[], 200.0, 1140.0).is_none());
    }

    #[test]
    fn test_merged_branch_line() {
        let line = branch_line(&BranchGeometry {
            start_x: 100.0,
            point_xs: &[200.0],
            merge_x: Some(300.0),
            main_y: 200.0,
            branch_y: 320.0,
            radius: 20.0,
        });
        assert_eq!(
            line.to_svg(),
            "M 100 200 L 100 300 Q 100 320, 120 320 L 200 320 L 280 320 Q 300 320, 300 300 L 300 200"
        );
        assert_eq!(line.dash_array(), "0");
    }

    #[test]
    fn test_unmerged_branch_line_is_dashed() {
        let line = branch_line(&BranchGeometry {
            start_x: 100.0,
            point_xs: &[200.0, 260.0],
            merge_x: None,
            main_y: 200.0,
            branch_y: 320.0,
            radius: 20.0,
        });
        assert_eq!(
            line.to_svg(),
            "M 100 200 L 100 300 Q 100 320, 120 320 L 200 320 L 260 320"
        );
        assert!(line.dashed);
        assert_eq!(line.dash_array(), "5,5");
    }

    #[test]
    fn test_path_point_serializes_with_op_tag() {
        let json = serde_json::to_value(PathPoint::LineTo { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(json["op"], "line_to");
        assert_eq!(json["x"], 1.0);
    }
}
