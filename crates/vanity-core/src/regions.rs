//! Region builder — landmark contours to closed makeup polygons.
//!
//! Each zone is described declaratively by a contour rule; adding or
//! removing a zone is a table edit, not a new conditional branch.

use crate::types::{GroupId, LandmarkSet, MakeupOptions, Point, Region, Zone};

/// How a zone's landmark groups become one simple closed polygon.
#[derive(Debug, Clone, Copy)]
pub enum ContourRule {
    /// Close a single contour directly (first point joins the last).
    Loop(GroupId),
    /// Two open contours that both run left to right: walk the upper one
    /// forward, then the lower one in reverse. Skipping the reversal folds
    /// the polygon into a self-intersecting bow tie.
    ConcatReversed { upper: GroupId, lower: GroupId },
}

/// One entry of the zone table.
#[derive(Debug, Clone, Copy)]
pub struct ZoneSpec {
    pub zone: Zone,
    pub rule: ContourRule,
}

/// The zones the builder knows, in deterministic paint order.
pub const fn zone_specs() -> [ZoneSpec; 3] {
    [
        ZoneSpec {
            zone: Zone::Lips,
            rule: ContourRule::ConcatReversed {
                upper: GroupId::LipsUpperOuter,
                lower: GroupId::LipsLowerOuter,
            },
        },
        ZoneSpec {
            zone: Zone::LeftEyelid,
            rule: ContourRule::Loop(GroupId::LeftEyeUpper),
        },
        ZoneSpec {
            zone: Zone::RightEyelid,
            rule: ContourRule::Loop(GroupId::RightEyeUpper),
        },
    ]
}

/// Build regions for every (face, zone) pair with a configured style and
/// present landmark groups.
///
/// A zone whose groups are missing from a face is skipped silently:
/// partial landmark coverage degrades that zone, never the tick.
pub fn build_regions(faces: &[LandmarkSet], options: &MakeupOptions) -> Vec<Region> {
    let mut regions = Vec::new();

    for face in faces {
        for spec in zone_specs() {
            let Some(style) = options.style_for(spec.zone) else {
                continue;
            };
            let Some(points) = contour_points(face, spec.rule) else {
                tracing::debug!(zone = ?spec.zone, "landmark group missing, skipping zone");
                continue;
            };
            if points.len() < 3 {
                continue;
            }
            regions.push(Region {
                points,
                style: *style,
            });
        }
    }

    regions
}

/// Assemble the closed contour for a rule, or `None` if a group is absent.
fn contour_points(face: &LandmarkSet, rule: ContourRule) -> Option<Vec<Point>> {
    match rule {
        ContourRule::Loop(group) => Some(face.get(group)?.to_vec()),
        ContourRule::ConcatReversed { upper, lower } => {
            let upper = face.get(upper)?;
            let lower = face.get(lower)?;
            let mut points = Vec::with_capacity(upper.len() + lower.len());
            points.extend_from_slice(upper);
            points.extend(lower.iter().rev().copied());
            Some(points)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rgb, ZoneStyle};

    fn style(opacity: f32) -> ZoneStyle {
        ZoneStyle::new(Rgb::new(255, 20, 147), opacity).unwrap()
    }

    /// Synthetic lip contours, both running left to right as the mesh does.
    /// Endpoints sit near (but not on) each other, like the mesh's distinct
    /// corner points.
    fn lip_face() -> LandmarkSet {
        let mut face = LandmarkSet::new();
        face.insert(
            GroupId::LipsUpperOuter,
            vec![
                Point::new(0.0, 10.0),
                Point::new(3.0, 7.0),
                Point::new(6.0, 6.0),
                Point::new(9.0, 7.0),
                Point::new(12.0, 10.0),
            ],
        );
        face.insert(
            GroupId::LipsLowerOuter,
            vec![
                Point::new(0.5, 10.5),
                Point::new(3.0, 13.0),
                Point::new(6.0, 14.0),
                Point::new(9.0, 13.0),
                Point::new(11.5, 10.5),
            ],
        );
        face
    }

    /// True if any two non-adjacent polygon edges properly cross.
    fn self_intersects(points: &[Point]) -> bool {
        let n = points.len();
        let seg = |i: usize| (points[i], points[(i + 1) % n]);
        for i in 0..n {
            for j in (i + 1)..n {
                // Skip adjacent edges (they share an endpoint).
                if j == i || (j + 1) % n == i || (i + 1) % n == j {
                    continue;
                }
                let (a, b) = seg(i);
                let (c, d) = seg(j);
                if segments_cross(a, b, c, d) {
                    return true;
                }
            }
        }
        false
    }

    fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
        let orient = |p: Point, q: Point, r: Point| -> f32 {
            (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
        };
        let d1 = orient(a, b, c);
        let d2 = orient(a, b, d);
        let d3 = orient(c, d, a);
        let d4 = orient(c, d, b);
        d1 * d2 < 0.0 && d3 * d4 < 0.0
    }

    #[test]
    fn test_lip_concatenation_is_simple() {
        let options = MakeupOptions {
            lipstick: Some(style(0.7)),
            eyeshadow: None,
        };
        let regions = build_regions(&[lip_face()], &options);
        assert_eq!(regions.len(), 1);
        assert!(
            !self_intersects(&regions[0].points),
            "lip polygon must not self-intersect: {:?}",
            regions[0].points
        );
    }

    #[test]
    fn test_lip_contour_walk_order() {
        let options = MakeupOptions {
            lipstick: Some(style(0.7)),
            eyeshadow: None,
        };
        let regions = build_regions(&[lip_face()], &options);
        let pts = &regions[0].points;
        // Upper contour forward, then lower contour reversed: the point
        // right after the upper run is the lower contour's rightmost point.
        assert_eq!(pts[0], Point::new(0.0, 10.0));
        assert_eq!(pts[4], Point::new(12.0, 10.0));
        assert_eq!(pts[5], Point::new(11.5, 10.5));
        assert_eq!(pts[6], Point::new(9.0, 13.0));
        assert_eq!(*pts.last().unwrap(), Point::new(0.5, 10.5));
    }

    #[test]
    fn test_unreversed_concat_would_self_intersect() {
        // Sanity for the intersection helper and the rule it guards: walking
        // both contours left to right folds the loop into a bow tie.
        let face = lip_face();
        let mut naive: Vec<Point> = face.get(GroupId::LipsUpperOuter).unwrap().to_vec();
        naive.extend_from_slice(face.get(GroupId::LipsLowerOuter).unwrap());
        assert!(self_intersects(&naive));
    }

    #[test]
    fn test_missing_group_skips_zone_only() {
        let mut face = LandmarkSet::new();
        // Only eye groups present; lips unresolvable.
        face.insert(
            GroupId::LeftEyeUpper,
            vec![
                Point::new(10.0, 5.0),
                Point::new(12.0, 4.0),
                Point::new(14.0, 5.0),
            ],
        );
        face.insert(
            GroupId::RightEyeUpper,
            vec![
                Point::new(20.0, 5.0),
                Point::new(22.0, 4.0),
                Point::new(24.0, 5.0),
            ],
        );

        let options = MakeupOptions {
            lipstick: Some(style(0.7)),
            eyeshadow: Some(style(0.4)),
        };
        let regions = build_regions(&[face], &options);
        // Two eyelid regions, no lips.
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_eyeshadow_builds_both_eyelids() {
        let mut face = lip_face();
        face.insert(
            GroupId::LeftEyeUpper,
            vec![
                Point::new(10.0, 5.0),
                Point::new(12.0, 4.0),
                Point::new(14.0, 5.0),
            ],
        );
        face.insert(
            GroupId::RightEyeUpper,
            vec![
                Point::new(20.0, 5.0),
                Point::new(22.0, 4.0),
                Point::new(24.0, 5.0),
            ],
        );

        let options = MakeupOptions {
            lipstick: Some(style(0.7)),
            eyeshadow: Some(style(0.4)),
        };
        let regions = build_regions(&[face], &options);
        // Deterministic order: lips, left eyelid, right eyelid.
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].points.len(), 10);
        assert_eq!(regions[1].points[0], Point::new(10.0, 5.0));
        assert_eq!(regions[2].points[0], Point::new(20.0, 5.0));
    }

    #[test]
    fn test_no_options_no_regions() {
        let regions = build_regions(&[lip_face()], &MakeupOptions::default());
        assert!(regions.is_empty());
    }

    #[test]
    fn test_no_faces_no_regions() {
        let options = MakeupOptions {
            lipstick: Some(style(0.7)),
            eyeshadow: Some(style(0.4)),
        };
        assert!(build_regions(&[], &options).is_empty());
    }

    #[test]
    fn test_degenerate_contour_dropped() {
        let mut face = LandmarkSet::new();
        face.insert(
            GroupId::LeftEyeUpper,
            vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
        );
        let options = MakeupOptions {
            lipstick: None,
            eyeshadow: Some(style(0.4)),
        };
        assert!(build_regions(&[face], &options).is_empty());
    }
}
