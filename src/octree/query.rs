//! Frustum/magnitude and radius queries against the static octree.

use super::{OctreeNode, StarOctree};
use crate::astro;
use crate::star::StarRecord;
use crate::{Quaternion, Vector3};

/// Relative tolerance of the plane tests. Points whose plane distance is
/// within rounding of zero count as on the plane, and cell pruning uses the
/// same tolerance so it never drops a star the per-star test accepts.
const PLANE_SLACK: f32 = 1e-5;
const MAGNITUDE_SLACK: f32 = 1e-3;
const RADIUS_SLACK: f32 = 1e-5;

/// Receives the stars produced by a query.
///
/// `distance` is the distance from the observer (or query center) in
/// light-years. `app_mag` is the apparent magnitude from the observer; radius
/// queries report the absolute magnitude converted at `distance`.
pub trait StarHandler {
    fn process(&mut self, star: &StarRecord, distance: f32, app_mag: f32);
}

impl<F> StarHandler for F
where
    F: FnMut(&StarRecord, f32, f32),
{
    fn process(&mut self, star: &StarRecord, distance: f32, app_mag: f32) {
        self(star, distance, app_mag)
    }
}

/// Counters collected while running a query.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub nodes_visited: usize,
    pub stars_tested: usize,
    pub frustum_pruned: usize,
    pub magnitude_pruned: usize,
    pub radius_pruned: usize,
    /// When `Some`, receives the index of every node pruned by the
    /// magnitude bound.
    pub magnitude_pruned_nodes: Option<Vec<u32>>,
}

impl QueryStats {
    /// Stats that also record which nodes were pruned by magnitude.
    pub fn recording() -> Self {
        Self {
            magnitude_pruned_nodes: Some(Vec::new()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Plane {
    normal: Vector3,
    d: f32,
}

impl Plane {
    #[inline]
    fn distance(&self, p: &Vector3) -> f32 {
        self.normal.dot(p) + self.d
    }
}

/// View pyramid of an observer with the far plane omitted.
///
/// `orientation` rotates world vectors into the camera frame, in which the
/// camera looks down -z with +y up. All five planes pass through the
/// observer. Points on a plane count as inside.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    position: Vector3,
    /// L1 norm of `position`, the rounding scale of the plane offsets.
    position_scale: f32,
    planes: [Plane; 5],
}

impl Frustum {
    pub fn new(position: Vector3, orientation: &Quaternion, fov_y_rad: f32, aspect_ratio: f32) -> Self {
        let h = (fov_y_rad * 0.5).tan();
        let w = h * aspect_ratio;
        let camera_normals = [
            Vector3::new(0.0, 1.0, -h),
            Vector3::new(0.0, -1.0, -h),
            Vector3::new(1.0, 0.0, -w),
            Vector3::new(-1.0, 0.0, -w),
            Vector3::new(0.0, 0.0, -1.0),
        ];
        let to_world = orientation.inverse();
        let planes = camera_normals.map(|n| {
            let normal = to_world * n.normalize();
            Plane {
                normal,
                d: -normal.dot(&position),
            }
        });
        Self {
            position,
            position_scale: l1_norm(&position),
            planes,
        }
    }

    pub fn position(&self) -> &Vector3 {
        &self.position
    }

    /// Rounding tolerance of plane distances around `p`.
    #[inline]
    fn tolerance(&self, p: &Vector3) -> f32 {
        PLANE_SLACK * (l1_norm(p) + self.position_scale)
    }

    /// Whether `p` is inside or on the boundary of the frustum, allowing for
    /// rounding in the plane distances.
    pub fn contains(&self, p: &Vector3) -> bool {
        let tolerance = self.tolerance(p);
        self.planes.iter().all(|plane| plane.distance(p) >= -tolerance)
    }

    /// Whether an axis-aligned cube lies entirely outside one of the planes.
    fn culls_cube(&self, center: &Vector3, half_size: f32) -> bool {
        // bounds the tolerance of every point in the cube
        let slack = PLANE_SLACK * (l1_norm(center) + 3.0 * half_size + self.position_scale);
        self.planes.iter().any(|plane| {
            let extent = half_size * l1_norm(&plane.normal);
            plane.distance(center) < -(extent + slack)
        })
    }

    /// Distance and apparent magnitude of a star if it lies in the frustum
    /// and is strictly brighter than `limiting_mag`.
    pub fn star_visibility(&self, star: &StarRecord, limiting_mag: f32) -> Option<(f32, f32)> {
        let pos = star.position();
        if !self.contains(&pos) {
            return None;
        }
        let distance = (pos - self.position).norm();
        let app_mag = astro::abs_to_app_mag(star.absolute_magnitude, distance);
        (app_mag < limiting_mag).then_some((distance, app_mag))
    }
}

#[inline]
fn l1_norm(v: &Vector3) -> f32 {
    v.x.abs() + v.y.abs() + v.z.abs()
}

/// Distance of a star from `center` if it lies strictly within `radius`.
pub(crate) fn star_within(star: &StarRecord, center: &Vector3, radius: f32) -> Option<f32> {
    let dist2 = (star.position() - center).norm_squared();
    (dist2 < radius * radius).then(|| dist2.sqrt())
}

/// Distance from `p` to the nearest point of a cube (zero inside).
fn cube_distance(node: &OctreeNode, p: &Vector3) -> f32 {
    let offset = (p - node.center()).abs();
    offset.map(|c| (c - node.half_size).max(0.0)).norm()
}

impl StarOctree {
    /// Call `handler` for every star inside `frustum` with an apparent
    /// magnitude below `limiting_mag`.
    pub fn find_visible_stars<H: StarHandler + ?Sized>(
        &self,
        handler: &mut H,
        frustum: &Frustum,
        limiting_mag: f32,
    ) {
        let mut stats = QueryStats::default();
        self.find_visible_stars_with_stats(handler, frustum, limiting_mag, &mut stats);
    }

    pub fn find_visible_stars_with_stats<H: StarHandler + ?Sized>(
        &self,
        handler: &mut H,
        frustum: &Frustum,
        limiting_mag: f32,
        stats: &mut QueryStats,
    ) {
        if !self.nodes.is_empty() {
            self.visit_visible(0, handler, frustum, limiting_mag, stats);
        }
    }

    fn visit_visible<H: StarHandler + ?Sized>(
        &self,
        idx: u32,
        handler: &mut H,
        frustum: &Frustum,
        limiting_mag: f32,
        stats: &mut QueryStats,
    ) {
        let node = &self.nodes[idx as usize];
        stats.nodes_visited += 1;

        if frustum.culls_cube(&node.center(), node.half_size) {
            stats.frustum_pruned += 1;
            return;
        }

        let min_distance = cube_distance(node, frustum.position());
        if min_distance > 0.0 {
            let best_mag = astro::abs_to_app_mag(node.brightest, min_distance);
            if best_mag > limiting_mag + MAGNITUDE_SLACK {
                stats.magnitude_pruned += 1;
                if let Some(pruned) = stats.magnitude_pruned_nodes.as_mut() {
                    pruned.push(idx);
                }
                return;
            }
        }

        for star in &self.stars[node.star_range()] {
            stats.stars_tested += 1;
            if let Some((distance, app_mag)) = frustum.star_visibility(star, limiting_mag) {
                handler.process(star, distance, app_mag);
            }
        }

        for child in node.children() {
            self.visit_visible(child, handler, frustum, limiting_mag, stats);
        }
    }

    /// Call `handler` for every star closer than `radius` to `center`,
    /// regardless of brightness.
    pub fn find_close_stars<H: StarHandler + ?Sized>(&self, handler: &mut H, center: &Vector3, radius: f32) {
        let mut stats = QueryStats::default();
        self.find_close_stars_with_stats(handler, center, radius, &mut stats);
    }

    pub fn find_close_stars_with_stats<H: StarHandler + ?Sized>(
        &self,
        handler: &mut H,
        center: &Vector3,
        radius: f32,
        stats: &mut QueryStats,
    ) {
        if !self.nodes.is_empty() && radius > 0.0 {
            self.visit_close(0, handler, center, radius, stats);
        }
    }

    fn visit_close<H: StarHandler + ?Sized>(
        &self,
        idx: u32,
        handler: &mut H,
        center: &Vector3,
        radius: f32,
        stats: &mut QueryStats,
    ) {
        let node = &self.nodes[idx as usize];
        stats.nodes_visited += 1;

        let min_distance = cube_distance(node, center);
        if min_distance > radius * (1.0 + RADIUS_SLACK) {
            stats.radius_pruned += 1;
            return;
        }

        for star in &self.stars[node.star_range()] {
            stats.stars_tested += 1;
            if let Some(distance) = star_within(star, center, radius) {
                let app_mag = astro::abs_to_app_mag(star.absolute_magnitude, distance);
                handler.process(star, distance, app_mag);
            }
        }

        for child in node.children() {
            self.visit_close(child, handler, center, radius, stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::OctreeConfig;
    use crate::stellarclass::StellarClass;

    fn star(n: u32, pos: [f32; 3], abs_mag: f32) -> StarRecord {
        StarRecord::new(n, Vector3::from(pos), abs_mag, StellarClass::default())
    }

    fn collect_visible(tree: &StarOctree, frustum: &Frustum, limit: f32) -> Vec<u32> {
        let mut ids = Vec::new();
        tree.find_visible_stars(
            &mut |s: &StarRecord, _: f32, _: f32| ids.push(s.catalog_number),
            frustum,
            limit,
        );
        ids.sort_unstable();
        ids
    }

    fn forward_frustum() -> Frustum {
        Frustum::new(
            Vector3::zeros(),
            &Quaternion::identity(),
            60.0f32.to_radians(),
            1.5,
        )
    }

    #[test]
    fn frustum_planes() {
        let f = forward_frustum();
        assert!(f.contains(&Vector3::new(0.0, 0.0, -10.0)));
        assert!(f.contains(&Vector3::new(3.0, 2.0, -10.0)));
        assert!(!f.contains(&Vector3::new(0.0, 0.0, 10.0)));
        assert!(!f.contains(&Vector3::new(0.0, 8.0, -10.0)));
        assert!(!f.contains(&Vector3::new(-20.0, 0.0, -10.0)));
        // the apex lies on every plane
        assert!(f.contains(&Vector3::zeros()));
    }

    #[test]
    fn frustum_follows_orientation() {
        // camera turned to look down +x
        let q = Quaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2);
        let f = Frustum::new(Vector3::new(5.0, 0.0, 0.0), &q, 45.0f32.to_radians(), 1.0);
        assert!(f.contains(&Vector3::new(50.0, 0.0, 0.0)));
        assert!(!f.contains(&Vector3::new(-50.0, 0.0, 0.0)));
        assert!(!f.contains(&Vector3::new(5.0, 0.0, -50.0)));
    }

    #[test]
    fn empty_tree_never_calls_handler() {
        let tree = StarOctree::default();
        let mut calls = 0;
        tree.find_visible_stars(&mut |_: &StarRecord, _: f32, _: f32| calls += 1, &forward_frustum(), 30.0);
        tree.find_close_stars(&mut |_: &StarRecord, _: f32, _: f32| calls += 1, &Vector3::zeros(), 1e9);
        assert_eq!(calls, 0);
    }

    #[test]
    fn single_star_inside_and_outside() {
        let inside = StarOctree::build(vec![star(1, [0.0, 0.0, -10.0], 1.0)], &OctreeConfig::default());
        assert_eq!(collect_visible(&inside, &forward_frustum(), 6.0), vec![1]);
        // too faint
        assert!(collect_visible(&inside, &forward_frustum(), -2.0).is_empty());

        let behind = StarOctree::build(vec![star(2, [0.0, 0.0, 10.0], 1.0)], &OctreeConfig::default());
        assert!(collect_visible(&behind, &forward_frustum(), 6.0).is_empty());
    }

    #[test]
    fn star_on_plane_is_included() {
        let tree = StarOctree::build(vec![star(3, [0.0, 0.0, 0.0], 20.0)], &OctreeConfig::default());
        assert_eq!(collect_visible(&tree, &forward_frustum(), 6.0), vec![3]);
    }

    /// Points on each side plane of a square frustum looking down -z.
    fn side_plane_points(fov_y_deg: f32, depth: f32) -> [Vector3; 4] {
        let edge = (fov_y_deg.to_radians() * 0.5).tan() * depth;
        [
            Vector3::new(0.0, edge, -depth),
            Vector3::new(0.0, -edge, -depth),
            Vector3::new(edge, 0.0, -depth),
            Vector3::new(-edge, 0.0, -depth),
        ]
    }

    #[test]
    fn stars_on_side_planes_are_included() {
        for fov in [30.0f32, 60.0, 90.0] {
            let frustum = Frustum::new(Vector3::zeros(), &Quaternion::identity(), fov.to_radians(), 1.0);
            for depth in [1.0f32, 10.0, 137.5] {
                let points = side_plane_points(fov, depth);
                let stars: Vec<StarRecord> = points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| star(i as u32, [p.x, p.y, p.z], -5.0))
                    .collect();
                for p in &points {
                    assert!(frustum.contains(p), "fov {fov}, {p:?}");
                }

                let tree = StarOctree::build(stars, &OctreeConfig::default());
                assert_eq!(collect_visible(&tree, &frustum, 6.0), vec![0, 1, 2, 3], "fov {fov}, depth {depth}");
            }
        }
    }

    #[test]
    fn points_just_outside_side_planes_are_excluded() {
        let frustum = Frustum::new(Vector3::zeros(), &Quaternion::identity(), 60.0f32.to_radians(), 1.0);
        for p in side_plane_points(60.0, 10.0) {
            let outside = Vector3::new(p.x * 1.01, p.y * 1.01, p.z);
            assert!(!frustum.contains(&outside), "{outside:?}");
        }
    }

    #[test]
    fn close_stars_strict_radius() {
        let stars = vec![
            star(1, [1.0, 0.0, 0.0], 5.0),
            star(2, [0.0, 2.0, 0.0], 5.0),
            star(3, [0.0, 0.0, 3.0], 5.0),
        ];
        let tree = StarOctree::build(stars, &OctreeConfig::default());
        let mut ids = Vec::new();
        tree.find_close_stars(
            &mut |s: &StarRecord, d: f32, _: f32| {
                assert!(d < 2.0);
                ids.push(s.catalog_number)
            },
            &Vector3::zeros(),
            2.0,
        );
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn magnitude_pruning_skips_faint_subtrees() {
        let config = OctreeConfig {
            split_threshold: 2,
            ..Default::default()
        };
        // a faint cluster far away and a bright star nearby
        let mut stars: Vec<StarRecord> = (0..50)
            .map(|i| star(i, [3000.0 + i as f32, 3000.0, -3000.0 - i as f32], 12.0))
            .collect();
        stars.push(star(100, [0.0, 0.0, -5.0], 0.0));
        let tree = StarOctree::build(stars, &config);

        let frustum = Frustum::new(Vector3::zeros(), &Quaternion::identity(), 179.0f32.to_radians(), 1.0);
        let mut stats = QueryStats::recording();
        let mut ids = Vec::new();
        tree.find_visible_stars_with_stats(
            &mut |s: &StarRecord, _: f32, _: f32| ids.push(s.catalog_number),
            &frustum,
            6.0,
            &mut stats,
        );
        assert_eq!(ids, vec![100]);
        assert!(stats.magnitude_pruned > 0);
        assert!(stats.stars_tested < 51);
    }
}
