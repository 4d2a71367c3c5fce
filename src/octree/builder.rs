//! Two-phase octree construction.
//!
//! Phase one inserts star indices into an owned tree whose nodes hold a
//! growable star list and lazily created children. Phase two walks that tree
//! depth-first, emitting the flat node array and the star array in the same
//! order. The owned tree lives only for the duration of [`build`].

use std::time::Instant;

use tracing::debug;

use super::{OctreeConfig, OctreeNode, StarOctree, NO_CHILD};
use crate::astro;
use crate::star::StarRecord;
use crate::Vector3;

struct BuildParams {
    root_threshold: f32,
    magnitude_step: f32,
    split_threshold: usize,
    min_half_size: f32,
}

impl BuildParams {
    fn threshold(&self, depth: u32) -> f32 {
        self.root_threshold + depth as f32 * self.magnitude_step
    }
}

struct BuildNode {
    center: Vector3,
    half_size: f32,
    stars: Vec<u32>,
    split: bool,
    children: [Option<Box<BuildNode>>; 8],
}

impl BuildNode {
    fn new(center: Vector3, half_size: f32) -> Self {
        Self {
            center,
            half_size,
            stars: Vec::new(),
            split: false,
            children: Default::default(),
        }
    }

    fn octant(&self, p: &Vector3) -> usize {
        (p.x >= self.center.x) as usize
            | ((p.y >= self.center.y) as usize) << 1
            | ((p.z >= self.center.z) as usize) << 2
    }

    fn child(&mut self, octant: usize) -> &mut BuildNode {
        let center = self.center;
        let half = self.half_size * 0.5;
        self.children[octant].get_or_insert_with(|| {
            let sign = |bit: usize| if octant & bit != 0 { half } else { -half };
            Box::new(BuildNode::new(
                center + Vector3::new(sign(1), sign(2), sign(4)),
                half,
            ))
        })
    }

    fn insert(&mut self, idx: u32, depth: u32, stars: &[StarRecord], params: &BuildParams) {
        let star = &stars[idx as usize];
        let threshold = params.threshold(depth);
        if star.absolute_magnitude <= threshold {
            self.stars.push(idx);
            return;
        }

        if !self.split {
            if self.stars.len() < params.split_threshold || self.half_size <= params.min_half_size {
                self.stars.push(idx);
                return;
            }
            self.split_node(depth, stars, params);
        }

        let octant = self.octant(&star.position());
        self.child(octant).insert(idx, depth + 1, stars, params);
    }

    /// Keep the stars bright enough for this level and push the rest down.
    fn split_node(&mut self, depth: u32, stars: &[StarRecord], params: &BuildParams) {
        self.split = true;
        let threshold = params.threshold(depth);
        let (keep, push): (Vec<u32>, Vec<u32>) = std::mem::take(&mut self.stars)
            .into_iter()
            .partition(|&i| stars[i as usize].absolute_magnitude <= threshold);
        self.stars = keep;
        for idx in push {
            let octant = self.octant(&stars[idx as usize].position());
            self.child(octant).insert(idx, depth + 1, stars, params);
        }
    }

    /// Append this subtree to the output arrays and return the node index.
    fn flatten(
        self,
        stars: &mut [Option<StarRecord>],
        nodes: &mut Vec<OctreeNode>,
        sorted: &mut Vec<StarRecord>,
    ) -> u32 {
        let node_idx = nodes.len() as u32;
        let first = sorted.len() as u32;
        let mut brightest = f32::INFINITY;
        for &i in &self.stars {
            if let Some(star) = stars[i as usize].take() {
                brightest = brightest.min(star.absolute_magnitude);
                sorted.push(star);
            }
        }
        nodes.push(OctreeNode {
            center: self.center.into(),
            half_size: self.half_size,
            first,
            count: sorted.len() as u32 - first,
            subtree_end: 0,
            brightest,
            children: [NO_CHILD; 8],
        });

        for (octant, child) in self.children.into_iter().enumerate() {
            let Some(child) = child else { continue };
            let child_idx = child.flatten(stars, nodes, sorted);
            let child_brightest = nodes[child_idx as usize].brightest;
            let node = &mut nodes[node_idx as usize];
            node.children[octant] = child_idx;
            node.brightest = node.brightest.min(child_brightest);
        }
        nodes[node_idx as usize].subtree_end = sorted.len() as u32;
        node_idx
    }
}

pub(super) fn build(stars: Vec<StarRecord>, config: &OctreeConfig) -> StarOctree {
    if stars.is_empty() {
        return StarOctree::default();
    }
    let start = Instant::now();

    let center = config.root_center;
    let mut half_size = config.root_half_size.max(f32::MIN_POSITIVE);
    let extent = stars
        .iter()
        .map(|s| (s.position() - center).amax())
        .filter(|d| d.is_finite())
        .fold(0.0f32, f32::max);
    while half_size < extent {
        half_size *= 2.0;
    }

    let params = BuildParams {
        root_threshold: astro::app_to_abs_mag(
            config.limiting_magnitude,
            half_size * 3.0f32.sqrt(),
        ),
        magnitude_step: config.magnitude_step,
        split_threshold: config.split_threshold.max(1),
        min_half_size: config.min_half_size,
    };

    let mut root = BuildNode::new(center, half_size);
    for idx in 0..stars.len() as u32 {
        root.insert(idx, 0, &stars, &params);
    }

    let count = stars.len();
    let mut slots: Vec<Option<StarRecord>> = stars.into_iter().map(Some).collect();
    let mut nodes = Vec::new();
    let mut sorted = Vec::with_capacity(count);
    root.flatten(&mut slots, &mut nodes, &mut sorted);

    let tree = StarOctree {
        nodes,
        stars: sorted,
    };
    debug!(
        "Built star octree: {} stars, {} nodes, depth {}, root half size {} ly in {:.1} ms",
        tree.len(),
        tree.node_count(),
        tree.max_depth(),
        half_size,
        start.elapsed().as_secs_f64() * 1000.0
    );
    tree
}
