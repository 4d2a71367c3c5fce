//! Static star octree for magnitude-limited visibility and radius queries.
//!
//! Stars are placed in the octree according to both position and
//! brightness. Every node has an absolute magnitude threshold; stars at
//! least that bright stay in the node instead of descending further, and the
//! threshold gets fainter by a factor of four in luminosity per level. Bright
//! stars therefore live near the root, and a node can be skipped whenever
//! the brightest star anywhere below it would be too faint to see from the
//! nearest point of its cell.
//!
//! Construction happens in two phases (see [`builder`]): stars are inserted
//! into an owned, growable tree which is then flattened depth-first into a
//! node array and a star array sorted in the same order. Each node's stars,
//! and the stars of its whole subtree, form contiguous slices of that array.

mod builder;
mod query;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{LoadError, Result};
use crate::star::StarRecord;
use crate::Vector3;

pub use query::{Frustum, QueryStats, StarHandler};

/// Child slot value of a node without a child in that octant.
pub const NO_CHILD: u32 = u32::MAX;

/// Octree construction parameters.
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    /// Center of the root cell in light-years. Kept away from the origin so
    /// the Sun does not sit on a cell boundary at every level.
    pub root_center: Vector3,
    /// Half the side length of the root cell in light-years. The root grows
    /// in steps of two when stars lie outside it.
    pub root_half_size: f32,
    /// Apparent magnitude used to derive the root node's absolute magnitude
    /// threshold at the distance of the root cell's corners.
    pub limiting_magnitude: f32,
    /// Magnitudes added to the threshold per level (-2.5 log10(1/4)).
    pub magnitude_step: f32,
    /// Number of stars a leaf holds before it is split.
    pub split_threshold: usize,
    /// Cells with a half size at or below this never split.
    pub min_half_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            root_center: Vector3::new(1000.0, 1000.0, 1000.0),
            root_half_size: 10_000.0,
            limiting_magnitude: 6.0,
            magnitude_step: 1.505_15,
            split_threshold: 75,
            min_half_size: 0.5,
        }
    }
}

/// A node of the static octree.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct OctreeNode {
    pub center: [f32; 3],
    pub half_size: f32,
    /// Index of the first star stored at this node.
    pub first: u32,
    /// Number of stars stored at this node.
    pub count: u32,
    /// End (exclusive) of the star range covered by the whole subtree.
    pub subtree_end: u32,
    /// Brightest absolute magnitude in the subtree.
    pub brightest: f32,
    /// Node indices of the children per octant, [`NO_CHILD`] where absent.
    pub children: [u32; 8],
}

impl OctreeNode {
    pub fn center(&self) -> Vector3 {
        Vector3::from(self.center)
    }

    pub fn children(&self) -> impl Iterator<Item = u32> + '_ {
        self.children.iter().copied().filter(|&c| c != NO_CHILD)
    }

    /// Star index range of the stars stored at this node.
    pub fn star_range(&self) -> std::ops::Range<usize> {
        self.first as usize..(self.first + self.count) as usize
    }

    /// Star index range of every star in this node's subtree.
    pub fn subtree_range(&self) -> std::ops::Range<usize> {
        self.first as usize..self.subtree_end as usize
    }
}

/// Static octree owning the spatially sorted star array.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct StarOctree {
    nodes: Vec<OctreeNode>,
    stars: Vec<StarRecord>,
}

impl StarOctree {
    /// Build the octree, reordering `stars` into depth-first node order.
    pub fn build(stars: Vec<StarRecord>, config: &OctreeConfig) -> Self {
        builder::build(stars, config)
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// Stars in octree order.
    pub fn stars(&self) -> &[StarRecord] {
        &self.stars
    }

    /// Node array; the root is node 0 unless the tree is empty.
    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check the node spans and child links against the arrays they index.
    ///
    /// Trees from [`StarOctree::build`] always pass; this guards trees read
    /// back from storage. Children must follow their parent in the node
    /// array, which also rules out cycles.
    pub fn validate(&self) -> Result<()> {
        let inconsistent = |idx: usize, what: &str| Err(LoadError::Inconsistent(format!("octree node {idx}: {what}")));
        if self.nodes.is_empty() != self.stars.is_empty() {
            return Err(LoadError::Inconsistent("octree nodes and stars disagree on emptiness".to_string()));
        }
        if let Some(root) = self.nodes.first() {
            if root.first != 0 || root.subtree_end as usize != self.stars.len() {
                return inconsistent(0, "root does not span every star");
            }
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            let Some(own_end) = node.first.checked_add(node.count) else {
                return inconsistent(idx, "star span overflows");
            };
            if own_end > node.subtree_end || node.subtree_end as usize > self.stars.len() {
                return inconsistent(idx, "star span out of range");
            }
            for child_idx in node.children() {
                let Some(child) = self.nodes.get(child_idx as usize) else {
                    return inconsistent(idx, "child index out of range");
                };
                if child_idx as usize <= idx {
                    return inconsistent(idx, "child precedes its parent");
                }
                if child.first < own_end || child.subtree_end > node.subtree_end {
                    return inconsistent(idx, "child span outside the parent's subtree");
                }
            }
        }
        Ok(())
    }

    /// Depth of the deepest node, the root being at depth 0.
    pub fn max_depth(&self) -> usize {
        fn depth(nodes: &[OctreeNode], idx: u32) -> usize {
            nodes[idx as usize]
                .children()
                .map(|c| 1 + depth(nodes, c))
                .max()
                .unwrap_or(0)
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth(&self.nodes, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stellarclass::StellarClass;

    fn star(n: u32, pos: [f32; 3], abs_mag: f32) -> StarRecord {
        StarRecord::new(n, Vector3::from(pos), abs_mag, StellarClass::default())
    }

    #[test]
    fn empty_tree() {
        let tree = StarOctree::build(Vec::new(), &OctreeConfig::default());
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.max_depth(), 0);
    }

    #[test]
    fn small_catalog_stays_in_root() {
        let stars = (0..10)
            .map(|i| star(i, [i as f32, 0.0, 0.0], 10.0))
            .collect();
        let tree = StarOctree::build(stars, &OctreeConfig::default());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.nodes()[0].count, 10);
        assert_eq!(tree.nodes()[0].brightest, 10.0);
    }

    #[test]
    fn splits_and_keeps_every_star_once() {
        let config = OctreeConfig {
            split_threshold: 4,
            ..Default::default()
        };
        let stars: Vec<StarRecord> = (0..200)
            .map(|i| {
                let f = i as f32;
                star(i, [f * 3.1 % 97.0, f * 7.3 % 53.0, f * 1.7 % 31.0], 8.0 + (i % 7) as f32)
            })
            .collect();
        let tree = StarOctree::build(stars, &config);
        assert!(tree.node_count() > 1);
        assert!(tree.max_depth() > 0);

        let mut ids: Vec<u32> = tree.stars().iter().map(|s| s.catalog_number).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..200).collect::<Vec<_>>());

        let covered: u32 = tree.nodes().iter().map(|n| n.count).sum();
        assert_eq!(covered, 200);
        assert_eq!(tree.nodes()[0].subtree_range(), 0..200);
    }

    #[test]
    fn subtree_invariants() {
        let config = OctreeConfig {
            split_threshold: 3,
            ..Default::default()
        };
        let stars: Vec<StarRecord> = (0..300)
            .map(|i| {
                let f = i as f32;
                star(i, [(f * 13.7) % 400.0 - 200.0, (f * 5.3) % 300.0, (f * 2.9) % 250.0 - 90.0], (i % 17) as f32 - 4.0)
            })
            .collect();
        let tree = StarOctree::build(stars, &config);

        for node in tree.nodes() {
            let c = node.center();
            let subtree = &tree.stars()[node.subtree_range()];
            for s in subtree {
                let d = s.position() - c;
                assert!(d.amax() <= node.half_size, "star outside its cell");
                assert!(s.absolute_magnitude >= node.brightest);
            }
            if let Some(min) = subtree.iter().map(|s| s.absolute_magnitude).reduce(f32::min) {
                assert_eq!(min, node.brightest);
            }
            for child in node.children() {
                let child = &tree.nodes()[child as usize];
                assert_eq!(child.half_size, node.half_size * 0.5);
                assert!(child.first >= node.first + node.count);
                assert!(child.subtree_end <= node.subtree_end);
            }
        }
    }

    #[test]
    fn validate_rejects_broken_spans_and_links() {
        let config = OctreeConfig {
            split_threshold: 2,
            ..Default::default()
        };
        let stars: Vec<StarRecord> = (0..40)
            .map(|i| star(i, [(i * 37 % 101) as f32, (i * 11 % 23) as f32, i as f32], 9.0))
            .collect();
        let tree = StarOctree::build(stars, &config);
        assert!(tree.node_count() > 1);
        assert!(tree.validate().is_ok());
        assert!(StarOctree::default().validate().is_ok());

        let mut broken = tree.clone();
        broken.nodes[0].subtree_end = 999;
        assert!(matches!(broken.validate(), Err(LoadError::Inconsistent(_))));

        let mut broken = tree.clone();
        let last = broken.nodes.len() - 1;
        broken.nodes[last].count = u32::MAX;
        assert!(broken.validate().is_err());

        let mut broken = tree.clone();
        let parent = broken.nodes.iter().position(|n| n.children().next().is_some()).unwrap();
        let slot = broken.nodes[parent].children.iter().position(|&c| c != NO_CHILD).unwrap();
        broken.nodes[parent].children[slot] = broken.nodes.len() as u32;
        assert!(broken.validate().is_err());
        broken.nodes[parent].children[slot] = parent as u32;
        assert!(broken.validate().is_err());

        let mut broken = tree;
        broken.stars.pop();
        assert!(broken.validate().is_err());
    }

    #[test]
    fn root_grows_to_enclose_outliers() {
        let stars = vec![
            star(1, [0.0, 0.0, 0.0], 1.0),
            star(2, [1.0e6, -2.0e6, 3.0], 1.0),
        ];
        let tree = StarOctree::build(stars, &OctreeConfig::default());
        let root = &tree.nodes()[0];
        assert!(root.half_size >= 2.0e6);
        assert_eq!(root.subtree_end, 2);
    }
}
