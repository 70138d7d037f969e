// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena-backed binary partition tree over a fixed point set.

use core::fmt::Debug;

use glam::DVec3;
use smallvec::SmallVec;

use crate::error::BuildError;
use crate::types::BoundingBox;

/// Deepest level a node may live on. Building past it fails with
/// [`BuildError::DepthExceeded`].
pub const MAX_DEPTH: usize = 200;

/// Handle of a node in the tree arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// The root of every non-empty tree.
    pub const ROOT: Self = Self(0);

    const fn idx(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug)]
struct Entry<I> {
    id: I,
    position: DVec3,
}

#[derive(Clone, Debug)]
enum NodeKind {
    Internal {
        children: [NodeIndex; 2],
        axis: usize,
        cut: f64,
    },
    Leaf { slots: SmallVec<[usize; 8]> },
}

#[derive(Clone, Debug)]
struct Node {
    bounds: BoundingBox,
    depth: usize,
    kind: NodeKind,
}

/// A binary space partition over a set of 3D points, split adaptively at the
/// points' centroid.
///
/// Every node covers a [`BoundingBox`]. Internal nodes have exactly two
/// children whose boxes overlap by `2 * tol` along the split axis; leaves
/// hold the entries directly. Points strictly within `tol` of a cut are
/// stored in both children, so a point close to a cut is visible from either
/// side. Points exactly `tol` away from the cut belong to one side only, which
/// is what lets points `2 * tol` apart end up in different leaves.
///
/// The tree is immutable after [`build`](Self::build).
///
/// ## Split rule
///
/// For each axis the centroid's distance to the nearer box face is computed
/// and the axis where that distance is largest is split at the centroid.
/// Cutting the longest edge instead can keep slicing thin slivers off a box
/// whose points hug one face, so that rule is not used.
///
/// ## Example
///
/// ```rust
/// use glam::DVec3;
/// use ringmatch_octree::SpatialTree;
///
/// let points = [
///     (1_u32, DVec3::new(0.0, 0.0, 0.0)),
///     (2, DVec3::new(1.0, 0.0, 0.0)),
///     (3, DVec3::new(5.0, 5.0, 0.0)),
/// ];
/// let tree = SpatialTree::build(points, 1, 1e-3).unwrap();
///
/// let (id, dist) = tree.nearest(DVec3::new(0.9, 0.0, 0.0), 1e-6, false).unwrap();
/// assert_eq!(id, 2);
/// assert!((dist - 0.1).abs() < 1e-12);
/// ```
pub struct SpatialTree<I> {
    entries: Vec<Entry<I>>,
    nodes: Vec<Node>,
    tol: f64,
    max_leaf_size: usize,
}

impl<I: Debug> Debug for SpatialTree<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let leaves = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Leaf { .. }))
            .count();
        f.debug_struct("SpatialTree")
            .field("entries", &self.entries.len())
            .field("nodes", &self.nodes.len())
            .field("leaves", &leaves)
            .field("depth", &self.depth())
            .field("tol", &self.tol)
            .field("max_leaf_size", &self.max_leaf_size)
            .finish_non_exhaustive()
    }
}

impl<I: Copy> SpatialTree<I> {
    /// Build a tree over `(id, position)` pairs.
    ///
    /// The root box encloses every position padded by `tol`. Nodes holding
    /// more than `max_leaf_size` entries are split; the rest become leaves.
    ///
    /// Fails if there is nothing to index, if a parameter is unusable, or if
    /// the split recursion passes [`MAX_DEPTH`] (e.g. more than
    /// `max_leaf_size` coincident points).
    pub fn build(
        entries: impl IntoIterator<Item = (I, DVec3)>,
        max_leaf_size: usize,
        tol: f64,
    ) -> Result<Self, BuildError> {
        if max_leaf_size == 0 {
            return Err(BuildError::ZeroLeafSize);
        }
        if !tol.is_finite() || tol < 0.0 {
            return Err(BuildError::InvalidTolerance(tol));
        }
        let entries: Vec<Entry<I>> = entries
            .into_iter()
            .map(|(id, position)| Entry { id, position })
            .collect();
        let Some(first) = entries.first() else {
            return Err(BuildError::NoEntries);
        };

        let mut bounds = BoundingBox::around(first.position, tol);
        for (index, entry) in entries.iter().enumerate() {
            if !entry.position.is_finite() {
                return Err(BuildError::NonFinitePosition { index });
            }
            bounds.expand_to_include(entry.position, tol);
        }

        let mut tree = Self {
            nodes: Vec::new(),
            tol,
            max_leaf_size,
            entries,
        };
        let slots: Vec<usize> = (0..tree.entries.len()).collect();
        tree.build_node(slots, bounds, 0)?;
        Ok(tree)
    }

    fn build_node(
        &mut self,
        slots: Vec<usize>,
        bounds: BoundingBox,
        depth: usize,
    ) -> Result<NodeIndex, BuildError> {
        if depth > MAX_DEPTH {
            return Err(BuildError::DepthExceeded {
                entries: slots.len(),
            });
        }
        assert!(
            !slots.is_empty(),
            "octree invariant violated: leaf with no entries at depth {depth}"
        );

        let index = NodeIndex(self.nodes.len());
        if slots.len() <= self.max_leaf_size {
            self.nodes.push(Node {
                bounds,
                depth,
                kind: NodeKind::Leaf {
                    slots: slots.into_iter().collect(),
                },
            });
            return Ok(index);
        }

        // Children are patched in once they exist.
        self.nodes.push(Node {
            bounds,
            depth,
            kind: NodeKind::Internal {
                children: [index, index],
                axis: 0,
                cut: 0.0,
            },
        });

        let (axis, cut) = self.choose_split(&slots, &bounds);
        let (lower_box, upper_box) = bounds.split(axis, cut, self.tol);
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        for slot in slots {
            let (in_lower, in_upper) = sides(self.entries[slot].position[axis], cut, self.tol);
            if in_lower {
                lower.push(slot);
            }
            if in_upper {
                upper.push(slot);
            }
        }

        let lo = self.build_node(lower, lower_box, depth + 1)?;
        let hi = self.build_node(upper, upper_box, depth + 1)?;
        self.nodes[index.idx()].kind = NodeKind::Internal {
            children: [lo, hi],
            axis,
            cut,
        };
        Ok(index)
    }

    /// Pick the axis where the centroid is farthest from both faces.
    fn choose_split(&self, slots: &[usize], bounds: &BoundingBox) -> (usize, f64) {
        let mut sum = DVec3::ZERO;
        let mut lo = DVec3::INFINITY;
        let mut hi = DVec3::NEG_INFINITY;
        for &slot in slots {
            let p = self.entries[slot].position;
            sum += p;
            lo = lo.min(p);
            hi = hi.max(p);
        }
        let centroid = sum / slots.len() as f64;

        let mut axis = 0;
        let mut best = 0.0;
        for dim in 0..3 {
            let d = (centroid[dim] - bounds.min[dim]).min(bounds.max[dim] - centroid[dim]);
            if d > best {
                best = d;
                axis = dim;
            }
        }
        // Rounding may push the mean past the extreme points; keep both halves non-empty.
        (axis, centroid[axis].clamp(lo[axis], hi[axis]))
    }
}

/// Which halves of a cut hold coordinate `c`.
///
/// Strictly within `tol` of the cut means both. A coordinate on the cut itself
/// always goes to both, so nothing is dropped when `tol` is zero.
#[inline]
fn sides(c: f64, cut: f64, tol: f64) -> (bool, bool) {
    (c < cut + tol || c == cut, c > cut - tol || c == cut)
}

impl<I> SpatialTree<I> {
    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false` for a built tree; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest node (the root has depth 0).
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Padding used for the boxes.
    pub fn tolerance(&self) -> f64 {
        self.tol
    }

    /// Box of the root node.
    pub fn root_bounds(&self) -> BoundingBox {
        self.nodes[NodeIndex::ROOT.idx()].bounds
    }

    /// Whether `x` lies in the root box.
    #[inline]
    pub fn is_point_in_box(&self, x: DVec3) -> bool {
        self.root_bounds().contains(x)
    }

    /// Box of a node.
    pub fn bounds(&self, node: NodeIndex) -> BoundingBox {
        self.nodes[node.idx()].bounds
    }

    /// Children of an internal node, `None` for a leaf.
    pub fn children(&self, node: NodeIndex) -> Option<[NodeIndex; 2]> {
        match self.nodes[node.idx()].kind {
            NodeKind::Internal { children, .. } => Some(children),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Walk from the root to the leaf whose box contains `x`, or `None` if
    /// `x` is outside the root box.
    ///
    /// At each level `x` follows the same rule the entries followed when the
    /// node was split: the lower child if it would have been stored there,
    /// the upper child otherwise. A point exactly on the edge of the overlap
    /// band therefore lands in the leaf that holds an entry at that position.
    ///
    /// # Panics
    ///
    /// If `x` lies in a node's box but not in the box of the child it is
    /// sent to, which means the tree is corrupt.
    pub fn descend_to_leaf(&self, x: DVec3) -> Option<Leaf<'_, I>> {
        if !self.is_point_in_box(x) {
            return None;
        }
        let mut node = NodeIndex::ROOT;
        while let NodeKind::Internal {
            children: [a, b],
            axis,
            cut,
        } = self.nodes[node.idx()].kind
        {
            node = if sides(x[axis], cut, self.tol).0 { a } else { b };
            assert!(
                self.nodes[node.idx()].bounds.contains(x),
                "octree invariant violated: point {x} in parent box but not in its child box"
            );
        }
        Some(self.leaf(node))
    }

    /// Closest entry to `x`, or `None` if `x` is outside the root box.
    ///
    /// See [`Leaf::closest`] for the meaning of `band` and `want_second_best`.
    pub fn nearest(&self, x: DVec3, band: f64, want_second_best: bool) -> Option<(I, f64)>
    where
        I: Copy,
    {
        self.descend_to_leaf(x)
            .map(|leaf| leaf.closest(x, band, want_second_best))
    }

    /// Iterate over all leaves in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = Leaf<'_, I>> + '_ {
        (0..self.nodes.len())
            .map(NodeIndex)
            .filter(|&n| matches!(self.nodes[n.idx()].kind, NodeKind::Leaf { .. }))
            .map(|n| self.leaf(n))
    }

    fn leaf(&self, node: NodeIndex) -> Leaf<'_, I> {
        let n = &self.nodes[node.idx()];
        let NodeKind::Leaf { slots } = &n.kind else {
            unreachable!("leaf() called on an internal node");
        };
        Leaf {
            entries: &self.entries,
            index: node,
            bounds: n.bounds,
            depth: n.depth,
            slots,
        }
    }
}

/// Borrowed view of a leaf node.
#[derive(Clone, Copy)]
pub struct Leaf<'a, I> {
    entries: &'a [Entry<I>],
    index: NodeIndex,
    bounds: BoundingBox,
    depth: usize,
    slots: &'a [usize],
}

impl<I: Debug> Debug for Leaf<'_, I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Leaf")
            .field("index", &self.index)
            .field("depth", &self.depth)
            .field("bounds", &self.bounds)
            .field("len", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl<'a, I: Copy> Leaf<'a, I> {
    /// Arena handle of this leaf.
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Box of this leaf.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Depth of this leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Leaves are never empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries held by this leaf, in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (I, DVec3)> + 'a {
        let entries = self.entries;
        self.slots.iter().map(move |&s| {
            let e = &entries[s];
            (e.id, e.position)
        })
    }

    /// Linear scan for the entry closest to `x`.
    ///
    /// The first entry is the initial guess. A later entry replaces the
    /// current best only if it is closer by more than `band`. Entries within
    /// `band` of the current best count as equally close: they are ignored,
    /// unless `want_second_best` is set, in which case they replace the best
    /// so that the *last* equally close entry is returned. Callers use that to
    /// steer away from an entry already claimed by someone else.
    pub fn closest(&self, x: DVec3, band: f64, want_second_best: bool) -> (I, f64) {
        let mut it = self.entries();
        let (mut best_id, p) = it
            .next()
            .expect("octree invariant violated: empty leaf");
        let mut best = p.distance(x);
        for (id, p) in it {
            let d = p.distance(x);
            if d < best - band {
                best = d;
                best_id = id;
            } else if want_second_best && (d - best).abs() < band {
                best = d;
                best_id = id;
            }
        }
        (best_id, best)
    }

    /// All entries whose distance to `x` is within `eps` of `distance`.
    pub fn ties(
        &self,
        x: DVec3,
        distance: f64,
        eps: f64,
    ) -> impl Iterator<Item = (I, f64)> + 'a {
        self.entries().filter_map(move |(id, p)| {
            let d = p.distance(x);
            ((d - distance).abs() < eps).then_some((id, d))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, spacing: f64) -> Vec<(u32, DVec3)> {
        let mut out = Vec::new();
        let mut id = 0_u32;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    out.push((
                        id,
                        DVec3::new(i as f64, j as f64, k as f64) * spacing,
                    ));
                    id += 1;
                }
            }
        }
        out
    }

    #[test]
    fn small_set_is_a_single_leaf() {
        let pts = vec![(7_u32, DVec3::ZERO), (8, DVec3::X)];
        let tree = SpatialTree::build(pts, 4, 0.1).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.depth(), 0);
        assert!(tree.children(NodeIndex::ROOT).is_none());
        assert_eq!(tree.root_bounds().min, DVec3::splat(-0.1));
        assert_eq!(tree.root_bounds().max, DVec3::new(1.1, 0.1, 0.1));
    }

    #[test]
    fn leaves_respect_size_and_contain_their_points() {
        let pts = grid(6, 1.0);
        let tol = 1e-3;
        let tree = SpatialTree::build(pts.clone(), 5, tol).unwrap();
        for leaf in tree.leaves() {
            assert!(!leaf.is_empty());
            assert!(leaf.len() <= 5, "leaf {:?} too large", leaf.index());
            for (_, p) in leaf.entries() {
                assert!(leaf.bounds().contains(p), "{p} outside {:?}", leaf.bounds());
            }
        }
    }

    #[test]
    fn every_point_reaches_a_leaf_holding_it() {
        let pts = grid(5, 0.5);
        let tree = SpatialTree::build(pts.clone(), 3, 1e-6).unwrap();
        for &(id, p) in &pts {
            let leaf = tree.descend_to_leaf(p).unwrap();
            assert!(
                leaf.entries().any(|(other, _)| other == id),
                "point {id} not in the leaf its coordinate descends to"
            );
        }
        // And nothing is lost: every id lives in at least one leaf.
        for &(id, _) in &pts {
            assert!(tree.leaves().any(|l| l.entries().any(|(o, _)| o == id)));
        }
    }

    #[test]
    fn parents_enclose_children() {
        let tree = SpatialTree::build(grid(4, 2.0), 2, 0.01).unwrap();
        for i in 0..tree.node_count() {
            let node = NodeIndex(i);
            if let Some([a, b]) = tree.children(node) {
                let parent = tree.bounds(node);
                assert!(parent.contains_box(&tree.bounds(a)));
                assert!(parent.contains_box(&tree.bounds(b)));
                assert_eq!(parent, tree.bounds(a).union(&tree.bounds(b)));
            }
        }
    }

    #[test]
    fn splits_where_the_centroid_is_most_central() {
        // Longest in x, but the points hug x = 0 and the centroid is central in y.
        let mut pts = vec![(100_u32, DVec3::new(12.0, 0.0, 0.0))];
        for i in 0..9 {
            pts.push((i, DVec3::new(0.0, i as f64, 0.0)));
        }
        let tree = SpatialTree::build(pts, 4, 0.01).unwrap();
        let [a, b] = tree.children(NodeIndex::ROOT).unwrap();
        let (lo, hi) = (tree.bounds(a), tree.bounds(b));
        // Only y was cut.
        assert_eq!(lo.min.x, hi.min.x);
        assert_eq!(lo.max.x, hi.max.x);
        assert!(lo.max.y < tree.root_bounds().max.y);
        assert!(hi.min.y > tree.root_bounds().min.y);
        assert!((lo.max.y - hi.min.y - 0.02).abs() < 1e-12);
    }

    #[test]
    fn coincident_points_hit_the_depth_ceiling() {
        let pts: Vec<_> = (0..10_u32).map(|i| (i, DVec3::new(1.0, 2.0, 3.0))).collect();
        let err = SpatialTree::build(pts, 4, 1e-3).unwrap_err();
        assert_eq!(err, BuildError::DepthExceeded { entries: 10 });
    }

    #[test]
    fn rejects_unusable_parameters() {
        let pts = vec![(0_u32, DVec3::ZERO)];
        assert_eq!(
            SpatialTree::build(pts.clone(), 0, 0.1).unwrap_err(),
            BuildError::ZeroLeafSize
        );
        assert!(matches!(
            SpatialTree::build(pts.clone(), 1, -1.0).unwrap_err(),
            BuildError::InvalidTolerance(_)
        ));
        assert_eq!(
            SpatialTree::<u32>::build([], 1, 0.1).unwrap_err(),
            BuildError::NoEntries
        );
        let bad = vec![(0_u32, DVec3::ZERO), (1, DVec3::new(f64::NAN, 0.0, 0.0))];
        assert_eq!(
            SpatialTree::build(bad, 1, 0.1).unwrap_err(),
            BuildError::NonFinitePosition { index: 1 }
        );
    }

    #[test]
    fn closest_keeps_first_of_equally_close_entries() {
        let pts = vec![
            (1_u32, DVec3::new(1.0, 0.0, 0.0)),
            (2, DVec3::new(-1.0, 0.0, 0.0)),
            (3, DVec3::new(0.0, 3.0, 0.0)),
        ];
        let tree = SpatialTree::build(pts, 8, 0.1).unwrap();
        let leaf = tree.descend_to_leaf(DVec3::ZERO).unwrap();
        assert_eq!(leaf.closest(DVec3::ZERO, 1e-6, false), (1, 1.0));
        assert_eq!(leaf.closest(DVec3::ZERO, 1e-6, true), (2, 1.0));
    }

    #[test]
    fn band_hides_slightly_closer_entries() {
        let pts = vec![(1_u32, DVec3::new(1.0, 0.0, 0.0)), (2, DVec3::new(0.0, 0.95, 0.0))];
        let tree = SpatialTree::build(pts, 8, 0.1).unwrap();
        let leaf = tree.descend_to_leaf(DVec3::ZERO).unwrap();
        // 0.95 is not closer by more than the band of 0.1.
        assert_eq!(leaf.closest(DVec3::ZERO, 0.1, false).0, 1);
        assert_eq!(leaf.closest(DVec3::ZERO, 0.01, false).0, 2);
    }

    #[test]
    fn ties_lists_all_equidistant_entries() {
        let pts = vec![
            (1_u32, DVec3::ZERO),
            (2, DVec3::ZERO),
            (3, DVec3::new(0.0, 0.0, 1.0)),
        ];
        let tree = SpatialTree::build(pts, 8, 0.1).unwrap();
        let leaf = tree.descend_to_leaf(DVec3::ZERO).unwrap();
        let ties: Vec<_> = leaf.ties(DVec3::ZERO, 0.0, 1e-9).map(|(id, _)| id).collect();
        assert_eq!(ties, vec![1, 2]);
    }

    #[test]
    fn nearest_outside_root_is_none() {
        let tree = SpatialTree::build(grid(2, 1.0), 2, 0.5).unwrap();
        assert!(tree.nearest(DVec3::splat(1.5), 1e-9, false).is_some());
        assert!(tree.nearest(DVec3::splat(1.5 + 1e-9), 1e-9, false).is_none());
    }

    #[test]
    fn points_two_tolerances_apart_are_separated() {
        let pts = grid(2, 1.0);
        let tree = SpatialTree::build(pts.clone(), 1, 0.5).unwrap();
        assert_eq!(tree.leaves().count(), 8);
        for &(id, p) in &pts {
            let leaf = tree.descend_to_leaf(p).unwrap();
            assert_eq!(leaf.entries().map(|(o, _)| o).collect::<Vec<_>>(), vec![id]);
        }
    }

    #[test]
    fn entries_on_the_cut_go_to_both_sides_without_padding() {
        assert_eq!(sides(1.0, 1.0, 0.0), (true, true));
        assert_eq!(sides(1.0, 0.5, 0.5), (false, true));
        assert_eq!(sides(0.0, 0.5, 0.5), (true, false));
        assert_eq!(sides(0.5, 0.4, 0.5), (true, true));
    }

    #[test]
    fn descent_outside_the_root_is_none() {
        let tree = SpatialTree::build(grid(3, 1.0), 2, 0.1).unwrap();
        assert!(tree.descend_to_leaf(DVec3::splat(2.1)).is_some());
        assert!(tree.descend_to_leaf(DVec3::new(-0.2, 1.0, 1.0)).is_none());
        assert!(tree.descend_to_leaf(DVec3::new(f64::NAN, 0.0, 0.0)).is_none());
    }

    #[test]
    fn nearest_finds_the_point_a_probe_sits_on() {
        let pts = grid(5, 1.0);
        let tree = SpatialTree::build(pts.clone(), 4, 0.25).unwrap();
        let offset = DVec3::new(1e-4, -2e-4, 1e-4);
        for &(id, p) in &pts {
            let (found, d) = tree.nearest(p + offset, 0.0, false).unwrap();
            assert_eq!(found, id, "probe near {p}");
            assert!((d - offset.length()).abs() < 1e-12);
        }
    }
}
