// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-tree properties over a scattered point cloud.

use glam::DVec3;
use ringmatch_octree::{BuildError, MAX_DEPTH, NodeIndex, SpatialTree};

/// Deterministic scatter in `[0, 10)^3` from a 64-bit LCG.
fn scatter(n: usize, mut seed: u64) -> Vec<(usize, DVec3)> {
    let mut next = || {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (seed >> 11) as f64 / (1_u64 << 53) as f64 * 10.0
    };
    (0..n).map(|i| (i, DVec3::new(next(), next(), next()))).collect()
}

fn walk(tree: &SpatialTree<usize>, node: NodeIndex, depth: usize, max_seen: &mut usize) {
    *max_seen = (*max_seen).max(depth);
    if let Some([a, b]) = tree.children(node) {
        let parent = tree.bounds(node);
        assert!(parent.contains_box(&tree.bounds(a)));
        assert!(parent.contains_box(&tree.bounds(b)));
        walk(tree, a, depth + 1, max_seen);
        walk(tree, b, depth + 1, max_seen);
    }
}

#[test]
fn scattered_cloud_is_fully_covered() {
    let pts = scatter(2_000, 7);
    let tol = 1e-6;
    let tree = SpatialTree::build(pts.clone(), 16, tol).unwrap();
    assert_eq!(tree.len(), pts.len());

    let mut depth = 0;
    walk(&tree, NodeIndex::ROOT, 0, &mut depth);
    assert_eq!(depth, tree.depth());
    assert!(depth <= MAX_DEPTH);

    for leaf in tree.leaves() {
        assert!(!leaf.is_empty() && leaf.len() <= 16);
        assert!(leaf.entries().all(|(_, p)| leaf.bounds().contains(p)));
    }
    for &(id, p) in &pts {
        assert!(tree.is_point_in_box(p));
        assert_eq!(tree.nearest(p, 0.0, false), Some((id, 0.0)));
    }
}

#[test]
fn root_box_is_the_padded_hull() {
    let pts = scatter(300, 99);
    let tol = 0.125;
    let tree = SpatialTree::build(pts.clone(), 8, tol).unwrap();
    let lo = pts.iter().fold(DVec3::INFINITY, |acc, &(_, p)| acc.min(p));
    let hi = pts.iter().fold(DVec3::NEG_INFINITY, |acc, &(_, p)| acc.max(p));
    assert_eq!(tree.root_bounds().min, lo - DVec3::splat(tol));
    assert_eq!(tree.root_bounds().max, hi + DVec3::splat(tol));
    assert_eq!(tree.tolerance(), tol);
}

#[test]
fn coincident_cluster_in_a_cloud_fails_cleanly() {
    let mut pts = scatter(50, 3);
    let n = pts.len();
    pts.extend((0..5).map(|i| (n + i, DVec3::splat(5.0))));
    let err = SpatialTree::build(pts, 4, 1e-9).unwrap_err();
    assert!(matches!(err, BuildError::DepthExceeded { entries } if entries >= 5));
}
