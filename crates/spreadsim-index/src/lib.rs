//! Quadtree spatial index for entity neighborhood queries.
//!
//! The tree is rebuilt from scratch each simulation tick over a fixed
//! snapshot of positions and is immutable afterwards, so shared read-only
//! queries from multiple worker threads are safe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of points a leaf may hold before it subdivides.
const NODE_CAPACITY: usize = 8;
/// Maximum subdivision depth; leaves at this depth grow without splitting.
const MAX_DEPTH: usize = 8;

/// Errors emitted while building a spatial index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// The bounding region cannot host a tree (non-positive extent).
    #[error("degenerate bounds: {0}")]
    DegenerateBounds(&'static str),
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Construct a rectangle from its origin corner and extent.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point lies inside the rectangle (inclusive edges).
    #[must_use]
    pub fn contains(&self, point: (f32, f32)) -> bool {
        point.0 >= self.x
            && point.0 <= self.x + self.width
            && point.1 >= self.y
            && point.1 <= self.y + self.height
    }

    /// Whether a circle overlaps this rectangle.
    #[must_use]
    pub fn intersects_circle(&self, center: (f32, f32), radius: f32) -> bool {
        let nearest_x = center.0.clamp(self.x, self.x + self.width);
        let nearest_y = center.1.clamp(self.y, self.y + self.height);
        let dx = center.0 - nearest_x;
        let dy = center.1 - nearest_y;
        dx * dx + dy * dy <= radius * radius
    }

    fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    fn quadrant_rect(&self, quadrant: usize) -> Self {
        let hw = self.width * 0.5;
        let hh = self.height * 0.5;
        let (ox, oy) = match quadrant {
            0 => (0.0, 0.0),
            1 => (hw, 0.0),
            2 => (0.0, hh),
            _ => (hw, hh),
        };
        Self::new(self.x + ox, self.y + oy, hw, hh)
    }
}

#[derive(Debug)]
struct Node {
    bounds: Rect,
    // Indices of the four children when subdivided; leaves hold points.
    children: Option<[usize; 4]>,
    points: Vec<u32>,
}

impl Node {
    fn leaf(bounds: Rect) -> Self {
        Self {
            bounds,
            children: None,
            points: Vec::new(),
        }
    }
}

/// Read-only quadtree over a snapshot of 2D points.
///
/// Points outside the build bounds are a caller error and make query
/// results undefined for those points.
#[derive(Debug)]
pub struct Quadtree {
    nodes: Vec<Node>,
    points: Vec<(f32, f32)>,
}

impl Quadtree {
    /// Build a tree over `points` covering `bounds`.
    ///
    /// Fails without partially constructing when `bounds` has non-positive
    /// width or height.
    pub fn build(points: &[(f32, f32)], bounds: Rect) -> Result<Self, IndexError> {
        if !bounds.width.is_finite() || bounds.width <= 0.0 {
            return Err(IndexError::DegenerateBounds("width must be positive"));
        }
        if !bounds.height.is_finite() || bounds.height <= 0.0 {
            return Err(IndexError::DegenerateBounds("height must be positive"));
        }

        let mut tree = Self {
            nodes: vec![Node::leaf(bounds)],
            points: points.to_vec(),
        };
        for idx in 0..points.len() {
            tree.insert(idx as u32);
        }
        Ok(tree)
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the tree indexes no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Lazily yield the indices of all points within `radius` of `center`.
    ///
    /// Distances compare inclusively, so `radius <= 0.0` yields only
    /// exactly coincident points. The iterator is single-pass.
    #[must_use]
    pub fn query(&self, center: (f32, f32), radius: f32) -> QueryIter<'_> {
        let radius = radius.max(0.0);
        QueryIter {
            tree: self,
            center,
            radius,
            radius_sq: radius * radius,
            stack: vec![0],
            leaf: None,
            cursor: 0,
        }
    }

    /// Quadrant of `point` relative to the center of `node`, assigning seam
    /// points to exactly one child.
    fn quadrant_of(&self, node_id: usize, point: (f32, f32)) -> usize {
        let (cx, cy) = self.nodes[node_id].bounds.center();
        let east = usize::from(point.0 >= cx);
        let south = usize::from(point.1 >= cy);
        south * 2 + east
    }

    fn insert(&mut self, point_idx: u32) {
        let point = self.points[point_idx as usize];
        let mut node_id = 0;
        let mut depth = 0;
        loop {
            if let Some(children) = self.nodes[node_id].children {
                node_id = children[self.quadrant_of(node_id, point)];
                depth += 1;
                continue;
            }
            self.nodes[node_id].points.push(point_idx);
            if self.nodes[node_id].points.len() > NODE_CAPACITY && depth < MAX_DEPTH {
                self.subdivide(node_id);
            }
            return;
        }
    }

    fn subdivide(&mut self, node_id: usize) {
        let bounds = self.nodes[node_id].bounds;
        let first_child = self.nodes.len();
        for quadrant in 0..4 {
            self.nodes.push(Node::leaf(bounds.quadrant_rect(quadrant)));
        }
        let children = [first_child, first_child + 1, first_child + 2, first_child + 3];
        let points = std::mem::take(&mut self.nodes[node_id].points);
        self.nodes[node_id].children = Some(children);
        for point_idx in points {
            let point = self.points[point_idx as usize];
            let child = children[self.quadrant_of(node_id, point)];
            self.nodes[child].points.push(point_idx);
        }
    }
}

/// Single-pass iterator over indices inside a circular query region.
#[derive(Debug)]
pub struct QueryIter<'a> {
    tree: &'a Quadtree,
    center: (f32, f32),
    radius: f32,
    radius_sq: f32,
    stack: Vec<usize>,
    leaf: Option<usize>,
    cursor: usize,
}

impl Iterator for QueryIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if let Some(leaf_id) = self.leaf {
                let points = &self.tree.nodes[leaf_id].points;
                while self.cursor < points.len() {
                    let point_idx = points[self.cursor];
                    self.cursor += 1;
                    let (px, py) = self.tree.points[point_idx as usize];
                    let dx = px - self.center.0;
                    let dy = py - self.center.1;
                    if dx * dx + dy * dy <= self.radius_sq {
                        return Some(point_idx as usize);
                    }
                }
                self.leaf = None;
            }

            let node_id = self.stack.pop()?;
            let node = &self.tree.nodes[node_id];
            if !node.bounds.intersects_circle(self.center, self.radius) {
                continue;
            }
            match node.children {
                Some(children) => self.stack.extend(children),
                None => {
                    self.leaf = Some(node_id);
                    self.cursor = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[(f32, f32)], center: (f32, f32), radius: f32) -> Vec<usize> {
        let radius = radius.max(0.0);
        let mut hits: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                let dx = p.0 - center.0;
                let dy = p.1 - center.1;
                dx * dx + dy * dy <= radius * radius
            })
            .map(|(idx, _)| idx)
            .collect();
        hits.sort_unstable();
        hits
    }

    fn scattered_points(count: usize, extent: f32) -> Vec<(f32, f32)> {
        // Deterministic low-discrepancy-ish scatter, no RNG needed here.
        (0..count)
            .map(|i| {
                let x = ((i as f32 * 37.49) % extent).abs();
                let y = ((i as f32 * 91.17) % extent).abs();
                (x, y)
            })
            .collect()
    }

    #[test]
    fn build_rejects_degenerate_bounds() {
        let err = Quadtree::build(&[], Rect::new(0.0, 0.0, 0.0, 10.0)).unwrap_err();
        assert_eq!(err, IndexError::DegenerateBounds("width must be positive"));
        let err = Quadtree::build(&[], Rect::new(0.0, 0.0, 10.0, -1.0)).unwrap_err();
        assert_eq!(err, IndexError::DegenerateBounds("height must be positive"));
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let tree = Quadtree::build(&[], Rect::new(0.0, 0.0, 100.0, 100.0)).expect("tree");
        assert!(tree.is_empty());
        assert_eq!(tree.query((50.0, 50.0), 200.0).count(), 0);
    }

    #[test]
    fn query_matches_brute_force() {
        let points = scattered_points(500, 100.0);
        let tree = Quadtree::build(&points, Rect::new(0.0, 0.0, 100.0, 100.0)).expect("tree");
        assert_eq!(tree.len(), 500);

        let diagonal = (100.0_f32 * 100.0 + 100.0 * 100.0).sqrt();
        for radius in [0.0, 3.5, 12.0, diagonal] {
            for center in [(0.0, 0.0), (50.0, 50.0), (99.0, 1.0), (13.7, 86.2)] {
                let mut hits: Vec<usize> = tree.query(center, radius).collect();
                hits.sort_unstable();
                let expected = brute_force(&points, center, radius);
                assert_eq!(hits, expected, "center={center:?} radius={radius}");
            }
        }
    }

    #[test]
    fn zero_radius_returns_only_coincident_points() {
        let points = vec![(5.0, 5.0), (5.0, 5.0), (5.1, 5.0)];
        let tree = Quadtree::build(&points, Rect::new(0.0, 0.0, 10.0, 10.0)).expect("tree");
        let mut hits: Vec<usize> = tree.query((5.0, 5.0), 0.0).collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
        assert_eq!(tree.query((2.0, 2.0), -1.0).count(), 0);
    }

    #[test]
    fn coincident_points_subdivide_without_duplicates() {
        // A pile of identical points can never be separated by splitting;
        // the depth cap has to stop the recursion.
        let points = vec![(1.0, 1.0); 64];
        let tree = Quadtree::build(&points, Rect::new(0.0, 0.0, 8.0, 8.0)).expect("tree");
        let mut hits: Vec<usize> = tree.query((1.0, 1.0), 0.5).collect();
        hits.sort_unstable();
        assert_eq!(hits, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn seam_points_are_found_exactly_once() {
        // Points on quadrant boundaries must land in exactly one leaf.
        let points = vec![
            (50.0, 50.0),
            (50.0, 25.0),
            (25.0, 50.0),
            (50.0, 75.0),
            (75.0, 50.0),
            (0.0, 0.0),
            (100.0, 100.0),
        ];
        let tree = Quadtree::build(&points, Rect::new(0.0, 0.0, 100.0, 100.0)).expect("tree");
        let mut hits: Vec<usize> = tree.query((50.0, 50.0), 150.0).collect();
        hits.sort_unstable();
        assert_eq!(hits, (0..points.len()).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_queries_share_one_tree() {
        let points = scattered_points(200, 64.0);
        let tree = Quadtree::build(&points, Rect::new(0.0, 0.0, 64.0, 64.0)).expect("tree");
        let expected = brute_force(&points, (32.0, 32.0), 10.0);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut hits: Vec<usize> = tree.query((32.0, 32.0), 10.0).collect();
                    hits.sort_unstable();
                    assert_eq!(hits, expected);
                });
            }
        });
    }
}
