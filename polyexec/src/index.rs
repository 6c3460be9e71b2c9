//! Three dimensional iteration spaces used by bulk submission.

use std::fmt;
use std::ops;

/// A three dimensional iteration space `{width, height, depth}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: [usize; 3],
}

impl Shape {
    /// The single point space `{1, 1, 1}`.
    pub const UNIT: Shape = Shape::new(1, 1, 1);

    /// Creates the iteration space `{width, height, depth}`.
    pub const fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            dims: [width, height, depth],
        }
    }

    /// Creates the one dimensional space `{len, 1, 1}`.
    pub const fn linear(len: usize) -> Self {
        Self::new(len, 1, 1)
    }

    pub fn width(&self) -> usize {
        self.dims[0]
    }

    pub fn height(&self) -> usize {
        self.dims[1]
    }

    pub fn depth(&self) -> usize {
        self.dims[2]
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of points in the space, or `None` if it does not fit in a
    /// `usize`.
    ///
    /// A space with a zero dimension is empty whatever its other
    /// dimensions are.
    pub fn checked_len(&self) -> Option<usize> {
        if self.is_empty() {
            return Some(0);
        }

        self.dims
            .iter()
            .try_fold(1usize, |len, &dim| len.checked_mul(dim))
    }

    /// Number of points in the space, saturating at `usize::MAX`.
    ///
    /// Bulk submission rejects spaces whose [`checked_len`](Self::checked_len)
    /// overflows, so a submitted space never saturates.
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.dims.contains(&0)
    }

    /// Iterates every point, dimension-major with the innermost dimension
    /// varying fastest.
    pub fn iter(&self) -> ShapeIter {
        ShapeIter {
            shape: *self,
            next: 0,
            len: self.len(),
        }
    }

    /// Maps a linear position back to its coordinate.
    fn point_at(&self, linear: usize) -> Index {
        let [_, height, depth] = self.dims;
        Index {
            shape: *self,
            point: [
                linear / (height * depth),
                (linear / depth) % height,
                linear % depth,
            ],
        }
    }
}

impl ops::Index<usize> for Shape {
    type Output = usize;

    fn index(&self, dim: usize) -> &usize {
        &self.dims[dim]
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}, {}}}", self.dims[0], self.dims[1], self.dims[2])
    }
}

impl IntoIterator for Shape {
    type Item = Index;
    type IntoIter = ShapeIter;

    fn into_iter(self) -> ShapeIter {
        self.iter()
    }
}

/// A point `{x, y, z}` inside a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Index {
    shape: Shape,
    point: [usize; 3],
}

impl Index {
    /// Creates the point `{x, y, z}` within `shape`.
    pub fn new(shape: Shape, x: usize, y: usize, z: usize) -> Self {
        Self {
            shape,
            point: [x, y, z],
        }
    }

    pub fn x(&self) -> usize {
        self.point[0]
    }

    pub fn y(&self) -> usize {
        self.point[1]
    }

    pub fn z(&self) -> usize {
        self.point[2]
    }

    pub fn point(&self) -> [usize; 3] {
        self.point
    }

    /// The iteration space this index belongs to.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Position of this point in iteration order.
    pub fn linear(&self) -> usize {
        let [_, height, depth] = self.shape.dims;
        (self.point[0] * height + self.point[1]) * depth + self.point[2]
    }
}

impl ops::Index<usize> for Index {
    type Output = usize;

    fn index(&self, dim: usize) -> &usize {
        &self.point[dim]
    }
}

/// Iterator over every [`Index`] of a [`Shape`].
#[derive(Debug, Clone)]
pub struct ShapeIter {
    shape: Shape,
    next: usize,
    len: usize,
}

impl Iterator for ShapeIter {
    type Item = Index;

    fn next(&mut self) -> Option<Index> {
        if self.next >= self.len {
            return None;
        }

        let index = self.shape.point_at(self.next);
        self.next += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ShapeIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_dimension_major() {
        let points: Vec<_> = Shape::new(2, 2, 2).iter().map(|i| i.point()).collect();

        assert_eq!(
            points,
            vec![
                [0, 0, 0],
                [0, 0, 1],
                [0, 1, 0],
                [0, 1, 1],
                [1, 0, 0],
                [1, 0, 1],
                [1, 1, 0],
                [1, 1, 1],
            ]
        );
    }

    #[test]
    fn linear_matches_iteration_order() {
        let shape = Shape::new(3, 4, 5);
        for (position, index) in shape.iter().enumerate() {
            assert_eq!(index.linear(), position);
            assert_eq!(index.shape(), shape);
        }
        assert_eq!(shape.iter().len(), 60);
    }

    #[test]
    fn empty_dimension_yields_nothing() {
        let shape = Shape::new(4, 0, 3);
        assert!(shape.is_empty());
        assert_eq!(shape.iter().count(), 0);
    }

    #[test]
    fn empty_dimension_short_circuits_overflow() {
        let shape = Shape::new(usize::MAX, 2, 0);

        assert!(shape.is_empty());
        assert_eq!(shape.checked_len(), Some(0));
        assert_eq!(shape.len(), 0);
        assert_eq!(shape.iter().count(), 0);
    }

    #[test]
    fn oversized_space_has_no_length() {
        let shape = Shape::new(usize::MAX, 2, 1);

        assert!(!shape.is_empty());
        assert_eq!(shape.checked_len(), None);
        assert_eq!(shape.len(), usize::MAX);
        assert_eq!(Shape::new(usize::MAX, 1, 1).checked_len(), Some(usize::MAX));
    }

    #[test]
    fn dimension_accessors() {
        let shape = Shape::new(4, 5, 6);

        assert_eq!((shape.width(), shape.height(), shape.depth()), (4, 5, 6));
        assert_eq!(shape.dims(), [4, 5, 6]);
        assert_eq!(Shape::UNIT.dims(), [1, 1, 1]);
        assert_eq!(Shape::linear(9).dims(), [9, 1, 1]);
    }

    #[test]
    fn indexing_by_dimension() {
        let shape = Shape::new(7, 8, 9);
        assert_eq!((shape[0], shape[1], shape[2]), (7, 8, 9));

        let index = Index::new(shape, 1, 2, 3);
        assert_eq!((index[0], index[1], index[2]), (1, 2, 3));
        assert_eq!(shape.to_string(), "{7, 8, 9}");
    }
}
