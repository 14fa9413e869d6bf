use super::{rot90, try_normalize, Point2d, Vector2d};
use crate::error::{NetworkError, NetworkResult};
use cgmath::prelude::*;
use itertools::Itertools;

/// A piecewise linear curve, used as the centre line of a lane.
///
/// Positions along the curve are measured as distance from its start, in m.
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    /// The vertices, at least two.
    points: Vec<Point2d>,
    /// The distance along the curve of each vertex.
    distances: Vec<f64>,
}

impl Polyline {
    /// Creates a polyline through the given points.
    /// Fails if there are fewer than two points, or any section has no length.
    pub fn new(points: Vec<Point2d>) -> NetworkResult<Self> {
        if points.len() < 2 {
            return Err(NetworkError::InvalidGeometry(format!(
                "a polyline needs at least 2 points, got {}",
                points.len()
            )));
        }
        let mut distances = Vec::with_capacity(points.len());
        distances.push(0.0);
        for (a, b) in points.iter().tuple_windows() {
            let section = a.distance(*b);
            if !(section > 0.0) {
                return Err(NetworkError::InvalidGeometry(format!(
                    "polyline section from {:?} to {:?} has no length",
                    a, b
                )));
            }
            distances.push(distances[distances.len() - 1] + section);
        }
        Ok(Self { points, distances })
    }

    /// Creates a straight line.
    pub fn straight(start: Point2d, end: Point2d) -> NetworkResult<Self> {
        Self::new(vec![start, end])
    }

    /// The vertices of the polyline.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// The length of the polyline in m.
    pub fn length(&self) -> f64 {
        self.distances[self.distances.len() - 1]
    }

    /// The number of straight sections.
    pub fn section_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Finds the section containing the position, and the fraction along that section.
    /// Positions outside the polyline are clamped to its ends.
    pub fn locate(&self, pos: f64) -> (usize, f64) {
        let pos = pos.clamp(0.0, self.length());
        let section = self.distances[1..]
            .iter()
            .position(|end| pos <= *end)
            .unwrap_or(self.section_count() - 1);
        let start = self.distances[section];
        let end = self.distances[section + 1];
        (section, (pos - start) / (end - start))
    }

    /// The position at a fraction along the given section.
    pub fn position_at(&self, section: usize, fraction: f64) -> f64 {
        let section = section.min(self.section_count() - 1);
        let start = self.distances[section];
        let end = self.distances[section + 1];
        start + fraction * (end - start)
    }

    /// Samples the point and unit tangent at a position along the polyline.
    pub fn sample(&self, pos: f64) -> (Point2d, Vector2d) {
        let (section, fraction) = self.locate(pos);
        let a = self.points[section];
        let b = self.points[section + 1];
        let dir = (b - a).normalize();
        (a + (b - a) * fraction, dir)
    }

    /// Creates a polyline parallel to this one, offset laterally by `offset` m.
    /// Positive offsets are to the left of the direction of travel.
    pub fn offset(&self, offset: f64) -> NetworkResult<Self> {
        let normals = self
            .points
            .iter()
            .tuple_windows()
            .map(|(a, b)| rot90((*b - *a).normalize()))
            .collect::<Vec<_>>();
        let points = self
            .points
            .iter()
            .enumerate()
            .map(|(idx, point)| {
                let before = normals[idx.saturating_sub(1)];
                let after = normals[idx.min(normals.len() - 1)];
                let normal = try_normalize(before + after).unwrap_or(after);
                // Keep the perpendicular distance to both sections at corners
                let scale = 1.0 / normal.dot(after).max(0.1);
                *point + normal * (offset * scale)
            })
            .collect();
        Self::new(points)
    }
}
