use super::Vector2d;
use cgmath::prelude::*;

/// Rotates a vector 90 degrees anti-clockwise, pointing it to the left of its direction.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Gets the unit vector in the direction of `v`, or `None` if `v` has no length.
pub fn try_normalize(v: Vector2d) -> Option<Vector2d> {
    let mag = v.magnitude();
    (mag > f64::EPSILON).then(|| v / mag)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rot90_points_left() {
        let left = rot90(Vector2d::new(1.0, 0.0));
        assert_eq!(left, Vector2d::new(0.0, 1.0));
    }

    #[test]
    fn normalize_zero_vector() {
        assert_eq!(try_normalize(Vector2d::new(0.0, 0.0)), None);
        assert_eq!(try_normalize(Vector2d::new(0.0, 3.0)), Some(Vector2d::new(0.0, 1.0)));
    }
}
