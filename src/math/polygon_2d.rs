use super::{Point2, TOLERANCE};

/// Computes the signed area of a polygon (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Signed distance-like value of `p` relative to the directed line `a -> b`.
///
/// Positive when `p` lies to the left of the line.
#[must_use]
pub fn orient(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Clips a convex polygon against the half-plane to the left of `a -> b`
/// (Sutherland-Hodgman).
///
/// With `keep_left == false` the right half-plane is kept instead.
#[must_use]
pub fn clip_half_plane(polygon: &[Point2], a: &Point2, b: &Point2, keep_left: bool) -> Vec<Point2> {
    let n = polygon.len();
    let mut out = Vec::with_capacity(n + 2);
    if n == 0 {
        return out;
    }
    let sign = if keep_left { 1.0 } else { -1.0 };
    let scale = (b - a).norm().max(TOLERANCE);

    for i in 0..n {
        let p = &polygon[i];
        let q = &polygon[(i + 1) % n];
        let dp = sign * orient(a, b, p) / scale;
        let dq = sign * orient(a, b, q) / scale;
        let p_in = dp >= 0.0;
        let q_in = dq >= 0.0;
        if p_in {
            out.push(*p);
        }
        if p_in != q_in {
            let denom = dp - dq;
            if denom.abs() > f64::MIN_POSITIVE {
                let t = (dp / denom).clamp(0.0, 1.0);
                out.push(p + (q - p) * t);
            }
        }
    }
    out
}

/// Subtracts the convex counter-clockwise polygon `clipper` from the convex
/// polygon `subject`.
///
/// The result is a set of disjoint convex pieces whose union is
/// `subject \ clipper`: piece `k` is the part of `subject` inside the first
/// `k` clipper edges and outside edge `k`.
#[must_use]
pub fn convex_difference(subject: &[Point2], clipper: &[Point2]) -> Vec<Vec<Point2>> {
    let mut pieces = Vec::new();
    let mut inside = subject.to_vec();
    let m = clipper.len();
    for k in 0..m {
        if inside.len() < 3 {
            break;
        }
        let a = &clipper[k];
        let b = &clipper[(k + 1) % m];
        let outside = clip_half_plane(&inside, a, b, false);
        if outside.len() >= 3 && signed_area(&outside).abs() > 0.0 {
            pieces.push(outside);
        }
        inside = clip_half_plane(&inside, a, b, true);
    }
    pieces
}

/// Axis-aligned bounds `(min, max)` of a point set.
#[must_use]
pub fn bounds(points: &[Point2]) -> (Point2, Point2) {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

/// Returns `true` if two axis-aligned boxes overlap.
#[must_use]
pub fn bounds_overlap(a: &(Point2, Point2), b: &(Point2, Point2)) -> bool {
    a.0.x <= b.1.x && b.0.x <= a.1.x && a.0.y <= b.1.y && b.0.y <= a.1.y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn unit_square() -> Vec<Point2> {
        vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)]
    }

    #[test]
    fn signed_area_ccw_square() {
        assert!((signed_area(&unit_square()) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn signed_area_cw_square() {
        let mut pts = unit_square();
        pts.reverse();
        assert!((signed_area(&pts) + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn signed_area_degenerate() {
        assert!(signed_area(&[p(0.0, 0.0)]).abs() < TOLERANCE);
        assert!(signed_area(&[]).abs() < TOLERANCE);
    }

    #[test]
    fn clip_square_in_half() {
        let left = clip_half_plane(&unit_square(), &p(0.5, -1.0), &p(0.5, 2.0), true);
        assert!((signed_area(&left) - 0.5).abs() < TOLERANCE);
        let right = clip_half_plane(&unit_square(), &p(0.5, -1.0), &p(0.5, 2.0), false);
        assert!((signed_area(&right) - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn difference_with_disjoint_clipper_keeps_subject() {
        let clipper = vec![p(5.0, 5.0), p(6.0, 5.0), p(5.0, 6.0)];
        let pieces = convex_difference(&unit_square(), &clipper);
        let area: f64 = pieces.iter().map(|piece| signed_area(piece)).sum();
        assert!((area - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn difference_with_covering_clipper_is_empty() {
        let clipper = vec![p(-1.0, -1.0), p(3.0, -1.0), p(-1.0, 3.0)];
        let pieces = convex_difference(&unit_square(), &clipper);
        let area: f64 = pieces.iter().map(|piece| signed_area(piece)).sum();
        assert!(area.abs() < TOLERANCE);
    }

    #[test]
    fn difference_with_partial_overlap() {
        // Lower-left triangle of the square removed.
        let clipper = vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)];
        let pieces = convex_difference(&unit_square(), &clipper);
        let area: f64 = pieces.iter().map(|piece| signed_area(piece)).sum();
        assert!((area - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bounds_and_overlap() {
        let a = bounds(&unit_square());
        let b = bounds(&[p(0.5, 0.5), p(2.0, 2.0)]);
        let c = bounds(&[p(1.5, 1.5), p(2.0, 2.0)]);
        assert!(bounds_overlap(&a, &b));
        assert!(!bounds_overlap(&a, &c));
    }
}
