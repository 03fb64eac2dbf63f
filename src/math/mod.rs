pub mod polygon_2d;
pub mod quadrature;
pub mod root;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 3x3 matrix type.
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// Unit-length 3D vector.
pub type UnitVector3 = nalgebra::Unit<Vector3>;

/// Rigid placement of a body in the system frame.
pub type Isometry3 = nalgebra::Isometry3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Returns an orthonormal pair `(u, v)` spanning the plane perpendicular to `n`.
///
/// `(u, v, n)` is right-handed, so a counter-clockwise turn in `(u, v)`
/// is counter-clockwise when viewed from the tip of `n`.
#[must_use]
pub fn tangent_basis(n: &UnitVector3) -> (Vector3, Vector3) {
    let n = n.into_inner();
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = n.cross(&helper).normalize();
    let v = n.cross(&u);
    (u, v)
}

/// Removes the component of `v` along the unit normal `n`.
#[must_use]
pub fn project_on_plane(v: &Vector3, n: &UnitVector3) -> Vector3 {
    let n = n.into_inner();
    v - n * v.dot(&n)
}

/// Counter-clockwise angle from `a` to `b` about the unit normal `n`, in `[0, 2*pi)`.
#[must_use]
pub fn ccw_angle(a: &Vector3, b: &Vector3, n: &UnitVector3) -> f64 {
    let angle = n.into_inner().dot(&a.cross(b)).atan2(a.dot(b));
    if angle < 0.0 {
        angle + std::f64::consts::TAU
    } else {
        angle
    }
}
