/// Maximum number of iterations for the bracketing solvers.
pub const MAX_ITERATIONS: usize = 200;

/// Finds a root of `f` in `[a, b]` using Brent's method.
///
/// Returns `None` when `f(a)` and `f(b)` do not bracket a root or the
/// iteration budget is exhausted.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub fn brent<F>(f: F, a: f64, b: f64, tolerance: f64) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = (a, b);
    let mut fa = f(a);
    let mut fb = f(b);
    if !fa.is_finite() || !fb.is_finite() {
        return None;
    }
    if fa == 0.0 {
        return Some(a);
    }
    if fb == 0.0 {
        return Some(b);
    }
    if fa.signum() == fb.signum() {
        return None;
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..MAX_ITERATIONS {
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * tolerance;
        let m = 0.5 * (c - b);
        if m.abs() <= tol || fb == 0.0 {
            return Some(b);
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            // Inverse quadratic interpolation, or secant when only two points are distinct.
            let s = fb / fa;
            let (mut p, mut q) = if (a - c).abs() < f64::EPSILON {
                (2.0 * m * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * m * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            if 2.0 * p < (3.0 * m * q - (tol * q).abs()).min((e * q).abs()) {
                e = d;
                d = p / q;
            } else {
                d = m;
                e = m;
            }
        } else {
            d = m;
            e = m;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(m) };
        fb = f(b);
        if !fb.is_finite() {
            return None;
        }
    }
    None
}

/// Walks outward from `start` in steps growing geometrically until `f`
/// changes sign, returning the bracketing interval.
///
/// The walk stops at `limit`. Returns `None` if no sign change is found.
#[must_use]
pub fn bracket_outward<F>(f: F, start: f64, step: f64, limit: f64) -> Option<(f64, f64)>
where
    F: Fn(f64) -> f64,
{
    let direction = (limit - start).signum();
    let mut lo = start;
    let mut f_lo = f(lo);
    let mut h = step.abs() * direction;
    for _ in 0..MAX_ITERATIONS {
        let mut hi = lo + h;
        if (hi - limit) * direction > 0.0 {
            hi = limit;
        }
        let f_hi = f(hi);
        if f_lo.is_finite() && f_hi.is_finite() && f_lo.signum() != f_hi.signum() {
            return Some((lo, hi));
        }
        if (hi - limit).abs() <= f64::EPSILON * limit.abs().max(1.0) {
            return None;
        }
        lo = hi;
        f_lo = f_hi;
        h *= 1.6;
    }
    None
}

/// Scans `[start, end]` in `steps` equal increments and returns the first
/// sub-interval over which `f` changes sign.
///
/// Unlike [`bracket_outward`] this never steps over a narrow region, so it
/// finds the nearest crossing rather than an arbitrary one.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scan_for_sign_change<F>(f: F, start: f64, end: f64, steps: usize) -> Option<(f64, f64)>
where
    F: Fn(f64) -> f64,
{
    let steps = steps.max(1);
    let h = (end - start) / steps as f64;
    let mut lo = start;
    let mut f_lo = f(lo);
    for i in 1..=steps {
        let hi = start + h * i as f64;
        let f_hi = f(hi);
        if f_lo.is_finite() && f_hi.is_finite() && f_lo.signum() != f_hi.signum() {
            return Some((lo, hi));
        }
        lo = hi;
        f_lo = f_hi;
    }
    None
}

/// Minimises a unimodal `f` on `[a, b]` by golden-section search.
///
/// Returns the abscissa of the minimum.
#[must_use]
pub fn golden_section_min<F>(f: F, a: f64, b: f64, tolerance: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let inv_phi = (5.0_f64.sqrt() - 1.0) * 0.5;
    let (mut a, mut b) = (a, b);
    let mut x1 = b - inv_phi * (b - a);
    let mut x2 = a + inv_phi * (b - a);
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    for _ in 0..MAX_ITERATIONS {
        if (b - a).abs() <= tolerance {
            break;
        }
        if f1 < f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = b - inv_phi * (b - a);
            f1 = f(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = a + inv_phi * (b - a);
            f2 = f(x2);
        }
    }
    0.5 * (a + b)
}
