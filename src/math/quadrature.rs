use std::f64::consts::PI;

/// Gauss-Legendre nodes and weights on `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    /// Abscissae in ascending order.
    pub nodes: Vec<f64>,
    /// Weights matching `nodes`.
    pub weights: Vec<f64>,
}

impl GaussLegendre {
    /// Computes an `n`-point rule by Newton iteration on the Legendre polynomial.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(n: usize) -> Self {
        let n = n.max(1);
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let nf = n as f64;

        for i in 0..n.div_ceil(2) {
            let mut x = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
            let mut derivative = 1.0;
            for _ in 0..100 {
                let (p, dp) = legendre(n, x);
                derivative = dp;
                let dx = p / dp;
                x -= dx;
                if dx.abs() < 1e-15 {
                    break;
                }
            }
            let (_, dp) = legendre(n, x);
            if dp.is_finite() {
                derivative = dp;
            }
            let w = 2.0 / ((1.0 - x * x) * derivative * derivative);
            nodes[i] = -x;
            nodes[n - 1 - i] = x;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }

        Self { nodes, weights }
    }
}

/// Evaluates `P_n(x)` and its derivative by the three-term recurrence.
#[allow(clippy::cast_precision_loss)]
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    if n == 0 {
        return (1.0, 0.0);
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn integrate(rule: &GaussLegendre, a: f64, b: f64, f: impl Fn(f64) -> f64) -> f64 {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        rule.nodes
            .iter()
            .zip(&rule.weights)
            .map(|(x, w)| w * f(mid + half * x))
            .sum::<f64>()
            * half
    }

    #[test]
    fn weights_sum_to_two() {
        for n in [1, 2, 5, 16, 33] {
            let rule = GaussLegendre::new(n);
            let sum: f64 = rule.weights.iter().sum();
            assert_relative_eq!(sum, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn exact_for_polynomials() {
        let rule = GaussLegendre::new(4);
        // Exact up to degree 7.
        let value = integrate(&rule, 0.0, 2.0, |x| x.powi(7) - 3.0 * x * x);
        assert_relative_eq!(value, 256.0 / 8.0 - 8.0, epsilon = 1e-10);
    }

    #[test]
    fn integrates_sine() {
        let rule = GaussLegendre::new(12);
        let value = integrate(&rule, 0.0, PI, f64::sin);
        assert_relative_eq!(value, 2.0, epsilon = 1e-12);
    }
}
