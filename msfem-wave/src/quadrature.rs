//! Gauss-Legendre quadrature on the reference interval and square.

/// A quadrature point on the reference square `[-1, 1]^2`.
#[derive(Debug, Clone, Copy)]
pub struct QuadraturePoint {
    pub coords: [f64; 2],
    pub weight: f64,
}

impl QuadraturePoint {
    pub fn xi(&self) -> f64 {
        self.coords[0]
    }

    pub fn eta(&self) -> f64 {
        self.coords[1]
    }
}

/// Gauss-Legendre points and weights on `[-1, 1]`.
///
/// Orders 1 through 5 are tabulated; anything higher falls back to order 5.
/// Order n integrates polynomials up to degree `2n - 1` exactly.
pub fn gauss_legendre_1d(order: usize) -> Vec<(f64, f64)> {
    match order {
        0 | 1 => vec![(0.0, 2.0)],
        2 => {
            let x = 1.0 / 3.0_f64.sqrt();
            vec![(-x, 1.0), (x, 1.0)]
        }
        3 => {
            let x = (3.0 / 5.0_f64).sqrt();
            vec![(-x, 5.0 / 9.0), (0.0, 8.0 / 9.0), (x, 5.0 / 9.0)]
        }
        4 => {
            let a = (3.0 / 7.0 - 2.0 / 7.0 * (6.0 / 5.0_f64).sqrt()).sqrt();
            let b = (3.0 / 7.0 + 2.0 / 7.0 * (6.0 / 5.0_f64).sqrt()).sqrt();
            let wa = (18.0 + 30.0_f64.sqrt()) / 36.0;
            let wb = (18.0 - 30.0_f64.sqrt()) / 36.0;
            vec![(-b, wb), (-a, wa), (a, wa), (b, wb)]
        }
        _ => {
            let a = 1.0 / 3.0 * (5.0 - 2.0 * (10.0 / 7.0_f64).sqrt()).sqrt();
            let b = 1.0 / 3.0 * (5.0 + 2.0 * (10.0 / 7.0_f64).sqrt()).sqrt();
            let wa = (322.0 + 13.0 * 70.0_f64.sqrt()) / 900.0;
            let wb = (322.0 - 13.0 * 70.0_f64.sqrt()) / 900.0;
            vec![(-b, wb), (-a, wa), (0.0, 128.0 / 225.0), (a, wa), (b, wb)]
        }
    }
}

/// Tensor-product rule on the reference square `[-1, 1]^2`.
pub fn gauss_quadrilateral(order: usize) -> Vec<QuadraturePoint> {
    let rule = gauss_legendre_1d(order);
    let mut points = Vec::with_capacity(rule.len() * rule.len());
    for &(eta, w_eta) in &rule {
        for &(xi, w_xi) in &rule {
            points.push(QuadraturePoint {
                coords: [xi, eta],
                weight: w_xi * w_eta,
            });
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_1d() {
        for order in 1..=5 {
            let total: f64 = gauss_legendre_1d(order).iter().map(|&(_, w)| w).sum();
            assert!(
                (total - 2.0).abs() < 1e-12,
                "order {} weights sum to {}",
                order,
                total
            );
        }
    }

    #[test]
    fn test_weights_sum_2d() {
        for order in 1..=5 {
            let total: f64 = gauss_quadrilateral(order).iter().map(|p| p.weight).sum();
            assert!((total - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_exactness_cubic() {
        // Order 2 integrates x^3 exactly (zero by symmetry) and x^2 exactly.
        let rule = gauss_legendre_1d(2);
        let cubic: f64 = rule.iter().map(|&(x, w)| w * x * x * x).sum();
        let quad: f64 = rule.iter().map(|&(x, w)| w * x * x).sum();
        assert!(cubic.abs() < 1e-14);
        assert!((quad - 2.0 / 3.0).abs() < 1e-14);
    }

    #[test]
    fn test_order_five_degree_nine() {
        let rule = gauss_legendre_1d(5);
        // int_{-1}^{1} x^8 dx = 2/9
        let val: f64 = rule.iter().map(|&(x, w)| w * x.powi(8)).sum();
        assert!((val - 2.0 / 9.0).abs() < 1e-12);
    }
}
