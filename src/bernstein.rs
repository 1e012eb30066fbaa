//! Conversion of polynomials to Bernstein form over the unit box.
//!
//! For a polynomial `p` of degree vector `(d₁, …, dₙ)` in the symbols
//! `α = (α₁, …, αₙ)`, the Bernstein coefficients on `[0,1]ⁿ` are
//!
//! ```text
//! b_I = Σ_{J ≤ I} ∏_k C(I_k, J_k) / C(d_k, J_k) · a_J
//! ```
//!
//! where `a_J` are the power-basis coefficients. The coefficients enclose the
//! polynomial: `min(b) ≤ p(α) ≤ max(b)` for every `α` in the unit box, which
//! is the bound the bundle transformation is built on. Coefficients of a
//! polynomial whose power-basis coefficients contain other free symbols stay
//! symbolic in those symbols.

use crate::symbolic::{Expression, Symbol};
use crate::Result;

/// Binomial coefficient as a double; the degrees involved are small.
fn binomial(n: u32, k: u32) -> f64 {
    let mut out = 1.;
    for i in 0..k.min(n - k) {
        out = out * (n - i) as f64 / (i + 1) as f64;
    }
    out
}

/// Iterate over all multi-indices `I` with `0 ≤ I_k ≤ degree_k`, in
/// lexicographic order.
fn multi_indices(degree: &[u32]) -> Vec<Vec<u32>> {
    let mut out = vec![vec![]];
    for d in degree {
        let mut next = Vec::with_capacity(out.len() * (*d as usize + 1));
        for prefix in &out {
            for i in 0..=*d {
                let mut idx = prefix.clone();
                idx.push(i);
                next.push(idx);
            }
        }
        out = next;
    }
    out
}

/// Compute the Bernstein coefficients of `p` over the unit box in the
/// `alpha` symbols.
///
/// The result is one expression per multi-index `(i₁, …, iₙ)` with
/// `0 ≤ i_k ≤ d_k`; each is free of `alpha` but may contain any other symbol
/// appearing in the coefficients of `p`.
///
/// # Errors
/// Fails when `p` is not polynomial in `alpha`.
///
/// # Examples
/// ```
/// # use pika::bernstein::bernstein_coefficients;
/// # use pika::symbolic::{Expression, Symbol};
/// let a = Symbol::new("a0");
/// let p = Expression::from(a).pow(2);
/// let coeffs = bernstein_coefficients(&[a], &p).unwrap();
/// let values: Vec<f64> = coeffs.iter().map(|c| c.evaluate().unwrap()).collect();
/// assert_eq!(values, vec![0., 0., 1.]);
/// ```
pub fn bernstein_coefficients(alpha: &[Symbol], p: &Expression) -> Result<Vec<Expression>> {
    let mons = p.monomials(alpha)?;
    if mons.is_empty() {
        // the zero polynomial
        return Ok(vec![Expression::constant(0.)]);
    }

    let n = alpha.len();
    let mut degree = vec![0u32; n];
    for exps in mons.keys() {
        for (d, e) in degree.iter_mut().zip(exps.iter()) {
            *d = (*d).max(*e);
        }
    }

    let mut coeffs = Vec::new();
    for index in multi_indices(&degree) {
        let mut sum = Expression::constant(0.);
        for (exps, a) in &mons {
            if exps.iter().zip(index.iter()).any(|(j, i)| j > i) {
                continue;
            }
            let mut weight = 1.;
            for k in 0..n {
                weight *= binomial(index[k], exps[k]) / binomial(degree[k], exps[k]);
            }
            sum = sum + weight * a;
        }
        coeffs.push(sum);
    }
    Ok(coeffs)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 0), 1.);
        assert_eq!(binomial(5, 2), 10.);
        assert_eq!(binomial(6, 3), 20.);
    }

    #[test]
    fn test_linear_coefficients_are_endpoints() {
        // For an affine polynomial the coefficients are the endpoint values.
        let a = Symbol::new("ba0");
        let p = &(3.0 * &Expression::from(a)) - &Expression::from(1.);
        let coeffs = bernstein_coefficients(&[a], &p).unwrap();
        let values: Vec<f64> = coeffs.iter().map(|c| c.evaluate().unwrap()).collect();
        assert_eq!(values, vec![-1., 2.]);
    }

    #[test]
    fn test_multilinear_coefficients_are_corners() {
        // Degree-(1,1) polynomials take their Bernstein coefficients at the
        // corners of the box.
        let a0 = Symbol::new("bb0");
        let a1 = Symbol::new("bb1");
        let x = Expression::from(a0);
        let y = Expression::from(a1);
        let p = &(&x * &y) - &(2.0 * &x);
        let coeffs = bernstein_coefficients(&[a0, a1], &p).unwrap();
        let values: Vec<f64> = coeffs.iter().map(|c| c.evaluate().unwrap()).collect();
        // order: (0,0), (0,1), (1,0), (1,1)
        assert_eq!(values, vec![0., 0., -2., -1.]);
    }

    #[test]
    fn test_enclosure() {
        let a0 = Symbol::new("bc0");
        let a1 = Symbol::new("bc1");
        let x = Expression::from(a0);
        let y = Expression::from(a1);
        // p = (x + y)^3 - x y
        let p = &(&x + &y).pow(3) - &(&x * &y);
        let coeffs = bernstein_coefficients(&[a0, a1], &p).unwrap();
        let values: Vec<f64> = coeffs.iter().map(|c| c.evaluate().unwrap()).collect();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut sub = std::collections::HashMap::new();
        for i in 0..=10 {
            for j in 0..=10 {
                sub.insert(a0, Expression::constant(i as f64 / 10.));
                sub.insert(a1, Expression::constant(j as f64 / 10.));
                let v = p.replace(&sub).evaluate().unwrap();
                assert!(lo - 1e-9 <= v && v <= hi + 1e-9);
            }
        }
    }

    #[test]
    fn test_symbolic_coefficients() {
        // q + 2 a over a: coefficients q and q + 2, still symbolic in q.
        let a = Symbol::new("bd0");
        let q = Symbol::new("bdq");
        let p = &Expression::from(q) + &(2.0 * &Expression::from(a));
        let coeffs = bernstein_coefficients(&[a], &p).unwrap();
        assert_eq!(coeffs.len(), 2);
        let mut sub = std::collections::HashMap::new();
        sub.insert(q, Expression::constant(5.));
        assert_eq!(coeffs[0].replace(&sub).evaluate().unwrap(), 5.);
        assert_eq!(coeffs[1].replace(&sub).evaluate().unwrap(), 7.);
    }

    #[test]
    fn test_constant_polynomial() {
        let a = Symbol::new("be0");
        let coeffs = bernstein_coefficients(&[a], &Expression::constant(4.)).unwrap();
        assert_eq!(coeffs.len(), 1);
        assert_eq!(coeffs[0].evaluate().unwrap(), 4.);
    }
}
