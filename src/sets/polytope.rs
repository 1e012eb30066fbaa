//! Polytopes in H-representation.

use nalgebra::{DMatrix, DVector};

use crate::lp::{LinearSystem, OptimizationResult, Status};
use crate::{Error, Result};

/// A convex polytope `{x | A·x ≤ b}`.
///
/// Rows are not required to be unique; [`simplify`] merges duplicates. A
/// polytope is empty exactly when the constraint system is infeasible.
///
/// [`simplify`]: ./struct.Polytope.html#method.simplify
#[derive(Debug, Clone)]
pub struct Polytope {
    system: LinearSystem,
}

impl Polytope {
    /// Create a polytope from a constraint matrix and offset vector.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] when the row counts disagree.
    ///
    /// # Examples
    /// ```
    /// # use nalgebra::{DMatrix, DVector};
    /// # use pika::sets::Polytope;
    /// let a = DMatrix::from_row_slice(2, 1, &[1., -1.]);
    /// let p = Polytope::new(a, DVector::from_vec(vec![1., 0.])).unwrap();
    /// assert!(!p.is_empty());
    /// ```
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<Polytope> {
        Ok(Polytope {
            system: LinearSystem::new(a, b)?,
        })
    }

    /// Create the axis-aligned box with the given per-dimension bounds.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] when the bound vectors have different
    /// lengths.
    pub fn from_box(lower: &[f64], upper: &[f64]) -> Result<Polytope> {
        if lower.len() != upper.len() {
            return Err(Error::InvalidInput(format!(
                "box has {} lower bounds but {} upper bounds",
                lower.len(),
                upper.len()
            )));
        }
        let n = lower.len();
        let mut a = DMatrix::zeros(2 * n, n);
        let mut b = DVector::zeros(2 * n);
        for i in 0..n {
            a[(2 * i, i)] = 1.;
            b[2 * i] = upper[i];
            a[(2 * i + 1, i)] = -1.;
            b[2 * i + 1] = -lower[i];
        }
        Polytope::new(a, b)
    }

    /// The dimension of the ambient space.
    pub fn dims(&self) -> usize {
        self.system.dims()
    }

    /// The number of constraint rows.
    pub fn num_rows(&self) -> usize {
        self.system.num_rows()
    }

    /// The constraint matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        self.system.matrix()
    }

    /// The offset vector.
    pub fn offsets(&self) -> &DVector<f64> {
        self.system.offsets()
    }

    /// Stack the constraints of another polytope onto this one, in place.
    /// No deduplication is performed.
    ///
    /// # Panics
    /// Panics if the dimensions differ.
    pub fn intersect_with(&mut self, other: &Polytope) {
        assert_eq!(self.dims(), other.dims(), "dimension mismatch");
        self.system.stack_rows(&other.system);
    }

    /// Whether the polytope contains no point.
    pub fn is_empty(&self) -> bool {
        !self.system.has_solutions(false)
    }

    /// Whether the polytope has an empty interior.
    pub fn is_interior_empty(&self) -> bool {
        !self.system.has_solutions(true)
    }

    /// Maximise a linear objective over the polytope.
    pub fn maximize(&self, obj: &DVector<f64>) -> OptimizationResult {
        self.system.maximize(obj)
    }

    /// Minimise a linear objective over the polytope.
    pub fn minimize(&self, obj: &DVector<f64>) -> OptimizationResult {
        self.system.minimize(obj)
    }

    /// Whether a point satisfies every constraint.
    pub fn contains_point(&self, x: &DVector<f64>) -> bool {
        let ax = self.matrix() * x;
        ax.iter().zip(self.offsets().iter()).all(|(v, b)| v <= b)
    }

    /// Whether every point of `other` satisfies this polytope's constraints,
    /// decided by maximising each constraint row over `other`.
    pub fn contains(&self, other: &Polytope) -> bool {
        if other.is_empty() {
            return true;
        }
        for (i, row) in self.matrix().row_iter().enumerate() {
            if !self.offsets()[i].is_finite() {
                continue;
            }
            let obj = DVector::from_iterator(self.dims(), row.iter().cloned());
            let res = other.maximize(&obj);
            match res.status() {
                Status::OptimumAvailable => {
                    if res.optimum() > self.offsets()[i] + 1e-9 {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }

    /// Remove redundant constraint rows in place: duplicates of a tighter
    /// row as well as rows already implied by combinations of the remaining
    /// constraints, detected by LP. Idempotent.
    pub fn simplify(&mut self) {
        self.system.remove_redundant_rows();
    }

    /// The per-dimension bounding interval of the polytope, computed by LP.
    /// Unbounded directions yield infinite bounds.
    ///
    /// # Errors
    /// Returns [`Error::Infeasible`] when the polytope is empty.
    pub fn bounding_box(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let n = self.dims();
        let mut lower = vec![0.; n];
        let mut upper = vec![0.; n];
        let mut obj = DVector::zeros(n);
        for i in 0..n {
            obj[i] = 1.;
            let up = self.maximize(&obj);
            let lo = self.minimize(&obj);
            obj[i] = 0.;
            if up.status() == Status::Infeasible || lo.status() == Status::Infeasible {
                return Err(Error::Infeasible);
            }
            upper[i] = up.optimum();
            lower[i] = lo.optimum();
        }
        Ok((lower, upper))
    }

    /// Split the polytope into at most `target` pieces whose union equals the
    /// original. Pieces are produced by bisecting the longest bounded axis
    /// recursively; every axis is bisected at most once per piece, so the
    /// number of pieces is also bounded by `2^dims`.
    ///
    /// # Examples
    /// ```
    /// # use pika::sets::Polytope;
    /// let p = Polytope::from_box(&[0., 0.], &[4., 1.]).unwrap();
    /// let parts = p.split(4);
    /// assert_eq!(parts.len(), 4);
    /// ```
    pub fn split(&self, target: usize) -> Vec<Polytope> {
        let mut pieces: Vec<(Polytope, Vec<bool>)> = vec![(self.clone(), vec![false; self.dims()])];
        while pieces.len() < target {
            // the piece and axis with the longest bounded, not yet split side
            let mut best: Option<(usize, usize, f64, f64, f64)> = None;
            for (pi, (piece, done)) in pieces.iter().enumerate() {
                let (lower, upper) = match piece.bounding_box() {
                    Ok(bounds) => bounds,
                    Err(_) => continue,
                };
                for axis in 0..piece.dims() {
                    if done[axis] || !lower[axis].is_finite() || !upper[axis].is_finite() {
                        continue;
                    }
                    let width = upper[axis] - lower[axis];
                    if best.map_or(true, |(_, _, _, _, w)| width > w) {
                        best = Some((pi, axis, lower[axis], upper[axis], width));
                    }
                }
            }
            let (pi, axis, lower, upper, _) = match best {
                Some(b) => b,
                None => break,
            };
            let (piece, mut done) = pieces.swap_remove(pi);
            done[axis] = true;
            let mid = (lower + upper) / 2.;
            let mut row = DMatrix::zeros(1, piece.dims());
            row[(0, axis)] = 1.;
            let below = Polytope::new(row.clone(), DVector::from_vec(vec![mid]))
                .expect("single-row system");
            let above = Polytope::new(-row, DVector::from_vec(vec![-mid]))
                .expect("single-row system");
            let mut left = piece.clone();
            left.intersect_with(&below);
            let mut right = piece;
            right.intersect_with(&above);
            pieces.push((left, done.clone()));
            pieces.push((right, done));
        }
        pieces.into_iter().map(|(p, _)| p).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_emptiness() {
        let p = Polytope::from_box(&[0.], &[1.]).unwrap();
        assert!(!p.is_empty());
        let q = Polytope::from_box(&[2.], &[1.]).unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_intersection() {
        let mut p = Polytope::from_box(&[0., 0.], &[2., 2.]).unwrap();
        let q = Polytope::from_box(&[1., 1.], &[3., 3.]).unwrap();
        p.intersect_with(&q);
        let (lower, upper) = p.bounding_box().unwrap();
        for i in 0..2 {
            assert!((lower[i] - 1.).abs() < 1e-9);
            assert!((upper[i] - 2.).abs() < 1e-9);
        }
        let disjoint = Polytope::from_box(&[5., 5.], &[6., 6.]).unwrap();
        p.intersect_with(&disjoint);
        assert!(p.is_empty());
    }

    #[test]
    fn test_containment() {
        let outer = Polytope::from_box(&[0., 0.], &[2., 2.]).unwrap();
        let inner = Polytope::from_box(&[0.5, 0.5], &[1.5, 1.5]).unwrap();
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains_point(&DVector::from_vec(vec![1., 1.])));
        assert!(!outer.contains_point(&DVector::from_vec(vec![3., 1.])));
    }

    #[test]
    fn test_simplify_idempotent() {
        let a = DMatrix::from_row_slice(4, 1, &[1., 1., -1., -1.]);
        let b = DVector::from_vec(vec![3., 1., 0., 2.]);
        let mut p = Polytope::new(a, b).unwrap();
        p.simplify();
        assert_eq!(p.num_rows(), 2);
        assert_eq!(p.offsets()[0], 1.);
        assert_eq!(p.offsets()[1], 0.);
        let rows = p.num_rows();
        p.simplify();
        assert_eq!(p.num_rows(), rows);
    }

    #[test]
    fn test_simplify_drops_implied_rows() {
        // the half-space x + y <= 10 is implied by the box corner
        let mut p = Polytope::from_box(&[0., 0.], &[2., 2.]).unwrap();
        let diag = Polytope::new(
            DMatrix::from_row_slice(1, 2, &[1., 1.]),
            DVector::from_vec(vec![10.]),
        )
        .unwrap();
        p.intersect_with(&diag);
        assert_eq!(p.num_rows(), 5);
        p.simplify();
        assert_eq!(p.num_rows(), 4);
        let (lower, upper) = p.bounding_box().unwrap();
        for i in 0..2 {
            assert!(lower[i].abs() < 1e-9);
            assert!((upper[i] - 2.).abs() < 1e-9);
        }
    }

    #[test]
    fn test_split_union() {
        let p = Polytope::from_box(&[0., 0.], &[4., 2.]).unwrap();
        let parts = p.split(4);
        assert_eq!(parts.len(), 4);
        // every sampled point of the box lies in some piece, and every piece
        // lies in the box
        for part in &parts {
            assert!(p.contains(part));
        }
        for i in 0..=8 {
            for j in 0..=4 {
                let x = DVector::from_vec(vec![i as f64 / 2., j as f64 / 2.]);
                assert!(parts.iter().any(|part| part.contains_point(&x)));
            }
        }
    }

    #[test]
    fn test_split_prefers_longest_axis() {
        let p = Polytope::from_box(&[0., 0.], &[4., 1.]).unwrap();
        let parts = p.split(2);
        assert_eq!(parts.len(), 2);
        for part in &parts {
            let (lower, upper) = part.bounding_box().unwrap();
            assert!(upper[0] - lower[0] <= 2. + 1e-9);
            assert!((upper[1] - lower[1] - 1.).abs() < 1e-9);
        }
    }
}
