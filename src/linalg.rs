//! Dense numeric primitives shared by the set representations.
//!
//! Matrices and vectors come from [`nalgebra`]; this module adapts the pieces
//! the geometric layer relies on to the crate's error model and adds the
//! small angular helpers used when scoring bundle templates. Norms are taken
//! directly from `nalgebra` (`Matrix::norm`).

use nalgebra::{DMatrix, DVector, Dyn, RowDVector};

use crate::{Error, Result};

/// Tolerance used when estimating the rank of a matrix.
const RANK_EPS: f64 = 1e-9;

/// A PLU factorisation of a square matrix, used to solve `M·x = b` for the
/// several right-hand sides needed when extracting parallelotope generators.
pub struct Plu {
    lu: nalgebra::linalg::LU<f64, Dyn, Dyn>,
}

impl Plu {
    /// Factorise a square matrix.
    ///
    /// # Examples
    /// ```
    /// # use nalgebra::{DMatrix, DVector};
    /// # use pika::linalg::Plu;
    /// let m = DMatrix::from_row_slice(2, 2, &[2., 0., 0., 4.]);
    /// let x = Plu::new(m).solve(&DVector::from_vec(vec![2., 8.])).unwrap();
    /// assert_eq!(x, DVector::from_vec(vec![1., 2.]));
    /// ```
    pub fn new(m: DMatrix<f64>) -> Plu {
        Plu {
            lu: nalgebra::linalg::LU::new(m),
        }
    }

    /// Solve `M·x = b` for `x`.
    ///
    /// # Errors
    /// Returns [`Error::Singular`] when the factorisation met a zero pivot.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        self.lu.solve(b).ok_or(Error::Singular)
    }
}

/// Numerical rank of a matrix.
///
/// Used to validate that the direction block selected by a bundle template is
/// non-singular.
///
/// # Examples
/// ```
/// # use nalgebra::DMatrix;
/// # use pika::linalg::rank;
/// let m = DMatrix::from_row_slice(2, 2, &[1., 0., 2., 0.]);
/// assert_eq!(rank(&m), 1);
/// ```
pub fn rank(m: &DMatrix<f64>) -> usize {
    m.rank(RANK_EPS)
}

/// The angle between two vectors, in `[0, π]`.
pub fn angle(v: &RowDVector<f64>, w: &RowDVector<f64>) -> f64 {
    let cos = v.dot(w) / (v.norm() * w.norm());
    cos.clamp(-1.0, 1.0).acos()
}

/// Orthogonal proximity of two vectors: how close their angle is to π/2.
/// Zero means the vectors are orthogonal.
pub fn orth_proximity(v: &RowDVector<f64>, w: &RowDVector<f64>) -> f64 {
    (angle(v, w) - std::f64::consts::FRAC_PI_2).abs()
}
