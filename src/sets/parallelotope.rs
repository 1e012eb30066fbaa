//! Parallelotopes in generator form.

use nalgebra::{DMatrix, DVector};

use crate::linalg::Plu;
use crate::Result;

/// An n-dimensional parallelepiped `{q + Σᵢ αᵢ·ℓᵢ·Uᵢ | αᵢ ∈ [0,1]}` given by
/// a base vertex `q`, unit generator directions `U` (one per row) and
/// generator lengths `ℓ`.
///
/// The generator form is what the Bernstein bounding step consumes: the
/// generator coordinates `α` range over the unit box, so bounding a
/// polynomial in `α` bounds it over the parallelotope.
#[derive(Debug, Clone)]
pub struct Parallelotope {
    base_vertex: DVector<f64>,
    versors: DMatrix<f64>,
    lengths: DVector<f64>,
}

impl Parallelotope {
    /// Build the parallelotope `{x | lower ≤ Λ·x ≤ upper}` from a
    /// non-singular template matrix `Λ` and facet offsets.
    ///
    /// The base vertex solves `Λ·q = lower`; the i-th generator connects `q`
    /// to the vertex obtained by raising the i-th facet to its upper offset.
    /// Zero-length generators are allowed and denote degenerate (flat)
    /// parallelotopes.
    ///
    /// # Errors
    /// Returns [`Error::Singular`] when `Λ` cannot be inverted.
    ///
    /// [`Error::Singular`]: ../../enum.Error.html#variant.Singular
    ///
    /// # Examples
    /// ```
    /// # use nalgebra::{DMatrix, DVector};
    /// # use pika::sets::Parallelotope;
    /// // the unit square
    /// let lambda = DMatrix::identity(2, 2);
    /// let p = Parallelotope::from_template(
    ///     &lambda,
    ///     &DVector::from_vec(vec![0., 0.]),
    ///     &DVector::from_vec(vec![1., 1.]),
    /// ).unwrap();
    /// assert_eq!(p.base_vertex()[0], 0.);
    /// assert_eq!(p.lengths()[1], 1.);
    /// ```
    pub fn from_template(
        template: &DMatrix<f64>,
        lower: &DVector<f64>,
        upper: &DVector<f64>,
    ) -> Result<Parallelotope> {
        let dim = template.nrows();
        let plu = Plu::new(template.clone());
        let base_vertex = plu.solve(lower)?;

        let mut versors = DMatrix::zeros(dim, dim);
        let mut lengths = DVector::zeros(dim);
        for i in 0..dim {
            let mut bound = lower.clone();
            bound[i] = upper[i];
            let vertex = plu.solve(&bound)?;
            let generator = vertex - &base_vertex;
            let length = generator.norm();
            lengths[i] = length;
            if length != 0. {
                versors.row_mut(i).tr_copy_from(&(generator / length));
            }
        }
        Ok(Parallelotope {
            base_vertex,
            versors,
            lengths,
        })
    }

    /// The dimension of the ambient space.
    pub fn dim(&self) -> usize {
        self.base_vertex.nrows()
    }

    /// The base vertex `q`.
    pub fn base_vertex(&self) -> &DVector<f64> {
        &self.base_vertex
    }

    /// The unit generator directions, one per row.
    pub fn versors(&self) -> &DMatrix<f64> {
        &self.versors
    }

    /// The generator lengths.
    pub fn lengths(&self) -> &DVector<f64> {
        &self.lengths
    }

    /// The vertex reached from the base vertex along every generator.
    pub fn opposite_vertex(&self) -> DVector<f64> {
        let mut v = self.base_vertex.clone();
        for i in 0..self.dim() {
            v += self.lengths[i] * self.versors.row(i).transpose();
        }
        v
    }

}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_axis_aligned_box() {
        let lambda = DMatrix::identity(2, 2);
        let p = Parallelotope::from_template(
            &lambda,
            &DVector::from_vec(vec![1., -1.]),
            &DVector::from_vec(vec![3., 2.]),
        )
        .unwrap();
        assert_eq!(p.base_vertex(), &DVector::from_vec(vec![1., -1.]));
        assert_eq!(p.lengths(), &DVector::from_vec(vec![2., 3.]));
        assert_eq!(p.versors()[(0, 0)], 1.);
        assert_eq!(p.versors()[(0, 1)], 0.);
        assert_eq!(p.opposite_vertex(), DVector::from_vec(vec![3., 2.]));
    }

    #[test]
    fn test_sheared_template() {
        // facets x in [0, 1] and x + y in [0, 1]
        let lambda = DMatrix::from_row_slice(2, 2, &[1., 0., 1., 1.]);
        let p = Parallelotope::from_template(
            &lambda,
            &DVector::from_vec(vec![0., 0.]),
            &DVector::from_vec(vec![1., 1.]),
        )
        .unwrap();
        assert_eq!(p.base_vertex(), &DVector::from_vec(vec![0., 0.]));
        // the generator raising the x facet moves along (1, -1)
        let g0 = p.versors().row(0) * p.lengths()[0];
        assert!((g0[0] - 1.).abs() < 1e-12 && (g0[1] + 1.).abs() < 1e-12);
        // the generator raising the x + y facet moves along (0, 1)
        let g1 = p.versors().row(1) * p.lengths()[1];
        assert!(g1[0].abs() < 1e-12 && (g1[1] - 1.).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_generator() {
        let lambda = DMatrix::identity(2, 2);
        let p = Parallelotope::from_template(
            &lambda,
            &DVector::from_vec(vec![0., 1.]),
            &DVector::from_vec(vec![2., 1.]),
        )
        .unwrap();
        assert_eq!(p.lengths()[1], 0.);
    }

    #[test]
    fn test_singular_template() {
        let lambda = DMatrix::from_row_slice(2, 2, &[1., 0., 2., 0.]);
        let res = Parallelotope::from_template(
            &lambda,
            &DVector::from_vec(vec![0., 0.]),
            &DVector::from_vec(vec![1., 1.]),
        );
        assert!(res.is_err());
    }
}
