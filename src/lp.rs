//! A linear-programming client for systems of the form `A·x ≤ b`.
//!
//! [`LinearSystem`] wraps the constraint matrix and offers status-coded
//! maximisation and minimisation of linear objectives, feasibility tests and
//! a syntactic simplification that merges duplicate constraint rows. The
//! actual solving is delegated to [`minilp`].

use minilp::{ComparisonOp, OptimizationDirection, Problem};
use nalgebra::{DMatrix, DVector};
use replace_with::replace_with_or_abort;

use crate::{Error, Result};

/// Outcome status of an optimisation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A finite optimum was found.
    OptimumAvailable,
    /// The objective is unbounded over the feasible region.
    Unbounded,
    /// The system has no feasible point.
    Infeasible,
    /// The solver failed for another reason.
    Other,
}

/// The result of optimising a linear objective over a linear system.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    status: Status,
    optimum: f64,
    vertex: Option<DVector<f64>>,
}

impl OptimizationResult {
    /// The outcome status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The optimal objective value. This is `±∞` when the problem is
    /// unbounded in the direction of optimisation and NaN when no feasible
    /// point exists.
    pub fn optimum(&self) -> f64 {
        self.optimum
    }

    /// A feasible point attaining the optimum, when one is available.
    pub fn vertex(&self) -> Option<&DVector<f64>> {
        self.vertex.as_ref()
    }
}

/// A system of linear inequalities `A·x ≤ b`.
///
/// Rows whose offset is not finite are vacuous and are skipped when the
/// solver problem is assembled.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl LinearSystem {
    /// Create a system from a constraint matrix and offset vector.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] when `a` and `b` disagree on the
    /// number of rows.
    ///
    /// # Examples
    /// ```
    /// # use nalgebra::{DMatrix, DVector};
    /// # use pika::lp::LinearSystem;
    /// let a = DMatrix::from_row_slice(2, 1, &[1., -1.]);
    /// let ls = LinearSystem::new(a.clone(), DVector::from_vec(vec![1., 0.])).unwrap();
    /// assert_eq!(ls.dims(), 1);
    /// assert!(LinearSystem::new(a, DVector::from_vec(vec![1.])).is_err());
    /// ```
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<LinearSystem> {
        if a.nrows() != b.nrows() {
            return Err(Error::InvalidInput(format!(
                "linear system has {} constraint rows but {} offsets",
                a.nrows(),
                b.nrows()
            )));
        }
        Ok(LinearSystem { a, b })
    }

    /// The number of variables constrained by the system.
    pub fn dims(&self) -> usize {
        self.a.ncols()
    }

    /// The number of constraint rows.
    pub fn num_rows(&self) -> usize {
        self.a.nrows()
    }

    /// The constraint matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// The offset vector.
    pub fn offsets(&self) -> &DVector<f64> {
        &self.b
    }

    /// Append the rows of another system with the same dimension.
    pub(crate) fn stack_rows(&mut self, other: &LinearSystem) {
        let n = self.a.nrows();
        replace_with_or_abort(&mut self.a, |a| {
            let mut a = a.insert_rows(n, other.a.nrows(), 0.);
            for (i, row) in other.a.row_iter().enumerate() {
                a.row_mut(n + i).copy_from(&row);
            }
            a
        });
        replace_with_or_abort(&mut self.b, |b| {
            let mut b = b.insert_rows(n, other.b.nrows(), 0.);
            for (i, v) in other.b.iter().enumerate() {
                b[n + i] = *v;
            }
            b
        });
    }

    /// Optimise a linear objective over the system.
    ///
    /// # Panics
    /// Panics if the objective length differs from [`dims`].
    ///
    /// [`dims`]: ./struct.LinearSystem.html#method.dims
    pub fn optimize(&self, obj: &DVector<f64>, maximize: bool) -> OptimizationResult {
        assert_eq!(obj.nrows(), self.dims(), "objective dimension mismatch");

        let finite_rows = self.b.iter().filter(|v| v.is_finite()).count();
        if finite_rows == 0 {
            // An unconstrained problem has optimum zero only for the zero
            // objective.
            return if obj.iter().all(|c| *c == 0.) {
                OptimizationResult {
                    status: Status::OptimumAvailable,
                    optimum: 0.,
                    vertex: Some(DVector::zeros(self.dims())),
                }
            } else {
                OptimizationResult {
                    status: Status::Unbounded,
                    optimum: if maximize {
                        f64::INFINITY
                    } else {
                        f64::NEG_INFINITY
                    },
                    vertex: None,
                }
            };
        }

        let mut prob = Problem::new(if maximize {
            OptimizationDirection::Maximize
        } else {
            OptimizationDirection::Minimize
        });
        let mut vars = Vec::with_capacity(self.dims());
        for c in obj.iter() {
            vars.push(prob.add_var(*c, (f64::NEG_INFINITY, f64::INFINITY)));
        }
        for (i, row) in self.a.row_iter().enumerate() {
            if !self.b[i].is_finite() {
                continue;
            }
            prob.add_constraint(
                vars.iter().cloned().zip(row.iter().cloned()),
                ComparisonOp::Le,
                self.b[i],
            );
        }
        match prob.solve() {
            Ok(sol) => OptimizationResult {
                status: Status::OptimumAvailable,
                optimum: sol.objective(),
                vertex: Some(DVector::from_iterator(
                    self.dims(),
                    vars.iter().map(|v| sol[*v]),
                )),
            },
            Err(minilp::Error::Infeasible) => OptimizationResult {
                status: Status::Infeasible,
                optimum: f64::NAN,
                vertex: None,
            },
            Err(minilp::Error::Unbounded) => OptimizationResult {
                status: Status::Unbounded,
                optimum: if maximize {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                },
                vertex: None,
            },
        }
    }

    /// Maximise a linear objective over the system.
    ///
    /// # Examples
    /// ```
    /// # use nalgebra::{DMatrix, DVector};
    /// # use pika::lp::{LinearSystem, Status};
    /// let a = DMatrix::from_row_slice(2, 1, &[1., -1.]);
    /// let ls = LinearSystem::new(a, DVector::from_vec(vec![2., 0.])).unwrap();
    /// let res = ls.maximize(&DVector::from_vec(vec![3.]));
    /// assert_eq!(res.status(), Status::OptimumAvailable);
    /// assert_eq!(res.optimum(), 6.);
    /// ```
    pub fn maximize(&self, obj: &DVector<f64>) -> OptimizationResult {
        self.optimize(obj, true)
    }

    /// Minimise a linear objective over the system.
    pub fn minimize(&self, obj: &DVector<f64>) -> OptimizationResult {
        self.optimize(obj, false)
    }

    /// Test whether the system has any solution. With `strict` the test is
    /// for a non-empty interior, checked by maximising a slack variable added
    /// to every constraint.
    pub fn has_solutions(&self, strict: bool) -> bool {
        if !strict {
            let res = self.maximize(&DVector::zeros(self.dims()));
            return matches!(res.status(), Status::OptimumAvailable | Status::Unbounded);
        }

        let mut prob = Problem::new(OptimizationDirection::Maximize);
        let mut vars = Vec::with_capacity(self.dims());
        for _ in 0..self.dims() {
            vars.push(prob.add_var(0., (f64::NEG_INFINITY, f64::INFINITY)));
        }
        let slack = prob.add_var(1., (0., f64::INFINITY));
        for (i, row) in self.a.row_iter().enumerate() {
            if !self.b[i].is_finite() {
                continue;
            }
            prob.add_constraint(
                vars.iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .chain(std::iter::once((slack, 1.))),
                ComparisonOp::Le,
                self.b[i],
            );
        }
        match prob.solve() {
            Ok(sol) => sol.objective() > 0.,
            // an unbounded slack certainly leaves room for an interior point
            Err(minilp::Error::Unbounded) => true,
            Err(minilp::Error::Infeasible) => false,
        }
    }

    /// An equivalent system with every redundant constraint row removed. A
    /// row is redundant when maximising its normal subject to the remaining
    /// rows already meets its offset, so duplicates of a tighter row and rows
    /// implied by combinations of other constraints are dropped alike.
    /// Idempotent.
    pub fn get_simplified(&self) -> LinearSystem {
        let mut out = self.clone();
        out.remove_redundant_rows();
        out
    }

    /// Remove redundant rows in place, one at a time: each elimination
    /// re-solves against the rows that are left, so one copy of a duplicate
    /// pair always survives. Rows with a non-finite offset are vacuous and
    /// are dropped outright.
    pub(crate) fn remove_redundant_rows(&mut self) {
        // a duplicate row optimises to exactly its own offset
        const REDUNDANCY_EPS: f64 = 1e-9;
        loop {
            let mut eliminated = None;
            for i in 0..self.a.nrows() {
                if !self.b[i].is_finite() {
                    eliminated = Some(i);
                    break;
                }
                let mut prob = Problem::new(OptimizationDirection::Maximize);
                let mut vars = Vec::with_capacity(self.dims());
                for c in self.a.row(i).iter() {
                    vars.push(prob.add_var(*c, (f64::NEG_INFINITY, f64::INFINITY)));
                }
                let mut others = 0;
                for (j, row) in self.a.row_iter().enumerate() {
                    if j == i || !self.b[j].is_finite() {
                        continue;
                    }
                    prob.add_constraint(
                        vars.iter().cloned().zip(row.iter().cloned()),
                        ComparisonOp::Le,
                        self.b[j],
                    );
                    others += 1;
                }
                if others == 0 {
                    continue;
                }
                match prob.solve() {
                    Ok(sol) if sol.objective() <= self.b[i] + REDUNDANCY_EPS => {
                        eliminated = Some(i);
                        break;
                    }
                    _ => {}
                }
            }
            match eliminated {
                Some(i) => {
                    replace_with_or_abort(&mut self.a, |a| a.remove_row(i));
                    replace_with_or_abort(&mut self.b, |b| b.remove_row(i));
                }
                None => break,
            }
        }
    }
}
