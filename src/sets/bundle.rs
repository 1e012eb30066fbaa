//! Bundles of parallelotopes sharing a direction matrix.
//!
//! A bundle denotes the intersection of the polytopes induced by the rows of
//! its direction matrix with their offset pairs; equivalently, the
//! intersection of the parallelotopes named by its template rows. The
//! one-step image computation lives here: for every template the update map
//! is composed with the parallelotope's generator functions and the result is
//! bounded through its Bernstein coefficients, direction by direction.

use std::collections::HashMap;
use std::sync::Mutex;

use nalgebra::{DMatrix, DVector, RowDVector};
use rand::Rng;

use crate::bernstein::bernstein_coefficients;
use crate::linalg::{orth_proximity, rank};
use crate::lp::Status;
use crate::sets::{Parallelotope, Polytope};
use crate::symbolic::{Expression, Symbol};
use crate::{Error, Result};

/// Default fraction of the maximal magnitude targeted by [`Bundle::split`].
pub const SPLIT_MAGNITUDE_RATIO: f64 = 0.75;

/// How the image of a bundle is over-approximated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// All-For-One: every direction is bounded over every template.
    Afo,
    /// One-For-One: each direction is bounded only over the templates that
    /// contain it; the result is canonicalised afterwards.
    Ofo,
}

/// A capability for reducing a list of Bernstein coefficients to an upper
/// bound and a lower-bound complement.
pub trait MaxCoeffFinder: Sync {
    /// Evaluate the upper bound contributed by one coefficient.
    fn coeff_eval_p(&self, coeff: &Expression) -> Result<f64>;

    /// Evaluate the lower-bound complement contributed by one coefficient.
    fn coeff_eval_m(&self, coeff: &Expression) -> Result<f64>;

    /// The maxima of both evaluations across all coefficients.
    fn find_max_coeffs(&self, coeffs: &[Expression]) -> Result<(f64, f64)> {
        let mut max_p = f64::NEG_INFINITY;
        let mut max_m = f64::NEG_INFINITY;
        for coeff in coeffs {
            max_p = max_p.max(self.coeff_eval_p(coeff)?);
            max_m = max_m.max(self.coeff_eval_m(coeff)?);
        }
        Ok((max_p, max_m))
    }
}

/// The plain finder: coefficients are numeric once the base vertex and
/// lengths have been substituted, so they are simply evaluated.
pub struct NumericMaxCoeffFinder;

impl MaxCoeffFinder for NumericMaxCoeffFinder {
    fn coeff_eval_p(&self, coeff: &Expression) -> Result<f64> {
        coeff.evaluate()
    }

    fn coeff_eval_m(&self, coeff: &Expression) -> Result<f64> {
        let value = coeff.evaluate()?;
        // normalise -0 to +0
        Ok(if value == 0. { 0. } else { -value })
    }
}

/// The parametric finder: coefficients are polynomials in the parameter
/// symbols and are maximised over the parameter polytope.
pub struct ParametricMaxCoeffFinder<'a> {
    params: &'a [Symbol],
    para_set: &'a Polytope,
}

impl<'a> ParametricMaxCoeffFinder<'a> {
    /// Create a finder maximising over `para_set`, whose coordinates are the
    /// `params` symbols in order.
    pub fn new(params: &'a [Symbol], para_set: &'a Polytope) -> ParametricMaxCoeffFinder<'a> {
        ParametricMaxCoeffFinder { params, para_set }
    }

    fn maximize(&self, coeff: &Expression) -> Result<f64> {
        if let Some((coeffs, cst)) = coeff.linear_form(self.params)? {
            let res = self.para_set.maximize(&DVector::from_vec(coeffs));
            return match res.status() {
                Status::OptimumAvailable => Ok(res.optimum() + cst),
                // an unbounded maximisation leaves the direction unconstrained
                Status::Unbounded => Ok(f64::INFINITY),
                Status::Infeasible => Err(Error::Infeasible),
                Status::Other => Err(Error::Unsupported(
                    "linear solver failed on the parameter set".to_string(),
                )),
            };
        }

        // Not linear in the parameters: linearise the coefficient through its
        // own Bernstein expansion over the parameter bounding box, which
        // contains the parameter polytope.
        let (lower, upper) = self.para_set.bounding_box()?;
        if lower.iter().chain(upper.iter()).any(|v| !v.is_finite()) {
            return Ok(f64::INFINITY);
        }
        let beta: Vec<Symbol> = self.params.iter().map(|_| Symbol::fresh("b")).collect();
        let mut sub = HashMap::new();
        for (i, (p, b)) in self.params.iter().zip(beta.iter()).enumerate() {
            let range = Expression::constant(upper[i] - lower[i]);
            sub.insert(
                *p,
                Expression::constant(lower[i]) + range * Expression::from(*b),
            );
        }
        let boxed = coeff.replace(&sub);
        let coeffs = bernstein_coefficients(&beta, &boxed)?;
        let mut best = f64::NEG_INFINITY;
        for c in &coeffs {
            best = best.max(c.evaluate()?);
        }
        Ok(best)
    }
}

impl MaxCoeffFinder for ParametricMaxCoeffFinder<'_> {
    fn coeff_eval_p(&self, coeff: &Expression) -> Result<f64> {
        self.maximize(coeff)
    }

    fn coeff_eval_m(&self, coeff: &Expression) -> Result<f64> {
        self.maximize(&-coeff)
    }
}

/// An intersection of parallelotopes sharing a direction matrix.
///
/// Row `i` of the direction matrix encodes the half-space pair
/// `D[i]·x ≤ offp[i]` and `-D[i]·x ≤ offm[i]`; each template row selects the
/// directions forming one parallelotope. Assumption constraints attached to
/// the bundle are extra half-spaces applied whenever the bundle is viewed as
/// a polytope.
#[derive(Debug, Clone)]
pub struct Bundle {
    directions: DMatrix<f64>,
    offp: DVector<f64>,
    offm: DVector<f64>,
    templates: Vec<Vec<usize>>,
    // per-pair orthogonal proximity |angle(D_i, D_j) - pi/2|
    theta: DMatrix<f64>,
    constraints: Option<Polytope>,
}

impl Bundle {
    /// Create a bundle from a direction matrix, offset pairs and a template
    /// set.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] when the direction matrix is empty,
    /// the offsets disagree with it on length, the template set is empty, a
    /// template entry is out of range or a selected direction block is
    /// singular.
    ///
    /// # Examples
    /// ```
    /// # use nalgebra::{DMatrix, DVector};
    /// # use pika::sets::Bundle;
    /// // the unit square as a single-template bundle
    /// let b = Bundle::new(
    ///     DMatrix::identity(2, 2),
    ///     DVector::from_vec(vec![1., 1.]),
    ///     DVector::from_vec(vec![0., 0.]),
    ///     vec![vec![0, 1]],
    /// ).unwrap();
    /// assert_eq!(b.dim(), 2);
    /// assert_eq!(b.num_templates(), 1);
    /// ```
    pub fn new(
        directions: DMatrix<f64>,
        offp: DVector<f64>,
        offm: DVector<f64>,
        templates: Vec<Vec<usize>>,
    ) -> Result<Bundle> {
        if directions.nrows() == 0 {
            return Err(Error::InvalidInput(
                "bundle direction matrix must be non-empty".to_string(),
            ));
        }
        let m = directions.nrows();
        let n = directions.ncols();
        if offp.nrows() != m || offm.nrows() != m {
            return Err(Error::InvalidInput(format!(
                "bundle has {} directions but {} upper and {} lower offsets",
                m,
                offp.nrows(),
                offm.nrows()
            )));
        }
        if templates.is_empty() {
            return Err(Error::InvalidInput(
                "bundle template set must be non-empty".to_string(),
            ));
        }
        for row in &templates {
            if row.len() != n {
                return Err(Error::InvalidInput(format!(
                    "template row {:?} has {} entries, expected {}",
                    row,
                    row.len(),
                    n
                )));
            }
            if let Some(idx) = row.iter().find(|idx| **idx >= m) {
                return Err(Error::InvalidInput(format!(
                    "template row {:?} names direction {} but only {} exist",
                    row, idx, m
                )));
            }
            let block = direction_block(&directions, row);
            if rank(&block) < n {
                return Err(Error::InvalidInput(format!(
                    "template row {:?} selects a singular direction block",
                    row
                )));
            }
        }

        let mut theta = DMatrix::zeros(m, m);
        for i in 0..m {
            let vi: RowDVector<f64> = directions.row(i).clone_owned();
            for j in (i + 1)..m {
                let vj: RowDVector<f64> = directions.row(j).clone_owned();
                let prox = orth_proximity(&vi, &vj);
                theta[(i, j)] = prox;
                theta[(j, i)] = prox;
            }
        }

        Ok(Bundle {
            directions,
            offp,
            offm,
            templates,
            theta,
            constraints: None,
        })
    }

    /// The dimension of the ambient space.
    pub fn dim(&self) -> usize {
        self.directions.ncols()
    }

    /// The number of directions.
    pub fn size(&self) -> usize {
        self.directions.nrows()
    }

    /// The number of templates.
    pub fn num_templates(&self) -> usize {
        self.templates.len()
    }

    /// The direction matrix.
    pub fn directions(&self) -> &DMatrix<f64> {
        &self.directions
    }

    /// The template rows.
    pub fn templates(&self) -> &[Vec<usize>] {
        &self.templates
    }

    /// The upper offset of direction `i`.
    pub fn offp(&self, i: usize) -> f64 {
        self.offp[i]
    }

    /// The lower-complement offset of direction `i`.
    pub fn offm(&self, i: usize) -> f64 {
        self.offm[i]
    }

    /// The polytope `{x | D·x ≤ offp, -D·x ≤ offm}`, including any attached
    /// assumption constraints.
    pub fn as_polytope(&self) -> Polytope {
        let m = self.size();
        let n = self.dim();
        let mut a = DMatrix::zeros(2 * m, n);
        let mut b = DVector::zeros(2 * m);
        for i in 0..m {
            for j in 0..n {
                a[(i, j)] = self.directions[(i, j)];
                a[(m + i, j)] = -self.directions[(i, j)];
            }
            b[i] = self.offp[i];
            b[m + i] = self.offm[i];
        }
        let mut poly = Polytope::new(a, b).expect("row counts match by construction");
        if let Some(extra) = &self.constraints {
            poly.intersect_with(extra);
        }
        poly
    }

    /// Whether the bundle contains no point.
    pub fn is_empty(&self) -> bool {
        self.as_polytope().is_empty()
    }

    /// The parallelotope named by template row `i`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for an out-of-range index and
    /// [`Error::Singular`] if the direction block cannot be inverted.
    pub fn parallelotope(&self, i: usize) -> Result<Parallelotope> {
        let row = self.templates.get(i).ok_or_else(|| {
            Error::InvalidInput(format!(
                "template index {} out of range, bundle has {}",
                i,
                self.templates.len()
            ))
        })?;
        let lambda = direction_block(&self.directions, row);
        let lower = DVector::from_iterator(row.len(), row.iter().map(|idx| -self.offm[*idx]));
        let upper = DVector::from_iterator(row.len(), row.iter().map(|idx| self.offp[*idx]));
        Parallelotope::from_template(&lambda, &lower, &upper)
    }

    /// A bundle over the same point set whose offsets are the tightest
    /// possible for its direction matrix, computed by LP.
    ///
    /// # Errors
    /// Returns [`Error::Infeasible`] when the bundle is empty.
    pub fn canonical(&self) -> Result<Bundle> {
        let poly = self.as_polytope();
        let mut offp = self.offp.clone();
        let mut offm = self.offm.clone();
        for i in 0..self.size() {
            let dir: DVector<f64> = self.directions.row(i).transpose();
            offp[i] = canonical_offset(&poly, &dir)?;
            offm[i] = canonical_offset(&poly, &(-dir))?;
        }
        Ok(Bundle {
            directions: self.directions.clone(),
            offp,
            offm,
            templates: self.templates.clone(),
            theta: self.theta.clone(),
            constraints: self.constraints.clone(),
        })
    }

    /// The per-direction offset span `(offp_i + offm_i) / ‖D_i‖`.
    pub fn offset_distances(&self) -> Vec<f64> {
        (0..self.size())
            .map(|i| (self.offp[i] + self.offm[i]) / self.directions.row(i).norm())
            .collect()
    }

    /// Split the bundle into pieces whose per-direction span is at most
    /// [`SPLIT_MAGNITUDE_RATIO`] times `max_magnitude`, scaled by the
    /// direction norm. The union of the pieces is the original bundle.
    pub fn split(&self, max_magnitude: f64) -> Vec<Bundle> {
        self.split_with_ratio(max_magnitude, SPLIT_MAGNITUDE_RATIO)
    }

    /// Split with an explicit ratio. The widest direction whose span exceeds
    /// `ratio·max_magnitude` is bisected, repeatedly; ties pick the smallest
    /// direction index.
    pub fn split_with_ratio(&self, max_magnitude: f64, ratio: f64) -> Vec<Bundle> {
        let threshold = ratio * max_magnitude;
        if !(threshold > 0.) {
            return vec![self.clone()];
        }
        let norms: Vec<f64> = (0..self.size())
            .map(|i| self.directions.row(i).norm())
            .collect();
        let mut todo = vec![self.clone()];
        let mut done = Vec::new();
        while let Some(bundle) = todo.pop() {
            let mut pick: Option<(usize, f64)> = None;
            for i in 0..bundle.size() {
                let span = (bundle.offp[i] + bundle.offm[i]) / norms[i];
                if span > threshold && pick.map_or(true, |(_, s)| span > s) {
                    pick = Some((i, span));
                }
            }
            match pick {
                None => done.push(bundle),
                Some((i, _)) => {
                    let mid = (bundle.offp[i] - bundle.offm[i]) / 2.;
                    let mut left = bundle.clone();
                    left.offp[i] = mid;
                    let mut right = bundle;
                    right.offm[i] = -mid;
                    todo.push(left);
                    todo.push(right);
                }
            }
        }
        done
    }

    /// Search for a template set of the same cardinality minimising
    /// `weight·maxOffsetDist + (1-weight)·maxOrthProx` by random entry swaps.
    /// Swaps creating a permutation-duplicate row or a singular direction
    /// block are rejected. The best template set seen over `max_iters` trials
    /// is kept; with a seeded generator the result is reproducible.
    pub fn decompose<R: Rng>(&self, weight: f64, max_iters: u32, rng: &mut R) -> Bundle {
        let dists = self.offset_distances();
        let mut cur = self.templates.clone();
        let mut best = self.templates.clone();
        for _ in 0..max_iters {
            let mut tmp = cur.clone();
            let i1 = rng.gen_range(0..tmp.len());
            let j1 = rng.gen_range(0..self.dim());
            tmp[i1][j1] = rng.gen_range(0..self.size());

            if is_permutation_of_other_rows(&tmp, i1) {
                continue;
            }
            let block = direction_block(&self.directions, &tmp[i1]);
            if rank(&block) < self.dim() {
                continue;
            }

            let w_tmp = weight * self.max_offset_dist(&tmp, &dists)
                + (1. - weight) * self.max_orth_prox(&tmp);
            let w_best = weight * self.max_offset_dist(&best, &dists)
                + (1. - weight) * self.max_orth_prox(&best);
            if w_tmp < w_best {
                best = tmp.clone();
            }
            cur = tmp;
        }
        Bundle {
            directions: self.directions.clone(),
            offp: self.offp.clone(),
            offm: self.offm.clone(),
            templates: best,
            theta: self.theta.clone(),
            constraints: self.constraints.clone(),
        }
    }

    // offset-distance accumulation of a template set: the maximum over rows
    // of the product of the member distances
    fn max_offset_dist(&self, templates: &[Vec<usize>], dists: &[f64]) -> f64 {
        let mut max = f64::NEG_INFINITY;
        for row in templates {
            let dist: f64 = row.iter().map(|idx| dists[*idx]).product();
            max = max.max(dist);
        }
        max
    }

    // maximum cached orthogonal proximity within any row of a template set
    fn max_orth_prox(&self, templates: &[Vec<usize>]) -> f64 {
        let mut max = f64::NEG_INFINITY;
        for row in templates {
            let mut prox: f64 = 0.;
            for (k, i) in row.iter().enumerate() {
                for j in &row[k + 1..] {
                    prox = prox.max(self.theta[(*i, *j)]);
                }
            }
            max = max.max(prox);
        }
        max
    }

    /// Transform the bundle through the update map `f` over `vars` using the
    /// plain max-coefficient finder.
    ///
    /// # Errors
    /// Propagates failures of the Bernstein conversion and, in OFO mode, of
    /// the canonicalisation.
    pub fn transform(
        &self,
        vars: &[Symbol],
        f: &[Expression],
        mode: TransformMode,
    ) -> Result<Bundle> {
        self.transform_with(vars, f, &NumericMaxCoeffFinder, mode)
    }

    /// Transform the bundle through `f`, maximising the parametric Bernstein
    /// coefficients over a parameter polytope.
    ///
    /// # Errors
    /// Fails with [`Error::Infeasible`] when the parameter set is empty, and
    /// propagates Bernstein conversion failures.
    pub fn transform_parametric(
        &self,
        vars: &[Symbol],
        params: &[Symbol],
        f: &[Expression],
        para_set: &Polytope,
        mode: TransformMode,
    ) -> Result<Bundle> {
        let finder = ParametricMaxCoeffFinder::new(params, para_set);
        self.transform_with(vars, f, &finder, mode)
    }

    /// Transform the bundle with an explicit max-coefficient finder.
    ///
    /// For every template the update map is composed with the instantiated
    /// generator functions, the scalar polynomial `D[b]·f(g(α))` is converted
    /// to Bernstein form for each candidate direction `b`, and the finder's
    /// bounds are min-tracked per direction across templates. Each template
    /// is processed by its own subtask.
    pub fn transform_with(
        &self,
        vars: &[Symbol],
        f: &[Expression],
        finder: &dyn MaxCoeffFinder,
        mode: TransformMode,
    ) -> Result<Bundle> {
        let m = self.size();
        let alpha: Vec<Symbol> = (0..self.dim()).map(|_| Symbol::fresh("a")).collect();
        let offp_min = Mutex::new(vec![f64::INFINITY; m]);
        let offm_min = Mutex::new(vec![f64::INFINITY; m]);

        let process = |template_idx: usize| -> Result<()> {
            let par = self.parallelotope(template_idx)?;
            let gen_fun = instantiated_generators(&alpha, &par);
            let mut sub = HashMap::new();
            for (v, g) in vars.iter().zip(gen_fun.iter()) {
                sub.insert(*v, g.clone());
            }
            let composed: Vec<Expression> = f.iter().map(|e| e.replace(&sub)).collect();

            let dirs: Vec<usize> = match mode {
                TransformMode::Ofo => self.templates[template_idx].clone(),
                TransformMode::Afo => (0..m).collect(),
            };
            for b in dirs {
                let mut objective = Expression::constant(0.);
                for (k, comp) in composed.iter().enumerate() {
                    let c = self.directions[(b, k)];
                    if c != 0. {
                        objective = objective + c * comp;
                    }
                }
                let coeffs = bernstein_coefficients(&alpha, &objective)?;
                let (max_p, max_m) = finder.find_max_coeffs(&coeffs)?;
                {
                    let mut guard = offp_min.lock().unwrap();
                    guard[b] = guard[b].min(max_p);
                }
                {
                    let mut guard = offm_min.lock().unwrap();
                    guard[b] = guard[b].min(max_m);
                }
            }
            Ok(())
        };

        if self.templates.len() > 1 {
            let failure: Mutex<Option<Error>> = Mutex::new(None);
            std::thread::scope(|scope| {
                for t in 0..self.templates.len() {
                    let process = &process;
                    let failure = &failure;
                    scope.spawn(move || {
                        if let Err(e) = process(t) {
                            failure.lock().unwrap().get_or_insert(e);
                        }
                    });
                }
            });
            if let Some(e) = failure.into_inner().unwrap() {
                return Err(e);
            }
        } else {
            process(0)?;
        }

        let res = Bundle {
            directions: self.directions.clone(),
            offp: DVector::from_vec(offp_min.into_inner().unwrap()),
            offm: DVector::from_vec(offm_min.into_inner().unwrap()),
            templates: self.templates.clone(),
            theta: self.theta.clone(),
            constraints: self.constraints.clone(),
        };
        if mode == TransformMode::Ofo && !res.is_empty() {
            res.canonical()
        } else {
            Ok(res)
        }
    }

    /// Intersect the bundle with assumption constraints. Constraints parallel
    /// to an existing direction tighten its offset; constraints opposite to
    /// one tighten the complementary offset; the rest are recorded as extra
    /// half-spaces applied whenever the bundle is viewed as a polytope. No
    /// template rows are added.
    pub fn intersect_with(&mut self, assumptions: &Polytope) {
        for (r, row) in assumptions.matrix().row_iter().enumerate() {
            let delta = assumptions.offsets()[r];
            let mut matched = false;
            for i in 0..self.size() {
                if let Some(scale) = parallel_scale(&row.clone_owned(), &self.directions.row(i).clone_owned()) {
                    if scale > 0. {
                        self.offp[i] = self.offp[i].min(delta / scale);
                    } else {
                        self.offm[i] = self.offm[i].min(delta / -scale);
                    }
                    matched = true;
                    break;
                }
            }
            if !matched {
                let extra = Polytope::new(
                    DMatrix::from_fn(1, self.dim(), |_, c| row[c]),
                    DVector::from_vec(vec![delta]),
                )
                .expect("single-row system");
                match &mut self.constraints {
                    Some(existing) => existing.intersect_with(&extra),
                    None => self.constraints = Some(extra),
                }
            }
        }
    }
}

fn canonical_offset(poly: &Polytope, dir: &DVector<f64>) -> Result<f64> {
    let res = poly.maximize(dir);
    match res.status() {
        Status::OptimumAvailable => Ok(res.optimum()),
        Status::Unbounded => Ok(f64::INFINITY),
        Status::Infeasible => Err(Error::Infeasible),
        Status::Other => Err(Error::Unsupported(
            "linear solver failed during canonicalisation".to_string(),
        )),
    }
}

// the n x n matrix formed by the selected direction rows
fn direction_block(directions: &DMatrix<f64>, row: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(row.len(), directions.ncols(), |r, c| {
        directions[(row[r], c)]
    })
}

// Some(s) when v == s * w; exact up to a small relative tolerance
fn parallel_scale(v: &RowDVector<f64>, w: &RowDVector<f64>) -> Option<f64> {
    let k = (0..w.len()).find(|i| w[*i] != 0.)?;
    let scale = v[k] / w[k];
    if scale == 0. {
        return None;
    }
    for i in 0..v.len() {
        if (v[i] - scale * w[i]).abs() > 1e-9 * (1. + v[i].abs()) {
            return None;
        }
    }
    Some(scale)
}

/// The generator functions `g(α) = q + Σᵢ αᵢ·ℓᵢ·Uᵢ` of a parallelotope with
/// its base vertex and lengths substituted, leaving only `α` symbolic.
/// Zero-length generators contribute nothing and are skipped.
pub(crate) fn instantiated_generators(alpha: &[Symbol], par: &Parallelotope) -> Vec<Expression> {
    let n = par.dim();
    let mut gens: Vec<Expression> = par
        .base_vertex()
        .iter()
        .map(|q| Expression::constant(*q))
        .collect();
    for i in 0..n {
        let length = par.lengths()[i];
        if length == 0. {
            continue;
        }
        for (j, gen) in gens.iter_mut().enumerate() {
            let c = length * par.versors()[(i, j)];
            if c != 0. {
                *gen = gen.clone() + c * &Expression::from(alpha[i]);
            }
        }
    }
    gens
}

fn is_permutation_of_other_rows(templates: &[Vec<usize>], i: usize) -> bool {
    let mut sorted = templates[i].clone();
    sorted.sort_unstable();
    for (j, row) in templates.iter().enumerate() {
        if j == i {
            continue;
        }
        let mut other = row.clone();
        other.sort_unstable();
        if other == sorted {
            return true;
        }
    }
    false
}
