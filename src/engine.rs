//! The reachability and synthesis engine.
//!
//! [`Engine::reach`] iterates the one-step bundle transformation, splitting
//! bundles that grow too wide and accumulating the per-step union of their
//! polytopes into a [`Flowpipe`]. [`Engine::synthesize`] refines a parameter
//! set against an STL specification by structural recursion over the formula,
//! stepping the initial set forward through the parametric transformation at
//! each temporal unfolding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bernstein::bernstein_coefficients;
use crate::dynamics::DynamicalSystem;
use crate::pool::ThreadPool;
use crate::sets::bundle::instantiated_generators;
use crate::sets::{Bundle, Polytope, TransformMode};
use crate::stl::{Formula, TimeInterval};
use crate::symbolic::{Expression, Symbol};
use crate::union::{intersect, PolytopesUnion};
use crate::{Error, Result};

/// A time-indexed sequence of reach-set over-approximations; the head is the
/// initial set.
#[derive(Debug, Clone, Default)]
pub struct Flowpipe {
    steps: Vec<PolytopesUnion>,
}

impl Flowpipe {
    /// The number of recorded steps, including the initial set.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step has been recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The union recorded for step `i`, if it exists.
    pub fn get(&self, i: usize) -> Option<&PolytopesUnion> {
        self.steps.get(i)
    }

    /// The most recent step.
    pub fn last(&self) -> Option<&PolytopesUnion> {
        self.steps.last()
    }

    /// Iterate over the steps in time order.
    pub fn iter(&self) -> std::slice::Iter<PolytopesUnion> {
        self.steps.iter()
    }

    fn push(&mut self, step: PolytopesUnion) {
        self.steps.push(step);
    }
}

#[derive(Clone)]
struct SynthCtx {
    system: DynamicalSystem,
    mode: TransformMode,
}

/// The analysis engine: a dynamical system together with the options steering
/// reachability and synthesis.
pub struct Engine {
    system: DynamicalSystem,
    assumptions: Option<Polytope>,
    mode: TransformMode,
    decomposition: Option<(f64, u32)>,
    max_bundle_magnitude: f64,
    max_param_splits: u32,
    pre_splits: u32,
    seed: u64,
    pool: ThreadPool,
}

impl Engine {
    /// Create an engine with default options: AFO transformation, no
    /// decomposition, no bundle splitting and no parameter splitting.
    pub fn new(system: DynamicalSystem) -> Engine {
        Engine {
            system,
            assumptions: None,
            mode: TransformMode::Afo,
            decomposition: None,
            max_bundle_magnitude: f64::MAX,
            max_param_splits: 0,
            pre_splits: 0,
            seed: 0,
            pool: ThreadPool::new(),
        }
    }

    /// Select the transformation mode.
    pub fn with_mode(mut self, mode: TransformMode) -> Engine {
        self.mode = mode;
        self
    }

    /// Attach assumption constraints, intersected into every reach result.
    pub fn with_assumptions(mut self, assumptions: Polytope) -> Engine {
        self.assumptions = Some(assumptions);
        self
    }

    /// Enable template decomposition after each step with the given weight
    /// `α ∈ [0,1]` and iteration count.
    pub fn with_decomposition(mut self, weight: f64, iterations: u32) -> Engine {
        self.decomposition = Some((weight, iterations));
        self
    }

    /// Cap the per-direction magnitude of the bundles kept between steps;
    /// wider bundles are split.
    pub fn with_max_bundle_magnitude(mut self, magnitude: f64) -> Engine {
        self.max_bundle_magnitude = magnitude;
        self
    }

    /// The number of covering refinements synthesis may attempt when every
    /// refined parameter set comes back empty.
    pub fn with_max_param_splits(mut self, splits: u32) -> Engine {
        self.max_param_splits = splits;
        self
    }

    /// Split the parameter covering this many times before synthesis starts.
    pub fn with_pre_splits(mut self, pre_splits: u32) -> Engine {
        self.pre_splits = pre_splits;
        self
    }

    /// Seed for the decomposition search; runs with equal seeds reproduce.
    pub fn with_seed(mut self, seed: u64) -> Engine {
        self.seed = seed;
        self
    }

    /// The system under analysis.
    pub fn system(&self) -> &DynamicalSystem {
        &self.system
    }

    /// Over-approximate the sets reachable in `k` steps from `init`.
    ///
    /// The flowpipe head is the initial set; each further entry is the union
    /// of the transformed bundle polytopes of one step. The loop stops early
    /// when a step is empty.
    ///
    /// # Errors
    /// A step failure is reported as [`Error::Step`], carrying the valid
    /// flowpipe prefix. A direction left without finite bound by the
    /// transformation is a step failure ([`Error::Unbounded`]).
    pub fn reach(&self, mut init: Bundle, k: u32) -> Result<Flowpipe> {
        if let Some(assumptions) = &self.assumptions {
            init.intersect_with(assumptions);
        }
        let mut current: Vec<Bundle> = init.split_with_ratio(self.max_bundle_magnitude, 1.0);

        let mut flowpipe = Flowpipe::default();
        let mut last = PolytopesUnion::new();
        {
            let mut head = init.as_polytope();
            head.simplify();
            last.add(head);
        }
        flowpipe.push(last.clone());

        for step in 1..=k as usize {
            if last.is_empty() {
                break;
            }
            let next: Arc<Mutex<Vec<Bundle>>> = Arc::default();
            let last_step: Arc<Mutex<PolytopesUnion>> = Arc::default();
            let failure: Arc<Mutex<Option<Error>>> = Arc::default();

            let batch = self.pool.create_batch();
            for (idx, bundle) in current.drain(..).enumerate() {
                let system = self.system.clone();
                let assumptions = self.assumptions.clone();
                let mode = self.mode;
                let decomposition = self.decomposition;
                let magnitude = self.max_bundle_magnitude;
                let task_seed = self
                    .seed
                    .wrapping_add((step as u64) << 32)
                    .wrapping_add(idx as u64);
                let next = Arc::clone(&next);
                let last_step = Arc::clone(&last_step);
                let failure = Arc::clone(&failure);
                self.pool.submit_to_batch(batch, move || {
                    let outcome = step_bundle(
                        &system,
                        bundle,
                        assumptions.as_ref(),
                        mode,
                        decomposition,
                        magnitude,
                        task_seed,
                    );
                    match outcome {
                        Ok(Some((pieces, polytope))) => {
                            next.lock().unwrap().extend(pieces);
                            last_step.lock().unwrap().add(polytope);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            failure.lock().unwrap().get_or_insert(e);
                        }
                    }
                });
            }
            self.pool.join(batch);
            self.pool.close_batch(batch);

            if let Some(e) = failure.lock().unwrap().take() {
                return Err(Error::Step {
                    step,
                    flowpipe,
                    source: Box::new(e),
                });
            }
            current = std::mem::take(&mut *next.lock().unwrap());
            last = std::mem::take(&mut *last_step.lock().unwrap());
            flowpipe.push(last.clone());
            log::info!(
                "reach step {}/{}: {} bundles, union of {} polytopes",
                step,
                k,
                current.len(),
                last.size()
            );
        }
        Ok(flowpipe)
    }

    /// Over-approximate the sets reachable in `k` steps when the parameters
    /// range over `para_set`. Every parameter polytope evolves its own list
    /// of bundles; the per-step union merges across all of them.
    ///
    /// # Errors
    /// As for [`reach`](./struct.Engine.html#method.reach).
    pub fn reach_parametric(
        &self,
        mut init: Bundle,
        para_set: &PolytopesUnion,
        k: u32,
    ) -> Result<Flowpipe> {
        if let Some(assumptions) = &self.assumptions {
            init.intersect_with(assumptions);
        }
        let base = init.split_with_ratio(self.max_bundle_magnitude, 1.0);
        let mut current: Vec<Vec<Bundle>> = vec![base; para_set.size()];

        let mut flowpipe = Flowpipe::default();
        let mut last = PolytopesUnion::new();
        {
            let mut head = init.as_polytope();
            head.simplify();
            last.add(head);
        }
        flowpipe.push(last.clone());

        for step in 1..=k as usize {
            if last.is_empty() {
                break;
            }
            let next: Arc<Mutex<Vec<Vec<Bundle>>>> =
                Arc::new(Mutex::new(vec![Vec::new(); para_set.size()]));
            let last_step: Arc<Mutex<PolytopesUnion>> = Arc::default();
            let failure: Arc<Mutex<Option<Error>>> = Arc::default();

            let batch = self.pool.create_batch();
            for (pos, para_poly) in para_set.iter().enumerate() {
                let bundles = std::mem::take(&mut current[pos]);
                let system = self.system.clone();
                let assumptions = self.assumptions.clone();
                let mode = self.mode;
                let decomposition = self.decomposition;
                let magnitude = self.max_bundle_magnitude;
                let para_poly = para_poly.clone();
                let seed = self.seed;
                let next = Arc::clone(&next);
                let last_step = Arc::clone(&last_step);
                let failure = Arc::clone(&failure);
                self.pool.submit_to_batch(batch, move || {
                    for (idx, bundle) in bundles.into_iter().enumerate() {
                        let task_seed = seed
                            .wrapping_add((step as u64) << 32)
                            .wrapping_add(((pos as u64) << 16) ^ idx as u64);
                        let outcome = step_bundle_parametric(
                            &system,
                            bundle,
                            &para_poly,
                            assumptions.as_ref(),
                            mode,
                            decomposition,
                            magnitude,
                            task_seed,
                        );
                        match outcome {
                            Ok(Some((pieces, polytope))) => {
                                next.lock().unwrap()[pos].extend(pieces);
                                last_step.lock().unwrap().add(polytope);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                failure.lock().unwrap().get_or_insert(e);
                                return;
                            }
                        }
                    }
                });
            }
            self.pool.join(batch);
            self.pool.close_batch(batch);

            if let Some(e) = failure.lock().unwrap().take() {
                return Err(Error::Step {
                    step,
                    flowpipe,
                    source: Box::new(e),
                });
            }
            current = std::mem::take(&mut *next.lock().unwrap());
            last = std::mem::take(&mut *last_step.lock().unwrap());
            flowpipe.push(last.clone());
            log::info!(
                "parametric reach step {}/{}: union of {} polytopes",
                step,
                k,
                last.size()
            );
        }
        Ok(flowpipe)
    }

    /// Refine `para_set` to parameter valuations for which every trajectory
    /// from `init` satisfies `spec`.
    ///
    /// The formula is first rewritten to Positive Normal Form. The covering
    /// of the parameter set is pre-split as configured; whenever every
    /// refined set comes back empty the covering is refined further, up to
    /// the configured number of times. Each returned union is simplified.
    ///
    /// # Errors
    /// Synthesis under assumptions is not supported and is rejected with
    /// [`Error::Unsupported`], as are atom constraints that are not linear in
    /// the parameters.
    pub fn synthesize(
        &self,
        init: &Bundle,
        para_set: &PolytopesUnion,
        spec: &Formula,
    ) -> Result<Vec<PolytopesUnion>> {
        if self.assumptions.is_some() {
            return Err(Error::Unsupported(
                "assumptions are not supported during synthesis".to_string(),
            ));
        }
        let formula = spec.pnf();

        let mut covering: Vec<PolytopesUnion> = vec![para_set.clone()];
        if self.pre_splits > 1 {
            covering = finer_covering(&covering, self.pre_splits as usize);
        }

        let mut result = self.synthesize_list(init, &covering, &formula)?;
        let mut splits = 0;
        while result.iter().all(PolytopesUnion::is_empty) && splits < self.max_param_splits {
            covering = finer_covering(&covering, usize::MAX);
            log::debug!("synthesis found nothing, refining to {} sets", covering.len());
            result = self.synthesize_list(init, &covering, &formula)?;
            splits += 1;
        }

        for union in &mut result {
            union.simplify();
        }
        Ok(result)
    }

    fn synthesize_list(
        &self,
        init: &Bundle,
        covering: &[PolytopesUnion],
        formula: &Formula,
    ) -> Result<Vec<PolytopesUnion>> {
        let slots: Arc<Mutex<Vec<Option<Result<PolytopesUnion>>>>> =
            Arc::new(Mutex::new((0..covering.len()).map(|_| None).collect()));
        let batch = self.pool.create_batch();
        for (i, para_set) in covering.iter().enumerate() {
            let ctx = SynthCtx {
                system: self.system.clone(),
                mode: self.mode,
            };
            let init = init.clone();
            let para_set = para_set.clone();
            let formula = formula.clone();
            let slots = Arc::clone(&slots);
            self.pool.submit_to_batch(batch, move || {
                let refined = synth_rec(&ctx, &init, &para_set, &formula, 0);
                slots.lock().unwrap()[i] = Some(refined);
            });
        }
        self.pool.join(batch);
        self.pool.close_batch(batch);

        let slots = std::mem::take(&mut *slots.lock().unwrap());
        slots
            .into_iter()
            .map(|slot| slot.expect("every synthesis task fills its slot"))
            .collect()
    }
}

#[allow(clippy::type_complexity)]
fn step_bundle(
    system: &DynamicalSystem,
    bundle: Bundle,
    assumptions: Option<&Polytope>,
    mode: TransformMode,
    decomposition: Option<(f64, u32)>,
    magnitude: f64,
    seed: u64,
) -> Result<Option<(Vec<Bundle>, Polytope)>> {
    let image = system.transform(&bundle, mode)?;
    finish_step(image, assumptions, decomposition, magnitude, seed)
}

#[allow(clippy::type_complexity)]
fn step_bundle_parametric(
    system: &DynamicalSystem,
    bundle: Bundle,
    para_poly: &Polytope,
    assumptions: Option<&Polytope>,
    mode: TransformMode,
    decomposition: Option<(f64, u32)>,
    magnitude: f64,
    seed: u64,
) -> Result<Option<(Vec<Bundle>, Polytope)>> {
    let image = system.transform_parametric(&bundle, para_poly, mode)?;
    finish_step(image, assumptions, decomposition, magnitude, seed)
}

/// Shared tail of a reach step: intersect the assumptions, decompose if
/// requested, reject unbounded directions and hand back the split pieces
/// together with the step polytope. `None` means the image is empty and the
/// bundle leaves no successors.
#[allow(clippy::type_complexity)]
fn finish_step(
    mut image: Bundle,
    assumptions: Option<&Polytope>,
    decomposition: Option<(f64, u32)>,
    magnitude: f64,
    seed: u64,
) -> Result<Option<(Vec<Bundle>, Polytope)>> {
    if let Some(assumptions) = assumptions {
        image.intersect_with(assumptions);
    }
    if let Some((weight, iterations)) = decomposition {
        let mut rng = StdRng::seed_from_u64(seed);
        image = image.decompose(weight, iterations, &mut rng);
    }
    for i in 0..image.size() {
        if !image.offp(i).is_finite() || !image.offm(i).is_finite() {
            return Err(Error::Unbounded(format!("reach set direction {}", i)));
        }
    }
    let polytope = image.as_polytope();
    if polytope.is_empty() {
        return Ok(None);
    }
    Ok(Some((image.split(magnitude), polytope)))
}

/// Split every union of a covering into a finer one: unions with several
/// members are unpacked into one union per member, single polytopes are split
/// into at most `pieces` parts, each its own union.
fn finer_covering(covering: &[PolytopesUnion], pieces: usize) -> Vec<PolytopesUnion> {
    let mut out = Vec::new();
    for union in covering {
        match union.size() {
            0 => {}
            1 => {
                let polytope = union.iter().next().expect("union of size one");
                for part in polytope.split(pieces) {
                    out.push(PolytopesUnion::from_polytope(part));
                }
            }
            _ => {
                for polytope in union.iter() {
                    out.push(PolytopesUnion::from_polytope(polytope.clone()));
                }
            }
        }
    }
    out
}

fn synth_rec(
    ctx: &SynthCtx,
    init: &Bundle,
    para_set: &PolytopesUnion,
    formula: &Formula,
    time: u32,
) -> Result<PolytopesUnion> {
    if para_set.is_empty() {
        return Ok(PolytopesUnion::new());
    }
    match formula {
        Formula::Atom(predicate) => synthesize_atom(ctx, init, para_set, predicate),
        Formula::Negation(_) => Err(Error::Unsupported(
            "synthesis requires formulas in positive normal form".to_string(),
        )),
        Formula::Conjunction(phi, psi) => {
            let left = synth_rec(ctx, init, para_set, phi, time)?;
            let right = synth_rec(ctx, init, para_set, psi, time)?;
            Ok(intersect(&left, &right))
        }
        Formula::Disjunction(phi, psi) => {
            let mut result = synth_rec(ctx, init, para_set, phi, time)?;
            result.add_union(synth_rec(ctx, init, para_set, psi, time)?);
            Ok(result)
        }
        Formula::Eventually(interval, phi) => {
            let until = Formula::until(*interval, Formula::truth(), (**phi).clone());
            synth_rec(ctx, init, para_set, &until, time)
        }
        Formula::Always(interval, phi) => {
            synth_always(ctx, init, para_set, *interval, phi, formula, time)
        }
        Formula::Until(interval, phi, psi) => {
            synth_until(ctx, init, para_set, *interval, phi, psi, formula, time)
        }
    }
}

fn synth_always(
    ctx: &SynthCtx,
    init: &Bundle,
    para_set: &PolytopesUnion,
    interval: TimeInterval,
    phi: &Formula,
    whole: &Formula,
    time: u32,
) -> Result<PolytopesUnion> {
    if interval.is_empty() {
        return Ok(PolytopesUnion::new());
    }
    // the interval is still entirely ahead: step forward
    if interval.is_after(time) {
        return transition_and_synthesis(ctx, init, para_set, whole, time);
    }
    // inside the interval: refine now and along the remaining steps
    if interval.end() > time {
        let refined = synth_rec(ctx, init, para_set, phi, time)?;
        if refined.is_empty() {
            return Ok(refined);
        }
        return transition_and_synthesis(ctx, init, &refined, whole, time);
    }
    // at the last instant of the interval
    synth_rec(ctx, init, para_set, phi, time)
}

#[allow(clippy::too_many_arguments)]
fn synth_until(
    ctx: &SynthCtx,
    init: &Bundle,
    para_set: &PolytopesUnion,
    interval: TimeInterval,
    phi: &Formula,
    psi: &Formula,
    whole: &Formula,
    time: u32,
) -> Result<PolytopesUnion> {
    if interval.is_empty() {
        return Ok(PolytopesUnion::new());
    }
    if interval.is_after(time) {
        let holding = synth_rec(ctx, init, para_set, phi, time)?;
        if holding.is_empty() {
            return Ok(holding);
        }
        return transition_and_synthesis(ctx, init, &holding, whole, time);
    }
    if interval.end() > time {
        let holding = synth_rec(ctx, init, para_set, phi, time)?;
        if holding.is_empty() {
            return synth_rec(ctx, init, para_set, psi, time);
        }
        let mut result = transition_and_synthesis(ctx, init, &holding, whole, time)?;
        result.add_union(synth_rec(ctx, init, para_set, psi, time)?);
        return Ok(result);
    }
    synth_rec(ctx, init, para_set, psi, time)
}

/// Replace the initial set by its one-step image under each polytope of the
/// retained parameter set and continue the synthesis at the next instant.
fn transition_and_synthesis(
    ctx: &SynthCtx,
    init: &Bundle,
    para_set: &PolytopesUnion,
    formula: &Formula,
    time: u32,
) -> Result<PolytopesUnion> {
    let mut result = PolytopesUnion::new();
    for para_poly in para_set.iter() {
        let reached = ctx.system.transform_parametric(init, para_poly, ctx.mode)?;
        let single = PolytopesUnion::from_polytope(para_poly.clone());
        result.add_union(synth_rec(ctx, &reached, &single, formula, time + 1)?);
    }
    Ok(result)
}

/// Refine the parameter set so that the atom holds on every point of `init`:
/// the predicate is composed with each template's generator functions and its
/// Bernstein coefficients over the generator box, which bound the predicate
/// from above, are constrained to be non-positive.
fn synthesize_atom(
    ctx: &SynthCtx,
    init: &Bundle,
    para_set: &PolytopesUnion,
    predicate: &Expression,
) -> Result<PolytopesUnion> {
    let params = ctx.system.parameters();
    let alpha: Vec<Symbol> = (0..init.dim()).map(|_| Symbol::fresh("a")).collect();
    let mut result = para_set.clone();
    for t in 0..init.num_templates() {
        let par = init.parallelotope(t)?;
        let generators = instantiated_generators(&alpha, &par);
        let mut sub = HashMap::new();
        for (var, gen) in ctx.system.variables().iter().zip(generators.iter()) {
            sub.insert(*var, gen.clone());
        }
        let composed = predicate.replace(&sub);
        let coefficients = bernstein_coefficients(&alpha, &composed)?;

        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut offsets: Vec<f64> = Vec::new();
        for coefficient in &coefficients {
            match coefficient.linear_form(params)? {
                Some((coeffs, cst)) => {
                    if coeffs.iter().all(|c| *c == 0.) {
                        if cst > 0. {
                            // no parameter can make this coefficient sign off
                            return Ok(PolytopesUnion::new());
                        }
                    } else {
                        offsets.push(-cst);
                        rows.push(coeffs);
                    }
                }
                None => {
                    return Err(Error::Unsupported(
                        "atom constraint is not linear in the parameters".to_string(),
                    ))
                }
            }
        }
        if !rows.is_empty() {
            let a = DMatrix::from_fn(rows.len(), params.len(), |r, c| rows[r][c]);
            let constraint = Polytope::new(a, DVector::from_vec(offsets))?;
            result = intersect(&result, &PolytopesUnion::from_polytope(constraint));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::DMatrix;

    fn halving_engine() -> Engine {
        let x = Symbol::new("x");
        let system =
            DynamicalSystem::new(vec![x], vec![], vec![0.5 * &Expression::from(x)]).unwrap();
        Engine::new(system)
    }

    fn segment(lo: f64, hi: f64) -> Bundle {
        Bundle::new(
            DMatrix::identity(1, 1),
            DVector::from_vec(vec![hi]),
            DVector::from_vec(vec![-lo]),
            vec![vec![0]],
        )
        .unwrap()
    }

    #[test]
    fn test_reach_halving() {
        let engine = halving_engine();
        let flowpipe = engine.reach(segment(0., 1.), 3).unwrap();
        assert_eq!(flowpipe.len(), 4);
        let obj = DVector::from_vec(vec![1.]);
        let expected = [1., 0.5, 0.25, 0.125];
        for (step, upper) in expected.iter().enumerate() {
            let union = flowpipe.get(step).unwrap();
            assert!((union.maximize(&obj) - upper).abs() < 1e-9);
            assert!(union.minimize(&obj).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reach_stops_on_empty_step() {
        let x = Symbol::new("x");
        let system = DynamicalSystem::new(
            vec![x],
            vec![],
            vec![&Expression::from(x) + &Expression::from(1.)],
        )
        .unwrap();
        let assumptions = Polytope::from_box(&[f64::NEG_INFINITY], &[1.5]).unwrap();
        let engine = Engine::new(system).with_assumptions(assumptions);
        let flowpipe = engine.reach(segment(0., 1.), 5).unwrap();
        // init, one non-empty step, then the empty step that stops the loop
        assert_eq!(flowpipe.len(), 3);
        assert!(flowpipe.last().unwrap().is_empty());
        let obj = DVector::from_vec(vec![1.]);
        assert!((flowpipe.get(1).unwrap().maximize(&obj) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_reach_with_splitting() {
        let engine = halving_engine().with_max_bundle_magnitude(0.25);
        let flowpipe = engine.reach(segment(0., 1.), 2).unwrap();
        let obj = DVector::from_vec(vec![1.]);
        assert!((flowpipe.get(1).unwrap().maximize(&obj) - 0.5).abs() < 1e-9);
        assert!((flowpipe.get(2).unwrap().maximize(&obj) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_synthesize_rejects_assumptions() {
        let engine = halving_engine().with_assumptions(Polytope::from_box(&[0.], &[1.]).unwrap());
        let res = engine.synthesize(
            &segment(0., 1.),
            &PolytopesUnion::from_polytope(Polytope::from_box(&[0.], &[1.]).unwrap()),
            &Formula::truth(),
        );
        assert!(matches!(res, Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_finer_covering() {
        let single = PolytopesUnion::from_polytope(Polytope::from_box(&[0.], &[1.]).unwrap());
        let refined = finer_covering(&[single], usize::MAX);
        assert_eq!(refined.len(), 2);
        let mut pair = PolytopesUnion::from_polytope(Polytope::from_box(&[0.], &[1.]).unwrap());
        pair.add(Polytope::from_box(&[2.], &[3.]).unwrap());
        let unpacked = finer_covering(&[pair], usize::MAX);
        assert_eq!(unpacked.len(), 2);
        assert_eq!(unpacked[0].size(), 1);
    }
}
