//! The typed boundary between the external configuration parser and the
//! engine.
//!
//! The parser and its surface language live outside this crate; what arrives
//! here is a [`ProblemSpec`]: declared variables with their update
//! expressions, parameters, bounded directions, an optional template,
//! assumptions, an optional STL specification and the analysis options.
//! [`check`] produces human-readable diagnostics for everything the engine
//! would choke on, and [`build`] turns a clean description into a [`Model`]
//! ready to run.
//!
//! [`ProblemSpec`]: ./struct.ProblemSpec.html
//! [`check`]: ./struct.ProblemSpec.html#method.check
//! [`build`]: ./struct.ProblemSpec.html#method.build
//! [`Model`]: ./struct.Model.html

use nalgebra::{DMatrix, DVector};

use crate::dynamics::DynamicalSystem;
use crate::engine::{Engine, Flowpipe};
use crate::linalg::rank;
use crate::lp::{LinearSystem, Status};
use crate::sets::{Bundle, Polytope, TransformMode};
use crate::stl::Formula;
use crate::symbolic::{Expression, Symbol};
use crate::union::PolytopesUnion;
use crate::{Error, Result};

/// The kind of problem the model asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// Compute a flowpipe.
    Reach,
    /// Refine a parameter set against the specification.
    Synthesis,
}

/// A declared variable and its (possibly still missing) update expression.
#[derive(Debug, Clone)]
pub struct VariableSpec {
    /// The variable name.
    pub name: String,
    /// The polynomial update expression, if one has been declared.
    pub dynamic: Option<Expression>,
}

impl VariableSpec {
    /// A variable with its update expression.
    pub fn new(name: &str, dynamic: Expression) -> VariableSpec {
        VariableSpec {
            name: name.to_string(),
            dynamic: Some(dynamic),
        }
    }
}

/// A linear form over the declared symbols with optional bounds:
/// `lower ≤ coeffs·x ≤ upper`.
#[derive(Debug, Clone)]
pub struct DirectionSpec {
    /// Coefficients over the declared symbols, in declaration order.
    pub coeffs: Vec<f64>,
    /// The lower bound, if any.
    pub lower: Option<f64>,
    /// The upper bound, if any.
    pub upper: Option<f64>,
}

impl DirectionSpec {
    /// A direction with both bounds.
    pub fn bounded(coeffs: Vec<f64>, lower: f64, upper: f64) -> DirectionSpec {
        DirectionSpec {
            coeffs,
            lower: Some(lower),
            upper: Some(upper),
        }
    }
}

/// Everything the external adapter knows about a problem.
#[derive(Debug, Clone)]
pub struct ProblemSpec {
    /// The problem kind.
    pub problem: ProblemKind,
    /// The number of analysis steps; mandatory.
    pub iterations: Option<u32>,
    /// Maximum number of parameter-covering refinements during synthesis.
    pub max_param_splits: u32,
    /// Number of covering splits performed before synthesis starts.
    pub pre_splits: u32,
    /// Per-direction magnitude cap for the bundles kept between steps.
    pub max_bundle_magnitude: f64,
    /// The declared variables.
    pub variables: Vec<VariableSpec>,
    /// The declared parameter names.
    pub parameters: Vec<String>,
    /// The variable directions with their bounds.
    pub directions: Vec<DirectionSpec>,
    /// The template rows, each selecting directions by index. May be empty.
    pub template: Vec<Vec<usize>>,
    /// The parameter directions with their bounds.
    pub param_directions: Vec<DirectionSpec>,
    /// Assumption half-spaces `coeffs·x ≤ offset` over the variables.
    pub assumptions: Vec<(Vec<f64>, f64)>,
    /// The STL specification, mandatory for synthesis.
    pub spec: Option<Formula>,
    /// The transformation mode.
    pub mode: TransformMode,
    /// Template decomposition weight and iteration count, when enabled.
    pub decomposition: Option<(f64, u32)>,
    /// Compose the update map with itself this many times before use.
    pub dynamic_degree: u32,
    /// Seed for the decomposition search.
    pub seed: u64,
}

impl ProblemSpec {
    /// An empty description of the given kind with default options.
    pub fn new(problem: ProblemKind) -> ProblemSpec {
        ProblemSpec {
            problem,
            iterations: None,
            max_param_splits: 0,
            pre_splits: 0,
            max_bundle_magnitude: f64::MAX,
            variables: Vec::new(),
            parameters: Vec::new(),
            directions: Vec::new(),
            template: Vec::new(),
            param_directions: Vec::new(),
            assumptions: Vec::new(),
            spec: None,
            mode: TransformMode::Afo,
            decomposition: None,
            dynamic_degree: 1,
            seed: 0,
        }
    }

    /// Collect human-readable diagnostics for every validation problem. An
    /// empty result means the description can be built.
    pub fn check(&self) -> Vec<String> {
        let mut diagnostics = Vec::new();

        if self.iterations.is_none() {
            diagnostics.push("number of iterations is mandatory".to_string());
        }

        for var in &self.variables {
            if var.dynamic.is_none() {
                diagnostics.push(format!("variable {} has no dynamic", var.name));
            }
        }

        for (i, dir) in self.directions.iter().enumerate() {
            if dir.coeffs.len() != self.variables.len() {
                diagnostics.push(format!(
                    "direction {} has {} coefficients but there are {} variables",
                    i,
                    dir.coeffs.len(),
                    self.variables.len()
                ));
            }
        }
        for (i, dir) in self.param_directions.iter().enumerate() {
            if dir.coeffs.len() != self.parameters.len() {
                diagnostics.push(format!(
                    "parameter direction {} has {} coefficients but there are {} parameters",
                    i,
                    dir.coeffs.len(),
                    self.parameters.len()
                ));
            }
        }
        for (i, (coeffs, _)) in self.assumptions.iter().enumerate() {
            if coeffs.len() != self.variables.len() {
                diagnostics.push(format!(
                    "assumption {} has {} coefficients but there are {} variables",
                    i,
                    coeffs.len(),
                    self.variables.len()
                ));
            }
        }
        if !diagnostics.is_empty() {
            // the remaining checks would index out of bounds
            return diagnostics;
        }

        let var_names: Vec<&str> = self.variables.iter().map(|v| v.name.as_str()).collect();
        check_finite_bounds("variable", &self.directions, &var_names, &mut diagnostics);
        let param_names: Vec<&str> = self.parameters.iter().map(|p| p.as_str()).collect();
        check_finite_bounds(
            "parameter",
            &self.param_directions,
            &param_names,
            &mut diagnostics,
        );

        let n = self.variables.len();
        for row in &self.template {
            if row.len() != n {
                diagnostics.push(format!(
                    "template row {:?} has {} entries, expected {}",
                    row,
                    row.len(),
                    n
                ));
                continue;
            }
            if let Some(idx) = row.iter().find(|idx| **idx >= self.directions.len()) {
                diagnostics.push(format!(
                    "template row {:?} names direction {} but only {} are declared",
                    row,
                    idx,
                    self.directions.len()
                ));
                continue;
            }
            let block =
                DMatrix::from_fn(row.len(), n, |r, c| self.directions[row[r]].coeffs[c]);
            if rank(&block) < n {
                diagnostics.push(format!(
                    "template row {:?} defines an unbounded parallelotope",
                    row
                ));
            }
        }

        if self.problem == ProblemKind::Synthesis {
            if self.spec.is_none() {
                diagnostics
                    .push("synthesis requires a formula as specification".to_string());
            }
            if self.param_directions.is_empty() {
                diagnostics.push("synthesis requires a bounded parameter set".to_string());
            }
        }

        diagnostics
    }

    /// Build the model: trim unused directions when a template is given,
    /// tighten all direction bounds by LP, compose the dynamics if requested
    /// and assemble the initial bundle, parameter set and assumptions.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] carrying the [`check`] diagnostics when
    /// validation fails, and [`Error::Infeasible`] when the declared
    /// parameter set is empty.
    ///
    /// [`check`]: ./struct.ProblemSpec.html#method.check
    pub fn build(&self) -> Result<Model> {
        let diagnostics = self.check();
        if !diagnostics.is_empty() {
            for d in &diagnostics {
                log::error!("{}", d);
            }
            return Err(Error::InvalidInput(diagnostics.join("; ")));
        }

        let variables: Vec<Symbol> = self
            .variables
            .iter()
            .map(|v| Symbol::new(&v.name))
            .collect();
        let parameters: Vec<Symbol> = self.parameters.iter().map(|p| Symbol::new(p)).collect();
        let dynamics: Vec<Expression> = self
            .variables
            .iter()
            .map(|v| v.dynamic.clone().expect("checked above"))
            .collect();
        let mut system = DynamicalSystem::new(variables, parameters, dynamics)?;
        if self.dynamic_degree > 1 {
            system = system.composed(self.dynamic_degree)?;
        }

        let n = self.variables.len();
        let mut rows: Vec<Vec<f64>> = self.directions.iter().map(|d| d.coeffs.clone()).collect();
        let mut lower: Vec<f64> = self
            .directions
            .iter()
            .map(|d| d.lower.unwrap_or(f64::NEG_INFINITY))
            .collect();
        let mut upper: Vec<f64> = self
            .directions
            .iter()
            .map(|d| d.upper.unwrap_or(f64::INFINITY))
            .collect();
        let mut template = self.template.clone();
        if template.is_empty() {
            if rows.len() == n {
                template.push((0..n).collect());
            } else {
                return Err(Error::InvalidInput(format!(
                    "a template is required when the {} directions exceed the dimension {}",
                    rows.len(),
                    n
                )));
            }
        } else {
            trim_unused_directions(&mut rows, &mut lower, &mut upper, &mut template);
        }
        // an empty initial set is admitted, so infeasibility is ignored here
        let _ = optimize_bounds(&rows, &mut lower, &mut upper);

        let directions = DMatrix::from_fn(rows.len(), n, |r, c| rows[r][c]);
        let offp = DVector::from_vec(upper);
        let offm = DVector::from_iterator(lower.len(), lower.iter().map(|l| -l));
        let mut initial_set = Bundle::new(directions, offp, offm, template)?;

        let assumptions = if self.assumptions.is_empty() {
            None
        } else {
            let a = DMatrix::from_fn(self.assumptions.len(), n, |r, c| self.assumptions[r].0[c]);
            let b = DVector::from_iterator(
                self.assumptions.len(),
                self.assumptions.iter().map(|(_, off)| *off),
            );
            Some(Polytope::new(a, b)?)
        };
        if let Some(assumptions) = &assumptions {
            initial_set.intersect_with(assumptions);
        }

        let parameter_set = if self.param_directions.is_empty() {
            None
        } else {
            let mut p_rows: Vec<Vec<f64>> = self
                .param_directions
                .iter()
                .map(|d| d.coeffs.clone())
                .collect();
            let mut p_lower: Vec<f64> = self
                .param_directions
                .iter()
                .map(|d| d.lower.unwrap_or(f64::NEG_INFINITY))
                .collect();
            let mut p_upper: Vec<f64> = self
                .param_directions
                .iter()
                .map(|d| d.upper.unwrap_or(f64::INFINITY))
                .collect();
            // an empty parameter set is not admitted
            optimize_bounds(&p_rows, &mut p_lower, &mut p_upper)?;
            let np = self.parameters.len();
            let mut a = DMatrix::zeros(2 * p_rows.len(), np);
            let mut b = DVector::zeros(2 * p_rows.len());
            for (i, row) in p_rows.iter().enumerate() {
                for (j, c) in row.iter().enumerate() {
                    a[(2 * i, j)] = *c;
                    a[(2 * i + 1, j)] = -c;
                }
                b[2 * i] = p_upper[i];
                b[2 * i + 1] = -p_lower[i];
            }
            Some(PolytopesUnion::from_polytope(Polytope::new(a, b)?))
        };

        Ok(Model {
            problem: self.problem,
            iterations: self.iterations.expect("checked above"),
            system,
            initial_set,
            parameter_set,
            assumptions,
            spec: self.spec.clone(),
            mode: self.mode,
            decomposition: self.decomposition,
            max_bundle_magnitude: self.max_bundle_magnitude,
            max_param_splits: self.max_param_splits,
            pre_splits: self.pre_splits,
            seed: self.seed,
        })
    }
}

// one LP row per bounded side of each direction
fn direction_system(n: usize, directions: &[Vec<f64>], lower: &[f64], upper: &[f64]) -> LinearSystem {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut offsets: Vec<f64> = Vec::new();
    for (i, dir) in directions.iter().enumerate() {
        if upper[i].is_finite() {
            rows.push(dir.clone());
            offsets.push(upper[i]);
        }
        if lower[i].is_finite() {
            rows.push(dir.iter().map(|c| -c).collect());
            offsets.push(-lower[i]);
        }
    }
    let a = DMatrix::from_fn(rows.len(), n, |r, c| rows[r][c]);
    LinearSystem::new(a, DVector::from_vec(offsets)).expect("rows and offsets grow together")
}

fn check_finite_bounds(
    what: &str,
    directions: &[DirectionSpec],
    names: &[&str],
    diagnostics: &mut Vec<String>,
) {
    if names.is_empty() {
        return;
    }
    let rows: Vec<Vec<f64>> = directions.iter().map(|d| d.coeffs.clone()).collect();
    let lower: Vec<f64> = directions
        .iter()
        .map(|d| d.lower.unwrap_or(f64::NEG_INFINITY))
        .collect();
    let upper: Vec<f64> = directions
        .iter()
        .map(|d| d.upper.unwrap_or(f64::INFINITY))
        .collect();
    let system = direction_system(names.len(), &rows, &lower, &upper);
    let mut obj = DVector::zeros(names.len());
    for (i, name) in names.iter().enumerate() {
        obj[i] = 1.;
        if system.minimize(&obj).status() == Status::Unbounded {
            diagnostics.push(format!("{} {} has no finite lower bound", what, name));
        }
        if system.maximize(&obj).status() == Status::Unbounded {
            diagnostics.push(format!("{} {} has no finite upper bound", what, name));
        }
        obj[i] = 0.;
    }
}

// tighten every direction's bounds to the extrema over the whole system
fn optimize_bounds(directions: &[Vec<f64>], lower: &mut [f64], upper: &mut [f64]) -> Result<()> {
    let n = directions.first().map_or(0, Vec::len);
    let system = direction_system(n, directions, lower, upper);
    for (i, dir) in directions.iter().enumerate() {
        let obj = DVector::from_vec(dir.clone());
        let min = system.minimize(&obj);
        let max = system.maximize(&obj);
        if min.status() == Status::Infeasible || max.status() == Status::Infeasible {
            return Err(Error::Infeasible);
        }
        if min.status() == Status::OptimumAvailable {
            lower[i] = lower[i].max(min.optimum());
        }
        if max.status() == Status::OptimumAvailable {
            upper[i] = upper[i].min(max.optimum());
        }
    }
    Ok(())
}

/// Drop the directions no template row mentions and remap the template onto
/// the reduced direction list.
fn trim_unused_directions(
    directions: &mut Vec<Vec<f64>>,
    lower: &mut Vec<f64>,
    upper: &mut Vec<f64>,
    template: &mut [Vec<usize>],
) {
    let mut new_pos: Vec<Option<usize>> = vec![None; directions.len()];
    let mut kept = 0;
    for row in template.iter() {
        for idx in row {
            if new_pos[*idx].is_none() {
                new_pos[*idx] = Some(kept);
                kept += 1;
            }
        }
    }
    let mut new_dirs = vec![Vec::new(); kept];
    let mut new_lower = vec![0.; kept];
    let mut new_upper = vec![0.; kept];
    for (old, pos) in new_pos.iter().enumerate() {
        if let Some(pos) = pos {
            new_dirs[*pos] = directions[old].clone();
            new_lower[*pos] = lower[old];
            new_upper[*pos] = upper[old];
        }
    }
    *directions = new_dirs;
    *lower = new_lower;
    *upper = new_upper;
    for row in template.iter_mut() {
        for idx in row.iter_mut() {
            *idx = new_pos[*idx].expect("template indices were just recorded");
        }
    }
}

/// The outcome of running a model.
#[derive(Debug)]
pub enum Outcome {
    /// The flowpipe of a reachability problem.
    Reach(Flowpipe),
    /// The refined parameter sets of a synthesis problem.
    Synthesis(Vec<PolytopesUnion>),
}

/// A validated, ready-to-run model.
#[derive(Debug)]
pub struct Model {
    problem: ProblemKind,
    iterations: u32,
    system: DynamicalSystem,
    initial_set: Bundle,
    parameter_set: Option<PolytopesUnion>,
    assumptions: Option<Polytope>,
    spec: Option<Formula>,
    mode: TransformMode,
    decomposition: Option<(f64, u32)>,
    max_bundle_magnitude: f64,
    max_param_splits: u32,
    pre_splits: u32,
    seed: u64,
}

impl Model {
    /// The problem kind.
    pub fn problem(&self) -> ProblemKind {
        self.problem
    }

    /// The number of analysis steps.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// The dynamical system.
    pub fn system(&self) -> &DynamicalSystem {
        &self.system
    }

    /// The initial bundle.
    pub fn initial_set(&self) -> &Bundle {
        &self.initial_set
    }

    /// The parameter set, when parameter directions were declared.
    pub fn parameter_set(&self) -> Option<&PolytopesUnion> {
        self.parameter_set.as_ref()
    }

    /// The STL specification, when one was declared.
    pub fn spec(&self) -> Option<&Formula> {
        self.spec.as_ref()
    }

    /// An engine configured with this model's options.
    pub fn engine(&self) -> Engine {
        let mut engine = Engine::new(self.system.clone())
            .with_mode(self.mode)
            .with_max_bundle_magnitude(self.max_bundle_magnitude)
            .with_max_param_splits(self.max_param_splits)
            .with_pre_splits(self.pre_splits)
            .with_seed(self.seed);
        if let Some(assumptions) = &self.assumptions {
            engine = engine.with_assumptions(assumptions.clone());
        }
        if let Some((weight, iterations)) = self.decomposition {
            engine = engine.with_decomposition(weight, iterations);
        }
        engine
    }

    /// Run the model: a flowpipe for reachability, refined parameter sets for
    /// synthesis.
    ///
    /// # Errors
    /// Propagates engine failures; see [`Engine::reach`] and
    /// [`Engine::synthesize`].
    ///
    /// [`Engine::reach`]: ../engine/struct.Engine.html#method.reach
    /// [`Engine::synthesize`]: ../engine/struct.Engine.html#method.synthesize
    pub fn run(&self) -> Result<Outcome> {
        let engine = self.engine();
        match self.problem {
            ProblemKind::Reach => {
                let flowpipe = match &self.parameter_set {
                    Some(para_set) => engine.reach_parametric(
                        self.initial_set.clone(),
                        para_set,
                        self.iterations,
                    )?,
                    None => engine.reach(self.initial_set.clone(), self.iterations)?,
                };
                Ok(Outcome::Reach(flowpipe))
            }
            ProblemKind::Synthesis => {
                let spec = self
                    .spec
                    .as_ref()
                    .expect("synthesis specs are checked at build time");
                let para_set = self
                    .parameter_set
                    .as_ref()
                    .expect("synthesis parameter sets are checked at build time");
                let refined = engine.synthesize(&self.initial_set, para_set, spec)?;
                Ok(Outcome::Synthesis(refined))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_var_spec() -> ProblemSpec {
        let x = Expression::from(Symbol::new("x"));
        let y = Expression::from(Symbol::new("y"));
        let mut spec = ProblemSpec::new(ProblemKind::Reach);
        spec.iterations = Some(1);
        spec.variables = vec![
            VariableSpec::new("x", 0.5 * &x),
            VariableSpec::new("y", 0.5 * &y),
        ];
        spec
    }

    #[test]
    fn test_unbounded_direction_is_reported() {
        let mut spec = two_var_spec();
        spec.directions = vec![
            DirectionSpec::bounded(vec![1., 0.], 0., 1.),
            DirectionSpec {
                coeffs: vec![0., 1.],
                lower: Some(0.),
                upper: None,
            },
        ];
        let diagnostics = spec.check();
        assert!(
            diagnostics
                .iter()
                .any(|d| d.contains("has no finite upper bound")),
            "{:?}",
            diagnostics
        );
        assert!(spec.build().is_err());
    }

    #[test]
    fn test_singular_template_row_is_reported() {
        let mut spec = two_var_spec();
        spec.directions = vec![
            DirectionSpec::bounded(vec![1., 0.], 0., 1.),
            DirectionSpec::bounded(vec![2., 0.], 0., 2.),
            DirectionSpec::bounded(vec![0., 1.], 0., 1.),
        ];
        spec.template = vec![vec![0, 1]];
        let diagnostics = spec.check();
        assert!(
            diagnostics
                .iter()
                .any(|d| d.contains("defines an unbounded parallelotope")),
            "{:?}",
            diagnostics
        );
    }

    #[test]
    fn test_missing_pieces_are_reported() {
        let mut spec = ProblemSpec::new(ProblemKind::Synthesis);
        spec.variables = vec![VariableSpec {
            name: "x".to_string(),
            dynamic: None,
        }];
        let diagnostics = spec.check();
        assert!(diagnostics.iter().any(|d| d.contains("iterations")));
        assert!(diagnostics.iter().any(|d| d.contains("has no dynamic")));
        assert!(diagnostics.iter().any(|d| d.contains("specification")));
    }

    #[test]
    fn test_template_trims_unused_directions() {
        let mut spec = two_var_spec();
        spec.directions = vec![
            DirectionSpec::bounded(vec![1., 0.], 0., 1.),
            DirectionSpec::bounded(vec![1., 1.], 0., 2.),
            DirectionSpec::bounded(vec![0., 1.], 0., 1.),
        ];
        // only directions 0 and 2 are used
        spec.template = vec![vec![0, 2]];
        let model = spec.build().unwrap();
        assert_eq!(model.initial_set().size(), 2);
        assert_eq!(model.initial_set().templates(), &[vec![0, 1]]);
    }

    #[test]
    fn test_boundary_optimisation_tightens() {
        let mut spec = two_var_spec();
        // the diagonal bound is looser than the box implies
        spec.directions = vec![
            DirectionSpec::bounded(vec![1., 0.], 0., 1.),
            DirectionSpec::bounded(vec![0., 1.], 0., 1.),
            DirectionSpec::bounded(vec![1., 1.], -10., 10.),
        ];
        spec.template = vec![vec![0, 1], vec![0, 2], vec![1, 2]];
        let model = spec.build().unwrap();
        assert!((model.initial_set().offp(2) - 2.).abs() < 1e-9);
        assert!((model.initial_set().offm(2) - 0.).abs() < 1e-9);
    }

    #[test]
    fn test_run_reach() {
        let mut spec = two_var_spec();
        spec.directions = vec![
            DirectionSpec::bounded(vec![1., 0.], 0., 1.),
            DirectionSpec::bounded(vec![0., 1.], 0., 1.),
        ];
        match spec.build().unwrap().run().unwrap() {
            Outcome::Reach(flowpipe) => {
                assert_eq!(flowpipe.len(), 2);
                let obj = DVector::from_vec(vec![1., 0.]);
                assert!((flowpipe.get(1).unwrap().maximize(&obj) - 0.5).abs() < 1e-9);
            }
            Outcome::Synthesis(_) => panic!("expected a flowpipe"),
        }
    }
}
