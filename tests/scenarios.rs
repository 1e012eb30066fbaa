//! End-to-end scenarios: small systems with independently computed reach
//! bounds, validation diagnostics and parameter synthesis outcomes.

use nalgebra::{DMatrix, DVector};

use pika::dynamics::DynamicalSystem;
use pika::engine::Engine;
use pika::model::{DirectionSpec, ProblemKind, ProblemSpec, VariableSpec};
use pika::sets::{Bundle, Polytope, TransformMode};
use pika::stl::{Formula, FormulaKind, TimeInterval};
use pika::symbolic::{Expression, Symbol};
use pika::PolytopesUnion;

fn segment(lo: f64, hi: f64) -> Bundle {
    Bundle::new(
        DMatrix::identity(1, 1),
        DVector::from_vec(vec![hi]),
        DVector::from_vec(vec![-lo]),
        vec![vec![0]],
    )
    .unwrap()
}

fn scaling_system() -> DynamicalSystem {
    // x' = p x
    let x = Symbol::new("x");
    let p = Symbol::new("p");
    DynamicalSystem::new(
        vec![x],
        vec![p],
        vec![&Expression::from(p) * &Expression::from(x)],
    )
    .unwrap()
}

fn interval_union(lo: f64, hi: f64) -> PolytopesUnion {
    PolytopesUnion::from_polytope(Polytope::from_box(&[lo], &[hi]).unwrap())
}

#[test]
fn scalar_linear_flowpipe() {
    // x' = 0.5 x from [0, 1]: upper bounds halve each step
    let x = Symbol::new("x");
    let system = DynamicalSystem::new(vec![x], vec![], vec![0.5 * &Expression::from(x)]).unwrap();
    let engine = Engine::new(system);
    let flowpipe = engine.reach(segment(0., 1.), 3).unwrap();
    assert_eq!(flowpipe.len(), 4);
    let obj = DVector::from_vec(vec![1.]);
    for (step, upper) in [1., 0.5, 0.25, 0.125].iter().enumerate() {
        let union = flowpipe.get(step).unwrap();
        assert!((union.maximize(&obj) - upper).abs() < 1e-9);
        assert!(union.minimize(&obj).abs() < 1e-9);
        // the flowpipe contains the exact reach set of the step
        assert!(union.contains_point(&DVector::from_vec(vec![*upper])));
        assert!(union.contains_point(&DVector::from_vec(vec![0.])));
    }
}

#[test]
fn sir_stays_within_bounds() {
    // s' = s - beta s i, i' = i + beta s i - gamma i, with the classic
    // three-direction bundle {e1, e2, e1 + e2}
    let s = Symbol::new("s");
    let i = Symbol::new("i");
    let sv = Expression::from(s);
    let iv = Expression::from(i);
    let si = &sv * &iv;
    let system = DynamicalSystem::new(
        vec![s, i],
        vec![],
        vec![
            &sv - &(0.34 * &si),
            &(&iv + &(0.34 * &si)) - &(0.05 * &iv),
        ],
    )
    .unwrap();

    let directions = DMatrix::from_row_slice(3, 2, &[1., 0., 0., 1., 1., 1.]);
    let init = Bundle::new(
        directions,
        DVector::from_vec(vec![0.95, 0.15, 1.10]),
        DVector::from_vec(vec![-0.85, -0.05, -0.90]),
        vec![vec![0, 1], vec![0, 2], vec![1, 2]],
    )
    .unwrap();

    let engine = Engine::new(system).with_mode(TransformMode::Afo);
    let flowpipe = engine.reach(init, 20).unwrap();
    assert_eq!(flowpipe.len(), 21);

    // infected maxima computed independently from the same bundle recurrence
    let expected_i_max = [
        0.150000000000,
        0.190950000000,
        0.239933830650,
        0.296840244324,
        0.360640321320,
        0.429191893089,
        0.499276544415,
        0.566972738732,
        0.628333976646,
        0.680158489378,
        0.720543830774,
        0.749019930647,
        0.766284790740,
        0.773744719681,
        0.773075436782,
        0.765920214138,
        0.753735697491,
        0.737742944516,
        0.718935156555,
        0.698107941801,
        0.675893854849,
    ];
    let e_s = DVector::from_vec(vec![1., 0.]);
    let e_i = DVector::from_vec(vec![0., 1.]);
    for (step, expected) in expected_i_max.iter().enumerate() {
        let union = flowpipe.get(step).unwrap();
        let i_max = union.maximize(&e_i);
        assert!(
            (i_max - expected).abs() < 1e-6,
            "step {}: infected bound {} vs {}",
            step,
            i_max,
            expected
        );
        // both populations stay within [0, 1]
        assert!(union.maximize(&e_s) <= 1. + 1e-9);
        assert!(i_max <= 1. + 1e-9);
        assert!(union.minimize(&e_s) >= -1e-9);
        assert!(union.minimize(&e_i) >= -1e-9);
    }
}

#[test]
fn unbounded_direction_diagnostic() {
    // directions {e1, e2} with offsets bounding only e1
    let x = Expression::from(Symbol::new("x"));
    let y = Expression::from(Symbol::new("y"));
    let mut spec = ProblemSpec::new(ProblemKind::Reach);
    spec.iterations = Some(1);
    spec.variables = vec![
        VariableSpec::new("x", 0.5 * &x),
        VariableSpec::new("y", 0.5 * &y),
    ];
    spec.directions = vec![
        DirectionSpec::bounded(vec![1., 0.], 0., 1.),
        DirectionSpec {
            coeffs: vec![0., 1.],
            lower: None,
            upper: None,
        },
    ];
    let diagnostics = spec.check();
    assert!(diagnostics
        .iter()
        .any(|d| d.contains("has no finite upper bound")));
    assert!(diagnostics
        .iter()
        .any(|d| d.contains("has no finite lower bound")));
    assert!(spec.build().is_err());
}

#[test]
fn singular_template_diagnostic() {
    // directions {e1, 2 e1, e2}; the template row (0, 1) has rank 1
    let x = Expression::from(Symbol::new("x"));
    let y = Expression::from(Symbol::new("y"));
    let mut spec = ProblemSpec::new(ProblemKind::Reach);
    spec.iterations = Some(1);
    spec.variables = vec![
        VariableSpec::new("x", 0.5 * &x),
        VariableSpec::new("y", 0.5 * &y),
    ];
    spec.directions = vec![
        DirectionSpec::bounded(vec![1., 0.], 0., 1.),
        DirectionSpec::bounded(vec![2., 0.], 0., 2.),
        DirectionSpec::bounded(vec![0., 1.], 0., 1.),
    ];
    spec.template = vec![vec![0, 1]];
    let diagnostics = spec.check();
    assert!(diagnostics
        .iter()
        .any(|d| d.contains("defines an unbounded parallelotope")));
    assert!(spec.build().is_err());
}

#[test]
fn negated_always_normalises_to_eventually() {
    // !G_[0,2](x <= 3) becomes F_[0,2](x > 3), encoded as an atom on 3 - x
    let x = Expression::from(Symbol::new("x"));
    let phi = Formula::negation(Formula::always(
        TimeInterval::new(0, 2),
        Formula::atom(&x - &Expression::from(3.)),
    ));
    let pnf = phi.pnf();
    assert!(pnf.is_negation_free());
    assert_eq!(pnf.kind(), FormulaKind::Eventually);
    assert_eq!(pnf.time_bounds(), TimeInterval::new(0, 2));
}

#[test]
fn synthesis_of_contraction_rate() {
    // x' = p x with p in [0.1, 2]: G_[0,5](x <= 1) from x in [0.5, 1]
    // demands p <= 1
    let x = Symbol::new("x");
    let phi = Formula::always(
        TimeInterval::new(0, 5),
        Formula::atom(&Expression::from(x) - &Expression::from(1.)),
    );
    let engine = Engine::new(scaling_system()).with_max_param_splits(6);
    let refined = engine
        .synthesize(&segment(0.5, 1.), &interval_union(0.1, 2.), &phi)
        .unwrap();

    assert!(refined.iter().any(|u| !u.is_empty()));
    let obj = DVector::from_vec(vec![1.]);
    let original = Polytope::from_box(&[0.1], &[2.]).unwrap();
    for union in &refined {
        if union.is_empty() {
            continue;
        }
        // no retained parameter exceeds the contraction threshold
        assert!(union.maximize(&obj) <= 1. + 1e-6);
        // the refined sets shrink the original parameter set
        for polytope in union.iter() {
            assert!(original.contains(polytope));
        }
    }
    // some clearly safe parameter survives
    let survivors: Vec<_> = refined.iter().filter(|u| !u.is_empty()).collect();
    assert!(survivors
        .iter()
        .any(|u| u.contains_point(&DVector::from_vec(vec![0.3]))));
}

#[test]
fn synthesis_of_eventual_decay() {
    // F_[0,3](x <= 0.2) holds for slow enough growth rates
    let x = Symbol::new("x");
    let phi = Formula::eventually(
        TimeInterval::new(0, 3),
        Formula::atom(&Expression::from(x) - &Expression::from(0.2)),
    );

    let engine = Engine::new(scaling_system());
    let refined = engine
        .synthesize(&segment(0.5, 1.), &interval_union(0.1, 0.5), &phi)
        .unwrap();
    assert!(refined.iter().any(|u| !u.is_empty()));

    // rates that keep x above the threshold for the whole window fail
    let engine = Engine::new(scaling_system()).with_max_param_splits(2);
    let refined = engine
        .synthesize(&segment(0.5, 1.), &interval_union(0.7, 1.), &phi)
        .unwrap();
    assert!(refined.iter().all(|u| u.is_empty()));
}

#[test]
fn synthesis_with_parameter_atom() {
    // a conjunct constraining the parameter directly survives as a half-space
    let x = Symbol::new("x");
    let p = Symbol::new("p");
    let phi = Formula::conjunction(
        Formula::atom(&Expression::from(x) - &Expression::from(1.)),
        Formula::atom(&Expression::from(p) - &Expression::from(1.5)),
    );
    let engine = Engine::new(scaling_system());
    let refined = engine
        .synthesize(&segment(0.5, 1.), &interval_union(0.1, 2.), &phi)
        .unwrap();
    assert_eq!(refined.len(), 1);
    let obj = DVector::from_vec(vec![1.]);
    assert!((refined[0].maximize(&obj) - 1.5).abs() < 1e-9);
    assert!((refined[0].minimize(&obj) - 0.1).abs() < 1e-9);
}

#[test]
fn parametric_reach_merges_parameter_branches() {
    let engine = Engine::new(scaling_system());
    let mut para_set = interval_union(0.5, 1.);
    para_set.add(Polytope::from_box(&[2.], &[2.]).unwrap());
    let flowpipe = engine
        .reach_parametric(segment(1., 1.), &para_set, 2)
        .unwrap();
    assert_eq!(flowpipe.len(), 3);
    let obj = DVector::from_vec(vec![1.]);
    // the union covers both the contracting and the doubling branch
    assert!((flowpipe.get(1).unwrap().maximize(&obj) - 2.).abs() < 1e-9);
    assert!((flowpipe.get(1).unwrap().minimize(&obj) - 0.5).abs() < 1e-9);
    assert!((flowpipe.get(2).unwrap().maximize(&obj) - 4.).abs() < 1e-9);
    assert!((flowpipe.get(2).unwrap().minimize(&obj) - 0.25).abs() < 1e-9);
}

#[test]
fn decomposition_keeps_exact_linear_bounds() {
    let x = Symbol::new("x");
    let y = Symbol::new("y");
    let system = DynamicalSystem::new(
        vec![x, y],
        vec![],
        vec![0.5 * &Expression::from(x), 0.5 * &Expression::from(y)],
    )
    .unwrap();
    let init = Bundle::new(
        DMatrix::identity(2, 2),
        DVector::from_vec(vec![1., 1.]),
        DVector::from_vec(vec![0., 0.]),
        vec![vec![0, 1]],
    )
    .unwrap();
    let engine = Engine::new(system)
        .with_decomposition(0.5, 20)
        .with_seed(7);
    let flowpipe = engine.reach(init, 2).unwrap();
    let obj = DVector::from_vec(vec![1., 0.]);
    assert!((flowpipe.get(2).unwrap().maximize(&obj) - 0.25).abs() < 1e-9);
}

#[test]
fn ofo_mode_matches_afo_on_single_template() {
    let x = Symbol::new("x");
    let system =
        DynamicalSystem::new(vec![x], vec![], vec![0.5 * &Expression::from(x)]).unwrap();
    let afo = Engine::new(system.clone()).with_mode(TransformMode::Afo);
    let ofo = Engine::new(system).with_mode(TransformMode::Ofo);
    let obj = DVector::from_vec(vec![1.]);
    let a = afo.reach(segment(0., 1.), 3).unwrap();
    let b = ofo.reach(segment(0., 1.), 3).unwrap();
    for step in 0..a.len() {
        let ma = a.get(step).unwrap().maximize(&obj);
        let mb = b.get(step).unwrap().maximize(&obj);
        assert!((ma - mb).abs() < 1e-9);
    }
}
