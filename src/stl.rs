//! Signal Temporal Logic formulas.
//!
//! A formula is an immutable tree over polynomial predicates: an atom `p`
//! holds on a state when `p ≤ 0`. Synthesis operates on formulas in Positive
//! Normal Form, where negation has been pushed into the atoms; [`pnf`]
//! performs that rewrite, so downstream code only ever sees negation-free
//! trees.
//!
//! [`pnf`]: ./enum.Formula.html#method.pnf

use std::collections::BTreeSet;
use std::fmt;

use crate::symbolic::{Expression, Symbol};

/// A discrete time interval `[begin, end]` attached to a temporal operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    begin: u32,
    end: u32,
}

impl TimeInterval {
    /// Create the interval `[begin, end]`.
    pub fn new(begin: u32, end: u32) -> TimeInterval {
        TimeInterval { begin, end }
    }

    /// The degenerate interval `[0, 0]` carried by propositional nodes.
    pub fn zero() -> TimeInterval {
        TimeInterval { begin: 0, end: 0 }
    }

    /// The first instant of the interval.
    pub fn begin(&self) -> u32 {
        self.begin
    }

    /// The last instant of the interval.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Whether the interval contains no instant.
    pub fn is_empty(&self) -> bool {
        self.end < self.begin
    }

    /// Whether the whole interval lies strictly after the given instant.
    pub fn is_after(&self, time: u32) -> bool {
        self.begin > time
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{},{}]", self.begin, self.end)
    }
}

/// The node kind of a formula, used to dispatch without matching the whole
/// tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaKind {
    /// An atomic predicate.
    Atom,
    /// A negation (absent after PNF).
    Negation,
    /// A conjunction.
    Conjunction,
    /// A disjunction.
    Disjunction,
    /// A time-bounded always.
    Always,
    /// A time-bounded eventually.
    Eventually,
    /// A time-bounded until.
    Until,
}

/// An STL formula.
///
/// # Examples
/// ```
/// # use pika::stl::{Formula, TimeInterval};
/// # use pika::symbolic::{Expression, Symbol};
/// // G_[0,2](x <= 3), negated and normalised: F_[0,2](x > 3)
/// let x = Expression::from(Symbol::new("x"));
/// let phi = Formula::negation(Formula::always(
///     TimeInterval::new(0, 2),
///     Formula::atom(&x - &Expression::from(3.)),
/// ));
/// let pnf = phi.pnf();
/// assert_eq!(pnf.kind(), pika::stl::FormulaKind::Eventually);
/// ```
#[derive(Debug, Clone)]
pub enum Formula {
    /// `p ≤ 0` for a polynomial predicate `p`.
    Atom(Expression),
    /// `¬φ`; only produced by construction, erased by [`pnf`].
    ///
    /// [`pnf`]: ./enum.Formula.html#method.pnf
    Negation(Box<Formula>),
    /// `φ ∧ ψ`.
    Conjunction(Box<Formula>, Box<Formula>),
    /// `φ ∨ ψ`.
    Disjunction(Box<Formula>, Box<Formula>),
    /// `G_[a,b] φ`.
    Always(TimeInterval, Box<Formula>),
    /// `F_[a,b] φ`.
    Eventually(TimeInterval, Box<Formula>),
    /// `φ U_[a,b] ψ`.
    Until(TimeInterval, Box<Formula>, Box<Formula>),
}

impl Formula {
    /// An atomic predicate `p ≤ 0`.
    pub fn atom(p: Expression) -> Formula {
        Formula::Atom(p)
    }

    /// The always-true atom `-1 ≤ 0`.
    pub fn truth() -> Formula {
        Formula::Atom(Expression::constant(-1.))
    }

    /// The negation of a formula.
    pub fn negation(phi: Formula) -> Formula {
        Formula::Negation(Box::new(phi))
    }

    /// The conjunction of two formulas.
    pub fn conjunction(phi: Formula, psi: Formula) -> Formula {
        Formula::Conjunction(Box::new(phi), Box::new(psi))
    }

    /// The disjunction of two formulas.
    pub fn disjunction(phi: Formula, psi: Formula) -> Formula {
        Formula::Disjunction(Box::new(phi), Box::new(psi))
    }

    /// `G_[a,b] φ`.
    pub fn always(interval: TimeInterval, phi: Formula) -> Formula {
        Formula::Always(interval, Box::new(phi))
    }

    /// `F_[a,b] φ`.
    pub fn eventually(interval: TimeInterval, phi: Formula) -> Formula {
        Formula::Eventually(interval, Box::new(phi))
    }

    /// `φ U_[a,b] ψ`.
    pub fn until(interval: TimeInterval, phi: Formula, psi: Formula) -> Formula {
        Formula::Until(interval, Box::new(phi), Box::new(psi))
    }

    /// The kind of the root node.
    pub fn kind(&self) -> FormulaKind {
        match self {
            Formula::Atom(_) => FormulaKind::Atom,
            Formula::Negation(_) => FormulaKind::Negation,
            Formula::Conjunction(..) => FormulaKind::Conjunction,
            Formula::Disjunction(..) => FormulaKind::Disjunction,
            Formula::Always(..) => FormulaKind::Always,
            Formula::Eventually(..) => FormulaKind::Eventually,
            Formula::Until(..) => FormulaKind::Until,
        }
    }

    /// The time horizon of the formula: the interval of instants its
    /// semantics may inspect. Temporal operators shift by the bounds of
    /// their subformulas; propositional nodes have a degenerate horizon.
    pub fn time_bounds(&self) -> TimeInterval {
        match self {
            Formula::Atom(_) => TimeInterval::zero(),
            Formula::Negation(phi) => phi.time_bounds(),
            Formula::Conjunction(phi, psi) | Formula::Disjunction(phi, psi) => {
                let a = phi.time_bounds();
                let b = psi.time_bounds();
                TimeInterval::new(a.begin().min(b.begin()), a.end().max(b.end()))
            }
            Formula::Always(itv, phi) | Formula::Eventually(itv, phi) => {
                let sub = phi.time_bounds();
                TimeInterval::new(itv.begin() + sub.begin(), itv.end() + sub.end())
            }
            Formula::Until(itv, phi, psi) => {
                let a = phi.time_bounds();
                let b = psi.time_bounds();
                TimeInterval::new(
                    itv.begin() + a.begin().min(b.begin()),
                    itv.end() + a.end().max(b.end()),
                )
            }
        }
    }

    /// The set of state symbols appearing in the formula's predicates.
    pub fn variables(&self) -> BTreeSet<Symbol> {
        match self {
            Formula::Atom(p) => p.variables(),
            Formula::Negation(phi) => phi.variables(),
            Formula::Always(_, phi) | Formula::Eventually(_, phi) => phi.variables(),
            Formula::Conjunction(phi, psi)
            | Formula::Disjunction(phi, psi)
            | Formula::Until(_, phi, psi) => {
                let mut out = phi.variables();
                out.extend(psi.variables());
                out
            }
        }
    }

    /// An equivalent formula in Positive Normal Form: negation is pushed down
    /// and absorbed into the atoms, so no [`Negation`] node remains. The
    /// negation of a non-strict atom is the strict complement, which is
    /// downgraded to the non-strict `Atom(-p)`.
    ///
    /// [`Negation`]: ./enum.Formula.html#variant.Negation
    pub fn pnf(&self) -> Formula {
        self.pnf_signed(false)
    }

    fn pnf_signed(&self, negated: bool) -> Formula {
        match self {
            Formula::Atom(p) => {
                if negated {
                    // not (p <= 0)  ~~>  -p <= 0
                    Formula::Atom(-p)
                } else {
                    Formula::Atom(p.clone())
                }
            }
            Formula::Negation(phi) => phi.pnf_signed(!negated),
            Formula::Conjunction(phi, psi) => {
                let left = phi.pnf_signed(negated);
                let right = psi.pnf_signed(negated);
                if negated {
                    Formula::disjunction(left, right)
                } else {
                    Formula::conjunction(left, right)
                }
            }
            Formula::Disjunction(phi, psi) => {
                let left = phi.pnf_signed(negated);
                let right = psi.pnf_signed(negated);
                if negated {
                    Formula::conjunction(left, right)
                } else {
                    Formula::disjunction(left, right)
                }
            }
            Formula::Always(itv, phi) => {
                let sub = phi.pnf_signed(negated);
                if negated {
                    Formula::eventually(*itv, sub)
                } else {
                    Formula::always(*itv, sub)
                }
            }
            Formula::Eventually(itv, phi) => {
                let sub = phi.pnf_signed(negated);
                if negated {
                    Formula::always(*itv, sub)
                } else {
                    Formula::eventually(*itv, sub)
                }
            }
            Formula::Until(itv, phi, psi) => {
                if negated {
                    // not (phi U psi) == (not psi U (not phi and not psi))
                    //                    or G not psi
                    let not_phi = phi.pnf_signed(true);
                    let not_psi = psi.pnf_signed(true);
                    Formula::disjunction(
                        Formula::until(
                            *itv,
                            not_psi.clone(),
                            Formula::conjunction(not_phi, not_psi.clone()),
                        ),
                        Formula::always(*itv, not_psi),
                    )
                } else {
                    Formula::until(*itv, phi.pnf_signed(false), psi.pnf_signed(false))
                }
            }
        }
    }

    /// Whether the formula contains no negation node.
    pub fn is_negation_free(&self) -> bool {
        match self {
            Formula::Atom(_) => true,
            Formula::Negation(_) => false,
            Formula::Always(_, phi) | Formula::Eventually(_, phi) => phi.is_negation_free(),
            Formula::Conjunction(phi, psi)
            | Formula::Disjunction(phi, psi)
            | Formula::Until(_, phi, psi) => phi.is_negation_free() && psi.is_negation_free(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Formula::Atom(p) => write!(f, "{} <= 0", p),
            Formula::Negation(phi) => write!(f, "!({})", phi),
            Formula::Conjunction(phi, psi) => write!(f, "({} && {})", phi, psi),
            Formula::Disjunction(phi, psi) => write!(f, "({} || {})", phi, psi),
            Formula::Always(itv, phi) => write!(f, "G_{}({})", itv, phi),
            Formula::Eventually(itv, phi) => write!(f, "F_{}({})", itv, phi),
            Formula::Until(itv, phi, psi) => write!(f, "({} U_{} {})", phi, itv, psi),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbolic::Symbol;
    use std::collections::HashMap;

    fn x_minus(c: f64) -> Expression {
        &Expression::from(Symbol::new("x")) - &Expression::from(c)
    }

    #[test]
    fn test_negated_always_becomes_eventually() {
        // !G_[0,2](x - 3 <= 0) == F_[0,2](3 - x <= 0)
        let phi = Formula::negation(Formula::always(
            TimeInterval::new(0, 2),
            Formula::atom(x_minus(3.)),
        ));
        let pnf = phi.pnf();
        assert!(pnf.is_negation_free());
        match &pnf {
            Formula::Eventually(itv, sub) => {
                assert_eq!(*itv, TimeInterval::new(0, 2));
                match sub.as_ref() {
                    Formula::Atom(p) => {
                        // the absorbed predicate is -(x - 3): negative for x > 3
                        let mut sub = HashMap::new();
                        sub.insert(Symbol::new("x"), Expression::constant(4.));
                        assert_eq!(p.replace(&sub).evaluate().unwrap(), -1.);
                    }
                    other => panic!("expected atom, got {}", other),
                }
            }
            other => panic!("expected eventually, got {}", other),
        }
    }

    #[test]
    fn test_de_morgan() {
        let phi = Formula::negation(Formula::conjunction(
            Formula::atom(x_minus(1.)),
            Formula::negation(Formula::atom(x_minus(2.))),
        ));
        let pnf = phi.pnf();
        assert!(pnf.is_negation_free());
        match pnf {
            Formula::Disjunction(left, right) => {
                assert_eq!(left.kind(), FormulaKind::Atom);
                // the double negation collapsed
                assert_eq!(right.kind(), FormulaKind::Atom);
            }
            other => panic!("expected disjunction, got {}", other),
        }
    }

    #[test]
    fn test_negated_until() {
        let phi = Formula::negation(Formula::until(
            TimeInterval::new(1, 4),
            Formula::atom(x_minus(1.)),
            Formula::atom(x_minus(2.)),
        ));
        let pnf = phi.pnf();
        assert!(pnf.is_negation_free());
        match pnf {
            Formula::Disjunction(left, right) => {
                assert_eq!(left.kind(), FormulaKind::Until);
                assert_eq!(right.kind(), FormulaKind::Always);
            }
            other => panic!("expected disjunction, got {}", other),
        }
    }

    #[test]
    fn test_time_bounds() {
        let inner = Formula::eventually(TimeInterval::new(2, 3), Formula::atom(x_minus(0.)));
        let phi = Formula::always(TimeInterval::new(0, 5), inner);
        assert_eq!(phi.time_bounds(), TimeInterval::new(2, 8));
        assert_eq!(Formula::truth().time_bounds(), TimeInterval::zero());
    }

    #[test]
    fn test_variables() {
        let y = Expression::from(Symbol::new("y"));
        let phi = Formula::conjunction(Formula::atom(x_minus(1.)), Formula::atom(y));
        let vars = phi.variables();
        assert!(vars.contains(&Symbol::new("x")));
        assert!(vars.contains(&Symbol::new("y")));
        assert_eq!(vars.len(), 2);
    }
}
