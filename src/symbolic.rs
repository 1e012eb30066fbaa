//! Symbolic polynomial expressions over named symbols.
//!
//! [`Symbol`]s are interned in a process-wide registry so that identity is a
//! stable id rather than a string, which keeps substitution capture-free
//! across modules. [`Expression`]s are immutable arc-shared trees: cloning is
//! cheap and substitution builds a new tree without touching the input.
//!
//! [`Symbol`]: ./struct.Symbol.html
//! [`Expression`]: ./struct.Expression.html

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use crate::{Error, Result};

struct Registry {
    names: Vec<String>,
    ids: HashMap<String, u32>,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        RwLock::new(Registry {
            names: Vec::new(),
            ids: HashMap::new(),
        })
    })
}

/// A named free variable of a polynomial expression.
///
/// Identity is the interned id: two symbols created from the same name are
/// the same symbol.
///
/// # Examples
/// ```
/// # use pika::symbolic::Symbol;
/// assert_eq!(Symbol::new("x"), Symbol::new("x"));
/// assert_ne!(Symbol::new("x"), Symbol::new("y"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    /// Get the symbol with the given name, interning it if necessary.
    pub fn new(name: &str) -> Symbol {
        if let Some(id) = registry().read().unwrap().ids.get(name) {
            return Symbol(*id);
        }
        let mut reg = registry().write().unwrap();
        if let Some(id) = reg.ids.get(name) {
            return Symbol(*id);
        }
        let id = reg.names.len() as u32;
        reg.names.push(name.to_string());
        reg.ids.insert(name.to_string(), id);
        Symbol(id)
    }

    /// Create a symbol with a generated name that has never been interned
    /// before. Used for the per-call generator coordinates of a bundle
    /// transformation, which must not capture user symbols.
    pub fn fresh(prefix: &str) -> Symbol {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}#{}", prefix, n);
            if !registry().read().unwrap().ids.contains_key(&name) {
                return Symbol::new(&name);
            }
        }
    }

    /// The name this symbol was interned under.
    pub fn name(&self) -> String {
        registry().read().unwrap().names[self.0 as usize].clone()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug)]
enum Node {
    Constant(f64),
    Variable(Symbol),
    Add(Expression, Expression),
    Sub(Expression, Expression),
    Mul(Expression, Expression),
    Div(Expression, Expression),
    Neg(Expression),
    Pow(Expression, u32),
}

/// A polynomial expression in named symbols over doubles.
///
/// Expressions are built with the usual operators and are immutable; all
/// operations return new expressions. Subtrees are arc-shared so cloning is
/// cheap.
///
/// # Examples
/// ```
/// # use pika::symbolic::{Expression, Symbol};
/// # use std::collections::HashMap;
/// let x = Expression::from(Symbol::new("x"));
/// let e = &(&x * &x) + &Expression::from(1.);
/// let mut sub = HashMap::new();
/// sub.insert(Symbol::new("x"), Expression::from(3.));
/// assert_eq!(e.replace(&sub).evaluate().unwrap(), 10.);
/// ```
#[derive(Clone, Debug)]
pub struct Expression {
    node: Arc<Node>,
}

fn make(node: Node) -> Expression {
    Expression {
        node: Arc::new(node),
    }
}

fn add_fold(a: Expression, b: Expression) -> Expression {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) => Expression::constant(x + y),
        (Some(x), _) if x == 0. => b,
        (_, Some(y)) if y == 0. => a,
        _ => make(Node::Add(a, b)),
    }
}

fn sub_fold(a: Expression, b: Expression) -> Expression {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) => Expression::constant(x - y),
        (_, Some(y)) if y == 0. => a,
        (Some(x), _) if x == 0. => neg_fold(b),
        _ => make(Node::Sub(a, b)),
    }
}

fn mul_fold(a: Expression, b: Expression) -> Expression {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) => Expression::constant(x * y),
        (Some(x), _) if x == 0. => Expression::constant(0.),
        (_, Some(y)) if y == 0. => Expression::constant(0.),
        (Some(x), _) if x == 1. => b,
        (_, Some(y)) if y == 1. => a,
        _ => make(Node::Mul(a, b)),
    }
}

fn div_fold(a: Expression, b: Expression) -> Expression {
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) => Expression::constant(x / y),
        (_, Some(y)) if y == 1. => a,
        _ => make(Node::Div(a, b)),
    }
}

fn neg_fold(a: Expression) -> Expression {
    match a.as_constant() {
        Some(x) => Expression::constant(-x),
        None => make(Node::Neg(a)),
    }
}

impl Expression {
    /// A constant expression.
    pub fn constant(value: f64) -> Expression {
        make(Node::Constant(value))
    }

    /// The value of the expression if its root is a constant.
    pub fn as_constant(&self) -> Option<f64> {
        match *self.node {
            Node::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Raise the expression to a non-negative integer power.
    pub fn pow(&self, exp: u32) -> Expression {
        match self.as_constant() {
            Some(c) => Expression::constant(c.powi(exp as i32)),
            None => {
                if exp == 0 {
                    Expression::constant(1.)
                } else if exp == 1 {
                    self.clone()
                } else {
                    make(Node::Pow(self.clone(), exp))
                }
            }
        }
    }

    /// Evaluate the expression.
    ///
    /// # Errors
    /// Fails with [`Error::NotConstant`] naming one of the free symbols when
    /// the expression is not closed.
    pub fn evaluate(&self) -> Result<f64> {
        match &*self.node {
            Node::Constant(c) => Ok(*c),
            Node::Variable(s) => Err(Error::NotConstant(s.name())),
            Node::Add(a, b) => Ok(a.evaluate()? + b.evaluate()?),
            Node::Sub(a, b) => Ok(a.evaluate()? - b.evaluate()?),
            Node::Mul(a, b) => Ok(a.evaluate()? * b.evaluate()?),
            Node::Div(a, b) => Ok(a.evaluate()? / b.evaluate()?),
            Node::Neg(a) => Ok(-a.evaluate()?),
            Node::Pow(a, k) => Ok(a.evaluate()?.powi(*k as i32)),
        }
    }

    /// The set of free symbols of the expression.
    pub fn variables(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<Symbol>) {
        match &*self.node {
            Node::Constant(_) => {}
            Node::Variable(s) => {
                out.insert(*s);
            }
            Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) | Node::Div(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Node::Neg(a) | Node::Pow(a, _) => a.collect_variables(out),
        }
    }

    /// Substitute symbols by expressions, simultaneously. Symbols absent from
    /// the map are left untouched.
    pub fn replace(&self, map: &HashMap<Symbol, Expression>) -> Expression {
        match &*self.node {
            Node::Constant(_) => self.clone(),
            Node::Variable(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            Node::Add(a, b) => add_fold(a.replace(map), b.replace(map)),
            Node::Sub(a, b) => sub_fold(a.replace(map), b.replace(map)),
            Node::Mul(a, b) => mul_fold(a.replace(map), b.replace(map)),
            Node::Div(a, b) => div_fold(a.replace(map), b.replace(map)),
            Node::Neg(a) => neg_fold(a.replace(map)),
            Node::Pow(a, k) => {
                let base = a.replace(map);
                base.pow(*k)
            }
        }
    }

    /// Rewrite the expression as a distributed sum of monomials. The numeric
    /// value is preserved.
    ///
    /// # Errors
    /// Fails when the expression is not polynomial in its free symbols, e.g.
    /// when a divisor contains a free symbol.
    ///
    /// # Examples
    /// ```
    /// # use pika::symbolic::{Expression, Symbol};
    /// # use std::collections::HashMap;
    /// let x = Expression::from(Symbol::new("x"));
    /// let e = &(&x + &Expression::from(1.)) * &(&x - &Expression::from(1.));
    /// let expanded = e.expand().unwrap();
    /// let mut sub = HashMap::new();
    /// sub.insert(Symbol::new("x"), Expression::from(4.));
    /// assert_eq!(expanded.replace(&sub).evaluate().unwrap(), 15.);
    /// ```
    pub fn expand(&self) -> Result<Expression> {
        let vars: Vec<Symbol> = self.variables().into_iter().collect();
        let mons = self.monomials(&vars)?;
        let mut sum = Expression::constant(0.);
        for (exps, coeff) in mons {
            let mut term = coeff;
            for (v, e) in vars.iter().zip(exps.iter()) {
                if *e > 0 {
                    term = mul_fold(term, Expression::from(*v).pow(*e));
                }
            }
            sum = add_fold(sum, term);
        }
        Ok(sum)
    }

    /// Decompose the expression into monomials over a group of symbols. The
    /// result maps exponent vectors (indexed like `group`) to coefficient
    /// expressions over the remaining free symbols. Monomials with an exactly
    /// zero constant coefficient are dropped.
    ///
    /// # Errors
    /// Fails with [`Error::InvalidInput`] when the expression is not a
    /// polynomial in the group symbols.
    pub(crate) fn monomials(&self, group: &[Symbol]) -> Result<BTreeMap<Vec<u32>, Expression>> {
        let mut pos: HashMap<Symbol, usize> = HashMap::new();
        for (i, s) in group.iter().enumerate() {
            pos.insert(*s, i);
        }
        self.monomials_impl(&pos, group.len())
    }

    fn monomials_impl(
        &self,
        pos: &HashMap<Symbol, usize>,
        n: usize,
    ) -> Result<BTreeMap<Vec<u32>, Expression>> {
        let mut out = BTreeMap::new();
        match &*self.node {
            Node::Constant(c) => {
                if *c != 0. {
                    out.insert(vec![0; n], self.clone());
                }
            }
            Node::Variable(s) => {
                let mut exps = vec![0; n];
                match pos.get(s) {
                    Some(i) => exps[*i] = 1,
                    None => {
                        out.insert(exps, self.clone());
                        return Ok(out);
                    }
                }
                out.insert(exps, Expression::constant(1.));
            }
            Node::Add(a, b) => {
                out = a.monomials_impl(pos, n)?;
                for (exps, coeff) in b.monomials_impl(pos, n)? {
                    merge_monomial(&mut out, exps, coeff);
                }
            }
            Node::Sub(a, b) => {
                out = a.monomials_impl(pos, n)?;
                for (exps, coeff) in b.monomials_impl(pos, n)? {
                    merge_monomial(&mut out, exps, neg_fold(coeff));
                }
            }
            Node::Neg(a) => {
                for (exps, coeff) in a.monomials_impl(pos, n)? {
                    out.insert(exps, neg_fold(coeff));
                }
            }
            Node::Mul(a, b) => {
                let am = a.monomials_impl(pos, n)?;
                let bm = b.monomials_impl(pos, n)?;
                for (ea, ca) in &am {
                    for (eb, cb) in &bm {
                        let exps: Vec<u32> =
                            ea.iter().zip(eb.iter()).map(|(x, y)| x + y).collect();
                        merge_monomial(&mut out, exps, mul_fold(ca.clone(), cb.clone()));
                    }
                }
            }
            Node::Pow(a, k) => {
                let am = a.monomials_impl(pos, n)?;
                let mut acc = BTreeMap::new();
                acc.insert(vec![0; n], Expression::constant(1.));
                for _ in 0..*k {
                    let mut next = BTreeMap::new();
                    for (ea, ca) in &acc {
                        for (eb, cb) in &am {
                            let exps: Vec<u32> =
                                ea.iter().zip(eb.iter()).map(|(x, y)| x + y).collect();
                            merge_monomial(&mut next, exps, mul_fold(ca.clone(), cb.clone()));
                        }
                    }
                    acc = next;
                }
                out = acc;
            }
            Node::Div(a, b) => {
                let group_syms: Vec<Symbol> = pos.keys().cloned().collect();
                if b.variables().iter().any(|s| group_syms.contains(s)) {
                    return Err(Error::InvalidInput(format!(
                        "expression `{}` is not polynomial: division by a term \
                         containing a bound symbol",
                        self
                    )));
                }
                for (exps, coeff) in a.monomials_impl(pos, n)? {
                    out.insert(exps, div_fold(coeff, b.clone()));
                }
            }
        }
        out.retain(|_, c| c.as_constant() != Some(0.));
        Ok(out)
    }

    /// Interpret the expression as an affine form over `syms`, returning the
    /// coefficient of each symbol and the constant term. `None` is returned
    /// when the expression has degree above one in `syms`.
    ///
    /// # Errors
    /// Fails with [`Error::NotConstant`] when a coefficient still contains
    /// other free symbols.
    pub(crate) fn linear_form(&self, syms: &[Symbol]) -> Result<Option<(Vec<f64>, f64)>> {
        let mons = self.monomials(syms)?;
        let mut coeffs = vec![0.; syms.len()];
        let mut cst = 0.;
        for (exps, coeff) in mons {
            let value = coeff.evaluate()?;
            let degree: u32 = exps.iter().sum();
            match degree {
                0 => cst += value,
                1 => {
                    let i = exps.iter().position(|e| *e == 1).unwrap();
                    coeffs[i] += value;
                }
                _ => return Ok(None),
            }
        }
        Ok(Some((coeffs, cst)))
    }
}

fn merge_monomial(
    map: &mut BTreeMap<Vec<u32>, Expression>,
    exps: Vec<u32>,
    coeff: Expression,
) {
    match map.remove(&exps) {
        Some(old) => {
            map.insert(exps, add_fold(old, coeff));
        }
        None => {
            map.insert(exps, coeff);
        }
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Expression {
        Expression::constant(value)
    }
}

impl From<Symbol> for Expression {
    fn from(symbol: Symbol) -> Expression {
        make(Node::Variable(symbol))
    }
}

impl ops::Add for &Expression {
    type Output = Expression;
    fn add(self, other: &Expression) -> Expression {
        add_fold(self.clone(), other.clone())
    }
}

impl ops::Sub for &Expression {
    type Output = Expression;
    fn sub(self, other: &Expression) -> Expression {
        sub_fold(self.clone(), other.clone())
    }
}

impl ops::Mul for &Expression {
    type Output = Expression;
    fn mul(self, other: &Expression) -> Expression {
        mul_fold(self.clone(), other.clone())
    }
}

impl ops::Div for &Expression {
    type Output = Expression;
    fn div(self, other: &Expression) -> Expression {
        div_fold(self.clone(), other.clone())
    }
}

impl ops::Neg for &Expression {
    type Output = Expression;
    fn neg(self) -> Expression {
        neg_fold(self.clone())
    }
}

impl ops::Add for Expression {
    type Output = Expression;
    fn add(self, other: Expression) -> Expression {
        add_fold(self, other)
    }
}

impl ops::Sub for Expression {
    type Output = Expression;
    fn sub(self, other: Expression) -> Expression {
        sub_fold(self, other)
    }
}

impl ops::Mul for Expression {
    type Output = Expression;
    fn mul(self, other: Expression) -> Expression {
        mul_fold(self, other)
    }
}

impl ops::Div for Expression {
    type Output = Expression;
    fn div(self, other: Expression) -> Expression {
        div_fold(self, other)
    }
}

impl ops::Neg for Expression {
    type Output = Expression;
    fn neg(self) -> Expression {
        neg_fold(self)
    }
}

impl ops::Mul<&Expression> for f64 {
    type Output = Expression;
    fn mul(self, other: &Expression) -> Expression {
        mul_fold(Expression::constant(self), other.clone())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &*self.node {
            Node::Constant(c) => write!(f, "{}", c),
            Node::Variable(s) => write!(f, "{}", s),
            Node::Add(a, b) => write!(f, "({} + {})", a, b),
            Node::Sub(a, b) => write!(f, "({} - {})", a, b),
            Node::Mul(a, b) => write!(f, "({} * {})", a, b),
            Node::Div(a, b) => write!(f, "({} / {})", a, b),
            Node::Neg(a) => write!(f, "(-{})", a),
            Node::Pow(a, k) => write!(f, "{}^{}", a, k),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn x() -> Expression {
        Expression::from(Symbol::new("x"))
    }

    fn y() -> Expression {
        Expression::from(Symbol::new("y"))
    }

    fn bind(pairs: &[(&str, f64)]) -> HashMap<Symbol, Expression> {
        pairs
            .iter()
            .map(|(n, v)| (Symbol::new(n), Expression::constant(*v)))
            .collect()
    }

    #[test]
    fn test_evaluate() {
        let e = &(&x() * &x()) - &(2.0 * &y());
        assert!(matches!(e.evaluate(), Err(Error::NotConstant(_))));
        let v = e.replace(&bind(&[("x", 3.), ("y", 2.)])).evaluate().unwrap();
        assert_eq!(v, 5.);
    }

    #[test]
    fn test_replace_is_simultaneous() {
        // x -> y, y -> x must swap, not chain
        let mut sub = HashMap::new();
        sub.insert(Symbol::new("x"), y());
        sub.insert(Symbol::new("y"), x());
        let e = &x() - &(2.0 * &y());
        let swapped = e.replace(&sub);
        let v = swapped
            .replace(&bind(&[("x", 1.), ("y", 10.)]))
            .evaluate()
            .unwrap();
        assert_eq!(v, 8.);
    }

    #[test]
    fn test_expand_preserves_value() {
        let e = (&(&x() + &y()).pow(3) - &x()) * Expression::from(0.5);
        let expanded = e.expand().unwrap();
        for (xv, yv) in [(0., 0.), (1., 2.), (-1.5, 0.25), (3., -2.)] {
            let sub = bind(&[("x", xv), ("y", yv)]);
            let a = e.replace(&sub).evaluate().unwrap();
            let b = expanded.replace(&sub).evaluate().unwrap();
            assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_monomials_grouping() {
        // (x + 2 y)^2 grouped over x: x^2 + (4 y) x + 4 y^2
        let e = (&x() + &(2.0 * &y())).pow(2);
        let mons = e.monomials(&[Symbol::new("x")]).unwrap();
        assert_eq!(mons.len(), 3);
        let c1 = mons.get(&vec![1]).unwrap();
        let v = c1.replace(&bind(&[("y", 3.)])).evaluate().unwrap();
        assert_eq!(v, 12.);
    }

    #[test]
    fn test_linear_form() {
        let p = Symbol::new("p");
        let q = Symbol::new("q");
        let e = &(3.0 * &Expression::from(p)) - &(&Expression::from(q) - &Expression::from(1.));
        let (coeffs, cst) = e.linear_form(&[p, q]).unwrap().unwrap();
        assert_eq!(coeffs, vec![3., -1.]);
        assert_eq!(cst, 1.);
        let nonlin = &Expression::from(p) * &Expression::from(q);
        assert!(nonlin.linear_form(&[p, q]).unwrap().is_none());
    }

    #[test]
    fn test_division() {
        let e = &x() / &Expression::from(4.);
        let v = e.replace(&bind(&[("x", 2.)])).evaluate().unwrap();
        assert_eq!(v, 0.5);
        // dividing by a bound symbol is not polynomial
        let bad = &Expression::from(1.) / &x();
        assert!(bad.monomials(&[Symbol::new("x")]).is_err());
    }

    #[test]
    fn test_fresh_symbols_are_distinct() {
        let a = Symbol::fresh("alpha");
        let b = Symbol::fresh("alpha");
        assert_ne!(a, b);
    }
}
