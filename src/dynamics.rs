//! Discrete-time polynomial dynamical systems.

use std::collections::HashMap;

use crate::sets::{Bundle, Polytope, TransformMode};
use crate::symbolic::{Expression, Symbol};
use crate::{Error, Result};

/// A discrete-time dynamical system `x' = f(x, θ)`: state variables, optional
/// parameter symbols and one polynomial update expression per variable.
#[derive(Debug, Clone)]
pub struct DynamicalSystem {
    variables: Vec<Symbol>,
    parameters: Vec<Symbol>,
    dynamics: Vec<Expression>,
}

impl DynamicalSystem {
    /// Create a system from its variables, parameters and update map.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] when the update map does not have one
    /// expression per variable, or when an update mentions an undeclared
    /// symbol.
    ///
    /// # Examples
    /// ```
    /// # use pika::dynamics::DynamicalSystem;
    /// # use pika::symbolic::{Expression, Symbol};
    /// let x = Symbol::new("x");
    /// let sys = DynamicalSystem::new(
    ///     vec![x],
    ///     vec![],
    ///     vec![0.5 * &Expression::from(x)],
    /// ).unwrap();
    /// assert_eq!(sys.dim(), 1);
    /// ```
    pub fn new(
        variables: Vec<Symbol>,
        parameters: Vec<Symbol>,
        dynamics: Vec<Expression>,
    ) -> Result<DynamicalSystem> {
        if variables.len() != dynamics.len() {
            return Err(Error::InvalidInput(format!(
                "system declares {} variables but {} update expressions",
                variables.len(),
                dynamics.len()
            )));
        }
        for (var, dynamic) in variables.iter().zip(dynamics.iter()) {
            for symbol in dynamic.variables() {
                if !variables.contains(&symbol) && !parameters.contains(&symbol) {
                    return Err(Error::InvalidInput(format!(
                        "update for variable {} mentions undeclared symbol `{}`",
                        var, symbol
                    )));
                }
            }
        }
        Ok(DynamicalSystem {
            variables,
            parameters,
            dynamics,
        })
    }

    /// The state dimension.
    pub fn dim(&self) -> usize {
        self.variables.len()
    }

    /// The state variables.
    pub fn variables(&self) -> &[Symbol] {
        &self.variables
    }

    /// The parameter symbols.
    pub fn parameters(&self) -> &[Symbol] {
        &self.parameters
    }

    /// The update expressions, one per variable.
    pub fn dynamics(&self) -> &[Expression] {
        &self.dynamics
    }

    /// The system whose update map is the `degree`-fold composition
    /// `f ∘ f ∘ … ∘ f`, expanded to distributed form.
    ///
    /// # Errors
    /// Fails when the composed expressions cannot be expanded.
    pub fn composed(&self, degree: u32) -> Result<DynamicalSystem> {
        let mut sub = HashMap::new();
        for (var, dynamic) in self.variables.iter().zip(self.dynamics.iter()) {
            sub.insert(*var, dynamic.clone());
        }
        let mut composed = self.dynamics.clone();
        for _ in 1..degree.max(1) {
            composed = composed.iter().map(|e| e.replace(&sub)).collect();
        }
        let mut expanded = Vec::with_capacity(composed.len());
        for e in &composed {
            expanded.push(e.expand()?);
        }
        Ok(DynamicalSystem {
            variables: self.variables.clone(),
            parameters: self.parameters.clone(),
            dynamics: expanded,
        })
    }

    /// The one-step image of a bundle under the update map.
    ///
    /// # Errors
    /// Propagates failures of the underlying bundle transformation.
    pub fn transform(&self, bundle: &Bundle, mode: TransformMode) -> Result<Bundle> {
        bundle.transform(&self.variables, &self.dynamics, mode)
    }

    /// The one-step image of a bundle for parameters ranging over a polytope.
    ///
    /// # Errors
    /// Propagates failures of the underlying bundle transformation, in
    /// particular [`Error::Infeasible`] for an empty parameter polytope.
    pub fn transform_parametric(
        &self,
        bundle: &Bundle,
        para_set: &Polytope,
        mode: TransformMode,
    ) -> Result<Bundle> {
        bundle.transform_parametric(
            &self.variables,
            &self.parameters,
            &self.dynamics,
            para_set,
            mode,
        )
    }
}
