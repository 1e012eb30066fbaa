#![crate_name = "pika"]
#![crate_type = "lib"]
#![warn(missing_docs)]

//! A library for reachability analysis of discrete-time polynomial dynamical
//! systems.
//!
//! The state sets are represented by [`Bundle`]s: intersections of
//! parallelotopes sharing a direction matrix. Each analysis step pushes a
//! bundle through the polynomial update map by bounding Bernstein
//! coefficients of the composed map over every parallelotope, which yields a
//! new bundle containing the exact image. The [`Engine`] composes these steps
//! into a [`Flowpipe`], and for parametric systems refines a set of parameter
//! valuations against a Signal Temporal Logic specification ([`stl`]).
//!
//! [`Bundle`]: ./sets/bundle/struct.Bundle.html
//! [`Engine`]: ./engine/struct.Engine.html
//! [`Flowpipe`]: ./engine/struct.Flowpipe.html
//! [`stl`]: ./stl/index.html

pub mod bernstein;
pub mod dynamics;
pub mod engine;
pub mod linalg;
pub mod lp;
pub mod model;
pub mod pool;
pub mod sets;
pub mod stl;
pub mod symbolic;

pub use crate::union::PolytopesUnion;
mod union;

use crate::engine::Flowpipe;

/// Errors surfaced by the analysis core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A validation failure: missing dynamic, unbounded variable, singular
    /// template row, direction count mismatch, and the like.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A linear program asserted to be feasible has no feasible region.
    #[error("linear system has no feasible region")]
    Infeasible,
    /// A finite optimum was expected but the linear program is unbounded.
    #[error("{0} has no finite bound")]
    Unbounded(String),
    /// A matrix factorisation encountered a zero pivot.
    #[error("singular matrix: zero pivot in PLU factorisation")]
    Singular,
    /// A feature combination the engine refuses to handle.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A symbolic expression was evaluated while still containing a free
    /// symbol.
    #[error("expression is not constant: free symbol `{0}`")]
    NotConstant(String),
    /// A reachability step failed. The flowpipe prefix computed before the
    /// failure is still valid and is carried along with the cause.
    #[error("reachability step {step} failed: {source}")]
    Step {
        /// The 1-based index of the failed step.
        step: usize,
        /// The valid flowpipe prefix computed before the failure.
        flowpipe: Flowpipe,
        /// The error that aborted the step.
        source: Box<Error>,
    },
}

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;
