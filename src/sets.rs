//! The symbolic-numeric state-set representations.
//!
//! Three representations cooperate here. A [`Polytope`] is the plain
//! H-representation `{x | A·x ≤ b}` used for emptiness tests, intersection
//! and optimisation. A [`Parallelotope`] is an n-dimensional parallelepiped
//! in generator form, which is what the Bernstein bounding step consumes. A
//! [`Bundle`] is the central object of the analysis: an intersection of
//! parallelotopes sharing one direction matrix, combining the tightness of a
//! polytope with the generator structure the transformation needs.
//!
//! [`Polytope`]: ./polytope/struct.Polytope.html
//! [`Parallelotope`]: ./parallelotope/struct.Parallelotope.html
//! [`Bundle`]: ./bundle/struct.Bundle.html

pub use self::bundle::{Bundle, TransformMode};
pub use self::parallelotope::Parallelotope;
pub use self::polytope::Polytope;

pub mod bundle;
pub mod parallelotope;
pub mod polytope;
