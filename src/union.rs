//! Unions of polytopes.

use nalgebra::DVector;

use crate::sets::Polytope;

/// A union of polytopes over a common ambient space.
///
/// A single polytope is often too coarse: the reach set of one analysis step
/// is the union of the images of several bundles, and a refined parameter set
/// is the union of the surviving covering pieces. Keeping the pieces separate
/// preserves precision at the cost of more LP work per query, so [`add`]
/// drops pieces that are empty or already covered by a member.
///
/// [`add`]: ./struct.PolytopesUnion.html#method.add
#[derive(Debug, Clone, Default)]
pub struct PolytopesUnion {
    sets: Vec<Polytope>,
}

impl PolytopesUnion {
    /// Create an empty union.
    pub fn new() -> PolytopesUnion {
        PolytopesUnion { sets: Vec::new() }
    }

    /// Create a union holding a single polytope, unless it is empty.
    ///
    /// # Examples
    /// ```
    /// # use pika::sets::Polytope;
    /// # use pika::PolytopesUnion;
    /// let u = PolytopesUnion::from_polytope(Polytope::from_box(&[0.], &[1.]).unwrap());
    /// assert_eq!(u.size(), 1);
    /// ```
    pub fn from_polytope(polytope: Polytope) -> PolytopesUnion {
        let mut u = PolytopesUnion::new();
        u.add(polytope);
        u
    }

    /// The number of member polytopes.
    pub fn size(&self) -> usize {
        self.sets.len()
    }

    /// Whether the union covers no point.
    pub fn is_empty(&self) -> bool {
        self.sets.iter().all(|p| p.is_empty())
    }

    /// Iterate over the member polytopes.
    pub fn iter(&self) -> std::slice::Iter<Polytope> {
        self.sets.iter()
    }

    /// Add a polytope to the union. Empty polytopes and polytopes already
    /// contained in a member are dropped; returns whether the polytope was
    /// kept.
    pub fn add(&mut self, polytope: Polytope) -> bool {
        if polytope.is_empty() {
            return false;
        }
        if self.sets.iter().any(|p| p.contains(&polytope)) {
            return false;
        }
        self.sets.push(polytope);
        true
    }

    /// Add every member of another union.
    pub fn add_union(&mut self, other: PolytopesUnion) {
        for p in other.sets {
            self.add(p);
        }
    }

    /// Simplify every member in place.
    pub fn simplify(&mut self) {
        for p in &mut self.sets {
            p.simplify();
        }
    }

    /// Whether some member contains the given point.
    pub fn contains_point(&self, x: &DVector<f64>) -> bool {
        self.sets.iter().any(|p| p.contains_point(x))
    }

    /// The largest value of a linear objective over the union, or negative
    /// infinity for an empty union.
    pub fn maximize(&self, obj: &DVector<f64>) -> f64 {
        self.sets
            .iter()
            .map(|p| p.maximize(obj).optimum())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// The smallest value of a linear objective over the union, or positive
    /// infinity for an empty union.
    pub fn minimize(&self, obj: &DVector<f64>) -> f64 {
        self.sets
            .iter()
            .map(|p| p.minimize(obj).optimum())
            .fold(f64::INFINITY, f64::min)
    }
}

/// The pairwise intersection of two unions: every non-empty meet of a member
/// of `a` with a member of `b`.
pub fn intersect(a: &PolytopesUnion, b: &PolytopesUnion) -> PolytopesUnion {
    let mut out = PolytopesUnion::new();
    for p in a.iter() {
        for q in b.iter() {
            let mut meet = p.clone();
            meet.intersect_with(q);
            out.add(meet);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_drops_covered() {
        let mut u = PolytopesUnion::new();
        assert!(u.add(Polytope::from_box(&[0., 0.], &[2., 2.]).unwrap()));
        assert!(!u.add(Polytope::from_box(&[0.5, 0.5], &[1., 1.]).unwrap()));
        assert!(u.add(Polytope::from_box(&[1., 1.], &[3., 3.]).unwrap()));
        assert!(!u.add(Polytope::from_box(&[5., 5.], &[4., 4.]).unwrap()));
        assert_eq!(u.size(), 2);
    }

    #[test]
    fn test_intersect() {
        let mut a = PolytopesUnion::new();
        a.add(Polytope::from_box(&[0.], &[1.]).unwrap());
        a.add(Polytope::from_box(&[3.], &[4.]).unwrap());
        let b = PolytopesUnion::from_polytope(Polytope::from_box(&[0.5], &[3.5]).unwrap());
        let meet = intersect(&a, &b);
        assert_eq!(meet.size(), 2);
        assert!(meet.contains_point(&DVector::from_vec(vec![0.75])));
        assert!(meet.contains_point(&DVector::from_vec(vec![3.25])));
        assert!(!meet.contains_point(&DVector::from_vec(vec![2.])));
        let disjoint = PolytopesUnion::from_polytope(Polytope::from_box(&[10.], &[11.]).unwrap());
        assert!(intersect(&a, &disjoint).is_empty());
    }

    #[test]
    fn test_extrema() {
        let mut u = PolytopesUnion::new();
        u.add(Polytope::from_box(&[0.], &[1.]).unwrap());
        u.add(Polytope::from_box(&[3.], &[4.]).unwrap());
        let obj = DVector::from_vec(vec![1.]);
        assert_eq!(u.maximize(&obj), 4.);
        assert_eq!(u.minimize(&obj), 0.);
        assert_eq!(PolytopesUnion::new().maximize(&obj), f64::NEG_INFINITY);
    }
}
