//! Break points splitting the range of an uncertainty direction into pieces
use crate::expression::{Assignment, LinearExpression};
use crate::policy::PolicyError;
use crate::robust_model::{ModelError, UncertaintyRef, UncertaintySet};

/// Increasing break points `b_1 < ... < b_{n-1}` of a direction with range `[lb, ub]`
///
/// Piece `i` covers `[b_i, b_{i+1}]` with `b_0 = lb` and `b_n = ub`. Break points outside the
/// open range of the direction and repeated break points are dropped on construction, so
/// every piece has a positive width.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointSeries {
    break_points: Vec<f64>,
    direction: LinearExpression<UncertaintyRef>,
    lower_bound: f64,
    upper_bound: f64,
}

impl BreakpointSeries {
    /// # Returns
    /// The series, or an error if the break points decrease or the direction is unbounded
    pub fn new(
        break_points: Vec<f64>,
        direction: LinearExpression<UncertaintyRef>,
        uncertainty_set: &UncertaintySet,
    ) -> Result<Self, PolicyError> {
        let direction = direction.simplify();
        let lower_bound = direction.lb(uncertainty_set)?;
        let upper_bound = direction.ub(uncertainty_set)?;
        if !lower_bound.is_finite() || !upper_bound.is_finite() {
            return Err(PolicyError::UnboundedDirection);
        }
        if break_points.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(PolicyError::UnorderedBreakpoints);
        }
        let mut kept: Vec<f64> = Vec::with_capacity(break_points.len());
        for break_point in break_points {
            let inside = lower_bound < break_point && break_point < upper_bound;
            if inside && kept.last().map_or(true, |last| *last < break_point) {
                kept.push(break_point);
            }
        }
        Ok(Self {
            break_points: kept,
            direction,
            lower_bound,
            upper_bound,
        })
    }

    pub fn break_points(&self) -> &[f64] {
        &self.break_points
    }

    pub fn direction(&self) -> &LinearExpression<UncertaintyRef> {
        &self.direction
    }

    /// Smallest value of the direction over the variable bounds
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Largest value of the direction over the variable bounds
    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    /// Number of pieces, one more than the number of break points
    pub fn num_pieces(&self) -> usize {
        self.break_points.len() + 1
    }

    /// Whether the direction is a single uncertainty variable with coefficient one
    pub fn simple_axis_aligned(&self) -> bool {
        matches!(self.direction.terms(), [term] if term.scale == 1.)
    }

    /// The uncertainty variable of a simple axis aligned direction
    pub fn axis_direction(&self) -> Result<UncertaintyRef, PolicyError> {
        match self.direction.terms() {
            [term] if term.scale == 1. => Ok(term.variable),
            _ => Err(PolicyError::NotAxisAligned),
        }
    }

    /// Start of piece `i`, the lower bound for the first piece
    pub fn previous_break_point(&self, i: usize) -> f64 {
        match i {
            0 => self.lower_bound,
            _ => self
                .break_points
                .get(i - 1)
                .copied()
                .unwrap_or(self.upper_bound),
        }
    }

    /// End of piece `i`, the upper bound for the last piece
    pub fn break_point(&self, i: usize) -> f64 {
        self.break_points
            .get(i)
            .copied()
            .unwrap_or(self.upper_bound)
    }

    pub fn piece_width(&self, i: usize) -> f64 {
        self.break_point(i) - self.previous_break_point(i)
    }

    /// Whether the break points are mirrored around zero
    pub fn symmetric(&self) -> bool {
        let n = self.break_points.len();
        (0..n).all(|i| self.break_points[n - i - 1] == -self.break_points[i])
    }

    /// Portion of the direction's value falling into each piece
    ///
    /// Entry `i` is `max(min(d, b_{i+1}) - b_i, 0)`, so the entries sum to `d - lb` for every
    /// `d` in range.
    pub fn lifted_realization<A: Assignment<UncertaintyRef> + ?Sized>(
        &self,
        realization: &A,
    ) -> Result<Vec<f64>, ModelError> {
        let value = self.direction.value(realization)?;
        Ok((0..self.num_pieces())
            .map(|i| (value.min(self.break_point(i)) - self.previous_break_point(i)).max(0.))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robust_model::{RoModel, UncertaintyRealization};

    fn axis(lower: f64, upper: f64) -> (RoModel, UncertaintyRef) {
        let mut model = RoModel::new("axis");
        let u = model.add_uncertainty_variable("u", None, lower, upper).unwrap();
        (model, u)
    }

    #[test]
    fn pieces() {
        let (model, u) = axis(-1., 2.);
        let series = BreakpointSeries::new(
            vec![0., 1.],
            LinearExpression::variable(u),
            model.uncertainty_set(),
        )
        .unwrap();
        assert!(series.simple_axis_aligned());
        assert_eq!(series.axis_direction().unwrap(), u);
        assert_eq!(series.num_pieces(), 3);
        assert!((series.previous_break_point(0) + 1.).abs() < 1e-25);
        assert!((series.break_point(0)).abs() < 1e-25);
        assert!((series.break_point(2) - 2.).abs() < 1e-25);
        assert!((series.piece_width(1) - 1.).abs() < 1e-25);
        assert!(!series.symmetric());
    }

    #[test]
    fn lifting_round_trip() {
        let (model, u) = axis(-1., 2.);
        let series = BreakpointSeries::new(
            vec![-0.5, 0.25, 1.],
            LinearExpression::variable(u),
            model.uncertainty_set(),
        )
        .unwrap();
        for value in [-1., -0.7, 0., 0.25, 0.9, 2.] {
            let lifted = series
                .lifted_realization(&UncertaintyRealization::new(vec![value]))
                .unwrap();
            let total: f64 = lifted.iter().sum();
            assert!((total - (value + 1.)).abs() < 1e-12);
            for (i, piece) in lifted.iter().enumerate() {
                assert!(*piece >= 0.);
                assert!(*piece <= series.piece_width(i) + 1e-12);
            }
            // Equal scales over the pieces reproduce the affine policy 3 + 2u
            let lifted_policy = 3. - 2. + lifted.iter().map(|l| 2. * l).sum::<f64>();
            assert!((lifted_policy - (3. + 2. * value)).abs() < 1e-12);
        }
    }

    #[test]
    fn normalization() {
        let (model, u) = axis(-1., 1.);
        let series = BreakpointSeries::new(
            vec![-1., -0.5, -0.5, 0.5, 1.],
            LinearExpression::variable(u),
            model.uncertainty_set(),
        )
        .unwrap();
        assert_eq!(series.break_points(), &[-0.5, 0.5]);
        assert!(series.symmetric());

        let unordered = BreakpointSeries::new(
            vec![0.5, -0.5],
            LinearExpression::variable(u),
            model.uncertainty_set(),
        );
        if let Err(PolicyError::UnorderedBreakpoints) = unordered {
            // Intentionally blank
        } else {
            panic!("Decreasing break points accepted")
        }
    }

    #[test]
    fn directions() {
        let (mut model, u) = axis(-1., 1.);
        let free = model
            .add_uncertainty_variable("free", None, 0., f64::INFINITY)
            .unwrap();
        let scaled = BreakpointSeries::new(
            vec![0.],
            LinearExpression::term(2., u),
            model.uncertainty_set(),
        )
        .unwrap();
        assert!(!scaled.simple_axis_aligned());
        assert!((scaled.upper_bound() - 2.).abs() < 1e-25);
        if let Err(PolicyError::NotAxisAligned) = scaled.axis_direction() {
            // Intentionally blank
        } else {
            panic!("Scaled direction treated as an axis")
        }
        let unbounded = BreakpointSeries::new(
            vec![1.],
            LinearExpression::variable(free),
            model.uncertainty_set(),
        );
        if let Err(PolicyError::UnboundedDirection) = unbounded {
            // Intentionally blank
        } else {
            panic!("Unbounded direction accepted")
        }
    }
}
