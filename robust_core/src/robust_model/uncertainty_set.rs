//! Uncertainty sets: the region the uncertainty variables are confined to
//!
//! An [`UncertaintySet`] owns its uncertainty variables and one or more alternative constraint
//! sets. A realization is part of the uncertainty set if it respects every variable bound and
//! satisfies all constraints of at least one of the alternatives.
use std::fmt::{Display, Formatter};

use rand::Rng;
use rand_distr::{Distribution, Exp, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::configuration;
use crate::expression::{Assignment, ConicExpression, NormKind};
use crate::optimize::conic_model::ConicModel;
use crate::optimize::constraint::{Constraint, ConstraintSense, RawConstraint};
use crate::robust_model::realization::UncertaintyRealization;
use crate::robust_model::uncertainty::{UncertaintyRef, UncertaintyVariable};
use crate::robust_model::ModelError;
use crate::utils::diagnostics::Diagnostics;
use crate::utils::store::{Index, Store};

/// Constraint on uncertainty variables
pub type UncertaintyConstraint = Constraint<ConicExpression<UncertaintyRef>>;
/// Handle of one alternative constraint set
pub type ConstraintSetRef = Index<UncertaintyConstraintSet>;

/// Attempts per realization before sampling gives up
const MAX_SAMPLE_ATTEMPTS: usize = 10_000;

/// Shapes of uncertainty sets with known structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialSetType {
    /// Only variable bounds, every variable bounded
    Box,
    /// `||u||_2 <= budget`
    Ball,
    /// `||u||_1 <= budget`
    Budget,
    Other,
}

impl Display for SpecialSetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecialSetType::Box => write!(f, "BOX"),
            SpecialSetType::Ball => write!(f, "BALL"),
            SpecialSetType::Budget => write!(f, "BUDGET"),
            SpecialSetType::Other => write!(f, "OTHER"),
        }
    }
}

/// One alternative region of an uncertainty set
#[derive(Debug, Clone, Default)]
pub struct UncertaintyConstraintSet {
    constraints: Vec<UncertaintyConstraint>,
}

impl UncertaintyConstraintSet {
    pub fn constraints(&self) -> &[UncertaintyConstraint] {
        &self.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether every constraint only bounds a single variable
    pub fn is_box(&self) -> bool {
        self.constraints.iter().all(|c| c.is_variable_bound())
    }

    /// Whether the set is a single `||variables|| <= budget` constraint
    pub fn is_norm_ball(&self, variables: &[UncertaintyRef]) -> bool {
        let [constraint] = self.constraints.as_slice() else {
            return false;
        };
        if constraint.sense() != ConstraintSense::Leq {
            return false;
        }
        let affine = constraint.expression().affine();
        if !affine.linear().is_empty() || affine.constant() > 0. {
            return false;
        }
        match constraint.expression().normed() {
            Some(normed) => normed.is_variable_vector_norm(variables),
            None => false,
        }
    }

    fn norm(&self) -> Option<NormKind> {
        self.constraints
            .first()
            .and_then(|c| c.expression().normed())
            .map(|n| n.norm())
    }

    fn budget(&self, variables: &[UncertaintyRef]) -> Result<f64, ModelError> {
        match self.constraints.first() {
            Some(constraint) if self.is_norm_ball(variables) => {
                Ok(-constraint.expression().affine().constant())
            }
            _ => Err(ModelError::UnsupportedSetShape(
                "a budget only exists for norm balls".to_string(),
            )),
        }
    }

    /// Whether every constraint is satisfied up to the tolerance
    pub fn satisfied<A: Assignment<UncertaintyRef> + ?Sized>(
        &self,
        realization: &A,
        tolerance: f64,
    ) -> Result<bool, ModelError> {
        for constraint in &self.constraints {
            if !constraint.feasible(realization, tolerance)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Uncertainty variables and the alternative regions they may lie in
#[derive(Debug, Clone)]
pub struct UncertaintySet {
    model_name: String,
    variables: Store<UncertaintyVariable>,
    constraint_sets: Store<UncertaintyConstraintSet>,
}

impl UncertaintySet {
    /// Empty uncertainty set with a single empty constraint set
    pub fn new(model_name: impl Into<String>) -> Self {
        let mut constraint_sets = Store::new();
        constraint_sets.add(UncertaintyConstraintSet::default());
        Self {
            model_name: model_name.into(),
            variables: Store::new(),
            constraint_sets,
        }
    }

    /// Name of the model owning the set
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    // region Variables
    pub(crate) fn add_variable(
        &mut self,
        name: impl Into<String>,
        period: Option<usize>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<UncertaintyRef, ModelError> {
        let variable = UncertaintyVariable::new(name, period, lower_bound, upper_bound)?;
        Ok(self.variables.add(variable))
    }

    pub fn variable(&self, index: UncertaintyRef) -> Result<&UncertaintyVariable, ModelError> {
        Ok(self.variables.get(index)?)
    }

    pub fn variables(&self) -> &[UncertaintyVariable] {
        self.variables.items()
    }

    pub fn indices(&self) -> Vec<UncertaintyRef> {
        self.variables.indices()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UncertaintyRef, &UncertaintyVariable)> {
        self.variables.iter()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn lower_bounds(&self) -> Vec<f64> {
        self.variables.items().iter().map(|v| v.lower_bound()).collect()
    }

    pub fn upper_bounds(&self) -> Vec<f64> {
        self.variables.items().iter().map(|v| v.upper_bound()).collect()
    }
    // endregion Variables

    // region Constraint Sets
    /// Add a constraint to the most recently added constraint set
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        constraint: impl Into<RawConstraint<ConicExpression<UncertaintyRef>>>,
    ) -> Result<(), ModelError> {
        let last = self.constraint_sets.index_at(self.constraint_sets.len().saturating_sub(1))?;
        self.add_constraint_to(last, name, constraint)
    }

    pub fn add_constraint_to(
        &mut self,
        set: ConstraintSetRef,
        name: impl Into<String>,
        constraint: impl Into<RawConstraint<ConicExpression<UncertaintyRef>>>,
    ) -> Result<(), ModelError> {
        self.constraint_sets
            .get_mut(set)?
            .constraints
            .push(Constraint::new(name, constraint.into()));
        Ok(())
    }

    /// Add a new, empty alternative
    pub fn add_constraint_set(&mut self) -> ConstraintSetRef {
        self.constraint_sets.add(UncertaintyConstraintSet::default())
    }

    pub fn constraint_sets(&self) -> Vec<ConstraintSetRef> {
        self.constraint_sets.indices()
    }

    pub fn num_constraint_sets(&self) -> usize {
        self.constraint_sets.len()
    }

    pub fn constraint_set(
        &self,
        set: ConstraintSetRef,
    ) -> Result<&UncertaintyConstraintSet, ModelError> {
        Ok(self.constraint_sets.get(set)?)
    }

    pub fn constraints(&self, set: ConstraintSetRef) -> Result<&[UncertaintyConstraint], ModelError> {
        Ok(self.constraint_set(set)?.constraints())
    }

    /// Constraints of the only constraint set
    pub fn single_set_constraints(&self) -> Result<&[UncertaintyConstraint], ModelError> {
        Ok(self.single_set()?.constraints())
    }

    /// Drop every constraint, leaving a single empty constraint set
    ///
    /// Handles of the previous constraint sets become stale.
    pub fn clear_constraints(&mut self) {
        self.constraint_sets.clear();
        self.constraint_sets.add(UncertaintyConstraintSet::default());
    }

    /// Add the defining constraint of a ball or budget set
    pub fn add_special_type_constraint(
        &mut self,
        set_type: SpecialSetType,
        budget: f64,
    ) -> Result<(), ModelError> {
        let (norm, name) = match set_type {
            SpecialSetType::Ball => (NormKind::Two, "BallConstraint"),
            SpecialSetType::Budget => (NormKind::One, "BudgetConstraint"),
            other => return Err(ModelError::NoSpecialConstraint(other.to_string())),
        };
        let constraint = ConicExpression::norm_of(&self.indices(), norm).leq_value(budget);
        self.add_constraint(name, constraint)
    }

    fn single_set(&self) -> Result<&UncertaintyConstraintSet, ModelError> {
        match self.constraint_sets.items() {
            [set] => Ok(set),
            sets => Err(ModelError::MultipleConstraintSets(sets.len())),
        }
    }
    // endregion Constraint Sets

    // region Classification
    /// Shape of the set, derived from the current constraints
    pub fn special_type(&self) -> SpecialSetType {
        let Ok(set) = self.single_set() else {
            return SpecialSetType::Other;
        };
        if set.is_empty() && self.all_bounded_variables() {
            return SpecialSetType::Box;
        }
        if set.is_norm_ball(&self.indices()) {
            match set.norm() {
                Some(NormKind::Two) => return SpecialSetType::Ball,
                Some(NormKind::One) => return SpecialSetType::Budget,
                _ => {}
            }
        }
        SpecialSetType::Other
    }

    /// Radius of a ball or budget set
    pub fn budget(&self) -> Result<f64, ModelError> {
        self.single_set()?.budget(&self.indices())
    }

    fn is_special(&self) -> bool {
        self.special_type() != SpecialSetType::Other
    }

    pub fn all_0_1_variables(&self) -> bool {
        self.variables.items().iter().all(|v| v.is_0_1_var())
    }

    pub fn all_bounded_variables(&self) -> bool {
        self.variables.items().iter().all(|v| v.bounded())
    }

    /// Whether no variable can be negative
    pub fn non_negative(&self) -> bool {
        self.variables.items().iter().all(|v| v.lower_bound() >= 0.)
    }

    fn equal_bounds(&self) -> bool {
        match self.variables.items().first() {
            None => true,
            Some(first) => self.variables.items().iter().all(|v| {
                v.lower_bound() == first.lower_bound() && v.upper_bound() == first.upper_bound()
            }),
        }
    }

    /// Whether permuting the variables leaves the set unchanged
    ///
    /// Only decided for special sets, other sets raise a warning and return `false`.
    pub fn rotational_invariant(&self, diagnostics: &mut Diagnostics) -> bool {
        if !self.is_special() {
            diagnostics.warn("Rotational invariance is only checked for special sets");
            return false;
        }
        self.equal_bounds()
    }

    /// Whether the set is symmetric around the origin
    ///
    /// Only decided for special sets, other sets raise a warning and return `false`.
    pub fn symmetric(&self, diagnostics: &mut Diagnostics) -> bool {
        if !self.is_special() {
            diagnostics.warn("Symmetry is only checked for special sets");
            return false;
        }
        self.variables
            .items()
            .iter()
            .all(|v| -v.lower_bound() == v.upper_bound())
    }

    /// Largest one norm a realization with `k` active variables can have
    ///
    /// # Returns
    /// The bound for rotationally invariant box, ball and budget sets, an error for every
    /// other set or for `k` larger than the number of variables
    pub fn max_one_norm_k_active(&self, k: usize) -> Result<f64, ModelError> {
        if k == 0 {
            return Ok(0.);
        }
        let n = self.num_variables();
        if k > n {
            return Err(ModelError::TooManyActive { k, n });
        }
        let set_type = self.special_type();
        if set_type == SpecialSetType::Other || !self.equal_bounds() {
            return Err(ModelError::UnsupportedSetShape(
                "k active bounds need a rotationally invariant special set".to_string(),
            ));
        }
        let first = self.variable(self.variables.index_at(0)?)?;
        let box_bound = k as f64 * (-first.lower_bound()).max(first.upper_bound());
        match set_type {
            SpecialSetType::Box => Ok(box_bound),
            SpecialSetType::Budget => Ok(box_bound.min(self.budget()?)),
            SpecialSetType::Ball => Ok(box_bound.min((k as f64).sqrt() * self.budget()?)),
            SpecialSetType::Other => Err(ModelError::UnsupportedSetShape(set_type.to_string())),
        }
    }
    // endregion Classification

    // region Sampling
    /// Draw realizations from a ball or budget set
    pub fn generate_uncertainty(
        &self,
        num_realizations: usize,
    ) -> Result<Vec<UncertaintyRealization>, ModelError> {
        self.generate_uncertainty_with(num_realizations, &mut rand::thread_rng())
    }

    /// Draw realizations from a ball or budget set with the given generator
    ///
    /// Samples violating a variable bound are discarded and drawn again.
    pub fn generate_uncertainty_with<R: Rng + ?Sized>(
        &self,
        num_realizations: usize,
        rng: &mut R,
    ) -> Result<Vec<UncertaintyRealization>, ModelError> {
        let set_type = self.special_type();
        if !matches!(set_type, SpecialSetType::Ball | SpecialSetType::Budget) {
            return Err(ModelError::UnsupportedSetShape(format!(
                "sampling is only implemented for BALL and BUDGET sets, not {}",
                set_type
            )));
        }
        if !self.all_bounded_variables() {
            return Err(ModelError::UnboundedSampling);
        }
        let budget = self.budget()?;
        let non_negative = self.non_negative();
        let mut realizations = Vec::with_capacity(num_realizations);
        for _ in 0..num_realizations {
            let mut attempts = 0;
            let values = loop {
                if attempts == MAX_SAMPLE_ATTEMPTS {
                    return Err(ModelError::InvalidSample);
                }
                attempts += 1;
                let candidate = match set_type {
                    SpecialSetType::Ball => self.sample_ball(budget, non_negative, rng)?,
                    _ => self.sample_budget(budget, non_negative, rng)?,
                };
                if self.within_bounds(&candidate) {
                    break candidate;
                }
            };
            realizations.push(UncertaintyRealization::new(values));
        }
        Ok(realizations)
    }

    /// Uniform point in the 2-norm ball
    fn sample_ball<R: Rng + ?Sized>(
        &self,
        budget: f64,
        non_negative: bool,
        rng: &mut R,
    ) -> Result<Vec<f64>, ModelError> {
        let normal = Normal::new(0., 1.).map_err(|_| ModelError::InvalidSample)?;
        let uniform = Uniform::new(0f64, 1.);
        let n = self.num_variables();
        let mut values: Vec<f64> = (0..n)
            .map(|_| {
                let value: f64 = normal.sample(rng);
                if non_negative {
                    value.abs()
                } else {
                    value
                }
            })
            .collect();
        let norm = NormKind::Two.apply(&values);
        let radius = uniform.sample(rng).powf(1. / n as f64) * budget;
        let scale = if norm > 0. { radius / norm } else { 0. };
        values.iter_mut().for_each(|v| *v *= scale);
        Ok(values)
    }

    /// Uniform point in the 1-norm ball
    fn sample_budget<R: Rng + ?Sized>(
        &self,
        budget: f64,
        non_negative: bool,
        rng: &mut R,
    ) -> Result<Vec<f64>, ModelError> {
        let exponential = Exp::new(1.).map_err(|_| ModelError::InvalidSample)?;
        // The extra draw makes the point fall inside the ball instead of on its surface
        let mut one_norm: f64 = exponential.sample(rng);
        let mut values = Vec::with_capacity(self.num_variables());
        for _ in 0..self.num_variables() {
            let value: f64 = exponential.sample(rng);
            one_norm += value;
            let sign = if non_negative || rng.gen_bool(0.5) { 1. } else { -1. };
            values.push(sign * value);
        }
        let scale = budget / one_norm;
        values.iter_mut().for_each(|v| *v *= scale);
        Ok(values)
    }

    fn within_bounds(&self, values: &[f64]) -> bool {
        self.variables
            .items()
            .iter()
            .zip(values)
            .all(|(var, value)| *value >= var.lower_bound() && *value <= var.upper_bound())
    }
    // endregion Sampling

    /// Whether the realization respects every bound and lies in one of the constraint sets
    pub fn in_uncertainty_set<A: Assignment<UncertaintyRef> + ?Sized>(
        &self,
        realization: &A,
    ) -> Result<bool, ModelError> {
        let tolerance = configuration::current().feasibility_tolerance;
        for (index, variable) in self.variables.iter() {
            let value = realization.value_of(&index)?;
            if value < variable.lower_bound() - tolerance
                || value > variable.upper_bound() + tolerance
            {
                return Ok(false);
            }
        }
        for set in self.constraint_sets.items() {
            if set.satisfied(realization, tolerance)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Deterministic conic model over the uncertainty variables of a single constraint set
    ///
    /// The conic variables are added in the order of the uncertainty variables.
    pub fn to_conic_model(&self) -> Result<ConicModel, ModelError> {
        let set = self.single_set()?;
        let mut model = ConicModel::new(format!("Uncertainty{}", self.model_name));
        let mut conic_variables = Vec::with_capacity(self.num_variables());
        for variable in self.variables.items() {
            conic_variables.push(model.add_variable(
                variable.name(),
                variable.lower_bound(),
                variable.upper_bound(),
            )?);
        }
        for constraint in set.constraints() {
            let expression = constraint.expression().translate(|u| {
                self.variables.get(*u)?;
                Ok(*u.lookup(&conic_variables)?)
            })?;
            model.add_constraint(
                constraint.name(),
                RawConstraint::new(constraint.sense(), expression),
            );
        }
        Ok(model)
    }

    pub fn full_string(&self) -> Result<String, ModelError> {
        let set_type = self.special_type();
        let mut s = format!("Uncertainty Set of {}\n{}", self.model_name, set_type);
        if set_type == SpecialSetType::Other {
            let many = self.constraint_sets.len() > 1;
            for (number, set) in self.constraint_sets.items().iter().enumerate() {
                if many {
                    s.push_str(&format!("\nConstraint set {}", number));
                }
                for constraint in set.constraints() {
                    s.push('\n');
                    s.push_str(&constraint.to_string_with(self)?);
                }
            }
        }
        for variable in self.variables.items() {
            s.push_str(&format!(
                "\n{} <= {} p({}) <= {}",
                variable.lower_bound(),
                variable.name(),
                format_period(variable.period()),
                variable.upper_bound()
            ));
        }
        Ok(s)
    }
}

pub(crate) fn format_period(period: Option<usize>) -> String {
    match period {
        Some(p) => p.to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{AffineExpression, LinearExpression};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sum_of(variables: &[UncertaintyRef]) -> AffineExpression<UncertaintyRef> {
        AffineExpression::from_parts(0., LinearExpression::sum(variables))
    }

    fn set_with(n: usize, lb: f64, ub: f64) -> (UncertaintySet, Vec<UncertaintyRef>) {
        let mut set = UncertaintySet::new("m");
        let vars = (0..n)
            .map(|i| set.add_variable(format!("u{}", i), None, lb, ub).unwrap())
            .collect();
        (set, vars)
    }

    #[test]
    fn classification() {
        let (mut set, vars) = set_with(3, -1., 1.);
        assert_eq!(set.special_type(), SpecialSetType::Box);
        set.add_special_type_constraint(SpecialSetType::Ball, 2.).unwrap();
        assert_eq!(set.special_type(), SpecialSetType::Ball);
        assert!((set.budget().unwrap() - 2.).abs() < 1e-12);
        set.clear_constraints();
        set.add_special_type_constraint(SpecialSetType::Budget, 1.5).unwrap();
        assert_eq!(set.special_type(), SpecialSetType::Budget);
        set.add_constraint("extra", sum_of(&vars).leq_value(1.)).unwrap();
        assert_eq!(set.special_type(), SpecialSetType::Other);
        assert!(set.budget().is_err());
        if let Err(ModelError::NoSpecialConstraint(_)) =
            set.add_special_type_constraint(SpecialSetType::Box, 1.)
        {
            // Intentionally blank
        } else {
            panic!("Box sets have no special constraint")
        }
    }

    #[test]
    fn unbounded_or_unioned_sets_are_other() {
        let (mut set, _) = set_with(2, -1., f64::INFINITY);
        assert_eq!(set.special_type(), SpecialSetType::Other);
        let (mut bounded, _) = set_with(2, -1., 1.);
        bounded.add_constraint_set();
        assert_eq!(bounded.special_type(), SpecialSetType::Other);
        assert_eq!(bounded.num_constraint_sets(), 2);
        let mut diagnostics = Diagnostics::new();
        assert!(!bounded.symmetric(&mut diagnostics));
        assert!(!set.rotational_invariant(&mut diagnostics));
        assert_eq!(diagnostics.warnings().count(), 2);
        set.clear_constraints();
        assert_eq!(set.num_constraint_sets(), 1);
    }

    #[test]
    fn stale_constraint_sets() {
        let (mut set, vars) = set_with(1, -1., 1.);
        let second = set.add_constraint_set();
        set.add_constraint_to(second, "c", AffineExpression::variable(vars[0]).leq_value(0.5))
            .unwrap();
        assert_eq!(set.constraints(second).unwrap().len(), 1);
        set.clear_constraints();
        assert!(set.constraints(second).is_err());
    }

    #[test]
    fn predicates() {
        let (set, _) = set_with(2, 0., 1.);
        let mut diagnostics = Diagnostics::new();
        assert!(set.all_0_1_variables());
        assert!(set.non_negative());
        assert!(set.rotational_invariant(&mut diagnostics));
        assert!(!set.symmetric(&mut diagnostics));
        assert!(!diagnostics.has_warnings());
        assert_eq!(set.lower_bounds(), vec![0., 0.]);
        assert_eq!(set.upper_bounds(), vec![1., 1.]);
    }

    #[test]
    fn k_active_bounds() {
        let (mut set, _) = set_with(4, -1., 1.);
        assert!((set.max_one_norm_k_active(0).unwrap()).abs() < 1e-12);
        assert!((set.max_one_norm_k_active(3).unwrap() - 3.).abs() < 1e-12);
        set.add_special_type_constraint(SpecialSetType::Ball, 1.).unwrap();
        assert!((set.max_one_norm_k_active(1).unwrap() - 1.).abs() < 1e-12);
        assert!((set.max_one_norm_k_active(4).unwrap() - 2.).abs() < 1e-12);
        set.clear_constraints();
        set.add_special_type_constraint(SpecialSetType::Budget, 2.5).unwrap();
        assert!((set.max_one_norm_k_active(2).unwrap() - 2.).abs() < 1e-12);
        assert!((set.max_one_norm_k_active(4).unwrap() - 2.5).abs() < 1e-12);
        if let Err(ModelError::TooManyActive { k: 5, n: 4 }) = set.max_one_norm_k_active(5) {
            // Intentionally blank
        } else {
            panic!("More active variables than variables")
        }
    }

    #[test]
    fn k_active_needs_equal_bounds() {
        let mut set = UncertaintySet::new("m");
        set.add_variable("a", None, -1., 1.).unwrap();
        set.add_variable("b", None, -2., 2.).unwrap();
        assert!(set.max_one_norm_k_active(1).is_err());
    }

    #[test]
    fn sampling_ball_and_budget() {
        let mut rng = StdRng::seed_from_u64(7);
        let (mut set, _) = set_with(3, -1., 1.);
        assert!(set.generate_uncertainty_with(5, &mut rng).is_err());
        set.add_special_type_constraint(SpecialSetType::Ball, 1.).unwrap();
        let samples = set.generate_uncertainty_with(50, &mut rng).unwrap();
        assert_eq!(samples.len(), 50);
        for sample in &samples {
            assert!(NormKind::Two.apply(sample.values()) <= 1. + 1e-9);
            assert!(set.in_uncertainty_set(sample).unwrap());
        }
        set.clear_constraints();
        set.add_special_type_constraint(SpecialSetType::Budget, 2.).unwrap();
        let samples = set.generate_uncertainty_with(50, &mut rng).unwrap();
        for sample in &samples {
            assert!(NormKind::One.apply(sample.values()) <= 2. + 1e-9);
            assert!(sample.values().iter().all(|v| v.abs() <= 1.));
        }
    }

    #[test]
    fn non_negative_samples() {
        let mut rng = StdRng::seed_from_u64(11);
        let (mut set, _) = set_with(2, 0., 1.);
        set.add_special_type_constraint(SpecialSetType::Budget, 1.).unwrap();
        let samples = set.generate_uncertainty_with(20, &mut rng).unwrap();
        assert!(samples.iter().all(|s| s.values().iter().all(|v| *v >= 0.)));
    }

    #[test]
    fn membership() {
        let (mut set, vars) = set_with(2, -1., 1.);
        set.add_constraint("first", sum_of(&vars).leq_value(0.)).unwrap();
        let second = set.add_constraint_set();
        set.add_constraint_to(second, "second", sum_of(&vars).geq_value(1.5))
            .unwrap();
        assert!(set.in_uncertainty_set(&vec![-0.5, 0.]).unwrap());
        assert!(set.in_uncertainty_set(&vec![1., 1.]).unwrap());
        assert!(!set.in_uncertainty_set(&vec![0.5, 0.5]).unwrap());
        assert!(!set.in_uncertainty_set(&vec![-2., 0.]).unwrap());
    }

    #[test]
    fn conic_export() {
        let (mut set, _) = set_with(2, -1., 1.);
        set.add_special_type_constraint(SpecialSetType::Ball, 1.).unwrap();
        let model = set.to_conic_model().unwrap();
        assert_eq!(model.name(), "Uncertaintym");
        assert_eq!(model.num_variables(), 2);
        assert_eq!(model.constraints().len(), 1);
        assert_eq!(model.constraints()[0].name(), "BallConstraint");
        assert!(!model.constraints()[0].is_affine());
        set.add_constraint_set();
        assert!(set.to_conic_model().is_err());
    }

    #[test]
    fn printing() {
        let (mut set, _) = set_with(1, -1., 1.);
        assert_eq!(
            set.full_string().unwrap(),
            "Uncertainty Set of m\nBOX\n-1 <= u0 p(-) <= 1"
        );
        set.add_constraint_set();
        assert!(set.full_string().unwrap().starts_with("Uncertainty Set of m\nOTHER"));
    }
}
