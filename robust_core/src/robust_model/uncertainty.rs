//! Uncertainty variables and their products with decisions
use crate::expression::VariableKind;
use crate::robust_model::decision::DecisionRef;
use crate::robust_model::model::RoModel;
use crate::robust_model::uncertainty_set::UncertaintySet;
use crate::robust_model::ModelError;
use crate::utils::store::Index;

/// Handle of an uncertainty variable of an [`UncertaintySet`]
pub type UncertaintyRef = Index<UncertaintyVariable>;

/// A parameter whose value is only known to lie in the uncertainty set
#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintyVariable {
    name: String,
    period: Option<usize>,
    lower_bound: f64,
    upper_bound: f64,
}

impl UncertaintyVariable {
    pub(crate) fn new(
        name: impl Into<String>,
        period: Option<usize>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Self, ModelError> {
        if lower_bound > upper_bound {
            return Err(ModelError::InvalidVariableBounds);
        }
        Ok(Self {
            name: name.into(),
            period,
            lower_bound,
            upper_bound,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Option<usize> {
        self.period
    }

    pub fn has_period(&self) -> bool {
        self.period.is_some()
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    /// Whether the variable ranges over exactly `[0, 1]`
    pub fn is_0_1_var(&self) -> bool {
        self.lower_bound == 0. && self.upper_bound == 1.
    }

    /// Whether both bounds are finite
    pub fn bounded(&self) -> bool {
        self.lower_bound.is_finite() && self.upper_bound.is_finite()
    }
}

impl VariableKind for UncertaintyRef {
    type Context = UncertaintySet;

    fn bounds(&self, context: &UncertaintySet) -> Result<(f64, f64), ModelError> {
        let variable = context.variable(*self)?;
        Ok((variable.lower_bound, variable.upper_bound))
    }

    fn label(&self, context: &UncertaintySet) -> Result<String, ModelError> {
        Ok(context.variable(*self)?.name.clone())
    }
}

/// Product `u * x` of an uncertainty and a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UncertaintyScaledDecision {
    pub uncertainty: UncertaintyRef,
    pub decision: DecisionRef,
}

impl UncertaintyScaledDecision {
    pub fn new(uncertainty: UncertaintyRef, decision: DecisionRef) -> Self {
        Self {
            uncertainty,
            decision,
        }
    }
}

impl VariableKind for UncertaintyScaledDecision {
    type Context = RoModel;

    /// Smallest and largest of the four products of the bounds
    fn bounds(&self, context: &RoModel) -> Result<(f64, f64), ModelError> {
        let (ulb, uub) = self.uncertainty.bounds(context.uncertainty_set())?;
        let (dlb, dub) = self.decision.bounds(context)?;
        let products = [
            bound_product(ulb, dlb),
            bound_product(ulb, dub),
            bound_product(uub, dlb),
            bound_product(uub, dub),
        ];
        let lb = products.iter().fold(f64::INFINITY, |acc, p| acc.min(*p));
        let ub = products.iter().fold(f64::NEG_INFINITY, |acc, p| acc.max(*p));
        Ok((lb, ub))
    }

    fn label(&self, context: &RoModel) -> Result<String, ModelError> {
        Ok(format!(
            "{}*{}",
            self.uncertainty.label(context.uncertainty_set())?,
            self.decision.label(context)?
        ))
    }
}

/// Product of two bounds where a zero bound absorbs an infinite one
fn bound_product(a: f64, b: f64) -> f64 {
    if a == 0. || b == 0. {
        0.
    } else {
        a * b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_properties() {
        let var = UncertaintyVariable::new("u", Some(1), 0., 1.).unwrap();
        assert!(var.is_0_1_var());
        assert!(var.bounded());
        assert_eq!(var.period(), Some(1));
        let unbounded = UncertaintyVariable::new("v", None, 0., f64::INFINITY).unwrap();
        assert!(!unbounded.bounded());
        assert!(!unbounded.is_0_1_var());
        assert!(UncertaintyVariable::new("w", None, 2., 1.).is_err());
    }

    #[test]
    fn scaled_decision_bounds() {
        let mut model = RoModel::new("m");
        let u = model.add_uncertainty_variable("u", None, -2., 1.).unwrap();
        let x = model.add_decision_variable("x", None, 0., f64::INFINITY).unwrap();
        let y = model.add_decision_variable("y", None, -1., 3.).unwrap();
        let ux = UncertaintyScaledDecision::new(u, x);
        assert_eq!(ux.bounds(&model).unwrap(), (f64::NEG_INFINITY, f64::INFINITY));
        let uy = UncertaintyScaledDecision::new(u, y);
        assert_eq!(uy.bounds(&model).unwrap(), (-6., 3.));
        assert_eq!(uy.label(&model).unwrap(), "u*y");
    }

    #[test]
    fn zero_bound_absorbs_infinity() {
        let mut model = RoModel::new("m");
        let u = model.add_uncertainty_variable("u", None, 0., 1.).unwrap();
        let x = model.add_decision_variable("x", None, 0., f64::INFINITY).unwrap();
        let ux = UncertaintyScaledDecision::new(u, x);
        assert_eq!(ux.bounds(&model).unwrap(), (0., f64::INFINITY));
    }
}
