//! Expressions mixing decisions, uncertainties and their products
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::{AffineExpression, Assignment, LinearExpression};
use crate::optimize::constraint::{ConstraintSense, RawConstraint};
use crate::optimize::variable::ConicRef;
use crate::robust_model::decision::DecisionRef;
use crate::robust_model::model::RoModel;
use crate::robust_model::uncertainty::{UncertaintyRef, UncertaintyScaledDecision};
use crate::robust_model::ModelError;

/// How an uncertain expression is combined over the alternative constraint sets of an
/// uncertainty set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UncertaintyMode {
    /// Worst case over every alternative constraint set
    #[default]
    Union,
    /// Mean of the worst cases of each alternative constraint set
    Average,
    /// Expectation under the model's expectation provider
    Stochastic,
}

impl Display for UncertaintyMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UncertaintyMode::Union => write!(f, "UNION"),
            UncertaintyMode::Average => write!(f, "AVERAGE"),
            UncertaintyMode::Stochastic => write!(f, "STOCHASTIC"),
        }
    }
}

/// `constant + decisions + uncertainties + uncertainty scaled decisions`
///
/// The mode only matters once the expression is reformulated, arithmetic keeps the mode of
/// the left hand side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoExpression {
    constant: f64,
    decisions: LinearExpression<DecisionRef>,
    uncertainties: LinearExpression<UncertaintyRef>,
    uncertainty_decisions: LinearExpression<UncertaintyScaledDecision>,
    mode: UncertaintyMode,
}

impl RoExpression {
    // region Creation Functions
    /// Create a zero expression
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        constant: f64,
        decisions: LinearExpression<DecisionRef>,
        uncertainties: LinearExpression<UncertaintyRef>,
        uncertainty_decisions: LinearExpression<UncertaintyScaledDecision>,
        mode: UncertaintyMode,
    ) -> Self {
        Self {
            constant,
            decisions,
            uncertainties,
            uncertainty_decisions,
            mode,
        }
    }

    pub fn constant_value(constant: f64) -> Self {
        Self::new().add_constant(constant)
    }

    /// A single decision variable
    pub fn decision(decision: DecisionRef) -> Self {
        Self::new().add_decision(1., decision)
    }

    /// A single uncertainty variable
    pub fn uncertainty(uncertainty: UncertaintyRef) -> Self {
        Self::new().add_uncertainty(1., uncertainty)
    }

    /// The product of one uncertainty and one decision
    pub fn scaled_decision(uncertainty: UncertaintyRef, decision: DecisionRef) -> Self {
        Self::new().add_scaled_decision(1., uncertainty, decision)
    }

    pub fn from_decisions(expr: &AffineExpression<DecisionRef>) -> Self {
        Self {
            constant: expr.constant(),
            decisions: expr.linear().clone(),
            ..Self::default()
        }
    }

    pub fn from_uncertainties(expr: &AffineExpression<UncertaintyRef>) -> Self {
        Self {
            constant: expr.constant(),
            uncertainties: expr.linear().clone(),
            ..Self::default()
        }
    }
    // endregion Creation Functions

    // region Accessors
    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn decisions(&self) -> &LinearExpression<DecisionRef> {
        &self.decisions
    }

    pub fn uncertainties(&self) -> &LinearExpression<UncertaintyRef> {
        &self.uncertainties
    }

    pub fn uncertainty_decisions(&self) -> &LinearExpression<UncertaintyScaledDecision> {
        &self.uncertainty_decisions
    }

    pub fn mode(&self) -> UncertaintyMode {
        self.mode
    }

    /// Same expression with a different uncertainty mode
    pub fn with_mode(mut self, mode: UncertaintyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn set_mode(&mut self, mode: UncertaintyMode) {
        self.mode = mode;
    }

    /// Whether every coefficient and the constant vanish
    pub fn is_zero(&self) -> bool {
        self.constant == 0.
            && self.decisions.is_zero()
            && self.uncertainties.is_zero()
            && self.uncertainty_decisions.is_zero()
    }
    // endregion Accessors

    // region Arithmetic
    pub fn add_constant(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    pub fn add_decision(mut self, scale: f64, decision: DecisionRef) -> Self {
        self.decisions.push(scale, decision);
        self
    }

    pub fn add_uncertainty(mut self, scale: f64, uncertainty: UncertaintyRef) -> Self {
        self.uncertainties.push(scale, uncertainty);
        self
    }

    pub fn add_scaled_decision(
        mut self,
        scale: f64,
        uncertainty: UncertaintyRef,
        decision: DecisionRef,
    ) -> Self {
        self.uncertainty_decisions
            .push(scale, UncertaintyScaledDecision::new(uncertainty, decision));
        self
    }

    pub fn add_decisions(mut self, decisions: &LinearExpression<DecisionRef>) -> Self {
        self.decisions = self.decisions.add(decisions);
        self
    }

    pub fn add_uncertainties(mut self, uncertainties: &LinearExpression<UncertaintyRef>) -> Self {
        self.uncertainties = self.uncertainties.add(uncertainties);
        self
    }

    pub fn add(mut self, other: &RoExpression) -> Self {
        self.constant += other.constant;
        self.decisions = self.decisions.add(&other.decisions);
        self.uncertainties = self.uncertainties.add(&other.uncertainties);
        self.uncertainty_decisions = self.uncertainty_decisions.add(&other.uncertainty_decisions);
        self
    }

    pub fn sub(self, other: &RoExpression) -> Self {
        self.add(&other.negate())
    }

    pub fn scale(mut self, factor: f64) -> Self {
        self.constant *= factor;
        self.decisions = self.decisions.scale(factor);
        self.uncertainties = self.uncertainties.scale(factor);
        self.uncertainty_decisions = self.uncertainty_decisions.scale(factor);
        self
    }

    pub fn negate(&self) -> Self {
        self.clone().scale(-1.)
    }

    /// Merge repeated terms and drop zero coefficients
    pub fn simplify(&self) -> Self {
        Self {
            constant: self.constant,
            decisions: self.decisions.simplify(),
            uncertainties: self.uncertainties.simplify(),
            uncertainty_decisions: self.uncertainty_decisions.simplify(),
            mode: self.mode,
        }
    }
    // endregion Arithmetic

    // region Constraint Builders
    /// `self <= other`, stored as `self - other <= 0`
    pub fn leq(&self, other: &RoExpression) -> RawConstraint<RoExpression> {
        RawConstraint::new(ConstraintSense::Leq, self.clone().sub(other))
    }

    /// `self >= other`, stored as `self - other >= 0`
    pub fn geq(&self, other: &RoExpression) -> RawConstraint<RoExpression> {
        RawConstraint::new(ConstraintSense::Geq, self.clone().sub(other))
    }

    /// `self == other`, stored as `self - other == 0`
    pub fn equals(&self, other: &RoExpression) -> RawConstraint<RoExpression> {
        RawConstraint::new(ConstraintSense::Eq, self.clone().sub(other))
    }

    pub fn leq_value(&self, value: f64) -> RawConstraint<RoExpression> {
        RawConstraint::new(ConstraintSense::Leq, self.clone().add_constant(-value))
    }

    pub fn geq_value(&self, value: f64) -> RawConstraint<RoExpression> {
        RawConstraint::new(ConstraintSense::Geq, self.clone().add_constant(-value))
    }

    pub fn equals_value(&self, value: f64) -> RawConstraint<RoExpression> {
        RawConstraint::new(ConstraintSense::Eq, self.clone().add_constant(-value))
    }
    // endregion Constraint Builders

    // region Evaluation
    /// Evaluate for a full assignment of decisions and uncertainties
    pub fn value<A>(&self, assignment: &A) -> Result<f64, ModelError>
    where
        A: Assignment<DecisionRef>
            + Assignment<UncertaintyRef>
            + Assignment<UncertaintyScaledDecision>
            + ?Sized,
    {
        Ok(self.constant
            + self.decisions.value(assignment)?
            + self.uncertainties.value(assignment)?
            + self.uncertainty_decisions.value(assignment)?)
    }

    pub fn lb(&self, model: &RoModel) -> Result<f64, ModelError> {
        Ok(self.constant
            + self.decisions.lb(model)?
            + self.uncertainties.lb(model.uncertainty_set())?
            + self.uncertainty_decisions.lb(model)?)
    }

    pub fn ub(&self, model: &RoModel) -> Result<f64, ModelError> {
        Ok(self.constant
            + self.decisions.ub(model)?
            + self.uncertainties.ub(model.uncertainty_set())?
            + self.uncertainty_decisions.ub(model)?)
    }
    // endregion Evaluation

    // region Substitution
    /// Replace decisions by other decisions and uncertainties by affine expressions of
    /// uncertainties, products are expanded linearly
    pub fn substitute<FD, FU>(
        &self,
        mut decisions: FD,
        mut uncertainties: FU,
    ) -> Result<RoExpression, ModelError>
    where
        FD: FnMut(&DecisionRef) -> Result<DecisionRef, ModelError>,
        FU: FnMut(&UncertaintyRef) -> Result<AffineExpression<UncertaintyRef>, ModelError>,
    {
        let mut result = RoExpression::constant_value(self.constant).with_mode(self.mode);
        result.decisions = self.decisions.translate(&mut decisions)?;
        let uncertainty_sub = self.uncertainties.substitute(&mut uncertainties)?;
        result.constant += uncertainty_sub.constant();
        result.uncertainties = uncertainty_sub.linear().clone();
        for term in self.uncertainty_decisions.terms() {
            let decision = decisions(&term.variable.decision)?;
            let replacement = uncertainties(&term.variable.uncertainty)?;
            if replacement.constant() != 0. {
                result
                    .decisions
                    .push(term.scale * replacement.constant(), decision);
            }
            for inner in replacement.linear().terms() {
                result.uncertainty_decisions.push(
                    term.scale * inner.scale,
                    UncertaintyScaledDecision::new(inner.variable, decision),
                );
            }
        }
        Ok(result)
    }

    /// Replace decisions by conic affine expressions and fix uncertainties to a realization
    pub fn substitute_to_conic<FD, A>(
        &self,
        mut decisions: FD,
        realization: &A,
    ) -> Result<AffineExpression<ConicRef>, ModelError>
    where
        FD: FnMut(&DecisionRef) -> Result<AffineExpression<ConicRef>, ModelError>,
        A: Assignment<UncertaintyRef> + ?Sized,
    {
        let mut result = self
            .decisions
            .substitute(&mut decisions)?
            .add_constant(self.constant + self.uncertainties.value(realization)?);
        for term in self.uncertainty_decisions.terms() {
            let factor = term.scale * realization.value_of(&term.variable.uncertainty)?;
            result = result.add(&decisions(&term.variable.decision)?.scale(factor));
        }
        Ok(result)
    }
    // endregion Substitution

    pub fn to_string_with(&self, model: &RoModel) -> Result<String, ModelError> {
        let mut parts = Vec::new();
        if !self.decisions.is_empty() {
            parts.push(self.decisions.to_string_with(model)?);
        }
        if !self.uncertainties.is_empty() {
            parts.push(self.uncertainties.to_string_with(model.uncertainty_set())?);
        }
        if !self.uncertainty_decisions.is_empty() {
            parts.push(self.uncertainty_decisions.to_string_with(model)?);
        }
        if self.constant != 0. || parts.is_empty() {
            parts.push(self.constant.to_string());
        }
        Ok(format!("{} [{}]", parts.join(" + "), self.mode))
    }
}

impl From<RawConstraint<AffineExpression<DecisionRef>>> for RawConstraint<RoExpression> {
    fn from(raw: RawConstraint<AffineExpression<DecisionRef>>) -> Self {
        RawConstraint::new(raw.sense, RoExpression::from_decisions(&raw.expression))
    }
}
