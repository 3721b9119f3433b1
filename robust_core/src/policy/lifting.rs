//! Piecewise affine policies through lifted uncertainty
//!
//! Every uncertainty variable `u` with breakpoints `b_1 < ... < b_{n-1}` is replaced by `n`
//! lifted variables `L_0..L_{n-1}` with `L_i` in `[0, b_{i+1} - b_i]` and `u = lb + sum_i L_i`.
//! An affine policy in the lifted variables is a piecewise affine policy in `u`. The lifted
//! model is compiled by the [`AffinePolicyCompiler`].
use std::borrow::Cow;
use std::rc::Rc;

use derive_builder::Builder;
use nalgebra::{DMatrix, DVector};

use crate::expression::{AffineExpression, LinearExpression};
use crate::optimize::constraint::{ConstraintSense, RawConstraint};
use crate::optimize::objective::Objective;
use crate::optimize::solvers::{ClarabelBackend, ConicBackend, SolverError, SolverSettings};
use crate::optimize::OptimizationStatus;
use crate::policy::{AffinePolicyCompiler, BreakpointSeries, PolicyError};
use crate::robust_model::uncertainty_set::UncertaintyConstraint;
use crate::robust_model::{
    ConstraintSetRef, DecisionRef, ExpectationProvider, ModelError, RoModel, SolutionRealization,
    UncertaintyRealization, UncertaintyRef, UncertaintySet,
};
use crate::utils::diagnostics::Diagnostics;

/// Tightenings added to the lifted uncertainty set
///
/// # Examples
/// ```rust
/// use robust_core::policy::LiftingOptionsBuilder;
/// let options = LiftingOptionsBuilder::default()
///     .use_old_box_constraints(true)
///     .build()
///     .unwrap();
/// assert!(options.breakpoint_tightening);
/// ```
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct LiftingOptions {
    /// Add the rotational invariance cuts when the set and the breakpoints allow them
    #[builder(default = "true")]
    pub breakpoint_tightening: bool,
    /// Bound the lifted mass outside of box constraint sets by accumulation instead of
    /// clipping every piece
    #[builder(default = "false")]
    pub use_old_box_constraints: bool,
}

impl Default for LiftingOptions {
    fn default() -> Self {
        Self {
            breakpoint_tightening: true,
            use_old_box_constraints: false,
        }
    }
}

/// Lifted variables replacing one original uncertainty variable
#[derive(Debug, Clone)]
struct LiftedAxis {
    /// `None` for variables copied without breakpoints
    series: Option<BreakpointSeries>,
    variables: Vec<UncertaintyRef>,
}

/// Map from original realizations to lifted realizations
#[derive(Debug, Clone)]
struct Lifting {
    axes: Vec<LiftedAxis>,
}

impl Lifting {
    fn lift(&self, realization: &UncertaintyRealization) -> Result<UncertaintyRealization, ModelError> {
        if realization.len() != self.axes.len() {
            return Err(ModelError::RealizationDimension {
                expected: self.axes.len(),
                found: realization.len(),
            });
        }
        // Lifted variables are created axis by axis, so concatenation follows their slots
        let mut values = Vec::new();
        for (axis, value) in self.axes.iter().zip(realization.values()) {
            match &axis.series {
                Some(series) => values.extend(series.lifted_realization(realization)?),
                None => values.push(*value),
            }
        }
        Ok(UncertaintyRealization::new(values))
    }
}

/// Expectations over the lifted uncertainty, using the distribution of the original model
#[derive(Debug, Clone)]
pub struct LiftedExpectationProvider {
    base: Rc<dyn ExpectationProvider>,
    lifting: Rc<Lifting>,
}

impl ExpectationProvider for LiftedExpectationProvider {
    fn expected_value(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<f64, ModelError>,
    ) -> Result<f64, ModelError> {
        self.base
            .expected_value(&|realization: &UncertaintyRealization| {
                f(&self.lifting.lift(realization)?)
            })
    }

    fn expected_vector(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<DVector<f64>, ModelError>,
    ) -> Result<DVector<f64>, ModelError> {
        self.base
            .expected_vector(&|realization: &UncertaintyRealization| {
                f(&self.lifting.lift(realization)?)
            })
    }

    fn expected_matrix(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<DMatrix<f64>, ModelError>,
    ) -> Result<DMatrix<f64>, ModelError> {
        self.base
            .expected_matrix(&|realization: &UncertaintyRealization| {
                f(&self.lifting.lift(realization)?)
            })
    }
}

/// Compiles a [`RoModel`] under piecewise affine decision rules
///
/// Breakpoints are added per uncertainty variable, variables without breakpoints are copied
/// into the lifted model unchanged.
///
/// # Examples
/// ```rust
/// use robust_core::expression::RoExpression;
/// use robust_core::optimize::objective::Objective;
/// use robust_core::policy::LiftingCompiler;
/// use robust_core::robust_model::RoModel;
///
/// let mut model = RoModel::new("cover");
/// let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
/// let x = model.add_decision_variable("x", None, f64::NEG_INFINITY, f64::INFINITY).unwrap();
/// model.add_constraint("c", RoExpression::decision(x).geq(&RoExpression::uncertainty(u)));
/// model.set_objective(Objective::minimize(RoExpression::decision(x)));
///
/// let mut compiler = LiftingCompiler::new(&model);
/// compiler.add_equidistant_breakpoints(2).unwrap();
/// compiler.solve().unwrap();
/// assert!((compiler.objective_value() - 1.).abs() < 1e-5);
/// ```
#[derive(Debug)]
pub struct LiftingCompiler<'m, B: ConicBackend = ClarabelBackend> {
    model: &'m RoModel,
    options: LiftingOptions,
    series: Vec<BreakpointSeries>,
    backend: Option<B>,
    settings: SolverSettings,
    lifting: Option<Rc<Lifting>>,
    affine: Option<AffinePolicyCompiler<'static, B>>,
    diagnostics: Diagnostics,
}

impl<'m> LiftingCompiler<'m, ClarabelBackend> {
    /// Compiler using the default clarabel backend
    pub fn new(model: &'m RoModel) -> Self {
        Self::with_backend(model, ClarabelBackend::default())
    }
}

impl<'m, B: ConicBackend> LiftingCompiler<'m, B> {
    // region Creation Functions
    pub fn with_backend(model: &'m RoModel, backend: B) -> Self {
        Self {
            model,
            options: LiftingOptions::default(),
            series: Vec::new(),
            backend: Some(backend),
            settings: SolverSettings::default(),
            lifting: None,
            affine: None,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn set_options(&mut self, options: LiftingOptions) {
        self.options = options;
    }

    pub fn set_use_old_box_constraints(&mut self, use_old_box_constraints: bool) {
        self.options.use_old_box_constraints = use_old_box_constraints;
    }

    pub fn set_breakpoint_tightening(&mut self, breakpoint_tightening: bool) {
        self.options.breakpoint_tightening = breakpoint_tightening;
    }

    pub fn options(&self) -> &LiftingOptions {
        &self.options
    }
    // endregion Creation Functions

    // region Breakpoints
    /// Add breakpoints along a direction in the original uncertainty
    pub fn add_break_points(
        &mut self,
        break_points: Vec<f64>,
        direction: LinearExpression<UncertaintyRef>,
    ) -> Result<(), PolicyError> {
        if self.affine.is_some() {
            return Err(SolverError::AlreadyBuilt.into());
        }
        let series = BreakpointSeries::new(break_points, direction, self.model.uncertainty_set())?;
        tracing::debug!(
            break_points = ?series.break_points(),
            "added breakpoint series"
        );
        self.series.push(series);
        Ok(())
    }

    pub fn break_point_series(&self) -> &[BreakpointSeries] {
        &self.series
    }

    /// Split every uncertainty variable into `num_pieces` pieces of equal width
    pub fn add_equidistant_breakpoints(&mut self, num_pieces: usize) -> Result<(), PolicyError> {
        let model = self.model;
        for (uncertainty, variable) in model.uncertainty_set().iter() {
            let width = variable.upper_bound() - variable.lower_bound();
            let break_points = (1..num_pieces)
                .map(|i| variable.lower_bound() + i as f64 * width / num_pieces as f64)
                .collect();
            self.add_break_points(break_points, LinearExpression::variable(uncertainty))?;
        }
        Ok(())
    }

    /// Breakpoints at the increments of the largest one norm with `k` active variables
    ///
    /// The same breakpoints are added for every uncertainty variable. Symmetric sets get
    /// breakpoints on both sides of zero.
    ///
    /// # Returns
    /// An error if the set is not rotationally invariant, or neither symmetric nor
    /// non-negative
    pub fn add_kappa_induced_breakpoints(&mut self, num_pieces: usize) -> Result<(), PolicyError> {
        let model = self.model;
        let set = model.uncertainty_set();
        if !set.rotational_invariant(&mut self.diagnostics) {
            return Err(PolicyError::KappaRequirements(
                "the uncertainty set is not rotationally invariant".to_string(),
            ));
        }
        let symmetric = set.symmetric(&mut self.diagnostics);
        if !symmetric && !set.non_negative() {
            return Err(PolicyError::KappaRequirements(
                "the uncertainty set is neither symmetric nor non-negative".to_string(),
            ));
        }
        let num_variables = set.num_variables();
        let k_active = |breakpoint: usize| breakpoint * num_variables / num_pieces;
        let mut break_points = Vec::with_capacity(2 * num_pieces);
        if symmetric {
            for breakpoint in 1..num_pieces {
                let k = k_active(breakpoint);
                break_points
                    .push(set.max_one_norm_k_active(k)? - set.max_one_norm_k_active(k + 1)?);
            }
            break_points.push(0.);
        }
        for breakpoint in (1..num_pieces).rev() {
            let k = k_active(breakpoint);
            break_points.push(set.max_one_norm_k_active(k + 1)? - set.max_one_norm_k_active(k)?);
        }
        for uncertainty in set.indices() {
            self.add_break_points(break_points.clone(), LinearExpression::variable(uncertainty))?;
        }
        Ok(())
    }

    /// Kappa induced breakpoints with one piece per uncertainty variable
    pub fn add_full_kappa_induced_breakpoints(&mut self) -> Result<(), PolicyError> {
        self.add_kappa_induced_breakpoints(self.model.num_uncertainty_variables())
    }

    /// Breakpoints at the equidistant empirical percentiles of every uncertainty variable
    ///
    /// Percentiles between two samples are interpolated linearly.
    pub fn add_percentile_breakpoints(
        &mut self,
        num_pieces: usize,
        realizations: &[UncertaintyRealization],
    ) -> Result<(), PolicyError> {
        if realizations.is_empty() {
            return Err(ModelError::EmptyRealizations.into());
        }
        let model = self.model;
        let expected = model.num_uncertainty_variables();
        if let Some(realization) = realizations.iter().find(|r| r.len() != expected) {
            return Err(ModelError::RealizationDimension {
                expected,
                found: realization.len(),
            }
            .into());
        }
        for (position, uncertainty) in model.uncertainty_indices().into_iter().enumerate() {
            let mut samples: Vec<f64> = realizations.iter().map(|r| r.values()[position]).collect();
            samples.sort_by(f64::total_cmp);
            let break_points = (1..num_pieces)
                .map(|i| percentile(&samples, i as f64 / num_pieces as f64))
                .collect();
            self.add_break_points(break_points, LinearExpression::variable(uncertainty))?;
        }
        Ok(())
    }
    // endregion Breakpoints

    // region Build
    /// Build the lifted model and compile it, may only be called once
    pub fn build(&mut self) -> Result<(), PolicyError> {
        if self.affine.is_some() {
            return Err(SolverError::AlreadyBuilt.into());
        }
        let (lifted, lifting) = self.lift_model()?;
        tracing::info!(
            model = self.model.name(),
            series = self.series.len(),
            uncertainties = lifted.num_uncertainty_variables(),
            "lifted uncertainty"
        );
        let backend = self.backend.take().ok_or(SolverError::AlreadyBuilt)?;
        self.lifting = Some(lifting);
        let affine = self
            .affine
            .insert(AffinePolicyCompiler::from_cow(Cow::Owned(lifted), backend));
        affine.build()
    }

    fn lift_model(&mut self) -> Result<(RoModel, Rc<Lifting>), PolicyError> {
        let model = self.model;
        let set = model.uncertainty_set();

        let mut axis_series: Vec<Option<&BreakpointSeries>> = vec![None; set.num_variables()];
        for series in &self.series {
            let axis = series.axis_direction()?;
            let variable = set.variable(axis)?;
            let entry = &mut axis_series[axis.slot()];
            if entry.is_some() {
                return Err(PolicyError::DuplicateBreakpointDirection(
                    variable.name().to_string(),
                ));
            }
            *entry = Some(series);
        }

        let mut lifted = RoModel::new(format!("{}_lifted", model.name()));
        let mut axes = Vec::with_capacity(set.num_variables());
        let mut retractions = Vec::with_capacity(set.num_variables());
        for ((_, variable), series) in set.iter().zip(&axis_series) {
            match series {
                Some(series) => {
                    let mut pieces = Vec::with_capacity(series.num_pieces());
                    let mut retraction = AffineExpression::constant_value(series.lower_bound());
                    for i in 0..series.num_pieces() {
                        let piece = lifted.add_uncertainty_variable(
                            format!("{}_L{}", variable.name(), i),
                            variable.period(),
                            0.,
                            series.piece_width(i),
                        )?;
                        retraction = retraction.add_term(1., piece);
                        pieces.push(piece);
                    }
                    axes.push(LiftedAxis {
                        series: Some((*series).clone()),
                        variables: pieces,
                    });
                    retractions.push(retraction);
                }
                None => {
                    let copy = lifted.add_uncertainty_variable(
                        variable.name(),
                        variable.period(),
                        variable.lower_bound(),
                        variable.upper_bound(),
                    )?;
                    axes.push(LiftedAxis {
                        series: None,
                        variables: vec![copy],
                    });
                    retractions.push(AffineExpression::variable(copy));
                }
            }
        }

        // region Uncertainty Constraints
        for _ in 1..set.num_constraint_sets() {
            lifted.add_uncertainty_constraint_set();
        }
        let original_sets = set.constraint_sets();
        let lifted_sets = lifted.uncertainty_set().constraint_sets();
        let mut retract = |u: &UncertaintyRef| -> Result<AffineExpression<UncertaintyRef>, ModelError> {
            set.variable(*u)?;
            Ok(u.lookup(&retractions)?.clone())
        };
        for (original_set, lifted_set) in original_sets.iter().zip(&lifted_sets) {
            for ((_, variable), axis) in set.iter().zip(&axes) {
                let Some(series) = &axis.series else { continue };
                for i in 1..series.num_pieces() {
                    let fill = AffineExpression::term(
                        1. / series.piece_width(i),
                        axis.variables[i],
                    )
                    .add_term(-1. / series.piece_width(i - 1), axis.variables[i - 1]);
                    lifted.add_uncertainty_constraint_to(
                        *lifted_set,
                        format!("BoundLiftedWithPrevious{}_{}", variable.name(), i),
                        fill.leq_value(0.),
                    )?;
                }
            }
            for constraint in set.constraints(*original_set)? {
                let expression = constraint.expression().substitute(&mut retract)?;
                lifted.add_uncertainty_constraint_to(
                    *lifted_set,
                    constraint.name(),
                    RawConstraint::new(constraint.sense(), expression),
                )?;
            }
        }
        // endregion Uncertainty Constraints

        // region Decisions, Constraints and Objective
        let mut decision_map = Vec::with_capacity(model.num_decision_variables());
        for variable in model.decision_variables() {
            let decision = match variable.period() {
                Some(period) => lifted.add_decision_variable(
                    variable.name(),
                    Some(period),
                    variable.lower_bound(),
                    variable.upper_bound(),
                )?,
                None => {
                    let mut dependencies = Vec::new();
                    for dependency in variable.dependencies() {
                        dependencies.extend_from_slice(&dependency.lookup(&axes)?.variables);
                    }
                    lifted.add_decision_variable_with_dependencies(
                        variable.name(),
                        &dependencies,
                        variable.lower_bound(),
                        variable.upper_bound(),
                    )?
                }
            };
            decision_map.push(decision);
        }
        let mut decisions = |d: &DecisionRef| -> Result<DecisionRef, ModelError> {
            model.decision_variable(*d)?;
            Ok(*d.lookup(&decision_map)?)
        };
        for constraint in model.constraints() {
            let expression = constraint
                .expression()
                .substitute(&mut decisions, &mut retract)?;
            lifted.add_constraint(
                constraint.name(),
                RawConstraint::new(constraint.sense(), expression),
            );
        }
        let objective = model.objective()?;
        let expression = objective
            .expression()
            .substitute(&mut decisions, &mut retract)?;
        lifted.set_objective(Objective::new(objective.sense(), expression));
        // endregion Decisions, Constraints and Objective

        // region Tightening
        let lower_bounds = set.lower_bounds();
        let upper_bounds = set.upper_bounds();
        for (original_set, lifted_set) in original_sets.iter().zip(&lifted_sets) {
            let constraint_set = set.constraint_set(*original_set)?;
            if !constraint_set.is_box() {
                continue;
            }
            let (box_lbs, box_ubs) = box_bounds(
                set,
                constraint_set.constraints(),
                lower_bounds.clone(),
                upper_bounds.clone(),
            )?;
            for (((_, variable), axis), (box_lb, box_ub)) in set
                .iter()
                .zip(&axes)
                .zip(box_lbs.into_iter().zip(box_ubs))
            {
                let Some(series) = &axis.series else { continue };
                let pieces = BoxPieces {
                    set: *lifted_set,
                    name: variable.name(),
                    series,
                    variables: &axis.variables,
                    box_lb,
                    box_ub,
                };
                if self.options.use_old_box_constraints {
                    pieces.add_accumulated_bounds(&mut lifted)?;
                } else {
                    pieces.add_clipped_bounds(&mut lifted)?;
                }
            }
        }
        if self.options.breakpoint_tightening
            && identical_series(&axes)
            && set.rotational_invariant(&mut self.diagnostics)
        {
            self.add_rotational_tightening(&mut lifted, &axes)?;
        }
        // endregion Tightening

        let lifting = Rc::new(Lifting { axes });
        if let Some(base) = model.shared_expectation_provider() {
            lifted.set_shared_expectation_provider(Rc::new(LiftedExpectationProvider {
                base,
                lifting: Rc::clone(&lifting),
            }));
        }
        Ok((lifted, lifting))
    }

    /// Caps on the lifted mass outside of each breakpoint, valid for rotationally invariant
    /// sets where every variable has the same breakpoints
    fn add_rotational_tightening(
        &mut self,
        lifted: &mut RoModel,
        axes: &[LiftedAxis],
    ) -> Result<(), PolicyError> {
        let model = self.model;
        let set = model.uncertainty_set();
        let Some(first) = axes.first().and_then(|axis| axis.series.as_ref()) else {
            return Ok(());
        };
        let num_pieces = first.num_pieces();
        if first.symmetric() && set.symmetric(&mut self.diagnostics) {
            let mut lhs = AffineExpression::new();
            for i in 0..num_pieces / 2 {
                for axis in axes {
                    lhs = lhs
                        .add_constant(first.piece_width(i))
                        .add_term(-1., axis.variables[i])
                        .add_term(1., axis.variables[num_pieces - i - 1]);
                }
                let budget = outside_budget(set, -first.break_point(i))?;
                lifted.add_uncertainty_constraint(
                    format!("RotationalBound_BP{}", i),
                    lhs.leq_value(budget),
                )?;
            }
        }
        if set.non_negative() {
            let mut lhs = AffineExpression::new();
            for i in (0..num_pieces).rev() {
                for axis in axes {
                    lhs = lhs.add_term(1., axis.variables[i]);
                }
                let budget = outside_budget(set, first.previous_break_point(i))?;
                lifted.add_uncertainty_constraint(
                    format!("RotationalBound_BP{}", i),
                    lhs.leq_value(budget),
                )?;
            }
        }
        Ok(())
    }
    // endregion Build

    // region Solve
    /// Build if needed, then solve the compiled lifted model
    pub fn solve(&mut self) -> Result<OptimizationStatus, PolicyError> {
        if self.affine.is_none() {
            self.build()?;
        }
        let affine = self.affine.as_mut().ok_or(PolicyError::NotBuilt)?;
        affine.set_solver_settings(self.settings.clone());
        affine.solve()
    }

    pub fn set_runtime_limit(&mut self, limit: impl Into<Option<f64>>) {
        self.settings.runtime_limit = limit.into();
    }

    pub fn set_memory_limit(&mut self, limit: impl Into<Option<f64>>) {
        self.settings.memory_limit = limit.into();
    }

    pub fn set_solver_settings(&mut self, settings: SolverSettings) {
        self.settings = settings;
    }

    pub fn status(&self) -> OptimizationStatus {
        self.affine
            .as_ref()
            .map_or(OptimizationStatus::Unsolved, |affine| affine.status())
    }

    pub fn has_solution(&self) -> bool {
        self.affine
            .as_ref()
            .map_or(false, |affine| affine.has_solution())
    }

    /// Runtime of the last solve in seconds, NaN before any solve
    pub fn runtime(&self) -> f64 {
        self.affine.as_ref().map_or(f64::NAN, |affine| affine.runtime())
    }

    /// Objective value of the last solve, NaN without a solution
    pub fn objective_value(&self) -> f64 {
        self.affine
            .as_ref()
            .map_or(f64::NAN, |affine| affine.objective_value())
    }
    // endregion Solve

    // region Accessors
    pub fn model(&self) -> &'m RoModel {
        self.model
    }

    pub fn is_built(&self) -> bool {
        self.affine.as_ref().map_or(false, |affine| affine.is_built())
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The compiler of the lifted model
    pub fn affine_compiler(&self) -> Result<&AffinePolicyCompiler<'static, B>, PolicyError> {
        match &self.affine {
            Some(affine) if affine.is_built() => Ok(affine),
            _ => Err(PolicyError::NotBuilt),
        }
    }

    pub fn lifted_model(&self) -> Result<&RoModel, PolicyError> {
        Ok(self.affine_compiler()?.model())
    }
    // endregion Accessors

    // region Solutions
    /// Realization of the lifted variables belonging to an original realization
    pub fn lifted_uncertainty_realization(
        &self,
        realization: &UncertaintyRealization,
    ) -> Result<UncertaintyRealization, PolicyError> {
        let lifting = self.lifting.as_ref().ok_or(PolicyError::NotBuilt)?;
        Ok(lifting.lift(realization)?)
    }

    /// Evaluate the piecewise affine policies at a realization of the original uncertainty
    pub fn specific_solution(
        &self,
        realization: &UncertaintyRealization,
    ) -> Result<SolutionRealization<'m>, PolicyError> {
        let lifted = self.lifted_uncertainty_realization(realization)?;
        let solutions = self
            .affine_compiler()?
            .specific_solution(&lifted)?
            .solutions()
            .to_vec();
        Ok(SolutionRealization::new(
            self.model,
            realization.values().to_vec(),
            solutions,
        )?)
    }
    // endregion Solutions
}

/// Box tightening of one lifted variable inside one box constraint set
struct BoxPieces<'a> {
    set: ConstraintSetRef,
    name: &'a str,
    series: &'a BreakpointSeries,
    variables: &'a [UncertaintyRef],
    box_lb: f64,
    box_ub: f64,
}

impl BoxPieces<'_> {
    /// Clip each piece to the box and fill the pieces inside the box in order
    fn add_clipped_bounds(&self, lifted: &mut RoModel) -> Result<(), ModelError> {
        let set_slot = self.set.slot();
        for i in 0..self.series.num_pieces() {
            let previous = self.series.previous_break_point(i);
            let break_point = self.series.break_point(i);
            let width = break_point - previous;
            let lower_lift = (self.box_lb - previous).max(0.).min(width);
            let upper_lift = (self.box_ub - previous).max(0.).min(width);
            let piece = self.variables[i];
            lifted.add_uncertainty_constraint_to(
                self.set,
                format!("BoundLiftedBoxLB{}_{}_{}", set_slot, self.name, i),
                AffineExpression::variable(piece).geq_value(lower_lift),
            )?;
            lifted.add_uncertainty_constraint_to(
                self.set,
                format!("BoundLiftedBoxUB{}_{}_{}", set_slot, self.name, i),
                AffineExpression::variable(piece).leq_value(upper_lift),
            )?;
            if self.box_lb < break_point && break_point < self.box_ub {
                let next_upper_lift =
                    (self.box_ub - break_point).min(self.series.break_point(i + 1) - break_point);
                let remaining = width - lower_lift;
                let fill = AffineExpression::term(1. / remaining, piece)
                    .add_constant(-lower_lift / remaining)
                    .add_term(-1. / next_upper_lift, self.variables[i + 1]);
                lifted.add_uncertainty_constraint_to(
                    self.set,
                    format!("BoundLiftedWithPreviousBox{}_{}_{}", set_slot, self.name, i),
                    fill.geq_value(0.),
                )?;
            }
        }
        Ok(())
    }

    /// Bound the lifted mass of the pieces outside the box and of the boundary pieces
    fn add_accumulated_bounds(&self, lifted: &mut RoModel) -> Result<(), ModelError> {
        let set_slot = self.set.slot();
        let mut inside_lb = 0;
        let mut outside_ub = self.series.num_pieces();
        let mut outer = AffineExpression::new();
        for i in 0..self.series.num_pieces() {
            let interval_lb = self.series.previous_break_point(i);
            let interval_ub = self.series.break_point(i);
            if interval_ub <= self.box_lb {
                inside_lb += 1;
                outer = outer
                    .add_term(-1., self.variables[i])
                    .add_constant(interval_ub - interval_lb);
            }
            if interval_lb >= self.box_ub {
                outside_ub -= 1;
                outer = outer.add_term(1., self.variables[i]);
            }
        }
        if !outer.linear().is_empty() {
            lifted.add_uncertainty_constraint_to(
                self.set,
                format!("LiftedBoxConstrOuter_{}_US{}", self.name, set_slot),
                outer.leq_value(0.),
            )?;
        }
        if inside_lb >= outside_ub {
            return Ok(());
        }

        let lb_overreach = self.series.break_point(inside_lb) - self.box_lb;
        let ub_overreach = self.box_ub - self.series.previous_break_point(outside_ub - 1);
        let lb_piece = self.variables[inside_lb];
        let ub_piece = self.variables[outside_ub - 1];
        let lb_width = self.series.piece_width(inside_lb);
        let smaller_name = format!("LiftedBoxConstrOuterSmaller_{}_US{}", self.name, set_slot);
        if lb_overreach < ub_overreach {
            let lower = outer
                .clone()
                .add_constant(lb_width)
                .add_term(-1., lb_piece);
            lifted.add_uncertainty_constraint_to(
                self.set,
                smaller_name.clone(),
                lower.leq_value(lb_overreach),
            )?;
        }
        if ub_overreach < lb_overreach || lb_piece == ub_piece {
            let upper = outer.clone().add_term(1., ub_piece);
            lifted.add_uncertainty_constraint_to(
                self.set,
                smaller_name,
                upper.leq_value(ub_overreach),
            )?;
        }
        if lb_piece != ub_piece {
            let full = outer
                .add_constant(lb_width)
                .add_term(-1., lb_piece)
                .add_term(1., ub_piece);
            lifted.add_uncertainty_constraint_to(
                self.set,
                format!("LiftedBoxConstrOuterFull_{}_US{}", self.name, set_slot),
                full.leq_value(lb_overreach.max(ub_overreach)),
            )?;
        }
        Ok(())
    }
}

/// Variable bounds intersected with the bounds of a box constraint set
fn box_bounds(
    set: &UncertaintySet,
    constraints: &[UncertaintyConstraint],
    mut lower: Vec<f64>,
    mut upper: Vec<f64>,
) -> Result<(Vec<f64>, Vec<f64>), ModelError> {
    for constraint in constraints {
        let affine = constraint.expression().affine();
        let linear = affine.linear().simplify();
        let [term] = linear.terms() else { continue };
        set.variable(term.variable)?;
        // scale * u + constant sense 0
        let bound = -affine.constant() / term.scale;
        let slot = term.variable.slot();
        let (bounds_above, bounds_below) = match (constraint.sense(), term.scale > 0.) {
            (ConstraintSense::Leq, true) | (ConstraintSense::Geq, false) => (true, false),
            (ConstraintSense::Geq, true) | (ConstraintSense::Leq, false) => (false, true),
            (ConstraintSense::Eq, _) => (true, true),
        };
        if bounds_above {
            upper[slot] = upper[slot].min(bound);
        }
        if bounds_below {
            lower[slot] = lower[slot].max(bound);
        }
    }
    Ok((lower, upper))
}

/// Whether every variable is lifted with the same breakpoints
fn identical_series(axes: &[LiftedAxis]) -> bool {
    let Some(first) = axes.first().and_then(|axis| axis.series.as_ref()) else {
        return false;
    };
    axes.iter().all(|axis| {
        axis.series
            .as_ref()
            .is_some_and(|series| series.break_points() == first.break_points())
    })
}

/// Largest one norm mass beyond `bound` over all numbers of active variables
fn outside_budget(set: &UncertaintySet, bound: f64) -> Result<f64, ModelError> {
    let mut budget: f64 = 0.;
    for k in 1..=set.num_variables() {
        budget = budget.max(set.max_one_norm_k_active(k)? - k as f64 * bound);
    }
    Ok(budget)
}

/// Linearly interpolated percentile `p` of sorted samples
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let index = p * (sorted.len() - 1) as f64;
    let low = index.floor() as usize;
    let high = (low + 1).min(sorted.len() - 1);
    sorted[low] + (sorted[high] - sorted[low]) * (index - low as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{RoExpression, UncertaintyMode, NO_LOWER_BOUND, NO_UPPER_BOUND};
    use crate::robust_model::{EmpiricalExpectationProvider, SpecialSetType};

    const TOL: f64 = 1e-5;

    /// `x >= |u|` with `x` adjustable on `u` in `[-1, 1]`, minimizing the mean of `x` over
    /// the samples -1, 0 and 1
    fn absolute_value_model() -> (RoModel, UncertaintyRef, DecisionRef) {
        let mut model = RoModel::new("abs");
        let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
        let x = model
            .add_decision_variable_with_dependencies("x", &[u], NO_LOWER_BOUND, NO_UPPER_BOUND)
            .unwrap();
        model.add_constraint(
            "above",
            RoExpression::decision(x).geq(&RoExpression::uncertainty(u)),
        );
        model.add_constraint(
            "below",
            RoExpression::decision(x).geq(&RoExpression::uncertainty(u).negate()),
        );
        model.set_objective(Objective::minimize(
            RoExpression::decision(x).with_mode(UncertaintyMode::Stochastic),
        ));
        model.set_expectation_provider(
            EmpiricalExpectationProvider::from_values(vec![vec![-1.], vec![0.], vec![1.]])
                .unwrap(),
        );
        (model, u, x)
    }

    fn constraint_names(model: &RoModel) -> Vec<String> {
        model
            .uncertainty_set()
            .constraint_sets()
            .into_iter()
            .flat_map(|set| {
                model
                    .uncertainty_set()
                    .constraints(set)
                    .unwrap()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn lifted_model_structure() {
        let (model, _, _) = absolute_value_model();
        let mut compiler = LiftingCompiler::new(&model);
        if let Err(PolicyError::NotBuilt) = compiler.lifted_model() {
            // Intentionally blank
        } else {
            panic!("Lifted model available before building")
        }
        compiler.add_equidistant_breakpoints(2).unwrap();
        compiler.build().unwrap();
        let lifted = compiler.lifted_model().unwrap();
        assert_eq!(lifted.name(), "abs_lifted");
        let names: Vec<&str> = lifted
            .uncertainty_variables()
            .iter()
            .map(|v| v.name())
            .collect();
        assert_eq!(names, vec!["u_L0", "u_L1"]);
        for variable in lifted.uncertainty_variables() {
            assert!(variable.lower_bound().abs() < 1e-25);
            assert!((variable.upper_bound() - 1.).abs() < 1e-25);
        }
        assert_eq!(
            lifted.decision_variables()[0].dependencies(),
            lifted.uncertainty_indices().as_slice()
        );
        let names = constraint_names(lifted);
        assert!(names.contains(&"BoundLiftedWithPreviousu_1".to_string()));
        assert!(names.contains(&"BoundLiftedBoxLB0_u_0".to_string()));
        assert!(names.contains(&"BoundLiftedWithPreviousBox0_u_0".to_string()));
        assert!(names.contains(&"RotationalBound_BP0".to_string()));
        assert!(lifted.has_expectation_provider());

        if let Err(PolicyError::Solver(SolverError::AlreadyBuilt)) = compiler.build() {
            // Intentionally blank
        } else {
            panic!("Lifting compiler built twice")
        }
    }

    #[test]
    fn piecewise_policy_beats_affine() {
        let (model, u, x) = absolute_value_model();
        let mut affine = AffinePolicyCompiler::new(&model);
        assert_eq!(affine.solve().unwrap(), OptimizationStatus::Optimal);
        assert!((affine.objective_value() - 1.).abs() < TOL);

        for use_old_box_constraints in [false, true] {
            let mut compiler = LiftingCompiler::new(&model);
            compiler.set_use_old_box_constraints(use_old_box_constraints);
            compiler
                .add_break_points(vec![0.], LinearExpression::variable(u))
                .unwrap();
            assert_eq!(compiler.solve().unwrap(), OptimizationStatus::Optimal);
            assert!((compiler.objective_value() - 2. / 3.).abs() < TOL);

            // The optimal policy is |u|
            for (value, expected) in [(-1., 1.), (-0.5, 0.5), (0., 0.), (0.5, 0.5), (1., 1.)] {
                let solution = compiler
                    .specific_solution(&UncertaintyRealization::new(vec![value]))
                    .unwrap();
                assert!((solution.solutions()[x.slot()] - expected).abs() < 1e-4);
                assert_eq!(solution.realization(), &[value]);
            }
        }
    }

    #[test]
    fn lifted_realizations() {
        let mut model = RoModel::new("mixed");
        let u = model.add_uncertainty_variable("u", None, 0., 3.).unwrap();
        let w = model.add_uncertainty_variable("w", None, -1., 1.).unwrap();
        let x = model
            .add_decision_variable_with_dependencies("x", &[u, w], NO_LOWER_BOUND, NO_UPPER_BOUND)
            .unwrap();
        model.add_constraint(
            "c",
            RoExpression::decision(x).geq(&RoExpression::uncertainty(u).add_uncertainty(1., w)),
        );
        model.set_objective(Objective::minimize(RoExpression::decision(x)));

        let mut compiler = LiftingCompiler::new(&model);
        compiler
            .add_break_points(vec![1., 2.], LinearExpression::variable(u))
            .unwrap();
        if let Err(PolicyError::NotBuilt) =
            compiler.lifted_uncertainty_realization(&UncertaintyRealization::new(vec![0., 0.]))
        {
            // Intentionally blank
        } else {
            panic!("Lifting available before building")
        }
        compiler.build().unwrap();
        let lifted = compiler.lifted_model().unwrap();
        // Three pieces of u and the copied w
        assert_eq!(lifted.num_uncertainty_variables(), 4);
        assert_eq!(lifted.uncertainty_variables()[3].name(), "w");
        assert_eq!(lifted.decision_variables()[0].dependencies().len(), 4);

        let realization = compiler
            .lifted_uncertainty_realization(&UncertaintyRealization::new(vec![1.5, -0.25]))
            .unwrap();
        assert_eq!(realization.values(), &[1., 0.5, 0., -0.25]);
        if let Err(PolicyError::Model(ModelError::RealizationDimension { expected: 2, found: 1 })) =
            compiler.lifted_uncertainty_realization(&UncertaintyRealization::new(vec![1.]))
        {
            // Intentionally blank
        } else {
            panic!("Realization of the wrong dimension lifted")
        }
    }

    #[test]
    fn periods_survive_lifting() {
        let mut model = RoModel::new("periods");
        let u0 = model.add_uncertainty_variable("u0", Some(0), 0., 2.).unwrap();
        let u1 = model.add_uncertainty_variable("u1", Some(1), -1., 1.).unwrap();
        let x0 = model
            .add_decision_variable("x0", Some(0), NO_LOWER_BOUND, NO_UPPER_BOUND)
            .unwrap();
        let x1 = model
            .add_decision_variable("x1", Some(1), NO_LOWER_BOUND, NO_UPPER_BOUND)
            .unwrap();
        model.add_constraint(
            "c0",
            RoExpression::decision(x0).geq(&RoExpression::uncertainty(u0)),
        );
        model.add_constraint(
            "c1",
            RoExpression::decision(x1).geq(&RoExpression::uncertainty(u1)),
        );
        model.set_objective(Objective::minimize(
            RoExpression::decision(x0).add_decision(1., x1),
        ));

        let mut compiler = LiftingCompiler::new(&model);
        compiler
            .add_break_points(vec![1.], LinearExpression::variable(u0))
            .unwrap();
        compiler.build().unwrap();
        let lifted = compiler.lifted_model().unwrap();
        let uncertainties = lifted.uncertainty_indices();
        let names: Vec<&str> = lifted
            .uncertainty_variables()
            .iter()
            .map(|v| v.name())
            .collect();
        assert_eq!(names, vec!["u0_L0", "u0_L1", "u1"]);
        let periods: Vec<Option<usize>> = lifted
            .uncertainty_variables()
            .iter()
            .map(|v| v.period())
            .collect();
        assert_eq!(periods, vec![Some(0), Some(0), Some(1)]);

        let decisions = lifted.decision_variables();
        assert_eq!(decisions[0].period(), Some(0));
        assert_eq!(decisions[1].period(), Some(1));
        assert_eq!(decisions[0].dependencies(), &uncertainties[..2]);
        assert_eq!(decisions[1].dependencies(), uncertainties.as_slice());

        assert_eq!(compiler.solve().unwrap(), OptimizationStatus::Optimal);
        assert!((compiler.objective_value() - 3.).abs() < TOL);
    }

    #[test]
    fn box_constraint_set_tightening() {
        // u <= 0.5 cuts into the second piece
        let mut model = RoModel::new("clipped");
        let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
        let x = model
            .add_decision_variable("x", None, NO_LOWER_BOUND, NO_UPPER_BOUND)
            .unwrap();
        model
            .add_uncertainty_constraint("cap", AffineExpression::variable(u).leq_value(0.5))
            .unwrap();
        model.add_constraint(
            "c",
            RoExpression::decision(x).geq(&RoExpression::uncertainty(u)),
        );
        model.set_objective(Objective::minimize(RoExpression::decision(x)));

        let mut compiler = LiftingCompiler::new(&model);
        compiler.add_equidistant_breakpoints(2).unwrap();
        compiler.solve().unwrap();
        assert!((compiler.objective_value() - 0.5).abs() < TOL);
        let lifted = compiler.lifted_model().unwrap();
        let set = lifted.uncertainty_set().constraint_sets()[0];
        let upper = lifted
            .uncertainty_set()
            .constraints(set)
            .unwrap()
            .iter()
            .find(|c| c.name() == "BoundLiftedBoxUB0_u_1")
            .unwrap();
        let values = [1., 0.75];
        assert!(!upper.constraint_satisfied(&values[..]).unwrap());

        let mut old = LiftingCompiler::new(&model);
        old.set_options(
            LiftingOptionsBuilder::default()
                .use_old_box_constraints(true)
                .build()
                .unwrap(),
        );
        old.add_equidistant_breakpoints(2).unwrap();
        old.solve().unwrap();
        assert!((old.objective_value() - 0.5).abs() < TOL);
        let names = constraint_names(old.lifted_model().unwrap());
        assert!(names.contains(&"LiftedBoxConstrOuterSmaller_u_US0".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("BoundLiftedBox")));
    }

    #[test]
    fn breakpoint_placement() {
        let mut model = RoModel::new("placement");
        model.add_uncertainty_variable("u", None, 0., 3.).unwrap();
        let mut compiler = LiftingCompiler::new(&model);
        compiler.add_equidistant_breakpoints(3).unwrap();
        assert_eq!(compiler.break_point_series()[0].break_points(), &[1., 2.]);

        let samples: Vec<UncertaintyRealization> = [2., 0., 3., 1., 0.5]
            .into_iter()
            .map(|v| UncertaintyRealization::new(vec![v]))
            .collect();
        let mut compiler = LiftingCompiler::new(&model);
        compiler.add_percentile_breakpoints(4, &samples).unwrap();
        // Sorted samples 0, 0.5, 1, 2, 3
        assert_eq!(compiler.break_point_series()[0].break_points(), &[0.5, 1., 2.]);
        if let Err(PolicyError::Model(ModelError::EmptyRealizations)) =
            compiler.add_percentile_breakpoints(2, &[])
        {
            // Intentionally blank
        } else {
            panic!("Percentiles of no samples")
        }
    }

    #[test]
    fn kappa_induced_breakpoints() {
        let mut model = RoModel::new("ball");
        model
            .add_uncertainty_variables(2, "u", None, -1., 1.)
            .unwrap();
        model
            .add_special_uncertainty_constraint(SpecialSetType::Ball, 1.)
            .unwrap();
        let mut compiler = LiftingCompiler::new(&model);
        compiler.add_full_kappa_induced_breakpoints().unwrap();
        let step = 2f64.sqrt() - 1.;
        for series in compiler.break_point_series() {
            let expected = [-step, 0., step];
            assert_eq!(series.break_points().len(), 3);
            for (found, expected) in series.break_points().iter().zip(expected) {
                assert!((found - expected).abs() < 1e-12);
            }
        }

        let mut model = RoModel::new("box");
        model
            .add_uncertainty_variables(2, "u", None, -1., 1.)
            .unwrap();
        let mut compiler = LiftingCompiler::new(&model);
        compiler.add_kappa_induced_breakpoints(2).unwrap();
        // Every increment is one, only zero stays inside the range
        assert_eq!(compiler.break_point_series()[0].break_points(), &[0.]);
    }

    #[test]
    fn kappa_requirements() {
        let mut model = RoModel::new("shifted");
        model.add_uncertainty_variable("u", None, -1., 2.).unwrap();
        let mut compiler = LiftingCompiler::new(&model);
        if let Err(PolicyError::KappaRequirements(_)) = compiler.add_kappa_induced_breakpoints(2) {
            // Intentionally blank
        } else {
            panic!("Kappa breakpoints for an asymmetric set")
        }

        let mut model = RoModel::new("other");
        let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
        let w = model.add_uncertainty_variable("w", None, -1., 1.).unwrap();
        model
            .add_uncertainty_constraint(
                "sum",
                AffineExpression::variable(u).add_term(1., w).leq_value(1.),
            )
            .unwrap();
        let mut compiler = LiftingCompiler::new(&model);
        if let Err(PolicyError::KappaRequirements(_)) = compiler.add_kappa_induced_breakpoints(2) {
            // Intentionally blank
        } else {
            panic!("Kappa breakpoints for a general set")
        }
        assert!(compiler.diagnostics().has_warnings());
    }

    #[test]
    fn unsupported_directions() {
        let (model, u, _) = absolute_value_model();
        let mut compiler = LiftingCompiler::new(&model);
        compiler
            .add_break_points(vec![0.], LinearExpression::term(2., u))
            .unwrap();
        if let Err(PolicyError::NotAxisAligned) = compiler.build() {
            // Intentionally blank
        } else {
            panic!("Scaled direction lifted")
        }

        let mut compiler = LiftingCompiler::new(&model);
        compiler.add_equidistant_breakpoints(2).unwrap();
        compiler.add_equidistant_breakpoints(3).unwrap();
        if let Err(PolicyError::DuplicateBreakpointDirection(name)) = compiler.build() {
            assert_eq!(name, "u");
        } else {
            panic!("Variable lifted twice")
        }
    }

    #[test]
    fn lifted_expectations() {
        let (model, u, _) = absolute_value_model();
        let mut compiler = LiftingCompiler::new(&model);
        compiler
            .add_break_points(vec![0.], LinearExpression::variable(u))
            .unwrap();
        compiler.build().unwrap();
        let provider = compiler
            .lifted_model()
            .unwrap()
            .expectation_provider()
            .unwrap();
        // Lifted samples (0, 0), (1, 0) and (1, 1)
        let first = provider.expected_value(&|r| Ok(r.values()[0])).unwrap();
        assert!((first - 2. / 3.).abs() < 1e-12);
        let second = provider
            .expected_vector(&|r| Ok(DVector::from_column_slice(r.values())))
            .unwrap();
        assert!((second[1] - 1. / 3.).abs() < 1e-12);
    }
}
