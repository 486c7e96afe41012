//! Assembly of the constraint system for a model.
//!
//! Every generator contributes variables, constraints and costs according to its operational type.
//! The builders in the submodules share a read-only [`BuildContext`] and append to a single
//! [`ConstraintSystem`], which is only returned once assembly has completed without error.
use crate::generator::{Generator, GeneratorID, OperationalType};
use crate::linked::LinkedBoundaryValue;
use crate::model::Model;
use crate::problem::{
    ConstraintFamily, ConstraintSystem, Domain, GeneratorVariable, LinearExpr, VariableKey,
};
use crate::requirements::{ReserveDirection, ReserveID};
use crate::temporal::window::WindowResolver;
use crate::temporal::{Previous, TimepointID};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use std::collections::HashMap;

pub mod balance;
pub mod classifier;
pub mod commitment;
pub mod min_time;
pub mod simple;
pub mod solve;
pub mod trajectory;

pub use commitment::CommitmentDomain;

/// Reserve products a generator provides, split by direction
#[derive(Debug, Default)]
struct ReserveProvision {
    up: Vec<ReserveID>,
    down: Vec<ReserveID>,
}

/// Read-only state shared by the constraint builders
pub struct BuildContext<'a> {
    /// The model being assembled
    pub model: &'a Model,
    /// Memoised lookback windows
    pub windows: WindowResolver<'a>,
    provision: HashMap<GeneratorID, ReserveProvision>,
}

impl<'a> BuildContext<'a> {
    /// Create a context for the given model
    pub fn new(model: &'a Model) -> Self {
        let mut provision = HashMap::new();
        for generator in model.iter_generators() {
            let mut reserves = ReserveProvision::default();
            for id in &generator.reserves {
                // References are checked when the model is assembled
                let Some(product) = model.requirements.reserve(id) else {
                    continue;
                };
                match product.direction {
                    ReserveDirection::Up => reserves.up.push(id.clone()),
                    ReserveDirection::Down => reserves.down.push(id.clone()),
                }
            }
            provision.insert(generator.id.clone(), reserves);
        }

        Self {
            model,
            windows: WindowResolver::new(&model.temporal),
            provision,
        }
    }

    /// Total reserve provision of a generator in the given direction
    pub fn reserves(
        &self,
        generator: &Generator,
        direction: ReserveDirection,
        tp: TimepointID,
    ) -> LinearExpr {
        let Some(provision) = self.provision.get(&generator.id) else {
            return LinearExpr::default();
        };
        let products = match direction {
            ReserveDirection::Up => &provision.up,
            ReserveDirection::Down => &provision.down,
        };

        products
            .iter()
            .map(|reserve| {
                LinearExpr::var(VariableKey::Provision {
                    generator: generator.id.clone(),
                    reserve: reserve.clone(),
                    timepoint: tp,
                })
            })
            .sum()
    }

    /// Look up the predecessor of a timepoint, fetching linked values where needed.
    ///
    /// Returns `None` at the start of a linear horizon.
    pub fn prior(&self, generator: &Generator, prev: Previous) -> Result<Option<Prior<'a>>> {
        Ok(match prev {
            Previous::Timepoint(tp) => Some(Prior::Timepoint(tp)),
            Previous::Linked(index) => Some(Prior::Linked {
                index,
                value: self.model.linked.value(&generator.id, index)?,
            }),
            Previous::None => None,
        })
    }

    /// Every (predecessor, timepoint) pair for a generator's balancing type
    pub fn transitions(&self, generator: &Generator) -> Result<Vec<(Prior<'a>, TimepointID)>> {
        let mut transitions = Vec::new();
        for (prev, tp) in self
            .model
            .temporal
            .iter_transitions(&generator.balancing_type)
        {
            if let Some(prior) = self.prior(generator, prev)? {
                transitions.push((prior, tp));
            }
        }

        Ok(transitions)
    }
}

/// The timepoint preceding a transition.
///
/// Quantities for a linked predecessor are constants taken from the previous subproblem.
#[derive(Debug, Clone, Copy)]
pub enum Prior<'a> {
    /// A timepoint of this subproblem
    Timepoint(TimepointID),
    /// A timepoint of the previous subproblem
    Linked {
        /// Linked index
        index: i32,
        /// The generator's values in that timepoint
        value: &'a LinkedBoundaryValue,
    },
}

impl Prior<'_> {
    fn variable_or(
        &self,
        generator: &Generator,
        variable: GeneratorVariable,
        linked: impl FnOnce(&LinkedBoundaryValue) -> f64,
    ) -> LinearExpr {
        match self {
            Self::Timepoint(tp) => gen_var(generator, variable, *tp),
            Self::Linked { value, .. } => LinearExpr::constant(linked(value)),
        }
    }

    /// Commitment status
    pub fn commit(&self, generator: &Generator) -> LinearExpr {
        self.variable_or(generator, GeneratorVariable::Commit, |value| value.commit)
    }

    /// Power above the minimum stable level
    pub fn power_above_pmin(&self, generator: &Generator) -> LinearExpr {
        self.variable_or(generator, GeneratorVariable::PowerAbovePmin, |value| {
            value.power_above_pmin.value()
        })
    }

    /// Minimum stable level power while committed
    pub fn committed_pmin(&self, generator: &Generator) -> LinearExpr {
        match self {
            Self::Timepoint(tp) => LinearExpr::term(
                VariableKey::generator(&generator.id, GeneratorVariable::Commit, *tp),
                generator.pmin(*tp).value(),
            ),
            Self::Linked { value, .. } => {
                LinearExpr::constant(value.pmin.value() * value.commit)
            }
        }
    }

    /// Shutdown trajectory power
    pub fn shutdown_power(&self, generator: &Generator) -> LinearExpr {
        self.variable_or(generator, GeneratorVariable::ShutdownPower, |value| {
            value.shutdown_power.value()
        })
    }

    /// Total reserve provision in the given direction
    pub fn reserves(
        &self,
        ctx: &BuildContext,
        generator: &Generator,
        direction: ReserveDirection,
    ) -> LinearExpr {
        match self {
            Self::Timepoint(tp) => ctx.reserves(generator, direction, *tp),
            Self::Linked { value, .. } => LinearExpr::constant(match direction {
                ReserveDirection::Up => value.upward_reserves.value(),
                ReserveDirection::Down => value.downward_reserves.value(),
            }),
        }
    }

    /// Steady-state ramp-up limit over the predecessor
    pub fn ramp_up_limit(&self, ctx: &BuildContext, generator: &Generator) -> f64 {
        match self {
            Self::Timepoint(tp) => generator
                .ramp_up_limit(ctx.model.temporal.duration(*tp))
                .value(),
            Self::Linked { value, .. } => value.ramp_up_limit.value(),
        }
    }

    /// Steady-state ramp-down limit over the predecessor
    pub fn ramp_down_limit(&self, ctx: &BuildContext, generator: &Generator) -> f64 {
        match self {
            Self::Timepoint(tp) => generator
                .ramp_down_limit(ctx.model.temporal.duration(*tp))
                .value(),
            Self::Linked { value, .. } => value.ramp_down_limit.value(),
        }
    }

    /// Shutdown trajectory ramp limit over the predecessor
    pub fn shutdown_ramp_limit(&self, ctx: &BuildContext, generator: &Generator) -> f64 {
        match self {
            Self::Timepoint(tp) => generator
                .shutdown_ramp_limit(ctx.model.temporal.duration(*tp))
                .value(),
            Self::Linked { value, .. } => value.shutdown_ramp_limit.value(),
        }
    }

    /// Startup trajectory power of a profile
    pub fn startup_power(
        &self,
        ctx: &BuildContext,
        generator: &Generator,
        profile: usize,
    ) -> Result<LinearExpr> {
        Ok(match self {
            Self::Timepoint(tp) => {
                gen_var(generator, GeneratorVariable::StartupPower(profile), *tp)
            }
            Self::Linked { index, .. } => LinearExpr::constant(
                ctx.model
                    .linked
                    .startup(&generator.id, *index, profile)?
                    .startup_power
                    .value(),
            ),
        })
    }

    /// Startup trajectory ramp limit of a profile over the predecessor
    pub fn startup_ramp_limit(
        &self,
        ctx: &BuildContext,
        generator: &Generator,
        profile: usize,
    ) -> Result<f64> {
        Ok(match self {
            Self::Timepoint(tp) => generator.startup_profiles()[profile]
                .ramp_rate
                .limit_over(ctx.model.temporal.duration(*tp), generator.capacity)
                .value(),
            Self::Linked { index, .. } => ctx
                .model
                .linked
                .startup(&generator.id, *index, profile)?
                .startup_ramp_limit
                .value(),
        })
    }
}

/// Counts reported once the system has been assembled
#[derive(PartialEq, Debug, Default, Clone)]
pub struct BuildSummary {
    /// Number of variables
    pub num_variables: usize,
    /// Number of constraints
    pub num_constraints: usize,
    /// Number of constraints of each family
    pub constraints_by_family: IndexMap<ConstraintFamily, usize>,
    /// Minimum up/down time constraints skipped because their window held only one timepoint
    pub degenerate_windows: usize,
    /// Ramp constraints left out because they could never bind
    pub omitted_ramps: usize,
}

impl BuildSummary {
    /// Note a constraint skipped because of a degenerate window
    pub(crate) fn record_degenerate(
        &mut self,
        family: ConstraintFamily,
        generator: &GeneratorID,
        tp: TimepointID,
    ) {
        debug!("Skipping {family} for generator {generator} in timepoint {tp}: degenerate window");
        self.degenerate_windows += 1;
    }
}

/// A generator's variable as an expression
pub(crate) fn gen_var(
    generator: &Generator,
    variable: GeneratorVariable,
    tp: TimepointID,
) -> LinearExpr {
    LinearExpr::var(VariableKey::generator(&generator.id, variable, tp))
}

/// Assemble the complete constraint system for a model.
///
/// Fails if any generator is inconsistent with the model or lacks the linked boundary data its
/// constraints need. No partial system is returned.
pub fn build_system(model: &Model) -> Result<(ConstraintSystem, BuildSummary)> {
    let ctx = BuildContext::new(model);
    let mut system = ConstraintSystem::default();
    let mut summary = BuildSummary::default();

    for generator in model.iter_generators() {
        add_generator_variables(&ctx, &mut system, generator);
    }
    balance::add_variables(&ctx, &mut system);

    for generator in model.iter_generators() {
        add_generator_constraints(&ctx, &mut system, &mut summary, generator).with_context(
            || format!("Could not build constraints for generator {}", generator.id),
        )?;
        add_generator_costs(&ctx, &mut system, generator);
    }
    balance::add_constraints(&ctx, &mut system);

    summary.num_variables = system.num_variables();
    summary.num_constraints = system.num_constraints();
    summary.constraints_by_family = system.count_by_family();
    info!(
        "Built {} constraints over {} variables for {} generators",
        summary.num_constraints,
        summary.num_variables,
        model.generators.len()
    );
    if summary.degenerate_windows > 0 {
        info!(
            "Skipped {} constraints with degenerate windows",
            summary.degenerate_windows
        );
    }

    Ok((system, summary))
}

fn add_generator_variables(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) {
    match generator.operational_type {
        OperationalType::CommitBinary => {
            commitment::add_variables(ctx, system, generator, CommitmentDomain::Binary);
        }
        OperationalType::CommitContinuous => {
            commitment::add_variables(ctx, system, generator, CommitmentDomain::Continuous);
        }
        OperationalType::AlwaysOn => simple::add_always_on_variables(ctx, system, generator),
        OperationalType::Variable => simple::add_variable_variables(ctx, system, generator),
    }

    for tp in ctx.model.temporal.iter_ids() {
        for reserve in &generator.reserves {
            let key = VariableKey::Provision {
                generator: generator.id.clone(),
                reserve: reserve.clone(),
                timepoint: tp,
            };
            system.add_variable(key, Domain::NON_NEGATIVE);
        }
    }
}

fn add_generator_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    summary: &mut BuildSummary,
    generator: &Generator,
) -> Result<()> {
    match generator.operational_type {
        OperationalType::CommitBinary => {
            add_commitment_constraints(ctx, system, summary, generator, CommitmentDomain::Binary)
        }
        OperationalType::CommitContinuous => add_commitment_constraints(
            ctx,
            system,
            summary,
            generator,
            CommitmentDomain::Continuous,
        ),
        OperationalType::AlwaysOn => {
            simple::add_always_on_constraints(ctx, system, summary, generator)
        }
        OperationalType::Variable => {
            simple::add_variable_constraints(ctx, system, generator);
            Ok(())
        }
    }
}

fn add_commitment_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    summary: &mut BuildSummary,
    generator: &Generator,
    domain: CommitmentDomain,
) -> Result<()> {
    commitment::add_constraints(ctx, system, generator, domain)?;
    classifier::add_constraints(ctx, system, generator)?;
    trajectory::add_constraints(ctx, system, summary, generator)?;
    min_time::add_constraints(ctx, system, summary, generator)?;

    Ok(())
}

/// Gross power output of a generator in a timepoint
pub fn gross_power(generator: &Generator, tp: TimepointID) -> LinearExpr {
    match generator.operational_type {
        OperationalType::CommitBinary | OperationalType::CommitContinuous => {
            let trajectory: LinearExpr = (0..generator.num_startup_profiles())
                .map(|s| gen_var(generator, GeneratorVariable::StartupPower(s), tp))
                .sum();
            LinearExpr::term(
                VariableKey::generator(&generator.id, GeneratorVariable::Commit, tp),
                generator.pmin(tp).value(),
            ) + gen_var(generator, GeneratorVariable::PowerAbovePmin, tp)
                + trajectory
                + gen_var(generator, GeneratorVariable::ShutdownPower, tp)
        }
        OperationalType::AlwaysOn => {
            LinearExpr::constant(generator.pmin(tp).value())
                + gen_var(generator, GeneratorVariable::PowerAbovePmin, tp)
        }
        OperationalType::Variable => gen_var(generator, GeneratorVariable::Power, tp),
    }
}

/// Power delivered to the load zone after auxiliary consumption
pub fn net_power(generator: &Generator, tp: TimepointID) -> LinearExpr {
    let gross = gross_power(generator, tp);
    let retained = 1.0 - generator.aux_consumption_frac_power.value();
    let aux_when_synced = (generator.capacity * generator.aux_consumption_frac_capacity).value();

    match generator.operational_type {
        OperationalType::CommitBinary | OperationalType::CommitContinuous => {
            gross * retained
                - LinearExpr::term(
                    VariableKey::generator(&generator.id, GeneratorVariable::Synced, tp),
                    aux_when_synced,
                )
        }
        OperationalType::AlwaysOn => gross * retained - LinearExpr::constant(aux_when_synced),
        OperationalType::Variable => gross,
    }
}

fn add_generator_costs(ctx: &BuildContext, system: &mut ConstraintSystem, generator: &Generator) {
    for timepoint in ctx.model.temporal.iter() {
        let tp = timepoint.id;
        let weight = timepoint.weight.value();
        let energy_cost = generator.variable_cost.value() * timepoint.duration.value() * weight;
        system.add_cost(&gross_power(generator, tp), energy_cost);

        if generator.operational_type.is_committable() {
            commitment::add_costs(system, generator, tp, weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::fixture::{commit_generator, linked_data, model_with, temporal_index};
    use crate::linked::LinkedBoundaryData;
    use crate::temporal::Boundary;
    use crate::units::Dimensionless;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn var(variable: GeneratorVariable, tp: u32) -> VariableKey {
        VariableKey::generator(&"gen1".into(), variable, TimepointID(tp))
    }

    #[rstest]
    fn test_build_system_summary(commit_generator: Generator) {
        let model = model_with(
            commit_generator,
            temporal_index(&[1.0; 4], Boundary::Circular, &[]),
            LinkedBoundaryData::default(),
        );
        let (system, summary) = build_system(&model).unwrap();
        assert_eq!(summary.num_constraints, system.num_constraints());
        assert_eq!(summary.num_variables, system.num_variables());
        assert_eq!(
            summary.constraints_by_family[&ConstraintFamily::CommitTransition],
            4
        );
        assert_eq!(summary.constraints_by_family[&ConstraintFamily::LoadBalance], 4);
        assert_eq!(
            summary.constraints_by_family.values().sum::<usize>(),
            summary.num_constraints
        );
    }

    #[rstest]
    fn test_gross_and_net_power(mut commit_generator: Generator) {
        commit_generator.aux_consumption_frac_power = Dimensionless(0.1);
        commit_generator.aux_consumption_frac_capacity = Dimensionless(0.02);

        let values = HashMap::from([
            (var(GeneratorVariable::Commit, 1), 1.0),
            (var(GeneratorVariable::PowerAbovePmin, 1), 20.0),
            (var(GeneratorVariable::Synced, 1), 1.0),
        ]);
        let tp = TimepointID(1);
        assert_approx_eq!(
            f64,
            gross_power(&commit_generator, tp).evaluate(&values),
            60.0
        );
        assert_approx_eq!(
            f64,
            net_power(&commit_generator, tp).evaluate(&values),
            52.0
        );
    }

    #[rstest]
    fn test_always_on_power_is_offset_by_pmin(mut commit_generator: Generator) {
        commit_generator.operational_type = OperationalType::AlwaysOn;
        let values = HashMap::from([(var(GeneratorVariable::PowerAbovePmin, 1), 5.0)]);
        assert_approx_eq!(
            f64,
            gross_power(&commit_generator, TimepointID(1)).evaluate(&values),
            45.0
        );
    }

    #[rstest]
    fn test_costs(commit_generator: Generator) {
        let model = model_with(
            commit_generator,
            temporal_index(&[2.0, 1.0], Boundary::Linear, &[]),
            LinkedBoundaryData::default(),
        );
        let (system, _) = build_system(&model).unwrap();

        // Variable cost 20 per MWh over a 2h timepoint
        let p1 = system.variable(&var(GeneratorVariable::PowerAbovePmin, 1)).unwrap();
        assert_approx_eq!(f64, p1.cost, 40.0);
        // Minimum stable level of 40 MW is paid for through the commitment variable
        let c1 = system.variable(&var(GeneratorVariable::Commit, 1)).unwrap();
        assert_approx_eq!(f64, c1.cost, 1600.0);
        // Startup cost of 1 per MW of capacity
        let u2 = system.variable(&var(GeneratorVariable::Startup, 2)).unwrap();
        assert_approx_eq!(f64, u2.cost, 100.0);
    }

    #[rstest]
    fn test_missing_linked_data_aborts(commit_generator: Generator) {
        let model = model_with(
            commit_generator,
            temporal_index(&[1.0; 3], Boundary::Linked, &[1.0]),
            linked_data(&[-1], 1),
        );
        let err = build_system(&model).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not build constraints for generator gen1"
        );
        assert_eq!(
            err.root_cause().downcast_ref::<BuildError>(),
            Some(&BuildError::MissingBoundaryData {
                generator: "gen1".into(),
                linked_index: 0
            })
        );
    }
}
