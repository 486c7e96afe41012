//! Commitment state variables and the constraints tying them together.
use super::{BuildContext, gen_var};
use crate::generator::{Generator, OperationalType};
use crate::problem::{
    ConstraintFamily, ConstraintKey, ConstraintSystem, Domain, GeneratorVariable, LinearExpr,
    Relation, VariableKey,
};
use crate::temporal::TimepointID;
use anyhow::Result;

/// The values commitment variables may take
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum CommitmentDomain {
    /// Commitment, startup and shutdown are 0 or 1
    Binary,
    /// Commitment, startup and shutdown are relaxed to [0, 1]
    Continuous,
}

impl CommitmentDomain {
    /// The commitment domain of an operational type, if it has commitment variables
    pub fn of(operational_type: OperationalType) -> Option<Self> {
        match operational_type {
            OperationalType::CommitBinary => Some(Self::Binary),
            OperationalType::CommitContinuous => Some(Self::Continuous),
            OperationalType::AlwaysOn | OperationalType::Variable => None,
        }
    }

    /// Domain of the commitment state variables
    pub fn variable_domain(self) -> Domain {
        match self {
            Self::Binary => Domain::Binary,
            Self::Continuous => Domain::UNIT_INTERVAL,
        }
    }
}

/// Add commitment, trajectory and power variables for every timepoint
pub fn add_variables(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
    domain: CommitmentDomain,
) {
    let state = domain.variable_domain();
    let key = |variable, tp| VariableKey::generator(&generator.id, variable, tp);

    for tp in ctx.model.temporal.iter_ids() {
        for variable in [
            GeneratorVariable::Commit,
            GeneratorVariable::Startup,
            GeneratorVariable::Shutdown,
            GeneratorVariable::Synced,
        ] {
            system.add_variable(key(variable, tp), state);
        }
        for s in 0..generator.startup_types.len() {
            system.add_variable(key(GeneratorVariable::StartupType(s), tp), state);
        }

        system.add_variable(key(GeneratorVariable::PowerAbovePmin, tp), Domain::NON_NEGATIVE);
        for s in 0..generator.num_startup_profiles() {
            system.add_variable(
                key(GeneratorVariable::StartupPower(s), tp),
                Domain::NON_NEGATIVE,
            );
        }
        system.add_variable(key(GeneratorVariable::ShutdownPower, tp), Domain::NON_NEGATIVE);
    }
}

/// The variable indicating a startup following the given profile.
///
/// With explicit startup types this is the type indicator; otherwise it is the startup indicator.
pub fn profile_indicator(generator: &Generator, profile: usize, tp: TimepointID) -> VariableKey {
    let variable = if generator.has_startup_types() {
        GeneratorVariable::StartupType(profile)
    } else {
        GeneratorVariable::Startup
    };

    VariableKey::generator(&generator.id, variable, tp)
}

/// Add the commitment transition, startup type and synced constraints
pub fn add_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
    domain: CommitmentDomain,
) -> Result<()> {
    add_transition_constraints(ctx, system, generator)?;
    add_startup_type_sum_constraints(ctx, system, generator);
    add_synced_constraints(ctx, system, generator, domain);

    Ok(())
}

/// `Commit[t] - Commit[prev] - Startup[t] + Shutdown[t] = 0`
fn add_transition_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) -> Result<()> {
    for (prior, tp) in ctx.transitions(generator)? {
        let expr = gen_var(generator, GeneratorVariable::Commit, tp)
            - prior.commit(generator)
            - gen_var(generator, GeneratorVariable::Startup, tp)
            + gen_var(generator, GeneratorVariable::Shutdown, tp);
        let key = ConstraintKey::generator(ConstraintFamily::CommitTransition, &generator.id, tp);
        system.add_constraint(key, expr, Relation::Equal, 0.0);
    }

    Ok(())
}

fn add_startup_type_sum_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) {
    if !generator.has_startup_types() {
        return;
    }

    for tp in ctx.model.temporal.iter_ids() {
        let types: LinearExpr = (0..generator.startup_types.len())
            .map(|s| gen_var(generator, GeneratorVariable::StartupType(s), tp))
            .sum();
        let expr = types - gen_var(generator, GeneratorVariable::Startup, tp);
        let key = ConstraintKey::generator(ConstraintFamily::StartupTypeSum, &generator.id, tp);
        system.add_constraint(key, expr, Relation::Equal, 0.0);
    }
}

/// Synced covers commitment and any power on a startup or shutdown trajectory.
///
/// The binary domain scales trajectory power by the minimum stable level. The continuous domain
/// adds trajectory power to the commitment level unscaled, so `Synced >= Commit` holds in both
/// even when the minimum stable level is zero.
fn add_synced_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
    domain: CommitmentDomain,
) {
    for tp in ctx.model.temporal.iter_ids() {
        let synced = gen_var(generator, GeneratorVariable::Synced, tp);
        if generator.availability(tp).value() == 0.0 {
            let key = ConstraintKey::generator(ConstraintFamily::SyncedOffline, &generator.id, tp);
            system.add_constraint(key, synced, Relation::Equal, 0.0);
            continue;
        }

        let commit = gen_var(generator, GeneratorVariable::Commit, tp);
        let trajectory: LinearExpr = (0..generator.num_startup_profiles())
            .map(|s| gen_var(generator, GeneratorVariable::StartupPower(s), tp))
            .sum::<LinearExpr>()
            + gen_var(generator, GeneratorVariable::ShutdownPower, tp);
        let pmin = generator.pmin(tp).value();

        let expr = match domain {
            CommitmentDomain::Binary if pmin == 0.0 => synced - commit,
            CommitmentDomain::Binary => synced - commit - trajectory * (1.0 / pmin),
            CommitmentDomain::Continuous => synced - commit - trajectory,
        };
        let key = ConstraintKey::generator(ConstraintFamily::Synced, &generator.id, tp);
        system.add_constraint(key, expr, Relation::GreaterEqual, 0.0);
    }
}

/// Add startup and shutdown costs for a timepoint with the given weight
pub fn add_costs(
    system: &mut ConstraintSystem,
    generator: &Generator,
    tp: TimepointID,
    weight: f64,
) {
    for (s, profile) in generator.startup_profiles().iter().enumerate() {
        let cost = (profile.cost * generator.capacity).value() * weight;
        system.add_cost(&LinearExpr::var(profile_indicator(generator, s, tp)), cost);
    }

    let shutdown_cost = (generator.shutdown_cost * generator.capacity).value() * weight;
    system.add_cost(
        &gen_var(generator, GeneratorVariable::Shutdown, tp),
        shutdown_cost,
    );
}
