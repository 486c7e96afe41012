//! Power limits, ramp limits and the startup and shutdown trajectories.
//!
//! Startup trajectory power rises towards the minimum stable level in the timepoints before a
//! startup; shutdown trajectory power falls away from it in the timepoints after a shutdown. Each
//! transition constraint is named after the later timepoint of its pair.
use super::commitment::profile_indicator;
use super::{BuildContext, BuildSummary, Prior, gen_var};
use crate::generator::Generator;
use crate::problem::{
    ConstraintFamily, ConstraintKey, ConstraintSystem, GeneratorVariable, LinearExpr, Relation,
    VariableKey,
};
use crate::requirements::ReserveDirection;
use crate::temporal::TimepointID;
use anyhow::Result;
use log::debug;

/// Add every power, ramp and trajectory constraint for a committable generator
pub fn add_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    summary: &mut BuildSummary,
    generator: &Generator,
) -> Result<()> {
    add_power_bounds(ctx, system, generator, |tp| {
        gen_var(generator, GeneratorVariable::Commit, tp)
    });
    add_trajectory_max_constraints(ctx, system, generator);
    add_ramp_constraints(ctx, system, summary, generator)?;
    add_startup_trajectory_constraints(ctx, system, generator)?;
    add_shutdown_trajectory_constraints(ctx, system, generator)?;

    Ok(())
}

/// Keep power above the minimum stable level, with reserves, within the available capacity.
///
/// `commit` gives the commitment status in a timepoint, which may be a constant.
pub fn add_power_bounds(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
    commit: impl Fn(TimepointID) -> LinearExpr,
) {
    for tp in ctx.model.temporal.iter_ids() {
        let p = gen_var(generator, GeneratorVariable::PowerAbovePmin, tp);
        let headroom = (generator.pmax(tp) - generator.pmin(tp)).value();

        let max_power = p.clone() + ctx.reserves(generator, ReserveDirection::Up, tp)
            - commit(tp) * headroom;
        system.add_constraint(
            ConstraintKey::generator(ConstraintFamily::MaxPower, &generator.id, tp),
            max_power,
            Relation::LessEqual,
            0.0,
        );

        let min_power = p - ctx.reserves(generator, ReserveDirection::Down, tp);
        system.add_constraint(
            ConstraintKey::generator(ConstraintFamily::MinPower, &generator.id, tp),
            min_power,
            Relation::GreaterEqual,
            0.0,
        );
    }
}

/// Trajectory power is zero while committed and never exceeds the minimum stable level
fn add_trajectory_max_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) {
    for tp in ctx.model.temporal.iter_ids() {
        let pmin = generator.pmin(tp).value();
        let startup: LinearExpr = (0..generator.num_startup_profiles())
            .map(|s| gen_var(generator, GeneratorVariable::StartupPower(s), tp))
            .sum();
        let expr = startup
            + gen_var(generator, GeneratorVariable::ShutdownPower, tp)
            + LinearExpr::term(
                VariableKey::generator(&generator.id, GeneratorVariable::Commit, tp),
                pmin,
            );
        system.add_constraint(
            ConstraintKey::generator(ConstraintFamily::TrajectoryMax, &generator.id, tp),
            expr,
            Relation::LessEqual,
            pmin,
        );
    }
}

/// Limit changes in power above the minimum stable level between consecutive timepoints.
///
/// Limits come from the duration of the earlier timepoint. Where a limit spans the whole operating
/// range it can never bind, and the constraint is left out if so configured.
pub fn add_ramp_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    summary: &mut BuildSummary,
    generator: &Generator,
) -> Result<()> {
    let operating_range = generator.operating_range().value();
    let omit_nonbinding = ctx.model.parameters.omit_nonbinding_ramps;
    let is_nonbinding = |limit: f64| omit_nonbinding && limit >= operating_range;
    let mut omitted = 0;

    for (prior, tp) in ctx.transitions(generator)? {
        let p = gen_var(generator, GeneratorVariable::PowerAbovePmin, tp);
        let up = ctx.reserves(generator, ReserveDirection::Up, tp);
        let down = ctx.reserves(generator, ReserveDirection::Down, tp);

        let up_limit = prior.ramp_up_limit(ctx, generator);
        if is_nonbinding(up_limit) {
            omitted += 1;
        } else {
            let expr = p.clone() + up
                - (prior.power_above_pmin(generator)
                    - prior.reserves(ctx, generator, ReserveDirection::Down));
            system.add_constraint(
                ConstraintKey::generator(ConstraintFamily::RampUp, &generator.id, tp),
                expr,
                Relation::LessEqual,
                up_limit,
            );
        }

        let down_limit = prior.ramp_down_limit(ctx, generator);
        if is_nonbinding(down_limit) {
            omitted += 1;
        } else {
            let expr = prior.power_above_pmin(generator)
                + prior.reserves(ctx, generator, ReserveDirection::Up)
                - (p - down);
            system.add_constraint(
                ConstraintKey::generator(ConstraintFamily::RampDown, &generator.id, tp),
                expr,
                Relation::LessEqual,
                down_limit,
            );
        }
    }

    if omitted > 0 {
        debug!(
            "Omitted {omitted} ramp constraints for generator {} which cannot bind",
            generator.id
        );
    }
    summary.omitted_ramps += omitted;

    Ok(())
}

/// Constraints linking each startup profile's trajectory to the startup itself
fn add_startup_trajectory_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) -> Result<()> {
    let big_m = generator.capacity.value();

    for (prior, tp) in ctx.transitions(generator)? {
        for s in 0..generator.num_startup_profiles() {
            let q = gen_var(generator, GeneratorVariable::StartupPower(s), tp);
            let q_prev = prior.startup_power(ctx, generator, s)?;
            let limit = prior.startup_ramp_limit(ctx, generator, s)?;
            let indicator = LinearExpr::term(profile_indicator(generator, s, tp), big_m);
            let key = |family| ConstraintKey::startup_type(family, &generator.id, tp, s);

            // Trajectory power only falls in the startup timepoint
            system.add_constraint(
                key(ConstraintFamily::StartupPowerIncreasing),
                q.clone() - q_prev.clone() + indicator.clone(),
                Relation::GreaterEqual,
                0.0,
            );
            system.add_constraint(
                key(ConstraintFamily::StartupPowerRamp),
                q - q_prev.clone(),
                Relation::LessEqual,
                limit,
            );

            let committed = committed_power(generator, tp) - q_prev + indicator;
            system.add_constraint(
                key(ConstraintFamily::StartupConnect),
                committed,
                Relation::LessEqual,
                limit + big_m,
            );
        }
    }

    Ok(())
}

/// Constraints linking the shutdown trajectory to the last committed timepoint
fn add_shutdown_trajectory_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) -> Result<()> {
    let big_m = generator.capacity.value();

    for (prior, tp) in ctx.transitions(generator)? {
        let r = gen_var(generator, GeneratorVariable::ShutdownPower, tp);
        let r_prev = prior.shutdown_power(generator);
        let limit = prior.shutdown_ramp_limit(ctx, generator);
        let indicator = LinearExpr::term(
            VariableKey::generator(&generator.id, GeneratorVariable::Shutdown, tp),
            big_m,
        );
        let key = |family| ConstraintKey::generator(family, &generator.id, tp);

        // Trajectory power only rises in the shutdown timepoint
        system.add_constraint(
            key(ConstraintFamily::ShutdownPowerDecreasing),
            r.clone() - r_prev.clone() - indicator.clone(),
            Relation::LessEqual,
            0.0,
        );
        system.add_constraint(
            key(ConstraintFamily::ShutdownPowerRamp),
            r_prev - r.clone(),
            Relation::LessEqual,
            limit,
        );

        let last_committed = prior.committed_pmin(generator) + prior.power_above_pmin(generator);
        system.add_constraint(
            key(ConstraintFamily::ShutdownConnect),
            last_committed - r + indicator,
            Relation::LessEqual,
            limit + big_m,
        );
    }

    Ok(())
}

/// Power while committed: minimum stable level plus power above it
fn committed_power(generator: &Generator, tp: TimepointID) -> LinearExpr {
    let prior = Prior::Timepoint(tp);
    prior.committed_pmin(generator) + prior.power_above_pmin(generator)
}
