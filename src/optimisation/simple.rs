//! Generators without commitment decisions.
use super::{BuildContext, BuildSummary, gen_var, trajectory};
use crate::generator::Generator;
use crate::problem::{
    ConstraintFamily, ConstraintKey, ConstraintSystem, Domain, GeneratorVariable, LinearExpr,
    Relation, VariableKey,
};
use crate::requirements::ReserveDirection;
use anyhow::Result;

fn add_power_variables(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
    variable: GeneratorVariable,
) {
    for tp in ctx.model.temporal.iter_ids() {
        system.add_variable(
            VariableKey::generator(&generator.id, variable, tp),
            Domain::NON_NEGATIVE,
        );
    }
}

/// An always-on generator only decides its power above the minimum stable level
pub fn add_always_on_variables(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) {
    add_power_variables(ctx, system, generator, GeneratorVariable::PowerAbovePmin);
}

/// Power bounds and steady-state ramps, with the unit committed in every timepoint
pub fn add_always_on_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    summary: &mut BuildSummary,
    generator: &Generator,
) -> Result<()> {
    trajectory::add_power_bounds(ctx, system, generator, |_| LinearExpr::constant(1.0));
    trajectory::add_ramp_constraints(ctx, system, summary, generator)
}

/// A variable generator decides its output directly
pub fn add_variable_variables(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) {
    add_power_variables(ctx, system, generator, GeneratorVariable::Power);
}

/// Output plus upward reserves is limited by the capacity factor; downward reserves by output
pub fn add_variable_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) {
    for tp in ctx.model.temporal.iter_ids() {
        let power = gen_var(generator, GeneratorVariable::Power, tp);
        let available = (generator.pmax(tp) * generator.capacity_factor(tp)).value();

        system.add_constraint(
            ConstraintKey::generator(ConstraintFamily::VariablePowerLimit, &generator.id, tp),
            power.clone() + ctx.reserves(generator, ReserveDirection::Up, tp),
            Relation::LessEqual,
            available,
        );
        system.add_constraint(
            ConstraintKey::generator(ConstraintFamily::MinPower, &generator.id, tp),
            power - ctx.reserves(generator, ReserveDirection::Down, tp),
            Relation::GreaterEqual,
            0.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{commit_generator, linked_data, model_with, temporal_index};
    use crate::generator::OperationalType;
    use crate::linked::LinkedBoundaryData;
    use crate::optimisation::build_system;
    use crate::temporal::{Boundary, TimepointID};
    use crate::units::{Dimensionless, MoneyPerEnergy, RampRate};
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    fn var(variable: GeneratorVariable, tp: u32) -> VariableKey {
        VariableKey::generator(&"gen1".into(), variable, TimepointID(tp))
    }

    fn key(family: ConstraintFamily, tp: u32) -> ConstraintKey {
        ConstraintKey::generator(family, &"gen1".into(), TimepointID(tp))
    }

    #[fixture]
    fn always_on_generator(mut commit_generator: Generator) -> Generator {
        commit_generator.operational_type = OperationalType::AlwaysOn;
        commit_generator.ramp_up_when_on = RampRate(0.005);
        commit_generator
    }

    #[fixture]
    fn variable_generator(mut commit_generator: Generator) -> Generator {
        commit_generator.operational_type = OperationalType::Variable;
        commit_generator.variable_cost = MoneyPerEnergy(0.0);
        commit_generator
            .capacity_factor
            .insert(TimepointID(2), Dimensionless(0.25));
        commit_generator
    }

    #[rstest]
    fn test_always_on(always_on_generator: Generator) {
        let model = model_with(
            always_on_generator,
            temporal_index(&[1.0; 3], Boundary::Circular, &[]),
            LinkedBoundaryData::default(),
        );
        let (system, summary) = build_system(&model).unwrap();
        assert!(system.variable(&var(GeneratorVariable::Commit, 1)).is_none());
        assert!(!system.has_family(ConstraintFamily::CommitTransition));
        assert!(!system.has_family(ConstraintFamily::Synced));

        // The commitment constant moves to the right-hand side
        let max_power = system.constraint(&key(ConstraintFamily::MaxPower, 1)).unwrap();
        assert_approx_eq!(f64, max_power.rhs(), 60.0);
        assert_eq!(max_power.terms().len(), 1);

        assert_eq!(system.count_by_family()[&ConstraintFamily::RampUp], 3);
        assert_eq!(summary.omitted_ramps, 3);
    }

    #[rstest]
    fn test_always_on_linked_ramp(always_on_generator: Generator) {
        let model = model_with(
            always_on_generator,
            temporal_index(&[1.0; 2], Boundary::Linked, &[1.0]),
            linked_data(&[0], 0),
        );
        let (system, _) = build_system(&model).unwrap();

        // Linked ramp limits come from the previous subproblem and span the operating range
        assert!(system.constraint(&key(ConstraintFamily::RampUp, 1)).is_none());
        assert!(system.constraint(&key(ConstraintFamily::RampUp, 2)).is_some());
    }

    #[rstest]
    fn test_variable(variable_generator: Generator) {
        let model = model_with(
            variable_generator,
            temporal_index(&[1.0; 3], Boundary::Circular, &[]),
            LinkedBoundaryData::default(),
        );
        let (system, _) = build_system(&model).unwrap();
        assert!(system.variable(&var(GeneratorVariable::Commit, 1)).is_none());
        assert!(!system.has_family(ConstraintFamily::RampUp));

        let limit = |tp| {
            system
                .constraint(&key(ConstraintFamily::VariablePowerLimit, tp))
                .unwrap()
                .rhs()
        };
        assert_approx_eq!(f64, limit(1), 100.0);
        assert_approx_eq!(f64, limit(2), 25.0);
        assert!(system.constraint(&key(ConstraintFamily::MinPower, 3)).is_some());
    }
}
