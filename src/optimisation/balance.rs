//! Zonal load balance and reserve requirements.
use super::{BuildContext, net_power};
use crate::problem::{
    ConstraintFamily, ConstraintKey, ConstraintSystem, Domain, LinearExpr, Relation, Subject,
    VariableKey,
};
use crate::units::MoneyPerEnergy;

/// Add slack variables for unserved load, overgeneration and reserve shortfall, with penalties
pub fn add_variables(ctx: &BuildContext, system: &mut ConstraintSystem) {
    let parameters = &ctx.model.parameters;
    let mut add_slack = |key: VariableKey, penalty: MoneyPerEnergy, weighting: f64| {
        let cost = penalty.value() * weighting;
        system.add_variable(key.clone(), Domain::NON_NEGATIVE);
        system.add_cost(&LinearExpr::var(key), cost);
    };

    for timepoint in ctx.model.temporal.iter() {
        let tp = timepoint.id;
        let weighting = timepoint.duration.value() * timepoint.weight.value();
        for zone in ctx.model.requirements.iter_zones() {
            add_slack(
                VariableKey::Unserved {
                    zone: zone.clone(),
                    timepoint: tp,
                },
                parameters.unserved_energy_penalty,
                weighting,
            );
            add_slack(
                VariableKey::Overgeneration {
                    zone: zone.clone(),
                    timepoint: tp,
                },
                parameters.overgeneration_penalty,
                weighting,
            );
        }
        for reserve in ctx.model.requirements.iter_reserves() {
            add_slack(
                VariableKey::ReserveShortfall {
                    reserve: reserve.id.clone(),
                    timepoint: tp,
                },
                parameters.reserve_shortfall_penalty,
                weighting,
            );
        }
    }
}

/// Add a load balance per zone and a requirement constraint per reserve product, per timepoint
pub fn add_constraints(ctx: &BuildContext, system: &mut ConstraintSystem) {
    let requirements = &ctx.model.requirements;

    for tp in ctx.model.temporal.iter_ids() {
        for zone in requirements.iter_zones() {
            let supply: LinearExpr = ctx
                .model
                .iter_generators()
                .filter(|generator| &generator.load_zone == zone)
                .map(|generator| net_power(generator, tp))
                .sum();
            let expr = supply
                + LinearExpr::var(VariableKey::Unserved {
                    zone: zone.clone(),
                    timepoint: tp,
                })
                - LinearExpr::var(VariableKey::Overgeneration {
                    zone: zone.clone(),
                    timepoint: tp,
                });
            let key = ConstraintKey {
                family: ConstraintFamily::LoadBalance,
                subject: Subject::Zone(zone.clone()),
                timepoint: tp,
                startup_type: None,
            };
            system.add_constraint(key, expr, Relation::Equal, requirements.load(zone, tp).value());
        }

        for product in requirements.iter_reserves() {
            let provision: LinearExpr = ctx
                .model
                .iter_generators()
                .filter(|generator| generator.reserves.contains(&product.id))
                .map(|generator| {
                    LinearExpr::var(VariableKey::Provision {
                        generator: generator.id.clone(),
                        reserve: product.id.clone(),
                        timepoint: tp,
                    })
                })
                .sum();
            let expr = provision
                + LinearExpr::var(VariableKey::ReserveShortfall {
                    reserve: product.id.clone(),
                    timepoint: tp,
                });
            let key = ConstraintKey {
                family: ConstraintFamily::ReserveRequirement,
                subject: Subject::Reserve(product.id.clone()),
                timepoint: tp,
                startup_type: None,
            };
            system.add_constraint(
                key,
                expr,
                Relation::GreaterEqual,
                product.requirement(tp).value(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{commit_generator, temporal_index};
    use crate::generator::Generator;
    use crate::linked::LinkedBoundaryData;
    use crate::model::{BuildParameters, Model};
    use crate::optimisation::build_system;
    use crate::problem::GeneratorVariable;
    use crate::requirements::{
        LoadRow, ReserveDirection, ReserveRequirementRow, ReserveRow, Requirements,
    };
    use crate::temporal::{Boundary, TimepointID};
    use crate::units::Power;
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    fn model_with_reserve(mut generator: Generator) -> Model {
        generator.reserves = vec!["spin".into()];
        let index = temporal_index(&[2.0, 1.0], Boundary::Circular, &[]);
        let load = index
            .iter_ids()
            .map(|timepoint| LoadRow {
                load_zone: "zone1".into(),
                timepoint,
                load_mw: Power(50.0),
            })
            .collect::<Vec<_>>();
        let requirements = Requirements::from_rows(
            load,
            [ReserveRow {
                reserve: "spin".into(),
                direction: ReserveDirection::Up,
            }],
            [ReserveRequirementRow {
                reserve: "spin".into(),
                timepoint: TimepointID(1),
                requirement_mw: Power(10.0),
            }],
        )
        .unwrap();

        Model::new(
            index,
            indexmap! { generator.id.clone() => generator },
            requirements,
            LinkedBoundaryData::default(),
            BuildParameters::default(),
        )
        .unwrap()
    }

    fn zone_key(tp: u32) -> ConstraintKey {
        ConstraintKey {
            family: ConstraintFamily::LoadBalance,
            subject: Subject::Zone("zone1".into()),
            timepoint: TimepointID(tp),
            startup_type: None,
        }
    }

    #[rstest]
    fn test_load_balance(commit_generator: Generator) {
        let (system, _) = build_system(&model_with_reserve(commit_generator)).unwrap();
        let balance = zone_key(1);
        assert_approx_eq!(f64, system.constraint(&balance).unwrap().rhs(), 50.0);
        assert_eq!(
            system.coefficient(
                &balance,
                &VariableKey::generator(&"gen1".into(), GeneratorVariable::Commit, TimepointID(1))
            ),
            Some(40.0)
        );
        assert_eq!(
            system.coefficient(
                &balance,
                &VariableKey::Overgeneration {
                    zone: "zone1".into(),
                    timepoint: TimepointID(1)
                }
            ),
            Some(-1.0)
        );
    }

    #[rstest]
    fn test_reserve_requirement(commit_generator: Generator) {
        let (system, _) = build_system(&model_with_reserve(commit_generator)).unwrap();
        let key = ConstraintKey {
            family: ConstraintFamily::ReserveRequirement,
            subject: Subject::Reserve("spin".into()),
            timepoint: TimepointID(1),
            startup_type: None,
        };
        let constraint = system.constraint(&key).unwrap();
        assert_approx_eq!(f64, constraint.rhs(), 10.0);
        assert_eq!(constraint.terms().len(), 2);

        // Upward provision also takes up headroom
        let provision = VariableKey::Provision {
            generator: "gen1".into(),
            reserve: "spin".into(),
            timepoint: TimepointID(1),
        };
        assert_eq!(
            system.coefficient(
                &ConstraintKey::generator(
                    ConstraintFamily::MaxPower,
                    &"gen1".into(),
                    TimepointID(1)
                ),
                &provision
            ),
            Some(1.0)
        );
    }

    #[rstest]
    fn test_penalties_weighted_by_duration(commit_generator: Generator) {
        let (system, _) = build_system(&model_with_reserve(commit_generator)).unwrap();
        let unserved = system
            .variable(&VariableKey::Unserved {
                zone: "zone1".into(),
                timepoint: TimepointID(1),
            })
            .unwrap();
        assert_approx_eq!(f64, unserved.cost, 2.0 * 99_999.0);
    }
}
