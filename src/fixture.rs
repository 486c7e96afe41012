//! Fixtures for tests

use crate::generator::{Generator, OperationalType, StartupType};
use crate::linked::{LinkedBoundaryData, LinkedBoundaryValue, LinkedStartupValue};
use crate::model::Model;
use crate::model::parameters::BuildParameters;
use crate::requirements::{LoadRow, Requirements};
use crate::temporal::{
    BalancingType, Boundary, Horizon, LinkedTimepoint, TemporalIndex, Timepoint, TimepointID,
};
use crate::units::{
    Dimensionless, FuelPerPower, Hours, MoneyPerEnergy, MoneyPerPower, Power, RampRate,
};
use indexmap::indexmap;
use rstest::fixture;
use std::collections::HashMap;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A temporal index with a single "day" horizon over timepoints 1..=n.
///
/// `linked` gives the durations of linked timepoints 0, -1, -2, ...
pub fn temporal_index(durations: &[f64], boundary: Boundary, linked: &[f64]) -> TemporalIndex {
    let timepoints = (1..)
        .zip(durations)
        .map(|(id, duration)| Timepoint {
            id: TimepointID(id),
            duration: Hours(*duration),
            weight: Dimensionless(1.0),
            period: 2030,
            month: 1,
        })
        .collect::<Vec<_>>();
    let horizon = Horizon {
        id: "h1".into(),
        balancing_type: "day".into(),
        boundary,
        timepoints: timepoints.iter().map(|tp| tp.id).collect(),
    };
    let linked = (0..)
        .zip(linked)
        .map(|(idx, duration): (i32, _)| LinkedTimepoint {
            index: -idx,
            duration: Hours(*duration),
        })
        .collect();

    TemporalIndex::new(timepoints, vec![horizon], linked).unwrap()
}

#[fixture]
pub fn balancing_type() -> BalancingType {
    "day".into()
}

/// A binary commitment generator with 100 MW capacity and a 40% minimum stable level
#[fixture]
pub fn commit_generator(balancing_type: BalancingType) -> Generator {
    Generator {
        id: "gen1".into(),
        operational_type: OperationalType::CommitBinary,
        balancing_type,
        load_zone: "zone1".into(),
        capacity: Power(100.0),
        min_stable_level: Dimensionless(0.4),
        ramp_up_when_on: RampRate(1.0),
        ramp_down_when_on: RampRate(1.0),
        startup_plus_ramp_up: RampRate(0.005),
        shutdown_plus_ramp_down: RampRate(0.005),
        min_up_time: Hours(0.0),
        min_down_time: Hours(0.0),
        startup_types: Vec::new(),
        aux_consumption_frac_capacity: Dimensionless(0.0),
        aux_consumption_frac_power: Dimensionless(0.0),
        variable_cost: MoneyPerEnergy(20.0),
        startup_cost: MoneyPerPower(1.0),
        startup_fuel: FuelPerPower(0.0),
        shutdown_cost: MoneyPerPower(0.0),
        availability: HashMap::new(),
        capacity_factor: HashMap::new(),
        reserves: Vec::new(),
    }
}

/// A generator with hot (2h) and cold (6h) startup types
#[fixture]
pub fn two_startup_type_generator(mut commit_generator: Generator) -> Generator {
    commit_generator.min_down_time = Hours(2.0);
    commit_generator.startup_types = vec![
        StartupType {
            down_time_cutoff: Hours(2.0),
            ramp_rate: RampRate(0.01),
            cost: MoneyPerPower(1.0),
            fuel: FuelPerPower(0.5),
        },
        StartupType {
            down_time_cutoff: Hours(6.0),
            ramp_rate: RampRate(0.005),
            cost: MoneyPerPower(3.0),
            fuel: FuelPerPower(1.5),
        },
    ];
    commit_generator
}

/// Linked boundary values for `gen1` with the unit committed at the end of the previous subproblem
pub fn linked_data(indices: &[i32], profiles: usize) -> LinkedBoundaryData {
    let rows = indices.iter().map(|index| LinkedBoundaryValue {
        generator: "gen1".into(),
        linked_timepoint: *index,
        commit: 1.0,
        startup: 0.0,
        shutdown: 0.0,
        power_above_pmin: Power(10.0),
        pmin: Power(40.0),
        upward_reserves: Power(0.0),
        downward_reserves: Power(0.0),
        ramp_up_limit: Power(6000.0),
        ramp_down_limit: Power(6000.0),
        shutdown_power: Power(0.0),
        shutdown_ramp_limit: Power(30.0),
    });
    let startup_rows = indices.iter().flat_map(|index| {
        (0..profiles).map(move |profile| LinkedStartupValue {
            generator: "gen1".into(),
            linked_timepoint: *index,
            startup_type: profile + 1,
            startup_power: Power(0.0),
            startup_ramp_limit: Power(30.0),
        })
    });

    LinkedBoundaryData::from_rows(rows, startup_rows).unwrap()
}

/// Assemble a single-zone model with flat load around one generator
pub fn model_with(generator: Generator, index: TemporalIndex, linked: LinkedBoundaryData) -> Model {
    let load = index
        .iter_ids()
        .map(|timepoint| LoadRow {
            load_zone: "zone1".into(),
            timepoint,
            load_mw: Power(50.0),
        })
        .collect::<Vec<_>>();
    let requirements = Requirements::from_rows(load, [], []).unwrap();

    Model::new(
        index,
        indexmap! { generator.id.clone() => generator },
        requirements,
        linked,
        BuildParameters::default(),
    )
    .unwrap()
}
