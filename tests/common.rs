//! Helpers for assembling small models in integration tests
#![allow(dead_code)]
use unitcommit::generator::{
    GeneratorRow, GeneratorTables, OperationalType, StartupTypeRow, generators_from_rows,
};
use unitcommit::linked::LinkedBoundaryData;
use unitcommit::model::{BuildParameters, Model};
use unitcommit::requirements::{LoadRow, Requirements};
use unitcommit::temporal::{
    Boundary, Horizon, LinkedTimepoint, TemporalIndex, Timepoint, TimepointID,
};
use unitcommit::units::{
    Dimensionless, FuelPerPower, Hours, MoneyPerEnergy, MoneyPerPower, Power, RampRate,
};

/// A single "day" horizon over timepoints 1..=n, with linked timepoints 0, -1, ...
pub fn temporal_index(durations: &[f64], boundary: Boundary, linked: &[f64]) -> TemporalIndex {
    let timepoints = (1..)
        .zip(durations)
        .map(|(id, duration)| Timepoint {
            id: TimepointID(id),
            duration: Hours(*duration),
            weight: Dimensionless(1.0),
            period: 2030,
            month: 6,
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

/// A 100 MW generator with a 40% minimum stable level and unconstrained ramping
pub fn generator_row(id: &str, operational_type: OperationalType) -> GeneratorRow {
    GeneratorRow {
        generator: id.into(),
        operational_type,
        balancing_type: "day".into(),
        load_zone: "zone1".into(),
        capacity_mw: Power(100.0),
        min_stable_level_fraction: Dimensionless(0.4),
        ramp_up_when_on_rate: RampRate(1.0),
        ramp_down_when_on_rate: RampRate(1.0),
        startup_plus_ramp_up_rate: RampRate(0.005),
        shutdown_plus_ramp_down_rate: RampRate(0.005),
        min_up_time_hrs: Hours(0.0),
        min_down_time_hrs: Hours(0.0),
        aux_consumption_frac_capacity: Dimensionless(0.0),
        aux_consumption_frac_power: Dimensionless(0.0),
        variable_cost_per_mwh: MoneyPerEnergy(20.0),
        startup_cost_per_mw: MoneyPerPower(1.0),
        startup_fuel_mmbtu_per_mw: FuelPerPower(0.0),
        shutdown_cost_per_mw: MoneyPerPower(0.0),
    }
}

/// Hot (cutoff at the minimum down time) and cold (6 hour cutoff) startup types
pub fn hot_and_cold(id: &str, min_down_time: f64) -> Vec<StartupTypeRow> {
    [(1, min_down_time, 1.0), (2, 6.0, 3.0)]
        .into_iter()
        .map(|(startup_type_id, cutoff, cost)| StartupTypeRow {
            generator: id.into(),
            startup_type_id,
            down_time_cutoff_hrs: Hours(cutoff),
            startup_plus_ramp_up_rate: RampRate(0.01),
            startup_cost_per_mw: MoneyPerPower(cost),
            startup_fuel_mmbtu_per_mw: FuelPerPower(1.0),
        })
        .collect()
}

/// Assemble a single-zone model with a flat 50 MW load
pub fn model(
    index: TemporalIndex,
    rows: Vec<GeneratorRow>,
    tables: GeneratorTables,
    linked: LinkedBoundaryData,
) -> anyhow::Result<Model> {
    let load = index
        .iter_ids()
        .map(|timepoint| LoadRow {
            load_zone: "zone1".into(),
            timepoint,
            load_mw: Power(50.0),
        })
        .collect::<Vec<_>>();
    let requirements = Requirements::from_rows(load, [], [])?;
    let generators = generators_from_rows(rows, tables)?;

    Model::new(
        index,
        generators,
        requirements,
        linked,
        BuildParameters::default(),
    )
}
