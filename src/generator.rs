//! Generating units and their operating characteristics.
use crate::error::BuildError;
use crate::id::define_id_type;
use crate::requirements::{ReserveID, ZoneID};
use crate::temporal::{BalancingType, TimepointID};
use crate::units::{
    Dimensionless, FuelPerPower, Hours, MoneyPerEnergy, MoneyPerPower, Power, RampRate,
};
use anyhow::{Context, Result};
use float_cmp::approx_eq;
use indexmap::IndexMap;
use itertools::Itertools;
use log::warn;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashMap;

define_id_type! {GeneratorID}

/// A map of generators, keyed by ID
pub type GeneratorMap = IndexMap<GeneratorID, Generator>;

/// How a generator is operated, which determines the constraints it contributes
#[derive(PartialEq, Eq, Debug, Clone, Copy, DeserializeLabeledStringEnum)]
pub enum OperationalType {
    /// Unit commitment with binary commitment variables
    #[string = "gen_commit_bin"]
    CommitBinary,
    /// Unit commitment with commitment variables relaxed to [0, 1]
    #[string = "gen_commit_cont"]
    CommitContinuous,
    /// Always committed, dispatchable between minimum stable level and capacity
    #[string = "gen_always_on"]
    AlwaysOn,
    /// Variable renewable output limited by a capacity factor profile
    #[string = "gen_var"]
    Variable,
}

impl OperationalType {
    /// Whether the type has commitment state variables
    pub fn is_committable(self) -> bool {
        matches!(self, Self::CommitBinary | Self::CommitContinuous)
    }
}

/// A class of startup selected by how long the unit has been offline.
///
/// Startup types are ordered hottest to coldest.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct StartupType {
    /// Lower bound of the down time for which this type applies
    pub down_time_cutoff: Hours,
    /// Ramp rate while following the startup trajectory
    pub ramp_rate: RampRate,
    /// Cost per MW of capacity for each startup of this type
    pub cost: MoneyPerPower,
    /// Fuel burned per MW of capacity for each startup of this type
    pub fuel: FuelPerPower,
}

/// A generating unit
#[derive(PartialEq, Debug, Clone)]
pub struct Generator {
    /// Unique identifier
    pub id: GeneratorID,
    /// Determines which constraints the generator contributes
    pub operational_type: OperationalType,
    /// Selects the horizons used for the generator's intertemporal constraints
    pub balancing_type: BalancingType,
    /// Load zone the generator delivers power to
    pub load_zone: ZoneID,
    /// Installed capacity
    pub capacity: Power,
    /// Minimum stable level as a fraction of available capacity
    pub min_stable_level: Dimensionless,
    /// Ramp-up rate while committed
    pub ramp_up_when_on: RampRate,
    /// Ramp-down rate while committed
    pub ramp_down_when_on: RampRate,
    /// Startup ramp rate, used when no startup types are specified
    pub startup_plus_ramp_up: RampRate,
    /// Shutdown ramp rate
    pub shutdown_plus_ramp_down: RampRate,
    /// Minimum time the unit must stay committed after starting
    pub min_up_time: Hours,
    /// Minimum time the unit must stay offline after shutting down
    pub min_down_time: Hours,
    /// Startup types, hottest first
    pub startup_types: Vec<StartupType>,
    /// Auxiliary consumption while synced, as a fraction of capacity
    pub aux_consumption_frac_capacity: Dimensionless,
    /// Auxiliary consumption as a fraction of gross power
    pub aux_consumption_frac_power: Dimensionless,
    /// Variable cost of gross power
    pub variable_cost: MoneyPerEnergy,
    /// Startup cost per MW of capacity, used when no startup types are specified
    pub startup_cost: MoneyPerPower,
    /// Startup fuel burn per MW of capacity, used when no startup types are specified
    pub startup_fuel: FuelPerPower,
    /// Shutdown cost per MW of capacity
    pub shutdown_cost: MoneyPerPower,
    /// Exogenous availability derate per timepoint (defaults to 1)
    pub availability: HashMap<TimepointID, Dimensionless>,
    /// Capacity factor per timepoint for variable generators (defaults to 1)
    pub capacity_factor: HashMap<TimepointID, Dimensionless>,
    /// Reserve products the generator can provide
    pub reserves: Vec<ReserveID>,
}

impl Generator {
    /// Availability derate in the given timepoint
    pub fn availability(&self, tp: TimepointID) -> Dimensionless {
        self.availability
            .get(&tp)
            .copied()
            .unwrap_or(Dimensionless(1.0))
    }

    /// Capacity factor in the given timepoint
    pub fn capacity_factor(&self, tp: TimepointID) -> Dimensionless {
        self.capacity_factor
            .get(&tp)
            .copied()
            .unwrap_or(Dimensionless(1.0))
    }

    /// Available capacity in the given timepoint
    pub fn pmax(&self, tp: TimepointID) -> Power {
        self.capacity * self.availability(tp)
    }

    /// Minimum stable level in the given timepoint
    pub fn pmin(&self, tp: TimepointID) -> Power {
        self.pmax(tp) * self.min_stable_level
    }

    /// The span between minimum stable level and installed capacity
    pub fn operating_range(&self) -> Power {
        self.capacity * (Dimensionless(1.0) - self.min_stable_level)
    }

    /// Steady-state ramp-up limit over a timepoint of the given duration
    pub fn ramp_up_limit(&self, duration: Hours) -> Power {
        self.ramp_up_when_on.limit_over(duration, self.capacity)
    }

    /// Steady-state ramp-down limit over a timepoint of the given duration
    pub fn ramp_down_limit(&self, duration: Hours) -> Power {
        self.ramp_down_when_on.limit_over(duration, self.capacity)
    }

    /// Shutdown trajectory ramp limit over a timepoint of the given duration
    pub fn shutdown_ramp_limit(&self, duration: Hours) -> Power {
        self.shutdown_plus_ramp_down
            .limit_over(duration, self.capacity)
    }

    /// Whether explicit startup types were specified
    pub fn has_startup_types(&self) -> bool {
        !self.startup_types.is_empty()
    }

    /// Number of startup profiles (at least one)
    pub fn num_startup_profiles(&self) -> usize {
        self.startup_types.len().max(1)
    }

    /// The startup profiles, one per startup type.
    ///
    /// A generator without startup types has a single implicit profile built from its generic
    /// startup parameters.
    pub fn startup_profiles(&self) -> Vec<StartupType> {
        if self.has_startup_types() {
            return self.startup_types.clone();
        }

        vec![StartupType {
            down_time_cutoff: self.min_down_time,
            ramp_rate: self.startup_plus_ramp_up,
            cost: self.startup_cost,
            fuel: self.startup_fuel,
        }]
    }

    /// Check the generator's characteristics are consistent
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| -> Result<()> {
            Err(BuildError::configuration(&self.id, message).into())
        };

        if !(self.capacity.is_finite() && self.capacity >= Power(0.0)) {
            return fail("capacity must be a non-negative number".into());
        }

        for (name, value) in [
            ("min_stable_level_fraction", self.min_stable_level),
            (
                "aux_consumption_frac_capacity",
                self.aux_consumption_frac_capacity,
            ),
            ("aux_consumption_frac_power", self.aux_consumption_frac_power),
        ] {
            if !is_proportion(value) {
                return fail(format!("{name} must be between 0 and 1"));
            }
        }

        for (name, rate) in [
            ("ramp_up_when_on_rate", self.ramp_up_when_on),
            ("ramp_down_when_on_rate", self.ramp_down_when_on),
            ("startup_plus_ramp_up_rate", self.startup_plus_ramp_up),
            ("shutdown_plus_ramp_down_rate", self.shutdown_plus_ramp_down),
        ] {
            if !(rate.is_finite() && rate >= RampRate(0.0)) {
                return fail(format!("{name} must be a non-negative number"));
            }
        }

        for (name, hours) in [
            ("min_up_time_hrs", self.min_up_time),
            ("min_down_time_hrs", self.min_down_time),
        ] {
            if !(hours.is_finite() && hours >= Hours(0.0)) {
                return fail(format!("{name} must be a non-negative number"));
            }
        }

        for (tp, value) in self.availability.iter().chain(&self.capacity_factor) {
            if !is_proportion(*value) {
                return fail(format!(
                    "availability and capacity factor must be between 0 and 1 (timepoint {tp})"
                ));
            }
        }

        self.validate_startup_types()
    }

    /// Check that startup type cutoffs are consistent
    fn validate_startup_types(&self) -> Result<()> {
        let Some(hottest) = self.startup_types.first() else {
            return Ok(());
        };

        if !self
            .startup_types
            .iter()
            .tuple_windows()
            .all(|(hotter, colder)| hotter.down_time_cutoff < colder.down_time_cutoff)
        {
            return Err(BuildError::configuration(
                &self.id,
                "startup type down time cutoffs must be strictly increasing from hottest to coldest",
            )
            .into());
        }

        if !approx_eq!(
            f64,
            hottest.down_time_cutoff.value(),
            self.min_down_time.value()
        ) {
            return Err(BuildError::configuration(
                &self.id,
                format!(
                    "hottest startup type cutoff ({} hours) must equal the minimum down time ({} hours)",
                    hottest.down_time_cutoff, self.min_down_time
                ),
            )
            .into());
        }

        for startup_type in &self.startup_types {
            if !(startup_type.ramp_rate.is_finite() && startup_type.ramp_rate >= RampRate(0.0)) {
                return Err(BuildError::configuration(
                    &self.id,
                    "startup type ramp rates must be non-negative numbers",
                )
                .into());
            }
        }

        Ok(())
    }
}

/// Whether a value lies in [0, 1]
fn is_proportion(value: Dimensionless) -> bool {
    (0.0..=1.0).contains(&value.value())
}

/// Ramp rates default to unconstrained (full capacity per minute)
fn default_ramp_rate() -> RampRate {
    RampRate(1.0)
}

/// A row describing a generator
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct GeneratorRow {
    /// Generator ID
    pub generator: GeneratorID,
    /// Operational type
    pub operational_type: OperationalType,
    /// Balancing type of the horizons used for intertemporal constraints
    pub balancing_type: BalancingType,
    /// Load zone
    pub load_zone: ZoneID,
    /// Installed capacity
    pub capacity_mw: Power,
    /// Minimum stable level as a fraction of capacity
    #[serde(default)]
    pub min_stable_level_fraction: Dimensionless,
    /// Ramp-up rate while committed (fraction of capacity per minute)
    #[serde(default = "default_ramp_rate")]
    pub ramp_up_when_on_rate: RampRate,
    /// Ramp-down rate while committed (fraction of capacity per minute)
    #[serde(default = "default_ramp_rate")]
    pub ramp_down_when_on_rate: RampRate,
    /// Startup ramp rate when there are no startup types
    #[serde(default = "default_ramp_rate")]
    pub startup_plus_ramp_up_rate: RampRate,
    /// Shutdown ramp rate
    #[serde(default = "default_ramp_rate")]
    pub shutdown_plus_ramp_down_rate: RampRate,
    /// Minimum up time
    #[serde(default)]
    pub min_up_time_hrs: Hours,
    /// Minimum down time
    #[serde(default)]
    pub min_down_time_hrs: Hours,
    /// Auxiliary consumption as a fraction of capacity
    #[serde(default)]
    pub aux_consumption_frac_capacity: Dimensionless,
    /// Auxiliary consumption as a fraction of power
    #[serde(default)]
    pub aux_consumption_frac_power: Dimensionless,
    /// Variable cost
    #[serde(default)]
    pub variable_cost_per_mwh: MoneyPerEnergy,
    /// Startup cost when there are no startup types
    #[serde(default)]
    pub startup_cost_per_mw: MoneyPerPower,
    /// Startup fuel burn when there are no startup types
    #[serde(default)]
    pub startup_fuel_mmbtu_per_mw: FuelPerPower,
    /// Shutdown cost
    #[serde(default)]
    pub shutdown_cost_per_mw: MoneyPerPower,
}

/// A row describing one startup type of a generator
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct StartupTypeRow {
    /// Generator ID
    pub generator: GeneratorID,
    /// Position of the type, 1 being the hottest
    pub startup_type_id: u32,
    /// Lower bound of the down time for which the type applies
    pub down_time_cutoff_hrs: Hours,
    /// Startup trajectory ramp rate
    #[serde(default = "default_ramp_rate")]
    pub startup_plus_ramp_up_rate: RampRate,
    /// Startup cost
    #[serde(default)]
    pub startup_cost_per_mw: MoneyPerPower,
    /// Startup fuel burn
    #[serde(default)]
    pub startup_fuel_mmbtu_per_mw: FuelPerPower,
}

/// A row giving a per-timepoint value for a generator (availability derate or capacity factor)
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct GeneratorTimepointRow {
    /// Generator ID
    pub generator: GeneratorID,
    /// Timepoint
    pub timepoint: TimepointID,
    /// The value
    pub value: Dimensionless,
}

/// A row indicating that a generator can provide a reserve product
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct GeneratorReserveRow {
    /// Generator ID
    pub generator: GeneratorID,
    /// Reserve product
    pub reserve: ReserveID,
}

/// Per-generator tables other than the main generator rows
#[derive(Default)]
pub struct GeneratorTables {
    /// Startup types
    pub startup_types: Vec<StartupTypeRow>,
    /// Availability derates
    pub availability: Vec<GeneratorTimepointRow>,
    /// Capacity factors
    pub capacity_factors: Vec<GeneratorTimepointRow>,
    /// Reserve participation
    pub reserves: Vec<GeneratorReserveRow>,
}

impl Generator {
    /// Create a generator from its row, with no startup types, derates or reserves
    pub fn from_row(row: GeneratorRow) -> Self {
        Self {
            id: row.generator,
            operational_type: row.operational_type,
            balancing_type: row.balancing_type,
            load_zone: row.load_zone,
            capacity: row.capacity_mw,
            min_stable_level: row.min_stable_level_fraction,
            ramp_up_when_on: row.ramp_up_when_on_rate,
            ramp_down_when_on: row.ramp_down_when_on_rate,
            startup_plus_ramp_up: row.startup_plus_ramp_up_rate,
            shutdown_plus_ramp_down: row.shutdown_plus_ramp_down_rate,
            min_up_time: row.min_up_time_hrs,
            min_down_time: row.min_down_time_hrs,
            startup_types: Vec::new(),
            aux_consumption_frac_capacity: row.aux_consumption_frac_capacity,
            aux_consumption_frac_power: row.aux_consumption_frac_power,
            variable_cost: row.variable_cost_per_mwh,
            startup_cost: row.startup_cost_per_mw,
            startup_fuel: row.startup_fuel_mmbtu_per_mw,
            shutdown_cost: row.shutdown_cost_per_mw,
            availability: HashMap::new(),
            capacity_factor: HashMap::new(),
            reserves: Vec::new(),
        }
    }
}

/// Assemble generators from tabular rows.
///
/// # Arguments
///
/// * `rows` - One row per generator
/// * `tables` - Startup types, derates, capacity factors and reserve participation
///
/// # Returns
///
/// A [`GeneratorMap`] or an error if the rows are inconsistent.
pub fn generators_from_rows<I>(rows: I, tables: GeneratorTables) -> Result<GeneratorMap>
where
    I: IntoIterator<Item = GeneratorRow>,
{
    let mut generators = GeneratorMap::new();
    for row in rows {
        let id = row.generator.clone();
        if generators
            .insert(id.clone(), Generator::from_row(row))
            .is_some()
        {
            return Err(BuildError::configuration(&id, "generator defined more than once").into());
        }
    }

    fn lookup<'a>(generators: &'a mut GeneratorMap, id: &GeneratorID) -> Result<&'a mut Generator> {
        generators
            .get_mut(id)
            .with_context(|| format!("Unknown generator {id}"))
    }

    // Startup types must be attached in order of their IDs
    let mut startup_rows = tables.startup_types;
    startup_rows.sort_by(|a, b| {
        (&a.generator, a.startup_type_id).cmp(&(&b.generator, b.startup_type_id))
    });
    for (id, rows) in &startup_rows.iter().chunk_by(|row| row.generator.clone()) {
        let generator = lookup(&mut generators, &id)?;
        for (expected, row) in (1..).zip(rows) {
            if row.startup_type_id != expected {
                return Err(BuildError::configuration(
                    &id,
                    "startup type IDs must be numbered 1, 2, ... from hottest to coldest",
                )
                .into());
            }
            generator.startup_types.push(StartupType {
                down_time_cutoff: row.down_time_cutoff_hrs,
                ramp_rate: row.startup_plus_ramp_up_rate,
                cost: row.startup_cost_per_mw,
                fuel: row.startup_fuel_mmbtu_per_mw,
            });
        }
    }

    for row in tables.availability {
        let generator = lookup(&mut generators, &row.generator)?;
        generator.availability.insert(row.timepoint, row.value);
    }

    for row in tables.capacity_factors {
        let generator = lookup(&mut generators, &row.generator)?;
        if generator.operational_type != OperationalType::Variable {
            warn!(
                "Capacity factor supplied for generator {} which is not variable; it will be ignored",
                generator.id
            );
        }
        generator.capacity_factor.insert(row.timepoint, row.value);
    }

    for row in tables.reserves {
        let generator = lookup(&mut generators, &row.generator)?;
        generator.reserves.push(row.reserve);
    }

    for generator in generators.values() {
        generator.validate()?;
    }

    Ok(generators)
}
