//! System requirements which generators must meet: load in each zone and reserve products.
use crate::id::{IDCollection, define_id_type};
use crate::temporal::TimepointID;
use crate::units::Power;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashMap;

define_id_type! {ZoneID}
define_id_type! {ReserveID}

/// Whether a reserve product requires headroom or footroom
#[derive(PartialEq, Eq, Debug, Clone, Copy, DeserializeLabeledStringEnum)]
pub enum ReserveDirection {
    /// Capacity to increase output
    #[string = "up"]
    Up,
    /// Capacity to decrease output
    #[string = "down"]
    Down,
}

/// A reserve product with a requirement per timepoint
#[derive(PartialEq, Debug, Clone)]
pub struct ReserveProduct {
    /// Unique identifier
    pub id: ReserveID,
    /// Whether provision counts as upward or downward reserves
    pub direction: ReserveDirection,
    /// Requirement per timepoint (zero where absent)
    pub requirement: HashMap<TimepointID, Power>,
}

impl ReserveProduct {
    /// The requirement in the given timepoint
    pub fn requirement(&self, tp: TimepointID) -> Power {
        self.requirement.get(&tp).copied().unwrap_or_default()
    }
}

/// A row giving the load of a zone in a timepoint
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct LoadRow {
    /// The load zone
    pub load_zone: ZoneID,
    /// The timepoint
    pub timepoint: TimepointID,
    /// Load to be met
    pub load_mw: Power,
}

/// A row defining a reserve product
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ReserveRow {
    /// Reserve product ID
    pub reserve: ReserveID,
    /// Direction of the product
    pub direction: ReserveDirection,
}

/// A row giving the requirement of a reserve product in a timepoint
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ReserveRequirementRow {
    /// Reserve product ID
    pub reserve: ReserveID,
    /// The timepoint
    pub timepoint: TimepointID,
    /// Required provision
    pub requirement_mw: Power,
}

/// Load and reserve requirements for the whole system
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Requirements {
    load: IndexMap<ZoneID, HashMap<TimepointID, Power>>,
    reserves: IndexMap<ReserveID, ReserveProduct>,
}

impl Requirements {
    /// Assemble requirements from tabular rows
    pub fn from_rows<L, R, Q>(load_rows: L, reserve_rows: R, requirement_rows: Q) -> Result<Self>
    where
        L: IntoIterator<Item = LoadRow>,
        R: IntoIterator<Item = ReserveRow>,
        Q: IntoIterator<Item = ReserveRequirementRow>,
    {
        let mut load: IndexMap<ZoneID, HashMap<TimepointID, Power>> = IndexMap::new();
        for row in load_rows {
            ensure!(
                row.load_mw.is_finite(),
                "Load for zone {} in timepoint {} must be finite",
                row.load_zone,
                row.timepoint
            );
            let existing = load
                .entry(row.load_zone.clone())
                .or_default()
                .insert(row.timepoint, row.load_mw);
            ensure!(
                existing.is_none(),
                "Duplicate load entry for zone {} in timepoint {}",
                row.load_zone,
                row.timepoint
            );
        }

        let mut reserves: IndexMap<ReserveID, ReserveProduct> = IndexMap::new();
        for row in reserve_rows {
            let product = ReserveProduct {
                id: row.reserve.clone(),
                direction: row.direction,
                requirement: HashMap::new(),
            };
            ensure!(
                reserves.insert(row.reserve.clone(), product).is_none(),
                "Reserve product {} defined more than once",
                row.reserve
            );
        }

        for row in requirement_rows {
            let id = reserves
                .get_id(&row.reserve.0)
                .with_context(|| format!("Invalid requirement for reserve {}", row.reserve))?;
            ensure!(
                row.requirement_mw.is_finite() && row.requirement_mw >= Power(0.0),
                "Requirement for reserve {id} must be a non-negative number"
            );
            reserves[&id]
                .requirement
                .insert(row.timepoint, row.requirement_mw);
        }

        Ok(Self { load, reserves })
    }

    /// Iterate over the load zones which have load
    pub fn iter_zones(&self) -> impl Iterator<Item = &ZoneID> {
        self.load.keys()
    }

    /// Whether the zone is known
    pub fn has_zone(&self, zone: &ZoneID) -> bool {
        self.load.contains_key(zone)
    }

    /// Load of a zone in a timepoint (zero where absent)
    pub fn load(&self, zone: &ZoneID, tp: TimepointID) -> Power {
        self.load
            .get(zone)
            .and_then(|load| load.get(&tp))
            .copied()
            .unwrap_or_default()
    }

    /// Iterate over reserve products
    pub fn iter_reserves(&self) -> impl Iterator<Item = &ReserveProduct> {
        self.reserves.values()
    }

    /// Get a reserve product by ID
    pub fn reserve(&self, id: &ReserveID) -> Option<&ReserveProduct> {
        self.reserves.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    fn load_row(zone: &str, tp: u32, load: f64) -> LoadRow {
        LoadRow {
            load_zone: zone.into(),
            timepoint: TimepointID(tp),
            load_mw: Power(load),
        }
    }

    #[test]
    fn test_from_rows() {
        let requirements = Requirements::from_rows(
            [load_row("north", 1, 30.0), load_row("south", 1, 10.0)],
            [ReserveRow {
                reserve: "spin".into(),
                direction: ReserveDirection::Up,
            }],
            [ReserveRequirementRow {
                reserve: "spin".into(),
                timepoint: TimepointID(2),
                requirement_mw: Power(5.0),
            }],
        )
        .unwrap();

        assert_eq!(
            requirements.load(&"north".into(), TimepointID(1)),
            Power(30.0)
        );
        assert_eq!(
            requirements.load(&"north".into(), TimepointID(2)),
            Power(0.0)
        );
        let spin = requirements.reserve(&"spin".into()).unwrap();
        assert_eq!(spin.requirement(TimepointID(2)), Power(5.0));
        assert_eq!(spin.requirement(TimepointID(1)), Power(0.0));
    }

    #[test]
    fn test_duplicate_load() {
        assert_error!(
            Requirements::from_rows(
                [load_row("north", 1, 30.0), load_row("north", 1, 10.0)],
                [],
                []
            ),
            "Duplicate load entry for zone north in timepoint 1"
        );
    }

    #[test]
    fn test_requirement_for_unknown_reserve() {
        let result = Requirements::from_rows(
            [],
            [],
            [ReserveRequirementRow {
                reserve: "spin".into(),
                timepoint: TimepointID(1),
                requirement_mw: Power(5.0),
            }],
        );
        assert_error!(result, "Invalid requirement for reserve spin");
    }
}
