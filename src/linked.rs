//! Boundary values exchanged between sequentially solved subproblems.
//!
//! When a horizon has a linked boundary, its first timepoint is preceded by the final timepoints of
//! a previously solved subproblem. Those timepoints are addressed by a linked index (0 for the one
//! immediately before this subproblem, -1 for the one before that, and so on) and every quantity a
//! constraint needs from them is looked up here.
use crate::error::BuildError;
use crate::generator::GeneratorID;
use crate::units::Power;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a generator in a linked timepoint
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LinkedBoundaryValue {
    /// Generator ID
    pub generator: GeneratorID,
    /// Linked index (0, -1, -2, ...)
    pub linked_timepoint: i32,
    /// Commitment level
    pub commit: f64,
    /// Startup indicator
    pub startup: f64,
    /// Shutdown indicator
    pub shutdown: f64,
    /// Power above minimum stable level
    pub power_above_pmin: Power,
    /// Minimum stable level power
    pub pmin: Power,
    /// Total upward reserve provision
    pub upward_reserves: Power,
    /// Total downward reserve provision
    pub downward_reserves: Power,
    /// Ramp-up limit over the linked timepoint
    pub ramp_up_limit: Power,
    /// Ramp-down limit over the linked timepoint
    pub ramp_down_limit: Power,
    /// Shutdown trajectory power
    pub shutdown_power: Power,
    /// Shutdown trajectory ramp limit over the linked timepoint
    pub shutdown_ramp_limit: Power,
}

/// Startup trajectory state of a generator in a linked timepoint, for one startup profile
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LinkedStartupValue {
    /// Generator ID
    pub generator: GeneratorID,
    /// Linked index (0, -1, -2, ...)
    pub linked_timepoint: i32,
    /// Startup profile, numbered from 1 (hottest)
    pub startup_type: usize,
    /// Startup trajectory power
    pub startup_power: Power,
    /// Startup trajectory ramp limit over the linked timepoint
    pub startup_ramp_limit: Power,
}

/// Lookup of linked boundary values by generator and linked index
#[derive(PartialEq, Debug, Clone, Default)]
pub struct LinkedBoundaryData {
    values: HashMap<(GeneratorID, i32), LinkedBoundaryValue>,
    startup: HashMap<(GeneratorID, i32, usize), LinkedStartupValue>,
}

impl LinkedBoundaryData {
    /// Assemble linked boundary data from rows.
    ///
    /// Fails if a (generator, linked index[, startup type]) combination appears more than once or
    /// a row refers to a timepoint of this subproblem.
    pub fn from_rows<V, S>(rows: V, startup_rows: S) -> Result<Self>
    where
        V: IntoIterator<Item = LinkedBoundaryValue>,
        S: IntoIterator<Item = LinkedStartupValue>,
    {
        let mut values = HashMap::new();
        for row in rows {
            check_linked_index(row.linked_timepoint)?;
            let key = (row.generator.clone(), row.linked_timepoint);
            ensure!(
                !values.contains_key(&key),
                "Duplicate linked boundary values for generator {} at linked timepoint {}",
                row.generator,
                row.linked_timepoint
            );
            values.insert(key, row);
        }

        let mut startup = HashMap::new();
        for row in startup_rows {
            check_linked_index(row.linked_timepoint)?;
            ensure!(
                row.startup_type >= 1,
                "Startup types of linked startup values are numbered from 1"
            );
            let key = (
                row.generator.clone(),
                row.linked_timepoint,
                row.startup_type,
            );
            ensure!(
                !startup.contains_key(&key),
                "Duplicate linked startup values for generator {} at linked timepoint {} \
                (startup type {})",
                row.generator,
                row.linked_timepoint,
                row.startup_type
            );
            startup.insert(key, row);
        }

        Ok(Self { values, startup })
    }

    /// Whether no values were supplied
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.startup.is_empty()
    }

    /// The state of a generator in a linked timepoint
    pub fn value(&self, generator: &GeneratorID, index: i32) -> Result<&LinkedBoundaryValue> {
        self.values
            .get(&(generator.clone(), index))
            .ok_or_else(|| missing(generator, index))
    }

    /// The startup trajectory state of a generator in a linked timepoint.
    ///
    /// `profile` is the zero-based position of the startup profile.
    pub fn startup(
        &self,
        generator: &GeneratorID,
        index: i32,
        profile: usize,
    ) -> Result<&LinkedStartupValue> {
        self.startup
            .get(&(generator.clone(), index, profile + 1))
            .ok_or_else(|| missing(generator, index))
    }
}

/// Linked indices refer to timepoints before this subproblem
fn check_linked_index(index: i32) -> Result<()> {
    ensure!(
        index <= 0,
        "Linked timepoint indices must be zero or negative (found {index})"
    );
    Ok(())
}

fn missing(generator: &GeneratorID, index: i32) -> anyhow::Error {
    BuildError::MissingBoundaryData {
        generator: generator.to_string(),
        linked_index: index,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, linked_data};

    #[test]
    fn test_value_lookup() {
        let data = linked_data(&[0, -1], 2);
        let gen1 = GeneratorID::new("gen1");
        assert_eq!(data.value(&gen1, -1).unwrap().commit, 1.0);
        assert_eq!(
            data.startup(&gen1, 0, 1).unwrap().startup_ramp_limit,
            Power(30.0)
        );
    }

    #[test]
    fn test_missing_value() {
        let data = linked_data(&[0], 1);
        let err = data.value(&"gen2".into(), 0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::MissingBoundaryData {
                generator: "gen2".into(),
                linked_index: 0
            })
        );
        assert_error!(
            data.startup(&"gen1".into(), 0, 1),
            "Missing linked boundary data for generator gen1 at linked timepoint 0"
        );
    }

    #[test]
    fn test_positive_index_rejected() {
        let mut row = linked_data(&[0], 0).value(&"gen1".into(), 0).unwrap().clone();
        row.linked_timepoint = 1;
        assert_error!(
            LinkedBoundaryData::from_rows([row], []),
            "Linked timepoint indices must be zero or negative (found 1)"
        );
    }

    #[test]
    fn test_duplicate_rows() {
        let row = linked_data(&[0], 0).value(&"gen1".into(), 0).unwrap().clone();
        assert_error!(
            LinkedBoundaryData::from_rows([row.clone(), row], []),
            "Duplicate linked boundary values for generator gen1 at linked timepoint 0"
        );
    }
}
