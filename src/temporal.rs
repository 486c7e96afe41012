//! The temporal index: timepoints, the horizons which group them and the boundary policy at each
//! horizon's edges.
//!
//! The index is supplied externally and is immutable once built. Every component which needs to
//! look at "the previous timepoint" goes through [`TemporalIndex::previous`], so linear, circular
//! and linked boundaries are handled in one place.
use crate::error::BuildError;
use crate::id::define_id_type;
use crate::units::{Dimensionless, Hours};
use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::{HashMap, HashSet};

pub mod window;

define_id_type! {BalancingType}
define_id_type! {HorizonID}

/// Identifies a timepoint. Timepoints are ordered by ID.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct TimepointID(pub u32);

/// What happens at the edges of a horizon
#[derive(PartialEq, Eq, Debug, Clone, Copy, DeserializeLabeledStringEnum)]
pub enum Boundary {
    /// The first timepoint has no predecessor and the last no successor
    #[string = "linear"]
    Linear,
    /// The horizon wraps: the last timepoint precedes the first
    #[string = "circular"]
    Circular,
    /// The first timepoint is preceded by the final timepoints of a separately solved subproblem
    #[string = "linked"]
    Linked,
}

/// An atomic unit of simulated time
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Timepoint {
    /// The timepoint's ID
    #[serde(rename = "timepoint")]
    pub id: TimepointID,
    /// Length of the timepoint
    #[serde(rename = "duration_hrs")]
    pub duration: Hours,
    /// How many times the timepoint is replicated in the period it represents
    pub weight: Dimensionless,
    /// The investment period the timepoint belongs to
    pub period: u32,
    /// Calendar month (1-12)
    pub month: u32,
}

/// A contiguous run of timepoints sharing one boundary policy
#[derive(PartialEq, Debug, Clone)]
pub struct Horizon {
    /// The horizon's ID
    pub id: HorizonID,
    /// The balancing type this horizon belongs to
    pub balancing_type: BalancingType,
    /// The boundary policy
    pub boundary: Boundary,
    /// Timepoints in chronological order
    pub timepoints: Vec<TimepointID>,
}

impl Horizon {
    /// The first timepoint of the horizon
    pub fn first(&self) -> TimepointID {
        self.timepoints[0]
    }

    /// The last timepoint of the horizon
    pub fn last(&self) -> TimepointID {
        *self
            .timepoints
            .last()
            .expect("Horizons are validated to be non-empty")
    }
}

/// A timepoint belonging to the previously solved subproblem.
///
/// Index 0 immediately precedes the first timepoint of this subproblem, -1 precedes index 0 and so
/// on.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct LinkedTimepoint {
    /// Position relative to the start of this subproblem
    #[serde(rename = "linked_timepoint")]
    pub index: i32,
    /// Length of the linked timepoint
    #[serde(rename = "duration_hrs")]
    pub duration: Hours,
}

/// A row assigning a timepoint to a horizon
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct HorizonTimepointRow {
    /// Balancing type of the horizon
    pub balancing_type: BalancingType,
    /// Horizon ID
    pub horizon: HorizonID,
    /// Boundary policy of the horizon (repeated for every row of the horizon)
    pub boundary: Boundary,
    /// A timepoint in the horizon
    pub timepoint: TimepointID,
}

/// The predecessor of a timepoint under a given balancing type
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Previous {
    /// An ordinary timepoint in this subproblem (possibly via a circular wrap)
    Timepoint(TimepointID),
    /// A timepoint of the previous subproblem
    Linked(i32),
    /// No predecessor (first timepoint of a linear horizon)
    None,
}

/// Position of a timepoint inside its horizon
#[derive(Debug, Clone, Copy)]
struct Membership {
    horizon: usize,
    position: usize,
}

/// Ordered timepoints with horizons for each balancing type
#[derive(Debug)]
pub struct TemporalIndex {
    timepoints: IndexMap<TimepointID, Timepoint>,
    horizons: Vec<Horizon>,
    linked_timepoints: Vec<LinkedTimepoint>,
    membership: HashMap<(BalancingType, TimepointID), Membership>,
}

impl TemporalIndex {
    /// Assemble and validate a temporal index.
    ///
    /// # Arguments
    ///
    /// * `timepoints` - Timepoints in chronological order
    /// * `horizons` - Horizons for every balancing type
    /// * `linked_timepoints` - Timepoints of the previous subproblem (may be empty)
    pub fn new(
        timepoints: Vec<Timepoint>,
        horizons: Vec<Horizon>,
        mut linked_timepoints: Vec<LinkedTimepoint>,
    ) -> Result<Self> {
        check_timepoints(&timepoints)?;
        let order: HashMap<TimepointID, usize> = timepoints
            .iter()
            .enumerate()
            .map(|(idx, tp)| (tp.id, idx))
            .collect();

        let mut membership = HashMap::new();
        let mut linked_types = HashSet::new();
        for (horizon_idx, horizon) in horizons.iter().enumerate() {
            check_horizon(horizon, &order)?;

            // Linked index 0 precedes the first timepoint of the linked horizon
            if horizon.boundary == Boundary::Linked
                && !linked_types.insert(&horizon.balancing_type)
            {
                return Err(temporal_error(format!(
                    "more than one {} horizon has a linked boundary",
                    horizon.balancing_type
                )));
            }
            for (position, tp) in horizon.timepoints.iter().enumerate() {
                let existing = membership.insert(
                    (horizon.balancing_type.clone(), *tp),
                    Membership {
                        horizon: horizon_idx,
                        position,
                    },
                );
                if existing.is_some() {
                    return Err(temporal_error(format!(
                        "timepoint {tp} belongs to more than one {} horizon",
                        horizon.balancing_type
                    )));
                }
            }
        }

        // Every balancing type must cover every timepoint
        for balancing_type in horizons.iter().map(|h| &h.balancing_type).unique() {
            for tp in timepoints.iter().map(|tp| tp.id) {
                if !membership.contains_key(&(balancing_type.clone(), tp)) {
                    return Err(temporal_error(format!(
                        "timepoint {tp} is not in any {balancing_type} horizon"
                    )));
                }
            }
        }

        linked_timepoints.sort_by_key(|linked| -linked.index);
        for (expected, linked) in (0..).map(|i: i32| -i).zip(&linked_timepoints) {
            if linked.index != expected {
                return Err(temporal_error(format!(
                    "linked timepoints must be numbered 0, -1, -2, ... (found {})",
                    linked.index
                )));
            }
            if !(linked.duration.value() > 0.0 && linked.duration.is_finite()) {
                return Err(temporal_error(format!(
                    "linked timepoint {} must have a positive duration",
                    linked.index
                )));
            }
        }

        Ok(Self {
            timepoints: timepoints.into_iter().map(|tp| (tp.id, tp)).collect(),
            horizons,
            linked_timepoints,
            membership,
        })
    }

    /// Assemble a temporal index from tabular rows.
    ///
    /// Horizon rows are grouped by (balancing type, horizon) and ordered by timepoint.
    pub fn from_rows<I>(
        timepoints: Vec<Timepoint>,
        horizon_rows: I,
        linked_timepoints: Vec<LinkedTimepoint>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = HorizonTimepointRow>,
    {
        let mut horizons: IndexMap<(BalancingType, HorizonID), Horizon> = IndexMap::new();
        for row in horizon_rows {
            let horizon = horizons
                .entry((row.balancing_type.clone(), row.horizon.clone()))
                .or_insert_with(|| Horizon {
                    id: row.horizon.clone(),
                    balancing_type: row.balancing_type.clone(),
                    boundary: row.boundary,
                    timepoints: Vec::new(),
                });
            if horizon.boundary != row.boundary {
                return Err(temporal_error(format!(
                    "horizon {} has conflicting boundary types",
                    horizon.id
                )));
            }
            horizon.timepoints.push(row.timepoint);
        }

        let horizons = horizons
            .into_values()
            .map(|mut horizon| {
                horizon.timepoints.sort_unstable();
                horizon
            })
            .collect();

        Self::new(timepoints, horizons, linked_timepoints)
    }

    /// Get a timepoint by ID.
    ///
    /// Panics if the timepoint is not part of the index.
    pub fn timepoint(&self, id: TimepointID) -> &Timepoint {
        &self.timepoints[&id]
    }

    /// The duration of a timepoint
    pub fn duration(&self, id: TimepointID) -> Hours {
        self.timepoint(id).duration
    }

    /// Iterate over all timepoints in chronological order
    pub fn iter(&self) -> impl Iterator<Item = &Timepoint> {
        self.timepoints.values()
    }

    /// Iterate over all timepoint IDs in chronological order
    pub fn iter_ids(&self) -> impl Iterator<Item = TimepointID> + '_ {
        self.timepoints.keys().copied()
    }

    /// Iterate over all horizons
    pub fn iter_horizons(&self) -> impl Iterator<Item = &Horizon> {
        self.horizons.iter()
    }

    /// Whether any horizon is defined for the given balancing type
    pub fn has_balancing_type(&self, balancing_type: &BalancingType) -> bool {
        self.horizons
            .iter()
            .any(|h| &h.balancing_type == balancing_type)
    }

    /// Get a linked timepoint by index, if it was supplied
    pub fn linked_timepoint(&self, index: i32) -> Option<&LinkedTimepoint> {
        usize::try_from(-index)
            .ok()
            .and_then(|idx| self.linked_timepoints.get(idx))
    }

    /// Iterate over the linked timepoints, starting with index 0
    pub fn iter_linked(&self) -> impl Iterator<Item = &LinkedTimepoint> {
        self.linked_timepoints.iter()
    }

    fn membership(&self, tp: TimepointID, balancing_type: &BalancingType) -> Membership {
        *self
            .membership
            .get(&(balancing_type.clone(), tp))
            .expect("Every balancing type is validated to cover every timepoint")
    }

    /// The horizon containing `tp` for the given balancing type
    pub fn horizon(&self, tp: TimepointID, balancing_type: &BalancingType) -> &Horizon {
        &self.horizons[self.membership(tp, balancing_type).horizon]
    }

    /// Whether `tp` is the first timepoint of its horizon
    pub fn is_first_in_horizon(&self, tp: TimepointID, balancing_type: &BalancingType) -> bool {
        self.membership(tp, balancing_type).position == 0
    }

    /// Whether `tp` is the last timepoint of its horizon
    pub fn is_last_in_horizon(&self, tp: TimepointID, balancing_type: &BalancingType) -> bool {
        let membership = self.membership(tp, balancing_type);
        membership.position + 1 == self.horizons[membership.horizon].timepoints.len()
    }

    /// The predecessor of `tp`, according to the boundary of its horizon
    pub fn previous(&self, tp: TimepointID, balancing_type: &BalancingType) -> Previous {
        let Membership { horizon, position } = self.membership(tp, balancing_type);
        let horizon = &self.horizons[horizon];
        if position > 0 {
            return Previous::Timepoint(horizon.timepoints[position - 1]);
        }

        match horizon.boundary {
            Boundary::Linear => Previous::None,
            Boundary::Circular => Previous::Timepoint(horizon.last()),
            Boundary::Linked => Previous::Linked(0),
        }
    }

    /// The predecessor of a linked timepoint, if one was supplied
    pub fn previous_linked(&self, index: i32) -> Previous {
        match self.linked_timepoint(index - 1) {
            Some(linked) => Previous::Linked(linked.index),
            None => Previous::None,
        }
    }

    /// The successor of `tp` inside this subproblem.
    ///
    /// The last timepoint of a linear or linked horizon has no successor; circular horizons wrap.
    pub fn next(&self, tp: TimepointID, balancing_type: &BalancingType) -> Option<TimepointID> {
        let Membership { horizon, position } = self.membership(tp, balancing_type);
        let horizon = &self.horizons[horizon];
        if let Some(next) = horizon.timepoints.get(position + 1) {
            return Some(*next);
        }

        (horizon.boundary == Boundary::Circular).then(|| horizon.first())
    }

    /// Iterate over every (predecessor, timepoint) pair which has a predecessor
    pub fn iter_transitions<'a>(
        &'a self,
        balancing_type: &'a BalancingType,
    ) -> impl Iterator<Item = (Previous, TimepointID)> + 'a {
        self.iter_ids().filter_map(move |tp| {
            let prev = self.previous(tp, balancing_type);
            (prev != Previous::None).then_some((prev, tp))
        })
    }
}

/// Construct a temporal index error
fn temporal_error(message: String) -> anyhow::Error {
    BuildError::InvalidTemporalIndex(message).into()
}

/// Check that timepoints are ordered and have sensible durations and weights
fn check_timepoints(timepoints: &[Timepoint]) -> Result<()> {
    if timepoints.is_empty() {
        return Err(temporal_error("no timepoints provided".into()));
    }

    if !timepoints.iter().tuple_windows().all(|(a, b)| a.id < b.id) {
        return Err(temporal_error(
            "timepoint IDs must be unique and in increasing order".into(),
        ));
    }

    for tp in timepoints {
        if !(tp.duration.value() > 0.0 && tp.duration.is_finite()) {
            return Err(temporal_error(format!(
                "timepoint {} must have a positive duration",
                tp.id
            )));
        }
        if !(tp.weight.value() > 0.0 && tp.weight.is_finite()) {
            return Err(temporal_error(format!(
                "timepoint {} must have a positive weight",
                tp.id
            )));
        }
        if !(1..=12).contains(&tp.month) {
            return Err(temporal_error(format!(
                "timepoint {} has invalid month {}",
                tp.id, tp.month
            )));
        }
    }

    Ok(())
}

/// Check that a horizon is non-empty and covers consecutive known timepoints
fn check_horizon(horizon: &Horizon, order: &HashMap<TimepointID, usize>) -> Result<()> {
    if horizon.timepoints.is_empty() {
        return Err(temporal_error(format!("horizon {} is empty", horizon.id)));
    }

    let mut positions = Vec::with_capacity(horizon.timepoints.len());
    for tp in &horizon.timepoints {
        match order.get(tp) {
            Some(pos) => positions.push(*pos),
            None => {
                return Err(temporal_error(format!(
                    "horizon {} references unknown timepoint {tp}",
                    horizon.id
                )));
            }
        }
    }

    if !positions.iter().tuple_windows().all(|(a, b)| a + 1 == *b) {
        return Err(temporal_error(format!(
            "timepoints of horizon {} are not contiguous",
            horizon.id
        )));
    }

    Ok(())
}
