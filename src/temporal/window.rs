//! Resolution of backward-looking time windows.
//!
//! Minimum up/down times and startup classification all ask the same question: which timepoints lie
//! within `H` hours before (and including) a reference timepoint? The answer depends on the horizon
//! boundary, so it is worked out once here and shared.
use super::{BalancingType, Previous, TemporalIndex, TimepointID};
use crate::units::Hours;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Absolute tolerance used when comparing accumulated durations against a requirement
const DURATION_TOLERANCE: f64 = 1e-9;

/// A member of a lookback window
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum WindowMember {
    /// A timepoint of this subproblem
    Timepoint(TimepointID),
    /// A timepoint of the previous subproblem, whose values are supplied as linked boundary data
    Linked(i32),
}

/// The timepoints spanning a required duration backwards from a reference timepoint
#[derive(PartialEq, Debug, Clone)]
pub struct LookbackWindow {
    members: Vec<WindowMember>,
    duration: Hours,
    required: Hours,
    stopped_at_linear_start: bool,
}

impl LookbackWindow {
    /// Members in chronological order (earliest first). The reference timepoint is always last.
    pub fn members(&self) -> &[WindowMember] {
        &self.members
    }

    /// The earliest member of the window
    pub fn earliest(&self) -> WindowMember {
        self.members[0]
    }

    /// Total duration covered by the window
    pub fn duration(&self) -> Hours {
        self.duration
    }

    /// Whether the window covers the required duration
    pub fn is_complete(&self) -> bool {
        covers(self.duration, self.required)
    }

    /// Whether the walk stopped because it reached the start of a linear horizon
    pub fn stopped_at_linear_start(&self) -> bool {
        self.stopped_at_linear_start
    }

    /// Whether the window contains only the reference timepoint
    pub fn is_degenerate(&self) -> bool {
        self.members.len() == 1
    }

    /// Whether the window contains the given member
    pub fn contains(&self, member: WindowMember) -> bool {
        self.members.contains(&member)
    }

    /// Members of this window which are not in `other`, in chronological order
    pub fn difference(&self, other: &LookbackWindow) -> Vec<WindowMember> {
        self.members
            .iter()
            .copied()
            .filter(|member| !other.contains(*member))
            .collect()
    }
}

/// Whether an accumulated duration satisfies a requirement
fn covers(accumulated: Hours, required: Hours) -> bool {
    accumulated.value() >= required.value() - DURATION_TOLERANCE
}

/// Walk backwards from `tp` until the accumulated duration reaches `hours`.
///
/// The walk stops early at the start of a linear horizon, when the linked timepoints run out, or
/// after one full lap of a circular horizon.
pub fn lookback(
    index: &TemporalIndex,
    balancing_type: &BalancingType,
    tp: TimepointID,
    hours: Hours,
) -> LookbackWindow {
    let mut members = VecDeque::from([WindowMember::Timepoint(tp)]);
    let mut duration = index.duration(tp);
    let mut current = WindowMember::Timepoint(tp);
    let mut stopped_at_linear_start = false;

    while !covers(duration, hours) {
        let prev = match current {
            WindowMember::Timepoint(id) => index.previous(id, balancing_type),
            WindowMember::Linked(linked_idx) => index.previous_linked(linked_idx),
        };

        match prev {
            Previous::None => {
                stopped_at_linear_start = matches!(current, WindowMember::Timepoint(_));
                break;
            }
            Previous::Timepoint(id) if id == tp => break,
            Previous::Timepoint(id) => {
                duration = duration + index.duration(id);
                current = WindowMember::Timepoint(id);
            }
            Previous::Linked(linked_idx) => {
                let Some(linked) = index.linked_timepoint(linked_idx) else {
                    break;
                };
                duration = duration + linked.duration;
                current = WindowMember::Linked(linked_idx);
            }
        }
        members.push_front(current);
    }

    LookbackWindow {
        members: members.into(),
        duration,
        required: hours,
        stopped_at_linear_start,
    }
}

/// Memoises lookback windows for a temporal index.
///
/// Many constraints request overlapping windows, so results are cached per
/// (balancing type, timepoint, duration).
pub struct WindowResolver<'a> {
    index: &'a TemporalIndex,
    cache: RefCell<HashMap<(BalancingType, TimepointID, u64), Rc<LookbackWindow>>>,
}

impl<'a> WindowResolver<'a> {
    /// Create a resolver for the given temporal index
    pub fn new(index: &'a TemporalIndex) -> Self {
        Self {
            index,
            cache: RefCell::default(),
        }
    }

    /// The temporal index windows are resolved against
    pub fn index(&self) -> &'a TemporalIndex {
        self.index
    }

    /// Get the window spanning `hours` backwards from `tp`
    pub fn resolve(
        &self,
        balancing_type: &BalancingType,
        tp: TimepointID,
        hours: Hours,
    ) -> Rc<LookbackWindow> {
        let key = (balancing_type.clone(), tp, hours.value().to_bits());
        if let Some(window) = self.cache.borrow().get(&key) {
            return Rc::clone(window);
        }

        let window = Rc::new(lookback(self.index, balancing_type, tp, hours));
        self.cache.borrow_mut().insert(key, Rc::clone(&window));
        window
    }

    /// Number of distinct windows resolved so far
    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }
}
