//! Minimum up and down time constraints.
use super::{BuildContext, BuildSummary, gen_var};
use crate::generator::Generator;
use crate::linked::LinkedBoundaryValue;
use crate::problem::{
    ConstraintFamily, ConstraintKey, ConstraintSystem, GeneratorVariable, Relation, VariableKey,
};
use crate::temporal::TimepointID;
use crate::temporal::window::{LookbackWindow, WindowMember};
use crate::units::Hours;
use anyhow::Result;
use log::debug;

/// Which minimum time is being enforced
#[derive(Debug, Clone, Copy)]
enum MinTime {
    Up,
    Down,
}

impl MinTime {
    fn family(self) -> ConstraintFamily {
        match self {
            Self::Up => ConstraintFamily::MinUpTime,
            Self::Down => ConstraintFamily::MinDownTime,
        }
    }

    fn hours(self, generator: &Generator) -> Hours {
        match self {
            Self::Up => generator.min_up_time,
            Self::Down => generator.min_down_time,
        }
    }

    /// The event which starts the minimum time
    fn event(self) -> GeneratorVariable {
        match self {
            Self::Up => GeneratorVariable::Startup,
            Self::Down => GeneratorVariable::Shutdown,
        }
    }

    fn linked_event(self, value: &LinkedBoundaryValue) -> f64 {
        match self {
            Self::Up => value.startup,
            Self::Down => value.shutdown,
        }
    }
}

/// Add minimum up and down time constraints for a committable generator
pub fn add_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    summary: &mut BuildSummary,
    generator: &Generator,
) -> Result<()> {
    add_min_time_constraints(ctx, system, summary, generator, MinTime::Up)?;
    add_min_time_constraints(ctx, system, summary, generator, MinTime::Down)
}

/// Whether a window which ran into the start of a linear horizon should be skipped.
///
/// Such a window is incomplete, but it is still enforced in the final timepoint of the horizon so
/// that the unit is not left mid-way through a minimum time.
fn truncated_at_start(
    ctx: &BuildContext,
    generator: &Generator,
    tp: TimepointID,
    window: &LookbackWindow,
) -> bool {
    window.stopped_at_linear_start()
        && !ctx
            .model
            .temporal
            .is_last_in_horizon(tp, &generator.balancing_type)
}

/// `Commit[t] - Σ Startup ≥ Σ linked startups` (up) or
/// `-Commit[t] - Σ Shutdown ≥ Σ linked shutdowns - 1` (down) over the window ending at `t`
fn add_min_time_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    summary: &mut BuildSummary,
    generator: &Generator,
    kind: MinTime,
) -> Result<()> {
    let hours = kind.hours(generator);
    if hours.value() == 0.0 {
        return Ok(());
    }
    let family = kind.family();

    for tp in ctx.model.temporal.iter_ids() {
        let window = ctx.windows.resolve(&generator.balancing_type, tp, hours);
        if window.is_degenerate() {
            summary.record_degenerate(family, &generator.id, tp);
            continue;
        }
        if truncated_at_start(ctx, generator, tp, &window) {
            debug!(
                "Skipping {family} for generator {} in timepoint {tp}: window reaches the start \
                of the horizon",
                generator.id
            );
            continue;
        }

        let commit = gen_var(generator, GeneratorVariable::Commit, tp);
        let (mut expr, mut rhs) = match kind {
            MinTime::Up => (commit, 0.0),
            MinTime::Down => (-commit, -1.0),
        };
        for member in window.members() {
            match *member {
                WindowMember::Timepoint(id) => {
                    expr.add_term(VariableKey::generator(&generator.id, kind.event(), id), -1.0);
                }
                WindowMember::Linked(index) => {
                    rhs += kind.linked_event(ctx.model.linked.value(&generator.id, index)?);
                }
            }
        }

        let key = ConstraintKey::generator(family, &generator.id, tp);
        system.add_constraint(key, expr, Relation::GreaterEqual, rhs);
    }

    Ok(())
}
