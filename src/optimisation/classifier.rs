//! Classification of startups into startup types by how long the unit was offline.
//!
//! A startup of type `s` (other than the coldest) is only admissible if the unit shut down within
//! the sub-window between the down time cutoffs of type `s` and type `s + 1`.
use super::{BuildContext, gen_var};
use crate::generator::Generator;
use crate::problem::{
    ConstraintFamily, ConstraintKey, ConstraintSystem, GeneratorVariable, Relation,
};
use crate::temporal::TimepointID;
use crate::temporal::window::WindowMember;
use anyhow::Result;
use log::debug;

/// Members of the sub-window in which a shutdown permits a startup of type `s` at `tp`.
///
/// Panics if `s` is the coldest startup type.
pub fn startup_sub_window(
    ctx: &BuildContext,
    generator: &Generator,
    tp: TimepointID,
    s: usize,
) -> Vec<WindowMember> {
    let hotter = ctx.windows.resolve(
        &generator.balancing_type,
        tp,
        generator.startup_types[s].down_time_cutoff,
    );
    let colder = ctx.windows.resolve(
        &generator.balancing_type,
        tp,
        generator.startup_types[s + 1].down_time_cutoff,
    );

    colder.difference(&hotter)
}

/// Add `StartupTypeAdmissible` constraints for every startup type except the coldest
pub fn add_constraints(
    ctx: &BuildContext,
    system: &mut ConstraintSystem,
    generator: &Generator,
) -> Result<()> {
    let num_types = generator.startup_types.len();
    if num_types < 2 {
        return Ok(());
    }

    for tp in ctx.model.temporal.iter_ids() {
        for s in 0..num_types - 1 {
            let sub_window = startup_sub_window(ctx, generator, tp, s);
            if sub_window.is_empty() {
                debug!(
                    "No down time interval for startup type {} of generator {} in timepoint {tp}",
                    s + 1,
                    generator.id
                );
                continue;
            }

            let mut expr = gen_var(generator, GeneratorVariable::StartupType(s), tp);
            let mut linked_shutdowns = 0.0;
            for member in sub_window {
                match member {
                    WindowMember::Timepoint(id) => {
                        expr = expr - gen_var(generator, GeneratorVariable::Shutdown, id);
                    }
                    WindowMember::Linked(index) => {
                        linked_shutdowns += ctx.model.linked.value(&generator.id, index)?.shutdown;
                    }
                }
            }

            let key = ConstraintKey::startup_type(
                ConstraintFamily::StartupTypeAdmissible,
                &generator.id,
                tp,
                s,
            );
            system.add_constraint(key, expr, Relation::LessEqual, linked_shutdowns);
        }
    }

    Ok(())
}
