//! The model: everything needed to assemble a constraint system for one subproblem.
use crate::error::BuildError;
use crate::generator::{Generator, GeneratorMap};
use crate::linked::LinkedBoundaryData;
use crate::requirements::Requirements;
use crate::temporal::{Boundary, TemporalIndex};
use anyhow::Result;
use log::warn;

pub mod parameters;
pub use parameters::BuildParameters;

/// Read-only inputs for building the constraint system.
///
/// Assembled once and then shared by every constraint builder.
#[derive(Debug)]
pub struct Model {
    /// Timepoints and horizons
    pub temporal: TemporalIndex,
    /// Generating units
    pub generators: GeneratorMap,
    /// Load and reserve requirements
    pub requirements: Requirements,
    /// Values carried over from the previously solved subproblem
    pub linked: LinkedBoundaryData,
    /// Parameters controlling assembly
    pub parameters: BuildParameters,
}

impl Model {
    /// Assemble a model, checking that generators only refer to things which exist
    pub fn new(
        temporal: TemporalIndex,
        generators: GeneratorMap,
        requirements: Requirements,
        linked: LinkedBoundaryData,
        parameters: BuildParameters,
    ) -> Result<Self> {
        parameters.validate()?;
        for generator in generators.values() {
            check_references(generator, &temporal, &requirements)?;
        }

        if linked.is_empty()
            && temporal
                .iter_horizons()
                .any(|horizon| horizon.boundary == Boundary::Linked)
        {
            warn!("Model has linked horizons but no linked boundary values were supplied");
        }

        Ok(Self {
            temporal,
            generators,
            requirements,
            linked,
            parameters,
        })
    }

    /// Iterate over the generators
    pub fn iter_generators(&self) -> impl Iterator<Item = &Generator> {
        self.generators.values()
    }
}

/// Check that a generator only references known balancing types, zones, reserves and timepoints
fn check_references(
    generator: &Generator,
    temporal: &TemporalIndex,
    requirements: &Requirements,
) -> Result<()> {
    let fail = |message: String| -> Result<()> {
        Err(BuildError::configuration(&generator.id, message).into())
    };

    if !temporal.has_balancing_type(&generator.balancing_type) {
        return fail(format!(
            "unknown balancing type {}",
            generator.balancing_type
        ));
    }

    if !requirements.has_zone(&generator.load_zone) {
        return fail(format!("unknown load zone {}", generator.load_zone));
    }

    for reserve in &generator.reserves {
        if requirements.reserve(reserve).is_none() {
            return fail(format!("unknown reserve product {reserve}"));
        }
    }

    let known_timepoints = temporal.iter_ids().collect::<Vec<_>>();
    for tp in generator
        .availability
        .keys()
        .chain(generator.capacity_factor.keys())
    {
        if !known_timepoints.contains(tp) {
            return fail(format!("derate given for unknown timepoint {tp}"));
        }
    }

    generator.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, commit_generator, model_with, temporal_index};
    use crate::requirements::LoadRow;
    use crate::temporal::TimepointID;
    use crate::units::{Dimensionless, Power};
    use indexmap::indexmap;
    use rstest::rstest;

    fn requirements() -> Requirements {
        Requirements::from_rows(
            [LoadRow {
                load_zone: "zone1".into(),
                timepoint: TimepointID(1),
                load_mw: Power(10.0),
            }],
            [],
            [],
        )
        .unwrap()
    }

    #[rstest]
    fn test_model_new(commit_generator: Generator) {
        let model = model_with(
            commit_generator,
            temporal_index(&[1.0; 2], Boundary::Linear, &[]),
            LinkedBoundaryData::default(),
        );
        assert_eq!(model.iter_generators().count(), 1);
    }

    #[rstest]
    fn test_unknown_zone(mut commit_generator: Generator) {
        commit_generator.load_zone = "zone2".into();
        let result = Model::new(
            temporal_index(&[1.0; 2], Boundary::Linear, &[]),
            indexmap! { commit_generator.id.clone() => commit_generator },
            requirements(),
            LinkedBoundaryData::default(),
            BuildParameters::default(),
        );
        assert_error!(
            result,
            "Invalid configuration for generator gen1: unknown load zone zone2"
        );
    }

    #[rstest]
    fn test_unknown_balancing_type(mut commit_generator: Generator) {
        commit_generator.balancing_type = "week".into();
        let result = Model::new(
            temporal_index(&[1.0; 2], Boundary::Linear, &[]),
            indexmap! { commit_generator.id.clone() => commit_generator },
            requirements(),
            LinkedBoundaryData::default(),
            BuildParameters::default(),
        );
        assert_error!(
            result,
            "Invalid configuration for generator gen1: unknown balancing type week"
        );
    }

    #[rstest]
    fn test_derate_for_unknown_timepoint(mut commit_generator: Generator) {
        commit_generator
            .availability
            .insert(TimepointID(9), Dimensionless(0.5));
        let result = Model::new(
            temporal_index(&[1.0; 2], Boundary::Linear, &[]),
            indexmap! { commit_generator.id.clone() => commit_generator },
            requirements(),
            LinkedBoundaryData::default(),
            BuildParameters::default(),
        );
        assert_error!(
            result,
            "Invalid configuration for generator gen1: derate given for unknown timepoint 9"
        );
    }
}
