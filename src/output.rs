//! Results extracted from a solved constraint system, and writing them to CSV files.
use crate::generator::{Generator, GeneratorID, OperationalType};
use crate::linked::{LinkedBoundaryValue, LinkedStartupValue};
use crate::model::Model;
use crate::optimisation::commitment::profile_indicator;
use crate::optimisation::solve::Solution;
use crate::optimisation::{BuildContext, gross_power, net_power};
use crate::problem::{ConstraintSystem, GeneratorVariable, VariableKey};
use crate::requirements::ReserveDirection;
use crate::settings::Settings;
use crate::temporal::TimepointID;
use crate::units::{Fuel, FuelPerPower, Power};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output file for per-generator results
const GENERATOR_RESULTS_FILE_NAME: &str = "generator_results.csv";

/// Output file for linked boundary values
const LINKED_BOUNDARY_FILE_NAME: &str = "linked_boundary.csv";

/// Output file for linked startup trajectory values
const LINKED_STARTUP_FILE_NAME: &str = "linked_startup.csv";

/// Output file listing every constraint of the assembled system
const CONSTRAINTS_FILE_NAME: &str = "constraints.txt";

/// An indicator is treated as set above this value
const INDICATOR_THRESHOLD: f64 = 0.5;

/// Create the output directory (and any parents) if it does not exist
pub fn create_output_directory(output_dir: &Path) -> Result<()> {
    if output_dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create output directory {}", output_dir.display()))
}

/// The state of a generator in one timepoint of a solution.
///
/// Commitment columns are empty for generators without commitment.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct GeneratorResultRow {
    /// Generator ID
    pub generator: GeneratorID,
    /// Timepoint
    pub timepoint: TimepointID,
    /// Commitment status
    pub commit: Option<f64>,
    /// Startup indicator
    pub startup: Option<f64>,
    /// Shutdown indicator
    pub shutdown: Option<f64>,
    /// Whether the unit is synchronised
    pub synced: Option<f64>,
    /// Gross power output
    pub gross_power_mw: Power,
    /// Power delivered after auxiliary consumption
    pub net_power_mw: Power,
    /// Startup type (numbered from 1, hottest first) of a startup in this timepoint
    pub active_startup_type: Option<usize>,
    /// Fuel burned starting up
    pub startup_fuel_mmbtu: Fuel,
}

/// Commitment state of a generator in a timepoint
#[derive(Debug, Clone, Copy)]
struct CommitmentState {
    commit: f64,
    startup: f64,
    shutdown: f64,
    synced: f64,
}

fn commitment_state(
    generator: &Generator,
    solution: &Solution,
    tp: TimepointID,
) -> Option<CommitmentState> {
    let value = |variable| {
        solution
            .value(&VariableKey::generator(&generator.id, variable, tp))
            .unwrap_or_default()
    };

    match generator.operational_type {
        OperationalType::CommitBinary | OperationalType::CommitContinuous => {
            Some(CommitmentState {
                commit: value(GeneratorVariable::Commit),
                startup: value(GeneratorVariable::Startup),
                shutdown: value(GeneratorVariable::Shutdown),
                synced: value(GeneratorVariable::Synced),
            })
        }
        OperationalType::AlwaysOn => Some(CommitmentState {
            commit: 1.0,
            startup: 0.0,
            shutdown: 0.0,
            synced: 1.0,
        }),
        OperationalType::Variable => None,
    }
}

/// The startup profile selected by a startup, if there was one
fn active_startup_type(
    generator: &Generator,
    solution: &Solution,
    tp: TimepointID,
) -> Option<usize> {
    (0..generator.num_startup_profiles())
        .map(|s| {
            let indicator = solution
                .value(&profile_indicator(generator, s, tp))
                .unwrap_or_default();
            (s, indicator)
        })
        .filter(|(_, indicator)| *indicator > INDICATOR_THRESHOLD)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(s, _)| s + 1)
}

/// Fuel burned by startups in a timepoint, weighted by the startup indicators
fn startup_fuel(generator: &Generator, solution: &Solution, tp: TimepointID) -> Fuel {
    generator
        .startup_profiles()
        .iter()
        .enumerate()
        .map(|(s, profile)| {
            let indicator = solution
                .value(&profile_indicator(generator, s, tp))
                .unwrap_or_default();
            FuelPerPower(profile.fuel.value() * indicator) * generator.capacity
        })
        .sum()
}

/// Per-generator, per-timepoint results in model order
pub fn generator_result_rows(model: &Model, solution: &Solution) -> Vec<GeneratorResultRow> {
    let mut rows = Vec::new();
    for generator in model.iter_generators() {
        let committable = generator.operational_type.is_committable();
        for tp in model.temporal.iter_ids() {
            let state = commitment_state(generator, solution, tp);
            rows.push(GeneratorResultRow {
                generator: generator.id.clone(),
                timepoint: tp,
                commit: state.map(|state| state.commit),
                startup: state.map(|state| state.startup),
                shutdown: state.map(|state| state.shutdown),
                synced: state.map(|state| state.synced),
                gross_power_mw: Power(solution.evaluate(&gross_power(generator, tp))),
                net_power_mw: Power(solution.evaluate(&net_power(generator, tp))),
                active_startup_type: if committable {
                    active_startup_type(generator, solution, tp)
                } else {
                    None
                },
                startup_fuel_mmbtu: if committable {
                    startup_fuel(generator, solution, tp)
                } else {
                    Fuel(0.0)
                },
            });
        }
    }

    rows
}

/// Boundary values for the next subproblem.
///
/// The final `default_linked_export_count` timepoints are exported. The last timepoint becomes
/// linked index 0, the one before it -1, and so on. Generators without commitment state carry
/// nothing across.
pub fn linked_boundary_rows(
    model: &Model,
    solution: &Solution,
) -> (Vec<LinkedBoundaryValue>, Vec<LinkedStartupValue>) {
    let ctx = BuildContext::new(model);
    let timepoints = model.temporal.iter_ids().collect::<Vec<_>>();
    let count = usize::try_from(model.parameters.default_linked_export_count)
        .map_or(timepoints.len(), |c| c.min(timepoints.len()));
    let exported = &timepoints[timepoints.len() - count..];

    let mut values = Vec::new();
    let mut startups = Vec::new();
    for generator in model.iter_generators() {
        if generator.operational_type == OperationalType::Variable {
            continue;
        }

        for (linked_timepoint, tp) in (0..).zip(exported.iter().rev().copied()) {
            let linked_timepoint: i32 = -linked_timepoint;
            let Some(state) = commitment_state(generator, solution, tp) else {
                continue;
            };
            let value = |variable| {
                solution
                    .value(&VariableKey::generator(&generator.id, variable, tp))
                    .unwrap_or_default()
            };
            let duration = model.temporal.duration(tp);

            values.push(LinkedBoundaryValue {
                generator: generator.id.clone(),
                linked_timepoint,
                commit: state.commit,
                startup: state.startup,
                shutdown: state.shutdown,
                power_above_pmin: Power(value(GeneratorVariable::PowerAbovePmin)),
                pmin: generator.pmin(tp),
                upward_reserves: Power(
                    solution.evaluate(&ctx.reserves(generator, ReserveDirection::Up, tp)),
                ),
                downward_reserves: Power(
                    solution.evaluate(&ctx.reserves(generator, ReserveDirection::Down, tp)),
                ),
                ramp_up_limit: generator.ramp_up_limit(duration),
                ramp_down_limit: generator.ramp_down_limit(duration),
                shutdown_power: Power(value(GeneratorVariable::ShutdownPower)),
                shutdown_ramp_limit: generator.shutdown_ramp_limit(duration),
            });

            if !generator.operational_type.is_committable() {
                continue;
            }
            for (s, profile) in generator.startup_profiles().iter().enumerate() {
                startups.push(LinkedStartupValue {
                    generator: generator.id.clone(),
                    linked_timepoint,
                    startup_type: s + 1,
                    startup_power: Power(value(GeneratorVariable::StartupPower(s))),
                    startup_ramp_limit: profile.ramp_rate.limit_over(duration, generator.capacity),
                });
            }
        }
    }

    (values, startups)
}

/// Writes results to CSV files in an output folder
pub struct DataWriter {
    generator_writer: csv::Writer<File>,
    linked_boundary_writer: csv::Writer<File>,
    linked_startup_writer: csv::Writer<File>,
    constraints_writer: Option<BufWriter<File>>,
}

impl DataWriter {
    /// Open a new set of output files.
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `settings` - Program settings; `write_constraints` adds a listing of every constraint
    pub fn create(output_path: &Path, settings: &Settings) -> Result<Self> {
        let new_csv_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };
        let constraints_writer = if settings.write_constraints {
            let file_path = output_path.join(CONSTRAINTS_FILE_NAME);
            let file = File::create(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        Ok(Self {
            generator_writer: new_csv_writer(GENERATOR_RESULTS_FILE_NAME)?,
            linked_boundary_writer: new_csv_writer(LINKED_BOUNDARY_FILE_NAME)?,
            linked_startup_writer: new_csv_writer(LINKED_STARTUP_FILE_NAME)?,
            constraints_writer,
        })
    }

    /// Write per-generator results
    pub fn write_generator_results<'a, I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a GeneratorResultRow>,
    {
        for row in rows {
            self.generator_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write linked boundary values for the next subproblem
    pub fn write_linked_boundary(
        &mut self,
        values: &[LinkedBoundaryValue],
        startups: &[LinkedStartupValue],
    ) -> Result<()> {
        for value in values {
            self.linked_boundary_writer.serialize(value)?;
        }
        for startup in startups {
            self.linked_startup_writer.serialize(startup)?;
        }

        Ok(())
    }

    /// Write every constraint in human-readable form, if enabled
    pub fn write_constraints(&mut self, system: &ConstraintSystem) -> Result<()> {
        let Some(writer) = &mut self.constraints_writer else {
            return Ok(());
        };

        for (key, _) in system.iter_constraints() {
            if let Some(line) = system.format_constraint(key) {
                writeln!(writer, "{line}")?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.generator_writer.flush()?;
        self.linked_boundary_writer.flush()?;
        self.linked_startup_writer.flush()?;
        if let Some(writer) = &mut self.constraints_writer {
            writer.flush()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{commit_generator, linked_data, model_with, temporal_index};
    use crate::linked::LinkedBoundaryData;
    use crate::optimisation::build_system;
    use crate::optimisation::solve::solve;
    use crate::temporal::Boundary;
    use rstest::rstest;
    use std::fs::read_to_string;
    use tempfile::tempdir;

    #[rstest]
    #[case(1, vec![0])]
    #[case(2, vec![0, -1])]
    #[case(10, vec![0, -1, -2])]
    fn test_linked_export_count(
        commit_generator: Generator,
        #[case] count: u32,
        #[case] expected: Vec<i32>,
    ) {
        let mut model = model_with(
            commit_generator,
            temporal_index(&[1.0; 3], Boundary::Circular, &[]),
            LinkedBoundaryData::default(),
        );
        model.parameters.default_linked_export_count = count;
        let (system, _) = build_system(&model).unwrap();
        let solution = solve(&system, &Settings::default()).unwrap();

        let (values, startups) = linked_boundary_rows(&model, &solution);
        assert_eq!(
            values.iter().map(|value| value.linked_timepoint).collect::<Vec<_>>(),
            expected
        );
        assert_eq!(startups.len(), expected.len());
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results").join("run1");
        create_output_directory(&output_dir).unwrap();
        assert!(output_dir.is_dir());
        create_output_directory(&output_dir).unwrap();
    }

    #[test]
    fn test_write_linked_boundary() {
        let data = linked_data(&[0, -1], 1);
        let values = [0, -1].map(|idx| data.value(&"gen1".into(), idx).unwrap().clone());
        let startups = [0, -1].map(|idx| data.startup(&"gen1".into(), idx, 0).unwrap().clone());

        let dir = tempdir().unwrap();
        {
            let mut writer = DataWriter::create(dir.path(), &Settings::default()).unwrap();
            writer.write_linked_boundary(&values, &startups).unwrap();
            writer.flush().unwrap();
        }
        assert!(!dir.path().join(CONSTRAINTS_FILE_NAME).exists());

        // The files can be read back as input to the next subproblem
        let read_values: Vec<LinkedBoundaryValue> =
            csv::Reader::from_path(dir.path().join(LINKED_BOUNDARY_FILE_NAME))
                .unwrap()
                .into_deserialize()
                .collect::<Result<_, _>>()
                .unwrap();
        let read_startups: Vec<LinkedStartupValue> =
            csv::Reader::from_path(dir.path().join(LINKED_STARTUP_FILE_NAME))
                .unwrap()
                .into_deserialize()
                .collect::<Result<_, _>>()
                .unwrap();
        assert_eq!(
            LinkedBoundaryData::from_rows(read_values, read_startups).unwrap(),
            data
        );
    }

    #[test]
    fn test_write_constraints() {
        let model = model_with(
            commit_generator(crate::fixture::balancing_type()),
            temporal_index(&[1.0; 2], Boundary::Linear, &[]),
            LinkedBoundaryData::default(),
        );
        let (system, _) = build_system(&model).unwrap();

        let dir = tempdir().unwrap();
        {
            let settings = Settings {
                write_constraints: true,
                ..Default::default()
            };
            let mut writer = DataWriter::create(dir.path(), &settings).unwrap();
            writer.write_constraints(&system).unwrap();
            writer.flush().unwrap();
        }
        let contents = read_to_string(dir.path().join(CONSTRAINTS_FILE_NAME)).unwrap();
        assert_eq!(contents.lines().count(), system.num_constraints());
        assert!(contents.contains("CommitTransition[gen1,2]:"));
    }
}
