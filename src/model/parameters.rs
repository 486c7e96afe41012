//! Defines the `BuildParameters` struct, which represents the contents of `parameters.toml`.
use crate::input::{input_err_msg, read_toml};
use crate::units::MoneyPerEnergy;
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const BUILD_PARAMETERS_FILE_NAME: &str = "parameters.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_unit_param_default!(default_unserved_energy_penalty, MoneyPerEnergy, 99_999.0);
define_unit_param_default!(default_overgeneration_penalty, MoneyPerEnergy, 99_999.0);
define_unit_param_default!(default_reserve_shortfall_penalty, MoneyPerEnergy, 10_000.0);
define_param_default!(default_omit_nonbinding_ramps, bool, true);
define_param_default!(default_linked_export_count, u32, 1);

/// Parameters controlling how the constraint system is assembled
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct BuildParameters {
    /// Cost applied to each MWh of load which is not served
    #[serde(default = "default_unserved_energy_penalty")]
    pub unserved_energy_penalty: MoneyPerEnergy,
    /// Cost applied to each MWh of generation in excess of load
    #[serde(default = "default_overgeneration_penalty")]
    pub overgeneration_penalty: MoneyPerEnergy,
    /// Cost applied to each MWh of reserve requirement which is not met
    #[serde(default = "default_reserve_shortfall_penalty")]
    pub reserve_shortfall_penalty: MoneyPerEnergy,
    /// Leave out ramp constraints whose limit spans the whole operating range
    #[serde(default = "default_omit_nonbinding_ramps")]
    pub omit_nonbinding_ramps: bool,
    /// How many final timepoints to export as linked boundary values
    #[serde(default = "default_linked_export_count")]
    pub default_linked_export_count: u32,
}

impl Default for BuildParameters {
    fn default() -> Self {
        Self {
            unserved_energy_penalty: default_unserved_energy_penalty(),
            overgeneration_penalty: default_overgeneration_penalty(),
            reserve_shortfall_penalty: default_reserve_shortfall_penalty(),
            omit_nonbinding_ramps: default_omit_nonbinding_ramps(),
            default_linked_export_count: default_linked_export_count(),
        }
    }
}

/// Check that a penalty is valid
fn check_penalty(name: &str, value: MoneyPerEnergy) -> Result<()> {
    ensure!(
        value.is_finite() && value > MoneyPerEnergy(0.0),
        "{name} must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `default_linked_export_count` parameter is valid
fn check_linked_export_count(value: u32) -> Result<()> {
    ensure!(value > 0, "default_linked_export_count cannot be zero");

    Ok(())
}

impl BuildParameters {
    /// Read build parameters from the specified directory.
    ///
    /// If the file is not present, default values are used.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The file contents as a [`BuildParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<BuildParameters> {
        let file_path = model_dir.as_ref().join(BUILD_PARAMETERS_FILE_NAME);
        if !file_path.is_file() {
            return Ok(BuildParameters::default());
        }

        let params: BuildParameters = read_toml(&file_path)?;
        params
            .validate()
            .with_context(|| input_err_msg(&file_path))?;

        Ok(params)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        check_penalty("unserved_energy_penalty", self.unserved_energy_penalty)?;
        check_penalty("overgeneration_penalty", self.overgeneration_penalty)?;
        check_penalty("reserve_shortfall_penalty", self.reserve_shortfall_penalty)?;
        check_linked_export_count(self.default_linked_export_count)?;

        if !self.omit_nonbinding_ramps {
            warn!(
                "omit_nonbinding_ramps is disabled; ramp constraints will be generated even where \
                they cannot bind"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_from_path_no_file() {
        let dir = tempdir().unwrap();
        assert_eq!(
            BuildParameters::from_path(dir.path()).unwrap(),
            BuildParameters::default()
        );
    }

    #[test]
    fn test_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(BUILD_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "omit_nonbinding_ramps = false\nunserved_energy_penalty = 500.0"
            )
            .unwrap();
        }

        let params = BuildParameters::from_path(dir.path()).unwrap();
        assert!(!params.omit_nonbinding_ramps);
        assert_eq!(params.unserved_energy_penalty, MoneyPerEnergy(500.0));
        assert_eq!(
            params.overgeneration_penalty,
            default_overgeneration_penalty()
        );
    }

    #[test]
    fn test_from_path_invalid() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(BUILD_PARAMETERS_FILE_NAME);
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "default_linked_export_count = 0").unwrap();
        }

        let err = BuildParameters::from_path(dir.path()).unwrap_err();
        assert_eq!(err.to_string(), input_err_msg(&file_path));
        assert_eq!(
            err.root_cause().to_string(),
            "default_linked_export_count cannot be zero"
        );
    }

    #[rstest]
    #[case(1.0, true)]
    #[case(1e9, true)]
    #[case(0.0, false)]
    #[case(-1.0, false)]
    #[case(f64::INFINITY, false)]
    #[case(f64::NAN, false)]
    fn test_check_penalty(#[case] value: f64, #[case] expected_valid: bool) {
        let result = check_penalty("penalty", MoneyPerEnergy::new(value));
        assert_eq!(result.is_ok(), expected_valid);
        if let Err(err) = result {
            assert_eq!(
                err.to_string(),
                "penalty must be a finite number greater than zero"
            );
        }
    }
}
