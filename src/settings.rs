//! Program settings, read from `settings.toml` in the user's configuration folder.
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Name of the folder holding configuration inside the platform's config directory
const CONFIG_DIR_NAME: &str = "unitcommit";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# Program settings for unitcommit
# Uncomment a line to change the setting from its default.
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// The folder in which configuration files are kept
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(CONFIG_DIR_NAME);

    path
}

/// Path to the settings file
pub fn get_settings_file_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILE_NAME)
}

/// Program settings
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The program log level (error, warn, info, debug, trace or off)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to show the solver's own log output
    #[serde(default)]
    pub solver_log: bool,
    /// Whether to write every assembled constraint to a text file alongside the results
    #[serde(default)]
    pub write_constraints: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            solver_log: false,
            write_constraints: false,
        }
    }
}

impl Settings {
    /// Read settings from the user's configuration folder, using defaults if there is no file
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read settings from the given file, using defaults if it does not exist
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// Contents of a settings file with every setting commented out and documented
    pub fn default_file_contents() -> Result<String> {
        let settings_raw = toml::to_string(&Settings::default())?;

        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };

            let docs = Settings::get_field_docs(field.trim())?;
            for doc_line in docs.lines() {
                write!(&mut out, "\n# # {}\n", doc_line.trim())?;
            }
            writeln!(&mut out, "# {}", line.trim())?;
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_path_no_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);
        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "log_level = \"warn\"\nwrite_constraints = true").unwrap();
        }

        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings {
                log_level: "warn".to_string(),
                solver_log: false,
                write_constraints: true,
            }
        );
    }

    #[test]
    fn test_default_file_contents() {
        let contents = Settings::default_file_contents().unwrap();
        assert!(contents.contains("# log_level = \"info\""));
        assert!(contents.contains("# # Whether to show the solver's own log output"));
    }

    #[test]
    fn test_config_dir() {
        assert!(get_settings_file_path().ends_with("unitcommit/settings.toml"));
    }
}
