use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_HOURS_CONFIG: &str = "modules_config.json";

/// Configured hours per subject, in file order.
pub type SubjectHours = IndexMap<String, f64>;

/// Per-program subject hours, read once per run and never mutated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ProgramHoursConfig {
    programs: IndexMap<String, SubjectHours>,
}

impl ProgramHoursConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            programs = config.programs.len(),
            "loaded hours config"
        );
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (program, subjects) in &self.programs {
            for (subject, &hours) in subjects {
                if !hours.is_finite() || hours <= 0.0 {
                    return Err(ConfigError::InvalidHours {
                        program: program.clone(),
                        subject: subject.clone(),
                        hours,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn program_ids(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn program_hours(&self, program_id: &str) -> Option<&SubjectHours> {
        self.programs.get(program_id)
    }
}

#[cfg(test)]
impl ProgramHoursConfig {
    pub fn from_tables(tables: &[(&str, &[(&str, f64)])]) -> Self {
        let programs = tables
            .iter()
            .map(|(program, subjects)| {
                let hours = subjects
                    .iter()
                    .map(|(subject, hours)| (subject.to_string(), *hours))
                    .collect();
                (program.to_string(), hours)
            })
            .collect();
        Self { programs }
    }
}

/// Process settings taken from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub hours_config: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            hours_config: std::env::var("HOURS_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_HOURS_CONFIG)),
        }
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingEnv("DATABASE_URL"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    const SAMPLE: &str = r#"{
        "SMX": {"0221. Muntatge": 132, "0222. Sistemes operatius": 165},
        "CFGM-A": {"Matemàtiques": 10.5}
    }"#;

    #[test]
    fn parses_programs_in_file_order() {
        let config = ProgramHoursConfig::from_json_str(SAMPLE).unwrap();
        let ids: Vec<&str> = config.program_ids().collect();
        assert_eq!(ids, vec!["SMX", "CFGM-A"]);

        let smx = config.program_hours("SMX").unwrap();
        let subjects: Vec<&String> = smx.keys().collect();
        assert_eq!(subjects, vec!["0221. Muntatge", "0222. Sistemes operatius"]);
        assert_eq!(config.program_hours("CFGM-A").unwrap()["Matemàtiques"], 10.5);
        assert!(config.program_hours("DAW").is_none());
    }

    #[test]
    fn rejects_non_positive_hours() {
        let err = ProgramHoursConfig::from_json_str(r#"{"SMX": {"Muntatge": 0}}"#).unwrap_err();
        assert_matches!(err, ConfigError::InvalidHours { ref program, .. } if program == "SMX");
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ProgramHoursConfig::from_json_str(r#"{"SMX": ["Muntatge"]}"#).unwrap_err();
        assert_matches!(err, ConfigError::Parse(_));
    }

    #[test]
    fn missing_file_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProgramHoursConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert_matches!(err, ConfigError::Read { .. });
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ProgramHoursConfig::load(file.path()).unwrap();
        assert_eq!(config.program_ids().count(), 2);
    }
}
