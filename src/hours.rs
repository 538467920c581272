use std::collections::HashMap;

use indexmap::IndexMap;

use crate::config::{ProgramHoursConfig, SubjectHours};
use crate::models::ProgramId;
use crate::normalize::normalize;
use crate::program::is_global;

const ESO_DEFAULT_HOURS: f64 = 1080.0;
const BATX_DEFAULT_HOURS: f64 = 1020.0;

/// Two-stage subject matcher: exact normalized name, then substring containment
/// in either direction. The first configured subject in file order wins.
#[derive(Debug, Clone)]
pub struct SubjectMatcher {
    entries: IndexMap<String, f64>,
    normalize: fn(&str) -> String,
}

impl SubjectMatcher {
    pub fn new(table: &SubjectHours, normalize: fn(&str) -> String) -> Self {
        let mut entries = IndexMap::with_capacity(table.len());
        for (subject, &hours) in table {
            let key = normalize(subject);
            // An empty key would be contained in every subject.
            if key.is_empty() {
                tracing::warn!(subject = %subject, "ignoring subject with an empty normalized name");
                continue;
            }
            // Later duplicates overwrite the value but keep the first position.
            entries.insert(key, hours);
        }
        Self { entries, normalize }
    }

    pub fn lookup(&self, subject: &str) -> Option<f64> {
        let wanted = (self.normalize)(subject);
        if let Some(&hours) = self.entries.get(&wanted) {
            return Some(hours);
        }
        if wanted.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(configured, _)| configured.contains(&wanted) || wanted.contains(configured.as_str()))
            .map(|(_, &hours)| hours)
    }
}

/// Total instructional hours per program and subject for one run.
#[derive(Debug, Clone)]
pub struct HoursLookup<'a> {
    config: &'a ProgramHoursConfig,
    matchers: HashMap<&'a str, SubjectMatcher>,
}

impl<'a> HoursLookup<'a> {
    pub fn new(config: &'a ProgramHoursConfig) -> Self {
        let matchers = config
            .program_ids()
            .filter_map(|id| {
                config
                    .program_hours(id)
                    .map(|table| (id, SubjectMatcher::new(table, normalize)))
            })
            .collect();
        Self { config, matchers }
    }

    /// Hours used as the percentage basis. `0.0` means nothing is configured.
    pub fn total_hours(&self, program: &ProgramId, subject: &str) -> f64 {
        if is_global(program) {
            return self.program_total(program);
        }
        self.matchers
            .get(program.as_str())
            .and_then(|matcher| matcher.lookup(subject))
            .unwrap_or(0.0)
    }

    /// Whole-program hours for a global program: the configured table sum,
    /// or the stage default when the program is not configured.
    pub fn program_total(&self, program: &ProgramId) -> f64 {
        match self.config.program_hours(program.as_str()) {
            Some(table) if !table.is_empty() => table.values().sum(),
            _ => global_default_hours(program),
        }
    }
}

fn global_default_hours(program: &ProgramId) -> f64 {
    match program.as_str() {
        "3 ESO" | "4 ESO" => ESO_DEFAULT_HOURS,
        "1 BATX" | "2 BATX" => BATX_DEFAULT_HOURS,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_hours(program: &ProgramId, subject: &str, config: &ProgramHoursConfig) -> f64 {
        HoursLookup::new(config).total_hours(program, subject)
    }

    fn config() -> ProgramHoursConfig {
        ProgramHoursConfig::from_tables(&[
            ("CFGM-A", &[("Matemàtiques", 10.0)]),
            (
                "SMX",
                &[
                    ("0221. Muntatge i manteniment d’equips", 132.0),
                    ("0222. Sistemes operatius monolloc", 165.0),
                    ("0223. Aplicacions ofimàtiques", 198.0),
                ],
            ),
            ("PFIPER", &[("Perruqueria", 400.0), ("Formació bàsica", 200.0)]),
            ("1 BATX", &[("Matemàtiques", 140.0), ("Català", 105.0)]),
        ])
    }

    #[test]
    fn exact_match_after_normalizing_both_sides() {
        let config = config();
        let smx = ProgramId::new("SMX");
        assert_eq!(total_hours(&smx, "Sistemes operatius monolloc", &config), 165.0);
        assert_eq!(
            total_hours(&smx, "MP0221 Muntatge i manteniment d'equips", &config),
            132.0
        );
        assert_eq!(
            total_hours(&ProgramId::new("CFGM-A"), "0633. Matemàtiques", &config),
            10.0
        );
    }

    #[test]
    fn falls_back_to_substring_containment() {
        let config = config();
        let smx = ProgramId::new("SMX");
        // Input shorter than the configured name.
        assert_eq!(total_hours(&smx, "Aplicacions", &config), 198.0);
        // Configured name inside a longer input.
        assert_eq!(
            total_hours(&smx, "Sistemes operatius monolloc (UF1-UF3)", &config),
            165.0
        );
    }

    #[test]
    fn ambiguous_fallback_takes_first_configured_subject() {
        let table: SubjectHours = [("Xarxes locals".to_string(), 10.0), ("Xarxes".to_string(), 20.0)]
            .into_iter()
            .collect();
        let matcher = SubjectMatcher::new(&table, normalize);
        assert_eq!(matcher.lookup("xarxes"), Some(20.0));
        assert_eq!(matcher.lookup("xar"), Some(10.0));
    }

    #[test]
    fn subjects_that_normalize_to_nothing_match_nothing() {
        let table: SubjectHours = [("0221.".to_string(), 10.0), ("Xarxes".to_string(), 20.0)]
            .into_iter()
            .collect();
        let matcher = SubjectMatcher::new(&table, normalize);
        assert_eq!(matcher.lookup("Cuina"), None);
        assert_eq!(matcher.lookup(""), None);
        assert_eq!(matcher.lookup("Xarxes locals"), Some(20.0));
    }

    #[test]
    fn matcher_uses_the_injected_normalization() {
        let table: SubjectHours = [("ABC".to_string(), 5.0)].into_iter().collect();
        let matcher = SubjectMatcher::new(&table, |s| s.to_string());
        assert_eq!(matcher.lookup("ABC"), Some(5.0));
        assert_eq!(matcher.lookup("abc"), None);
    }

    #[test]
    fn missing_configuration_yields_zero() {
        let config = config();
        assert_eq!(total_hours(&ProgramId::new("SMX"), "Cuina", &config), 0.0);
        assert_eq!(total_hours(&ProgramId::new("DAW"), "Bases de dades", &config), 0.0);
        assert_eq!(total_hours(&ProgramId::new("SMX"), "", &config), 0.0);
    }

    #[test]
    fn global_programs_use_the_program_total() {
        let config = config();
        let lookup = HoursLookup::new(&config);
        assert_eq!(lookup.total_hours(&ProgramId::new("PFIPER"), "anything"), 600.0);
        assert_eq!(lookup.total_hours(&ProgramId::new("1 BATX"), "Català"), 245.0);
    }

    #[test]
    fn unconfigured_global_programs_use_stage_defaults() {
        let config = config();
        let lookup = HoursLookup::new(&config);
        assert_eq!(lookup.program_total(&ProgramId::new("3 ESO")), 1080.0);
        assert_eq!(lookup.program_total(&ProgramId::new("4 ESO")), 1080.0);
        assert_eq!(lookup.program_total(&ProgramId::new("2 BATX")), 1020.0);
        assert_eq!(lookup.program_total(&ProgramId::new("PFICOM")), 0.0);
    }
}
