use std::fmt;
use std::str::FromStr;

/// Delays weigh one third of an absence.
pub const DELAY_WEIGHT_DIVISOR: f64 = 3.0;

/// Subject marker used for whole-program (global) aggregates.
pub const GLOBAL_SUBJECT: &str = "GLOBAL";

pub const UNKNOWN_PROGRAM: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceCode {
    AbsenceUnjustified,
    AbsenceJustified,
    AbsenceJustifiedPending,
    DelayUnjustified,
    DelayJustified,
    DelayJustifiedPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Absence,
    Delay,
}

impl AttendanceCode {
    pub fn kind(self) -> CodeKind {
        match self {
            AttendanceCode::AbsenceUnjustified
            | AttendanceCode::AbsenceJustified
            | AttendanceCode::AbsenceJustifiedPending => CodeKind::Absence,
            AttendanceCode::DelayUnjustified
            | AttendanceCode::DelayJustified
            | AttendanceCode::DelayJustifiedPending => CodeKind::Delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCode(pub String);

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised attendance code {:?}", self.0)
    }
}

impl FromStr for AttendanceCode {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "F" => Ok(AttendanceCode::AbsenceUnjustified),
            "FJ" => Ok(AttendanceCode::AbsenceJustified),
            "FJP" => Ok(AttendanceCode::AbsenceJustifiedPending),
            "R" => Ok(AttendanceCode::DelayUnjustified),
            "RJ" => Ok(AttendanceCode::DelayJustified),
            "RJP" => Ok(AttendanceCode::DelayJustifiedPending),
            other => Err(UnknownCode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEvent {
    pub student: String,
    pub subject: String,
    pub group: String,
    pub code: AttendanceCode,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(String);

impl ProgramId {
    pub fn new(id: impl Into<String>) -> Self {
        ProgramId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn effective_hours(absence_hours: f64, delay_hours: f64) -> f64 {
    absence_hours + delay_hours / DELAY_WEIGHT_DIVISOR
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectAggregate {
    pub student: String,
    pub subject: String,
    pub group: String,
    pub absence_hours: f64,
    pub delay_hours: f64,
}

impl SubjectAggregate {
    pub fn effective_hours(&self) -> f64 {
        effective_hours(self.absence_hours, self.delay_hours)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalAggregate {
    pub student: String,
    pub group: String,
    pub program: ProgramId,
    pub absence_hours: f64,
    pub delay_hours: f64,
}

impl GlobalAggregate {
    pub fn effective_hours(&self) -> f64 {
        effective_hours(self.absence_hours, self.delay_hours)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    None,
    Tier15,
    Tier25,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::None => "-",
            Tier::Tier15 => "15%",
            Tier::Tier25 => "25%",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningScope {
    Subject,
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarningRecord {
    pub student: String,
    pub subject: String,
    pub group: String,
    pub program: ProgramId,
    pub scope: WarningScope,
    pub absence_hours: f64,
    pub delay_hours: f64,
    pub effective_hours: f64,
    pub total_hours: f64,
    pub percentage: f64,
    pub tier: Tier,
}

impl WarningRecord {
    /// Join key between a warning and its stored notification state.
    pub fn warning_id(&self) -> String {
        format!("{}_{}_{}", self.student, self.subject, self.tier.label())
    }

    pub fn percentage_label(&self) -> String {
        format_percentage(self.percentage)
    }

    pub fn subject_label(&self) -> &str {
        match self.scope {
            WarningScope::Subject => &self.subject,
            WarningScope::Global => "whole course",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub student: String,
    pub program: Option<ProgramId>,
    pub group: String,
    pub subject: String,
    pub total_hours: f64,
    pub absence_hours: f64,
    pub delay_hours: f64,
    pub effective_hours: f64,
    pub percentage: f64,
}

impl SummaryRow {
    pub fn program_label(&self) -> &str {
        self.program
            .as_ref()
            .map(ProgramId::as_str)
            .unwrap_or(UNKNOWN_PROGRAM)
    }
}

#[derive(Debug, Clone)]
pub struct TierSummary {
    pub tier: Tier,
    pub count: usize,
    pub avg_percentage: f64,
}

pub fn format_percentage(percentage: f64) -> String {
    format!("{percentage:.1}%")
}

pub fn format_hours(hours: f64) -> String {
    format!("{hours:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_parse_after_trimming() {
        assert_eq!(" F ".parse(), Ok(AttendanceCode::AbsenceUnjustified));
        assert_eq!("RJP".parse(), Ok(AttendanceCode::DelayJustifiedPending));
        assert_eq!(
            "X".parse::<AttendanceCode>(),
            Err(UnknownCode("X".to_string()))
        );
    }

    #[test]
    fn codes_split_into_absences_and_delays() {
        assert_eq!(AttendanceCode::AbsenceJustified.kind(), CodeKind::Absence);
        assert_eq!(AttendanceCode::DelayJustified.kind(), CodeKind::Delay);
    }

    #[test]
    fn delays_count_one_third() {
        assert_eq!(effective_hours(1.0, 3.0), 2.0);
        assert_eq!(effective_hours(0.0, 0.0), 0.0);
        assert_eq!(effective_hours(4.5, 1.5), 4.5 + 1.5 / 3.0);
    }

    #[test]
    fn warning_id_joins_student_subject_and_tier() {
        let warning = WarningRecord {
            student: "Anna".to_string(),
            subject: "Matemàtiques".to_string(),
            group: "1CFGM-A".to_string(),
            program: ProgramId::new("CFGM-A"),
            scope: WarningScope::Subject,
            absence_hours: 3.0,
            delay_hours: 0.0,
            effective_hours: 3.0,
            total_hours: 10.0,
            percentage: 30.0,
            tier: Tier::Tier25,
        };
        assert_eq!(warning.warning_id(), "Anna_Matemàtiques_25%");
        assert_eq!(warning.percentage_label(), "30.0%");
        assert_eq!(warning.subject_label(), "Matemàtiques");
    }

    #[test]
    fn tiers_are_ordered_by_severity() {
        assert!(Tier::None < Tier::Tier15);
        assert!(Tier::Tier15 < Tier::Tier25);
    }
}
