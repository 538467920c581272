use crate::aggregate::{aggregate, aggregate_global};
use crate::config::ProgramHoursConfig;
use crate::hours::HoursLookup;
use crate::models::{
    AttendanceEvent, SummaryRow, Tier, WarningRecord, WarningScope, GLOBAL_SUBJECT,
};
use crate::program::{is_global, ProgramResolver};

pub const TIER_15_THRESHOLD: f64 = 15.0;
pub const TIER_25_THRESHOLD: f64 = 25.0;

/// Percentage of `total_hours` missed and the tier it falls in.
/// Thresholds are inclusive; a non-positive total means "not configured".
pub fn classify(effective_hours: f64, total_hours: f64) -> (f64, Tier) {
    if total_hours <= 0.0 {
        return (0.0, Tier::None);
    }

    let percentage = effective_hours / total_hours * 100.0;
    let tier = if percentage >= TIER_25_THRESHOLD {
        Tier::Tier25
    } else if percentage >= TIER_15_THRESHOLD {
        Tier::Tier15
    } else {
        Tier::None
    };
    (percentage, tier)
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub warnings: Vec<WarningRecord>,
    pub summary: Vec<SummaryRow>,
}

/// Runs the whole pipeline over one export snapshot.
pub fn evaluate(events: &[AttendanceEvent], config: &ProgramHoursConfig) -> Evaluation {
    let resolver = ProgramResolver::new(config.program_ids());
    let lookup = HoursLookup::new(config);
    let mut evaluation = Evaluation::default();

    for aggregate in aggregate(events) {
        let program = resolver.resolve(&aggregate.group);
        let total_hours = match &program {
            Some(program) => lookup.total_hours(program, &aggregate.subject),
            None => {
                tracing::warn!(group = %aggregate.group, "no program matches group");
                0.0
            }
        };
        let effective = aggregate.effective_hours();
        let (percentage, tier) = classify(effective, total_hours);

        evaluation.summary.push(SummaryRow {
            student: aggregate.student.clone(),
            program: program.clone(),
            group: aggregate.group.clone(),
            subject: aggregate.subject.clone(),
            total_hours,
            absence_hours: aggregate.absence_hours,
            delay_hours: aggregate.delay_hours,
            effective_hours: effective,
            percentage,
        });

        // Global programs are classified once per (student, group) below.
        let Some(program) = program.filter(|p| !is_global(p)) else {
            continue;
        };
        if total_hours <= 0.0 {
            tracing::warn!(
                program = %program,
                subject = %aggregate.subject,
                "no hours configured for subject"
            );
            continue;
        }
        if tier == Tier::None {
            continue;
        }

        evaluation.warnings.push(WarningRecord {
            student: aggregate.student,
            subject: aggregate.subject,
            group: aggregate.group,
            program,
            scope: WarningScope::Subject,
            absence_hours: aggregate.absence_hours,
            delay_hours: aggregate.delay_hours,
            effective_hours: effective,
            total_hours,
            percentage,
            tier,
        });
    }

    for global in aggregate_global(events, &resolver) {
        let total_hours = lookup.program_total(&global.program);
        let effective = global.effective_hours();
        let (percentage, tier) = classify(effective, total_hours);
        if total_hours <= 0.0 {
            tracing::warn!(program = %global.program, "no total hours for global program");
        }

        evaluation.summary.push(SummaryRow {
            student: global.student.clone(),
            program: Some(global.program.clone()),
            group: global.group.clone(),
            subject: GLOBAL_SUBJECT.to_string(),
            total_hours,
            absence_hours: global.absence_hours,
            delay_hours: global.delay_hours,
            effective_hours: effective,
            percentage,
        });

        if tier == Tier::None {
            continue;
        }

        evaluation.warnings.push(WarningRecord {
            student: global.student,
            subject: GLOBAL_SUBJECT.to_string(),
            group: global.group,
            program: global.program,
            scope: WarningScope::Global,
            absence_hours: global.absence_hours,
            delay_hours: global.delay_hours,
            effective_hours: effective,
            total_hours,
            percentage,
            tier,
        });
    }

    tracing::info!(
        events = events.len(),
        summary_rows = evaluation.summary.len(),
        warnings = evaluation.warnings.len(),
        "evaluated attendance"
    );
    evaluation
}
