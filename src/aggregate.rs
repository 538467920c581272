use std::collections::{BTreeMap, HashMap};

use crate::models::{AttendanceEvent, CodeKind, GlobalAggregate, ProgramId, SubjectAggregate};
use crate::program::{is_global, ProgramResolver};

/// Spreadsheet label for generic cross-subject projects.
pub const GENERIC_PROJECT_SUBJECT: &str = "Mòdul projecte";
pub const INTERMODULAR_PROJECT_SUBJECT: &str = "Projecte intermodular";

/// EB and PER groups record the intermodular project under two labels.
pub fn canonical_subject<'a>(group: &str, subject: &'a str) -> &'a str {
    if (group.contains("EB") || group.contains("PER")) && subject == GENERIC_PROJECT_SUBJECT {
        INTERMODULAR_PROJECT_SUBJECT
    } else {
        subject
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    absence_hours: f64,
    delay_hours: f64,
}

impl Totals {
    fn add(&mut self, event: &AttendanceEvent) {
        match event.code.kind() {
            CodeKind::Absence => self.absence_hours += event.duration_hours,
            CodeKind::Delay => self.delay_hours += event.duration_hours,
        }
    }
}

/// Sums hours per (student, subject, group), sorted by that key.
pub fn aggregate(events: &[AttendanceEvent]) -> Vec<SubjectAggregate> {
    let mut buckets: BTreeMap<(String, String, String), Totals> = BTreeMap::new();

    for event in events {
        let subject = canonical_subject(&event.group, &event.subject);
        buckets
            .entry((
                event.student.clone(),
                subject.to_string(),
                event.group.clone(),
            ))
            .or_default()
            .add(event);
    }

    buckets
        .into_iter()
        .map(|((student, subject, group), totals)| SubjectAggregate {
            student,
            subject,
            group,
            absence_hours: totals.absence_hours,
            delay_hours: totals.delay_hours,
        })
        .collect()
}

/// Sums hours per (student, group) across all subjects, for groups whose
/// program is global. Sorted by (student, group).
pub fn aggregate_global(
    events: &[AttendanceEvent],
    resolver: &ProgramResolver,
) -> Vec<GlobalAggregate> {
    let mut programs: HashMap<&str, Option<ProgramId>> = HashMap::new();
    let mut buckets: BTreeMap<(String, String), (ProgramId, Totals)> = BTreeMap::new();

    for event in events {
        let program = programs
            .entry(event.group.as_str())
            .or_insert_with(|| resolver.resolve(&event.group).filter(is_global));
        let Some(program) = program else {
            continue;
        };

        buckets
            .entry((event.student.clone(), event.group.clone()))
            .or_insert_with(|| (program.clone(), Totals::default()))
            .1
            .add(event);
    }

    buckets
        .into_iter()
        .map(|((student, group), (program, totals))| GlobalAggregate {
            student,
            group,
            program,
            absence_hours: totals.absence_hours,
            delay_hours: totals.delay_hours,
        })
        .collect()
}
