use std::io;
use std::path::Path;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::error::ImportError;
use crate::models::{AttendanceCode, AttendanceEvent};

/// One row of the incident export, as named in its header.
#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(rename = "Alumne/a")]
    student: String,
    #[serde(rename = "Assignatura")]
    subject: String,
    #[serde(rename = "Grup", alias = "Grup (incidència)")]
    group: String,
    #[serde(rename = "Tipus")]
    code: String,
    #[serde(rename = "Hora", default)]
    time_range: Option<String>,
}

pub fn read_events(path: &Path) -> Result<Vec<AttendanceEvent>, ImportError> {
    let file = std::fs::File::open(path).map_err(|err| ImportError::Read {
        path: path.to_path_buf(),
        source: err.into(),
    })?;
    let events = events_from_reader(file)?;
    tracing::info!(path = %path.display(), events = events.len(), "read attendance export");
    Ok(events)
}

pub fn events_from_reader<R: io::Read>(reader: R) -> Result<Vec<AttendanceEvent>, ImportError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut events = Vec::new();

    for (index, result) in reader.deserialize::<ExportRow>().enumerate() {
        let row = result.map_err(|source| ImportError::Row {
            // Records can span lines; only count them when the reader has no position.
            line: source
                .position()
                .map(|pos| pos.line())
                .unwrap_or(index as u64 + 2),
            source,
        })?;
        if let Some(event) = into_event(row) {
            events.push(event);
        }
    }

    Ok(events)
}

fn into_event(row: ExportRow) -> Option<AttendanceEvent> {
    let code = match row.code.parse::<AttendanceCode>() {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(student = %row.student, "skipping row: {err}");
            return None;
        }
    };

    if row.student.trim().is_empty() || row.subject.trim().is_empty() {
        tracing::debug!(group = %row.group, "skipping row without student or subject");
        return None;
    }

    let duration_hours = row.time_range.as_deref().map(duration_hours).unwrap_or(0.0);

    Some(AttendanceEvent {
        student: row.student.trim().to_string(),
        subject: row.subject.trim().to_string(),
        group: row.group.trim().to_string(),
        code,
        duration_hours,
    })
}

/// Hours between the two ends of an `"HH:MM-HH:MM"` range.
/// Anything unparseable, or a range that ends before it starts, counts as zero.
pub fn duration_hours(range: &str) -> f64 {
    let Some((start, end)) = range.split_once('-') else {
        return 0.0;
    };
    let (Ok(start), Ok(end)) = (
        NaiveTime::parse_from_str(start.trim(), "%H:%M"),
        NaiveTime::parse_from_str(end.trim(), "%H:%M"),
    ) else {
        tracing::debug!(range, "unparseable time range");
        return 0.0;
    };
    if end < start {
        tracing::debug!(range, "time range ends before it starts");
        return 0.0;
    }
    (end - start).num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_simple_ranges() {
        assert_eq!(duration_hours("08:00-09:00"), 1.0);
        assert_eq!(duration_hours(" 10:30 - 12:00 "), 1.5);
        assert_eq!(duration_hours("15:00-15:20"), 20.0 / 60.0);
    }

    #[test]
    fn malformed_ranges_count_as_zero() {
        for range in ["", "08:00", "matí", "08:00-", "25:00-26:00", "08:00-09:00-10:00", "ab:cd-ef:gh"] {
            assert_eq!(duration_hours(range), 0.0, "range {range:?}");
        }
    }

    #[test]
    fn reversed_ranges_count_as_zero() {
        assert_eq!(duration_hours("12:00-11:00"), 0.0);
    }

    #[test]
    fn reads_fixed_schema_rows() {
        let data = "\
Alumne/a,Assignatura,Grup,Tipus,Hora,Observacions
Anna Puig,0633. Matemàtiques,1CFGM-A ,F,08:00-11:00,
Anna Puig,0633. Matemàtiques,1CFGM-A,R,11:00-11:30,tard
Anna Puig,0633. Matemàtiques,1CFGM-A,P,11:30-12:30,present
Bernat Soler,Anglès,1CFGM-A, FJ ,,
";
        let events = events_from_reader(data.as_bytes()).unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].student, "Anna Puig");
        assert_eq!(events[0].group, "1CFGM-A");
        assert_eq!(events[0].code, AttendanceCode::AbsenceUnjustified);
        assert_eq!(events[0].duration_hours, 3.0);

        assert_eq!(events[1].code, AttendanceCode::DelayUnjustified);
        assert_eq!(events[1].duration_hours, 0.5);

        assert_eq!(events[2].code, AttendanceCode::AbsenceJustified);
        assert_eq!(events[2].duration_hours, 0.0);
    }

    #[test]
    fn accepts_the_incident_group_header() {
        let data = "\
Alumne/a,Assignatura,Grup (incidència),Tipus,Hora
Laia,Català,3 ESO A,F,09:00-10:00
";
        let events = events_from_reader(data.as_bytes()).unwrap();
        assert_eq!(events[0].group, "3 ESO A");
    }

    #[test]
    fn skips_rows_without_student_or_subject() {
        let data = "\
Alumne/a,Assignatura,Grup,Tipus,Hora
,Català,3 ESO A,F,09:00-10:00
Laia,,3 ESO A,F,09:00-10:00
";
        assert!(events_from_reader(data.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let data = "\
Alumne/a,Grup,Tipus,Hora
Laia,3 ESO A,F,09:00-10:00
";
        let err = events_from_reader(data.as_bytes()).unwrap_err();
        assert_matches!(err, ImportError::Row { line: 2, .. });
    }

    #[test]
    fn row_errors_report_the_physical_line() {
        let data = "\
Alumne/a,Assignatura,Grup,Tipus,Hora
Anna,\"Mòdul
projecte\",1CFGM-A,F,08:00-09:00
Pau,Xarxes,SMX1
";
        let err = events_from_reader(data.as_bytes()).unwrap_err();
        assert_matches!(err, ImportError::Row { line: 4, .. });
    }
}
