use crate::models::ProgramId;

/// Programs whose percentage is computed over total program hours.
pub const GLOBAL_PROGRAMS: [&str; 6] = ["PFIPER", "PFICOM", "3 ESO", "4 ESO", "1 BATX", "2 BATX"];

/// Fixed rules checked before any configured program: (grade digit, stage token, program).
const STAGE_RULES: [(&str, &str, &str); 4] = [
    ("3", "ESO", "3 ESO"),
    ("4", "ESO", "4 ESO"),
    ("1", "BATX", "1 BATX"),
    ("2", "BATX", "2 BATX"),
];

pub fn is_global(program: &ProgramId) -> bool {
    GLOBAL_PROGRAMS.contains(&program.as_str())
}

/// Maps raw group labels such as "1CFGM-A" or "3 ESO A" to a program.
#[derive(Debug, Clone)]
pub struct ProgramResolver {
    // Longest first, ties broken alphabetically.
    known: Vec<String>,
}

impl ProgramResolver {
    pub fn new<I, S>(known_program_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: Vec<String> = known_program_ids.into_iter().map(Into::into).collect();
        known.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        known.dedup();
        Self { known }
    }

    pub fn resolve(&self, group_label: &str) -> Option<ProgramId> {
        for (digit, stage, program) in STAGE_RULES {
            if group_label.contains(digit) && group_label.contains(stage) {
                return Some(ProgramId::new(program));
            }
        }

        self.known
            .iter()
            .find(|code| group_label.contains(code.as_str()))
            .map(|code| ProgramId::new(code.as_str()))
    }
}
