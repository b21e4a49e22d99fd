use crate::data::{AssignmentRow, InstrumentTargets, SectionCount, StudentPreferences, WideAssignment};
use crate::error::BandError;
use itertools::Itertools;

/// Melts the wide 0/1 grid into one row per (student, instrument) and
/// derives each assigned row's 1-based preference rank.
///
/// An assigned instrument missing from the student's list means the
/// selection restriction was violated upstream, which is a fatal contract
/// error rather than rank 0.
pub fn to_long_form(
    wide: &WideAssignment,
    preferences: &StudentPreferences,
) -> Result<Vec<AssignmentRow>, BandError> {
    let mut rows = Vec::with_capacity(wide.students.len() * wide.instruments.len());
    for (r, student) in wide.students.iter().enumerate() {
        let listed = preferences
            .get(student)
            .ok_or_else(|| BandError::InternalConsistency {
                student: student.clone(),
                detail: "no preference list supplied for an assigned student".to_string(),
            })?;
        for (c, instrument) in wide.instruments.iter().enumerate() {
            let assignment = wide.cells[r][c];
            let preference = if assignment == 1 {
                match listed.iter().position(|p| p == instrument) {
                    Some(idx) => (idx + 1) as u32,
                    None => {
                        return Err(BandError::InternalConsistency {
                            student: student.clone(),
                            detail: format!(
                                "assigned instrument `{instrument}` is not in their preference list"
                            ),
                        });
                    }
                }
            } else {
                0
            };
            rows.push(AssignmentRow {
                student: student.clone(),
                instrument: instrument.clone(),
                assignment,
                preference,
            });
        }
    }
    Ok(rows)
}

/// Per-instrument actual-vs-target counts for reporting, in target-map order.
pub fn section_report(rows: &[AssignmentRow], targets: &InstrumentTargets) -> Vec<SectionCount> {
    let actual_counts = rows
        .iter()
        .filter(|row| row.assignment == 1)
        .counts_by(|row| row.instrument.as_str());

    targets
        .iter()
        .map(|(instrument, &target)| {
            let actual = actual_counts.get(instrument.as_str()).copied().unwrap_or(0) as u32;
            SectionCount {
                instrument: instrument.clone(),
                target,
                actual,
                deviation: target.abs_diff(actual),
                label: format!("{actual}/{target}"),
            }
        })
        .collect()
}
