use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Instrument name -> ideal headcount. Defines the instrument universe.
pub type InstrumentTargets = BTreeMap<String, u32>;
/// Student name -> instruments they are willing to play, most preferred first.
pub type StudentPreferences = BTreeMap<String, Vec<String>>;

/// Caller-selected trade-off between honoring student choice and hitting
/// the target instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceMode {
    Students,
    Balanced,
    Instrumentation,
}

/// Objective weights and bound switch resolved from a `PreferenceMode`.
#[derive(Debug, Clone, Copy)]
pub struct ModeWeights {
    pub composition: f64,
    pub preference: f64,
    /// Whether the per-instrument floor/ceiling constraints apply.
    pub section_bounds: bool,
}

impl PreferenceMode {
    pub fn weights(self) -> ModeWeights {
        match self {
            PreferenceMode::Students => ModeWeights {
                composition: 1.0,
                preference: 5.0,
                section_bounds: false,
            },
            PreferenceMode::Balanced => ModeWeights {
                composition: 3.0,
                preference: 3.0,
                section_bounds: true,
            },
            PreferenceMode::Instrumentation => ModeWeights {
                composition: 3.0,
                preference: 1.0,
                section_bounds: true,
            },
        }
    }
}

impl fmt::Display for PreferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceMode::Students => write!(f, "students"),
            PreferenceMode::Balanced => write!(f, "balanced"),
            PreferenceMode::Instrumentation => write!(f, "instrumentation"),
        }
    }
}

/// The complete input for one solve.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandInput {
    pub instrument_targets: InstrumentTargets,
    pub student_preferences: StudentPreferences,
    pub preference_mode: PreferenceMode,
}

/// The solver's raw output: a student x instrument 0/1 grid.
/// Row order follows `students`, column order follows `instruments`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WideAssignment {
    pub students: Vec<String>,
    pub instruments: Vec<String>,
    pub cells: Vec<Vec<u8>>,
}

/// One solved assignment plus its objective value and solve duration.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub assignment: WideAssignment,
    pub objective: f64,
    pub solve_millis: u64,
}

/// One long-form row per (student, instrument) cell. `preference` is the
/// 1-based rank of the instrument in the student's list when assigned, 0
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentRow {
    pub student: String,
    pub instrument: String,
    pub assignment: u8,
    pub preference: u32,
}

/// Per-instrument target-vs-actual comparison for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCount {
    pub instrument: String,
    pub target: u32,
    pub actual: u32,
    pub deviation: u32,
    pub label: String,
}

/// The final response body for one solve request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandOutput {
    pub assignments: Vec<AssignmentRow>,
    pub sections: Vec<SectionCount>,
    pub objective: f64,
    pub solve_millis: u64,
}
