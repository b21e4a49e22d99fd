use crate::data::PreferenceMode;
use thiserror::Error;

/// Everything that can go wrong between receiving a band input and
/// producing the long-form assignment.
#[derive(Debug, Error)]
pub enum BandError {
    #[error("no instruments were provided")]
    NoInstruments,
    #[error("no students were provided")]
    NoStudents,
    #[error("student `{student}` has an empty preference list")]
    EmptyPreferenceList { student: String },
    #[error("student `{student}` listed unknown instrument `{instrument}`")]
    UnknownInstrument { student: String, instrument: String },
    #[error("student `{student}` listed `{instrument}` more than once")]
    DuplicatePreference { student: String, instrument: String },
    /// No assignment satisfies the hard constraints. Recoverable by the
    /// caller: relax the mode (e.g. `students` drops the section bounds)
    /// or adjust the inputs.
    #[error(
        "no feasible assignment in `{mode}` mode: the section size bounds \
         cannot all be met with the current student preferences"
    )]
    Infeasible { mode: PreferenceMode },
    /// A solved assignment violated the selection restriction. Indicates a
    /// broken constraint upstream; never coerced to rank 0.
    #[error("internal consistency violation for student `{student}`: {detail}")]
    InternalConsistency { student: String, detail: String },
    #[error("solver failure: {0}")]
    Solver(String),
}

impl BandError {
    /// True for the input-validation kinds rejected before model
    /// construction.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            BandError::NoInstruments
                | BandError::NoStudents
                | BandError::EmptyPreferenceList { .. }
                | BandError::UnknownInstrument { .. }
                | BandError::DuplicatePreference { .. }
        )
    }
}
