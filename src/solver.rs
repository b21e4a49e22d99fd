use crate::data::{BandInput, SolveOutcome, WideAssignment};
use crate::error::BandError;
use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver,
};
use itertools::Itertools;
use log::{info, trace};
use std::collections::HashMap;
use std::time::Instant;

/// Builds the band assignment ILP and solves it with the HiGHS backend.
///
/// Every (student, instrument) pair gets one binary decision variable;
/// hard constraints force exactly one listed instrument per student and,
/// outside `students` mode, keep each section within 75%..150% of its
/// target headcount.
pub fn solve(input: &BandInput) -> Result<SolveOutcome, BandError> {
    validate(input)?;

    let instruments: Vec<String> = input.instrument_targets.keys().cloned().collect();
    let students: Vec<String> = input.student_preferences.keys().cloned().collect();
    let instrument_col: HashMap<&str, usize> = instruments
        .iter()
        .enumerate()
        .map(|(col, name)| (name.as_str(), col))
        .collect();
    let weights = input.preference_mode.weights();

    info!(
        "Setting up ILP model with {} students and {} instruments in `{}` mode...",
        students.len(),
        instruments.len(),
        input.preference_mode
    );
    let mut problem = ProblemVariables::new();

    // x_si =  1 if student s plays instrument i
    //         0 otherwise
    let assignment_vars: Vec<Vec<Variable>> = students
        .iter()
        .map(|_| problem.add_vector(variable().binary(), instruments.len()))
        .collect();
    trace!(
        "Generated {} assignment variables.",
        students.len() * instruments.len()
    );

    // OBJECTIVE (minimized)
    let mut objective = Expression::from(0.0);

    // Ideal composition: signed deficit per instrument. Deliberately not an
    // absolute deviation, so over-filling is unpenalized here and only held
    // back by the ceiling constraint below.
    for (col, instrument) in instruments.iter().enumerate() {
        let target = f64::from(input.instrument_targets[instrument]);
        let assigned: Expression = assignment_vars.iter().map(|row| row[col]).sum();
        objective += weights.composition * (Expression::from(target) - assigned);
    }

    // Student preference: rank 0 (top choice) is free, later ranks cost
    // proportionally more.
    for (row, student) in students.iter().enumerate() {
        for (rank, instrument) in input.student_preferences[student].iter().enumerate() {
            let col = instrument_col[instrument.as_str()];
            objective += weights.preference * (rank as f64) * assignment_vars[row][col];
        }
    }

    let objective_expr = objective.clone();
    let mut model = problem
        .minimise(objective)
        .using(default_solver);

    // CONSTRAINTS

    // Constraint 1: every student plays exactly one instrument.
    info!("Adding 'one instrument per student' constraints...");
    for row in &assignment_vars {
        let plays: Expression = row.iter().copied().sum();
        model.add_constraint(constraint!(plays == 1));
    }

    // Constraint 2: nobody is assigned an instrument they did not list.
    info!("Adding 'selection restriction' constraints...");
    for (row, student) in students.iter().enumerate() {
        let listed = &input.student_preferences[student];
        let non_selected: Expression = instruments
            .iter()
            .enumerate()
            .filter(|(_, name)| !listed.contains(name))
            .map(|(col, _)| assignment_vars[row][col])
            .sum();
        model.add_constraint(constraint!(non_selected == 0));
    }

    // Constraints 3 and 4: section floor/ceiling around the target count.
    // Skipped entirely in `students` mode.
    if weights.section_bounds {
        info!("Adding section floor/ceiling constraints...");
        for (col, instrument) in instruments.iter().enumerate() {
            let target = f64::from(input.instrument_targets[instrument]);
            let section: Expression = assignment_vars.iter().map(|row| row[col]).sum();
            model.add_constraint(constraint!(section.clone() >= (0.75 * target).floor()));
            model.add_constraint(constraint!(section <= (1.5 * target).ceil()));
        }
    }

    // Solve; this call is the only long-running operation, so it alone is
    // timed.
    info!("Starting ILP solver...");
    let start_time = Instant::now();
    let solution = match model.solve() {
        Ok(s) => s,
        Err(ResolutionError::Infeasible) => {
            return Err(BandError::Infeasible {
                mode: input.preference_mode,
            });
        }
        Err(e) => return Err(BandError::Solver(e.to_string())),
    };
    let duration = start_time.elapsed();
    info!("Solution found in {:.2?}", duration);

    let cells: Vec<Vec<u8>> = assignment_vars
        .iter()
        .map(|row| {
            row.iter()
                .map(|var| u8::from(solution.value(*var) > 0.9))
                .collect()
        })
        .collect();
    let objective_value = solution.eval(&objective_expr);

    Ok(SolveOutcome {
        assignment: WideAssignment {
            students,
            instruments,
            cells,
        },
        objective: objective_value,
        solve_millis: duration.as_millis() as u64,
    })
}

/// Re-checks the structural invariants on the inputs. Upstream collaborators
/// are supposed to have validated already; this is the last line of defense
/// before money is spent on model construction.
fn validate(input: &BandInput) -> Result<(), BandError> {
    if input.instrument_targets.is_empty() {
        return Err(BandError::NoInstruments);
    }
    if input.student_preferences.is_empty() {
        return Err(BandError::NoStudents);
    }
    for (student, listed) in &input.student_preferences {
        if listed.is_empty() {
            return Err(BandError::EmptyPreferenceList {
                student: student.clone(),
            });
        }
        if let Some(dup) = listed.iter().duplicates().next() {
            return Err(BandError::DuplicatePreference {
                student: student.clone(),
                instrument: dup.clone(),
            });
        }
        for instrument in listed {
            if !input.instrument_targets.contains_key(instrument) {
                return Err(BandError::UnknownInstrument {
                    student: student.clone(),
                    instrument: instrument.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PreferenceMode;
    use crate::shape;

    fn input(
        targets: &[(&str, u32)],
        prefs: &[(&str, &[&str])],
        mode: PreferenceMode,
    ) -> BandInput {
        BandInput {
            instrument_targets: targets.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
            student_preferences: prefs
                .iter()
                .map(|(s, list)| (s.to_string(), list.iter().map(|i| i.to_string()).collect()))
                .collect(),
            preference_mode: mode,
        }
    }

    /// Sum of (rank - 1) over assigned rows: 0 when everyone got their top
    /// choice.
    fn rank_cost(input: &BandInput, assignment: &WideAssignment) -> u32 {
        shape::to_long_form(assignment, &input.student_preferences)
            .unwrap()
            .iter()
            .filter(|r| r.assignment == 1)
            .map(|r| r.preference - 1)
            .sum()
    }

    fn section_counts(assignment: &WideAssignment) -> Vec<u32> {
        (0..assignment.instruments.len())
            .map(|col| {
                assignment
                    .cells
                    .iter()
                    .map(|row| u32::from(row[col]))
                    .sum()
            })
            .collect()
    }

    #[test]
    fn two_students_two_instruments_both_get_top_choice() {
        let input = input(
            &[("trumpet", 1), ("drums", 1)],
            &[
                ("Alice", &["trumpet", "drums"]),
                ("Bob", &["drums", "trumpet"]),
            ],
            PreferenceMode::Balanced,
        );
        let outcome = solve(&input).unwrap();
        let rows = shape::to_long_form(&outcome.assignment, &input.student_preferences).unwrap();
        let assigned: Vec<_> = rows.iter().filter(|r| r.assignment == 1).collect();
        assert_eq!(assigned.len(), 2);
        assert!(assigned.iter().all(|r| r.preference == 1));
        assert_ne!(assigned[0].instrument, assigned[1].instrument);
    }

    #[test]
    fn unknown_instrument_is_rejected_before_solving() {
        let input = input(
            &[("tuba", 5)],
            &[("Cam", &["flute"])],
            PreferenceMode::Balanced,
        );
        let err = solve(&input).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(matches!(
            err,
            BandError::UnknownInstrument { ref instrument, .. } if instrument == "flute"
        ));
    }

    #[test]
    fn duplicate_preference_is_rejected() {
        let input = input(
            &[("tuba", 1)],
            &[("Cam", &["tuba", "tuba"])],
            PreferenceMode::Balanced,
        );
        assert!(matches!(
            solve(&input).unwrap_err(),
            BandError::DuplicatePreference { .. }
        ));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let no_instruments = input(&[], &[("Cam", &["tuba"])], PreferenceMode::Balanced);
        assert!(matches!(
            solve(&no_instruments).unwrap_err(),
            BandError::NoInstruments
        ));

        let no_students = input(&[("tuba", 1)], &[], PreferenceMode::Balanced);
        assert!(matches!(
            solve(&no_students).unwrap_err(),
            BandError::NoStudents
        ));

        let empty_list = input(&[("tuba", 1)], &[("Cam", &[])], PreferenceMode::Balanced);
        assert!(matches!(
            solve(&empty_list).unwrap_err(),
            BandError::EmptyPreferenceList { .. }
        ));
    }

    #[test]
    fn unreachable_floor_is_infeasible_in_balanced_mode() {
        // floor(0.75 * 10) = 7 assigned trumpets required, but only 3
        // students exist.
        let input = input(
            &[("trumpet", 10)],
            &[
                ("Alice", &["trumpet"]),
                ("Bob", &["trumpet"]),
                ("Cam", &["trumpet"]),
            ],
            PreferenceMode::Balanced,
        );
        assert!(matches!(
            solve(&input).unwrap_err(),
            BandError::Infeasible {
                mode: PreferenceMode::Balanced
            }
        ));
    }

    #[test]
    fn students_mode_ignores_section_bounds() {
        let input = input(
            &[("trumpet", 10)],
            &[
                ("Alice", &["trumpet"]),
                ("Bob", &["trumpet"]),
                ("Cam", &["trumpet"]),
            ],
            PreferenceMode::Students,
        );
        let outcome = solve(&input).unwrap();
        assert_eq!(section_counts(&outcome.assignment), vec![3]);
    }

    #[test]
    fn every_student_plays_exactly_one_listed_instrument() {
        let input = input(
            &[("flute", 2), ("clarinet", 2), ("tuba", 1)],
            &[
                ("Alice", &["flute", "clarinet"]),
                ("Bob", &["clarinet"]),
                ("Cam", &["tuba", "flute"]),
                ("Dee", &["clarinet", "tuba"]),
                ("Eli", &["flute", "tuba", "clarinet"]),
            ],
            PreferenceMode::Balanced,
        );
        let outcome = solve(&input).unwrap();
        let wide = &outcome.assignment;
        for (row, student) in wide.students.iter().enumerate() {
            let total: u8 = wide.cells[row].iter().sum();
            assert_eq!(total, 1, "{student} must play exactly one instrument");
            let col = wide.cells[row].iter().position(|&c| c == 1).unwrap();
            assert!(
                input.student_preferences[student].contains(&wide.instruments[col]),
                "{student} was assigned an unlisted instrument"
            );
        }
    }

    #[test]
    fn section_sizes_stay_within_bounds_outside_students_mode() {
        let input = input(
            &[("flute", 2), ("clarinet", 2)],
            &[
                ("Alice", &["flute", "clarinet"]),
                ("Bob", &["flute", "clarinet"]),
                ("Cam", &["flute", "clarinet"]),
                ("Dee", &["clarinet", "flute"]),
            ],
            PreferenceMode::Instrumentation,
        );
        let outcome = solve(&input).unwrap();
        for (col, instrument) in outcome.assignment.instruments.iter().enumerate() {
            let target = f64::from(input.instrument_targets[instrument]);
            let count = f64::from(section_counts(&outcome.assignment)[col]);
            assert!(count >= (0.75 * target).floor());
            assert!(count <= (1.5 * target).ceil());
        }
    }

    #[test]
    fn identical_inputs_give_identical_objective_values() {
        let input = input(
            &[("flute", 2), ("clarinet", 2), ("tuba", 1)],
            &[
                ("Alice", &["flute", "clarinet"]),
                ("Bob", &["clarinet", "tuba"]),
                ("Cam", &["tuba", "flute"]),
                ("Dee", &["clarinet", "flute"]),
            ],
            PreferenceMode::Balanced,
        );
        let first = solve(&input).unwrap();
        let second = solve(&input).unwrap();
        assert!((first.objective - second.objective).abs() < 1e-9);
    }

    #[test]
    fn students_mode_trades_balance_for_preference() {
        // Everyone wants trumpet; targets want an even split.
        let targets: &[(&str, u32)] = &[("trumpet", 2), ("drums", 2)];
        let prefs: &[(&str, &[&str])] = &[
            ("Alice", &["trumpet", "drums"]),
            ("Bob", &["trumpet", "drums"]),
            ("Cam", &["trumpet", "drums"]),
            ("Dee", &["trumpet", "drums"]),
        ];
        let by_students = input(targets, prefs, PreferenceMode::Students);
        let by_targets = input(targets, prefs, PreferenceMode::Instrumentation);

        let students_run = solve(&by_students).unwrap();
        let targets_run = solve(&by_targets).unwrap();

        let students_cost = rank_cost(&by_students, &students_run.assignment);
        let targets_cost = rank_cost(&by_targets, &targets_run.assignment);
        assert!(students_cost <= targets_cost);

        let deviation = |input: &BandInput, wide: &WideAssignment| -> u32 {
            section_counts(wide)
                .iter()
                .zip(wide.instruments.iter())
                .map(|(&count, name)| input.instrument_targets[name].abs_diff(count))
                .sum()
        };
        assert!(deviation(&by_targets, &targets_run.assignment)
            <= deviation(&by_students, &students_run.assignment));
    }
}
