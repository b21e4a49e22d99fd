use axum::{Json, Router, http::StatusCode, routing::post};

use crate::data::{BandInput, BandOutput};
use crate::error::BandError;
use crate::{shape, solver};

async fn solve_handler(
    Json(input): Json<BandInput>,
) -> Result<Json<BandOutput>, (StatusCode, String)> {
    let outcome = solver::solve(&input).map_err(reject)?;
    let assignments =
        shape::to_long_form(&outcome.assignment, &input.student_preferences).map_err(reject)?;
    let sections = shape::section_report(&assignments, &input.instrument_targets);
    Ok(Json(BandOutput {
        assignments,
        sections,
        objective: outcome.objective,
        solve_millis: outcome.solve_millis,
    }))
}

fn reject(e: BandError) -> (StatusCode, String) {
    let status = if e.is_invalid_input() {
        StatusCode::BAD_REQUEST
    } else if matches!(e, BandError::Infeasible { .. }) {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, e.to_string())
}

pub async fn run_server() {
    let app = Router::new().route("/v1/band/solve", post(solve_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();

    println!("Server running at http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
