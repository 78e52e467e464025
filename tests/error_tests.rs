// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use stride_quest::error::AppError;

#[tokio::test]
async fn test_strava_error_body_carries_details() {
    let response = AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "strava_error");
    assert_eq!(body["details"], AppError::STRAVA_TOKEN_ERROR);
}

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
        (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
        (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
        (AppError::StravaApi("x".into()), StatusCode::BAD_GATEWAY),
        (
            AppError::Persistence("x".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, status) in cases {
        assert_eq!(err.into_response().status(), status);
    }
}
