//! Integration tests for the user routes against `PostgreSQL`.
//!
//! Ignored by default; run with a database reachable through `DATABASE_URL`
//! and `cargo test -p chronicle-api -- --ignored`.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_user_lifecycle_round_trip(pool: PgPool) {
    // POST /api/v1/users
    let (status, created) = common::post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/users",
        &json!({ "name": "Ada", "email": "ada@example.com", "password": "s3cret" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["user"]["id"].as_i64().unwrap();

    // PATCH /api/v1/users/{id}/name
    let (status, renamed) = common::send_json(
        common::build_test_app(pool.clone()),
        "PATCH",
        &format!("/api/v1/users/{id}/name"),
        &json!({ "name": "Augusta" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["user"]["name"], "Augusta");

    // DELETE twice: the second is a no-op.
    let uri = format!("/api/v1/users/{id}");
    let (status, _) = common::request(common::build_test_app(pool.clone()), "DELETE", &uri).await;
    assert_eq!(status, StatusCode::OK);
    let (status, again) =
        common::request(common::build_test_app(pool.clone()), "DELETE", &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["noop"], true);

    // GET /api/v1/users/{id} hides the destroyed user.
    let (status, json) = common::get_json(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "aggregate_not_found");

    // GET /api/v1/users/{id}/events still shows the whole history.
    let (status, history) = common::get_json(
        common::build_test_app(pool),
        &format!("/api/v1/users/{id}/events"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 3);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_hydrate_rebuilds_users_table(pool: PgPool) {
    let (status, _) = common::post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/users",
        &json!({ "name": "Grace" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    sqlx::query("TRUNCATE users").execute(&pool).await.unwrap();

    let (status, json) = common::post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/users/hydrate",
        &json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["users"][0]["name"], "Grace");
    let (_, listed) = common::get_json(common::build_test_app(pool), "/api/v1/users").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_create_user_with_blank_name_returns_422(pool: PgPool) {
    let (status, json) = common::post_json(
        common::build_test_app(pool),
        "/api/v1/users",
        &json!({ "name": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["fields"]["name"].is_array());
}
