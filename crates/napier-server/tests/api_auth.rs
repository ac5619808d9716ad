mod common;

use axum::http::StatusCode;
use common::*;
use napier_server::store::{create_user, keys};
use serde_json::json;

fn second_key(app: &TestApp) -> String {
    let conn = app.pool.get().unwrap();
    let user = create_user(&conn, "rival", None).unwrap();
    keys::create_key(&conn, user, Some("elsewhere")).unwrap().1
}

fn keyed_app() -> (TestApp, String, i64) {
    let app = test_app_with(FakeUpstream::default(), |state| state.require_api_key = true);
    let (key_id, raw) = {
        let conn = app.pool.get().unwrap();
        let user = create_user(&conn, "acme", None).unwrap();
        keys::create_key(&conn, user, Some("storefront")).unwrap()
    };
    (app, raw, key_id)
}

#[tokio::test]
async fn missing_key_is_rejected_when_required() {
    let (app, _, _) = keyed_app();
    let response = send(
        &app.router,
        json_request("/api/connect", json!({"clientId": "c"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid API key");
}

#[tokio::test]
async fn unknown_key_is_rejected_when_required() {
    let (app, _, _) = keyed_app();
    let response = send(
        &app.router,
        json_request_with_key("/api/connect", json!({"clientId": "c"}), "nk_forged"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_key_via_header_or_bearer() {
    let (app, raw, _) = keyed_app();

    let response = send(
        &app.router,
        json_request_with_key("/api/connect", json!({"clientId": "c"}), &raw),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut request = json_request("/api/disconnect", json!({"clientId": "c"}));
    request
        .headers_mut()
        .insert("authorization", format!("Bearer {raw}").parse().unwrap());
    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn revoked_key_stops_working() {
    let (app, raw, key_id) = keyed_app();
    {
        let conn = app.pool.get().unwrap();
        assert!(keys::revoke_key(&conn, key_id).unwrap());
    }
    let response = send(
        &app.router,
        json_request_with_key("/api/connect", json!({"clientId": "c"}), &raw),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn usage_is_attributed_to_the_key() {
    let (app, raw, key_id) = keyed_app();
    send(
        &app.router,
        json_request_with_key("/api/connect", json!({"clientId": "c"}), &raw),
    )
    .await;

    let conn = app.pool.get().unwrap();
    let logged: Option<i64> = conn
        .query_row(
            "SELECT api_key_id FROM usage_log WHERE client_id = 'c'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(logged, Some(key_id));
}

#[tokio::test]
async fn keys_are_optional_when_not_required() {
    let app = test_app();
    let response = send(
        &app.router,
        json_request_with_key("/api/connect", json!({"clientId": "c"}), "nk_whatever"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_routes_skip_key_checks() {
    let (app, _, _) = keyed_app();
    for uri in ["/health", "/widget.js"] {
        let response = send(&app.router, get_request(uri)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn sessions_are_scoped_to_the_opening_key() {
    let (app, owner, _) = keyed_app();
    let other = second_key(&app);

    let response = send(
        &app.router,
        json_request_with_key("/api/connect", json!({"clientId": "c"}), &owner),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app.router,
        json_request_with_key("/api/connect", json!({"clientId": "c"}), &other),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Napier Client ID is in use by another API key"
    );

    let response = send(
        &app.router,
        json_request_with_key(
            "/api/execute-tool",
            json!({"clientId": "c", "tool": "flash"}),
            &other,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Not connected to Napier AI service"
    );

    let mut audio = audio_request(Some("c"), Some(b"abc"));
    audio
        .headers_mut()
        .insert("X-API-Key", other.parse().unwrap());
    let response = send(&app.router, audio).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.upstream.audio_calls.lock().unwrap().is_empty());

    // Another key's disconnect leaves the session in place.
    send(
        &app.router,
        json_request_with_key("/api/disconnect", json!({"clientId": "c"}), &other),
    )
    .await;
    let response = send(
        &app.router,
        json_request_with_key(
            "/api/execute-tool",
            json!({"clientId": "c", "tool": "flash"}),
            &owner,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
