//! API integration tests
//!
//! Run against a server started with `LENDING_STORAGE__BACKEND=memory`, which
//! seeds an administrator (id 1), a teacher (id 2, DNI 12345678), one area,
//! grade and section (ids 3 to 5) and three resources (ids 6 to 8).

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use resource_lending_server::models::{enums::Role, user::ActorClaims};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Mint a bearer token the way the identity provider does
fn token_for(actor_id: i32, role: Role) -> String {
    let secret =
        std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    let claims = ActorClaims {
        sub: actor_id.to_string(),
        actor_id,
        role,
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("Failed to encode token")
}

fn admin_token() -> String {
    token_for(1, Role::Administrador)
}

fn docente_token() -> String {
    token_for(2, Role::Docente)
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_docente_cannot_authorize() {
    let client = Client::new();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(docente_token())
        .json(&json!({
            "teacher_id": 2,
            "area_id": 3,
            "grade_id": 4,
            "section_id": 5,
            "resource_ids": [8]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["status"], "Pendiente");
    let loan_id = body["data"]["id"].as_i64().expect("No loan ID");

    let response = client
        .post(format!("{}/loans/{}/authorize", BASE_URL, loan_id))
        .bearer_auth(docente_token())
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    // Cleanup: reject the request
    let response = client
        .post(format!("{}/loans/{}/reject", BASE_URL, loan_id))
        .bearer_auth(admin_token())
        .json(&json!({ "reason": "Prueba" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_loan_return_with_damage() {
    let client = Client::new();
    let token = admin_token();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "teacher_id": 2,
            "area_id": 3,
            "grade_id": 4,
            "section_id": 5,
            "resource_ids": [6, 7]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["status"], "Activo");
    let loan_id = body["data"]["id"].as_i64().expect("No loan ID");

    // Wrong DNI is refused
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .json(&json!({ "dni": "87654321" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .json(&json!({
            "dni": "12345678",
            "damage_reports": [{ "resource_id": 6, "damages": ["Pantalla rota"] }],
            "suggestions": [{ "resource_id": 7, "suggestions": ["Funda"] }]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["loan"]["status"], "Devuelto");
    assert_eq!(body["data"]["resources"]["6"]["status"], "Dañado");
    assert_eq!(body["data"]["resources"]["7"]["status"], "Disponible");
    let maintenance_id = body["data"]["maintenance"][0]["id"].as_i64().expect("No maintenance ID");

    let response = client
        .put(format!("{}/maintenance/{}/status", BASE_URL, maintenance_id))
        .bearer_auth(&token)
        .json(&json!({ "status": "Completado", "notes": "Pantalla reemplazada" }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["current_status"], "Completado");
    assert!(body["data"]["completed_at"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_notifications_inbox() {
    let client = Client::new();
    let token = admin_token();

    let response = client
        .get(format!("{}/notifications?limit=10", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());

    let response = client
        .put(format!("{}/notifications/read-all", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/notifications/stats", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["unread"], 0);
}

#[tokio::test]
#[ignore]
async fn test_get_stats() {
    let client = Client::new();

    let response = client
        .get(format!("{}/stats", BASE_URL))
        .bearer_auth(admin_token())
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["resources_by_status"].is_array());
    assert!(body["loans_by_status"].is_array());
    assert!(body["maintenance"]["open"].is_number());
}
