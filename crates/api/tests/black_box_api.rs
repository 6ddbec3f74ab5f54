use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use stockflow_api::app::{build_app, services::AppServices};
use stockflow_auth::{JwtClaims, PrincipalId, Role};
use stockflow_core::{Clock, ManualClock};
use stockflow_infra::{InMemoryStore, RecordingMailer, Settings};

const JWT_SECRET: &str = "test-secret";
const NOTIFY_TOKEN: &str = "cron-secret";

struct TestServer {
    base_url: String,
    clock: Arc<ManualClock>,
    mailer: Arc<RecordingMailer>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
    _uploads: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let env: HashMap<&str, String> = HashMap::from([
            ("JWT_SECRET", JWT_SECRET.to_string()),
            ("NOTIFY_TOKEN", NOTIFY_TOKEN.to_string()),
            ("UPLOAD_DIR", uploads.path().to_string_lossy().into_owned()),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).cloned()).unwrap();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 14, 8, 0, 0).unwrap(),
        ));
        let mailer = Arc::new(RecordingMailer::new());
        let services = Arc::new(AppServices::new(
            Arc::new(InMemoryStore::new()),
            mailer.clone(),
            clock.clone(),
            &settings,
        ));

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            clock,
            mailer,
            client: reqwest::Client::new(),
            handle,
            _uploads: uploads,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self, roles: Vec<Role>) -> String {
        let now = self.clock.now();
        let claims = JwtClaims {
            sub: PrincipalId::new(),
            roles,
            issued_at: now,
            expires_at: now + ChronoDuration::minutes(10),
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("failed to encode jwt")
    }

    fn user(&self) -> String {
        self.token(vec![Role::user()])
    }

    fn admin(&self) -> String {
        self.token(vec![Role::admin()])
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn expect(res: reqwest::Response, status: StatusCode) -> Value {
    let actual = res.status();
    let body = res.text().await.unwrap_or_default();
    assert_eq!(actual, status, "unexpected status, body={body}");
    serde_json::from_str(&body).unwrap_or(Value::Null)
}

async fn create_item(srv: &TestServer, token: &str, stock: i64, threshold: i64) -> i64 {
    let res = srv
        .client
        .post(srv.url("/inventory"))
        .bearer_auth(token)
        .json(&json!({
            "material": format!("Moteur {stock}/{threshold}"),
            "supplier": "Somfy",
            "category": "Motorisation",
            "stock": stock,
            "threshold": threshold,
            "price": "129.90",
        }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::CREATED).await;
    body["data"]["id"].as_i64().unwrap()
}

fn photo(name: &str) -> Part {
    Part::bytes(b"\xFF\xD8\xFF fake jpeg".to_vec()).file_name(name.to_string())
}

async fn intake(srv: &TestServer, token: &str, client_name: &str, with_photo: bool) -> Value {
    let mut form = Form::new()
        .text("client", client_name.to_string())
        .text("date", "2024-03-10");
    if with_photo {
        form = form
            .part("photo", photo("front.jpg"))
            .part("additional_photos", photo("side.jpg"));
    }
    let res = srv
        .client
        .post(srv.url("/received"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = res.status();
    assert!(status == StatusCode::CREATED || status == StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_public_and_other_routes_need_a_session() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");

    let res = srv.client.get(srv.url("/inventory")).send().await.unwrap();
    let body = expect(res, StatusCode::UNAUTHORIZED).await;
    assert_eq!(body["error"], true);

    let res = srv
        .client
        .get(srv.url("/inventory"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
async fn session_identity_comes_from_the_token() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth(srv.admin())
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["success"], true);
    assert!(
        body["data"]["roles"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "admin")
    );
    assert!(body["data"]["principal_id"].is_string());
}

#[tokio::test]
async fn unknown_routes_and_methods_use_the_error_envelope() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/nope")).send().await.unwrap();
    let body = expect(res, StatusCode::NOT_FOUND).await;
    assert_eq!(body["error"], true);

    let res = srv.client.delete(srv.url("/health")).send().await.unwrap();
    let body = expect(res, StatusCode::METHOD_NOT_ALLOWED).await;
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn inventory_write_back_above_threshold_removes_the_order() {
    let srv = TestServer::spawn().await;
    let token = srv.user();
    let id = create_item(&srv, &token, 0, 5).await;

    let res = srv
        .client
        .get(srv.url("/inventory"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"][0]["status"], "Rupture");
    assert_eq!(body["data"][0]["is_ordered"], false);

    let res = srv
        .client
        .post(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "inventory_id": id }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["action"], "created");
    assert_eq!(body["data"]["order"]["ordered_quantity"], 10);

    let res = srv
        .client
        .get(srv.url("/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "Rupture");

    let res = srv
        .client
        .put(srv.url(&format!("/inventory/{id}")))
        .bearer_auth(&token)
        .json(&json!({ "stock": 8 }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "Disponible");

    let res = srv
        .client
        .get(srv.url("/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn order_update_and_explicit_delete() {
    let srv = TestServer::spawn().await;
    let token = srv.user();
    let id = create_item(&srv, &token, 2, 5).await;

    let res = srv
        .client
        .put(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "inventory_id": id, "is_ordered": true }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["order"]["ordered_quantity"], 13);

    let res = srv
        .client
        .put(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "inventory_id": id, "is_ordered": true, "ordered_quantity": 4 }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["action"], "updated");
    assert_eq!(body["data"]["order"]["ordered_quantity"], 4);

    let res = srv
        .client
        .put(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "inventory_id": id, "is_ordered": false }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["action"], "unchecked");
    assert_eq!(body["data"]["order"]["is_ordered"], false);

    let res = srv
        .client
        .delete(srv.url(&format!("/orders/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::OK).await;

    let res = srv
        .client
        .delete(srv.url(&format!("/orders/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn deleting_an_item_drops_its_order() {
    let srv = TestServer::spawn().await;
    let token = srv.user();
    let kept = create_item(&srv, &token, 0, 4).await;
    let dropped = create_item(&srv, &token, 1, 6).await;

    for id in [kept, dropped] {
        let res = srv
            .client
            .post(srv.url("/orders"))
            .bearer_auth(&token)
            .json(&json!({ "inventory_id": id }))
            .send()
            .await
            .unwrap();
        expect(res, StatusCode::OK).await;
    }

    let res = srv
        .client
        .delete(srv.url(&format!("/inventory/{dropped}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::OK).await;

    let res = srv
        .client
        .get(srv.url("/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["inventory_id"], kept);

    let res = srv
        .client
        .delete(srv.url(&format!("/orders/{dropped}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn tools_are_listed_once_per_name_and_supplier() {
    let srv = TestServer::spawn().await;
    let token = srv.user();
    let drill = json!({ "name": "Perceuse", "supplier": "Makita", "quantity": 2 });

    let res = srv
        .client
        .post(srv.url("/tools"))
        .bearer_auth(&token)
        .json(&drill)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::CREATED).await;
    assert_eq!(body["message"], "Outil ajouté");
    let drill_id = body["data"]["id"].as_i64().unwrap();

    let res = srv
        .client
        .post(srv.url("/tools"))
        .bearer_auth(&token)
        .json(&drill)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["message"], "Outil similaire déjà existant");
    assert_eq!(body["data"]["id"], drill_id);

    let res = srv
        .client
        .post(srv.url("/tools"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Escabeau", "supplier": "Hailo", "quantity": 1 }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::CREATED).await;
    let ladder_id = body["data"]["id"].as_i64().unwrap();

    let res = srv
        .client
        .get(srv.url("/tools"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    let names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Escabeau", "Perceuse"]);

    let res = srv
        .client
        .put(srv.url(&format!("/tools/{ladder_id}")))
        .bearer_auth(&token)
        .json(&drill)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::CONFLICT).await;
    assert_eq!(body["error"], true);

    let res = srv
        .client
        .put(srv.url(&format!("/tools/{drill_id}")))
        .bearer_auth(&token)
        .json(&json!({ "name": "Perceuse", "supplier": "Makita", "quantity": 5 }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["quantity"], 5);

    let res = srv
        .client
        .post(srv.url("/tools"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Scie", "supplier": "Bosch", "quantity": -1 }))
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::BAD_REQUEST).await;

    let res = srv
        .client
        .delete(srv.url(&format!("/tools/{ladder_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["message"], "Outil supprimé");

    let res = srv
        .client
        .delete(srv.url(&format!("/tools/{ladder_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn invalid_input_is_rejected_with_400_and_missing_items_with_404() {
    let srv = TestServer::spawn().await;
    let token = srv.user();

    let res = srv
        .client
        .post(srv.url("/inventory"))
        .bearer_auth(&token)
        .json(&json!({
            "material": " ",
            "supplier": "Somfy",
            "category": "Motorisation",
            "stock": 1,
            "threshold": 1,
        }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], true);

    let res = srv
        .client
        .post(srv.url("/inventory"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::BAD_REQUEST).await;

    let res = srv
        .client
        .post(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "inventory_id": 999 }))
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::NOT_FOUND).await;

    let res = srv
        .client
        .get(srv.url("/stats"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["total_items"], 0);
}

#[tokio::test]
async fn received_item_is_deduplicated_then_installed() {
    let srv = TestServer::spawn().await;
    let token = srv.user();

    let first = intake(&srv, &token, "Martin", true).await;
    let id = first["data"]["id"].as_i64().unwrap();
    let photos = first["data"]["photos_paths"].as_array().unwrap().clone();
    assert_eq!(photos.len(), 2);
    assert!(first["data"].get("photo_path").is_none());
    let primary = photos[0].as_str().unwrap().to_string();
    assert!(primary.starts_with("uploads/"));

    // The stored photo is served back.
    let res = srv.client.get(srv.url(&format!("/{primary}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let again = intake(&srv, &token, "Martin", false).await;
    assert_eq!(again["data"]["id"].as_i64().unwrap(), id);

    let res = srv
        .client
        .get(srv.url("/received"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    let received = body["data"].as_array().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["status"], "Reçu");
    assert_eq!(received[0]["photos_paths"].as_array().unwrap().len(), 2);
    assert!(received[0].get("photo_path").is_none());
    assert_eq!(received[0]["product"], "Commande");
    assert_eq!(received[0]["supplier"], "Dépôt");
    assert_eq!(received[0]["date"], "10/03/2024");

    let res = srv
        .client
        .post(srv.url("/installed"))
        .bearer_auth(&token)
        .json(&json!({ "id": id, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::OK).await;

    let res = srv
        .client
        .get(srv.url("/installed"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    let installed = body["data"].as_array().unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0]["received_id"], id);
    assert_eq!(installed[0]["client"], "Martin");
    assert_eq!(installed[0]["quantity"], 2);
    assert_eq!(installed[0]["photos_paths"].as_array().unwrap().len(), 2);
    assert!(installed[0].get("status").is_none());

    let res = srv
        .client
        .get(srv.url("/received"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // No second transition out of the received state.
    let res = srv
        .client
        .post(srv.url("/defective"))
        .bearer_auth(&token)
        .json(&json!({ "id": id }))
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn defective_entries_and_scoped_deletes() {
    let srv = TestServer::spawn().await;
    let token = srv.user();

    let res = srv
        .client
        .post(srv.url("/defective/direct"))
        .bearer_auth(&token)
        .multipart(Form::new().text("client", "Durand"))
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::BAD_REQUEST).await;

    let res = srv
        .client
        .post(srv.url("/defective/direct"))
        .bearer_auth(&token)
        .multipart(
            Form::new()
                .text("product", "Volet roulant")
                .text("supplier", "Bubendorff")
                .text("client", "Durand"),
        )
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::CREATED).await;
    let direct_id = body["data"]["id"].as_i64().unwrap();
    assert!(body["data"]["received_id"].is_null());
    assert_eq!(body["data"]["status"], "Défectueux");

    let received = intake(&srv, &token, "Petit", false).await;
    let received_id = received["data"]["id"].as_i64().unwrap();

    // Wrong collection.
    let res = srv
        .client
        .delete(srv.url(&format!("/installed/{received_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::NOT_FOUND).await;

    let res = srv
        .client
        .post(srv.url("/defective"))
        .bearer_auth(&token)
        .json(&json!({ "id": received_id }))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["received_id"], received_id);

    let res = srv
        .client
        .get(srv.url("/defective"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let res = srv
        .client
        .delete(srv.url(&format!("/defective/{direct_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::OK).await;
}

#[tokio::test]
async fn trigger_token_is_checked_before_anything_else() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/notifications/trigger?token=wrong"))
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::FORBIDDEN).await;
    assert_eq!(body["error"], true);

    let res = srv
        .client
        .get(srv.url("/notifications/trigger"))
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::UNAUTHORIZED).await;

    let res = srv
        .client
        .get(srv.url("/notifications/trigger"))
        .bearer_auth(srv.user())
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"]["outcome"], "nothing_to_report");
    assert_eq!(body["message"], "Tous les stocks sont normaux");
}

#[tokio::test]
async fn alerts_are_throttled_for_the_window() {
    let srv = TestServer::spawn().await;
    let token = srv.user();
    create_item(&srv, &token, 0, 5).await;
    create_item(&srv, &token, 1, 5).await;

    let trigger = srv.url(&format!("/notifications/trigger?cron_token={NOTIFY_TOKEN}"));

    let body = expect(srv.client.get(&trigger).send().await.unwrap(), StatusCode::OK).await;
    assert_eq!(body["data"]["outcome"], "sent");
    assert_eq!(body["data"]["items_count"], 2);

    srv.clock.advance(ChronoDuration::hours(71));
    let body = expect(srv.client.get(&trigger).send().await.unwrap(), StatusCode::OK).await;
    assert_eq!(body["data"]["outcome"], "suppressed");
    assert_eq!(srv.mailer.sent().len(), 1);

    srv.clock.advance(ChronoDuration::hours(1));
    let body = expect(srv.client.get(&trigger).send().await.unwrap(), StatusCode::OK).await;
    assert_eq!(body["data"]["outcome"], "sent");
    assert_eq!(srv.mailer.sent().len(), 2);

    let res = srv
        .client
        .get(srv.url("/notifications"))
        .bearer_auth(srv.admin())
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn manual_check_requires_admin() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/notifications/check"))
        .bearer_auth(srv.user())
        .send()
        .await
        .unwrap();
    expect(res, StatusCode::FORBIDDEN).await;

    let res = srv
        .client
        .post(srv.url("/notifications/check"))
        .bearer_auth(srv.admin())
        .send()
        .await
        .unwrap();
    let body = expect(res, StatusCode::OK).await;
    assert_eq!(body["success"], true);
}
