//! S1-S3 and testable properties 1, 2, 8: register/login, multi-recipient
//! send, per-recipient receive/delete, against a real Postgres instance.
//! Gated behind `RUN_DOCKER_INTEGRATION_TESTS=1`, matching the rest of the
//! integration suite.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use signet_core::barrier::{BarrierKeyStore, BarrierService, EnvFileRootKeySource};
use signet_core::db::barrier_keys::BarrierKeyRepository;
use signet_core::db::messages::MessageRepository;
use signet_core::db::realms::RealmRepository;
use signet_core::db::sessions::SessionRepository;
use signet_core::db::users::UserRepository;
use signet_core::listener::{ListenerHandle, ShutdownKind};
use signet_core::migrations;
use signet_core::observability::init_metrics;
use signet_core::routes::public_router;
use signet_core::session::SessionService;
use signet_core::state::AppState;

async fn build_state() -> AppState {
	let pool = common::wait_for_postgres(&common::test_database_url(), 30)
		.await
		.expect("connect to postgres");
	migrations::run(&pool).await.expect("migrations should apply");

	let users = UserRepository::new(pool.clone());
	let sessions = SessionService::new(
		users.clone(),
		SessionRepository::new(pool.clone()),
		RealmRepository::new(pool.clone()),
	);
	let tmpdir = tempfile::tempdir().expect("tempdir");
	let root_key_path = tmpdir.path().join("root.key");
	std::fs::write(&root_key_path, [9u8; 32]).expect("write root key");
	let key_store: Arc<dyn BarrierKeyStore> = Arc::new(BarrierKeyRepository::new(pool.clone()));
	let barrier = Arc::new(
		BarrierService::bootstrap(&EnvFileRootKeySource::new(root_key_path), key_store)
			.await
			.expect("barrier bootstrap"),
	);

	AppState {
		sessions,
		users,
		messages: MessageRepository::new(pool),
		barrier,
		metrics: init_metrics().expect("metrics init"),
	}
}

fn router(state: AppState) -> axum::Router<()> {
	public_router(state, ListenerHandle::new(ShutdownKind::OnceOnly))
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(body.to_string()))
		.unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
	let bytes = resp.into_body().collect().await.expect("collect body").to_bytes();
	serde_json::from_slice(&bytes).expect("valid JSON body")
}

async fn register_and_login(app: &axum::Router<()>, username: &str, password: &str) -> String {
	let register = app
		.clone()
		.oneshot(json_request(
			"POST",
			"/service/api/v1/users/register",
			serde_json::json!({"username": username, "password": password}),
		))
		.await
		.unwrap();
	assert_eq!(register.status(), StatusCode::CREATED, "registration of {} should succeed", username);

	let login = app
		.clone()
		.oneshot(json_request(
			"POST",
			"/service/api/v1/users/login",
			serde_json::json!({"username": username, "password": password}),
		))
		.await
		.unwrap();
	assert_eq!(login.status(), StatusCode::OK);
	let body = body_json(login).await;
	body["token"].as_str().expect("token should be a string").to_string()
}

fn auth(req: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
	req.header("authorization", format!("Bearer {}", token))
}

#[tokio::test]
async fn s1_register_login_and_wrong_password_are_rejected() {
	if !common::check_docker_enabled() {
		return;
	}
	let app = router(build_state().await);
	let username = format!("alice-{}", uuid::Uuid::new_v4());

	let _token = register_and_login(&app, &username, "Correct-Horse-7!").await;

	let bad_login = app
		.oneshot(json_request(
			"POST",
			"/service/api/v1/users/login",
			serde_json::json!({"username": username, "password": "wrong"}),
		))
		.await
		.unwrap();
	assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn s2_and_s3_send_receive_and_owner_only_delete() {
	if !common::check_docker_enabled() {
		return;
	}
	let state = build_state().await;
	let app = router(state.clone());

	let suffix = uuid::Uuid::new_v4();
	let alice_token = register_and_login(&app, &format!("alice-{}", suffix), "Correct-Horse-7!").await;
	let bob_token = register_and_login(&app, &format!("bob-{}", suffix), "Correct-Horse-7!").await;
	let carol_token = register_and_login(&app, &format!("carol-{}", suffix), "Correct-Horse-7!").await;
	let dave_token = register_and_login(&app, &format!("dave-{}", suffix), "Correct-Horse-7!").await;

	let bob_id = state
		.users
		.find_by_username(signet_core::db::default_tenant_id(), &format!("bob-{}", suffix))
		.await
		.unwrap()
		.unwrap()
		.id;
	let carol_id = state
		.users
		.find_by_username(signet_core::db::default_tenant_id(), &format!("carol-{}", suffix))
		.await
		.unwrap()
		.unwrap()
		.id;

	let send_req = auth(
		Request::builder().method("PUT").uri("/service/api/v1/messages/tx").header("content-type", "application/json"),
		&alice_token,
	)
	.body(Body::from(serde_json::json!({"receiver_ids": [bob_id, carol_id], "message": "hello"}).to_string()))
	.unwrap();
	let sent = app.clone().oneshot(send_req).await.unwrap();
	assert_eq!(sent.status(), StatusCode::CREATED);
	let message_id = body_json(sent).await["message_id"].as_str().unwrap().to_string();

	let receive_as = |token: String| {
		let app = app.clone();
		async move {
			let req = auth(Request::builder().method("GET").uri("/service/api/v1/messages/rx"), &token)
				.body(Body::empty())
				.unwrap();
			let resp = app.oneshot(req).await.unwrap();
			assert_eq!(resp.status(), StatusCode::OK);
			body_json(resp).await
		}
	};

	let bob_inbox = receive_as(bob_token.clone()).await;
	let bob_messages = bob_inbox["messages"].as_array().unwrap();
	assert_eq!(bob_messages.len(), 1);
	assert_eq!(bob_messages[0]["encrypted_content"], "hello");

	let carol_inbox = receive_as(carol_token).await;
	assert_eq!(carol_inbox["messages"].as_array().unwrap().len(), 1);

	let alice_inbox = receive_as(alice_token.clone()).await;
	assert_eq!(alice_inbox["messages"].as_array().unwrap().len(), 0);

	// S3: a non-sender is forbidden from deleting.
	let forbidden_delete = auth(
		Request::builder().method("DELETE").uri(format!("/service/api/v1/messages/{}", message_id)),
		&dave_token,
	)
	.body(Body::empty())
	.unwrap();
	let resp = app.clone().oneshot(forbidden_delete).await.unwrap();
	assert_eq!(resp.status(), StatusCode::FORBIDDEN);

	// Sender can delete.
	let owner_delete = auth(
		Request::builder().method("DELETE").uri(format!("/service/api/v1/messages/{}", message_id)),
		&alice_token,
	)
	.body(Body::empty())
	.unwrap();
	let resp = app.clone().oneshot(owner_delete).await.unwrap();
	assert_eq!(resp.status(), StatusCode::NO_CONTENT);

	let bob_inbox_after_delete = receive_as(bob_token).await;
	assert_eq!(bob_inbox_after_delete["messages"].as_array().unwrap().len(), 0);

	// Re-delete reports not found.
	let redelete = auth(
		Request::builder().method("DELETE").uri(format!("/service/api/v1/messages/{}", message_id)),
		&alice_token,
	)
	.body(Body::empty())
	.unwrap();
	let resp = app.oneshot(redelete).await.unwrap();
	assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
