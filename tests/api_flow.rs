//! End-to-end flows against a running server.

use reqwest::StatusCode;
use sdk_rust::{NewTask, TaskUpdate};
use serde_json::{json, Value};
use task_api::auth::Role;

mod common;
use common::TestServer;

fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_register_login_and_crud() {
    let server = TestServer::start_unlimited().await;
    let alice = server.user_client("alice").await;

    let created = alice
        .create_task(&NewTask {
            title: "Buy milk".into(),
            description: "2 litres".into(),
            category: "errands".into(),
            due_date: Some("2026-12-01T09:00:00Z".into()),
        })
        .await
        .unwrap();
    assert_eq!(created.title, "Buy milk");
    assert!(!created.completed);
    assert!(created.due_date.is_some());

    let fetched = alice.get_task(created.id).await.unwrap();
    assert_eq!(fetched.owner.as_ref().unwrap().username, "alice");

    let updated = alice
        .update_task(
            created.id,
            &TaskUpdate {
                completed: Some(true),
                due_date: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.completed);
    assert!(updated.due_date.is_none());
    assert_eq!(updated.title, "Buy milk");

    let tasks = alice.list_tasks(None, None).await.unwrap();
    assert_eq!(tasks.len(), 1);

    alice.delete_task(created.id).await.unwrap();
    let err = alice.get_task(created.id).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(alice.list_tasks(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_gate_rejections() {
    let server = TestServer::start_unlimited().await;
    let http = reqwest::Client::new();
    let url = server.url("/api/tasks");

    let cases: Vec<(Option<String>, &str)> = vec![
        (None, "authorization header required"),
        (Some("Basic abc".into()), "authorization format must be Bearer {token}"),
        (Some("Bearer not.a.token".into()), "invalid token"),
        (
            Some(format!("Bearer {}", common::expired_token(1, Role::Admin))),
            "invalid token",
        ),
    ];

    for (header, expected) in cases {
        let mut req = http.get(&url);
        if let Some(value) = header {
            req = req.header("Authorization", value);
        }
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "error": expected }));
    }
}

#[tokio::test]
async fn test_token_from_other_secret_rejected() {
    let server = TestServer::start_unlimited().await;
    let foreign = task_api::auth::TokenCodec::new(
        &task_api::auth::SigningSecret::resolve(Some("someone-else")),
        std::time::Duration::from_secs(3600),
    )
    .issue(1, Role::Admin)
    .unwrap();

    let client = server.client().with_token(foreign);
    let err = client.list_tasks(None, None).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_only_owner_or_admin_may_modify() {
    let server = TestServer::start_unlimited().await;
    let alice = server.user_client("alice").await;
    let bob = server.user_client("bob").await;
    let admin = server.admin_client().await;

    let task = alice.create_task(&new_task("alice's task")).await.unwrap();

    // Reads are open to any authenticated user.
    assert_eq!(bob.get_task(task.id).await.unwrap().id, task.id);

    let update = TaskUpdate {
        title: Some("hijacked".into()),
        ..Default::default()
    };
    let err = bob.update_task(task.id, &update).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(err.to_string().contains("not allowed"));

    let err = bob.delete_task(task.id).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(alice.get_task(task.id).await.unwrap().title, "alice's task");

    let renamed = admin
        .update_task(
            task.id,
            &TaskUpdate {
                title: Some("moderated".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "moderated");
    assert_eq!(renamed.owner_id, task.owner_id);

    admin.delete_task(task.id).await.unwrap();
    assert_eq!(alice.get_task(task.id).await.unwrap_err().status(), Some(404));
}

#[tokio::test]
async fn test_registration_rules() {
    let server = TestServer::start_unlimited().await;
    let client = server.client();

    client
        .register("carol", "carol@example.com", "password1", None)
        .await
        .unwrap();

    let dup = client
        .register("carol2", "carol@example.com", "password1", None)
        .await
        .unwrap_err();
    assert_eq!(dup.status(), Some(400));
    assert!(dup.to_string().contains("email or username exists"));

    let short = client
        .register("dave", "dave@example.com", "12345", None)
        .await
        .unwrap_err();
    assert_eq!(short.status(), Some(400));

    let bad_email = client
        .register("erin", "not-an-email", "password1", None)
        .await
        .unwrap_err();
    assert_eq!(bad_email.status(), Some(400));

    let admin = client
        .register("mallory", "mallory@example.com", "password1", Some("admin"))
        .await
        .unwrap_err();
    assert_eq!(admin.status(), Some(403));

    let unknown = client
        .register("frank", "frank@example.com", "password1", Some("superuser"))
        .await
        .unwrap_err();
    assert_eq!(unknown.status(), Some(400));
}

#[tokio::test]
async fn test_admin_registration_when_enabled() {
    let mut config = common::test_config();
    config.auth.allow_admin_registration = true;
    let server = TestServer::start(config).await;

    let mut client = server.client();
    client
        .register("root2", "root2@example.com", "password1", Some("admin"))
        .await
        .unwrap();
    client.login("root2@example.com", "password1").await.unwrap();

    let alice = server.user_client("alice").await;
    let task = alice.create_task(&new_task("x")).await.unwrap();
    client.delete_task(task.id).await.unwrap();
}

#[tokio::test]
async fn test_login_failures_are_uniform() {
    let server = TestServer::start_unlimited().await;
    server.user_client("alice").await;

    let mut client = server.client();
    let wrong_password = client.login("alice@example.com", "nope-nope").await.unwrap_err();
    let unknown_user = client.login("ghost@example.com", "password1").await.unwrap_err();

    for err in [wrong_password, unknown_user] {
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("invalid credentials"));
    }
}

#[tokio::test]
async fn test_login_reports_expiry() {
    let server = TestServer::start_unlimited().await;
    let mut client = server.client();
    let login = client
        .login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD)
        .await
        .unwrap();
    assert_eq!(login.expires_in, 24 * 3600);
}

#[tokio::test]
async fn test_pagination() {
    let server = TestServer::start_unlimited().await;
    let alice = server.user_client("alice").await;
    for i in 0..5 {
        alice.create_task(&new_task(&format!("task {}", i))).await.unwrap();
    }

    let first = alice.list_tasks(Some(1), Some(2)).await.unwrap();
    let third = alice.list_tasks(Some(3), Some(2)).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].title, "task 0");
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].title, "task 4");

    // Invalid values fall back to defaults.
    let resp = reqwest::Client::new()
        .get(server.url("/api/tasks?page=-1&page_size=abc"))
        .bearer_auth(alice.token().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let all: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn test_task_validation() {
    let server = TestServer::start_unlimited().await;
    let alice = server.user_client("alice").await;

    let err = alice.create_task(&new_task("   ")).await.unwrap_err();
    assert_eq!(err.status(), Some(400));

    let err = alice
        .create_task(&NewTask {
            title: "bad date".into(),
            due_date: Some("tomorrow".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));

    let resp = reqwest::Client::new()
        .get(server.url("/api/tasks/not-a-number"))
        .bearer_auth(alice.token().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "task not found");
}
