//! API integration tests

use axum::body::Body;
use axum::Router;
use hyper::{Request, StatusCode};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use taskladder::auth::AuthConfig;
use taskladder::hierarchy::DayBoundary;
use taskladder::models::{NewUser, Role};
use taskladder::store::Store;
use taskladder::AppState;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

async fn setup_app() -> (Router, Arc<AppState>, String) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    let store = Store::new(pool);
    store.migrate().await.expect("Failed to run migrations");

    let auth = AuthConfig::new(SECRET, 1).with_hash_cost(4);
    let root = store
        .create_user(NewUser {
            name: "Root".to_string(),
            email: "root@taskladder.test".to_string(),
            role: Role::SuperAdmin,
            company_id: None,
            hierarchy_level_id: None,
            reports_to: None,
            password_hash: None,
        })
        .await
        .expect("Failed to create super admin");
    let root_token = auth.issue(&root).expect("Failed to issue token");

    let state = AppState::new(store, auth, DayBoundary::utc());
    (taskladder::router(state.clone()), state, root_token)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// A company with a manager level (rank 1) and a staff level (rank 2, quota 1)
struct Org {
    admin: String,
    manager: String,
    manager_id: String,
    staff: String,
    staff_id: String,
    peer: String,
    peer_id: String,
}

async fn setup_org(app: &Router, root: &str) -> Org {
    let (status, company) = call(
        app,
        "POST",
        "/api/companies",
        Some(root),
        Some(json!({
            "name": "Acme",
            "admin_name": "Ada",
            "admin_email": "ada@acme.test",
            "admin_password": "ada-secret"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let admin = company["admin_token"].as_str().unwrap().to_string();

    let (status, manager_level) = call(
        app,
        "POST",
        "/api/hierarchy",
        Some(&admin),
        Some(json!({"name": "Manager", "rank": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, staff_level) = call(
        app,
        "POST",
        "/api/hierarchy",
        Some(&admin),
        Some(json!({
            "name": "Staff",
            "rank": 2,
            "max_tasks_per_day": 1,
            "reports_to": manager_level["id"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (manager, manager_id) = create_employee(app, &admin, "Mia", manager_level["id"].clone()).await;
    let (staff, staff_id) = create_employee(app, &admin, "Sam", staff_level["id"].clone()).await;
    let (peer, peer_id) = create_employee(app, &admin, "Pat", staff_level["id"].clone()).await;

    Org {
        admin,
        manager,
        manager_id,
        staff,
        staff_id,
        peer,
        peer_id,
    }
}

async fn create_employee(app: &Router, admin: &str, name: &str, level: Value) -> (String, String) {
    let (status, body) = call(
        app,
        "POST",
        "/api/users/employees",
        Some(admin),
        Some(json!({
            "name": name,
            "email": format!("{}@acme.test", name.to_lowercase()),
            "hierarchy_level_id": level,
            "password": format!("{}-secret", name.to_lowercase())
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn task_body(assignee: &str, title: &str) -> Value {
    json!({
        "title": title,
        "description": "Do the thing",
        "assigned_to": assignee,
        "due_date": "2030-01-01T00:00:00Z",
        "priority": "high",
        "category": "ops",
        "estimated_hours": 2.0
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _state, _root) = setup_app().await;

    let (status, _) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_rejected() {
    let (app, state, root) = setup_app().await;

    let (status, body) = call(&app, "GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (status, _) = call(&app, "GET", "/api/tasks", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Signed with a different secret
    let claims = state.auth.verify(&root).unwrap();
    let user = state.store.get_user(claims.sub).await.unwrap();
    let token = AuthConfig::new("other-secret", 1).issue(&user).unwrap();
    let (status, _) = call(&app, "GET", "/api/companies", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_super_admin_creates_companies() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/companies",
        Some(&org.admin),
        Some(json!({
            "name": "Other",
            "admin_name": "Oz",
            "admin_email": "oz@other.test",
            "admin_password": "oz-secret"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, companies) = call(&app, "GET", "/api/companies", Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(companies.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_assignment_follows_hierarchy() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (status, task) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.manager),
        Some(task_body(&org.staff_id, "Downward")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", task);
    assert_eq!(task["status"], "pending");
    assert_eq!(task["assigned_to"], org.staff_id);

    // Upward and sideways assignments are refused
    let (status, _) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.staff),
        Some(task_body(&org.manager_id, "Upward")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.staff),
        Some(task_body(&org.peer_id, "Sideways")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_daily_quota_is_enforced() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.manager),
        Some(task_body(&org.staff_id, "First")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.manager),
        Some(task_body(&org.staff_id, "Second")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("daily limit"));

    // Another assignee at the same level has their own allowance
    let (status, _) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.manager),
        Some(task_body(&org.peer_id, "Third")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_listing_is_scoped_by_hierarchy() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    for assignee in [&org.staff_id, &org.peer_id] {
        let (status, _) = call(
            &app,
            "POST",
            "/api/tasks",
            Some(&org.manager),
            Some(task_body(assignee, "Work")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, manager_view) = call(&app, "GET", "/api/tasks", Some(&org.manager), None).await;
    assert_eq!(manager_view.as_array().unwrap().len(), 2);

    let (_, admin_view) = call(&app, "GET", "/api/tasks", Some(&org.admin), None).await;
    assert_eq!(admin_view.as_array().unwrap().len(), 2);

    let (_, staff_view) = call(&app, "GET", "/api/tasks", Some(&org.staff), None).await;
    let staff_view = staff_view.as_array().unwrap();
    assert_eq!(staff_view.len(), 1);
    assert_eq!(staff_view[0]["assigned_to"], org.staff_id);

    let (_, peer_view) = call(&app, "GET", "/api/tasks", Some(&org.peer), None).await;
    assert_eq!(peer_view.as_array().unwrap().len(), 1);

    // A peer's task is out of reach
    let peer_task = manager_view
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["assigned_to"] == org.peer_id.as_str())
        .unwrap();
    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/tasks/{}", peer_task["id"].as_str().unwrap()),
        Some(&org.staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_assignment_notifies_assignee() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (_, task) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.manager),
        Some(task_body(&org.staff_id, "Ping me")),
    )
    .await;

    let (status, body) = call(&app, "GET", "/api/notifications", Some(&org.staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread_count"], 1);
    let notification = &body["notifications"][0];
    assert_eq!(notification["kind"], "task_assigned");
    assert_eq!(notification["task_id"], task["id"]);
    assert_eq!(notification["from_user"], org.manager_id);

    let (status, _) = call(
        &app,
        "PUT",
        &format!(
            "/api/notifications/{}/read",
            notification["id"].as_str().unwrap()
        ),
        Some(&org.staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = call(&app, "GET", "/api/notifications", Some(&org.staff), None).await;
    assert_eq!(body["unread_count"], 0);

    // The assigner was not notified of their own action
    let (_, body) = call(&app, "GET", "/api/notifications", Some(&org.manager), None).await;
    assert!(body["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_report_review_flow() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (_, task) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(&org.manager),
        Some(task_body(&org.staff_id, "Write report")),
    )
    .await;
    let task_id = task["id"].as_str().unwrap();

    // Only the assignee reports
    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/tasks/{}/reports", task_id),
        Some(&org.manager),
        Some(json!({"content": "Not mine"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, report) = call(
        &app,
        "POST",
        &format!("/api/tasks/{}/reports", task_id),
        Some(&org.staff),
        Some(json!({"content": "All done"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["status"], "submitted");

    let (status, reviewed) = call(
        &app,
        "PUT",
        &format!(
            "/api/tasks/{}/reports/{}",
            task_id,
            report["id"].as_str().unwrap()
        ),
        Some(&org.manager),
        Some(json!({"status": "approved", "review_comments": "Nice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", reviewed);
    assert_eq!(reviewed["status"], "approved");

    let (_, body) = call(&app, "GET", "/api/notifications", Some(&org.staff), None).await;
    let kinds: Vec<&str> = body["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"report_reviewed"));
}

#[tokio::test]
async fn test_level_rank_must_be_below_parent() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (_, levels) = call(&app, "GET", "/api/hierarchy", Some(&org.staff), None).await;
    let levels = levels.as_array().unwrap();
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0]["name"], "Manager");

    let (status, _) = call(
        &app,
        "POST",
        "/api/hierarchy",
        Some(&org.admin),
        Some(json!({"name": "Bad", "rank": 1, "reports_to": levels[1]["id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        "/api/hierarchy",
        Some(&org.manager),
        Some(json!({"name": "Intern", "rank": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_level_can_be_detached_to_root() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (_, levels) = call(&app, "GET", "/api/hierarchy", Some(&org.admin), None).await;
    let staff_level = levels[1]["id"].as_str().unwrap().to_string();
    assert_eq!(levels[1]["reports_to"], levels[0]["id"]);

    let uri = format!("/api/hierarchy/{}", staff_level);
    let (status, level) = call(
        &app,
        "PUT",
        &uri,
        Some(&org.admin),
        Some(json!({"name": "Analyst"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["reports_to"], levels[0]["id"]);

    let (status, level) = call(
        &app,
        "PUT",
        &uri,
        Some(&org.admin),
        Some(json!({"reports_to": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(level.get("reports_to").is_none());

    let (_, levels) = call(&app, "GET", "/api/hierarchy", Some(&org.admin), None).await;
    assert!(levels[1].get("reports_to").is_none());
}

#[tokio::test]
async fn test_password_login_and_change() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let login = |email: &str, password: &str| json!({"email": email, "password": password});

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(login("sam@acme.test", "wrong-secret")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(login("nobody@acme.test", "sam-secret")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The root account was created without a password
    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(login("root@taskladder.test", "")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(login("SAM@acme.test", "sam-secret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], org.staff_id);
    assert!(body["user"].get("password_hash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, profile) = call(&app, "GET", "/api/users/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], org.staff_id);

    // Company admins log in with the password given at company creation
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(login("ada@acme.test", "ada-secret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "company_admin");

    let (status, _) = call(
        &app,
        "PATCH",
        "/api/users/profile/password",
        Some(&token),
        Some(json!({"current_password": "not-it", "new_password": "fresh-secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "PATCH",
        "/api/users/profile/password",
        Some(&token),
        Some(json!({"current_password": "sam-secret", "new_password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "PATCH",
        "/api/users/profile/password",
        Some(&token),
        Some(json!({"current_password": "sam-secret", "new_password": "fresh-secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(login("sam@acme.test", "sam-secret")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(login("sam@acme.test", "fresh-secret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_employee_requires_valid_password() {
    let (app, _state, root) = setup_app().await;
    let org = setup_org(&app, &root).await;

    let (_, levels) = call(&app, "GET", "/api/hierarchy", Some(&org.admin), None).await;
    let (status, _) = call(
        &app,
        "POST",
        "/api/users/employees",
        Some(&org.admin),
        Some(json!({
            "name": "Kim",
            "email": "kim@acme.test",
            "hierarchy_level_id": levels[1]["id"],
            "password": "123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
