use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use medrecord_backend::{
    api::{create_router, AppState},
    auth::{AuthState, JwtHandler, SessionStore, UserStore},
    config::ProfileCountScope,
    db::Database,
    records::RecordStore,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const PREFIX: &str = "/app/api";

fn app_with_scope(scope: ProfileCountScope) -> Router {
    let db = Database::open_in_memory().expect("in-memory db");
    let users = Arc::new(UserStore::new(db.clone(), 10));
    let records = Arc::new(RecordStore::new(db));
    let jwt = Arc::new(JwtHandler::new(
        "test-access-secret".to_string(),
        "test-refresh-secret".to_string(),
    ));
    let sessions = Arc::new(SessionStore::new());

    create_router(
        AuthState::new(users.clone(), jwt, sessions),
        AppState::new(records, users, scope),
        PREFIX,
    )
}

fn app() -> Router {
    app_with_scope(ProfileCountScope::Owner)
}

async fn send(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let uri = if path == "/health" {
        path.to_string()
    } else {
        format!("{}{}", PREFIX, path)
    };

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, path, Some(body), None).await
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    send(app, Method::GET, path, None, None).await
}

/// Sign up and log in; returns (userId, accessToken, refreshToken)
async fn register(app: &Router, name: &str, email: &str) -> (String, String, String) {
    let (status, _) = post(
        app,
        "/Signup",
        json!({"name": name, "email": email, "password": "pw"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(app, "/Login", json!({"email": email, "password": "pw"})).await;
    assert_eq!(status, StatusCode::OK);
    (
        body["userId"].as_str().unwrap().to_string(),
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

async fn create_patient(app: &Router, owner: &str, name: &str) -> String {
    let (status, body) = post(
        app,
        "/patientinfo",
        json!({"name": name, "age": 30, "gender": "M", "userId": owner}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["_id"].as_str().unwrap().to_string()
}

fn doctor_body(name: &str, patient: Option<&str>) -> Value {
    let mut body = json!({"name": name, "spec": "General", "regno": "R-1", "doccontact": "555"});
    if let Some(patient) = patient {
        body["patientId"] = json!(patient);
    }
    body
}

fn hospital_body(patient: &str) -> Value {
    json!({"name": "City", "address": "1 Main St", "contact": "555", "patientId": patient})
}

fn illness_body(diagnosis: &str, patient: &str) -> Value {
    json!({
        "symptoms": "fever",
        "diagnosis": diagnosis,
        "treatment": "rest",
        "prescribedmed": "paracetamol",
        "prescribedtime": "5d",
        "patientId": patient,
    })
}

#[tokio::test]
async fn health_is_outside_prefix() {
    let app = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn end_to_end_patient_with_illness() {
    let app = app();
    let (user_id, access, refresh) = register(&app, "A", "a@x.com").await;
    assert!(!user_id.is_empty());
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());

    let patient = create_patient(&app, &user_id, "Bob").await;

    let (status, fresh) = get(&app, &format!("/getpatientinfo/{}", patient)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fresh["data"]["doctors"], json!([]));
    assert_eq!(fresh["data"]["hospitals"], json!([]));
    assert_eq!(fresh["data"]["illnesses"], json!([]));

    let (status, created) = post(&app, "/illnessinfo", illness_body("flu", &patient)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["patientId"], patient.as_str());

    let (status, body) = get(&app, &format!("/getpatientinfo/{}", patient)).await;
    assert_eq!(status, StatusCode::OK);
    let illnesses = body["data"]["illnesses"].as_array().unwrap();
    assert_eq!(illnesses.len(), 1);
    assert_eq!(illnesses[0]["diagnosis"], "flu");
    assert_eq!(illnesses[0]["_id"], created["data"]["_id"]);
    assert_eq!(body["data"]["name"], "Bob");
    assert_eq!(body["data"]["createdBy"], user_id.as_str());
}

#[tokio::test]
async fn signup_validation_and_duplicates() {
    let app = app();

    let (status, body) = post(&app, "/Signup", json!({"name": "A", "email": "a@x.com"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "All fields are required");

    let (status, body) = post(
        &app,
        "/Signup",
        json!({"name": "A", "email": "a@x.com", "password": "pw"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(!body.to_string().contains("$2"));

    let (status, body) = post(
        &app,
        "/Signup",
        json!({"name": "B", "email": "a@x.com", "password": "other"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn login_failures() {
    let app = app();
    register(&app, "A", "a@x.com").await;

    let (status, body) = post(&app, "/Login", json!({"email": "a@x.com", "password": "nope"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = post(&app, "/Login", json!({"email": "b@x.com", "password": "pw"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, _) = post(&app, "/Login", json!({"email": "a@x.com"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("{}/Login", PREFIX))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_works_until_logout() {
    let app = app();
    let (_, access, refresh) = register(&app, "A", "a@x.com").await;

    let (status, body) = post(&app, "/token", json!({"refreshToken": refresh})).await;
    assert_eq!(status, StatusCode::OK);
    let renewed = body["accessToken"].as_str().unwrap();
    assert!(!renewed.is_empty());

    // The renewed access token opens gated routes
    let (status, _) = send(&app, Method::POST, "/home", None, Some(renewed)).await;
    assert_eq!(status, StatusCode::OK);

    // An access token is not a refresh token
    let (status, _) = post(&app, "/token", json!({"refreshToken": access})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post(&app, "/Logout", json!({"refreshToken": refresh})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/token", json!({"refreshToken": refresh})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    // Logging out again is harmless
    let (status, _) = post(&app, "/Logout", json!({"refreshToken": refresh})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(&app, "/Logout", json!({"refreshToken": "garbage"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn gated_routes_require_bearer_access_token() {
    let app = app();
    let (_, access, refresh) = register(&app, "A", "a@x.com").await;

    let (status, _) = send(&app, Method::POST, "/home", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("{}/setting", PREFIX))
        .header(header::AUTHORIZATION, format!("Token {}", access))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/home", None, Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::POST, "/home", None, Some(&refresh)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::POST, "/setting", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn patient_creation_checks() {
    let app = app();
    let (user_id, _, _) = register(&app, "A", "a@x.com").await;

    let (status, body) = post(
        &app,
        "/patientinfo",
        json!({"name": "Bob", "age": "31", "gender": "M", "userId": user_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["age"], 31);

    let (status, _) = post(
        &app,
        "/patientinfo",
        json!({"name": "Bob", "age": "old", "gender": "M", "userId": user_id}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        "/patientinfo",
        json!({"name": "Bob", "age": 30, "userId": user_id}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(
        &app,
        "/patientinfo",
        json!({"name": "Bob", "age": 30, "gender": "M", "userId": uuid::Uuid::new_v4()}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn sub_record_for_unknown_patient_is_rejected() {
    let app = app();
    let missing = uuid::Uuid::new_v4().to_string();

    let (status, body) = post(&app, "/doctorinfo", doctor_body("Dr. A", Some(&missing))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Patient not found");

    // Unlinked records are accepted
    let (status, body) = post(&app, "/doctorinfo", doctor_body("Dr. A", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["patientId"].is_null());
}

#[tokio::test]
async fn invalid_path_id_is_rejected() {
    let app = app();
    let (status, _) = get(&app, "/getpatientinfo/12345").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, &format!("/getpatientinfo/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_records_semantics() {
    let app = app();
    let (user_id, _, _) = register(&app, "A", "a@x.com").await;
    let patient = create_patient(&app, &user_id, "Bob").await;
    let path = format!("/patient/{}/updateRecords", patient);

    let (_, doctor) = post(&app, "/doctorinfo", doctor_body("Dr. A", Some(&patient))).await;
    let doctor_id = doctor["data"]["_id"].as_str().unwrap().to_string();

    // Name only
    let (status, body) = send(&app, Method::PUT, &path, Some(json!({"name": "X"})), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "X");
    assert_eq!(body["data"]["age"], 30);
    assert_eq!(body["data"]["gender"], "M");
    assert_eq!(body["data"]["doctors"].as_array().unwrap().len(), 1);

    // Existing doctor updated in place
    let (status, body) = send(
        &app,
        Method::PUT,
        &path,
        Some(json!({"doctor": {"_id": doctor_id, "spec": "Neurology"}})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let doctors = body["data"]["doctors"].as_array().unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0]["spec"], "Neurology");
    assert_eq!(doctors[0]["name"], "Dr. A");
    assert_eq!(doctors[0]["patientId"], patient.as_str());

    // New doctor and hospital appended
    let (status, body) = send(
        &app,
        Method::PUT,
        &path,
        Some(json!({
            "doctor": {"name": "Dr. B", "spec": "Cardiology"},
            "hospital": {"name": "City", "address": "1 Main St", "contact": "555"},
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doctors"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["doctors"][1]["name"], "Dr. B");
    assert_eq!(body["data"]["hospitals"].as_array().unwrap().len(), 1);

    // Missing required fields on a new record
    let (status, _) = send(
        &app,
        Method::PUT,
        &path,
        Some(json!({"illness": {"symptoms": "cough"}})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A record of another patient cannot be edited through this one
    let other = create_patient(&app, &user_id, "Alice").await;
    let (_, foreign) = post(&app, "/doctorinfo", doctor_body("Dr. C", Some(&other))).await;
    let (status, body) = send(
        &app,
        Method::PUT,
        &path,
        Some(json!({"name": "Y", "doctor": {"_id": foreign["data"]["_id"], "name": "Hijack"}})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Doctor not found");

    let (_, body) = get(&app, &format!("/getpatientinfo/{}", patient)).await;
    assert_eq!(body["data"]["name"], "X");

    let missing = format!("/patient/{}/updateRecords", uuid::Uuid::new_v4());
    let (status, body) = send(&app, Method::PUT, &missing, Some(json!({"name": "Z"})), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Patient not found");
}

#[tokio::test]
async fn update_records_replaces_provided_illness_fields() {
    let app = app();
    let (user_id, _, _) = register(&app, "A", "a@x.com").await;
    let patient = create_patient(&app, &user_id, "Bob").await;
    let path = format!("/patient/{}/updateRecords", patient);

    let mut body = illness_body("appendicitis", &patient);
    body["surgery"] = json!("yes");
    body["surdetails"] = json!("appendectomy");
    body["recoverytime"] = json!("2w");
    let (status, created) = post(&app, "/illnessinfo", body).await;
    assert_eq!(status, StatusCode::OK);
    let illness_id = created["data"]["_id"].clone();
    assert_eq!(created["data"]["surgery"], "yes");

    let (status, body) = send(
        &app,
        Method::PUT,
        &path,
        Some(json!({"illness": {"_id": illness_id, "surgery": "", "surdetails": null}})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let illness = &body["data"]["illnesses"][0];
    assert!(illness["surgery"].is_null());
    assert!(illness["surdetails"].is_null());
    assert_eq!(illness["recoverytime"], "2w");
    assert_eq!(illness["diagnosis"], "appendicitis");

    // The cleared values stay cleared on a fresh read
    let (_, fetched) = get(&app, &format!("/getpatientinfo/{}", patient)).await;
    assert!(fetched["data"]["illnesses"][0]["surgery"].is_null());

    let (status, body) = send(
        &app,
        Method::PUT,
        &path,
        Some(json!({"illness": {"_id": illness_id, "diagnosis": ""}})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "diagnosis cannot be empty");
}

#[tokio::test]
async fn delete_cascades_to_linked_records() {
    let app = app();
    let (user_id, _, _) = register(&app, "A", "a@x.com").await;
    let patient = create_patient(&app, &user_id, "Bob").await;

    for name in ["Dr. A", "Dr. B"] {
        post(&app, "/doctorinfo", doctor_body(name, Some(&patient))).await;
    }
    post(&app, "/hospitalinfo", hospital_body(&patient)).await;
    let (_, illness) = post(&app, "/illnessinfo", illness_body("flu", &patient)).await;

    let (status, body) = send(&app, Method::DELETE, &format!("/patient/{}", patient), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Patient and related records deleted successfully");

    let (status, _) = get(&app, &format!("/getpatientinfo/{}", patient)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &format!("/patient/{}", patient), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Linked records went with the patient
    let (_, profile) = get(&app, &format!("/user/{}/profile", user_id)).await;
    assert_eq!(
        profile["stats"],
        json!({"patients": 0, "doctors": 0, "hospitals": 0, "illnesses": 0})
    );
    assert!(illness["data"]["_id"].is_string());
}

#[tokio::test]
async fn patient_lists_are_newest_first() {
    let app = app();
    let (user_id, access, _) = register(&app, "A", "a@x.com").await;
    let (other_id, other_access, _) = register(&app, "B", "b@x.com").await;

    create_patient(&app, &user_id, "first").await;
    create_patient(&app, &user_id, "second").await;
    create_patient(&app, &other_id, "not mine").await;

    let (status, body) = get(&app, &format!("/patients?userId={}", user_id)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["second", "first"]);

    let (status, body) = send(&app, Method::GET, "/mypatients", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["second", "first"]);

    let (_, body) = send(&app, Method::GET, "/mypatients", None, Some(&other_access)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/mypatients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&app, "/patients").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn seed_profiles(app: &Router) -> String {
    let (user_id, _, _) = register(app, "A", "a@x.com").await;
    let (other_id, _, _) = register(app, "B", "b@x.com").await;

    let mine = create_patient(app, &user_id, "Mine").await;
    let theirs = create_patient(app, &other_id, "Theirs").await;

    post(app, "/doctorinfo", doctor_body("Dr. A", Some(&mine))).await;
    post(app, "/doctorinfo", doctor_body("Dr. B", Some(&theirs))).await;
    post(app, "/doctorinfo", doctor_body("Dr. Free", None)).await;
    post(app, "/hospitalinfo", hospital_body(&theirs)).await;
    post(app, "/illnessinfo", illness_body("flu", &mine)).await;

    user_id
}

#[tokio::test]
async fn profile_counts_only_own_records_by_default() {
    let app = app();
    let user_id = seed_profiles(&app).await;

    let (status, body) = get(&app, &format!("/user/{}/profile", user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "A");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"]["createdAt"].is_string());
    assert_eq!(
        body["stats"],
        json!({"patients": 1, "doctors": 1, "hospitals": 0, "illnesses": 1})
    );

    let (status, _) = get(&app, &format!("/user/{}/profile", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_global_scope_counts_every_linked_record() {
    let app = app_with_scope(ProfileCountScope::Global);
    let user_id = seed_profiles(&app).await;

    let (status, body) = get(&app, &format!("/user/{}/profile", user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["stats"],
        json!({"patients": 1, "doctors": 2, "hospitals": 1, "illnesses": 1})
    );
}
