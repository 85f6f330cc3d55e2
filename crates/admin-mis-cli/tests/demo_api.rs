use admin_mis_cli::demo;
use admin_mis_core::{settings_loader, Settings};
use admin_mis_test::TestClient;
use serde_json::json;

const SETTINGS: &str = r#"
site_header = "Demo administration"

[[users]]
username = "admin"
token = "admin-token"
is_superuser = true
"#;

async fn client() -> TestClient {
    let settings: Settings = settings_loader::from_toml_str(SETTINGS).unwrap();
    let site = demo::site(settings).unwrap();
    demo::seed(&site).await.unwrap();
    TestClient::new(site.into_router()).token("admin-token")
}

#[tokio::test]
async fn test_index_lists_demo_models() {
    let response = client().await.get("/api/v1/admin/").await;
    assert_eq!(response.status_code(), 200);
    let body = response.value();
    assert_eq!(body[0]["site_header"], "Demo administration");
    assert_eq!(body[1]["app_label"], demo::APP_LABEL);
    assert_eq!(body[1]["app_models"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_settings_file_drives_the_site() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin.toml");
    std::fs::write(&path, SETTINGS).unwrap();
    let settings = settings_loader::from_toml_file(&path).unwrap();
    assert_eq!(settings.users[0].username, "admin");
    assert!(demo::site(settings).unwrap().check().is_empty());
}

#[tokio::test]
async fn test_custom_action_marks_rows() {
    let client = client().await;
    let response = client
        .post_json(
            "/api/v1/admin/django_admin_mis/allfieldmodel/action",
            &json!({"action": "mark_checked", "item_ids": "1,2"}),
        )
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    assert_eq!(response.value()[0]["message_content"], "2 rows were marked as checked.");

    let detail = client.get("/api/v1/admin/django_admin_mis/allfieldmodel/2").await;
    assert_eq!(detail.value()["boolean_field"], true);
}

#[tokio::test]
async fn test_anonymous_requests_are_rejected() {
    let response = client().await.anonymous().get("/api/v1/admin/").await;
    assert_eq!(response.status_code(), 401);
}
