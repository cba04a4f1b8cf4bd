use pureharvest_api::routes::health::health_check;

#[tokio::test]
async fn health_reports_service_identity() {
    let body = health_check().await.0;
    assert_eq!(body.message, "Health check");

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["service"], "pureharvest-api");
    assert_eq!(json["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["meta"].is_object());
}
