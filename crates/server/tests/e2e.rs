use std::net::SocketAddr;

use reqwest::StatusCode as HttpStatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

use configs::AppConfig;

struct TestApp {
    base_url: String,
}

async fn start_server() -> anyhow::Result<TestApp> {
    let base = std::env::temp_dir().join(format!("geodrop_e2e_{}", Uuid::new_v4()));
    let mut config = AppConfig::default();
    config.storage.root = base.join("geojson");
    config.frontend.dir = base.join("frontend");
    config.normalize_and_validate()?;

    let app = server::startup::build_app(&config).await?;
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url })
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = reqwest::get(format!("{}/health", app.base_url)).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["ok"], true);
    Ok(())
}

#[tokio::test]
async fn e2e_upload_then_fetch() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = reqwest::Client::new();
    let doc = json!({
        "type": "Feature",
        "geometry": {"type": "MultiPoint", "coordinates": [[10, 20], [30, 40]]},
        "properties": {"label": "e2e"}
    });

    let res = c.post(format!("{}/api/geojson", app.base_url)).json(&doc).send().await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);
    let created = res.json::<serde_json::Value>().await?;
    let url = created["url"].as_str().unwrap_or_default().to_string();

    let res = c.get(format!("{}{}", app.base_url, url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("application/geo+json")
    );
    assert!(res.headers().get("last-modified").is_some());
    let stored = res.json::<serde_json::Value>().await?;
    assert_eq!(stored, doc);
    Ok(())
}

#[tokio::test]
async fn e2e_unknown_id_is_404() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = reqwest::get(format!("{}/api/geojson/{}", app.base_url, Uuid::new_v4())).await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    Ok(())
}
