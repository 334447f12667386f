//! Uploads the built `index.html` and `script.js` to the content service and
//! records the outcome of each upload in an append-only build log.

pub mod build_log;
pub mod config;
pub mod upload;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

pub use build_log::BuildLog;
pub use config::{UploadConfig, load_config};
pub use upload::{Asset, TransferError, UploadError, UploadResponse, Uploader};

/// Per-asset results of one build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Asset and its public URL.
    pub uploaded: Vec<(Asset, String)>,
    /// Asset and the rendered error.
    pub failed: Vec<(Asset, String)>,
}

/// Upload `assets` in order, logging each outcome.
///
/// Upload failures are recorded and never abort the build; only failing to
/// open or write the log does.
pub async fn run_build(config: &UploadConfig, assets: &[Asset]) -> Result<BuildReport> {
    let mut log = BuildLog::open(&config.log_file)
        .with_context(|| format!("Failed to open build log {}", config.log_file.display()))?;
    log.started(Utc::now())?;

    let uploader = Uploader::new(config);
    let mut report = BuildReport::default();
    for &asset in assets {
        match uploader.upload(asset, &config.asset_dir).await {
            Ok(resp) => {
                let url = config.public_url(&resp.cdn_url);
                info!(file = %asset, %url, "uploaded");
                log.uploaded(asset, &url)?;
                report.uploaded.push((asset, url));
            }
            Err(e) => {
                warn!(file = %asset, error = %e, "upload failed");
                log.failed(asset, &e)?;
                report.failed.push((asset, e.to_string()));
            }
        }
    }

    log.finished(Utc::now())?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, routing::post};
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/upload", addr)
    }

    // Accepts html, rejects js.
    fn flaky_app() -> Router {
        Router::new().route(
            "/upload",
            post(
                |Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("contentTags").map(String::as_str) == Some("html") {
                        Ok(Json(serde_json::json!({"cdnUrl": "/MAC/index.html"})))
                    } else {
                        Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
                    }
                },
            ),
        )
    }

    fn fixture(api_url: String, token: Option<&str>) -> (tempfile::TempDir, UploadConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("script.js"), "console.log(1);").unwrap();
        let config = UploadConfig {
            token: token.map(str::to_string),
            api_url,
            log_file: dir.path().join("log.txt"),
            asset_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        (dir, config)
    }

    #[tokio::test]
    async fn test_build_logs_each_asset_and_keeps_going() {
        let url = serve(flaky_app()).await;
        let (_dir, config) = fixture(url, Some("t"));

        let report = run_build(&config, &Asset::ALL).await.unwrap();
        assert_eq!(
            report.uploaded,
            vec![(
                Asset::IndexHtml,
                "https://cdn.gov-cloud.ai/MAC/index.html".to_string()
            )]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, Asset::ScriptJs);

        let log = std::fs::read_to_string(&config.log_file).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "");
        assert!(lines[1].starts_with("--- Build started at "));
        assert_eq!(
            lines[2],
            "✅ Uploaded index.html → https://cdn.gov-cloud.ai/MAC/index.html"
        );
        assert_eq!(
            lines[3],
            "❌ Failed script.js → Network error: HTTP 500 - Internal Server Error"
        );
        assert!(lines[4].starts_with("--- Build finished at "));
        assert!(log.ends_with(" ---\n"));
    }

    #[tokio::test]
    async fn test_missing_token_fails_every_asset() {
        let (_dir, config) = fixture("http://127.0.0.1:1/upload".into(), None);
        let report = run_build(&config, &Asset::select(Some("js"))).await.unwrap();
        assert!(report.uploaded.is_empty());
        assert_eq!(report.failed.len(), 1);

        let log = std::fs::read_to_string(&config.log_file).unwrap();
        assert!(log.contains("❌ Failed script.js → no upload token configured"));
        assert!(!log.contains("index.html"));
    }

    #[tokio::test]
    async fn test_unwritable_log_is_fatal() {
        let (dir, mut config) = fixture("http://127.0.0.1:1/upload".into(), Some("t"));
        config.log_file = dir.path().join("missing-dir").join("log.txt");
        assert!(run_build(&config, &Asset::ALL).await.is_err());
    }
}
