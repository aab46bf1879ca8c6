use std::path::Path;

use preel_engine::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env();
    println!(
        "engine-selfcheck: starting with scan_interval={:?} lead_minutes={} permits={}",
        config.scan_interval, config.due_lead_minutes, config.max_concurrent_posts
    );

    ensure_project_id()?;
    ensure_credentials_file().await?;
    ensure_env_present(&[
        "R2_ENDPOINT_URL",
        "R2_ACCESS_KEY_ID",
        "R2_SECRET_ACCESS_KEY",
        "R2_BUCKET_NAME",
    ])?;

    println!("engine-selfcheck: ok");
    Ok(())
}

fn ensure_project_id() -> anyhow::Result<()> {
    if std::env::var("GCP_PROJECT_ID").is_err() && std::env::var("FIREBASE_PROJECT_ID").is_err() {
        return Err(anyhow::anyhow!(
            "set GCP_PROJECT_ID or FIREBASE_PROJECT_ID for Firestore access"
        ));
    }
    Ok(())
}

async fn ensure_credentials_file() -> anyhow::Result<()> {
    let path = std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
        .map_err(|_| anyhow::anyhow!("missing required env var GOOGLE_APPLICATION_CREDENTIALS"))?;
    let metadata = tokio::fs::metadata(Path::new(&path))
        .await
        .map_err(|e| anyhow::anyhow!("credentials file {} not readable: {}", path, e))?;
    if !metadata.is_file() {
        return Err(anyhow::anyhow!("credentials path {} is not a file", path));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
