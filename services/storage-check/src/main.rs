//! Checks that the configured storage bucket exists and accepts uploads.

use anyhow::{bail, Context};
use chrono::Utc;
use shared::config::Settings;
use shared::supabase::SupabaseClient;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const TEST_PREFIX: &str = "test-uploads";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::new().context("reading settings")?;
    settings.require_backend()?;
    let client = SupabaseClient::from_settings(&settings)?;

    if let Err(e) = run(&client).await {
        error!("storage check failed: {e:#}");
        return Err(e);
    }
    println!("storage check passed");
    Ok(())
}

async fn run(client: &SupabaseClient) -> anyhow::Result<()> {
    let buckets = client.list_buckets().await.context("listing buckets")?;
    let names: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
    println!("buckets: {}", names.join(", "));

    let Some(bucket) = buckets.iter().find(|b| b.name == client.bucket()) else {
        bail!("bucket {:?} does not exist", client.bucket());
    };
    println!(
        "bucket {:?} is {}",
        bucket.name,
        if bucket.public { "public" } else { "private" }
    );

    let path = format!("{TEST_PREFIX}/test-{}.txt", Utc::now().timestamp_millis());
    client
        .upload_object(&path, b"storage check".to_vec(), "text/plain")
        .await
        .with_context(|| format!("uploading {path}"))?;
    info!(%path, "test object uploaded");
    println!("public url: {}", client.public_url(&path));

    let listed = client
        .list_objects(TEST_PREFIX)
        .await
        .context("listing test objects")?;
    println!("{} object(s) under {TEST_PREFIX}/", listed.len());

    client
        .remove_objects(&[path.clone()])
        .await
        .with_context(|| format!("removing {path}"))?;
    info!(%path, "test object removed");
    Ok(())
}
