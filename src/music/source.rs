//! Resolve play requests with `yt-dlp`

use super::TrackRequest;
use anyhow::{anyhow, Result};
use serenity::all::UserId;
use tokio::process::Command;

#[derive(serde::Deserialize)]
struct YtDlpOutput {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
}

fn is_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

pub async fn resolve(query: &str, requester: UserId) -> Result<TrackRequest> {
    let search_query = if is_url(query) {
        query.to_string()
    } else {
        format!("ytsearch1:{}", query)
    };

    let output = Command::new("yt-dlp")
        .args([
            "-j",
            "-f",
            "bestaudio",
            "--no-playlist",
            "--no-warnings",
            &search_query,
        ])
        .output()
        .await
        .map_err(|e| anyhow!("Could not run yt-dlp: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("yt-dlp failed: {}", stderr.trim()));
    }

    parse(query, &output.stdout, requester)
}

fn parse(query: &str, stdout: &[u8], requester: UserId) -> Result<TrackRequest> {
    let info: YtDlpOutput = serde_json::from_slice(stdout)
        .map_err(|e| anyhow!("Could not parse yt-dlp output: {}", e))?;

    let stream_url = info
        .webpage_url
        .or(info.original_url)
        .unwrap_or_else(|| query.to_string());

    Ok(TrackRequest {
        source: query.to_string(),
        stream_url,
        title: info.title.unwrap_or_else(|| query.to_string()),
        duration_secs: info.duration.map(|d| d.max(0.0) as u64),
        thumbnail: info.thumbnail,
        requester,
    })
}
