use anyhow::{Context, Result};
use url::Url;

/// Derive the canonical site identifier from a bare domain or a full URL
///
/// Sites are registrable domains in lowercase with any leading "www."
/// stripped, e.g. "https://www.YouTube.com/watch?v=x" -> "youtube.com".
pub fn canonical_site(input: &str) -> Result<String> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        anyhow::bail!("Site identifier cannot be empty");
    }

    let host = if trimmed.contains("://") {
        let url = Url::parse(trimmed)
            .with_context(|| format!("Failed to parse URL: {}", trimmed))?;
        url.host_str()
            .with_context(|| format!("URL has no host: {}", trimmed))?
            .to_string()
    } else {
        trimmed.to_string()
    };

    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host.is_empty() {
        anyhow::bail!("Site identifier cannot be empty");
    }

    Ok(host.to_string())
}
