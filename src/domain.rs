/// Domain extraction for site timing
use url::Url;

/// Returned when a URL cannot be parsed
pub const UNKNOWN_DOMAIN: &str = "Unknown";

/// Extract the domain used as the timing key for a URL
///
/// Algorithm:
/// 1. Parse the URL
/// 2. Take its hostname (empty for URLs without a host, e.g. `about:blank`)
/// 3. Strip one leading "www."
///
/// Examples:
/// - https://www.youtube.com/watch → youtube.com
/// - https://news.bbc.co.uk/article → news.bbc.co.uk
/// - not a url → Unknown
pub fn extract_domain(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            host.strip_prefix("www.").unwrap_or(host).to_string()
        }
        Err(e) => {
            log::debug!("Could not parse URL {:?}: {}", url, e);
            UNKNOWN_DOMAIN.to_string()
        }
    }
}
