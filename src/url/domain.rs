use url::Url;

/// Reverses the DNS labels of a host
///
/// The reversed form groups hosts of the same registrable domain next to each
/// other when sorted, which makes it a convenient partition key.
///
/// # Examples
///
/// ```
/// use link_sequencer::url::reverse_host_labels;
///
/// assert_eq!(reverse_host_labels("www.example.com"), "com.example.www");
/// assert_eq!(reverse_host_labels("localhost"), "localhost");
/// assert_eq!(reverse_host_labels(""), "");
/// ```
pub fn reverse_host_labels(host: &str) -> String {
    if host.is_empty() {
        return String::new();
    }
    host.split('.').rev().collect::<Vec<_>>().join(".")
}

/// Returns the lowercase host of a URL with its labels reversed
///
/// URLs without a host yield an empty string.
pub fn reversed_host(url: &Url) -> String {
    url.host_str()
        .map(|host| reverse_host_labels(&host.to_lowercase()))
        .unwrap_or_default()
}
