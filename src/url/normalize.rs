use url::Url;

/// A hyperlink reference after resolution and canonicalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Canonical absolute URL, fragment removed
    pub canonical: String,

    /// Fragment exactly as written in the reference, without the leading `#`
    pub fragment: String,
}

/// Resolves a hyperlink reference against a base URL and canonicalizes it
///
/// Relative references are merged with `base` using standard reference
/// resolution; absolute references replace it. The fragment is taken verbatim
/// from `href` and returned next to the canonical URL.
///
/// # Arguments
///
/// * `base` - The URL of the page containing the reference
/// * `href` - The raw reference text, already trimmed by the caller
///
/// # Returns
///
/// * `Some(ResolvedLink)` - The reference resolved to a URL with a host
/// * `None` - The reference failed to parse, or resolved to a hostless URL
///   (`mailto:`, `data:`, ...). Callers must not emit a link in that case.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use link_sequencer::url::resolve;
///
/// let base = Url::parse("https://a.com/dir/page").unwrap();
/// let link = resolve(&base, "../x?b=2&a=1#top").unwrap();
/// assert_eq!(link.canonical, "http://a.com/x?a=1&b=2");
/// assert_eq!(link.fragment, "top");
/// ```
pub fn resolve(base: &Url, href: &str) -> Option<ResolvedLink> {
    let joined = base.join(href).ok()?;
    let canonical = canonicalize(&joined)?;
    let fragment = href
        .split_once('#')
        .map(|(_, fragment)| fragment.to_string())
        .unwrap_or_default();

    Some(ResolvedLink {
        canonical,
        fragment,
    })
}

/// Canonicalizes an absolute URL
///
/// # Normalization Steps
///
/// 1. Require a non-empty host; lowercase it
/// 2. Remove the fragment
/// 3. Force the scheme to `http` (default ports are dropped on the way)
/// 4. Normalize the path:
///    - Decode percent-escapes of unreserved characters, uppercase the rest
///    - Remove dot segments and duplicate slashes
///    - Remove trailing slash (except for root /)
/// 5. Sort query parameters by key, dropping empty parameters
/// 6. Remove an empty query string (trailing ?)
///
/// # Returns
///
/// * `Some(String)` - The canonical form
/// * `None` - The URL has no host
pub fn canonicalize(url: &Url) -> Option<String> {
    let mut url = url.clone();

    // Step 1: Host
    let host = url.host_str()?.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    if url.host_str() != Some(host.as_str()) {
        url.set_host(Some(&host)).ok()?;
    }

    // Step 2: Fragment
    url.set_fragment(None);

    // Step 3: Scheme. Non-special schemes cannot be switched and keep their own.
    if url.scheme() != "http" && url.set_scheme("http").is_err() {
        tracing::trace!("Keeping scheme {} for {}", url.scheme(), url);
    }

    // Step 4: Path
    let path = normalize_path(&decode_unreserved(url.path()));
    url.set_path(&path);

    // Step 5 & 6: Query
    if let Some(query) = url.query() {
        let sorted = sort_query(query);
        if sorted.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&sorted));
        }
    }

    Some(url.into())
}

/// Normalizes a URL path by removing dot segments, empty segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Stable-sorts `&`-separated query parameters by key
///
/// Works on the raw query rather than `Url::query_pairs`/`form_urlencoded`,
/// which decode every escape and re-encode with `+` for spaces; parameters
/// must keep their original escapes apart from unreserved characters.
fn sort_query(query: &str) -> String {
    let mut params: Vec<String> = query
        .split('&')
        .filter(|param| !param.is_empty())
        .map(decode_unreserved)
        .collect();

    params.sort_by(|a, b| query_key(a).cmp(query_key(b)));
    params.join("&")
}

fn query_key(param: &str) -> &str {
    param.split_once('=').map_or(param, |(key, _)| key)
}

/// Decodes percent-escapes of unreserved characters and uppercases all others
///
/// Malformed escapes (`%` not followed by two hex digits) are left untouched.
fn decode_unreserved(component: &str) -> String {
    let mut decoded = String::with_capacity(component.len());
    let mut rest = component;

    while let Some(pos) = rest.find('%') {
        decoded.push_str(&rest[..pos]);
        let escape = &rest[pos..];

        let byte = escape
            .get(1..3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());

        match byte {
            Some(byte) if is_unreserved(byte) => {
                decoded.push(byte as char);
                rest = &escape[3..];
            }
            Some(byte) => {
                decoded.push_str(&format!("%{:02X}", byte));
                rest = &escape[3..];
            }
            None => {
                decoded.push('%');
                rest = &escape[1..];
            }
        }
    }

    decoded.push_str(rest);
    decoded
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}
