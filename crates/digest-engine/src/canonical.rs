//! URL canonicalization for exact-duplicate detection.

use url::Url;

/// Query keys dropped outright. Anything starting with `utm_` is dropped too.
const TRACKING_PARAMS: &[&str] = &[
    "ref", "source", "fbclid", "gclid", "mc_cid", "mc_eid", "spm", "igshid",
];

const TRACKING_PREFIXES: &[&str] = &["utm_"];

/// Normalizes a raw URL into a stable dedup key.
///
/// Scheme and host are lower-cased, default ports, tracking parameters,
/// fragments and a trailing path slash are removed. Remaining query
/// parameters keep their order and encoding. Anything that does not parse as
/// an absolute URL with a host is returned unchanged.
pub fn canonicalize_url(raw: &str) -> String {
    let mut url = match Url::parse(raw.trim()) {
        Ok(url) if !url.cannot_be_a_base() && url.host_str().is_some() => url,
        _ => return raw.to_string(),
    };

    // Special schemes already come back lower-cased; opaque hosts do not.
    if let Some(host) = url.host_str() {
        let lowered = host.to_ascii_lowercase();
        if lowered != host && url.set_host(Some(&lowered)).is_err() {
            return raw.to_string();
        }
    }

    // `Url` already elides default ports for http(s).
    url.set_fragment(None);

    let kept_query = url.query().map(strip_tracking_params);
    match kept_query.as_deref() {
        Some(query) if !query.is_empty() => url.set_query(Some(query)),
        _ => url.set_query(None),
    }

    // Only a single trailing slash is cosmetic; `/a//` is a different path.
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') && !path.ends_with("//") {
        let trimmed = path[..path.len() - 1].to_string();
        url.set_path(&trimmed);
    }

    url.to_string()
}

/// Whether a query key is a known tracking parameter.
pub fn is_tracking_param(key: &str) -> bool {
    let decoded = urlencoding::decode(key)
        .map(|k| k.into_owned())
        .unwrap_or_else(|_| key.to_string());
    let lowered = decoded.to_ascii_lowercase();

    TRACKING_PREFIXES.iter().any(|p| lowered.starts_with(p))
        || TRACKING_PARAMS.contains(&lowered.as_str())
}

fn strip_tracking_params(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            !is_tracking_param(key)
        })
        .collect::<Vec<_>>()
        .join("&")
}
