//! Primary-domain derivation for the same-domain crawl policy.

/// Returns the registrable suffix the crawl is confined to: the last two DNS
/// labels of `host`, or the host itself when it has two labels or fewer.
/// Ports are stripped and the result is lower-cased. `None` for an empty
/// host.
pub fn primary_domain(host: &str) -> Option<String> {
    let host = strip_port(host.trim());
    if host.is_empty() {
        return None;
    }
    let host = host.to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        Some(host)
    } else {
        Some(labels[labels.len() - 2..].join("."))
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 hosts keep their brackets out of the result.
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match host.rsplit_once(':') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => host,
    }
}
