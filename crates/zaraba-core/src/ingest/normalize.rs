use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use url::Url;

use super::candidate::Candidate;
use crate::{Error, Result};

/// Canonicalize a URL into its deterministic string form.
///
/// Percent-escapes in the path are decoded and an encoded query delimiter is
/// folded back into a literal `?`, so equivalent listing links that differ
/// only in escaping collapse to one canonical key. The query string, when
/// present, is appended as-is.
pub fn normalize_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)?;

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Validation(format!("URL has no host: {}", raw)))?;

    let path = percent_decode_str(parsed.path())
        .decode_utf8()
        .map_err(|e| Error::Validation(format!("invalid percent-encoding in path: {}", e)))?
        .replace("%3F", "?");

    let mut canonical = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        canonical.push_str(&format!(":{}", port));
    }
    canonical.push_str(&path);

    match parsed.query() {
        Some(query) if !query.is_empty() => {
            canonical.push('?');
            canonical.push_str(query);
        }
        _ => {}
    }

    Ok(canonical)
}

/// Digest over (title, raw URL, canonical URL), lowercase hex.
///
/// The raw URL is deliberately part of the tuple: two rows sharing one
/// canonical URL but differing in title or raw query encoding still hash
/// differently. The hash is a secondary identity key next to canonical-URL
/// equality, not a replacement for it.
pub fn identity_hash(title: &str, raw_url: &str, canonical_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(raw_url.as_bytes());
    hasher.update(canonical_url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A candidate with its identity keys attached. Only this form may reach
/// the dedup gate.
#[derive(Debug, Clone)]
pub struct NormalizedCandidate {
    pub candidate: Candidate,
    pub canonical_url: String,
    pub hash: String,
}

/// Attach canonical URL and identity hash to a validated candidate.
/// An unparseable URL rejects the candidate entirely.
pub fn normalize_candidate(candidate: Candidate) -> Result<NormalizedCandidate> {
    let canonical_url = normalize_url(&candidate.url)?;
    let hash = identity_hash(&candidate.title, &candidate.url, &canonical_url);

    Ok(NormalizedCandidate {
        candidate,
        canonical_url,
        hash,
    })
}
