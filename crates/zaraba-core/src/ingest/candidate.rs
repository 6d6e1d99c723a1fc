use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Which listing a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    /// kabutan market-news listing
    Market,
    /// kabutan realtime IR listing
    Ir,
    /// traders.co.jp wire listing
    Wire,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Market => "kabutan",
            SourceTag::Ir => "kabutan_ir",
            SourceTag::Wire => "traders",
        }
    }
}

/// One listing row as the extractor saw it, before any validation.
///
/// Extractors fill in whatever the markup happened to contain; every field
/// except the source tag may be missing. Dates are RFC 3339 strings — sources
/// with local formats fold them before building the record.
#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub source: SourceTag,
    pub date: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub stock_code: Option<String>,
    pub urgent: bool,
    pub body: Option<String>,
}

impl RawCandidate {
    pub fn new(source: SourceTag) -> Self {
        Self {
            source,
            date: None,
            category: None,
            title: None,
            url: None,
            stock_code: None,
            urgent: false,
            body: None,
        }
    }

    /// Validate into an immutable [`Candidate`], or reject the record.
    ///
    /// Date, category, title and URL are all required; the date must parse
    /// as an RFC 3339 timestamp. Rejected records are dropped by the caller,
    /// never persisted.
    pub fn validate(self) -> Result<Candidate> {
        let date = require(self.date, "date")?;
        let published_at = DateTime::parse_from_rfc3339(&date)
            .map_err(|e| Error::Validation(format!("unparseable date '{}': {}", date, e)))?
            .with_timezone(&Utc);

        Ok(Candidate {
            source: self.source,
            published_at,
            category: require(self.category, "category")?,
            title: require(self.title, "title")?,
            url: require(self.url, "url")?,
            stock_code: self.stock_code,
            urgent: self.urgent,
            body: self.body,
        })
    }
}

fn require(field: Option<String>, name: &str) -> Result<String> {
    match field {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::Validation(format!("missing {}", name))),
    }
}

/// A validated listing item, ready for normalization.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source: SourceTag,
    pub published_at: DateTime<Utc>,
    pub category: String,
    pub title: String,
    pub url: String,
    pub stock_code: Option<String>,
    pub urgent: bool,
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_raw() -> RawCandidate {
        let mut raw = RawCandidate::new(SourceTag::Market);
        raw.date = Some("2025-04-29T18:13:00+09:00".to_string());
        raw.category = Some("決算".to_string());
        raw.title = Some("ABC社、最高益を更新".to_string());
        raw.url = Some("https://kabutan.jp/news/?b=k202504290001".to_string());
        raw
    }

    #[test]
    fn test_complete_candidate_validates() {
        let candidate = complete_raw().validate().unwrap();
        assert_eq!(candidate.category, "決算");
        assert_eq!(candidate.published_at.to_rfc3339(), "2025-04-29T09:13:00+00:00");
        assert!(!candidate.urgent);
    }

    #[test]
    fn test_missing_title_is_rejected() {
        let mut raw = complete_raw();
        raw.title = None;
        assert!(matches!(raw.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let mut raw = complete_raw();
        raw.url = Some(String::new());
        assert!(matches!(raw.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_unparseable_date_is_rejected() {
        let mut raw = complete_raw();
        raw.date = Some("2025/04/29 18:13".to_string());
        assert!(matches!(raw.validate(), Err(Error::Validation(_))));
    }
}
