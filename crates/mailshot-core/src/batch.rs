//! Loader for scraped contact files.
//!
//! A file holds one record or an array of records:
//!
//! ```json
//! {
//!   "url": "https://acme.com/contact",
//!   "business_info": {
//!     "email": "john@acme.com",
//!     "business name": "Acme Ltd",
//!     "first name": "John",
//!     "surname": "Smith",
//!     "address": "1 High Street",
//!     "phone": "555 0100",
//!     "tax id": "GB123"
//!   }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::Result;
use crate::contacts::{BusinessInfo, ContactCandidate};

/// Top-level shape. Records stay as raw values so one bad record cannot
/// fail the whole file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBatch {
    Many(Vec<Value>),
    One(Map<String, Value>),
}

#[derive(Debug, Default, Deserialize)]
struct RawRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    business_info: RawBusinessInfo,
}

#[derive(Debug, Default, Deserialize)]
struct RawBusinessInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "business name")]
    business_name: Option<String>,
    #[serde(default, rename = "first name")]
    first_name: Option<String>,
    #[serde(default)]
    surname: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default, rename = "tax id")]
    tax_id: Option<String>,
}

impl RawRecord {
    fn into_candidate(self, source: &str) -> Option<ContactCandidate> {
        let info = self.business_info;
        let email = info.email.filter(|e| !e.trim().is_empty())?;
        let business = BusinessInfo {
            business_name: info.business_name,
            first_name: info.first_name,
            surname: info.surname,
            address: info.address,
            phone: info.phone,
            tax_id: info.tax_id,
            url: self.url,
        };
        Some(ContactCandidate::new(email, source).with_business(business))
    }
}

/// Candidates read from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Records that carried an email address, in file order.
    pub candidates: Vec<ContactCandidate>,
    /// Records skipped for lack of an email address.
    pub missing_email: usize,
    /// Records skipped because their fields had the wrong shape.
    pub malformed: usize,
}

/// Parse a batch from JSON text, tagging every candidate with `source`.
///
/// # Errors
///
/// Returns an error if the text is not a record or an array of records.
/// Individual records that fail to decode are counted in
/// [`Batch::malformed`] instead.
pub fn parse_batch(json: &str, source: &str) -> Result<Batch> {
    let records = match serde_json::from_str::<RawBatch>(json)? {
        RawBatch::Many(records) => records,
        RawBatch::One(record) => vec![Value::Object(record)],
    };

    let mut batch = Batch::default();
    for (index, value) in records.into_iter().enumerate() {
        let record = match serde_json::from_value::<RawRecord>(value) {
            Ok(record) => record,
            Err(e) => {
                debug!(index, error = %e, "Skipped malformed record");
                batch.malformed += 1;
                continue;
            }
        };
        match record.into_candidate(source) {
            Some(candidate) => batch.candidates.push(candidate),
            None => batch.missing_email += 1,
        }
    }

    if batch.malformed > 0 {
        warn!(malformed = batch.malformed, "Records could not be decoded");
    }

    if batch.missing_email > 0 {
        debug!(missing = batch.missing_email, "Records without an email address");
    }
    Ok(batch)
}

/// Read and parse a batch file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_batch(path: impl AsRef<Path>, source: &str) -> Result<Batch> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let batch = parse_batch(&json, source)?;
    info!(
        path = %path.display(),
        candidates = batch.candidates.len(),
        missing_email = batch.missing_email,
        malformed = batch.malformed,
        "Loaded batch"
    );
    Ok(batch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_single_record() {
        let batch = parse_batch(
            r#"{"url": "https://acme.com", "business_info": {"email": "John@Acme.com", "business name": "Acme", "tax id": "GB1"}}"#,
            "scrape",
        )
        .unwrap();

        assert_eq!(batch.candidates.len(), 1);
        let candidate = &batch.candidates[0];
        assert_eq!(candidate.email, "John@Acme.com");
        assert_eq!(candidate.source, "scrape");
        assert_eq!(candidate.business.business_name.as_deref(), Some("Acme"));
        assert_eq!(candidate.business.tax_id.as_deref(), Some("GB1"));
        assert_eq!(candidate.business.url.as_deref(), Some("https://acme.com"));
    }

    #[test]
    fn test_array_counts_missing_email() {
        let batch = parse_batch(
            r#"[
                {"business_info": {"email": "a@one.com", "first name": "Ann"}},
                {"business_info": {"business name": "No Email Ltd"}},
                {"business_info": {"email": "  "}},
                {"url": "https://two.com"},
                {"business_info": {"email": "b@two.com", "surname": "Bee"}}
            ]"#,
            "scrape",
        )
        .unwrap();

        let emails: Vec<_> = batch.candidates.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["a@one.com", "b@two.com"]);
        assert_eq!(batch.missing_email, 3);
        assert_eq!(batch.candidates[0].business.first_name.as_deref(), Some("Ann"));
        assert_eq!(batch.candidates[1].business.surname.as_deref(), Some("Bee"));
    }

    #[test]
    fn test_bad_record_does_not_sink_the_file() {
        let batch = parse_batch(
            r#"[
                {"business_info": {"email": "a@b.com"}},
                {"business_info": {"email": 42}},
                "just a string",
                {"business_info": {"email": "c@d.com", "phone": ["555", "0100"]}},
                {"business_info": {"email": "e@f.com"}}
            ]"#,
            "scrape",
        )
        .unwrap();

        let emails: Vec<_> = batch.candidates.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["a@b.com", "e@f.com"]);
        assert_eq!(batch.malformed, 3);
        assert_eq!(batch.missing_email, 0);
    }

    #[test]
    fn test_rejects_non_record_json() {
        assert!(parse_batch("42", "scrape").is_err());
        assert!(parse_batch("not json", "scrape").is_err());
        assert!(parse_batch(r#""a@b.com""#, "scrape").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"business_info": {{"email": "a@one.com"}}}}]"#
        )
        .unwrap();

        let batch = load_batch(file.path(), "file").unwrap();
        assert_eq!(batch.candidates.len(), 1);
        assert_eq!(batch.candidates[0].source, "file");
    }
}
