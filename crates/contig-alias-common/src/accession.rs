//! Assembly accession value type
//!
//! Assembly accessions look like `GCA_000003055.3` (INSDC/GenBank) or
//! `GCF_000003055.3` (RefSeq): a three letter prefix, an underscore, a nine
//! digit body and a version suffix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Shortest accepted accession, e.g. `GCA_000001405.1`
pub const MIN_ACCESSION_LEN: usize = 15;

const BODY_START: usize = 4;
const BODY_END: usize = 13;

/// Errors raised while validating an accession
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessionError {
    #[error("Accession '{accession}' is shorter than {} characters", MIN_ACCESSION_LEN)]
    TooShort { accession: String },

    #[error("Accession '{accession}' must start with GCA_ or GCF_")]
    UnknownPrefix { accession: String },

    #[error("Accession '{accession}' must carry nine digits after the prefix")]
    MalformedBody { accession: String },
}

/// Which archive family an accession belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessionKind {
    /// `GCA_` accessions issued by the INSDC partners
    Insdc,
    /// `GCF_` accessions curated by NCBI RefSeq
    Refseq,
}

/// A validated assembly accession
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Accession(String);

impl Accession {
    /// Validate and wrap an accession string
    pub fn parse(raw: &str) -> Result<Self, AccessionError> {
        let raw = raw.trim();

        if raw.len() < MIN_ACCESSION_LEN {
            return Err(AccessionError::TooShort {
                accession: raw.to_string(),
            });
        }

        if !(raw.starts_with("GCA_") || raw.starts_with("GCF_")) {
            return Err(AccessionError::UnknownPrefix {
                accession: raw.to_string(),
            });
        }

        let body_is_digits = raw
            .get(BODY_START..BODY_END)
            .map(|body| body.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false);
        if !body_is_digits {
            return Err(AccessionError::MalformedBody {
                accession: raw.to_string(),
            });
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The three letter prefix (`GCA` or `GCF`)
    pub fn prefix(&self) -> &str {
        &self.0[..3]
    }

    /// The nine digit numeric body
    pub fn body(&self) -> &str {
        &self.0[BODY_START..BODY_END]
    }

    /// The nine digit body split into three 3-digit groups
    pub fn digit_groups(&self) -> [&str; 3] {
        let body = self.body();
        [&body[0..3], &body[3..6], &body[6..9]]
    }

    pub fn kind(&self) -> AccessionKind {
        if self.prefix() == "GCF" {
            AccessionKind::Refseq
        } else {
            AccessionKind::Insdc
        }
    }
}

impl FromStr for Accession {
    type Err = AccessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Accession {
    type Error = AccessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Accession> for String {
    fn from(value: Accession) -> Self {
        value.0
    }
}

impl AsRef<str> for Accession {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genbank_accession() {
        let acc = Accession::parse("GCA_004051055.1").unwrap();
        assert_eq!(acc.prefix(), "GCA");
        assert_eq!(acc.body(), "004051055");
        assert_eq!(acc.digit_groups(), ["004", "051", "055"]);
        assert_eq!(acc.kind(), AccessionKind::Insdc);
    }

    #[test]
    fn test_parse_refseq_accession() {
        let acc: Accession = "GCF_000001405.40".parse().unwrap();
        assert_eq!(acc.kind(), AccessionKind::Refseq);
        assert_eq!(acc.to_string(), "GCF_000001405.40");
    }

    #[test]
    fn test_rejects_short_accession() {
        assert!(matches!(
            Accession::parse("GCA_0040510"),
            Err(AccessionError::TooShort { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_prefix() {
        assert!(matches!(
            Accession::parse("ABC_004051055.1"),
            Err(AccessionError::UnknownPrefix { .. })
        ));
    }

    #[test]
    fn test_rejects_non_numeric_body() {
        assert!(matches!(
            Accession::parse("GCA_00405X055.1"),
            Err(AccessionError::MalformedBody { .. })
        ));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let acc = Accession::parse("  GCA_000003055.3\n").unwrap();
        assert_eq!(acc.as_str(), "GCA_000003055.3");
        assert_eq!(String::from(acc), "GCA_000003055.3");
    }
}
