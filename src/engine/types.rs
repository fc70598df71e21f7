use crate::config::SourceDescriptor;
use crate::error::FormatReason;
use std::fmt;
use std::net::IpAddr;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Body of one fetched source, kept only for a single fetch/normalize cycle.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: SourceDescriptor,
    pub body: String,
}

/// A lowercase, trimmed domain name with no address, comment or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainToken(Box<str>);

impl DomainToken {
    /// Normalizes and validates one extracted field.
    ///
    /// A single trailing root dot is dropped, so `ads.example.com.` and
    /// `ads.example.com` produce the same token.
    pub fn parse(field: &str) -> Result<Self, FormatReason> {
        let trimmed = field.trim();
        let name = trimmed.strip_suffix('.').unwrap_or(trimmed);
        if name.is_empty() {
            return Err(FormatReason::MissingField);
        }
        if name.parse::<IpAddr>().is_ok() {
            return Err(FormatReason::IpLiteral(name.to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(FormatReason::TooLong(name.to_string()));
        }

        let valid_labels = name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= MAX_LABEL_LEN
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        });
        // A numeric top-level label is an address fragment, not a name.
        let numeric_tld = name
            .rsplit('.')
            .next()
            .is_some_and(|tld| tld.bytes().all(|b| b.is_ascii_digit()));
        if !valid_labels || numeric_tld {
            return Err(FormatReason::InvalidName(name.to_string()));
        }

        Ok(Self(name.to_ascii_lowercase().into_boxed_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DomainToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
