//! Line-level extraction of domain names from hosts files and plain lists.
//!
//! Every line goes through the same steps: leading whitespace is dropped,
//! comment and blank lines are skipped, tabs and runs of spaces collapse into
//! single separators, a literal `0.0.0.0 ` or `127.0.0.1 ` prefix is removed,
//! and the first remaining field that is not an address is the domain.

use super::types::DomainToken;
use crate::config::SourceFormat;
use crate::error::{FormatError, FormatReason};
use std::net::IpAddr;

const ZERO_PREFIX: &str = "0.0.0.0";
const LOOPBACK_PREFIX: &str = "127.0.0.1";

/// Content lines inspected when a source asks for `auto`.
const SNIFF_LINES: usize = 50;

/// Names that hosts files carry as boilerplate rather than as blocked hosts.
const LOCAL_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
];

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    format: SourceFormat,
    skip_local_names: bool,
}

impl Normalizer {
    pub fn new(format: SourceFormat, skip_local_names: bool) -> Self {
        Self {
            format,
            skip_local_names,
        }
    }

    /// Builds a normalizer for `text`, sniffing the format when `declared` is `auto`.
    pub fn for_document(declared: SourceFormat, text: &str, skip_local_names: bool) -> Self {
        let format = match declared {
            SourceFormat::Auto => sniff_format(text),
            other => other,
        };
        Self::new(format, skip_local_names)
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Lazily yields one result per content line, in document order.
    /// Comment, blank and skipped local-name lines yield nothing.
    pub fn lines<'a>(
        &'a self,
        text: &'a str,
    ) -> impl Iterator<Item = Result<DomainToken, FormatError>> + 'a {
        text.lines()
            .enumerate()
            .filter_map(move |(idx, line)| self.parse_line(idx + 1, line).transpose())
    }

    /// Tokens only; malformed lines are dropped.
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = DomainToken> + 'a {
        self.lines(text).filter_map(Result::ok)
    }

    fn parse_line(&self, line_no: usize, line: &str) -> Result<Option<DomainToken>, FormatError> {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let field = Self::extract_field(line)
            .ok_or(FormatError {
                line: line_no,
                reason: FormatReason::MissingField,
            })?;

        let token = DomainToken::parse(field).map_err(|reason| FormatError {
            line: line_no,
            reason,
        })?;

        if self.skip_local_names && LOCAL_NAMES.contains(&token.as_str()) {
            return Ok(None);
        }
        Ok(Some(token))
    }

    fn extract_field(line: &str) -> Option<&str> {
        // Splitting on tabs and spaces while skipping empty pieces is the same
        // as collapsing every whitespace run to one space and splitting on it.
        let fields: Vec<&str> = line
            .split([' ', '\t'])
            .filter(|f| !f.is_empty())
            .collect();

        // The two historical prefixes are stripped regardless of format, but
        // only when a field follows: a bare "0.0.0.0" is not a prefix.
        let fields = match fields.as_slice() {
            [first, rest @ ..]
                if !rest.is_empty() && (*first == ZERO_PREFIX || *first == LOOPBACK_PREFIX) =>
            {
                rest
            }
            all => all,
        };

        // Every format takes the first non-address field, so extra columns
        // and an unexpected address column never fail a line. Anything from
        // an inline comment onwards is not a field.
        fields
            .iter()
            .copied()
            .take_while(|f| !f.starts_with('#'))
            .find(|f| f.parse::<IpAddr>().is_err())
    }
}

/// Guesses the format of a document from its first content lines.
pub fn sniff_format(text: &str) -> SourceFormat {
    let mut total = 0usize;
    let mut zero = 0usize;
    let mut loopback = 0usize;
    let mut other_ip = 0usize;

    let content = text
        .lines()
        .map(str::trim_start)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .take(SNIFF_LINES);

    for line in content {
        total += 1;
        let mut fields = line.split([' ', '\t']).filter(|f| !f.is_empty());
        let first = fields.next().unwrap_or_default();
        let has_second = fields.next().is_some();
        if !has_second {
            continue;
        }
        if first == ZERO_PREFIX {
            zero += 1;
        } else if first == LOOPBACK_PREFIX {
            loopback += 1;
        } else if first.parse::<IpAddr>().is_ok() {
            other_ip += 1;
        }
    }

    if total == 0 {
        SourceFormat::RawDomainList
    } else if zero * 2 > total {
        SourceFormat::HostsFileIPv4Zero
    } else if loopback * 2 > total {
        SourceFormat::HostsFileLoopback
    } else if (zero + loopback + other_ip) * 2 > total {
        SourceFormat::GenericTabular
    } else {
        SourceFormat::RawDomainList
    }
}
