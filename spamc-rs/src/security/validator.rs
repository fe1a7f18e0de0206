//! Request validation
//!
//! Every message bound for spamd passes through [`RequestValidator`]. The
//! only way to obtain a [`ScanRequest`] is [`RequestValidator::validate`],
//! so content that failed validation cannot reach a daemon client.
//!
//! Checks, in order:
//! - size against the configured maximum
//! - emptiness
//! - header structure (`name: value` fields, folded continuations, blank
//!   line before the body)
//! - removal of envelope-routing headers

use std::collections::HashMap;

use crate::config::SecurityConfig;
use crate::error::{Result, SpamError};
use crate::spamc::types::ScanOptions;

/// Envelope-routing headers stripped before content is sent onward
pub const ENVELOPE_HEADERS: &[&str] = &[
    "return-path",
    "envelope-to",
    "delivered-to",
    "x-original-to",
    "original-recipient",
    "x-envelope-from",
    "x-envelope-to",
];

/// Validated, sanitized message ready for the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    content: Vec<u8>,
    options: ScanOptions,
}

impl ScanRequest {
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// One header field, as a byte range of the original message
#[derive(Debug)]
struct HeaderField<'a> {
    name: &'a str,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_size: usize,
    structural_checks: bool,
}

impl RequestValidator {
    /// `structural_checks = false` keeps only the size and emptiness checks
    pub fn new(max_size: usize, structural_checks: bool) -> Self {
        Self {
            max_size,
            structural_checks,
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.max_email_size, config.validation_enabled)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Validate and sanitize `content` into a [`ScanRequest`]
    pub fn validate(&self, content: &str, options: ScanOptions) -> Result<ScanRequest> {
        self.check_size(content)?;

        let content = if self.structural_checks {
            let fields = parse_header_block(content)?;
            strip_envelope_headers(content, &fields)
        } else {
            content.to_string()
        };

        Ok(ScanRequest {
            content: content.into_bytes(),
            options,
        })
    }

    fn check_size(&self, content: &str) -> Result<()> {
        if content.len() > self.max_size {
            return Err(SpamError::ContentTooLarge {
                size: content.len(),
                max: self.max_size,
            });
        }
        if content.is_empty() {
            return Err(SpamError::EmptyContent);
        }
        Ok(())
    }
}

/// Prepend caller-supplied header fields to a message
///
/// Fields are emitted in name order with the message's own line ending.
pub fn prepend_headers(content: &str, headers: &HashMap<String, String>) -> Result<String> {
    if headers.is_empty() {
        return Ok(content.to_string());
    }

    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();

    let mut message = String::with_capacity(content.len() + 64 * headers.len());
    for name in names {
        let value = &headers[name];
        if !is_field_name(name) {
            return Err(SpamError::InvalidFormat("invalid additional header name".to_string()));
        }
        if value.contains(['\r', '\n']) {
            return Err(SpamError::InvalidFormat(format!(
                "additional header {} contains a line break",
                name
            )));
        }
        message.push_str(&format!("{}: {}{}", name, value, eol));
    }
    message.push_str(content);
    Ok(message)
}

/// RFC 5322 field name: printable ASCII except colon
fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

/// Parse the header section; errors never quote message content
fn parse_header_block(content: &str) -> Result<Vec<HeaderField<'_>>> {
    let mut fields: Vec<HeaderField<'_>> = Vec::new();
    let mut offset = 0;

    for (index, segment) in content.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += segment.len();
        let line = segment.trim_end_matches(['\r', '\n']);

        if line.is_empty() {
            // Blank line: the body follows
            break;
        }

        if line.starts_with([' ', '\t']) {
            match fields.last_mut() {
                Some(field) => field.end = offset,
                None => {
                    return Err(SpamError::InvalidFormat(
                        "message starts with a continuation line".to_string(),
                    ))
                }
            }
            continue;
        }

        let name = line
            .split_once(':')
            .map(|(name, _)| name)
            .filter(|name| is_field_name(name))
            .ok_or_else(|| {
                SpamError::InvalidFormat(format!("malformed header line {}", index + 1))
            })?;

        fields.push(HeaderField {
            name,
            start,
            end: offset,
        });
    }

    if fields.is_empty() {
        return Err(SpamError::InvalidFormat("message has no header fields".to_string()));
    }
    Ok(fields)
}

/// Copy the message, dropping envelope-routing fields and their continuations
fn strip_envelope_headers(content: &str, fields: &[HeaderField<'_>]) -> String {
    let mut sanitized = String::with_capacity(content.len());
    let mut cursor = 0;

    for field in fields {
        let denied = ENVELOPE_HEADERS
            .iter()
            .any(|denied| field.name.eq_ignore_ascii_case(denied));
        if denied {
            sanitized.push_str(&content[cursor..field.start]);
            cursor = field.end;
        }
    }
    sanitized.push_str(&content[cursor..]);
    sanitized
}
