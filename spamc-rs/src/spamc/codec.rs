//! SPAMC/1.2 frame encoding and spamd response decoding
//!
//! Pure functions: no I/O happens here. The client owns the socket and
//! hands complete byte buffers to [`decode`].

use regex::Regex;
use std::collections::HashMap;

use super::types::{Command, RuleMatch, ScanOptions, ScanResult, PROTOCOL_VERSION};
use crate::error::{Result, SpamError};

/// Marker line that opens the rule table in a REPORT body
pub const RULE_TABLE_MARKER: &str = "pts rule name";

/// Compiled patterns for the spamd response grammar
///
/// Built once at client construction and shared by reference.
#[derive(Debug, Clone)]
pub struct ResponseGrammar {
    status: Regex,
    score: Regex,
    rule: Regex,
}

impl ResponseGrammar {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| SpamError::Config(format!("Invalid pattern: {}", e)))
        };

        Ok(Self {
            status: compile(r"^SPAMD/(\d+\.\d+)\s+(\d+)\s*(.*)$")?,
            score: compile(r"(-?\d+\.?\d*)\s*/\s*(-?\d+\.?\d*)")?,
            rule: compile(r"^(-?\d+\.?\d*)\s+(\w+)(?:\s+(.*))?$")?,
        })
    }
}

/// Build a request frame
///
/// Non-empty content is the caller's responsibility; the codec only frames.
pub fn encode(command: Command, content: &[u8], options: &ScanOptions) -> Vec<u8> {
    if command == Command::Ping {
        return encode_ping();
    }

    let mut frame = format!("{} {}\r\n", command, PROTOCOL_VERSION);
    if options.check_bayes {
        frame.push_str("User: bayes\r\n");
    }
    frame.push_str(&format!("Content-length: {}\r\n", content.len()));
    frame.push_str("\r\n");

    let mut bytes = Vec::with_capacity(frame.len() + content.len());
    bytes.extend_from_slice(frame.as_bytes());
    bytes.extend_from_slice(content);
    bytes
}

/// PING carries no headers and no body
pub fn encode_ping() -> Vec<u8> {
    format!("{} {}\r\n\r\n", Command::Ping, PROTOCOL_VERSION).into_bytes()
}

/// Whether a line read back after PING is a PONG
pub fn is_pong(line: &str) -> bool {
    line.contains("PONG")
}

/// Decode a complete spamd response
pub fn decode(raw: &[u8], verbose: bool, grammar: &ResponseGrammar) -> Result<ScanResult> {
    let text = String::from_utf8_lossy(raw);

    let mut headers = HashMap::new();
    let mut verdict: Option<(f64, f64)> = None;
    let mut body_offset = None;
    let mut consumed = 0;

    for (index, segment) in text.split_inclusive('\n').enumerate() {
        consumed += segment.len();
        let line = segment.trim_end_matches(['\r', '\n']);

        if line.is_empty() && segment.ends_with('\n') {
            body_offset = Some(consumed);
            break;
        }

        if index == 0 && line.starts_with("SPAMD/") {
            check_status_line(line, grammar)?;
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();

        if name.eq_ignore_ascii_case("Spam") {
            if verdict.is_some() {
                return Err(SpamError::MalformedResponse(
                    "multiple spam status lines".to_string(),
                ));
            }
            verdict = Some(parse_verdict(value, grammar)?);
        } else {
            headers.insert(name.to_string(), value.trim().to_string());
        }
    }

    let Some(body_offset) = body_offset else {
        return Err(SpamError::MalformedResponse(
            "response ended before end of headers".to_string(),
        ));
    };
    let Some((score, threshold)) = verdict else {
        return Err(SpamError::MalformedResponse(
            "no spam status line in response".to_string(),
        ));
    };

    let (summary, rules_hit) = if verbose {
        let summary: String = text[body_offset..]
            .lines()
            .map(|line| format!("{}\n", line))
            .collect();
        let rules = parse_rules(&summary, grammar);
        (Some(summary), rules)
    } else {
        (None, Vec::new())
    };

    Ok(ScanResult {
        score,
        threshold,
        rules_hit,
        summary,
        response_headers: headers,
    })
}

fn check_status_line(line: &str, grammar: &ResponseGrammar) -> Result<()> {
    let caps = grammar
        .status
        .captures(line)
        .ok_or_else(|| SpamError::MalformedResponse("invalid status line".to_string()))?;

    if &caps[2] != "0" {
        return Err(SpamError::MalformedResponse(format!(
            "daemon returned {} {}",
            &caps[2],
            caps[3].trim()
        )));
    }
    Ok(())
}

/// Extract `<score>/<threshold>` from the value of a `Spam:` line
fn parse_verdict(value: &str, grammar: &ResponseGrammar) -> Result<(f64, f64)> {
    let caps = grammar.score.captures(value).ok_or_else(|| {
        SpamError::MalformedResponse("invalid spam line format".to_string())
    })?;

    let score = caps[1]
        .parse::<f64>()
        .map_err(|_| SpamError::MalformedResponse(format!("invalid score: {}", &caps[1])))?;
    let threshold = caps[2]
        .parse::<f64>()
        .map_err(|_| SpamError::MalformedResponse(format!("invalid threshold: {}", &caps[2])))?;

    Ok((score, threshold))
}

/// Collect rule rows after the table marker, in report order
fn parse_rules(body: &str, grammar: &ResponseGrammar) -> Vec<RuleMatch> {
    let mut rules = Vec::new();
    let mut in_table = false;

    for line in body.lines() {
        let line = line.trim();

        if line.contains(RULE_TABLE_MARKER) {
            in_table = true;
            continue;
        }
        if !in_table || line.is_empty() {
            continue;
        }

        let Some(caps) = grammar.rule.captures(line) else {
            continue;
        };
        let Ok(score) = caps[1].parse::<f64>() else {
            continue;
        };

        rules.push(RuleMatch {
            name: caps[2].to_string(),
            score,
            description: caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        });
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> ResponseGrammar {
        ResponseGrammar::new().unwrap()
    }

    const REPORT_RESPONSE: &str = "SPAMD/1.1 0 EX_OK\r\n\
Content-length: 512\r\n\
Spam: True ; 7.5 / 5.0\r\n\
\r\n\
Spam detection software has identified this incoming email as possible spam.\r\n\
\r\n\
Content analysis details:   (7.5 points, 5.0 required)\r\n\
\r\n\
 pts rule name              description\r\n\
---- ---------------------- --------------------------------------------------\r\n\
 3.0 URGENT_SUBJECT         Subject contains urgent wording\r\n\
 4.5 MONEY_PRIZE            Body talks about free money\r\n\
-0.1 DKIM_VALID             Message has a valid DKIM signature\r\n";

    #[test]
    fn test_encode_check() {
        let frame = encode(Command::Check, b"Subject: hi\r\n\r\nbody", &ScanOptions::default());
        assert_eq!(
            frame,
            b"CHECK SPAMC/1.2\r\nContent-length: 19\r\n\r\nSubject: hi\r\n\r\nbody".to_vec()
        );
    }

    #[test]
    fn test_encode_report_with_bayes() {
        let options = ScanOptions { check_bayes: true, verbose: true };
        let frame = encode(Command::Report, b"abc", &options);
        assert_eq!(
            String::from_utf8(frame).unwrap(),
            "REPORT SPAMC/1.2\r\nUser: bayes\r\nContent-length: 3\r\n\r\nabc"
        );
    }

    #[test]
    fn test_encode_length_counts_bytes() {
        let frame = encode(Command::Check, "é".as_bytes(), &ScanOptions::default());
        assert!(String::from_utf8(frame).unwrap().contains("Content-length: 2\r\n"));
    }

    #[test]
    fn test_encode_ping() {
        assert_eq!(encode_ping(), b"PING SPAMC/1.2\r\n\r\n".to_vec());
        assert_eq!(encode(Command::Ping, b"ignored", &ScanOptions::default()), encode_ping());
        assert!(is_pong("SPAMD/1.5 0 PONG\r\n"));
        assert!(!is_pong("SPAMD/1.5 76 Bad header line"));
    }

    #[test]
    fn test_decode_check_response() {
        let raw = b"SPAMD/1.1 0 EX_OK\r\nSpam: True ; 15.3 / 5.0\r\n\r\n";
        let result = decode(raw, false, &grammar()).unwrap();

        assert_eq!(result.score, 15.3);
        assert_eq!(result.threshold, 5.0);
        assert!(result.is_spam());
        assert!(result.rules_hit.is_empty());
        assert!(result.summary.is_none());
    }

    #[test]
    fn test_decode_compact_score_token() {
        let raw = b"Spam: False ; -1.2/5.0\n\n";
        let result = decode(raw, false, &grammar()).unwrap();
        assert_eq!(result.score, -1.2);
        assert!(!result.is_spam());
    }

    #[test]
    fn test_decode_boundary_is_spam() {
        let raw = b"Spam: True ; 5.0 / 5.0\r\n\r\n";
        assert!(decode(raw, false, &grammar()).unwrap().is_spam());
    }

    #[test]
    fn test_decode_report_rules_in_order() {
        let result = decode(REPORT_RESPONSE.as_bytes(), true, &grammar()).unwrap();

        let names: Vec<&str> = result.rules_hit.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["URGENT_SUBJECT", "MONEY_PRIZE", "DKIM_VALID"]);
        assert_eq!(result.rules_hit[1].score, 4.5);
        assert_eq!(result.rules_hit[1].description, "Body talks about free money");
        assert_eq!(result.rules_hit[2].score, -0.1);

        let summary = result.summary.unwrap();
        assert!(summary.starts_with("Spam detection software"));
        assert!(!summary.contains('\r'));
    }

    #[test]
    fn test_decode_does_not_recompute_score() {
        let result = decode(REPORT_RESPONSE.as_bytes(), true, &grammar()).unwrap();
        let sum: f64 = result.rules_hit.iter().map(|r| r.score).sum();
        assert_eq!(result.score, 7.5);
        assert!((sum - 7.4).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rules_ignored_when_terse() {
        let result = decode(REPORT_RESPONSE.as_bytes(), false, &grammar()).unwrap();
        assert!(result.rules_hit.is_empty());
        assert!(result.summary.is_none());
    }

    #[test]
    fn test_decode_rows_before_marker_ignored() {
        let raw = "Spam: True ; 9.0 / 5.0\n\n 2.0 EARLY_RULE   not in table\n pts rule name description\n 9.0 LATE_RULE    in table\n";
        let result = decode(raw.as_bytes(), true, &grammar()).unwrap();
        assert_eq!(result.rules_hit.len(), 1);
        assert_eq!(result.rules_hit[0].name, "LATE_RULE");
    }

    #[test]
    fn test_decode_headers_last_wins() {
        let raw = b"X-Test: one\r\nSpam: False ; 0.0 / 5.0\r\nX-Test:  two \r\nnot a header\r\n\r\n";
        let result = decode(raw, false, &grammar()).unwrap();
        assert_eq!(result.response_headers.get("X-Test").map(String::as_str), Some("two"));
        assert!(!result.response_headers.contains_key("Spam"));
    }

    #[test]
    fn test_decode_missing_status_line() {
        let raw = b"SPAMD/1.1 0 EX_OK\r\nContent-length: 0\r\n\r\n";
        assert!(matches!(
            decode(raw, false, &grammar()),
            Err(SpamError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_status_after_blank_line_not_used() {
        let raw = b"Content-length: 0\r\n\r\nSpam: True ; 15.3 / 5.0\r\n";
        assert!(matches!(
            decode(raw, true, &grammar()),
            Err(SpamError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_eof_before_blank_line() {
        let raw = b"Spam: True ; 15.3 / 5.0\r\n";
        assert!(matches!(
            decode(raw, false, &grammar()),
            Err(SpamError::MalformedResponse(_))
        ));
        assert!(matches!(decode(b"", false, &grammar()), Err(SpamError::MalformedResponse(_))));
    }

    #[test]
    fn test_decode_unparsable_spam_line() {
        let raw = b"Spam: True ; lots / some\r\n\r\n";
        assert!(matches!(
            decode(raw, false, &grammar()),
            Err(SpamError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_daemon_error_status() {
        let raw = b"SPAMD/1.0 76 Bad header line: (Content-length mismatch)\r\n\r\n";
        match decode(raw, false, &grammar()) {
            Err(SpamError::MalformedResponse(msg)) => assert!(msg.contains("76")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_check() {
        let content = b"Subject: test\r\n\r\nhello";
        let frame = encode(Command::Check, content, &ScanOptions::default());
        assert!(frame.starts_with(b"CHECK SPAMC/1.2\r\n"));
        assert!(frame.ends_with(content));

        let response = b"SPAMD/1.1 0 EX_OK\r\nSpam: True ; 15.3 / 5.0\r\n\r\n";
        let result = decode(response, false, &grammar()).unwrap();
        assert_eq!((result.score, result.threshold, result.is_spam()), (15.3, 5.0, true));
    }
}
