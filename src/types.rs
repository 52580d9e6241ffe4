// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Revocation status reported by an OCSP responder for a single certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertStatus {
    Good,
    Revoked,
    Unknown,
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CertStatus::Good => "good",
            CertStatus::Revoked => "revoked",
            CertStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Outcome of querying one eligible certificate's OCSP responder
///
/// Exactly one record exists per certificate that passed the eligibility
/// filter, whether the query succeeded or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Serial number, lowercase hex zero-padded to 32 digits
    pub serial_hex: String,

    /// DNS subject alternative names, in certificate order
    pub dns_names: Vec<String>,

    /// Certificate validity start
    pub not_before: DateTime<Utc>,

    /// OCSP response thisUpdate (absent when the query failed)
    pub this_update: Option<DateTime<Utc>>,

    /// OCSP response nextUpdate (absent when the query failed or the responder omitted it)
    pub next_update: Option<DateTime<Utc>>,

    /// Certificate status from the parsed response
    pub status: Option<CertStatus>,

    /// Round-trip time of the OCSP exchange; absent if no request was sent
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Option<Duration>,

    /// GET-style OCSP URL, used for diagnostics only
    pub request_url: String,

    /// Failure description when the request, fetch, or parse failed
    pub error: Option<String>,
}

impl AuditRecord {
    /// Whether the OCSP query produced a usable response
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// DNS names joined the way they are printed
    pub fn joined_names(&self) -> String {
        self.dns_names.join(", ")
    }
}

fn serialize_millis<S: Serializer>(latency: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match latency {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}

/// Side-channel finding, reported as soon as it is observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Eligible-looking certificate with no OCSP responder URL
    MissingOcspServer { issuer: String },

    /// OCSP round trip exceeded the slow-response threshold
    SlowResponse {
        serial_hex: String,
        latency_ms: u64,
        url: String,
    },

    /// Request build, fetch, read, or parse failure
    QueryFailed { serial_hex: String, message: String },

    /// Response nextUpdate is already in the past
    BadlyOutOfDate {
        serial_hex: String,
        this_update: DateTime<Utc>,
    },

    /// Response thisUpdate is older than the staleness window
    StaleResponse {
        serial_hex: String,
        this_update: DateTime<Utc>,
        url: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingOcspServer { issuer } => {
                write!(f, "No OCSP Server for {}", issuer)
            }
            Diagnostic::SlowResponse {
                serial_hex,
                latency_ms,
                url,
            } => write!(f, "slow response ({}ms) for {}: {}", latency_ms, serial_hex, url),
            Diagnostic::QueryFailed { message, .. } => f.write_str(message),
            Diagnostic::BadlyOutOfDate {
                serial_hex,
                this_update,
            } => write!(f, "Badly out of date response for {}: {}", serial_hex, this_update),
            Diagnostic::StaleResponse {
                serial_hex,
                this_update,
                url,
            } => write!(f, "Out of date response for {}: {} {}", serial_hex, this_update, url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> AuditRecord {
        AuditRecord {
            serial_hex: format!("{:032x}", 0xabcdu64),
            dns_names: vec!["a.example.com".to_string(), "b.example.com".to_string()],
            not_before: Utc.with_ymd_and_hms(2016, 1, 2, 3, 4, 5).unwrap(),
            this_update: None,
            next_update: None,
            status: None,
            latency: Some(Duration::from_millis(250)),
            request_url: "http://ocsp.example.com/MEMw".to_string(),
            error: Some("error fetching OCSP".to_string()),
        }
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(CertStatus::Good.to_string(), "good");
        assert_eq!(CertStatus::Revoked.to_string(), "revoked");
        assert_eq!(CertStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_record_json_uses_milliseconds() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["latency_ms"], 250);
        assert_eq!(json["serial_hex"], "0000000000000000000000000000abcd");
        assert!(json["this_update"].is_null());
    }

    #[test]
    fn test_joined_names() {
        let record = sample_record();
        assert_eq!(record.joined_names(), "a.example.com, b.example.com");
        assert!(!record.is_success());
    }

    #[test]
    fn test_diagnostic_display() {
        let slow = Diagnostic::SlowResponse {
            serial_hex: "00ff".to_string(),
            latency_ms: 9000,
            url: "http://ocsp.example.com/abc".to_string(),
        };
        assert_eq!(
            slow.to_string(),
            "slow response (9000ms) for 00ff: http://ocsp.example.com/abc"
        );

        let missing = Diagnostic::MissingOcspServer {
            issuer: "Some CA".to_string(),
        };
        assert_eq!(missing.to_string(), "No OCSP Server for Some CA");
    }

    #[test]
    fn test_diagnostic_json_is_tagged() {
        let missing = Diagnostic::MissingOcspServer {
            issuer: "Some CA".to_string(),
        };
        let json = serde_json::to_value(&missing).unwrap();
        assert_eq!(json["kind"], "missing_ocsp_server");
    }
}
