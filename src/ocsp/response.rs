// src/ocsp/response.rs
//! OCSP response decoding (RFC 6960 section 4.2)
//!
//! Only the fields the audit reads are extracted. The responder's signature
//! is not checked.

use anyhow::{Context, Result};
use asn1_rs::{ASN1TimeZone, Any, Class, Enumerated, FromDer, GeneralizedTime, Oid, Tag};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;

use crate::types::CertStatus;

/// id-pkix-ocsp-basic
const OCSP_BASIC_ARCS: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 1];

/// OCSPResponseStatus values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Successful,
    MalformedRequest,
    InternalError,
    TryLater,
    SigRequired,
    Unauthorized,
}

impl ResponseStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Successful => "successful",
            Self::MalformedRequest => "malformedRequest",
            Self::InternalError => "internalError",
            Self::TryLater => "tryLater",
            Self::SigRequired => "sigRequired",
            Self::Unauthorized => "unauthorized",
        };
        f.write_str(label)
    }
}

/// The parts of a successful OCSP response the audit uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    pub status: CertStatus,
    pub produced_at: DateTime<Utc>,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
}

/// Decode a DER `OCSPResponse` and pick the SingleResponse for `serial`
///
/// `serial` is the certificate's serial INTEGER content; leading zero bytes
/// are ignored when matching.
pub fn parse_response(bytes: &[u8], serial: &[u8]) -> Result<OcspResponse> {
    let mut reader = Members::sequence(bytes, "OCSPResponse")?;

    let status = Enumerated::try_from(reader.universal(Tag::Enumerated, "responseStatus")?)
        .map_err(|e| anyhow::anyhow!("malformed responseStatus: {:?}", e))?;
    match ResponseStatus::from_u8(status.0.try_into().unwrap_or(u8::MAX)) {
        Some(ResponseStatus::Successful) => {}
        Some(other) => anyhow::bail!("OCSP response status: {}", other),
        None => anyhow::bail!("unknown OCSP response status {}", status.0),
    }

    let response_bytes = reader
        .tagged(0)?
        .context("successful OCSP response has no responseBytes")?;
    let mut reader = Members::sequence(response_bytes.data, "ResponseBytes")?;

    let response_type = Oid::try_from(reader.universal(Tag::Oid, "responseType")?)
        .map_err(|e| anyhow::anyhow!("malformed responseType: {:?}", e))?;
    let basic_oid = Oid::from(OCSP_BASIC_ARCS)
        .map_err(|e| anyhow::anyhow!("invalid id-pkix-ocsp-basic: {:?}", e))?;
    if response_type != basic_oid {
        anyhow::bail!("unsupported OCSP response type {}", response_type);
    }
    let basic = reader.universal(Tag::OctetString, "response")?;

    parse_basic_response(basic.data, serial)
}

fn parse_basic_response(basic: &[u8], serial: &[u8]) -> Result<OcspResponse> {
    let tbs = Members::sequence(basic, "BasicOCSPResponse")?
        .universal(Tag::Sequence, "ResponseData")?;
    let mut reader = Members::new(tbs.data);

    reader.tagged(0)?;
    if reader.tagged(1)?.is_none() && reader.tagged(2)?.is_none() {
        anyhow::bail!("ResponseData is missing responderID");
    }

    let produced_at = generalized_time(reader.universal(Tag::GeneralizedTime, "producedAt")?)
        .context("bad producedAt")?;
    let responses = reader.universal(Tag::Sequence, "responses")?;

    let wanted = strip_leading_zeros(serial);
    let mut responses = Members::new(responses.data);
    let mut seen = 0;
    while !responses.is_empty() {
        let response = responses.universal(Tag::Sequence, "SingleResponse")?;
        seen += 1;
        let mut reader = Members::new(response.data);

        let cert_id = reader.universal(Tag::Sequence, "certID")?;
        let mut id_reader = Members::new(cert_id.data);
        id_reader.universal(Tag::Sequence, "hashAlgorithm")?;
        id_reader.universal(Tag::OctetString, "issuerNameHash")?;
        id_reader.universal(Tag::OctetString, "issuerKeyHash")?;
        let response_serial = id_reader.universal(Tag::Integer, "serialNumber")?;
        if strip_leading_zeros(response_serial.data) != wanted {
            continue;
        }

        let cert_status = reader.next("certStatus")?;
        let status = match (cert_status.class(), cert_status.tag()) {
            (Class::ContextSpecific, Tag(0)) => CertStatus::Good,
            (Class::ContextSpecific, Tag(1)) => CertStatus::Revoked,
            (Class::ContextSpecific, Tag(2)) => CertStatus::Unknown,
            (class, tag) => anyhow::bail!("unknown certStatus {:?} {:?}", class, tag),
        };

        let this_update = generalized_time(reader.universal(Tag::GeneralizedTime, "thisUpdate")?)
            .context("bad thisUpdate")?;

        let next_update = match reader.tagged(0)? {
            Some(explicit) => Some(
                generalized_time(single(explicit.data, "nextUpdate")?).context("bad nextUpdate")?,
            ),
            None => None,
        };

        return Ok(OcspResponse {
            status,
            produced_at,
            this_update,
            next_update,
        });
    }

    anyhow::bail!(
        "no response for serial {} among {} responses",
        hex::encode(serial),
        seen
    )
}

/// Exactly one element, with nothing after it
fn single<'a>(input: &'a [u8], what: &str) -> Result<Any<'a>> {
    let (rest, element) =
        Any::from_der(input).map_err(|e| anyhow::anyhow!("malformed {}: {:?}", what, e))?;
    if !rest.is_empty() {
        anyhow::bail!("Trailing data after {}", what);
    }
    Ok(element)
}

fn expect_universal(element: &Any<'_>, tag: Tag, what: &str) -> Result<()> {
    if element.class() != Class::Universal || element.tag() != tag {
        anyhow::bail!(
            "Expected {} ({:?}), found {:?} {:?}",
            what,
            tag,
            element.class(),
            element.tag()
        );
    }
    Ok(())
}

/// Members of a constructed element, decoded in order
struct Members<'a> {
    rest: &'a [u8],
}

impl<'a> Members<'a> {
    fn new(content: &'a [u8]) -> Self {
        Self { rest: content }
    }

    /// Members of `input`, which must hold exactly one SEQUENCE
    fn sequence(input: &'a [u8], what: &str) -> Result<Self> {
        let element = single(input, what)?;
        expect_universal(&element, Tag::Sequence, what)?;
        Ok(Self::new(element.data))
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn next(&mut self, what: &str) -> Result<Any<'a>> {
        let (rest, element) =
            Any::from_der(self.rest).map_err(|e| anyhow::anyhow!("malformed {}: {:?}", what, e))?;
        self.rest = rest;
        Ok(element)
    }

    /// Next member, which must be the universal type `tag`
    fn universal(&mut self, tag: Tag, what: &str) -> Result<Any<'a>> {
        let element = self.next(what)?;
        expect_universal(&element, tag, what)?;
        Ok(element)
    }

    /// Next member if it is context-specific `[n]`
    fn tagged(&mut self, n: u32) -> Result<Option<Any<'a>>> {
        if self.rest.is_empty() {
            return Ok(None);
        }
        let (rest, element) =
            Any::from_der(self.rest).map_err(|e| anyhow::anyhow!("malformed [{}]: {:?}", n, e))?;
        if element.class() == Class::ContextSpecific && element.tag() == Tag(n) {
            self.rest = rest;
            Ok(Some(element))
        } else {
            Ok(None)
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Decode a GeneralizedTime, which must be in UTC
fn generalized_time(element: Any<'_>) -> Result<DateTime<Utc>> {
    let raw = String::from_utf8_lossy(element.data).into_owned();
    let time = GeneralizedTime::try_from(element)
        .map_err(|e| anyhow::anyhow!("malformed GeneralizedTime {:?}: {:?}", raw, e))?;
    let at = time.0;
    if !matches!(at.tz, ASN1TimeZone::Z) {
        anyhow::bail!("GeneralizedTime {:?} is not UTC", raw);
    }

    let date = NaiveDate::from_ymd_opt(at.year as i32, at.month.into(), at.day.into())
        .with_context(|| format!("invalid date in {:?}", raw))?;
    let time = NaiveTime::from_hms_milli_opt(
        at.hour.into(),
        at.minute.into(),
        at.second.into(),
        at.millisecond.unwrap_or(0).into(),
    )
    .with_context(|| format!("invalid time in {:?}", raw))?;

    Ok(NaiveDateTime::new(date, time).and_utc())
}
