// src/ocsp/request.rs
//! OCSP request encoding (RFC 6960 section 4.1)
//!
//! Requests carry a single SHA-1 CertID, no nonce and no signature, so the
//! same certificate and issuer always encode to the same bytes.

use anyhow::Result;
use sha1::{Digest, Sha1};

use super::der::{self, TAG_INTEGER, TAG_NULL, TAG_OCTET_STRING, TAG_OID};
use crate::cert_parser::CertificateDetails;

/// DER content of OID 1.3.14.3.2.26 (id-sha1)
pub(crate) const OID_SHA1: &[u8] = &[0x2b, 0x0e, 0x03, 0x02, 0x1a];

/// Identifies one certificate to the responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertId {
    pub name_hash: [u8; 20],
    pub key_hash: [u8; 20],
    /// Serial INTEGER content octets, as they appear in the certificate
    pub serial: Vec<u8>,
}

impl CertId {
    pub fn new(cert: &CertificateDetails, issuer: &CertificateDetails) -> Self {
        Self {
            name_hash: Sha1::digest(&issuer.subject_der).into(),
            key_hash: Sha1::digest(&issuer.public_key).into(),
            serial: cert.serial.clone(),
        }
    }

    pub fn to_der(&self) -> Vec<u8> {
        let oid = der::encode(TAG_OID, OID_SHA1);
        let null = der::encode(TAG_NULL, &[]);
        let algorithm = der::sequence(&[oid.as_slice(), null.as_slice()]);

        let name_hash = der::encode(TAG_OCTET_STRING, &self.name_hash);
        let key_hash = der::encode(TAG_OCTET_STRING, &self.key_hash);
        let serial = der::encode(TAG_INTEGER, &self.serial);

        der::sequence(&[
            algorithm.as_slice(),
            name_hash.as_slice(),
            key_hash.as_slice(),
            serial.as_slice(),
        ])
    }
}

/// Build the DER `OCSPRequest` for `cert` issued by `issuer`
///
/// The issuer's subject and key are hashed into the CertID, so a request
/// cannot be built without one.
pub fn build_request(
    cert: &CertificateDetails,
    issuer: Option<&CertificateDetails>,
) -> Result<Vec<u8>> {
    let Some(issuer) = issuer else {
        anyhow::bail!("no issuer certificate in chain for serial {}", cert.serial_hex());
    };
    if cert.serial.is_empty() {
        anyhow::bail!("certificate has an empty serial number");
    }

    let cert_id = CertId::new(cert, issuer).to_der();
    let request = der::sequence(&[cert_id.as_slice()]);
    let request_list = der::sequence(&[request.as_slice()]);
    let tbs_request = der::sequence(&[request_list.as_slice()]);

    Ok(der::sequence(&[tbs_request.as_slice()]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use asn1_rs::{Any, FromDer, Tag};
    use chrono::{TimeZone, Utc};

    /// Elements laid end to end in `content`
    fn members(content: &[u8]) -> Vec<Any<'_>> {
        let mut out = Vec::new();
        let mut rest = content;
        while !rest.is_empty() {
            let (tail, member) = Any::from_der(rest).unwrap();
            out.push(member);
            rest = tail;
        }
        out
    }

    /// CertID members of a single-request OCSPRequest
    fn cert_id(request: &[u8]) -> Vec<Any<'_>> {
        let mut inner = members(request);
        // OCSPRequest, TBSRequest, requestList, Request, CertID
        for _ in 0..5 {
            assert_eq!(inner.len(), 1);
            assert_eq!(inner[0].tag(), Tag::Sequence);
            let content = inner[0].data;
            inner = members(content);
        }
        inner
    }

    /// Serial INTEGER content carried by an OCSPRequest
    pub(crate) fn request_serial(request: &[u8]) -> Vec<u8> {
        let id = cert_id(request);
        assert_eq!(id[3].tag(), Tag::Integer);
        id[3].data.to_vec()
    }

    fn details(serial: &[u8], subject: &[u8], key: &[u8]) -> CertificateDetails {
        CertificateDetails {
            serial: serial.to_vec(),
            issuer_cn: Some("Test CA".to_string()),
            subject_der: subject.to_vec(),
            public_key: key.to_vec(),
            dns_names: vec![],
            not_before: Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            ocsp_servers: vec![],
        }
    }

    #[test]
    fn test_request_structure() {
        let cert = details(&[0x00, 0xfa, 0x01], b"leaf", b"leaf-key");
        let issuer = details(&[0x01], b"issuer-subject", b"issuer-key");

        let request = build_request(&cert, Some(&issuer)).unwrap();

        let id = cert_id(&request);
        assert_eq!(id.len(), 4);

        let algorithm = members(id[0].data);
        assert_eq!(algorithm[0].tag(), Tag::Oid);
        assert_eq!(algorithm[0].data, OID_SHA1);
        assert_eq!(algorithm[1].tag(), Tag::Null);

        assert_eq!(id[1].tag(), Tag::OctetString);
        assert_eq!(id[1].data, Sha1::digest(b"issuer-subject").as_slice());
        assert_eq!(id[2].tag(), Tag::OctetString);
        assert_eq!(id[2].data, Sha1::digest(b"issuer-key").as_slice());
        assert_eq!(request_serial(&request), vec![0x00, 0xfa, 0x01]);
    }

    #[test]
    fn test_request_is_deterministic() {
        let cert = details(&[0x42], b"leaf", b"leaf-key");
        let issuer = details(&[0x01], b"issuer", b"key");

        let first = build_request(&cert, Some(&issuer)).unwrap();
        let second = build_request(&cert, Some(&issuer)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_issuer_fails() {
        let cert = details(&[0x42], b"leaf", b"leaf-key");
        let err = build_request(&cert, None).unwrap_err();
        assert!(err.to_string().contains("no issuer"));
    }

    #[test]
    fn test_empty_serial_fails() {
        let cert = details(&[], b"leaf", b"leaf-key");
        let issuer = details(&[0x01], b"issuer", b"key");
        assert!(build_request(&cert, Some(&issuer)).is_err());
    }
}
