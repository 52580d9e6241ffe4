// src/cert_parser.rs
use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

/// Access method OID for OCSP in the Authority Information Access extension
const OID_AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";

/// DER certificates carried by one CT log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCerts {
    /// The logged certificate (or pre-certificate)
    pub leaf: Vec<u8>,
    /// Accompanying chain, issuer first
    pub chain: Vec<Vec<u8>>,
    pub is_precert: bool,
}

impl EntryCerts {
    /// The issuing certificate, if the log stored a chain
    pub fn issuer(&self) -> Option<&[u8]> {
        self.chain.first().map(|c| c.as_slice())
    }
}

/// Certificate fields the audit needs, copied out of the parsed certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetails {
    /// Raw content octets of the serial number INTEGER
    pub serial: Vec<u8>,
    pub issuer_cn: Option<String>,
    /// DER encoding of the subject Name
    pub subject_der: Vec<u8>,
    /// Content of the subjectPublicKey BIT STRING
    pub public_key: Vec<u8>,
    pub dns_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub ocsp_servers: Vec<String>,
}

impl CertificateDetails {
    /// Serial number as lowercase hex, zero-padded to 32 digits
    pub fn serial_hex(&self) -> String {
        let encoded = hex::encode(&self.serial);
        format!("{:0>32}", encoded.trim_start_matches('0'))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }

    pub fn issuer_name(&self) -> &str {
        self.issuer_cn.as_deref().unwrap_or("")
    }
}

/// Certificate parser for CT log entries
pub struct CertificateParser;

impl CertificateParser {
    /// Parse a DER certificate into the fields used by the audit
    pub fn parse_certificate(der: &[u8]) -> Result<CertificateDetails> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| anyhow::anyhow!("Failed to parse X.509 certificate: {:?}", e))?;

        let mut dns_names = Vec::new();
        let mut ocsp_servers = Vec::new();

        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectAlternativeName(san) => {
                    for name in &san.general_names {
                        if let GeneralName::DNSName(dns) = name {
                            dns_names.push(dns.to_string());
                        }
                    }
                }
                ParsedExtension::AuthorityInfoAccess(aia) => {
                    for desc in &aia.accessdescs {
                        if desc.access_method.to_id_string() != OID_AD_OCSP {
                            continue;
                        }
                        if let GeneralName::URI(uri) = &desc.access_location {
                            ocsp_servers.push(uri.to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        let validity = cert.validity();
        let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0)
            .context("notBefore out of range")?;
        let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0)
            .context("notAfter out of range")?;

        let issuer_cn = cert
            .issuer()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(|cn| cn.to_string());

        Ok(CertificateDetails {
            serial: cert.tbs_certificate.raw_serial().to_vec(),
            issuer_cn,
            subject_der: cert.subject().as_raw().to_vec(),
            public_key: cert.public_key().subject_public_key.data.to_vec(),
            dns_names,
            not_before,
            not_after,
            ocsp_servers,
        })
    }

    /// Decode a CT log entry into its DER certificates
    ///
    /// `leaf_input` is a base64 MerkleTreeLeaf, `extra_data` the base64 chain
    /// data served alongside it by get-entries. Pre-certificate entries are
    /// rejected unless `parse_precerts` is set; when accepted, the
    /// pre-certificate and its chain both come from `extra_data`.
    pub fn parse_log_entry(
        base64_leaf_input: &str,
        base64_extra_data: &str,
        parse_precerts: bool,
    ) -> Result<EntryCerts> {
        let leaf_bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_leaf_input)
            .context("Failed to decode base64 leaf_input")?;
        let extra_bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_extra_data)
            .context("Failed to decode base64 extra_data")?;

        Self::decode_entry(&leaf_bytes, &extra_bytes, parse_precerts)
    }

    /// Same as [`parse_log_entry`](Self::parse_log_entry) on already-decoded bytes
    pub fn decode_entry(leaf: &[u8], extra: &[u8], parse_precerts: bool) -> Result<EntryCerts> {
        // version(1) leaf_type(1) timestamp(8) entry_type(2)
        if leaf.len() < 12 {
            anyhow::bail!("Leaf input too short: {} bytes", leaf.len());
        }
        if leaf[0] != 0 || leaf[1] != 0 {
            anyhow::bail!("Unsupported leaf version {} / type {}", leaf[0], leaf[1]);
        }

        let entry_type = u16::from_be_bytes([leaf[10], leaf[11]]);

        match entry_type {
            0 => {
                let (cert, _) = read_u24_prefixed(&leaf[12..]).context("x509_entry truncated")?;
                let chain = if extra.is_empty() {
                    Vec::new()
                } else {
                    let (list, _) = read_u24_prefixed(extra).context("certificate_chain truncated")?;
                    split_cert_list(list)?
                };

                Ok(EntryCerts {
                    leaf: cert.to_vec(),
                    chain,
                    is_precert: false,
                })
            }
            1 => {
                if !parse_precerts {
                    anyhow::bail!("Precertificate parsing disabled");
                }

                let (precert, rest) =
                    read_u24_prefixed(extra).context("extra_data too short for precert_entry")?;
                let chain = if rest.is_empty() {
                    Vec::new()
                } else {
                    let (list, _) = read_u24_prefixed(rest).context("precertificate_chain truncated")?;
                    split_cert_list(list)?
                };

                Ok(EntryCerts {
                    leaf: precert.to_vec(),
                    chain,
                    is_precert: true,
                })
            }
            _ => {
                anyhow::bail!("Unknown entry type: {}", entry_type);
            }
        }
    }
}

/// Split a 3-byte big-endian length prefix off `data`
fn read_u24_prefixed(data: &[u8]) -> Result<(&[u8], &[u8])> {
    if data.len() < 3 {
        anyhow::bail!("length prefix truncated");
    }
    let len = ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | (data[2] as usize);
    let body = &data[3..];
    if body.len() < len {
        anyhow::bail!("expected {} bytes, found {}", len, body.len());
    }
    Ok((&body[..len], &body[len..]))
}

fn split_cert_list(mut list: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut certs = Vec::new();
    while !list.is_empty() {
        let (cert, rest) = read_u24_prefixed(list).context("chain certificate truncated")?;
        certs.push(cert.to_vec());
        list = rest;
    }
    Ok(certs)
}

/// Encode a body with a 3-byte length prefix (TLS `opaque<0..2^24-1>`)
pub fn encode_u24_prefixed(body: &[u8]) -> Vec<u8> {
    let len = body.len();
    let mut out = Vec::with_capacity(len + 3);
    out.extend_from_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
    out.extend_from_slice(body);
    out
}
