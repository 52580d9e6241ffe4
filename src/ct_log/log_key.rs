// src/ct_log/log_key.rs
use anyhow::{Context, Result};
use base64::Engine;
use ring::signature::{self, UnparsedPublicKey};
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;
use x509_parser::x509::SubjectPublicKeyInfo;

use super::types::SignedTreeHead;

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

/// TLS SignatureAndHashAlgorithm values used by RFC 6962 logs
const HASH_SHA256: u8 = 4;
const SIG_RSA: u8 = 1;
const SIG_ECDSA: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    EcdsaP256,
    Rsa,
}

/// A CT log's public key, used to check signed tree heads
#[derive(Debug, Clone)]
pub struct LogKey {
    algorithm: KeyAlgorithm,
    /// subjectPublicKey contents (EC point or PKCS#1 RSAPublicKey)
    public_key: Vec<u8>,
    log_id: [u8; 32],
}

impl LogKey {
    /// Parse a base64 DER SubjectPublicKeyInfo (a PEM body without armour)
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let der = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .context("Failed to decode base64 log key")?;
        Self::from_der(&der)
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, spki) = SubjectPublicKeyInfo::from_der(der)
            .map_err(|e| anyhow::anyhow!("Failed to parse log public key: {:?}", e))?;

        let algorithm = match spki.algorithm.algorithm.to_id_string().as_str() {
            OID_EC_PUBLIC_KEY => KeyAlgorithm::EcdsaP256,
            OID_RSA_ENCRYPTION => KeyAlgorithm::Rsa,
            other => anyhow::bail!("Unsupported log key algorithm {}", other),
        };

        Ok(Self {
            algorithm,
            public_key: spki.subject_public_key.data.to_vec(),
            log_id: Sha256::digest(der).into(),
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// RFC 6962 log ID: SHA-256 of the DER public key
    pub fn log_id_hex(&self) -> String {
        hex::encode(self.log_id)
    }

    /// Check the tree head signature over (timestamp, tree size, root hash)
    pub fn verify_sth(&self, sth: &SignedTreeHead) -> Result<()> {
        let root = sth.root_hash()?;
        let message = tree_head_signature_input(sth.timestamp, sth.tree_size, &root);
        let signed = sth.signature()?;

        if signed.len() < 4 {
            anyhow::bail!("Tree head signature too short: {} bytes", signed.len());
        }
        let (hash_alg, sig_alg) = (signed[0], signed[1]);
        let sig_len = u16::from_be_bytes([signed[2], signed[3]]) as usize;
        let sig = &signed[4..];
        if sig.len() != sig_len {
            anyhow::bail!("Tree head signature length {} does not match {}", sig.len(), sig_len);
        }
        if hash_alg != HASH_SHA256 {
            anyhow::bail!("Unsupported tree head hash algorithm {}", hash_alg);
        }

        let verification: &'static dyn signature::VerificationAlgorithm = match (self.algorithm, sig_alg) {
            (KeyAlgorithm::EcdsaP256, SIG_ECDSA) => &signature::ECDSA_P256_SHA256_ASN1,
            (KeyAlgorithm::Rsa, SIG_RSA) => &signature::RSA_PKCS1_2048_8192_SHA256,
            (_, other) => anyhow::bail!(
                "Tree head signature algorithm {} does not match {:?} log key",
                other,
                self.algorithm
            ),
        };

        UnparsedPublicKey::new(verification, &self.public_key)
            .verify(&message, sig)
            .map_err(|_| anyhow::anyhow!("Tree head signature verification failed"))
    }
}

/// Serialized TreeHeadSignature struct that the log signs
pub fn tree_head_signature_input(timestamp: u64, tree_size: u64, root: &[u8; 32]) -> Vec<u8> {
    let mut message = Vec::with_capacity(2 + 8 + 8 + 32);
    message.push(0); // version v1
    message.push(1); // signature_type tree_hash
    message.extend_from_slice(&timestamp.to_be_bytes());
    message.extend_from_slice(&tree_size.to_be_bytes());
    message.extend_from_slice(root);
    message
}
