// src/ocsp/der.rs
//! DER writing for OCSP requests
//!
//! Only single-byte tags are emitted, which covers everything RFC 6960 uses.
//! Decoding goes through `asn1-rs`.

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_ENUMERATED: u8 = 0x0a;
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
pub const TAG_SEQUENCE: u8 = 0x30;

/// Context-specific tag number `n`, constructed
pub const fn context(n: u8) -> u8 {
    0xa0 | n
}

/// Context-specific tag number `n`, primitive
pub const fn context_primitive(n: u8) -> u8 {
    0x80 | n
}

/// Encode a tag-length-value triple
pub fn encode(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(tag);
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = (len as u32).to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (4 - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

/// Encode a SEQUENCE from already-encoded members
pub fn sequence(members: &[&[u8]]) -> Vec<u8> {
    encode(TAG_SEQUENCE, &members.concat())
}
