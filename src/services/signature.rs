//! Webhook signature verification.
//!
//! Each payment method declares the algorithm its gateway signs callbacks
//! with. Verification fails closed: an unknown algorithm, an empty secret, a
//! malformed signature or a mismatch all reject the event.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Signing scheme of a gateway's webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// Hex HMAC-SHA256 of the raw body, optionally prefixed `sha256=`
    HmacSha256,
    /// Hex HMAC-SHA512 of the raw body, optionally prefixed `sha512=`
    HmacSha512,
    /// Hex MD5 of the raw body followed by the secret
    Md5Keyed,
    /// The header carries the secret itself
    SharedSecret,
    /// Base64 RSA PKCS#1 v1.5 SHA-256 signature; the secret is a PEM public key
    RsaSha256,
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hmac_sha256" => Ok(SignatureAlgorithm::HmacSha256),
            "hmac_sha512" => Ok(SignatureAlgorithm::HmacSha512),
            "md5_keyed" => Ok(SignatureAlgorithm::Md5Keyed),
            "shared_secret" => Ok(SignatureAlgorithm::SharedSecret),
            "rsa_sha256" => Ok(SignatureAlgorithm::RsaSha256),
            other => Err(format!("unknown signature algorithm: {other}")),
        }
    }
}

/// Verify a webhook body against its signature header.
pub fn verify(
    raw_body: &[u8],
    header_signature: &str,
    shared_secret: &str,
    algorithm: SignatureAlgorithm,
) -> bool {
    let signature = header_signature.trim();
    if signature.is_empty() || shared_secret.is_empty() {
        return false;
    }

    match algorithm {
        SignatureAlgorithm::HmacSha256 => {
            let Ok(expected) = hex::decode(signature.trim_start_matches("sha256=")) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(shared_secret.as_bytes()) else {
                return false;
            };
            mac.update(raw_body);
            mac.verify_slice(&expected).is_ok()
        }
        SignatureAlgorithm::HmacSha512 => {
            let Ok(expected) = hex::decode(signature.trim_start_matches("sha512=")) else {
                return false;
            };
            let Ok(mut mac) = HmacSha512::new_from_slice(shared_secret.as_bytes()) else {
                return false;
            };
            mac.update(raw_body);
            mac.verify_slice(&expected).is_ok()
        }
        SignatureAlgorithm::Md5Keyed => {
            let mut input = Vec::with_capacity(raw_body.len() + shared_secret.len());
            input.extend_from_slice(raw_body);
            input.extend_from_slice(shared_secret.as_bytes());
            let expected = format!("{:x}", md5::compute(&input));
            constant_time_eq(
                expected.as_bytes(),
                signature.to_ascii_lowercase().as_bytes(),
            )
        }
        SignatureAlgorithm::SharedSecret => {
            constant_time_eq(signature.as_bytes(), shared_secret.as_bytes())
        }
        SignatureAlgorithm::RsaSha256 => verify_rsa(raw_body, signature, shared_secret),
    }
}

fn verify_rsa(raw_body: &[u8], signature: &str, public_key_pem: &str) -> bool {
    let Ok(public_key) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
        tracing::warn!("Configured RSA webhook key is not a valid PEM public key");
        return false;
    };
    let Ok(bytes) = BASE64.decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key)
        .verify(raw_body, &signature)
        .is_ok()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
