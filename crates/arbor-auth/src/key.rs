//! Claimed-identity decoding
//!
//! The node key of a broadcaster is the base64 encoding of a raw SEC1
//! uncompressed P-256 point: `0x04 ‖ X(32) ‖ Y(32)`, 65 bytes. The length
//! is checked before any curve math so a malformed key is rejected
//! cheaply and synchronously.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use p256::ecdsa::VerifyingKey;

use arbor_core::{ArborError, ArborResult};

/// Length of a raw uncompressed P-256 public key
pub const RAW_PUBLIC_KEY_LEN: usize = 65;

/// Decode a claimed node key into a verifying key.
///
/// Fails with [`ArborError::BadKeyLength`] before attempting the curve
/// import when the decoded length is not exactly 65 bytes.
pub fn decode_verifying_key(claimed: &str) -> ArborResult<VerifyingKey> {
    let raw = BASE64
        .decode(claimed)
        .map_err(|e| ArborError::InvalidBase64(e.to_string()))?;

    if raw.len() != RAW_PUBLIC_KEY_LEN {
        return Err(ArborError::BadKeyLength {
            expected: RAW_PUBLIC_KEY_LEN,
            actual: raw.len(),
        });
    }

    VerifyingKey::from_sec1_bytes(&raw).map_err(|_| ArborError::BadKeyFormat)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    pub(crate) fn encoded_public_key(signing_key: &SigningKey) -> String {
        let point = signing_key
            .verifying_key()
            .to_encoded_point(false /* uncompressed */);
        BASE64.encode(point.as_bytes())
    }

    #[test]
    fn test_decode_valid_key() {
        let signing_key = SigningKey::random(&mut OsRng);
        let encoded = encoded_public_key(&signing_key);
        let decoded = decode_verifying_key(&encoded).unwrap();
        assert_eq!(&decoded, signing_key.verifying_key());
    }

    #[test]
    fn test_short_key_fails_on_length() {
        let encoded = BASE64.encode([0x04u8; 32]);
        match decode_verifying_key(&encoded) {
            Err(ArborError::BadKeyLength { expected, actual }) => {
                assert_eq!(expected, 65);
                assert_eq!(actual, 32);
            }
            other => panic!("expected BadKeyLength, got {other:?}"),
        }
    }

    #[test]
    fn test_right_length_but_off_curve_fails_on_format() {
        let mut raw = [0u8; 65];
        raw[0] = 0x04; // well-formed prefix, garbage coordinates
        raw[1] = 0xFF;
        let encoded = BASE64.encode(raw);
        assert!(matches!(
            decode_verifying_key(&encoded),
            Err(ArborError::BadKeyFormat)
        ));
    }

    #[test]
    fn test_invalid_base64_fails() {
        assert!(matches!(
            decode_verifying_key("not base64!!!"),
            Err(ArborError::InvalidBase64(_))
        ));
    }
}
