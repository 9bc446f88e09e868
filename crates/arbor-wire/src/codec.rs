//! Base64 helpers with length guards

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use arbor_core::{ArborError, ArborResult};

pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode(encoded: &str) -> ArborResult<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| ArborError::InvalidBase64(e.to_string()))
}

/// Decode a base64 string that must contain exactly `N` bytes
pub fn decode_exact<const N: usize>(encoded: &str) -> ArborResult<[u8; N]> {
    let raw = decode(encoded)?;
    let len = raw.len();
    raw.try_into().map_err(|_| ArborError::BadSignatureLength {
        expected: N,
        actual: len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let bytes = [1u8, 2, 3, 255];
        assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_decode_exact_length_mismatch() {
        let encoded = encode(&[0u8; 3]);
        assert!(decode_exact::<4>(&encoded).is_err());
        assert_eq!(decode_exact::<3>(&encoded).unwrap(), [0u8; 3]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("!!not-base64!!").is_err());
    }
}
