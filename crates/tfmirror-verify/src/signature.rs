//! Detached OpenPGP signature verification over `SHA256SUMS` files.

use std::io::Cursor;

use pgp::{types::*, Deserializable, SignedPublicKey, StandaloneSignature};
use tracing::debug;

use crate::error::{Result, VerifyError};

const BEGIN_MARKER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const END_MARKER: &str = "-----END PGP PUBLIC KEY BLOCK-----";

/// The key that produced a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureVerification {
    /// Uppercase hex key ID of the primary key or signing subkey that matched.
    pub key_id: String,
}

/// Returns `true` if `key` contains both armor markers, BEGIN before END.
pub fn is_valid_key_format(key: &str) -> bool {
    match (key.find(BEGIN_MARKER), key.find(END_MARKER)) {
        (Some(begin), Some(end)) => begin < end,
        _ => false,
    }
}

/// Normalizes line endings to `\n`, trims surrounding whitespace and ensures a trailing newline.
pub fn normalize_key(key: &str) -> String {
    let mut key = key.replace("\r\n", "\n").trim().to_string();
    key.push('\n');
    key
}

fn check_key_format(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(VerifyError::EmptyInput { what: "public key" });
    }
    if !key.contains(BEGIN_MARKER) {
        return Err(VerifyError::InvalidKeyFormat {
            reason: "missing BEGIN marker",
        });
    }
    if !key.contains(END_MARKER) {
        return Err(VerifyError::InvalidKeyFormat {
            reason: "missing END marker",
        });
    }
    if !is_valid_key_format(key) {
        return Err(VerifyError::InvalidKeyFormat {
            reason: "END marker precedes BEGIN marker",
        });
    }
    Ok(())
}

/// Parses an armored keyring holding one or more public keys.
pub fn parse_public_key(key: &str) -> Result<Vec<SignedPublicKey>> {
    check_key_format(key)?;

    let normalized = normalize_key(key);
    let (keys, _headers) =
        SignedPublicKey::from_string_many(&normalized).map_err(VerifyError::KeyParse)?;
    let keys = keys
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(VerifyError::KeyParse)?;

    if keys.is_empty() {
        return Err(VerifyError::InvalidKeyFormat {
            reason: "armor block contains no public key",
        });
    }
    Ok(keys)
}

/// Decodes an armored signature, falling back to raw binary packets.
fn parse_signature(signature: &[u8]) -> Result<StandaloneSignature> {
    match StandaloneSignature::from_armor_single(Cursor::new(signature)) {
        Ok((sig, _headers)) => Ok(sig),
        Err(err) => {
            debug!("signature is not armored ({err}), trying binary packets");
            StandaloneSignature::from_bytes(signature).map_err(VerifyError::SignatureParse)
        }
    }
}

fn key_id_hex(key: &impl PublicKeyTrait) -> String {
    hex::encode_upper(key.key_id())
}

/// Verifies a detached `signature` over `data` with the armored `key`.
///
/// The keyring's primary keys and every subkey are tried in order.
///
/// # Errors
///
/// * [`VerifyError::EmptyInput`] if the key, data or signature is empty.
/// * [`VerifyError::InvalidKeyFormat`] or [`VerifyError::KeyParse`] for a malformed key.
/// * [`VerifyError::SignatureParse`] if the signature is neither armored nor binary OpenPGP.
/// * [`VerifyError::SignatureMismatch`] if no key verifies the signature.
pub fn verify_signature(key: &str, data: &[u8], signature: &[u8]) -> Result<SignatureVerification> {
    if key.trim().is_empty() {
        return Err(VerifyError::EmptyInput { what: "public key" });
    }
    if data.is_empty() {
        return Err(VerifyError::EmptyInput {
            what: "data to verify",
        });
    }
    if signature.is_empty() {
        return Err(VerifyError::EmptyInput { what: "signature" });
    }

    let keys = parse_public_key(key)?;
    let signature = parse_signature(signature)?;

    for key in &keys {
        if signature.verify(key, data).is_ok() {
            return Ok(SignatureVerification {
                key_id: key_id_hex(key),
            });
        }
        for subkey in &key.public_subkeys {
            if signature.verify(subkey, data).is_ok() {
                return Ok(SignatureVerification {
                    key_id: key_id_hex(subkey),
                });
            }
        }
    }

    Err(VerifyError::SignatureMismatch)
}

/// Tries each key in order and returns the first successful verification.
///
/// Blank entries are skipped. If every key fails, the last failure is wrapped
/// in [`VerifyError::AllKeysFailed`].
pub fn verify_with_any_key<S: AsRef<str>>(
    data: &[u8],
    signature: &[u8],
    keys: &[S],
) -> Result<SignatureVerification> {
    if data.is_empty() {
        return Err(VerifyError::EmptyInput {
            what: "data to verify",
        });
    }
    if signature.is_empty() {
        return Err(VerifyError::EmptyInput { what: "signature" });
    }

    let mut tried = 0;
    let mut last_err = None;
    for key in keys.iter().map(AsRef::as_ref) {
        if key.trim().is_empty() {
            continue;
        }
        tried += 1;
        match verify_signature(key, data, signature) {
            Ok(verification) => return Ok(verification),
            Err(err) => {
                debug!("key {tried} did not verify the signature: {err}");
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) => {
            Err(VerifyError::AllKeysFailed {
                tried,
                source: Box::new(err),
            })
        }
        None => Err(VerifyError::NoKeys),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMS: &[u8] = include_bytes!("../testdata/SHA256SUMS");
    const SIG_BINARY: &[u8] = include_bytes!("../testdata/SHA256SUMS.sig");
    const SIG_ARMORED: &[u8] = include_bytes!("../testdata/SHA256SUMS.asc");
    const SIG_SUBKEY: &[u8] = include_bytes!("../testdata/SHA256SUMS.subkey.sig");
    const SIGNER: &str = include_str!("../testdata/signer.asc");
    const UNRELATED: &str = include_str!("../testdata/unrelated.asc");
    const SUBKEY_SIGNER: &str = include_str!("../testdata/subkey_signer.asc");

    #[test]
    fn test_is_valid_key_format() {
        assert!(is_valid_key_format(SIGNER));
        assert!(!is_valid_key_format(""));
        assert!(!is_valid_key_format("not a key"));
        assert!(!is_valid_key_format(
            "-----END PGP PUBLIC KEY BLOCK-----\n-----BEGIN PGP PUBLIC KEY BLOCK-----"
        ));
        assert!(!is_valid_key_format("-----BEGIN PGP PUBLIC KEY BLOCK-----\nabc"));
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  a\r\nb\r\n\r\n"), "a\nb\n");
        assert_eq!(normalize_key("a\n"), "a\n");
        assert_eq!(normalize_key(""), "\n");
    }

    #[test]
    fn test_parse_public_key() {
        let keys = parse_public_key(SIGNER).unwrap();
        assert_eq!(keys.len(), 1);

        let crlf = SIGNER.replace('\n', "\r\n");
        assert_eq!(parse_public_key(&crlf).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_public_key_rejects_garbage() {
        assert!(matches!(
            parse_public_key(""),
            Err(VerifyError::EmptyInput { .. })
        ));
        assert!(matches!(
            parse_public_key("hello"),
            Err(VerifyError::InvalidKeyFormat {
                reason: "missing BEGIN marker"
            })
        ));
        assert!(matches!(
            parse_public_key("-----BEGIN PGP PUBLIC KEY BLOCK-----\n"),
            Err(VerifyError::InvalidKeyFormat {
                reason: "missing END marker"
            })
        ));
        assert!(parse_public_key(
            "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\n<INSERT_KEY_HERE>\n-----END PGP PUBLIC KEY BLOCK-----"
        )
        .is_err());
    }

    #[test]
    fn test_verify_binary_signature() {
        let verification = verify_signature(SIGNER, SUMS, SIG_BINARY).unwrap();
        assert_eq!(verification.key_id, "4643A646CB256FF7");
    }

    #[test]
    fn test_verify_armored_signature() {
        let verification = verify_signature(SIGNER, SUMS, SIG_ARMORED).unwrap();
        assert_eq!(verification.key_id, "4643A646CB256FF7");
    }

    #[test]
    fn test_verify_with_signing_subkey() {
        let verification = verify_signature(SUBKEY_SIGNER, SUMS, SIG_SUBKEY).unwrap();
        assert_eq!(verification.key_id, "E32EFE7A8C2FB4C9");
    }

    #[test]
    fn test_verify_rejects_tampered_data() {
        let mut tampered = SUMS.to_vec();
        tampered[0] = b'f';
        assert!(matches!(
            verify_signature(SIGNER, &tampered, SIG_BINARY),
            Err(VerifyError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        assert!(matches!(
            verify_signature(UNRELATED, SUMS, SIG_BINARY),
            Err(VerifyError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_verify_rejects_empty_inputs() {
        for (key, data, sig) in [
            ("", SUMS, SIG_BINARY),
            (SIGNER, &b""[..], SIG_BINARY),
            (SIGNER, SUMS, &b""[..]),
        ] {
            assert!(matches!(
                verify_signature(key, data, sig),
                Err(VerifyError::EmptyInput { .. })
            ));
        }
    }

    #[test]
    fn test_verify_rejects_garbage_signature() {
        assert!(matches!(
            verify_signature(SIGNER, SUMS, b"definitely not a signature"),
            Err(VerifyError::SignatureParse(_))
        ));
    }

    #[test]
    fn test_verify_with_any_key() {
        let keys = ["", UNRELATED, "   ", SIGNER];
        let verification = verify_with_any_key(SUMS, SIG_BINARY, &keys).unwrap();
        assert_eq!(verification.key_id, "4643A646CB256FF7");
    }

    #[test]
    fn test_verify_with_any_key_all_fail() {
        let keys = vec![UNRELATED.to_string(), "not a key".to_string()];
        match verify_with_any_key(SUMS, SIG_BINARY, &keys) {
            Err(VerifyError::AllKeysFailed { tried, source }) => {
                assert_eq!(tried, 2);
                assert!(matches!(*source, VerifyError::InvalidKeyFormat { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_verify_with_any_key_no_keys() {
        let none: [&str; 0] = [];
        assert!(matches!(
            verify_with_any_key(SUMS, SIG_BINARY, &none),
            Err(VerifyError::NoKeys)
        ));
        assert!(matches!(
            verify_with_any_key(SUMS, SIG_BINARY, &["", "  "]),
            Err(VerifyError::NoKeys)
        ));
    }
}
