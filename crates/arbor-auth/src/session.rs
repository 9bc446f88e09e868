//! Challenge-response session state machine
//!
//! One [`AuthSession`] exists per broadcaster connection attempt. The
//! session is a pure state machine: it owns no socket and sends nothing;
//! callers translate the returned outcomes into wire messages and
//! connection-close decisions.
//!
//! Phases:
//!
//! ```text
//! PreparingChallenge --begin()--> AwaitingResponse --response--> Validated
//!          \                              \
//!           +--> Failed (bad key)          +--> Failed (challenge failed)
//! ```
//!
//! Messages arriving while still in `PreparingChallenge` are transient
//! errors (the connection stays open). After the first response has been
//! latched, later responses are answered "already responded" without
//! re-processing. The latch is a compare-and-swap so that duplicate
//! responses racing each other cannot both be accepted.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;

use arbor_core::ArborError;

use crate::decode_verifying_key;

/// Challenge nonce length in bytes
pub const CHALLENGE_LEN: usize = 16;

/// Raw ECDSA signature length: r ‖ s, 32 bytes each
pub const SIGNATURE_LEN: usize = 64;

/// Session phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// Parsing and importing the claimed identity
    PreparingChallenge = 0,
    /// Challenge sent; waiting for the signed response
    AwaitingResponse = 1,
    /// Identity proven; the node may occupy the tree root
    Validated = 2,
    /// Terminal failure; the connection is to be closed
    Failed = 3,
}

impl Phase {
    fn from_u8(v: u8) -> Phase {
        match v {
            0 => Phase::PreparingChallenge,
            1 => Phase::AwaitingResponse,
            2 => Phase::Validated,
            _ => Phase::Failed,
        }
    }
}

/// Result of starting the session
#[derive(Debug)]
pub enum BeginOutcome {
    /// Key imported; send this challenge to the client
    Challenge([u8; CHALLENGE_LEN]),
    /// Key rejected; report and close
    BadKey(ArborError),
}

/// Result of handling one challenge response
#[derive(Debug)]
pub enum ResponseOutcome {
    /// Signature verified; the session is done
    Validated,
    /// The claimed identity is still being processed; transient error,
    /// connection stays open
    StillPreparing,
    /// A response was already accepted for processing; transient error,
    /// connection stays open
    AlreadyResponded,
    /// Challenge or signature verification failed; report and close
    Rejected(ArborError),
    /// Session already terminal; nothing to do
    Ignored,
}

/// Per-connection authentication state
pub struct AuthSession {
    phase: AtomicU8,
    challenge: [u8; CHALLENGE_LEN],
    claimed_key: String,
    verifying_key: Option<VerifyingKey>,
    /// One-shot latch guarding against duplicate delivery of the
    /// response; set with compare-and-swap before any verification.
    responded: AtomicBool,
}

impl AuthSession {
    /// Create a session for a claimed identity, generating a fresh
    /// random challenge.
    pub fn new(claimed_key: impl Into<String>) -> Self {
        let mut challenge = [0u8; CHALLENGE_LEN];
        OsRng.fill_bytes(&mut challenge);
        Self::with_challenge(claimed_key, challenge)
    }

    /// Create a session with a fixed challenge (deterministic tests)
    pub fn with_challenge(claimed_key: impl Into<String>, challenge: [u8; CHALLENGE_LEN]) -> Self {
        AuthSession {
            phase: AtomicU8::new(Phase::PreparingChallenge as u8),
            challenge,
            claimed_key: claimed_key.into(),
            verifying_key: None,
            responded: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn challenge(&self) -> &[u8; CHALLENGE_LEN] {
        &self.challenge
    }

    pub fn claimed_key(&self) -> &str {
        &self.claimed_key
    }

    /// Decode and import the claimed identity.
    ///
    /// On success the session moves to `AwaitingResponse` and the caller
    /// must send the returned challenge. On failure the session is
    /// terminally `Failed`.
    pub fn begin(&mut self) -> BeginOutcome {
        debug_assert_eq!(self.phase(), Phase::PreparingChallenge);

        match decode_verifying_key(&self.claimed_key) {
            Ok(key) => {
                self.verifying_key = Some(key);
                self.set_phase(Phase::AwaitingResponse);
                tracing::debug!(key = %self.claimed_key, "challenge issued");
                BeginOutcome::Challenge(self.challenge)
            }
            Err(e) => {
                self.set_phase(Phase::Failed);
                tracing::debug!(key = %self.claimed_key, error = %e, "bad claimed key");
                BeginOutcome::BadKey(e)
            }
        }
    }

    /// Handle one `CHALLENGE_RESPONSE` carrying the signed message.
    ///
    /// The signature arrives already length-checked: a response whose
    /// signature is not exactly 64 bytes is a schema error at the wire
    /// layer and never reaches the session, so it neither takes the
    /// latch nor fails the machine.
    ///
    /// Takes `&self`: duplicate responses may be delivered concurrently
    /// and are serialized by the latch, not by exclusive access.
    pub fn handle_response(
        &self,
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
    ) -> ResponseOutcome {
        match self.phase() {
            Phase::PreparingChallenge => return ResponseOutcome::StillPreparing,
            Phase::AwaitingResponse => {}
            Phase::Validated | Phase::Failed => {
                tracing::debug!("response received in terminal phase, ignoring");
                return ResponseOutcome::Ignored;
            }
        }

        // Claim the one-shot latch; the loser of a duplicate race gets
        // "already responded" without re-processing.
        if self
            .responded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return ResponseOutcome::AlreadyResponded;
        }

        if message != self.challenge.as_slice() {
            self.set_phase(Phase::Failed);
            tracing::debug!("response message does not match the issued challenge");
            return ResponseOutcome::Rejected(ArborError::ChallengeMismatch);
        }

        let key = self
            .verifying_key
            .as_ref()
            .expect("verifying key is set in AwaitingResponse");
        let parsed = match Signature::from_slice(signature) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.set_phase(Phase::Failed);
                return ResponseOutcome::Rejected(ArborError::InvalidSignature);
            }
        };
        if key.verify(message, &parsed).is_err() {
            self.set_phase(Phase::Failed);
            tracing::debug!(key = %self.claimed_key, "signature verification failed");
            return ResponseOutcome::Rejected(ArborError::InvalidSignature);
        }

        self.set_phase(Phase::Validated);
        tracing::debug!(key = %self.claimed_key, "broadcaster validated");
        ResponseOutcome::Validated
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::tests::encoded_public_key;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn validated_setup() -> (SigningKey, AuthSession) {
        let signing_key = SigningKey::random(&mut OsRng);
        let mut session = AuthSession::new(encoded_public_key(&signing_key));
        assert!(matches!(session.begin(), BeginOutcome::Challenge(_)));
        (signing_key, session)
    }

    fn sign_challenge(signing_key: &SigningKey, session: &AuthSession) -> [u8; SIGNATURE_LEN] {
        let signature: Signature = signing_key.sign(session.challenge());
        signature.to_vec().try_into().expect("raw r||s signature")
    }

    #[test]
    fn test_short_key_never_reaches_awaiting() {
        let mut session = AuthSession::new(BASE64.encode([0u8; 10]));
        match session.begin() {
            BeginOutcome::BadKey(ArborError::BadKeyLength { actual, .. }) => {
                assert_eq!(actual, 10);
            }
            other => panic!("expected BadKey, got {other:?}"),
        }
        assert_eq!(session.phase(), Phase::Failed);
    }

    #[test]
    fn test_response_before_begin_is_still_preparing() {
        let session = AuthSession::new("irrelevant");
        assert!(matches!(
            session.handle_response(&[0u8; CHALLENGE_LEN], &[0u8; SIGNATURE_LEN]),
            ResponseOutcome::StillPreparing
        ));
        assert_eq!(session.phase(), Phase::PreparingChallenge);
    }

    #[test]
    fn test_valid_response_validates() {
        let (signing_key, session) = validated_setup();
        let signature = sign_challenge(&signing_key, &session);
        assert!(matches!(
            session.handle_response(session.challenge(), &signature),
            ResponseOutcome::Validated
        ));
        assert_eq!(session.phase(), Phase::Validated);
    }

    #[test]
    fn test_wrong_message_fails_even_with_valid_signature() {
        let (signing_key, session) = validated_setup();
        let other_message = [0xABu8; CHALLENGE_LEN];
        let signature: Signature = signing_key.sign(&other_message);
        let raw: [u8; SIGNATURE_LEN] = signature.to_vec().try_into().unwrap();

        assert!(matches!(
            session.handle_response(&other_message, &raw),
            ResponseOutcome::Rejected(ArborError::ChallengeMismatch)
        ));
        assert_eq!(session.phase(), Phase::Failed);
    }

    #[test]
    fn test_signature_from_wrong_key_fails() {
        let (_, session) = validated_setup();
        let impostor = SigningKey::random(&mut OsRng);
        let signature = sign_challenge(&impostor, &session);

        assert!(matches!(
            session.handle_response(session.challenge(), &signature),
            ResponseOutcome::Rejected(ArborError::InvalidSignature)
        ));
    }

    #[test]
    fn test_second_response_is_already_responded() {
        let (signing_key, session) = validated_setup();
        let signature = sign_challenge(&signing_key, &session);

        assert!(matches!(
            session.handle_response(session.challenge(), &signature),
            ResponseOutcome::Validated
        ));
        // A racing duplicate that lost the latch, delivered late
        assert!(matches!(
            session.handle_response(session.challenge(), &signature),
            ResponseOutcome::Ignored | ResponseOutcome::AlreadyResponded
        ));
    }

    #[test]
    fn test_concurrent_duplicates_accept_exactly_one() {
        let (signing_key, session) = validated_setup();
        let signature = sign_challenge(&signing_key, &session);
        let session = Arc::new(session);
        let accepted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                let accepted = Arc::clone(&accepted);
                std::thread::spawn(move || {
                    if matches!(
                        session.handle_response(session.challenge(), &signature),
                        ResponseOutcome::Validated
                    ) {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(session.phase(), Phase::Validated);
    }

    #[test]
    fn test_failed_session_ignores_further_responses() {
        let (signing_key, session) = validated_setup();
        assert!(matches!(
            session.handle_response(&[0u8; CHALLENGE_LEN], &[0u8; SIGNATURE_LEN]),
            ResponseOutcome::Rejected(_)
        ));
        let signature = sign_challenge(&signing_key, &session);
        assert!(matches!(
            session.handle_response(session.challenge(), &signature),
            ResponseOutcome::Ignored
        ));
    }
}
