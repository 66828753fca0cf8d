//! Actor identity.
//!
//! Every replica that edits a document is an actor, identified by the
//! ed25519 public key of its keypair. Actor ids are totally ordered
//! bytewise, which is the tie-break `TimeTicket` uses between replicas
//! that happen to share a Lamport time.

use std::fmt;

use blake3::Hasher;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;
use rand_core::OsRng;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;

/// An actor id: a public key, 32 bytes on the ed25519 curve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub [u8; 32]);

/// A secret key, 32 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySec(pub [u8; 32]);

/// A keypair bundles an actor id with its secret key.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub actor: ActorId,
    pub key_sec: KeySec,
}

/// A signature, 64 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

/// A blake3 hash, 32 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Hash(pub [u8; 32]);

/// Hash a message using blake3.
pub fn hash(message: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(message);
    let result = hasher.finalize();
    return Hash(*result.as_bytes());
}

impl ActorId {
    /// The smallest actor id, owner of the initial ticket.
    pub const INITIAL: ActorId = ActorId([0x00; 32]);

    /// The largest actor id, owner of the maximum ticket.
    pub const MAX: ActorId = ActorId([0xff; 32]);

    /// Verify a signature against this actor's public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let verifying = match VerifyingKey::from_bytes(&self.0) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        return verifying.verify(message, &sig).is_ok();
    }

    /// Parse an actor id from 64 hex digits.
    pub fn from_hex(text: &str) -> Option<ActorId> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(text, &mut out).ok()?;
        return Some(ActorId(out));
    }

    /// Render the id as lowercase hex.
    pub fn to_hex(&self) -> String {
        return hex::encode(self.0);
    }
}

impl KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> KeyPair {
        let signing = SigningKey::generate(&mut OsRng);
        return KeyPair::from_signing(signing);
    }

    /// Derive a deterministic keypair from a seed, for reproducible runs.
    pub fn from_seed(seed: u64) -> KeyPair {
        let secret = hash(&seed.to_le_bytes());
        let signing = SigningKey::from_bytes(&secret.0);
        return KeyPair::from_signing(signing);
    }

    fn from_signing(signing: SigningKey) -> KeyPair {
        let verifying = signing.verifying_key();
        return KeyPair {
            actor: ActorId(verifying.to_bytes()),
            key_sec: KeySec(signing.to_bytes()),
        };
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signing = SigningKey::from_bytes(&self.key_sec.0);
        return Signature(signing.sign(message).to_bytes());
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.to_hex());
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "ActorId({})", hex::encode(self.0));
    }
}

impl fmt::Debug for KeySec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "KeySec(..)");
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "KeyPair {{ actor: {} }}", self.actor.to_hex());
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "Signature({})", hex::encode(self.0));
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "Hash({})", hex::encode(self.0));
    }
}

impl Serialize for ActorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        return serializer.serialize_str(&self.to_hex());
    }
}

impl<'de> Deserialize<'de> for ActorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<ActorId, D::Error> {
        let text = String::deserialize(deserializer)?;
        return ActorId::from_hex(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid actor id: {text:?}")));
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        return serializer.serialize_str(&hex::encode(self.0));
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Signature, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut out = [0u8; 64];
        hex::decode_to_slice(&text, &mut out)
            .map_err(|err| de::Error::custom(format!("invalid signature: {err}")))?;
        return Ok(Signature(out));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let pair = KeyPair::generate();
        let message = b"hello world";
        let signature = pair.sign(message);
        assert!(pair.actor.verify(message, &signature));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let pair = KeyPair::generate();
        let signature = pair.sign(b"hello world");
        assert!(!pair.actor.verify(b"wrong message", &signature));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let pair_a = KeyPair::generate();
        let pair_b = KeyPair::generate();
        let signature = pair_a.sign(b"hello world");
        assert!(!pair_b.actor.verify(b"hello world", &signature));
    }

    #[test]
    fn seeded_pairs_are_deterministic() {
        assert_eq!(KeyPair::from_seed(7).actor, KeyPair::from_seed(7).actor);
        assert_ne!(KeyPair::from_seed(7).actor, KeyPair::from_seed(8).actor);
    }

    #[test]
    fn initial_and_max_bound_every_actor() {
        let actor = KeyPair::generate().actor;
        assert!(ActorId::INITIAL <= actor);
        assert!(actor <= ActorId::MAX);
    }

    #[test]
    fn hex_round_trip() {
        let actor = KeyPair::from_seed(1).actor;
        assert_eq!(ActorId::from_hex(&actor.to_hex()), Some(actor));
        assert_eq!(ActorId::from_hex("abc"), None);
        assert_eq!(ActorId::from_hex(&"zz".repeat(32)), None);
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&ActorId::MAX).unwrap();
        assert_eq!(json, format!("\"{}\"", "ff".repeat(32)));
        let back: ActorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActorId::MAX);
        assert!(serde_json::from_str::<ActorId>("\"00\"").is_err());
    }

    #[test]
    fn signature_serializes_as_hex_string() {
        let pair = KeyPair::from_seed(3);
        let signature = pair.sign(b"edit");
        let json = serde_json::to_string(&signature).unwrap();
        assert_eq!(json.len(), 128 + 2);
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signature);
        assert!(serde_json::from_str::<Signature>("\"abcd\"").is_err());
    }

    #[test]
    fn hash_is_deterministic() {
        let a = hash(b"hello world");
        let b = hash(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_differs_for_different_input() {
        let a = hash(b"hello world");
        let b = hash(b"hello world!");
        assert_ne!(a, b);
    }
}
