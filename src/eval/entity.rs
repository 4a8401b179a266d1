//! Certificat décodé, réduit à ce que regarde l’évaluation d’expiration.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Key ID OpenPGP sur 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u64);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct PrimaryKey {
    pub key_id: KeyId,
    pub creation_time: SystemTime,
}

/// Auto-signature ou certification tierce.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    /// `None` si la signature n’affirme aucune expiration.
    pub key_lifetime: Option<Duration>,
    pub issuer: Option<KeyId>,
}

#[derive(Clone, Debug, Default)]
pub struct Identity {
    pub self_signature: Option<Signature>,
    pub signatures: Vec<Signature>,
}

#[derive(Clone, Debug)]
pub struct Subkey {
    pub key_id: KeyId,
    pub creation_time: SystemTime,
    /// Signature de liaison.
    pub signature: Signature,
    /// État de révocation au moment du décodage.
    pub revoked: bool,
}

/// Signature de révocation de la clé primaire. Seul le nombre compte.
#[derive(Clone, Debug)]
pub struct Revocation {
    pub created: Option<SystemTime>,
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub primary: PrimaryKey,
    /// Empreinte hexadécimale complète de la clé primaire.
    pub fingerprint: String,
    pub revocations: Vec<Revocation>,
    /// Indexé par label, parcouru dans l’ordre lexicographique.
    pub identities: BTreeMap<String, Identity>,
    pub subkeys: Vec<Subkey>,
}

impl Entity {
    pub fn new(primary: PrimaryKey) -> Self {
        Self {
            primary,
            fingerprint: String::new(),
            revocations: Vec::new(),
            identities: BTreeMap::new(),
            subkeys: Vec::new(),
        }
    }
}

/// `creation + lifetime`, ou `None` sans durée de vie affirmée.
///
/// Une durée de vie qui déborde l’horloge vaut « n’expire pas ».
pub fn effective_expiry(creation: SystemTime, lifetime: Option<Duration>) -> Option<SystemTime> {
    lifetime.and_then(|l| creation.checked_add(l))
}
