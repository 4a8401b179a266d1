use crate::eval::entity::{Entity, KeyId, PrimaryKey, Revocation, Signature, Subkey};
use sequoia_openpgp as openpgp;
use openpgp::cert::CertParser;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::types::RevocationStatus;
use openpgp::{Cert, KeyID};
use std::time::SystemTime;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed certificate: {0}")]
    Malformed(#[source] anyhow::Error),
    #[error("no certificate found")]
    Empty,
    #[error("unsupported key ID {0}")]
    KeyId(String),
}

/// Décode un certificat ASCII-armored ou binaire.
///
/// Une réponse peut contenir plusieurs certificats (keyring) : on garde
/// celui dont l’empreinte ou le key ID se termine par `wanted`, sinon le
/// premier. La révocation des sous-clés est évaluée à `now` sous la
/// politique standard.
pub fn decode(bytes: &[u8], wanted: Option<&str>, now: SystemTime) -> Result<Entity, DecodeError> {
    let certs = CertParser::from_bytes(bytes)
        .and_then(|parser| parser.collect::<openpgp::Result<Vec<Cert>>>())
        .map_err(DecodeError::Malformed)?;
    let cert = select(certs, wanted)?;
    let policy = StandardPolicy::new();

    let primary = cert.primary_key();
    let mut entity = Entity::new(PrimaryKey {
        key_id: key_id(&primary.key().keyid())?,
        creation_time: primary.key().creation_time(),
    });
    entity.fingerprint = cert.fingerprint().to_hex();
    entity.revocations = primary
        .self_revocations()
        .map(|sig| Revocation {
            created: sig.signature_creation_time(),
        })
        .collect();

    for ua in cert.userids() {
        let label = String::from_utf8_lossy(ua.userid().value()).into_owned();
        let id = entity.identities.entry(label).or_default();
        if let Some(newest) = ua.self_signatures().next() {
            let sig = signature(newest);
            if id.self_signature.is_none() {
                id.self_signature = Some(sig);
            } else {
                // même label deux fois : les liaisons suivantes comptent comme certifications
                id.signatures.push(sig);
            }
        }
        id.signatures.extend(ua.certifications().map(signature));
    }

    for ka in cert.keys().subkeys() {
        let revoked = matches!(
            ka.revocation_status(&policy, now),
            RevocationStatus::Revoked(_)
        );
        let subkey = Subkey {
            key_id: key_id(&ka.key().keyid())?,
            creation_time: ka.key().creation_time(),
            signature: ka.self_signatures().next().map(signature).unwrap_or_default(),
            revoked,
        };
        debug!(subkey = %subkey.key_id, revoked, "sous-clé décodée");
        entity.subkeys.push(subkey);
    }

    debug!(
        key = %entity.primary.key_id,
        fingerprint = %entity.fingerprint,
        identities = entity.identities.len(),
        subkeys = entity.subkeys.len(),
        revocations = entity.revocations.len(),
        "certificat décodé"
    );
    Ok(entity)
}

fn select(mut certs: Vec<Cert>, wanted: Option<&str>) -> Result<Cert, DecodeError> {
    if certs.is_empty() {
        return Err(DecodeError::Empty);
    }
    if certs.len() > 1 {
        debug!(count = certs.len(), "plusieurs certificats reçus");
    }
    let wanted = wanted.map(|w| {
        w.trim_start_matches("0x")
            .trim_start_matches("0X")
            .to_ascii_uppercase()
    });
    let pos = wanted
        .filter(|w| !w.is_empty())
        .and_then(|w| {
            certs.iter().position(|c| {
                c.fingerprint().to_hex().ends_with(&w) || c.keyid().to_hex().ends_with(&w)
            })
        })
        .unwrap_or(0);
    Ok(certs.swap_remove(pos))
}

fn key_id(id: &KeyID) -> Result<KeyId, DecodeError> {
    id.as_u64()
        .map(KeyId)
        .map_err(|_| DecodeError::KeyId(id.to_hex()))
}

fn signature(sig: &openpgp::packet::Signature) -> Signature {
    Signature {
        key_lifetime: sig.key_validity_period(),
        issuer: sig
            .get_issuers()
            .into_iter()
            .map(KeyID::from)
            .find_map(|id| id.as_u64().ok())
            .map(KeyId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{evaluate, IssuerPolicy, Thresholds};
    use crate::report::Status;
    use openpgp::cert::{CertBuilder, SubkeyRevocationBuilder};
    use openpgp::crypto::KeyPair;
    use openpgp::serialize::SerializeInto;
    use openpgp::types::{KeyFlags, ReasonForRevocation};
    use std::time::Duration;

    const HOUR: u64 = 3600;

    fn created() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn thresholds() -> Thresholds {
        Thresholds::new(Duration::from_secs(168 * HOUR), Duration::from_secs(336 * HOUR)).unwrap()
    }

    fn generate(validity: Option<Duration>) -> Cert {
        let (cert, _rev) = CertBuilder::new()
            .set_creation_time(created())
            .add_userid("Alice <alice@example.org>")
            .add_transport_encryption_subkey()
            .set_validity_period(validity)
            .generate()
            .unwrap();
        cert
    }

    fn signer(cert: &Cert) -> KeyPair {
        cert.primary_key()
            .key()
            .clone()
            .parts_into_secret()
            .unwrap()
            .into_keypair()
            .unwrap()
    }

    #[test]
    fn decodes_armored_certificate() {
        let cert = generate(Some(Duration::from_secs(720 * HOUR)));
        let armored = cert.armored().to_vec().unwrap();

        let entity = decode(&armored, None, created()).unwrap();

        assert_eq!(entity.primary.key_id, KeyId(cert.keyid().as_u64().unwrap()));
        assert_eq!(entity.primary.creation_time, created());
        assert_eq!(entity.fingerprint, cert.fingerprint().to_hex());
        assert!(entity.revocations.is_empty());
        assert!(entity.identities.contains_key("Alice <alice@example.org>"));
        assert_eq!(entity.subkeys.len(), 1);
        assert!(!entity.subkeys[0].revoked);
    }

    #[test]
    fn decodes_binary_certificate() {
        let cert = generate(None);
        let binary = cert.to_vec().unwrap();
        let entity = decode(&binary, None, created()).unwrap();
        assert_eq!(entity.fingerprint, cert.fingerprint().to_hex());
    }

    #[test]
    fn keyring_takes_first_or_requested_certificate() {
        let first = generate(None);
        let second = generate(None);
        let mut keyring = first.to_vec().unwrap();
        keyring.extend(second.to_vec().unwrap());

        let entity = decode(&keyring, None, created()).unwrap();
        assert_eq!(entity.fingerprint, first.fingerprint().to_hex());

        let long = format!("0x{}", second.keyid().to_hex());
        let entity = decode(&keyring, Some(&long), created()).unwrap();
        assert_eq!(entity.fingerprint, second.fingerprint().to_hex());

        let hex = second.keyid().to_hex();
        let short = format!("0x{}", hex[8..].to_ascii_lowercase());
        let entity = decode(&keyring, Some(&short), created()).unwrap();
        assert_eq!(entity.fingerprint, second.fingerprint().to_hex());

        let entity = decode(&keyring, Some("0x0000000000000000"), created()).unwrap();
        assert_eq!(entity.fingerprint, first.fingerprint().to_hex());
    }

    #[test]
    fn self_signature_is_issued_by_primary() {
        let cert = generate(None);
        let entity = decode(&cert.armored().to_vec().unwrap(), None, created()).unwrap();
        let alice = &entity.identities["Alice <alice@example.org>"];
        let sig = alice.self_signature.as_ref().unwrap();
        assert_eq!(sig.issuer, Some(entity.primary.key_id));
    }

    #[test]
    fn generated_lifetime_flows_into_evaluation() {
        let cert = generate(Some(Duration::from_secs(720 * HOUR)));
        let entity = decode(&cert.armored().to_vec().unwrap(), None, created()).unwrap();

        let r = evaluate(&entity, created(), &thresholds(), IssuerPolicy::Primary);
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.message, "Key looks good (expires in 720h)");

        let later = created() + Duration::from_secs(600 * HOUR);
        assert_eq!(
            evaluate(&entity, later, &thresholds(), IssuerPolicy::Primary).status,
            Status::Critical
        );
    }

    #[test]
    fn certificate_without_validity_does_not_expire() {
        let cert = generate(None);
        let entity = decode(&cert.armored().to_vec().unwrap(), None, created()).unwrap();
        let r = evaluate(&entity, created(), &thresholds(), IssuerPolicy::Primary);
        assert_eq!(r.message, "Key looks good (does not expire)");
    }

    #[test]
    fn revoked_certificate_is_critical() {
        let (cert, rev) = CertBuilder::new()
            .set_creation_time(created())
            .add_userid("Alice <alice@example.org>")
            .generate()
            .unwrap();
        let cert = cert.insert_packets(rev).unwrap().0;

        let entity = decode(&cert.armored().to_vec().unwrap(), None, created()).unwrap();
        assert_eq!(entity.revocations.len(), 1);

        let r = evaluate(&entity, created(), &thresholds(), IssuerPolicy::Primary);
        assert_eq!(r.status, Status::Critical);
        assert_eq!(r.message, "Key has 1 revocation signature(s)");
    }

    #[test]
    fn revoked_subkey_is_flagged_and_ignored() {
        let (cert, _rev) = CertBuilder::new()
            .set_creation_time(created())
            .add_userid("Alice <alice@example.org>")
            .add_subkey(
                KeyFlags::empty().set_transport_encryption(),
                Duration::from_secs(100 * HOUR),
                None,
            )
            .generate()
            .unwrap();
        let at = created() + Duration::from_secs(2 * HOUR);

        let entity = decode(&cert.armored().to_vec().unwrap(), None, at).unwrap();
        assert!(!entity.subkeys[0].revoked);
        let r = evaluate(&entity, at, &thresholds(), IssuerPolicy::Primary);
        assert_eq!(r.status, Status::Critical);
        assert!(r.message.starts_with("Subkey 0x"), "{}", r.message);

        let subkey = cert.keys().subkeys().next().unwrap().key().clone();
        let sig = SubkeyRevocationBuilder::new()
            .set_reason_for_revocation(ReasonForRevocation::KeyRetired, b"retired")
            .unwrap()
            .set_signature_creation_time(created() + Duration::from_secs(HOUR))
            .unwrap()
            .build(&mut signer(&cert), &cert, &subkey, None)
            .unwrap();
        let cert = cert.insert_packets(sig).unwrap().0;

        let entity = decode(&cert.armored().to_vec().unwrap(), None, at).unwrap();
        assert_eq!(entity.subkeys.len(), 1);
        assert!(entity.subkeys[0].revoked);
        assert!(entity.revocations.is_empty());
        let r = evaluate(&entity, at, &thresholds(), IssuerPolicy::Primary);
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.message, "Key looks good (does not expire)");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode(b"definitely not a key", None, created()).is_err());
        assert!(matches!(
            decode(b"", None, created()),
            Err(DecodeError::Empty) | Err(DecodeError::Malformed(_))
        ));
    }
}
