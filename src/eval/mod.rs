//! Évaluation révocation / expiration d’une clé décodée.

pub mod entity;

use crate::report::Status;
use entity::{effective_expiry, Entity, KeyId, Signature};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::time::{Duration, SystemTime};
use tracing::debug;

const HOUR: u64 = 3600;
const HOUR_NANOS: u128 = HOUR as u128 * 1_000_000_000;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("la fenêtre critique ({critical:?}) dépasse la fenêtre d’avertissement ({warning:?})")]
    Inverted { critical: Duration, warning: Duration },
}

/// Fenêtres de durée de vie restante sous lesquelles une clé est signalée.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    critical: Duration,
    warning: Duration,
}

impl Thresholds {
    pub fn new(critical: Duration, warning: Duration) -> Result<Self, ThresholdError> {
        if critical > warning {
            return Err(ThresholdError::Inverted { critical, warning });
        }
        Ok(Self { critical, warning })
    }

    pub fn critical(&self) -> Duration {
        self.critical
    }

    pub fn warning(&self) -> Duration {
        self.warning
    }
}

/// Certifications tierces autorisées à fixer une durée de vie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IssuerPolicy {
    /// Seulement celles émises par la clé primaire elle-même.
    #[default]
    Primary,
    /// Toutes.
    Any,
}

impl IssuerPolicy {
    fn honours(self, sig: &Signature, primary: KeyId) -> bool {
        match self {
            IssuerPolicy::Any => true,
            IssuerPolicy::Primary => sig.issuer == Some(primary),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub fingerprint: String,
    pub message: String,
    pub status: Status,
}

#[derive(Clone, Copy, Debug)]
enum Origin<'a> {
    Identity(&'a str),
    Subkey(KeyId),
}

#[derive(Clone, Copy, Debug)]
struct Finding<'a> {
    expiry: SystemTime,
    origin: Origin<'a>,
}

/// Classe une expiration selon les seuils. Une expiration passée est toujours CRITICAL.
pub fn classify(expiry: SystemTime, now: SystemTime, thresholds: &Thresholds) -> Status {
    let remaining = match expiry.duration_since(now) {
        Ok(d) => d,
        Err(_) => return Status::Critical,
    };
    if remaining < thresholds.critical {
        Status::Critical
    } else if remaining < thresholds.warning {
        Status::Warning
    } else {
        Status::Ok
    }
}

/// Heures entières jusqu’à `expiry`, arrondies par défaut (négatives une fois passée).
pub fn hours_until(expiry: SystemTime, now: SystemTime) -> i64 {
    match expiry.duration_since(now) {
        Ok(d) => (d.as_secs() / HOUR) as i64,
        Err(e) => -(e.duration().as_nanos().div_ceil(HOUR_NANOS) as i64),
    }
}

/// Toutes les expirations affirmées : identités par label, puis sous-clés
/// dans l’ordre d’entrée. Les sous-clés révoquées sont ignorées.
fn findings(entity: &Entity, policy: IssuerPolicy) -> impl Iterator<Item = Finding<'_>> {
    let primary = &entity.primary;

    let identities = entity.identities.iter().flat_map(move |(label, id)| {
        id.self_signature
            .iter()
            .chain(
                id.signatures
                    .iter()
                    .filter(move |s| policy.honours(s, primary.key_id)),
            )
            .filter_map(move |s| effective_expiry(primary.creation_time, s.key_lifetime))
            .map(move |expiry| Finding {
                expiry,
                origin: Origin::Identity(label),
            })
    });

    let subkeys = entity
        .subkeys
        .iter()
        .filter(|sk| sk.signature.key_lifetime.is_some() && !sk.revoked)
        .filter_map(|sk| {
            effective_expiry(sk.creation_time, sk.signature.key_lifetime).map(|expiry| Finding {
                expiry,
                origin: Origin::Subkey(sk.key_id),
            })
        });

    identities.chain(subkeys)
}

/// Évalue une clé : révocation d’abord, puis la première signature dont
/// l’expiration est pire que OK, sinon l’expiration la plus proche.
pub fn evaluate(
    entity: &Entity,
    now: SystemTime,
    thresholds: &Thresholds,
    policy: IssuerPolicy,
) -> Evaluation {
    let fingerprint = entity.primary.key_id.to_string();

    if !entity.revocations.is_empty() {
        for r in &entity.revocations {
            debug!(key = %fingerprint, created = ?r.created, "signature de révocation");
        }
        return Evaluation {
            message: format!(
                "Key has {} revocation signature(s)",
                entity.revocations.len()
            ),
            fingerprint,
            status: Status::Critical,
        };
    }

    let scan = findings(entity, policy).try_fold(None::<SystemTime>, |earliest, f| {
        let status = classify(f.expiry, now, thresholds);
        debug!(key = %fingerprint, origin = ?f.origin, expires = %humantime::format_rfc3339_seconds(f.expiry), ?status, "expiration");
        if status > Status::Ok {
            ControlFlow::Break((f, status))
        } else {
            ControlFlow::Continue(Some(earliest.map_or(f.expiry, |e: SystemTime| e.min(f.expiry))))
        }
    });

    let (message, status) = match scan {
        ControlFlow::Break((f, status)) => {
            let hours = hours_until(f.expiry, now);
            let message = match f.origin {
                Origin::Identity(label) => {
                    format!("Identity signature for {label:?} has key-expiry in {hours}h")
                }
                Origin::Subkey(id) => format!("Subkey {id} signature has key-expiry in {hours}h"),
            };
            (message, status)
        }
        ControlFlow::Continue(Some(expiry)) => (
            format!("Key looks good (expires in {}h)", hours_until(expiry, now)),
            Status::Ok,
        ),
        ControlFlow::Continue(None) => ("Key looks good (does not expire)".to_string(), Status::Ok),
    };

    Evaluation {
        fingerprint,
        message,
        status,
    }
}
