//! Récupère, décode et évalue chaque clé configurée.

use crate::config::Config;
use crate::eval::evaluate;
use crate::infra::{KeySource, Retrieve};
use crate::pgp::decode::decode;
use crate::report::{BatchReport, KeyReport, Status};
use std::time::SystemTime;
use tracing::{info, warn};

fn unknown(key: &str, message: String) -> KeyReport {
    KeyReport {
        source: key.to_string(),
        message,
        status: Status::Unknown,
        ..Default::default()
    }
}

/// Évalue une clé. Toute défaillance de récupération ou de décodage donne `Unknown`.
pub fn process_key<R: Retrieve>(key: &str, fetcher: &R, config: &Config, now: SystemTime) -> KeyReport {
    let Some(source) = KeySource::parse(key) else {
        warn!(key, "source de clé inattendue");
        return unknown(key, "Unexpected key source".into());
    };

    let bytes = match fetcher.fetch(&source) {
        Ok(b) => b,
        Err(e) => {
            warn!(key, error = %e, "échec de récupération");
            let message = match source {
                KeySource::Keyserver(_) => "Key retrieval failed".to_string(),
                KeySource::Url(_) | KeySource::File(_) => format!("Key retrieval failed: {e}"),
            };
            return unknown(key, message);
        }
    };

    let wanted = match &source {
        KeySource::Keyserver(id) => Some(id.as_str()),
        KeySource::Url(_) | KeySource::File(_) => None,
    };
    let entity = match decode(&bytes, wanted, now) {
        Ok(entity) => entity,
        Err(e) => {
            warn!(key, error = %e, "échec de décodage");
            return unknown(key, format!("Key decoding failed: {e}"));
        }
    };

    let eval = evaluate(&entity, now, &config.thresholds, config.issuer_policy);
    info!(key, fingerprint = %eval.fingerprint, status = ?eval.status, "{}", eval.message);
    KeyReport {
        source: key.to_string(),
        fingerprint: eval.fingerprint,
        cert_fingerprint: entity.fingerprint,
        message: eval.message,
        status: eval.status,
    }
}

/// Traite tout le lot dans l’ordre d’entrée. Un lot vide reste `Unknown`.
pub fn run<R: Retrieve>(config: &Config, fetcher: &R, now: SystemTime) -> BatchReport {
    if config.keys.is_empty() {
        warn!("aucune clé configurée (--key)");
    }
    let mut report = BatchReport::new(humantime::format_rfc3339_seconds(now).to_string());
    for key in &config.keys {
        report.push(process_key(key, fetcher, config, now));
    }
    report
}
