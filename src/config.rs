use crate::eval::{IssuerPolicy, ThresholdError, Thresholds};
use crate::infra::fs::Limits;
use std::time::Duration;

pub const DEFAULT_KEY_SERVER: &str = "http://keyserver.ubuntu.com/pks/lookup";

/// Paramètres validés de la sonde. Une liste de clés vide est permise
/// et donne un lot UNKNOWN.
#[derive(Clone, Debug)]
pub struct Config {
    pub keys: Vec<String>,
    pub thresholds: Thresholds,
    pub issuer_policy: IssuerPolicy,
    pub key_server: String,
    pub timeout: Duration,
    pub limits: Limits,
}

impl Config {
    pub fn new(keys: Vec<String>, critical: Duration, warning: Duration) -> Result<Self, ThresholdError> {
        Ok(Self {
            keys,
            thresholds: Thresholds::new(critical, warning)?,
            issuer_policy: IssuerPolicy::default(),
            key_server: DEFAULT_KEY_SERVER.to_string(),
            timeout: Duration::from_secs(30),
            limits: Limits::from_kib(1024),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn defaults() {
        let c = Config::new(vec!["0xAB".into()], 7 * DAY, 14 * DAY).unwrap();
        assert_eq!(c.thresholds.critical(), 7 * DAY);
        assert_eq!(c.thresholds.warning(), 14 * DAY);
        assert_eq!(c.issuer_policy, IssuerPolicy::Primary);
        assert_eq!(c.key_server, DEFAULT_KEY_SERVER);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(matches!(
            Config::new(vec!["0xAB".into()], 14 * DAY, 7 * DAY),
            Err(ThresholdError::Inverted { .. })
        ));
    }

    #[test]
    fn accepts_empty_key_list() {
        let c = Config::new(vec![], DAY, DAY).unwrap();
        assert!(c.keys.is_empty());
    }
}
