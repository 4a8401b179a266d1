use comfy_table::{Cell, Table};
use serde::{Deserialize, Serialize};
use std::fs;

/// Codes de sortie (convention des plugins de supervision).
#[derive(Clone, Copy, Debug)]
pub enum ExitCode {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

/// État d’une clé, ordonné par gravité.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Unknown,
    Ok,
    Warning,
    Critical,
}

impl Status {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Status::Unknown => ExitCode::Unknown,
            Status::Ok => ExitCode::Ok,
            Status::Warning => ExitCode::Warning,
            Status::Critical => ExitCode::Critical,
        }
    }
}

/// Replie l’état d’une clé dans l’état courant du lot.
///
/// Le pire des deux l’emporte. `Unknown` est la valeur initiale, remplacée
/// par tout résultat concret.
pub fn combine(current: Status, next: Status) -> Status {
    current.max(next)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeyReport {
    pub source: String,
    /// `0x` + key ID sur 16 chiffres hexadécimaux.
    pub fingerprint: String,
    /// Empreinte complète du certificat, vide si la clé n’a pas été décodée.
    pub cert_fingerprint: String,
    pub message: String,
    pub status: Status,
}

impl KeyReport {
    /// `0x<8 derniers caractères de la source>: <message>`
    pub fn line(&self) -> String {
        let tail = self
            .source
            .char_indices()
            .rev()
            .nth(7)
            .map_or(self.source.as_str(), |(i, _)| &self.source[i..]);
        format!("0x{tail}: {}", self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchReport {
    pub generated_at: String,
    pub status: Status,
    pub keys: Vec<KeyReport>,
    pub messages: Vec<String>,
}

impl BatchReport {
    pub fn new(generated_at: String) -> Self {
        Self {
            generated_at,
            ..Default::default()
        }
    }

    pub fn push(&mut self, key: KeyReport) {
        self.status = combine(self.status, key.status);
        self.messages.push(key.line());
        self.keys.push(key);
    }
}

pub fn print_table(r: &BatchReport) {
    let mut t = Table::new();
    t.set_header(vec!["Key", "Fingerprint", "Status", "Detail"]);
    for k in &r.keys {
        t.add_row(vec![
            Cell::new(&k.source),
            Cell::new(if k.fingerprint.is_empty() { "-" } else { k.fingerprint.as_str() }),
            Cell::new(format!("{:?}", k.status)),
            Cell::new(&k.message),
        ]);
    }
    println!("{t}");
    println!("Overall: {:?}", r.status);
}

pub fn write_json(r: &BatchReport, path: &str) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(r)?;
    fs::write(path, json)?;
    Ok(())
}
