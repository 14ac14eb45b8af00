use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::domain::DigestType;

const SECTION: &str = "mailing";
const REQUIRED_KEYS: [&str; 4] = ["header", "headerVacancies", "headerCV", "offersCount"];

/// Digest strings for one language. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationCatalog {
    language: String,
    entries: BTreeMap<String, String>,
}

impl TranslationCatalog {
    pub fn new(
        language: impl Into<String>,
        entries: BTreeMap<String, String>,
    ) -> Result<Self, TranslationError> {
        let language = language.into();
        if let Some(key) = REQUIRED_KEYS.iter().find(|key| !entries.contains_key(**key)) {
            return Err(TranslationError::MissingKey {
                language,
                key: (*key).to_string(),
            });
        }
        Ok(Self { language, entries })
    }

    /// Parses the `mailing` section of a YAML locale document.
    pub fn from_yaml_str(language: &str, raw: &str) -> Result<Self, TranslationError> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|source| TranslationError::Parse {
                language: language.to_string(),
                source,
            })?;
        let section = document
            .get(SECTION)
            .cloned()
            .ok_or_else(|| TranslationError::MissingSection {
                language: language.to_string(),
            })?;
        let entries: BTreeMap<String, String> =
            serde_yaml::from_value(section).map_err(|source| TranslationError::Parse {
                language: language.to_string(),
                source,
            })?;
        Self::new(language, entries)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Header variant shown above the listings.
    pub fn header_for(&self, digest_type: DigestType) -> &str {
        let key = match digest_type {
            DigestType::Cv => "headerCV",
            DigestType::Vacancies | DigestType::Universal => "headerVacancies",
        };
        self.get(key).unwrap_or_default()
    }

    /// Strings handed to the mail template, with the header and count noun resolved.
    pub fn for_digest(&self, header: &str, offers_count: &str) -> BTreeMap<String, String> {
        let mut strings = self.entries.clone();
        strings.insert("header".to_string(), header.to_string());
        strings.insert("offersCount".to_string(), offers_count.to_string());
        strings
    }
}

/// Source of translation catalogs, consulted once per run.
pub trait TranslationLoader: Send + Sync {
    fn load(&self, language: &str) -> Result<TranslationCatalog, TranslationError>;
}

/// Reads `mail.<language>.yaml` from a locale directory.
#[derive(Debug, Clone)]
pub struct YamlTranslationLoader {
    dir: PathBuf,
}

impl YamlTranslationLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, language: &str) -> PathBuf {
        self.dir.join(format!("mail.{language}.yaml"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TranslationLoader for YamlTranslationLoader {
    fn load(&self, language: &str) -> Result<TranslationCatalog, TranslationError> {
        let path = self.path_for(language);
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| TranslationError::Io { path, source })?;
        TranslationCatalog::from_yaml_str(language, &raw)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("unable to read translation catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid translation catalog for '{language}': {source}")]
    Parse {
        language: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("translation catalog for '{language}' has no 'mailing' section")]
    MissingSection { language: String },
    #[error("translation catalog for '{language}' is missing '{key}'")]
    MissingKey { language: String, key: String },
}
