//! Translation of dev codes into client-facing messages.
//!
//! The translator keeps one catalog per language. Lookups strip the HTTP
//! suffix from the dev code (`f00103-404` looks up `f00103`), try the
//! active language, then the fallback language, and finally return the
//! code itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

const EN: &[(&str, &str)] = &[
    ("m00000", "mirage"),
    ("s00000", "success"),
    ("f00000", "please wait a moment, we are fixing the problem. thanks"),
    ("f00001", "please wait a moment, we are fixing the problem. thanks"),
    ("f00100", "please wait a moment, we are fixing the problem. thanks"),
    ("f00101", "request is not valid"),
    ("f00102", "inputs are not valid"),
    ("f00103", "there is no answer for your request"),
    ("f00104", "request is not valid"),
    ("f00105", "request is not valid"),
    ("f00106", "request is expired"),
    ("f00200", "please wait a moment, we are fixing the problem. thanks"),
    ("f00201", "problem in response"),
    ("f00300", "unknown database error"),
    ("f00301", "database saving action error"),
    ("f00400", "unknown authentication error"),
    ("f00401", "invalid username or password"),
    ("f00402", "invalid account type"),
    ("f00403", "login failed"),
    ("f00404", "auth token not found"),
    ("f00405", "auth token is invalid"),
    ("f00406", "auth token is invalid"),
    ("f00407", "auth token signature is invalid"),
    ("f00408", "auth token before validation error"),
    ("f00409", "auth header is empty"),
    ("f00410", "auth header not found"),
    ("f00411", "auth token after validation error"),
    ("f00412", "auth token invalid payload"),
    ("f00413", "database saving action error"),
    ("f00414", "unknown database error"),
    ("f00415", "hash key not exist"),
    ("f00500", "access denied"),
    ("f00501", "access denied"),
];

const FA: &[(&str, &str)] = &[
    ("m00000", "سراب"),
    ("s00000", "موفقیت آمیز"),
    ("f00000", "لطفا کمی صبر کنید در حال رفع ایراد هستیم. مرسی"),
    ("f00100", "لطفا کمی صبر کنید در حال رفع ایراد هستیم. مرسی"),
    ("f00101", "درخواست نامعتبر است"),
    ("f00102", "ورودی ها نامعتبراند"),
    ("f00103", "هیج جوابی برای درخواست شما وجود ندارد"),
    ("f00200", "لطفا کمی صبر کنید در حال رفع ایراد هستیم. مرسی"),
    ("f00201", "مشکل در پاسخ"),
    ("f00300", "unknown database error"),
    ("f00301", "database saving action error"),
    ("f00400", "unknown authentication error"),
    ("f00401", "invalid username or password"),
    ("f00402", "invalid account type"),
    ("f00403", "login failed"),
    ("f00404", "auth token not found"),
    ("f00405", "auth token is invalid"),
    ("f00406", "auth token is invalid"),
    ("f00407", "auth token signature is invalid"),
    ("f00408", "auth token before validation error"),
    ("f00409", "auth header is empty"),
    ("f00410", "auth header not found"),
    ("f00411", "auth token after validation error"),
    ("f00412", "auth token invalid payload"),
    ("f00413", "database saving action error"),
    ("f00414", "unknown database error"),
    ("f00415", "hash key not exist"),
];

/// Errors raised while loading catalog files.
#[derive(Debug, Error)]
pub enum TranslatorError {
    /// A catalog file could not be read.
    #[error("Translator error: failed to read '{path}': {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A catalog file is not a JSON object of strings.
    #[error("Translator error: failed to parse '{path}': {source}")]
    Parse {
        /// Catalog path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

type Catalog = HashMap<String, String>;

/// Dev code translator.
///
/// # Example
///
/// ```
/// use mirage_core::Translator;
///
/// let translator = Translator::new("en", "en");
/// assert_eq!(translator.get("f00401-401"), "invalid username or password");
/// assert_eq!(translator.get("x99999"), "x99999");
/// ```
#[derive(Debug, Clone)]
pub struct Translator {
    lang: String,
    fallback_lang: String,
    catalogs: HashMap<String, Catalog>,
}

impl Translator {
    /// Creates a translator with the built-in `en` and `fa` catalogs.
    #[must_use]
    pub fn new(lang: impl Into<String>, fallback_lang: impl Into<String>) -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert("en".to_string(), builtin(EN));
        catalogs.insert("fa".to_string(), builtin(FA));

        Self {
            lang: lang.into(),
            fallback_lang: fallback_lang.into(),
            catalogs,
        }
    }

    /// Merges `messages` into the catalog of `lang`, creating it if needed.
    #[must_use]
    pub fn with_catalog<I, K, V>(mut self, lang: impl Into<String>, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let catalog = self.catalogs.entry(lang.into()).or_default();
        for (code, text) in messages {
            catalog.insert(code.into(), text.into());
        }
        self
    }

    /// Merges `{lang}.json` and `{fallback_lang}.json` from `dir`.
    ///
    /// Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TranslatorError`] if a present file cannot be read or
    /// parsed.
    pub fn load_dir(mut self, dir: impl AsRef<Path>) -> Result<Self, TranslatorError> {
        let dir = dir.as_ref();
        let mut langs = vec![self.lang.clone()];
        if self.fallback_lang != self.lang {
            langs.push(self.fallback_lang.clone());
        }

        for lang in langs {
            let path = dir.join(format!("{lang}.json"));
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "no catalog file for language");
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|source| TranslatorError::Io {
                path: path.clone(),
                source,
            })?;
            let messages: Catalog = serde_json::from_str(&content)
                .map_err(|source| TranslatorError::Parse { path: path.clone(), source })?;
            tracing::debug!(lang = %lang, entries = messages.len(), "loaded catalog");
            self = self.with_catalog(lang, messages);
        }

        Ok(self)
    }

    /// Returns the language lookups are served from.
    ///
    /// This is the configured language when a catalog exists for it and
    /// the fallback language otherwise.
    #[must_use]
    pub fn lang(&self) -> &str {
        if self.catalogs.contains_key(&self.lang) {
            &self.lang
        } else {
            &self.fallback_lang
        }
    }

    /// Translates a dev code.
    #[must_use]
    pub fn get(&self, dev_code: &str) -> String {
        let key = dev_code.split('-').next().unwrap_or(dev_code);
        [self.lang.as_str(), self.fallback_lang.as_str()]
            .iter()
            .find_map(|lang| self.catalogs.get(*lang).and_then(|c| c.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Translates a dev code and replaces `%name%` placeholders.
    #[must_use]
    pub fn get_with(&self, dev_code: &str, params: &[(&str, &str)]) -> String {
        params.iter().fold(self.get(dev_code), |text, (name, value)| {
            text.replace(&format!("%{name}%"), value)
        })
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new("en", "en")
    }
}

fn builtin(entries: &[(&str, &str)]) -> Catalog {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
