//! Language gating for posts and comments
//!
//! Classification is two-tier: a probabilistic detector (`whatlang`) is consulted first,
//! and for languages with a dedicated Unicode script the share of script characters
//! decides when the detector does not confirm the target.
//!
//! # Components
//!
//! - `Language`: a supported target language (ISO 639-1 code)
//! - `ScriptRange`: code point ranges used by the script-ratio fallback
//! - `LanguageClassifier`: the title, original-post and comment gates

mod script;

pub use script::ScriptRange;

use crate::config::LanguageConfig;
use crate::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use whatlang::Lang;

/// A supported target language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Language {
    code: &'static str,
    lang: Lang,
    script: Option<ScriptRange>,
}

/// ISO 639-1 code, detector language, dedicated script (if any)
const SUPPORTED: &[(&str, Lang, Option<ScriptRange>)] = &[
    ("el", Lang::Ell, Some(ScriptRange::Greek)),
    ("ru", Lang::Rus, Some(ScriptRange::Cyrillic)),
    ("uk", Lang::Ukr, Some(ScriptRange::Cyrillic)),
    ("bg", Lang::Bul, Some(ScriptRange::Cyrillic)),
    ("sr", Lang::Srp, Some(ScriptRange::Cyrillic)),
    ("mk", Lang::Mkd, Some(ScriptRange::Cyrillic)),
    ("be", Lang::Bel, Some(ScriptRange::Cyrillic)),
    ("ar", Lang::Ara, Some(ScriptRange::Arabic)),
    ("fa", Lang::Pes, Some(ScriptRange::Arabic)),
    ("ur", Lang::Urd, Some(ScriptRange::Arabic)),
    ("he", Lang::Heb, Some(ScriptRange::Hebrew)),
    ("hi", Lang::Hin, Some(ScriptRange::Devanagari)),
    ("mr", Lang::Mar, Some(ScriptRange::Devanagari)),
    ("ne", Lang::Nep, Some(ScriptRange::Devanagari)),
    ("th", Lang::Tha, Some(ScriptRange::Thai)),
    ("zh", Lang::Cmn, Some(ScriptRange::Han)),
    ("ja", Lang::Jpn, Some(ScriptRange::Japanese)),
    ("ko", Lang::Kor, Some(ScriptRange::Hangul)),
    ("ka", Lang::Kat, Some(ScriptRange::Georgian)),
    ("en", Lang::Eng, None),
    ("de", Lang::Deu, None),
    ("fr", Lang::Fra, None),
    ("es", Lang::Spa, None),
    ("it", Lang::Ita, None),
    ("pt", Lang::Por, None),
    ("nl", Lang::Nld, None),
    ("pl", Lang::Pol, None),
    ("tr", Lang::Tur, None),
    ("sv", Lang::Swe, None),
    ("da", Lang::Dan, None),
    ("fi", Lang::Fin, None),
    ("cs", Lang::Ces, None),
    ("hu", Lang::Hun, None),
    ("ro", Lang::Ron, None),
];

impl Language {
    /// Looks up a language by ISO 639-1 code
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        SUPPORTED
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(code, lang, script)| Self {
                code,
                lang: *lang,
                script: *script,
            })
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Dedicated script used by the ratio fallback, if the language has one
    pub fn script(&self) -> Option<ScriptRange> {
        self.script
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| ConfigError::UnsupportedLanguage(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.code.to_string()
    }
}

/// Decides whether `text` qualifies as `target`
///
/// No target means no filtering. Otherwise the detector is asked first and its verdict
/// counts when it names the target and reports itself reliable. Failing that, languages
/// with a dedicated script fall back to the script-ratio test; all others are rejected.
pub fn classify(text: &str, target: Option<&Language>, ratio_threshold: f64) -> bool {
    let Some(target) = target else {
        return true;
    };

    if text.trim().is_empty() {
        return false;
    }

    if let Some(info) = whatlang::detect(text) {
        if info.lang() == target.lang && info.is_reliable() {
            return true;
        }
    }

    match target.script {
        Some(script) => script.passes(text, ratio_threshold),
        None => false,
    }
}

/// The three independently configurable language gates
#[derive(Debug, Clone)]
pub struct LanguageClassifier {
    target: Option<Language>,
    ratio_threshold: f64,
    require_title: bool,
    require_op: bool,
    filter_comments: bool,
}

impl LanguageClassifier {
    pub fn new(config: &LanguageConfig) -> Self {
        Self {
            target: config.target,
            ratio_threshold: config.min_script_ratio,
            require_title: config.require_title,
            require_op: config.require_op,
            filter_comments: config.filter_comments,
        }
    }

    /// A classifier that accepts everything
    pub fn disabled() -> Self {
        Self {
            target: None,
            ratio_threshold: 0.0,
            require_title: false,
            require_op: false,
            filter_comments: false,
        }
    }

    pub fn target(&self) -> Option<&Language> {
        self.target.as_ref()
    }

    pub fn classify(&self, text: &str) -> bool {
        classify(text, self.target.as_ref(), self.ratio_threshold)
    }

    /// Title gate
    pub fn accepts_title(&self, title: &str) -> bool {
        !self.require_title || self.classify(title)
    }

    /// Original-post gate over title and selftext combined
    pub fn accepts_original_post(&self, title: &str, selftext: &str) -> bool {
        if !self.require_op {
            return true;
        }
        let combined = format!("{} {}", title, selftext);
        self.classify(combined.trim())
    }

    /// Comment gate; empty bodies are not filtered
    pub fn accepts_comment(&self, body: &str) -> bool {
        !self.filter_comments || body.is_empty() || self.classify(body)
    }
}
