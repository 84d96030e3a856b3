//! Unicode script ranges for the script-ratio fallback

/// A writing system with a dedicated block of code points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptRange {
    Greek,
    Cyrillic,
    Arabic,
    Hebrew,
    Devanagari,
    Thai,
    Han,
    Japanese,
    Hangul,
    Georgian,
}

const GREEK: &[(char, char)] = &[('\u{0370}', '\u{03FF}'), ('\u{1F00}', '\u{1FFF}')];
const CYRILLIC: &[(char, char)] = &[
    ('\u{0400}', '\u{04FF}'),
    ('\u{0500}', '\u{052F}'),
    ('\u{2DE0}', '\u{2DFF}'),
    ('\u{A640}', '\u{A69F}'),
];
const ARABIC: &[(char, char)] = &[
    ('\u{0600}', '\u{06FF}'),
    ('\u{0750}', '\u{077F}'),
    ('\u{08A0}', '\u{08FF}'),
    ('\u{FB50}', '\u{FDFF}'),
    ('\u{FE70}', '\u{FEFF}'),
];
const HEBREW: &[(char, char)] = &[('\u{0590}', '\u{05FF}'), ('\u{FB1D}', '\u{FB4F}')];
const DEVANAGARI: &[(char, char)] = &[('\u{0900}', '\u{097F}'), ('\u{A8E0}', '\u{A8FF}')];
const THAI: &[(char, char)] = &[('\u{0E00}', '\u{0E7F}')];
const HAN: &[(char, char)] = &[
    ('\u{3400}', '\u{4DBF}'),
    ('\u{4E00}', '\u{9FFF}'),
    ('\u{F900}', '\u{FAFF}'),
    ('\u{20000}', '\u{2A6DF}'),
];
const JAPANESE: &[(char, char)] = &[
    ('\u{3040}', '\u{309F}'),
    ('\u{30A0}', '\u{30FF}'),
    ('\u{31F0}', '\u{31FF}'),
    ('\u{3400}', '\u{4DBF}'),
    ('\u{4E00}', '\u{9FFF}'),
    ('\u{FF66}', '\u{FF9F}'),
];
const HANGUL: &[(char, char)] = &[
    ('\u{1100}', '\u{11FF}'),
    ('\u{3130}', '\u{318F}'),
    ('\u{AC00}', '\u{D7AF}'),
];
const GEORGIAN: &[(char, char)] = &[('\u{10A0}', '\u{10FF}'), ('\u{2D00}', '\u{2D2F}')];

impl ScriptRange {
    /// Code point ranges (inclusive) belonging to this script
    pub fn ranges(&self) -> &'static [(char, char)] {
        match self {
            Self::Greek => GREEK,
            Self::Cyrillic => CYRILLIC,
            Self::Arabic => ARABIC,
            Self::Hebrew => HEBREW,
            Self::Devanagari => DEVANAGARI,
            Self::Thai => THAI,
            Self::Han => HAN,
            Self::Japanese => JAPANESE,
            Self::Hangul => HANGUL,
            Self::Georgian => GEORGIAN,
        }
    }

    pub fn contains(&self, c: char) -> bool {
        self.ranges().iter().any(|(lo, hi)| (*lo..=*hi).contains(&c))
    }

    /// Share of alphabetic characters in `text` that belong to this script
    ///
    /// Returns 0.0 when the text has no alphabetic characters.
    pub fn ratio(&self, text: &str) -> f64 {
        let mut letters = 0usize;
        let mut in_script = 0usize;
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            if self.contains(c) {
                in_script += 1;
            }
        }

        if letters == 0 {
            0.0
        } else {
            in_script as f64 / letters as f64
        }
    }

    /// Script-ratio test: accept iff the ratio reaches `threshold`
    pub fn passes(&self, text: &str, threshold: f64) -> bool {
        self.ratio(text) >= threshold
    }
}
