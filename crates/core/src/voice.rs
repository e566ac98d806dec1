use serde::{Deserialize, Serialize};

/// Name fragments that mark the higher-quality voices most engines ship.
pub const QUALITY_MARKERS: [&str; 3] = ["Google", "Premium", "Samantha"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, e.g. `en-US`.
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }

    fn speaks(&self, primary: &str) -> bool {
        primary_subtag(&self.lang).eq_ignore_ascii_case(primary)
    }
}

/// The language part of a BCP-47 tag: `es` for `es-ES`.
pub fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Picks a voice for `language`.
///
/// Preference order: a quality-marked voice of the same language, then any
/// voice of the same language, then `None` to let the engine use its default.
pub fn select_voice<'a>(voices: &'a [Voice], language: &str) -> Option<&'a Voice> {
    let primary = primary_subtag(language);
    voices
        .iter()
        .find(|v| v.speaks(primary) && QUALITY_MARKERS.iter().any(|m| v.name.contains(m)))
        .or_else(|| voices.iter().find(|v| v.speaks(primary)))
}

/// A small catalog roughly matching what desktop browsers expose.
pub fn default_catalog() -> Vec<Voice> {
    vec![
        Voice::new("Daniel", "en-GB"),
        Voice::new("Samantha", "en-US"),
        Voice::new("Monica", "es-ES"),
        Voice::new("Google español", "es-ES"),
        Voice::new("Anna", "de-DE"),
        Voice::new("Amélie", "fr-CA"),
        Voice::new("Google 日本語", "ja-JP"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_quality_voice_over_first_match() {
        let voices = default_catalog();
        let picked = select_voice(&voices, "es-MX").unwrap();
        assert_eq!(picked.name, "Google español");
    }

    #[test]
    fn test_falls_back_to_first_language_match() {
        let voices = default_catalog();
        let picked = select_voice(&voices, "de-AT").unwrap();
        assert_eq!(picked.name, "Anna");
    }

    #[test]
    fn test_quality_voice_wins_even_when_listed_later() {
        let voices = default_catalog();
        // Daniel (en-GB) comes first, but Samantha carries a quality marker.
        assert_eq!(select_voice(&voices, "en-GB").unwrap().name, "Samantha");
    }

    #[test]
    fn test_unknown_language_uses_engine_default() {
        let voices = default_catalog();
        assert!(select_voice(&voices, "sw-KE").is_none());
        assert!(select_voice(&[], "en-US").is_none());
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("en-US"), "en");
        assert_eq!(primary_subtag("pt_BR"), "pt");
        assert_eq!(primary_subtag("ja"), "ja");
    }
}
