use {
    crate::{Error, Result},
    serde::Deserialize,
};

///
/// Languages available to [`LangContext`](crate::LangContext).
///
/// When enabled, exactly one language must be marked as `main`. The current
/// language is stored in the cookie named `cookie_name`.
///
#[derive(Debug, Clone, Deserialize)]
pub struct LocalizationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "LocalizationConfig::default_cookie_name")]
    pub cookie_name: String,

    #[serde(default)]
    pub languages: Vec<LanguageConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LanguageConfig {
    pub code: String,
    #[serde(default)]
    pub main: bool,
}

impl LocalizationConfig {
    fn default_cookie_name() -> String {
        "lang".into()
    }

    /// The main language code, if one is configured.
    pub fn main_language(&self) -> Option<&str> {
        self.languages
            .iter()
            .find(|lang| lang.main)
            .map(|lang| lang.code.as_str())
    }

    pub fn has_language(&self, code: &str) -> bool {
        self.languages.iter().any(|lang| lang.code == code)
    }

    pub fn with_language(mut self, code: &str, main: bool) -> Self {
        self.enabled = true;
        self.languages.push(LanguageConfig {
            code: code.into(),
            main,
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.cookie_name.trim().is_empty() {
            return Err(Error::config("Localization cookie_name cannot be empty."));
        }
        match self.languages.iter().filter(|lang| lang.main).count() {
            1 => Ok(()),
            0 => Err(Error::config(
                "Localization requires a main language. Add { code = \"en\", main = true } to [localization] languages.",
            )),
            _ => Err(Error::config(
                "Only one language can be marked as main in [localization] languages.",
            )),
        }
    }
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: Self::default_cookie_name(),
            languages: Vec::new(),
        }
    }
}
