use {
    crate::{Cookie, Error, LocalizationConfig, Result},
    std::time::Duration,
};

const LANG_COOKIE_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Language selection for the current request, backed by the localization cookie.
#[derive(Debug, Clone, Copy)]
pub struct LangContext<'a> {
    config: &'a LocalizationConfig,
    cookie: &'a Cookie,
}

impl<'a> LangContext<'a> {
    pub(crate) fn new(config: &'a LocalizationConfig, cookie: &'a Cookie) -> Self {
        Self { config, cookie }
    }

    /// The configured main language, if localization is enabled.
    pub fn main(&self) -> Option<&'a str> {
        if !self.config.enabled {
            return None;
        }
        self.config.main_language()
    }

    /// The language stored in the cookie when it is still configured,
    /// otherwise the main language. Empty when localization is disabled.
    pub fn current(&self) -> String {
        if !self.config.enabled {
            return String::new();
        }
        self.cookie
            .get(&self.config.cookie_name)
            .filter(|code| self.config.has_language(code))
            .or_else(|| self.main().map(str::to_string))
            .unwrap_or_default()
    }

    /// Switches the language of the client.
    pub fn set(&self, code: &str) -> Result<()> {
        if !self.config.enabled || !self.config.has_language(code) {
            return Err(Error::invalid_lang(code));
        }
        self.cookie
            .set(&self.config.cookie_name, code, Some(LANG_COOKIE_MAX_AGE))
    }
}
