//! Firewall matching and the synthesized authentication middleware.

use {
    crate::{Context, Error, FirewallConfig, MAIN, Result, dispatch::BoxHandler},
    regex::Regex,
    std::sync::Arc,
};

/// A compiled [`FirewallConfig`].
#[derive(Debug, Clone)]
pub struct Firewall {
    name: String,
    enabled: bool,
    patterns: Vec<Regex>,
}

impl Firewall {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True when any of the patterns matches the path.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }
}

impl TryFrom<&FirewallConfig> for Firewall {
    type Error = Error;

    fn try_from(config: &FirewallConfig) -> Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            name: config.name.clone(),
            enabled: config.enabled,
            patterns,
        })
    }
}

/// Compiles every configured firewall, preserving configuration order.
pub fn compile_firewalls(configs: &[FirewallConfig]) -> Result<Vec<Firewall>> {
    configs.iter().map(Firewall::try_from).collect()
}

///
/// Returns the enabled firewalls with at least one pattern matching `path`,
/// in configuration order.
///
pub fn find_firewalls_with_path(path: &str, firewalls: &[Firewall]) -> Vec<Firewall> {
    firewalls
        .iter()
        .filter(|firewall| firewall.enabled && firewall.matches(path))
        .cloned()
        .collect()
}

/// Builds the single middleware guarding a route with firewalls.
///
/// The request passes when the authentication provider recognizes it for
/// the main database; otherwise the chain stops with an authentication error.
pub(crate) fn firewall_middleware(firewalls: &[Firewall]) -> Option<BoxHandler> {
    if firewalls.is_empty() {
        return None;
    }
    let names: Arc<[String]> = firewalls.iter().map(|f| f.name.clone()).collect();
    let middleware = move |c: Context| {
        let names = names.clone();
        async move {
            if c.auth(MAIN)?.is_authenticated().await? {
                return c.proceed();
            }
            tracing::debug!(
                firewalls = ?names,
                path = %c.request().path(),
                "Request rejected by firewall"
            );
            Err(Error::authentication("unauthorized"))
        }
    };
    Some(Arc::new(middleware))
}
