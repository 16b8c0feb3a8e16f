/// Message lookup used by [`Context::translate`](crate::Context::translate).
pub trait Translator: Send + Sync + 'static {
    fn translate(&self, lang: &str, key: &str, args: &[(&str, &str)]) -> String;
}

/// Returns the lookup key unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Translator for Passthrough {
    fn translate(&self, _lang: &str, key: &str, _args: &[(&str, &str)]) -> String {
        key.to_string()
    }
}
