use {crate::Result, async_trait::async_trait};

/// An outgoing email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Send `body` as HTML instead of plain text.
    pub html: bool,
}

impl Mail {
    pub fn new(from: &str, to: &str, subject: &str) -> Self {
        Self {
            from: from.into(),
            to: vec![to.into()],
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_recipient(mut self, to: &str) -> Self {
        self.to.push(to.into());
        self
    }

    pub fn with_text(mut self, body: &str) -> Self {
        self.body = body.into();
        self.html = false;
        self
    }

    pub fn with_html(mut self, body: &str) -> Self {
        self.body = body.into();
        self.html = true;
        self
    }
}

/// Outbound mail delivery reached through [`Context::email`](crate::Context::email).
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, mail: Mail) -> Result<()>;
}
