//! File storage capability and a local-directory implementation.

use {
    crate::{Error, Result},
    async_trait::async_trait,
    bytes::Bytes,
    std::path::{Component, Path, PathBuf},
};

/// File storage reached through [`Context::files`](crate::Context::files).
#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    async fn read(&self, path: &str) -> Result<Bytes>;

    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    async fn remove(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

///
/// Stores files below a root directory.
///
/// Paths are relative to the root. Absolute paths and `..` components are
/// rejected with an `InvalidInput` error.
///
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || !safe {
            return Err(Error::invalid_input(format!("invalid file path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn read(&self, path: &str) -> Result<Bytes> {
        let data = tokio::fs::read(self.resolve(path)?).await?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;
        tracing::debug!(path = %target.display(), size = data.len(), "File written");
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        tokio::fs::remove_file(self.resolve(path)?).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)?).await?)
    }
}
