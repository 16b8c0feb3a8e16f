//! Request body extraction.
//!
//! The body of an HTTP request is a stream and can be consumed once. In
//! websocket message mode the parser is built around the message bytes
//! instead, which can be read any number of times.

use {
    crate::{Error, Result},
    axum::body::Body,
    bytes::Bytes,
    http::{HeaderMap, header::CONTENT_TYPE},
    multer::{Constraints, SizeLimit},
    serde::de::DeserializeOwned,
    std::sync::{Mutex, PoisonError},
};

/// A file part of a `multipart/form-data` request, read fully into memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Multipart {
    /// Form field name.
    pub key: String,
    /// Client-side file name.
    pub name: String,
    /// Content type detected from the data.
    pub content_type: String,
    /// File name extension without the dot.
    pub suffix: String,
    pub data: Bytes,
}

pub struct Parser {
    body: Mutex<Option<Body>>,
    buffered: Option<Bytes>,
    content_type: Option<String>,
    limit: u64,
}

impl Parser {
    pub(crate) fn from_body(body: Body, headers: &HeaderMap, limit: u64) -> Self {
        Self {
            body: Mutex::new(Some(body)),
            buffered: None,
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            limit,
        }
    }

    pub(crate) fn buffered(bytes: Bytes) -> Self {
        Self {
            body: Mutex::new(None),
            buffered: Some(bytes),
            content_type: None,
            limit: 0,
        }
    }

    /// Whether the parser reads a websocket message instead of a request body.
    pub fn is_buffered(&self) -> bool {
        self.buffered.is_some()
    }

    fn take_body(&self) -> Result<Body> {
        self.body
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::config("body already consumed"))
    }

    /// The raw payload.
    pub async fn bytes(&self) -> Result<Bytes> {
        if let Some(bytes) = &self.buffered {
            return Ok(bytes.clone());
        }
        let body = self.take_body()?;
        Ok(axum::body::to_bytes(body, usize::MAX).await?)
    }

    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| Error::invalid_input(format!("body is not valid UTF-8: {err}")))
    }

    pub async fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn xml<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.bytes().await?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|err| Error::invalid_input(format!("body is not valid UTF-8: {err}")))?;
        Ok(quick_xml::de::from_str(text)?)
    }

    ///
    /// The first file uploaded under the field `name`, or every file when
    /// `name` is empty. Returns an empty [`Multipart`] when nothing matches
    /// and in websocket message mode.
    ///
    pub async fn file(&self, name: &str) -> Result<Multipart> {
        let wanted = [name];
        let names: &[&str] = if name.is_empty() { &[] } else { &wanted };
        Ok(self.files(names).await?.into_iter().next().unwrap_or_default())
    }

    /// Every file uploaded under one of `names`, or all files when `names` is empty.
    pub async fn files(&self, names: &[&str]) -> Result<Vec<Multipart>> {
        if self.is_buffered() {
            return Ok(Vec::new());
        }
        let content_type = self
            .content_type
            .as_deref()
            .filter(|value| value.contains(mime::MULTIPART_FORM_DATA.essence_str()))
            .ok_or_else(Error::invalid_multipart)?;
        let boundary =
            multer::parse_boundary(content_type).map_err(|_| Error::invalid_multipart())?;
        let constraints =
            Constraints::new().size_limit(SizeLimit::new().whole_stream(self.limit));
        let body = self.take_body()?;
        let mut form =
            multer::Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

        let mut files = Vec::new();
        while let Some(field) = form.next_field().await.map_err(Error::open_file)? {
            let key = field.name().unwrap_or_default().to_string();
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            if !names.is_empty() && !names.contains(&key.as_str()) {
                continue;
            }
            let data = field.bytes().await.map_err(Error::read_data)?;
            files.push(Multipart {
                key,
                suffix: suffix(&file_name),
                name: file_name,
                content_type: detect_content_type(&data),
                data,
            });
        }
        Ok(files)
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("buffered", &self.buffered.as_ref().map(Bytes::len))
            .field("content_type", &self.content_type)
            .field("limit", &self.limit)
            .finish()
    }
}

fn suffix(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, suffix)| suffix.to_string())
        .unwrap_or_default()
}

fn detect_content_type(data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    if std::str::from_utf8(data).is_ok() {
        mime::TEXT_PLAIN_UTF_8.to_string()
    } else {
        mime::APPLICATION_OCTET_STREAM.to_string()
    }
}
