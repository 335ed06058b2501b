//! Input descriptors: every shape a caller may hand over for a file

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use url::Url;

use super::ResolvableInput;

/// Future producing another descriptor.
pub type DescriptorFuture = BoxFuture<'static, anyhow::Result<InputDescriptor>>;
/// Re-invokable producer of a single descriptor.
pub type Thunk = Arc<dyn Fn() -> DescriptorFuture + Send + Sync>;
/// Re-invokable producer of several descriptors (list fields only).
pub type BatchThunk =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Vec<InputDescriptor>>> + Send + Sync>;
/// Re-invokable producer of a file name.
pub type NameThunk = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync>;

/// Bytes with an optional file name attached.
#[derive(Clone)]
pub struct Blob {
    pub data: Arc<[u8]>,
    pub name: Option<String>,
}

impl Blob {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            name: None,
        }
    }

    pub fn named(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            name: Some(name.into()),
        }
    }
}

/// A fetch with extra request headers.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// File name side of a `{content, name}` pair.
#[derive(Clone)]
pub enum NameSource {
    Literal(String),
    Deferred(NameThunk),
}

/// One input as supplied by a caller, before resolution.
///
/// Resolution tries the variants in a fixed order; see
/// [`ResolvableInput::create`]. Plain strings are classified last: a string
/// only counts as text once it is neither a URL nor a relative path.
#[derive(Clone)]
pub enum InputDescriptor {
    /// Already resolved; passed through unchanged
    Resolved(ResolvableInput),
    /// Bytes with an optional name
    Blob(Blob),
    /// Fetchable URL
    Url(Url),
    /// Fetchable request with headers
    Request(FetchRequest),
    /// URL, relative path or literal text content
    Text(String),
    /// Content and name supplied separately, either side possibly deferred
    Pair {
        content: Box<InputDescriptor>,
        name: NameSource,
    },
    /// Raw bytes without a name
    Bytes(Arc<[u8]>),
    /// Local file, read on first load
    File(PathBuf),
    /// Produces the real descriptor when awaited
    Deferred(Thunk),
    /// Produces several descriptors; only valid inside list fields
    Batch(BatchThunk),
}

impl InputDescriptor {
    /// Wrap an async producer of a descriptor.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<InputDescriptor>> + Send + 'static,
    {
        InputDescriptor::Deferred(Arc::new(move || f().boxed()))
    }

    /// Wrap an async producer of several descriptors.
    pub fn batch<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<InputDescriptor>>> + Send + 'static,
    {
        InputDescriptor::Batch(Arc::new(move || f().boxed()))
    }

    /// Content with an explicit file name.
    pub fn named(name: impl Into<String>, content: impl Into<InputDescriptor>) -> Self {
        InputDescriptor::Pair {
            content: Box::new(content.into()),
            name: NameSource::Literal(name.into()),
        }
    }

    /// Content whose file name is only known asynchronously.
    pub fn named_later<F, Fut>(name: F, content: impl Into<InputDescriptor>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        InputDescriptor::Pair {
            content: Box::new(content.into()),
            name: NameSource::Deferred(Arc::new(move || name().boxed())),
        }
    }

    /// Short label for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            InputDescriptor::Resolved(_) => "resolved",
            InputDescriptor::Blob(_) => "blob",
            InputDescriptor::Url(_) => "url",
            InputDescriptor::Request(_) => "request",
            InputDescriptor::Text(_) => "text",
            InputDescriptor::Pair { .. } => "pair",
            InputDescriptor::Bytes(_) => "bytes",
            InputDescriptor::File(_) => "file",
            InputDescriptor::Deferred(_) => "deferred",
            InputDescriptor::Batch(_) => "batch",
        }
    }

    /// The string inside a `Text` descriptor.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputDescriptor::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Identity of the raw value for the resolution cache.
    ///
    /// Only values that describe the same file every time they are seen have
    /// one: strings, URLs, requests, paths and pairs of those with literal
    /// names. Byte buffers and thunks are transient and never cached.
    pub fn identity(&self) -> Option<String> {
        match self {
            InputDescriptor::Text(text) => Some(format!("text:{}", text)),
            InputDescriptor::Url(url) => Some(format!("url:{}", url)),
            InputDescriptor::Request(request) => {
                let headers: Vec<String> = request
                    .headers
                    .iter()
                    .map(|(k, v)| format!("{}={}", k.to_ascii_lowercase(), v))
                    .collect();
                Some(format!("request:{}|{}", request.url, headers.join("&")))
            }
            InputDescriptor::File(path) => Some(format!("file:{}", path.display())),
            InputDescriptor::Pair {
                content,
                name: NameSource::Literal(name),
            } => content
                .identity()
                .map(|content| format!("pair:{}|{}", name, content)),
            InputDescriptor::Pair { .. }
            | InputDescriptor::Resolved(_)
            | InputDescriptor::Blob(_)
            | InputDescriptor::Bytes(_)
            | InputDescriptor::Deferred(_)
            | InputDescriptor::Batch(_) => None,
        }
    }
}

impl fmt::Debug for InputDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputDescriptor::Resolved(input) => write!(f, "Resolved({:?})", input.name()),
            InputDescriptor::Blob(blob) => write!(f, "Blob({:?}, {} bytes)", blob.name, blob.data.len()),
            InputDescriptor::Url(url) => write!(f, "Url({})", url),
            InputDescriptor::Request(request) => write!(f, "Request({})", request.url),
            InputDescriptor::Text(text) => write!(f, "Text({:?})", text),
            InputDescriptor::Pair { content, name } => match name {
                NameSource::Literal(name) => write!(f, "Pair({:?}, {:?})", name, content),
                NameSource::Deferred(_) => write!(f, "Pair(<deferred>, {:?})", content),
            },
            InputDescriptor::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            InputDescriptor::File(path) => write!(f, "File({})", path.display()),
            InputDescriptor::Deferred(_) => f.write_str("Deferred"),
            InputDescriptor::Batch(_) => f.write_str("Batch"),
        }
    }
}

impl From<&str> for InputDescriptor {
    fn from(text: &str) -> Self {
        InputDescriptor::Text(text.to_string())
    }
}

impl From<String> for InputDescriptor {
    fn from(text: String) -> Self {
        InputDescriptor::Text(text)
    }
}

impl From<Url> for InputDescriptor {
    fn from(url: Url) -> Self {
        InputDescriptor::Url(url)
    }
}

impl From<FetchRequest> for InputDescriptor {
    fn from(request: FetchRequest) -> Self {
        InputDescriptor::Request(request)
    }
}

impl From<Vec<u8>> for InputDescriptor {
    fn from(bytes: Vec<u8>) -> Self {
        InputDescriptor::Bytes(bytes.into())
    }
}

impl From<&[u8]> for InputDescriptor {
    fn from(bytes: &[u8]) -> Self {
        InputDescriptor::Bytes(bytes.into())
    }
}

impl From<Arc<[u8]>> for InputDescriptor {
    fn from(bytes: Arc<[u8]>) -> Self {
        InputDescriptor::Bytes(bytes)
    }
}

impl From<Blob> for InputDescriptor {
    fn from(blob: Blob) -> Self {
        InputDescriptor::Blob(blob)
    }
}

impl From<PathBuf> for InputDescriptor {
    fn from(path: PathBuf) -> Self {
        InputDescriptor::File(path)
    }
}

impl From<ResolvableInput> for InputDescriptor {
    fn from(input: ResolvableInput) -> Self {
        InputDescriptor::Resolved(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_paths_and_urls_have_identities() {
        assert_eq!(
            InputDescriptor::from("game.nes").identity().as_deref(),
            Some("text:game.nes")
        );
        assert_eq!(
            InputDescriptor::from(PathBuf::from("/roms/a.nes")).identity().as_deref(),
            Some("file:/roms/a.nes")
        );
        let url = Url::parse("https://example.com/a.nes").unwrap();
        assert_eq!(
            InputDescriptor::from(url).identity().as_deref(),
            Some("url:https://example.com/a.nes")
        );
    }

    #[test]
    fn transient_values_have_no_identity() {
        assert!(InputDescriptor::from(vec![1u8, 2, 3]).identity().is_none());
        assert!(InputDescriptor::from(Blob::named("a.bin", vec![1u8])).identity().is_none());
        let thunk = InputDescriptor::deferred(|| async { Ok(InputDescriptor::from("x")) });
        assert!(thunk.identity().is_none());
    }

    #[test]
    fn pairs_are_keyed_by_name_and_content() {
        let a = InputDescriptor::named("a.nes", "https://example.com/rom");
        let b = InputDescriptor::named("b.nes", "https://example.com/rom");
        assert_ne!(a.identity(), b.identity());
        assert!(a.identity().is_some());

        let bytes = InputDescriptor::named("a.nes", vec![1u8]);
        assert!(bytes.identity().is_none());
    }

    #[test]
    fn request_identity_includes_headers() {
        let url = Url::parse("https://example.com/rom.nes").unwrap();
        let plain = InputDescriptor::from(FetchRequest::new(url.clone()));
        let authed = InputDescriptor::from(FetchRequest::new(url).header("Authorization", "x"));
        assert_ne!(plain.identity(), authed.identity());
    }
}
