//! Resolvable inputs
//!
//! Cores, ROMs, firmware, shaders and saves can arrive as URLs, paths,
//! in-memory bytes, literal text or thunks producing any of those. Each is
//! turned into a [`ResolvableInput`]: a named file whose bytes are read at
//! most once.

mod descriptor;
mod fetch;
pub mod naming;
pub mod object_url;

pub use descriptor::{
    BatchThunk, Blob, DescriptorFuture, FetchRequest, InputDescriptor, NameSource, NameThunk,
    Thunk,
};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::Context;
use futures::FutureExt;
use futures::future::BoxFuture;
use url::Url;

use crate::abort::{self, AbortSignal};
use crate::error::{Error, Result};
use naming::{generated_name, sanitize, split_name};

/// Shared state for resolving a group of inputs.
#[derive(Clone, Default)]
pub struct ResolveContext {
    pub signal: Option<AbortSignal>,
    /// HTTP client for URL inputs; a default client is built when absent
    pub client: Option<reqwest::Client>,
}

impl ResolveContext {
    pub fn with_signal(signal: Option<AbortSignal>) -> Self {
        Self {
            signal,
            client: None,
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => Ok(reqwest::Client::builder()
                .build()
                .context("failed to build HTTP client")?),
        }
    }
}

enum Pending {
    Response(reqwest::Response),
    File(PathBuf),
}

/// Bytes behind an input, read on first use and immutable afterwards.
struct Payload {
    pending: tokio::sync::Mutex<Option<Pending>>,
    data: OnceLock<Arc<[u8]>>,
}

impl Payload {
    fn loaded(data: Arc<[u8]>) -> Arc<Self> {
        let cell = OnceLock::new();
        let _ = cell.set(data);
        Arc::new(Self {
            pending: tokio::sync::Mutex::new(None),
            data: cell,
        })
    }

    fn pending(pending: Pending) -> Arc<Self> {
        Arc::new(Self {
            pending: tokio::sync::Mutex::new(Some(pending)),
            data: OnceLock::new(),
        })
    }

    async fn materialize(&self) -> Result<Arc<[u8]>> {
        let mut pending = self.pending.lock().await;
        if let Some(data) = self.data.get() {
            return Ok(data.clone());
        }

        let data: Arc<[u8]> = match pending.take() {
            Some(Pending::Response(response)) => {
                let url = response.url().to_string();
                let body = response
                    .bytes()
                    .await
                    .map_err(|source| Error::Network { url, source })?;
                Arc::from(body.as_ref())
            }
            Some(Pending::File(path)) => match tokio::fs::read(&path).await {
                Ok(bytes) => bytes.into(),
                Err(source) => {
                    *pending = Some(Pending::File(path.clone()));
                    return Err(Error::Io { path, source });
                }
            },
            None => {
                return Err(Error::InputResolution(
                    "input body was lost by an earlier failed read".to_string(),
                ));
            }
        };

        let _ = self.data.set(data.clone());
        Ok(data)
    }
}

struct Inner {
    name: String,
    payload: Arc<Payload>,
    signal: Option<AbortSignal>,
    object_url: Mutex<Option<String>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(url) = self
            .object_url
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            object_url::revoke(&url);
        }
    }
}

/// A named file whose bytes are materialized lazily and then cached.
///
/// Cloning is cheap and clones share the same payload, so an input cached
/// and handed out twice is read once.
#[derive(Clone)]
pub struct ResolvableInput {
    inner: Arc<Inner>,
}

impl fmt::Debug for ResolvableInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvableInput")
            .field("name", &self.inner.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// How a plain string is interpreted.
enum TextKind {
    ObjectUrl,
    Url(Url),
    Path(PathBuf),
    Literal,
}

fn classify(text: &str) -> TextKind {
    if text.starts_with(object_url::SCHEME_PREFIX) {
        return TextKind::ObjectUrl;
    }
    if let Ok(url) = Url::parse(text)
        && matches!(url.scheme(), "http" | "https" | "file")
    {
        return TextKind::Url(url);
    }
    if text.starts_with('/') || text.starts_with("./") || text.starts_with("../") {
        return TextKind::Path(PathBuf::from(text));
    }
    TextKind::Literal
}

impl ResolvableInput {
    fn new(name: String, payload: Arc<Payload>, signal: Option<AbortSignal>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                payload,
                signal,
                object_url: Mutex::new(None),
            }),
        }
    }

    /// An already materialized input.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(name.into(), Payload::loaded(data.into()), None)
    }

    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_bytes(name, text.into().into_bytes())
    }

    /// Resolve a descriptor into an input.
    ///
    /// Detection order: already resolved, blob, URL or request, string
    /// (object URL, absolute URL, relative path, else literal text), pair,
    /// raw bytes, file path, thunk. A batch is rejected here; list fields
    /// expand batches before resolving their entries.
    pub async fn create(
        descriptor: impl Into<InputDescriptor>,
        ctx: &ResolveContext,
    ) -> Result<Self> {
        resolve(descriptor.into(), ctx.clone()).await
    }

    /// Same payload under another name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self::new(
            name.into(),
            self.inner.payload.clone(),
            self.inner.signal.clone(),
        )
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name without its last extension.
    pub fn base_name(&self) -> &str {
        split_name(&self.inner.name).0
    }

    /// Last extension without the dot; empty when there is none.
    pub fn extension(&self) -> &str {
        split_name(&self.inner.name).1
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.payload.data.get().is_some()
    }

    /// Bytes, if already materialized.
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.inner.payload.data.get().cloned()
    }

    /// Materialize the bytes, reading or downloading them on first call only.
    pub async fn load(&self) -> Result<Arc<[u8]>> {
        if let Some(data) = self.inner.payload.data.get() {
            return Ok(data.clone());
        }
        abort::check(self.inner.signal.as_ref())?;
        self.inner.payload.materialize().await
    }

    pub async fn text(&self) -> Result<String> {
        let data = self.load().await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// A `blob:` URL for the bytes, created on first request.
    ///
    /// The URL resolves back to this input's bytes until [`dispose`] is called
    /// or the last clone is dropped.
    ///
    /// [`dispose`]: ResolvableInput::dispose
    pub async fn object_url(&self) -> Result<String> {
        let data = self.load().await?;
        let mut slot = self
            .inner
            .object_url
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(slot.get_or_insert_with(|| object_url::create(data)).clone())
    }

    /// Release the transient URL, if one was created.
    pub fn dispose(&self) {
        let url = self
            .inner
            .object_url
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(url) = url {
            object_url::revoke(&url);
        }
    }

    /// Whether two handles are the same resolved input.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Finish an input, generating a name from the content if none was found.
    async fn named_or_generated(
        name: Option<String>,
        payload: Arc<Payload>,
        ctx: &ResolveContext,
    ) -> Result<Self> {
        let input = Self::new(name.unwrap_or_default(), payload, ctx.signal.clone());
        if !input.name().is_empty() {
            return Ok(input);
        }
        let data = input.load().await?;
        Ok(input.with_name(generated_name(&data)))
    }

    async fn from_path(path: PathBuf, ctx: &ResolveContext) -> Result<Self> {
        let name = file_name_of(&path);
        Self::named_or_generated(name, Payload::pending(Pending::File(path)), ctx).await
    }

    async fn from_request(request: FetchRequest, ctx: &ResolveContext) -> Result<Self> {
        if request.url.scheme() == "file" {
            let path = request.url.to_file_path().map_err(|()| {
                Error::InputResolution(format!("not a local file URL: {}", request.url))
            })?;
            return Self::from_path(path, ctx).await;
        }
        let fetched = fetch::fetch(&request, ctx).await?;
        Self::named_or_generated(
            fetched.name,
            Payload::pending(Pending::Response(fetched.response)),
            ctx,
        )
        .await
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| sanitize(&name.to_string_lossy()))
}

fn resolve(descriptor: InputDescriptor, ctx: ResolveContext) -> BoxFuture<'static, Result<ResolvableInput>> {
    async move {
        abort::check(ctx.signal.as_ref())?;
        tracing::trace!(kind = descriptor.kind(), "resolving input");

        match descriptor {
            InputDescriptor::Resolved(input) => Ok(input),
            InputDescriptor::Blob(blob) => {
                let name = blob.name.as_deref().and_then(sanitize);
                ResolvableInput::named_or_generated(name, Payload::loaded(blob.data), &ctx).await
            }
            InputDescriptor::Url(url) => {
                ResolvableInput::from_request(FetchRequest::new(url), &ctx).await
            }
            InputDescriptor::Request(request) => ResolvableInput::from_request(request, &ctx).await,
            InputDescriptor::Text(text) => match classify(&text) {
                TextKind::ObjectUrl => {
                    let data = object_url::lookup(&text).ok_or_else(|| {
                        Error::InputResolution(format!("object URL is not live: {}", text))
                    })?;
                    ResolvableInput::named_or_generated(None, Payload::loaded(data), &ctx).await
                }
                TextKind::Url(url) => {
                    ResolvableInput::from_request(FetchRequest::new(url), &ctx).await
                }
                TextKind::Path(path) => ResolvableInput::from_path(path, &ctx).await,
                TextKind::Literal => {
                    let data: Arc<[u8]> = text.into_bytes().into();
                    ResolvableInput::named_or_generated(None, Payload::loaded(data), &ctx).await
                }
            },
            InputDescriptor::Pair { content, name } => {
                let name = match name {
                    NameSource::Literal(name) => name,
                    NameSource::Deferred(thunk) => {
                        let name = thunk().await?;
                        abort::check(ctx.signal.as_ref())?;
                        name
                    }
                };
                let input = resolve(*content, ctx.clone()).await?;
                Ok(match sanitize(&name) {
                    Some(name) => input.with_name(name),
                    None => input,
                })
            }
            InputDescriptor::Bytes(data) => {
                ResolvableInput::named_or_generated(None, Payload::loaded(data), &ctx).await
            }
            InputDescriptor::File(path) => ResolvableInput::from_path(path, &ctx).await,
            InputDescriptor::Deferred(thunk) => {
                let next = thunk().await?;
                abort::check(ctx.signal.as_ref())?;
                resolve(next, ctx).await
            }
            InputDescriptor::Batch(_) => Err(Error::InputResolution(
                "a batch of inputs cannot stand in for a single input".to_string(),
            )),
        }
    }
    .boxed()
}
