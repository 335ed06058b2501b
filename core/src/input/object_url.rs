//! In-memory `blob:` URLs for materialized inputs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

pub const SCHEME_PREFIX: &str = "blob:retrolaunch/";

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

static OBJECT_URLS: LazyLock<Mutex<HashMap<String, Arc<[u8]>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn urls() -> std::sync::MutexGuard<'static, HashMap<String, Arc<[u8]>>> {
    OBJECT_URLS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register bytes under a fresh URL.
pub fn create(data: Arc<[u8]>) -> String {
    let url = format!("{}{}", SCHEME_PREFIX, NEXT_ID.fetch_add(1, Ordering::Relaxed));
    urls().insert(url.clone(), data);
    url
}

/// Bytes behind a live URL.
pub fn lookup(url: &str) -> Option<Arc<[u8]>> {
    urls().get(url).cloned()
}

pub fn revoke(url: &str) {
    if urls().remove(url).is_some() {
        tracing::trace!(url, "object url revoked");
    }
}
