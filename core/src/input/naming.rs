//! File name inference for resolved inputs

use std::sync::atomic::{AtomicU64, Ordering};

use percent_encoding::percent_decode_str;
use url::Url;

/// Process-wide counter for generated names. Never reset.
static GENERATED_NAMES: AtomicU64 = AtomicU64::new(0);

/// Characters a file name may not contain inside a core's filesystem.
const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '%'];

/// Zip local-file, end-of-directory and spanning signatures.
const ZIP_SIGNATURES: &[[u8; 4]] = &[*b"PK\x03\x04", *b"PK\x05\x06", *b"PK\x07\x08"];

/// Replace reserved and control characters with `-`.
///
/// Returns `None` when nothing usable remains.
pub fn sanitize(name: &str) -> Option<String> {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned)
    }
}

/// Percent-decode, keeping malformed escapes as literal text.
fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

/// Name taken from the last path segment of a URL.
pub fn name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    sanitize(&decode(segment))
}

/// Name from a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987, percent-encoded with a charset prefix) wins over a
/// plain `filename`.
pub fn name_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if key == "filename*" {
            let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
            extended = Some(decode(encoded.trim_matches('"')));
        } else if key == "filename" {
            plain = Some(value.trim_matches('"').to_string());
        }
    }

    extended
        .or(plain)
        .and_then(|name| sanitize(name.rsplit(['/', '\\']).next().unwrap_or(&name)))
}

pub fn is_zip(data: &[u8]) -> bool {
    data.len() >= 4 && ZIP_SIGNATURES.iter().any(|sig| data[..4] == sig[..])
}

/// `dataN.zip` or `dataN.bin`, with N never handed out twice.
pub fn generated_name(data: &[u8]) -> String {
    let n = GENERATED_NAMES.fetch_add(1, Ordering::Relaxed) + 1;
    let extension = if is_zip(data) { "zip" } else { "bin" };
    format!("data{}.{}", n, extension)
}

/// Split a file name into base name and extension at the last dot.
///
/// A leading dot does not start an extension (`.hidden` has none).
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => (&name[..index], &name[index + 1..]),
        _ => (name, ""),
    }
}
