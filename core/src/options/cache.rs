//! Identity cache for resolved inputs
//!
//! Keyed per field by the identity of the raw value before resolution, so a
//! second launch naming the same core or ROM skips resolvers and downloads.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use super::ResolvedCore;
use crate::input::ResolvableInput;

/// Cacheable launch fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Core,
    Rom,
    Bios,
    Shader,
    State,
    Sram,
}

#[derive(Clone)]
enum Entry {
    Core(ResolvedCore),
    Inputs(Vec<ResolvableInput>),
}

static CACHE: LazyLock<Mutex<HashMap<(Field, String), Entry>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn with_cache<T>(f: impl FnOnce(&mut HashMap<(Field, String), Entry>) -> T) -> T {
    f(&mut CACHE.lock().unwrap_or_else(|p| p.into_inner()))
}

pub(crate) fn get_core(identity: &str) -> Option<ResolvedCore> {
    with_cache(|cache| match cache.get(&(Field::Core, identity.to_string())) {
        Some(Entry::Core(core)) => Some(core.clone()),
        _ => None,
    })
}

pub(crate) fn put_core(identity: String, core: ResolvedCore) {
    with_cache(|cache| cache.insert((Field::Core, identity), Entry::Core(core)));
}

pub(crate) fn get_inputs(field: Field, identity: &str) -> Option<Vec<ResolvableInput>> {
    with_cache(|cache| match cache.get(&(field, identity.to_string())) {
        Some(Entry::Inputs(inputs)) => Some(inputs.clone()),
        _ => None,
    })
}

pub(crate) fn put_inputs(field: Field, identity: String, inputs: Vec<ResolvableInput>) {
    with_cache(|cache| cache.insert((field, identity), Entry::Inputs(inputs)));
}

/// Forget every cached resolution.
pub fn clear_cache() {
    let cleared = with_cache(|cache| {
        let n = cache.len();
        cache.clear();
        n
    });
    tracing::debug!(entries = cleared, "input cache cleared");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_do_not_share_entries() {
        let input = ResolvableInput::from_bytes("a.bin", vec![1u8]);
        put_inputs(Field::Bios, "text:cache-test-a".into(), vec![input.clone()]);

        assert!(get_inputs(Field::Rom, "text:cache-test-a").is_none());
        let hit = get_inputs(Field::Bios, "text:cache-test-a").unwrap();
        assert!(hit[0].ptr_eq(&input));
    }
}
