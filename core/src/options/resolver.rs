use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};

use super::cache::{self, Field};
use super::defaults::{core_name_from_file, is_bare_core_id};
use super::{
    CacheOptions, CoreResolver, CoreSource, ElementSource, InputResolver, LaunchOptions,
    ResolvedCore, RuntimeOptions,
};
use crate::abort;
use crate::error::{Error, Result};
use crate::input::{InputDescriptor, ResolvableInput, ResolveContext};
use crate::module::CoreLoader;
use crate::surface::{Document, Element, Surface};
use crate::wasm::WasmCoreLoader;

/// Resolve every input of a (merged) launch request and fill in defaults.
///
/// The abort signal is checked after every await; an abort surfaces as
/// [`Error::Aborted`] and nothing resolved so far is returned.
pub async fn resolve_options(options: LaunchOptions) -> Result<RuntimeOptions> {
    let LaunchOptions {
        core,
        rom,
        bios,
        shader,
        state,
        sram,
        retroarch_config,
        retroarch_core_config,
        element,
        size,
        cache,
        respond_to_global_events,
        signal,
        before_launch,
        on_launch,
        wait_for_interaction,
        resolve_core,
        resolve_rom,
        resolve_bios,
        resolve_shader,
        loader,
        document,
        poll,
        client,
    } = options;

    let ctx = ResolveContext {
        signal: signal.clone(),
        client,
    };
    abort::check(ctx.signal.as_ref())?;

    let document = document.unwrap_or_else(Document::new);
    let surface = resolve_surface(element, &document)?;

    let core = resolve_core_field(core, resolve_core.as_ref(), cache, &ctx).await?;
    let rom = resolve_list(Field::Rom, rom, resolve_rom, cache, &ctx).await?;
    let bios = resolve_list(Field::Bios, bios, resolve_bios, cache, &ctx).await?;
    let shader = resolve_list(Field::Shader, shader, resolve_shader, cache, &ctx).await?;
    let state = resolve_single(Field::State, state, cache, &ctx).await?;
    let sram = resolve_single(Field::Sram, sram, cache, &ctx).await?;

    let loader: Arc<dyn CoreLoader> = match loader {
        Some(loader) => loader,
        None => Arc::new(WasmCoreLoader::new()?),
    };

    tracing::debug!(
        core = %core.name,
        roms = rom.len(),
        bios = bios.len(),
        shaders = shader.len(),
        state = state.is_some(),
        sram = sram.is_some(),
        "launch options resolved"
    );

    Ok(RuntimeOptions {
        core,
        rom,
        bios,
        shader,
        state,
        sram,
        retroarch_config,
        retroarch_core_config,
        surface,
        document,
        size,
        respond_to_global_events: respond_to_global_events.unwrap_or(true),
        signal,
        before_launch,
        on_launch,
        wait_for_interaction,
        loader,
        poll: poll.unwrap_or_default(),
    })
}

fn resolve_surface(element: Option<ElementSource>, document: &Document) -> Result<Arc<Surface>> {
    match element {
        None => Ok(Surface::new()),
        Some(ElementSource::Existing(surface)) => Ok(surface),
        Some(ElementSource::Id(id)) => match document.element_by_id(&id) {
            Some(Element::Surface(surface)) => Ok(surface),
            Some(Element::Other { tag }) => Err(Error::Element(format!(
                "element #{} is a <{}>, not a surface",
                id, tag
            ))),
            None => Err(Error::Element(format!("no element with id {}", id))),
        },
    }
}

fn core_identity(source: &CoreSource) -> Option<String> {
    match source {
        CoreSource::Id(id) => Some(format!("core:{}", id)),
        CoreSource::Explicit { name, js, wasm } => {
            Some(format!("explicit:{}|{}|{}", name, js.identity()?, wasm.identity()?))
        }
    }
}

async fn resolve_core_field(
    source: Option<CoreSource>,
    resolver: Option<&CoreResolver>,
    cache: CacheOptions,
    ctx: &ResolveContext,
) -> Result<ResolvedCore> {
    let source = source.ok_or_else(|| Error::InputResolution("no core specified".to_string()))?;
    let identity = if cache.enabled(Field::Core) {
        core_identity(&source)
    } else {
        None
    };
    if let Some(identity) = &identity
        && let Some(hit) = cache::get_core(identity)
    {
        tracing::debug!(core = %hit.name, "core resolved from cache");
        return Ok(hit);
    }

    let resolved = match source {
        CoreSource::Explicit { name, js, wasm } => {
            let (js, wasm) = futures::try_join!(
                ResolvableInput::create(js, ctx),
                ResolvableInput::create(wasm, ctx)
            )?;
            ResolvedCore { name, js, wasm }
        }
        CoreSource::Id(id) => {
            let resolver = resolver.ok_or_else(|| {
                Error::InputResolution(format!("no resolver configured for core {}", id))
            })?;
            let files = resolver(id.clone()).await?;
            abort::check(ctx.signal.as_ref())?;
            let (js, wasm) = futures::try_join!(
                ResolvableInput::create(files.js, ctx),
                ResolvableInput::create(files.wasm, ctx)
            )?;
            let name = if is_bare_core_id(&id) {
                id
            } else {
                core_name_from_file(wasm.name())
            };
            ResolvedCore { name, js, wasm }
        }
    };
    abort::check(ctx.signal.as_ref())?;

    if let Some(identity) = identity {
        cache::put_core(identity, resolved.clone());
    }
    Ok(resolved)
}

async fn resolve_list(
    field: Field,
    descriptors: Vec<InputDescriptor>,
    resolver: Option<InputResolver>,
    cache: CacheOptions,
    ctx: &ResolveContext,
) -> Result<Vec<ResolvableInput>> {
    let cacheable = cache.enabled(field);
    let mut resolved = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let identity = if cacheable { descriptor.identity() } else { None };
        if let Some(identity) = &identity
            && let Some(hit) = cache::get_inputs(field, identity)
        {
            tracing::trace!(?field, identity = %identity, "input resolved from cache");
            resolved.extend(hit);
            continue;
        }

        let inputs = expand(descriptor, resolver.clone(), ctx.clone()).await?;
        if let Some(identity) = identity {
            cache::put_inputs(field, identity, inputs.clone());
        }
        resolved.extend(inputs);
    }
    Ok(resolved)
}

/// Resolve one list entry into zero or more inputs.
///
/// Strings go through the field's resolver once; whatever it returns is
/// resolved as-is. Batches expand in place, order preserved.
fn expand(
    descriptor: InputDescriptor,
    resolver: Option<InputResolver>,
    ctx: ResolveContext,
) -> BoxFuture<'static, Result<Vec<ResolvableInput>>> {
    async move {
        match (descriptor, resolver) {
            (InputDescriptor::Text(name), Some(resolver)) => {
                let descriptors = resolver(name).await?;
                abort::check(ctx.signal.as_ref())?;
                expand_all(descriptors, None, ctx).await
            }
            (InputDescriptor::Batch(batch), resolver) => {
                let descriptors = batch().await?;
                abort::check(ctx.signal.as_ref())?;
                expand_all(descriptors, resolver, ctx).await
            }
            (descriptor, _) => Ok(vec![ResolvableInput::create(descriptor, &ctx).await?]),
        }
    }
    .boxed()
}

async fn expand_all(
    descriptors: Vec<InputDescriptor>,
    resolver: Option<InputResolver>,
    ctx: ResolveContext,
) -> Result<Vec<ResolvableInput>> {
    let nested = try_join_all(
        descriptors
            .into_iter()
            .map(|descriptor| expand(descriptor, resolver.clone(), ctx.clone())),
    )
    .await?;
    Ok(nested.into_iter().flatten().collect())
}

async fn resolve_single(
    field: Field,
    descriptor: Option<InputDescriptor>,
    cache: CacheOptions,
    ctx: &ResolveContext,
) -> Result<Option<ResolvableInput>> {
    let Some(descriptor) = descriptor else {
        return Ok(None);
    };
    let identity = if cache.enabled(field) {
        descriptor.identity()
    } else {
        None
    };
    if let Some(identity) = &identity
        && let Some(mut hit) = cache::get_inputs(field, identity)
        && let Some(input) = hit.pop()
    {
        return Ok(Some(input));
    }

    let input = ResolvableInput::create(descriptor, ctx).await?;
    if let Some(identity) = identity {
        cache::put_inputs(field, identity, vec![input.clone()]);
    }
    Ok(Some(input))
}
