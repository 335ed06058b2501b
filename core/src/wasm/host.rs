//! Host functions imported by wasm cores
//!
//! Pointers and lengths are `u32` offsets into the core's exported memory.
//! Filesystem calls return `-1` on failure; cores treat that like an errno.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use wasmtime::{Caller, Linker, Memory, StoreLimits, StoreLimitsBuilder};

use crate::module::ModuleConfig;
use crate::surface::Size;
use crate::vfs::{CoreFileSystem, MemFs};

/// Per-store data visible to host functions.
pub struct HostState {
    pub config: ModuleConfig,
    pub fs: Arc<MemFs>,
    pub memory: Option<Memory>,
    /// Set once the core calls `exit` or the host shuts it down
    pub exited: Arc<AtomicBool>,
    pub(super) limits: StoreLimits,
}

impl HostState {
    pub fn new(config: ModuleConfig, fs: Arc<MemFs>, memory_limit: usize) -> Self {
        Self {
            config,
            fs,
            memory: None,
            exited: Arc::new(AtomicBool::new(false)),
            limits: StoreLimitsBuilder::new().memory_size(memory_limit).build(),
        }
    }
}

pub fn register(linker: &mut Linker<HostState>) -> Result<()> {
    linker.func_wrap("env", "log", log)?;
    linker.func_wrap("env", "stdin_read", stdin_read)?;
    linker.func_wrap("env", "fs_mkdir", fs_mkdir)?;
    linker.func_wrap("env", "fs_write", fs_write)?;
    linker.func_wrap("env", "fs_size", fs_size)?;
    linker.func_wrap("env", "fs_read", fs_read)?;
    linker.func_wrap("env", "fs_unlink", fs_unlink)?;
    linker.func_wrap("env", "exit", exit)?;
    linker.func_wrap("env", "canvas_resize", canvas_resize)?;
    Ok(())
}

fn read_bytes(caller: &Caller<'_, HostState>, ptr: u32, len: u32) -> Option<Vec<u8>> {
    let memory = caller.data().memory?;
    let start = ptr as usize;
    let end = start.checked_add(len as usize)?;
    memory.data(caller).get(start..end).map(<[u8]>::to_vec)
}

fn read_str(caller: &Caller<'_, HostState>, ptr: u32, len: u32) -> Option<String> {
    String::from_utf8(read_bytes(caller, ptr, len)?).ok()
}

fn status(ok: bool) -> i32 {
    if ok { 0 } else { -1 }
}

/// Level 0 is stdout, anything else stderr.
fn log(caller: Caller<'_, HostState>, level: u32, ptr: u32, len: u32) {
    if let Some(line) = read_str(&caller, ptr, len) {
        let output = &caller.data().config.output;
        if level == 0 {
            output.stdout(&line);
        } else {
            output.stderr(&line);
        }
    }
}

/// Next queued command byte, or -1 when the queue is empty.
fn stdin_read(caller: Caller<'_, HostState>) -> i32 {
    caller
        .data()
        .config
        .commands
        .next_byte()
        .map_or(-1, i32::from)
}

fn fs_mkdir(caller: Caller<'_, HostState>, ptr: u32, len: u32) -> i32 {
    let Some(path) = read_str(&caller, ptr, len) else {
        return -1;
    };
    status(caller.data().fs.mkdir(&path).is_ok())
}

fn fs_write(caller: Caller<'_, HostState>, path_ptr: u32, path_len: u32, ptr: u32, len: u32) -> i32 {
    let (Some(path), Some(data)) = (
        read_str(&caller, path_ptr, path_len),
        read_bytes(&caller, ptr, len),
    ) else {
        return -1;
    };
    status(caller.data().fs.write_file(&path, &data).is_ok())
}

fn fs_size(caller: Caller<'_, HostState>, ptr: u32, len: u32) -> i64 {
    read_str(&caller, ptr, len)
        .and_then(|path| caller.data().fs.file_size(&path).ok())
        .map_or(-1, |size| size as i64)
}

/// Copy up to `buf_len` bytes of a file into core memory; returns the count.
fn fs_read(
    mut caller: Caller<'_, HostState>,
    path_ptr: u32,
    path_len: u32,
    buf_ptr: u32,
    buf_len: u32,
) -> i64 {
    let Some(path) = read_str(&caller, path_ptr, path_len) else {
        return -1;
    };
    let Ok(data) = caller.data().fs.read_file(&path) else {
        return -1;
    };
    let Some(memory) = caller.data().memory else {
        return -1;
    };
    let count = data.len().min(buf_len as usize);
    match memory.write(&mut caller, buf_ptr as usize, &data[..count]) {
        Ok(()) => count as i64,
        Err(_) => -1,
    }
}

fn fs_unlink(caller: Caller<'_, HostState>, ptr: u32, len: u32) -> i32 {
    let Some(path) = read_str(&caller, ptr, len) else {
        return -1;
    };
    status(caller.data().fs.unlink(&path).is_ok())
}

/// The core asked to end the process; record it and stop driving frames.
fn exit(caller: Caller<'_, HostState>, code: i32) {
    let state = caller.data();
    state.config.exit.record(code);
    state.exited.store(true, Ordering::SeqCst);
}

fn canvas_resize(caller: Caller<'_, HostState>, width: u32, height: u32) {
    caller
        .data()
        .config
        .surface
        .set_size(Size::new(width, height));
}
