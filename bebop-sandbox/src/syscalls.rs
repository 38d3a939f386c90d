//! The restricted WASI preview1 system-call table.
//!
//! Only what the compiler needs for stream I/O, process start-up and exit is
//! implemented. Every other function import the module declares is bound to
//! a stub that traps with [`SyscallViolation`] when called, so unexpected
//! behaviour surfaces as a fault instead of a silent no-op. Declaring an
//! unsupported import is fine as long as it is never called.

use std::io::Read;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use wasmtime::{Caller, Extern, ExternType, Linker, Memory, Module, Val};

use crate::channel::ModuleStdio;

/// Import module name for WASI preview1.
pub(crate) const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// Host calls with a real implementation.
pub(crate) const SYSCALLS: &[&str] = &[
    "args_get",
    "args_sizes_get",
    "environ_get",
    "environ_sizes_get",
    "fd_read",
    "fd_write",
    "fd_close",
    "fd_fdstat_get",
    "fd_prestat_get",
    "fd_prestat_dir_name",
    "fd_seek",
    "clock_res_get",
    "clock_time_get",
    "random_get",
    "sched_yield",
    "proc_exit",
];

mod errno {
    pub const SUCCESS: i32 = 0;
    pub const BADF: i32 = 8;
    pub const FAULT: i32 = 21;
    pub const INVAL: i32 = 28;
    pub const OVERFLOW: i32 = 61;
    pub const SPIPE: i32 = 70;
}

const STDIN: u32 = 0;
const STDOUT: u32 = 1;
const STDERR: u32 = 2;

const CLOCK_REALTIME: u32 = 0;
const CLOCK_MONOTONIC: u32 = 1;

const FILETYPE_CHARACTER_DEVICE: u8 = 2;
const FDFLAGS_APPEND: u16 = 1;

/// Per-invocation host state.
#[derive(Debug)]
pub(crate) struct SandboxState {
    args: Vec<String>,
    stdio: ModuleStdio,
    clock_origin: Instant,
}

impl SandboxState {
    pub(crate) fn new(args: Vec<String>, stdio: ModuleStdio) -> Self {
        Self {
            args,
            stdio,
            clock_origin: Instant::now(),
        }
    }
}

/// Raised by `proc_exit` to unwind the module with an exit code.
#[derive(Debug, thiserror::Error)]
#[error("module exited with code {0}")]
pub(crate) struct ProcExit(pub i32);

/// Raised by a stubbed import.
#[derive(Debug, thiserror::Error)]
#[error("unsupported system call `{call}`")]
pub(crate) struct SyscallViolation {
    pub call: String,
}

/// Register every implemented host call.
pub(crate) fn add_to_linker(linker: &mut Linker<SandboxState>) -> wasmtime::Result<()> {
    linker.func_wrap(WASI_MODULE, "args_get", args_get)?;
    linker.func_wrap(WASI_MODULE, "args_sizes_get", args_sizes_get)?;
    linker.func_wrap(WASI_MODULE, "environ_get", environ_get)?;
    linker.func_wrap(WASI_MODULE, "environ_sizes_get", environ_sizes_get)?;
    linker.func_wrap(WASI_MODULE, "fd_read", fd_read)?;
    linker.func_wrap(WASI_MODULE, "fd_write", fd_write)?;
    linker.func_wrap(WASI_MODULE, "fd_close", fd_close)?;
    linker.func_wrap(WASI_MODULE, "fd_fdstat_get", fd_fdstat_get)?;
    linker.func_wrap(WASI_MODULE, "fd_prestat_get", fd_prestat_get)?;
    linker.func_wrap(WASI_MODULE, "fd_prestat_dir_name", fd_prestat_dir_name)?;
    linker.func_wrap(WASI_MODULE, "fd_seek", fd_seek)?;
    linker.func_wrap(WASI_MODULE, "clock_res_get", clock_res_get)?;
    linker.func_wrap(WASI_MODULE, "clock_time_get", clock_time_get)?;
    linker.func_wrap(WASI_MODULE, "random_get", random_get)?;
    linker.func_wrap(WASI_MODULE, "sched_yield", || errno::SUCCESS)?;
    linker.func_wrap(WASI_MODULE, "proc_exit", proc_exit)?;
    Ok(())
}

/// Bind a trapping stub to every function import not covered by [`SYSCALLS`].
pub(crate) fn stub_unsupported_imports(
    linker: &mut Linker<SandboxState>,
    module: &Module,
) -> wasmtime::Result<()> {
    linker.allow_shadowing(true);
    for import in module.imports() {
        if import.module() == WASI_MODULE && SYSCALLS.contains(&import.name()) {
            continue;
        }
        // non-function imports are left unresolved and fail instantiation
        let ExternType::Func(ty) = import.ty() else {
            continue;
        };
        let call = format!("{}::{}", import.module(), import.name());
        tracing::debug!(call = %call, "stubbing unsupported import");
        linker.func_new(
            import.module(),
            import.name(),
            ty,
            move |_caller: Caller<'_, SandboxState>, _params: &[Val], _results: &mut [Val]| {
                tracing::error!(call = %call, "unsupported system call invoked");
                Err(wasmtime::Error::new(SyscallViolation { call: call.clone() }))
            },
        )?;
    }
    Ok(())
}

// ── Guest memory helpers ──────────────────────────────────────────────────────

fn memory(caller: &mut Caller<'_, SandboxState>) -> wasmtime::Result<Memory> {
    caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| wasmtime::Error::msg("module does not export `memory`"))
}

fn slice(data: &[u8], ptr: u32, len: u32) -> Option<&[u8]> {
    let start = ptr as usize;
    let end = start.checked_add(len as usize)?;
    data.get(start..end)
}

fn slice_mut(data: &mut [u8], ptr: u32, len: u32) -> Option<&mut [u8]> {
    let start = ptr as usize;
    let end = start.checked_add(len as usize)?;
    data.get_mut(start..end)
}

fn load_u32(data: &[u8], ptr: u32) -> Option<u32> {
    let bytes = slice(data, ptr, 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn store(data: &mut [u8], ptr: u32, bytes: &[u8]) -> i32 {
    let Ok(len) = u32::try_from(bytes.len()) else {
        return errno::OVERFLOW;
    };
    match slice_mut(data, ptr, len) {
        Some(dst) => {
            dst.copy_from_slice(bytes);
            errno::SUCCESS
        }
        None => errno::FAULT,
    }
}

fn store_len(data: &mut [u8], ptr: u32, value: usize) -> i32 {
    match u32::try_from(value) {
        Ok(v) => store(data, ptr, &v.to_le_bytes()),
        Err(_) => errno::OVERFLOW,
    }
}

/// Decode `count` `(buf, len)` iovec pairs starting at `iovs`.
fn iovecs(data: &[u8], iovs: u32, count: u32) -> Option<Vec<(u32, u32)>> {
    (0..count)
        .map(|i| {
            let base = iovs.checked_add(i.checked_mul(8)?)?;
            Some((load_u32(data, base)?, load_u32(data, base.checked_add(4)?)?))
        })
        .collect()
}

/// Write NUL-terminated `items` into `buf` and their addresses into `ptrs`.
fn store_string_table(data: &mut [u8], items: &[String], ptrs: u32, buf: u32) -> i32 {
    let mut cursor = buf;
    for (i, item) in items.iter().enumerate() {
        let Some(slot) = u32::try_from(i)
            .ok()
            .and_then(|i| i.checked_mul(4))
            .and_then(|offset| ptrs.checked_add(offset))
        else {
            return errno::OVERFLOW;
        };
        let rc = store(data, slot, &cursor.to_le_bytes());
        if rc != errno::SUCCESS {
            return rc;
        }

        let mut bytes = Vec::with_capacity(item.len() + 1);
        bytes.extend_from_slice(item.as_bytes());
        bytes.push(0);
        let rc = store(data, cursor, &bytes);
        if rc != errno::SUCCESS {
            return rc;
        }
        let Some(next) = u32::try_from(bytes.len())
            .ok()
            .and_then(|len| cursor.checked_add(len))
        else {
            return errno::OVERFLOW;
        };
        cursor = next;
    }
    errno::SUCCESS
}

fn string_table_sizes(items: &[String]) -> (usize, usize) {
    (items.len(), items.iter().map(|s| s.len() + 1).sum())
}

// ── Process arguments and environment ─────────────────────────────────────────

fn args_sizes_get(
    mut caller: Caller<'_, SandboxState>,
    argc_out: u32,
    buf_size_out: u32,
) -> wasmtime::Result<i32> {
    let (count, size) = string_table_sizes(&caller.data().args);
    let memory = memory(&mut caller)?;
    let data = memory.data_mut(&mut caller);
    let rc = store_len(data, argc_out, count);
    if rc != errno::SUCCESS {
        return Ok(rc);
    }
    Ok(store_len(data, buf_size_out, size))
}

fn args_get(mut caller: Caller<'_, SandboxState>, argv: u32, argv_buf: u32) -> wasmtime::Result<i32> {
    let memory = memory(&mut caller)?;
    let (data, state) = memory.data_and_store_mut(&mut caller);
    Ok(store_string_table(data, &state.args, argv, argv_buf))
}

fn environ_sizes_get(
    mut caller: Caller<'_, SandboxState>,
    count_out: u32,
    buf_size_out: u32,
) -> wasmtime::Result<i32> {
    let memory = memory(&mut caller)?;
    let data = memory.data_mut(&mut caller);
    let rc = store_len(data, count_out, 0);
    if rc != errno::SUCCESS {
        return Ok(rc);
    }
    Ok(store_len(data, buf_size_out, 0))
}

fn environ_get(_caller: Caller<'_, SandboxState>, _environ: u32, _environ_buf: u32) -> i32 {
    // the environment is always empty
    errno::SUCCESS
}

// ── Standard streams ──────────────────────────────────────────────────────────

fn fd_read(
    mut caller: Caller<'_, SandboxState>,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    nread_out: u32,
) -> wasmtime::Result<i32> {
    if fd != STDIN {
        return Ok(errno::BADF);
    }
    let memory = memory(&mut caller)?;
    let (data, state) = memory.data_and_store_mut(&mut caller);
    let Some(bufs) = iovecs(data, iovs, iovs_len) else {
        return Ok(errno::FAULT);
    };

    let mut total = 0usize;
    for (ptr, len) in bufs {
        let Some(dst) = slice_mut(data, ptr, len) else {
            return Ok(errno::FAULT);
        };
        let n = state.stdio.stdin.read(dst)?;
        total += n;
        if n < dst.len() {
            break;
        }
    }
    Ok(store_len(data, nread_out, total))
}

fn fd_write(
    mut caller: Caller<'_, SandboxState>,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    nwritten_out: u32,
) -> wasmtime::Result<i32> {
    let memory = memory(&mut caller)?;
    let (data, state) = memory.data_and_store_mut(&mut caller);
    let sink = match fd {
        STDOUT => &state.stdio.stdout,
        STDERR => &state.stdio.stderr,
        _ => return Ok(errno::BADF),
    };
    let Some(bufs) = iovecs(data, iovs, iovs_len) else {
        return Ok(errno::FAULT);
    };

    let mut gathered = Vec::new();
    for (ptr, len) in bufs {
        let Some(bytes) = slice(data, ptr, len) else {
            return Ok(errno::FAULT);
        };
        gathered.extend_from_slice(bytes);
    }
    let written = sink.write(&gathered);
    Ok(store_len(data, nwritten_out, written))
}

fn fd_close(_caller: Caller<'_, SandboxState>, fd: u32) -> i32 {
    // stdio stays open until the module exits
    if fd <= STDERR {
        errno::SUCCESS
    } else {
        errno::BADF
    }
}

fn fd_fdstat_get(mut caller: Caller<'_, SandboxState>, fd: u32, stat_out: u32) -> wasmtime::Result<i32> {
    if fd > STDERR {
        return Ok(errno::BADF);
    }
    let flags = if fd == STDIN { 0 } else { FDFLAGS_APPEND };
    let mut stat = [0u8; 24];
    stat[0] = FILETYPE_CHARACTER_DEVICE;
    stat[2..4].copy_from_slice(&flags.to_le_bytes());
    stat[8..16].copy_from_slice(&u64::MAX.to_le_bytes());

    let memory = memory(&mut caller)?;
    Ok(store(memory.data_mut(&mut caller), stat_out, &stat))
}

fn fd_prestat_get(_caller: Caller<'_, SandboxState>, _fd: u32, _prestat_out: u32) -> i32 {
    // no preopened directories
    errno::BADF
}

fn fd_prestat_dir_name(_caller: Caller<'_, SandboxState>, _fd: u32, _path: u32, _len: u32) -> i32 {
    errno::BADF
}

fn fd_seek(
    _caller: Caller<'_, SandboxState>,
    fd: u32,
    _offset: i64,
    _whence: u32,
    _newoffset_out: u32,
) -> i32 {
    if fd <= STDERR {
        errno::SPIPE
    } else {
        errno::BADF
    }
}

// ── Clocks, randomness, exit ──────────────────────────────────────────────────

fn clock_res_get(mut caller: Caller<'_, SandboxState>, id: u32, res_out: u32) -> wasmtime::Result<i32> {
    if id != CLOCK_REALTIME && id != CLOCK_MONOTONIC {
        return Ok(errno::INVAL);
    }
    let memory = memory(&mut caller)?;
    Ok(store(memory.data_mut(&mut caller), res_out, &1u64.to_le_bytes()))
}

fn clock_time_get(
    mut caller: Caller<'_, SandboxState>,
    id: u32,
    _precision: u64,
    time_out: u32,
) -> wasmtime::Result<i32> {
    let elapsed = match id {
        CLOCK_REALTIME => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default(),
        CLOCK_MONOTONIC => caller.data().clock_origin.elapsed(),
        _ => return Ok(errno::INVAL),
    };
    let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
    let memory = memory(&mut caller)?;
    Ok(store(memory.data_mut(&mut caller), time_out, &nanos.to_le_bytes()))
}

fn random_get(mut caller: Caller<'_, SandboxState>, buf: u32, len: u32) -> wasmtime::Result<i32> {
    let memory = memory(&mut caller)?;
    let Some(dst) = slice_mut(memory.data_mut(&mut caller), buf, len) else {
        return Ok(errno::FAULT);
    };
    rand::thread_rng().fill_bytes(dst);
    Ok(errno::SUCCESS)
}

fn proc_exit(_caller: Caller<'_, SandboxState>, code: i32) -> wasmtime::Result<()> {
    Err(wasmtime::Error::new(ProcExit(code)))
}
