//! WASI build of the compiler, executed with `wasmtime`.
//!
//! The module is compiled once and shared; every invocation gets its own
//! store, linker and instance, so no guest state survives between requests.
//! Execution is synchronous and runs on Tokio's blocking pool.

use std::path::Path;

use async_trait::async_trait;
use wasmtime::{Engine, Linker, Module, Store};

use bebop_core::{ExitStatus, InvocationArguments};

use crate::channel::ModuleStdio;
use crate::module::CompilerModule;
use crate::syscalls::{self, ProcExit, SandboxState, SyscallViolation};
use crate::SandboxError;

/// A precompiled WASI compiler module.
#[derive(Clone)]
pub struct WasiCompiler {
    engine: Engine,
    module: Module,
}

impl WasiCompiler {
    /// Load and compile the module at `path`.
    ///
    /// # Errors
    /// Returns [`SandboxError::ModuleLoad`] if the file is missing or is not
    /// a valid WebAssembly module.
    pub fn from_file(path: &Path) -> Result<Self, SandboxError> {
        let engine = Engine::default();
        let module = Module::from_file(&engine, path)
            .map_err(|e| SandboxError::ModuleLoad(format!("{}: {e:#}", path.display())))?;
        tracing::info!(path = %path.display(), imports = module.imports().len(), "compiler module loaded");
        Ok(Self { engine, module })
    }

    /// Compile a module from WebAssembly binary or text.
    ///
    /// # Errors
    /// Returns [`SandboxError::ModuleLoad`] if the bytes do not form a valid
    /// module.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SandboxError> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes)
            .map_err(|e| SandboxError::ModuleLoad(format!("{e:#}")))?;
        Ok(Self { engine, module })
    }

    /// Run the module on the current thread until it exits.
    ///
    /// # Errors
    /// See [`CompilerModule::run`].
    pub fn execute(
        &self,
        args: InvocationArguments,
        stdio: ModuleStdio,
    ) -> Result<ExitStatus, SandboxError> {
        let mut store = Store::new(&self.engine, SandboxState::new(args.into(), stdio));
        let mut linker = Linker::new(&self.engine);
        syscalls::add_to_linker(&mut linker)
            .and_then(|()| syscalls::stub_unsupported_imports(&mut linker, &self.module))
            .map_err(|e| SandboxError::Instantiate(format!("{e:#}")))?;

        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| SandboxError::Instantiate(format!("{e:#}")))?;
        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| SandboxError::Instantiate(format!("{e:#}")))?;

        match start.call(&mut store, ()) {
            Ok(()) => Ok(ExitStatus::SUCCESS),
            Err(e) => exit_from_trap(&e),
        }
    }
}

/// Map an error unwound out of `_start` to an exit status or fault.
fn exit_from_trap(err: &wasmtime::Error) -> Result<ExitStatus, SandboxError> {
    if let Some(ProcExit(code)) = err.downcast_ref::<ProcExit>() {
        return Ok(ExitStatus(*code));
    }
    if let Some(violation) = err.downcast_ref::<SyscallViolation>() {
        return Err(SandboxError::SandboxViolation {
            call: violation.call.clone(),
        });
    }
    Err(SandboxError::Trap(format!("{err:#}")))
}

#[async_trait]
impl CompilerModule for WasiCompiler {
    async fn run(
        &self,
        args: InvocationArguments,
        stdio: ModuleStdio,
    ) -> Result<ExitStatus, SandboxError> {
        let compiler = self.clone();
        tokio::task::spawn_blocking(move || compiler.execute(args, stdio))
            .await
            .map_err(|e| SandboxError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use bebop_core::{CompilationRequest, Generator};

    use super::*;
    use crate::channel::VirtualChannels;

    const WRITE_STDOUT: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
          (memory (export "memory") 1)
          (data (i32.const 16) "generated code")
          (func (export "_start")
            (i32.store (i32.const 0) (i32.const 16))
            (i32.store (i32.const 4) (i32.const 14))
            (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))))
    "#;

    const WRITE_STDERR: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
          (memory (export "memory") 1)
          (data (i32.const 16) "error: bad schema")
          (func (export "_start")
            (i32.store (i32.const 0) (i32.const 16))
            (i32.store (i32.const 4) (i32.const 17))
            (drop (call $fd_write (i32.const 2) (i32.const 0) (i32.const 1) (i32.const 8)))))
    "#;

    const ECHO_STDIN: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "fd_read"
            (func $fd_read (param i32 i32 i32 i32) (result i32)))
          (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
          (memory (export "memory") 1)
          (func (export "_start")
            (i32.store (i32.const 0) (i32.const 64))
            (i32.store (i32.const 4) (i32.const 256))
            (drop (call $fd_read (i32.const 0) (i32.const 0) (i32.const 1) (i32.const 8)))
            (i32.store (i32.const 4) (i32.load (i32.const 8)))
            (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 12)))))
    "#;

    const ECHO_ARGS: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "args_sizes_get"
            (func $args_sizes_get (param i32 i32) (result i32)))
          (import "wasi_snapshot_preview1" "args_get"
            (func $args_get (param i32 i32) (result i32)))
          (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
          (memory (export "memory") 1)
          (func (export "_start")
            (drop (call $args_sizes_get (i32.const 16) (i32.const 20)))
            (drop (call $args_get (i32.const 32) (i32.const 128)))
            (i32.store (i32.const 0) (i32.const 128))
            (i32.store (i32.const 4) (i32.load (i32.const 20)))
            (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))))
    "#;

    const EXIT_THREE: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
          (memory (export "memory") 1)
          (func (export "_start") (call $proc_exit (i32.const 3))))
    "#;

    const CALLS_SOCK_ACCEPT: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "sock_accept"
            (func $sock_accept (param i32 i32 i32) (result i32)))
          (memory (export "memory") 1)
          (func (export "_start")
            (drop (call $sock_accept (i32.const 3) (i32.const 0) (i32.const 0)))))
    "#;

    const DECLARES_SOCK_ACCEPT: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "sock_accept"
            (func $sock_accept (param i32 i32 i32) (result i32)))
          (import "wasi_snapshot_preview1" "sched_yield" (func $sched_yield (result i32)))
          (memory (export "memory") 1)
          (func (export "_start") (drop (call $sched_yield))))
    "#;

    const UNREACHABLE: &str = r#"
        (module
          (memory (export "memory") 1)
          (func (export "_start") unreachable))
    "#;

    struct Run {
        result: Result<ExitStatus, SandboxError>,
        stdout: String,
        stderr: String,
    }

    async fn run_wat(wat: &str, schema: &str) -> Run {
        let compiler = match WasiCompiler::from_bytes(wat.as_bytes()) {
            Ok(c) => c,
            Err(e) => panic!("test module failed to compile: {e}"),
        };
        let request = CompilationRequest::new(Generator::TypeScript, "out.ts", None, schema);
        let args = InvocationArguments::build("bebopc", &request);
        let (stdio, host) = VirtualChannels::open(schema).split();

        let result = compiler.run(args, stdio).await;
        Run {
            result,
            stdout: host.stdout.read_to_string().await,
            stderr: host.stderr.read_to_string().await,
        }
    }

    #[tokio::test]
    async fn fd_write_to_stdout_reaches_host_stream() {
        let run = run_wat(WRITE_STDOUT, "").await;
        assert!(matches!(run.result, Ok(ExitStatus::SUCCESS)));
        assert_eq!(run.stdout, "generated code");
        assert!(run.stderr.is_empty(), "nothing may leak to stderr");
    }

    #[tokio::test]
    async fn fd_write_to_stderr_reaches_diagnostics_stream() {
        let run = run_wat(WRITE_STDERR, "").await;
        assert_eq!(run.stderr, "error: bad schema");
        assert!(run.stdout.is_empty());
    }

    #[tokio::test]
    async fn fd_read_delivers_schema_then_end_of_input() {
        let schema = "struct Point { 1 -> int32 x; 2 -> int32 y; }";
        let run = run_wat(ECHO_STDIN, schema).await;
        assert!(run.result.is_ok());
        assert_eq!(run.stdout, schema);
    }

    #[tokio::test]
    async fn args_are_visible_to_the_module() {
        let run = run_wat(ECHO_ARGS, "").await;
        assert_eq!(run.stdout, "bebopc\0--ts\0out.ts\0--in\0--out\0");
    }

    #[tokio::test]
    async fn proc_exit_reports_exit_code() {
        let run = run_wat(EXIT_THREE, "").await;
        assert!(matches!(run.result, Ok(ExitStatus(3))), "got {:?}", run.result);
    }

    #[tokio::test]
    async fn calling_unsupported_import_is_a_sandbox_violation() {
        let run = run_wat(CALLS_SOCK_ACCEPT, "").await;
        match run.result {
            Err(SandboxError::SandboxViolation { call }) => {
                assert_eq!(call, "wasi_snapshot_preview1::sock_accept");
            }
            other => panic!("expected SandboxViolation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn declaring_unsupported_import_without_calling_it_is_allowed() {
        let run = run_wat(DECLARES_SOCK_ACCEPT, "").await;
        assert!(matches!(run.result, Ok(ExitStatus::SUCCESS)), "got {:?}", run.result);
    }

    #[tokio::test]
    async fn trap_is_reported_as_fault() {
        let run = run_wat(UNREACHABLE, "").await;
        assert!(matches!(run.result, Err(SandboxError::Trap(_))), "got {:?}", run.result);
    }

    #[test]
    fn invalid_module_bytes_fail_to_load() {
        let result = WasiCompiler::from_bytes(b"\0asm garbage");
        assert!(matches!(result, Err(SandboxError::ModuleLoad(_))));
    }

    #[test]
    fn missing_module_file_fails_to_load() {
        let result = WasiCompiler::from_file(Path::new("/nonexistent/bebopc.wasm"));
        assert!(matches!(result, Err(SandboxError::ModuleLoad(_))));
    }
}
