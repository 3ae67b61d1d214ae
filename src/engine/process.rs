#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::EngineTransport;
use crate::error::ExecutorError;

/// How to launch the engine binary.
#[derive(Clone, Debug)]
pub struct ProcessTransportOptions {
    /// Path to the engine executable.
    pub program: PathBuf,
    /// Arguments passed to the engine.
    pub args: Vec<String>,
    /// Extra environment for the engine process.
    pub env: Vec<(String, String)>,
}

impl ProcessTransportOptions {
    /// Launches `program` without arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

struct EngineProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Line-delimited JSON transport over an engine child process.
///
/// Each request is written as one line on the engine's stdin and answered by
/// one line on its stdout. The process is spawned on the first round trip and
/// respawned on the next round trip after it exits.
pub struct ProcessTransport {
    options: ProcessTransportOptions,
    process: Mutex<Option<EngineProcess>>,
}

impl ProcessTransport {
    /// Creates a transport; the engine is not started until first use.
    pub fn new(options: ProcessTransportOptions) -> Self {
        Self {
            options,
            process: Mutex::new(None),
        }
    }

    fn spawn(&self) -> Result<EngineProcess, ExecutorError> {
        let mut command = Command::new(&self.options.program);
        command
            .args(&self.options.args)
            .envs(self.options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        let mut child = command.spawn().map_err(|err| {
            ExecutorError::Unreachable(format!(
                "failed to start {}: {err}",
                self.options.program.display()
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutorError::Unreachable("engine stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Unreachable("engine stdout unavailable".into()))?;
        debug!(
            program = %self.options.program.display(),
            pid = child.id(),
            "engine.process.spawn"
        );
        Ok(EngineProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Stops the engine process if it is running.
    pub async fn shutdown(&self) -> Result<(), ExecutorError> {
        let mut guard = self.process.lock().await;
        if let Some(mut process) = guard.take() {
            drop(process.stdin);
            if process.child.try_wait()?.is_none() {
                process.child.kill().await?;
            }
            debug!("engine.process.shutdown");
        }
        Ok(())
    }
}

async fn exchange(process: &mut EngineProcess, request: &str) -> Result<String, ExecutorError> {
    process.stdin.write_all(request.as_bytes()).await?;
    process.stdin.write_all(b"\n").await?;
    process.stdin.flush().await?;
    let mut line = String::new();
    let read = process.stdout.read_line(&mut line).await?;
    if read == 0 {
        return Err(ExecutorError::Unreachable(
            "engine closed its output stream".into(),
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[async_trait]
impl EngineTransport for ProcessTransport {
    async fn round_trip(&self, request: String) -> Result<String, ExecutorError> {
        if request.contains('\n') {
            return Err(ExecutorError::Transport(
                "request must fit on a single line".into(),
            ));
        }
        let mut guard = self.process.lock().await;
        // Out of the slot until the reply is read; a cancelled exchange drops
        // the process and the next round trip respawns it.
        let mut process = match guard.take() {
            Some(process) => process,
            None => self.spawn()?,
        };
        match exchange(&mut process, &request).await {
            Ok(response) => {
                *guard = Some(process);
                Ok(response)
            }
            Err(err) => {
                warn!(error = %err, "engine.process.exchange_failed");
                Err(err)
            }
        }
    }
}
