//! Launching the interpreter process

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::InterpreterConfig;

/// Byte streams to and from a running interpreter.
pub struct InterpreterChannel {
    /// Interpreter output (replies and log records)
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Interpreter input (requests)
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    /// Process handle, absent for in-memory interpreters
    pub child: Option<Child>,
}

/// Starts interpreter instances. The bridge calls this once at first use and
/// again after every unexpected exit.
#[async_trait]
pub trait InterpreterSpawner: Send + Sync {
    async fn spawn(&self) -> io::Result<InterpreterChannel>;

    /// Human readable description for logs and errors
    fn describe(&self) -> String;
}

/// Spawns the interpreter as a subprocess speaking over stdin/stdout.
#[derive(Debug, Clone)]
pub struct SubprocessSpawner {
    program: String,
    args: Vec<String>,
}

impl SubprocessSpawner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &InterpreterConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

#[async_trait]
impl InterpreterSpawner for SubprocessSpawner {
    async fn spawn(&self) -> io::Result<InterpreterChannel> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("interpreter stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("interpreter stdout was not captured"))?;

        if let Some(stderr) = child.stderr.take() {
            let program = self.program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "pike_interpreter", "[{}] {}", program, line);
                }
            });
        }

        info!("Spawned interpreter: {} (pid {:?})", self.describe(), child.id());
        Ok(InterpreterChannel {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}
