//! Out-of-process interpreter bridge

pub mod pending;
pub mod process;
pub mod protocol;
pub mod spawner;

pub use process::ProcessBridge;
pub use spawner::{InterpreterChannel, InterpreterSpawner, SubprocessSpawner};
