//! # Example: byte_pipe
//!
//! Two standalone [`TaskHandle`]s pump lines through an in-memory pipe:
//! a writer that emits one line per step and a reader that prints them.
//!
//! Shows how to:
//! - Implement [`Lifecycle`] on a struct that owns I/O state.
//! - Stop cooperatively: the writer's teardown closes the pipe, which ends
//!   the reader with a step error of its own.
//!
//! ## Flow
//! ```text
//! writer.step() ──"line N"──► duplex ──► reader.step() ──► stdout
//!
//! writer.close() ──► teardown: shutdown() ──► EOF
//!                                              └─► reader.step() → Err(fatal "pipe closed")
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example byte_pipe
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use restartable::{Lifecycle, LifecycleError, TaskError, TaskHandle};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream},
    sync::Mutex,
};

struct Writer {
    pipe: Mutex<DuplexStream>,
    lines: Mutex<u32>,
}

#[async_trait]
impl Lifecycle for Writer {
    fn name(&self) -> &str {
        "writer"
    }

    async fn step(&self) -> Result<(), TaskError> {
        let mut n = self.lines.lock().await;
        *n += 1;
        let line = format!("line {n}\n");
        self.pipe
            .lock()
            .await
            .write_all(line.as_bytes())
            .await
            .map_err(TaskError::fail)?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    }

    async fn teardown(&self) -> Result<(), TaskError> {
        self.pipe.lock().await.shutdown().await.map_err(TaskError::fail)
    }
}

struct Reader {
    pipe: Mutex<BufReader<DuplexStream>>,
}

#[async_trait]
impl Lifecycle for Reader {
    fn name(&self) -> &str {
        "reader"
    }

    async fn step(&self) -> Result<(), TaskError> {
        let mut line = String::new();
        let read = self
            .pipe
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(TaskError::fail)?;
        if read == 0 {
            return Err(TaskError::fatal("pipe closed"));
        }
        print!("[reader] {line}");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (tx, rx) = tokio::io::duplex(64);

    let reader = TaskHandle::spawn(Arc::new(Reader {
        pipe: Mutex::new(BufReader::new(rx)),
    }))
    .await?;
    let writer = TaskHandle::spawn(Arc::new(Writer {
        pipe: Mutex::new(tx),
        lines: Mutex::new(0),
    }))
    .await?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    writer.close().await?;
    println!("[main] writer closed cleanly");

    // The reader cannot be interrupted mid-read; it ends once it sees EOF.
    match reader.close().await {
        Err(LifecycleError::Step(e)) => println!("[main] reader ended: {e}"),
        other => other?,
    }
    Ok(())
}
