//! Log initialisation and the optional file sink.
//!
//! Without a `log` section records go to stderr through `env_logger`. With
//! one, records are piped over an unbounded channel to [`LogSink`], a pingora
//! service that appends them to the configured file.

use std::io::{self, Write};

use async_trait::async_trait;
use env_logger::{Builder, Env, Target};
use pingora::{
    server::{ListenFds, ShutdownWatch},
    services::Service,
};
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::config;

const DEFAULT_FILTER: &str = "info";

/// `Write` half handed to `env_logger`; every record becomes one message.
pub struct ChannelWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .send(buf.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Initializes the global logger. Returns the sink service to run when a log
/// file is configured.
pub fn init(log: Option<&config::Log>) -> Option<LogSink> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER));
    let sink = log.map(|log| LogSink::new(log.clone()));
    if let Some(sink) = &sink {
        builder.target(Target::Pipe(Box::new(sink.writer())));
    }
    // a logger may already be installed, e.g. by a test harness
    let _ = builder.try_init();
    sink
}

/// Appends piped log records to a file until shutdown.
pub struct LogSink {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl LogSink {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    pub fn writer(&self) -> ChannelWriter {
        ChannelWriter {
            sender: self.sender.clone(),
        }
    }

    async fn open(&self) -> io::Result<BufWriter<tokio::fs::File>> {
        let path = std::path::Path::new(&self.config.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if metadata(parent).await.is_err() {
                create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        Ok(BufWriter::new(file))
    }
}

#[async_trait]
impl Service for LogSink {
    async fn start_service(&mut self, _fds: Option<ListenFds>, mut shutdown: ShutdownWatch) {
        let mut file = match self.open().await {
            Ok(file) => file,
            Err(e) => {
                // the logger itself writes into this sink, so report directly
                eprintln!("Failed to open log file {}: {e}", self.config.path);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("Shutdown signal received, stopping log sink");
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                eprintln!("Failed to write to log file: {e}");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // drain what was logged before shutdown
        while let Ok(data) = self.receiver.try_recv() {
            let _ = file.write_all(&data).await;
        }
        if let Err(e) = file.flush().await {
            eprintln!("Failed to flush log file: {e}");
        }
    }

    fn name(&self) -> &'static str {
        "log sink"
    }

    fn threads(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writer_forwards_records() {
        let mut sink = LogSink::new(config::Log {
            path: "unused.log".to_string(),
        });
        let mut writer = sink.writer();
        writer.write_all(b"first\n").unwrap();
        writer.write_all(b"second\n").unwrap();
        assert_eq!(sink.receiver.recv().await.unwrap(), b"first\n");
        assert_eq!(sink.receiver.recv().await.unwrap(), b"second\n");
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("pingrest-log-{}", std::process::id()));
        let path = dir.join("nested").join("gateway.log");
        let sink = LogSink::new(config::Log {
            path: path.to_string_lossy().into_owned(),
        });
        let mut file = sink.open().await.unwrap();
        file.write_all(b"line\n").await.unwrap();
        file.flush().await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"line\n");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
