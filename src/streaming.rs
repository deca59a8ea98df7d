//! Streaming transport: the `<think>`/`</think>` chunk splitter and the
//! `stream()` entry point (spec §4.7).
//!
//! Streaming is produced by one selected pathway (Sequential-style
//! selection), never fanned out. Election and decomposition are not
//! streamed — they only operate on completed responses (spec §4.7, §12).

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::client::StreamChunk;
use crate::error::{MindError, MindResult};
use crate::pathway::PathwayRegistry;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const CHANNEL_BUFFER: usize = 64;

/// Single-flag state machine splitting a raw text stream into
/// `(is_thinking, chunk)` pairs on `<think>`/`</think>` tags (spec §4.7).
#[derive(Debug, Default)]
pub struct ChunkSplitter {
    buffer: String,
    thinking: bool,
}

impl ChunkSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more raw text in; returns any chunks that became ready to
    /// flush (a full tag was seen). Text with no tag just accumulates in
    /// the buffer.
    pub fn feed(&mut self, text: &str) -> Vec<StreamChunk> {
        self.buffer.push_str(text);
        let mut out = Vec::new();
        loop {
            let tag = if self.thinking { THINK_CLOSE } else { THINK_OPEN };
            let Some(pos) = self.buffer.find(tag) else { break };
            let before: String = self.buffer.drain(..pos).collect();
            self.buffer.drain(..tag.len());
            if !before.is_empty() {
                out.push((self.thinking, before));
            }
            self.thinking = !self.thinking;
        }
        out
    }

    /// Flush any remaining buffered text on stream termination.
    pub fn flush(&mut self) -> Option<StreamChunk> {
        if self.buffer.is_empty() {
            None
        } else {
            Some((self.thinking, std::mem::take(&mut self.buffer)))
        }
    }
}

/// Start streaming a response for `prompt`, using Sequential-style
/// pathway selection with failover across the pool. Returns a
/// `ReceiverStream` of `(is_thinking, chunk)` pairs; the stream completes
/// when the underlying call completes, is cancelled, or every pathway has
/// been tried.
pub async fn stream(
    registry: &PathwayRegistry,
    prompt: &str,
    cancel: CancellationToken,
) -> MindResult<ReceiverStream<StreamChunk>> {
    let mut tried: HashSet<String> = HashSet::new();

    while let Some(pathway) = registry.next_pathway(&tried) {
        tried.insert(pathway.name.clone());
        if !pathway.allow_request() {
            continue;
        }

        if let Ok(Some(mut native)) = pathway.client.stream(prompt, cancel.clone()).await {
            let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
            let pathway = pathway.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let start = std::time::Instant::now();
                let mut saw_any = false;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        chunk = native.recv() => {
                            match chunk {
                                Some(c) => {
                                    saw_any = true;
                                    if tx.send(c).await.is_err() {
                                        break;
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                }
                if saw_any {
                    pathway.record_activation(start.elapsed());
                } else {
                    pathway.record_inhibition(start.elapsed());
                }
            });
            return Ok(ReceiverStream::new(rx));
        }

        // Fall back to a single non-streaming call, chunked through the
        // tag splitter, for pathways whose client doesn't natively stream.
        let start = std::time::Instant::now();
        match pathway.client.generate(prompt, cancel.clone()).await {
            Ok(response) if !response.content.is_empty() => {
                pathway.record_activation(start.elapsed());
                let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
                tokio::spawn(async move {
                    let mut splitter = ChunkSplitter::new();
                    for chunk in splitter.feed(&response.content) {
                        if tx.send(chunk).await.is_err() {
                            return;
                        }
                    }
                    if let Some(chunk) = splitter.flush() {
                        let _ = tx.send(chunk).await;
                    }
                });
                return Ok(ReceiverStream::new(rx));
            }
            Ok(_empty) => {
                pathway.record_inhibition(start.elapsed());
            }
            Err(_) => {
                pathway.record_inhibition(start.elapsed());
            }
        }
    }

    Err(MindError::AllPathwaysExhausted)
}
