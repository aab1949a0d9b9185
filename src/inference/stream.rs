//! Streaming invocation plumbing.
//!
//! A provider's `stream_completion` runs on its own task and pushes
//! `StreamChunk`s into a bounded channel. `DeltaStream` is the receiving end:
//! a `futures::Stream` that yields deltas in order, ends when the upstream
//! ends, and aborts the upstream task when dropped.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::provider::{CompletionProvider, CompletionRequest, ProviderError};
use super::types::StreamChunk;

/// Deltas buffered between the upstream reader and its consumer. Small on
/// purpose: a slow consumer should slow down the upstream reads.
pub const DELTA_BUFFER: usize = 32;

pub struct DeltaStream {
    receiver: mpsc::Receiver<StreamChunk>,
    abort: AbortHandle,
}

impl DeltaStream {
    /// Spawns the provider's streaming call and returns the receiving end.
    pub fn spawn(
        provider: Arc<dyn CompletionProvider>,
        system_prompt: String,
        user_message: String,
    ) -> Self {
        let (chunk_tx, chunk_rx) = mpsc::channel::<StreamChunk>(DELTA_BUFFER);
        let failure_tx = chunk_tx.clone();
        let provider_id = provider.id();

        let handle = tokio::spawn(async move {
            let request = CompletionRequest {
                system_prompt: &system_prompt,
                user_message: &user_message,
            };

            match provider.stream_completion(request, chunk_tx).await {
                Ok(()) => debug!("{} stream finished", provider_id),
                Err(ProviderError::ChannelClosed) => {
                    info!("{} stream abandoned: consumer went away", provider_id);
                }
                Err(e) => {
                    info!("{} stream error: {}", provider_id, e);
                    if failure_tx.send(StreamChunk::Failed(e)).await.is_err() {
                        debug!("Failure not delivered: receiver dropped");
                    }
                }
            }
        });

        Self {
            receiver: chunk_rx,
            abort: handle.abort_handle(),
        }
    }
}

impl Stream for DeltaStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for DeltaStream {
    fn drop(&mut self) {
        if !self.abort.is_finished() {
            debug!("Delta stream dropped early, aborting upstream read");
            self.abort.abort();
        }
    }
}
