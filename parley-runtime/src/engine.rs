//! Engine: request loop that turns a prompt string into generated text,
//! a stop cause and exact token counts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use parley_core::{GenerationParams, GenerationResult, ParleyError, Result, StopCause};

use crate::model::TokenModel;
use crate::tokenizer::ModelTokenizer;

/// A prompt queued for generation, with the channel its result goes back on.
pub struct EngineRequest {
    pub request_id: String,
    pub prompt: String,
    pub params: GenerationParams,
    pub cancel: CancelHandle,
    pub reply_tx: oneshot::Sender<Result<GenerationResult>>,
}

impl EngineRequest {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.reply_tx.is_closed()
    }
}

/// Cooperative cancellation flag shared between a waiter and the engine.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Owns the model and serves queued requests strictly one after another.
pub struct Engine {
    tokenizer: Arc<ModelTokenizer>,
    model: Box<dyn TokenModel>,
    request_rx: mpsc::Receiver<EngineRequest>,
}

impl Engine {
    pub fn new(
        tokenizer: Arc<ModelTokenizer>,
        model: Box<dyn TokenModel>,
        request_rx: mpsc::Receiver<EngineRequest>,
    ) -> Self {
        Self {
            tokenizer,
            model,
            request_rx,
        }
    }

    /// Main engine loop. Runs until every `EngineClient` is dropped.
    pub async fn run(mut self) {
        while let Some(req) = self.request_rx.recv().await {
            let result = self.generate(&req).await;
            match &result {
                Ok(out) => debug!(
                    request_id = %req.request_id,
                    prompt_tokens = out.prompt_token_count,
                    completion_tokens = out.completion_token_count,
                    stop_cause = ?out.stop_cause,
                    "generation finished"
                ),
                Err(ParleyError::Cancelled) => {
                    debug!(request_id = %req.request_id, "generation cancelled")
                }
                Err(e) => warn!(request_id = %req.request_id, error = %e, "generation failed"),
            }
            // The waiter may have gone away; nothing left to report to.
            let _ = req.reply_tx.send(result);
        }
        info!("engine stopped: request channel closed");
    }

    async fn generate(&mut self, req: &EngineRequest) -> Result<GenerationResult> {
        if req.is_cancelled() {
            return Err(ParleyError::Cancelled);
        }

        let prompt_tokens = self.tokenizer.encode(&req.prompt).map_err(controller_failure)?;
        let eos = self.tokenizer.eos_token_id();
        let mut generated: Vec<u32> = Vec::new();
        let mut text = String::new();

        let stop_cause = loop {
            if generated.len() >= req.params.max_tokens {
                break StopCause::Length;
            }
            if req.is_cancelled() {
                return Err(ParleyError::Cancelled);
            }

            let token_id = self
                .model
                .next_token(&prompt_tokens, &generated)
                .map_err(controller_failure)?;
            if token_id == eos {
                break StopCause::EndOfSequence;
            }
            generated.push(token_id);

            text = self.tokenizer.decode(&generated).map_err(controller_failure)?;
            if let Some(pos) = find_stop(&text, &req.params.stop) {
                text.truncate(pos);
                break StopCause::StopString;
            }

            // Let other tasks (and cancellation) make progress between tokens.
            tokio::task::yield_now().await;
        };

        Ok(GenerationResult {
            text,
            stop_cause,
            prompt_token_count: prompt_tokens.len(),
            completion_token_count: generated.len(),
        })
    }
}

/// Byte offset of the earliest stop string match in `text`.
fn find_stop(text: &str, stop: &[String]) -> Option<usize> {
    stop.iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

fn controller_failure(e: ParleyError) -> ParleyError {
    match e {
        ParleyError::GenerationFailed(_) | ParleyError::Cancelled => e,
        other => ParleyError::GenerationFailed(other.to_string()),
    }
}

/// Cloneable submission side of the engine queue.
#[derive(Clone)]
pub struct EngineClient {
    request_tx: mpsc::Sender<EngineRequest>,
}

impl EngineClient {
    pub fn new(request_tx: mpsc::Sender<EngineRequest>) -> Self {
        Self { request_tx }
    }

    /// Create a client together with the receiver an `Engine` consumes.
    pub fn channel(queue_depth: usize) -> (Self, mpsc::Receiver<EngineRequest>) {
        let (request_tx, request_rx) = mpsc::channel(queue_depth.max(1));
        (Self::new(request_tx), request_rx)
    }

    /// Queue a prompt. The returned handle resolves once the engine is done
    /// with it; dropping the handle cancels the request.
    pub async fn submit(
        &self,
        request_id: impl Into<String>,
        prompt: String,
        params: GenerationParams,
    ) -> Result<PendingGeneration> {
        let request_id = request_id.into();
        let cancel = CancelHandle::default();
        let (reply_tx, reply_rx) = oneshot::channel();
        let req = EngineRequest {
            request_id: request_id.clone(),
            prompt,
            params,
            cancel: cancel.clone(),
            reply_tx,
        };
        self.request_tx
            .send(req)
            .await
            .map_err(|_| ParleyError::EngineUnavailable)?;
        Ok(PendingGeneration {
            request_id,
            cancel,
            reply_rx,
        })
    }
}

/// A queued or running generation.
pub struct PendingGeneration {
    request_id: String,
    cancel: CancelHandle,
    reply_rx: oneshot::Receiver<Result<GenerationResult>>,
}

impl PendingGeneration {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the engine. A request cancelled at any point before the
    /// engine replies resolves to `Cancelled`, never to a partial result.
    pub async fn wait(mut self) -> Result<GenerationResult> {
        let result = (&mut self.reply_rx)
            .await
            .map_err(|_| ParleyError::EngineUnavailable)?;
        if self.cancel.is_cancelled() {
            return Err(ParleyError::Cancelled);
        }
        result
    }
}

impl Drop for PendingGeneration {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
