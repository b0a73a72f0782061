//! Server lifecycle: one explicitly constructed handle owning the HTTP
//! listener and the engine task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use parley_core::{ParleyError, Result};
use parley_runtime::{Engine, EngineClient, ModelTokenizer, TokenModel};

use crate::api::{self, openai::AppState};
use crate::chat_template::TemplateContext;
use crate::config::ServerConfig;

/// Running server. `shutdown` stops it gracefully; dropping the handle
/// without it aborts the listener and engine tasks.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_task: JoinHandle<std::io::Result<()>>,
    engine_task: JoinHandle<()>,
}

impl ServerHandle {
    /// Spawn the engine, bind the listener and start serving.
    pub async fn start(
        config: ServerConfig,
        template: TemplateContext,
        tokenizer: Arc<ModelTokenizer>,
        model: Box<dyn TokenModel>,
    ) -> Result<Self> {
        let (engine, request_rx) = EngineClient::channel(config.queue_depth);
        let engine_task = tokio::spawn(Engine::new(tokenizer, model, request_rx).run());

        let state = Arc::new(AppState {
            model_name: config.model_name.clone(),
            template,
            engine,
            default_max_tokens: config.default_max_tokens,
            verbose: config.verbose,
        });
        let app = api::router(state);

        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Parley serving '{}' on {local_addr}", config.model_name);
        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            server_task,
            engine_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, drain in-flight requests, then stop the
    /// engine once the last client handle is gone.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let served = (&mut self.server_task).await.map_err(join_error)?;
        if let Err(e) = &served {
            warn!(error = %e, "HTTP server exited with error");
        }
        (&mut self.engine_task).await.map_err(join_error)?;
        info!("Parley shut down");
        Ok(served?)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        // No-ops for tasks `shutdown` already joined.
        self.server_task.abort();
        self.engine_task.abort();
    }
}

fn join_error(e: tokio::task::JoinError) -> ParleyError {
    ParleyError::Io(std::io::Error::other(e.to_string()))
}
