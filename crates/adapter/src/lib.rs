mod common;
mod drivers;
mod error;
mod prompts;
mod service;
mod summarize;
mod traits;

#[cfg(test)]
mod testing;

pub use common::retry::RetryPolicy;
pub use drivers::openai::{strip_code_fences, LlmConfig, OpenAiClient};
pub use drivers::reddit::{RedditClient, RedditConfig};
pub use drivers::web::{extract_main_text, WebPageReader};
pub use error::{AnalysisError, FetchError, LlmError};
pub use service::{AnalysisOutcome, AnalysisService, AnalysisSettings};
pub use summarize::{failure_placeholder, Summarizer};
pub use traits::{CacheStore, ChatMessage, ChatModel, PageReader, ThreadSource};

use domain::AppCommand;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct CommandEnvelope {
    pub cmd: AppCommand,
    /// The HTTP layer waits on this for the outcome.
    pub resp: oneshot::Sender<Result<AnalysisOutcome, AnalysisError>>,
}

/// Worker loop: one task per command until the channel closes or `cancel_token` fires.
pub async fn start(
    service: AnalysisService,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    info!("Analysis worker started");
    loop {
        tokio::select! {
            envelope = rx.recv() => {
                let Some(CommandEnvelope { cmd, resp }) = envelope else {
                    break;
                };
                let service = service.clone();
                tokio::spawn(async move {
                    let result = match cmd {
                        AppCommand::Analyze(params) => service.analyze(params).await,
                    };
                    if let Err(e) = &result {
                        error!("Command execution failed: {:?}", e);
                    }
                    // The requester may have timed out and gone away.
                    let _ = resp.send(result);
                });
            }
            _ = cancel_token.cancelled() => break,
        }
    }
    info!("Analysis worker stopped");
    Ok(())
}
