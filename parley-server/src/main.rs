//! Parley chat server: OpenAI-compatible HTTP front end over a scripted
//! loopback engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_runtime::{ModelTokenizer, ScriptedModel};
use parley_server::chat_template::{TemplateContext, TemplateProfile};
use parley_server::config::ServerConfig;
use parley_server::server::ServerHandle;

#[derive(Parser)]
#[command(name = "parley-server", about = "Parley chat completion server")]
struct Cli {
    /// JSON server config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to tokenizer.json
    #[arg(long)]
    tokenizer: PathBuf,

    /// Built-in template profile (chatml, llama3, zephyr)
    #[arg(long, default_value = "chatml")]
    profile: String,

    /// Template profile JSON file, takes precedence over --profile
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// tokenizer_config.json to take bos/eos tokens (and with --jinja, the chat template) from
    #[arg(long)]
    tokenizer_config: Option<PathBuf>,

    /// Render with the Jinja chat_template from --tokenizer-config
    #[arg(long)]
    jinja: bool,

    /// Text the loopback engine answers every request with
    #[arg(long, default_value = "Hello! How can I help you today?")]
    reply: String,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Model name reported in responses
    #[arg(long)]
    model_name: Option<String>,

    /// Default max_tokens when a request omits it
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Engine queue depth
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Attach the __verbose diagnostic block to responses
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let template = load_template(&cli)?;
    info!("Chat template '{}' loaded", template.name());

    let tokenizer = ModelTokenizer::from_file(&cli.tokenizer)?;
    info!(
        "Tokenizer loaded (eos_token_id={})",
        tokenizer.eos_token_id()
    );
    let model = ScriptedModel::from_text(&tokenizer, &cli.reply)?;

    let handle =
        ServerHandle::start(config, template, Arc::new(tokenizer), Box::new(model)).await?;
    info!("Listening on {}", handle.local_addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    handle.shutdown().await?;
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(name) = &cli.model_name {
        config.model_name = name.clone();
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.default_max_tokens = max_tokens;
    }
    if let Some(depth) = cli.queue_depth {
        config.queue_depth = depth;
    }
    config.verbose |= cli.verbose;
    Ok(config)
}

/// Profile from file or built-in, overlaid with tokenizer_config.json.
fn load_template(cli: &Cli) -> anyhow::Result<TemplateContext> {
    let mut profile = match &cli.profile_file {
        Some(path) => TemplateProfile::from_json(&std::fs::read_to_string(path)?)?,
        None => TemplateProfile::builtin(&cli.profile)?,
    };

    if let Some(path) = &cli.tokenizer_config {
        let value = read_json(path)?;
        profile.special_tokens.overlay_tokenizer_config(&value);
        if cli.jinja {
            let tmpl = value
                .get("chat_template")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("no chat_template in {}", path.display()))?;
            profile = profile.with_jinja(tmpl);
        }
    } else if cli.jinja {
        anyhow::bail!("--jinja requires --tokenizer-config");
    }

    Ok(TemplateContext::load(profile)?)
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}
