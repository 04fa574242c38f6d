use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_tutor::{
    create_router, partition, AppState, Config, ConversationDriver, FileCapture,
    HttpConversationClient, LanguageTag, NatsClient, NatsRecognizer, NatsSpeechEngine, Platform,
    SegmentedSynthesizer, VoiceCatalog,
};

#[derive(Parser)]
#[command(name = "voice-tutor", version, about = "Voice conversation partner for language practice")]
struct Cli {
    /// Configuration file, without extension
    #[arg(short, long, default_value = "config/voice-tutor")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the conversation service and its HTTP API
    Serve,
    /// Print the language detected for a piece of text
    Detect { text: String },
    /// Show how a reply would be split for speech
    Segments {
        text: String,
        /// Language of the conversation, used for shared scripts
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let cfg = Config::load(&cli.config)?;
            serve(cfg).await
        }
        Command::Detect { text } => {
            println!("{}", voice_tutor::detect(&text));
            Ok(())
        }
        Command::Segments { text, language } => {
            let language = language.map(LanguageTag::new);
            for segment in partition(&text, language.as_ref()) {
                println!("{}\t{:?}", segment.language, segment.text);
            }
            Ok(())
        }
    }
}

async fn serve(cfg: Config) -> Result<()> {
    info!("Voice Tutor v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Conversation endpoint: {}", cfg.conversation.endpoint);
    info!("Microphone input: {}", cfg.audio.input_path);

    let nats = NatsClient::connect(&cfg.nats.url).await?;

    let catalog = VoiceCatalog::global();
    let engine = Arc::new(NatsSpeechEngine::new(nats.clone()));
    engine.spawn_voice_discovery(Arc::clone(&catalog));

    let client = HttpConversationClient::new(cfg.conversation.endpoint.clone(), cfg.request_timeout())
        .context("Failed to build conversation client")?;

    let platform = Platform {
        capture: Box::new(FileCapture::new(cfg.audio.input_path.clone(), cfg.capture())),
        recognizer: Box::new(NatsRecognizer::new(nats, cfg.recognizer())),
        synthesizer: Arc::new(SegmentedSynthesizer::new(engine, catalog, cfg.synthesizer())),
        client: Arc::new(client),
    };

    let (conversation, driver) = ConversationDriver::spawn(platform, cfg.driver());

    let app = create_router(AppState::new(conversation.clone()));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutting down");
    if conversation.shutdown().is_ok() {
        driver.await.context("Conversation driver panicked")?;
    }

    Ok(())
}
