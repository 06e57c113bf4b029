use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use aethereus_core::api::ApiClient;
use aethereus_core::auth::TokenCache;
use aethereus_core::formatter::{RenderedContentCache, format_message_content};
use aethereus_core::models::{ConversationId, MessageId, Role};
use aethereus_core::repositories::{ConversationStore, JsonFileStore};
use aethereus_core::services::read_upload_file;
use aethereus_core::session::CancelHandle;
use aethereus_core::{ChatSession, ClientConfig, ExchangeOutcome, SessionEvent};
use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Flags shared by every subcommand
pub struct GlobalOptions {
    pub config_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub data_dir: Option<PathBuf>,
}

async fn load_config(options: &GlobalOptions) -> Result<(ClientConfig, PathBuf)> {
    let path = match &options.config_path {
        Some(path) => path.clone(),
        None => ClientConfig::default_path()?,
    };
    let mut config = ClientConfig::load(&path)
        .await
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(url) = &options.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(dir) = &options.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok((config, path))
}

async fn build_session(options: &GlobalOptions) -> Result<ChatSession> {
    let (config, _) = load_config(options).await?;

    let client = ApiClient::from_config(&config)?;
    let local = Arc::new(JsonFileStore::new(config.resolve_data_dir()?));
    let store = ConversationStore::new(client.clone(), local);

    let mut session = ChatSession::new(client, store)
        .with_models(config.chat_model.clone(), config.image_model.clone());
    session.set_identity(options.token.clone().map(TokenCache::from_static));

    info!(
        api = %config.api_base_url,
        signed_in = session.is_signed_in(),
        "Session ready"
    );
    Ok(session)
}

fn parse_id(raw: &str) -> Result<ConversationId> {
    ConversationId::parse(raw).ok_or_else(|| anyhow!("Invalid conversation id: {}", raw))
}

/// Whether an exchange is in flight, as seen from the session's events
#[derive(Clone, Default)]
struct ExchangeActivity {
    running: Arc<AtomicBool>,
}

impl ExchangeActivity {
    fn observe(&self, event: &SessionEvent) {
        if let SessionEvent::StateChanged(state) = event {
            self.running.store(state.is_loading(), Ordering::SeqCst);
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Print assistant text as it streams in
fn spawn_printer(mut events: UnboundedReceiver<SessionEvent>, activity: ExchangeActivity) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut current: Option<MessageId> = None;
        let mut printed = String::new();
        let mut stdout = std::io::stdout();

        while let Some(event) = events.recv().await {
            activity.observe(&event);
            match event {
                SessionEvent::MessageAppended(message) if !message.is_user() => {
                    print!("{}", message.content);
                    printed = message.content;
                    current = Some(message.id);
                }
                SessionEvent::MessageUpdated { id, content } if current.as_ref() == Some(&id) => {
                    match content.strip_prefix(printed.as_str()) {
                        Some(delta) => print!("{}", delta),
                        // Replaced rather than extended (error text, image markdown)
                        None => print!("\n{}", content),
                    }
                    printed = content;
                }
                SessionEvent::StateChanged(state) if state.is_terminal() => {
                    println!();
                    current = None;
                    printed.clear();
                }
                SessionEvent::ConversationCreated(conversation) => {
                    info!(conversation_id = %conversation.id, title = %conversation.title, "Conversation created");
                }
                _ => {}
            }
            let _ = stdout.flush();
        }
    })
}

/// Ctrl-C cancels the running exchange; with nothing running it exits
fn spawn_interrupt_handler(handle: CancelHandle, activity: ExchangeActivity) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !activity.is_running() {
                eprintln!();
                std::process::exit(130);
            }
            warn!("Interrupted, cancelling the running request");
            handle.cancel();
        }
    })
}

pub async fn chat(
    options: &GlobalOptions,
    message: Option<String>,
    model: Option<String>,
    conversation: Option<String>,
    attach: Option<PathBuf>,
) -> Result<()> {
    let mut session = build_session(options).await?;
    if let Some(model) = model {
        session.set_chat_model(model);
    }
    if let Some(raw) = conversation {
        let id = parse_id(&raw)?;
        if !session.select_conversation(&id).await? {
            return Err(anyhow!("Conversation {} not found", id));
        }
    }

    let activity = ExchangeActivity::default();
    let printer = spawn_printer(session.subscribe(), activity.clone());
    let interrupts = spawn_interrupt_handler(session.cancel_handle(), activity);

    let mut attachment = match attach {
        Some(path) => Some(read_upload_file(&path).await?),
        None => None,
    };

    match message {
        Some(text) => {
            let outcome = match attachment.take() {
                Some(file) => session.send_with_file(&text, file).await,
                None => session.send_message(&text, None).await,
            };
            report(outcome);
        }
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            eprintln!("Chatting with {}. /new starts a new conversation, /model <name> switches model, /quit exits.", session.chat_model());

            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                match line {
                    "/quit" | "/exit" => break,
                    "/new" => {
                        session.start_new_conversation();
                        eprintln!("Started a new conversation");
                    }
                    _ if line.starts_with("/model ") => {
                        let model = line.trim_start_matches("/model ").trim();
                        session.set_chat_model(model);
                        eprintln!("Model set to {}", model);
                    }
                    _ => {
                        let outcome = match attachment.take() {
                            Some(file) => session.send_with_file(line, file).await,
                            None => session.send_message(line, None).await,
                        };
                        report(outcome);
                    }
                }
            }
        }
    }

    interrupts.abort();
    drop(session);
    let _ = printer.await;
    Ok(())
}

fn report(outcome: ExchangeOutcome) {
    match outcome {
        ExchangeOutcome::Skipped => eprintln!("Nothing to send"),
        ExchangeOutcome::Cancelled => eprintln!("Cancelled"),
        ExchangeOutcome::Completed | ExchangeOutcome::Failed => {}
    }
}

pub async fn list(options: &GlobalOptions) -> Result<()> {
    let mut session = build_session(options).await?;
    session.load_conversations().await?;

    let conversations = session.conversations().list_all();
    if conversations.is_empty() {
        eprintln!("No conversations yet");
    }
    for conversation in conversations {
        println!(
            "{}\t{}\t{}\t{}",
            conversation.id,
            conversation.ai_model,
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
            conversation.title
        );
    }
    Ok(())
}

pub async fn show(options: &GlobalOptions, raw_id: &str, html: bool) -> Result<()> {
    let mut session = build_session(options).await?;
    let id = parse_id(raw_id)?;
    if !session.select_conversation(&id).await? {
        return Err(anyhow!("Conversation {} not found", id));
    }

    let mut cache = RenderedContentCache::new();
    for message in session.messages() {
        let label = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        let body = if html {
            cache.render(&message.id, &message.content).to_string()
        } else {
            message.content.clone()
        };
        println!("[{}] {}", label, body);
        if let Some(url) = &message.attachment_url {
            println!("  attachment: {}", url);
        }
    }
    Ok(())
}

pub async fn delete(options: &GlobalOptions, raw_id: &str) -> Result<()> {
    let mut session = build_session(options).await?;
    let id = parse_id(raw_id)?;
    session.delete_conversation(&id).await?;
    eprintln!("Deleted conversation {}", id);
    Ok(())
}

pub async fn image(options: &GlobalOptions, prompt: &str) -> Result<()> {
    let mut session = build_session(options).await?;
    let printer = spawn_printer(session.subscribe(), ExchangeActivity::default());

    let outcome = session.generate_image(prompt).await;
    report(outcome);

    drop(session);
    let _ = printer.await;
    if outcome == ExchangeOutcome::Failed {
        return Err(anyhow!("Image generation failed"));
    }
    Ok(())
}

pub async fn gallery(options: &GlobalOptions) -> Result<()> {
    let mut session = build_session(options).await?;
    if !session.is_signed_in() {
        return Err(anyhow!("The gallery requires a token (--token or AETHEREUS_TOKEN)"));
    }
    session.load_images().await?;

    for image in session.gallery() {
        println!("{}\t{}", image.image_url, image.prompt);
    }
    Ok(())
}

pub async fn render(file: Option<PathBuf>) -> Result<()> {
    let text = match file {
        Some(path) => read_text(&path).await?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };
    println!("{}", format_message_content(&text));
    Ok(())
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

pub async fn show_config(options: &GlobalOptions, save: bool) -> Result<()> {
    let (config, path) = load_config(options).await?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save(&path).await?;
        eprintln!("Saved settings to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aethereus_core::ExchangeState;

    #[test]
    fn test_activity_follows_exchange_state() {
        let activity = ExchangeActivity::default();
        assert!(!activity.is_running());

        activity.observe(&SessionEvent::StateChanged(ExchangeState::Submitting));
        assert!(activity.is_running());
        activity.observe(&SessionEvent::MessagesReset);
        assert!(activity.is_running());
        activity.observe(&SessionEvent::StateChanged(ExchangeState::Streaming));
        assert!(activity.is_running());

        activity.observe(&SessionEvent::StateChanged(ExchangeState::Cancelled));
        assert!(!activity.is_running());
        activity.observe(&SessionEvent::StateChanged(ExchangeState::Idle));
        assert!(!activity.is_running());
    }
}
