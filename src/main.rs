use anyhow::Context;
use creovai_chat::gateway::Gateway;
use creovai_chat::input::{InputLimits, LengthLevel};
use creovai_chat::monitor::BackendMonitor;
use creovai_chat::session::Rejected;
use creovai_chat::{ChatConfig, HttpGateway, SendOutcome, SessionStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Bundled defaults, applied underneath `.env` and the real environment
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

fn load_dotenv() {
    // A local .env wins over the bundled defaults
    let _ = dotenvy::dotenv();
    load_bundled_config();
}

fn load_bundled_config() {
    for line in BUNDLED_CONFIG.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();
            if std::env::var(key).is_err() {
                // SAFETY: called from main before the runtime or any other thread starts
                unsafe {
                    std::env::set_var(key, value);
                }
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("creovai_chat=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    let config = ChatConfig::from_env().context("invalid chat configuration")?;
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: ChatConfig) -> anyhow::Result<()> {
    let limits = InputLimits::new(config.max_message_length);
    let interval = config.health_interval;
    let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(config)?);
    let store = SessionStore::with_limits(gateway.clone(), limits);
    let monitor = BackendMonitor::spawn(gateway, interval);

    println!("Type a message, or /retry, /clear, /status, /quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let outcome = match line.trim() {
            "/quit" => break,
            "/clear" => {
                store.clear();
                println!("(cleared)");
                continue;
            }
            "/status" => {
                println!("{}", monitor.check_now().await.label());
                continue;
            }
            "/retry" => store.retry().await,
            text => {
                let assessment = limits.assess(text);
                if assessment.level == LengthLevel::Warning {
                    println!("({}/{} characters)", assessment.chars, assessment.max);
                }
                store.send(text).await
            }
        };
        report(&store, outcome);
    }

    Ok(())
}

fn report(store: &SessionStore, outcome: SendOutcome) {
    match outcome {
        SendOutcome::Replied { assistant_id, .. } => {
            let state = store.snapshot();
            if let Some(reply) = state.messages.iter().find(|m| m.id == assistant_id) {
                println!("{}", reply.content);
            }
        }
        SendOutcome::Failed(err) => println!("! {} (type /retry to try again)", err.message),
        SendOutcome::Rejected(Rejected::Empty) => println!("Please enter a message to send"),
        SendOutcome::Rejected(Rejected::Busy) => println!("Still waiting for the last reply"),
        SendOutcome::Rejected(Rejected::TooLong(a)) => {
            println!("Message too long: {}/{} characters", a.chars, a.max)
        }
        SendOutcome::Rejected(Rejected::NothingToRetry) => println!("Nothing to retry"),
        SendOutcome::Stale => {}
    }
}
