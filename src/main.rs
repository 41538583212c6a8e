use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use poll_live_client::polls::{ListState, LoadState, PollListPage, PollView};
use poll_live_client::realtime::ChannelEvent;
use poll_live_client::{AppState, ClientConfig};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

#[macro_use]
extern crate tracing;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "poll-live-client", about = "List polls and vote with live counts")]
struct Args {
    /// Base URL of the poll HTTP API (overrides POLL_API_URL)
    #[arg(long)]
    api_url: Option<Url>,

    /// Base URL of the realtime endpoint (overrides POLL_WS_URL)
    #[arg(long)]
    ws_url: Option<Url>,

    /// Voter identity sent with each vote (overrides POLL_USER_ID)
    #[arg(long)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every poll
    List,
    /// Show one poll, follow its counts and read votes from stdin
    Watch { poll_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env().context("reading configuration")?;
    if let Some(api_url) = args.api_url {
        config.api_base_url = api_url;
    }
    if let Some(ws_url) = args.ws_url {
        config.ws_base_url = ws_url;
    }
    if args.user_id.is_some() {
        config.user_id = args.user_id;
    }

    let app_state = AppState::new(config).context("building HTTP client")?;

    match args.command {
        Command::List => list(&app_state).await,
        Command::Watch { poll_id } => watch(&app_state, &poll_id).await,
    }
}

async fn list(app_state: &AppState) -> Result<()> {
    let mut page = PollListPage::new();
    page.load(&app_state.polls).await;

    match page.state() {
        ListState::Loaded(polls) if polls.is_empty() => println!("No polls yet."),
        ListState::Loaded(polls) => {
            for poll in polls {
                match &poll.description {
                    Some(description) => println!("{}  {} - {}", poll.id, poll.title, description),
                    None => println!("{}  {}", poll.id, poll.title),
                }
            }
        }
        ListState::LoadFailed(message) => anyhow::bail!("Error: {message}"),
        ListState::Idle | ListState::Loading => {}
    }
    Ok(())
}

async fn watch(app_state: &AppState, poll_id: &str) -> Result<()> {
    let mut page = app_state.poll_page();
    page.load(&app_state.polls, poll_id).await;

    if let LoadState::LoadFailed(message) = page.state() {
        anyhow::bail!("Error: {message}");
    }
    render(&page.view());
    println!("Type an option number (or id) and press enter to vote. Ctrl-C quits.");

    // cleared once the channel closes; the snapshot stays on screen
    let mut live = true;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                let choice = line.trim();
                if choice.is_empty() {
                    continue;
                }
                if let Some(option_id) = resolve_option(&page.view(), choice) {
                    let outcome = page.vote(&option_id);
                    if outcome.accepted {
                        info!("vote sent for option {}", option_id);
                    }
                } else {
                    println!("Unknown option: {choice}");
                    continue;
                }
                render(&page.view());
            }
            event = page.next_event(), if live => match event {
                Some(ChannelEvent::Connected) => info!("live updates connected"),
                Some(ChannelEvent::Dispatched) => render(&page.view()),
                Some(ChannelEvent::Dropped) => {}
                Some(ChannelEvent::Closed) | None => {
                    warn!("realtime channel unavailable, counts will not update");
                    live = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, page.shutdown()).await.is_err() {
        warn!("realtime channel did not close in time");
    }
    Ok(())
}

/// Accepts a 1-based position in display order or a raw option id.
fn resolve_option(view: &PollView, choice: &str) -> Option<String> {
    let poll = view.poll()?;
    let ordered = poll.options_by_position();

    if let Ok(index) = choice.parse::<usize>() {
        if let Some(option) = index.checked_sub(1).and_then(|i| ordered.get(i)) {
            return Some(option.id.clone());
        }
    }
    poll.option(choice).map(|option| option.id.clone())
}

fn render(view: &PollView) {
    let Some(poll) = view.poll() else {
        return;
    };

    println!();
    println!("{} [{}]", poll.title, poll.status.as_str());
    if let Some(description) = &poll.description {
        println!("{description}");
    }
    if poll.is_expired(Utc::now()) {
        println!("(expired)");
    }
    if let Some(error) = view.vote_error() {
        println!("Vote error: {error}");
    }
    for (index, option) in poll.options_by_position().iter().enumerate() {
        println!("  {}. {} - {}", index + 1, option.text, option.vote_count);
    }
    println!("  total: {}", poll.total_votes());
}
