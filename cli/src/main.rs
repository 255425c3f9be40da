mod client;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use client::DaemonClient;
use shared::ipc::{Command, Feedback, FieldId, NotificationLevel, Response, StatusInfo};

#[derive(Parser)]
#[command(name = "voxmail")]
#[command(about = "CLI for the voxmail voice command daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start listening for voice commands
    Start,
    /// Stop listening
    Stop,
    Toggle,
    Status,
    /// Send a finalized transcript, as if it had been spoken
    Say {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Send an interim transcript
    Interim {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Focus a compose or search field ("none" clears focus)
    Focus { field: String },
    /// Turn confirmation of destructive commands on or off
    Confirm { mode: Switch },
    /// Speak text through the daemon
    Speak {
        /// Cut off whatever is currently being spoken
        #[arg(long)]
        interrupt: bool,
        #[arg(required = true)]
        words: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

fn parse_field(field: &str) -> Result<Option<FieldId>> {
    if field.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    field
        .parse::<FieldId>()
        .map(Some)
        .map_err(|e| anyhow::anyhow!(e))
}

fn print_status(info: &StatusInfo) {
    println!("Status:");
    println!("  Running: {}", info.is_running);
    println!("  Listening: {}", info.is_listening);
    println!("  Voice: {}", info.voice_status);
    println!("  Dictating: {}", info.is_dictating);
    if let Some(action) = &info.pending_confirmation {
        println!("  Awaiting confirmation: {}", action);
    }
    println!("  Language: {}", info.language);
    println!("  Screen: {}", info.screen);
    match info.focused_field {
        Some(field) => println!("  Focus: {}", field.label()),
        None => println!("  Focus: none"),
    }
    if info.screen == "compose" {
        println!("  To: {}", info.compose.recipient);
        println!("  Subject: {}", info.compose.subject);
        println!("  Message: {}", info.compose.body.trim());
    }
}

fn print_feedback(feedback: &Feedback) {
    for line in &feedback.spoken {
        println!("> {}", line);
    }
    for notification in &feedback.notifications {
        let tag = match notification.level {
            NotificationLevel::Success => "ok",
            NotificationLevel::Info => "info",
            NotificationLevel::Error => "error",
        };
        println!("[{}] {}", tag, notification.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new();

    let command = match cli.command {
        Commands::Start => Command::Start,
        Commands::Stop => Command::Stop,
        Commands::Toggle => Command::Toggle,
        Commands::Status => Command::Status,
        Commands::Say { words } => Command::Say(words.join(" ")),
        Commands::Interim { words } => Command::Interim(words.join(" ")),
        Commands::Focus { field } => Command::Focus(parse_field(&field)?),
        Commands::Confirm { mode } => Command::SetConfirmActions(matches!(mode, Switch::On)),
        Commands::Speak { interrupt, words } => Command::Speak {
            text: words.join(" "),
            interrupt,
        },
    };

    match client.send_command(command).await {
        Ok(Response::Ok) => {
            println!("Success");
        }
        Ok(Response::Status(info)) => print_status(&info),
        Ok(Response::Feedback(feedback)) => print_feedback(&feedback),
        Ok(Response::Error(msg)) => {
            eprintln!("Error: {}", msg);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to connect to voxmaild: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
