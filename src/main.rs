use anyhow::Result;
use crossbeam_channel::{bounded, select, Receiver};
use franklin::integration::{
    AppConfig, ConversationEvent, OrchestratorBuilder, Phase, SubmitOutcome,
};
use franklin::messages::Sender;
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Console input, read on its own thread
enum Input {
    Line(String),
    Eof,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "franklin=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = AppConfig::from_env()?;
    let speak_greeting = config.speak_greeting;

    info!("Starting conversation with {}", config.persona.name);

    let mut orchestrator = OrchestratorBuilder::new().with_config(config).build()?;
    let events = orchestrator.events();

    for message in orchestrator.snapshot().messages {
        print_message(orchestrator.persona().name.as_str(), message.sender(), message.content());
    }
    println!("(commands: /voice toggles spoken replies, /stop cuts off speech, /quit exits)");

    if speak_greeting {
        orchestrator.speak_greeting();
    }

    let input = spawn_stdin_reader();
    prompt();

    loop {
        select! {
            recv(input) -> line => match line {
                Ok(Input::Line(line)) => {
                    match line.trim() {
                        "/quit" => break,
                        "/voice" => {
                            let enabled = orchestrator.toggle_voice();
                            println!("Voice replies {}", if enabled { "on" } else { "off" });
                        }
                        "/stop" => orchestrator.stop_speaking(),
                        text => match orchestrator.submit(text) {
                            SubmitOutcome::Accepted { .. } => {}
                            SubmitOutcome::RejectedBlank => {}
                            SubmitOutcome::RejectedBusy(phase) => {
                                println!("Still busy ({:?}), please wait", phase);
                            }
                        },
                    }
                    prompt();
                }
                Ok(Input::Eof) | Err(_) => break,
            },
            default(Duration::from_millis(25)) => {}
        }

        orchestrator.poll();
        render_events(&events, orchestrator.persona().name.as_str());
    }

    orchestrator.stop_speaking();
    info!("Conversation closed");
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<Input> {
    let (tx, rx) = bounded(16);
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(Input::Eof);
    });
    rx
}

fn render_events(events: &Receiver<ConversationEvent>, persona_name: &str) {
    for event in events.try_iter() {
        match event {
            ConversationEvent::MessageAppended(message) if message.is_assistant() => {
                print_message(persona_name, message.sender(), message.content());
                prompt();
            }
            ConversationEvent::MessageAppended(_) => {}
            ConversationEvent::PhaseChanged { to, .. } => match to {
                Phase::AwaitingCompletion => println!("{} is typing...", persona_name),
                Phase::Speaking => println!("(speaking, /stop to interrupt)"),
                _ => {}
            },
            ConversationEvent::Notification(notification) => {
                println!("[{}] {}", notification.title, notification.description);
                prompt();
            }
        }
    }
}

fn print_message(persona_name: &str, sender: Sender, content: &str) {
    match sender {
        Sender::Assistant => println!("{}: {}", persona_name, content),
        Sender::User => println!("You: {}", content),
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}
