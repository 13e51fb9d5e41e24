//! TUI-less "say" command
//!
//! Submits one message to the relay, drives the frame decoder and event
//! dispatcher over the response, and prints the result. Raw Markdown is
//! printed incrementally as fragments arrive; with `markdown` enabled the
//! fully rendered HTML is printed once the turn completes.

use std::error::Error;
use std::io::{self, Write};

use tokio_util::sync::CancellationToken;

use crate::api::{ChatRequest, Event, Reference};
use crate::core::chat_stream::{TurnMessage, TurnParams, TurnStreamService};
use crate::core::config::Config;
use crate::core::turn::{Dispatcher, NoticeLevel, TurnGate, TurnSink};
use crate::render::diagram::SyntaxChecker;

struct SaySink {
    last_render: String,
}

impl TurnSink for SaySink {
    fn status_logged(&mut self, status: &str) {
        eprintln!("· {status}");
    }

    fn content_rendered(&mut self, html: &str) {
        self.last_render = html.to_string();
    }

    fn notice(&mut self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success => eprintln!("✅ {message}"),
            NoticeLevel::Error => eprintln!("❌ {message}"),
        }
    }
}

pub async fn run_say(message: Vec<String>, url: Option<String>) -> Result<(), Box<dyn Error>> {
    let prompt = message.join(" ");
    if prompt.is_empty() {
        eprintln!("Usage: passerelle say <message>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let relay_url = url.unwrap_or_else(|| config.relay_url());
    let markdown = config.markdown.unwrap_or(false);
    let single_shot = config.mode() == "single";

    let gate = TurnGate::new();
    let _permit = gate
        .begin()
        .ok_or("another turn is already in flight")?;

    let (service, mut rx) = TurnStreamService::new();
    service.spawn_turn(TurnParams {
        client: reqwest::Client::new(),
        relay_url,
        request: ChatRequest::text(prompt),
        single_shot,
        max_carry_bytes: config.max_carry_bytes(),
        cancel_token: CancellationToken::new(),
        turn_id: 1,
    });

    let mut dispatcher = Dispatcher::new(SaySink {
        last_render: String::new(),
    });
    let mut failed = false;

    loop {
        match rx.recv().await {
            Some((TurnMessage::Event(event), _)) => {
                if !markdown {
                    if let Event::Content(fragment) = &event {
                        print!("{fragment}");
                        io::stdout().flush()?;
                    }
                }
                if matches!(event, Event::Error(_)) {
                    failed = true;
                }
                dispatcher.apply(event);
            }
            Some((TurnMessage::Reply(reply), _)) => {
                if !markdown {
                    print!("{}", reply.flow);
                    io::stdout().flush()?;
                }
                dispatcher.apply_reply(reply);
            }
            Some((TurnMessage::End, _)) => {
                dispatcher.finish(&SyntaxChecker);
                break;
            }
            None => break,
        }
    }

    let (turn, sink) = dispatcher.into_parts();
    if markdown {
        println!("{}", sink.last_render);
    } else {
        println!();
    }
    print_references(turn.references());

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_references(references: &[Reference]) {
    if references.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("References:");
    for reference in references {
        eprintln!("  {} — {}", reference.title, reference.url);
    }
}
