//! A terminal chat over your own documents.
//!
//! Type a question to get an answer grounded on the Pinecone index, `/test`
//! to check the index connection, `/reset` to start over, and `/quit` to
//! leave.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use grounded_chat::SessionBuilder;
use grounded_chat::core::{ChatResponse, TurnStage};
use grounded_chat_openai::OpenAIConfigBuilder;
use grounded_chat_pinecone::PineconeConfigBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::sync::watch;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(openai_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let Ok(pinecone_key) = env::var("PINECONE_API_KEY") else {
        eprintln!("PINECONE_API_KEY environment variable is not set");
        return;
    };
    let Ok(index_name) = env::var("PINECONE_INDEX") else {
        eprintln!("PINECONE_INDEX environment variable is not set");
        return;
    };

    let mut openai = OpenAIConfigBuilder::with_api_key(openai_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        openai = openai.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        openai = openai.with_chat_model(model);
    }
    if let Ok(model) = env::var("OPENAI_EMBEDDING_MODEL") {
        openai = openai.with_embedding_model(model);
    }
    let mut pinecone = PineconeConfigBuilder::new(pinecone_key, index_name);
    if let Ok(namespace) = env::var("PINECONE_NAMESPACE") {
        pinecone = pinecone.with_namespace(namespace);
    }

    let (stage_tx, stage_rx) = watch::channel(TurnStage::Idle);
    let session = SessionBuilder::new(openai.build(), pinecone.build())
        .on_stage(move |stage| {
            stage_tx.send_replace(stage);
        })
        .build();

    let Ok(progress_style) = ProgressStyle::with_template("{spinner} {wide_msg}")
    else {
        error!("invalid progress template");
        return;
    };
    let progress_style = progress_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                let id = session.reset();
                println!("{}", format!("Started a new conversation ({id})").dimmed());
                continue;
            }
            "/test" => {
                let report = session.test_connection().await;
                if report.success {
                    println!("{}{}", BAR_CHAR.bright_green(), report.message);
                } else {
                    println!("{}{}", BAR_CHAR.bright_red(), report.message);
                }
                continue;
            }
            _ => {}
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.enable_steady_tick(Duration::from_millis(100));

        let turn = session.send_message(line);
        tokio::pin!(turn);
        let mut stage_rx = stage_rx.clone();
        let result = loop {
            progress_bar.set_message(stage_label(*stage_rx.borrow()));
            tokio::select! {
                result = &mut turn => break result,
                changed = stage_rx.changed() => {
                    if changed.is_err() {
                        break turn.await;
                    }
                }
            }
        };
        progress_bar.finish_and_clear();

        match result {
            Ok(resp) => print_response(&resp),
            Err(err) => {
                println!("{}{} {}", BAR_CHAR.bright_red(), err.kind().red(), err);
            }
        }
    }
}

fn stage_label(stage: TurnStage) -> &'static str {
    match stage {
        TurnStage::Retrieving => "🔎 Searching documents...",
        TurnStage::DegradedRetrieval => "⚠️  Documents unavailable, answering anyway...",
        TurnStage::Generating => "🤔 Thinking...",
        TurnStage::Idle | TurnStage::Completed | TurnStage::Failed => "",
    }
}

fn print_response(resp: &ChatResponse) {
    let bar = BAR_CHAR.bright_cyan();
    println!("{bar}🤖 {}", resp.answer.bright_white());

    if let Some(failure) = &resp.retrieval_failure {
        println!(
            "{}Answered without your documents: {}",
            BAR_CHAR.bright_yellow(),
            failure.message.yellow()
        );
        println!();
        return;
    }

    for (i, source) in resp.sources.iter().enumerate() {
        let percent = (source.similarity * 100.0).round();
        print!("{bar}  [{}] {} ", i + 1, source.title.bold());
        print!("{}", format!("({percent}% match)").dimmed());
        if let Some(url) = &source.url {
            print!(" {}", url.underline());
        }
        println!();
    }
    let confidence = format!("confidence {:.0}%", resp.confidence * 100.0);
    if resp.confidence >= 0.7 {
        println!("{bar}{}", confidence.green());
    } else if resp.confidence >= 0.4 {
        println!("{bar}{}", confidence.yellow());
    } else {
        println!("{bar}{}", confidence.red());
    }
    println!();
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
