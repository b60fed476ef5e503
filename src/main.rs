//! rest-responder demo driver.
//!
//! Runs one scripted response through a [`ResponseHandler`] on top of an
//! in-memory channel whose writes complete on the Tokio runtime, then prints
//! what the transport was asked to do as JSON lines.
//!
//! ```text
//!   scenario ──▶ ResponseHandler ──▶ MemoryChannel ──▶ stdout (JSON lines)
//!                     │                   │
//!                     └── WriteTracker ◀──┘ completions on runtime threads
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, ValueEnum};
use http::HeaderMap;
use serde_json::{json, Value};
use tokio::runtime::Handle;

use rest_responder::channel::{ChannelEvent, CompletionMode, Frame, MemoryChannel};
use rest_responder::config::{load_config, ResponderConfig};
use rest_responder::error::{ResponseError, RestServiceError, RestServiceErrorCode};
use rest_responder::observability::{logging, metrics, ResponseMetrics};
use rest_responder::response::{ConnectionHandler, ResponseHandler};

#[derive(Parser)]
#[command(name = "rest-responder")]
#[command(about = "Drive a scripted response through the response handler", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Response to produce.
    #[arg(short, long, value_enum, default_value_t = Scenario::Streamed)]
    scenario: Scenario,

    /// Make every transport write fail.
    #[arg(long)]
    fail_writes: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Content type, two body chunks, clean completion.
    Streamed,
    /// Completion with a client error before anything was sent.
    BadRequest,
    /// Completion with a server error after the body started.
    LateError,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResponderConfig::default(),
    };
    logging::init_logging(&config.logging);

    tracing::info!(
        scenario = ?cli.scenario,
        fail_writes = cli.fail_writes,
        metadata_lock_timeout_ms = config.handler.metadata_lock_timeout_ms,
        write_lock_timeout_ms = config.handler.write_lock_timeout_ms,
        "rest-responder starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let channel = MemoryChannel::new(CompletionMode::Spawned(Handle::current()));
    channel.set_fail_writes(cli.fail_writes);
    let connection = ConnectionHandler::new(
        Arc::new(channel.clone()),
        config.handler.clone(),
        ResponseMetrics::register(),
    );

    let handler = connection.response_handler();
    run_scenario(&handler, cli.scenario);

    tokio::time::timeout(Duration::from_secs(5), channel.closed())
        .await
        .map_err(|_| "channel was not closed after the response completed")?;

    for event in channel.events() {
        println!("{}", event_json(&event));
    }
    tracing::info!(connection_id = %connection.id(), "Response complete");
    Ok(())
}

fn run_scenario(handler: &ResponseHandler, scenario: Scenario) {
    match scenario {
        Scenario::Streamed => match stream_body(handler) {
            Ok(()) => handler.on_request_complete(None),
            Err(e) => handler.on_request_complete(Some(&e)),
        },
        Scenario::BadRequest => {
            let cause = RestServiceError::new(RestServiceErrorCode::InvalidArgs, "bad id");
            handler.on_request_complete(Some(&cause));
        }
        Scenario::LateError => {
            if let Err(e) = handler.add_to_body(Bytes::from_static(b"partial"), false) {
                tracing::warn!(error = %e, "Body chunk rejected");
            }
            let cause = RestServiceError::new(
                RestServiceErrorCode::InternalServerError,
                "storage unavailable",
            );
            handler.on_request_complete(Some(&cause));
        }
    }
}

fn stream_body(handler: &ResponseHandler) -> Result<(), ResponseError> {
    handler.set_content_type("text/plain")?;
    handler.add_to_body(Bytes::from_static(b"hello"), false)?;
    handler.add_to_body(Bytes::from_static(b" world"), true)?;
    Ok(())
}

fn event_json(event: &ChannelEvent) -> Value {
    match event {
        ChannelEvent::Write { id, frame } => {
            json!({ "event": "write", "write_id": id.as_u64(), "frame": frame_json(frame) })
        }
        ChannelEvent::Flush => json!({ "event": "flush" }),
        ChannelEvent::CloseScheduled { after } => {
            json!({ "event": "close_scheduled", "after_write_id": after.as_u64() })
        }
        ChannelEvent::Closed => json!({ "event": "closed" }),
    }
}

fn frame_json(frame: &Frame) -> Value {
    match frame {
        Frame::Metadata(metadata) => json!({
            "type": "metadata",
            "status": metadata.status.as_u16(),
            "headers": headers_json(&metadata.headers),
        }),
        Frame::Content { data, last } => json!({
            "type": "content",
            "body": String::from_utf8_lossy(data),
            "last": last,
        }),
        Frame::Full { metadata, body } => json!({
            "type": "full",
            "status": metadata.status.as_u16(),
            "headers": headers_json(&metadata.headers),
            "body": String::from_utf8_lossy(body),
        }),
    }
}

fn headers_json(headers: &HeaderMap) -> Value {
    Value::Object(
        headers
            .iter()
            .map(|(name, value)| {
                (name.to_string(), json!(value.to_str().unwrap_or("<binary>")))
            })
            .collect(),
    )
}
