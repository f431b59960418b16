//! Token ledger node
//!
//! Reads one JSON invocation per line from stdin and writes one JSON result
//! per line to stdout:
//!
//! ```text
//! {"org":"mailabs","account":"admin","function":"Claim","args":{"amount":100,"address":"alice"}}
//! {"ok":null}
//! ```

use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use token_ledger::{
    events::log_events, spawn_contract_actor, BroadcastSink, Caller, Config, Executor, Invocation,
    Metrics, RocksState, SystemClock, TokenContract,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Deserialize)]
struct Envelope {
    org: String,
    account: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::var("TOKEN_LEDGER_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env()?,
    };
    tracing::info!(service = %config.service_name, "Starting token ledger node");

    let store = Arc::new(RocksState::open(&config)?);
    let sink = BroadcastSink::new(config.actor.event_buffer);

    tokio::spawn(log_events(sink.subscribe()));

    let executor = Executor::new(
        store,
        TokenContract::new(config.contract.clone()),
        Arc::new(SystemClock),
        Arc::new(sink),
        Metrics::new()?,
    );
    let handle = spawn_contract_actor(executor, config.actor.mailbox_capacity);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match parse_request(&line) {
            Ok((caller, invocation)) => match handle.invoke(caller, invocation).await {
                Ok(response) => json!({ "ok": response }),
                Err(e) => json!({ "error": { "kind": e.kind(), "message": e.to_string() } }),
            },
            Err(e) => json!({ "error": { "kind": "BAD_REQUEST", "message": e.to_string() } }),
        };

        stdout.write_all(reply.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    handle.shutdown().await?;
    tracing::info!("Shutting down token ledger node");
    Ok(())
}

fn parse_request(line: &str) -> anyhow::Result<(Caller, Invocation)> {
    let mut value: Value = serde_json::from_str(line).context("invalid JSON")?;
    let envelope: Envelope =
        serde_json::from_value(value.clone()).context("missing org or account")?;

    // Argument-less functions may omit `args`
    if let Some(object) = value.as_object_mut() {
        object.entry("args").or_insert_with(|| json!({}));
    }
    let invocation: Invocation = serde_json::from_value(value).context("invalid invocation")?;

    Ok((Caller::new(envelope.org, envelope.account), invocation))
}
