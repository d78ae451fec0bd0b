//! Basic Example
//!
//! Drives a Python interpreter through lazy handles. It demonstrates:
//! - Starting a session from the environment (`HOPI_PYTHON`, `HOPI_DEBUG`)
//! - Building expressions without waiting on the interpreter
//! - Calling functions with keyword arguments
//! - Registering a decoder for a custom type
//!
//! Run with: RUST_LOG=hopi=debug cargo run --example basic

use hopi::{DecoderEntry, Session, SessionConfig, Value, args, expr};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Step 1: Start the interpreter
    let session = Session::start(SessionConfig::from_env()).await?;

    // Step 2: Compose handles; bindings are sent in the background
    let base = session.format("{}", vec![vec![3, 1, 4, 1, 5].into()])?;
    let total = session.format("sum", vec![])?.call(args![&base])?;
    let mean = expr!(session, "{t} / len({xs})", t = &total, xs = &base)?;
    println!("mean = {:?}", mean.force().await?);

    // Step 3: Keyword arguments
    let json = session.import("json").await?;
    let pretty = json.attr("dumps")?.call(args![&base; indent = 2, sort_keys = true])?;
    println!("{}", pretty.force().await?.as_str().unwrap_or_default());

    // Step 4: A custom decoder
    session
        .register(DecoderEntry::new(
            "datetime.date",
            "lambda v: v.isoformat()",
            |raw, decoder| decoder.decode(raw),
        ))
        .await?;
    let datetime = session.import("datetime").await?;
    let today = datetime.attr("date")?.attr("today")?.call(args![])?;
    if let Value::String(date) = today.force().await? {
        println!("today is {date}");
    }

    // Step 5: Remote errors come back as values
    match session.eval("1 / 0").await {
        Ok(value) => println!("unexpected: {value:?}"),
        Err(e) => println!("remote error: {e}"),
    }

    session.kill().await;
    Ok(())
}
