//! Forwarding tracing events into the buffered logger

#![cfg(feature = "tracing-bridge")]

use buffered_logger::*;
use tracing_subscriber::prelude::*;

async fn json_logger(sink: &MemorySink) -> BufferedLogger {
    let config = BufferedLoggerConfig::builder()
        .formatter(Formatter::Json)
        .cache_size(1 << 20)
        .build();
    BufferedLogger::new(config, sink.clone()).await.unwrap()
}

fn lines(sink: &MemorySink, level: Level) -> Vec<serde_json::Value> {
    sink.contents(level)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_events_become_records() {
    let sink = MemorySink::new();
    let logger = json_logger(&sink).await;
    let subscriber = tracing_subscriber::registry().with(BufferedLayer::new(logger.clone()));

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!("Error from tracing");
        tracing::info!(count = 42, user = "alice", "Message with {}", "fields");
        tracing::debug!("Below the logger's level");
    });
    logger.flush_all().await.unwrap();

    let errors = lines(&sink, Level::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["msg"], "Error from tracing");

    let infos = lines(&sink, Level::Info);
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0]["msg"], "Message with fields");
    assert_eq!(infos[0]["count"], 42);
    assert_eq!(infos[0]["user"], "alice");
    assert!(
        infos[0]["file"]
            .as_str()
            .unwrap()
            .starts_with("tracing_bridge.rs:")
    );

    assert!(!sink.contains("Below the logger's level"));
}

#[tokio::test]
async fn test_span_names_prefix_messages() {
    let sink = MemorySink::new();
    let logger = json_logger(&sink).await;
    let subscriber = tracing_subscriber::registry().with(BufferedLayer::new(logger.clone()));

    tracing::subscriber::with_default(subscriber, || {
        let span = tracing::info_span!("request");
        let _enter = span.enter();
        tracing::warn!("Inside span");
    });
    logger.flush_all().await.unwrap();

    let warns = lines(&sink, Level::Warn);
    assert_eq!(warns[0]["msg"], "request: Inside span");
}

#[tokio::test]
async fn test_repeated_events_share_a_call_site() {
    let sink = MemorySink::new();
    let logger = json_logger(&sink).await;
    let subscriber = tracing_subscriber::registry().with(BufferedLayer::new(logger.clone()));

    tracing::subscriber::with_default(subscriber, || {
        for i in 0..5 {
            tracing::info!(i, "loop");
        }
    });
    logger.flush_all().await.unwrap();

    assert_eq!(logger.resolver().cached_sites(), 1);
    assert_eq!(lines(&sink, Level::Info).len(), 5);
}
