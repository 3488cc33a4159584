//! Many producers feeding one flush engine

use buffered_logger::*;
use std::collections::HashMap;

const PRODUCERS: usize = 50;
const RECORDS: usize = 200;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_lose_nothing() {
    let sink = MemorySink::new();
    let config = BufferedLoggerConfig::builder()
        .formatter(Formatter::Message)
        .cache_size(4096)
        .channel_capacity(256)
        .build();
    let logger = BufferedLogger::new(config, sink.clone()).await.unwrap();

    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
        let logger = logger.clone();
        producers.push(tokio::spawn(async move {
            for seq in 0..RECORDS {
                logger
                    .submit(Level::Info, format!("{producer} {seq}"), Fields::new())
                    .await
                    .unwrap();
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    logger.flush_all().await.unwrap();

    let output = sink.contents(Level::Info);
    let mut next: HashMap<usize, usize> = HashMap::new();
    let mut total = 0;
    for line in output.lines() {
        let (producer, seq) = line.split_once(' ').unwrap();
        let producer: usize = producer.parse().unwrap();
        let seq: usize = seq.parse().unwrap();

        let expected = next.entry(producer).or_default();
        assert_eq!(seq, *expected, "producer {producer} out of order");
        *expected += 1;
        total += 1;
    }

    assert_eq!(total, PRODUCERS * RECORDS);
    assert!(next.values().all(|count| *count == RECORDS));
    assert_eq!(logger.stats().records, (PRODUCERS * RECORDS) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocking_producers_on_threads() {
    let sink = MemorySink::new();
    let config = BufferedLoggerConfig::builder()
        .formatter(Formatter::Message)
        .cache_size(1024)
        .channel_capacity(16)
        .build();
    let logger = BufferedLogger::new(config, sink.clone()).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|thread| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for seq in 0..500 {
                    logger.warn(format_args!("{thread} {seq}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    logger.shutdown().await.unwrap();
    assert_eq!(sink.contents(Level::Warn).lines().count(), 8 * 500);
}
