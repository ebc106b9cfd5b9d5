//! Conversion/upload pipeline for a single input stream.

use crossbeam_channel::bounded;
use memcload::codec::decode;
use memcload::config::PipelineConfig;
use memcload::error::{ConfigError, LoadError};
use memcload::pipeline::{self, Frame, run_conversion};
use memcload::record::DeviceType;
use memcload::router::ShardRouter;
use memcload::stats::FileCounters;
use memcload::store::{KvStore, MemoryStore, RetryPolicy, StoreClient};
use memcload::testing::{SAMPLE_LINES, UnreachableStore, memory_router};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

fn input(lines: &[impl AsRef<str>]) -> Vec<u8> {
    let mut buf = Vec::new();
    for line in lines {
        buf.extend_from_slice(line.as_ref().as_bytes());
        buf.push(b'\n');
    }
    buf
}

fn generated(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let device_type = DeviceType::ALL[i % 4];
            format!("{device_type}\tdev{i:05}\t{}.5\t-{}.25\t{},{}", i % 90, i % 180, i, i + 1)
        })
        .collect()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        retry_delay: Duration::ZERO,
        mark_processed: false,
        ..PipelineConfig::default()
    }
}

#[test]
fn test_frames_are_cut_at_frame_size() -> anyhow::Result<()> {
    let data = input(SAMPLE_LINES);
    let (sender, receiver) = bounded::<Frame>(16);
    let counters = FileCounters::new();
    let abort = AtomicBool::new(false);

    let summary = run_conversion(&data[..], Path::new("mem"), 2, &sender, &counters, &abort)?;
    drop(sender);

    let sizes: Vec<usize> = receiver.iter().map(|frame| frame.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(summary.lines, 5);
    assert_eq!(summary.frames, 3);
    assert!(!summary.aborted);
    assert_eq!(counters.frames(), 3);
    Ok(())
}

#[test]
fn test_frames_keep_line_order() -> anyhow::Result<()> {
    let lines = generated(10);
    let data = input(&lines);
    let (sender, receiver) = bounded::<Frame>(16);
    let counters = FileCounters::new();
    let abort = AtomicBool::new(false);

    run_conversion(&data[..], Path::new("mem"), 3, &sender, &counters, &abort)?;
    drop(sender);

    let ids: Vec<String> = receiver
        .iter()
        .flat_map(|frame| frame.into_iter().map(|entry| entry.key.device_id))
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("dev{i:05}")).collect();
    assert_eq!(ids, expected);
    Ok(())
}

#[test]
fn test_bad_lines_never_reach_the_queue() -> anyhow::Result<()> {
    let data = input(&[
        "idfa\t1\t0\t0\t1",
        "",
        "idfa\t1\t0",
        "nope\t1\t0\t0\t1",
        "gaid\t\t0\t0\t1",
        "gaid\t2\t0\t0\t1",
    ]);
    let (sender, receiver) = bounded::<Frame>(16);
    let counters = FileCounters::new();
    let abort = AtomicBool::new(false);

    let summary = run_conversion(&data[..], Path::new("mem"), 10, &sender, &counters, &abort)?;
    drop(sender);

    assert_eq!(summary.lines, 6);
    let entries: usize = receiver.iter().map(|frame| frame.len()).sum();
    assert_eq!(entries, 2);
    assert_eq!(counters.errors(), 3);
    assert_eq!(counters.skipped(), 1);
    Ok(())
}

#[test]
fn test_invalid_utf8_counts_as_malformed() -> anyhow::Result<()> {
    let mut data = input(&["idfa\t1\t0\t0\t1"]);
    data.extend_from_slice(b"idfa\t\xff\xfe\t0\t0\t1\n");
    let config = config();
    let (router, stores) = memory_router(&config);
    let counters = FileCounters::new();

    pipeline::run(&data[..], Path::new("mem"), &config, &router, &counters)?;

    let outcome = counters.outcome("mem".into(), config.error_threshold);
    assert_eq!(outcome.ok, 1);
    assert_eq!(outcome.errors_by_reason.malformed_line, 1);
    assert_eq!(stores[&DeviceType::Idfa].len(), 1);
    Ok(())
}

#[test]
fn test_queue_applies_backpressure() -> anyhow::Result<()> {
    let data = input(&generated(10));
    let (sender, receiver) = bounded::<Frame>(1);
    let counters = FileCounters::new();
    let abort = AtomicBool::new(false);

    thread::scope(|scope| -> anyhow::Result<()> {
        let producer = scope.spawn(|| {
            run_conversion(&data[..], Path::new("mem"), 1, &sender, &counters, &abort)
        });

        // nobody is consuming: one frame fits, the producer blocks on the next
        thread::sleep(Duration::from_millis(200));
        assert_eq!(counters.frames(), 1);
        assert!(!producer.is_finished());

        let mut received = 0;
        while received < 10 {
            receiver.recv_timeout(Duration::from_secs(5))?;
            received += 1;
        }
        let summary = producer.join().expect("producer panicked")?;
        assert_eq!(summary.frames, 10);
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_abort_stops_conversion() -> anyhow::Result<()> {
    let data = input(SAMPLE_LINES);
    let (sender, _receiver) = bounded::<Frame>(16);
    let counters = FileCounters::new();
    let abort = AtomicBool::new(true);

    let summary = run_conversion(&data[..], Path::new("mem"), 1, &sender, &counters, &abort)?;
    assert!(summary.aborted);
    assert_eq!(summary.frames, 0);
    Ok(())
}

#[test]
fn test_run_stores_every_record() -> anyhow::Result<()> {
    let config = config();
    let (router, stores) = memory_router(&config);
    let counters = FileCounters::new();

    let summary = pipeline::run(&input(SAMPLE_LINES)[..], Path::new("mem"), &config, &router, &counters)?;

    assert_eq!(summary.lines, 5);
    assert_eq!(counters.ok(), 5);
    assert_eq!(counters.errors(), 0);
    assert_eq!(stores[&DeviceType::Idfa].len(), 2);
    assert_eq!(stores[&DeviceType::Gaid].len(), 1);
    assert_eq!(stores[&DeviceType::Adid].len(), 1);
    assert_eq!(stores[&DeviceType::Dvid].len(), 1);

    let payload = stores[&DeviceType::Adid]
        .get("adid:4rfw452y52g2gq4g")?
        .expect("adid record stored");
    let decoded = decode(&payload)?;
    assert_eq!(decoded.apps, vec![5]);
    assert_eq!(decoded.lat_or_nan(), -10.0);
    assert_eq!(decoded.lon_or_nan(), 160.5);
    Ok(())
}

#[test]
fn test_capacity_one_and_many_uploaders() -> anyhow::Result<()> {
    let config = PipelineConfig {
        frame_size: 7,
        queue_capacity: 1,
        uploader_count: 4,
        ..config()
    };
    let (router, stores) = memory_router(&config);
    let counters = FileCounters::new();

    let summary = pipeline::run(&input(&generated(1000))[..], Path::new("mem"), &config, &router, &counters)?;

    assert_eq!(summary.frames, 143);
    assert_eq!(counters.ok(), 1000);
    assert_eq!(counters.errors(), 0);
    let stored: usize = stores.values().map(MemoryStore::len).sum();
    assert_eq!(stored, 1000);
    Ok(())
}

#[test]
fn test_shard_failure_is_isolated() -> anyhow::Result<()> {
    let config = PipelineConfig {
        retry_count: 2,
        ..config()
    };
    let (mut router, stores) = memory_router(&config);
    router.insert(
        DeviceType::Gaid,
        ShardRouter::client_for(Arc::new(UnreachableStore::new("gaid-down:1")), &config),
    );
    let counters = FileCounters::new();

    pipeline::run(&input(&generated(40))[..], Path::new("mem"), &config, &router, &counters)?;

    let outcome = counters.outcome("mem".into(), config.error_threshold);
    assert_eq!(outcome.ok, 30);
    assert_eq!(outcome.error, 10);
    assert_eq!(outcome.errors_by_reason.write_failed, 10);
    assert!(!outcome.accepted);
    assert_eq!(stores[&DeviceType::Idfa].len(), 10);
    assert_eq!(stores[&DeviceType::Adid].len(), 10);
    assert_eq!(stores[&DeviceType::Dvid].len(), 10);
    assert!(stores[&DeviceType::Gaid].is_empty());
    Ok(())
}

#[test]
fn test_missing_shard_is_fatal() {
    let store = Arc::new(MemoryStore::new("idfa-only"));
    let client = StoreClient::new(store, RetryPolicy::default(), false);
    let router = ShardRouter::new().with_shard(DeviceType::Idfa, client);
    let counters = FileCounters::new();

    let data = input(&["idfa\t1\t0\t0\t1", "gaid\t2\t0\t0\t1"]);
    let result = pipeline::run(&data[..], Path::new("mem"), &config(), &router, &counters);

    assert!(matches!(
        result,
        Err(LoadError::Config(ConfigError::MissingShard(DeviceType::Gaid)))
    ));
}

#[test]
fn test_dry_run_counts_without_writing() -> anyhow::Result<()> {
    let config = PipelineConfig {
        dry_run: true,
        ..config()
    };
    let (router, stores) = memory_router(&config);
    let counters = FileCounters::new();

    pipeline::run(&input(SAMPLE_LINES)[..], Path::new("mem"), &config, &router, &counters)?;

    assert_eq!(counters.ok(), 5);
    assert!(stores.values().all(|s| s.set_calls() == 0));
    Ok(())
}

#[test]
fn test_empty_input() -> anyhow::Result<()> {
    let config = config();
    let (router, _stores) = memory_router(&config);
    let counters = FileCounters::new();

    let summary = pipeline::run(&b""[..], Path::new("mem"), &config, &router, &counters)?;
    assert_eq!(summary.lines, 0);
    assert_eq!(summary.frames, 0);

    let outcome = counters.outcome("mem".into(), config.error_threshold);
    assert_eq!(outcome.processed(), 0);
    assert_eq!(outcome.error_rate, 1.0);
    assert!(!outcome.accepted);
    Ok(())
}
