//! Command-line parsing and configuration validation.

use clap::Parser;
use memcload::config::{CliArgs, LoaderConfig, PipelineConfig, ShardEndpoints};
use memcload::error::ConfigError;
use memcload::record::DeviceType;
use memcload::router::ShardRouter;
use std::time::Duration;

fn parse(args: &[&str]) -> anyhow::Result<LoaderConfig> {
    let args = CliArgs::try_parse_from(std::iter::once("memcload").chain(args.iter().copied()))?;
    Ok(LoaderConfig::from_args(args)?)
}

#[test]
fn test_defaults() -> anyhow::Result<()> {
    let config = parse(&[])?;
    assert_eq!(config.pattern, "/data/appsinstalled/*.tsv.gz");
    assert_eq!(config.endpoints.get(DeviceType::Idfa), Some("127.0.0.1:33013"));
    assert_eq!(config.endpoints.get(DeviceType::Gaid), Some("127.0.0.1:33014"));
    assert_eq!(config.endpoints.get(DeviceType::Adid), Some("127.0.0.1:33015"));
    assert_eq!(config.endpoints.get(DeviceType::Dvid), Some("127.0.0.1:33016"));
    assert_eq!(config.workers, num_cpus::get());
    assert_eq!(config.socket_timeout, Duration::from_secs(3));
    assert_eq!(config.pipeline, PipelineConfig::default());
    assert!(config.pipeline.mark_processed);
    assert!(!config.fail_on_rejected);
    assert_eq!(config.report, None);
    Ok(())
}

#[test]
fn test_overrides() -> anyhow::Result<()> {
    let config = parse(&[
        "--pattern",
        "/tmp/in/*.tsv.gz",
        "--idfa",
        "10.0.0.1:11211",
        "--workers",
        "2",
        "--frame-size",
        "64",
        "--queue-capacity",
        "2",
        "--uploaders",
        "4",
        "--retry-count",
        "5",
        "--retry-delay-ms",
        "10",
        "--error-threshold",
        "0.5",
        "--no-mark",
        "--report",
        "/tmp/report.json",
        "--fail-on-rejected",
    ])?;
    assert_eq!(config.pattern, "/tmp/in/*.tsv.gz");
    assert_eq!(config.endpoints.get(DeviceType::Idfa), Some("10.0.0.1:11211"));
    assert_eq!(config.workers, 2);
    assert_eq!(config.pipeline.frame_size, 64);
    assert_eq!(config.pipeline.queue_capacity, 2);
    assert_eq!(config.pipeline.uploader_count, 4);
    assert_eq!(config.pipeline.retry_count, 5);
    assert_eq!(config.pipeline.retry_delay, Duration::from_millis(10));
    assert_eq!(config.pipeline.error_threshold, 0.5);
    assert!(!config.pipeline.mark_processed);
    assert!(config.fail_on_rejected);
    Ok(())
}

#[test]
fn test_dry_run_disables_marking() -> anyhow::Result<()> {
    let config = parse(&["--dry"])?;
    assert!(config.pipeline.dry_run);
    assert!(!config.pipeline.mark_processed);
    Ok(())
}

#[test]
fn test_invalid_values() {
    let cases: &[(&[&str], ConfigError)] = &[
        (&["--frame-size", "0"][..], ConfigError::InvalidFrameSize(0)),
        (&["--queue-capacity", "0"][..], ConfigError::InvalidQueueCapacity(0)),
        (&["--retry-count", "0"][..], ConfigError::InvalidRetryCount(0)),
        (&["--error-threshold", "0"][..], ConfigError::InvalidThreshold(0.0)),
        (&["--error-threshold", "1.5"][..], ConfigError::InvalidThreshold(1.5)),
        (
            &["--uploaders", "0"][..],
            ConfigError::InvalidUploaderCount { count: 0, max: 256 },
        ),
        (
            &["--workers", "0"][..],
            ConfigError::InvalidWorkerCount { count: 0, max: 256 },
        ),
        (
            &["--dvid", "no-port"][..],
            ConfigError::InvalidEndpoint {
                device_type: DeviceType::Dvid,
                addr: "no-port".to_string(),
            },
        ),
    ];

    for (args, expected) in cases {
        let args = CliArgs::try_parse_from(std::iter::once("memcload").chain(args.iter().copied()))
            .expect("arguments parse");
        assert_eq!(LoaderConfig::from_args(args).unwrap_err(), *expected);
    }
}

#[test]
fn test_threshold_of_one_is_allowed() -> anyhow::Result<()> {
    let config = parse(&["--error-threshold", "1"])?;
    assert_eq!(config.pipeline.error_threshold, 1.0);
    Ok(())
}

#[test]
fn test_router_shares_store_per_address() {
    let endpoints = ShardEndpoints::new()
        .with(DeviceType::Idfa, "127.0.0.1:11211")
        .with(DeviceType::Gaid, "127.0.0.1:11211")
        .with(DeviceType::Adid, "127.0.0.1:11212");
    let router = ShardRouter::memcached(&endpoints, &PipelineConfig::default(), Duration::from_secs(1));

    assert_eq!(router.len(), 3);
    let idfa = router.route(DeviceType::Idfa).unwrap();
    let gaid = router.route(DeviceType::Gaid).unwrap();
    let adid = router.route(DeviceType::Adid).unwrap();
    assert!(std::sync::Arc::ptr_eq(idfa.store(), gaid.store()));
    assert!(!std::sync::Arc::ptr_eq(idfa.store(), adid.store()));
    assert_eq!(router.endpoint(DeviceType::Adid).unwrap(), "127.0.0.1:11212");
    assert_eq!(
        router.route(DeviceType::Dvid).err(),
        Some(ConfigError::MissingShard(DeviceType::Dvid))
    );
}
