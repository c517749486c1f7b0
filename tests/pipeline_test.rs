//! Pipeline tests with in-memory sources and sinks

mod common;

use cct::output::JsonLinesSink;
use cct::pipeline::{run_day, run_range, target_days};
use cct_core::error::CctError;
use cct_core::timezone::TimezoneConfig;
use cct_core::types::{Cloud, NormalizedCostRecord};
use cct_core::{DayAllocator, RecordFilter};
use common::*;

fn azure_items() -> Vec<Item> {
    vec![
        // Fully inside 2018-07-03
        Item::Record(RawRecordBuilder::new().amount(10.0).build()),
        // Two days, half on 2018-07-03
        Item::Record(
            RawRecordBuilder::new()
                .amount(20.0)
                .window(at(2018, 7, 2, 0), at(2018, 7, 4, 0))
                .identity(AZURE_DISK)
                .build(),
        ),
        // Previous day only
        Item::Record(
            RawRecordBuilder::new()
                .window(at(2018, 7, 2, 0), at(2018, 7, 3, 0))
                .build(),
        ),
        Item::Record(RawRecordBuilder::new().identity("/subscriptions/short").build()),
        Item::Unreadable("line 7: invalid cost 'n/a'".to_string()),
    ]
}

#[tokio::test]
async fn test_run_day_counts_everything() {
    let source = ScriptedSource::new(Cloud::Azure, azure_items());
    let allocator = DayAllocator::new(Cloud::Azure).with_filter(RecordFilter::skip_empty());
    let sink = RecordingSink::new();

    let summary = run_day(&source, &allocator, &sink, &utc_day(2018, 7, 3))
        .await
        .unwrap();

    assert_eq!(summary.written, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 2);
    assert!((summary.totals_by_currency["SEK"] - 20.0).abs() < 1e-9);

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let services: Vec<&str> = batches[0]
        .iter()
        .map(|r| r.labels()["service"].as_str())
        .collect();
    assert_eq!(
        services,
        vec!["Microsoft.Compute/virtualMachines", "Microsoft.Compute/disks"]
    );
    assert!(batches[0].iter().all(|r| r.date() == at(2018, 7, 3, 0)));
    assert!(batches[0].iter().all(|r| r.labels()["cloud"] == "azure"));
}

#[tokio::test]
async fn test_keep_empty_writes_out_of_range_records() {
    let source = ScriptedSource::new(Cloud::Azure, azure_items());
    let allocator = DayAllocator::new(Cloud::Azure);
    let sink = RecordingSink::new();

    let summary = run_day(&source, &allocator, &sink, &utc_day(2018, 7, 3))
        .await
        .unwrap();

    assert_eq!(summary.written, 3);
    assert_eq!(summary.skipped, 0);
    let batches = sink.batches();
    let zero: Vec<&NormalizedCostRecord> = batches[0]
        .iter()
        .filter(|r| r.cost() == 0.0)
        .collect();
    assert_eq!(zero.len(), 1);
}

#[tokio::test]
async fn test_source_error_fails_day_before_writing() {
    let source = ScriptedSource::new(Cloud::Azure, azure_items()).failing_on(date(2018, 7, 3));
    let allocator = DayAllocator::new(Cloud::Azure);
    let sink = RecordingSink::new();

    let result = run_day(&source, &allocator, &sink, &utc_day(2018, 7, 3)).await;

    assert!(matches!(result, Err(CctError::Api { status: 503, .. })));
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn test_sink_error_fails_day() {
    let source = ScriptedSource::new(Cloud::Azure, azure_items());
    let allocator = DayAllocator::new(Cloud::Azure);
    let sink = RecordingSink::failing();

    let result = run_day(&source, &allocator, &sink, &utc_day(2018, 7, 3)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_range_continues_after_failed_day() {
    let item = RawRecordBuilder::new()
        .amount(31.0)
        .currency("USD")
        .window(at(2018, 7, 1, 0), at(2018, 8, 1, 0))
        .identity("AmazonS3")
        .build();
    let source = ScriptedSource::new(Cloud::Aws, vec![Item::Record(item)]).failing_on(date(2018, 7, 2));
    let allocator = DayAllocator::new(Cloud::Aws).with_filter(RecordFilter::skip_empty());
    let sink = RecordingSink::new();

    let days = target_days(date(2018, 7, 1), date(2018, 7, 3), &TimezoneConfig::default());
    let outcome = run_range(&source, &allocator, &sink, &days).await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0.date(), date(2018, 7, 2));

    let completed: Vec<_> = outcome.completed.iter().map(|s| s.day.date()).collect();
    assert_eq!(completed, vec![date(2018, 7, 1), date(2018, 7, 3)]);
    for summary in &outcome.completed {
        assert!((summary.totals_by_currency["USD"] - 1.0).abs() < 1e-9);
    }

    let batches = sink.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0][0].labels()["service"], "AmazonS3");
    assert_eq!(batches[0][0].labels()["currency"], "USD");
}

#[tokio::test]
async fn test_dry_run_sink_prints_allocated_records() {
    let source = ScriptedSource::new(Cloud::Azure, azure_items());
    let allocator = DayAllocator::new(Cloud::Azure).with_filter(RecordFilter::skip_empty());
    let sink = JsonLinesSink::new(Vec::new());

    run_day(&source, &allocator, &sink, &utc_day(2018, 7, 3))
        .await
        .unwrap();

    let printed = String::from_utf8(sink.into_inner()).unwrap();
    let records: Vec<NormalizedCostRecord> = printed
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert!((records.iter().map(NormalizedCostRecord::cost).sum::<f64>() - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_days_in_local_timezone() {
    // 24h window starting at UTC midnight, seen from Stockholm (UTC+2 in July)
    let source = ScriptedSource::new(Cloud::Azure, vec![Item::Record(RawRecordBuilder::new().build())]);
    let allocator = DayAllocator::new(Cloud::Azure).with_filter(RecordFilter::skip_empty());
    let sink = RecordingSink::new();
    let tz = TimezoneConfig::from_cli(Some("Europe/Stockholm"), false).unwrap();

    let days = target_days(date(2018, 7, 3), date(2018, 7, 4), &tz);
    let outcome = run_range(&source, &allocator, &sink, &days).await;

    assert!(outcome.is_success());
    let costs: Vec<f64> = sink.batches().iter().map(|b| b[0].cost()).collect();
    assert!((costs[0] - 10.0 * 22.0 / 24.0).abs() < 1e-9);
    assert!((costs[1] - 10.0 * 2.0 / 24.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_local_days_see_every_overlapping_utc_date() {
    let records: Vec<_> = [2, 3, 4]
        .into_iter()
        .map(|d| {
            RawRecordBuilder::new()
                .window(at(2018, 7, d, 0), at(2018, 7, d + 1, 0))
                .build()
        })
        .collect();
    let source = DatedSource::new(Cloud::Azure, records);
    let allocator = DayAllocator::new(Cloud::Azure).with_filter(RecordFilter::skip_empty());
    let sink = RecordingSink::new();
    let tz = TimezoneConfig::from_cli(Some("Europe/Stockholm"), false).unwrap();

    let days = target_days(date(2018, 7, 2), date(2018, 7, 5), &tz);
    let outcome = run_range(&source, &allocator, &sink, &days).await;
    assert!(outcome.is_success());

    let per_day: Vec<f64> = outcome
        .completed
        .iter()
        .map(|summary| summary.totals_by_currency["SEK"])
        .collect();
    assert!((per_day[0] - 10.0 * 22.0 / 24.0).abs() < 1e-9);
    assert!((per_day[1] - 10.0).abs() < 1e-9);
    assert!((per_day[2] - 10.0).abs() < 1e-9);
    assert!((per_day[3] - 10.0 * 2.0 / 24.0).abs() < 1e-9);
    assert!((per_day.iter().sum::<f64>() - 30.0).abs() < 1e-9);
}
