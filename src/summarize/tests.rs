//! End-to-end scenarios over the whole pipeline, driven by a scripted fake summarizer

use super::*;
use crate::ai::{Persona, Summarizer, SummaryOutput};
use crate::config::PipelineConfig;
use crate::error::{ErrorKind, PipelineError, SummarizerError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Section calls are keyed by their first line; the synthesis call is the one
/// whose input starts with a `## ` header.
#[derive(Default)]
struct ScriptedSummarizer {
    /// First line -> failures left before the call succeeds
    failures: Mutex<HashMap<String, usize>>,
    fail_final: bool,
    delay: Duration,
    section_calls: AtomicUsize,
    final_inputs: Mutex<Vec<(String, f64)>>,
}

impl ScriptedSummarizer {
    fn failing(mut self, first_line: &str, times: usize) -> Self {
        self.failures
            .get_mut()
            .unwrap()
            .insert(first_line.to_string(), times);
        self
    }

    fn section_calls(&self) -> usize {
        self.section_calls.load(Ordering::SeqCst)
    }

    fn final_inputs(&self) -> Vec<(String, f64)> {
        self.final_inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(
        &self,
        text: &str,
        _persona: Persona,
        length_multiplier: f64,
    ) -> Result<SummaryOutput, SummarizerError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if text.starts_with("## ") {
            self.final_inputs
                .lock()
                .unwrap()
                .push((text.to_string(), length_multiplier));
            if self.fail_final {
                return Err(SummarizerError::Api {
                    status: 503,
                    body: "overloaded".to_string(),
                });
            }
            return Ok(SummaryOutput {
                summary: "Overall summary.".to_string(),
                bullet_points: Vec::new(),
            });
        }

        self.section_calls.fetch_add(1, Ordering::SeqCst);
        let first_line = text.lines().next().unwrap_or_default().trim().to_string();
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&first_line) {
                if *left > 0 {
                    *left -= 1;
                    return Err(SummarizerError::Request("connection reset".to_string()));
                }
            }
        }

        Ok(SummaryOutput {
            summary: format!("Summary of {}", first_line),
            bullet_points: vec![format!("Key point of {}", first_line)],
        })
    }
}

fn instant_sleeper() -> Sleeper {
    Arc::new(|_: Duration| -> BoxFuture<'static, ()> { Box::pin(async {}) })
}

fn pipeline(fake: Arc<ScriptedSummarizer>) -> DocumentSummarizer {
    DocumentSummarizer::new(fake, PipelineConfig::default()).with_sleeper(instant_sleeper())
}

/// Lowercase prose paragraphs, no heading-like lines
fn prose(paragraphs: usize, words_per_paragraph: usize) -> String {
    (0..paragraphs)
        .map(|p| {
            (0..words_per_paragraph)
                .map(|w| format!("word{}x{}", p, w))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `parts` markdown parts of ~9k bytes each
fn chaptered(parts: usize) -> String {
    (1..=parts)
        .map(|n| format!("# Part {}\n\n{}", n, prose(10, 100)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collect_events() -> (Arc<Mutex<Vec<ProcessingEvent>>>, impl Fn(ProcessingEvent) + Send + Sync) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |event: ProcessingEvent| sink.lock().unwrap().push(event))
}

fn assert_event_order(events: &[ProcessingEvent]) {
    assert!(matches!(events.first(), Some(ProcessingEvent::Starting { .. })));
    assert!(events.last().is_some_and(|e| e.is_terminal()));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProcessingEvent::Starting { .. }))
            .count(),
        1
    );

    let fractions: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ProcessingEvent::Progress { fraction, .. } => Some(*fraction),
            _ => None,
        })
        .collect();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{:?}", fractions);
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
}

#[tokio::test]
async fn test_short_document_single_call() {
    let text = prose(5, 100);
    assert!(text.len() < 10_000);

    let options = select_options(text.len());
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].strategy, ProcessingStrategy::Single);
    assert!(options[0].is_recommended);
    assert_eq!(options[0].estimated_calls, 1);

    let fake = Arc::new(ScriptedSummarizer::default());
    let result = pipeline(fake.clone())
        .summarize(SummaryRequest::new(text), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(result.strategy, ProcessingStrategy::Single);
    assert_eq!(result.section_count, 1);
    assert_eq!(result.total_external_calls, 1);
    assert_eq!(result.overall_summary, result.section_summaries[0].summary);
    assert_eq!(fake.section_calls(), 1);
    assert!(fake.final_inputs().is_empty());
}

#[tokio::test]
async fn test_dual_document_two_sections_three_calls() {
    let text = prose(57, 100);
    assert!(text.len() > 50_000 && text.len() < 60_000, "len {}", text.len());
    assert_eq!(estimated_calls(ProcessingStrategy::Dual, text.len()), 3);

    let fake = Arc::new(ScriptedSummarizer::default());
    let result = pipeline(fake.clone())
        .summarize(
            SummaryRequest::new(text).with_strategy(ProcessingStrategy::Dual),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.section_count, 2);
    assert_eq!(result.total_external_calls, 3);
    assert_eq!(fake.section_calls() + fake.final_inputs().len(), 3);

    let second = &result.section_summaries[1].section;
    assert!(second.overlap > 0 && second.overlap <= sectioner::SECTION_OVERLAP);
    assert!(result.section_summaries[0].section.len() <= 50_000);
    // DUAL synthesis headers carry each section's share of the document
    assert!(fake.final_inputs()[0].0.contains("% of document)"));
}

#[tokio::test]
async fn test_transient_failures_recover_with_retry_counts() {
    let fake = Arc::new(
        ScriptedSummarizer::default()
            .failing("# Part 2", 2)
            .failing("# Part 4", 2),
    );
    let result = pipeline(fake.clone())
        .summarize(
            SummaryRequest::new(chaptered(5)).with_strategy(ProcessingStrategy::Multi),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.section_count, 5);
    assert_eq!(result.quality, ResultQuality::Complete);
    let retries: Vec<u32> = result.section_summaries.iter().map(|s| s.retry_count).collect();
    assert_eq!(retries, vec![0, 2, 0, 2, 0]);
    assert!(result
        .section_summaries
        .iter()
        .all(|s| s.status == SectionStatus::Completed));
    assert_eq!(result.section_summaries[1].summary, "Summary of # Part 2");
    assert_eq!(fake.section_calls(), 9);
    assert_eq!(result.total_external_calls, 6);
}

#[tokio::test]
async fn test_all_sections_failed_degrades_instead_of_erroring() {
    let mut fake = ScriptedSummarizer::default();
    for n in 1..=5 {
        fake = fake.failing(&format!("# Part {}", n), usize::MAX);
    }
    let fake = Arc::new(fake);
    let (events, sink) = collect_events();

    let result = pipeline(fake.clone())
        .run(
            SummaryRequest::new(chaptered(5)).with_strategy(ProcessingStrategy::Multi),
            &CancelFlag::new(),
            sink,
        )
        .await
        .unwrap();

    assert_eq!(result.quality, ResultQuality::AllSectionsFailed);
    assert!(result.is_degraded());
    assert!(result.section_summaries.iter().all(|s| s.is_failed()));
    assert!(result.section_summaries.iter().all(|s| s.error.is_some()));
    // Three attempts each: first try plus two retries
    assert_eq!(fake.section_calls(), 15);

    let synthesis = &fake.final_inputs()[0].0;
    assert!(synthesis.contains("word9x99"));

    let events = events.lock().unwrap();
    assert_event_order(&events);
    assert!(matches!(events.last(), Some(ProcessingEvent::Success { .. })));
}

#[tokio::test]
async fn test_event_stream_shape() {
    let fake = Arc::new(ScriptedSummarizer::default());
    let (events, sink) = collect_events();

    pipeline(fake)
        .run(
            SummaryRequest::new(chaptered(3)).with_strategy(ProcessingStrategy::Multi),
            &CancelFlag::new(),
            sink,
        )
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_event_order(&events);
    // split + one per section + combining
    let progress = events
        .iter()
        .filter(|e| matches!(e, ProcessingEvent::Progress { .. }))
        .count();
    assert_eq!(progress, 5);

    match events.last() {
        Some(ProcessingEvent::Success {
            summary,
            total_external_calls,
            sections_processed,
        }) => {
            assert_eq!(*sections_processed, 3);
            assert_eq!(*total_external_calls, 4);
            assert_eq!(summary.overall_summary, "Overall summary.");
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_final_call_failure_reports_aggregation_error() {
    let fake = Arc::new(ScriptedSummarizer {
        fail_final: true,
        ..Default::default()
    });
    let (events, sink) = collect_events();

    let err = pipeline(fake)
        .run(
            SummaryRequest::new(chaptered(3)).with_strategy(ProcessingStrategy::Multi),
            &CancelFlag::new(),
            sink,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Aggregation);
    let events = events.lock().unwrap();
    assert_event_order(&events);
    assert!(matches!(
        events.last(),
        Some(ProcessingEvent::Error {
            kind: ErrorKind::Aggregation,
            ..
        })
    ));
}

#[tokio::test]
async fn test_spawned_run_streams_events_over_channel() {
    let fake = Arc::new(ScriptedSummarizer::default());
    let summarizer = Arc::new(pipeline(fake));

    let (mut rx, handle) = summarizer.spawn(
        SummaryRequest::new(chaptered(4)).with_strategy(ProcessingStrategy::Multi),
        CancelFlag::new(),
    );

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_event_order(&events);
    assert!(matches!(events.last(), Some(ProcessingEvent::Success { .. })));

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.section_count, 4);
}

#[tokio::test]
async fn test_cancelled_run_ends_with_cancelled_event() {
    let fake = Arc::new(ScriptedSummarizer {
        delay: Duration::from_secs(30),
        ..Default::default()
    });
    let summarizer = Arc::new(pipeline(fake.clone()));
    let cancel = CancelFlag::new();

    let (mut rx, handle) = summarizer.spawn(
        SummaryRequest::new(chaptered(5)).with_strategy(ProcessingStrategy::Multi),
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("cancelled run should finish promptly")
        .unwrap();
    assert_eq!(result.unwrap_err(), PipelineError::Cancelled);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_event_order(&events);
    assert!(matches!(
        events.last(),
        Some(ProcessingEvent::Error {
            kind: ErrorKind::Cancelled,
            ..
        })
    ));
    assert_eq!(fake.section_calls(), 0);
}

#[tokio::test]
async fn test_cjk_document_sized_by_characters() {
    // 20k characters, 60k bytes, in 1k-character paragraphs
    let text = vec!["東京大学の研究".repeat(143); 20].join("\n\n");
    let chars = text.chars().count();
    assert!(chars > 20_000 && chars < 20_100, "{} chars", chars);

    let fake = Arc::new(ScriptedSummarizer::default());
    let result = pipeline(fake.clone())
        .summarize(SummaryRequest::new(text), &CancelFlag::new())
        .await
        .unwrap();

    // 20k characters is below the DUAL threshold, so it stays one call
    assert_eq!(result.strategy, ProcessingStrategy::Single);
    assert_eq!(result.section_count, 1);
    assert_eq!(result.total_characters, chars);
    assert_eq!(result.total_external_calls, 1);
    assert_eq!(fake.section_calls(), 1);

    let text = vec!["東京大学の研究".repeat(143); 20].join("\n\n");
    let result = pipeline(Arc::new(ScriptedSummarizer::default()))
        .summarize(
            SummaryRequest::new(text).with_strategy(ProcessingStrategy::Multi),
            &CancelFlag::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.section_count, 3);
    assert_eq!(result.total_external_calls, 4);
    for summary in &result.section_summaries {
        assert!(summary.section.unique_content().chars().count() <= 10_000);
    }
}

#[tokio::test]
async fn test_adaptive_budget_overrides_strategy_size() {
    let text = prose(30, 100);
    assert!(text.len() > 25_000 && text.len() < 30_000);

    let result = pipeline(Arc::new(ScriptedSummarizer::default()))
        .summarize(
            SummaryRequest::new(text)
                .with_strategy(ProcessingStrategy::Multi)
                .with_section_budget(SectionBudget::Adaptive),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    // under 50k characters the adaptive size is 8k
    assert_eq!(result.section_count, 4);
    for summary in &result.section_summaries {
        assert!(summary.section.unique_content().len() <= 8_000);
    }
}

#[test]
fn test_sections_reconstruct_document() {
    let documents = [
        prose(80, 60),
        chaptered(6),
        format!("Opening remarks.\n\n{}", chaptered(3)),
        "Größe café naïve 東京 ".repeat(3_000),
    ];
    let budgets = [
        SectionBudget::Adaptive,
        SectionBudget::MaxSize(4_000),
        ProcessingStrategy::Multi.into(),
        ProcessingStrategy::Dual.into(),
    ];

    let sectioner = Sectioner::default();
    for text in &documents {
        for budget in budgets {
            let sections = sectioner.section(text, budget);
            let rebuilt: String = sections.iter().map(|s| s.unique_content()).collect();
            assert_eq!(&rebuilt, text, "budget {:?}", budget);
            for pair in sections.windows(2) {
                assert!(pair[1].overlap_chars() <= sectioner::SECTION_OVERLAP);
                assert_eq!(pair[1].start_index + pair[1].overlap, pair[0].end_index);
            }
        }
    }
}

#[test]
fn test_short_texts_are_single_and_recommend_single() {
    for len in [1, 500, 9_999, 29_999] {
        let text = "a".repeat(len);
        assert_eq!(recommended_strategy(len), ProcessingStrategy::Single);
        let sections = Sectioner::default().section(&text, recommended_strategy(len));
        assert_eq!(sections.len(), 1);
    }
}
