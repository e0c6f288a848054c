//! Parallel strategy orchestration
//!
//! Runs every registered processor as its own task over one shared window.
//! A processor that errors, panics, or misses the deadline contributes no
//! signals and is reported by name; the others are unaffected.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::DetectionConfig;
use crate::domain::{GameKey, Signal, StrategyCategory, TimeWindow};
use crate::error::{DetectionError, ProcessorError, ProcessorFailure};
use crate::repository::SignalRepository;
use crate::strategy::StrategyProcessor;

/// Outcome of one detection run
#[derive(Debug)]
pub struct Detection {
    pub run_id: Uuid,
    pub window: TimeWindow,
    /// Signals grouped by game; order within a group is not meaningful
    pub signals: HashMap<GameKey, Vec<Signal>>,
    /// Processors that finished, sorted by name
    pub completed: Vec<String>,
    /// Processors that contributed nothing, sorted by name
    pub failures: Vec<ProcessorFailure>,
    pub elapsed: Duration,
}

impl Detection {
    pub fn signal_count(&self) -> usize {
        self.signals.values().map(Vec::len).sum()
    }
}

type TaskOutput = (String, StrategyCategory, Result<Vec<Signal>, ProcessorError>);

enum Stop {
    Finished,
    Deadline,
    Cancelled,
}

pub struct Orchestrator {
    repository: Arc<SignalRepository>,
    processors: Vec<Arc<dyn StrategyProcessor>>,
    config: DetectionConfig,
}

impl Orchestrator {
    /// Build an orchestrator over an explicit processor list
    ///
    /// The list must be non-empty and processor names unique.
    pub fn new(
        repository: Arc<SignalRepository>,
        processors: Vec<Arc<dyn StrategyProcessor>>,
        config: DetectionConfig,
    ) -> Result<Self, DetectionError> {
        if processors.is_empty() {
            return Err(DetectionError::EmptyRegistry);
        }
        let mut names = HashSet::new();
        for processor in &processors {
            if !names.insert(processor.name().to_string()) {
                return Err(DetectionError::DuplicateProcessor(processor.name().to_string()));
            }
        }

        Ok(Self {
            repository,
            processors,
            config,
        })
    }

    pub fn repository(&self) -> &Arc<SignalRepository> {
        &self.repository
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run all processors using the configured deadline
    pub async fn detect(&self, window: &TimeWindow) -> Result<Detection, DetectionError> {
        let deadline = self
            .config
            .deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        self.detect_until(window, deadline, CancellationToken::new())
            .await
    }

    /// Run all processors until they finish, `deadline` passes, or `cancel` fires
    ///
    /// Processors still running at the deadline are abandoned and reported as
    /// timed out; results that already arrived are kept. If nothing completed
    /// before the deadline the run fails with `DeadlineExceeded`.
    pub async fn detect_until(
        &self,
        window: &TimeWindow,
        deadline: Option<Instant>,
        cancel: CancellationToken,
    ) -> Result<Detection, DetectionError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("detection", %run_id, %window);
        self.run(run_id, *window, deadline, cancel)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        run_id: Uuid,
        window: TimeWindow,
        deadline: Option<Instant>,
        cancel: CancellationToken,
    ) -> Result<Detection, DetectionError> {
        let started = Instant::now();
        info!(processors = self.processors.len(), "starting detection");

        if self.config.prefetch {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep_until(deadline) => warn!("prefetch did not finish before the deadline"),
                _ = self.prefetch(&window) => {}
            }
        }

        // Child token: cancelling it reaches every task without touching the caller's token
        let tasks_token = cancel.child_token();
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut pending: HashMap<String, StrategyCategory> = HashMap::new();

        for processor in &self.processors {
            pending.insert(processor.name().to_string(), processor.category());
            let repository = Arc::clone(&self.repository);
            let processor = Arc::clone(processor);
            let token = tasks_token.clone();
            tasks.spawn(
                async move {
                    let name = processor.name().to_string();
                    let category = processor.category();
                    let run =
                        AssertUnwindSafe(run_processor(&repository, processor.as_ref(), window))
                            .catch_unwind();
                    let result = tokio::select! {
                        _ = token.cancelled() => Err(ProcessorError::Cancelled),
                        outcome = run => outcome.unwrap_or_else(|panic| {
                            Err(ProcessorError::Panicked(panic_message(panic.as_ref())))
                        }),
                    };
                    (name, category, result)
                }
                .in_current_span(),
            );
        }

        let mut signals: HashMap<GameKey, Vec<Signal>> = HashMap::new();
        let mut completed = Vec::new();
        let mut failures = Vec::new();

        let stop = loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => break Stop::Cancelled,
                _ = sleep_until(deadline) => break Stop::Deadline,
                joined = tasks.join_next() => joined,
            };

            match joined {
                None => break Stop::Finished,
                Some(Ok((name, category, result))) => {
                    pending.remove(&name);
                    match result {
                        Ok(found) => {
                            debug!(
                                processor = %name,
                                %category,
                                signals = found.len(),
                                "processor finished"
                            );
                            for signal in found {
                                signals.entry(signal.game_key()).or_default().push(signal);
                            }
                            completed.push(name);
                        }
                        Err(err) => {
                            error!(processor = %name, %category, error = %err, "processor failed");
                            failures.push(ProcessorFailure {
                                processor: name,
                                category,
                                error: err,
                            });
                        }
                    }
                }
                // Unattributed join errors leave the processor pending and it is reported below
                Some(Err(join_error)) => {
                    error!(error = %join_error, "processor task did not complete");
                }
            }
        };

        if !matches!(stop, Stop::Finished) {
            tasks_token.cancel();
            tasks.abort_all();
        }
        for (name, category) in pending {
            let err = match stop {
                Stop::Cancelled => ProcessorError::Cancelled,
                Stop::Deadline => ProcessorError::TimedOut,
                Stop::Finished => ProcessorError::Panicked("task aborted".to_string()),
            };
            warn!(processor = %name, %category, error = %err, "abandoning processor");
            failures.push(ProcessorFailure {
                processor: name,
                category,
                error: err,
            });
        }

        completed.sort();
        failures.sort_by(|a, b| a.processor.cmp(&b.processor));
        let elapsed = started.elapsed();

        if matches!(stop, Stop::Deadline) && completed.is_empty() {
            error!(failed = failures.len(), "deadline exceeded before any processor completed");
            return Err(DetectionError::DeadlineExceeded {
                elapsed_ms: elapsed.as_millis() as u64,
                failures,
            });
        }

        let detection = Detection {
            run_id,
            window,
            signals,
            completed,
            failures,
            elapsed,
        };
        info!(
            games = detection.signals.len(),
            signals = detection.signal_count(),
            completed = detection.completed.len(),
            failed = detection.failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "detection finished"
        );
        Ok(detection)
    }

    /// Warm the cache with one batched fetch. Failures are left to the
    /// per-processor fetches, which report them under each processor's name.
    async fn prefetch(&self, window: &TimeWindow) {
        let categories: BTreeSet<StrategyCategory> =
            self.processors.iter().map(|p| p.category()).collect();
        if let Err(err) = self.repository.fetch_batch(&categories, window).await {
            warn!(error = %err, "prefetch failed");
        }
    }
}

async fn run_processor(
    repository: &SignalRepository,
    processor: &dyn StrategyProcessor,
    window: TimeWindow,
) -> Result<Vec<Signal>, ProcessorError> {
    let records = repository.fetch(processor.category(), &window).await?;
    processor.process(&window, &records)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use crate::domain::{BetSide, MarketSplitRecord, MarketType, SourceTable};
    use crate::repository::InMemoryMarketStore;
    use crate::strategy::testing::{game_time, split, window};
    use crate::strategy::SharpActionProcessor;

    struct Emitting(&'static str);

    impl StrategyProcessor for Emitting {
        fn name(&self) -> &str {
            self.0
        }

        fn category(&self) -> StrategyCategory {
            StrategyCategory::Consensus
        }

        fn process(
            &self,
            _window: &TimeWindow,
            records: &[MarketSplitRecord],
        ) -> Result<Vec<Signal>, ProcessorError> {
            Ok(records
                .iter()
                .map(|r| Signal::from_record(r, self.0, 12.0, BetSide::Home))
                .collect())
        }
    }

    struct Panicking;

    impl StrategyProcessor for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn category(&self) -> StrategyCategory {
            StrategyCategory::SharpAction
        }

        fn process(
            &self,
            _window: &TimeWindow,
            _records: &[MarketSplitRecord],
        ) -> Result<Vec<Signal>, ProcessorError> {
            panic!("processor bug")
        }
    }

    struct Blocking(StdDuration);

    impl StrategyProcessor for Blocking {
        fn name(&self) -> &str {
            "blocking"
        }

        fn category(&self) -> StrategyCategory {
            StrategyCategory::SteamMove
        }

        fn process(
            &self,
            _window: &TimeWindow,
            _records: &[MarketSplitRecord],
        ) -> Result<Vec<Signal>, ProcessorError> {
            std::thread::sleep(self.0);
            Ok(Vec::new())
        }
    }

    fn records() -> Vec<MarketSplitRecord> {
        vec![
            split(MarketType::Spread, 40.0, 62.0).build(),
            split(MarketType::Spread, 44.0, 60.0).game("g2").build(),
        ]
    }

    fn repository(store: InMemoryMarketStore) -> Arc<SignalRepository> {
        Arc::new(SignalRepository::with_clock(
            Arc::new(store),
            Arc::new(game_time),
        ))
    }

    fn no_deadline() -> DetectionConfig {
        DetectionConfig {
            deadline_ms: None,
            prefetch: true,
        }
    }

    #[test]
    fn test_registry_must_be_non_empty_and_unique() {
        let repo = repository(InMemoryMarketStore::new(Vec::new()));

        assert!(matches!(
            Orchestrator::new(repo.clone(), Vec::new(), no_deadline()),
            Err(DetectionError::EmptyRegistry)
        ));

        let processors: Vec<Arc<dyn StrategyProcessor>> =
            vec![Arc::new(Emitting("dup")), Arc::new(Emitting("dup"))];
        assert!(matches!(
            Orchestrator::new(repo, processors, no_deadline()),
            Err(DetectionError::DuplicateProcessor(name)) if name == "dup"
        ));
    }

    #[tokio::test]
    async fn test_panicking_processor_is_isolated() {
        let repo = repository(InMemoryMarketStore::new(records()));
        let processors: Vec<Arc<dyn StrategyProcessor>> = vec![
            Arc::new(SharpActionProcessor::new(Default::default())),
            Arc::new(Panicking),
            Arc::new(Emitting("echo")),
        ];
        let orchestrator = Orchestrator::new(repo, processors, no_deadline()).unwrap();

        let detection = orchestrator.detect(&window()).await.unwrap();

        assert_eq!(detection.completed, vec!["echo", "sharp_action"]);
        assert_eq!(detection.failures.len(), 1);
        assert_eq!(detection.failures[0].processor, "panicking");
        assert!(matches!(
            &detection.failures[0].error,
            ProcessorError::Panicked(msg) if msg.contains("processor bug")
        ));
        assert_eq!(detection.signals.len(), 2);
        assert_eq!(detection.signal_count(), 4);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_per_processor() {
        let store = InMemoryMarketStore::new(records());
        store.fail_table(SourceTable::SplitHistory);
        let repo = repository(store);
        let processors: Vec<Arc<dyn StrategyProcessor>> = vec![
            Arc::new(Emitting("echo")),
            Arc::new(Blocking(StdDuration::from_millis(0))),
        ];
        let orchestrator = Orchestrator::new(repo, processors, no_deadline()).unwrap();

        let detection = orchestrator.detect(&window()).await.unwrap();

        assert_eq!(detection.completed, vec!["echo"]);
        assert_eq!(detection.failures.len(), 1);
        assert_eq!(detection.failures[0].category, StrategyCategory::SteamMove);
        assert!(matches!(
            detection.failures[0].error,
            ProcessorError::Repository(_)
        ));
    }

    #[tokio::test]
    async fn test_prefetch_shares_one_query_per_table() {
        let store = Arc::new(InMemoryMarketStore::new(records()));
        let repo = Arc::new(SignalRepository::with_clock(store.clone(), Arc::new(game_time)));
        let processors: Vec<Arc<dyn StrategyProcessor>> = vec![
            Arc::new(SharpActionProcessor::new(Default::default())),
            Arc::new(Emitting("echo")),
        ];
        let orchestrator = Orchestrator::new(repo.clone(), processors, no_deadline()).unwrap();

        orchestrator.detect(&window()).await.unwrap();

        assert_eq!(store.query_count(), 1);
        assert_eq!(repo.stats().hits, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_keeps_completed_results() {
        let repo = repository(InMemoryMarketStore::new(records()));
        let processors: Vec<Arc<dyn StrategyProcessor>> = vec![
            Arc::new(Emitting("echo")),
            Arc::new(Blocking(StdDuration::from_millis(400))),
        ];
        let orchestrator = Orchestrator::new(repo, processors, no_deadline()).unwrap();

        let deadline = Instant::now() + StdDuration::from_millis(100);
        let detection = orchestrator
            .detect_until(&window(), Some(deadline), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(detection.completed, vec!["echo"]);
        assert_eq!(detection.failures.len(), 1);
        assert!(matches!(detection.failures[0].error, ProcessorError::TimedOut));
        assert!(detection.elapsed < StdDuration::from_millis(400));
    }

    #[tokio::test]
    async fn test_deadline_with_nothing_completed_is_an_error() {
        let store = InMemoryMarketStore::new(records()).with_latency(StdDuration::from_secs(5));
        let processors: Vec<Arc<dyn StrategyProcessor>> = vec![Arc::new(Emitting("echo"))];
        let config = DetectionConfig {
            deadline_ms: Some(50),
            prefetch: true,
        };
        let orchestrator = Orchestrator::new(repository(store), processors, config).unwrap();

        match orchestrator.detect(&window()).await {
            Err(DetectionError::DeadlineExceeded { failures, .. }) => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(failures[0].error, ProcessorError::TimedOut));
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_abandons_running_processors() {
        let store = InMemoryMarketStore::new(records()).with_latency(StdDuration::from_secs(5));
        let processors: Vec<Arc<dyn StrategyProcessor>> = vec![Arc::new(Emitting("echo"))];
        let orchestrator =
            Orchestrator::new(repository(store), processors, no_deadline()).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            trigger.cancel();
        });

        let detection = orchestrator
            .detect_until(&window(), None, cancel)
            .await
            .unwrap();
        assert!(detection.completed.is_empty());
        assert!(matches!(detection.failures[0].error, ProcessorError::Cancelled));
    }
}
