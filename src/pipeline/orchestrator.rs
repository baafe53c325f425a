//! Pipeline orchestrator.
//!
//! Per run: drain and replay the failure log, fan out non-checkpointed
//! sections and snippets concurrently, collect validated pairs in completion
//! order, and append everything to the checkpoint store. Concurrency across
//! tasks is unbounded here; the rate-limited caller's semaphore is what caps
//! in-flight backend calls.

use crate::checkpoint::{CheckpointStore, FailureLog};
use crate::client::RateLimitedCaller;
use crate::models::{
    Config, ExtractConfig, FailedPrompt, PromptKind, QaPair, Result, RunStats, Snippet,
};
use crate::pipeline::ProgressSink;
use crate::prompt;
use crate::segment::{estimate_question_count, extract_sections, extract_snippets};
use crate::validate::{DenylistValidator, Validate};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Validated pairs in completion order (replayed pairs first)
    pub pairs: Vec<QaPair>,
    pub stats: RunStats,
}

/// Outcome of one fan-out task.
struct TaskOutcome {
    pairs: Vec<QaPair>,
    failed_prompts: Vec<FailedPrompt>,
    failed_rounds: usize,
}

pub struct Pipeline {
    caller: Arc<RateLimitedCaller>,
    question_validator: Arc<dyn Validate>,
    answer_validator: Arc<dyn Validate>,
    store: CheckpointStore,
    failures: FailureLog,
    extract: ExtractConfig,
}

impl Pipeline {
    pub fn new(config: &Config, caller: Arc<RateLimitedCaller>) -> Self {
        Self::with_validators(
            config,
            caller,
            Arc::new(DenylistValidator::for_questions()),
            Arc::new(DenylistValidator::for_answers()),
        )
    }

    /// Construct with substitute validators.
    pub fn with_validators(
        config: &Config,
        caller: Arc<RateLimitedCaller>,
        question_validator: Arc<dyn Validate>,
        answer_validator: Arc<dyn Validate>,
    ) -> Self {
        Self {
            caller,
            question_validator,
            answer_validator,
            store: CheckpointStore::new(&config.output.checkpoint_path),
            failures: FailureLog::new(&config.output.failed_log_path),
            extract: config.extract.clone(),
        }
    }

    /// Run the full extraction pipeline over one document.
    pub async fn run(&self, content: &str, progress: &dyn ProgressSink) -> Result<PipelineReport> {
        let start = Instant::now();
        let mut stats = RunStats {
            started_at: Utc::now(),
            ..Default::default()
        };

        let skip = self.store.load_skip_sets()?;

        let mut pairs = self.replay_failures(&mut stats).await?;

        let sections: Vec<(String, String)> = extract_sections(content)
            .into_iter()
            .filter(|(title, _)| {
                let done = skip.contains_title(title);
                if done {
                    debug!(title = %title, "Section already checkpointed, skipping");
                    stats.skipped += 1;
                }
                !done
            })
            .collect();

        let snippets: Vec<Snippet> = extract_snippets(content, &self.extract)
            .into_iter()
            .filter(|s| {
                let done = skip.contains_snippet(&s.context, &s.code);
                if done {
                    debug!(start_line = s.start_line, "Snippet already checkpointed, skipping");
                    stats.skipped += 1;
                }
                !done
            })
            .collect();

        stats.sections = sections.len();
        stats.snippets = snippets.len();

        info!(
            sections = stats.sections,
            snippets = stats.snippets,
            skipped = stats.skipped,
            replayed = stats.replayed,
            "Starting extraction"
        );

        let total_tasks = sections.len() + snippets.len();
        let mut completed = 0usize;
        let mut failed_prompts = Vec::new();

        // Sections first, then snippets, each phase gathered in completion
        // order rather than submission order.
        let mut section_tasks: FuturesUnordered<_> = sections
            .iter()
            .map(|(title, body)| {
                let rounds = estimate_question_count(body);
                self.process_section(title, body, rounds)
            })
            .collect();

        while let Some(outcome) = section_tasks.next().await {
            completed += 1;
            self.collect_outcome(outcome, &mut pairs, &mut failed_prompts, &mut stats);
            progress.report(percent(completed, total_tasks));
        }
        drop(section_tasks);

        let mut snippet_tasks: FuturesUnordered<_> = snippets
            .iter()
            .map(|snippet| self.process_snippet(snippet))
            .collect();

        while let Some(outcome) = snippet_tasks.next().await {
            completed += 1;
            self.collect_outcome(outcome, &mut pairs, &mut failed_prompts, &mut stats);
            progress.report(percent(completed, total_tasks));
        }
        drop(snippet_tasks);

        // Single-writer persistence happens only after both phases gathered.
        self.failures.append(&failed_prompts)?;
        self.store.append(&pairs)?;

        if total_tasks == 0 {
            progress.report(100.0);
        }

        stats.pairs_emitted = pairs.len();
        stats.runtime_secs = start.elapsed().as_secs_f64();

        info!(
            pairs = stats.pairs_emitted,
            failed_rounds = stats.rounds_failed,
            runtime_secs = format!("{:.1}", stats.runtime_secs),
            "Extraction complete"
        );

        Ok(PipelineReport { pairs, stats })
    }

    fn collect_outcome(
        &self,
        outcome: TaskOutcome,
        pairs: &mut Vec<QaPair>,
        failed_prompts: &mut Vec<FailedPrompt>,
        stats: &mut RunStats,
    ) {
        pairs.extend(outcome.pairs);
        failed_prompts.extend(outcome.failed_prompts);
        stats.rounds_failed += outcome.failed_rounds;
    }

    /// One-shot replay of the drained failure log.
    ///
    /// Each record gets exactly one regeneration attempt; records that fail
    /// again go straight back into the log.
    async fn replay_failures(&self, stats: &mut RunStats) -> Result<Vec<QaPair>> {
        let drained = self.failures.drain()?;
        if drained.is_empty() {
            return Ok(Vec::new());
        }

        let mut recovered = Vec::new();
        let mut refailed = Vec::new();

        for record in drained {
            // The original section/snippet text is gone; the answer prompt is
            // rebuilt from the identifier and recorded question alone.
            let answer_prompt = match record.kind {
                PromptKind::Section => {
                    prompt::section_answer(&record.identifier, "", &record.question)
                }
                PromptKind::Snippet => {
                    prompt::snippet_answer("", &record.identifier, &record.question)
                }
            };

            match self.call_round(&answer_prompt).await {
                Some(answer) if self.answer_validator.is_valid(&answer) => {
                    recovered.push(match record.kind {
                        PromptKind::Section => QaPair::for_section(
                            record.identifier.clone(),
                            record.question.clone(),
                            answer,
                        ),
                        PromptKind::Snippet => QaPair {
                            section_title: None,
                            question: record.question.clone(),
                            answer,
                            context: None,
                            code_snippet: Some(record.identifier.clone()),
                        },
                    });
                }
                _ => {
                    debug!(identifier = %record.identifier, "Replay failed, re-logging");
                    refailed.push(record);
                }
            }
        }

        stats.replayed = recovered.len();
        self.failures.append(&refailed)?;
        Ok(recovered)
    }

    /// Run `rounds` sequential question→answer rounds for one section.
    async fn process_section(&self, title: &str, text: &str, rounds: usize) -> TaskOutcome {
        let mut outcome = TaskOutcome {
            pairs: Vec::new(),
            failed_prompts: Vec::new(),
            failed_rounds: 0,
        };

        for _ in 0..rounds {
            let question = match self.call_round(&prompt::section_question(title, text)).await {
                Some(q) if self.question_validator.is_valid(&q) => q,
                _ => {
                    // Nothing replayable without a valid question.
                    debug!(title = %title, "Question round failed");
                    outcome.failed_rounds += 1;
                    continue;
                }
            };

            match self
                .call_round(&prompt::section_answer(title, text, &question))
                .await
            {
                Some(answer) if self.answer_validator.is_valid(&answer) => {
                    outcome
                        .pairs
                        .push(QaPair::for_section(title, question, answer));
                }
                _ => {
                    outcome.failed_rounds += 1;
                    outcome.failed_prompts.push(FailedPrompt {
                        kind: PromptKind::Section,
                        identifier: title.to_string(),
                        question,
                    });
                }
            }
        }

        outcome
    }

    /// Run one question→answer round for a snippet.
    async fn process_snippet(&self, snippet: &Snippet) -> TaskOutcome {
        let mut outcome = TaskOutcome {
            pairs: Vec::new(),
            failed_prompts: Vec::new(),
            failed_rounds: 0,
        };

        let question = match self
            .call_round(&prompt::snippet_question(&snippet.context, &snippet.code))
            .await
        {
            Some(q) if self.question_validator.is_valid(&q) => q,
            _ => {
                debug!(start_line = snippet.start_line, "Snippet question round failed");
                outcome.failed_rounds += 1;
                return outcome;
            }
        };

        match self
            .call_round(&prompt::snippet_answer(
                &snippet.context,
                &snippet.code,
                &question,
            ))
            .await
        {
            Some(answer) if self.answer_validator.is_valid(&answer) => {
                outcome.pairs.push(QaPair::for_snippet(
                    snippet.section_title.clone(),
                    snippet.context.clone(),
                    snippet.code.clone(),
                    question,
                    answer,
                ));
            }
            _ => {
                outcome.failed_rounds += 1;
                outcome.failed_prompts.push(FailedPrompt {
                    kind: PromptKind::Snippet,
                    identifier: snippet.code.clone(),
                    question,
                });
            }
        }

        outcome
    }

    /// Issue one prompt, absorbing per-round failures.
    ///
    /// Rate-limit exhaustion surfaces from the caller as an error; it aborts
    /// this round only, never the run.
    async fn call_round(&self, prompt_text: &str) -> Option<String> {
        match self.caller.call(prompt_text).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Round aborted");
                None
            }
        }
    }
}

fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        (completed as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatBackend;
    use crate::models::{LimitsConfig, OutputConfig};
    use crate::pipeline::NoopSink;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers prompts by shape: question prompts get a question, answer
    /// prompts get whatever `answer` holds.
    struct ScriptedBackend {
        answer: Mutex<String>,
    }

    impl ScriptedBackend {
        fn new(answer: &str) -> Self {
            Self {
                answer: Mutex::new(answer.to_string()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("Output only the question") || prompt.ends_with("Question:") {
                Ok("What does this do?".to_string())
            } else {
                Ok(self.answer.lock().unwrap().clone())
            }
        }
    }

    fn test_config(dir: &TempDir) -> Config {
        Config {
            output: OutputConfig {
                checkpoint_path: dir.path().join("qa.jsonl"),
                failed_log_path: dir.path().join("failed.jsonl"),
            },
            ..Default::default()
        }
    }

    fn pipeline_with(config: &Config, backend: Arc<dyn ChatBackend>) -> Pipeline {
        let caller = Arc::new(RateLimitedCaller::new(
            backend,
            &LimitsConfig {
                initial_backoff_secs: 0,
                ..Default::default()
            },
        ));
        Pipeline::new(config, caller)
    }

    const DOC: &str = "# Intro\nHello world, this is a test.\n\n# Usage\nRun it:\n```\ncargo run\n```\ndone\n";

    #[tokio::test]
    async fn emits_pairs_for_sections_and_snippets() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = pipeline_with(&config, Arc::new(ScriptedBackend::new("It runs the app.")));

        let report = pipeline.run(DOC, &NoopSink).await.unwrap();

        // Two short sections (one round each) plus one snippet.
        assert_eq!(report.pairs.len(), 3);
        assert_eq!(report.stats.sections, 2);
        assert_eq!(report.stats.snippets, 1);
        assert_eq!(report.stats.rounds_failed, 0);

        let snippet_pair = report
            .pairs
            .iter()
            .find(|p| p.code_snippet.is_some())
            .unwrap();
        assert_eq!(snippet_pair.code_snippet.as_deref(), Some("cargo run"));
        assert_eq!(snippet_pair.section_title.as_deref(), Some("Usage"));
    }

    #[tokio::test]
    async fn second_run_skips_checkpointed_work() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = pipeline_with(&config, Arc::new(ScriptedBackend::new("It runs the app.")));

        let first = pipeline.run(DOC, &NoopSink).await.unwrap();
        assert_eq!(first.pairs.len(), 3);

        let second = pipeline.run(DOC, &NoopSink).await.unwrap();
        assert!(second.pairs.is_empty());
        assert_eq!(second.stats.sections, 0);
        assert_eq!(second.stats.snippets, 0);
        assert_eq!(second.stats.skipped, 3);
    }

    #[tokio::test]
    async fn refusal_answer_yields_no_pair_and_logs_failure() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = pipeline_with(
            &config,
            Arc::new(ScriptedBackend::new("I couldn't find the answer in the text")),
        );

        let report = pipeline.run("# Intro\nHello world.\n", &NoopSink).await.unwrap();
        assert!(report.pairs.is_empty());
        assert_eq!(report.stats.rounds_failed, 1);

        // Answer-stage failure was logged with the validated question.
        let logged = FailureLog::new(&config.output.failed_log_path)
            .drain()
            .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].kind, PromptKind::Section);
        assert_eq!(logged[0].identifier, "Intro");
        assert_eq!(logged[0].question, "What does this do?");
    }

    #[tokio::test]
    async fn drained_failures_are_replayed_once() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        FailureLog::new(&config.output.failed_log_path)
            .append(&[FailedPrompt {
                kind: PromptKind::Section,
                identifier: "Install".to_string(),
                question: "How do I install it?".to_string(),
            }])
            .unwrap();

        let pipeline = pipeline_with(&config, Arc::new(ScriptedBackend::new("Use cargo install.")));
        let report = pipeline.run("", &NoopSink).await.unwrap();

        assert_eq!(report.stats.replayed, 1);
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.pairs[0].section_title.as_deref(), Some("Install"));
        assert_eq!(report.pairs[0].answer, "Use cargo install.");

        // Recovered, so the log stays empty.
        assert!(FailureLog::new(&config.output.failed_log_path)
            .drain()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn replay_failure_relogs_the_record() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        FailureLog::new(&config.output.failed_log_path)
            .append(&[FailedPrompt {
                kind: PromptKind::Snippet,
                identifier: "cargo run".to_string(),
                question: "What does it run?".to_string(),
            }])
            .unwrap();

        let pipeline = pipeline_with(
            &config,
            Arc::new(ScriptedBackend::new("Please provide the section.")),
        );
        let report = pipeline.run("", &NoopSink).await.unwrap();

        assert_eq!(report.stats.replayed, 0);
        assert!(report.pairs.is_empty());

        let relogged = FailureLog::new(&config.output.failed_log_path)
            .drain()
            .unwrap();
        assert_eq!(relogged.len(), 1);
        assert_eq!(relogged[0].identifier, "cargo run");
    }

    #[tokio::test]
    async fn progress_reaches_one_hundred() {
        struct CollectingSink(Mutex<Vec<f64>>);
        impl ProgressSink for CollectingSink {
            fn report(&self, percent: f64) {
                self.0.lock().unwrap().push(percent);
            }
        }

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = pipeline_with(&config, Arc::new(ScriptedBackend::new("It runs the app.")));

        let sink = CollectingSink(Mutex::new(Vec::new()));
        pipeline.run(DOC, &sink).await.unwrap();

        let reports = sink.0.into_inner().unwrap();
        assert_eq!(reports.len(), 3);
        assert!((reports.last().unwrap() - 100.0).abs() < f64::EPSILON);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    }
}
