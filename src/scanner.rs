use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use reqwest::Client;
use time::OffsetDateTime;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::generator::PathGenerator;
use crate::progress::{ProgressStore, ResumeState};
use crate::templates::TemplateSet;
use crate::types::{Label, ScanReport, ScanResult};

/// Lifecycle of a scan.
///
/// `Idle -> Generating -> Queued -> Running -> Draining -> Finished`, with a
/// detour through `Interrupted` when the scan is cancelled while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Generating,
    Queued,
    Running,
    Interrupted,
    Draining,
    Finished,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Generating => "generating",
            ScanPhase::Queued => "queued",
            ScanPhase::Running => "running",
            ScanPhase::Interrupted => "interrupted",
            ScanPhase::Draining => "draining",
            ScanPhase::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Live counters and findings, shareable with observers while a scan runs.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub tested: Arc<AtomicU64>,
    pub found: Arc<AtomicU64>,
    pub results: Arc<Mutex<Vec<ScanResult>>>,
    phase: Arc<std::sync::Mutex<ScanPhase>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            tested: Arc::new(AtomicU64::new(0)),
            found: Arc::new(AtomicU64::new(0)),
            results: Arc::new(Mutex::new(Vec::new())),
            phase: Arc::new(std::sync::Mutex::new(ScanPhase::Idle)),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_phase(&self, next: ScanPhase) {
        let mut guard = self.phase.lock().unwrap_or_else(|p| p.into_inner());
        let from = *guard;
        debug!(%from, to = %next, "scan phase");
        *guard = next;
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the shared HTTP client: redirects disabled, per-request timeout.
pub fn build_client(config: &ScanConfig) -> Result<Client> {
    Client::builder()
        .redirect(Policy::none())
        .timeout(config.timeout)
        .pool_max_idle_per_host(config.threads)
        .build()
        .context("failed to build HTTP client")
}

/// Resolve a candidate path beneath the base URL.
pub fn resolve_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    // "./" keeps words such as "a:b" from being read as a scheme.
    base.join(&format!("./{}", path.trim_start_matches('/')))
}

/// Drives one scan: generation, the worker pool, classification and
/// progress snapshots.
#[derive(Debug)]
pub struct Scanner {
    config: ScanConfig,
    base: Url,
    client: Client,
    templates: Arc<TemplateSet>,
    store: Option<Arc<ProgressStore>>,
    feed: Option<mpsc::UnboundedSender<ScanResult>>,
    progress: SharedProgress,
}

impl Scanner {
    /// Validate `config`, build the HTTP client and load templates.
    pub fn new(config: ScanConfig) -> Result<Self> {
        let config = config.validate().context("invalid scan configuration")?;
        let base = config.base_url()?;
        let client = build_client(&config)?;

        let templates = match &config.templates_dir {
            Some(dir) => TemplateSet::load_dir(dir).unwrap_or_else(|e| {
                warn!(error = %e, "templates unavailable; continuing without them");
                TemplateSet::default()
            }),
            None => TemplateSet::default(),
        };
        if !templates.is_empty() {
            info!(count = templates.len(), "detection templates loaded");
        }

        let store = config
            .resume
            .then(|| Arc::new(ProgressStore::new(config.progress_file.clone())));

        Ok(Self {
            config,
            base,
            client,
            templates: Arc::new(templates),
            store,
            feed: None,
            progress: SharedProgress::new(),
        })
    }

    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// Send every recorded result to `feed` as soon as it is found.
    pub fn with_feed(mut self, feed: mpsc::UnboundedSender<ScanResult>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn progress(&self) -> SharedProgress {
        self.progress.clone()
    }

    /// Prior progress for this target, or an empty state when resume is off,
    /// the file is unusable, or it belongs to another target.
    pub fn load_resume(&self) -> ResumeState {
        let Some(store) = &self.store else {
            return ResumeState::empty();
        };
        let state = store.load();
        match state.target.as_deref() {
            Some(t) if t != self.config.target => {
                warn!(saved = t, current = %self.config.target, "progress file is for another target; ignoring it");
                ResumeState::empty()
            }
            _ => {
                if !state.is_empty() {
                    info!(skipped = state.len(), "resuming previous scan");
                }
                state
            }
        }
    }

    /// Scan until the candidate set is exhausted.
    pub async fn run(&self, words: Vec<String>) -> Result<ScanReport> {
        self.run_with_cancel(words, CancellationToken::new()).await
    }

    /// Scan until exhausted or until `cancel` fires. On cancellation,
    /// in-flight requests complete, no further paths are claimed, and the
    /// report covers what was tested so far.
    pub async fn run_with_cancel(
        &self,
        words: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<ScanReport> {
        let start_time = OffsetDateTime::now_utc();
        let progress = &self.progress;

        progress.set_phase(ScanPhase::Generating);
        let resume = self.load_resume();
        let generator = PathGenerator::new(words, self.config.extensions.clone(), self.config.depth)
            .skip_tested(resume.skip_set())
            .limit(self.config.max_paths);
        let estimate = generator.estimate();
        if generator.is_large() {
            warn!(estimate, "candidate set is very large; consider a lower depth or --max-paths");
        }
        info!(estimate, skipped = resume.len(), depth = self.config.depth, "generating paths");

        progress.set_phase(ScanPhase::Queued);
        let threads = self.config.threads;
        let (tx, rx) = mpsc::channel::<String>(threads.saturating_mul(4).max(1));
        let producer_cancel = cancel.clone();
        let producer = tokio::spawn(async move {
            for path in generator {
                tokio::select! {
                    biased;
                    _ = producer_cancel.cancelled() => return false,
                    sent = tx.send(path) => {
                        if sent.is_err() {
                            return false;
                        }
                    }
                }
            }
            true
        });

        let ctx = Arc::new(WorkerCtx {
            client: self.client.clone(),
            base: self.base.clone(),
            target: self.config.target.clone(),
            status_codes: self.config.status_codes.clone(),
            user_agents: self.config.user_agents.clone(),
            delay: self.config.delay,
            save_every: self.config.save_every as u64,
            templates: self.templates.clone(),
            store: self.store.clone(),
            tested_paths: std::sync::Mutex::new(resume.tested_paths),
            feed: self.feed.clone(),
            progress: progress.clone(),
            queue: Mutex::new(rx),
            cancel: cancel.clone(),
        });

        let mut set = JoinSet::new();
        for id in 0..threads {
            set.spawn(worker(id, ctx.clone()));
        }
        progress.set_phase(ScanPhase::Running);
        info!(threads, target = %self.base, "scan running");

        let watcher_progress = progress.clone();
        let watcher_cancel = cancel.clone();
        let watcher = tokio::spawn(async move {
            watcher_cancel.cancelled().await;
            info!("interrupted; waiting for in-flight requests");
            watcher_progress.set_phase(ScanPhase::Interrupted);
            watcher_progress.set_phase(ScanPhase::Draining);
        });

        let mut cancelled_workers = 0usize;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(WorkerExit::Cancelled) => cancelled_workers += 1,
                Ok(WorkerExit::Exhausted) => {}
                Err(e) => warn!(error = %e, "worker task failed"),
            }
        }
        let producer_done = producer.await.unwrap_or(false);
        let interrupted = cancelled_workers > 0 || !producer_done;
        if cancel.is_cancelled() {
            // Let the watcher record the Interrupted -> Draining transition.
            let _ = watcher.await;
        } else {
            watcher.abort();
            progress.set_phase(ScanPhase::Draining);
        }

        let end_time = OffsetDateTime::now_utc();
        if let Some(store) = &self.store {
            let store = store.clone();
            if interrupted {
                let tested = ctx.tested_snapshot();
                let target = self.config.target.clone();
                tokio::task::spawn_blocking(move || store.save_or_warn(&target, &tested))
                    .await
                    .ok();
            } else if let Err(e) = store.remove() {
                warn!(error = %e, "could not remove progress file");
            }
        }
        progress.set_phase(ScanPhase::Finished);

        let results = std::mem::take(&mut *progress.results.lock().await);
        let report = ScanReport {
            target: self.config.target.clone(),
            start_time,
            end_time,
            tested_count: progress.tested.load(Ordering::Relaxed),
            interrupted,
            results,
        };
        info!(
            tested = report.tested_count,
            found = report.found_count(),
            secs = report.duration_secs(),
            interrupted,
            "scan finished"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Exhausted,
    Cancelled,
}

struct WorkerCtx {
    client: Client,
    base: Url,
    target: String,
    status_codes: BTreeSet<u16>,
    user_agents: Vec<String>,
    delay: Duration,
    save_every: u64,
    templates: Arc<TemplateSet>,
    store: Option<Arc<ProgressStore>>,
    /// Every attempted path, seeded with the resumed ones.
    tested_paths: std::sync::Mutex<Vec<String>>,
    feed: Option<mpsc::UnboundedSender<ScanResult>>,
    progress: SharedProgress,
    queue: Mutex<mpsc::Receiver<String>>,
    cancel: CancellationToken,
}

impl WorkerCtx {
    fn tested_snapshot(&self) -> Vec<String> {
        self.tested_paths
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    async fn next_path(&self) -> Option<String> {
        self.queue.lock().await.recv().await
    }

    /// Count one attempt and save progress every `save_every` attempts.
    async fn record_attempt(&self, path: String) {
        let n = self.progress.tested.fetch_add(1, Ordering::Relaxed) + 1;
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = {
            let mut list = self.tested_paths.lock().unwrap_or_else(|p| p.into_inner());
            list.push(path);
            if n % self.save_every == 0 {
                Some(list.clone())
            } else {
                None
            }
        };
        if let Some(tested) = snapshot {
            let store = store.clone();
            let target = self.target.clone();
            tokio::task::spawn_blocking(move || store.save_or_warn(&target, &tested))
                .await
                .ok();
        }
    }
}

async fn worker(id: usize, ctx: Arc<WorkerCtx>) -> WorkerExit {
    loop {
        let path = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                trace!(worker = id, "worker stopping on cancel");
                return WorkerExit::Cancelled;
            }
            next = ctx.next_path() => match next {
                Some(p) => p,
                None => return WorkerExit::Exhausted,
            },
        };

        // Paths that never reach the HTTP layer are not counted as tested.
        let url = match resolve_url(&ctx.base, &path) {
            Ok(u) => u,
            Err(e) => {
                debug!(path, error = %e, "cannot build URL");
                continue;
            }
        };

        if let Some(result) = check_url(&ctx, &path, url).await {
            ctx.progress.found.fetch_add(1, Ordering::Relaxed);
            ctx.progress.results.lock().await.push(result.clone());
            if let Some(feed) = &ctx.feed {
                let _ = feed.send(result);
            }
        }
        ctx.record_attempt(path).await;

        if !ctx.delay.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {}
                _ = tokio::time::sleep(ctx.delay) => {}
            }
        }
    }
}

/// Request one resolved path and classify the response. Transport failures
/// and unlisted status codes yield `None`.
async fn check_url(ctx: &WorkerCtx, path: &str, url: Url) -> Option<ScanResult> {
    let mut request = ctx.client.get(url.clone());
    let agent = ctx.user_agents.choose(&mut rand::rng()).cloned();
    if let Some(agent) = agent {
        request = request.header(USER_AGENT, agent);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            debug!(url = %url, error = %e, "request failed");
            return None;
        }
    };

    let status = response.status().as_u16();
    if !ctx.status_codes.contains(&status) {
        trace!(url = %url, status, "not reported");
        return None;
    }

    let headers = response.headers().clone();
    let content_length = match response.content_length() {
        Some(n) => n,
        None => response.bytes().await.map(|b| b.len() as u64).unwrap_or(0),
    };

    let matched = ctx.templates.find_match(status, &headers, content_length);
    let label = match matched {
        Some(_) => Label::Template,
        None => Label::from_status(status),
    };
    let result = ScanResult {
        path: path.to_string(),
        url: url.to_string(),
        status,
        content_length,
        label,
        matched_template: matched.map(|t| t.id.clone()),
    };
    debug!(url = %result.url, status, label = %label, "recorded");
    Some(result)
}
