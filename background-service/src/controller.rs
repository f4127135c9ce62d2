use chrono::{DateTime, Duration, Utc};
use database::{
    CooldownLedger, Database, DiscoveryLog, NewDiscoveryQuery, ResponseLedger, ThreadRegistry,
};
use engager_core::{
    normalize_subreddit, Candidate, CommentPoster, CoreError, DiscoveryProvider, ErrorExt,
    ResponseGenerator, ScheduleConfig, ThreadLookup,
};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::scheduler::CycleRunner;

/// The four external collaborators a cycle talks to.
#[derive(Debug, Clone)]
pub struct Collaborators<D, L, G, P> {
    pub discovery: D,
    pub lookup: L,
    pub generator: G,
    pub poster: P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementPolicy {
    pub subreddit_cooldown: Duration,
    /// How long a thread with a failed reply stays off limits.
    pub thread_cooldown: Duration,
    pub max_posts_per_cycle: Option<usize>,
}

impl EngagementPolicy {
    pub fn from_schedule(schedule: &ScheduleConfig) -> Self {
        Self {
            subreddit_cooldown: schedule.subreddit_cooldown(),
            thread_cooldown: schedule.thread_cooldown(),
            max_posts_per_cycle: schedule.max_posts_per_cycle,
        }
    }
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        Self::from_schedule(&ScheduleConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    PostLimitReached,
    SubredditCoolingDown,
    NotFound,
    LookupFailed,
    Locked,
    Archived,
    AlreadyEngaged,
    RecentlyFailed,
    GenerationFailed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::PostLimitReached => "post limit reached",
            SkipReason::SubredditCoolingDown => "subreddit cooling down",
            SkipReason::NotFound => "thread not found",
            SkipReason::LookupFailed => "lookup failed",
            SkipReason::Locked => "thread locked",
            SkipReason::Archived => "thread archived",
            SkipReason::AlreadyEngaged => "already engaged",
            SkipReason::RecentlyFailed => "recent failed attempt",
            SkipReason::GenerationFailed => "generation failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Posted {
        thread_id: i64,
        response_id: i64,
        comment_id: String,
    },
    PostFailed {
        thread_id: i64,
        response_id: i64,
        error: String,
    },
    Skipped(SkipReason),
    /// A non-storage error escaped the candidate's pipeline.
    Errored(String),
}

/// What one cycle did with the candidates discovery handed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub candidates_seen: usize,
    pub posted: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl CycleReport {
    pub fn record(&mut self, outcome: &CandidateOutcome) {
        match outcome {
            CandidateOutcome::Posted { .. } => self.posted += 1,
            CandidateOutcome::PostFailed { .. } => self.failed += 1,
            CandidateOutcome::Skipped(reason) => *self.skipped.entry(*reason).or_insert(0) += 1,
            CandidateOutcome::Errored(_) => self.errored += 1,
        }
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidate(s): {} posted, {} failed, {} skipped, {} errored",
            self.candidates_seen,
            self.posted,
            self.failed,
            self.total_skipped(),
            self.errored
        )
    }
}

/// Runs discovery, eligibility, generation, posting and bookkeeping for one cycle.
pub struct EngagementController<D, L, G, P> {
    providers: Collaborators<D, L, G, P>,
    database: Database,
    threads: ThreadRegistry,
    responses: ResponseLedger,
    cooldowns: CooldownLedger,
    discovery_log: DiscoveryLog,
    prompt: String,
    policy: EngagementPolicy,
}

impl<D, L, G, P> EngagementController<D, L, G, P>
where
    D: DiscoveryProvider,
    L: ThreadLookup,
    G: ResponseGenerator,
    P: CommentPoster,
{
    pub fn new(
        providers: Collaborators<D, L, G, P>,
        database: Database,
        prompt: String,
        policy: EngagementPolicy,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            threads: database.thread_registry()?,
            responses: database.response_ledger()?,
            cooldowns: database.cooldown_ledger()?,
            discovery_log: database.discovery_log()?,
            providers,
            database,
            prompt,
            policy,
        })
    }

    /// Discover candidates and log the attempt whatever its outcome.
    async fn discover(&self, now: DateTime<Utc>) -> Result<Vec<Candidate>, CoreError> {
        let result = self.providers.discovery.discover(&self.prompt).await;

        let error_message = result.as_ref().err().map(|e| e.to_string());
        let entry = match &result {
            Ok(discovery) => NewDiscoveryQuery {
                query_text: &self.prompt,
                response_text: Some(discovery.raw_response.as_str()),
                success: true,
                error_message: None,
                threads_found: discovery.candidates.len(),
            },
            Err(e) => NewDiscoveryQuery {
                query_text: &self.prompt,
                response_text: e.discovery_output(),
                success: false,
                error_message: error_message.as_deref(),
                threads_found: 0,
            },
        };
        self.discovery_log.record(&entry, now).await?;

        Ok(result?.candidates)
    }

    async fn cooling_down(&self, subreddit: &str, now: DateTime<Utc>) -> Result<bool, CoreError> {
        self.cooldowns.is_subreddit_cooling_down(subreddit, now).await
    }

    /// Walk one candidate through every gate. Provider failures become skips or
    /// failed responses; only storage and ledger errors are returned.
    async fn process_candidate(
        &self,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> Result<CandidateOutcome, CoreError> {
        info!(
            "Processing thread: {} in r/{}",
            preview(&candidate.title, 50),
            candidate.subreddit
        );

        if self.cooling_down(&candidate.subreddit, now).await? {
            info!("r/{} is on cooldown - skipping", candidate.subreddit);
            return Ok(CandidateOutcome::Skipped(SkipReason::SubredditCoolingDown));
        }

        let thread = match self.providers.lookup.find_thread(candidate).await {
            Ok(Some(thread)) => thread,
            Ok(None) => {
                warn!(
                    "Could not find thread on Reddit: {}",
                    preview(&candidate.title, 50)
                );
                return Ok(CandidateOutcome::Skipped(SkipReason::NotFound));
            }
            Err(e) => {
                e.log_warn();
                return Ok(CandidateOutcome::Skipped(SkipReason::LookupFailed));
            }
        };

        // The thread may live in a differently spelled subreddit than discovery reported.
        if normalize_subreddit(&thread.subreddit) != normalize_subreddit(&candidate.subreddit)
            && self.cooling_down(&thread.subreddit, now).await?
        {
            info!("r/{} is on cooldown - skipping", thread.subreddit);
            return Ok(CandidateOutcome::Skipped(SkipReason::SubredditCoolingDown));
        }
        if thread.archived {
            info!("Thread {} is archived - skipping", thread.reddit_thread_id);
            return Ok(CandidateOutcome::Skipped(SkipReason::Archived));
        }
        if thread.locked {
            info!("Thread {} is locked - skipping", thread.reddit_thread_id);
            return Ok(CandidateOutcome::Skipped(SkipReason::Locked));
        }

        let record = self.threads.upsert_thread(&thread, now).await?;

        if self.responses.has_pending_or_posted(record.id).await? {
            info!(
                "Already responded to thread {} - skipping",
                thread.reddit_thread_id
            );
            return Ok(CandidateOutcome::Skipped(SkipReason::AlreadyEngaged));
        }

        if let Some(failed_at) = self.responses.last_failed_at(record.id).await? {
            let retry_at = failed_at
                .checked_add_signed(self.policy.thread_cooldown)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if now < retry_at {
                info!(
                    "Thread {} had a failed reply at {} - skipping until {}",
                    thread.reddit_thread_id, failed_at, retry_at
                );
                return Ok(CandidateOutcome::Skipped(SkipReason::RecentlyFailed));
            }
        }

        info!("Generating response for thread {}...", thread.reddit_thread_id);
        let draft = match self.providers.generator.complete(&thread.context_text()).await {
            Ok(draft) => draft,
            Err(e) => {
                e.log_warn();
                return Ok(CandidateOutcome::Skipped(SkipReason::GenerationFailed));
            }
        };

        let response_id = self.responses.create_pending(record.id, &draft, now).await?;

        info!("Posting comment to Reddit...");
        match self
            .providers
            .poster
            .post_comment(&thread.reddit_thread_id, &draft)
            .await
        {
            Ok(comment_id) => {
                let confirmed = self
                    .responses
                    .mark_posted(response_id, &comment_id, now)
                    .await;
                // The comment is live even if the row could not be confirmed.
                self.cooldowns
                    .record_post(&thread.subreddit, now, self.policy.subreddit_cooldown)
                    .await?;
                confirmed?;
                info!(
                    "Successfully posted comment {} to r/{}",
                    comment_id, thread.subreddit
                );
                Ok(CandidateOutcome::Posted {
                    thread_id: record.id,
                    response_id,
                    comment_id,
                })
            }
            Err(e) => {
                e.log_error();
                let error = e.to_string();
                self.responses.mark_failed(response_id, &error).await?;
                Ok(CandidateOutcome::PostFailed {
                    thread_id: record.id,
                    response_id,
                    error,
                })
            }
        }
    }

    async fn log_statistics(&self, now: DateTime<Utc>) {
        match self.database.statistics(now).await {
            Ok(stats) => {
                info!("Overall statistics:");
                info!("  Total threads discovered: {}", stats.total_threads);
                info!("  Posts in last 24h: {}", stats.posts_last_24h);
                info!("  Active cooldowns: {}", stats.active_cooldowns);
                info!(
                    "  Response status breakdown: {:?}",
                    stats.responses_by_status
                );
            }
            Err(e) => {
                e.log_warn();
            }
        }
    }
}

impl<D, L, G, P> CycleRunner for EngagementController<D, L, G, P>
where
    D: DiscoveryProvider,
    L: ThreadLookup,
    G: ResponseGenerator,
    P: CommentPoster,
{
    async fn run_cycle(&self, cycle: u64, now: DateTime<Utc>) -> Result<CycleReport, CoreError> {
        let candidates = self.discover(now).await?;

        let mut report = CycleReport {
            candidates_seen: candidates.len(),
            ..CycleReport::default()
        };
        if candidates.is_empty() {
            info!("No relevant threads found in cycle #{}", cycle);
        } else {
            info!("Found {} potentially relevant threads", candidates.len());
        }

        for (index, candidate) in candidates.iter().enumerate() {
            if let Some(limit) = self.policy.max_posts_per_cycle {
                if report.posted >= limit {
                    debug!(
                        "Post limit of {} reached, skipping {}",
                        limit, candidate.title
                    );
                    report.record(&CandidateOutcome::Skipped(SkipReason::PostLimitReached));
                    continue;
                }
            }

            info!("Processing thread {}/{}", index + 1, candidates.len());
            let outcome = match self.process_candidate(candidate, now).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_storage() => return Err(e),
                Err(e) => {
                    e.log_error();
                    CandidateOutcome::Errored(e.to_string())
                }
            };
            report.record(&outcome);
        }

        info!("Cycle #{} complete: {}", cycle, report);
        self.log_statistics(now).await;
        Ok(report)
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
