//! Seams between the engagement controller and the outside world.
//!
//! Every external call the controller makes goes through one of these traits so
//! cycles can be driven by fakes and a fixed clock.

use chrono::{DateTime, Utc};

use crate::{Candidate, CoreError, Discovery, ThreadMetadata};

pub trait DiscoveryProvider {
    /// Run the discovery prompt and return the candidate threads it produced.
    async fn discover(&self, prompt: &str) -> Result<Discovery, CoreError>;
}

pub trait ThreadLookup {
    /// Resolve a candidate to live thread metadata, `None` when Reddit has no match.
    async fn find_thread(&self, candidate: &Candidate) -> Result<Option<ThreadMetadata>, CoreError>;
}

pub trait ResponseGenerator {
    /// Draft a reply for the given thread context.
    async fn complete(&self, context: &str) -> Result<String, CoreError>;
}

pub trait CommentPoster {
    /// Submit a reply and return the new comment id.
    async fn post_comment(&self, reddit_thread_id: &str, text: &str) -> Result<String, CoreError>;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
