use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Thread-safe counters describing upload and question activity.
#[derive(Default)]
pub struct ServiceMetrics {
    documents_indexed: AtomicU64,
    chunks_indexed: AtomicU64,
    failed_uploads: AtomicU64,
    questions_answered: AtomicU64,
    failed_questions: AtomicU64,
    last_indexed_at: Mutex<Option<String>>,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document whose index replaced the live one.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
        let stamp = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        if let Ok(mut guard) = self.last_indexed_at.lock() {
            *guard = stamp;
        }
    }

    /// Record an upload that left the live index untouched.
    pub fn record_failed_upload(&self) {
        self.failed_uploads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question that produced an answer.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question that ended in an error.
    pub fn record_failed_question(&self) {
        self.failed_questions.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            failed_uploads: self.failed_uploads.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            failed_questions: self.failed_questions.load(Ordering::Relaxed),
            last_indexed_at: self
                .last_indexed_at
                .lock()
                .ok()
                .and_then(|guard| guard.clone()),
        }
    }
}

/// Immutable view of service counters used for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that were indexed since startup.
    pub documents_indexed: u64,
    /// Total chunk count across all indexed documents.
    pub chunks_indexed: u64,
    /// Uploads rejected before the index was replaced.
    pub failed_uploads: u64,
    /// Questions answered by the chat model.
    pub questions_answered: u64,
    /// Questions that returned an error payload.
    pub failed_questions: u64,
    /// RFC3339 timestamp of the most recent successful index build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_indexed_at: Option<String>,
}
