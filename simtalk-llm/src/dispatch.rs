//! Generative dispatch — fire-and-forget submission, non-blocking poll.
//!
//! Every generative call in simtalk flows through a [`GenerativeClient`]:
//! - At most one outstanding request per requester; a second submission is
//!   rejected, never queued
//! - One tokio task per request, so a slow backend never blocks the tick
//! - Workers never fail: errors, panics and timeouts all come back as the
//!   placeholder text
//! - Results land on a single channel and are drained one per `poll_result`
//!
//! The worker removes the requester from the pending set *before* pushing
//! its result, so by the time a caller sees a result it may submit again.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::GenerativeBackend;
use crate::error::LlmError;
use crate::types::{Prompt, RequestKind};

/// Placeholder text delivered when the backend cannot produce a reply.
pub const DEFAULT_PLACEHOLDER: &str = "(model unavailable)";

/// A submitted request whose result has not been pushed yet.
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    kind: RequestKind,
    dispatched_at: Instant,
}

/// Counters describing dispatcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Requests accepted by `submit`.
    pub submitted: u64,
    /// Requests rejected because the requester already had one pending.
    pub rejected: u64,
    /// Requests whose result has been pushed onto the channel.
    pub completed: u64,
    /// Completed requests that delivered the placeholder.
    pub placeholders: u64,
    /// Requests currently pending.
    pub in_flight: usize,
    /// How long the oldest pending request has been waiting.
    pub oldest_in_flight: Option<Duration>,
}

struct DispatchInner<K> {
    pending: HashMap<K, PendingRequest>,
    stats: DispatchStats,
}

/// Asynchronous generative client keyed by requester identity.
///
/// `K` is whatever identifies "who asked": an agent id for conversation
/// turns and thoughts, an agent pair for romance analyses.
pub struct GenerativeClient<K, B> {
    backend: Arc<B>,
    handle: Handle,
    inner: Arc<Mutex<DispatchInner<K>>>,
    results_tx: UnboundedSender<(K, String)>,
    results_rx: UnboundedReceiver<(K, String)>,
    placeholder: Arc<str>,
    call_timeout: Option<Duration>,
}

impl<K, B> GenerativeClient<K, B>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    B: GenerativeBackend,
{
    /// Create a client whose workers run on `handle`.
    #[must_use]
    pub fn with_handle(backend: B, handle: Handle) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            backend: Arc::new(backend),
            handle,
            inner: Arc::new(Mutex::new(DispatchInner {
                pending: HashMap::new(),
                stats: DispatchStats::default(),
            })),
            results_tx,
            results_rx,
            placeholder: Arc::from(DEFAULT_PLACEHOLDER),
            call_timeout: None,
        }
    }

    /// Create a client on the ambient tokio runtime.
    ///
    /// # Errors
    /// Returns `LlmError::NoRuntime` when called outside a runtime.
    pub fn new(backend: B) -> Result<Self, LlmError> {
        let handle = Handle::try_current().map_err(|e| LlmError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(backend, handle))
    }

    /// Replace the placeholder text.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Arc::from(placeholder.into());
        self
    }

    /// Bound every backend call; a call that runs longer yields the placeholder.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// The placeholder text delivered on backend failure.
    #[must_use]
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Submit a prompt on behalf of `requester`.
    ///
    /// Returns `false`, with no side effect besides the rejection counter,
    /// if `requester` already has a pending request.
    pub fn submit(&self, requester: K, prompt: Prompt) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.pending.contains_key(&requester) {
                inner.stats.rejected += 1;
                debug!(?requester, "Rejected duplicate generative request");
                return false;
            }
            inner.pending.insert(
                requester.clone(),
                PendingRequest {
                    kind: prompt.kind,
                    dispatched_at: Instant::now(),
                },
            );
            inner.stats.submitted += 1;
        }

        let backend = Arc::clone(&self.backend);
        let inner = Arc::clone(&self.inner);
        let tx = self.results_tx.clone();
        let placeholder = Arc::clone(&self.placeholder);
        let call_timeout = self.call_timeout;
        debug!(?requester, kind = ?prompt.kind, "Dispatching generative request");

        self.handle.spawn(async move {
            let text = run_call(backend, prompt, call_timeout).await;
            let (text, fell_back) = match text {
                Some(text) => (text, false),
                None => (placeholder.to_string(), true),
            };

            {
                let mut inner = inner.lock();
                if let Some(done) = inner.pending.remove(&requester) {
                    let elapsed_ms =
                        u64::try_from(done.dispatched_at.elapsed().as_millis()).unwrap_or(u64::MAX);
                    debug!(
                        ?requester,
                        kind = ?done.kind,
                        elapsed_ms,
                        fell_back,
                        "Generative request completed"
                    );
                }
                inner.stats.completed += 1;
                if fell_back {
                    inner.stats.placeholders += 1;
                }
            }

            if tx.send((requester, text)).is_err() {
                debug!("Result channel closed; dropping generative result");
            }
        });

        true
    }

    /// Take the next completed result, if any. Never blocks.
    pub fn poll_result(&mut self) -> Option<(K, String)> {
        self.results_rx.try_recv().ok()
    }

    /// Whether `requester` has a request in flight.
    #[must_use]
    pub fn is_pending(&self, requester: &K) -> bool {
        self.inner.lock().pending.contains_key(requester)
    }

    /// Number of requests in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Snapshot of the dispatcher counters.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        let inner = self.inner.lock();
        let now = Instant::now();
        DispatchStats {
            in_flight: inner.pending.len(),
            oldest_in_flight: inner
                .pending
                .values()
                .map(|p| now.saturating_duration_since(p.dispatched_at))
                .max(),
            ..inner.stats
        }
    }
}

/// Run one backend call. `None` means the placeholder should be delivered.
///
/// The call runs as its own task so a panicking backend surfaces as a
/// `JoinError` instead of tearing down the worker.
async fn run_call<B: GenerativeBackend>(
    backend: Arc<B>,
    prompt: Prompt,
    call_timeout: Option<Duration>,
) -> Option<String> {
    let call = tokio::spawn(async move { backend.generate(&prompt).await });
    let abort = call.abort_handle();

    let joined = match call_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                warn!("Generative call exceeded {}ms, using placeholder", limit.as_millis());
                return None;
            }
        },
        None => call.await,
    };

    match joined {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!("Generative backend failed, using placeholder: {e}");
            None
        }
        Err(e) => {
            warn!("Generative backend task aborted, using placeholder: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes the user prompt after a delay encoded in the system prompt.
    struct Echo;

    impl GenerativeBackend for Echo {
        async fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
            let delay_ms: u64 = prompt.system.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(format!("echo: {}", prompt.user))
        }
    }

    /// Fails for requester prompts containing "fail", panics on "panic".
    struct Flaky;

    impl GenerativeBackend for Flaky {
        async fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
            if prompt.user.contains("panic") {
                panic!("backend exploded");
            }
            if prompt.user.contains("fail") {
                return Err(LlmError::Unavailable("scripted failure".into()));
            }
            Ok("fine".into())
        }
    }

    fn prompt(delay_ms: u64, user: &str) -> Prompt {
        Prompt::new(RequestKind::ConversationTurn, delay_ms.to_string(), user)
    }

    async fn next_result<B: GenerativeBackend>(
        client: &mut GenerativeClient<&'static str, B>,
    ) -> (&'static str, String) {
        for _ in 0..2_000 {
            if let Some(result) = client.poll_result() {
                return result;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("no result arrived");
    }

    #[tokio::test]
    async fn second_submission_is_rejected_while_pending() {
        let mut client = GenerativeClient::new(Echo).expect("runtime");

        assert!(client.submit("s1", prompt(20, "hello")));
        assert!(!client.submit("s1", prompt(0, "again")));
        assert!(client.is_pending(&"s1"));

        let (who, text) = next_result(&mut client).await;
        assert_eq!(who, "s1");
        assert_eq!(text, "echo: hello");
        assert!(!client.is_pending(&"s1"));

        // Pending is cleared before the result is visible.
        assert!(client.submit("s1", prompt(0, "third")));

        let stats = client.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn backend_error_yields_placeholder_for_requester() {
        let mut client = GenerativeClient::new(Flaky).expect("runtime");
        assert!(client.submit("s1", prompt(0, "please fail")));

        let (who, text) = next_result(&mut client).await;
        assert_eq!(who, "s1");
        assert_eq!(text, DEFAULT_PLACEHOLDER);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.poll_result().is_none(), "exactly one result per request");
        assert_eq!(client.stats().placeholders, 1);
    }

    #[tokio::test]
    async fn backend_panic_yields_placeholder() {
        let mut client = GenerativeClient::new(Flaky)
            .expect("runtime")
            .with_placeholder("...");
        assert!(client.submit("s2", prompt(0, "panic now")));

        let (who, text) = next_result(&mut client).await;
        assert_eq!(who, "s2");
        assert_eq!(text, "...");
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_to_placeholder() {
        let mut client = GenerativeClient::new(Echo)
            .expect("runtime")
            .with_call_timeout(Duration::from_millis(50));
        assert!(client.submit("slow", prompt(10_000, "zzz")));

        let (who, text) = next_result(&mut client).await;
        assert_eq!(who, "slow");
        assert_eq!(text, DEFAULT_PLACEHOLDER);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_report_age_of_oldest_pending_request() {
        let mut client = GenerativeClient::new(Echo).expect("runtime");
        assert_eq!(client.stats().oldest_in_flight, None);

        assert!(client.submit("early", prompt(200, "first")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.submit("late", prompt(200, "second")));

        let stats = client.stats();
        assert_eq!(stats.in_flight, 2);
        assert!(stats.oldest_in_flight >= Some(Duration::from_millis(50)));

        next_result(&mut client).await;
        next_result(&mut client).await;
        assert_eq!(client.stats().oldest_in_flight, None);
    }

    #[tokio::test]
    async fn results_arrive_in_completion_order() {
        let mut client = GenerativeClient::new(Echo).expect("runtime");
        assert!(client.submit("tortoise", prompt(60, "slow")));
        assert!(client.submit("hare", prompt(1, "fast")));

        let first = next_result(&mut client).await;
        let second = next_result(&mut client).await;
        assert_eq!(first.0, "hare");
        assert_eq!(second.0, "tortoise");
        assert_eq!(client.stats().completed, 2);
    }

    #[test]
    fn construction_outside_runtime_fails() {
        let result = GenerativeClient::<&'static str, Echo>::new(Echo);
        assert!(matches!(result, Err(LlmError::NoRuntime(_))));
    }

    #[test]
    fn explicit_handle_works_from_sync_code() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .expect("runtime");
        let mut client = GenerativeClient::with_handle(Echo, runtime.handle().clone());
        assert!(client.submit("sync", prompt(0, "hi")));

        let mut result = None;
        for _ in 0..2_000 {
            result = client.poll_result();
            if result.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(result, Some(("sync", "echo: hi".to_string())));
    }
}
