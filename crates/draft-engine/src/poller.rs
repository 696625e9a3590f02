// Confirmed-pick poller.
//
// Repeatedly fetches the full "picks so far" list from the poll source and
// forwards only the entries beyond the previously seen length. Requests are
// bounded by a rolling-window rate limiter. Transient failures are logged
// and retried after a fixed delay; the loop only ends when the consumer side
// of the queue is gone.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::protocol::PolledPick;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("poll source returned status {0}")]
    Status(u16),
}

/// Anything that can produce the full list of picks made so far.
#[async_trait]
pub trait PickSource: Send + Sync {
    async fn fetch_picks(&self) -> Result<Vec<PolledPick>, PollError>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

pub struct HttpPickSource {
    http: reqwest::Client,
    url: String,
}

impl HttpPickSource {
    /// Build a source whose requests give up after `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PollError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpPickSource {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PickSource for HttpPickSource {
    async fn fetch_picks(&self) -> Result<Vec<PolledPick>, PollError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }
        Ok(response.json::<Vec<PolledPick>>().await?)
    }
}

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

/// At most `max_requests` requests in any rolling `window`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Vec<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        RateLimiter {
            max_requests: max_requests.max(1),
            window,
            requests: Vec::new(),
        }
    }

    /// Record a request at `now` if the window allows it, otherwise return
    /// how long to wait before the oldest request leaves the window.
    pub fn check(&mut self, now: Instant) -> Result<(), Duration> {
        let window = self.window;
        self.requests
            .retain(|&t| now.saturating_duration_since(t) < window);

        if self.requests.len() >= self.max_requests {
            let oldest = self.requests.iter().min().copied().unwrap_or(now);
            return Err((oldest + window).saturating_duration_since(now));
        }

        self.requests.push(now);
        Ok(())
    }

    /// Wait until a request is allowed, then record it.
    pub async fn acquire(&mut self) {
        loop {
            match self.check(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    debug!("Rate limit reached; waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Picks beyond the first `seen` entries.
pub fn new_picks(seen: usize, current: &[PolledPick]) -> &[PolledPick] {
    current.get(seen..).unwrap_or(&[])
}

pub struct Poller<S> {
    source: S,
    limiter: RateLimiter,
    interval: Duration,
    retry_delay: Duration,
    seen: usize,
}

impl<S: PickSource> Poller<S> {
    pub fn new(source: S, config: &PollerConfig) -> Self {
        Poller {
            source,
            limiter: RateLimiter::new(
                config.max_requests,
                Duration::from_secs(config.window_secs),
            ),
            interval: Duration::from_millis(config.interval_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            seen: 0,
        }
    }

    /// Fetch once and forward new picks in order. Returns the number
    /// forwarded, or `None` once the consumer has gone away.
    pub async fn poll_once(
        &mut self,
        tx: &mpsc::Sender<PolledPick>,
    ) -> Result<Option<usize>, PollError> {
        self.limiter.acquire().await;
        let picks = self.source.fetch_picks().await?;

        if picks.len() < self.seen {
            warn!(
                "Poll source shrank from {} to {} picks; re-basing",
                self.seen,
                picks.len()
            );
            self.seen = picks.len();
            return Ok(Some(0));
        }

        let fresh = new_picks(self.seen, &picks);
        for pick in fresh {
            // Awaiting here is the backpressure: a full queue slows polling.
            if tx.send(pick.clone()).await.is_err() {
                return Ok(None);
            }
            self.seen += 1;
        }
        if !fresh.is_empty() {
            debug!("Forwarded {} new picks (total {})", fresh.len(), self.seen);
        }
        Ok(Some(fresh.len()))
    }

    /// Poll until the receiving side of `tx` is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<PolledPick>) {
        info!("Pick poller started");
        loop {
            if tx.is_closed() {
                break;
            }
            match self.poll_once(&tx).await {
                Ok(Some(_)) => tokio::time::sleep(self.interval).await,
                Ok(None) => break,
                Err(e) => {
                    warn!("Poll failed: {}; retrying in {:?}", e, self.retry_delay);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
        info!("Pick poller stopped: consumer closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn polled(id: &str, pick_no: u32) -> PolledPick {
        PolledPick {
            player_id: id.into(),
            picked_by: None,
            pick_no,
            round: 1,
        }
    }

    /// Replays scripted responses, then keeps repeating the last success.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<PolledPick>, PollError>>>,
        last: Mutex<Vec<PolledPick>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<PolledPick>, PollError>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let source = ScriptedSource {
                script: Mutex::new(script.into()),
                last: Mutex::new(Vec::new()),
                calls: calls.clone(),
            };
            (source, calls)
        }
    }

    #[async_trait]
    impl PickSource for ScriptedSource {
        async fn fetch_picks(&self) -> Result<Vec<PolledPick>, PollError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(picks)) => {
                    *self.last.lock().unwrap() = picks.clone();
                    Ok(picks)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last.lock().unwrap().clone()),
            }
        }
    }

    fn test_config() -> PollerConfig {
        PollerConfig {
            url: String::new(),
            interval_ms: 1000,
            request_timeout_ms: 5000,
            max_requests: 100,
            window_secs: 60,
            retry_delay_ms: 2000,
        }
    }

    #[test]
    fn new_picks_is_the_tail() {
        let picks = vec![polled("a", 1), polled("b", 2), polled("c", 3)];
        assert_eq!(new_picks(1, &picks), &picks[1..]);
        assert!(new_picks(3, &picks).is_empty());
        assert!(new_picks(5, &picks).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_enforces_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();
        assert!(limiter.check(start).is_ok());
        assert!(limiter.check(start + Duration::from_secs(1)).is_ok());
        assert_eq!(
            limiter.check(start + Duration::from_secs(2)),
            Err(Duration::from_secs(8))
        );
        assert!(limiter.check(start + Duration::from_secs(10)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_window() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(5));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(Instant::now() - start >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_only_new_picks_in_order() {
        let (source, _) = ScriptedSource::new(vec![
            Ok(vec![polled("a", 1)]),
            Ok(vec![polled("a", 1)]),
            Ok(vec![polled("a", 1), polled("b", 2), polled("c", 3)]),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let handle = tokio::spawn(Poller::new(source, &test_config()).run(tx));

        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(rx.recv().await.unwrap().player_id);
        }
        assert_eq!(got, vec!["a", "b", "c"]);

        // Nothing else arrives while the list stays the same.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_swallowed() {
        let (source, calls) = ScriptedSource::new(vec![
            Err(PollError::Status(503)),
            Ok(vec![polled("a", 1)]),
            Err(PollError::Status(504)),
            Ok(vec![polled("a", 1), polled("b", 2)]),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let handle = tokio::spawn(Poller::new(source, &test_config()).run(tx));

        assert_eq!(rx.recv().await.unwrap().player_id, "a");
        assert_eq!(rx.recv().await.unwrap().player_id, "b");
        assert!(calls.load(Ordering::SeqCst) >= 4);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_applies_backpressure_without_drops() {
        let picks: Vec<PolledPick> = (1..=5).map(|i| polled(&format!("p{i}"), i)).collect();
        let (source, _) = ScriptedSource::new(vec![Ok(picks)]);
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(Poller::new(source, &test_config()).run(tx));

        for i in 1..=5u32 {
            let pick = rx.recv().await.unwrap();
            assert_eq!(pick.pick_no, i);
        }
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_source_rebases() {
        let (source, _) = ScriptedSource::new(vec![
            Ok(vec![polled("a", 1), polled("b", 2)]),
            Ok(vec![polled("a", 1)]),
            Ok(vec![polled("a", 1), polled("c", 2)]),
        ]);
        let mut poller = Poller::new(source, &test_config());
        let (tx, mut rx) = mpsc::channel(16);

        assert_eq!(poller.poll_once(&tx).await.unwrap(), Some(2));
        assert_eq!(poller.poll_once(&tx).await.unwrap(), Some(0));
        assert_eq!(poller.poll_once(&tx).await.unwrap(), Some(1));

        let ids: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|p| p.player_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_consumer_is_dropped() {
        let (source, _) = ScriptedSource::new(vec![Ok(vec![polled("a", 1), polled("b", 2)])]);
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        // Returns instead of polling forever.
        Poller::new(source, &test_config()).run(tx).await;
    }
}
