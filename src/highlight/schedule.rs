//! Timing around highlight delivery.
//!
//! A highlight request for a page that is still loading waits for the load
//! to complete (bounded), lets rendering settle, waits for the page's
//! highlighter to answer a readiness probe (bounded), then sends the request
//! with a fixed number of retries. Every wait is bounded and cancellable.
//! Running out of time is a soft failure: logged and reported, never raised.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{MatchPolicy, RegionError, Selection};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    /// Ceiling on waiting for the page to finish loading
    pub load_timeout: Duration,
    /// Pause after load before the first probe
    pub settle_delay: Duration,
    /// Ceiling on waiting for the readiness probe
    pub ready_timeout: Duration,
    pub ready_poll_interval: Duration,
    pub send_attempts: u32,
    pub send_retry_delay: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(20),
            settle_delay: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(10),
            ready_poll_interval: Duration::from_millis(500),
            send_attempts: 3,
            send_retry_delay: Duration::from_millis(500),
        }
    }
}

/// A page that can receive highlight requests.
#[async_trait]
pub trait HighlightTarget: Send + Sync {
    /// Load-state channel; `true` once the page has finished loading.
    fn load_state(&self) -> watch::Receiver<bool>;

    /// Readiness probe for the page's highlighter.
    async fn ping(&self) -> bool;

    async fn highlight(&self, text: &str, policy: &MatchPolicy) -> Result<Selection, RegionError>;
}

/// Cancellation signal for a scheduled highlight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Option<watch::Receiver<bool>>);

/// Owner side of a [`CancelToken`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(Some(rx)))
}

impl CancelToken {
    /// Token that is never cancelled.
    #[cfg(test)]
    pub fn never() -> Self {
        Self(None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.0.as_mut() {
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadWait {
    Loaded,
    TimedOut,
    /// The page went away before loading
    Closed,
    Cancelled,
}

/// Wait until `loaded` reports `true`, at most `ceiling`.
pub async fn wait_until_loaded(
    mut loaded: watch::Receiver<bool>,
    ceiling: Duration,
    cancel: &mut CancelToken,
) -> LoadWait {
    let wait = async move { loaded.wait_for(|done| *done).await.is_ok() };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => LoadWait::Cancelled,
        res = tokio::time::timeout(ceiling, wait) => match res {
            Ok(true) => LoadWait::Loaded,
            Ok(false) => LoadWait::Closed,
            Err(_) => LoadWait::TimedOut,
        },
    }
}

/// Poll `target` until it answers the readiness probe, at most `ceiling`.
pub async fn wait_until_ready<T: HighlightTarget + ?Sized>(
    target: &T,
    interval: Duration,
    ceiling: Duration,
) -> bool {
    let poll = async {
        loop {
            if target.ping().await {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    };

    tokio::time::timeout(ceiling, poll).await.is_ok()
}

/// Run `op` up to `attempts` times with `delay` between failures.
///
/// Returns the last error once attempts run out.
pub async fn retry_fixed<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                log::debug!("attempt {attempt}/{attempts} failed: {err}");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    Highlighted(Selection),
    LoadTimedOut,
    PageClosed,
    NotReady,
    SendFailed(String),
    Cancelled,
}

impl ScheduleOutcome {
    #[cfg(test)]
    pub fn selection(&self) -> Option<&Selection> {
        match self {
            ScheduleOutcome::Highlighted(selection) => Some(selection),
            _ => None,
        }
    }
}

/// Deliver a highlight request to a page that may still be loading.
pub async fn schedule_highlight<T: HighlightTarget + ?Sized>(
    target: &T,
    text: &str,
    policy: &MatchPolicy,
    settings: &ScheduleSettings,
    mut cancel: CancelToken,
) -> ScheduleOutcome {
    if cancel.is_cancelled() {
        return ScheduleOutcome::Cancelled;
    }

    match wait_until_loaded(target.load_state(), settings.load_timeout, &mut cancel).await {
        LoadWait::Loaded => {}
        LoadWait::TimedOut => {
            log::warn!(
                "page did not finish loading within {:?}, skipping highlight",
                settings.load_timeout
            );
            return ScheduleOutcome::LoadTimedOut;
        }
        LoadWait::Closed => {
            log::info!("page closed before loading, skipping highlight");
            return ScheduleOutcome::PageClosed;
        }
        LoadWait::Cancelled => return ScheduleOutcome::Cancelled,
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return ScheduleOutcome::Cancelled,
        _ = tokio::time::sleep(settings.settle_delay) => {}
    }

    let ready = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ScheduleOutcome::Cancelled,
        ready = wait_until_ready(target, settings.ready_poll_interval, settings.ready_timeout) => ready,
    };
    if !ready {
        log::warn!(
            "page highlighter not ready after {:?}, skipping highlight",
            settings.ready_timeout
        );
        return ScheduleOutcome::NotReady;
    }

    let send = retry_fixed(settings.send_attempts, settings.send_retry_delay, |_| {
        target.highlight(text, policy)
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => ScheduleOutcome::Cancelled,
        res = send => match res {
            Ok(selection) => ScheduleOutcome::Highlighted(selection),
            Err(err) => {
                log::warn!(
                    "highlight failed after {} attempts: {err}",
                    settings.send_attempts
                );
                ScheduleOutcome::SendFailed(err.to_string())
            }
        },
    }
}
