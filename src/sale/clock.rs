use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::entity::{Countdown, SalePhase, SaleWindow};

/// Current wall-clock time as Unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Phase is a pure function of `(now, window)`
pub fn phase_at(now: u64, window: &SaleWindow) -> SalePhase {
    if !window.is_valid() {
        return SalePhase::Unknown;
    }
    if now < window.start {
        SalePhase::Pre
    } else if now <= window.end {
        SalePhase::Live
    } else {
        SalePhase::Ended
    }
}

/// One countdown sample. Recomputed from the wall clock on every tick, so
/// a slow or paused tick never accumulates drift.
pub fn countdown_at(now: u64, window: &SaleWindow) -> Countdown {
    let phase = phase_at(now, window);
    let target = match phase {
        SalePhase::Pre => window.start,
        _ => window.end,
    };

    let left = target.saturating_sub(now);
    let progress_pct = match phase {
        SalePhase::Pre | SalePhase::Unknown => 0,
        SalePhase::Ended => 100,
        SalePhase::Live => {
            let total = window.total_seconds();
            if total == 0 {
                100
            } else {
                ((now - window.start) * 100 / total) as u8
            }
        }
    };

    Countdown {
        phase,
        target,
        days: left / 86_400,
        hours: (left % 86_400) / 3_600,
        minutes: (left % 3_600) / 60,
        seconds: left % 60,
        progress_pct,
    }
}

enum ClockState {
    Uninitialized,
    Armed(SaleWindow),
    Stopped,
}

/// Drives a one-second countdown tick for the armed sale window. `arm` may
/// be called after every refresh: each call replaces the previous timer, so
/// duplicate concurrent tickers cannot exist.
pub struct SaleClock {
    state: ClockState,
    task: Option<JoinHandle<()>>,
    tx: watch::Sender<Option<Countdown>>,
}

impl SaleClock {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            state: ClockState::Uninitialized,
            task: None,
            tx,
        }
    }

    /// Latest countdown sample, updated once per second while armed
    pub fn subscribe(&self) -> watch::Receiver<Option<Countdown>> {
        self.tx.subscribe()
    }

    /// The window currently driving the tick, if armed
    pub fn window(&self) -> Option<SaleWindow> {
        match self.state {
            ClockState::Armed(window) => Some(window),
            _ => None,
        }
    }

    /// Cancel any existing tick and start a fresh one for `window`
    pub fn arm(&mut self, window: SaleWindow) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let _ = tx.send(Some(countdown_at(unix_now(), &window)));
            }
        }));
        self.state = ClockState::Armed(window);
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state = ClockState::Stopped;
    }
}

impl Default for SaleClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SaleClock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: SaleWindow = SaleWindow {
        start: 1000,
        end: 2000,
    };

    #[test]
    fn phase_is_pure_in_now_and_window() {
        assert_eq!(phase_at(500, &WINDOW), SalePhase::Pre);
        assert_eq!(phase_at(1500, &WINDOW), SalePhase::Live);
        assert_eq!(phase_at(2500, &WINDOW), SalePhase::Ended);
        // boundaries are inclusive
        assert_eq!(phase_at(1000, &WINDOW), SalePhase::Live);
        assert_eq!(phase_at(2000, &WINDOW), SalePhase::Live);
    }

    #[test]
    fn zero_window_is_unknown_not_defaulted() {
        let empty = SaleWindow { start: 0, end: 0 };
        assert_eq!(phase_at(1500, &empty), SalePhase::Unknown);
    }

    #[test]
    fn countdown_targets_start_before_the_sale() {
        let cd = countdown_at(500, &WINDOW);
        assert_eq!(cd.phase, SalePhase::Pre);
        assert_eq!(cd.target, WINDOW.start);
        assert_eq!(cd.progress_pct, 0);
        assert_eq!(cd.seconds, 20);
        assert_eq!(cd.minutes, 8);
    }

    #[test]
    fn countdown_decomposes_remaining_time() {
        let window = SaleWindow {
            start: 1,
            end: 1 + 2 * 86_400 + 3 * 3_600 + 4 * 60 + 5,
        };
        let cd = countdown_at(1, &window);
        assert_eq!(cd.phase, SalePhase::Live);
        assert_eq!(cd.days, 2);
        assert_eq!(cd.hours, 3);
        assert_eq!(cd.minutes, 4);
        assert_eq!(cd.seconds, 5);
    }

    #[test]
    fn progress_tracks_elapsed_share() {
        assert_eq!(countdown_at(1500, &WINDOW).progress_pct, 50);
        assert_eq!(countdown_at(2500, &WINDOW).progress_pct, 100);
    }

    #[tokio::test]
    async fn rearming_replaces_the_previous_timer() {
        let mut clock = SaleClock::new();
        clock.arm(WINDOW);

        clock.arm(SaleWindow {
            start: 3000,
            end: 4000,
        });

        // exactly one ticker task survives a re-arm
        assert!(clock.task.is_some());
        assert_eq!(
            clock.window(),
            Some(SaleWindow {
                start: 3000,
                end: 4000
            })
        );
        clock.stop();
        assert!(clock.window().is_none());
    }
}
