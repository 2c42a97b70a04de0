//! Ownership session state — request counter and the two timers.
//!
//! All methods are pure state transitions with no I/O. Time is passed
//! in by the caller so every transition can be exercised with
//! synthetic instants.

use std::time::{Duration, Instant};

/// Give up ownership if nobody has pasted after this long.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(600);

/// After the first delivery, how long to wait for a second one.
pub const GRACE_PERIOD: Duration = Duration::from_millis(10);

/// Number of content deliveries after which the session ends.
pub const MAX_DELIVERIES: u32 = 2;

/// Timer settings for one ownership session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Absolute deadline, measured from the confirmed claim.
    pub session: Duration,
    /// Grace window, measured from the first content delivery.
    pub grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            session: SESSION_TIMEOUT,
            grace: GRACE_PERIOD,
        }
    }
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// Another client took the selection.
    OwnershipLost,
    /// The absolute deadline passed.
    SessionExpired,
    /// The second content request was answered.
    SecondDelivery,
    /// No second request arrived within the grace window.
    GraceExpired,
}

impl std::fmt::Display for DoneReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DoneReason::OwnershipLost => "ownership_lost",
            DoneReason::SessionExpired => "session_expired",
            DoneReason::SecondDelivery => "second_delivery",
            DoneReason::GraceExpired => "grace_expired",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Owning,
    Done(DoneReason),
}

/// State of a confirmed ownership session.
///
/// Only constructed once the claim has been confirmed, so a `Session`
/// always starts in [`Phase::Owning`]. [`Phase::Done`] is terminal.
#[derive(Debug)]
pub struct Session {
    timeouts: Timeouts,
    started_at: Instant,
    /// Content-delivering requests answered so far.
    deliveries: u32,
    first_delivery_at: Option<Instant>,
    phase: Phase,
}

impl Session {
    pub fn start(timeouts: Timeouts, now: Instant) -> Self {
        Self {
            timeouts,
            started_at: now,
            deliveries: 0,
            first_delivery_at: None,
            phase: Phase::Owning,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deliveries(&self) -> u32 {
        self.deliveries
    }

    /// Enter [`Phase::Done`]. The first reason recorded is kept.
    pub fn finish(&mut self, reason: DoneReason) {
        if self.phase == Phase::Owning {
            self.phase = Phase::Done(reason);
        }
    }

    /// End the session if the absolute deadline has passed.
    ///
    /// Returns `true` if the session is (now) done for this reason.
    pub fn expire_if_overdue(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.started_at) >= self.timeouts.session {
            self.finish(DoneReason::SessionExpired);
            return true;
        }
        false
    }

    /// Count one answered content request.
    ///
    /// The first starts the grace window; the second ends the session.
    pub fn record_delivery(&mut self, now: Instant) {
        self.deliveries += 1;
        if self.deliveries == 1 {
            self.first_delivery_at = Some(now);
        } else if self.deliveries >= MAX_DELIVERIES {
            self.finish(DoneReason::SecondDelivery);
        }
    }

    /// End the session if exactly one delivery happened and the grace
    /// window since it has run out.
    pub fn expire_grace_if_elapsed(&mut self, now: Instant) {
        if self.deliveries != 1 {
            return;
        }
        if let Some(first) = self.first_delivery_at
            && now.saturating_duration_since(first) >= self.timeouts.grace
        {
            self.finish(DoneReason::GraceExpired);
        }
    }

    /// How long the driver may block before a timer needs evaluating.
    pub fn next_wake(&self, now: Instant) -> Duration {
        let session_left = (self.started_at + self.timeouts.session).saturating_duration_since(now);
        match (self.deliveries, self.first_delivery_at) {
            (1, Some(first)) => {
                let grace_left = (first + self.timeouts.grace).saturating_duration_since(now);
                session_left.min(grace_left)
            }
            _ => session_left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts() -> Timeouts {
        Timeouts::default()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn default_timeouts_match_constants() {
        let t = Timeouts::default();
        assert_eq!(t.session, Duration::from_secs(600));
        assert_eq!(t.grace, Duration::from_millis(10));
    }

    #[test]
    fn new_session_is_owning() {
        let s = Session::start(timeouts(), Instant::now());
        assert_eq!(s.phase(), Phase::Owning);
        assert_eq!(s.deliveries(), 0);
    }

    // -- Absolute deadline --

    #[test]
    fn deadline_not_reached() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        assert!(!s.expire_if_overdue(t0 + Duration::from_secs(599)));
        assert_eq!(s.phase(), Phase::Owning);
    }

    #[test]
    fn deadline_reached_exactly() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        assert!(s.expire_if_overdue(t0 + SESSION_TIMEOUT));
        assert_eq!(s.phase(), Phase::Done(DoneReason::SessionExpired));
    }

    // -- Deliveries --

    #[test]
    fn first_delivery_starts_grace() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        s.record_delivery(t0 + ms(1));
        assert_eq!(s.deliveries(), 1);
        assert_eq!(s.first_delivery_at, Some(t0 + ms(1)));
        assert_eq!(s.phase(), Phase::Owning);
    }

    #[test]
    fn second_delivery_finishes() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        s.record_delivery(t0);
        s.record_delivery(t0 + ms(2));
        assert_eq!(s.phase(), Phase::Done(DoneReason::SecondDelivery));
    }

    // -- Grace window --

    #[test]
    fn grace_without_delivery_is_noop() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        s.expire_grace_if_elapsed(t0 + Duration::from_secs(60));
        assert_eq!(s.phase(), Phase::Owning);
    }

    #[test]
    fn grace_still_open() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        s.record_delivery(t0);
        s.expire_grace_if_elapsed(t0 + ms(9));
        assert_eq!(s.phase(), Phase::Owning);
    }

    #[test]
    fn grace_elapsed_exactly() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        s.record_delivery(t0);
        s.expire_grace_if_elapsed(t0 + GRACE_PERIOD);
        assert_eq!(s.phase(), Phase::Done(DoneReason::GraceExpired));
    }

    // -- Terminal phase --

    #[test]
    fn first_reason_wins() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        s.finish(DoneReason::OwnershipLost);
        s.expire_if_overdue(t0 + SESSION_TIMEOUT);
        assert_eq!(s.phase(), Phase::Done(DoneReason::OwnershipLost));
    }

    // -- Wake scheduling --

    #[test]
    fn next_wake_tracks_session_deadline() {
        let t0 = Instant::now();
        let s = Session::start(timeouts(), t0);
        assert_eq!(s.next_wake(t0 + Duration::from_secs(100)), Duration::from_secs(500));
    }

    #[test]
    fn next_wake_tracks_grace_after_first_delivery() {
        let t0 = Instant::now();
        let mut s = Session::start(timeouts(), t0);
        s.record_delivery(t0);
        assert_eq!(s.next_wake(t0 + ms(4)), ms(6));
    }

    #[test]
    fn next_wake_is_zero_when_overdue() {
        let t0 = Instant::now();
        let s = Session::start(timeouts(), t0);
        assert_eq!(s.next_wake(t0 + Duration::from_secs(700)), Duration::ZERO);
    }

    #[test]
    fn next_wake_never_exceeds_session_deadline() {
        let t0 = Instant::now();
        let short = Timeouts {
            session: ms(5),
            grace: ms(10),
        };
        let mut s = Session::start(short, t0);
        s.record_delivery(t0);
        assert_eq!(s.next_wake(t0), ms(5));
    }
}
