use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Polling-window policy. Ticks are allowed only in a ±10-minute band around
/// each full hour, between 09:00 and 00:10 business-local time. The merchant
/// publishes promo posts on the hour; anything between bands is dead air.
///
/// The gate can be disabled (always open) via configuration.
#[derive(Debug, Clone)]
pub struct PollWindow {
    enabled: bool,
    tz: Tz,
}

impl PollWindow {
    pub fn new(enabled: bool, tz: Tz) -> Self {
        Self { enabled, tz }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current business-local time.
    pub fn local_now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    /// Evaluate the window at a given instant. Local hours 1 through 8 are
    /// always closed; otherwise open when the minute is >= 50 or <= 10.
    pub fn is_open_at<T: TimeZone>(&self, now: DateTime<T>) -> bool {
        if !self.enabled {
            return true;
        }

        let local = now.with_timezone(&self.tz);
        if (1..9).contains(&local.hour()) {
            return false;
        }

        let minute = local.minute();
        minute >= 50 || minute <= 10
    }
}
