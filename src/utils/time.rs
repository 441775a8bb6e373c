use std::time::SystemTime;

use tokio::time::Instant;

/// Maps a wall-clock timestamp onto the monotonic clock used by timers.
///
/// Past timestamps map to instants before now, so `sleep_until` on them
/// returns immediately.
pub(crate) fn instant_at(at: SystemTime) -> Instant {
    let wall_now = SystemTime::now();
    let now = Instant::now();
    match at.duration_since(wall_now) {
        Ok(ahead) => now + ahead,
        Err(e) => now.checked_sub(e.duration()).unwrap_or(now),
    }
}

/// Start of a delivery window: now when absent or already past.
pub(crate) fn start_instant(start_time: Option<SystemTime>) -> Instant {
    let now = Instant::now();
    start_time.map(instant_at).map_or(now, |start| start.max(now))
}
