//! The placement pipeline.
//!
//! Steps, in order, with strict failure semantics:
//!
//! 1. CAPTCHA admission (bounded retries inside the verifier)
//! 2. Cooldown gate via the expiring cache lock, keyed by client IP
//! 3. Cache patch -- synchronous, makes the write readable
//! 4. Durable double-write -- background
//! 5. Pub/sub publish -- background
//!
//! The response succeeds once step 3 lands. Steps 4 and 5 are queued on
//! the bounded job queue; a full queue fails the placement with 503 before
//! any of the steps run.
//!
//! The cooldown is keyed on the client IP rather than the CAPTCHA token:
//! real tokens are single-use, so a token-keyed lock would never be seen
//! twice and the cooldown would gate nothing.

use std::net::IpAddr;
use std::time::Duration;

use chrono::Utc;
use pixelboard_types::{Draw, PlacementWrite};
use tracing::info;

use crate::captcha::CaptchaVerifier;
use crate::error::ApiError;
use crate::jobs::Job;
use crate::state::AppState;
use crate::trace::RequestTrace;

/// Minimum interval between two accepted placements from one identity.
pub const DRAW_PERIOD: Duration = Duration::from_secs(60);

/// Run the full placement pipeline for one draw.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] on CAPTCHA rejection or an active
/// cooldown, [`ApiError::Overloaded`] when background capacity is
/// exhausted, and 5xx variants on infrastructure failures.
pub async fn place_tile<V: CaptchaVerifier>(
    state: &AppState<V>,
    draw: Draw,
    token: &str,
    client_ip: IpAddr,
    trace: &RequestTrace,
) -> Result<(), ApiError> {
    let ip = client_ip.to_string();

    // 1. Admission.
    state.captcha.verify(token, &ip).await?;

    // 2. Cooldown.
    let now = Utc::now();
    let period = state.cooldown;
    let expires_before = now - chrono::Duration::seconds(period.as_secs() as i64);
    let stored = state
        .cache
        .acquire_expiring_lock(&ip, now, expires_before, period)
        .await?;

    if stored >= 0 {
        let remaining = remaining_cooldown(now.timestamp(), stored, period.as_secs() as i64)
            .ok_or_else(|| {
                ApiError::Invariant(format!(
                    "cooldown lock for {ip} holds {stored} with no positive time remaining at {}",
                    now.timestamp()
                ))
            })?;
        return Err(ApiError::Unauthorized(format!(
            "{} minutes remaining until player can draw another tile",
            remaining / 60
        )));
    }

    // 3. Cache patch: from here the placement is visible to group reads.
    state.cache.write_draw(draw).await?;

    info!(x = draw.x, y = draw.y, "placed tile");

    // 4 + 5. Durable write and broadcast, off the request path.
    state.jobs.enqueue(Job::Persist {
        write: PlacementWrite {
            x: draw.x,
            y: draw.y,
            rgb: draw.rgb,
            ip: client_ip,
            placed_at: now,
        },
        trace: trace.0.clone(),
    })?;
    state.jobs.enqueue(Job::Publish {
        draw,
        trace: trace.0.clone(),
    })?;

    Ok(())
}

/// Seconds left on a cooldown lock acquired at `stored`.
///
/// Returns `None` when the lock state is contradictory: a remaining time
/// that is not positive (the lock should have been acquirable) or an
/// acquisition in the future.
fn remaining_cooldown(now: i64, stored: i64, period: i64) -> Option<i64> {
    if stored > now {
        return None;
    }
    let remaining = period - (now - stored);
    (remaining > 0).then_some(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_cooldown_counts_down() {
        assert_eq!(remaining_cooldown(100, 100, 60), Some(60));
        assert_eq!(remaining_cooldown(130, 100, 60), Some(30));
        assert_eq!(remaining_cooldown(159, 100, 60), Some(1));
    }

    #[test]
    fn remaining_cooldown_rejects_contradictory_state() {
        // Lock fully elapsed: the acquisition should have succeeded.
        assert_eq!(remaining_cooldown(160, 100, 60), None);
        assert_eq!(remaining_cooldown(500, 100, 60), None);
        // Lock acquired in the future.
        assert_eq!(remaining_cooldown(100, 101, 60), None);
    }
}
