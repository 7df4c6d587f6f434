use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use docgate_core::RequestContext;
use docgate_storage::Backend;

use crate::config::RateLimitConfig;
use crate::envelope::Operation;
use crate::error::GatewayError;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-user quotas, keyed by the resolved user id.
pub struct UserRateLimiter {
    per_minute: (u32, DefaultKeyedRateLimiter<String>),
    per_day: Option<(u32, DefaultKeyedRateLimiter<String>)>,
}

impl UserRateLimiter {
    /// `None` when limiting is disabled or a quota is zero.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let per_minute = NonZeroU32::new(config.per_minute)?;
        let per_day = NonZeroU32::new(config.per_day)?;

        let daily = Quota::with_period(DAY / per_day.get())
            .map(|quota| (per_day.get(), RateLimiter::keyed(quota.allow_burst(per_day))));

        Some(Self {
            per_minute: (per_minute.get(), RateLimiter::keyed(Quota::per_minute(per_minute))),
            per_day: daily,
        })
    }

    pub fn check(&self, user_id: &str) -> Result<(), GatewayError> {
        let key = user_id.to_string();

        let (limit, minute) = &self.per_minute;
        if minute.check_key(&key).is_err() {
            return Err(GatewayError::RateLimited(format!("{limit} per 1 minute")));
        }
        if let Some((limit, day)) = &self.per_day
            && day.check_key(&key).is_err()
        {
            return Err(GatewayError::RateLimited(format!("{limit} per 1 day")));
        }
        Ok(())
    }
}

/// Runs `inner` only if the caller is within quota. A throttled call fails
/// inside the envelope, so it is recorded like any other failure.
pub struct Limited<O> {
    inner: O,
    limiter: Option<Arc<UserRateLimiter>>,
}

impl<O> Limited<O> {
    pub fn new(inner: O, limiter: Option<Arc<UserRateLimiter>>) -> Self {
        Self { inner, limiter }
    }
}

impl<B: Backend, O: Operation<B>> Operation<B> for Limited<O> {
    type Output = O::Output;
    const SUCCESS_STATUS: u16 = O::SUCCESS_STATUS;

    async fn execute(
        self,
        ctx: &mut RequestContext,
        backend: &B,
    ) -> Result<O::Output, GatewayError> {
        if let Some(limiter) = &self.limiter {
            limiter.check(&ctx.identity().user_id)?;
        }
        self.inner.execute(ctx, backend).await
    }
}
