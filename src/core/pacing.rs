/*!
 * Inter-character pacing for remotes without flow control
 */

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::transport::Transport;

/// Releases one byte per `delay`; a zero delay writes whole chunks
pub struct CharPacer {
    limiter: Option<GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    delay: Duration,
}

impl CharPacer {
    pub fn new(delay: Duration) -> Self {
        let limiter = Quota::with_period(delay).map(|quota| GovernorRateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));
        Self { limiter, delay }
    }

    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Block until the next byte may go out
    fn wait_for_slot(&self) {
        if let Some(ref limiter) = self.limiter {
            while limiter.check().is_err() {
                thread::sleep(Duration::from_micros(250));
            }
        }
    }

    /// Write `bytes`, one at a time when pacing is on. Wire content is unchanged.
    pub fn send<T: Transport + ?Sized>(&self, transport: &mut T, bytes: &[u8]) -> Result<()> {
        if self.limiter.is_none() {
            return transport.write(bytes);
        }
        for b in bytes {
            self.wait_for_slot();
            transport.write(std::slice::from_ref(b))?;
        }
        Ok(())
    }
}
