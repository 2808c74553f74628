//! Animation-frame requests: set-only scheduling.

use crate::adapters::registry::{HostRegistry, ANIMATION_FRAME_VARIANTS};
use crate::interception::{Callback, Scheduler, TimerHandle};
use std::sync::Arc;
use std::time::Duration;

/// The first animation-frame entry point the host provides, standard name
/// before vendor-prefixed ones.
#[derive(Clone)]
pub struct AnimationFrames {
    name: &'static str,
    scheduler: Arc<dyn Scheduler>,
}

impl AnimationFrames {
    pub fn from_registry(registry: &HostRegistry) -> Option<Self> {
        ANIMATION_FRAME_VARIANTS.iter().find_map(|&name| {
            registry
                .scheduler(name)
                .map(|scheduler| Self { name, scheduler })
        })
    }

    /// Which variant was picked.
    pub fn entry_point(&self) -> &'static str {
        self.name
    }

    pub fn request(
        &self,
        callback: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> TimerHandle {
        self.scheduler.set(Box::new(callback) as Callback, Duration::ZERO)
    }

    pub fn cancel(&self, handle: TimerHandle) {
        self.scheduler.clear(handle);
    }
}
