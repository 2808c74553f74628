//! Timer families: timeout, interval and immediate.

use crate::adapters::registry::{HostRegistry, IMMEDIATE, INTERVAL, TIMEOUT};
use crate::error::EngineError;
use crate::interception::{Callback, Scheduler, TimerHandle};
use std::sync::Arc;
use std::time::Duration;

/// The timer entry points as the application sees them after installation.
///
/// Families the host does not provide report
/// [`EngineError::InvalidEntryPoint`] instead of silently doing nothing.
#[derive(Clone, Default)]
pub struct Timers {
    timeout: Option<Arc<dyn Scheduler>>,
    interval: Option<Arc<dyn Scheduler>>,
    immediate: Option<Arc<dyn Scheduler>>,
}

impl Timers {
    pub fn from_registry(registry: &HostRegistry) -> Self {
        Self {
            timeout: registry.scheduler(TIMEOUT),
            interval: registry.scheduler(INTERVAL),
            immediate: registry.scheduler(IMMEDIATE),
        }
    }

    pub fn set_timeout(
        &self,
        callback: impl FnMut() -> anyhow::Result<()> + Send + 'static,
        delay: Duration,
    ) -> Result<TimerHandle, EngineError> {
        Ok(family(&self.timeout, TIMEOUT)?.set(Box::new(callback) as Callback, delay))
    }

    pub fn clear_timeout(&self, handle: TimerHandle) -> Result<(), EngineError> {
        family(&self.timeout, TIMEOUT)?.clear(handle);
        Ok(())
    }

    pub fn set_interval(
        &self,
        callback: impl FnMut() -> anyhow::Result<()> + Send + 'static,
        period: Duration,
    ) -> Result<TimerHandle, EngineError> {
        Ok(family(&self.interval, INTERVAL)?.set(Box::new(callback) as Callback, period))
    }

    pub fn clear_interval(&self, handle: TimerHandle) -> Result<(), EngineError> {
        family(&self.interval, INTERVAL)?.clear(handle);
        Ok(())
    }

    pub fn set_immediate(
        &self,
        callback: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> Result<TimerHandle, EngineError> {
        Ok(family(&self.immediate, IMMEDIATE)?.set(Box::new(callback) as Callback, Duration::ZERO))
    }

    pub fn clear_immediate(&self, handle: TimerHandle) -> Result<(), EngineError> {
        family(&self.immediate, IMMEDIATE)?.clear(handle);
        Ok(())
    }
}

fn family<'a>(
    scheduler: &'a Option<Arc<dyn Scheduler>>,
    name: &str,
) -> Result<&'a Arc<dyn Scheduler>, EngineError> {
    scheduler
        .as_ref()
        .ok_or_else(|| EngineError::InvalidEntryPoint(name.to_string()))
}
