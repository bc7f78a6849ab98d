//! # Cooperative Driver
//!
//! Minimal host loop for one processor instance:
//!
//! - offers each item until `try_process` takes it, yielding between refusals
//! - calls `complete` until it reports done, draining the outbox after each call

use crate::adapters::outbox::BoundedOutbox;
use crate::domain::errors::ProcessorResult;
use crate::ports::processor::BoxedProcessor;
use tracing::debug;

/// Counters of one driven processor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub items: u64,
    /// `try_process` calls that returned false.
    pub retries: u64,
    pub complete_calls: u64,
}

/// Drives a processor to completion on the current thread.
pub struct CooperativeDriver<I, O> {
    processor: BoxedProcessor<I, O>,
    outbox: BoundedOutbox<O>,
    stats: DriverStats,
}

impl<I, O> CooperativeDriver<I, O> {
    pub fn new(processor: BoxedProcessor<I, O>, outbox_capacity: usize) -> Self {
        Self {
            processor,
            outbox: BoundedOutbox::new(outbox_capacity),
            stats: DriverStats::default(),
        }
    }

    /// Offer `item` until the processor takes it.
    pub fn feed(&mut self, ordinal: usize, item: &I) -> ProcessorResult<()> {
        while !self.processor.try_process(ordinal, item)? {
            self.stats.retries += 1;
            std::thread::yield_now();
        }
        self.stats.items += 1;
        Ok(())
    }

    pub fn feed_all(&mut self, items: impl IntoIterator<Item = (usize, I)>) -> ProcessorResult<()> {
        for (ordinal, item) in items {
            self.feed(ordinal, &item)?;
        }
        Ok(())
    }

    /// Call `complete` until done and collect everything emitted.
    pub fn finish(&mut self) -> ProcessorResult<Vec<O>> {
        let mut output = Vec::new();
        loop {
            self.stats.complete_calls += 1;
            let done = self.processor.complete(&mut self.outbox)?;
            output.extend(self.outbox.drain());
            if done {
                break;
            }
        }

        debug!(
            items = self.stats.items,
            retries = self.stats.retries,
            complete_calls = self.stats.complete_calls,
            emitted = output.len(),
            "[sw-02] Driver finished"
        );
        Ok(output)
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }
}

/// Feed `items` to `processor`, complete it and return its output.
pub fn run_to_completion<I, O>(
    processor: BoxedProcessor<I, O>,
    outbox_capacity: usize,
    items: impl IntoIterator<Item = (usize, I)>,
) -> ProcessorResult<Vec<O>> {
    let mut driver = CooperativeDriver::new(processor, outbox_capacity);
    driver.feed_all(items)?;
    driver.finish()
}
