use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use tracing::{debug, warn};

use andio_domain::LedCommand;

/// Receives LED commands from the engine. Delivery is fire-and-forget: the
/// engine never learns whether a command reached the hardware.
pub trait LedDriver: Send {
    fn send(&mut self, command: LedCommand);
}

impl LedDriver for Vec<LedCommand> {
    fn send(&mut self, command: LedCommand) {
        self.push(command);
    }
}

#[derive(Debug, Default)]
pub struct TracingLedDriver;

impl LedDriver for TracingLedDriver {
    fn send(&mut self, command: LedCommand) {
        debug!(pitch = command.pitch, state = command.signal.code(), "led command");
    }
}

/// Pushes commands into a bounded ring buffer drained by a hardware bridge.
pub struct QueueLedDriver {
    producer: HeapProducer<LedCommand>,
    dropped: u64,
}

pub struct LedCommandQueue {
    consumer: HeapConsumer<LedCommand>,
}

impl QueueLedDriver {
    pub fn with_capacity(capacity: usize) -> (Self, LedCommandQueue) {
        let (producer, consumer) = HeapRb::<LedCommand>::new(capacity.max(1)).split();
        (
            Self {
                producer,
                dropped: 0,
            },
            LedCommandQueue { consumer },
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl LedDriver for QueueLedDriver {
    fn send(&mut self, command: LedCommand) {
        if self.producer.push(command).is_err() {
            self.dropped += 1;
            warn!(%command, dropped = self.dropped, "led queue full, dropping command");
        }
    }
}

impl LedCommandQueue {
    pub fn pop(&mut self) -> Option<LedCommand> {
        self.consumer.pop()
    }

    pub fn drain(&mut self) -> Vec<LedCommand> {
        let mut commands = Vec::with_capacity(self.consumer.len());
        while let Some(command) = self.consumer.pop() {
            commands.push(command);
        }
        commands
    }

    /// Hands every queued command to `driver`, returning how many were moved.
    pub fn forward_to<D: LedDriver + ?Sized>(&mut self, driver: &mut D) -> usize {
        let mut forwarded = 0;
        while let Some(command) = self.consumer.pop() {
            driver.send(command);
            forwarded += 1;
        }
        forwarded
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use andio_domain::LedSignal;

    #[test]
    fn queue_delivers_in_order() {
        let (mut driver, mut queue) = QueueLedDriver::with_capacity(4);
        driver.send(LedCommand::new(60, LedSignal::Due));
        driver.send(LedCommand::new(60, LedSignal::Correct));
        assert_eq!(queue.pop(), Some(LedCommand::new(60, LedSignal::Due)));
        assert_eq!(queue.drain(), vec![LedCommand::new(60, LedSignal::Correct)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (mut driver, mut queue) = QueueLedDriver::with_capacity(1);
        driver.send(LedCommand::new(60, LedSignal::Due));
        driver.send(LedCommand::new(62, LedSignal::Due));
        assert_eq!(driver.dropped(), 1);
        assert_eq!(queue.drain(), vec![LedCommand::new(60, LedSignal::Due)]);
    }

    #[test]
    fn forward_moves_queue_into_driver() {
        let (mut driver, mut queue) = QueueLedDriver::with_capacity(8);
        driver.send(LedCommand::new(60, LedSignal::Due));
        driver.send(LedCommand::new(60, LedSignal::Off));
        let mut sink: Vec<LedCommand> = Vec::new();
        assert_eq!(queue.forward_to(&mut sink), 2);
        assert_eq!(sink[1], LedCommand::new(60, LedSignal::Off));
        assert_eq!(queue.forward_to(&mut sink), 0);
    }

    #[test]
    fn vec_records_commands() {
        let mut sent: Vec<LedCommand> = Vec::new();
        sent.send(LedCommand::new(61, LedSignal::Wrong));
        assert_eq!(sent.len(), 1);
    }
}
