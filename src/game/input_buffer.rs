//! Lock-free input buffer
//!
//! Uses crossbeam-channel so input threads (keyboard, pointer, AI drivers)
//! can submit commands without touching the simulation. The single owner of
//! the tick drains all pending commands at the start of each tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::util::vec2::Vec2;

/// Command from an input collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputCommand {
    /// Thrust along a direction; length is capped at 1 and scaled by effective acceleration
    Accelerate(Vec2),
    /// Steer toward a world-space point on every tick until cleared
    SteerToward(Vec2),
    /// Drop the steering target
    ClearTarget,
    SetPaused(bool),
}

/// Bounded input buffer
pub struct InputBuffer {
    /// Sender side - cloned to each input source
    sender: Sender<InputCommand>,
    /// Receiver side - used by the tick owner
    receiver: Receiver<InputCommand>,
    capacity: usize,
}

impl InputBuffer {
    /// Create a new input buffer with given capacity
    ///
    /// Capacity should cover the burst of commands between two ticks
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for an input source
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Try to submit a command (non-blocking)
    ///
    /// Returns true if successful, false if buffer is full
    #[inline]
    pub fn try_submit(&self, command: InputCommand) -> bool {
        self.sender.try_send(command).is_ok()
    }

    /// Drain all pending commands in submission order
    pub fn drain(&self) -> Vec<InputCommand> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        // A few seconds of 60 Hz pointer updates
        Self::new(256)
    }
}

/// Clonable sender handle, safe to move to other threads
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<InputCommand>,
}

impl InputSender {
    /// Submit a command (non-blocking)
    #[inline]
    pub fn try_send(&self, command: InputCommand) -> Result<(), InputBufferError> {
        self.sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => InputBufferError::Full,
            TrySendError::Disconnected(_) => InputBufferError::Disconnected,
        })
    }
}

/// Input buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    /// Buffer is full (backpressure)
    #[error("input buffer full")]
    Full,
    /// The simulation dropped its buffer
    #[error("input buffer disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_buffer_submit_and_drain() {
        let buffer = InputBuffer::new(10);

        assert!(buffer.try_submit(InputCommand::Accelerate(Vec2::new(1.0, 0.0))));
        assert!(buffer.try_submit(InputCommand::SteerToward(Vec2::new(50.0, 60.0))));
        assert!(buffer.try_submit(InputCommand::SetPaused(true)));

        assert_eq!(buffer.pending_count(), 3);

        let commands = buffer.drain();
        assert_eq!(
            commands,
            vec![
                InputCommand::Accelerate(Vec2::new(1.0, 0.0)),
                InputCommand::SteerToward(Vec2::new(50.0, 60.0)),
                InputCommand::SetPaused(true),
            ]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_input_buffer_backpressure() {
        let buffer = InputBuffer::new(2);

        assert!(buffer.try_submit(InputCommand::ClearTarget));
        assert!(buffer.try_submit(InputCommand::ClearTarget));
        assert!(!buffer.try_submit(InputCommand::ClearTarget));

        buffer.drain();
        assert!(buffer.try_submit(InputCommand::ClearTarget));
    }

    #[test]
    fn test_sender_from_another_thread() {
        let buffer = InputBuffer::new(10);
        let sender = buffer.sender();

        std::thread::spawn(move || {
            sender
                .try_send(InputCommand::SteerToward(Vec2::new(1.0, 2.0)))
                .unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(buffer.drain(), vec![InputCommand::SteerToward(Vec2::new(1.0, 2.0))]);
    }

    #[test]
    fn test_sender_reports_full() {
        let buffer = InputBuffer::new(1);
        let sender = buffer.sender();

        assert!(sender.try_send(InputCommand::ClearTarget).is_ok());
        assert_eq!(
            sender.try_send(InputCommand::ClearTarget),
            Err(InputBufferError::Full)
        );
    }

    #[test]
    fn test_sender_reports_disconnect() {
        let buffer = InputBuffer::new(4);
        let sender = buffer.sender();
        drop(buffer);

        assert_eq!(
            sender.try_send(InputCommand::ClearTarget),
            Err(InputBufferError::Disconnected)
        );
    }

    #[test]
    fn test_input_buffer_default() {
        assert_eq!(InputBuffer::default().capacity(), 256);
    }
}
