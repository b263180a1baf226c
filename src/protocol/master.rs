//! Bus master side of the coordination protocol.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};

use crate::config::{BusConfig, PollPolicy, RetryPolicy};
use crate::error::{BusError, Error, ProtocolError, Result};

use super::frame::{Command, Status};
use super::role::CoordinationFlags;

/// Bus master: sends commands to the stage boards and waits for them.
///
/// Every transfer is retried per the [`RetryPolicy`]. Waiting for a stage is
/// bounded by the [`PollPolicy`].
pub struct BusMaster<I2C, D> {
    i2c: I2C,
    delay: D,
    retry: RetryPolicy,
    poll: PollPolicy,
}

impl<I2C, D> BusMaster<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a bus master.
    pub fn new(i2c: I2C, delay: D, retry: RetryPolicy, poll: PollPolicy) -> Self {
        Self {
            i2c,
            delay,
            retry,
            poll,
        }
    }

    /// Create a bus master using the policies in `config`.
    pub fn from_config(i2c: I2C, delay: D, config: &BusConfig) -> Self {
        Self::new(i2c, delay, config.retry, config.poll)
    }

    /// Poll bound in use.
    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Borrow the delay provider.
    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Give back the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Write a command frame.
    pub fn send(&mut self, address: u8, command: &Command) -> Result<()> {
        let frame = command.encode();
        self.with_retry(address, |i2c| i2c.write(address, frame.as_bytes()))?;
        trace!("sent {} to {:#x}", command, address);
        Ok(())
    }

    /// Read the one-byte status of `address`.
    pub fn read_status(&mut self, address: u8) -> Result<Status> {
        let mut buf = [0u8; 1];
        self.with_retry(address, |i2c| i2c.read(address, &mut buf))?;
        Status::from_byte(address, buf[0]).map_err(|e| {
            warn!("unexpected status {} from {:#x}", buf[0], address);
            Error::Protocol(e)
        })
    }

    /// Send a command and read back the status it produced.
    pub fn exchange(&mut self, address: u8, command: &Command) -> Result<Status> {
        self.send(address, command)?;
        self.read_status(address)
    }

    /// Send status requests until `address` reports in position.
    ///
    /// Returns the number of polls it took.
    ///
    /// # Errors
    ///
    /// `Timeout` when the poll bound is exhausted, bus errors after retries,
    /// and `UnexpectedStatus` for any status byte other than 0 or 1.
    pub fn poll_until_in_position(&mut self, address: u8) -> Result<u32> {
        let request = Command::StatusRequest;
        for poll in 1..=self.poll.max_polls {
            self.delay.delay_ms(self.poll.interval_ms);
            if self.exchange(address, &request)? == Status::InPosition {
                return Ok(poll);
            }
        }
        error!("{:#x} not in position after {} polls", address, self.poll.max_polls);
        Err(ProtocolError::Timeout {
            address,
            polls: self.poll.max_polls,
        }
        .into())
    }

    /// Send a position command and block until the stage reports in
    /// position. Returns the number of status polls needed after the
    /// command's own reply.
    pub fn command_and_wait(&mut self, address: u8, command: &Command) -> Result<u32> {
        match self.exchange(address, command)? {
            Status::InPosition => Ok(0),
            Status::NotInPosition => self.poll_until_in_position(address),
        }
    }

    /// Hand bus mastership to `address`.
    ///
    /// Local mastership and any pending start request are dropped before the
    /// handover frame goes out, so two boards never hold mastership at once.
    /// If the frame cannot be delivered the board stays a slave.
    pub fn hand_over(&mut self, flags: &CoordinationFlags, address: u8) -> Result<()> {
        flags.release_mastership();
        flags.clear_start();
        self.send(address, &Command::Handover)?;
        info!("mastership handed to {:#x}", address);
        Ok(())
    }

    fn with_retry<T>(
        &mut self,
        address: u8,
        mut op: impl FnMut(&mut I2C) -> core::result::Result<T, I2C::Error>,
    ) -> core::result::Result<T, BusError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op(&mut self.i2c) {
                Ok(value) => return Ok(value),
                Err(e) if attempts >= self.retry.max_attempts => {
                    error!("transfer to {:#x} failed after {} attempts", address, attempts);
                    return Err(BusError {
                        address,
                        kind: e.kind(),
                        attempts,
                    });
                }
                Err(_) => {
                    warn!("transfer to {:#x} failed, attempt {}", address, attempts);
                    self.delay.delay_ms(self.retry.backoff_ms);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::Point;
    use crate::config::Role;
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    const XY: u8 = 0x20;

    fn master(expectations: &[Transaction]) -> BusMaster<I2cMock, NoopDelay> {
        BusMaster::new(
            I2cMock::new(expectations),
            NoopDelay::new(),
            RetryPolicy { max_attempts: 3, backoff_ms: 1 },
            PollPolicy { max_polls: 3, interval_ms: 1 },
        )
    }

    fn done(master: BusMaster<I2cMock, NoopDelay>) {
        let (mut i2c, _) = master.release();
        i2c.done();
    }

    #[test]
    fn test_command_then_poll() {
        let frame = Command::MoveXy(Point::new(100, 200)).encode();
        let mut m = master(&[
            Transaction::write(XY, frame.as_bytes().to_vec()),
            Transaction::read(XY, vec![0]),
            Transaction::write(XY, vec![0x04]),
            Transaction::read(XY, vec![0]),
            Transaction::write(XY, vec![0x04]),
            Transaction::read(XY, vec![1]),
        ]);

        let polls = m
            .command_and_wait(XY, &Command::MoveXy(Point::new(100, 200)))
            .unwrap();
        assert_eq!(polls, 2);
        done(m);
    }

    #[test]
    fn test_immediate_in_position() {
        let mut m = master(&[
            Transaction::write(XY, vec![0x02, 5, 0, 0, 0]),
            Transaction::read(XY, vec![1]),
        ]);
        assert_eq!(m.command_and_wait(XY, &Command::MoveZ(5)).unwrap(), 0);
        done(m);
    }

    #[test]
    fn test_transient_nack_is_retried() {
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let mut m = master(&[
            Transaction::write(XY, vec![0x04]).with_error(nack),
            Transaction::write(XY, vec![0x04]),
            Transaction::read(XY, vec![1]),
        ]);
        assert_eq!(m.exchange(XY, &Command::StatusRequest).unwrap(), Status::InPosition);
        done(m);
    }

    #[test]
    fn test_retries_exhausted() {
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let mut m = master(&[
            Transaction::write(XY, vec![0x04]).with_error(nack),
            Transaction::write(XY, vec![0x04]).with_error(nack),
            Transaction::write(XY, vec![0x04]).with_error(nack),
        ]);
        let err = m.send(XY, &Command::StatusRequest).unwrap_err();
        assert_eq!(
            err,
            Error::Bus(BusError { address: XY, kind: nack, attempts: 3 })
        );
        done(m);
    }

    #[test]
    fn test_unexpected_status() {
        let mut m = master(&[
            Transaction::write(XY, vec![0x04]),
            Transaction::read(XY, vec![9]),
        ]);
        assert_eq!(
            m.exchange(XY, &Command::StatusRequest),
            Err(Error::Protocol(ProtocolError::UnexpectedStatus { address: XY, status: 9 }))
        );
        done(m);
    }

    #[test]
    fn test_poll_timeout() {
        let mut m = master(&[
            Transaction::write(XY, vec![0x04]),
            Transaction::read(XY, vec![0]),
            Transaction::write(XY, vec![0x04]),
            Transaction::read(XY, vec![0]),
            Transaction::write(XY, vec![0x04]),
            Transaction::read(XY, vec![0]),
        ]);
        assert_eq!(
            m.poll_until_in_position(XY),
            Err(Error::Protocol(ProtocolError::Timeout { address: XY, polls: 3 }))
        );
        done(m);
    }

    #[test]
    fn test_hand_over_releases_first() {
        let flags = CoordinationFlags::new(Role::Master);
        flags.request_start();
        let mut m = master(&[Transaction::write(0x11, vec![0x03])]);
        m.hand_over(&flags, 0x11).unwrap();
        assert!(!flags.is_master());
        assert!(!flags.start_pending());
        done(m);
    }

    #[test]
    fn test_failed_hand_over_leaves_no_master() {
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let flags = CoordinationFlags::new(Role::Master);
        let mut m = master(&[
            Transaction::write(0x11, vec![0x03]).with_error(nack),
            Transaction::write(0x11, vec![0x03]).with_error(nack),
            Transaction::write(0x11, vec![0x03]).with_error(nack),
        ]);
        assert!(matches!(m.hand_over(&flags, 0x11), Err(Error::Bus(_))));
        assert!(!flags.is_master());
        done(m);
    }
}
