//! The timer and I/O readiness reactor built on `poll(2)`.

use std::cmp;
use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

use libc::c_int;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use thiserror::Error;

/// The queue wildcard accepted by `cancel`.
pub const QUEUE_ANY: u32 = 0;

/// The reactor error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A negative descriptor was passed to `register_io`.
    #[error("invalid I/O handle {0}")]
    InvalidHandle(RawFd),
}

/// A single readiness or timer wake delivered to the dispatch callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake<E> {
    /// A timer deadline has passed.
    Timer { event: E, owner: u64 },
    /// The descriptor is readable, or reported an error or hangup.
    Readable { fd: RawFd, event: E },
    /// The descriptor is writable, or reported an error or hangup.
    Writable { fd: RawFd, event: E },
}

struct TimerEntry<E> {
    deadline: Instant,
    seq: u64,
    queue: u32,
    event: E,
    owner: u64,
}

struct IoEntry<E> {
    fd: RawFd,
    readable: Option<E>,
    writable: Option<E>,
}

/// The single threaded reactor driving every protocol engine.
///
/// Timers fire ordered by deadline, ties broken by scheduling order.
/// Exactly one wake is dispatched per callback invocation, so a callback
/// may reschedule or cancel any timer and registration, including its own.
pub struct EventLoop<E> {
    timers: Vec<TimerEntry<E>>,
    io: Vec<IoEntry<E>>,
    next_seq: u64,
    exit_code: Option<i32>,
}

impl<E> EventLoop<E>
where
    E: Copy + Eq,
{
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            io: Vec::new(),
            next_seq: 0,
            exit_code: None,
        }
    }

    /// Registers `fd` for readiness waking. A `Some` token overrides the
    /// previous registration of the same direction, a `None` leaves it
    /// untouched.
    ///
    /// # Errors
    /// `Error::InvalidHandle` if `fd` is negative.
    pub fn register_io(
        &mut self,
        fd: RawFd,
        readable: Option<E>,
        writable: Option<E>,
    ) -> Result<(), Error> {
        if fd < 0 {
            return Err(Error::InvalidHandle(fd));
        }
        if let Some(entry) = self.io.iter_mut().find(|entry| entry.fd == fd) {
            if readable.is_some() {
                entry.readable = readable;
            }
            if writable.is_some() {
                entry.writable = writable;
            }
            return Ok(());
        }
        self.io.push(IoEntry {
            fd,
            readable,
            writable,
        });
        Ok(())
    }

    /// Drops the registration of `fd`. With `write_only` set, only the write
    /// token is removed and reading stays registered.
    pub fn unregister_io(&mut self, fd: RawFd, write_only: bool) {
        if write_only {
            if let Some(entry) = self.io.iter_mut().find(|entry| entry.fd == fd) {
                entry.writable = None;
                if entry.readable.is_some() {
                    return;
                }
            }
        }
        self.io.retain(|entry| entry.fd != fd);
    }

    /// Schedules `event` for `owner` on `queue` after `delay`, replacing any
    /// pending timer with the same event and owner regardless of its queue.
    pub fn schedule(&mut self, delay: Duration, queue: u32, event: E, owner: u64) {
        self.timers
            .retain(|entry| !(entry.event == event && entry.owner == owner));
        let entry = TimerEntry {
            deadline: Instant::now() + delay,
            seq: self.next_seq,
            queue,
            event,
            owner,
        };
        self.next_seq += 1;
        let position = self
            .timers
            .iter()
            .position(|other| (other.deadline, other.seq) > (entry.deadline, entry.seq))
            .unwrap_or(self.timers.len());
        self.timers.insert(position, entry);
    }

    /// Cancels the pending timers of `owner`: all of them when `queue` is
    /// [`QUEUE_ANY`] and `event` is `None`, otherwise only those matching
    /// the given queue and event.
    pub fn cancel(&mut self, queue: u32, event: Option<E>, owner: u64) {
        self.timers.retain(|entry| {
            if entry.owner != owner {
                return true;
            }
            if queue != QUEUE_ANY && entry.queue != queue {
                return true;
            }
            if let Some(event) = event {
                if entry.event != event {
                    return true;
                }
            }
            false
        });
    }

    /// Returns the time left until the pending `(event, owner)` timer fires.
    pub fn timeout_left(&self, event: E, owner: u64) -> Option<Duration> {
        self.timers
            .iter()
            .find(|entry| entry.event == event && entry.owner == owner)
            .map(|entry| entry.deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Makes `run` return `code` before the next wake is dispatched.
    pub fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    /// Runs the reactor until `exit` is called or nothing remains scheduled
    /// or registered. Returns the exit code, or `0` once the loop is empty.
    ///
    /// # Errors
    /// `io::Error` if `poll(2)` fails with anything but `EINTR`.
    pub fn run<F>(&mut self, mut dispatch: F) -> io::Result<i32>
    where
        F: FnMut(&mut EventLoop<E>, Wake<E>),
    {
        loop {
            if let Some(code) = self.exit_code.take() {
                return Ok(code);
            }
            if self.timers.is_empty() && self.io.is_empty() {
                return Ok(0);
            }

            let now = Instant::now();
            if let Some(first) = self.timers.first() {
                if first.deadline <= now {
                    let entry = self.timers.remove(0);
                    dispatch(
                        self,
                        Wake::Timer {
                            event: entry.event,
                            owner: entry.owner,
                        },
                    );
                    continue;
                }
            }

            let timeout = self.poll_timeout(now);
            let mut fds = Vec::with_capacity(self.io.len());
            for entry in &self.io {
                let mut interest = PollFlags::empty();
                if entry.readable.is_some() {
                    interest |= PollFlags::POLLIN;
                }
                if entry.writable.is_some() {
                    interest |= PollFlags::POLLOUT;
                }
                fds.push(PollFd::new(entry.fd, interest));
            }

            match poll(&mut fds, timeout) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32)),
            }

            let mut wake = None;
            for (index, polled) in fds.iter().enumerate() {
                let revents = polled.revents().unwrap_or_else(PollFlags::empty);
                let entry = &self.io[index];
                if revents.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP) {
                    if let Some(event) = entry.readable {
                        wake = Some(Wake::Readable { fd: entry.fd, event });
                        break;
                    }
                }
                if revents.intersects(PollFlags::POLLOUT | PollFlags::POLLERR | PollFlags::POLLHUP)
                {
                    if let Some(event) = entry.writable {
                        wake = Some(Wake::Writable { fd: entry.fd, event });
                        break;
                    }
                }
            }
            if let Some(wake) = wake {
                dispatch(self, wake);
            }
        }
    }

    fn poll_timeout(&self, now: Instant) -> c_int {
        match self.timers.first() {
            Some(entry) => {
                // Round up so the timer branch sees the deadline as passed
                // after the poll returns.
                let left = entry.deadline.saturating_duration_since(now)
                    + Duration::from_nanos(999_999);
                cmp::min(left.as_millis(), c_int::MAX as u128) as c_int
            }
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use nix::unistd;

    const QUEUE: u32 = 1;
    const OWNER: u64 = 1;

    const ALPHA: u8 = 1;
    const BETA: u8 = 2;
    const GAMMA: u8 = 3;

    #[test]
    fn fires_timers_in_deadline_order() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_millis(30), QUEUE, GAMMA, OWNER);
        eloop.schedule(Duration::from_millis(10), QUEUE, ALPHA, OWNER);
        eloop.schedule(Duration::from_millis(20), QUEUE, BETA, OWNER);

        let mut fired = Vec::new();
        let code = eloop
            .run(|_, wake| {
                if let Wake::Timer { event, .. } = wake {
                    fired.push(event);
                }
            })
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(fired, vec![ALPHA, BETA, GAMMA]);
    }

    #[test]
    fn equal_deadlines_fire_in_schedule_order() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_millis(0), QUEUE, BETA, OWNER);
        eloop.schedule(Duration::from_millis(0), QUEUE, GAMMA, OWNER);
        eloop.schedule(Duration::from_millis(0), QUEUE, ALPHA, OWNER);

        let mut fired = Vec::new();
        eloop
            .run(|_, wake| {
                if let Wake::Timer { event, .. } = wake {
                    fired.push(event);
                }
            })
            .unwrap();

        assert_eq!(fired, vec![BETA, GAMMA, ALPHA]);
    }

    #[test]
    fn rescheduling_replaces_the_pending_timer() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_millis(200), 1, ALPHA, OWNER);
        eloop.schedule(Duration::from_millis(5), 2, ALPHA, OWNER);
        assert_eq!(eloop.pending_timers(), 1);

        let mut count = 0;
        eloop.run(|_, _| count += 1).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_millis(5), QUEUE, ALPHA, OWNER);
        eloop.schedule(Duration::from_millis(5), QUEUE, BETA, OWNER);
        eloop.cancel(QUEUE, Some(BETA), OWNER);

        let mut fired = Vec::new();
        eloop
            .run(|_, wake| {
                if let Wake::Timer { event, .. } = wake {
                    fired.push(event);
                }
            })
            .unwrap();

        assert_eq!(fired, vec![ALPHA]);
    }

    #[test]
    fn the_queue_wildcard_cancels_across_queues() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_secs(10), 1, ALPHA, OWNER);
        eloop.schedule(Duration::from_secs(10), 2, BETA, OWNER);
        eloop.schedule(Duration::from_secs(10), 2, BETA, 2);
        eloop.cancel(QUEUE_ANY, None, OWNER);

        assert_eq!(eloop.pending_timers(), 1);
        assert!(eloop.timeout_left(BETA, 2).is_some());
    }

    #[test]
    fn cancel_honors_the_queue_filter() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_secs(10), 1, ALPHA, OWNER);
        eloop.schedule(Duration::from_secs(10), 2, BETA, OWNER);
        eloop.cancel(1, None, OWNER);

        assert_eq!(eloop.pending_timers(), 1);
        assert!(eloop.timeout_left(ALPHA, OWNER).is_none());
        assert!(eloop.timeout_left(BETA, OWNER).is_some());
    }

    #[test]
    fn reports_the_time_left_until_the_deadline() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_secs(5), QUEUE, ALPHA, OWNER);

        let left = eloop.timeout_left(ALPHA, OWNER).unwrap();
        assert!(left <= Duration::from_secs(5));
        assert!(left > Duration::from_secs(4));
        assert!(eloop.timeout_left(BETA, OWNER).is_none());
    }

    #[test]
    fn rejects_negative_handles() {
        let mut eloop: EventLoop<u8> = EventLoop::new();
        assert!(matches!(
            eloop.register_io(-1, Some(ALPHA), None),
            Err(Error::InvalidHandle(-1))
        ));
    }

    #[test]
    fn wakes_the_reader_when_the_pipe_fills() {
        let (reader, writer) = unistd::pipe().unwrap();
        let mut eloop = EventLoop::new();
        eloop.register_io(reader, Some(ALPHA), None).unwrap();
        unistd::write(writer, &[0u8]).unwrap();

        let mut woken = None;
        let code = eloop
            .run(|eloop, wake| {
                if let Wake::Readable { fd, event } = wake {
                    woken = Some((fd, event));
                    eloop.unregister_io(fd, false);
                    eloop.exit(7);
                }
            })
            .unwrap();

        assert_eq!(code, 7);
        assert_eq!(woken, Some((reader, ALPHA)));
        unistd::close(reader).unwrap();
        unistd::close(writer).unwrap();
    }

    #[test]
    fn a_write_only_unregister_drops_the_registration() {
        let (reader, writer) = unistd::pipe().unwrap();
        let mut eloop = EventLoop::new();
        eloop.register_io(writer, None, Some(BETA)).unwrap();

        let mut wakes = 0;
        let code = eloop
            .run(|eloop, wake| {
                if let Wake::Writable { fd, .. } = wake {
                    wakes += 1;
                    eloop.unregister_io(fd, true);
                }
            })
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(wakes, 1);
        unistd::close(reader).unwrap();
        unistd::close(writer).unwrap();
    }

    #[test]
    fn returns_the_exit_code() {
        let mut eloop = EventLoop::new();
        eloop.schedule(Duration::from_millis(0), QUEUE, ALPHA, OWNER);

        let code = eloop.run(|eloop, _| eloop.exit(42)).unwrap();
        assert_eq!(code, 42);
    }

    #[test]
    fn an_empty_loop_stops_immediately() {
        let mut eloop: EventLoop<u8> = EventLoop::new();
        let code = eloop.run(|_, _| unreachable!()).unwrap();
        assert_eq!(code, 0);
    }
}
