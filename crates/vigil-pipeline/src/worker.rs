//! Named worker threads that can be joined against a deadline.
//!
//! `std::thread::JoinHandle::join` cannot time out, so every worker owns
//! the sending half of a zero-capacity channel.  The sender drops when the
//! worker body returns or unwinds; the joiner waits on the receiver with
//! `recv_timeout` and only calls `join` once the worker is known to be done.
//! A worker still running at the deadline is detached, never killed.

use std::{
    io,
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

#[derive(Debug)]
pub enum JoinOutcome<T> {
    Finished(T),
    Panicked,
    /// Still running at the deadline; the thread has been detached.
    TimedOut,
}

#[derive(Debug)]
pub struct Worker<T> {
    name: String,
    handle: JoinHandle<T>,
    done: Receiver<()>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn spawn<F>(name: impl Into<String>, body: F) -> io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let name = name.into();
        let (done_tx, done) = bounded::<()>(0);
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let _done = done_tx;
            body()
        })?;
        Ok(Self { name, handle, done })
    }
}

impl<T> Worker<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until `deadline` at the latest.
    pub fn join_by(self, deadline: Instant) -> JoinOutcome<T> {
        let wait = deadline.saturating_duration_since(Instant::now());
        match self.done.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match self.handle.join() {
                Ok(value) => JoinOutcome::Finished(value),
                Err(_) => JoinOutcome::Panicked,
            },
            Err(RecvTimeoutError::Timeout) => JoinOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn finished_worker_returns_its_value() {
        let w = Worker::spawn("adder", || 2 + 2).unwrap();
        assert_eq!(w.name(), "adder");
        let deadline = Instant::now() + Duration::from_secs(1);
        while !w.is_finished() {
            assert!(Instant::now() < deadline, "worker never finished");
            thread::sleep(Duration::from_millis(1));
        }
        match w.join_by(Instant::now() + Duration::from_secs(1)) {
            JoinOutcome::Finished(v) => assert_eq!(v, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn panicking_worker_is_reported() {
        let w = Worker::spawn("boom", || -> u32 { panic!("boom") }).unwrap();
        assert!(matches!(
            w.join_by(Instant::now() + Duration::from_secs(1)),
            JoinOutcome::Panicked
        ));
    }

    #[test]
    fn stuck_worker_times_out_near_the_deadline() {
        let w = Worker::spawn("sleeper", || thread::sleep(Duration::from_secs(3))).unwrap();
        assert!(!w.is_finished());
        let started = Instant::now();
        let outcome = w.join_by(started + Duration::from_millis(100));
        assert!(matches!(outcome, JoinOutcome::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
