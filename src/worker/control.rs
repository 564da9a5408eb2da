//! Worker control plane.
//!
//! Workers are driven by explicit `ControlSignal` messages over an in-process
//! channel, so embedders and tests steer them without touching platform
//! signals. On Unix an optional bridge task translates the conventional
//! process signals into the same messages.

use tokio::sync::mpsc;

/// Instructions a running worker reacts to between (and during) jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop reserving new jobs; keep consuming control messages.
    Pause,
    /// Resume reserving after a pause.
    Resume,
    /// Finish the job in flight, then deregister and stop.
    Shutdown,
    /// Abort the job in flight and stop; without one, same as `Shutdown`.
    ForceShutdown,
    /// Abort the job in flight but keep the worker running.
    KillChild,
    /// Attempt one broker reconnect; a failed attempt is fatal.
    Reconnect,
}

pub fn control_channel() -> (ControlHandle, mpsc::UnboundedReceiver<ControlSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlHandle { tx }, rx)
}

/// Cloneable sender half used to steer a worker.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlSignal>,
}

impl ControlHandle {
    /// Send a signal; dropped silently when the worker is already gone.
    pub fn send(&self, signal: ControlSignal) {
        let _ = self.tx.send(signal);
    }

    pub fn pause(&self) {
        self.send(ControlSignal::Pause);
    }

    pub fn resume(&self) {
        self.send(ControlSignal::Resume);
    }

    pub fn shutdown(&self) {
        self.send(ControlSignal::Shutdown);
    }

    pub fn force_shutdown(&self) {
        self.send(ControlSignal::ForceShutdown);
    }

    pub fn kill_child(&self) {
        self.send(ControlSignal::KillChild);
    }

    pub fn reconnect(&self) {
        self.send(ControlSignal::Reconnect);
    }
}

/// Translate Unix process signals into control messages for one worker:
/// QUIT drains gracefully, TERM/INT abort, USR1 kills the job in flight,
/// USR2 pauses. Runs until the process exits.
#[cfg(unix)]
pub fn install_signal_bridge(handle: &ControlHandle) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut quit = signal(SignalKind::quit())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;

    let handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = quit.recv() => handle.shutdown(),
                _ = term.recv() => handle.force_shutdown(),
                _ = int.recv() => handle.force_shutdown(),
                _ = usr1.recv() => handle.kill_child(),
                _ = usr2.recv() => handle.pause(),
            }
        }
    });
    Ok(())
}
