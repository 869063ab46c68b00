// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The GL command executor.
//!
//! One OS thread owns the OpenGL context; every GL call in the crate is
//! a task on this executor. Two FIFO classes exist: `High` (allocations,
//! pool returns, uploads) and `Normal` (draws). High tasks always run
//! before pending Normal tasks, and a task already running on the GL
//! thread can [`GlExecutor::yield_now`] to let queued High tasks through
//! — that is what keeps an allocation awaited by a draw from
//! deadlocking the single thread.

use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use parking_lot::Mutex;

use crate::error::{MixerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    High,
    Normal,
}

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Task(Task),
    Stop,
}

struct ExecutorInner {
    high_tx: Sender<Message>,
    normal_tx: Sender<Message>,
    /// Clone of the High receiver, used by `yield_now` on the GL thread.
    high_rx: Receiver<Message>,
    thread_id: ThreadId,
    join: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct GlExecutor {
    inner: std::sync::Arc<ExecutorInner>,
}

impl GlExecutor {
    /// Spawn the executor thread. `init` runs first on the new thread
    /// (context creation lives there); its error aborts construction.
    pub fn spawn<I>(name: &str, init: I) -> Result<Self>
    where
        I: FnOnce() -> Result<()> + Send + 'static,
    {
        let (high_tx, high_rx) = unbounded::<Message>();
        let (normal_tx, normal_rx) = unbounded::<Message>();
        let (init_tx, init_rx) = bounded::<Result<()>>(1);

        let loop_high_rx = high_rx.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let ok = match init() {
                    Ok(()) => {
                        let _ = init_tx.send(Ok(()));
                        true
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        false
                    }
                };
                if ok {
                    run_loop(&loop_high_rx, &normal_rx);
                }
            })
            .map_err(|e| MixerError::Context(format!("failed to spawn GL thread: {e}")))?;

        init_rx
            .recv()
            .map_err(|_| MixerError::Context("GL thread died during init".into()))??;

        let thread_id = join.thread().id();
        Ok(Self {
            inner: std::sync::Arc::new(ExecutorInner {
                high_tx,
                normal_tx,
                high_rx,
                thread_id,
                join: Mutex::new(Some(join)),
            }),
        })
    }

    pub fn is_gl_thread(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    fn sender(&self, priority: TaskPriority) -> &Sender<Message> {
        match priority {
            TaskPriority::High => &self.inner.high_tx,
            TaskPriority::Normal => &self.inner.normal_tx,
        }
    }

    /// Enqueue a task and return a future for its result.
    pub fn submit<T, F>(&self, priority: TaskPriority, task: F) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded::<T>(1);
        let send_result = self.sender(priority).send(Message::Task(Box::new(move || {
            let _ = tx.send(task());
        })));
        if send_result.is_err() {
            tracing::warn!("GL executor is gone; task dropped");
        }
        TaskFuture {
            rx,
            exec: self.clone(),
        }
    }

    /// Run a task and block for its result. When the caller already is
    /// the GL thread the task runs inline — submitting and blocking
    /// would deadlock the single consumer.
    pub fn invoke<T, F>(&self, priority: TaskPriority, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_gl_thread() {
            return Ok(task());
        }
        self.submit(priority, task).wait()
    }

    /// From within a GL-thread task, run any queued High tasks.
    pub fn yield_now(&self) {
        debug_assert!(self.is_gl_thread());
        while let Ok(Message::Task(task)) = self.inner.high_rx.try_recv() {
            task();
        }
    }

    /// Stop the executor: queued tasks are drained, then the thread
    /// exits. Idempotent.
    pub fn stop(&self) {
        let _ = self.inner.normal_tx.send(Message::Stop);
        if let Some(join) = self.inner.join.lock().take() {
            let _ = join.join();
        }
    }
}

fn run_loop(high_rx: &Receiver<Message>, normal_rx: &Receiver<Message>) {
    let mut stopping = false;
    loop {
        // High tasks drain ahead of anything else.
        loop {
            match high_rx.try_recv() {
                Ok(Message::Task(task)) => task(),
                Ok(Message::Stop) => stopping = true,
                Err(_) => break,
            }
        }

        if stopping {
            // Drain what is left, then exit.
            while let Ok(Message::Task(task)) = high_rx.try_recv() {
                task();
            }
            while let Ok(Message::Task(task)) = normal_rx.try_recv() {
                task();
            }
            return;
        }

        crossbeam_channel::select! {
            recv(high_rx) -> msg => match msg {
                Ok(Message::Task(task)) => task(),
                Ok(Message::Stop) => stopping = true,
                Err(_) => return,
            },
            recv(normal_rx) -> msg => match msg {
                Ok(Message::Task(task)) => {
                    // A High task may have landed while we slept.
                    while let Ok(Message::Task(high)) = high_rx.try_recv() {
                        high();
                    }
                    task();
                }
                Ok(Message::Stop) => stopping = true,
                Err(_) => return,
            },
        }
    }
}

/// Handle to a task's eventual result.
pub struct TaskFuture<T> {
    rx: Receiver<T>,
    exec: GlExecutor,
}

impl<T> TaskFuture<T> {
    /// Block until the task has run. On the GL thread itself this
    /// services queued High tasks while waiting, so a High-priority
    /// dependency scheduled by the current task can complete.
    pub fn wait(self) -> Result<T> {
        if !self.exec.is_gl_thread() {
            return self.rx.recv().map_err(|_| MixerError::DeviceGone);
        }
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Ok(value),
                Err(TryRecvError::Disconnected) => return Err(MixerError::DeviceGone),
                Err(TryRecvError::Empty) => {
                    self.exec.yield_now();
                    thread::yield_now();
                }
            }
        }
    }

    /// Non-blocking poll.
    pub fn try_wait(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn plain_executor() -> GlExecutor {
        GlExecutor::spawn("test-executor", || Ok(())).unwrap()
    }

    #[test]
    fn test_invoke_returns_value() {
        let exec = plain_executor();
        let out = exec.invoke(TaskPriority::Normal, || 6 * 7).unwrap();
        assert_eq!(out, 42);
        exec.stop();
    }

    #[test]
    fn test_tasks_fifo_within_class() {
        let exec = plain_executor();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..8 {
            let log = log.clone();
            exec.submit(TaskPriority::Normal, move || log.lock().push(n));
        }
        exec.invoke(TaskPriority::Normal, || ()).unwrap();
        assert_eq!(*log.lock(), (0..8).collect::<Vec<_>>());
        exec.stop();
    }

    #[test]
    fn test_high_runs_before_pending_normal() {
        let exec = plain_executor();
        let log = Arc::new(Mutex::new(Vec::new()));

        // Occupy the thread so both queues back up.
        let gate = Arc::new(AtomicBool::new(false));
        {
            let gate = gate.clone();
            exec.submit(TaskPriority::Normal, move || {
                while !gate.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(1));
                }
            });
        }
        for n in 0..3 {
            let log = log.clone();
            exec.submit(TaskPriority::Normal, move || log.lock().push(format!("n{n}")));
        }
        for n in 0..3 {
            let log = log.clone();
            exec.submit(TaskPriority::High, move || log.lock().push(format!("h{n}")));
        }
        gate.store(true, Ordering::Release);
        exec.invoke(TaskPriority::Normal, || ()).unwrap();

        assert_eq!(*log.lock(), vec!["h0", "h1", "h2", "n0", "n1", "n2"]);
        exec.stop();
    }

    #[test]
    fn test_invoke_inline_on_own_thread() {
        let exec = plain_executor();
        let inner = exec.clone();
        let nested = exec
            .invoke(TaskPriority::Normal, move || {
                // Would deadlock if this re-submitted instead of running
                // inline.
                inner.invoke(TaskPriority::High, || 99).unwrap()
            })
            .unwrap();
        assert_eq!(nested, 99);
        exec.stop();
    }

    #[test]
    fn test_wait_on_gl_thread_services_high_queue() {
        let exec = plain_executor();
        let inner = exec.clone();
        let out = exec
            .invoke(TaskPriority::Normal, move || {
                let future = inner.submit(TaskPriority::High, || 7);
                future.wait().unwrap()
            })
            .unwrap();
        assert_eq!(out, 7);
        exec.stop();
    }

    #[test]
    fn test_stop_drains_queued_tasks() {
        let exec = plain_executor();
        let flag = Arc::new(AtomicBool::new(false));
        {
            let flag = flag.clone();
            exec.submit(TaskPriority::Normal, move || flag.store(true, Ordering::Release));
        }
        exec.stop();
        assert!(flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_init_failure_propagates() {
        let result = GlExecutor::spawn("failing", || {
            Err(MixerError::Context("no display".into()))
        });
        assert!(result.is_err());
    }
}
