//! Deferred execution for change notifications.
//!
//! A [`Scheduler`] runs a task exactly once, after the current synchronous
//! turn. The default binding is a per-thread [`FrameQueue`] that the host
//! drains once per frame with [`run_frame`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Runs each scheduled task exactly once, never before `schedule` returns.
pub trait Scheduler {
	fn schedule(&self, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
	fn schedule(&self, task: Task) {
		(**self).schedule(task);
	}
}

/// FIFO queue of deferred tasks, drained one frame at a time.
///
/// Handles are shared: clones feed and drain the same queue.
#[derive(Clone, Default)]
pub struct FrameQueue {
	tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl FrameQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs every task queued before this call and returns how many ran.
	/// Tasks scheduled while the frame runs wait for the next frame.
	pub fn run_frame(&self) -> usize {
		let batch = std::mem::take(&mut *self.tasks.borrow_mut());
		let count = batch.len();
		for task in batch {
			task();
		}
		if count > 0 {
			tracing::trace!(count, "ran frame tasks");
		}
		count
	}

	/// Runs frames until the queue stays empty.
	pub fn run_until_idle(&self) -> usize {
		let mut total = 0;
		loop {
			match self.run_frame() {
				0 => return total,
				ran => total += ran,
			}
		}
	}

	pub fn len(&self) -> usize {
		self.tasks.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.tasks.borrow().is_empty()
	}
}

impl Scheduler for FrameQueue {
	fn schedule(&self, task: Task) {
		self.tasks.borrow_mut().push_back(task);
	}
}

impl fmt::Debug for FrameQueue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FrameQueue").field("pending", &self.len()).finish()
	}
}

thread_local! {
	static FRAME: FrameQueue = FrameQueue::new();
}

/// Handle to this thread's default frame queue.
pub fn frame() -> FrameQueue {
	FRAME.with(FrameQueue::clone)
}

/// Drains one frame of this thread's default queue.
pub fn run_frame() -> usize {
	frame().run_frame()
}

/// Schedules onto the current tokio `LocalSet`.
///
/// Must be used from within a `LocalSet` context.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSpawn;

#[cfg(feature = "tokio")]
impl Scheduler for LocalSpawn {
	fn schedule(&self, task: Task) {
		tokio::task::spawn_local(async move { task() });
	}
}
