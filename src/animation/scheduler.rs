//! Shared animation frame queue.
//!
//! Maps do not own a frame loop. They push tagged [`FrameTask`]s onto an
//! [`AnimationQueue`] and the host calls [`process_frame`] once per frame.
//! Several maps may share one queue so their transitions and momentum run in
//! the same tick.

use crate::core::map::MapId;
use std::cell::RefCell;
use std::rc::Rc;

/// What a frame task drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTaskKind {
    Transition,
    Momentum,
    /// Trailing throttle calls, debounced zoom and click timeouts
    Timers,
}

/// A pending per-frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTask {
    pub owner: MapId,
    pub kind: FrameTaskKind,
}

impl FrameTask {
    pub fn new(owner: MapId, kind: FrameTaskKind) -> Self {
        Self { owner, kind }
    }
}

/// How [`AnimationQueue::schedule_with`] treats an already pending task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleAction {
    /// Move the task to the end of the queue
    #[default]
    MoveToEnd,
    /// Leave a pending task where it is
    KeepPosition,
    /// Remove the task
    Remove,
}

/// Whether a frame task wants another frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Continue,
    Done,
}

/// Ordered set of frame tasks; a task is pending at most once
#[derive(Debug, Default)]
pub struct AnimationQueue {
    tasks: Vec<FrameTask>,
    frames: u64,
}

pub type SharedAnimationQueue = Rc<RefCell<AnimationQueue>>;

impl AnimationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedAnimationQueue {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Queue `task` for the next frame, moving it to the end if pending
    pub fn schedule(&mut self, task: FrameTask) {
        self.schedule_with(task, ScheduleAction::MoveToEnd);
    }

    pub fn schedule_with(&mut self, task: FrameTask, action: ScheduleAction) {
        let position = self.tasks.iter().position(|pending| *pending == task);
        match (action, position) {
            (ScheduleAction::Remove, Some(idx)) => {
                self.tasks.remove(idx);
            }
            (ScheduleAction::Remove, None) => {}
            (ScheduleAction::KeepPosition, Some(_)) => {}
            (ScheduleAction::MoveToEnd, Some(idx)) => {
                self.tasks.remove(idx);
                self.tasks.push(task);
            }
            (_, None) => self.tasks.push(task),
        }
    }

    pub fn is_scheduled(&self, task: &FrameTask) -> bool {
        self.tasks.contains(task)
    }

    pub fn tasks(&self) -> &[FrameTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of frames processed so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Remove and return every task owned by `owner`, keeping their order
    pub fn take_owned(&mut self, owner: MapId) -> Vec<FrameTask> {
        let (owned, rest): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|task| task.owner == owner);
        self.tasks = rest;
        owned
    }

    fn begin_frame(&mut self) -> Vec<FrameTask> {
        self.frames += 1;
        std::mem::take(&mut self.tasks)
    }
}

/// Something that can run frame tasks it scheduled
pub trait FrameHandler {
    fn id(&self) -> MapId;
    fn run_frame_task(&mut self, kind: FrameTaskKind, time: f64) -> FrameStatus;
}

/// Run one animation frame at `time` (ms).
///
/// Every task pending at the start of the frame whose owner is in
/// `handlers` runs once, in queue order. Tasks that return
/// [`FrameStatus::Continue`], tasks scheduled while the frame runs and tasks
/// of maps not in `handlers` wait for the next frame. Returns the number of
/// tasks run.
pub fn process_frame<H: FrameHandler>(
    queue: &SharedAnimationQueue,
    time: f64,
    handlers: &mut [&mut H],
) -> usize {
    let tasks = queue.borrow_mut().begin_frame();
    let mut ran = 0;
    for task in tasks {
        let Some(handler) = handlers.iter_mut().find(|h| h.id() == task.owner) else {
            log::trace!(target: "mapview", "deferring frame task of map {:?}", task.owner);
            queue
                .borrow_mut()
                .schedule_with(task, ScheduleAction::KeepPosition);
            continue;
        };
        ran += 1;
        if handler.run_frame_task(task.kind, time) == FrameStatus::Continue {
            queue
                .borrow_mut()
                .schedule_with(task, ScheduleAction::KeepPosition);
        }
    }
    ran
}
