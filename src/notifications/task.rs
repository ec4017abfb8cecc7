//! Dispatch Task
//!
//! Per-notification state machine. A task starts `Pending`, announces the
//! arrival to the client and arms a one-shot timer. Exactly one of a client
//! response or the timer moves it to a terminal state; the loser observes the
//! terminal state and backs off.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::notifications::emitter::{
    notification_body, EventEmitter, HANDLE_NOTIFICATION_EVENT, HANDLE_NOTIFICATION_TIMEOUT_EVENT,
};
use crate::notifications::error::{HandlerError, HandlerResult};
use crate::notifications::message::IncomingMessage;
use crate::notifications::presenter::{NotificationPresenter, ResponseBehavior};

/// Default response window
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Lifecycle state of a dispatch task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Pending = 0,
    Resolved = 1,
    TimedOut = 2,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Pending,
            1 => TaskState::Resolved,
            _ => TaskState::TimedOut,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Resolved => write!(f, "resolved"),
            TaskState::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Component told when a task reaches a terminal state
pub trait TaskOwner: Send + Sync {
    fn on_task_finished(&self, task: &DispatchTask);
}

/// Collaborators shared by every task a handler creates
#[derive(Clone)]
pub struct TaskContext {
    pub emitter: Arc<dyn EventEmitter>,
    pub presenter: Arc<dyn NotificationPresenter>,
    pub response_timeout: Duration,
    pub runtime: Handle,
}

impl TaskContext {
    pub fn new(
        emitter: Arc<dyn EventEmitter>,
        presenter: Arc<dyn NotificationPresenter>,
        response_timeout: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            emitter,
            presenter,
            response_timeout,
            runtime,
        }
    }
}

pub struct DispatchTask {
    message: IncomingMessage,
    state: AtomicU8,
    started: AtomicBool,
    timer: CancellationToken,
    context: TaskContext,
    owner: Weak<dyn TaskOwner>,
}

impl DispatchTask {
    pub fn new(message: IncomingMessage, context: TaskContext, owner: Weak<dyn TaskOwner>) -> Self {
        Self {
            message,
            state: AtomicU8::new(TaskState::Pending as u8),
            started: AtomicBool::new(false),
            timer: CancellationToken::new(),
            context,
            owner,
        }
    }

    pub fn identifier(&self) -> &str {
        self.message.identifier()
    }

    pub fn payload(&self) -> &Value {
        self.message.payload()
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Announce the arrival and arm the response timer
    ///
    /// Only the first call on a pending task has any effect.
    pub fn start(self: &Arc<Self>) {
        if self.state().is_terminal() || self.started.swap(true, Ordering::AcqRel) {
            warn!("Ignoring start of notification {} ({})", self.identifier(), self.state());
            return;
        }

        debug!("Starting handler task for notification {}", self.identifier());
        self.context.emitter.emit(
            HANDLE_NOTIFICATION_EVENT,
            notification_body(self.identifier(), self.payload()),
        );

        // A response that already won has cancelled the token; the timer then exits at once.
        let task = Arc::clone(self);
        let timer = self.timer.clone();
        let timeout = self.context.response_timeout;
        self.context.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    task.handle_timeout();
                }
            }
        });
    }

    /// Apply the client's decision
    pub fn handle_response(&self, behavior: &ResponseBehavior) -> HandlerResult<()> {
        if !self.transition(TaskState::Resolved) {
            return Err(HandlerError::already_handled(self.identifier()));
        }
        self.timer.cancel();

        debug!("Presenting notification {}", self.identifier());
        let result = self
            .context
            .presenter
            .present(self.identifier(), self.payload(), behavior)
            .map_err(|e| HandlerError::presentation(self.identifier(), e));

        // Resolved stays resolved whatever the presenter did.
        self.finish();
        result
    }

    /// Timer expiry; returns false if the task had already finished
    pub fn handle_timeout(&self) -> bool {
        if !self.transition(TaskState::TimedOut) {
            return false;
        }
        self.timer.cancel();

        info!("Notification {} timed out", self.identifier());
        self.context.emitter.emit(
            HANDLE_NOTIFICATION_TIMEOUT_EVENT,
            notification_body(self.identifier(), self.payload()),
        );
        self.finish();
        true
    }

    fn transition(&self, to: TaskState) -> bool {
        self.state
            .compare_exchange(
                TaskState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn finish(&self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.on_task_finished(self);
        }
    }
}

impl fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTask")
            .field("identifier", &self.identifier())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use serde_json::json;

    use crate::notifications::emitter::{ChannelEmitter, EmittedEvent};
    use crate::notifications::error::PresentationError;

    #[derive(Default)]
    struct CountingPresenter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl NotificationPresenter for CountingPresenter {
        fn present(
            &self,
            _identifier: &str,
            _payload: &Value,
            _behavior: &ResponseBehavior,
        ) -> Result<(), PresentationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PresentationError::new("no notification channel"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingOwner {
        finished: Mutex<Vec<(String, TaskState)>>,
    }

    impl TaskOwner for RecordingOwner {
        fn on_task_finished(&self, task: &DispatchTask) {
            self.finished
                .lock()
                .unwrap()
                .push((task.identifier().to_string(), task.state()));
        }
    }

    struct Fixture {
        task: Arc<DispatchTask>,
        presenter: Arc<CountingPresenter>,
        owner: Arc<RecordingOwner>,
        events: tokio::sync::mpsc::UnboundedReceiver<EmittedEvent>,
    }

    fn fixture(fail_presentation: bool) -> Fixture {
        let (emitter, events) = ChannelEmitter::channel();
        let presenter = Arc::new(CountingPresenter {
            fail: fail_presentation,
            ..Default::default()
        });
        let owner = Arc::new(RecordingOwner::default());
        let context = TaskContext::new(
            Arc::new(emitter),
            presenter.clone(),
            DEFAULT_RESPONSE_TIMEOUT,
            Handle::current(),
        );
        let weak_owner: Weak<dyn TaskOwner> = Arc::downgrade(&owner) as Weak<dyn TaskOwner>;
        let message = IncomingMessage::new(Some("m1".to_string()), json!({"title": "Hi"}));
        let task = Arc::new(DispatchTask::new(message, context, weak_owner));
        Fixture {
            task,
            presenter,
            owner,
            events,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_emits_arrival_event_once() {
        let mut f = fixture(false);
        f.task.start();
        f.task.start();

        let event = f.events.try_recv().unwrap();
        assert_eq!(event.name, HANDLE_NOTIFICATION_EVENT);
        assert_eq!(event.body, json!({"id": "m1", "notification": {"title": "Hi"}}));
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.task.state(), TaskState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_resolves_and_cancels_timer() {
        let mut f = fixture(false);
        f.task.start();
        let _ = f.events.try_recv();

        f.task.handle_response(&ResponseBehavior::new(json!({"show": true}))).unwrap();
        assert_eq!(f.task.state(), TaskState::Resolved);
        assert_eq!(f.presenter.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(DEFAULT_RESPONSE_TIMEOUT * 2).await;
        assert!(f.events.try_recv().is_err(), "timer must not fire after a response");
        assert_eq!(
            *f.owner.finished.lock().unwrap(),
            vec![("m1".to_string(), TaskState::Resolved)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_response_reports_already_handled() {
        let f = fixture(false);
        f.task.start();
        let behavior = ResponseBehavior::new(json!({}));

        f.task.handle_response(&behavior).unwrap();
        let error = f.task.handle_response(&behavior).unwrap_err();
        assert_eq!(error, HandlerError::already_handled("m1"));
        assert_eq!(f.presenter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_emits_fallback_event() {
        let mut f = fixture(false);
        f.task.start();
        let _ = f.events.try_recv();

        tokio::time::sleep(DEFAULT_RESPONSE_TIMEOUT + Duration::from_millis(100)).await;

        let event = f.events.try_recv().unwrap();
        assert_eq!(event.name, HANDLE_NOTIFICATION_TIMEOUT_EVENT);
        assert_eq!(event.body, json!({"id": "m1", "notification": {"title": "Hi"}}));
        assert_eq!(f.task.state(), TaskState::TimedOut);
        assert_eq!(f.presenter.calls.load(Ordering::SeqCst), 0);

        let error = f.task.handle_response(&ResponseBehavior::default()).unwrap_err();
        assert_eq!(error.code(), "ERR_NOTIFICATION_HANDLED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_response_is_noop() {
        let f = fixture(false);
        f.task.start();
        f.task.handle_response(&ResponseBehavior::default()).unwrap();
        assert!(!f.task.handle_timeout());
        assert_eq!(f.task.state(), TaskState::Resolved);
        assert_eq!(f.owner.finished.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_presentation_failure_still_finalizes() {
        let f = fixture(true);
        f.task.start();

        let error = f.task.handle_response(&ResponseBehavior::default()).unwrap_err();
        assert!(matches!(error, HandlerError::Presentation { .. }));
        assert_eq!(f.task.state(), TaskState::Resolved);
        assert_eq!(f.owner.finished.lock().unwrap().len(), 1);

        // The failed task cannot be answered again
        let error = f.task.handle_response(&ResponseBehavior::default()).unwrap_err();
        assert!(matches!(error, HandlerError::AlreadyHandled { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_response_and_timeout_race_has_one_winner() {
        for _ in 0..200 {
            let f = fixture(false);
            f.task.start();

            let responder = {
                let task = f.task.clone();
                tokio::spawn(async move { task.handle_response(&ResponseBehavior::default()).is_ok() })
            };
            let expirer = {
                let task = f.task.clone();
                tokio::spawn(async move { task.handle_timeout() })
            };

            let responded = responder.await.unwrap();
            let timed_out = expirer.await.unwrap();
            assert!(responded ^ timed_out, "exactly one path must win");
            assert_eq!(f.owner.finished.lock().unwrap().len(), 1);
        }
    }
}
