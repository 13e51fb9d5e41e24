//! Turn state and event dispatch.
//!
//! A [`Turn`] holds everything accumulated over one request/response
//! exchange: the concatenated answer body, the append-only reference
//! list, the latest status line, and the status transcript. The
//! [`Dispatcher`] owns the turn for its lifetime, applies decoded events
//! in arrival order, and notifies a [`TurnSink`] with read-only
//! snapshots. Presentation lives entirely behind the sink.

use crate::api::{AgentReply, Event, Reference};
use crate::core::constants::STANDBY_STATUS;
use crate::render;
use crate::render::diagram::{extract_mermaid_blocks, DiagramRenderer};

/// Display state of the assistant avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvatarState {
    #[default]
    Idle,
    Thinking,
    Speaking,
}

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Rendering surface boundary.
///
/// Every callback receives a snapshot; implementations must not assume
/// they can mutate turn state through it. All methods default to no-ops
/// so sinks only implement what they present.
pub trait TurnSink {
    /// Latest status line changed (including the idle sentinel).
    fn status_changed(&mut self, _status: &str) {}
    /// A non-sentinel status was appended to the transcript.
    fn status_logged(&mut self, _status: &str) {}
    /// The accumulated reference list grew.
    fn references_changed(&mut self, _references: &[Reference]) {}
    /// Full re-render of the accumulated content.
    fn content_rendered(&mut self, _html: &str) {}
    fn avatar_changed(&mut self, _state: AvatarState) {}
    fn notice(&mut self, _level: NoticeLevel, _message: &str) {}
}

/// Accumulation state for one exchange.
#[derive(Debug, Default)]
pub struct Turn {
    content: String,
    references: Vec<Reference>,
    status: String,
    status_log: Vec<String>,
    avatar: AvatarState,
}

impl Turn {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Audit trail of status changes, idle sentinel excluded.
    pub fn status_log(&self) -> &[String] {
        &self.status_log
    }

    pub fn avatar(&self) -> AvatarState {
        self.avatar
    }
}

/// Applies events to a [`Turn`] in arrival order, no reordering, no
/// batching.
pub struct Dispatcher<S> {
    turn: Turn,
    sink: S,
}

impl<S: TurnSink> Dispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            turn: Turn::default(),
            sink,
        }
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn into_parts(self) -> (Turn, S) {
        (self.turn, self.sink)
    }

    /// Apply one decoded event.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::Status(status) => {
                self.set_avatar(AvatarState::Thinking);
                self.turn.status = status.clone();
                self.sink.status_changed(&status);
                if !status.is_empty() && status != STANDBY_STATUS {
                    self.turn.status_log.push(status.clone());
                    self.sink.status_logged(&status);
                }
            }
            Event::Sources(references) => {
                // Append, never replace: later sub-queries must not erase
                // earlier contributions. Duplicates are preserved.
                self.turn.references.extend(references);
                self.sink.references_changed(&self.turn.references);
            }
            Event::Content(fragment) => {
                self.set_avatar(AvatarState::Speaking);
                self.turn.content.push_str(&fragment);
                self.rerender();
            }
            Event::Error(message) => {
                self.turn
                    .content
                    .push_str(&format!("\n\n> **System Error:** {message}"));
                self.rerender();
                self.sink.notice(NoticeLevel::Error, &message);
            }
        }
    }

    /// Fold a single-shot reply through the same accumulation paths as
    /// the streaming protocol.
    pub fn apply_reply(&mut self, reply: AgentReply) {
        if !reply.refs.is_empty() {
            self.apply(Event::Sources(
                reply.refs.into_iter().map(Reference::from).collect(),
            ));
        }
        self.apply(Event::Content(reply.flow));
    }

    /// End-of-stream: run the deferred diagram pass over the completed
    /// content, announce completion, and return to idle.
    pub fn finish(&mut self, diagrams: &dyn DiagramRenderer) {
        for definition in extract_mermaid_blocks(&self.turn.content) {
            if let Err(e) = diagrams.render(&definition) {
                tracing::warn!("diagram rendering incomplete: {e}");
                self.sink
                    .notice(NoticeLevel::Error, &format!("Diagram rendering failed: {e}"));
            }
        }

        self.sink.notice(NoticeLevel::Success, "Turn complete");
        self.turn.status = STANDBY_STATUS.to_string();
        self.sink.status_changed(STANDBY_STATUS);
        self.set_avatar(AvatarState::Idle);
    }

    fn set_avatar(&mut self, state: AvatarState) {
        if self.turn.avatar != state {
            self.turn.avatar = state;
            self.sink.avatar_changed(state);
        }
    }

    fn rerender(&mut self) {
        let html = render::markdown_to_html(&self.turn.content);
        self.sink.content_rendered(&html);
    }
}

mod gate {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Single-flight guard: at most one turn may be in flight.
    ///
    /// `begin` hands out a [`TurnPermit`] or nothing; the permit releases
    /// the gate when dropped, on every exit path, so a panic during
    /// rendering cannot leave the gate stuck closed.
    #[derive(Clone, Debug, Default)]
    pub struct TurnGate {
        busy: Arc<AtomicBool>,
    }

    impl TurnGate {
        pub fn new() -> Self {
            Self::default()
        }

        /// Claim the gate. Returns `None` while a permit is outstanding;
        /// the rejected submission is a no-op, not an error.
        pub fn begin(&self) -> Option<TurnPermit> {
            if self.busy.swap(true, Ordering::AcqRel) {
                None
            } else {
                Some(TurnPermit {
                    busy: Arc::clone(&self.busy),
                })
            }
        }

        pub fn is_busy(&self) -> bool {
            self.busy.load(Ordering::Acquire)
        }
    }

    #[derive(Debug)]
    pub struct TurnPermit {
        busy: Arc<AtomicBool>,
    }

    impl Drop for TurnPermit {
        fn drop(&mut self) {
            self.busy.store(false, Ordering::Release);
        }
    }
}

pub use gate::{TurnGate, TurnPermit};
