//! The artifact record and its lifecycle mutations
//!
//! Status only moves through [`StatusEvent`]s; every mutator checks the
//! transition before touching the body or the history, so a rejected event
//! leaves the artifact exactly as it was.

use crate::id::ArtifactId;
use crate::status::{next_status, ArtifactStatus, StatusEvent, TransitionError};
use crate::turn::Turn;
use chrono::{DateTime, SubsecRound, Utc};

/// One user-initiated creation
///
/// # Invariants
/// - `id`, `instruction` and `created_at` never change after construction
/// - `history` is append-only
/// - `body` is replaced wholesale, never patched
/// - `failure_reason` is `Some` only while `status == Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub(crate) id: ArtifactId,
    pub(crate) instruction: String,
    pub(crate) generation_instruction: Option<String>,
    pub(crate) body: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) status: ArtifactStatus,
    pub(crate) failure_reason: Option<String>,
    pub(crate) history: Vec<Turn>,
    pub(crate) revision: u64,
}

/// Context captured when an edit is dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDispatch {
    /// Body the provider revises
    pub body: String,
    /// History as it stood before the triggering turn was appended
    pub prior_history: Vec<Turn>,
    /// Revision ticket for the in-flight request
    pub ticket: u64,
}

impl Artifact {
    /// New pending artifact with an empty body and history
    #[must_use]
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            id: ArtifactId::new(),
            instruction: instruction.into(),
            generation_instruction: None,
            body: String::new(),
            // persisted with millisecond precision
            created_at: Utc::now().trunc_subsecs(3),
            status: ArtifactStatus::Pending,
            failure_reason: None,
            history: Vec::new(),
            revision: 0,
        }
    }

    /// Record the instruction actually sent to the provider when it differs
    /// from the displayed one.
    #[must_use]
    pub fn with_generation_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.generation_instruction = Some(instruction.into());
        self
    }

    /// Seed the conversation before the first request is dispatched
    #[must_use]
    pub fn with_seed_turn(mut self, turn: Turn) -> Self {
        self.history.push(turn);
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    /// Instruction shown to the user
    #[inline]
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Instruction sent to the provider for the first generation
    #[inline]
    #[must_use]
    pub fn generation_instruction(&self) -> &str {
        self.generation_instruction
            .as_deref()
            .unwrap_or(&self.instruction)
    }

    /// Explicit generation instruction, if one was recorded
    #[inline]
    #[must_use]
    pub fn seed_instruction(&self) -> Option<&str> {
        self.generation_instruction.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> ArtifactStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Current request-generation counter
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Start a new request generation and return its ticket
    pub fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn apply(&mut self, event: StatusEvent) -> Result<(), TransitionError> {
        self.status = next_status(self.status, event)?;
        Ok(())
    }

    /// First generation produced a body
    ///
    /// # Errors
    /// Rejected unless the artifact is `Pending`.
    pub fn complete_generation(&mut self, body: impl Into<String>) -> Result<(), TransitionError> {
        self.apply(StatusEvent::GenerationSucceeded)?;
        self.body = body.into();
        self.failure_reason = None;
        Ok(())
    }

    /// First generation failed; the body stays empty
    ///
    /// # Errors
    /// Rejected unless the artifact is `Pending`.
    pub fn fail_generation(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.apply(StatusEvent::GenerationFailed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Append the user's instruction and move to `Revising`.
    ///
    /// Returns the body and the history as it was *before* the new turn, plus
    /// a fresh revision ticket for the request.
    ///
    /// # Errors
    /// Rejected unless the artifact is `Ready`.
    pub fn submit_edit(&mut self, instruction: impl Into<String>) -> Result<EditDispatch, TransitionError> {
        self.apply(StatusEvent::EditSubmitted)?;
        let prior_history = self.history.clone();
        self.history.push(Turn::user(instruction));
        let ticket = self.bump_revision();
        Ok(EditDispatch {
            body: self.body.clone(),
            prior_history,
            ticket,
        })
    }

    /// Revision produced a new body
    ///
    /// # Errors
    /// Rejected unless the artifact is `Revising`.
    pub fn complete_edit(
        &mut self,
        body: impl Into<String>,
        confirmation: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.apply(StatusEvent::EditSucceeded)?;
        self.body = body.into();
        self.history.push(Turn::assistant(confirmation));
        Ok(())
    }

    /// Revision failed; the last good body is kept and the failure is
    /// recorded in the conversation.
    ///
    /// # Errors
    /// Rejected unless the artifact is `Revising`.
    pub fn fail_edit(&mut self, apology: impl Into<String>) -> Result<(), TransitionError> {
        self.apply(StatusEvent::EditFailed)?;
        self.history.push(Turn::assistant(apology));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Speaker;
    use pretty_assertions::assert_eq;

    fn ready(body: &str) -> Artifact {
        let mut a = Artifact::new("red button");
        a.complete_generation(body).unwrap();
        a
    }

    #[test]
    fn new_artifact_is_pending_and_empty() {
        let a = Artifact::new("red button");
        assert_eq!(a.status(), ArtifactStatus::Pending);
        assert!(a.body().is_empty());
        assert!(a.history().is_empty());
        assert_eq!(a.failure_reason(), None);
        assert_eq!(a.generation_instruction(), "red button");
    }

    #[test]
    fn generation_success_sets_body() {
        let a = ready("<html>RED</html>");
        assert_eq!(a.status(), ArtifactStatus::Ready);
        assert_eq!(a.body(), "<html>RED</html>");
        assert!(a.history().is_empty());
    }

    #[test]
    fn generation_failure_keeps_body_empty() {
        let mut a = Artifact::new("x");
        a.fail_generation("nope").unwrap();
        assert_eq!(a.status(), ArtifactStatus::Failed);
        assert_eq!(a.body(), "");
        assert_eq!(a.failure_reason(), Some("nope"));
    }

    #[test]
    fn submit_edit_returns_prior_context() {
        let mut a = ready("<html>RED</html>");
        let dispatch = a.submit_edit("make it blue").unwrap();

        assert_eq!(dispatch.body, "<html>RED</html>");
        assert!(dispatch.prior_history.is_empty());
        assert_eq!(dispatch.ticket, a.revision());
        assert_eq!(a.status(), ArtifactStatus::Revising);
        assert_eq!(a.history(), &[Turn::user("make it blue")]);
    }

    #[test]
    fn edit_success_replaces_body_and_confirms() {
        let mut a = ready("<html>RED</html>");
        a.submit_edit("make it blue").unwrap();
        a.complete_edit("<html>BLUE</html>", "done").unwrap();

        assert_eq!(a.status(), ArtifactStatus::Ready);
        assert_eq!(a.body(), "<html>BLUE</html>");
        assert_eq!(a.history()[1], Turn::assistant("done"));
    }

    #[test]
    fn edit_failure_keeps_body() {
        let mut a = ready("<html>RED</html>");
        a.submit_edit("make it blue").unwrap();
        a.fail_edit("sorry").unwrap();

        assert_eq!(a.status(), ArtifactStatus::Ready);
        assert_eq!(a.body(), "<html>RED</html>");
        assert_eq!(a.history().len(), 2);
        assert_eq!(a.history()[1].speaker, Speaker::Assistant);
    }

    #[test]
    fn rejected_event_leaves_artifact_untouched() {
        let mut a = Artifact::new("x");
        a.fail_generation("nope").unwrap();
        let before = a.clone();

        assert!(a.submit_edit("again").is_err());
        assert!(a.complete_generation("late").is_err());
        assert_eq!(a, before);
    }

    #[test]
    fn seeded_template_artifact() {
        let a = Artifact::new("Template: Zen")
            .with_generation_instruction("Make a timer")
            .with_seed_turn(Turn::user("Init from template: Zen"));
        assert_eq!(a.instruction(), "Template: Zen");
        assert_eq!(a.generation_instruction(), "Make a timer");
        assert_eq!(a.history().len(), 1);
    }
}
