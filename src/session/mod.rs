//! Per merge request review state across polling iterations.
//!
//! Each open merge request gets exactly one initial review and then one
//! follow-up review per new head revision. State lives in memory; after a
//! restart it is rebuilt from the markers the bot left in its own notes.

use std::collections::HashMap;

use crate::models::merge_request::same_revision;
use crate::models::{Note, ReviewContext};
use crate::review::comment::{is_follow_up_note, is_initial_review_note, parse_revision_marker};

/// Where a tracked merge request stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Seen, but no initial review has completed yet.
    InitialPending,
    /// Reviewed up to `revision`.
    InitialDone { revision: String },
}

/// What the driver should do for a merge request on this poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    InitialReview,
    FollowUp { revision: String },
    Idle,
}

#[derive(Debug, Clone)]
struct SessionState {
    phase: SessionPhase,
    context: ReviewContext,
}

/// Tracks [`SessionPhase`] per merge request id.
///
/// [`observe`](Self::observe) only decides; the `complete_*` methods are
/// the only transitions, so a phase that fails half way is retried on the
/// next poll.
#[derive(Debug, Default)]
pub struct ReviewSessionStateMachine {
    sessions: HashMap<u64, SessionState>,
}

impl ReviewSessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn phase(&self, mr_id: u64) -> Option<&SessionPhase> {
        self.sessions.get(&mr_id).map(|s| &s.phase)
    }

    /// Context gathered by earlier phases, if the request is tracked.
    pub fn context(&self, mr_id: u64) -> Option<&ReviewContext> {
        self.sessions.get(&mr_id).map(|s| &s.context)
    }

    /// Whether [`observe`](Self::observe) will look at the note history
    /// for this request. Callers can skip fetching notes otherwise.
    pub fn needs_history(&self, mr_id: u64) -> bool {
        !matches!(
            self.phase(mr_id),
            Some(SessionPhase::InitialDone { .. })
        )
    }

    /// Decide the action for `mr_id` at `head_revision`.
    pub fn observe(&mut self, mr_id: u64, head_revision: &str, notes: &[Note]) -> ReviewAction {
        if self.needs_history(mr_id) {
            match reconstruct_from_notes(notes, head_revision) {
                Some(revision) => {
                    tracing::info!(mr_id, %revision, "review history found, skipping initial review");
                    let context = self
                        .sessions
                        .remove(&mr_id)
                        .map(|s| s.context)
                        .unwrap_or_default();
                    self.sessions.insert(
                        mr_id,
                        SessionState {
                            phase: SessionPhase::InitialDone { revision },
                            context,
                        },
                    );
                }
                None => {
                    self.sessions.entry(mr_id).or_insert_with(|| SessionState {
                        phase: SessionPhase::InitialPending,
                        context: ReviewContext::default(),
                    });
                    return ReviewAction::InitialReview;
                }
            }
        }

        match self.phase(mr_id) {
            Some(SessionPhase::InitialDone { revision })
                if !same_revision(revision, head_revision) =>
            {
                tracing::debug!(mr_id, from = %revision, to = head_revision, "new revision");
                ReviewAction::FollowUp {
                    revision: head_revision.to_string(),
                }
            }
            _ => ReviewAction::Idle,
        }
    }

    /// Record a finished initial review.
    pub fn complete_initial(&mut self, mr_id: u64, revision: &str, context: ReviewContext) {
        self.sessions.insert(
            mr_id,
            SessionState {
                phase: SessionPhase::InitialDone {
                    revision: revision.to_string(),
                },
                context,
            },
        );
    }

    /// Record a finished follow-up review of `revision`.
    pub fn complete_follow_up(&mut self, mr_id: u64, revision: &str) {
        let state = self.sessions.entry(mr_id).or_insert_with(|| SessionState {
            phase: SessionPhase::InitialPending,
            context: ReviewContext::default(),
        });
        state.phase = SessionPhase::InitialDone {
            revision: revision.to_string(),
        };
    }

    /// Forget every request whose id is not in `open`.
    pub fn retain_open(&mut self, open: &[u64]) {
        let before = self.sessions.len();
        self.sessions.retain(|id, _| open.contains(id));
        let dropped = before - self.sessions.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped closed merge requests");
        }
    }
}

/// Last reviewed revision according to the bot's own notes.
///
/// The newest review note wins. A history with only follow-up notes still
/// counts as reviewed, and a review note without a readable revision maps
/// to `head_revision`. `None` means no review was ever posted.
pub fn reconstruct_from_notes(notes: &[Note], head_revision: &str) -> Option<String> {
    let newest = notes
        .iter()
        .filter(|n| is_initial_review_note(&n.body) || is_follow_up_note(&n.body))
        .max_by_key(|n| n.id)?;
    Some(parse_revision_marker(&newest.body).unwrap_or_else(|| head_revision.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FOLLOW_UP_MARKER, INITIAL_REVIEW_MARKER};
    use crate::models::{CommitInfo, FollowUpReview};
    use crate::review::comment::follow_up_note;

    const HEAD: &str = "aaaaaaaa11112222333344445555666677778888";
    const NEXT: &str = "bbbbbbbb11112222333344445555666677778888";

    fn note(id: u64, body: impl Into<String>) -> Note {
        Note {
            id,
            body: body.into(),
        }
    }

    #[test]
    fn unseen_request_gets_one_initial_review() {
        let mut sm = ReviewSessionStateMachine::new();
        assert_eq!(sm.observe(1, HEAD, &[]), ReviewAction::InitialReview);
        sm.complete_initial(1, HEAD, ReviewContext::default());
        assert_eq!(sm.observe(1, HEAD, &[]), ReviewAction::Idle);
        assert_eq!(sm.observe(1, HEAD, &[]), ReviewAction::Idle);
    }

    #[test]
    fn incomplete_initial_review_is_retried() {
        let mut sm = ReviewSessionStateMachine::new();
        assert_eq!(sm.observe(1, HEAD, &[]), ReviewAction::InitialReview);
        assert_eq!(sm.phase(1), Some(&SessionPhase::InitialPending));
        assert_eq!(sm.observe(1, HEAD, &[]), ReviewAction::InitialReview);
    }

    #[test]
    fn replayed_history_never_repeats_initial_review() {
        let notes = vec![
            note(3, "LGTM"),
            note(4, format!("{INITIAL_REVIEW_MARKER}\n\n**Revision:** `aaaaaaaa`")),
        ];
        let mut sm = ReviewSessionStateMachine::new();
        assert_eq!(sm.observe(9, HEAD, &notes), ReviewAction::Idle);
        assert_eq!(sm.observe(9, HEAD, &notes), ReviewAction::Idle);

        let mut restarted = ReviewSessionStateMachine::new();
        assert_eq!(restarted.observe(9, HEAD, &notes), ReviewAction::Idle);
    }

    #[test]
    fn only_a_new_revision_triggers_one_follow_up() {
        let mut sm = ReviewSessionStateMachine::new();
        sm.observe(1, HEAD, &[]);
        sm.complete_initial(1, HEAD, ReviewContext::default());

        let polls = [HEAD, NEXT, NEXT];
        let mut follow_ups = Vec::new();
        for head in polls {
            if let ReviewAction::FollowUp { revision } = sm.observe(1, head, &[]) {
                sm.complete_follow_up(1, &revision);
                follow_ups.push(revision);
            }
        }
        assert_eq!(follow_ups, vec![NEXT.to_string()]);
    }

    #[test]
    fn follow_up_marker_survives_restart() {
        let commit = CommitInfo {
            id: NEXT.into(),
            author_name: "dev".into(),
            ..CommitInfo::default()
        };
        let body = follow_up_note(&commit, &FollowUpReview::default(), "now");
        let notes = vec![
            note(1, format!("{INITIAL_REVIEW_MARKER}\n**Revision:** `aaaaaaaa`")),
            note(2, body),
        ];

        let mut sm = ReviewSessionStateMachine::new();
        assert_eq!(sm.observe(1, NEXT, &notes), ReviewAction::Idle);
        assert_eq!(
            sm.phase(1),
            Some(&SessionPhase::InitialDone {
                revision: "bbbbbbbb".into()
            })
        );
    }

    #[test]
    fn stale_history_triggers_follow_up_for_head() {
        let notes = vec![note(5, format!("{INITIAL_REVIEW_MARKER}\n**Revision:** `aaaaaaaa`"))];
        let mut sm = ReviewSessionStateMachine::new();
        assert_eq!(
            sm.observe(1, NEXT, &notes),
            ReviewAction::FollowUp {
                revision: NEXT.into()
            }
        );
    }

    #[test]
    fn reconstruction_prefers_newest_marker() {
        let notes = vec![
            note(10, format!("{FOLLOW_UP_MARKER}\n**Commit:** `bbbbbbbb` by dev")),
            note(2, format!("{INITIAL_REVIEW_MARKER}\n**Revision:** `aaaaaaaa`")),
        ];
        assert_eq!(reconstruct_from_notes(&notes, HEAD).as_deref(), Some("bbbbbbbb"));
    }

    #[test]
    fn reconstruction_edge_cases() {
        assert_eq!(reconstruct_from_notes(&[note(1, "thanks")], HEAD), None);
        let unmarked = [note(1, format!("{INITIAL_REVIEW_MARKER}\nno revision here"))];
        assert_eq!(reconstruct_from_notes(&unmarked, HEAD).as_deref(), Some(HEAD));
        let follow_only = [note(1, format!("{FOLLOW_UP_MARKER}\n**Commit:** `bbbbbbbb` by x"))];
        assert_eq!(reconstruct_from_notes(&follow_only, HEAD).as_deref(), Some("bbbbbbbb"));
    }

    #[test]
    fn retain_open_drops_closed_requests() {
        let mut sm = ReviewSessionStateMachine::new();
        sm.complete_initial(1, HEAD, ReviewContext::default());
        sm.complete_initial(2, HEAD, ReviewContext::default());
        sm.retain_open(&[2]);
        assert_eq!(sm.len(), 1);
        assert!(sm.phase(1).is_none());
        assert!(!sm.needs_history(2));
        assert!(sm.needs_history(1));
    }
}
