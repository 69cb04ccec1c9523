//! Aggregated result of one campaign run.

use crate::messaging::Participant;
use crate::store::Answer;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What happened to one participant during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantOutcome {
    /// Conversation completed; one answer per prompt (some may be `NoResponse`).
    Answered(Vec<Answer>),
    /// The private channel could not be opened, or closed mid-run.
    /// `answers` holds whatever was recorded for this run, padded with
    /// `NoResponse` for the prompts that were never asked.
    Unreachable { reason: String, answers: Vec<Answer> },
    /// Processing failed unexpectedly (storage error, panic).
    Failed { reason: String },
}

/// One roster entry in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub participant: Participant,
    pub outcome: ParticipantOutcome,
}

/// Per-run view of all participants' answers, in roster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    /// Entry for a participant id.
    pub fn get(&self, participant_id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.participant.id == participant_id)
    }

    /// Answers for a participant, if their conversation completed.
    pub fn answers(&self, participant_id: &str) -> Option<&[Answer]> {
        match &self.get(participant_id)?.outcome {
            ParticipantOutcome::Answered(answers) => Some(answers),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn answered_count(&self) -> usize {
        self.count(|o| matches!(o, ParticipantOutcome::Answered(_)))
    }

    pub fn unreachable_count(&self) -> usize {
        self.count(|o| matches!(o, ParticipantOutcome::Unreachable { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, ParticipantOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&ParticipantOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run {}: {} answered, {} unreachable, {} failed",
            self.run_id,
            self.answered_count(),
            self.unreachable_count(),
            self.failed_count()
        )
    }
}
