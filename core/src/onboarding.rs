/// First-run onboarding: a bounded, linear step sequencer
///
/// The sequencer holds no persistent state. Completion is reported once via
/// `Transition::Completed`; the caller owns writing the first-run flag.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingStep {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub icon: String,
}

impl OnboardingStep {
    fn new(title: &str, subtitle: &str, body: &str, icon: &str) -> Self {
        Self {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            body: body.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Result of a single `advance`/`retreat` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// Cursor moved to the given index
    Moved { cursor: usize },
    /// Final step confirmed; emitted exactly once
    Completed,
    /// Nothing changed (cursor at a bound, or already completed)
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct OnboardingSequencer {
    steps: Vec<OnboardingStep>,
    cursor: usize,
    completed: bool,
}

impl OnboardingSequencer {
    /// Sequencer over the stock four-step welcome flow
    pub fn new() -> Self {
        Self::with_steps(default_steps())
    }

    /// Sequencer over a custom step list. An empty list is replaced by the
    /// stock flow so the cursor range is never empty.
    pub fn with_steps(steps: Vec<OnboardingStep>) -> Self {
        let steps = if steps.is_empty() { default_steps() } else { steps };
        Self {
            steps,
            cursor: 0,
            completed: false,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current(&self) -> &OnboardingStep {
        &self.steps[self.cursor]
    }

    pub fn steps(&self) -> &[OnboardingStep] {
        &self.steps
    }

    pub fn is_last(&self) -> bool {
        self.cursor + 1 == self.steps.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Move forward, or complete when already on the last step
    pub fn advance(&mut self) -> Transition {
        if self.completed {
            return Transition::Unchanged;
        }
        if self.is_last() {
            self.completed = true;
            Transition::Completed
        } else {
            self.cursor += 1;
            Transition::Moved {
                cursor: self.cursor,
            }
        }
    }

    /// Move back one step; silently ignored at the first step or after completion
    pub fn retreat(&mut self) -> Transition {
        if self.completed || self.cursor == 0 {
            return Transition::Unchanged;
        }
        self.cursor -= 1;
        Transition::Moved {
            cursor: self.cursor,
        }
    }
}

impl Default for OnboardingSequencer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_steps() -> Vec<OnboardingStep> {
    vec![
        OnboardingStep::new(
            "Privacy First",
            "Your conversations, truly private",
            "End-to-end encryption ensures only you and your contacts can read your messages. No backdoors, no compromises.",
            "shield",
        ),
        OnboardingStep::new(
            "Lightning Fast",
            "Instant messaging, intelligent sorting",
            "AI prioritizes your important conversations while keeping everything synced across devices in real-time.",
            "zap",
        ),
        OnboardingStep::new(
            "Rich Conversations",
            "More than just text",
            "React, reply in threads, share media, and express yourself with a rich set of communication tools.",
            "users",
        ),
        OnboardingStep::new(
            "Ready to Chat",
            "Let's get you started",
            "Welcome to Whisperly! Your secure, intelligent chat experience begins now.",
            "check_circle",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_first_step() {
        let seq = OnboardingSequencer::new();
        assert_eq!(seq.cursor(), 0);
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.current().title, "Privacy First");
        assert!(!seq.is_completed());
    }

    #[test]
    fn test_retreat_at_zero_is_noop() {
        let mut seq = OnboardingSequencer::new();
        assert_eq!(seq.retreat(), Transition::Unchanged);
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn test_advance_to_last_then_complete_once() {
        let mut seq = OnboardingSequencer::new();
        let n = seq.len();

        for i in 1..n {
            assert_eq!(seq.advance(), Transition::Moved { cursor: i });
        }
        assert!(seq.is_last());
        assert!(!seq.is_completed());

        assert_eq!(seq.advance(), Transition::Completed);
        assert!(seq.is_completed());

        // Terminal: further calls change nothing
        assert_eq!(seq.advance(), Transition::Unchanged);
        assert_eq!(seq.retreat(), Transition::Unchanged);
        assert_eq!(seq.cursor(), n - 1);
    }

    #[test]
    fn test_back_and_forth() {
        let mut seq = OnboardingSequencer::new();
        seq.advance();
        seq.advance();
        assert_eq!(seq.retreat(), Transition::Moved { cursor: 1 });
        assert_eq!(seq.current().title, "Lightning Fast");
    }

    #[test]
    fn test_single_step_completes_immediately() {
        let step = OnboardingStep::new("Only", "one", "step", "star");
        let mut seq = OnboardingSequencer::with_steps(vec![step]);
        assert!(seq.is_last());
        assert_eq!(seq.advance(), Transition::Completed);
        assert_eq!(seq.advance(), Transition::Unchanged);
    }
}
