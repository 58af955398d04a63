//! Guardrails: declarative checks applied before and during guarded
//! execution.
//!
//! A blocked action is a normal structured outcome, not an error. Checks
//! run in order; the strongest decision wins, Block over Annotate over
//! Allow.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use carekey_core::{AccessScope, DataCategory};

use crate::predicate::{Predicate, PredicateContext};

/// A single declarative check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guardrail {
    /// Block when the action text matches any pattern (case-insensitive
    /// substring).
    NeverAllow {
        /// Patterns to refuse outright.
        patterns: Vec<String>,
    },
    /// Annotate for human review when the action text matches any pattern.
    RequireHumanValidation {
        /// Patterns that need a second pair of eyes.
        patterns: Vec<String>,
    },
    /// Block once the session has run longer than the limit.
    Timeout {
        /// Maximum session age in seconds.
        max_session_secs: u32,
    },
    /// Block once more than `max_events` checks happened inside the window.
    RateLimit {
        /// Sliding window length in seconds.
        window_secs: u32,
        /// Events allowed per window.
        max_events: u32,
    },
    /// Block when a touched category falls outside the grant scope.
    ScopeLimit,
    /// Block when the predicate holds.
    DenyWhen {
        /// The condition, expressed in the closed predicate language.
        predicate: Predicate,
        /// Reason reported on block.
        reason: String,
    },
}

/// Outcome of running the guardrail set against one action.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailDecision {
    /// Proceed.
    Allow,
    /// Proceed, carrying a note for the transcript.
    Annotate {
        /// The note.
        note: String,
    },
    /// Refuse.
    Block {
        /// Why the action was refused.
        reason: String,
        /// Optional safer alternative to surface to the caller.
        suggestion: Option<String>,
    },
}

impl GuardrailDecision {
    fn strength(&self) -> u8 {
        match self {
            GuardrailDecision::Allow => 0,
            GuardrailDecision::Annotate { .. } => 1,
            GuardrailDecision::Block { .. } => 2,
        }
    }

    /// True if the decision permits execution.
    pub fn permits(&self) -> bool {
        !matches!(self, GuardrailDecision::Block { .. })
    }
}

/// Everything a guardrail may inspect about the pending action.
#[derive(Debug, Clone, Default)]
pub struct GuardrailContext<'a> {
    /// The action, rendered as text.
    pub action_text: String,
    /// Data categories the action touches.
    pub touched_categories: Vec<DataCategory>,
    /// When the session started (Unix milliseconds).
    pub session_started_at_ms: i64,
    /// Current time (Unix milliseconds).
    pub now_ms: i64,
    /// The scope of the attached grant, when one exists.
    pub grant_scope: Option<&'a AccessScope>,
    /// Extra predicate fields.
    pub fields: PredicateContext,
}

/// Sliding-window event counter for rate limits.
#[derive(Debug, Default)]
struct RateWindow {
    events: VecDeque<i64>,
}

impl RateWindow {
    /// Record an event and report how many remain inside the window.
    fn record(&mut self, now_ms: i64, window_secs: u32) -> usize {
        let cutoff = now_ms - i64::from(window_secs) * 1000;
        while self.events.front().is_some_and(|&t| t < cutoff) {
            self.events.pop_front();
        }
        self.events.push_back(now_ms);
        self.events.len()
    }
}

/// An ordered set of guardrails with the mutable state rate limits need.
///
/// Each rail at index `i` owns `rate_windows[i]`, so two rate limits in
/// the same set count and prune independently.
#[derive(Debug, Default)]
pub struct GuardrailSet {
    rails: Vec<Guardrail>,
    rate_windows: Vec<RateWindow>,
}

impl GuardrailSet {
    /// Build a set from an ordered list of rails.
    pub fn new(rails: Vec<Guardrail>) -> Self {
        let rate_windows = rails.iter().map(|_| RateWindow::default()).collect();
        Self {
            rails,
            rate_windows,
        }
    }

    /// The configured rails.
    pub fn rails(&self) -> &[Guardrail] {
        &self.rails
    }

    /// Run every rail against the context and return the strongest
    /// decision.
    pub fn check(&mut self, ctx: &GuardrailContext<'_>) -> GuardrailDecision {
        let mut decision = GuardrailDecision::Allow;
        let haystack = ctx.action_text.to_lowercase();

        for (idx, rail) in self.rails.iter().enumerate() {
            let verdict = match rail {
                Guardrail::NeverAllow { patterns } => {
                    match patterns.iter().find(|p| haystack.contains(&p.to_lowercase())) {
                        Some(pattern) => GuardrailDecision::Block {
                            reason: format!("action matches refused pattern '{pattern}'"),
                            suggestion: None,
                        },
                        None => GuardrailDecision::Allow,
                    }
                }
                Guardrail::RequireHumanValidation { patterns } => {
                    match patterns.iter().find(|p| haystack.contains(&p.to_lowercase())) {
                        Some(pattern) => GuardrailDecision::Annotate {
                            note: format!("matched '{pattern}', flagged for human validation"),
                        },
                        None => GuardrailDecision::Allow,
                    }
                }
                Guardrail::Timeout { max_session_secs } => {
                    let age_ms = ctx.now_ms - ctx.session_started_at_ms;
                    if age_ms > i64::from(*max_session_secs) * 1000 {
                        GuardrailDecision::Block {
                            reason: format!("session exceeded {max_session_secs}s limit"),
                            suggestion: Some("start a fresh session".into()),
                        }
                    } else {
                        GuardrailDecision::Allow
                    }
                }
                Guardrail::RateLimit {
                    window_secs,
                    max_events,
                } => {
                    let seen = self.rate_windows[idx].record(ctx.now_ms, *window_secs);
                    if seen > *max_events as usize {
                        GuardrailDecision::Block {
                            reason: format!(
                                "rate limit exceeded: {seen} events in {window_secs}s window"
                            ),
                            suggestion: Some("retry after the window drains".into()),
                        }
                    } else {
                        GuardrailDecision::Allow
                    }
                }
                Guardrail::ScopeLimit => match ctx.grant_scope {
                    Some(scope) if scope.covers_categories(ctx.touched_categories.iter()) => {
                        GuardrailDecision::Allow
                    }
                    Some(_) => GuardrailDecision::Block {
                        reason: "action touches categories outside the grant scope".into(),
                        suggestion: Some("request a wider grant".into()),
                    },
                    // No grant attached: any data touch is out of scope.
                    None if ctx.touched_categories.is_empty() => GuardrailDecision::Allow,
                    None => GuardrailDecision::Block {
                        reason: "no grant attached to the session".into(),
                        suggestion: Some("request access first".into()),
                    },
                },
                Guardrail::DenyWhen { predicate, reason } => {
                    let mut fields = ctx.fields.clone();
                    fields = fields.set("action", ctx.action_text.clone());
                    if predicate.evaluate(&fields) {
                        GuardrailDecision::Block {
                            reason: reason.clone(),
                            suggestion: None,
                        }
                    } else {
                        GuardrailDecision::Allow
                    }
                }
            };

            if verdict.strength() > decision.strength() {
                decision = verdict;
            }
        }

        decision
    }
}
