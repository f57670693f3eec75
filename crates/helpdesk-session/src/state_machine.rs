//! Chat mode transitions.
//!
//! AI -> Human is a handoff (summarize, persist, evict). Human -> AI is a
//! plain field flip; the next AI-mode message rebuilds the bot lazily.
//! Requests for the mode a chat is already in change nothing.

use helpdesk_core::types::ChatMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Handoff,
    Resume,
}

pub fn plan_transition(from: ChatMode, to: ChatMode) -> Transition {
    match (from, to) {
        (ChatMode::Ai, ChatMode::Human) => Transition::Handoff,
        (ChatMode::Human, ChatMode::Ai) => Transition::Resume,
        (ChatMode::Ai, ChatMode::Ai) | (ChatMode::Human, ChatMode::Human) => Transition::Unchanged,
    }
}
