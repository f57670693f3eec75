//! Helpdesk session crate - live chat orchestration.
//!
//! Owns the process-local [`SessionRegistry`] of bot instances, the AI/Human
//! mode state machine and the handoff that ends an AI session. All chat
//! operations go through [`ChatService`], which serializes work per chat.
//! Helpers get their own knowledge-base sessions from [`AgentAssistService`].

pub mod assist;
pub mod bot;
pub mod directory;
pub mod handoff;
pub mod registry;
pub mod service;
pub mod state_machine;

pub use assist::{AgentAssistService, AssistReply, AssistSession};
pub use bot::BotInstance;
pub use directory::{Directory, NewCompany};
pub use handoff::HandoffReport;
pub use registry::SessionRegistry;
pub use service::{AssistantReply, ChatService, MessageReply, ModeChange, SessionSettings};
pub use state_machine::{plan_transition, Transition};
