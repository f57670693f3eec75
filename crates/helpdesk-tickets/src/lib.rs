//! Helpdesk tickets crate - helper pools and least-busy ticket routing.

pub mod assign;
pub mod router;

pub use assign::assign_least_busy_helper;
pub use router::{HelperRemoval, NewTicket, Reassignment, TicketFilter, TicketRouter, TicketUpdate};
