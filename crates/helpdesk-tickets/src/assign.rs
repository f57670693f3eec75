//! Least-busy helper selection.

use helpdesk_core::types::Helper;

/// The helper with the fewest assigned tickets. Ties go to the helper that
/// comes first in pool order; an empty pool yields `None`.
pub fn assign_least_busy_helper(pool: &[Helper]) -> Option<&Helper> {
    let mut best: Option<&Helper> = None;
    for helper in pool {
        match best {
            Some(current) if helper.load() >= current.load() => {}
            _ => best = Some(helper),
        }
    }
    best
}
