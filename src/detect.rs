//! Change detection between stored and freshly probed queue positions.

use crate::order::Order;

/// True when the probed position is the first known value or differs from
/// the stored one. The fulfilled sentinel `0` is an ordinary value here.
pub fn has_changed(last: Option<u32>, probed: u32) -> bool {
    last != Some(probed)
}

/// Update rule: overwrite the stored position when it was unset or differs.
/// Returns whether a notification is due for this order.
pub fn apply(order: &mut Order, probed: u32) -> bool {
    if has_changed(order.queue_nr, probed) {
        order.queue_nr = Some(probed);
        true
    } else {
        false
    }
}
