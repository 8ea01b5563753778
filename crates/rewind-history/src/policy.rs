/// Booking decisions for incoming mementos.
///
/// The policy never touches the store. It looks at a snapshot of the
/// engine flags plus the group currently accumulating and returns a
/// [`Booking`] which the store then carries out.
use crate::engine::Mode;
use crate::group::OperationGroup;
use crate::memento::{Memento, Significance};

/// Engine flags relevant to a booking decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BookingContext {
    pub mode: Mode,
    pub tracking: bool,
    pub pending_new_operation: bool,
    pub in_progress: bool,
    pub redo_available: bool,
}

/// Why a memento was dropped instead of booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscardReason {
    /// A member of the accumulating group already covers it.
    Superseded,
    /// Tracking is switched off.
    TrackingDisabled,
    /// A lone `Supporting` memento with no operation to attach to.
    Noise,
}

/// Where the memento ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Append,
    Discard(DiscardReason),
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Booking {
    /// Drop the redo history before anything else (divergence).
    pub clear_redo: bool,
    /// Seal the active group (if non-empty) and clear the pending flag.
    pub start_new_group: bool,
    pub placement: Placement,
}

impl Booking {
    fn place(placement: Placement) -> Self {
        Self {
            clear_redo: false,
            start_new_group: false,
            placement,
        }
    }
}

/// Decides what to do with `memento` given the engine flags and the group
/// currently accumulating (the active group, or the bracket accumulator
/// while undoing/redoing).
pub(crate) fn decide(
    ctx: &BookingContext,
    active: &OperationGroup,
    memento: &dyn Memento,
) -> Booking {
    let significance = memento.significance();

    if ctx.mode.is_bracketed() {
        // Significance and boundaries do not apply while replaying.
        let placement = if active.supersedes(memento) {
            Placement::Discard(DiscardReason::Superseded)
        } else {
            Placement::Append
        };
        return Booking::place(placement);
    }

    // Nothing is booked while tracking is off, so redo history survives.
    if !ctx.tracking {
        return Booking::place(Placement::Discard(DiscardReason::TrackingDisabled));
    }

    let clear_redo = significance != Significance::Supporting && ctx.redo_available;

    let start_new_group = ctx.pending_new_operation
        && !ctx.in_progress
        && significance == Significance::Substantial;

    // After a seal the memento lands in a fresh group, so nothing can
    // supersede it.
    let active_empty = start_new_group || active.is_empty();

    let placement = if ctx.in_progress || !active_empty || significance.is_trackable() {
        if !start_new_group && active.supersedes(memento) {
            Placement::Discard(DiscardReason::Superseded)
        } else {
            Placement::Append
        }
    } else {
        Placement::Discard(DiscardReason::Noise)
    };

    Booking {
        clear_redo,
        start_new_group,
        placement,
    }
}
