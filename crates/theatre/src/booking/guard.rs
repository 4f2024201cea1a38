use chrono::Duration;

use super::domain::{Screening, ScreeningId};

/// Admission check for new or rescheduled screenings.
///
/// Every existing screening in the proposal's room is compared against the proposal,
/// so a check costs O(screenings in that room). An interval tree keyed by room would
/// replace the scan once rooms carry large schedules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulingGuard;

impl SchedulingGuard {
    /// `existing` pairs each screening with the length of the movie it shows.
    /// `replacing` names the stored screening the proposal moves, if any.
    pub fn can_admit<'a, I>(
        &self,
        proposed: &Screening,
        proposed_length: Duration,
        replacing: Option<ScreeningId>,
        existing: I,
    ) -> bool
    where
        I: IntoIterator<Item = (&'a Screening, Duration)>,
    {
        self.first_conflict(proposed, proposed_length, replacing, existing)
            .is_none()
    }

    /// First same-room screening whose slot overlaps the proposal. The screening
    /// named by `replacing` is skipped so a move never conflicts with its previous
    /// slot. The proposal's own `id` is not consulted.
    pub fn first_conflict<'a, I>(
        &self,
        proposed: &Screening,
        proposed_length: Duration,
        replacing: Option<ScreeningId>,
        existing: I,
    ) -> Option<ScreeningId>
    where
        I: IntoIterator<Item = (&'a Screening, Duration)>,
    {
        let slot = proposed.interval(proposed_length);
        existing
            .into_iter()
            .filter(|(screening, _)| {
                screening.room == proposed.room && Some(screening.id) != replacing
            })
            .find(|(screening, length)| slot.overlaps(&screening.interval(*length)))
            .map(|(screening, _)| screening.id)
    }
}
