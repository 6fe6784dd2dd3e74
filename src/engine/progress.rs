use crate::domain::MilestoneStatus;

/// True only when a milestone moves into COMPLETED from any other status.
///
/// Re-completing an already completed milestone is not a transition.
pub fn enters_completed(previous: MilestoneStatus, next: MilestoneStatus) -> bool {
    previous != MilestoneStatus::Completed && next == MilestoneStatus::Completed
}

/// Rounded share of completed milestones, 0..=100.
///
/// An order without milestones is at 0. Halves round up.
pub fn progress_percentage(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((200 * completed + total) / (2 * total)) as u8
}

/// Progress over a set of milestone statuses.
pub fn progress_from_statuses(statuses: &[MilestoneStatus]) -> u8 {
    let completed = statuses
        .iter()
        .filter(|s| **s == MilestoneStatus::Completed)
        .count();
    progress_percentage(completed as u64, statuses.len() as u64)
}
