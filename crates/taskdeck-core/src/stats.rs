use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::datetime::to_project_date;
use crate::task::Task;

/// Header counters derived from the live collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub due_today: usize,
    pub overdue: usize,
}

impl Stats {
    /// Rounded percentage of completed tasks; 0 for an empty collection.
    pub fn completion_rate(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let rate = self.completed as f64 / self.total as f64 * 100.0;
        rate.round() as u32
    }
}

/// Calendar-day classification happens in the project timezone. A task due
/// earlier today counts as due-today, never overdue; only calendar days
/// strictly before today are overdue. Both buckets only count incomplete
/// tasks.
pub fn compute_stats(tasks: &[Task], now: DateTime<Utc>) -> Stats {
    let today = to_project_date(now);

    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.completed).count();
    let due_today = tasks
        .iter()
        .filter(|task| {
            !task.completed && task.due.is_some_and(|due| to_project_date(due) == today)
        })
        .count();
    let overdue = tasks
        .iter()
        .filter(|task| {
            !task.completed && task.due.is_some_and(|due| to_project_date(due) < today)
        })
        .count();

    Stats {
        total,
        completed,
        due_today,
        overdue,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::compute_stats;
    use crate::task::Task;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn due_earlier_today_is_due_today_not_overdue() {
        let mut morning = Task::new("due this morning".to_string(), now());
        morning.due = Some(Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap());

        let mut last_night = Task::new("due last night".to_string(), now());
        last_night.due = Some(Utc.with_ymd_and_hms(2024, 6, 14, 23, 0, 0).unwrap());

        let stats = compute_stats(&[morning, last_night], now());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.due_today, 1);
        assert_eq!(stats.overdue, 1);
    }

    #[test]
    fn completed_tasks_leave_due_buckets() {
        let mut done = Task::new("finished yesterday's work".to_string(), now());
        done.due = Some(Utc.with_ymd_and_hms(2024, 6, 14, 9, 0, 0).unwrap());
        done.set_completed(true, now());

        let stats = compute_stats(&[done], now());
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.due_today, 0);
        assert_eq!(stats.overdue, 0);
    }

    #[test]
    fn completion_rate_rounds_and_handles_empty() {
        let stats = compute_stats(&[], now());
        assert_eq!(stats.completion_rate(), 0);

        let mut a = Task::new("a".to_string(), now());
        a.set_completed(true, now());
        let b = Task::new("b".to_string(), now());
        let c = Task::new("c".to_string(), now());

        let stats = compute_stats(&[a, b, c], now());
        // 1/3 -> 33.33...% -> 33
        assert_eq!(stats.completion_rate(), 33);
    }
}
