use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use tracing::trace;
use uuid::Uuid;

use crate::datetime::to_project_date;
use crate::task::{Priority, Task};

/// Named preset filter applied on top of the explicit criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    All,
    Today,
    Upcoming,
    Completed,
}

impl ViewMode {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "today" => Some(Self::Today),
            "upcoming" => Some(Self::Upcoming),
            "completed" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Upcoming => "upcoming",
            Self::Completed => "completed",
        }
    }
}

/// Explicit filter criteria. Everything supplied must hold (logical AND);
/// an empty criteria set matches every task.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    pub search: Option<String>,
    pub category: Option<Uuid>,
    pub priority: Option<Priority>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.category.is_none() && self.priority.is_none()
    }
}

/// Reduce a task collection to the display-ready ordered sequence: apply
/// criteria and view mode, then the four-key total order. Pure; the input
/// slice is never mutated.
pub fn filter_and_sort(
    tasks: &[Task],
    criteria: &Criteria,
    view: ViewMode,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let mut rows: Vec<Task> = tasks
        .iter()
        .filter(|task| matches(task, criteria, view, now))
        .cloned()
        .collect();

    // Vec::sort_by is stable, so ties beyond the final key keep input order.
    rows.sort_by(compare);
    rows
}

fn matches(task: &Task, criteria: &Criteria, view: ViewMode, now: DateTime<Utc>) -> bool {
    if let Some(query) = criteria.search.as_deref()
        && !task.matches_query(query)
    {
        return false;
    }

    if let Some(category) = criteria.category
        && task.category != Some(category)
    {
        return false;
    }

    if let Some(priority) = criteria.priority
        && task.priority != priority
    {
        return false;
    }

    let ok = match view {
        ViewMode::All => true,
        ViewMode::Today => task
            .due
            .is_some_and(|due| to_project_date(due) == to_project_date(now)),
        // Calendar-day cutoff: a task due earlier today stays upcoming
        // until the day rolls over, independent of its clock time.
        ViewMode::Upcoming => {
            !task.completed
                && task
                    .due
                    .is_some_and(|due| to_project_date(due) >= to_project_date(now))
        }
        ViewMode::Completed => task.completed,
    };

    trace!(id = %task.id, view = view.as_str(), ok, "view filter evaluation");
    ok
}

/// Sort keys, in priority order: incomplete first, then priority
/// high/medium/low, then dated-before-undated with earlier dates first,
/// then newest `created_at`.
fn compare(a: &Task, b: &Task) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| match (a.due, b.due) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.created_at.cmp(&a.created_at))
}
