use std::collections::BTreeMap;

use uuid::Uuid;

use crate::task::Task;

/// Live per-category tally for the sidebar. Only categorized tasks are
/// counted; a category absent from the map has zero tasks. The "all tasks"
/// number is simply `tasks.len()`.
pub fn count_by_category(tasks: &[Task]) -> BTreeMap<Uuid, u64> {
    let mut counts = BTreeMap::new();
    for task in tasks {
        if let Some(category) = task.category {
            *counts.entry(category).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::count_by_category;
    use crate::task::Task;

    #[test]
    fn counts_sum_to_categorized_task_count() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let work = Uuid::new_v4();
        let home = Uuid::new_v4();

        let mut tasks = Vec::new();
        for (title, category) in [
            ("a", Some(work)),
            ("b", Some(work)),
            ("c", Some(home)),
            ("d", None),
        ] {
            let mut task = Task::new(title.to_string(), now);
            task.category = category;
            tasks.push(task);
        }

        let counts = count_by_category(&tasks);
        assert_eq!(counts.get(&work), Some(&2));
        assert_eq!(counts.get(&home), Some(&1));

        let categorized = tasks.iter().filter(|t| t.category.is_some()).count() as u64;
        assert_eq!(counts.values().sum::<u64>(), categorized);
    }

    #[test]
    fn empty_categories_are_absent_not_zero() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let task = Task::new("loose".to_string(), now);

        let counts = count_by_category(&[task]);
        assert!(counts.is_empty());
        assert_eq!(counts.get(&Uuid::new_v4()), None);
    }
}
