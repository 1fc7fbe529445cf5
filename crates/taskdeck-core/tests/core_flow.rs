use chrono::{Duration, Utc};
use taskdeck_core::counts::count_by_category;
use taskdeck_core::datastore::DataStore;
use taskdeck_core::filter::{Criteria, ViewMode, filter_and_sort};
use taskdeck_core::stats::compute_stats;
use taskdeck_core::store::{CategoryStore, TaskStore};
use taskdeck_core::task::{Priority, TaskDraft};
use tempfile::tempdir;

#[test]
fn datastore_roundtrip_filtering_and_cascade() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let mut tasks = TaskStore::new(Box::new(store.task_repository().expect("task repo")));
    let mut categories =
        CategoryStore::new(Box::new(store.category_repository().expect("category repo")));

    let now = Utc::now();
    let errands = categories
        .create("Errands", "#0ea5e9")
        .expect("create category");

    let mut urgent = TaskDraft::new("Renew passport");
    urgent.priority = Some(Priority::High);
    urgent.due = Some(now + Duration::days(1));
    urgent.category = Some(errands.id);
    let urgent = tasks.create(urgent, now).expect("create urgent");

    let mut chore = TaskDraft::new("Water plants");
    chore.category = Some(errands.id);
    let chore = tasks.create(chore, now).expect("create chore");

    let someday = tasks
        .create(TaskDraft::new("Read the manual"), now)
        .expect("create someday");

    // Complete one and check the derived view state.
    let done = tasks
        .toggle_complete(someday.id, now)
        .expect("toggle complete");
    assert!(done.completed);
    assert!(done.completed_at.is_some());

    let all = tasks.all().expect("all");
    let rows = filter_and_sort(&all, &Criteria::default(), ViewMode::All, now);
    let titles: Vec<&str> = rows.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Renew passport", "Water plants", "Read the manual"]
    );

    let stats = compute_stats(&all, now);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.overdue, 0);

    let counts = count_by_category(&all);
    assert_eq!(counts.get(&errands.id), Some(&2));

    // Deleting the category clears references but keeps the tasks.
    categories
        .delete(errands.id, &mut tasks)
        .expect("delete category");

    // Everything above survives a reopen from disk.
    let reopened = TaskStore::new(Box::new(store.task_repository().expect("reopen task repo")));
    let persisted = reopened.all().expect("all after reopen");
    assert_eq!(persisted.len(), 3);
    assert!(persisted.iter().all(|task| task.category.is_none()));
    assert!(
        persisted
            .iter()
            .find(|task| task.id == someday.id)
            .is_some_and(|task| task.completed && task.completed_at.is_some())
    );
    assert!(
        persisted
            .iter()
            .find(|task| task.id == urgent.id)
            .is_some_and(|task| task.priority == Priority::High)
    );

    let reopened_categories =
        CategoryStore::new(Box::new(store.category_repository().expect("reopen cats")));
    assert!(reopened_categories.all().expect("all categories").is_empty());

    // chore is still addressable through the surviving store handle too
    assert_eq!(tasks.get(chore.id).expect("get chore").title, "Water plants");
}
