use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::category::{Category, CategoryPatch};
use crate::error::{StoreError, StoreResult};
use crate::repo::{CategoryRepository, TaskRepository};
use crate::task::{Priority, Task, TaskDraft, TaskPatch};

/// Owns the task collection behind an injected repository. All mutations
/// take `&mut self`, so writers are serialized by the borrow checker; no
/// operation can observe a half-applied sibling.
pub struct TaskStore {
    repo: Box<dyn TaskRepository>,
}

impl TaskStore {
    pub fn new(repo: Box<dyn TaskRepository>) -> Self {
        Self { repo }
    }

    pub fn all(&self) -> StoreResult<Vec<Task>> {
        self.repo.list()
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Task> {
        self.repo
            .get(id)?
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    /// Validation runs before the repository is touched: a rejected draft
    /// leaves the collection exactly as it was.
    #[instrument(skip(self, draft, now))]
    pub fn create(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> StoreResult<Task> {
        let title = validated_title(&draft.title)?;

        let mut task = Task::new(title, now);
        if let Some(priority) = draft.priority {
            task.priority = priority;
        }
        task.category = draft.category;
        task.due = draft.due;
        task.notes = draft.notes.filter(|notes| !notes.trim().is_empty());

        let created = self.repo.insert(task)?;
        info!(id = %created.id, "created task");
        Ok(created)
    }

    /// Merge `patch` into the stored task. Whenever the patch carries
    /// `completed`, `completed_at` is recomputed from it, regardless of
    /// what the caller thought the timestamp should be.
    #[instrument(skip(self, patch, now), fields(id = %id))]
    pub fn update(&mut self, id: Uuid, patch: TaskPatch, now: DateTime<Utc>) -> StoreResult<Task> {
        let new_title = match &patch.title {
            Some(title) => Some(validated_title(title)?),
            None => None,
        };

        let mut task = self.get(id)?;

        if let Some(title) = new_title {
            task.title = title;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(category) = patch.category {
            task.category = category;
        }
        if let Some(due) = patch.due {
            task.due = due;
        }
        if let Some(notes) = patch.notes {
            task.notes = notes.filter(|n| !n.trim().is_empty());
        }
        if let Some(completed) = patch.completed {
            task.set_completed(completed, now);
        }

        self.repo
            .replace(id, task)?
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    /// Returns the removed task so callers can show what went away.
    #[instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: Uuid) -> StoreResult<Task> {
        let removed = self
            .repo
            .remove(id)?
            .ok_or_else(|| StoreError::task_not_found(id))?;
        info!(id = %removed.id, "deleted task");
        Ok(removed)
    }

    /// Flip completion as a single read-modify-write against the
    /// repository, not a get-then-update pair.
    #[instrument(skip(self, now), fields(id = %id))]
    pub fn toggle_complete(&mut self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Task> {
        let mut task = self.get(id)?;
        let flipped = !task.completed;
        task.set_completed(flipped, now);
        self.repo
            .replace(id, task)?
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    /// Best-effort: ids that match nothing are skipped, and the returned
    /// set holds exactly the tasks that were removed. Missing ids are
    /// never an error; only a backend failure aborts the sweep.
    #[instrument(skip(self, ids))]
    pub fn bulk_delete(&mut self, ids: &[Uuid]) -> StoreResult<Vec<Task>> {
        let mut removed = Vec::new();
        for &id in ids {
            if let Some(task) = self.repo.remove(id)? {
                removed.push(task);
            } else {
                debug!(id = %id, "bulk delete skipped missing id");
            }
        }
        info!(requested = ids.len(), removed = removed.len(), "bulk delete");
        Ok(removed)
    }

    /// Case-insensitive substring match over title or notes. Convenience
    /// entry point; `filter::filter_and_sort` is the full engine.
    pub fn search(&self, query: &str) -> StoreResult<Vec<Task>> {
        let tasks = self.repo.list()?;
        Ok(tasks
            .into_iter()
            .filter(|task| task.matches_query(query))
            .collect())
    }

    pub fn by_category(&self, category: Uuid) -> StoreResult<Vec<Task>> {
        let tasks = self.repo.list()?;
        Ok(tasks
            .into_iter()
            .filter(|task| task.category == Some(category))
            .collect())
    }

    pub fn by_priority(&self, priority: Priority) -> StoreResult<Vec<Task>> {
        let tasks = self.repo.list()?;
        Ok(tasks
            .into_iter()
            .filter(|task| task.priority == priority)
            .collect())
    }

    /// Merge externally produced tasks into the collection: existing ids
    /// are replaced wholesale, new ids inserted. The whole batch is
    /// validated before the first write, so a rejected import changes
    /// nothing. Returns (added, updated).
    #[instrument(skip(self, incoming))]
    pub fn import(&mut self, incoming: Vec<Task>) -> StoreResult<(usize, usize)> {
        for task in &incoming {
            if task.title.trim().is_empty() {
                return Err(StoreError::validation(format!(
                    "task {} has an empty title",
                    task.id
                )));
            }
            if task.completed != task.completed_at.is_some() {
                return Err(StoreError::validation(format!(
                    "task {} has inconsistent completed/completed_at",
                    task.id
                )));
            }
        }

        let mut added = 0;
        let mut updated = 0;
        for task in incoming {
            let id = task.id;
            if self.repo.get(id)?.is_some() {
                self.repo
                    .replace(id, task)?
                    .ok_or_else(|| StoreError::task_not_found(id))?;
                updated += 1;
            } else {
                self.repo.insert(task)?;
                added += 1;
            }
        }

        info!(added, updated, "imported tasks");
        Ok((added, updated))
    }

    /// Compensating pass run when a category disappears: every task that
    /// referenced it becomes uncategorized. Returns how many were touched.
    #[instrument(skip(self), fields(category = %category))]
    pub fn clear_category(&mut self, category: Uuid) -> StoreResult<usize> {
        let mut cleared = 0;
        for mut task in self.repo.list()? {
            if task.category == Some(category) {
                let id = task.id;
                task.category = None;
                self.repo
                    .replace(id, task)?
                    .ok_or_else(|| StoreError::task_not_found(id))?;
                cleared += 1;
            }
        }
        info!(cleared, "cleared category references");
        Ok(cleared)
    }
}

/// Owns the category collection. Deleting a category is a reference-clear
/// cascade over the task store, never a task delete.
pub struct CategoryStore {
    repo: Box<dyn CategoryRepository>,
}

impl CategoryStore {
    pub fn new(repo: Box<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub fn all(&self) -> StoreResult<Vec<Category>> {
        self.repo.list()
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Category> {
        self.repo
            .get(id)?
            .ok_or_else(|| StoreError::category_not_found(id))
    }

    pub fn find_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        let needle = name.to_lowercase();
        Ok(self
            .repo
            .list()?
            .into_iter()
            .find(|category| category.name.to_lowercase() == needle))
    }

    #[instrument(skip(self, name, color))]
    pub fn create(&mut self, name: &str, color: &str) -> StoreResult<Category> {
        let name = validated_name(name)?;
        let created = self
            .repo
            .insert(Category::new(name, color.to_string()))?;
        info!(id = %created.id, name = %created.name, "created category");
        Ok(created)
    }

    #[instrument(skip(self, patch), fields(id = %id))]
    pub fn update(&mut self, id: Uuid, patch: CategoryPatch) -> StoreResult<Category> {
        let new_name = match &patch.name {
            Some(name) => Some(validated_name(name)?),
            None => None,
        };

        let mut category = self.get(id)?;
        if let Some(name) = new_name {
            category.name = name;
        }
        if let Some(color) = patch.color {
            category.color = color;
        }

        self.repo
            .replace(id, category)?
            .ok_or_else(|| StoreError::category_not_found(id))
    }

    /// Remove the category, then clear the weak references pointing at it.
    /// The tasks themselves survive.
    #[instrument(skip(self, tasks), fields(id = %id))]
    pub fn delete(&mut self, id: Uuid, tasks: &mut TaskStore) -> StoreResult<Category> {
        let removed = self
            .repo
            .remove(id)?
            .ok_or_else(|| StoreError::category_not_found(id))?;
        let cleared = tasks.clear_category(id)?;
        info!(id = %removed.id, cleared, "deleted category");
        Ok(removed)
    }
}

fn validated_title(raw: &str) -> StoreResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("task title must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn validated_name(raw: &str) -> StoreResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("category name must not be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::{CategoryStore, TaskStore};
    use crate::error::StoreError;
    use crate::repo::{MemoryCategoryRepository, MemoryTaskRepository};
    use crate::task::{Priority, Task, TaskDraft, TaskPatch};

    fn task_store() -> TaskStore {
        TaskStore::new(Box::new(MemoryTaskRepository::new()))
    }

    fn category_store() -> CategoryStore {
        CategoryStore::new(Box::new(MemoryCategoryRepository::new()))
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn create_applies_defaults() {
        let mut store = task_store();
        let task = store
            .create(TaskDraft::new("  Buy milk  "), now())
            .expect("create");

        assert_eq!(task.title, "Buy milk");
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.category.is_none());
        assert!(task.due.is_none());
        assert_eq!(task.created_at, now());
    }

    #[test]
    fn create_rejects_blank_title_and_leaves_store_unchanged() {
        let mut store = task_store();
        store.create(TaskDraft::new("real"), now()).expect("create");

        let err = store.create(TaskDraft::new("   "), now()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.all().expect("all").len(), 1);
    }

    #[test]
    fn update_recomputes_completed_at_from_completed_flag() {
        let mut store = task_store();
        let task = store.create(TaskDraft::new("ship"), now()).expect("create");

        let done = store
            .update(
                task.id,
                TaskPatch {
                    completed: Some(true),
                    ..TaskPatch::default()
                },
                now(),
            )
            .expect("update");
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(now()));

        let reopened = store
            .update(
                task.id,
                TaskPatch {
                    completed: Some(false),
                    ..TaskPatch::default()
                },
                now(),
            )
            .expect("update");
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn update_missing_id_is_not_found() {
        let mut store = task_store();
        let err = store
            .update(Uuid::new_v4(), TaskPatch::default(), now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "task", .. }));
    }

    #[test]
    fn update_can_clear_due_and_category() {
        let mut store = task_store();
        let mut draft = TaskDraft::new("clearable");
        draft.due = Some(now());
        draft.category = Some(Uuid::new_v4());
        let task = store.create(draft, now()).expect("create");

        let cleared = store
            .update(
                task.id,
                TaskPatch {
                    due: Some(None),
                    category: Some(None),
                    ..TaskPatch::default()
                },
                now(),
            )
            .expect("update");
        assert!(cleared.due.is_none());
        assert!(cleared.category.is_none());
    }

    #[test]
    fn toggle_twice_returns_to_original_state() {
        let mut store = task_store();
        let task = store.create(TaskDraft::new("flip"), now()).expect("create");

        let on = store.toggle_complete(task.id, now()).expect("toggle on");
        assert!(on.completed);
        assert_eq!(on.completed_at, Some(now()));

        let off = store.toggle_complete(task.id, now()).expect("toggle off");
        assert!(!off.completed);
        assert!(off.completed_at.is_none());
    }

    #[test]
    fn delete_returns_removed_task() {
        let mut store = task_store();
        let task = store.create(TaskDraft::new("gone"), now()).expect("create");

        let removed = store.delete(task.id).expect("delete");
        assert_eq!(removed.id, task.id);

        let err = store.delete(task.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn bulk_delete_skips_missing_ids() {
        let mut store = task_store();
        let a = store.create(TaskDraft::new("a"), now()).expect("create");
        let b = store.create(TaskDraft::new("b"), now()).expect("create");

        let removed = store
            .bulk_delete(&[a.id, Uuid::new_v4(), b.id])
            .expect("bulk delete");
        assert_eq!(removed.len(), 2);
        assert!(store.all().expect("all").is_empty());
    }

    #[test]
    fn search_and_convenience_filters() {
        let mut store = task_store();
        let category = Uuid::new_v4();

        let mut groceries = TaskDraft::new("Buy groceries");
        groceries.notes = Some("milk, eggs".to_string());
        groceries.category = Some(category);
        store.create(groceries, now()).expect("create");

        let mut urgent = TaskDraft::new("File taxes");
        urgent.priority = Some(Priority::High);
        store.create(urgent, now()).expect("create");

        assert_eq!(store.search("EGGS").expect("search").len(), 1);
        assert_eq!(store.search("nothing").expect("search").len(), 0);
        assert_eq!(store.by_category(category).expect("by_category").len(), 1);
        assert_eq!(
            store.by_priority(Priority::High).expect("by_priority").len(),
            1
        );
    }

    #[test]
    fn import_validates_the_whole_batch_before_writing() {
        let mut store = task_store();

        let good = Task::new("good".to_string(), now());
        let mut bad = Task::new("bad".to_string(), now());
        bad.completed = true; // completed_at left unset: inconsistent

        let err = store.import(vec![good.clone(), bad]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.all().expect("all").is_empty());

        let (added, updated) = store.import(vec![good.clone()]).expect("import");
        assert_eq!((added, updated), (1, 0));

        let mut replacement = good.clone();
        replacement.title = "renamed".to_string();
        let (added, updated) = store.import(vec![replacement]).expect("import");
        assert_eq!((added, updated), (0, 1));
        assert_eq!(store.all().expect("all")[0].title, "renamed");
    }

    #[test]
    fn category_create_validates_name() {
        let mut categories = category_store();
        let err = categories.create("  ", "#ff0000").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let created = categories.create("Work", "#ff0000").expect("create");
        assert_eq!(created.name, "Work");
        assert_eq!(created.task_count, 0);
    }

    #[test]
    fn deleting_category_clears_references_but_keeps_tasks() {
        let mut categories = category_store();
        let mut tasks = task_store();

        let work = categories.create("Work", "#ff0000").expect("create");
        for title in ["one", "two", "three"] {
            let mut draft = TaskDraft::new(title);
            draft.category = Some(work.id);
            tasks.create(draft, now()).expect("create");
        }
        let mut loose = TaskDraft::new("loose");
        loose.category = None;
        tasks.create(loose, now()).expect("create");

        let removed = categories.delete(work.id, &mut tasks).expect("delete");
        assert_eq!(removed.id, work.id);

        let remaining = tasks.all().expect("all");
        assert_eq!(remaining.len(), 4);
        assert!(remaining.iter().all(|task| task.category.is_none()));
    }
}
