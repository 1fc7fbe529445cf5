use uuid::Uuid;

use crate::category::Category;
use crate::error::StoreResult;
use crate::task::Task;

/// Persistence boundary for tasks. `get`/`replace`/`remove` signal
/// not-found with `None`; the stores turn that into a typed error.
/// Implementations must apply each mutation atomically: on failure the
/// visible collection is unchanged.
pub trait TaskRepository {
    fn list(&self) -> StoreResult<Vec<Task>>;
    fn get(&self, id: Uuid) -> StoreResult<Option<Task>>;
    fn insert(&mut self, task: Task) -> StoreResult<Task>;
    fn replace(&mut self, id: Uuid, task: Task) -> StoreResult<Option<Task>>;
    fn remove(&mut self, id: Uuid) -> StoreResult<Option<Task>>;
}

pub trait CategoryRepository {
    fn list(&self) -> StoreResult<Vec<Category>>;
    fn get(&self, id: Uuid) -> StoreResult<Option<Category>>;
    fn insert(&mut self, category: Category) -> StoreResult<Category>;
    fn replace(&mut self, id: Uuid, category: Category) -> StoreResult<Option<Category>>;
    fn remove(&mut self, id: Uuid) -> StoreResult<Option<Category>>;
}

/// Vec-backed repository for tests and embedding without a data directory.
#[derive(Debug, Default)]
pub struct MemoryTaskRepository {
    tasks: Vec<Task>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRepository for MemoryTaskRepository {
    fn list(&self) -> StoreResult<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.tasks.iter().find(|t| t.id == id).cloned())
    }

    fn insert(&mut self, task: Task) -> StoreResult<Task> {
        self.tasks.push(task.clone());
        Ok(task)
    }

    fn replace(&mut self, id: Uuid, task: Task) -> StoreResult<Option<Task>> {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn remove(&mut self, id: Uuid) -> StoreResult<Option<Task>> {
        match self.tasks.iter().position(|t| t.id == id) {
            Some(idx) => Ok(Some(self.tasks.remove(idx))),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCategoryRepository {
    categories: Vec<Category>,
}

impl MemoryCategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CategoryRepository for MemoryCategoryRepository {
    fn list(&self) -> StoreResult<Vec<Category>> {
        Ok(self.categories.clone())
    }

    fn get(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.categories.iter().find(|c| c.id == id).cloned())
    }

    fn insert(&mut self, category: Category) -> StoreResult<Category> {
        self.categories.push(category.clone());
        Ok(category)
    }

    fn replace(&mut self, id: Uuid, category: Category) -> StoreResult<Option<Category>> {
        match self.categories.iter_mut().find(|c| c.id == id) {
            Some(slot) => {
                *slot = category.clone();
                Ok(Some(category))
            }
            None => Ok(None),
        }
    }

    fn remove(&mut self, id: Uuid) -> StoreResult<Option<Category>> {
        match self.categories.iter().position(|c| c.id == id) {
            Some(idx) => Ok(Some(self.categories.remove(idx))),
            None => Ok(None),
        }
    }
}
