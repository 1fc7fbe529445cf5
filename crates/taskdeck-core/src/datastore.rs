use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::category::Category;
use crate::error::{StoreError, StoreResult};
use crate::repo::{CategoryRepository, TaskRepository};
use crate::task::Task;

/// File layout of a taskdeck data directory: one JSONL file per entity
/// kind, created empty on first open.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub categories_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let categories_path = data_dir.join("categories.data");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }
        if !categories_path.exists() {
            fs::write(&categories_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            categories = %categories_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            categories_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn task_repository(&self) -> StoreResult<FileTaskRepository> {
        let cache = load_jsonl(&self.tasks_path)
            .context("failed to load tasks.data")
            .map_err(StoreError::persistence)?;
        Ok(FileTaskRepository {
            path: self.tasks_path.clone(),
            cache,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn category_repository(&self) -> StoreResult<FileCategoryRepository> {
        let cache = load_jsonl(&self.categories_path)
            .context("failed to load categories.data")
            .map_err(StoreError::persistence)?;
        Ok(FileCategoryRepository {
            path: self.categories_path.clone(),
            cache,
        })
    }
}

/// JSONL-backed task repository. The cache is the collection; every
/// mutation is written to a fresh snapshot first and the cache only
/// advances once the swap succeeded, so a failed write changes nothing.
#[derive(Debug)]
pub struct FileTaskRepository {
    path: PathBuf,
    cache: Vec<Task>,
}

impl TaskRepository for FileTaskRepository {
    fn list(&self) -> StoreResult<Vec<Task>> {
        Ok(self.cache.clone())
    }

    fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.cache.iter().find(|t| t.id == id).cloned())
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    fn insert(&mut self, task: Task) -> StoreResult<Task> {
        let mut next = self.cache.clone();
        next.push(task.clone());
        persist(&self.path, &next)?;
        self.cache = next;
        Ok(task)
    }

    #[tracing::instrument(skip(self, task), fields(id = %id))]
    fn replace(&mut self, id: Uuid, task: Task) -> StoreResult<Option<Task>> {
        let Some(idx) = self.cache.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        let mut next = self.cache.clone();
        next[idx] = task.clone();
        persist(&self.path, &next)?;
        self.cache = next;
        Ok(Some(task))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn remove(&mut self, id: Uuid) -> StoreResult<Option<Task>> {
        let Some(idx) = self.cache.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        let mut next = self.cache.clone();
        let removed = next.remove(idx);
        persist(&self.path, &next)?;
        self.cache = next;
        Ok(Some(removed))
    }
}

#[derive(Debug)]
pub struct FileCategoryRepository {
    path: PathBuf,
    cache: Vec<Category>,
}

impl CategoryRepository for FileCategoryRepository {
    fn list(&self) -> StoreResult<Vec<Category>> {
        Ok(self.cache.clone())
    }

    fn get(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.cache.iter().find(|c| c.id == id).cloned())
    }

    #[tracing::instrument(skip(self, category), fields(id = %category.id))]
    fn insert(&mut self, category: Category) -> StoreResult<Category> {
        let mut next = self.cache.clone();
        next.push(category.clone());
        persist(&self.path, &next)?;
        self.cache = next;
        Ok(category)
    }

    #[tracing::instrument(skip(self, category), fields(id = %id))]
    fn replace(&mut self, id: Uuid, category: Category) -> StoreResult<Option<Category>> {
        let Some(idx) = self.cache.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let mut next = self.cache.clone();
        next[idx] = category.clone();
        persist(&self.path, &next)?;
        self.cache = next;
        Ok(Some(category))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn remove(&mut self, id: Uuid) -> StoreResult<Option<Category>> {
        let Some(idx) = self.cache.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let mut next = self.cache.clone();
        let removed = next.remove(idx);
        persist(&self.path, &next)?;
        self.cache = next;
        Ok(Some(removed))
    }
}

fn persist<T: Serialize>(path: &Path, items: &[T]) -> StoreResult<()> {
    save_jsonl_atomic(path, items).map_err(StoreError::persistence)
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for item in items {
        let serialized = serde_json::to_string(item)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
