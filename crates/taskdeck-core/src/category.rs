use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Category {
    pub id: Uuid,

    pub name: String,

    pub color: String,

    /// Persisted count cache carried for round-trip fidelity only. The
    /// authoritative number always comes from `counts::count_by_category`.
    #[serde(default)]
    pub task_count: u64,
}

impl Category {
    pub fn new(name: String, color: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            color,
            task_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}
