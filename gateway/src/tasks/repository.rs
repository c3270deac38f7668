//! 任务存储
//!
//! 进程内实现，重启后数据丢失

use crate::tasks::model::{Task, TaskPatch, TaskStats};
use crate::tasks::query::TaskQuery;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use tasker_common::UserId;
use tasker_errors::AppResult;
use uuid::Uuid;

/// 任务存储接口，所有操作都限定在单个用户内
#[async_trait]
pub trait TaskRepository: Send + Sync + Debug {
    async fn insert(&self, task: Task) -> AppResult<Task>;

    async fn find(&self, user_id: &UserId, id: Uuid) -> AppResult<Option<Task>>;

    async fn update(&self, user_id: &UserId, id: Uuid, patch: TaskPatch)
    -> AppResult<Option<Task>>;

    async fn delete(&self, user_id: &UserId, id: Uuid) -> AppResult<bool>;

    /// 返回当前页和过滤后的总数
    async fn list(&self, user_id: &UserId, query: &TaskQuery) -> AppResult<(Vec<Task>, u64)>;

    async fn stats(&self, user_id: &UserId) -> AppResult<TaskStats>;
}

#[derive(Debug, Clone)]
struct StoredTask {
    seq: u64,
    task: Task,
}

/// 内存任务存储
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<Uuid, StoredTask>,
    next_seq: AtomicU64,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: Task) -> AppResult<Task> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.tasks.insert(
            task.id,
            StoredTask {
                seq,
                task: task.clone(),
            },
        );
        Ok(task)
    }

    async fn find(&self, user_id: &UserId, id: Uuid) -> AppResult<Option<Task>> {
        Ok(self
            .tasks
            .get(&id)
            .filter(|stored| &stored.task.user_id == user_id)
            .map(|stored| stored.task.clone()))
    }

    async fn update(
        &self,
        user_id: &UserId,
        id: Uuid,
        patch: TaskPatch,
    ) -> AppResult<Option<Task>> {
        match self.tasks.get_mut(&id) {
            Some(mut stored) if &stored.task.user_id == user_id => {
                stored.task.apply(patch);
                Ok(Some(stored.task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, user_id: &UserId, id: Uuid) -> AppResult<bool> {
        Ok(self
            .tasks
            .remove_if(&id, |_, stored| &stored.task.user_id == user_id)
            .is_some())
    }

    async fn list(&self, user_id: &UserId, query: &TaskQuery) -> AppResult<(Vec<Task>, u64)> {
        let mut matching: Vec<StoredTask> = self
            .tasks
            .iter()
            .filter(|stored| &stored.task.user_id == user_id && query.matches(&stored.task))
            .map(|stored| stored.value().clone())
            .collect();

        // 先按插入顺序倒序，稳定排序后相同键保持新任务在前
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));
        matching.sort_by(|a, b| query.compare(&a.task, &b.task));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.pagination.offset())
            .take(query.pagination.limit as usize)
            .map(|stored| stored.task)
            .collect();

        Ok((page, total))
    }

    async fn stats(&self, user_id: &UserId) -> AppResult<TaskStats> {
        let (total, completed) = self
            .tasks
            .iter()
            .filter(|stored| &stored.task.user_id == user_id)
            .fold((0u64, 0u64), |(total, completed), stored| {
                (total + 1, completed + u64::from(stored.task.completed))
            });
        Ok(TaskStats::new(total, completed))
    }
}
