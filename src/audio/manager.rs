use serenity::model::id::GuildId;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::audio::{
    error::PlaybackError,
    item::PlayableItem,
    queue::{Advance, Enqueued, GuildQueues, PlaybackId},
};

type Task = Box<dyn FnOnce(&mut GuildQueues) + Send>;

/// Handle to the task that owns every guild queue.
///
/// Each operation is posted to that task as a closure and the caller waits
/// for the reply, so all mutations are applied one at a time, in arrival
/// order, and never interleave with each other. Closures must not block.
#[derive(Clone)]
pub struct QueueManager {
    tasks: mpsc::UnboundedSender<Task>,
}

impl QueueManager {
    /// Spawns the owning task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tasks, mut inbox) = mpsc::unbounded_channel::<Task>();

        tokio::spawn(async move {
            let mut queues = GuildQueues::new();
            while let Some(task) = inbox.recv().await {
                task(&mut queues);
            }
            debug!("Queue manager stopped");
        });

        info!("🎚️ Queue manager started");
        Self { tasks }
    }

    /// Runs `f` on the queue task and waits for its result.
    pub async fn run<T, F>(&self, f: F) -> Result<T, PlaybackError>
    where
        T: Send + 'static,
        F: FnOnce(&mut GuildQueues) -> T + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.tasks
            .send(Box::new(move |queues: &mut GuildQueues| {
                // The caller may have given up waiting; nothing to do then.
                let _ = reply.send(f(queues));
            }))
            .map_err(|_| PlaybackError::ManagerStopped)?;

        result.await.map_err(|_| PlaybackError::ManagerStopped)
    }

    pub async fn enqueue(&self, guild_id: GuildId, item: PlayableItem) -> Result<Enqueued, PlaybackError> {
        self.run(move |queues| queues.enqueue(guild_id, item)).await
    }

    pub async fn remove(&self, guild_id: GuildId, position: usize) -> Result<PlayableItem, PlaybackError> {
        self.run(move |queues| queues.remove(guild_id, position)).await?
    }

    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.run(move |queues| queues.toggle_loop(guild_id)).await
    }

    pub async fn is_looping(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.run(move |queues| queues.is_looping(guild_id)).await
    }

    pub async fn clear(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.run(move |queues| queues.clear(guild_id)).await
    }

    pub async fn items(&self, guild_id: GuildId) -> Result<Option<Vec<PlayableItem>>, PlaybackError> {
        self.run(move |queues| queues.items(guild_id)).await
    }

    pub async fn finish(
        &self,
        guild_id: GuildId,
        playback: PlaybackId,
        error: Option<String>,
    ) -> Result<Advance, PlaybackError> {
        self.run(move |queues| queues.finish(guild_id, playback, error.as_deref()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::item::tests::media;

    #[tokio::test]
    async fn operations_apply_in_order() {
        let manager = QueueManager::spawn();
        let guild = GuildId::new(7);

        let first = manager.enqueue(guild, media("a")).await.unwrap();
        assert!(matches!(first, Enqueued::Started { .. }));
        assert_eq!(
            manager.enqueue(guild, media("b")).await.unwrap(),
            Enqueued::Queued { position: 1 }
        );
        assert_eq!(manager.remove(guild, 1).await, Ok(media("b")));
        assert!(manager.clear(guild).await.unwrap());
        assert_eq!(manager.items(guild).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_enqueues_start_exactly_once() {
        let manager = QueueManager::spawn();
        let guild = GuildId::new(8);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.enqueue(guild, media(&i.to_string())).await })
            })
            .collect();

        let mut started = 0;
        for handle in handles {
            if let Enqueued::Started { .. } = handle.await.unwrap().unwrap() {
                started += 1;
            }
        }

        assert_eq!(started, 1);
        assert_eq!(manager.items(guild).await.unwrap().map(|items| items.len()), Some(16));
    }
}
