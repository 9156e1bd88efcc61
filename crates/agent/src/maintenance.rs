//! Out-of-band control messages: trim, skip-waiting and version queries.

use futures_util::future::try_join_all;
use offcache_core::{ControlMessage, Error, Partition, VersionReply};
use tokio::sync::oneshot;

use crate::agent::Agent;

/// Delete the oldest entries of a partition until at most `max_entries` remain.
///
/// Returns the number of deleted entries.
pub async fn trim_partition(partition: &Partition, max_entries: usize) -> Result<usize, Error> {
    let keys = partition.keys().await?;
    if keys.len() <= max_entries {
        return Ok(0);
    }

    let excess = keys.len() - max_entries;
    let deleted = try_join_all(keys[..excess].iter().map(|key| partition.delete(key))).await?;
    Ok(deleted.into_iter().filter(|d| *d).count())
}

impl Agent {
    /// Handle a control message.
    ///
    /// `reply` carries the answer to `GET_VERSION`; other messages ignore it.
    /// Unknown messages are ignored.
    pub async fn handle_message(
        &self, message: ControlMessage, reply: Option<oneshot::Sender<VersionReply>>,
    ) -> Result<(), Error> {
        match message {
            ControlMessage::CleanCache => {
                self.clean_dynamic_cache().await?;
            }
            ControlMessage::SkipWaiting => {
                self.skip_waiting().await?;
            }
            ControlMessage::GetVersion => {
                let version = VersionReply { version: self.config().version_tag() };
                match reply {
                    Some(tx) => {
                        if tx.send(version).is_err() {
                            tracing::warn!("version reply channel closed before reply");
                        }
                    }
                    None => tracing::warn!("GET_VERSION received without a reply channel"),
                }
            }
            ControlMessage::Unknown => tracing::debug!("ignoring unrecognized control message"),
        }
        Ok(())
    }

    /// Trim the dynamic partition to the configured ceiling.
    pub async fn clean_dynamic_cache(&self) -> Result<usize, Error> {
        let partition = self.db().open_partition(&self.config().dynamic_cache_name()).await?;
        let deleted = trim_partition(&partition, self.config().dynamic_max_entries).await?;
        tracing::info!("trimmed {} entries from {}", deleted, partition.name());
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offcache_core::{CacheDb, Destination, RequestDescriptor, Response, ResponseKind};
    use url::Url;

    fn get(i: usize) -> RequestDescriptor {
        RequestDescriptor::get(Url::parse(&format!("https://example.com/item/{i}")).unwrap(), Destination::Other)
    }

    async fn filled(count: usize) -> Partition {
        let db = CacheDb::open_in_memory().await.unwrap();
        let partition = db.open_partition("site-dynamic-v1").await.unwrap();
        for i in 0..count {
            partition.put(&get(i), Response::new(200, ResponseKind::Basic, format!("{i}"))).await.unwrap();
        }
        partition
    }

    #[tokio::test]
    async fn test_trim_under_ceiling_is_noop() {
        let partition = filled(3).await;
        assert_eq!(trim_partition(&partition, 5).await.unwrap(), 0);
        assert_eq!(partition.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_trim_at_ceiling_is_noop() {
        let partition = filled(5).await;
        assert_eq!(trim_partition(&partition, 5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_trim_removes_oldest() {
        let partition = filled(8).await;
        assert_eq!(trim_partition(&partition, 5).await.unwrap(), 3);

        let keys = partition.keys().await.unwrap();
        let paths: Vec<&str> = keys.iter().map(|k| k.url().path()).collect();
        assert_eq!(paths, vec!["/item/3", "/item/4", "/item/5", "/item/6", "/item/7"]);
    }
}
