use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use crate::store::ChangeSink;
use crate::ChangeEvent;
use crate::DataNode;
use crate::DataStore;
use crate::Datastore;
use crate::ListenerRegistration;
use crate::Result;
use crate::TreePath;

#[derive(Debug)]
struct Listener {
    partition: Datastore,
    path: TreePath,
    sink: ChangeSink,
}

/// In-memory data tree with one root container per partition.
#[derive(Debug, Default)]
pub struct MemDataStore {
    roots: RwLock<HashMap<Datastore, DataNode>>,
    listeners: Arc<DashMap<u64, Listener>>,
    next_listener_id: AtomicU64,
}

impl MemDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live change listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(
        &self,
        partition: Datastore,
        path: &TreePath,
        data: Option<DataNode>,
    ) {
        let mut delivered = 0usize;
        for listener in self.listeners.iter() {
            if listener.partition != partition || !listener.path.overlaps(path) {
                continue;
            }
            let event = ChangeEvent {
                partition,
                path: path.clone(),
                data: data.clone(),
            };
            if listener.sink.send(event).is_ok() {
                delivered += 1;
            }
        }
        trace!(%partition, %path, delivered, "change dispatched");
    }
}

#[async_trait]
impl DataStore for MemDataStore {
    async fn read(
        &self,
        partition: Datastore,
        path: &TreePath,
    ) -> Result<Option<DataNode>> {
        let roots = self.roots.read();
        Ok(roots
            .get(&partition)
            .and_then(|root| root.descendant(path))
            .cloned())
    }

    fn subscribe_changes(
        &self,
        partition: Datastore,
        path: &TreePath,
        sink: ChangeSink,
    ) -> Result<Box<dyn ListenerRegistration>> {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(
            id,
            Listener {
                partition,
                path: path.clone(),
                sink,
            },
        );
        debug!(listener_id = id, %partition, %path, "change listener registered");

        Ok(Box::new(MemListenerRegistration {
            id,
            listeners: Arc::clone(&self.listeners),
        }))
    }

    async fn merge(
        &self,
        partition: Datastore,
        path: &TreePath,
        value: DataNode,
    ) -> Result<()> {
        let stored = {
            let mut roots = self.roots.write();
            let root = roots
                .entry(partition)
                .or_insert_with(|| DataNode::container(""));

            match path.last() {
                None => {
                    *root = DataNode {
                        name: String::new(),
                        ..value
                    };
                    root.clone()
                }
                Some(name) => {
                    let mut node = root;
                    for segment in &path.segments()[..path.segments().len() - 1] {
                        let idx = match node.children.iter().position(|c| &c.name == segment) {
                            Some(idx) => idx,
                            None => {
                                node.children.push(DataNode::container(segment.as_str()));
                                node.children.len() - 1
                            }
                        };
                        node = &mut node.children[idx];
                    }
                    let value = DataNode {
                        name: name.to_string(),
                        ..value
                    };
                    node.upsert_child(value.clone());
                    value
                }
            }
        };

        self.notify(partition, path, Some(stored));
        Ok(())
    }

    async fn delete(
        &self,
        partition: Datastore,
        path: &TreePath,
    ) -> Result<()> {
        let removed = {
            let mut roots = self.roots.write();
            let Some(root) = roots.get_mut(&partition) else {
                return Ok(());
            };
            match (path.parent(), path.last()) {
                (Some(parent), Some(name)) => {
                    let mut node = Some(root);
                    for segment in parent.segments() {
                        node = node.and_then(|n| n.child_mut(segment));
                    }
                    node.and_then(|n| n.remove_child(name)).is_some()
                }
                _ => {
                    root.children.clear();
                    true
                }
            }
        };

        if removed {
            self.notify(partition, path, None);
        }
        Ok(())
    }
}

/// Removes its listener from the owning store when closed or dropped.
struct MemListenerRegistration {
    id: u64,
    listeners: Arc<DashMap<u64, Listener>>,
}

impl ListenerRegistration for MemListenerRegistration {
    fn close(&self) -> Result<()> {
        if self.listeners.remove(&self.id).is_some() {
            debug!(listener_id = self.id, "change listener closed");
        }
        Ok(())
    }
}

impl Drop for MemListenerRegistration {
    fn drop(&mut self) {
        self.listeners.remove(&self.id);
    }
}
