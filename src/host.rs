//! The host application's view of which entries are live in an index.

use parking_lot::RwLock;

/// Supplied by the host: the IDs currently considered part of the index.
///
/// Queries are scoped to these IDs, so entries the host has excluded never
/// surface even if they are still stored remotely.
pub trait HostCollection: Send + Sync {
    fn current_sample_ids(&self) -> Vec<String>;

    /// `None` when the index does not track patches.
    fn current_label_ids(&self) -> Option<Vec<String>>;
}

/// A host view backed by explicit ID lists.
#[derive(Debug, Default)]
pub struct LiveIds {
    sample_ids: RwLock<Vec<String>>,
    label_ids: RwLock<Option<Vec<String>>>,
}

impl LiveIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples<I, S>(sample_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let live = Self::new();
        live.set_sample_ids(sample_ids);
        live
    }

    pub fn set_sample_ids<I, S>(&self, sample_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.sample_ids.write() = sample_ids.into_iter().map(Into::into).collect();
    }

    pub fn set_label_ids<I, S>(&self, label_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.label_ids.write() = Some(label_ids.into_iter().map(Into::into).collect());
    }

    /// Append IDs, skipping ones already present.
    pub fn extend_samples<I, S>(&self, sample_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids = self.sample_ids.write();
        for id in sample_ids {
            let id = id.into();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    pub fn remove_samples(&self, sample_ids: &[String]) {
        self.sample_ids.write().retain(|id| !sample_ids.contains(id));
    }
}

impl HostCollection for LiveIds {
    fn current_sample_ids(&self) -> Vec<String> {
        self.sample_ids.read().clone()
    }

    fn current_label_ids(&self) -> Option<Vec<String>> {
        self.label_ids.read().clone()
    }
}
