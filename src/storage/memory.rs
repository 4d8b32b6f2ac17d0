//! In-memory [`BlobStore`] used by tests: revision-aware, with operation
//! counters so tests can assert on storage traffic.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::storage::provider::{BlobStore, Precondition, PutOptions, Revision};

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, (Bytes, u64)>,
    next_version: u64,
    deleted: Vec<String>,
}

pub struct MemoryStore {
    base_url: String,
    inner: Mutex<Inner>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    fail_conditional_put: AtomicBool,
}

impl MemoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            inner: Mutex::new(Inner::default()),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            fail_conditional_put: AtomicBool::new(false),
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Names of every object deleted so far, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.inner.lock().unwrap().deleted.clone()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().objects.keys().cloned().collect()
    }

    /// Make the next revision-conditioned put fail with `Conflict`, as if a
    /// concurrent writer won the race.
    pub fn fail_next_conditional_put(&self) {
        self.fail_conditional_put.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<(Bytes, Revision)>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .objects
            .get(name)
            .map(|(data, version)| (data.clone(), Revision::new(version.to_string()))))
    }

    async fn put(&self, name: &str, data: Bytes, opts: PutOptions) -> Result<Revision> {
        let mut inner = self.inner.lock().unwrap();
        match &opts.precondition {
            Precondition::Any => {}
            Precondition::IfAbsent => {
                if inner.objects.contains_key(name) {
                    return Err(AppError::Conflict(format!("{} exists", name)));
                }
            }
            Precondition::IfRevision(expected) => {
                if self.fail_conditional_put.swap(false, Ordering::SeqCst) {
                    return Err(AppError::Conflict("simulated concurrent write".to_string()));
                }
                let current = inner
                    .objects
                    .get(name)
                    .map(|(_, version)| version.to_string());
                if current.as_deref() != Some(expected.as_str()) {
                    return Err(AppError::Conflict(format!("{} changed", name)));
                }
            }
        }

        inner.next_version += 1;
        let version = inner.next_version;
        inner.objects.insert(name.to_string(), (data, version));
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(Revision::new(version.to_string()))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.remove(name);
        inner.deleted.push(name.to_string());
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.inner.lock().unwrap().objects.contains_key(name))
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .objects
            .keys()
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .cloned()
            .collect())
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn signed_url(&self, name: &str, _valid_for: Duration) -> String {
        format!("{}/{}?sig=stub", self.base_url, name)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
