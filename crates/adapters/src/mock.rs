//! Scripted test doubles for every capability trait.
//!
//! Each double records the calls it receives and answers according to a
//! [`MockBehaviour`] injected at construction time, so tests can stage
//! "fails twice then succeeds" style collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{AdapterError, CacheInvalidator, Notifier, ObjectPublisher, StatusStore, WeatherSource};

/// What a double does when called.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Always succeed.
    Succeed,
    /// Fail the first `times` calls with `error`, then succeed.
    FailTimes { times: u32, error: AdapterError },
    /// Fail every call with `error`.
    Always(AdapterError),
}

impl MockBehaviour {
    pub fn transient_failures(times: u32) -> Self {
        Self::FailTimes {
            times,
            error: AdapterError::retryable("transient failure"),
        }
    }
}

#[derive(Debug)]
struct Script {
    behaviour: MockBehaviour,
    attempts: AtomicU32,
}

impl Script {
    fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            attempts: AtomicU32::new(0),
        }
    }

    fn next(&self) -> Result<(), AdapterError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            MockBehaviour::Succeed => Ok(()),
            MockBehaviour::FailTimes { times, error } if attempt < *times => Err(error.clone()),
            MockBehaviour::FailTimes { .. } => Ok(()),
            MockBehaviour::Always(error) => Err(error.clone()),
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

pub struct MockWeather {
    condition: String,
    script: Script,
}

impl MockWeather {
    /// Always report `condition` (lower-cased like the real client).
    pub fn returning(condition: impl Into<String>) -> Self {
        Self::scripted(condition, MockBehaviour::Succeed)
    }

    pub fn scripted(condition: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            condition: condition.into().to_lowercase(),
            script: Script::new(behaviour),
        }
    }

    /// Number of fetches attempted, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.script.attempts()
    }
}

#[async_trait]
impl WeatherSource for MockWeather {
    async fn current_condition(&self, _lat: &str, _lon: &str) -> Result<String, AdapterError> {
        self.script.next()?;
        Ok(self.condition.clone())
    }
}

// ---------------------------------------------------------------------------
// Status store
// ---------------------------------------------------------------------------

pub struct MockStatusStore {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    reads: Script,
    puts: Script,
}

impl MockStatusStore {
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(key.into(), value.into());
        Self {
            values: Mutex::new(values),
            writes: Mutex::new(Vec::new()),
            reads: Script::new(MockBehaviour::Succeed),
            puts: Script::new(MockBehaviour::Succeed),
        }
    }

    pub fn failing_reads(mut self, behaviour: MockBehaviour) -> Self {
        self.reads = Script::new(behaviour);
        self
    }

    pub fn failing_writes(mut self, behaviour: MockBehaviour) -> Self {
        self.puts = Script::new(behaviour);
        self
    }

    /// Successful writes, in call order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl StatusStore for MockStatusStore {
    async fn get(&self, key: &str) -> Result<String, AdapterError> {
        self.reads.next()?;
        self.value(key)
            .ok_or_else(|| AdapterError::fatal(format!("parameter '{key}' not found")))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        self.puts.next()?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
        self.writes
            .lock()
            .unwrap()
            .push((key.to_owned(), value.to_owned()));
        Ok(())
    }

    async fn ensure(&self, key: &str, initial: &str) -> Result<String, AdapterError> {
        let mut values = self.values.lock().unwrap();
        Ok(values
            .entry(key.to_owned())
            .or_insert_with(|| initial.to_owned())
            .clone())
    }
}

// ---------------------------------------------------------------------------
// Object publisher
// ---------------------------------------------------------------------------

/// One successful `put_object` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedObject {
    pub key: String,
    pub body: String,
    pub content_type: String,
}

pub struct MockPublisher {
    objects: Mutex<Vec<PublishedObject>>,
    script: Script,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::scripted(MockBehaviour::Succeed)
    }

    pub fn scripted(behaviour: MockBehaviour) -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            script: Script::new(behaviour),
        }
    }

    pub fn objects(&self) -> Vec<PublishedObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> u32 {
        self.script.attempts()
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectPublisher for MockPublisher {
    async fn put_object(&self, key: &str, body: String, content_type: &str) -> Result<(), AdapterError> {
        self.script.next()?;
        self.objects.lock().unwrap().push(PublishedObject {
            key: key.to_owned(),
            body,
            content_type: content_type.to_owned(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cache invalidator
// ---------------------------------------------------------------------------

pub struct MockInvalidator {
    calls: Mutex<Vec<(Vec<String>, String)>>,
    script: Script,
}

impl MockInvalidator {
    pub fn new() -> Self {
        Self::scripted(MockBehaviour::Succeed)
    }

    pub fn scripted(behaviour: MockBehaviour) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Script::new(behaviour),
        }
    }

    /// Every attempted invalidation as `(paths, caller_reference)`.
    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockInvalidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheInvalidator for MockInvalidator {
    async fn invalidate(&self, paths: &[String], caller_reference: &str) -> Result<(), AdapterError> {
        self.calls
            .lock()
            .unwrap()
            .push((paths.to_vec(), caller_reference.to_owned()));
        self.script.next()
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct MockNotifier {
    messages: Mutex<Vec<(String, String)>>,
    script: Script,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::scripted(MockBehaviour::Succeed)
    }

    pub fn scripted(behaviour: MockBehaviour) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            script: Script::new(behaviour),
        }
    }

    /// Successfully published `(subject, message)` pairs.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> u32 {
        self.script.attempts()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), AdapterError> {
        self.script.next()?;
        self.messages
            .lock()
            .unwrap()
            .push((subject.to_owned(), message.to_owned()));
        Ok(())
    }
}
