//! Creation client fake with scripted failures.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use linkweave_core::{CancellationToken, ClientError, CreationClient, LocalId, Record, ServerIri, Value, ValueId};

/// Base of the IRIs handed out by [`ScriptedCreationClient`]
pub const IRI_BASE: &str = "http://rdfh.ch/0001";

#[derive(Debug, Default)]
struct Script {
    create_failures: HashMap<LocalId, VecDeque<ClientError>>,
    always_fail_create: HashMap<LocalId, ClientError>,
    patch_failures: HashMap<ValueId, ClientError>,
    cancel_after: Option<(usize, CancellationToken)>,
}

#[derive(Debug, Default)]
struct Calls {
    create_attempts: Vec<LocalId>,
    created: Vec<Record>,
    patched: Vec<(ServerIri, Value)>,
    patch_attempts: usize,
}

/// Fake creation client.
///
/// Every successful creation returns `http://rdfh.ch/0001/<local id>`. Failures
/// are scripted per local id or per value id. Every request the client sees is
/// recorded so tests can check ordering and resolution.
#[derive(Debug, Default)]
pub struct ScriptedCreationClient {
    script: Mutex<Script>,
    calls: Mutex<Calls>,
}

impl ScriptedCreationClient {
    /// A client where every request succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next creations of `id` with the given errors, then succeed
    pub fn fail_create_times(self, id: &str, errors: impl IntoIterator<Item = ClientError>) -> Self {
        self.script
            .lock()
            .create_failures
            .entry(LocalId::from(id))
            .or_default()
            .extend(errors);
        self
    }

    /// Fail every creation of `id` with `error`
    pub fn fail_create(self, id: &str, error: ClientError) -> Self {
        self.script.lock().always_fail_create.insert(LocalId::from(id), error);
        self
    }

    /// Fail every patch of `value_id` with `error`
    pub fn fail_patch(self, value_id: &str, error: ClientError) -> Self {
        self.script.lock().patch_failures.insert(ValueId::from(value_id), error);
        self
    }

    /// Cancel `token` once `count` records have been created
    pub fn cancel_after(self, count: usize, token: CancellationToken) -> Self {
        self.script.lock().cancel_after = Some((count, token));
        self
    }

    /// Stop failing anything
    pub fn heal(&self) {
        let mut script = self.script.lock();
        script.create_failures.clear();
        script.always_fail_create.clear();
        script.patch_failures.clear();
        script.cancel_after = None;
    }

    /// IRI the client assigns to `id`
    pub fn iri_for(id: &str) -> ServerIri {
        ServerIri(format!("{}/{}", IRI_BASE, id))
    }

    /// Records created successfully, as sent
    pub fn created(&self) -> Vec<Record> {
        self.calls.lock().created.clone()
    }

    /// Local ids created successfully, in order
    pub fn created_ids(&self) -> Vec<String> {
        self.calls.lock().created.iter().map(|r| r.local_id.0.clone()).collect()
    }

    /// Every creation attempt, failed ones included
    pub fn create_attempts(&self) -> Vec<LocalId> {
        self.calls.lock().create_attempts.clone()
    }

    /// Successful patches, as sent
    pub fn patched(&self) -> Vec<(ServerIri, Value)> {
        self.calls.lock().patched.clone()
    }

    /// Value ids patched successfully, in order
    pub fn patched_value_ids(&self) -> Vec<String> {
        self.calls.lock().patched.iter().map(|(_, v)| v.id.0.clone()).collect()
    }

    /// Number of requests of either kind
    pub fn request_count(&self) -> usize {
        let calls = self.calls.lock();
        calls.create_attempts.len() + calls.patch_attempts
    }
}

#[async_trait]
impl CreationClient for ScriptedCreationClient {
    async fn create(&self, record: &Record) -> Result<ServerIri, ClientError> {
        self.calls.lock().create_attempts.push(record.local_id.clone());

        let failure = {
            let mut script = self.script.lock();
            match script.always_fail_create.get(&record.local_id) {
                Some(err) => Some(err.clone()),
                None => script
                    .create_failures
                    .get_mut(&record.local_id)
                    .and_then(VecDeque::pop_front),
            }
        };
        if let Some(err) = failure {
            debug!(local_id = %record.local_id, "Scripted creation failure");
            return Err(err);
        }

        let created = {
            let mut calls = self.calls.lock();
            calls.created.push(record.clone());
            calls.created.len()
        };

        let script = self.script.lock();
        if let Some((count, token)) = &script.cancel_after {
            if created >= *count {
                token.cancel();
            }
        }

        Ok(Self::iri_for(record.local_id.as_str()))
    }

    async fn patch(&self, iri: &ServerIri, value: &Value) -> Result<(), ClientError> {
        self.calls.lock().patch_attempts += 1;

        if let Some(err) = self.script.lock().patch_failures.get(&value.id) {
            return Err(err.clone());
        }

        self.calls.lock().patched.push((iri.clone(), value.clone()));
        Ok(())
    }
}
