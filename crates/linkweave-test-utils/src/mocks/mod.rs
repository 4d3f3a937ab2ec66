//! `mockall` mocks of the core ports.

use async_trait::async_trait;
use mockall::mock;

use linkweave_core::{
    ClientError, CoreError, CreationClient, Record, ServerIri, StatePersistence, UploadEvent, UploadEventHandler,
    UploadState, Value,
};

mock! {
    /// Mock of the creation client port
    pub Client {}

    #[async_trait]
    impl CreationClient for Client {
        async fn create(&self, record: &Record) -> Result<ServerIri, ClientError>;
        async fn patch(&self, iri: &ServerIri, value: &Value) -> Result<(), ClientError>;
    }
}

mock! {
    /// Mock of the state persistence port
    pub Persistence {}

    #[async_trait]
    impl StatePersistence for Persistence {
        async fn save(&self, state: &UploadState) -> Result<(), CoreError>;
        async fn load(&self) -> Result<Option<UploadState>, CoreError>;
        async fn clear(&self) -> Result<(), CoreError>;
    }
}

mock! {
    /// Mock of the event sink port
    pub EventHandler {}

    #[async_trait]
    impl UploadEventHandler for EventHandler {
        async fn handle(&self, event: &UploadEvent) -> Result<(), CoreError>;
    }
}
