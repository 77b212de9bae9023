use crate::domain::value_objects::AccessKey;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Access key attached to outgoing remote calls, shared by every caller.
#[derive(Clone, Default)]
pub struct Credentials {
    access_key: Arc<RwLock<Option<AccessKey>>>,
}

impl Credentials {
    pub fn new(access_key: Option<AccessKey>) -> Self {
        Self {
            access_key: Arc::new(RwLock::new(access_key)),
        }
    }

    pub async fn access_key(&self) -> Option<AccessKey> {
        self.access_key.read().await.clone()
    }

    pub async fn set_access_key(&self, access_key: Option<AccessKey>) {
        *self.access_key.write().await = access_key;
    }
}
