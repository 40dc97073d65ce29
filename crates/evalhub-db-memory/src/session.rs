use async_trait::async_trait;
use evalhub_auth::{AuthResult, Session, SessionStorage};
use evalhub_core::ResourceId;
use papaya::HashMap as PapayaHashMap;

/// Session store on papaya lock-free maps.
///
/// `by_principal` points at the principal's current token digest; a
/// replaced digest is removed from `by_token`.
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    by_token: PapayaHashMap<String, Session>,
    by_principal: PapayaHashMap<ResourceId, String>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_token.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn replace(&self, session: Session) -> AuthResult<Option<Session>> {
        let by_token = self.by_token.pin();
        let principal_id = session.principal_id;
        let token_hash = session.token_hash.clone();
        by_token.insert(token_hash.clone(), session);

        let previous_hash = self
            .by_principal
            .pin()
            .insert(principal_id, token_hash.clone())
            .cloned();
        let previous = previous_hash
            .filter(|hash| *hash != token_hash)
            .and_then(|hash| by_token.remove(&hash).cloned());
        Ok(previous)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>> {
        Ok(self.by_token.pin().get(token_hash).cloned())
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> AuthResult<bool> {
        let Some(session) = self.by_token.pin().remove(token_hash).cloned() else {
            return Ok(false);
        };
        let by_principal = self.by_principal.pin();
        if by_principal.get(&session.principal_id).map(String::as_str) == Some(token_hash) {
            by_principal.remove(&session.principal_id);
        }
        Ok(true)
    }

    async fn delete_for_principal(&self, principal_id: ResourceId) -> AuthResult<bool> {
        let Some(token_hash) = self.by_principal.pin().remove(&principal_id).cloned() else {
            return Ok(false);
        };
        Ok(self.by_token.pin().remove(&token_hash).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn session(hash: &str, principal: u64) -> Session {
        let now = OffsetDateTime::now_utc();
        Session {
            token_hash: hash.into(),
            principal_id: ResourceId::new(principal),
            issued_at: now,
            expires_at: now + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn replace_supersedes_previous_session() {
        let store = InMemorySessionStorage::new();
        assert!(store.replace(session("a", 1)).await.unwrap().is_none());
        let previous = store.replace(session("b", 1)).await.unwrap().unwrap();
        assert_eq!(previous.token_hash, "a");

        assert!(store.find_by_token_hash("a").await.unwrap().is_none());
        assert!(store.find_by_token_hash("b").await.unwrap().is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn sessions_of_different_principals_coexist() {
        let store = InMemorySessionStorage::new();
        store.replace(session("a", 1)).await.unwrap();
        store.replace(session("b", 2)).await.unwrap();
        assert_eq!(store.len(), 2);

        assert!(store.delete_for_principal(ResourceId::new(1)).await.unwrap());
        assert!(!store.delete_for_principal(ResourceId::new(1)).await.unwrap());
        assert!(store.find_by_token_hash("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_by_token_clears_principal_pointer() {
        let store = InMemorySessionStorage::new();
        store.replace(session("a", 1)).await.unwrap();
        assert!(store.delete_by_token_hash("a").await.unwrap());
        assert!(!store.delete_by_token_hash("a").await.unwrap());
        assert!(!store.delete_for_principal(ResourceId::new(1)).await.unwrap());
        assert!(store.is_empty());
    }
}
