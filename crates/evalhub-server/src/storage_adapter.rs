//! Adapts record storage to the authenticator's principal lookup.

use async_trait::async_trait;
use evalhub_auth::{AuthError, AuthResult, PrincipalStorage};
use evalhub_core::{Principal, Record, ResourceId, ResourceType};
use evalhub_storage::{DynStorage, FindScope};

/// Loads principals from the `user` table.
pub struct StoragePrincipals {
    storage: DynStorage,
}

impl StoragePrincipals {
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PrincipalStorage for StoragePrincipals {
    async fn find_principal(&self, id: ResourceId) -> AuthResult<Option<Principal>> {
        let record = self
            .storage
            .find(ResourceType::User, id, FindScope::Active)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        Ok(match record {
            Some(Record::User(user)) => Some(Principal::from(&user)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalhub_core::{NewInstitution, NewUser, Role};
    use evalhub_db_memory::InMemoryStorage;
    use std::sync::Arc;

    #[tokio::test]
    async fn finds_users_as_principals() {
        let storage: DynStorage = Arc::new(InMemoryStorage::new());
        let institution = storage
            .create(
                NewInstitution {
                    name: "Acme".into(),
                    description: None,
                }
                .into(),
            )
            .await
            .unwrap();
        let user = storage
            .create(
                NewUser {
                    institution_id: institution.id(),
                    name: "Ines".into(),
                    email: Some("ines@acme.edu".into()),
                    role: Role::Instructor,
                    password_hash: None,
                }
                .into(),
            )
            .await
            .unwrap();

        let principals = StoragePrincipals::new(storage);
        let found = principals.find_principal(user.id()).await.unwrap().unwrap();
        assert_eq!(found.institution_id, institution.id());
        assert!(found.is_instructor());
        assert!(
            principals
                .find_principal(ResourceId::new(404))
                .await
                .unwrap()
                .is_none()
        );
    }
}
