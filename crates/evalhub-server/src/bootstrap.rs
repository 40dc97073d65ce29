//! Startup seed data.

use anyhow::Context;
use evalhub_auth::hash_password;
use evalhub_core::{NewInstitution, NewUser, ResourceId, ResourceType, Role};
use evalhub_storage::{DynStorage, RecordFilter};

use crate::config::{BootstrapConfig, SeedInstructor};

/// Creates the configured institution and instructor when they do not exist.
/// Running it twice is a no-op.
pub async fn seed(storage: &DynStorage, cfg: &BootstrapConfig) -> anyhow::Result<()> {
    let Some(seed) = &cfg.institution else {
        return Ok(());
    };

    let filter = RecordFilter::new().with_attribute("name", seed.name.as_str());
    let institution_id = match storage.first(ResourceType::Institution, &filter).await? {
        Some(existing) => existing.id(),
        None => {
            let created = storage
                .create(
                    NewInstitution {
                        name: seed.name.clone(),
                        description: seed.description.clone(),
                    }
                    .into(),
                )
                .await
                .context("seeding institution")?;
            tracing::info!(institution_id = %created.id(), name = %seed.name, "seeded institution");
            created.id()
        }
    };

    if let Some(instructor) = &seed.instructor {
        seed_instructor(storage, institution_id, instructor).await?;
    }
    Ok(())
}

async fn seed_instructor(
    storage: &DynStorage,
    institution_id: ResourceId,
    instructor: &SeedInstructor,
) -> anyhow::Result<()> {
    let filter = RecordFilter::new()
        .referencing(ResourceType::Institution, institution_id)
        .with_attribute("email", instructor.email.as_str());
    if storage.first(ResourceType::User, &filter).await?.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&instructor.password)
        .map_err(|e| anyhow::anyhow!("hashing seed instructor password: {e}"))?;
    let created = storage
        .create(
            NewUser {
                institution_id,
                name: instructor.name.clone(),
                email: Some(instructor.email.clone()),
                role: Role::Instructor,
                password_hash: Some(password_hash),
            }
            .into(),
        )
        .await
        .context("seeding instructor")?;
    tracing::info!(user_id = %created.id(), institution_id = %institution_id, "seeded instructor");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedInstitution;
    use evalhub_auth::verify_password;
    use evalhub_core::{Model, User};
    use evalhub_db_memory::InMemoryStorage;
    use std::sync::Arc;

    fn config() -> BootstrapConfig {
        BootstrapConfig {
            institution: Some(SeedInstitution {
                name: "Acme".into(),
                description: Some("Seeded".into()),
                instructor: Some(SeedInstructor {
                    name: "Ines".into(),
                    email: "ines@acme.edu".into(),
                    password: "s3cret".into(),
                }),
            }),
        }
    }

    #[tokio::test]
    async fn seeds_once() {
        let storage: DynStorage = Arc::new(InMemoryStorage::new());
        seed(&storage, &config()).await.unwrap();
        seed(&storage, &config()).await.unwrap();

        let institutions = storage
            .list(ResourceType::Institution, &RecordFilter::new())
            .await
            .unwrap();
        assert_eq!(institutions.len(), 1);

        let users = storage
            .list(ResourceType::User, &RecordFilter::new())
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        let user = User::from_record(users[0].clone()).unwrap();
        assert!(user.is_instructor());
        assert!(verify_password("s3cret", user.password_hash.as_deref().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn empty_config_seeds_nothing() {
        let storage: DynStorage = Arc::new(InMemoryStorage::new());
        seed(&storage, &BootstrapConfig::default()).await.unwrap();
        assert!(
            storage
                .list(ResourceType::Institution, &RecordFilter::new())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
