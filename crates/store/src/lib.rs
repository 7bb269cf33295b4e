//! Persona stores for npcrelay.

pub mod file_store;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use file_store::FilePersonaStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresPersonaStore;

use npcrelay_config::{PersonaBackendKind, PersonaConfig};
use npcrelay_core::error::PersonaError;
use npcrelay_core::persona::PersonaStore;
use std::sync::Arc;

/// Build the persona store selected by `config.backend`.
pub async fn build_store(config: &PersonaConfig) -> Result<Arc<dyn PersonaStore>, PersonaError> {
    match config.backend {
        PersonaBackendKind::File => Ok(Arc::new(FilePersonaStore::new(&config.config_file))),
        #[cfg(feature = "postgres")]
        PersonaBackendKind::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                PersonaError::Storage("persona.database_url is not set".into())
            })?;
            let store = PostgresPersonaStore::connect(url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        PersonaBackendKind::Postgres => Err(PersonaError::Storage(
            "persona.backend = \"postgres\" requires the `postgres` feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_by_default() {
        let store = build_store(&PersonaConfig::default()).await.unwrap();
        assert_eq!(store.name(), "file");
    }
}
