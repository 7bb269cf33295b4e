//! PostgreSQL persona store (Supabase's database works as-is).
//!
//! Every saved persona becomes a row in `npcs`; the newest row is the active
//! one. Run [`PostgresPersonaStore::migrate`] once, or apply
//! `migrations/001_create_npcs.sql` by hand.
//!
//! # Feature gate
//!
//! ```toml
//! npcrelay-store = { workspace = true, features = ["postgres"] }
//! ```

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use tracing::{debug, info};

use npcrelay_core::error::PersonaError;
use npcrelay_core::persona::{
    NpcPersona, NpcRecord, Personality, PersonaStore, Voice, WalletInfo, avatar_url,
};

pub struct PostgresPersonaStore {
    pool: PgPool,
}

impl PostgresPersonaStore {
    pub async fn connect(database_url: &str) -> Result<Self, PersonaError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| PersonaError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        info!("Connected to PostgreSQL for persona store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the schema migration.
    pub async fn migrate(&self) -> Result<(), PersonaError> {
        let migration_sql = include_str!("../migrations/001_create_npcs.sql");

        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| PersonaError::Storage(format!("Migration failed: {e}")))?;

        info!("Persona schema migration complete");
        Ok(())
    }

    fn row_to_record(row: &PgRow) -> Result<NpcRecord, sqlx::Error> {
        let personality: Json<Personality> = row.try_get("personality")?;
        let core_values: Json<Vec<String>> = row.try_get("core_values")?;
        let primary_aims: Json<Vec<String>> = row.try_get("primary_aims")?;
        let voice: Json<Voice> = row.try_get("voice")?;
        let wallet: Json<WalletInfo> = row.try_get("wallet")?;

        Ok(NpcRecord {
            id: Some(row.try_get("id")?),
            persona: NpcPersona {
                name: row.try_get("name")?,
                background: row.try_get("background")?,
                appearance: row.try_get("appearance")?,
                personality: personality.0,
                core_values: core_values.0,
                primary_aims: primary_aims.0,
                voice: voice.0,
            },
            wallet: wallet.0,
            avatar: row.try_get("avatar")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const RETURNING: &str = "id::text AS id, name, background, appearance, personality, \
    core_values, primary_aims, voice, wallet, avatar, created_at, updated_at";

#[async_trait]
impl PersonaStore for PostgresPersonaStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn save(&self, mut record: NpcRecord) -> Result<NpcRecord, PersonaError> {
        if record.avatar.is_empty() {
            record.avatar = avatar_url(&record.wallet.wallet_address);
        }

        let sql = format!(
            "INSERT INTO npcs (name, background, appearance, personality, core_values, \
             primary_aims, voice, wallet, avatar, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {RETURNING}"
        );
        let p = &record.persona;
        let row = sqlx::query(&sql)
            .bind(&p.name)
            .bind(&p.background)
            .bind(&p.appearance)
            .bind(Json(&p.personality))
            .bind(Json(&p.core_values))
            .bind(Json(&p.primary_aims))
            .bind(Json(&p.voice))
            .bind(Json(&record.wallet))
            .bind(&record.avatar)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersonaError::Rejected(format!("Failed to save NPC to database: {e}")))?;

        let saved = Self::row_to_record(&row)
            .map_err(|e| PersonaError::Storage(format!("Unexpected npcs row: {e}")))?;
        debug!(id = ?saved.id, "Persona inserted");
        Ok(saved)
    }

    async fn load_active(&self) -> Result<Option<NpcRecord>, PersonaError> {
        let sql = format!("SELECT {RETURNING} FROM npcs ORDER BY created_at DESC LIMIT 1");
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersonaError::Storage(format!("Failed to load persona: {e}")))?;

        row.as_ref()
            .map(Self::row_to_record)
            .transpose()
            .map_err(|e| PersonaError::Storage(format!("Unexpected npcs row: {e}")))
    }
}
