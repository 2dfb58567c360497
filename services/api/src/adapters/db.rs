//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pettrack_core::domain::{
    ChatMessage, ChatSession, Clarification, Food, FoodPatch, LogEntry, NewChatMessage,
    NewClarification, NewFood, NewLogEntry, Pet, StoredApiKey,
};
use pettrack_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

// Column lists for the wider tables, shared between SELECT and RETURNING.
const FOOD_COLUMNS: &str = "id, user_id, canonical_name, brand, variant, aliases, serving_unit, \
     serving_weight_g, kcal_per_100g, kcal_per_item, protein_pct, fat_pct, fibre_pct, \
     moisture_pct, ash_pct, source, completeness_score, created_at, updated_at";

const ENTRY_COLUMNS: &str =
    "id, user_id, pet_id, food_id, raw_input, quantity, unit, weight_g, kcal, meal_type, \
     logged_at";

const CLARIFICATION_COLUMNS: &str = "id, user_id, log_entry_id, food_id, field, question, \
     priority, resolved, resolved_value, created_at";

const SESSION_COLUMNS: &str = "id, user_id, pet_id, status, created_at, completed_at";

const MESSAGE_COLUMNS: &str =
    "id, session_id, role, content, tool_calls, tool_results, created_at";

#[derive(FromRow)]
struct ApiKeyRecord {
    key_value: String,
    model: Option<String>,
}
impl ApiKeyRecord {
    fn to_domain(self) -> StoredApiKey {
        StoredApiKey {
            key_value: self.key_value,
            model: self.model,
        }
    }
}

#[derive(FromRow)]
struct PetRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    breed: Option<String>,
    weight_kg: Option<f64>,
    birth_date: Option<NaiveDate>,
    neutered: bool,
    activity_level: String,
    target_kcal_override: Option<f64>,
    calculated_mer: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl PetRecord {
    fn to_domain(self) -> PortResult<Pet> {
        Ok(Pet {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            breed: self.breed,
            weight_kg: self.weight_kg,
            birth_date: self.birth_date,
            neutered: self.neutered,
            activity_level: self.activity_level.parse().map_err(PortError::Unexpected)?,
            target_kcal_override: self.target_kcal_override,
            calculated_mer: self.calculated_mer,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FoodRecord {
    id: Uuid,
    user_id: Uuid,
    canonical_name: String,
    brand: Option<String>,
    variant: Option<String>,
    aliases: String,
    serving_unit: Option<String>,
    serving_weight_g: Option<f64>,
    kcal_per_100g: Option<f64>,
    kcal_per_item: Option<f64>,
    protein_pct: Option<f64>,
    fat_pct: Option<f64>,
    fibre_pct: Option<f64>,
    moisture_pct: Option<f64>,
    ash_pct: Option<f64>,
    source: String,
    completeness_score: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl FoodRecord {
    fn to_domain(self) -> PortResult<Food> {
        let aliases = serde_json::from_str(&self.aliases)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Food {
            id: self.id,
            user_id: self.user_id,
            canonical_name: self.canonical_name,
            brand: self.brand,
            variant: self.variant,
            aliases,
            serving_unit: self.serving_unit,
            serving_weight_g: self.serving_weight_g,
            kcal_per_100g: self.kcal_per_100g,
            kcal_per_item: self.kcal_per_item,
            protein_pct: self.protein_pct,
            fat_pct: self.fat_pct,
            fibre_pct: self.fibre_pct,
            moisture_pct: self.moisture_pct,
            ash_pct: self.ash_pct,
            source: self.source.parse().map_err(PortError::Unexpected)?,
            completeness_score: self.completeness_score,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct LogEntryRecord {
    id: Uuid,
    user_id: Uuid,
    pet_id: Uuid,
    food_id: Option<Uuid>,
    raw_input: String,
    quantity: Option<f64>,
    unit: Option<String>,
    weight_g: Option<f64>,
    kcal: Option<f64>,
    meal_type: Option<String>,
    logged_at: DateTime<Utc>,
}
impl LogEntryRecord {
    fn to_domain(self) -> LogEntry {
        LogEntry {
            id: self.id,
            user_id: self.user_id,
            pet_id: self.pet_id,
            food_id: self.food_id,
            raw_input: self.raw_input,
            quantity: self.quantity,
            unit: self.unit,
            weight_g: self.weight_g,
            kcal: self.kcal,
            meal_type: self.meal_type,
            logged_at: self.logged_at,
        }
    }
}

#[derive(FromRow)]
struct ClarificationRecord {
    id: Uuid,
    user_id: Uuid,
    log_entry_id: Option<Uuid>,
    food_id: Option<Uuid>,
    field: String,
    question: String,
    priority: i32,
    resolved: bool,
    resolved_value: Option<String>,
    created_at: DateTime<Utc>,
}
impl ClarificationRecord {
    fn to_domain(self) -> Clarification {
        Clarification {
            id: self.id,
            user_id: self.user_id,
            log_entry_id: self.log_entry_id,
            food_id: self.food_id,
            field: self.field,
            question: self.question,
            priority: self.priority,
            resolved: self.resolved,
            resolved_value: self.resolved_value,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ChatSessionRecord {
    id: Uuid,
    user_id: Uuid,
    pet_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}
impl ChatSessionRecord {
    fn to_domain(self) -> PortResult<ChatSession> {
        Ok(ChatSession {
            id: self.id,
            user_id: self.user_id,
            pet_id: self.pet_id,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    session_id: Uuid,
    role: String,
    content: String,
    tool_calls: Option<String>,
    tool_results: Option<String>,
    created_at: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        Ok(ChatMessage {
            id: self.id,
            session_id: self.session_id,
            role: self.role.parse().map_err(PortError::Unexpected)?,
            content: self.content,
            tool_calls: self.tool_calls,
            tool_results: self.tool_results,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn get_active_api_key(&self) -> PortResult<Option<StoredApiKey>> {
        let record = sqlx::query_as::<_, ApiKeyRecord>(
            "SELECT key_value, model FROM api_keys \
             WHERE is_active = TRUE AND provider = 'openrouter' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn get_pet(&self, user_id: Uuid, pet_id: Uuid) -> PortResult<Pet> {
        let record = sqlx::query_as::<_, PetRecord>(
            "SELECT id, user_id, name, breed, weight_kg, birth_date, neutered, activity_level, \
             target_kcal_override, calculated_mer, created_at, updated_at \
             FROM pets WHERE id = $1 AND user_id = $2",
        )
        .bind(pet_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Pet {} not found", pet_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn get_foods_for_user(&self, user_id: Uuid) -> PortResult<Vec<Food>> {
        let sql = format!("SELECT {FOOD_COLUMNS} FROM foods WHERE user_id = $1 ORDER BY created_at ASC");
        let records = sqlx::query_as::<_, FoodRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_food_by_id(&self, user_id: Uuid, food_id: Uuid) -> PortResult<Food> {
        let sql = format!("SELECT {FOOD_COLUMNS} FROM foods WHERE id = $1 AND user_id = $2");
        let record = sqlx::query_as::<_, FoodRecord>(&sql)
            .bind(food_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Food {} not found", food_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        record.to_domain()
    }

    async fn get_newest_food(&self, user_id: Uuid) -> PortResult<Option<Food>> {
        let sql = format!(
            "SELECT {FOOD_COLUMNS} FROM foods WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
        );
        let record = sqlx::query_as::<_, FoodRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.map(|r| r.to_domain()).transpose()
    }

    async fn create_food(&self, user_id: Uuid, new_food: NewFood) -> PortResult<Food> {
        let aliases = serde_json::to_string(&new_food.aliases)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        // completeness_score starts at 0; callers recalculate once the profile settles.
        let sql = format!(
            "INSERT INTO foods (id, user_id, canonical_name, brand, variant, aliases, \
             serving_unit, serving_weight_g, kcal_per_100g, kcal_per_item, protein_pct, \
             fat_pct, fibre_pct, moisture_pct, source, completeness_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 0) \
             RETURNING {FOOD_COLUMNS}"
        );
        let record = sqlx::query_as::<_, FoodRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(new_food.canonical_name)
            .bind(new_food.brand)
            .bind(new_food.variant)
            .bind(aliases)
            .bind(new_food.serving_unit)
            .bind(new_food.serving_weight_g)
            .bind(new_food.kcal_per_100g)
            .bind(new_food.kcal_per_item)
            .bind(new_food.protein_pct)
            .bind(new_food.fat_pct)
            .bind(new_food.fibre_pct)
            .bind(new_food.moisture_pct)
            .bind(new_food.source.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn update_food(&self, food_id: Uuid, patch: &FoodPatch) -> PortResult<Food> {
        let sql = format!(
            "UPDATE foods SET \
             canonical_name = COALESCE($2, canonical_name), \
             brand = COALESCE($3, brand), \
             variant = COALESCE($4, variant), \
             serving_unit = COALESCE($5, serving_unit), \
             serving_weight_g = COALESCE($6, serving_weight_g), \
             kcal_per_100g = COALESCE($7, kcal_per_100g), \
             kcal_per_item = COALESCE($8, kcal_per_item), \
             protein_pct = COALESCE($9, protein_pct), \
             fat_pct = COALESCE($10, fat_pct), \
             fibre_pct = COALESCE($11, fibre_pct), \
             moisture_pct = COALESCE($12, moisture_pct), \
             source = COALESCE($13, source), \
             updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {FOOD_COLUMNS}"
        );
        let record = sqlx::query_as::<_, FoodRecord>(&sql)
            .bind(food_id)
            .bind(patch.canonical_name.as_deref())
            .bind(patch.brand.as_deref())
            .bind(patch.variant.as_deref())
            .bind(patch.serving_unit.as_deref())
            .bind(patch.serving_weight_g)
            .bind(patch.kcal_per_100g)
            .bind(patch.kcal_per_item)
            .bind(patch.protein_pct)
            .bind(patch.fat_pct)
            .bind(patch.fibre_pct)
            .bind(patch.moisture_pct)
            .bind(patch.source.map(|s| s.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Food {} not found", food_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        record.to_domain()
    }

    async fn set_food_aliases(&self, food_id: Uuid, aliases: &[String]) -> PortResult<()> {
        let aliases = serde_json::to_string(aliases)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query("UPDATE foods SET aliases = $2, updated_at = NOW() WHERE id = $1")
            .bind(food_id)
            .bind(aliases)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn set_food_completeness(&self, food_id: Uuid, score: f64) -> PortResult<()> {
        sqlx::query("UPDATE foods SET completeness_score = $2, updated_at = NOW() WHERE id = $1")
            .bind(food_id)
            .bind(score)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn create_log_entry(&self, user_id: Uuid, entry: NewLogEntry) -> PortResult<LogEntry> {
        let sql = format!(
            "INSERT INTO log_entries (id, user_id, pet_id, food_id, raw_input, quantity, unit, \
             weight_g, kcal, meal_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ENTRY_COLUMNS}"
        );
        let record = sqlx::query_as::<_, LogEntryRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(entry.pet_id)
            .bind(entry.food_id)
            .bind(entry.raw_input)
            .bind(entry.quantity)
            .bind(entry.unit)
            .bind(entry.weight_g)
            .bind(entry.kcal)
            .bind(entry.meal_type)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_entries_for_day(
        &self,
        user_id: Uuid,
        pet_id: Uuid,
        day: NaiveDate,
    ) -> PortResult<Vec<LogEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM log_entries \
             WHERE user_id = $1 AND pet_id = $2 AND (logged_at AT TIME ZONE 'UTC')::date = $3 \
             ORDER BY logged_at ASC"
        );
        let records = sqlx::query_as::<_, LogEntryRecord>(&sql)
            .bind(user_id)
            .bind(pet_id)
            .bind(day)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_entries_for_food(&self, food_id: Uuid) -> PortResult<Vec<LogEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM log_entries WHERE food_id = $1 ORDER BY logged_at ASC"
        );
        let records = sqlx::query_as::<_, LogEntryRecord>(&sql)
            .bind(food_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_entries_missing_kcal(&self, food_id: Uuid) -> PortResult<Vec<LogEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM log_entries \
             WHERE food_id = $1 AND kcal IS NULL ORDER BY logged_at ASC"
        );
        let records = sqlx::query_as::<_, LogEntryRecord>(&sql)
            .bind(food_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_entry_resolution(
        &self,
        entry_id: Uuid,
        weight_g: Option<f64>,
        kcal: Option<f64>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE log_entries SET weight_g = COALESCE($2, weight_g), kcal = $3 WHERE id = $1")
            .bind(entry_id)
            .bind(weight_g)
            .bind(kcal)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn set_entry_kcal(&self, entry_id: Uuid, kcal: f64) -> PortResult<()> {
        sqlx::query("UPDATE log_entries SET kcal = $2 WHERE id = $1")
            .bind(entry_id)
            .bind(kcal)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn create_clarification(
        &self,
        user_id: Uuid,
        new: NewClarification,
    ) -> PortResult<Clarification> {
        let sql = format!(
            "INSERT INTO clarifications (id, user_id, log_entry_id, food_id, field, question, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CLARIFICATION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ClarificationRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(new.log_entry_id)
            .bind(new.food_id)
            .bind(new.field)
            .bind(new.question)
            .bind(new.priority)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_clarification_by_id(
        &self,
        user_id: Uuid,
        clarification_id: Uuid,
    ) -> PortResult<Clarification> {
        let sql = format!(
            "SELECT {CLARIFICATION_COLUMNS} FROM clarifications WHERE id = $1 AND user_id = $2"
        );
        let record = sqlx::query_as::<_, ClarificationRecord>(&sql)
            .bind(clarification_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Clarification {} not found", clarification_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        Ok(record.to_domain())
    }

    async fn mark_clarification_resolved(
        &self,
        clarification_id: Uuid,
        value: &str,
    ) -> PortResult<()> {
        sqlx::query("UPDATE clarifications SET resolved = TRUE, resolved_value = $2 WHERE id = $1")
            .bind(clarification_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_unresolved_clarifications(&self, user_id: Uuid) -> PortResult<Vec<Clarification>> {
        let sql = format!(
            "SELECT {CLARIFICATION_COLUMNS} FROM clarifications \
             WHERE user_id = $1 AND resolved = FALSE ORDER BY priority ASC"
        );
        let records = sqlx::query_as::<_, ClarificationRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_active_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> PortResult<Option<ChatSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions \
             WHERE id = $1 AND user_id = $2 AND status = 'active'"
        );
        let record = sqlx::query_as::<_, ChatSessionRecord>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.map(|r| r.to_domain()).transpose()
    }

    async fn open_session(&self, user_id: Uuid, pet_id: Uuid) -> PortResult<ChatSession> {
        // Close-then-create runs in one transaction so the "at most one active
        // session per (user, pet)" invariant holds under concurrent requests.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query(
            "UPDATE chat_sessions SET status = 'completed', completed_at = NOW() \
             WHERE user_id = $1 AND pet_id = $2 AND status = 'active'",
        )
        .bind(user_id)
        .bind(pet_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let sql = format!(
            "INSERT INTO chat_sessions (id, user_id, pet_id, status) \
             VALUES ($1, $2, $3, 'active') \
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ChatSessionRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(pet_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.to_domain()
    }

    async fn complete_session(&self, session_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE chat_sessions SET status = 'completed', completed_at = NOW() WHERE id = $1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_messages_for_session(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = $1 \
             ORDER BY created_at ASC"
        );
        let records = sqlx::query_as::<_, ChatMessageRecord>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn append_message(&self, message: NewChatMessage) -> PortResult<ChatMessage> {
        let sql = format!(
            "INSERT INTO chat_messages (id, session_id, role, content, tool_calls, tool_results) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ChatMessageRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(message.session_id)
            .bind(message.role.as_str())
            .bind(message.content)
            .bind(message.tool_calls)
            .bind(message.tool_results)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }
}
