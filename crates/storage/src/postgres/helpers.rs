//! Shared helpers for mapping collections and documents onto PostgreSQL.

use serde::de::DeserializeOwned;
use serde_json::Value;

use tidemark_core::error::{StorageError, StorageResult};
use tidemark_core::ports::Collection;

/// Map a query error, keeping unique violations distinguishable.
pub fn query_error(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return StorageError::ConstraintViolation(db.message().to_string());
    }
    StorageError::QueryError(e.to_string())
}

/// Insert statement for a collection. `$1` is the JSONB document; key
/// columns are extracted from it.
pub fn insert_sql(collection: Collection) -> &'static str {
    match collection {
        Collection::Blocks => {
            "INSERT INTO sync_blocks (height, doc) VALUES (($1::JSONB->>'height')::BIGINT, $1)"
        }
        Collection::Transactions => {
            r#"
            INSERT INTO sync_txs (tx_hash, msg_index, height, tx_type, doc)
            VALUES (
                $1::JSONB->>'tx_hash',
                ($1::JSONB->>'msg_index')::INTEGER,
                ($1::JSONB->>'height')::BIGINT,
                $1::JSONB->>'type',
                $1
            )
            "#
        }
        Collection::SyncTasks => "INSERT INTO sync_tasks (id, doc) VALUES ($1::JSONB->>'id', $1)",
    }
}

/// Merge statement for a collection. `$1` is the document key as text,
/// `$2` the JSONB patch.
pub fn update_sql(collection: Collection) -> &'static str {
    match collection {
        Collection::Blocks => "UPDATE sync_blocks SET doc = doc || $2 WHERE height::TEXT = $1",
        Collection::Transactions => "UPDATE sync_txs SET doc = doc || $2 WHERE id::TEXT = $1",
        Collection::SyncTasks => {
            "UPDATE sync_tasks SET doc = doc || $2, updated_at = NOW() WHERE id = $1"
        }
    }
}

/// Deserialize a stored document into a domain model.
pub fn from_document<T: DeserializeOwned>(doc: Value, what: &str) -> StorageResult<T> {
    serde_json::from_value(doc)
        .map_err(|e| StorageError::SerializationError(format!("invalid {} document: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::models::{Checkpoint, TaskStatus};

    // Test critique: chaque collection écrit dans sa propre table
    #[test]
    fn test_sql_targets_collection_table() {
        for collection in Collection::ALL {
            assert!(insert_sql(collection).contains(collection.name()));
            assert!(update_sql(collection).contains(collection.name()));
        }
    }

    #[test]
    fn test_updates_merge_documents() {
        assert!(update_sql(Collection::SyncTasks).contains("doc = doc || $2"));
    }

    #[test]
    fn test_from_document_roundtrips_checkpoint() {
        let cp = Checkpoint::bootstrap("iris");
        let doc = serde_json::to_value(&cp).unwrap();
        let back: Checkpoint = from_document(doc, "checkpoint").unwrap();
        assert_eq!(back, cp);
        assert_eq!(back.status, TaskStatus::Unhandled);
    }

    // Les erreurs incluent le type de document pour le debug
    #[test]
    fn test_from_document_error_names_kind() {
        let err = from_document::<Checkpoint>(serde_json::json!({"id": 1}), "checkpoint")
            .unwrap_err()
            .to_string();
        assert!(err.contains("checkpoint"));
    }

    #[test]
    fn test_non_database_error_is_query_error() {
        let err = query_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::QueryError(_)));
    }
}
