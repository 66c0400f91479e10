// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! This module holds the connection handling and the generic document
//! helpers. Entity-specific operations live in sibling modules:
//! - `users` (profiles, email index, connections, points)
//! - `sessions` (sessions, membership, ratings, attachments)
//! - `questions` (Q&A and votes)
//! - `notifications` (inbox entries and request/invite resolution)
//!
//! Every operation that touches more than one document, or that does a
//! read-modify-write, runs inside `run_transaction` so that Firestore
//! detects conflicting writers and retries.

use crate::db::collections;
use crate::error::AppError;
use crate::models::User;
use firestore::errors::{BackoffError, FirestoreError};
use futures_util::{stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
pub(crate) const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    pub(crate) fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Helpers ────────────────────────────────

    pub(crate) async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or overwrite a document.
    pub(crate) async fn set_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All documents whose `field` equals `value`.
    pub(crate) async fn find_by_field<T>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field(field).eq(value)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read-modify-write a single document inside a transaction.
    ///
    /// `mutate` may run more than once if the transaction is retried, so it
    /// must only touch the document it is given. Returning `Err` aborts
    /// without writing.
    pub(crate) async fn modify_doc<T, R, F>(
        &self,
        collection: &'static str,
        id: &str,
        not_found: &str,
        mutate: F,
    ) -> Result<R, AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(&mut T) -> Result<R, AppError> + Clone + Send + Sync + 'static,
    {
        let id = id.to_string();
        let not_found = not_found.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let id = id.clone();
                let not_found = not_found.clone();
                let mutate = mutate.clone();
                Box::pin(async move {
                    let current: Option<T> = tx_read(&db, collection, &id).await?;

                    let outcome = match current {
                        None => Err(AppError::NotFound(not_found)),
                        Some(mut doc) => match mutate(&mut doc) {
                            Ok(result) => {
                                tx_write(&db, transaction, collection, &id, &doc)?;
                                Ok(result)
                            }
                            Err(e) => Err(e),
                        },
                    };
                    Ok::<_, BackoffError<FirestoreError>>(outcome)
                })
            })
            .await
            .map_err(tx_error)?
    }

    /// Delete documents by ID in transaction-sized chunks.
    pub(crate) async fn batch_delete(&self, collection: &str, ids: &[String]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Write many documents concurrently, bounded by `MAX_CONCURRENT_DB_OPS`.
    pub(crate) async fn batch_set<T>(
        &self,
        collection: &str,
        docs: Vec<(String, T)>,
    ) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        stream::iter(docs)
            .map(|(id, doc)| async move { self.set_doc(collection, &id, &doc).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    /// Fetch users by ID, preserving order and skipping IDs that no longer
    /// resolve.
    pub async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        let users = stream::iter(ids.to_vec())
            .map(|id| async move { self.get_doc::<User>(collections::USERS, &id).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<User>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<User>>, AppError>>()?;

        Ok(users.into_iter().flatten().collect())
    }
}

/// Map a failed transaction to a database error.
pub(crate) fn tx_error(e: FirestoreError) -> AppError {
    AppError::Database(format!("Transaction failed: {}", e))
}

// ─── Transaction Helpers ─────────────────────────────────────────
//
// For use inside `run_transaction`, where `db` is the transaction-bound
// client handed to the closure. Reads register the document for conflict
// detection; writes are buffered until commit.

pub(crate) async fn tx_read<T>(
    db: &firestore::FirestoreDb,
    collection: &str,
    id: &str,
) -> Result<Option<T>, FirestoreError>
where
    T: DeserializeOwned + Send,
{
    db.fluent().select().by_id_in(collection).obj().one(id).await
}

pub(crate) fn tx_write<T>(
    db: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
    doc: &T,
) -> Result<(), FirestoreError>
where
    T: Serialize + DeserializeOwned + Sync + Send,
{
    db.fluent()
        .update()
        .in_col(collection)
        .document_id(id)
        .object(doc)
        .add_to_transaction(transaction)?;
    Ok(())
}

pub(crate) fn tx_delete(
    db: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
) -> Result<(), FirestoreError> {
    db.fluent()
        .delete()
        .from(collection)
        .document_id(id)
        .add_to_transaction(transaction)?;
    Ok(())
}
