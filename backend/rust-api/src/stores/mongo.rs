use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR},
    options::IndexOptions,
    Client, Collection, Database, IndexModel,
};

use super::{QuestionCatalog, SessionStore};
use crate::error::StoreError;
use crate::metrics::track_store_operation;
use crate::models::{AnswerRecord, Question, QuestionFilter, UserSessionState};

pub const QUESTIONS_COLLECTION: &str = "questions";
pub const USER_STATES_COLLECTION: &str = "user_states";
pub const ANSWER_RECORDS_COLLECTION: &str = "answer_records";

const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY_CODE
    )
}

fn query_document(filter: &QuestionFilter) -> Document {
    let mut query = doc! {};
    if let Some(range) = filter.difficulty {
        query.insert(
            "difficulty",
            doc! { "$gte": i64::from(range.min), "$lte": i64::from(range.max) },
        );
    }
    if !filter.exclude_ids.is_empty() {
        let excluded: Vec<String> = filter.exclude_ids.iter().cloned().collect();
        query.insert("_id", doc! { "$nin": excluded });
    }
    query
}

/// Question catalog backed by the "questions" collection.
pub struct MongoCatalog {
    mongo: Database,
    questions: Collection<Question>,
}

impl MongoCatalog {
    pub fn new(mongo: Database) -> Self {
        Self {
            questions: mongo.collection(QUESTIONS_COLLECTION),
            mongo,
        }
    }

    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let index = IndexModel::builder().keys(doc! { "difficulty": 1 }).build();
        self.questions
            .create_index(index)
            .await
            .context("Failed to create questions.difficulty index")?;
        Ok(())
    }
}

#[async_trait]
impl QuestionCatalog for MongoCatalog {
    fn kind(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.mongo.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn query(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StoreError> {
        let query = query_document(filter);
        track_store_operation("mongodb", "questions.find", async {
            let cursor = self.questions.find(query).await?;
            let questions: Vec<Question> = cursor.try_collect().await?;
            Ok::<_, StoreError>(questions)
        })
        .await
    }

    async fn find(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        track_store_operation("mongodb", "questions.find_one", async {
            Ok::<_, StoreError>(self.questions.find_one(doc! { "_id": question_id }).await?)
        })
        .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.questions.count_documents(doc! {}).await?)
    }

    async fn insert_many(&self, questions: Vec<Question>) -> Result<usize, StoreError> {
        if questions.is_empty() {
            return Ok(0);
        }
        let result = self.questions.insert_many(questions).await?;
        Ok(result.inserted_ids.len())
    }
}

/// User states and answer records. Grading commits run in a multi-document
/// transaction, so the deployment must be a replica set.
pub struct MongoSessionStore {
    client: Client,
    states: Collection<UserSessionState>,
    records: Collection<AnswerRecord>,
}

impl MongoSessionStore {
    pub fn new(client: Client, database: &str) -> Self {
        let mongo = client.database(database);
        Self {
            states: mongo.collection(USER_STATES_COLLECTION),
            records: mongo.collection(ANSWER_RECORDS_COLLECTION),
            client,
        }
    }

    /// Unique (user_id, question_id) index backing the idempotency guard.
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "question_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_question_unique".to_string())
                    .build(),
            )
            .build();
        self.records
            .create_index(index)
            .await
            .context("Failed to create answer_records unique index")?;
        Ok(())
    }

    async fn run_grading_transaction(
        &self,
        state: &UserSessionState,
        expected_version: u64,
        record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let inserted = self.records.insert_one(record).session(&mut session).await;
        if let Err(e) = inserted {
            let _ = session.abort_transaction().await;
            return Err(if is_duplicate_key(&e) {
                StoreError::AlreadyExists
            } else {
                transaction_error(e)
            });
        }

        let replaced = self
            .states
            .replace_one(
                doc! { "_id": &state.user_id, "state_version": expected },
                state,
            )
            .session(&mut session)
            .await;
        match replaced {
            Ok(result) if result.matched_count == 1 => {}
            Ok(_) => {
                let _ = session.abort_transaction().await;
                return Err(StoreError::Conflict);
            }
            Err(e) => {
                let _ = session.abort_transaction().await;
                return Err(transaction_error(e));
            }
        }

        session
            .commit_transaction()
            .await
            .map_err(transaction_error)
    }
}

// Write conflicts between concurrent transactions surface as transient errors.
fn transaction_error(err: mongodb::error::Error) -> StoreError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        StoreError::Conflict
    } else {
        StoreError::from(err)
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    fn kind(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn get_user_state(&self, user_id: &str) -> Result<Option<UserSessionState>, StoreError> {
        track_store_operation("mongodb", "user_states.find_one", async {
            Ok::<_, StoreError>(self.states.find_one(doc! { "_id": user_id }).await?)
        })
        .await
    }

    async fn create_user_state(
        &self,
        state: UserSessionState,
    ) -> Result<UserSessionState, StoreError> {
        match self.states.insert_one(&state).await {
            Ok(_) => {
                tracing::info!("Created quiz state for user {}", state.user_id);
                Ok(state)
            }
            Err(e) if is_duplicate_key(&e) => self
                .states
                .find_one(doc! { "_id": &state.user_id })
                .await?
                .ok_or_else(|| {
                    StoreError::Backend(anyhow::anyhow!(
                        "user state {} vanished after duplicate insert",
                        state.user_id
                    ))
                }),
            Err(e) => Err(e.into()),
        }
    }

    async fn commit_user_state(
        &self,
        state: &UserSessionState,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut stored = state.clone();
        stored.updated_at = Utc::now();

        let mut filter = doc! { "_id": &state.user_id };
        if let Some(expected) = expected_version {
            filter.insert("state_version", i64::try_from(expected).unwrap_or(i64::MAX));
        }

        let result = track_store_operation("mongodb", "user_states.replace_one", async {
            self.states.replace_one(filter, &stored).await
        })
        .await?;

        if result.matched_count == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn find_answer_record(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> Result<Option<AnswerRecord>, StoreError> {
        track_store_operation("mongodb", "answer_records.find_one", async {
            Ok::<_, StoreError>(self
                .records
                .find_one(doc! { "user_id": user_id, "question_id": question_id })
                .await?)
        })
        .await
    }

    async fn commit_grading(
        &self,
        state: &UserSessionState,
        expected_version: u64,
        record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        let mut stored = state.clone();
        stored.updated_at = Utc::now();

        track_store_operation(
            "mongodb",
            "grading.transaction",
            self.run_grading_transaction(&stored, expected_version, record),
        )
        .await
    }
}
