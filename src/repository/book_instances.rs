//! Book instances (copies) repository: inventory and loan queries

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{on_delete, on_write};
use crate::{
    error::{AppError, AppResult},
    models::book_instance::{BookInstance, InstanceRow, LoanState, LoanStatus},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookInstancesRepository: Send + Sync {
    async fn count(&self) -> AppResult<i64>;
    async fn count_by_status(&self, status: LoanStatus) -> AppResult<i64>;
    async fn count_for_book(&self, book_id: i32) -> AppResult<i64>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<BookInstance>;
    async fn list_for_book(&self, book_id: i32) -> AppResult<Vec<BookInstance>>;
    /// Copies on loan to one borrower, soonest due first
    async fn list_loans_for_user(&self, user_id: i32) -> AppResult<Vec<InstanceRow>>;
    /// Every copy on loan, soonest due first
    async fn list_all_loans(&self) -> AppResult<Vec<InstanceRow>>;
    async fn count_filtered(&self, status: Option<LoanStatus>) -> AppResult<i64>;
    async fn list_filtered(
        &self,
        status: Option<LoanStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<InstanceRow>>;
    async fn create(&self, book_id: i32, imprint: &str, status: LoanStatus) -> AppResult<BookInstance>;
    /// Move the due date of a copy that is on loan; status is left untouched
    async fn update_due_back(&self, id: Uuid, due_back: NaiveDate) -> AppResult<BookInstance>;
    async fn set_loan_state(&self, id: Uuid, state: &LoanState) -> AppResult<BookInstance>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgBookInstancesRepository {
    pool: Pool<Postgres>,
}

impl PgBookInstancesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const INSTANCE_COLUMNS: &str = "id, book_id, imprint, due_back, status, borrower_id";

const DETAILS_SELECT: &str = r#"
    SELECT bi.id, bi.book_id, b.title AS book_title, bi.imprint, bi.due_back, bi.status,
           bi.borrower_id, u.login AS borrower_login,
           u.first_name AS borrower_first_name, u.last_name AS borrower_last_name
    FROM book_instances bi
    JOIN books b ON b.id = bi.book_id
    LEFT JOIN users u ON u.id = bi.borrower_id
"#;

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Book instance {} not found", id))
}

#[async_trait]
impl BookInstancesRepository for PgBookInstancesRepository {
    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_by_status(&self, status: LoanStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<BookInstance> {
        sqlx::query_as::<_, BookInstance>(&format!(
            "SELECT {} FROM book_instances WHERE id = $1",
            INSTANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    async fn list_for_book(&self, book_id: i32) -> AppResult<Vec<BookInstance>> {
        let instances = sqlx::query_as::<_, BookInstance>(&format!(
            "SELECT {} FROM book_instances WHERE book_id = $1 ORDER BY due_back NULLS LAST, imprint, id",
            INSTANCE_COLUMNS
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(instances)
    }

    async fn list_loans_for_user(&self, user_id: i32) -> AppResult<Vec<InstanceRow>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            "{} WHERE bi.status = $1 AND bi.borrower_id = $2 ORDER BY bi.due_back NULLS LAST, bi.id",
            DETAILS_SELECT
        ))
        .bind(LoanStatus::OnLoan)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_all_loans(&self) -> AppResult<Vec<InstanceRow>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            "{} WHERE bi.status = $1 ORDER BY bi.due_back NULLS LAST, bi.id",
            DETAILS_SELECT
        ))
        .bind(LoanStatus::OnLoan)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_filtered(&self, status: Option<LoanStatus>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_instances WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_filtered(
        &self,
        status: Option<LoanStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<InstanceRow>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            r#"
            {}
            WHERE ($1::text IS NULL OR bi.status = $1)
            ORDER BY bi.due_back NULLS LAST, b.title, bi.id
            LIMIT $2 OFFSET $3
            "#,
            DETAILS_SELECT
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create(&self, book_id: i32, imprint: &str, status: LoanStatus) -> AppResult<BookInstance> {
        let instance = sqlx::query_as::<_, BookInstance>(&format!(
            r#"
            INSERT INTO book_instances (id, book_id, imprint, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(imprint)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_write(e, "Duplicate copy identifier"))?;
        Ok(instance)
    }

    async fn update_due_back(&self, id: Uuid, due_back: NaiveDate) -> AppResult<BookInstance> {
        sqlx::query_as::<_, BookInstance>(&format!(
            "UPDATE book_instances SET due_back = $1 WHERE id = $2 AND status = $3 RETURNING {}",
            INSTANCE_COLUMNS
        ))
        .bind(due_back)
        .bind(id)
        .bind(LoanStatus::OnLoan)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::BusinessRule(format!("Book instance {} is not on loan", id)))
    }

    async fn set_loan_state(&self, id: Uuid, state: &LoanState) -> AppResult<BookInstance> {
        sqlx::query_as::<_, BookInstance>(&format!(
            r#"
            UPDATE book_instances
            SET status = $1, due_back = $2, borrower_id = $3
            WHERE id = $4
            RETURNING {}
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(state.status)
        .bind(state.due_back)
        .bind(state.borrower_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| on_write(e, "Conflicting loan state"))?
        .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM book_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| on_delete(e, "Book instance is still referenced"))?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
