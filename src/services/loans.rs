//! Copies and loans: renewal, lending, returns and the inventory

use chrono::{Local, NaiveDate};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book_instance::{
            BookInstance, InstanceDetails, InstanceQuery, LendForm, LoanState, LoanStatus,
            NewInstanceForm, StatusForm,
        },
        page::{ListPage, PageRequest},
        renewal::{RenewalPolicy, RenewalView},
    },
    repository::Repository,
};

/// Dates are compared against the server's local calendar day
fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    policy: RenewalPolicy,
    page_size: i64,
}

impl LoansService {
    pub fn new(repository: Repository, policy: RenewalPolicy, page_size: i64) -> Self {
        Self {
            repository,
            policy,
            page_size,
        }
    }

    pub fn policy(&self) -> RenewalPolicy {
        self.policy
    }

    /// Copies on loan to one borrower, soonest due first
    pub async fn loans_for_user(&self, user_id: i32) -> AppResult<Vec<InstanceDetails>> {
        let today = today();
        let rows = self.repository.instances.list_loans_for_user(user_id).await?;
        Ok(rows.into_iter().map(|r| r.into_details(today)).collect())
    }

    /// Every copy on loan, soonest due first
    pub async fn all_active_loans(&self) -> AppResult<Vec<InstanceDetails>> {
        let today = today();
        let rows = self.repository.instances.list_all_loans().await?;
        Ok(rows.into_iter().map(|r| r.into_details(today)).collect())
    }

    pub async fn inventory(&self, query: InstanceQuery) -> AppResult<ListPage<InstanceDetails>> {
        let request = PageRequest::resolve(query.page, query.per_page, self.page_size);
        let total = self.repository.instances.count_filtered(query.status).await?;
        request.ensure_within(total)?;

        let today = today();
        let rows = self
            .repository
            .instances
            .list_filtered(query.status, request.limit(), request.offset())
            .await?;

        Ok(ListPage::new(
            "Book Copies",
            "There are no copies matching this filter.",
            rows.into_iter().map(|r| r.into_details(today)).collect(),
            total,
            request,
        ))
    }

    async fn on_loan(&self, id: Uuid) -> AppResult<BookInstance> {
        let instance = self.repository.instances.get_by_id(id).await?;
        if instance.status != LoanStatus::OnLoan {
            return Err(AppError::BusinessRule(format!(
                "Copy {} is not on loan ({})",
                id, instance.status
            )));
        }
        Ok(instance)
    }

    // =========================================================================
    // RENEWAL
    // =========================================================================

    /// Renewal form pre-filled with the default proposed date
    pub async fn renewal_form(&self, id: Uuid) -> AppResult<RenewalView> {
        let instance = self.on_loan(id).await?;
        let book = self.repository.books.get_by_id(instance.book_id).await?;
        Ok(RenewalView {
            instance,
            book_title: book.title,
            proposed_due_back: self.policy.proposed(today()),
            help_text: self.policy.help_text(),
        })
    }

    /// Move the due date of a copy on loan. Status and borrower are unchanged.
    /// An absent date fails the same check as an unparseable one
    pub async fn renew(&self, id: Uuid, due_back: Option<&str>) -> AppResult<BookInstance> {
        self.on_loan(id).await?;
        let due_back = self.policy.check(due_back.unwrap_or_default(), today())?;

        let instance = self.repository.instances.update_due_back(id, due_back).await?;
        tracing::info!(instance_id = %id, %due_back, "Loan renewed");
        Ok(instance)
    }

    // =========================================================================
    // STATUS TRANSITIONS
    // =========================================================================

    pub async fn lend(&self, id: Uuid, form: LendForm) -> AppResult<BookInstance> {
        let instance = self.repository.instances.get_by_id(id).await?;
        if !matches!(
            instance.status,
            LoanStatus::Available | LoanStatus::Reserved
        ) {
            return Err(AppError::BusinessRule(format!(
                "Copy {} cannot be lent while {}",
                id,
                instance.status.label().to_lowercase()
            )));
        }

        match self.repository.users.get_by_id(form.borrower_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                return Err(AppError::InvalidField {
                    field: "borrower_id",
                    message: format!("No user with id {}", form.borrower_id),
                    proposed: None,
                })
            }
            Err(e) => return Err(e),
        }

        let today = today();
        let due_back = match form.due_back.as_deref() {
            Some(raw) if !raw.trim().is_empty() => self.policy.check(raw, today)?,
            _ => self.policy.proposed(today),
        };

        let instance = self
            .repository
            .instances
            .set_loan_state(id, &LoanState::on_loan(form.borrower_id, due_back))
            .await?;
        tracing::info!(instance_id = %id, borrower_id = form.borrower_id, %due_back, "Copy lent");
        Ok(instance)
    }

    /// Mark a copy on loan as returned; it becomes available again
    pub async fn mark_returned(&self, id: Uuid) -> AppResult<BookInstance> {
        self.on_loan(id).await?;
        let instance = self
            .repository
            .instances
            .set_loan_state(id, &LoanState::shelved(LoanStatus::Available))
            .await?;
        tracing::info!(instance_id = %id, "Copy returned");
        Ok(instance)
    }

    pub async fn set_status(&self, id: Uuid, form: StatusForm) -> AppResult<BookInstance> {
        if form.status == LoanStatus::OnLoan {
            return Err(AppError::BadRequest(
                "Use the lend action to put a copy on loan".to_string(),
            ));
        }

        let instance = self.repository.instances.get_by_id(id).await?;
        if instance.status == LoanStatus::OnLoan {
            return Err(AppError::BusinessRule(format!(
                "Copy {} is on loan; mark it returned first",
                id
            )));
        }

        let instance = self
            .repository
            .instances
            .set_loan_state(id, &LoanState::shelved(form.status))
            .await?;
        tracing::info!(instance_id = %id, status = form.status.code(), "Copy status changed");
        Ok(instance)
    }

    // =========================================================================
    // COPIES
    // =========================================================================

    pub async fn add_instance(&self, book_id: i32, form: NewInstanceForm) -> AppResult<BookInstance> {
        validator::Validate::validate(&form)?;
        let status = form.status.unwrap_or_default();
        if status == LoanStatus::OnLoan {
            return Err(AppError::BadRequest(
                "A new copy cannot start on loan".to_string(),
            ));
        }

        self.repository.books.get_by_id(book_id).await?;
        let instance = self
            .repository
            .instances
            .create(book_id, form.imprint.trim(), status)
            .await?;
        tracing::info!(instance_id = %instance.id, book_id, "Copy created");
        Ok(instance)
    }

    pub async fn delete_instance(&self, id: Uuid) -> AppResult<()> {
        let instance = self.repository.instances.get_by_id(id).await?;
        if instance.status == LoanStatus::OnLoan {
            return Err(AppError::BusinessRule(format!(
                "Copy {} is on loan and cannot be deleted",
                id
            )));
        }
        self.repository.instances.delete(id).await?;
        tracing::info!(instance_id = %id, "Copy deleted");
        Ok(())
    }
}
