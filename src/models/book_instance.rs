//! Book instance (physical copy) model and loan status

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::user::UserShort;

/// Availability of a copy. Stored as a single letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Maintenance,
    OnLoan,
    Available,
    Reserved,
}

impl LoanStatus {
    pub fn code(&self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "m",
            LoanStatus::OnLoan => "o",
            LoanStatus::Available => "a",
            LoanStatus::Reserved => "r",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "Maintenance",
            LoanStatus::OnLoan => "On loan",
            LoanStatus::Available => "Available",
            LoanStatus::Reserved => "Reserved",
        }
    }
}

impl Default for LoanStatus {
    fn default() -> Self {
        LoanStatus::Maintenance
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(LoanStatus::Maintenance),
            "o" => Ok(LoanStatus::OnLoan),
            "a" => Ok(LoanStatus::Available),
            "r" => Ok(LoanStatus::Reserved),
            _ => Err(format!("Invalid loan status code: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.code(), buf)
    }
}

/// A loanable copy of a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookInstance {
    pub id: Uuid,
    pub book_id: i32,
    /// Edition / imprint text
    pub imprint: String,
    /// Set only while on loan
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
    /// Set only while on loan
    pub borrower_id: Option<i32>,
}

/// On loan with a due date strictly before `today`
pub fn is_overdue(status: LoanStatus, due_back: Option<NaiveDate>, today: NaiveDate) -> bool {
    status == LoanStatus::OnLoan && due_back.is_some_and(|d| d < today)
}

impl BookInstance {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        is_overdue(self.status, self.due_back, today)
    }
}

/// Loan state written by lend/return/status transitions
#[derive(Debug, Clone, PartialEq)]
pub struct LoanState {
    pub status: LoanStatus,
    pub due_back: Option<NaiveDate>,
    pub borrower_id: Option<i32>,
}

impl LoanState {
    pub fn on_loan(borrower_id: i32, due_back: NaiveDate) -> Self {
        Self {
            status: LoanStatus::OnLoan,
            due_back: Some(due_back),
            borrower_id: Some(borrower_id),
        }
    }

    /// Any status other than on loan, with loan fields cleared
    pub fn shelved(status: LoanStatus) -> Self {
        Self {
            status,
            due_back: None,
            borrower_id: None,
        }
    }
}

/// Copy joined with its book title and borrower
#[derive(Debug, Clone, FromRow)]
pub struct InstanceRow {
    pub id: Uuid,
    pub book_id: i32,
    pub book_title: String,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
    pub borrower_id: Option<i32>,
    pub borrower_login: Option<String>,
    pub borrower_first_name: Option<String>,
    pub borrower_last_name: Option<String>,
}

/// Copy as shown in loan lists and the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InstanceDetails {
    pub id: Uuid,
    pub book_id: i32,
    pub book_title: String,
    pub imprint: String,
    pub status: LoanStatus,
    pub due_back: Option<NaiveDate>,
    pub borrower: Option<UserShort>,
    pub is_overdue: bool,
}

impl InstanceRow {
    pub fn into_details(self, today: NaiveDate) -> InstanceDetails {
        let is_overdue = is_overdue(self.status, self.due_back, today);
        let borrower = match (self.borrower_id, self.borrower_login) {
            (Some(id), Some(login)) => Some(UserShort {
                id,
                login,
                first_name: self.borrower_first_name,
                last_name: self.borrower_last_name,
            }),
            _ => None,
        };
        InstanceDetails {
            id: self.id,
            book_id: self.book_id,
            book_title: self.book_title,
            imprint: self.imprint,
            status: self.status,
            due_back: self.due_back,
            borrower,
            is_overdue,
        }
    }
}

/// Inventory filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct InstanceQuery {
    pub status: Option<LoanStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// New copy of an existing book
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewInstanceForm {
    #[validate(length(min = 1, max = 200, message = "Imprint must be 1-200 characters"))]
    pub imprint: String,
    /// Defaults to maintenance; on_loan is not accepted here
    pub status: Option<LoanStatus>,
}

/// Lend an available copy
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LendForm {
    pub borrower_id: i32,
    /// YYYY-MM-DD; defaults to the standard loan period
    pub due_back: Option<String>,
}

/// Move a copy that is not on loan to another shelf status
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusForm {
    pub status: LoanStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_status_codes() {
        for status in [
            LoanStatus::Maintenance,
            LoanStatus::OnLoan,
            LoanStatus::Available,
            LoanStatus::Reserved,
        ] {
            assert_eq!(status.code().parse::<LoanStatus>().unwrap(), status);
        }
        assert!("x".parse::<LoanStatus>().is_err());
        assert_eq!(LoanStatus::default(), LoanStatus::Maintenance);
    }

    #[test]
    fn test_status_json_names() {
        let json = serde_json::to_string(&LoanStatus::OnLoan).unwrap();
        assert_eq!(json, "\"on_loan\"");
        let parsed: LoanStatus = serde_json::from_str("\"reserved\"").unwrap();
        assert_eq!(parsed, LoanStatus::Reserved);
    }

    #[test]
    fn test_overdue_only_when_on_loan() {
        let mut copy = BookInstance {
            id: Uuid::new_v4(),
            book_id: 1,
            imprint: "Gollancz, 2011".to_string(),
            due_back: Some(day(10)),
            status: LoanStatus::OnLoan,
            borrower_id: Some(4),
        };
        assert!(copy.is_overdue(day(11)));
        assert!(!copy.is_overdue(day(10)));
        copy.status = LoanStatus::Reserved;
        assert!(!copy.is_overdue(day(11)));
    }

    #[test]
    fn test_row_into_details() {
        let row = InstanceRow {
            id: Uuid::new_v4(),
            book_id: 3,
            book_title: "Dune".to_string(),
            imprint: "Ace".to_string(),
            due_back: Some(day(1)),
            status: LoanStatus::OnLoan,
            borrower_id: Some(9),
            borrower_login: Some("jdoe".to_string()),
            borrower_first_name: None,
            borrower_last_name: Some("Doe".to_string()),
        };
        let details = row.into_details(day(2));
        assert!(details.is_overdue);
        assert_eq!(details.borrower.unwrap().login, "jdoe");
    }

    #[test]
    fn test_row_and_copy_agree_on_overdue() {
        let cases = [
            (LoanStatus::OnLoan, Some(day(9)), true),
            (LoanStatus::OnLoan, Some(day(10)), false),
            (LoanStatus::OnLoan, None, false),
            (LoanStatus::Available, Some(day(1)), false),
            (LoanStatus::Maintenance, Some(day(1)), false),
        ];
        for (status, due_back, expected) in cases {
            let copy = BookInstance {
                id: Uuid::new_v4(),
                book_id: 1,
                imprint: "Gollancz, 2015".to_string(),
                due_back,
                status,
                borrower_id: None,
            };
            let row = InstanceRow {
                id: copy.id,
                book_id: 1,
                book_title: "Dune".to_string(),
                imprint: copy.imprint.clone(),
                status,
                due_back,
                borrower_id: None,
                borrower_login: None,
                borrower_first_name: None,
                borrower_last_name: None,
            };
            assert_eq!(copy.is_overdue(day(10)), expected, "{:?} {:?}", status, due_back);
            assert_eq!(row.into_details(day(10)).is_overdue, expected);
        }
    }
}
