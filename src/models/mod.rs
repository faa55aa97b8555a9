//! Data models for the catalog

pub mod author;
pub mod book;
pub mod book_instance;
pub mod genre;
pub mod language;
pub mod page;
pub mod renewal;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookSummary};
pub use book_instance::{BookInstance, InstanceDetails, LoanStatus};
pub use genre::Genre;
pub use language::Language;
pub use user::{User, UserClaims, UserShort};

/// Entities counted on the home page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Book,
    BookInstance,
    Author,
    Genre,
}
