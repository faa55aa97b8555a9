//! Catalog service: home page counts, books, genres and languages

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDetails, BookForm, BookQuery, BookSummary},
        genre::{Genre, GenreForm},
        language::{Language, LanguageForm},
        page::{ListPage, PageRequest},
        EntityKind, LoanStatus,
    },
    repository::Repository,
};

/// Aggregate counts shown on the home page
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CatalogCounts {
    pub num_books: i64,
    pub num_instances: i64,
    pub num_instances_available: i64,
    pub num_authors: i64,
    pub num_genres: i64,
    pub num_books_word: WordCount,
}

/// Number of titles containing a word, ignoring case
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WordCount {
    pub word: String,
    pub count: i64,
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    page_size: i64,
}

impl CatalogService {
    pub fn new(repository: Repository, page_size: i64) -> Self {
        Self {
            repository,
            page_size,
        }
    }

    pub async fn count_all(&self, kind: EntityKind) -> AppResult<i64> {
        match kind {
            EntityKind::Book => self.repository.books.count().await,
            EntityKind::BookInstance => self.repository.instances.count().await,
            EntityKind::Author => self.repository.authors.count().await,
            EntityKind::Genre => self.repository.genres.count().await,
        }
    }

    pub async fn count_available(&self) -> AppResult<i64> {
        self.repository
            .instances
            .count_by_status(LoanStatus::Available)
            .await
    }

    pub async fn count_title_contains(&self, needle: &str) -> AppResult<i64> {
        self.repository.books.count_title_contains(needle).await
    }

    pub async fn counts(&self, word: &str) -> AppResult<CatalogCounts> {
        Ok(CatalogCounts {
            num_books: self.count_all(EntityKind::Book).await?,
            num_instances: self.count_all(EntityKind::BookInstance).await?,
            num_instances_available: self.count_available().await?,
            num_authors: self.count_all(EntityKind::Author).await?,
            num_genres: self.count_all(EntityKind::Genre).await?,
            num_books_word: WordCount {
                word: word.to_string(),
                count: self.count_title_contains(word).await?,
            },
        })
    }

    /// Cheap round trip used by the readiness probe
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.genres.count().await.map(|_| ())
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    /// Books in insertion order, optionally narrowed by author and title
    pub async fn list_books(&self, query: BookQuery) -> AppResult<ListPage<BookSummary>> {
        let request = PageRequest::resolve(query.page, query.per_page, self.page_size);
        let filter = query.filter();
        let total = self.repository.books.count_matching(&filter).await?;
        request.ensure_within(total)?;

        let books = self
            .repository
            .books
            .list(&filter, request.limit(), request.offset())
            .await?;

        Ok(ListPage::new(
            "Book List",
            "There are no books in the library.",
            books,
            total,
            request,
        ))
    }

    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.repository.books.get_by_id(id).await?;

        let author = match book.author_id {
            Some(author_id) => match self.repository.authors.get_by_id(author_id).await {
                Ok(author) => Some(author),
                Err(AppError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let language = match self.repository.languages.get_by_id(book.language_id).await {
            Ok(language) => Some(language),
            Err(AppError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let genres = self.repository.books.genres_of(id).await?;
        let instances = self.repository.instances.list_for_book(id).await?;

        Ok(BookDetails {
            id: book.id,
            title: book.title,
            summary: book.summary,
            isbn: book.isbn,
            author,
            language,
            genres,
            instances,
        })
    }

    pub async fn create_book(&self, form: BookForm) -> AppResult<Book> {
        let form = form.normalized()?;
        let book = self.repository.books.create(&form).await?;
        tracing::info!(book_id = book.id, "Book created");
        Ok(book)
    }

    pub async fn update_book(&self, id: i32, form: BookForm) -> AppResult<Book> {
        let form = form.normalized()?;
        let book = self.repository.books.update(id, &form).await?;
        tracing::info!(book_id = id, "Book updated");
        Ok(book)
    }

    /// Refused while copies of the book exist
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.get_by_id(id).await?;

        let copies = self.repository.instances.count_for_book(id).await?;
        if copies > 0 {
            return Err(AppError::Conflict(format!(
                "Book {} still has {} cop{}; delete them first",
                id,
                copies,
                if copies == 1 { "y" } else { "ies" }
            )));
        }

        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    // =========================================================================
    // GENRES & LANGUAGES
    // =========================================================================

    pub async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        self.repository.genres.list().await
    }

    pub async fn create_genre(&self, form: GenreForm) -> AppResult<Genre> {
        let form = form.normalized()?;
        self.repository.genres.create(&form.name).await
    }

    pub async fn list_languages(&self) -> AppResult<Vec<Language>> {
        self.repository.languages.list().await
    }

    pub async fn create_language(&self, form: LanguageForm) -> AppResult<Language> {
        let form = form.normalized()?;
        self.repository.languages.create(&form.name).await
    }
}
