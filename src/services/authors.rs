//! Authors service

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorDetails, AuthorForm},
        page::{ListPage, PageQuery, PageRequest},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthorsService {
    repository: Repository,
    page_size: i64,
}

impl AuthorsService {
    pub fn new(repository: Repository, page_size: i64) -> Self {
        Self {
            repository,
            page_size,
        }
    }

    /// Authors ordered by last name, then first name
    pub async fn list_authors(&self, query: PageQuery) -> AppResult<ListPage<Author>> {
        let request = PageRequest::resolve(query.page, query.per_page, self.page_size);
        let total = self.repository.authors.count().await?;
        request.ensure_within(total)?;

        let authors = self
            .repository
            .authors
            .list(request.limit(), request.offset())
            .await?;

        Ok(ListPage::new(
            "Author List",
            "There are no authors available.",
            authors,
            total,
            request,
        ))
    }

    /// Author with the books that reference them
    pub async fn get_author(&self, id: i32) -> AppResult<AuthorDetails> {
        let author = self.repository.authors.get_by_id(id).await?;
        let books = self.repository.books.list_by_author(id).await?;
        Ok(AuthorDetails {
            display_name: author.display_name(),
            author,
            books,
        })
    }

    pub async fn create_author(&self, form: AuthorForm) -> AppResult<Author> {
        let form = form.normalized()?;
        let author = self.repository.authors.create(&form).await?;
        tracing::info!(author_id = author.id, "Author created");
        Ok(author)
    }

    pub async fn update_author(&self, id: i32, form: AuthorForm) -> AppResult<Author> {
        let form = form.normalized()?;
        let author = self.repository.authors.update(id, &form).await?;
        tracing::info!(author_id = id, "Author updated");
        Ok(author)
    }

    /// Refused while any book references the author
    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.get_by_id(id).await?;

        let books = self.repository.books.count_by_author(id).await?;
        if books > 0 {
            return Err(AppError::Conflict(format!(
                "Author {} is referenced by {} book(s); reassign or delete them first",
                id, books
            )));
        }

        self.repository.authors.delete(id).await?;
        tracing::info!(author_id = id, "Author deleted");
        Ok(())
    }
}
