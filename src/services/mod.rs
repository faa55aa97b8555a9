//! Business logic services

pub mod authors;
pub mod catalog;
pub mod loans;
pub mod users;

use crate::{config::AppConfig, models::renewal::RenewalPolicy, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub authors: authors::AuthorsService,
    pub loans: loans::LoansService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let page_size = config.catalog.page_size;
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), page_size),
            authors: authors::AuthorsService::new(repository.clone(), page_size),
            loans: loans::LoansService::new(
                repository.clone(),
                RenewalPolicy::from(&config.loans),
                page_size,
            ),
            users: users::UsersService::new(repository, config.auth.clone()),
        }
    }
}
