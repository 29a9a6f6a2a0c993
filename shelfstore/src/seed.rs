//! First-start data: a small sample catalogue and the default administrator.

use thiserror::Error;

use shelfstore_core::{
    error::StoreError,
    model::{Book, User},
    store::LibraryStore,
};

use crate::{
    config::SeedConfig,
    credentials::{self, CredentialsError},
};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

/// What a seeding run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub books_added: usize,
    pub admin_created: bool,
}

/// The catalogue inserted into an empty store.
pub fn sample_books() -> Vec<Book> {
    vec![
        Book::new("Cien años de soledad", "Gabriel García Márquez", "978-0307474728")
            .published(1967)
            .genre("Realismo mágico, Novela")
            .description("Crónica de la familia Buendía en el pueblo ficticio de Macondo."),
        Book::new("1984", "George Orwell", "978-0451524935")
            .published(1949)
            .genre("Distopía, Ciencia ficción política")
            .description("Novela sobre vigilancia y control totalitario en un futuro distópico."),
        Book::new("Don Quijote de la Mancha", "Miguel de Cervantes", "978-8424113296")
            .published(1605)
            .genre("Novela, Aventura, Sátira")
            .description("Las aventuras de un hidalgo que enloquece leyendo libros de caballerías."),
    ]
}

/// Seeds a fresh store.
///
/// The sample catalogue is only added when `config.enabled` is set and the store holds
/// no books at all. The administrator is ensured on every run.
pub async fn seed_library<S>(store: &S, config: &SeedConfig) -> Result<SeedReport, SeedError>
where
    S: LibraryStore + ?Sized,
{
    let mut report = SeedReport::default();

    if config.enabled && store.get_books().await?.is_empty() {
        for book in sample_books() {
            let title = book.title.clone();

            match store.create_book(book).await {
                Ok(_) => report.books_added += 1,
                Err(err) => tracing::warn!(%title, error = %err, "could not add sample book"),
            }
        }

        if report.books_added > 0 {
            tracing::info!(count = report.books_added, "added sample books");
        }
    }

    report.admin_created = ensure_admin_user(store, config).await?;

    Ok(report)
}

/// Creates the administrator named in `config` unless a user with that name exists.
///
/// Returns whether a user was created. The password is stored as an Argon2 hash.
pub async fn ensure_admin_user<S>(store: &S, config: &SeedConfig) -> Result<bool, SeedError>
where
    S: LibraryStore + ?Sized,
{
    match store.get_user_by_username(&config.admin_username).await {
        Ok(_) => return Ok(false),
        Err(StoreError::UserNotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }

    let password = credentials::hash_password(&config.admin_password)?;

    match store
        .create_user(User::new(&config.admin_username, password, "admin"))
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "created administrator");
            Ok(true)
        }
        // Another process created it between the lookup and the insert.
        Err(StoreError::UserAlreadyExists(_)) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
