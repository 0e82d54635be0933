use crate::{
    auth::Principal,
    error::Result,
    lifecycle::LifecycleManager,
    models::{CreateMovieRequest, Movie, MovieFilter, MovieView, UpdateMovieRequest},
    roles::Role,
};

/// MovieService
///
/// CRUD over the movie catalogue. Reads and writes are open to any
/// authenticated principal; deletion is Admin only.
#[derive(Clone)]
pub struct MovieService {
    movies: LifecycleManager<Movie>,
}

impl MovieService {
    pub fn new(movies: LifecycleManager<Movie>) -> Self {
        Self { movies }
    }

    pub async fn list(&self, filter: &MovieFilter) -> Result<Vec<MovieView>> {
        let movies = self.movies.find_live(filter).await?;
        Ok(movies.iter().map(MovieView::from).collect())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<MovieView> {
        let movie = self.movies.get_live(id).await?;
        Ok(MovieView::from(&movie))
    }

    pub async fn create(&self, req: CreateMovieRequest) -> Result<MovieView> {
        let movie = self.movies.create(req.into()).await?;
        Ok(MovieView::from(&movie))
    }

    pub async fn update(&self, id: i64, req: UpdateMovieRequest) -> Result<MovieView> {
        let existing = self.movies.get_live(id).await?;
        let updated = self.movies.update(existing, req.into()).await?;
        Ok(MovieView::from(&updated))
    }

    pub async fn delete(&self, actor: &Principal, id: i64) -> Result<()> {
        actor.require_role(Role::Admin)?;
        self.movies.soft_delete(id).await
    }
}
