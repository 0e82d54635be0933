//! Resource services: thin orchestration over the lifecycle manager, the
//! role registry and the token issuer. Handlers call these and nothing else.

pub mod movies;
pub mod users;

pub use movies::MovieService;
pub use users::UserService;
