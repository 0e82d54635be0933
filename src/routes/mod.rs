/// Router Module Index
///
/// Routes are split by the access they require so that the gate is applied
/// per router (via axum layers) and a new endpoint cannot slip in unprotected.

/// Routes open to anonymous clients: health, login, logout, self-registration.
pub mod public;

/// Routes behind the credential verifier. Role checks happen in the services.
pub mod authenticated;

/// Routes nested under `/admin`, behind the verifier and an Admin role check.
pub mod admin;
