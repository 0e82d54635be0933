use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use movie_vault::{
    AuthError, Error, Role,
    error::StoreError,
    lifecycle::Timestamps,
    models::{Movie, NewMovie, NewUser, User, UserView},
    passwords::{UNKNOWN_USER_HASH, hash_password, verify_password},
    roles::is_valid_role,
    validation::{Validate, ValidationErrors},
};

fn stamps() -> Timestamps {
    Timestamps::created(Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap())
}

fn movie() -> NewMovie {
    NewMovie {
        title: "Alien".to_string(),
        description: "In space no one can hear you scream.".to_string(),
        director: "Ridley Scott".to_string(),
        genre: "Horror".to_string(),
    }
}

// --- Role Registry ---

#[test]
fn test_role_registry_is_exact() {
    assert!(is_valid_role("Admin"));
    assert!(is_valid_role("User"));

    for candidate in ["admin", "USER", "SuperAdmin", "", " Admin", "User "] {
        assert!(!is_valid_role(candidate), "{candidate:?} must not be a role");
    }
}

#[test]
fn test_role_round_trips_through_its_wire_name() {
    for role in Role::ALL {
        assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        assert_eq!(role.to_string(), role.as_str());
    }
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"Admin\"");
}

// --- Field Constraints ---

#[test]
fn test_username_length_bounds() {
    let user = |name: &str| NewUser {
        username: name.to_string(),
        password_hash: "hash".to_string(),
        role: Role::User,
    };

    assert!(user("abcd").validate().is_err());
    assert!(user("abcde").validate().is_ok());
    assert!(user(&"a".repeat(50)).validate().is_ok());
    assert!(user(&"a".repeat(51)).validate().is_err());
}

#[test]
fn test_length_is_counted_in_characters() {
    // Five multi-byte characters are a valid username.
    let user = NewUser {
        username: "ÅÄÖÜß".to_string(),
        password_hash: "hash".to_string(),
        role: Role::User,
    };
    assert!(user.validate().is_ok());
}

#[test]
fn test_movie_bounds_report_every_field() {
    assert!(movie().validate().is_ok());

    let bad = NewMovie {
        title: "t".repeat(51),
        description: String::new(),
        director: "d".repeat(51),
        genre: String::new(),
    };
    let errors = bad.validate().unwrap_err();
    let fields: Vec<_> = errors.fields().collect();
    assert_eq!(fields, vec!["title", "description", "director", "genre"]);

    let max_description = NewMovie {
        description: "x".repeat(250),
        ..movie()
    };
    assert!(max_description.validate().is_ok());
}

#[test]
fn test_validation_errors_render_joined_messages() {
    let mut errors = ValidationErrors::new();
    assert!(errors.clone().into_result().is_ok());

    errors.check_length("title", "", 1, 50);
    errors.push("genre", "genre is required");

    assert_eq!(
        errors.to_string(),
        "title must be between 1 and 50 characters long; genre is required"
    );
    assert_eq!(
        serde_json::to_value(&errors).unwrap(),
        serde_json::json!([
            { "field": "title", "message": "title must be between 1 and 50 characters long" },
            { "field": "genre", "message": "genre is required" },
        ])
    );
}

// --- Views ---

#[test]
fn test_user_view_drops_password_hash() {
    let user = User {
        id: 9,
        username: "alice_smith".to_string(),
        password_hash: "$argon2id$secret".to_string(),
        role: Role::User,
        timestamps: stamps(),
    };

    let view = UserView::from(&user);
    let json = serde_json::to_value(&view).unwrap();

    assert_eq!(json["id"], 9);
    assert!(json.get("password_hash").is_none());
    assert!(!json.to_string().contains("argon2"));
}

#[test]
fn test_movie_entity_revalidates_after_edit() {
    let mut entity = Movie {
        id: 1,
        title: "Alien".to_string(),
        description: "In space no one can hear you scream.".to_string(),
        director: "Ridley Scott".to_string(),
        genre: "Horror".to_string(),
        timestamps: stamps(),
    };
    assert!(entity.validate().is_ok());

    entity.title.clear();
    assert!(entity.validate().is_err());
}

// --- Timestamps ---

#[test]
fn test_timestamps_touch_is_monotonic() {
    let mut ts = stamps();
    let start = ts.created_at;

    ts.touch(start - chrono::Duration::seconds(10));
    assert_eq!(ts.updated_at, start);

    ts.touch(start + chrono::Duration::seconds(10));
    assert_eq!(ts.updated_at, start + chrono::Duration::seconds(10));
    assert_eq!(ts.created_at, start);
    assert!(ts.is_live());
}

// --- Passwords ---

#[test]
fn test_password_hash_and_verify() {
    let hash = hash_password("correct horse").unwrap();

    assert!(hash.starts_with("$argon2id$"));
    assert_ne!(hash, "correct horse");
    assert!(verify_password("correct horse", &hash).unwrap());
    assert!(!verify_password("battery staple", &hash).unwrap());
}

#[test]
fn test_password_hashes_are_salted() {
    let a = hash_password("same-password").unwrap();
    let b = hash_password("same-password").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_unknown_user_hash_is_well_formed_and_matches_nothing() {
    for candidate in ["", "password", "user-pass", "correct horse"] {
        assert!(!verify_password(candidate, UNKNOWN_USER_HASH).unwrap());
    }
}

#[test]
fn test_malformed_stored_hash_is_internal() {
    assert!(matches!(
        verify_password("anything", "not-a-phc-string"),
        Err(Error::Internal(_))
    ));
}

// --- Error Mapping ---

#[test]
fn test_error_status_mapping() {
    let cases = [
        (Error::InvalidRole("x".into()), StatusCode::BAD_REQUEST, "invalid_role"),
        (
            Error::Auth(AuthError::MissingCredential),
            StatusCode::FORBIDDEN,
            "missing_credential",
        ),
        (
            Error::Auth(AuthError::InvalidCredential),
            StatusCode::UNAUTHORIZED,
            "invalid_credential",
        ),
        (Error::Forbidden("no".into()), StatusCode::FORBIDDEN, "forbidden"),
        (
            Error::Validation(ValidationErrors::new()),
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
        ),
        (Error::NotFound("gone".into()), StatusCode::NOT_FOUND, "not_found"),
        (Error::Conflict("dup".into()), StatusCode::CONFLICT, "conflict"),
        (
            Error::Internal("boom".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
        ),
    ];

    for (error, status, code) in cases {
        assert_eq!(error.status(), status, "{error:?}");
        assert_eq!(error.code(), code, "{error:?}");
    }
}

#[test]
fn test_store_errors_map_to_conflict_or_internal() {
    assert!(matches!(
        Error::from(StoreError::Conflict("username is already taken".into())),
        Error::Conflict(_)
    ));
    assert!(matches!(
        Error::from(StoreError::Backend("connection reset".into())),
        Error::Internal(_)
    ));
}

#[tokio::test]
async fn test_internal_error_body_hides_detail() {
    use axum::response::IntoResponse;

    let response = Error::Internal("db password is hunter2".into()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!body.contains("hunter2"));
    assert!(body.contains("internal server error"));
}
