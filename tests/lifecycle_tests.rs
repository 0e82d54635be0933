use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use movie_vault::{
    Error, InMemoryStore, Role,
    clock::ManualClock,
    lifecycle::{LifecycleManager, StoreState},
    models::{Movie, MovieFilter, MoviePatch, NewMovie, NewUser, User, UserFilter, UserPatch},
    observe::{Event, RecordingObserver},
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
}

struct Harness<T: movie_vault::lifecycle::Lifecycle> {
    manager: LifecycleManager<T>,
    store: Arc<InMemoryStore<T>>,
    clock: ManualClock,
    observer: RecordingObserver,
}

fn harness<T: movie_vault::lifecycle::Lifecycle>() -> Harness<T> {
    let store = InMemoryStore::<T>::shared();
    let clock = ManualClock::new(t0());
    let observer = RecordingObserver::new();
    let manager = LifecycleManager::new(
        store.clone() as StoreState<T>,
        Arc::new(clock.clone()),
        Arc::new(observer.clone()),
    );
    Harness {
        manager,
        store,
        clock,
        observer,
    }
}

fn new_movie(title: &str) -> NewMovie {
    NewMovie {
        title: title.to_string(),
        description: "A heist inside a dream inside a dream.".to_string(),
        director: "Christopher Nolan".to_string(),
        genre: "Sci-Fi".to_string(),
    }
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$placeholder$placeholder".to_string(),
        role: Role::User,
    }
}

// --- Create ---

#[tokio::test]
async fn test_create_stamps_and_is_immediately_visible() {
    let h = harness::<Movie>();

    let movie = h.manager.create(new_movie("Inception")).await.unwrap();

    assert_eq!(movie.id, 1);
    assert_eq!(movie.timestamps.created_at, t0());
    assert_eq!(movie.timestamps.updated_at, t0());
    assert!(movie.timestamps.deleted_at.is_none());

    let found = h.manager.find_live_by_id(movie.id).await.unwrap();
    assert_eq!(found, Some(movie.clone()));

    assert_eq!(
        h.observer.events(),
        vec![Event::EntityCreated {
            kind: "movie",
            id: movie.id
        }]
    );
}

#[tokio::test]
async fn test_create_with_invalid_fields_commits_nothing() {
    let h = harness::<Movie>();

    let mut draft = new_movie("");
    draft.genre = "x".repeat(51);

    let err = h.manager.create(draft).await.unwrap_err();
    match err {
        Error::Validation(errors) => {
            let fields: Vec<_> = errors.fields().collect();
            assert_eq!(fields, vec!["title", "genre"]);
        }
        other => panic!("expected a validation error, got {other:?}"),
    }

    assert_eq!(h.store.row_count().await, 0);
    assert!(h.observer.events().is_empty());
}

// --- Update ---

#[tokio::test]
async fn test_update_advances_updated_at_only() {
    let h = harness::<Movie>();
    let movie = h.manager.create(new_movie("Inception")).await.unwrap();

    h.clock.advance(Duration::seconds(90));
    let updated = h
        .manager
        .update(
            movie.clone(),
            MoviePatch {
                genre: Some("Thriller".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.genre, "Thriller");
    assert_eq!(updated.title, movie.title);
    assert_eq!(updated.timestamps.created_at, t0());
    assert_eq!(updated.timestamps.updated_at, t0() + Duration::seconds(90));
    assert!(updated.timestamps.updated_at > updated.timestamps.created_at);
}

#[tokio::test]
async fn test_update_never_moves_updated_at_backwards() {
    let h = harness::<Movie>();
    let movie = h.manager.create(new_movie("Inception")).await.unwrap();

    h.clock.set(t0() - Duration::hours(1));
    let updated = h
        .manager
        .update(movie, MoviePatch::default())
        .await
        .unwrap();

    assert_eq!(updated.timestamps.updated_at, t0());
}

#[tokio::test]
async fn test_invalid_update_leaves_stored_row_untouched() {
    let h = harness::<Movie>();
    let movie = h.manager.create(new_movie("Inception")).await.unwrap();

    let err = h
        .manager
        .update(
            movie.clone(),
            MoviePatch {
                description: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let stored = h.manager.get_live(movie.id).await.unwrap();
    assert_eq!(stored, movie);
}

#[tokio::test]
async fn test_update_of_deleted_row_is_not_found() {
    let h = harness::<Movie>();
    let movie = h.manager.create(new_movie("Inception")).await.unwrap();

    h.manager.soft_delete(movie.id).await.unwrap();

    let err = h
        .manager
        .update(movie, MoviePatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// --- Soft Delete ---

#[tokio::test]
async fn test_soft_delete_hides_row_but_keeps_it_stored() {
    let h = harness::<Movie>();
    let keep = h.manager.create(new_movie("Inception")).await.unwrap();
    let gone = h.manager.create(new_movie("Tenet")).await.unwrap();

    h.clock.advance(Duration::minutes(5));
    h.manager.soft_delete(gone.id).await.unwrap();

    assert_eq!(h.manager.find_live_by_id(gone.id).await.unwrap(), None);
    assert!(matches!(
        h.manager.get_live(gone.id).await,
        Err(Error::NotFound(_))
    ));

    let live = h.manager.find_live(&MovieFilter::default()).await.unwrap();
    assert_eq!(live, vec![keep]);

    // Logical deletion only.
    assert_eq!(h.store.row_count().await, 2);

    assert!(h.observer.events().contains(&Event::EntitySoftDeleted {
        kind: "movie",
        id: gone.id
    }));
}

#[tokio::test]
async fn test_second_delete_is_not_found() {
    let h = harness::<Movie>();
    let movie = h.manager.create(new_movie("Inception")).await.unwrap();

    h.manager.soft_delete(movie.id).await.unwrap();
    let err = h.manager.soft_delete(movie.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(msg) if msg == "movie 1 not found"));
}

#[tokio::test]
async fn test_delete_of_unknown_id_is_not_found() {
    let h = harness::<Movie>();
    assert!(matches!(
        h.manager.soft_delete(99).await,
        Err(Error::NotFound(_))
    ));
}

// --- Filters and Ordering ---

#[tokio::test]
async fn test_find_live_filters_and_orders_by_id() {
    let h = harness::<Movie>();
    let a = h.manager.create(new_movie("Inception")).await.unwrap();
    let mut other = new_movie("Alien");
    other.director = "Ridley Scott".to_string();
    let b = h.manager.create(other).await.unwrap();
    let c = h.manager.create(new_movie("Interstellar")).await.unwrap();

    let all = h.manager.find_live(&MovieFilter::default()).await.unwrap();
    let ids: Vec<_> = all.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![a.id, b.id, c.id]);

    let nolan = h
        .manager
        .find_live(&MovieFilter {
            director: Some("Christopher Nolan".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(nolan, vec![a, c]);
}

// --- Uniqueness ---

#[tokio::test]
async fn test_duplicate_live_username_is_conflict() {
    let h = harness::<User>();
    h.manager.create(new_user("alice_smith")).await.unwrap();

    let err = h.manager.create(new_user("alice_smith")).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(h.store.row_count().await, 1);
}

#[tokio::test]
async fn test_deleted_username_can_be_reused() {
    let h = harness::<User>();
    let first = h.manager.create(new_user("alice_smith")).await.unwrap();
    h.manager.soft_delete(first.id).await.unwrap();

    let second = h.manager.create(new_user("alice_smith")).await.unwrap();
    assert_ne!(second.id, first.id);

    let found = h
        .manager
        .find_live(&UserFilter {
            username: Some("alice_smith".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(found, vec![second]);
}

#[tokio::test]
async fn test_rename_onto_taken_username_is_conflict() {
    let h = harness::<User>();
    h.manager.create(new_user("alice_smith")).await.unwrap();
    let bob = h.manager.create(new_user("bob_jones")).await.unwrap();

    let err = h
        .manager
        .update(
            bob,
            UserPatch {
                username: Some("alice_smith".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

// --- Storage Failures ---

#[tokio::test]
async fn test_backend_failure_is_internal_and_observed() {
    let store = Arc::new(InMemoryStore::<Movie>::new_failing());
    let observer = RecordingObserver::new();
    let manager = LifecycleManager::new(
        store as StoreState<Movie>,
        Arc::new(ManualClock::new(t0())),
        Arc::new(observer.clone()),
    );

    let err = manager.create(new_movie("Inception")).await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));

    let err = manager.find_live(&MovieFilter::default()).await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));

    let events = observer.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        Event::InternalFailure {
            context: "create",
            ..
        }
    ));
}
