use quiz_core::fixed_now;
use quiz_core::model::{ProfileId, QuizMode, UnitId, UserId, UserStats};
use storage::remote::{RemoteConfig, RemoteStore};
use storage::repository::{
    AttemptRecord, AttemptRepository, ProfileRepository, ProgressionRecord, StorageError,
};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> RemoteStore {
    RemoteStore::new(RemoteConfig::new(server.uri(), "proj-1", "key-1"))
}

fn profile_body(id: &str, user_id: &str, total_score: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "userId": user_id,
        "username": "rabbit",
        "email": "rabbit@example.com",
        "carrots": 7,
        "unlockedWeeks": [1, 2],
        "completedWeeks": [1],
        "activeWeek": 2,
        "promoStartedAt": null,
        "totalQuizzesTaken": 2,
        "totalQuestionsAnswered": 20,
        "totalCorrect": 15,
        "totalIncorrect": 5,
        "totalScore": total_score,
        "averageScore": 75.0
    })
}

fn sample_attempt() -> AttemptRecord {
    AttemptRecord {
        user_id: UserId::new("u1"),
        username: "rabbit".into(),
        unit: UnitId::new(2),
        mode: QuizMode::Practice,
        total_questions: 10,
        correct: 7,
        incorrect: 3,
        score: 7,
        score_percent: 70.0,
        time_taken_secs: 95,
        completed_at: fixed_now(),
    }
}

#[tokio::test]
async fn get_or_create_returns_the_existing_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/profiles/documents"))
        .and(query_param("userId", "u1"))
        .and(header("X-Api-Key", "key-1"))
        .and(header("X-Project-Id", "proj-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 1,
            "documents": [profile_body("prof_1", "u1", 15)]
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let record = store
        .get_or_create(&UserId::new("u1"), "rabbit", "rabbit@example.com")
        .await
        .expect("get_or_create");

    assert_eq!(record.id.as_str(), "prof_1");
    assert_eq!(record.progression.carrots, 7);
    assert_eq!(record.stats.total_score(), 15);
}

#[tokio::test]
async fn get_or_create_creates_a_missing_profile_with_defaults() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/profiles/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 0,
            "documents": []
        })))
        .mount(&server)
        .await;

    let mut created = profile_body("prof_new", "u1", 0);
    created["carrots"] = serde_json::json!(12);
    created["unlockedWeeks"] = serde_json::json!([1]);
    Mock::given(method("POST"))
        .and(path("/collections/profiles/documents"))
        .and(body_partial_json(serde_json::json!({
            "userId": "u1",
            "carrots": 12,
            "unlockedWeeks": [1]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(&created))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let record = store
        .get_or_create(&UserId::new("u1"), "rabbit", "rabbit@example.com")
        .await
        .expect("get_or_create");

    assert_eq!(record.id.as_str(), "prof_new");
    assert_eq!(record.progression.carrots, 12);
}

#[tokio::test]
async fn creation_conflict_resolves_to_the_stored_profile() {
    let server = MockServer::start().await;

    // First lookup misses; after the conflicted create the re-fetch hits.
    Mock::given(method("GET"))
        .and(path("/collections/profiles/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 0,
            "documents": []
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/collections/profiles/documents"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/collections/profiles/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 1,
            "documents": [profile_body("prof_other", "u1", 40)]
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let record = store
        .get_or_create(&UserId::new("u1"), "rabbit", "rabbit@example.com")
        .await
        .expect("get_or_create");

    assert_eq!(record.id.as_str(), "prof_other");
    assert_eq!(record.stats.total_score(), 40);
}

#[tokio::test]
async fn update_progression_patches_the_profile_document() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/collections/profiles/documents/prof_1"))
        .and(body_partial_json(serde_json::json!({
            "carrots": 9,
            "unlockedWeeks": [1, 2, 3],
            "activeWeek": 3
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let record = ProgressionRecord {
        carrots: 9,
        unlocked_units: vec![UnitId::new(1), UnitId::new(2), UnitId::new(3)],
        completed_units: vec![UnitId::new(1)],
        active_unit: Some(UnitId::new(3)),
        promo_started_at: None,
    };

    let store = store_for(&server);
    store
        .update_progression(&ProfileId::new("prof_1"), &record)
        .await
        .expect("update");
}

#[tokio::test]
async fn update_progression_maps_missing_profile_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/collections/profiles/documents/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store
        .update_progression(&ProfileId::new("ghost"), &ProgressionRecord::default())
        .await
        .expect_err("missing profile");

    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn commit_attempt_posts_the_attempt_then_patches_stats() {
    let server = MockServer::start().await;

    let mut attempt_doc = serde_json::json!({
        "userId": "u1",
        "username": "rabbit",
        "weekNumber": 2,
        "mode": "practice",
        "totalQuestions": 10,
        "correctAnswers": 7,
        "incorrectAnswers": 3,
        "score": 7,
        "scorePercentage": 70.0,
        "timeTaken": 95
    });
    attempt_doc["completedAt"] = serde_json::to_value(fixed_now()).unwrap();
    attempt_doc["id"] = serde_json::json!("att_1");

    Mock::given(method("POST"))
        .and(path("/collections/attempts/documents"))
        .and(body_partial_json(serde_json::json!({
            "weekNumber": 2,
            "correctAnswers": 7,
            "timeTaken": 95
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(&attempt_doc))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/collections/profiles/documents/prof_1"))
        .and(body_partial_json(serde_json::json!({
            "totalQuizzesTaken": 3,
            "totalScore": 22
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let stats = UserStats::from_persisted(3, 30, 22, 8, 22, 73.0);
    let store = store_for(&server);
    let id = store
        .commit_attempt(&sample_attempt(), &ProfileId::new("prof_1"), &stats)
        .await
        .expect("commit");

    assert_eq!(id.as_str(), "att_1");
}

#[tokio::test]
async fn failed_stats_write_discards_the_posted_attempt() {
    let server = MockServer::start().await;

    let mut attempt_doc = serde_json::json!({
        "id": "att_orphan",
        "userId": "u1",
        "username": "rabbit",
        "weekNumber": 2,
        "mode": "practice",
        "totalQuestions": 10,
        "correctAnswers": 7,
        "incorrectAnswers": 3,
        "score": 7,
        "scorePercentage": 70.0,
        "timeTaken": 95
    });
    attempt_doc["completedAt"] = serde_json::to_value(fixed_now()).unwrap();

    Mock::given(method("POST"))
        .and(path("/collections/attempts/documents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&attempt_doc))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/collections/profiles/documents/prof_1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/collections/attempts/documents/att_orphan"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let stats = UserStats::from_persisted(3, 30, 22, 8, 22, 73.0);
    let store = store_for(&server);
    let err = store
        .commit_attempt(&sample_attempt(), &ProfileId::new("prof_1"), &stats)
        .await
        .expect_err("stats write failed");

    assert!(matches!(err, StorageError::Connection(_)));
}

#[tokio::test]
async fn list_by_score_passes_ordering_and_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/profiles/documents"))
        .and(query_param("orderBy", "-totalScore"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 2,
            "documents": [
                profile_body("prof_a", "u_a", 50),
                profile_body("prof_b", "u_b", 20)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let profiles = store.list_by_score(3).await.expect("list");

    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].stats.total_score(), 50);
    assert_eq!(profiles[1].stats.total_score(), 20);
}

#[tokio::test]
async fn list_for_user_returns_attempt_history() {
    let server = MockServer::start().await;

    let mut newest = serde_json::json!({
        "id": "att_2",
        "userId": "u1",
        "username": "rabbit",
        "weekNumber": 3,
        "mode": "shuffle",
        "totalQuestions": 5,
        "correctAnswers": 5,
        "incorrectAnswers": 0,
        "score": 5,
        "scorePercentage": 100.0,
        "timeTaken": 41
    });
    newest["completedAt"] = serde_json::to_value(fixed_now()).unwrap();
    let mut older = newest.clone();
    older["id"] = serde_json::json!("att_1");
    older["weekNumber"] = serde_json::json!(2);
    older["mode"] = serde_json::json!("practice");

    Mock::given(method("GET"))
        .and(path("/collections/attempts/documents"))
        .and(query_param("userId", "u1"))
        .and(query_param("orderBy", "-completedAt"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 2,
            "documents": [newest, older]
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let attempts = store
        .list_for_user(&UserId::new("u1"), 10)
        .await
        .expect("history");

    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].unit, UnitId::new(3));
    assert_eq!(attempts[0].mode, QuizMode::Shuffle);
    assert_eq!(attempts[1].unit, UnitId::new(2));
}
