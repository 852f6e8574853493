use chrono::{Duration, NaiveDateTime, Utc};
use director_auth::AuthError;
use director_auth::auth::ClientInfo;
use director_auth::auth::cleanup::cleanup_expired_tokens;
use director_auth::auth::lockout::record_failed_attempt;
use director_auth::auth::refresh::{issue_refresh_token, verify_refresh_token};
use director_auth::auth::service::{ProfileUpdate, RegisterInput, UserUpdate};
use director_auth::auth::session::{create_session, extend_session, verify_session};
use director_auth::models::user::Role;
use director_auth::models::{audit_log, refresh_token, session, user};
use director_auth::testing::TestApp;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, sea_query::Expr,
};

const PASSWORD: &str = "Str0ng!Pass";

fn input(email: &str, username: &str) -> RegisterInput {
    RegisterInput {
        email: email.to_string(),
        username: username.to_string(),
        password: PASSWORD.to_string(),
        first_name: None,
        last_name: None,
    }
}

fn client() -> ClientInfo {
    ClientInfo {
        ip_address: Some("10.0.0.7".to_string()),
        user_agent: Some("service-tests".to_string()),
    }
}

async fn registered(app: &TestApp, email: &str, username: &str) -> user::Model {
    app.state
        .auth
        .register(input(email, username), &client())
        .await
        .expect("registration failed")
        .user
}

fn past(secs: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - Duration::seconds(secs)
}

// ═══════════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════════

mod registration {
    use super::*;

    #[tokio::test]
    async fn test_register_normalises_identity() {
        let app = TestApp::new().await;
        let user = registered(&app, "  Alice@X.com ", "Alice").await;

        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.username, "alice");
        assert_eq!(user.role(), Role::User);
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert_eq!(user.failed_login_attempts, 0);
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_stores_only_digest_of_verification_token() {
        let app = TestApp::new().await;
        let registered = app
            .state
            .auth
            .register(input("bob@x.com", "bob"), &client())
            .await
            .unwrap();

        let stored = app.user_by_email("bob@x.com").await.unwrap();
        let digest = stored.verification_token.unwrap();
        assert_ne!(digest, registered.verification_token);
        assert_eq!(
            digest,
            director_auth::auth::hash_token(&registered.verification_token)
        );
    }

    #[tokio::test]
    async fn test_register_collects_every_field_error() {
        let app = TestApp::new().await;
        let err = app
            .state
            .auth
            .register(
                RegisterInput {
                    email: "not-an-email".to_string(),
                    username: "x".to_string(),
                    password: "weak".to_string(),
                    first_name: None,
                    last_name: None,
                },
                &client(),
            )
            .await
            .unwrap_err();

        let AuthError::ValidationErrors(fields) = err else {
            panic!("expected field errors, got {err:?}");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert!(names.contains(&"email"));
        assert!(names.contains(&"username"));
        assert!(names.iter().filter(|n| **n == "password").count() >= 3);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let app = TestApp::new().await;
        registered(&app, "carol@x.com", "carol").await;

        let err = app
            .state
            .auth
            .register(input("CAROL@X.COM", "carol2"), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let app = TestApp::new().await;
        registered(&app, "dave@x.com", "dave").await;

        let err = app
            .state
            .auth
            .register(input("other@x.com", "DAVE"), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_register_writes_audit_entry() {
        let app = TestApp::new().await;
        let user = registered(&app, "erin@x.com", "erin").await;

        let logs = app.state.auth.recent_audit_logs(None).await.unwrap();
        let entry = logs
            .iter()
            .find(|l| l.action == "register")
            .expect("no register entry");
        assert_eq!(entry.user_id, Some(user.id));
        assert_eq!(entry.entity_type, "user");
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.7"));
    }
}

// ═══════════════════════════════════════════════════════════════
// Login and lockout
// ═══════════════════════════════════════════════════════════════

mod lockout {
    use super::*;

    #[tokio::test]
    async fn test_login_by_email_or_username() {
        let app = TestApp::new().await;
        registered(&app, "frank@x.com", "frank").await;

        let by_email = app
            .state
            .auth
            .login("FRANK@x.com", PASSWORD, &client())
            .await
            .unwrap();
        assert_eq!(by_email.user.username, "frank");
        assert!(by_email.user.last_login_at.is_some());

        let by_name = app.state.auth.login("frank", PASSWORD, &client()).await.unwrap();
        assert_eq!(by_name.user.email, "frank@x.com");
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let app = TestApp::new().await;
        registered(&app, "gina@x.com", "gina").await;

        let unknown = app
            .state
            .auth
            .login("nobody@x.com", PASSWORD, &client())
            .await
            .unwrap_err();
        let wrong = app
            .state
            .auth
            .login("gina@x.com", "Wr0ng!Pass", &client())
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_unknown_user_costs_as_much_as_wrong_password() {
        let mut config = TestApp::test_config();
        config.security.password_hash_memory_kib = 4096;
        config.security.password_hash_iterations = 2;
        config.security.max_login_attempts = 1_000;
        let app = TestApp::with_config(config).await;
        registered(&app, "hana@x.com", "hana").await;
        let auth = &app.state.auth;

        let _ = auth.login("warmup@x.com", PASSWORD, &client()).await;

        let mut unknown = std::time::Duration::ZERO;
        let mut wrong = std::time::Duration::ZERO;
        for _ in 0..5 {
            let started = std::time::Instant::now();
            let _ = auth.login("nobody@x.com", PASSWORD, &client()).await;
            unknown += started.elapsed();

            let started = std::time::Instant::now();
            let _ = auth.login("hana@x.com", "Wr0ng!Pass", &client()).await;
            wrong += started.elapsed();
        }

        assert!(
            unknown * 2 >= wrong,
            "unknown identity took {unknown:?}, wrong password took {wrong:?}"
        );
    }

    #[tokio::test]
    async fn test_account_locks_after_max_attempts() {
        let app = TestApp::new().await;
        registered(&app, "hank@x.com", "hank").await;

        for _ in 0..5 {
            let err = app
                .state
                .auth
                .login("hank", "Wr0ng!Pass", &client())
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials), "got {err:?}");
        }

        let stored = app.user_by_email("hank@x.com").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 5);
        assert!(stored.is_locked(Utc::now().naive_utc()));

        // Even the right password is refused while locked.
        let err = app
            .state
            .auth
            .login("hank", PASSWORD, &client())
            .await
            .unwrap_err();
        match err {
            AuthError::AccountLocked { retry_after_secs } => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 900);
            }
            other => panic!("expected lock, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let app = TestApp::new().await;
        registered(&app, "ivy@x.com", "ivy").await;

        for _ in 0..3 {
            let _ = app.state.auth.login("ivy", "Wr0ng!Pass", &client()).await;
        }
        assert_eq!(
            app.user_by_email("ivy@x.com").await.unwrap().failed_login_attempts,
            3
        );

        app.state.auth.login("ivy", PASSWORD, &client()).await.unwrap();
        let stored = app.user_by_email("ivy@x.com").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_lapsed_lock_allows_login() {
        let app = TestApp::new().await;
        let user = registered(&app, "jack@x.com", "jack").await;

        user::Entity::update_many()
            .col_expr(user::Column::FailedLoginAttempts, Expr::value(5))
            .col_expr(user::Column::LockedUntil, Expr::value(Some(past(1))))
            .filter(user::Column::Id.eq(user.id))
            .exec(&app.db)
            .await
            .unwrap();

        app.state.auth.login("jack", PASSWORD, &client()).await.unwrap();
        let stored = app.user_by_email("jack@x.com").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_failure_after_lapsed_lock_restarts_count() {
        let app = TestApp::new().await;
        let user = registered(&app, "kate@x.com", "kate").await;

        user::Entity::update_many()
            .col_expr(user::Column::FailedLoginAttempts, Expr::value(5))
            .col_expr(user::Column::LockedUntil, Expr::value(Some(past(1))))
            .filter(user::Column::Id.eq(user.id))
            .exec(&app.db)
            .await
            .unwrap();

        let err = app
            .state
            .auth
            .login("kate", "Wr0ng!Pass", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let stored = app.user_by_email("kate@x.com").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 1);
        assert!(stored.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_all_counted() {
        let app = TestApp::new().await;
        let user = registered(&app, "liam@x.com", "liam").await;
        let security = app.config.security.clone();
        let now = Utc::now().naive_utc();

        let user_id = user.id;
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..4 {
            let db = app.db.clone();
            let security = security.clone();
            tasks.spawn(async move { record_failed_attempt(&db, user_id, &security, now).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let stored = app.user_by_email("liam@x.com").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 4);
        assert!(stored.locked_until.is_none());

        record_failed_attempt(&app.db, user.id, &security, now)
            .await
            .unwrap();
        let stored = app.user_by_email("liam@x.com").await.unwrap();
        assert_eq!(stored.failed_login_attempts, 5);
        assert!(stored.locked_until.is_some());
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_login() {
        let app = TestApp::new().await;
        let user = registered(&app, "mia@x.com", "mia").await;

        let mut active: user::ActiveModel = user.into();
        active.is_active = Set(false);
        active.update(&app.db).await.unwrap();

        let err = app
            .state
            .auth
            .login("mia", PASSWORD, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountInactive), "got {err:?}");
    }
}

// ═══════════════════════════════════════════════════════════════
// Refresh tokens
// ═══════════════════════════════════════════════════════════════

mod refresh_tokens {
    use super::*;

    #[tokio::test]
    async fn test_refresh_does_not_rotate() {
        let app = TestApp::new().await;
        let registered = app
            .state
            .auth
            .register(input("nina@x.com", "nina"), &client())
            .await
            .unwrap();
        let refresh = registered.tokens.refresh_token;

        let (first, user) = app.state.auth.refresh_access_token(&refresh).await.unwrap();
        let (second, _) = app.state.auth.refresh_access_token(&refresh).await.unwrap();

        assert_eq!(user.email, "nina@x.com");
        assert!(!first.is_empty());
        assert!(!second.is_empty());
        assert_eq!(refresh_token::Entity::find().count(&app.db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_rejected() {
        let app = TestApp::new().await;
        let user = registered(&app, "omar@x.com", "omar").await;

        let raw = issue_refresh_token(&app.db, user.id, 0).await.unwrap();
        let err = verify_refresh_token(&app.db, &raw).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken), "got {err:?}");
    }

    #[tokio::test]
    async fn test_logout_revokes_only_own_token() {
        let app = TestApp::new().await;
        let a = app
            .state
            .auth
            .register(input("pat@x.com", "pat"), &client())
            .await
            .unwrap();
        let b = app
            .state
            .auth
            .register(input("quinn@x.com", "quinn"), &client())
            .await
            .unwrap();

        // Someone else's token is left alone.
        let revoked = app
            .state
            .auth
            .logout(&a.user, Some(&b.tokens.refresh_token), false, &client())
            .await
            .unwrap();
        assert_eq!(revoked.refresh_tokens, 0);
        assert!(
            app.state
                .auth
                .refresh_access_token(&b.tokens.refresh_token)
                .await
                .is_ok()
        );

        let revoked = app
            .state
            .auth
            .logout(&a.user, Some(&a.tokens.refresh_token), false, &client())
            .await
            .unwrap();
        assert_eq!(revoked.refresh_tokens, 1);
        assert!(
            app.state
                .auth
                .refresh_access_token(&a.tokens.refresh_token)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_logout_everywhere_revokes_tokens_and_sessions() {
        let app = TestApp::new().await;
        let first = app
            .state
            .auth
            .register(input("rosa@x.com", "rosa"), &client())
            .await
            .unwrap();
        app.state.auth.login("rosa", PASSWORD, &client()).await.unwrap();
        app.state.auth.open_session(&first.user, &client()).await.unwrap();

        let revoked = app
            .state
            .auth
            .logout(&first.user, None, true, &client())
            .await
            .unwrap();
        assert_eq!(revoked.refresh_tokens, 2);
        assert_eq!(revoked.sessions, 1);
    }
}

// ═══════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════

mod sessions {
    use super::*;

    #[tokio::test]
    async fn test_session_slides_forward() {
        let app = TestApp::new().await;
        let user = registered(&app, "sam@x.com", "sam").await;

        let created = create_session(&app.db, user.id, None, None, 60).await.unwrap();
        let extended = extend_session(&app.db, &created.token, 3600).await.unwrap();
        assert!(extended > created.expires_at);

        let stored = verify_session(&app.db, &created.token).await.unwrap();
        assert!((stored.expires_at - extended).num_milliseconds().abs() < 1);
        assert_eq!(stored.id, created.session_id);
    }

    #[tokio::test]
    async fn test_expired_session_cannot_be_used_or_extended() {
        let app = TestApp::new().await;
        let user = registered(&app, "tara@x.com", "tara").await;
        let created = create_session(&app.db, user.id, None, None, 60).await.unwrap();

        session::Entity::update_many()
            .col_expr(session::Column::ExpiresAt, Expr::value(past(5)))
            .exec(&app.db)
            .await
            .unwrap();

        let err = verify_session(&app.db, &created.token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSession), "got {err:?}");

        let err = extend_session(&app.db, &created.token, 60).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound), "got {err:?}");

        let err = app
            .state
            .auth
            .authenticate_session(&created.token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSession), "got {err:?}");
    }

    #[tokio::test]
    async fn test_open_session_records_client_and_audit() {
        let app = TestApp::new().await;
        let user = registered(&app, "uma@x.com", "uma").await;

        let created = app.state.auth.open_session(&user, &client()).await.unwrap();
        let (resolved, current) = app
            .state
            .auth
            .authenticate_session(&created.token)
            .await
            .unwrap();

        assert_eq!(resolved.id, user.id);
        assert_eq!(current.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(current.user_agent.as_deref(), Some("service-tests"));

        let logs = app.state.auth.recent_audit_logs(None).await.unwrap();
        let entry = logs.iter().find(|l| l.action == "session_created").unwrap();
        assert_eq!(entry.entity_type, "session");
        assert_eq!(entry.details.as_deref(), Some(created.session_id.as_str()));

        assert_eq!(app.state.auth.close_session(&created.token).await.unwrap(), 1);
        assert_eq!(app.state.auth.close_session(&created.token).await.unwrap(), 0);
    }
}

// ═══════════════════════════════════════════════════════════════
// Password reset, verification, password change
// ═══════════════════════════════════════════════════════════════

mod one_time_tokens {
    use super::*;

    #[tokio::test]
    async fn test_reset_password_is_single_use_and_revokes_credentials() {
        let app = TestApp::new().await;
        let registered = app
            .state
            .auth
            .register(input("vera@x.com", "vera"), &client())
            .await
            .unwrap();
        app.state.auth.open_session(&registered.user, &client()).await.unwrap();

        app.state.auth.forgot_password("VERA@x.com", &client()).await.unwrap();
        let token = app.notifier.last_reset_token("vera@x.com").unwrap();

        app.state
            .auth
            .reset_password(&token, "N3w!Passw0rd", &client())
            .await
            .unwrap();

        let err = app
            .state
            .auth
            .reset_password(&token, "An0ther!Pass", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOneTimeToken), "got {err:?}");

        assert!(
            app.state
                .auth
                .refresh_access_token(&registered.tokens.refresh_token)
                .await
                .is_err()
        );
        assert_eq!(session::Entity::find().count(&app.db).await.unwrap(), 0);

        let stored = app.user_by_email("vera@x.com").await.unwrap();
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_token_expires.is_none());

        app.state.auth.login("vera", "N3w!Passw0rd", &client()).await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_with_expired_token_fails() {
        let app = TestApp::new().await;
        let user = registered(&app, "walt@x.com", "walt").await;
        app.state.auth.forgot_password("walt@x.com", &client()).await.unwrap();
        let token = app.notifier.last_reset_token("walt@x.com").unwrap();

        user::Entity::update_many()
            .col_expr(user::Column::ResetTokenExpires, Expr::value(Some(past(1))))
            .filter(user::Column::Id.eq(user.id))
            .exec(&app.db)
            .await
            .unwrap();

        let err = app
            .state
            .auth
            .reset_password(&token, "N3w!Passw0rd", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOneTimeToken), "got {err:?}");
    }

    #[tokio::test]
    async fn test_reset_rejects_weak_password_before_token_lookup() {
        let app = TestApp::new().await;
        let err = app
            .state
            .auth
            .reset_password("whatever", "weak", &client())
            .await
            .unwrap_err();
        let AuthError::ValidationErrors(fields) = err else {
            panic!("expected field errors, got {err:?}");
        };
        assert!(fields.iter().all(|f| f.field == "newPassword"));
    }

    #[tokio::test]
    async fn test_forgot_password_for_unknown_email_sends_nothing() {
        let app = TestApp::new().await;
        let known = registered(&app, "ivy@x.com", "ivy").await;
        let sent_before = app.notifier.sent().len();

        app.state
            .auth
            .forgot_password("ghost@x.com", &client())
            .await
            .unwrap();
        assert_eq!(app.notifier.sent().len(), sent_before);

        let known = user::Entity::find_by_id(known.id)
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        assert!(known.reset_token.is_none());

        let entry = audit_log::Entity::find()
            .filter(audit_log::Column::Action.eq("password_reset_requested"))
            .one(&app.db)
            .await
            .unwrap()
            .expect("request should be audited");
        assert_eq!(entry.user_id, None);
        assert_eq!(entry.details.as_deref(), Some("unknown email"));
    }

    #[tokio::test]
    async fn test_verify_email_once() {
        let app = TestApp::new().await;
        registered(&app, "xena@x.com", "xena").await;
        let token = app.notifier.last_verification_token("xena@x.com").unwrap();

        app.state.auth.verify_email(&token, &client()).await.unwrap();
        let stored = app.user_by_email("xena@x.com").await.unwrap();
        assert!(stored.is_verified);
        assert!(stored.verification_token.is_none());

        let err = app.state.auth.verify_email(&token, &client()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOneTimeToken), "got {err:?}");

        let err = app.state.auth.verify_email("  ", &client()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOneTimeToken), "got {err:?}");
    }

    #[tokio::test]
    async fn test_change_password() {
        let app = TestApp::new().await;
        let user = registered(&app, "yuri@x.com", "yuri").await;

        let err = app
            .state
            .auth
            .change_password(&user, "Wr0ng!Pass", "N3w!Passw0rd", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials), "got {err:?}");

        let err = app
            .state
            .auth
            .change_password(&user, PASSWORD, PASSWORD, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)), "got {err:?}");

        app.state
            .auth
            .change_password(&user, PASSWORD, "N3w!Passw0rd", &client())
            .await
            .unwrap();

        assert!(app.state.auth.login("yuri", PASSWORD, &client()).await.is_err());
        app.state.auth.login("yuri", "N3w!Passw0rd", &client()).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_profile() {
        let app = TestApp::new().await;
        registered(&app, "zoe@x.com", "zoe").await;
        let user = registered(&app, "zack@x.com", "zack").await;

        let err = app
            .state
            .auth
            .update_profile(
                user.clone(),
                ProfileUpdate {
                    username: Some("ZOE".to_string()),
                    ..Default::default()
                },
                &client(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity(_)), "got {err:?}");

        let updated = app
            .state
            .auth
            .update_profile(
                user,
                ProfileUpdate {
                    first_name: Some(" <b>Zack</b> ".to_string()),
                    last_name: Some("Smith".to_string()),
                    username: Some("zack".to_string()),
                },
                &client(),
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("bZack/b"));
        assert_eq!(updated.last_name.as_deref(), Some("Smith"));
        assert_eq!(updated.username, "zack");
    }
}

// ═══════════════════════════════════════════════════════════════
// Cleanup and administration
// ═══════════════════════════════════════════════════════════════

mod maintenance {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_rows() {
        let app = TestApp::new().await;
        let user = registered(&app, "abe@x.com", "abe").await;

        // One live refresh token from registration, one expired.
        refresh_token::ActiveModel {
            user_id: Set(user.id),
            token_hash: Set("expired-digest".to_string()),
            expires_at: Set(past(10)),
            created_at: Set(past(100)),
            ..Default::default()
        }
        .insert(&app.db)
        .await
        .unwrap();

        let live = create_session(&app.db, user.id, None, None, 3600).await.unwrap();
        let stale = create_session(&app.db, user.id, None, None, 3600).await.unwrap();
        session::Entity::update_many()
            .col_expr(session::Column::ExpiresAt, Expr::value(past(1)))
            .filter(session::Column::Id.eq(stale.session_id.clone()))
            .exec(&app.db)
            .await
            .unwrap();

        user::Entity::update_many()
            .col_expr(user::Column::ResetToken, Expr::value(Some("digest".to_string())))
            .col_expr(user::Column::ResetTokenExpires, Expr::value(Some(past(1))))
            .exec(&app.db)
            .await
            .unwrap();

        let report = cleanup_expired_tokens(&app.db).await.unwrap();
        assert_eq!(report.refresh_tokens, 1);
        assert_eq!(report.sessions, 1);
        assert_eq!(report.reset_tokens, 1);
        assert_eq!(report.total(), 3);

        assert_eq!(refresh_token::Entity::find().count(&app.db).await.unwrap(), 1);
        assert!(verify_session(&app.db, &live.token).await.is_ok());

        let again = cleanup_expired_tokens(&app.db).await.unwrap();
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_but_keeps_audit_history() {
        let app = TestApp::new().await;
        let admin = registered(&app, "root@x.com", "root").await;
        let user = registered(&app, "bea@x.com", "bea").await;
        app.state.auth.open_session(&user, &client()).await.unwrap();

        app.state
            .auth
            .delete_user(&admin, user.id, &client())
            .await
            .unwrap();

        assert_eq!(
            refresh_token::Entity::find()
                .filter(refresh_token::Column::UserId.eq(user.id))
                .count(&app.db)
                .await
                .unwrap(),
            0
        );
        assert_eq!(session::Entity::find().count(&app.db).await.unwrap(), 0);

        let orphaned = audit_log::Entity::find()
            .filter(audit_log::Column::Action.eq("register"))
            .filter(audit_log::Column::UserId.is_null())
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(orphaned, 1);

        let err = app
            .state
            .auth
            .delete_user(&admin, user.id, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_deactivation_revokes_credentials() {
        let app = TestApp::new().await;
        let admin = registered(&app, "cy@x.com", "cy").await;
        let target = app
            .state
            .auth
            .register(input("dee@x.com", "dee"), &client())
            .await
            .unwrap();

        let updated = app
            .state
            .auth
            .update_user(
                &admin,
                target.user.id,
                UserUpdate {
                    role: Some(Role::Manager),
                    is_active: Some(false),
                },
                &client(),
            )
            .await
            .unwrap();
        assert_eq!(updated.role(), Role::Manager);
        assert!(!updated.is_active);

        let err = app
            .state
            .auth
            .refresh_access_token(&target.tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken), "got {err:?}");

        let err = app
            .state
            .auth
            .authenticate_bearer(&target.tokens.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountInactive), "got {err:?}");
    }

    #[tokio::test]
    async fn test_audit_log_limit_is_clamped() {
        let app = TestApp::new().await;
        registered(&app, "eli@x.com", "eli").await;
        for _ in 0..3 {
            let _ = app.state.auth.login("eli", "Wr0ng!Pass", &client()).await;
        }

        let logs = app.state.auth.recent_audit_logs(Some(0)).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "login_failed");

        let all = app.state.auth.recent_audit_logs(Some(10_000)).await.unwrap();
        assert_eq!(all.len(), 4);
    }
}

// ═══════════════════════════════════════════════════════════════
// Admin bootstrap
// ═══════════════════════════════════════════════════════════════

mod admin_bootstrap {
    use super::*;

    #[tokio::test]
    async fn test_create_admin_can_use_admin_routes() {
        let app = TestApp::new().await;
        let admin = app
            .state
            .auth
            .create_admin(input(" Root@X.com ", "root"), &ClientInfo::default())
            .await
            .unwrap();

        assert_eq!(admin.email, "root@x.com");
        assert_eq!(admin.role(), Role::Admin);
        assert!(admin.is_verified);
        assert!(admin.verification_token.is_none());
        assert!(app.notifier.sent().is_empty());

        let res = app.login("root", PASSWORD).await;
        assert_eq!(res.status, 200, "{}", res.body);
        let access = res.data()["accessToken"].as_str().unwrap().to_string();

        let res = app
            .client
            .get_with_auth(&app.api("/admin/audit-logs"), &access)
            .await;
        assert_eq!(res.status, 200, "{}", res.body);
    }

    #[tokio::test]
    async fn test_create_admin_validates_like_registration() {
        let app = TestApp::new().await;
        registered(&app, "taken@x.com", "taken").await;

        let mut weak = input("root@x.com", "root");
        weak.password = "short".to_string();
        let err = app
            .state
            .auth
            .create_admin(weak, &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ValidationErrors(_)), "got {err:?}");

        let err = app
            .state
            .auth
            .create_admin(input("taken@x.com", "root"), &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_set_role_by_email_or_username() {
        let app = TestApp::new().await;
        let user = registered(&app, "jo@x.com", "jo").await;

        let promoted = app
            .state
            .auth
            .set_role_by_identifier("JO@x.com", Role::Admin, &ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(promoted.id, user.id);
        assert_eq!(promoted.role(), Role::Admin);

        let demoted = app
            .state
            .auth
            .set_role_by_identifier("jo", Role::Manager, &ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(demoted.role(), Role::Manager);

        let entries = audit_log::Entity::find()
            .filter(audit_log::Column::Action.eq("user_updated"))
            .filter(audit_log::Column::EntityId.eq(user.id))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(entries, 2);
    }

    #[tokio::test]
    async fn test_set_role_for_unknown_account() {
        let app = TestApp::new().await;
        let err = app
            .state
            .auth
            .set_role_by_identifier("nobody", Role::Admin, &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)), "got {err:?}");
    }
}
