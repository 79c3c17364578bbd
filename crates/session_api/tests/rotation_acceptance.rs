use std::sync::Arc;

use session_api::SessionController;
use shared::domain::{ChannelId, GuildId, Member, NewSession, SessionId, SessionKind, UserId};
use storage::{SessionStore, Storage};

fn user_ids(users: Vec<UserId>) -> Vec<i64> {
    users.into_iter().map(|u| u.0).collect()
}

#[tokio::test]
async fn sqlite_backed_rotation_follows_the_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ctl = SessionController::new(Arc::new(storage));
    let session_id = SessionId(7001);

    ctl.create_session(NewSession {
        session_id,
        guild_id: GuildId(1),
        guild_name: "rl-jp".into(),
        channel_id: ChannelId(2),
        channel_name: "private-match".into(),
        author_id: UserId(1),
        author_name: "host".into(),
        author_display_name: "Host".into(),
        kind: SessionKind::Qk,
    })
    .await
    .expect("session");

    for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol"), (4, "dave")] {
        ctl.join(session_id, &Member::new(UserId(id), name))
            .await
            .expect("join");
    }

    let view = ctl.request_break(session_id, 2).await.expect("first break");
    assert_eq!(user_ids(view.break_ids()), vec![1, 2]);

    // carol leaves while queued, so the short pool restarts from join order.
    ctl.leave(session_id, UserId(3)).await.expect("leave");
    let view = ctl.request_break(session_id, 2).await.expect("second break");
    assert_eq!(user_ids(view.break_ids()), vec![1, 2]);
    let pool: Vec<i64> = ctl
        .store()
        .list_pool(session_id)
        .await
        .expect("pool")
        .iter()
        .map(|e| e.user_id.0)
        .collect();
    assert_eq!(pool, vec![1, 2, 4]);

    let view = ctl.request_break(session_id, 1).await.expect("third break");
    assert_eq!(user_ids(view.break_ids()), vec![1]);
    assert_eq!(user_ids(view.participant_ids()), vec![1, 2, 4]);
}

#[tokio::test]
async fn trait_object_store_drives_the_controller() {
    let store: Arc<dyn SessionStore> = Arc::new(Storage::new("sqlite::memory:").await.expect("db"));
    let ctl = SessionController::new(store);
    let session_id = SessionId(7002);

    for id in 1..=3 {
        ctl.join(session_id, &Member::new(UserId(id), format!("user{id}")))
            .await
            .expect("join");
    }
    let mut seen = Vec::new();
    for _ in 0..3 {
        let view = ctl.request_break(session_id, 1).await.expect("break");
        seen.extend(user_ids(view.break_ids()));
    }
    assert_eq!(seen, vec![1, 2, 3]);

    let view = ctl.current_view(session_id).await.expect("view");
    assert_eq!(user_ids(view.break_ids()), vec![3]);
}
