use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use wand_core::{
    Communication, CommunicationRegistry, EndReason, MemorySink, Outbound, SessionId,
    SessionManager, SessionSummary,
};
use wand_test_utils::{test_blueprint, test_config, ProbeBehavior, ProbeUnit};

const WAIT: Duration = Duration::from_secs(5);

fn manager(config: wand_core::WandConfig, unit: &Arc<ProbeUnit>) -> SessionManager {
    let blueprint = test_blueprint(config, Arc::new(MemorySink::new()))
        .unwrap()
        .with_registry(CommunicationRegistry::new(vec![
            Arc::clone(unit) as Arc<dyn Communication>
        ]));
    SessionManager::new(blueprint)
}

/// Next prompt, skipping notices and views
async fn next_prompt(rx: &mut UnboundedReceiver<Outbound>) -> String {
    loop {
        match timeout(WAIT, rx.recv()).await.unwrap() {
            Some(Outbound::Prompt { message, .. }) => return message,
            Some(Outbound::Ended(summary)) => panic!("session ended early: {summary:?}"),
            Some(_) => {}
            None => panic!("outbound closed"),
        }
    }
}

async fn ended(rx: &mut UnboundedReceiver<Outbound>) -> SessionSummary {
    loop {
        match timeout(WAIT, rx.recv()).await.unwrap() {
            Some(Outbound::Ended(summary)) => return summary,
            Some(_) => {}
            None => panic!("outbound closed without summary"),
        }
    }
}

async fn wait_until_waiting(manager: &SessionManager, id: &SessionId) {
    timeout(WAIT, async {
        while !manager.is_waiting(id) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn replies_drive_a_session_to_completion() {
    let act = ProbeUnit::new("Act probe.", ProbeBehavior::Act);
    let manager = manager(test_config(3), &act);
    let id = SessionId::new("s1");
    let mut rx = manager.create(id.clone()).unwrap();

    assert!(next_prompt(&mut rx).await.starts_with("Select a way"));
    wait_until_waiting(&manager, &id).await;
    assert!(manager.deliver_reply(&id, "1"));

    next_prompt(&mut rx).await;
    wait_until_waiting(&manager, &id).await;
    assert!(manager.deliver_reply(&id, "Done"));

    let summary = ended(&mut rx).await;
    assert_eq!(summary.reason, EndReason::UserDone);
    assert_eq!(summary.turns_left, 2);
    assert_eq!(act.activations(), 1);

    timeout(WAIT, async {
        while manager.remove_finished() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(manager.is_empty());
}

#[tokio::test]
async fn replies_while_not_waiting_are_dropped() {
    let act = ProbeUnit::new("Act probe.", ProbeBehavior::Act);
    let manager = manager(test_config(3), &act);
    assert!(!manager.deliver_reply(&SessionId::new("missing"), "1"));

    let id = SessionId::new("s2");
    let mut rx = manager.create(id.clone()).unwrap();
    next_prompt(&mut rx).await;
    wait_until_waiting(&manager, &id).await;
    assert!(manager.deliver_reply(&id, "Done"));
    assert!(!manager.deliver_reply(&id, "1"));
    assert_eq!(ended(&mut rx).await.reason, EndReason::UserDone);
}

#[tokio::test]
async fn destroy_ends_a_blocked_session() {
    let act = ProbeUnit::new("Act probe.", ProbeBehavior::Act);
    let manager = manager(test_config(3), &act);
    let id = SessionId::new("s3");
    let mut rx = manager.create(id.clone()).unwrap();
    next_prompt(&mut rx).await;

    let handle = manager.destroy(&id).unwrap();
    let summary = timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(summary.reason, EndReason::TransportClosed);
    assert!(!manager.contains(&id));
    assert!(manager.destroy(&id).is_none());
}

#[tokio::test]
async fn reply_timeout_terminates_the_session() {
    let act = ProbeUnit::new("Act probe.", ProbeBehavior::Act);
    let manager = manager(test_config(3).with_reply_timeout(Some(1)), &act);
    let mut rx = manager.create(SessionId::new("slow")).unwrap();

    let summary = ended(&mut rx).await;
    assert_eq!(summary.reason, EndReason::ReplyTimeout);
}

#[tokio::test]
async fn create_replaces_an_existing_session() {
    let act = ProbeUnit::new("Act probe.", ProbeBehavior::Act);
    let manager = manager(test_config(3), &act);
    let id = SessionId::new("dup");

    let mut first = manager.create(id.clone()).unwrap();
    next_prompt(&mut first).await;
    let mut second = manager.create(id.clone()).unwrap();

    assert_eq!(ended(&mut first).await.reason, EndReason::TransportClosed);
    assert_eq!(manager.len(), 1);

    next_prompt(&mut second).await;
    wait_until_waiting(&manager, &id).await;
    assert!(manager.deliver_reply(&id, "Done"));
    assert_eq!(ended(&mut second).await.reason, EndReason::UserDone);
}

#[tokio::test]
async fn sessions_run_independently() {
    let act = ProbeUnit::new("Act probe.", ProbeBehavior::Act);
    let manager = Arc::new(manager(test_config(3), &act));
    let ids: Vec<SessionId> = (0..8).map(|i| SessionId::new(format!("c{i}"))).collect();

    let mut tasks = Vec::new();
    for id in ids {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            let mut rx = manager.create(id.clone()).unwrap();
            next_prompt(&mut rx).await;
            wait_until_waiting(&manager, &id).await;
            manager.deliver_reply(&id, "1");
            next_prompt(&mut rx).await;
            wait_until_waiting(&manager, &id).await;
            manager.deliver_reply(&id, "Done");
            ended(&mut rx).await
        }));
    }
    for task in tasks {
        let summary = task.await.unwrap();
        assert_eq!(summary.turns_left, 2);
    }
    assert_eq!(act.activations(), 8);
}
