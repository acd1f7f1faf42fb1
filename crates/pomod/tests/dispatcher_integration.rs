//! Integration tests for text command routing.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

mod common;

use common::{chat, slow_settings, Harness, Sent};
use pomo_core::{Keyboard, Phase};
use pomod::dispatcher::{DispatchError, Dispatcher};
use pomod::session::TransitionError;
use pomod::store::StoreError;

fn dispatcher(h: &Harness) -> Dispatcher {
    Dispatcher::new(h.scheduler.clone(), None)
}

fn last_message(h: &Harness) -> Sent {
    h.notifier.sent().pop().expect("at least one message")
}

#[tokio::test(start_paused = true)]
async fn test_start_and_stop_return_new_phase() {
    let h = Harness::new(slow_settings());
    let d = dispatcher(&h);

    assert_eq!(d.dispatch(chat(1), "/start").await.unwrap(), Phase::Working);
    assert_eq!(d.dispatch(chat(1), "/stop").await.unwrap(), Phase::WorkEnded);
    assert_eq!(
        d.dispatch(chat(1), "/start@pomo_bot").await.unwrap(),
        Phase::OnBreak
    );
}

#[tokio::test(start_paused = true)]
async fn test_allow_list_drops_other_chats_silently() {
    let h = Harness::new(slow_settings());
    let d = Dispatcher::new(h.scheduler.clone(), Some(chat(1)));

    assert!(d.is_allowed(chat(1)));
    assert!(!d.is_allowed(chat(2)));

    let err = d.dispatch(chat(2), "/start").await.unwrap_err();
    assert_eq!(err, DispatchError::NotAllowed(chat(2)));
    assert!(h.notifier.sent().is_empty());
    assert!(h.scheduler.sessions().get(chat(2)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_replies_with_keyboard() {
    let h = Harness::new(slow_settings());
    let d = dispatcher(&h);

    let err = d.dispatch(chat(1), "hello there").await.unwrap_err();
    assert_eq!(err, DispatchError::UnknownCommand("hello there".to_string()));

    match last_message(&h) {
        Sent::Message { text, keyboard, .. } => {
            assert_eq!(text, "Unknown command");
            assert_eq!(keyboard, Some(Keyboard::for_phase(Phase::Idle)));
        }
        other => panic!("expected a message, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_explains_rejection() {
    let h = Harness::new(slow_settings());
    let d = dispatcher(&h);

    d.dispatch(chat(1), "/start").await.unwrap();
    let err = d.dispatch(chat(1), "/start").await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Rejected(TransitionError::AlreadyRunning {
            phase: Phase::Working,
            ..
        })
    ));

    match last_message(&h) {
        Sent::Message { text, keyboard, .. } => {
            assert_eq!(text, "Already working, 60:00 left. Send /stop first.");
            assert_eq!(keyboard, Some(Keyboard::for_phase(Phase::Working)));
        }
        other => panic!("expected a message, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_task_lifecycle() {
    let h = Harness::new(slow_settings());
    let d = dispatcher(&h);
    let c = chat(1);

    d.dispatch(c, "/tasks").await.unwrap();
    assert_eq!(
        last_message(&h).text(),
        "No tasks yet. Add one with /tasks add <name>"
    );

    d.dispatch(c, "/tasks add Writing").await.unwrap();
    assert_eq!(last_message(&h).text(), "Added task Writing");
    d.dispatch(c, "/tasks add Code review").await.unwrap();

    d.dispatch(c, "/tasks list").await.unwrap();
    assert_eq!(last_message(&h).text(), "Code review\nWriting");

    d.dispatch(c, "/tasks set Code review").await.unwrap();
    assert_eq!(last_message(&h).text(), "Changed task to Code review");
    assert!(h.scheduler.snapshot(c).await.selected_task.is_some());

    d.dispatch(c, "/tasks delete Writing").await.unwrap();
    assert_eq!(last_message(&h).text(), "Deleted task Writing");

    d.dispatch(c, "/tasks list").await.unwrap();
    assert_eq!(last_message(&h).text(), "Code review");
}

#[tokio::test(start_paused = true)]
async fn test_task_errors_are_reported() {
    let h = Harness::new(slow_settings());
    let d = dispatcher(&h);
    let c = chat(1);

    d.dispatch(c, "/tasks add Writing").await.unwrap();
    let err = d.dispatch(c, "/tasks add Writing").await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::Store(StoreError::DuplicateTask("Writing".to_string()))
    );
    assert_eq!(last_message(&h).text(), "Task already exists: Writing");

    let err = d.dispatch(c, "/tasks set Reading").await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Rejected(TransitionError::TaskNotFound { .. })
    ));
    assert_eq!(last_message(&h).text(), "Task not found: Reading");

    let err = d.dispatch(c, "/tasks delete Reading").await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Rejected(TransitionError::TaskNotFound { .. })
    ));

    let err = d.dispatch(c, "/tasks add").await.unwrap_err();
    assert!(matches!(err, DispatchError::Invalid(_)));

    let err = d.dispatch(c, "/tasks rename A B").await.unwrap_err();
    assert!(matches!(err, DispatchError::Invalid(_)));
    assert!(last_message(&h).text().contains("unknown sub-command"));
}

#[tokio::test(start_paused = true)]
async fn test_task_commands_do_not_change_phase() {
    let h = Harness::new(slow_settings());
    let d = dispatcher(&h);
    let c = chat(1);

    d.dispatch(c, "/start").await.unwrap();
    assert_eq!(
        d.dispatch(c, "/tasks add Writing").await.unwrap(),
        Phase::Working
    );
    assert_eq!(
        d.dispatch(c, "/tasks set Writing").await.unwrap(),
        Phase::Working
    );
}

#[tokio::test(start_paused = true)]
async fn test_tasks_are_per_chat() {
    let h = Harness::new(slow_settings());
    let d = dispatcher(&h);

    d.dispatch(chat(1), "/tasks add Writing").await.unwrap();
    d.dispatch(chat(2), "/tasks list").await.unwrap();
    assert_eq!(
        last_message(&h).text(),
        "No tasks yet. Add one with /tasks add <name>"
    );
}
