use super::*;
use crate::test_support::{patient, settle, ScriptedDirectory};
use tokio::time::sleep;

fn controller(directory: &Arc<ScriptedDirectory>) -> SearchController {
    SearchController::new(directory.clone(), DEFAULT_DEBOUNCE)
}

#[tokio::test(start_paused = true)]
async fn resolved_search_stores_results_in_relevance_order() {
    let directory = ScriptedDirectory::new();
    directory.answer_search("ana", Ok(vec![patient(1, "Ana Li")]));
    let search = controller(&directory);

    search.set_query("ana");
    assert_eq!(search.state().phase, SearchPhase::Debouncing);
    assert!(!search.state().pending);

    sleep(Duration::from_millis(600)).await;

    let state = search.state();
    assert_eq!(directory.search_calls(), vec!["ana".to_string()]);
    assert_eq!(state.results, vec![patient(1, "Ana Li")]);
    assert_eq!(state.error, None);
    assert!(!state.pending);
    assert_eq!(state.phase, SearchPhase::Resolved);
}

#[tokio::test(start_paused = true)]
async fn typing_within_the_window_dispatches_only_the_final_text() {
    let directory = ScriptedDirectory::new();
    directory.answer_search("ana", Ok(vec![patient(1, "Ana Li")]));
    let search = controller(&directory);

    search.set_query("a");
    sleep(Duration::from_millis(100)).await;
    search.set_query("an");
    sleep(Duration::from_millis(100)).await;
    search.set_query("ana");
    sleep(Duration::from_millis(499)).await;
    assert!(directory.search_calls().is_empty());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(directory.search_calls(), vec!["ana".to_string()]);
    assert_eq!(search.state().results.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn blank_query_clears_state_without_dispatch() {
    let directory = ScriptedDirectory::new();
    directory.answer_search("ana", Ok(vec![patient(1, "Ana Li")]));
    let search = controller(&directory);

    search.set_query("ana");
    sleep(Duration::from_millis(600)).await;
    assert_eq!(search.state().results.len(), 1);

    search.set_query("   ");
    let state = search.state();
    assert!(state.results.is_empty());
    assert_eq!(state.error, None);
    assert!(!state.pending);
    assert_eq!(state.phase, SearchPhase::Idle);

    search.set_query("");
    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(directory.search_calls(), vec!["ana".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn stale_response_never_overwrites_newer_results() {
    let directory = ScriptedDirectory::new();
    let older = directory.gate_search("ab");
    let newer = directory.gate_search("abc");
    let search = controller(&directory);

    search.set_query("ab");
    sleep(Duration::from_millis(600)).await;
    assert!(search.state().pending);

    search.set_query("abc");
    assert!(!search.state().pending, "superseded request is no longer pending");
    sleep(Duration::from_millis(600)).await;
    assert!(search.state().pending);

    newer
        .send(Ok(vec![patient(2, "Abc Bo")]))
        .expect("deliver newer");
    settle().await;
    assert_eq!(search.state().results, vec![patient(2, "Abc Bo")]);

    older
        .send(Ok(vec![patient(1, "Ab Ana")]))
        .expect("deliver older");
    settle().await;

    let state = search.state();
    assert_eq!(state.query, "abc");
    assert_eq!(state.results, vec![patient(2, "Abc Bo")]);
    assert!(!state.pending);
    assert_eq!(directory.search_calls(), vec!["ab".to_string(), "abc".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn response_for_superseded_query_is_ignored_while_debouncing() {
    let directory = ScriptedDirectory::new();
    let slow = directory.gate_search("ann");
    let search = controller(&directory);

    search.set_query("ann");
    sleep(Duration::from_millis(600)).await;
    search.set_query("anna");

    slow.send(Ok(vec![patient(4, "Ann Ko")])).expect("deliver");
    settle().await;

    let state = search.state();
    assert!(state.results.is_empty());
    assert_eq!(state.phase, SearchPhase::Debouncing);
}

#[tokio::test(start_paused = true)]
async fn failure_clears_results_and_surfaces_message() {
    let directory = ScriptedDirectory::new();
    directory.answer_search("ana", Ok(vec![patient(1, "Ana Li")]));
    directory.answer_search(
        "boom",
        Err(RemoteError::from_status(500, "Database offline")),
    );
    let search = controller(&directory);

    search.set_query("ana");
    sleep(Duration::from_millis(600)).await;
    search.set_query("boom");
    sleep(Duration::from_millis(600)).await;

    let state = search.state();
    assert!(state.results.is_empty());
    assert_eq!(state.error.as_deref(), Some("Database offline"));
    assert!(!state.pending);
    assert_eq!(state.phase, SearchPhase::Failed);
    assert_eq!(directory.search_calls().len(), 2, "failures are not retried");
}

#[tokio::test(start_paused = true)]
async fn retry_redispatches_current_query_immediately() {
    let directory = ScriptedDirectory::new();
    directory.answer_search("ana", Err(RemoteError::transport("connection refused")));
    let search = controller(&directory);

    search.set_query("ana");
    sleep(Duration::from_millis(600)).await;
    assert_eq!(search.state().error.as_deref(), Some("connection refused"));

    directory.answer_search("ana", Ok(vec![patient(1, "Ana Li")]));
    assert!(search.retry());
    settle().await;

    let state = search.state();
    assert_eq!(state.error, None);
    assert_eq!(state.results, vec![patient(1, "Ana Li")]);
    assert_eq!(directory.search_calls().len(), 2);

    search.set_query("");
    assert!(!search.retry());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_debounce() {
    let directory = ScriptedDirectory::new();
    let search = controller(&directory);

    search.set_query("ana");
    search.shutdown();
    sleep(Duration::from_millis(2_000)).await;

    assert!(directory.search_calls().is_empty());
    assert!(search.is_shut_down());

    search.set_query("bob");
    assert_eq!(search.state().query, "ana", "input after teardown is ignored");
}

#[tokio::test(start_paused = true)]
async fn completion_after_shutdown_is_a_no_op() {
    let directory = ScriptedDirectory::new();
    let gate = directory.gate_search("ana");
    let search = controller(&directory);

    search.set_query("ana");
    sleep(Duration::from_millis(600)).await;
    search.shutdown();

    gate.send(Ok(vec![patient(1, "Ana Li")])).expect("deliver");
    settle().await;

    assert!(search.state().results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn settle_reports_how_each_response_was_handled() {
    let directory = ScriptedDirectory::new();
    let search = controller(&directory);

    search.set_query("ana");
    let stale = search.generation();
    search.set_query("anab");
    let current = search.generation();
    assert!(current > stale);

    assert_eq!(search.settle(stale, Ok(vec![patient(1, "Ana Li")])), Settlement::Superseded);
    assert_eq!(search.settle(current, Ok(Vec::new())), Settlement::Applied);

    search.shutdown();
    assert_eq!(search.settle(current, Ok(Vec::new())), Settlement::TornDown);
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_the_phase_sequence() {
    let directory = ScriptedDirectory::new();
    directory.answer_search("ana", Ok(vec![patient(1, "Ana Li")]));
    let search = controller(&directory);
    let mut updates = search.subscribe();

    search.set_query("ana");
    assert_eq!(updates.borrow_and_update().phase, SearchPhase::Debouncing);

    sleep(Duration::from_millis(600)).await;
    assert!(updates.has_changed().expect("sender alive"));
    assert_eq!(updates.borrow_and_update().phase, SearchPhase::Resolved);
}

#[tokio::test(start_paused = true)]
async fn repeating_the_same_text_does_not_restart_the_window() {
    let directory = ScriptedDirectory::new();
    let search = controller(&directory);

    search.set_query("ana");
    sleep(Duration::from_millis(300)).await;
    search.set_query("ana");
    sleep(Duration::from_millis(250)).await;

    assert_eq!(directory.search_calls(), vec!["ana".to_string()]);
}
