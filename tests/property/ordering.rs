//! Property-based tests for the task ordering relation.
//!
//! Uses proptest to verify that `compare_tasks` is a consistent strict
//! weak order: sorting any permutation of a fixed task set yields the same
//! result, the comparison is antisymmetric and transitive over sampled
//! triples, and the completion/recency rules hold for arbitrary tasks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cmp::Ordering;

use proptest::prelude::*;

use chrono::{DateTime, Utc};
use tasklane_model::order::{compare_tasks, sort_tasks};
use tasklane_model::task::{Task, TaskId};

/// Fixed timestamp so tasks that compare equal are identical values.
fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

// --- Strategies ---

/// Strategy for arbitrary task ids: numeric, non-numeric, or pending.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    prop_oneof![
        (0u64..1_000_000).prop_map(|n| TaskId::confirmed(n.to_string())),
        "[a-z]{1,8}".prop_map(TaskId::confirmed),
        Just(()).prop_map(|()| TaskId::pending()),
    ]
}

/// Strategy for arbitrary tasks.
fn arb_task() -> impl Strategy<Value = Task> {
    (arb_task_id(), any::<bool>()).prop_map(|(id, completed)| Task {
        id,
        title: "t".to_string(),
        description: String::new(),
        assignee: "a".to_string(),
        completed,
        created_at: fixed_time(),
    })
}

proptest! {
    #[test]
    fn sorting_any_permutation_agrees(mut tasks in prop::collection::vec(arb_task(), 0..32), seed in any::<u64>()) {
        let mut shuffled = tasks.clone();
        // Deterministic pseudo-shuffle driven by the seed.
        let len = shuffled.len();
        if len > 1 {
            let mut state = seed;
            for i in (1..len).rev() {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                #[allow(clippy::cast_possible_truncation)]
                let j = (state % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }
        }
        sort_tasks(&mut tasks);
        sort_tasks(&mut shuffled);
        prop_assert_eq!(tasks, shuffled);
    }

    #[test]
    fn comparison_is_antisymmetric(a in arb_task(), b in arb_task()) {
        let forward = compare_tasks(&a, &b);
        let backward = compare_tasks(&b, &a);
        prop_assert_eq!(forward, backward.reverse());
    }

    #[test]
    fn comparison_is_reflexively_equal(a in arb_task()) {
        prop_assert_eq!(compare_tasks(&a, &a), Ordering::Equal);
    }

    #[test]
    fn comparison_is_transitive(a in arb_task(), b in arb_task(), c in arb_task()) {
        if compare_tasks(&a, &b) != Ordering::Greater && compare_tasks(&b, &c) != Ordering::Greater {
            prop_assert_ne!(compare_tasks(&a, &c), Ordering::Greater);
        }
    }

    #[test]
    fn incomplete_always_sorts_before_completed(open in arb_task(), done in arb_task()) {
        let mut open = open;
        let mut done = done;
        open.completed = false;
        done.completed = true;
        prop_assert_eq!(compare_tasks(&open, &done), Ordering::Less);
    }

    #[test]
    fn pending_sorts_before_confirmed_in_same_state(n in 0u64..1_000_000, completed in any::<bool>()) {
        let pending = Task {
            id: TaskId::pending(),
            title: "t".to_string(),
            description: String::new(),
            assignee: "a".to_string(),
            completed,
            created_at: fixed_time(),
        };
        let mut confirmed = pending.clone();
        confirmed.id = TaskId::confirmed(n.to_string());
        prop_assert_eq!(compare_tasks(&pending, &confirmed), Ordering::Less);
    }

    #[test]
    fn numeric_ids_sort_descending_in_same_state(a in 0u64..1_000_000, b in 0u64..1_000_000, completed in any::<bool>()) {
        let make = |n: u64| Task {
            id: TaskId::confirmed(n.to_string()),
            title: "t".to_string(),
            description: String::new(),
            assignee: "a".to_string(),
            completed,
            created_at: fixed_time(),
        };
        let expected = b.cmp(&a);
        prop_assert_eq!(compare_tasks(&make(a), &make(b)), expected);
    }
}

// --- Concrete ordering scenarios ---

fn task(id: &str, completed: bool) -> Task {
    Task {
        id: TaskId::confirmed(id),
        title: "t".to_string(),
        description: String::new(),
        assignee: "a".to_string(),
        completed,
        created_at: fixed_time(),
    }
}

#[test]
fn mixed_list_sorts_incomplete_first_then_descending_id() {
    let mut tasks = vec![
        task("2", true),
        task("7", false),
        task("11", true),
        task("3", false),
    ];
    sort_tasks(&mut tasks);
    let ids: Vec<_> = tasks.iter().map(|t| t.id.to_string()).collect();
    assert_eq!(ids, ["7", "3", "11", "2"]);
}

#[test]
fn pending_task_leads_the_incomplete_block() {
    let mut tasks = vec![task("5", false), task("9", false)];
    let mut pending = task("ignored", false);
    pending.id = TaskId::pending();
    tasks.push(pending);
    sort_tasks(&mut tasks);
    assert!(tasks[0].id.is_pending());
    assert_eq!(tasks[1].id.to_string(), "9");
    assert_eq!(tasks[2].id.to_string(), "5");
}
