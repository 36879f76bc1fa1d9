//! The single ordering rule applied everywhere task lists are assembled.
//!
//! Incomplete tasks sort before completed tasks; within the same completion
//! state, newer ids sort first. A pending id is by construction the newest
//! thing in the collection, so it ranks above every confirmed id; confirmed
//! ids compare by descending numeric value. The comparison is a strict weak
//! order, so repeated sorts of the same set always agree.

use std::cmp::Ordering;

use crate::task::{PendingToken, Task, TaskId};

/// Recency rank of an id. Derived `Ord` places `Confirmed` below `Pending`,
/// and non-numeric confirmed ids below numeric ones.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum IdRank<'a> {
    Confirmed(Option<i128>, &'a str),
    Pending(PendingToken),
}

fn id_rank(id: &TaskId) -> IdRank<'_> {
    match id {
        TaskId::Confirmed(raw) => IdRank::Confirmed(raw.parse().ok(), raw),
        TaskId::Pending(token) => IdRank::Pending(*token),
    }
}

/// Compares two tasks for display order.
///
/// Incomplete before completed; within the same completion state, the task
/// with the higher (newer) id sorts first.
#[must_use]
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    match (a.completed, b.completed) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => id_rank(&b.id).cmp(&id_rank(&a.id)),
    }
}

/// Sorts a task list in place by [`compare_tasks`].
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(compare_tasks);
}
