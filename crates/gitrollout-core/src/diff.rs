//! Change detection between two snapshots of the same category.

use std::cmp::Ordering;
use std::iter::Peekable;

use crate::event::ChangeEvent;
use crate::refset::RefSet;

/// Computes the events that turn `previous` into `current`.
///
/// Events are sorted by ref name and there is at most one per name. Refs that
/// kept their commit produce nothing, so `diff(a, a)` is empty and
/// `previous.apply(&diff(previous, current)) == current`.
///
/// # Panics
///
/// In debug builds, if the two sets belong to different categories.
pub fn diff(previous: &RefSet, current: &RefSet) -> Vec<ChangeEvent> {
    debug_assert_eq!(
        previous.category(),
        current.category(),
        "ref sets of different categories cannot be compared"
    );
    let category = current.category();

    let mut before = previous.iter().peekable();
    let mut after = current.iter().peekable();
    let mut events = Vec::new();

    loop {
        let step = match (before.peek(), after.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((old_name, _)), Some((new_name, _))) => old_name.cmp(new_name),
        };

        match step {
            Ordering::Less => {
                let (name, old) = advance(&mut before);
                events.push(ChangeEvent::deleted(category, name.clone(), old.clone()));
            },
            Ordering::Greater => {
                let (name, new) = advance(&mut after);
                events.push(ChangeEvent::created(category, name.clone(), new.clone()));
            },
            Ordering::Equal => {
                let (name, old) = advance(&mut before);
                let (_, new) = advance(&mut after);
                if old != new {
                    events.push(ChangeEvent::moved(
                        category,
                        name.clone(),
                        old.clone(),
                        new.clone(),
                    ));
                }
            },
        }
    }

    events
}

fn advance<I: Iterator>(iter: &mut Peekable<I>) -> I::Item {
    iter.next()
        .unwrap_or_else(|| unreachable!("peeked iterator is non-empty"))
}
