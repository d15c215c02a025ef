//! Concurrent and randomized checks of the lock table.

use proptest::prelude::*;
use sable_common::PageId;
use sable_txn::{LockManager, LockMode, TransactionId};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

/// Readers and writers spin on the same page. A writer must never observe
/// another holder inside its critical section.
#[test]
fn test_mutual_exclusion_under_contention() {
    let lm = Arc::new(LockManager::new());
    let page = PageId::new(9, 0);
    // >0 readers inside, -1 writer inside.
    let inside = Arc::new(AtomicI32::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let lm = Arc::clone(&lm);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                let txn = TransactionId(1000 + i);
                let mode = if i % 2 == 0 {
                    LockMode::Exclusive
                } else {
                    LockMode::Shared
                };
                for _ in 0..200 {
                    while lm.grant_lock(page, txn, mode) {
                        thread::yield_now();
                    }
                    match mode {
                        LockMode::Exclusive => {
                            assert_eq!(inside.swap(-1, Ordering::SeqCst), 0);
                            assert_eq!(inside.swap(0, Ordering::SeqCst), -1);
                        }
                        LockMode::Shared => {
                            assert!(inside.fetch_add(1, Ordering::SeqCst) >= 0);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        }
                    }
                    lm.release_lock(page, txn);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(lm.locked_page_count(), 0);
}

#[test]
fn test_conflict_then_release_scenario() {
    let lm = LockManager::new();
    let p = PageId::new(3, 7);
    let (a, b) = (TransactionId::next(), TransactionId::next());

    assert!(!lm.grant_lock(p, a, LockMode::Shared));
    assert!(lm.grant_lock(p, b, LockMode::Exclusive));
    lm.release_lock(p, a);
    assert!(!lm.grant_lock(p, b, LockMode::Exclusive));
}

#[derive(Debug, Clone)]
enum Action {
    Grant(u64, u32, bool),
    Release(u64, u32),
    ReleaseAll(u64),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (1u64..5, 0u32..4, any::<bool>()).prop_map(|(t, p, x)| Action::Grant(t, p, x)),
        (1u64..5, 0u32..4).prop_map(|(t, p)| Action::Release(t, p)),
        (1u64..5).prop_map(Action::ReleaseAll),
    ]
}

proptest! {
    #[test]
    fn prop_no_exclusive_with_foreign_reader(actions in prop::collection::vec(action(), 1..80)) {
        let lm = LockManager::new();

        for action in actions {
            match action {
                Action::Grant(t, p, exclusive) => {
                    let mode = if exclusive { LockMode::Exclusive } else { LockMode::Shared };
                    let blocked = lm.grant_lock(PageId::new(1, p), TransactionId(t), mode);
                    if !blocked {
                        prop_assert!(lm.holds_lock(TransactionId(t), PageId::new(1, p)));
                    }
                }
                Action::Release(t, p) => {
                    lm.release_lock(PageId::new(1, p), TransactionId(t));
                    prop_assert!(!lm.holds_lock(TransactionId(t), PageId::new(1, p)));
                }
                Action::ReleaseAll(t) => {
                    lm.release_all(TransactionId(t));
                    prop_assert!(lm.locked_pages(TransactionId(t)).is_empty());
                }
            }

            for p in 0..4 {
                let page = PageId::new(1, p);
                if let Some(writer) = lm.exclusive_holder(page) {
                    for reader in lm.shared_holders(page) {
                        prop_assert_eq!(reader, writer);
                    }
                }
            }
        }
    }
}
