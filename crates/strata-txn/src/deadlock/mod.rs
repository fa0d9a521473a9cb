//! Deadlock detection.
//!
//! The wait-for graph is never materialised. Every transaction waits for at
//! most one uid, and every uid has at most one holder, so the graph is the
//! composition of two maps: `waiting_on` (xid → uid) and `owner`
//! (uid → xid). Each node has out-degree ≤ 1, which makes a stamped walk
//! enough to find cycles.
//!
//! # Detection Algorithm
//!
//! ```text
//! for each transaction T holding a lock, not yet stamped:
//!     stamp += 1
//!     walk T → owner(waiting_on(T)) → ...
//!         reached a node with the current stamp  → cycle
//!         reached a node with an older stamp     → no cycle from here
//!         reached a node that is not waiting     → no cycle from here
//! ```
//!
//! Every node is visited once per detection run.

use std::collections::HashMap;

use strata_common::types::{Uid, Xid};

/// A read-only view of the lock table's wait-for relation.
#[derive(Debug)]
pub struct WaitForGraph<'a> {
    holders: &'a HashMap<Xid, Vec<Uid>>,
    owner: &'a HashMap<Uid, Xid>,
    waiting_on: &'a HashMap<Xid, Uid>,
}

impl<'a> WaitForGraph<'a> {
    /// Builds a view over the lock table maps.
    pub fn new(
        holders: &'a HashMap<Xid, Vec<Uid>>,
        owner: &'a HashMap<Uid, Xid>,
        waiting_on: &'a HashMap<Xid, Uid>,
    ) -> Self {
        Self {
            holders,
            owner,
            waiting_on,
        }
    }

    /// Returns true if some transaction transitively waits for itself.
    pub fn has_cycle(&self) -> bool {
        let mut stamps: HashMap<Xid, u64> = HashMap::new();
        let mut stamp = 1u64;

        for &xid in self.holders.keys() {
            if stamps.get(&xid).is_some_and(|&s| s > 0) {
                continue;
            }
            stamp += 1;
            if self.walk(xid, stamp, &mut stamps) {
                return true;
            }
        }
        false
    }

    fn walk(&self, start: Xid, stamp: u64, stamps: &mut HashMap<Xid, u64>) -> bool {
        let mut xid = start;
        loop {
            match stamps.get(&xid) {
                Some(&s) if s == stamp => return true,
                Some(&s) if s < stamp => return false,
                _ => {}
            }
            stamps.insert(xid, stamp);

            let Some(uid) = self.waiting_on.get(&xid) else {
                return false;
            };
            match self.owner.get(uid) {
                Some(&holder) => xid = holder,
                None => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::PageNo;

    fn uid(n: u16) -> Uid {
        Uid::new(PageNo::new(2), n)
    }

    struct Maps {
        holders: HashMap<Xid, Vec<Uid>>,
        owner: HashMap<Uid, Xid>,
        waiting_on: HashMap<Xid, Uid>,
    }

    impl Maps {
        fn new() -> Self {
            Self {
                holders: HashMap::new(),
                owner: HashMap::new(),
                waiting_on: HashMap::new(),
            }
        }

        fn hold(&mut self, xid: u64, u: u16) {
            self.holders.entry(Xid::new(xid)).or_default().push(uid(u));
            self.owner.insert(uid(u), Xid::new(xid));
        }

        fn wait(&mut self, xid: u64, u: u16) {
            self.waiting_on.insert(Xid::new(xid), uid(u));
        }

        fn has_cycle(&self) -> bool {
            WaitForGraph::new(&self.holders, &self.owner, &self.waiting_on).has_cycle()
        }
    }

    #[test]
    fn test_no_waits() {
        let mut maps = Maps::new();
        maps.hold(1, 1);
        maps.hold(2, 2);
        assert!(!maps.has_cycle());
    }

    #[test]
    fn test_chain_is_not_a_cycle() {
        let mut maps = Maps::new();
        maps.hold(1, 1);
        maps.hold(2, 2);
        maps.hold(3, 3);
        maps.wait(1, 2);
        maps.wait(2, 3);
        assert!(!maps.has_cycle());
    }

    #[test]
    fn test_two_party_cycle() {
        let mut maps = Maps::new();
        maps.hold(1, 1);
        maps.hold(2, 2);
        maps.wait(1, 2);
        maps.wait(2, 1);
        assert!(maps.has_cycle());
    }

    #[test]
    fn test_three_party_cycle() {
        let mut maps = Maps::new();
        maps.hold(1, 1);
        maps.hold(2, 2);
        maps.hold(3, 3);
        maps.wait(1, 2);
        maps.wait(2, 3);
        maps.wait(3, 1);
        assert!(maps.has_cycle());
    }

    #[test]
    fn test_tail_into_finished_walk() {
        // 4 waits on 1's resource; 1 waits on 2's; 2 is free to run.
        let mut maps = Maps::new();
        maps.hold(1, 1);
        maps.hold(2, 2);
        maps.hold(4, 4);
        maps.wait(1, 2);
        maps.wait(4, 1);
        assert!(!maps.has_cycle());
    }

    #[test]
    fn test_waiting_on_unowned_uid() {
        let mut maps = Maps::new();
        maps.hold(1, 1);
        maps.wait(1, 9);
        assert!(!maps.has_cycle());
    }
}
