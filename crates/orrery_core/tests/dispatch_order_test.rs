//! Integration tests for declared-order dispatch and mutation mid-dispatch.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use orrery_core::{Controlled, ControlledHandle, Phase, PhaseContext, PhaseDispatcher, PhaseSet, TypeKey};

type Log = Rc<RefCell<Vec<String>>>;

/// Records `<tag><id>` on every update.
macro_rules! recorder {
    ($name:ident, $tag:literal) => {
        struct $name {
            id: u32,
            log: Log,
        }

        impl Controlled for $name {
            fn phases(&self) -> PhaseSet {
                PhaseSet::only(Phase::Update)
            }

            fn update(&mut self, _ctx: &PhaseContext<'_>) {
                self.log.borrow_mut().push(format!("{}{}", $tag, self.id));
            }
        }
    };
}

recorder!(Alpha, "A");
recorder!(Beta, "B");
recorder!(Gamma, "C");
recorder!(Delta, "D");

/// Unregisters itself on its `ttl`-th update.
struct Expiring {
    ttl: u32,
    log: Log,
}

impl Controlled for Expiring {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update)
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        self.log.borrow_mut().push(format!("E{}", self.ttl));
        self.ttl -= 1;
        if self.ttl == 0 {
            assert!(ctx.unregister_self());
        }
    }
}

/// Unregisters a victim, then registers a newcomer, on its first update.
struct Meddler {
    victim: Option<ControlledHandle>,
    newcomer: Option<ControlledHandle>,
}

impl Controlled for Meddler {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update)
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        if let Some(victim) = self.victim.take() {
            ctx.unregister(&victim);
        }
        if let Some(newcomer) = self.newcomer.take() {
            ctx.register(&newcomer);
        }
    }
}

fn declared_abc() -> PhaseDispatcher {
    PhaseDispatcher::new(
        "integration",
        [TypeKey::of::<Alpha>(), TypeKey::of::<Beta>(), TypeKey::of::<Gamma>()],
    )
}

fn tags(log: &Log) -> Vec<char> {
    log.borrow()
        .iter()
        .filter_map(|entry| entry.chars().next())
        .collect()
}

#[test]
fn test_declared_order_then_undeclared() {
    let log = Log::default();
    let dispatcher = declared_abc();

    // Register in scrambled order, several instances per type.
    for id in 0..3 {
        dispatcher.register(&ControlledHandle::new(Delta { id, log: Rc::clone(&log) }));
        dispatcher.register(&ControlledHandle::new(Gamma { id, log: Rc::clone(&log) }));
        dispatcher.register(&ControlledHandle::new(Alpha { id, log: Rc::clone(&log) }));
        dispatcher.register(&ControlledHandle::new(Beta { id, log: Rc::clone(&log) }));
    }

    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 12);
    let order = tags(&log);
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(order, sorted, "types ran out of declared order: {order:?}");
}

#[test]
fn test_self_unregister_skips_and_doubles_nothing() {
    let log = Log::default();
    let dispatcher = PhaseDispatcher::new("integration", [TypeKey::of::<Expiring>()]);
    for ttl in [1, 2, 1, 3, 1] {
        dispatcher.register(&ControlledHandle::new(Expiring { ttl, log: Rc::clone(&log) }));
    }

    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 5);
    assert_eq!(dispatcher.registered_count(Phase::Update), 2);
    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 2);
    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 1);
    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 0);
    assert_eq!(log.borrow().len(), 8);
}

#[test]
fn test_unregister_unvisited_other_skips_it() {
    let log = Log::default();
    let dispatcher = PhaseDispatcher::new(
        "integration",
        [TypeKey::of::<Meddler>(), TypeKey::of::<Gamma>()],
    );
    let victim = ControlledHandle::new(Gamma { id: 9, log: Rc::clone(&log) });
    let survivor = ControlledHandle::new(Gamma { id: 1, log: Rc::clone(&log) });
    dispatcher.register(&victim);
    dispatcher.register(&survivor);
    dispatcher.register(&ControlledHandle::new(Meddler {
        victim: Some(victim.clone()),
        newcomer: None,
    }));

    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 2);
    assert!(!dispatcher.is_registered(&victim));
    assert_eq!(*log.borrow(), vec!["C1".to_owned()]);
}

#[test]
fn test_register_into_later_bucket_runs_this_phase() {
    let log = Log::default();
    let dispatcher = PhaseDispatcher::new(
        "integration",
        [TypeKey::of::<Meddler>(), TypeKey::of::<Alpha>()],
    );
    let newcomer = ControlledHandle::new(Alpha { id: 7, log: Rc::clone(&log) });
    dispatcher.register(&ControlledHandle::new(Meddler {
        victim: None,
        newcomer: Some(newcomer.clone()),
    }));

    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 2);
    assert_eq!(*log.borrow(), vec!["A7".to_owned()]);
    assert!(dispatcher.is_registered(&newcomer));
}

#[test]
fn test_register_into_earlier_bucket_waits_for_next_phase() {
    let log = Log::default();
    let dispatcher = PhaseDispatcher::new(
        "integration",
        [TypeKey::of::<Alpha>(), TypeKey::of::<Meddler>()],
    );
    let newcomer = ControlledHandle::new(Alpha { id: 3, log: Rc::clone(&log) });
    dispatcher.register(&ControlledHandle::new(Meddler {
        victim: None,
        newcomer: Some(newcomer),
    }));

    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 1);
    assert!(log.borrow().is_empty());
    assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 2);
    assert_eq!(*log.borrow(), vec!["A3".to_owned()]);
}
