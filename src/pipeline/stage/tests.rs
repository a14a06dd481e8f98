use std::sync::atomic::AtomicUsize;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;

use super::*;
use crate::pipeline::output::DEFAULT_OUTPUT;

const WAIT: Duration = Duration::from_secs(2);

struct Doubler {
    capacity: usize,
}

impl Stage for Doubler {
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![TypeMatcher::of::<u32>()]
    }

    fn queue_capacity(&self) -> usize {
        self.capacity
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        let value = item.downcast_ref::<u32>()?;
        Some(Item::new(value * 2))
    }
}

struct Tagger;

impl Stage for Tagger {
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![TypeMatcher::of::<u32>()]
    }

    fn passive(&self) -> bool {
        true
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        let value = item.downcast_ref::<u32>()?;
        (value % 2 == 0).then(|| Item::new(format!("even {value}")))
    }
}

struct Splitter;

impl Stage for Splitter {
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![TypeMatcher::of::<u32>()]
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        let value = *item.downcast_ref::<u32>()?;
        Some(Item::many((0..value).map(Item::new).collect()))
    }
}

struct Counter {
    ticks: u64,
}

impl Stage for Counter {
    fn accepts(&self) -> Vec<TypeMatcher> {
        Vec::new()
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        Some(item)
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(10))
    }

    fn on_timer(&mut self, outputs: &Outputs) {
        self.ticks += 1;
        outputs.emit(DEFAULT_OUTPUT, Item::new(self.ticks));
    }
}

#[test]
fn lifecycle_runs_created_running_closed() {
    let stage = StageHandle::new("doubler", Doubler { capacity: 4 });
    assert_eq!(stage.state(), StageState::Created);

    stage.start().expect("first start should succeed");
    stage.start().expect("starting a running stage is a no-op");
    assert_eq!(stage.state(), StageState::Running);

    stage.close();
    stage.close();
    assert_eq!(stage.state(), StageState::Closed);
    assert_eq!(
        stage.start(),
        Err(StageError::Closed("doubler".to_string()))
    );
    assert!(!stage.accept(Item::new(1u32)));
}

#[test]
fn accepted_items_are_processed_and_routed() {
    let stage = StageHandle::new("doubler", Doubler { capacity: 4 });
    let (tx, rx) = unbounded();
    stage
        .connect_sender(DEFAULT_OUTPUT, "tap", tx)
        .expect("default output exists");
    stage.start().expect("stage should start");

    for value in 1..=3u32 {
        assert!(stage.accept(Item::new(value)));
    }

    let results: Vec<u32> = (0..3)
        .map(|_| {
            let item = rx.recv_timeout(WAIT).expect("result should arrive");
            *item.downcast_ref::<u32>().expect("result should be u32")
        })
        .collect();
    assert_eq!(results, vec![2, 4, 6]);

    stage.close();
    let stats = stage.stats();
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.delivered, 3);
}

#[test]
fn unaccepted_items_pass_straight_through() {
    let stage = StageHandle::new("doubler", Doubler { capacity: 4 });
    let (tx, rx) = unbounded();
    stage
        .connect_sender(DEFAULT_OUTPUT, "tap", tx)
        .expect("default output exists");

    assert!(stage.accept(Item::new("not a number")));
    let item = rx.try_recv().expect("pass-through should be synchronous");
    assert!(item.is::<&'static str>());
    assert_eq!(stage.stats().accepted, 0);
    stage.close();
}

#[test]
fn passive_stage_forwards_on_accept() {
    let stage = StageHandle::new("tagger", Tagger);
    let (tx, rx) = unbounded();
    stage
        .connect_sender(DEFAULT_OUTPUT, "tap", tx)
        .expect("default output exists");

    assert!(stage.accept(Item::new(1u32)));
    assert!(stage.accept(Item::new(2u32)));
    let forwarded: Vec<u32> = rx
        .try_iter()
        .filter_map(|item| item.downcast_ref::<u32>().copied())
        .collect();
    assert_eq!(forwarded, vec![1, 2]);

    stage.start().expect("stage should start");
    let tag = rx.recv_timeout(WAIT).expect("tag should arrive");
    assert_eq!(tag.downcast_ref::<String>().map(String::as_str), Some("even 2"));
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    stage.close();
    assert_eq!(stage.stats().accepted, 2);
    assert_eq!(stage.stats().processed, 2);
}

#[test]
fn returned_bundles_are_flattened() {
    let stage = StageHandle::new("splitter", Splitter);
    let (tx, rx) = unbounded();
    stage
        .connect_sender(DEFAULT_OUTPUT, "tap", tx)
        .expect("default output exists");
    stage.start().expect("stage should start");

    assert!(stage.accept(Item::new(3u32)));
    let values: Vec<u32> = (0..3)
        .map(|_| {
            let item = rx.recv_timeout(WAIT).expect("element should arrive");
            *item.downcast_ref::<u32>().expect("elements are u32")
        })
        .collect();
    assert_eq!(values, vec![0, 1, 2]);

    stage.close();
    assert_eq!(stage.stats().delivered, 3);
}

#[test]
fn full_queue_blocks_the_producer() {
    let stage = StageHandle::new("doubler", Doubler { capacity: 2 });
    let (tx, rx) = unbounded();
    stage
        .connect_sender(DEFAULT_OUTPUT, "tap", tx)
        .expect("default output exists");

    let sent = Arc::new(AtomicUsize::new(0));
    let producer = {
        let stage = stage.clone();
        let sent = Arc::clone(&sent);
        thread::spawn(move || {
            for value in 0..3u32 {
                stage.accept(Item::new(value));
                sent.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let deadline = Instant::now() + WAIT;
    while sent.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sent.load(Ordering::SeqCst), 2);

    stage.start().expect("stage should start");
    producer.join().expect("producer should finish once the queue drains");
    assert_eq!(sent.load(Ordering::SeqCst), 3);

    for _ in 0..3 {
        rx.recv_timeout(WAIT).expect("every item should come out");
    }
    stage.close();
}

#[test]
fn close_abandons_backlog_and_disconnects() {
    let stage = StageHandle::new("doubler", Doubler { capacity: 8 });
    let (tx, rx) = unbounded();
    stage
        .connect_sender(DEFAULT_OUTPUT, "tap", tx)
        .expect("default output exists");

    for value in 0..5u32 {
        stage.accept(Item::new(value));
    }
    stage.close();

    assert!(rx.recv_timeout(WAIT).is_err());
    assert_eq!(stage.stats().processed, 0);
}

#[test]
fn timer_stage_emits_until_closed() {
    let stage = StageHandle::new("counter", Counter { ticks: 0 });
    let (tx, rx) = unbounded();
    stage
        .connect_sender(DEFAULT_OUTPUT, "tap", tx)
        .expect("default output exists");
    stage.start().expect("stage should start");

    let first = rx.recv_timeout(WAIT).expect("first tick");
    let second = rx.recv_timeout(WAIT).expect("second tick");
    assert_eq!(first.downcast_ref::<u64>(), Some(&1));
    assert_eq!(second.downcast_ref::<u64>(), Some(&2));

    let started = Instant::now();
    stage.close();
    assert!(started.elapsed() < Duration::from_secs(1));
    while rx.try_recv().is_ok() {}
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn zero_capacity_is_rejected() {
    let options = StageOptions {
        queue_capacity: Some(0),
    };
    assert!(matches!(
        StageHandle::with_options("doubler", Doubler { capacity: 1 }, &options),
        Err(ConfigError::NotPositive {
            field: "queue_capacity",
            ..
        })
    ));
}
