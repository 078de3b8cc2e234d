use tracing::Level;

use optimist::{Coordinator, CoordinatorConfig, OperationEvent, Record, Snapshot, Store};
use std::sync::{Arc, Mutex};

#[derive(Record, Debug, Clone, PartialEq)]
pub struct Comment {
    #[record(key)]
    pub id: String,
    pub body: String,
    pub reply_count: u32,
    pub edited_at: Option<u64>,
}

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { tracing_subscriber::fmt().with_max_level(Level::DEBUG).with_test_writer().init(); }

#[allow(unused)]
pub fn comment(id: &str, reply_count: u32) -> Comment { Comment { id: id.to_owned(), body: format!("comment {id}"), reply_count, edited_at: None } }

/// `[{c1, 2}, {c2, 0}]`
#[allow(unused)]
pub fn comments() -> Vec<Comment> { vec![comment("c1", 2), comment("c2", 0)] }

#[allow(unused)]
pub fn key(id: &str) -> String { id.to_owned() }

#[allow(unused)]
pub fn increment_replies(comment: &mut Comment) { comment.reply_count += 1; }

#[allow(unused)]
pub fn coordinator(config: CoordinatorConfig) -> Coordinator<Comment> {
    Coordinator::with_config(Store::new(comments()), increment_replies, config).expect("valid config")
}

/// (id, reply_count) pairs in collection order
#[allow(unused)]
pub fn reply_counts(snapshot: &Snapshot<Comment>) -> Vec<(String, u32)> {
    snapshot.iter().map(|c| (c.id.clone(), c.reply_count)).collect()
}

#[allow(unused)]
pub fn counts(pairs: &[(&str, u32)]) -> Vec<(String, u32)> { pairs.iter().map(|(id, count)| (id.to_string(), *count)).collect() }

#[allow(unused)]
pub fn event_watcher(
    coordinator: &Coordinator<Comment>,
) -> (optimist::ListenerGuard<OperationEvent<String>>, Box<dyn Fn() -> Vec<OperationEvent<String>> + Send + Sync>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let guard = {
        let events = events.clone();
        coordinator.listen(move |event: OperationEvent<String>| {
            events.lock().unwrap().push(event);
        })
    };

    let check = Box::new(move || {
        let events: Vec<OperationEvent<String>> = events.lock().unwrap().drain(..).collect();
        events
    });

    (guard, check)
}
