use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use jobhub_backend::{create_app, App};
use jobhub_config::Config;
use jobhub_job_queue::{job_fn, JobCollector, JobKwargs, QueueConfig, QueueError, ServerError};
use jobhub_jobs::{EmailMessage, MailError, MailSender};
use jobhub_queues::{BrokerQueue, Consumer, MemoryBroker, RedisBroker, task_source};
use serde_json::{json, Value};

#[derive(Debug, Default)]
struct RecordingSender {
    bodies: Mutex<Vec<String>>,
}

impl RecordingSender {
    fn calls(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

impl MailSender for RecordingSender {
    fn send_email(&self, message: &EmailMessage) -> Result<bool, MailError> {
        self.bodies.lock().unwrap().push(message.body.clone());
        Ok(true)
    }
}

struct Fixture {
    total: Arc<AtomicI64>,
    sender: Arc<RecordingSender>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            total: Arc::new(AtomicI64::new(0)),
            sender: Arc::new(RecordingSender::default()),
        }
    }

    fn collector(&self) -> JobCollector {
        let mut collector = JobCollector::new();

        let total = Arc::clone(&self.total);
        collector
            .job("test.my_add")
            .register(move |call| {
                let sum = call.arg::<i64>(0)? + call.arg::<i64>(1)?;
                total.fetch_add(sum, Ordering::SeqCst);
                Ok(json!(sum))
            })
            .expect("register my_add");

        let sender = Arc::clone(&self.sender);
        collector
            .job("test.my_send_mail")
            .register(move |call| {
                let body: String = call.arg(0)?;
                let message = EmailMessage {
                    identifier: "test".into(),
                    recipient: vec!["test@example.com".into()],
                    subject: "test".into(),
                    body,
                    sender: None,
                    reply_to: None,
                    mimetype: "plain".into(),
                };
                sender
                    .send_email(&message)
                    .map_err(|e| jobhub_job_queue::JobError::Failed(e.to_string()))?;
                Ok(json!(1337))
            })
            .expect("register my_send_mail");

        collector
    }

    fn app(&self, class: &str, options: Value) -> App {
        let mut config = Config::default();
        config.job_queue.class = class.to_string();
        if let Value::Object(map) = options {
            config.job_queue.options = map.into_iter().collect();
        }
        create_app(config, self.collector())
    }
}

fn no_kwargs() -> JobKwargs {
    JobKwargs::new()
}

#[test]
fn app_without_backend_has_no_queue() {
    let fixture = Fixture::new();
    let app = fixture.app("", json!({}));

    assert!(!app.has_job_queue());
    assert_eq!(app.get_job_queue().unwrap_err(), ServerError::NoJobQueue);
    let err = app
        .enqueue("test.my_add", vec![json!(1), json!(2)], no_kwargs())
        .unwrap_err();
    assert!(err.downcast_ref::<ServerError>().is_some());
}

#[test]
fn invalid_backend_degrades_gracefully() {
    let fixture = Fixture::new();
    let app = fixture.app("obviously.invalid", json!({}));

    assert!(!app.has_job_queue());
    match app.get_job_queue().unwrap_err() {
        ServerError::JobQueueUnavailable(reason) => assert!(reason.contains("obviously.invalid")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn redis_queue_in_immediate_mode() {
    let fixture = Fixture::new();
    let app = fixture.app("redis", json!({"name": "myqueuename", "immediate": true}));

    assert!(app.has_job_queue());
    let queue = app.get_job_queue().expect("queue");

    let expected: jobhub_job_queue::QueueOptions = [
        ("immediate".to_string(), json!(true)),
        ("name".to_string(), json!("myqueuename")),
    ]
    .into_iter()
    .collect();
    assert_eq!(queue.options(), &expected);

    let jobs = queue.jobs();
    assert!(jobs.contains(&"test.my_add".to_string()));
    assert!(jobs.contains(&"test.my_send_mail".to_string()));

    let redis = queue
        .as_any()
        .downcast_ref::<BrokerQueue<RedisBroker>>()
        .expect("redis backed queue");
    assert_eq!(redis.name(), "myqueuename");
    assert!(!redis.store_results());

    // re-registering an existing job fails and leaves the original in place
    let err = queue
        .register_job("test.my_add", job_fn(|_| Ok(Value::Null)))
        .unwrap_err();
    assert!(matches!(err, QueueError::JobExists(_)));

    queue
        .enqueue("test.my_add", vec![json!(3), json!(4)], no_kwargs())
        .expect("enqueue my_add");
    assert_eq!(fixture.total.load(Ordering::SeqCst), 7);

    let err = queue
        .enqueue("test.unknown", vec![json!("hi")], no_kwargs())
        .unwrap_err();
    assert!(matches!(err, QueueError::UnknownJob(ref name) if name == "test.unknown"));

    queue
        .enqueue("test.my_send_mail", vec![json!("hi")], no_kwargs())
        .expect("enqueue my_send_mail");
    assert_eq!(fixture.sender.calls(), vec!["hi".to_string()]);
}

#[test]
fn wrapped_job_runs_synchronously() {
    let fixture = Fixture::new();
    let app = fixture.app("redis", json!({"name": "myqueuename", "immediate": true}));

    let wrapped = app.wrap_job("test.my_send_mail", true).expect("wrap");
    let result = wrapped.call(vec![json!("hi")], no_kwargs()).expect("call");
    assert_eq!(result, Some(json!(1337)));
    assert_eq!(fixture.sender.calls(), vec!["hi".to_string()]);

    let context = app.queue_context();
    let direct = context
        .collector()
        .get("test.my_send_mail")
        .expect("registered")
        .invoke(vec![json!("hi")], no_kwargs())
        .expect("direct call");
    assert_eq!(direct, json!(1337));
    assert_eq!(fixture.sender.calls().len(), 2);

    assert!(matches!(
        app.wrap_job("test.unknown", true).unwrap_err(),
        QueueError::UnknownJob(_)
    ));
}

#[test]
fn wrapped_job_enqueues_when_deferred() {
    let fixture = Fixture::new();
    let app = fixture.app("memory", json!({"name": "deferred"}));

    let wrapped = app
        .wrap_job("test.my_add", false)
        .expect("wrap")
        .returning(json!(true));
    let result = wrapped.call(vec![json!(20), json!(22)], no_kwargs()).expect("call");
    assert_eq!(result, Some(json!(true)));
    assert_eq!(fixture.total.load(Ordering::SeqCst), 0);

    let queue = app.get_job_queue().expect("queue");
    let source = task_source(queue.as_ref()).expect("consumable");
    assert_eq!(Consumer::new(source).drain(), 1);
    assert_eq!(fixture.total.load(Ordering::SeqCst), 42);
}

#[test]
fn memory_queue_publishes_one_message_per_enqueue() {
    let fixture = Fixture::new();
    let app = fixture.app("memory", json!({"name": "deferred"}));

    app.enqueue("test.my_add", vec![json!(1), json!(2)], no_kwargs())
        .expect("enqueue");

    let queue = app.get_job_queue().expect("queue");
    let memory = queue
        .as_any()
        .downcast_ref::<BrokerQueue<MemoryBroker>>()
        .expect("memory backed queue");
    let published = memory.broker().peek_all();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].name, "test.my_add");
    assert_eq!(published[0].args, vec![json!(1), json!(2)]);
    assert_eq!(fixture.total.load(Ordering::SeqCst), 0);

    assert_eq!(Consumer::new(memory).drain(), 1);
    assert_eq!(fixture.total.load(Ordering::SeqCst), 3);
}

#[test]
fn swapping_config_rebuilds_queue() {
    let fixture = Fixture::new();
    let app = fixture.app("", json!({}));
    assert!(!app.has_job_queue());

    let mut options = jobhub_job_queue::QueueOptions::new();
    options.insert("immediate".into(), json!(true));
    app.swap_queue_config(QueueConfig::new("memory", options));

    assert!(app.has_job_queue());
    app.enqueue("test.my_add", vec![json!(2), json!(2)], no_kwargs())
        .expect("enqueue");
    assert_eq!(fixture.total.load(Ordering::SeqCst), 4);
}
