use std::io::Write;

use jobhub_backend::{create_app, default_collector};
use jobhub_jobs::{job_types, LogMailSender};
use jobhub_queues::{BrokerQueue, MemoryBroker};
use serde_json::json;

#[test]
fn startup_from_config_file_with_env_overrides() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tempfile");
    writeln!(
        file,
        r#"
[logging]
level = "debug"

[job_queue]
class = "memory"
name = "from-file"
immediate = true
"#
    )
    .expect("write config");

    let mut config = jobhub_config::Config::default();
    let raw = jobhub_config::load_raw_from_file(file.path()).expect("parse config");
    jobhub_config::apply_raw(&mut config, raw);
    jobhub_config::apply_env_overrides(
        &mut config,
        [
            ("JOBHUB_JOB_QUEUE_IMMEDIATE".to_string(), "false".to_string()),
            ("JOBHUB_JOB_QUEUE_NAME".to_string(), "from-env".to_string()),
        ],
    )
    .expect("env overrides");
    jobhub_config::validate_config(&config).expect("valid config");

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.job_queue.options.get("immediate"), Some(&json!(false)));

    let collector = default_collector(std::sync::Arc::new(LogMailSender)).expect("collector");
    let app = create_app(config, collector);
    let queue = app.get_job_queue().expect("queue");
    assert_eq!(queue.jobs(), vec![job_types::SEND_EMAIL.to_string()]);

    let memory = queue
        .as_any()
        .downcast_ref::<BrokerQueue<MemoryBroker>>()
        .expect("memory backed queue");
    assert_eq!(memory.name(), "from-env");
    assert!(!memory.immediate());
}

#[test]
fn startup_with_defaults_has_no_queue() {
    let collector = default_collector(std::sync::Arc::new(LogMailSender)).expect("collector");
    let app = create_app(jobhub_config::Config::default(), collector);
    assert!(!app.has_job_queue());
    assert!(app.queue_context().collector().contains(job_types::SEND_EMAIL));
}

fn bootstrap(contents: &str, env: &[(&str, &str)]) -> jobhub_backend::App {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tempfile");
    file.write_all(contents.as_bytes()).expect("write config");

    let mut config = jobhub_config::Config::default();
    let raw = jobhub_config::load_raw_from_file(file.path()).expect("parse config");
    jobhub_config::apply_raw(&mut config, raw);
    jobhub_config::apply_env_overrides(
        &mut config,
        env.iter().map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .expect("env overrides");
    jobhub_config::validate_config(&config).expect("queue settings never fail startup");

    let collector = default_collector(std::sync::Arc::new(LogMailSender)).expect("collector");
    create_app(config, collector)
}

#[test]
fn non_redis_url_degrades_to_no_queue() {
    let app = bootstrap(
        r#"
[job_queue]
class = "redis"
immediate = true
url = "http://localhost:6379"
"#,
        &[],
    );
    assert!(!app.has_job_queue());
    assert!(matches!(
        app.get_job_queue().unwrap_err(),
        jobhub_job_queue::ServerError::JobQueueUnavailable(_)
    ));
}

#[test]
fn malformed_class_degrades_to_no_queue() {
    let app = bootstrap(
        r#"
[job_queue]
class = "edumfa.lib.queues.huey_queue HueyQueue"
"#,
        &[],
    );
    assert!(!app.has_job_queue());
}

#[test]
fn numeric_queue_name_from_env() {
    let app = bootstrap(
        "[job_queue]\nclass = \"memory\"\n",
        &[("JOBHUB_JOB_QUEUE_NAME", "2024")],
    );
    let queue = app.get_job_queue().expect("queue");
    let memory = queue
        .as_any()
        .downcast_ref::<BrokerQueue<MemoryBroker>>()
        .expect("memory backed queue");
    assert_eq!(memory.name(), "2024");
}
