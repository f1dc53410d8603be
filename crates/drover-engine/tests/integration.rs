//! End-to-end tests for the engine: full group runs over real shell
//! commands in scratch workdirs, with a mock script host for
//! script-valued commands, hooks, and predicates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use drover_engine::{
  Engine, EngineError, NoopNotifier, ProgressNotifier, RunEvent, RunOptions, TaskError,
};
use drover_host::{
  AgentTransport, CallContext, CallOutcome, HostError, NullScriptHost, RemoteExit, ScriptHost,
};
use drover_planner::PlanError;
use drover_task::{Command, Predicate, ScriptRef, Session, Task, TaskGroup, TaskStatus};

type MockFn = Arc<
  dyn Fn(&HashMap<String, String>, &serde_json::Value) -> Result<CallOutcome, HostError>
    + Send
    + Sync,
>;

/// Script host backed by registered Rust closures.
#[derive(Default)]
struct MockHost {
  funcs: Mutex<HashMap<u64, MockFn>>,
  next_id: AtomicU64,
}

impl MockHost {
  fn register<F>(&self, f: F) -> ScriptRef
  where
    F: Fn(&HashMap<String, String>, &serde_json::Value) -> Result<CallOutcome, HostError>
      + Send
      + Sync
      + 'static,
  {
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    self.funcs.lock().unwrap().insert(id, Arc::new(f));
    ScriptRef::new(id)
  }
}

#[async_trait]
impl ScriptHost for MockHost {
  async fn call(
    &self,
    func: ScriptRef,
    params: &HashMap<String, String>,
    input: &serde_json::Value,
    _ctx: &CallContext,
  ) -> Result<CallOutcome, HostError> {
    let f = self
      .funcs
      .lock()
      .unwrap()
      .get(&func.id())
      .cloned()
      .ok_or_else(|| HostError::script("unknown function handle"))?;
    f(params, input)
  }
}

/// Notifier collecting every event for later assertions.
#[derive(Default, Clone)]
struct RecordingNotifier {
  events: Arc<Mutex<Vec<RunEvent>>>,
}

impl RecordingNotifier {
  fn events(&self) -> Vec<RunEvent> {
    self.events.lock().unwrap().clone()
  }

  fn attempts_for(&self, task: &str) -> u32 {
    self
      .events()
      .into_iter()
      .filter(
        |e| matches!(e, RunEvent::TaskAttemptStarted { task_id, .. } if task_id.as_str() == task),
      )
      .count() as u32
  }
}

impl ProgressNotifier for RecordingNotifier {
  fn notify(&self, event: RunEvent) {
    self.events.lock().unwrap().push(event);
  }
}

fn shell_task(name: &str, command: &str) -> Task {
  Task::new(name, Command::Shell(command.to_string()))
}

fn engine() -> Engine<NoopNotifier> {
  Engine::new(Arc::new(NullScriptHost))
}

fn recording_engine() -> (Engine<RecordingNotifier>, RecordingNotifier) {
  let notifier = RecordingNotifier::default();
  let engine = Engine::with_notifier(Arc::new(NullScriptHost), notifier.clone());
  (engine, notifier)
}

async fn run(group: &TaskGroup) -> drover_engine::GroupRunResult {
  engine()
    .run(group, RunOptions::default(), CancellationToken::new())
    .await
    .expect("run should not hit a configuration error")
}

fn staging_path(group: &str, run_id: &str) -> std::path::PathBuf {
  std::env::temp_dir().join(format!("drover-{group}-staging-{run_id}"))
}

#[tokio::test]
async fn linear_chain_succeeds_in_order() {
  let mut b = shell_task("b", "exit 0");
  b.depends_on = vec!["a".to_string()];
  let mut c = shell_task("c", "exit 0");
  c.depends_on = vec!["b".to_string()];
  let group = TaskGroup::new("linear", vec![shell_task("a", "exit 0"), b, c]);

  let result = run(&group).await;

  assert!(result.success);
  let order: Vec<(&str, TaskStatus)> = result
    .results
    .iter()
    .map(|r| (r.name.as_str(), r.status))
    .collect();
  assert_eq!(
    order,
    vec![
      ("a", TaskStatus::Success),
      ("b", TaskStatus::Success),
      ("c", TaskStatus::Success),
    ]
  );
}

#[tokio::test]
async fn mid_graph_failure_skips_dependents() {
  let mut b = shell_task("b", "exit 1");
  b.depends_on = vec!["a".to_string()];
  let mut c = shell_task("c", "exit 0");
  c.depends_on = vec!["b".to_string()];
  let group = TaskGroup::new("midfail", vec![shell_task("a", "exit 0"), b, c]);

  let result = run(&group).await;

  assert!(!result.success);
  assert_eq!(result.task("a").unwrap().status, TaskStatus::Success);
  assert_eq!(result.task("b").unwrap().status, TaskStatus::Failed);

  let c = result.task("c").unwrap();
  assert_eq!(c.status, TaskStatus::Skipped);
  let reason = c.error.as_ref().unwrap().to_string();
  assert!(reason.contains("dependency 'b' failed"), "got: {reason}");
}

#[tokio::test]
async fn retry_succeeds_on_second_attempt() {
  // Fails once, then finds the marker it dropped and succeeds.
  let mut t = shell_task(
    "flaky",
    "if [ -f marker ]; then exit 0; else touch marker; exit 1; fi",
  );
  t.retries = 2;
  let group = TaskGroup::new("retry", vec![t]);

  let (engine, notifier) = recording_engine();
  let result = engine
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();

  assert!(result.success);
  assert_eq!(result.task("flaky").unwrap().status, TaskStatus::Success);
  assert_eq!(notifier.attempts_for("flaky"), 2);
}

#[tokio::test]
async fn timeout_bounds_the_attempt() {
  let mut t = shell_task("slow", "sleep 5");
  t.timeout = Some(Duration::from_millis(100));
  let group = TaskGroup::new("timeout", vec![t]);

  let result = run(&group).await;

  let slow = result.task("slow").unwrap();
  assert_eq!(slow.status, TaskStatus::Failed);
  assert!(matches!(
    slow.error,
    Some(TaskError::Timeout { .. })
  ));
  assert!(slow.duration <= Duration::from_millis(500), "took {:?}", slow.duration);
}

#[tokio::test]
async fn artifacts_flow_from_producer_to_consumer() {
  let mut build = shell_task("build", "echo hello > out.txt");
  build.artifacts = vec!["out.txt".to_string()];
  let mut consume = shell_task("use", "test \"$(cat out.txt)\" = hello");
  consume.depends_on = vec!["build".to_string()];
  consume.consumes = vec!["out.txt".to_string()];
  let group = TaskGroup::new("artifacts", vec![build, consume]);

  let result = run(&group).await;

  assert!(result.success);
  assert_eq!(result.task("build").unwrap().status, TaskStatus::Success);
  assert_eq!(result.task("use").unwrap().status, TaskStatus::Success);
  assert!(!staging_path("artifacts", &result.run_id).exists());
}

#[tokio::test]
async fn missing_consumed_artifact_fails_before_the_command() {
  let temp = tempfile::tempdir().unwrap();
  let canary = temp.path().join("ran");
  let mut t = shell_task("consumer", &format!("touch {}", canary.display()));
  t.consumes = vec!["never-produced.bin".to_string()];
  let group = TaskGroup::new("missing-artifact", vec![t]);

  let result = run(&group).await;

  let consumer = result.task("consumer").unwrap();
  assert_eq!(consumer.status, TaskStatus::Failed);
  assert!(matches!(consumer.error, Some(TaskError::Artifact { .. })));
  assert!(!canary.exists(), "command must not run without its inputs");
}

#[tokio::test]
async fn abort_condition_stops_the_group() {
  let flag = tempfile::NamedTempFile::new().unwrap();

  let scan = shell_task("scan", "exit 0");
  let mut deploy = shell_task("deploy", "exit 0");
  deploy.depends_on = vec!["scan".to_string()];
  deploy.abort_if = Some(Predicate::Shell(format!("test -f {}", flag.path().display())));
  let group = TaskGroup::new("abort", vec![scan, deploy]);

  let result = run(&group).await;

  assert!(!result.success, "aborted runs report overall failure");
  assert_eq!(result.task("scan").unwrap().status, TaskStatus::Success);
  let deploy = result.task("deploy").unwrap();
  assert_eq!(deploy.status, TaskStatus::Skipped);
  assert_eq!(deploy.error, Some(TaskError::Aborted));
}

#[tokio::test]
async fn cycle_is_a_configuration_error_and_nothing_runs() {
  let temp = tempfile::tempdir().unwrap();
  let workdir = temp.path().join("never-created");

  let mut a = shell_task("a", "exit 0");
  a.depends_on = vec!["b".to_string()];
  let mut b = shell_task("b", "exit 0");
  b.depends_on = vec!["a".to_string()];
  let mut group = TaskGroup::new("cyclic", vec![a, b]);
  group.workdir = Some(workdir.clone());

  let err = engine()
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap_err();

  match err {
    EngineError::Plan(PlanError::CircularDependency { name, .. }) => {
      assert!(name == "a" || name == "b");
    }
    other => panic!("expected a cycle error, got {other:?}"),
  }
  assert!(!workdir.exists(), "workdir must not be created for a rejected group");
}

#[tokio::test]
async fn run_if_false_skips_without_running() {
  let mut t = shell_task("gated", "exit 0");
  t.run_if = Some(Predicate::Shell("exit 1".to_string()));
  let group = TaskGroup::new("runif", vec![t]);

  let result = run(&group).await;

  assert!(result.success);
  let gated = result.task("gated").unwrap();
  assert_eq!(gated.status, TaskStatus::Skipped);
  assert_eq!(gated.error, Some(TaskError::ConditionNotMet));
}

#[tokio::test]
async fn fallback_runs_only_when_every_listed_task_failed() {
  let mut rollback = shell_task("rollback", "exit 0");
  rollback.next_if_fail = vec!["apply".to_string()];
  let group = TaskGroup::new(
    "fallback",
    vec![shell_task("apply", "exit 1"), rollback.clone()],
  );

  let result = run(&group).await;
  assert_eq!(result.task("apply").unwrap().status, TaskStatus::Failed);
  assert_eq!(result.task("rollback").unwrap().status, TaskStatus::Success);

  // With a successful apply, the fallback is skipped.
  let group = TaskGroup::new(
    "fallback-ok",
    vec![shell_task("apply", "exit 0"), rollback],
  );
  let result = run(&group).await;
  assert_eq!(result.task("apply").unwrap().status, TaskStatus::Success);
  let rollback = result.task("rollback").unwrap();
  assert_eq!(rollback.status, TaskStatus::Skipped);
  assert_eq!(rollback.error, Some(TaskError::FallbackNotMet));
}

#[tokio::test]
async fn unknown_target_is_a_configuration_error() {
  let group = TaskGroup::new("targets", vec![shell_task("a", "exit 0")]);

  let err = engine()
    .run(
      &group,
      RunOptions {
        targets: vec!["ghost".to_string()],
        dry_run: false,
      },
      CancellationToken::new(),
    )
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    EngineError::Plan(PlanError::UnknownTask { name, .. }) if name == "ghost"
  ));
}

#[tokio::test]
async fn targets_run_only_the_dependency_closure() {
  let mut b = shell_task("b", "exit 0");
  b.depends_on = vec!["a".to_string()];
  let group = TaskGroup::new(
    "closure",
    vec![shell_task("a", "exit 0"), b, shell_task("orphan", "exit 1")],
  );

  let result = engine()
    .run(
      &group,
      RunOptions {
        targets: vec!["b".to_string()],
        dry_run: false,
      },
      CancellationToken::new(),
    )
    .await
    .unwrap();

  assert!(result.success, "the failing orphan task must not be selected");
  assert_eq!(result.results.len(), 2);
  assert!(result.task("orphan").is_none());
}

#[tokio::test]
async fn dry_run_skips_every_task() {
  let mut b = shell_task("b", "exit 1");
  b.depends_on = vec!["a".to_string()];
  let group = TaskGroup::new("dry", vec![shell_task("a", "exit 0"), b]);

  let result = engine()
    .run(
      &group,
      RunOptions {
        targets: vec![],
        dry_run: true,
      },
      CancellationToken::new(),
    )
    .await
    .unwrap();

  assert!(result.success);
  for r in &result.results {
    assert_eq!(r.status, TaskStatus::Skipped);
    assert_eq!(r.error, Some(TaskError::DryRun));
  }
}

#[tokio::test]
async fn script_command_output_reaches_dependents() {
  let host = Arc::new(MockHost::default());

  let produce = host.register(|_params, _input| {
    Ok(CallOutcome::success(json!({"version": 42})))
  });
  let check = host.register(|_params, input| {
    if input["producer"]["version"] == json!(42) {
      Ok(CallOutcome::success(json!({})))
    } else {
      Ok(CallOutcome::failure("missing dependency output"))
    }
  });

  let producer = Task::new("producer", Command::Script(produce));
  let mut consumer = Task::new("consumer", Command::Script(check));
  consumer.depends_on = vec!["producer".to_string()];
  let group = TaskGroup::new("script", vec![producer, consumer]);

  let result = Engine::new(host)
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();

  assert!(result.success);
  assert_eq!(
    result.task("producer").unwrap().output,
    json!({"version": 42})
  );
}

#[tokio::test]
async fn pre_exec_failure_fails_the_attempt_and_is_retried() {
  let host = Arc::new(MockHost::default());
  let hook = host.register(|_params, _input| Ok(CallOutcome::failure("environment not ready")));

  let mut t = shell_task("guarded", "exit 0");
  t.pre_exec = Some(hook);
  t.retries = 1;
  let group = TaskGroup::new("preexec", vec![t]);

  let notifier = RecordingNotifier::default();
  let result = Engine::with_notifier(host, notifier.clone())
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();

  let guarded = result.task("guarded").unwrap();
  assert_eq!(guarded.status, TaskStatus::Failed);
  assert!(matches!(guarded.error, Some(TaskError::PreExec { .. })));
  assert_eq!(notifier.attempts_for("guarded"), 2);
}

#[tokio::test]
async fn post_exec_sees_the_command_output() {
  let host = Arc::new(MockHost::default());
  let seen: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));

  let produce = host.register(|_params, _input| Ok(CallOutcome::success(json!({"rows": 7}))));
  let seen_in_hook = seen.clone();
  let hook = host.register(move |params, input| {
    assert_eq!(params.get("task_name").map(String::as_str), Some("emit"));
    *seen_in_hook.lock().unwrap() = Some(input.clone());
    Ok(CallOutcome::success(json!({})))
  });

  let mut t = Task::new("emit", Command::Script(produce));
  t.post_exec = Some(hook);
  let group = TaskGroup::new("postexec", vec![t]);

  let result = Engine::new(host)
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();

  assert!(result.success);
  assert_eq!(*seen.lock().unwrap(), Some(json!({"rows": 7})));
}

#[tokio::test]
async fn clean_hook_controls_workdir_teardown() {
  let host = Arc::new(MockHost::default());
  let keep = host.register(|_params, input| {
    assert_eq!(input["success"], json!(true));
    // Returning false keeps the workdir in place.
    Ok(CallOutcome::failure("keep it"))
  });

  let temp = tempfile::tempdir().unwrap();
  let workdir = temp.path().join("kept");
  let mut group = TaskGroup::new("keepdir", vec![shell_task("touchfile", "touch artifact.txt")]);
  group.workdir = Some(workdir.clone());
  group.clean_workdir_after_run = Some(keep);

  let result = Engine::new(host)
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();

  assert!(result.success);
  assert!(workdir.join("artifact.txt").exists());
  assert!(!staging_path("keepdir", &result.run_id).exists());
}

#[tokio::test]
async fn script_predicate_sees_dependency_outputs() {
  let host = Arc::new(MockHost::default());
  let produce = host.register(|_params, _input| {
    Ok(CallOutcome::success(json!({"changed": false})))
  });
  let gate = host.register(|_params, input| {
    let changed = input["producer"]["changed"].as_bool().unwrap_or(true);
    Ok(if changed {
      CallOutcome::success(json!({}))
    } else {
      CallOutcome::failure("nothing to do")
    })
  });

  let producer = Task::new("producer", Command::Script(produce));
  let mut apply = shell_task("apply", "exit 0");
  apply.depends_on = vec!["producer".to_string()];
  apply.run_if = Some(Predicate::Script(gate));
  let group = TaskGroup::new("pred", vec![producer, apply]);

  let result = Engine::new(host)
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();

  assert!(result.success);
  assert_eq!(result.task("apply").unwrap().status, TaskStatus::Skipped);
}

#[tokio::test]
async fn async_tasks_overlap_but_results_stay_ordered() {
  let mut one = shell_task("p1", "sleep 0.3");
  one.run_async = true;
  let mut two = shell_task("p2", "sleep 0.3");
  two.run_async = true;
  let mut after = shell_task("zfinal", "exit 0");
  after.depends_on = vec!["p1".to_string(), "p2".to_string()];
  let group = TaskGroup::new("overlap", vec![one, two, after]);

  let start = std::time::Instant::now();
  let result = run(&group).await;
  let elapsed = start.elapsed();

  assert!(result.success);
  let names: Vec<&str> = result.results.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, vec!["p1", "p2", "zfinal"]);
  assert!(
    elapsed < Duration::from_millis(550),
    "async siblings should overlap, took {elapsed:?}"
  );
}

struct MockTransport;

#[async_trait]
impl AgentTransport for MockTransport {
  async fn execute(
    &self,
    agent: &str,
    command: &str,
    _ctx: &CallContext,
  ) -> Result<RemoteExit, HostError> {
    assert_eq!(agent, "builder-1");
    Ok(RemoteExit {
      stdout: format!("ran: {command}"),
      stderr: String::new(),
      exit_code: 0,
    })
  }
}

#[tokio::test]
async fn agent_task_wraps_the_remote_exit_as_output() {
  let mut t = shell_task("remote", "make release");
  t.agent = Some("builder-1".to_string());
  let group = TaskGroup::new("agents", vec![t]);

  let result = Engine::new(Arc::new(NullScriptHost))
    .with_transport(Arc::new(MockTransport))
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();

  assert!(result.success);
  let remote = result.task("remote").unwrap();
  assert_eq!(remote.output["exit_code"], json!(0));
  assert_eq!(remote.output["stdout"], json!("ran: make release"));
}

#[tokio::test]
async fn agent_task_without_transport_is_rejected_in_preflight() {
  let mut t = shell_task("remote", "make release");
  t.agent = Some("builder-1".to_string());
  let group = TaskGroup::new("agents", vec![t]);

  let err = engine()
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::NoTransport { .. }));
}

#[tokio::test]
async fn cancellation_skips_pending_tasks() {
  let mut slow = shell_task("slow", "sleep 5");
  slow.retries = 3;
  let mut after = shell_task("after", "exit 0");
  after.depends_on = vec!["slow".to_string()];
  let group = TaskGroup::new("cancel", vec![slow, after]);

  let cancel = CancellationToken::new();
  let canceller = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(150)).await;
    canceller.cancel();
  });

  let start = std::time::Instant::now();
  let result = engine().run(&group, RunOptions::default(), cancel).await.unwrap();

  assert!(start.elapsed() < Duration::from_secs(2), "cancellation must not wait for retries");
  let slow = result.task("slow").unwrap();
  assert_eq!(slow.status, TaskStatus::Failed);
  assert_eq!(slow.error, Some(TaskError::Cancelled));
  assert_eq!(result.task("after").unwrap().status, TaskStatus::Skipped);
}

#[tokio::test]
async fn fan_out_runs_subtasks_concurrently_with_shared_input() {
  let host = Arc::new(MockHost::default());
  let engine = Engine::new(host.clone());

  let double = host.register(|_params, input| {
    let n = input["n"].as_i64().unwrap();
    Ok(CallOutcome::success(json!({"doubled": n * 2})))
  });

  let temp = tempfile::tempdir().unwrap();
  let ctx = CallContext {
    run_id: "run-1".to_string(),
    group: "fanout".to_string(),
    task_id: "host-task".to_string(),
    session: Session::new(temp.path()),
    deadline: None,
    cancel: CancellationToken::new(),
  };

  let tasks = vec![
    Task::new("first", Command::Script(double)),
    shell_task("second", "exit 0"),
    shell_task("third", "exit 1"),
  ];

  let results = engine.run_parallel(tasks, json!({"n": 21}), &ctx).await;

  let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, vec!["first", "second", "third"]);
  assert_eq!(results[0].status, TaskStatus::Success);
  assert_eq!(results[0].output, json!({"doubled": 42}));
  assert_eq!(results[1].status, TaskStatus::Success);
  assert_eq!(results[2].status, TaskStatus::Failed);
}

#[tokio::test]
async fn events_cover_the_whole_run() {
  let mut build = shell_task("build", "echo data > out.bin");
  build.artifacts = vec!["out.bin".to_string()];
  let mut pack = shell_task("pack", "test -f out.bin");
  pack.depends_on = vec!["build".to_string()];
  pack.consumes = vec!["out.bin".to_string()];
  let group = TaskGroup::new("events", vec![build, pack]);

  let (engine, notifier) = recording_engine();
  let result = engine
    .run(&group, RunOptions::default(), CancellationToken::new())
    .await
    .unwrap();
  assert!(result.success);

  let events = notifier.events();
  assert!(matches!(events.first(), Some(RunEvent::GroupStarted { .. })));
  assert!(matches!(
    events.last(),
    Some(RunEvent::GroupFinished { success: true, .. })
  ));
  assert!(events.iter().any(|e| matches!(
    e,
    RunEvent::ArtifactProduced { task_id, file, .. } if task_id == "build" && file == "out.bin"
  )));
  assert!(events.iter().any(|e| matches!(
    e,
    RunEvent::ArtifactConsumed { task_id, file, .. } if task_id == "pack" && file == "out.bin"
  )));
  // Every event of this run carries the same run id.
  for event in &events {
    let run_id = match event {
      RunEvent::GroupStarted { run_id, .. }
      | RunEvent::TaskAttemptStarted { run_id, .. }
      | RunEvent::TaskFinished { run_id, .. }
      | RunEvent::ArtifactProduced { run_id, .. }
      | RunEvent::ArtifactConsumed { run_id, .. }
      | RunEvent::GroupFinished { run_id, .. } => run_id,
    };
    assert_eq!(run_id, &result.run_id);
  }
}

#[tokio::test]
async fn no_task_appears_twice_in_the_result_list() {
  let mut flaky = shell_task(
    "flaky",
    "if [ -f marker ]; then exit 0; else touch marker; exit 1; fi",
  );
  flaky.retries = 1;
  let mut tail = shell_task("tail", "exit 0");
  tail.depends_on = vec!["flaky".to_string()];
  let group = TaskGroup::new("unique", vec![flaky, tail]);

  let result = run(&group).await;

  let mut names: Vec<&str> = result.results.iter().map(|r| r.name.as_str()).collect();
  names.sort_unstable();
  names.dedup();
  assert_eq!(names.len(), result.results.len());
}
