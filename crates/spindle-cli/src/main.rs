//! spindle - runs one in-process worker and drives it as a coordinator would.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spindle_core::domain::{
    KillBehavior, KillHandler, KillMessage, MessageValue, TaskFunction, TaskFunctionOperation,
    TaskFunctionProperties, WorkerOptions, WorkerStatistics,
};
use spindle_core::typed::{Handler, TypedTask};
use spindle_core::{LocalWorker, TaskFunctionCatalog, WorkerBuilder};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker options as a JSON record, e.g. '{"killBehavior":"HARD"}'
    #[arg(long, env = "SPINDLE_OPTIONS")]
    options: Option<String>,

    /// Severity of idle kill-requests (SOFT or HARD)
    #[arg(long, env = "SPINDLE_KILL_BEHAVIOR", value_enum, ignore_case = true)]
    kill_behavior: Option<KillBehaviorArg>,

    /// Inactivity window in milliseconds
    #[arg(long, env = "SPINDLE_MAX_INACTIVE_TIME")]
    max_inactive_time: Option<u64>,

    /// Number of `double` tasks to submit
    #[arg(short = 'n', long, default_value_t = 3)]
    tasks: u64,

    /// Enable idle checking and wait for the worker's kill-request before killing it
    #[arg(long)]
    wait_idle: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KillBehaviorArg {
    Soft,
    Hard,
}

impl From<KillBehaviorArg> for KillBehavior {
    fn from(arg: KillBehaviorArg) -> Self {
        match arg {
            KillBehaviorArg::Soft => KillBehavior::Soft,
            KillBehaviorArg::Hard => KillBehavior::Hard,
        }
    }
}

impl Args {
    /// Options record with the flag overrides applied, validated by the worker.
    fn worker_options(&self) -> Result<WorkerOptions> {
        let mut record: Value = match &self.options {
            Some(raw) => serde_json::from_str(raw).context("parsing --options")?,
            None => json!({}),
        };
        if let Some(fields) = record.as_object_mut() {
            if let Some(kill_behavior) = self.kill_behavior {
                fields.insert("killBehavior".into(), json!(KillBehavior::from(kill_behavior)));
            }
            if let Some(max_inactive_time) = self.max_inactive_time {
                fields.insert("maxInactiveTime".into(), json!(max_inactive_time));
            }
        }
        Ok(WorkerOptions::from_json(&record)?)
    }
}

fn double(data: Value) -> Result<Value, String> {
    let n = data.as_i64().ok_or("expected an integer")?;
    Ok(Value::from(n * 2))
}

fn triple(data: Value) -> Result<Value, String> {
    let n = data.as_i64().ok_or("expected an integer")?;
    Ok(Value::from(n * 3))
}

#[derive(Debug, Deserialize)]
struct Transcode {
    input: String,
    bitrate_kbps: u32,
}

#[derive(Debug, Serialize)]
struct TranscodeReport {
    output: String,
    bitrate_kbps: u32,
}

impl TypedTask for Transcode {
    const NAME: &'static str = "transcode";
    type Output = TranscodeReport;
}

struct TranscodeHandler;

#[async_trait]
impl Handler<Transcode> for TranscodeHandler {
    async fn handle(&self, task: Transcode) -> Result<TranscodeReport, String> {
        if task.bitrate_kbps == 0 {
            return Err("bitrate must be positive".to_string());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(TranscodeReport {
            output: format!("{}.{}k.out", task.input, task.bitrate_kbps),
            bitrate_kbps: task.bitrate_kbps,
        })
    }
}

fn print_message(message: &MessageValue) -> Result<()> {
    println!("{}", serde_json::to_string(message)?);
    Ok(())
}

/// Receive until a message matching `done` arrives, printing everything seen.
async fn recv_until(
    worker: &mut LocalWorker,
    mut done: impl FnMut(&MessageValue) -> bool,
) -> Result<MessageValue> {
    loop {
        let Some(message) = worker.recv().await else {
            bail!("worker stopped unexpectedly");
        };
        print_message(&message)?;
        if done(&message) {
            return Ok(message);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spindle=info,spindle_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let options = args
        .worker_options()?
        .with_kill_handler(KillHandler::asynchronous(|| async {
            info!("releasing worker resources");
            Ok::<(), String>(())
        }));
    let max_inactive = options.max_inactive_duration();

    let catalog = TaskFunctionCatalog::new().with("triple", TaskFunction::sync(triple));
    info!(keys = ?catalog.keys(), "runtime registration enabled");

    let worker = WorkerBuilder::new()
        .task_function("double", TaskFunction::sync(double))
        .typed::<Transcode, _>(TranscodeHandler)
        .options(options)
        .catalog(catalog)
        .build()?;

    let (mut worker, properties) = LocalWorker::start(worker).await?;
    info!(worker_id = %worker.id(), task_functions = ?properties, "worker ready");

    worker.configure_statistics(WorkerStatistics {
        requires_run_time: true,
        requires_utilization: true,
    })?;

    worker.task_function_operation(
        TaskFunctionOperation::Add,
        TaskFunctionProperties::named("triple"),
        Some("triple".to_string()),
    )?;
    recv_until(&mut worker, |m| m.task_function_operation.is_some()).await?;

    let mut pending = Vec::new();
    for n in 1..=args.tasks {
        pending.push(worker.submit(None, json!(n))?);
    }
    pending.push(worker.submit(
        Some(Transcode::NAME),
        json!({ "input": "clip.mov", "bitrate_kbps": 800 }),
    )?);
    pending.push(worker.submit(Some("resize"), json!({ "width": 64 }))?);
    pending.push(worker.submit(Some("triple"), json!(7))?);

    while !pending.is_empty() {
        let reply = recv_until(&mut worker, |m| m.task_id.is_some()).await?;
        pending.retain(|task_id| Some(*task_id) != reply.task_id);
    }

    if args.wait_idle {
        worker.set_check_active(true)?;
        let wait = max_inactive * 2;
        info!(?wait, "waiting for the idle kill-request");
        let request = tokio::time::timeout(
            wait,
            recv_until(&mut worker, |m| {
                matches!(m.kill, Some(KillMessage::Request(_)))
            }),
        )
        .await;
        match request {
            Ok(request) => {
                request?;
            }
            Err(_) => warn!("no idle kill-request received"),
        }
    }

    worker.kill()?;
    let outcome = recv_until(&mut worker, |m| {
        matches!(m.kill, Some(KillMessage::Outcome(_)))
    })
    .await?;
    info!(kill = ?outcome.kill, "worker killed");

    match worker.close().await {
        Ok(()) => Ok(()),
        Err(err) if err.is_fatal() => {
            error!(error = %err, "worker stopped on a protocol violation");
            Err(err.into())
        }
        Err(err) => {
            warn!(error = %err, "worker did not shut down cleanly");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_behavior_flag_is_checked_at_parse_time() {
        assert!(Args::try_parse_from(["spindle", "--kill-behavior", "gentle"]).is_err());

        let args = Args::try_parse_from(["spindle", "--kill-behavior", "hard"]).unwrap();
        let options = args.worker_options().unwrap();
        assert_eq!(options.kill_behavior, KillBehavior::Hard);
    }
}
