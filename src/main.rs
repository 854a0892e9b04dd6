//! memviz-probe - acquire one variable buffer from a running DAP server.
//!
//! Connects to a debug adapter listening on TCP, attaches with the given
//! arguments, waits for the debuggee to stop and dumps the raw bytes of a
//! variable into a file.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use memviz::dap::tracer::FileTracer;
use memviz::dap::DapClient;
use memviz::resolve::evaluate_count;
use memviz::{
    AcquireConfig, AcquireRequest, Acquirer, Acquisition, Backend, CacheKey, Liveness,
    ReadOutcome, Session, SessionId, Shape, StalenessCache, VariableDescriptor,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShapeArg {
    Flat,
    Fixed,
    Matrix,
    Tensor,
}

impl From<ShapeArg> for Shape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Flat => Shape::Flat,
            ShapeArg::Fixed => Shape::FixedArray,
            ShapeArg::Matrix => Shape::Matrix,
            ShapeArg::Tensor => Shape::Tensor,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Debug adapter address
    #[clap(long, default_value = "127.0.0.1:4711")]
    connect: String,

    /// Adapter type (cppdbg, cppvsdbg, lldb), selects expression dialect
    #[clap(long, default_value = "cppdbg")]
    adapter: String,

    /// Attach request arguments as JSON
    #[clap(long, default_value = "{}")]
    attach: String,

    /// Variable name in the stopped frame
    variable: String,

    /// Declared type, informational only
    #[clap(long, default_value = "")]
    r#type: String,

    #[clap(long, value_enum, default_value_t = ShapeArg::Flat)]
    shape: ShapeArg,

    /// Buffer size in bytes
    #[clap(long, conflicts_with = "count_expr")]
    len: Option<u64>,

    /// Expression evaluating to element count (e.g. `v.size()`), used with --elem-size
    #[clap(long)]
    count_expr: Option<String>,

    #[clap(long, default_value_t = 1)]
    elem_size: u64,

    /// Output file for raw bytes
    #[clap(short, long)]
    out: PathBuf,

    /// Acquisition config (default: ~/.config/memviz/acquire.toml)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Trace DAP traffic into a file
    #[clap(long)]
    trace_file: Option<PathBuf>,

    /// Seconds to wait for the debuggee to stop
    #[clap(long, default_value_t = 30)]
    stop_timeout: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = AcquireConfig::load(args.config.as_deref());
    let addr: SocketAddr = args.connect.parse().context("Invalid connect address")?;
    let tracer = match &args.trace_file {
        Some(path) => Some(FileTracer::new(path)?),
        None => None,
    };
    let attach: Value = serde_json::from_str(&args.attach).context("Invalid attach arguments")?;

    let client =
        Arc::new(DapClient::connect(addr, tracer).with_context(|| format!("connect {addr}"))?);
    let frame_id = start_session(&client, &args, attach)?;
    let children_ref = find_variable(&client, frame_id, &args.variable)?;

    let backend = Backend::from_adapter_type(&args.adapter);
    let session = Session::new(SessionId::new(addr.to_string()), backend, client.clone())
        .with_frame(frame_id);
    info!(target: "dap", "session {} on {backend} backend, frame {frame_id}", session.id());

    let length = match (args.len, &args.count_expr) {
        (Some(len), _) => len,
        (None, Some(expr)) => {
            let count = evaluate_count(&session, expr, None, &config)?;
            count
                .checked_mul(args.elem_size)
                .ok_or_else(|| anyhow!("{count} elements of {} bytes overflow", args.elem_size))?
        }
        (None, None) => bail!("either --len or --count-expr is required"),
    };

    let mut descriptor = VariableDescriptor::new(&args.variable, &args.r#type).with_frame(frame_id);
    if let Some(children_ref) = children_ref {
        descriptor = descriptor.with_children(children_ref);
    }

    let acquirer = Acquirer::new(config)?;
    let mut cache = StalenessCache::new();
    let key = CacheKey::new("probe", session.id().clone(), &args.variable);
    let progress = |done: f64| info!(target: "reader", "{:.0}%", done * 100.0);

    let acquisition = acquirer.acquire(
        &session,
        &descriptor,
        AcquireRequest {
            shape: args.shape.into(),
            length,
        },
        key,
        &cache,
        &Liveness::new(),
        Some(&progress),
    )?;

    let Acquisition::Fetched(fetched) = acquisition else {
        bail!("nothing fetched for `{}`", args.variable);
    };
    std::fs::write(&args.out, fetched.outcome.data())
        .with_context(|| format!("write {}", args.out.display()))?;
    if let ReadOutcome::Partial(partial) = &fetched.outcome {
        warn!("partial read, missing byte ranges: {:?}", partial.missing);
    }
    fetched.commit(&mut cache);

    println!(
        "{}: {} of {length} bytes at {} written to {}",
        args.variable,
        fetched.outcome.data().len(),
        fetched.address,
        args.out.display()
    );
    _ = client.request("disconnect", json!({ "terminateDebuggee": false }));
    Ok(())
}

/// Initialize, attach and wait for a stop. Return id of the top frame.
fn start_session(client: &DapClient, args: &Args, attach: Value) -> anyhow::Result<i64> {
    client
        .request(
            "initialize",
            json!({
                "clientID": "memviz",
                "adapterID": args.adapter,
                "linesStartAt1": true,
                "columnsStartAt1": true,
                "supportsMemoryReferences": true,
            }),
        )
        .context("initialize")?;
    client.request("attach", attach).context("attach")?;
    client
        .request("configurationDone", json!({}))
        .context("configurationDone")?;

    let stopped = client.wait_event("stopped", Duration::from_secs(args.stop_timeout))?;
    let thread_id = stopped
        .get("threadId")
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("stopped event without thread id"))?;

    let trace = client.request("stackTrace", json!({ "threadId": thread_id, "levels": 1 }))?;
    trace
        .pointer("/stackFrames/0/id")
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("thread {thread_id} has no frames"))
}

/// Look the variable up in the frame scopes, return its children reference if expandable.
fn find_variable(client: &DapClient, frame_id: i64, name: &str) -> anyhow::Result<Option<i64>> {
    let scopes = client.request("scopes", json!({ "frameId": frame_id }))?;
    let scope_refs = scopes
        .get("scopes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|s| s.get("variablesReference").and_then(Value::as_i64));

    for scope_ref in scope_refs {
        let vars = client.request("variables", json!({ "variablesReference": scope_ref }))?;
        let found = vars
            .get("variables")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|v| v.get("name").and_then(Value::as_str) == Some(name));
        if let Some(var) = found {
            return Ok(var
                .get("variablesReference")
                .and_then(Value::as_i64)
                .filter(|r| *r > 0));
        }
    }
    warn!("`{name}` not found in frame scopes, member walk disabled");
    Ok(None)
}
