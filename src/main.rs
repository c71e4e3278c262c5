//! hr-store - command line front end for the department/employee store.

use clap::Parser;
use hr_store::buffer::{BufferPool, PooledBuffer};
use hr_store::codec::JsonCodec;
use hr_store::config::{Command, Config};
use hr_store::context::UNKNOWN_REQUEST_ID;
use hr_store::models::{Department, Employee, ModelPool, PoolStats};
use hr_store::{Database, RequestContext, RequestIdGenerator, StoreError, StoreResult};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status when the requested row does not exist.
const EXIT_NOT_FOUND: u8 = 2;

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

struct App {
    db: Database,
    codec: JsonCodec,
}

impl App {
    /// Run `command`. `None` means the requested row does not exist.
    async fn run(
        &self,
        ctx: &RequestContext,
        command: &Command,
    ) -> StoreResult<Option<PooledBuffer<'_>>> {
        let models = self.db.models();
        match command {
            Command::GetDepartment { id } => {
                let mut out = models.guard::<Department>();
                if !self.db.departments().get(ctx, *id, &mut out).await? {
                    return Ok(None);
                }
                self.encode(&*out)
            }
            Command::ListDepartments => {
                let mut out = Vec::new();
                let result = self.db.departments().list(ctx, &mut out).await;
                let encoded = result.and_then(|()| self.encode(&out));
                models.release_all(&mut out, true);
                encoded
            }
            Command::CreateDepartment { input } => {
                let input: Department = self.codec.decode(&read_body(input).await?)?;
                let mut out = models.guard::<Department>();
                let result = self.db.departments().create(ctx, &input, &mut out).await;
                models.release(input, true);
                result?;
                self.encode(&*out)
            }
            Command::UpdateDepartment { input } => {
                let input: Department = self.codec.decode(&read_body(input).await?)?;
                let mut out = models.guard::<Department>();
                let result = self.db.departments().update(ctx, &input, &mut out).await;
                models.release(input, true);
                if !result? {
                    return Ok(None);
                }
                self.encode(&*out)
            }
            Command::GetEmployee { id } => {
                let mut out = models.guard::<Employee>();
                if !self.db.employees().get(ctx, *id, &mut out).await? {
                    return Ok(None);
                }
                self.encode(&*out)
            }
            Command::CreateEmployee { input } => {
                let input: Employee = self.codec.decode(&read_body(input).await?)?;
                let mut out = models.guard::<Employee>();
                let result = self.db.employees().create(ctx, &input, &mut out).await;
                models.release(input, true);
                result?;
                self.encode(&*out)
            }
            Command::UpdateEmployee { input } => {
                let input: Employee = self.codec.decode(&read_body(input).await?)?;
                let mut out = models.guard::<Employee>();
                let result = self.db.employees().update(ctx, &input, &mut out).await;
                models.release(input, true);
                if !result? {
                    return Ok(None);
                }
                self.encode(&*out)
            }
        }
    }

    fn encode<T: serde::Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> StoreResult<Option<PooledBuffer<'_>>> {
        let mut buf = self.codec.encode_pretty(value)?;
        buf.push(b'\n');
        Ok(Some(buf))
    }
}

/// Read a request body from a file, or stdin for "-".
async fn read_body(path: &Path) -> StoreResult<Vec<u8>> {
    let result = if path.as_os_str() == "-" {
        let mut body = Vec::new();
        tokio::io::stdin().read_to_end(&mut body).await.map(|_| body)
    } else {
        tokio::fs::read(path).await
    };
    result.map_err(|e| {
        StoreError::invalid_input(
            format!("cannot read {}: {e}", path.display()),
            UNKNOWN_REQUEST_ID,
        )
    })
}

async fn write_stdout(body: &[u8]) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(body).await?;
    stdout.flush().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(&config);

    info!(
        backend = %config.database.driver_name,
        "Starting hr-store v{}",
        env!("CARGO_PKG_VERSION")
    );

    let model_stats = Arc::new(PoolStats::new());
    let buffer_stats = Arc::new(PoolStats::new());
    let models = Arc::new(ModelPool::from_config(&config.pools, Arc::clone(&model_stats)));
    let buffers = Arc::new(BufferPool::from_config(&config.pools, Arc::clone(&buffer_stats)));

    let db = match Database::connect(&config.database, models, config.init_schema).await {
        Ok(db) => db,
        Err(e) => {
            error!(code = e.code(), error = %e, suggestion = ?e.suggestion(), "Startup failed");
            return ExitCode::FAILURE;
        }
    };
    let app = App {
        db,
        codec: JsonCodec::new(buffers),
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            on_signal.cancel();
        }
    });

    let ids = RequestIdGenerator::new();
    let ctx = ids.context().with_cancellation(cancel);
    let status = match app.run(&ctx, &config.command).await {
        Ok(Some(body)) => match write_stdout(&body).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "Failed to write response");
                ExitCode::FAILURE
            }
        },
        Ok(None) => {
            warn!(request_id = ctx.request_id(), "Not found");
            ExitCode::from(EXIT_NOT_FOUND)
        }
        Err(e) => {
            error!(
                request_id = e.request_id(),
                code = e.code(),
                kind = ?e.kind(),
                error = %e,
                "Request failed"
            );
            ExitCode::FAILURE
        }
    };

    app.db.close().await;
    info!(models = ?model_stats.snapshot(), buffers = ?buffer_stats.snapshot(), "Pool usage");
    status
}
