use std::{process, sync::Arc, time::Duration};

use apalis::layers::WorkerBuilderExt as _;
use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use clap::Parser;
use quire::{
    application::{
        error::AppError,
        events::EventDispatcher,
        jobs::{
            CachePruneContext, PublishDueContext, process_cache_prune_job,
            process_publish_due_job, schedule_every,
        },
        pages::PageService,
        render::MarkdownParser,
    },
    cache::{CacheStore, DbCache, FileCache, MemoryCache, NullCache, TagCache},
    config::{self, CacheBackendKind, CliArgs, Command, DriverKind, SchedulerSettings, ServeArgs},
    content::{AutoDriver, ContentDriver, DbDriver, FileDriver, HybridDriver, migrate},
    infra::{
        db,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = CliArgs::parse();
    let settings = config::load(&cli_args)
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = db::connect(
        &settings.content.database_url,
        settings.content.database_max_connections.get(),
    )
    .await?;
    db::run_migrations(&pool).await?;

    let file = Arc::new(FileDriver::new(&settings.content.root).map_err(InfraError::Io)?);
    let db_driver = Arc::new(DbDriver::new(pool.clone()));
    let driver: Arc<dyn ContentDriver> = match settings.content.driver {
        DriverKind::File => Arc::clone(&file) as Arc<dyn ContentDriver>,
        DriverKind::Database => Arc::clone(&db_driver) as Arc<dyn ContentDriver>,
        DriverKind::Hybrid => Arc::new(HybridDriver::new(
            Arc::clone(&file),
            Arc::clone(&db_driver),
        )),
        DriverKind::Auto => Arc::new(AutoDriver::new(
            Arc::clone(&file),
            Arc::clone(&db_driver),
            settings.content.auto_threshold,
        )),
    };

    let (store, file_cache): (Arc<dyn CacheStore>, Option<Arc<FileCache>>) =
        match settings.cache.backend {
            CacheBackendKind::File => {
                let cache = Arc::new(
                    FileCache::new(
                        &settings.cache.directory,
                        settings.cache.prefix.clone(),
                        settings.cache.secret.as_bytes().to_vec(),
                    )
                    .map_err(InfraError::Io)?,
                );
                (Arc::clone(&cache) as Arc<dyn CacheStore>, Some(cache))
            }
            CacheBackendKind::Memory => (Arc::new(MemoryCache::new()), None),
            CacheBackendKind::Database => {
                let cache = DbCache::new(pool.clone(), settings.cache.prefix.clone())
                    .await
                    .map_err(InfraError::from)?;
                (Arc::new(cache), None)
            }
            CacheBackendKind::None => (Arc::new(NullCache::new()), None),
        };

    let pages = Arc::new(PageService::new(
        driver,
        TagCache::new(store),
        Arc::new(EventDispatcher::new()),
        Arc::new(MarkdownParser::new()),
        settings.cache.ttl,
    ));

    let _monitor = spawn_job_monitor(Arc::clone(&pages), file_cache, &settings.scheduler);

    serve_http(&settings, HttpState { pages, pool }).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = db::connect(
        &settings.content.database_url,
        settings.content.database_max_connections.get(),
    )
    .await?;
    db::run_migrations(&pool).await?;

    let file = FileDriver::new(&settings.content.root).map_err(InfraError::Io)?;
    let db_driver = DbDriver::new(pool);

    let report = migrate::copy_file_pages_to_db(&file, &db_driver).await?;
    info!(copied = report.copied, "content migration complete");
    Ok(())
}

fn spawn_job_monitor(
    pages: Arc<PageService>,
    file_cache: Option<Arc<FileCache>>,
    scheduler: &SchedulerSettings,
) -> tokio::task::JoinHandle<()> {
    let publish_worker = WorkerBuilder::new("publish-due-worker")
        .data(PublishDueContext { pages })
        .backend(CronStream::new(schedule_every(scheduler.cadence)))
        .build_fn(process_publish_due_job);

    let mut monitor = Monitor::new().register(publish_worker);

    if let Some(cache) = file_cache {
        let prune_worker = WorkerBuilder::new("cache-prune-worker")
            .data(CachePruneContext { cache })
            .backend(CronStream::new(schedule_every(Duration::from_secs(3600))))
            .build_fn(process_cache_prune_job);
        monitor = monitor.register(prune_worker);
    }

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
