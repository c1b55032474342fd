//! Application Startup
//!
//! Backend selection, service wiring, background jobs and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::jobs::{JobDispatcher, JobQueue, Scheduler, Worker};
use crate::application::realtime::EventBroadcaster;
use crate::application::services::{
    ActivityRecorder, ActivityService, ActivityServiceImpl, AttachmentService,
    AttachmentServiceImpl, AuthService, AuthServiceImpl, CommentService, CommentServiceImpl,
    MaintenanceService, MaintenanceServiceImpl, NotificationService, NotificationServiceImpl,
    ProjectService, ProjectServiceImpl, SubtaskService, SubtaskServiceImpl, TaskService,
    TaskServiceImpl, TeamService, TeamServiceImpl, UserService, UserServiceImpl,
};
use crate::application::storage::FileStorage;
use crate::config::{DatabaseBackend, JobBackend, Settings};
use crate::domain::Repositories;
use crate::infrastructure::queue::{create_redis_client, MemoryJobQueue, RedisJobQueue};
use crate::infrastructure::storage::LocalFileStorage;
use crate::infrastructure::{database, repositories};
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::websocket::Gateway;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthService>,
    pub users: Arc<dyn UserService>,
    pub teams: Arc<dyn TeamService>,
    pub projects: Arc<dyn ProjectService>,
    pub tasks: Arc<dyn TaskService>,
    pub subtasks: Arc<dyn SubtaskService>,
    pub comments: Arc<dyn CommentService>,
    pub attachments: Arc<dyn AttachmentService>,
    pub notifications: Arc<dyn NotificationService>,
    pub activity: Arc<dyn ActivityService>,
    pub maintenance: Arc<dyn MaintenanceService>,
    pub repos: Repositories,
    pub gateway: Arc<Gateway>,
    pub queue: Arc<dyn JobQueue>,
    pub storage: Arc<dyn FileStorage>,
    /// `None` on the in-memory backend
    pub db: Option<PgPool>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire every service over the given backends.
    pub fn new(
        settings: Settings,
        repos: Repositories,
        queue: Arc<dyn JobQueue>,
        storage: Arc<dyn FileStorage>,
        db: Option<PgPool>,
    ) -> Self {
        let id_generator = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id as u64,
            settings.snowflake.epoch,
        ));
        let gateway = Arc::new(Gateway::new(&settings.websocket));
        let events: Arc<dyn EventBroadcaster> = gateway.clone();
        let activity = ActivityRecorder::new(repos.activities.clone(), id_generator.clone());

        let notifications: Arc<dyn NotificationService> = Arc::new(NotificationServiceImpl::new(
            repos.clone(),
            id_generator.clone(),
            queue.clone(),
            events.clone(),
            settings.jobs.max_attempts,
        ));

        Self {
            auth: Arc::new(AuthServiceImpl::new(
                repos.clone(),
                id_generator.clone(),
                settings.jwt.clone(),
            )),
            users: Arc::new(UserServiceImpl::new(repos.clone(), events.clone())),
            teams: Arc::new(TeamServiceImpl::new(
                repos.clone(),
                id_generator.clone(),
                events.clone(),
                notifications.clone(),
                activity.clone(),
            )),
            projects: Arc::new(ProjectServiceImpl::new(
                repos.clone(),
                id_generator.clone(),
                events.clone(),
                activity.clone(),
            )),
            tasks: Arc::new(TaskServiceImpl::new(
                repos.clone(),
                id_generator.clone(),
                events.clone(),
                notifications.clone(),
                activity.clone(),
            )),
            subtasks: Arc::new(SubtaskServiceImpl::new(
                repos.clone(),
                id_generator.clone(),
                events.clone(),
                activity.clone(),
            )),
            comments: Arc::new(CommentServiceImpl::new(
                repos.clone(),
                id_generator.clone(),
                events.clone(),
                notifications.clone(),
                activity.clone(),
            )),
            attachments: Arc::new(AttachmentServiceImpl::new(
                repos.clone(),
                storage.clone(),
                id_generator,
                events,
                activity,
                settings.uploads.clone(),
            )),
            activity: Arc::new(ActivityServiceImpl::new(repos.clone())),
            maintenance: Arc::new(MaintenanceServiceImpl::new(
                repos.clone(),
                storage.clone(),
                notifications.clone(),
                settings.jobs.clone(),
            )),
            notifications,
            repos,
            gateway,
            queue,
            storage,
            db,
            settings: Arc::new(settings),
        }
    }

    /// In-memory repositories and queue with local file storage.
    pub fn in_memory(settings: Settings) -> Self {
        let storage = Arc::new(LocalFileStorage::new(&settings.uploads.storage_dir));
        Self::new(
            settings,
            repositories::memory::repositories(),
            Arc::new(MemoryJobQueue::new()),
            storage,
            None,
        )
    }

    /// Worker over this state's queue, dispatching to its services.
    pub fn worker(&self) -> Worker {
        let dispatcher = JobDispatcher::new(self.notifications.clone(), self.maintenance.clone());
        Worker::new(
            self.queue.clone(),
            Arc::new(dispatcher),
            self.settings.jobs.clone(),
        )
    }
}

/// Build the router over a prepared state
pub fn build_router(state: AppState) -> Router {
    routes::create_router(state)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let (repos, db) = match settings.database.backend {
            DatabaseBackend::Postgres => {
                let pool = database::create_pool(&settings.database).await?;
                tracing::info!("Database connection pool created");

                if settings.database.run_migrations {
                    database::run_migrations(&pool).await?;
                    tracing::info!("Database migrations applied");
                }
                (repositories::postgres(pool.clone()), Some(pool))
            }
            DatabaseBackend::Memory => {
                tracing::warn!("Using in-memory repositories; data is lost on restart");
                (repositories::memory::repositories(), None)
            }
        };

        let queue: Arc<dyn JobQueue> = match settings.jobs.backend {
            JobBackend::Redis => {
                let conn = create_redis_client(&settings.redis).await?;
                tracing::info!("Redis connection established");
                Arc::new(RedisJobQueue::new(conn, &settings.redis.key_prefix))
            }
            JobBackend::Memory => Arc::new(MemoryJobQueue::new()),
        };

        // Jobs left in flight by a previous process go back on the ready list
        let requeued = queue.requeue_inflight().await?;
        if requeued > 0 {
            tracing::warn!(jobs = requeued, "Requeued in-flight jobs from a previous run");
        }

        let storage = LocalFileStorage::new(&settings.uploads.storage_dir);
        tokio::fs::create_dir_all(storage.root()).await?;
        tracing::info!(dir = %storage.root().display(), "File storage ready");

        let addr = settings.server.socket_addr()?;
        let state = AppState::new(settings, repos, queue, Arc::new(storage), db);
        let router = build_router(state.clone());

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            state,
        })
    }

    /// Run the server until a shutdown signal, then stop the job tasks
    pub async fn run_until_stopped(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let jobs = &self.state.settings.jobs;
        if jobs.enabled {
            tasks.extend(Arc::new(self.state.worker()).spawn(shutdown_rx.clone()));
            tasks.push(Scheduler::new(self.state.queue.clone(), jobs.clone()).spawn(shutdown_rx));
            tracing::info!(workers = jobs.concurrency, "Background jobs started");
        }

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped; waiting for background jobs");
        let _ = shutdown_tx.send(true);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task panicked");
            }
        }

        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
