use axum::{
    Json,
    extract::State as AxumState,
    extract::{Form, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chef_deploy_hook::SharedState;
use chef_deploy_hook::deploy::run_deploy_queue;
use chef_deploy_hook::job::DeployJob;
use chef_deploy_hook::payload::{PushEvent, deploy_requests};
use chef_deploy_hook::runner::SystemRunner;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// Form-encoded webhook body: a single `payload` field carrying JSON.
#[derive(Deserialize)]
pub struct HookForm {
    payload: String,
}

pub async fn root() -> &'static str {
    "chef_deploy_hook"
}

/// Returns the current server status with recent deploy jobs
pub async fn status(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let store = state.job_store.lock().await;

    Json(json!({
        "server": {
            "name": "chef_deploy_hook",
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at,
            "uptime_seconds": state.start_time.elapsed().as_secs(),
        },
        "jobs": {
            "current": store.get_current_job(),
            "queued_count": store.get_queued_count(),
            "recent": store.get_recent_jobs(10),
        },
        "repo": {
            "name": state.config.repo.name,
            "url": state.config.repo.url,
        }
    }))
}

/// Returns a specific deploy job by ID
pub async fn get_job(
    AxumState(state): AxumState<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.job_store.lock().await;
    match store.get_job(&id) {
        Some(job) => Json(job.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Job not found"})),
        )
            .into_response(),
    }
}

/// Handles the deploy webhook POST request.
pub async fn handle_deploy_hook(
    AxumState(state): AxumState<SharedState>,
    Form(form): Form<HookForm>,
) -> StatusCode {
    let push: PushEvent = match serde_json::from_str(&form.payload) {
        Ok(push) => push,
        Err(e) => {
            warn!("Could not parse webhook payload: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    let requests = deploy_requests(&push);
    if requests.is_empty() {
        info!(
            "No deploy directive in {} commit(s), nothing to do",
            push.commits.len()
        );
        return StatusCode::OK;
    }

    // Queue a job per artifact up front so /status reflects the whole push
    let mut queued = Vec::with_capacity(requests.len());
    {
        let mut store = state.job_store.lock().await;
        for request in requests {
            let job = DeployJob::new(request.artifact.clone(), request.committer.clone());
            info!(
                "Created job {} for #chefdeploy of {} by {}",
                job.id, request.artifact, request.committer
            );
            queued.push((job.id.clone(), request));
            store.add_job(job);
        }
    }

    // Clones and uploads are long-running; answer the webhook now and
    // process in the background. The lock serializes deploys across
    // overlapping requests.
    let shared_state = state.clone();
    tokio::spawn(async move {
        let _guard = shared_state.deploy_lock.lock().await;
        run_deploy_queue(
            &SystemRunner,
            &shared_state.mailer,
            &shared_state.config,
            &shared_state.binaries,
            &shared_state.job_store,
            queued,
        )
        .await;
    });

    StatusCode::OK
}
