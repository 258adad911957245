//! The deploy pipeline: repository sync, cookbook upload, notification and
//! cleanup, executed sequentially per artifact.

use crate::job::JobStore;
use crate::mailer::{Notify, compose_report};
use crate::payload::DeployRequest;
use crate::runner::{CommandRunner, ProcessResult};
use crate::{Binaries, Config};
use std::ffi::OsStr;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Final state of one deploy, carrying the command output that the
/// notification template needs.
#[derive(Debug)]
pub enum DeployOutcome {
    CheckoutFailed(ProcessResult),
    UploadFailed(ProcessResult),
    Deployed(ProcessResult),
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeployOutcome::Deployed(_))
    }
}

/// Recreates the job working directory and clones the configuration repo
/// into it. Filesystem errors are captured as failed results so they reach
/// the notification like any other checkout failure.
pub async fn checkout_repo<R: CommandRunner>(
    runner: &R,
    config: &Config,
    binaries: &Binaries,
    workdir: &Path,
) -> ProcessResult {
    if workdir.exists() {
        warn!("Removing previous deploy directory at {}", workdir.display());
        if let Err(e) = tokio::fs::remove_dir_all(workdir).await {
            return ProcessResult::failed(format!(
                "failed to remove {}: {}",
                workdir.display(),
                e
            ));
        }
    }

    info!("Creating deploy directory at {}", workdir.display());
    if let Err(e) = tokio::fs::create_dir_all(workdir).await {
        return ProcessResult::failed(format!(
            "failed to create {}: {}",
            workdir.display(),
            e
        ));
    }

    let clone_dest = workdir.join(&config.repo.name);
    info!("Cloning {} to {}", config.repo.url, clone_dest.display());
    runner
        .run(
            &binaries.git,
            &[
                OsStr::new("clone"),
                OsStr::new(&config.repo.url),
                clone_dest.as_os_str(),
            ],
            config.deploy.command_timeout(),
        )
        .await
}

/// Publishes one cookbook from the fresh checkout to the Chef server.
pub async fn upload_artifact<R: CommandRunner>(
    runner: &R,
    config: &Config,
    binaries: &Binaries,
    artifact: &str,
    workdir: &Path,
) -> ProcessResult {
    let cookbooks_dir = workdir.join(&config.repo.name).join("cookbooks");
    info!("Uploading {} to Chef", artifact);
    runner
        .run(
            &binaries.knife,
            &[
                OsStr::new("cookbook"),
                OsStr::new("upload"),
                OsStr::new(artifact),
                OsStr::new("-o"),
                cookbooks_dir.as_os_str(),
            ],
            config.deploy.command_timeout(),
        )
        .await
}

/// Deletes the job working directory. Runs after notification regardless of
/// outcome; a deletion error is logged and otherwise ignored.
pub async fn cleanup(workdir: &Path) {
    if workdir.exists() {
        info!("Cleaning up deploy directory at {}", workdir.display());
        if let Err(e) = tokio::fs::remove_dir_all(workdir).await {
            warn!("Failed to remove {}: {}", workdir.display(), e);
        }
    }
}

/// Runs one artifact through checkout, upload, notification and cleanup.
/// A failed checkout short-circuits: knife never runs without a checkout.
pub async fn process_artifact<R: CommandRunner, N: Notify>(
    runner: &R,
    notifier: &N,
    config: &Config,
    binaries: &Binaries,
    request: &DeployRequest,
    workdir: &Path,
) -> DeployOutcome {
    let checkout = checkout_repo(runner, config, binaries, workdir).await;
    let outcome = if !checkout.success {
        error!("Error cloning {}", config.repo.url);
        DeployOutcome::CheckoutFailed(checkout)
    } else {
        let upload = upload_artifact(runner, config, binaries, &request.artifact, workdir).await;
        if upload.success {
            DeployOutcome::Deployed(upload)
        } else {
            error!("Error uploading {} to Chef", request.artifact);
            DeployOutcome::UploadFailed(upload)
        }
    };

    let report = compose_report(&request.artifact, &config.repo.url, &outcome);
    info!("Sending notification email to {}", request.committer);
    if let Err(e) = notifier.send(&request.committer, &report).await {
        error!(
            "Failed to send notification to {}: {}",
            request.committer, e
        );
    }

    cleanup(workdir).await;
    outcome
}

/// Drives the artifacts of one push through the pipeline in list order,
/// updating the job store around each. The caller holds the deploy lock.
pub async fn run_deploy_queue<R: CommandRunner, N: Notify>(
    runner: &R,
    notifier: &N,
    config: &Config,
    binaries: &Binaries,
    store: &Mutex<JobStore>,
    requests: Vec<(String, DeployRequest)>,
) {
    for (job_id, request) in requests {
        store
            .lock()
            .await
            .update_job(&job_id, |job| job.mark_running());

        info!(
            "Processing #chefdeploy of {} by {}",
            request.artifact, request.committer
        );

        let workdir = config.repo.target.join(&job_id);
        let outcome =
            process_artifact(runner, notifier, config, binaries, &request, &workdir).await;

        let mut store = store.lock().await;
        match outcome {
            DeployOutcome::Deployed(result) => {
                info!("Deploy of {} succeeded", request.artifact);
                store.update_job(&job_id, |job| job.mark_success(result.output));
            }
            DeployOutcome::CheckoutFailed(result) | DeployOutcome::UploadFailed(result) => {
                store.update_job(&job_id, |job| job.mark_failed(result.output));
            }
        }
    }
}
