//! Push-event payload structures and deploy directive extraction

use serde::Deserialize;

/// Commit-message marker selecting cookbooks to deploy, e.g.
/// `release #chefdeploy:base,common`.
pub const DIRECTIVE_TAG: &str = "chefdeploy";

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub commits: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
pub struct Commit {
    pub message: String,
    pub committer: Committer,
}

#[derive(Debug, Deserialize)]
pub struct Committer {
    pub email: String,
}

/// One cookbook deploy, attributed to the committer who requested it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub artifact: String,
    pub committer: String,
}

/// Extracts the cookbook names from the first deploy directive in a commit
/// message. Names keep their written order and are not deduplicated; a
/// message without the tag yields nothing.
pub fn extract_artifacts(message: &str) -> Vec<String> {
    let marker = format!("#{}:", DIRECTIVE_TAG);
    let Some(start) = message.find(&marker) else {
        return Vec::new();
    };

    let rest = &message[start + marker.len()..];
    let list: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || *c == ',')
        .collect();

    list.split(',')
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// Flattens a push event into deploy requests, commit order first, then
/// directive list order within each commit.
pub fn deploy_requests(push: &PushEvent) -> Vec<DeployRequest> {
    push.commits
        .iter()
        .flat_map(|commit| {
            extract_artifacts(&commit.message)
                .into_iter()
                .map(|artifact| DeployRequest {
                    artifact,
                    committer: commit.committer.email.clone(),
                })
        })
        .collect()
}
