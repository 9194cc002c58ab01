//! Artifact collection after real runs.

use crate::prelude::*;
use legate_core::{ArtifactKind, JobMode, JobStatus};

#[tokio::test]
async fn text_referenced_file_is_registered_exactly_once() {
    // The command writes an image into its own run directory and mentions
    // both that path and a file outside every allowed root. The runs dir is
    // a sibling of the workdir the command runs in.
    let h = harness(|s| {
        s.agent_ephemeral_cmd_template = concat!(
            r#"out="$(dirname "$PWD")/runs/$JOB_ID/out"; mkdir -p "$out"; "#,
            r#"printf 'png' > "$out/img.png"; "#,
            "echo \"result: \\`$out/img.png\\`\"; ",
            "echo \"also wrote \\`$(dirname \"$PWD\")/secret.png\\`\"",
        )
        .to_string();
    });
    std::fs::write(h.dir.path().join("secret.png"), b"\x89PNG").unwrap();

    let job = h
        .orchestrator
        .submit("draw something", JobMode::Ephemeral, None)
        .await
        .unwrap();
    h.orchestrator.start();
    let finished = wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;
    assert_eq!(finished.status, JobStatus::Succeeded);

    let artifacts = h.store.list_artifacts(job.id).unwrap();
    let images: Vec<_> = artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Image)
        .collect();
    assert_eq!(images.len(), 1, "{artifacts:?}");
    assert!(images[0].path.ends_with("out/img.png"));
    assert!(artifacts.iter().all(|a| !a.path.ends_with("secret.png")));
}

#[tokio::test]
async fn run_directory_files_are_hashed_and_classified() {
    let h = harness(|s| {
        s.agent_ephemeral_cmd_template = "echo hello artifact".to_string();
    });
    let job = h
        .orchestrator
        .submit("produce logs", JobMode::Ephemeral, None)
        .await
        .unwrap();
    h.orchestrator.start();
    wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;

    let artifacts = h.store.list_artifacts(job.id).unwrap();
    assert!(!artifacts.is_empty());
    for artifact in &artifacts {
        assert_eq!(artifact.kind, ArtifactKind::Log);
        assert_eq!(artifact.sha256.len(), 64);
        assert!(artifact.size_bytes > 0);
        assert!(artifact.path.starts_with(&h.settings.runs_dir));
    }
}

#[tokio::test]
async fn relative_mention_resolves_against_the_exec_cwd() {
    let h = harness(|s| {
        s.agent_ephemeral_cmd_template =
            "printf 'data' > notes.txt; echo saved notes.txt".to_string();
    });
    let job = h
        .orchestrator
        .submit("take notes", JobMode::Ephemeral, None)
        .await
        .unwrap();
    h.orchestrator.start();
    wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;

    let artifacts = h.store.list_artifacts(job.id).unwrap();
    let notes: Vec<_> = artifacts
        .iter()
        .filter(|a| a.path.ends_with("notes.txt"))
        .collect();
    assert_eq!(notes.len(), 1, "{artifacts:?}");
    assert!(notes[0].path.starts_with(&h.settings.agent_workdir));
}
