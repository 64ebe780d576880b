use super::*;
use tempfile::TempDir;

#[test]
fn test_probe_missing_path_is_absent() {
    let temp = TempDir::new().unwrap();
    assert_eq!(probe(&temp.path().join("app")).unwrap(), RepoState::Absent);
}

#[test]
fn test_probe_empty_dir_is_absent() {
    let temp = TempDir::new().unwrap();
    assert_eq!(probe(temp.path()).unwrap(), RepoState::Absent);
}

#[test]
fn test_probe_git_dir_is_present() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join(".git")).unwrap();
    std::fs::write(temp.path().join("main.py"), "").unwrap();
    assert_eq!(probe(temp.path()).unwrap(), RepoState::Present);
}

#[test]
fn test_probe_gitfile_is_present() {
    // worktrees and submodules use a `.git` file pointing elsewhere
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".git"), "gitdir: /elsewhere\n").unwrap();
    assert_eq!(probe(temp.path()).unwrap(), RepoState::Present);
}

#[test]
fn test_probe_unrelated_content_is_foreign() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("notes.txt"), "keep me").unwrap();
    assert_eq!(probe(temp.path()).unwrap(), RepoState::Foreign);
}

#[test]
fn test_probe_regular_file_is_foreign() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("app");
    std::fs::write(&file, "").unwrap();
    assert_eq!(probe(&file).unwrap(), RepoState::Foreign);
}

#[tokio::test]
async fn test_refuse_leaves_foreign_content_alone() {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("app");
    std::fs::create_dir(&app).unwrap();
    std::fs::write(app.join("notes.txt"), "keep me").unwrap();

    let ctx = ExecutionContext::new(&Default::default(), temp.path());
    let err = RepoSync::new("/nonexistent/remote")
        .sync(&app, &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ForeignContent { .. }), "got {:?}", err);
    assert!(!err.is_update());
    assert_eq!(std::fs::read_to_string(app.join("notes.txt")).unwrap(), "keep me");
    assert!(!app.join(".git").exists());
}

#[test]
fn test_clone_parent_finds_existing_ancestor() {
    let temp = TempDir::new().unwrap();
    let ctx = ExecutionContext::new(&Default::default(), "/");
    let target = temp.path().join("a/b/c");
    assert_eq!(clone_parent(&target, &ctx), temp.path());
}

#[test]
fn test_short_revision() {
    assert_eq!(short("0123456789abcdef0123"), "0123456789ab");
    assert_eq!(short("abc"), "abc");
}
