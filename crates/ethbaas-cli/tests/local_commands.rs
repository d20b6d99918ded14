//! Commands that only touch local state run without any cluster access.

use clap::Parser;

use ethbaas_cli::Cli;

struct Paths {
    dir: tempfile::TempDir,
    args: Vec<String>,
    home: std::path::PathBuf,
}

fn paths() -> Paths {
    let dir = tempfile::tempdir().unwrap();
    let genesis = dir.path().join("genesis.json");
    std::fs::write(&genesis, r#"{"config":{"chainId":1874}}"#).unwrap();
    let home = dir.path().join("projects");

    let args = vec![
        "--config".to_string(),
        dir.path().join("config.json").display().to_string(),
        "--home-dir".to_string(),
        home.display().to_string(),
        "--db-path".to_string(),
        dir.path().join("ethbaas.db").display().to_string(),
        "--genesis".to_string(),
        genesis.display().to_string(),
        "--kubeconfig".to_string(),
        dir.path().join("no-such-kubeconfig").display().to_string(),
    ];
    Paths {
        dir,
        args,
        home,
    }
}

async fn run(paths: &Paths, command: &[&str]) -> ethbaas_cli::Result<()> {
    let mut argv = vec!["ethbaas".to_string()];
    argv.extend(command.iter().map(|s| s.to_string()));
    argv.extend(paths.args.iter().cloned());
    Cli::try_parse_from(argv).unwrap().run().await
}

#[tokio::test]
async fn init_list_get_and_local_delete() {
    let p = paths();

    run(&p, &["project", "init", "-n", "net1", "-c", "2", "-p", "30000"])
        .await
        .unwrap();
    assert_eq!(std::fs::read_dir(p.home.join("net1")).unwrap().count(), 10);

    run(&p, &["project", "list"]).await.unwrap();
    run(&p, &["project", "get", "-n", "net1", "-o", "json"])
        .await
        .unwrap();

    run(&p, &["project", "delete", "-n", "net1", "--local-only"])
        .await
        .unwrap();
    assert!(!p.home.join("net1").exists());

    let err = run(&p, &["project", "get", "-n", "net1"]).await.unwrap_err();
    assert!(matches!(
        err,
        ethbaas_cli::Error::Ethbaas(ethbaas_common::Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn start_without_cluster_reports_connection_failure() {
    let p = paths();
    run(&p, &["project", "init", "-n", "net1"]).await.unwrap();

    let err = run(&p, &["project", "start", "-n", "net1"]).await.unwrap_err();

    match err {
        ethbaas_cli::Error::Ethbaas(e) => {
            assert!(matches!(e, ethbaas_common::Error::Incomplete { .. }));
            assert!(matches!(e.root_cause(), ethbaas_common::Error::Config { .. }));
        }
        other => panic!("expected Incomplete, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_genesis_fails_init() {
    let p = paths();
    std::fs::remove_file(p.dir.path().join("genesis.json")).unwrap();

    let err = run(&p, &["project", "init", "-n", "net1"]).await.unwrap_err();

    assert!(matches!(
        err,
        ethbaas_cli::Error::Ethbaas(ethbaas_common::Error::Io { .. })
    ));
    assert!(!p.home.join("net1").exists());
}
