use super::*;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    map.entry("HOME".to_string()).or_insert_with(|| "/home/app".to_string());
    map
}

fn minimal() -> HashMap<String, String> {
    vars(&[(REPO_URL, "https://example.com/report.git")])
}

#[test]
fn test_defaults() {
    let config = Config::resolve(&minimal()).unwrap();

    assert_eq!(config.repo.url, "https://example.com/report.git");
    assert_eq!(config.repo.branch, None);
    assert_eq!(config.repo.depth, None);
    assert_eq!(config.repo.app_dir, PathBuf::from("/app"));
    assert_eq!(config.repo.on_foreign_content, ForeignContentPolicy::Refuse);
    assert_eq!(config.deps.manifest, PathBuf::from("requirements.txt"));
    assert_eq!(config.deps.scope, InstallScope::User);
    assert_eq!(config.deps.python, "python3");
    assert!(!config.deps.force);
    assert_eq!(config.deps.state_dir, PathBuf::from("/home/app/.launchpad"));
    assert_eq!(config.browser.policy, CapabilityPolicy::Optional);
    assert_eq!(config.browser.name, "chromium");
    assert_eq!(config.service.host, "0.0.0.0");
    assert_eq!(config.service.port, 8000);
    assert_eq!(config.service.app_module, "main:app");
    assert_eq!(config.service.start_command, None);
    assert_eq!(config.timeouts.sync, Some(Duration::from_secs(300)));
    assert_eq!(config.timeouts.install, Some(Duration::from_secs(900)));
    assert_eq!(config.timeouts.browser, Some(Duration::from_secs(600)));
}

#[test]
fn test_overrides() {
    let config = Config::resolve(&vars(&[
        (REPO_URL, "git@example.com:ops/report.git"),
        (REPO_BRANCH, "release"),
        (REPO_DEPTH, "1"),
        (APP_DIR, "/srv/report"),
        (MANIFEST, "deploy/requirements.txt"),
        (INSTALL_SCOPE, "system"),
        (PYTHON, "/usr/bin/python3.12"),
        (BROWSER, "required"),
        (BROWSER_NAME, "firefox"),
        (HOST, "127.0.0.1"),
        (PORT, "9090"),
        (APP_MODULE, "report_api:app"),
        (ON_FOREIGN_CONTENT, "adopt"),
        (FORCE_INSTALL, "yes"),
        (STATE_DIR, "/var/lib/launchpad"),
        (SYNC_TIMEOUT, "30s"),
        (INSTALL_TIMEOUT, "none"),
        (BROWSER_TIMEOUT, "1h"),
    ]))
    .unwrap();

    assert_eq!(config.repo.branch.as_deref(), Some("release"));
    assert_eq!(config.repo.depth, Some(1));
    assert_eq!(config.repo.app_dir, PathBuf::from("/srv/report"));
    assert_eq!(config.repo.on_foreign_content, ForeignContentPolicy::Adopt);
    assert_eq!(config.deps.manifest, PathBuf::from("deploy/requirements.txt"));
    assert_eq!(config.deps.scope, InstallScope::System);
    assert_eq!(config.deps.python, "/usr/bin/python3.12");
    assert!(config.deps.force);
    assert_eq!(config.deps.state_dir, PathBuf::from("/var/lib/launchpad"));
    assert_eq!(config.browser.policy, CapabilityPolicy::Required);
    assert_eq!(config.browser.name, "firefox");
    assert_eq!(config.service.host, "127.0.0.1");
    assert_eq!(config.service.port, 9090);
    assert_eq!(config.service.app_module, "report_api:app");
    assert_eq!(config.timeouts.sync, Some(Duration::from_secs(30)));
    assert_eq!(config.timeouts.install, None);
    assert_eq!(config.timeouts.browser, Some(Duration::from_secs(3600)));
}

#[test]
fn test_missing_repo_url() {
    let err = Config::resolve(&vars(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing(REPO_URL)), "got {:?}", err);
}

#[test]
fn test_empty_value_counts_as_unset() {
    let err = Config::resolve(&vars(&[(REPO_URL, "   ")])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing(REPO_URL)));

    let mut map = minimal();
    map.insert(PORT.to_string(), String::new());
    assert_eq!(Config::resolve(&map).unwrap().service.port, 8000);
}

#[test]
fn test_unrecognized_prefixed_variable_rejected() {
    let mut map = minimal();
    map.insert("LAUNCHPAD_REPO_BRNACH".to_string(), "main".to_string());
    let err = Config::resolve(&map).unwrap_err();
    match err {
        ConfigError::Unrecognized(name) => assert_eq!(name, "LAUNCHPAD_REPO_BRNACH"),
        other => panic!("expected Unrecognized, got {:?}", other),
    }
}

#[test]
fn test_unprefixed_variables_ignored() {
    let mut map = minimal();
    map.insert("GRAFANA_URL".to_string(), "http://grafana:3000".to_string());
    map.insert("PORT".to_string(), "not-a-number".to_string());
    assert!(Config::resolve(&map).is_ok());
}

#[test]
fn test_invalid_scope() {
    let mut map = minimal();
    map.insert(INSTALL_SCOPE.to_string(), "global".to_string());
    let err = Config::resolve(&map).unwrap_err();
    match err {
        ConfigError::Invalid { name, value, .. } => {
            assert_eq!(name, INSTALL_SCOPE);
            assert_eq!(value, "global");
        }
        other => panic!("expected Invalid, got {:?}", other),
    }
}

#[test]
fn test_invalid_port() {
    for bad in ["0", "65536", "http", "-1"] {
        let mut map = minimal();
        map.insert(PORT.to_string(), bad.to_string());
        assert!(
            matches!(Config::resolve(&map), Err(ConfigError::Invalid { name: PORT, .. })),
            "port {:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_invalid_depth() {
    let mut map = minimal();
    map.insert(REPO_DEPTH.to_string(), "0".to_string());
    assert!(matches!(
        Config::resolve(&map),
        Err(ConfigError::Invalid { name: REPO_DEPTH, .. })
    ));
}

#[test]
fn test_invalid_browser_policy() {
    let mut map = minimal();
    map.insert(BROWSER.to_string(), "maybe".to_string());
    assert!(matches!(
        Config::resolve(&map),
        Err(ConfigError::Invalid { name: BROWSER, .. })
    ));
}

#[test]
fn test_start_command_is_split_on_whitespace() {
    let mut map = minimal();
    map.insert(
        START_COMMAND.to_string(),
        "  gunicorn  -k uvicorn.workers.UvicornWorker main:app ".to_string(),
    );
    let config = Config::resolve(&map).unwrap();
    assert_eq!(
        config.service.start_command.unwrap(),
        vec!["gunicorn", "-k", "uvicorn.workers.UvicornWorker", "main:app"]
    );
}

#[test]
fn test_parse_bool() {
    for s in ["1", "true", "TRUE", "yes", "on"] {
        assert_eq!(parse_bool(s), Ok(true), "{}", s);
    }
    for s in ["0", "false", "No", "off"] {
        assert_eq!(parse_bool(s), Ok(false), "{}", s);
    }
    assert!(parse_bool("sometimes").is_err());
}

#[test]
fn test_parse_duration() {
    assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    assert_eq!(parse_duration("42").unwrap(), Duration::from_secs(42));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("5w").is_err());
    assert!(parse_duration("abc").is_err());
}

#[test]
fn test_parse_timeout_disabling() {
    assert_eq!(parse_timeout("none").unwrap(), None);
    assert_eq!(parse_timeout("OFF").unwrap(), None);
    assert_eq!(parse_timeout("0").unwrap(), None);
    assert_eq!(parse_timeout("90s").unwrap(), Some(Duration::from_secs(90)));
}

#[test]
fn test_format_duration() {
    assert_eq!(format_duration(&Duration::from_secs(0)), "0s");
    assert_eq!(format_duration(&Duration::from_millis(250)), "250ms");
    assert_eq!(format_duration(&Duration::from_secs(45)), "45s");
    assert_eq!(format_duration(&Duration::from_secs(900)), "15m");
    assert_eq!(format_duration(&Duration::from_secs(7200)), "2h");
}

#[test]
fn test_serializes_to_yaml() {
    let mut map = minimal();
    map.insert(INSTALL_TIMEOUT.to_string(), "none".to_string());
    let config = Config::resolve(&map).unwrap();
    let yaml = serde_yaml::to_string(&config).unwrap();

    assert!(yaml.contains("url: https://example.com/report.git"), "{}", yaml);
    assert!(yaml.contains("scope: user"), "{}", yaml);
    assert!(yaml.contains("policy: optional"), "{}", yaml);
    assert!(yaml.contains("sync: 5m"), "{}", yaml);
    assert!(yaml.contains("install: none"), "{}", yaml);
}
