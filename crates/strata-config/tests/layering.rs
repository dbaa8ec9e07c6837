//! End-to-end loading from files on disk.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_config::{
    Config, ConfigError, ConfigResult, EnvExpander, Loader, NodeError, RedactMode, Redactor,
    SecretMatcher, Validate,
};
use tempfile::TempDir;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Service {
    name: String,
    listen: String,
    #[serde(default)]
    upstreams: Vec<String>,
    database: Database,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Database {
    url: String,
    password: String,
    #[serde(default)]
    pool: u32,
}

impl Validate for Service {
    fn validate(&self) -> ConfigResult<()> {
        if self.database.pool == 0 {
            return Err(ConfigError::Validation {
                message: "database.pool must be positive".to_owned(),
            });
        }
        Ok(())
    }
}

const BASE: &str = "\
name: billing
listen: 127.0.0.1:8080
upstreams:
  - ledger
database:
  url: postgres://db.internal/billing
  password: changeme
  pool: 4
";

const PRODUCTION: &str = "\
listen: 0.0.0.0:443
upstreams:
  - audit
database:
  password: s3cr3t-prod
  pool: 32
";

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn overlays_files_in_order() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", BASE);
    let prod = write(&dir, "production.yaml", PRODUCTION);

    let config: Config<Service> = Config::from_files([&base, &prod]).unwrap();
    let service = config.get();

    assert_eq!(service.name, "billing");
    assert_eq!(service.listen, "0.0.0.0:443");
    assert_eq!(service.upstreams, vec!["ledger", "audit"]);
    assert_eq!(service.database.url, "postgres://db.internal/billing");
    assert_eq!(service.database.password, "s3cr3t-prod");
    assert_eq!(service.database.pool, 32);
}

#[test]
fn single_file_matches_trivial_overlay() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", BASE);
    let same = write(&dir, "same.yaml", "name: billing\n");

    let single: Config<Service> = Config::from_files([&base]).unwrap();
    let layered: Config<Service> = Config::from_files([&base, &same]).unwrap();
    assert_eq!(single.get(), layered.get());
}

#[test]
fn validation_sees_merged_value() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", BASE);
    let broken = write(&dir, "broken.yaml", "database:\n  pool: 0\n");

    let result = Loader::<Service>::new()
        .files([&base, &broken])
        .validated()
        .load();
    assert!(matches!(result, Err(ConfigError::Validation { .. })));

    let fine = Loader::<Service>::new().file(&base).validated().load();
    assert!(fine.is_ok());
}

#[test]
fn expands_environment_references() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", BASE);
    let templated = write(
        &dir,
        "templated.yaml",
        "database:\n  password: ${DB_PASSWORD:?DB_PASSWORD must be set}\n",
    );

    let vars = HashMap::from([("DB_PASSWORD".to_owned(), "from-env".to_owned())]);
    let config = Loader::<Service>::new()
        .files([&base, &templated])
        .preprocessor(EnvExpander::new(vars))
        .load()
        .unwrap();
    assert_eq!(config.get().database.password, "from-env");

    let missing = Loader::<Service>::new()
        .files([&base, &templated])
        .preprocessor(EnvExpander::new(HashMap::new()))
        .load();
    assert!(matches!(
        missing,
        Err(ConfigError::Template { ref var, .. }) if var == "DB_PASSWORD"
    ));
}

#[test]
fn writes_redacted_copy() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", BASE);
    let prod = write(&dir, "production.yaml", PRODUCTION);
    let config: Config<Service> = Config::from_files([&base, &prod]).unwrap();

    let collapsed = config.to_string_redacted(&Redactor::default()).unwrap();
    assert!(collapsed.contains("password: '***********'"));
    assert!(!collapsed.contains("s3cr3t-prod"));
    assert!(collapsed.contains("url: postgres://db.internal/billing"));

    let matcher = SecretMatcher::from_keywords(["database"]).unwrap();
    let preserved = config
        .to_string_redacted(&Redactor::new(matcher, RedactMode::Preserve))
        .unwrap();
    assert!(preserved.contains("password: '***********'"));
    assert!(preserved.contains("pool: '**'"));
    assert!(preserved.contains("name: billing"));
}

#[test]
fn round_trips_through_a_file() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", BASE);
    let config: Config<Service> = Config::from_files([&base]).unwrap();

    let out = dir.path().join("out.yaml");
    config.to_file(&out).unwrap();
    let reloaded: Config<Service> = Config::from_files([&out]).unwrap();
    assert_eq!(reloaded.get(), config.get());
}

#[test]
fn reports_missing_and_empty_files() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", BASE);
    let empty = write(&dir, "empty.yaml", "# placeholder\n");

    let missing = Config::<Service>::from_files([dir.path().join("absent.yaml")]);
    assert!(matches!(missing, Err(ConfigError::ReadError { .. })));

    let blank = Config::<Service>::from_files([&base, &empty]);
    assert!(matches!(blank, Err(ConfigError::EmptySource { .. })));
}

#[derive(Debug, PartialEq, Deserialize)]
struct Pools {
    defaults: Pool,
    primary: Pool,
    replica: Pool,
}

#[derive(Debug, PartialEq, Deserialize)]
struct Pool {
    size: u32,
    #[serde(default)]
    timeout: u32,
}

#[test]
fn aliases_see_overlaid_anchor() {
    let dir = TempDir::new().unwrap();
    let base = write(
        &dir,
        "base.yaml",
        "defaults: &pool\n  size: 4\nprimary: *pool\nreplica: *pool\n",
    );
    let tuned = write(&dir, "tuned.yaml", "defaults:\n  size: 16\n  timeout: 30\n");

    let config: Config<Pools> = Config::from_files([&base, &tuned]).unwrap();
    let pools = config.get();
    assert_eq!(pools.primary, Pool { size: 16, timeout: 30 });
    assert_eq!(pools.replica, pools.defaults);

    let tree = Loader::<Pools>::new().files([&base, &tuned]).tree().unwrap();
    assert_eq!(
        tree.borrow().to_string(),
        "{defaults: &pool {size: 16, timeout: 30}, primary: *pool, replica: *pool}"
    );
}

#[test]
fn conflicting_anchors_name_the_overlay() {
    let dir = TempDir::new().unwrap();
    let base = write(&dir, "base.yaml", "defaults: &pool\n  size: 4\n");
    let other = write(&dir, "other.yaml", "defaults: &limits\n  size: 8\n");

    let (source_name, index, source) =
        match Config::<serde_yaml::Value>::from_files([&base, &other]) {
            Err(ConfigError::Merge {
                source_name,
                index,
                source,
            }) => (source_name, index, source),
            result => panic!("expected a merge error, got {result:?}"),
        };
    assert!(source_name.ends_with("other.yaml"));
    assert_eq!(index, 1);
    assert_eq!(
        source,
        NodeError::UnequalAnchors {
            left: "pool".to_owned(),
            right: "limits".to_owned(),
        }
    );
}
