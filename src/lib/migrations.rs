use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use scylla::client::session::Session;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::constants::MIGRATION_LEDGER_TABLE;
use crate::error::MigrationError;

/// Everything a migrator needs besides the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationParameters {
    pub keyspace: String,
    /// Changelog listing scripts in apply order.
    pub changelog: PathBuf,
    /// Base directory for script paths; defaults to the changelog's directory.
    pub scripts_dir: Option<PathBuf>,
}

impl MigrationParameters {
    pub fn scripts_dir(&self) -> PathBuf {
        match &self.scripts_dir {
            Some(dir) => dir.clone(),
            None => self
                .changelog
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

/// Applies pending schema migrations against an open session.
pub trait Migrator<S>: Send + Sync {
    fn run(
        &self,
        session: &S,
        parameters: MigrationParameters,
    ) -> impl Future<Output = Result<MigrationReport, MigrationError>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub name: String,
    pub checksum: String,
    pub statements: Vec<String>,
}

impl MigrationScript {
    pub fn from_source(name: impl Into<String>, source: &str) -> Self {
        Self {
            name: name.into(),
            checksum: checksum(source),
            statements: split_statements(source),
        }
    }
}

/// Scripts named by a changelog, read and hashed before anything touches the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub scripts: Vec<MigrationScript>,
}

impl MigrationPlan {
    pub fn load(parameters: &MigrationParameters) -> Result<Self, MigrationError> {
        let changelog = fs::read_to_string(&parameters.changelog).map_err(|source| {
            MigrationError::Changelog {
                path: parameters.changelog.clone(),
                source,
            }
        })?;

        let scripts_dir = parameters.scripts_dir();
        let scripts = changelog_entries(&changelog)
            .map(|entry| {
                let path = scripts_dir.join(entry);
                let source = fs::read_to_string(&path)
                    .map_err(|source| MigrationError::Script { path, source })?;
                Ok::<_, MigrationError>(MigrationScript::from_source(entry, &source))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { scripts })
    }

    /// Scripts not yet in the ledger. A recorded script whose checksum changed is an error.
    pub fn pending(
        &self,
        ledger: &HashMap<String, String>,
    ) -> Result<(Vec<&MigrationScript>, Vec<&MigrationScript>), MigrationError> {
        let mut pending = Vec::new();
        let mut skipped = Vec::new();

        for script in &self.scripts {
            match ledger.get(&script.name) {
                Some(recorded) if *recorded == script.checksum => skipped.push(script),
                Some(recorded) => {
                    return Err(MigrationError::ChecksumMismatch {
                        name: script.name.clone(),
                        recorded: recorded.clone(),
                        actual: script.checksum.clone(),
                    });
                }
                None => pending.push(script),
            }
        }

        Ok((pending, skipped))
    }
}

/// Runs CQL scripts listed in a changelog and records them in a ledger table.
#[derive(Debug, Clone, Default)]
pub struct CqlMigrationRunner;

impl CqlMigrationRunner {
    pub fn new() -> Self {
        Self
    }

    async fn ensure_ledger(&self, session: &Session, keyspace: &str) -> Result<(), MigrationError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.{} (name text PRIMARY KEY, checksum text, applied_at bigint)",
            keyspace, MIGRATION_LEDGER_TABLE
        );
        session
            .query_unpaged(query, &[])
            .await
            .map_err(MigrationError::execution)?;
        Ok(())
    }

    async fn read_ledger(
        &self,
        session: &Session,
        keyspace: &str,
    ) -> Result<HashMap<String, String>, MigrationError> {
        let query = format!(
            "SELECT name, checksum FROM {}.{}",
            keyspace, MIGRATION_LEDGER_TABLE
        );
        let result = session
            .query_unpaged(query, &[])
            .await
            .map_err(MigrationError::execution)?;

        let rows_result = result.into_rows_result().map_err(MigrationError::execution)?;
        let mut ledger = HashMap::new();
        for row in rows_result
            .rows::<(String, String)>()
            .map_err(MigrationError::execution)?
        {
            let (name, checksum) = row.map_err(MigrationError::execution)?;
            ledger.insert(name, checksum);
        }

        Ok(ledger)
    }

    async fn apply(
        &self,
        session: &Session,
        keyspace: &str,
        script: &MigrationScript,
    ) -> Result<(), MigrationError> {
        debug!("Running migration: {}", script.name);

        for statement in &script.statements {
            debug!("Executing: {}", statement);
            session
                .query_unpaged(statement.as_str(), &[])
                .await
                .map_err(MigrationError::execution)?;
        }

        let query = format!(
            "INSERT INTO {}.{} (name, checksum, applied_at) VALUES (?, ?, ?)",
            keyspace, MIGRATION_LEDGER_TABLE
        );
        let now = chrono::Utc::now().timestamp_millis();
        session
            .query_unpaged(query, (&script.name, &script.checksum, now))
            .await
            .map_err(MigrationError::execution)?;

        debug!("Completed migration: {}", script.name);
        Ok(())
    }
}

impl Migrator<Session> for CqlMigrationRunner {
    async fn run(
        &self,
        session: &Session,
        parameters: MigrationParameters,
    ) -> Result<MigrationReport, MigrationError> {
        info!("Auto migrating keyspace {}", parameters.keyspace);

        let plan = MigrationPlan::load(&parameters)?;
        let keyspace = parameters.keyspace.as_str();

        self.ensure_ledger(session, keyspace).await?;
        let ledger = self.read_ledger(session, keyspace).await?;
        let (pending, skipped) = plan.pending(&ledger)?;

        let mut report = MigrationReport {
            applied: Vec::with_capacity(pending.len()),
            skipped: skipped.iter().map(|s| s.name.clone()).collect(),
        };

        for script in pending {
            self.apply(session, keyspace, script).await?;
            report.applied.push(script.name.clone());
        }

        info!(
            "Executed {} migrations, {} already applied",
            report.applied.len(),
            report.skipped.len()
        );

        Ok(report)
    }
}

/// Runs every statement of a CQL file, in order, without ledger bookkeeping.
pub async fn run_cql_file(session: &Session, path: &Path) -> Result<usize, MigrationError> {
    let source = fs::read_to_string(path).map_err(|source| MigrationError::Script {
        path: path.to_path_buf(),
        source,
    })?;

    let statements = split_statements(&source);
    for statement in &statements {
        debug!("Executing: {}", statement);
        session
            .query_unpaged(statement.as_str(), &[])
            .await
            .map_err(MigrationError::execution)?;
    }

    Ok(statements.len())
}

pub fn changelog_entries(changelog: &str) -> impl Iterator<Item = &str> {
    changelog
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("--"))
}

pub fn split_statements(source: &str) -> Vec<String> {
    let cleaned_content = source
        .lines()
        .filter(|line| !line.trim().starts_with("--") && !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    cleaned_content
        .split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn checksum(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CREATE_DEVICES: &str = "-- devices\nCREATE TABLE devices (\n  id uuid PRIMARY KEY,\n  name text\n);\n\nCREATE INDEX ON devices (name);\n";

    fn params(changelog: PathBuf) -> MigrationParameters {
        MigrationParameters {
            keyspace: "iot".into(),
            changelog,
            scripts_dir: None,
        }
    }

    #[test]
    fn test_split_statements() {
        let statements = split_statements(CREATE_DEVICES);
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE devices (   id uuid PRIMARY KEY,   name text )",
                "CREATE INDEX ON devices (name)",
            ]
        );
    }

    #[test]
    fn test_changelog_skips_comments_and_blanks() {
        let entries: Vec<&str> =
            changelog_entries("# schema\n001_devices.cql\n\n-- old\n  002_events.cql  \n").collect();
        assert_eq!(entries, vec!["001_devices.cql", "002_events.cql"]);
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(checksum("a"), checksum("b"));
    }

    #[test]
    fn test_plan_loads_scripts_relative_to_changelog() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("001_devices.cql"), CREATE_DEVICES).unwrap();
        fs::write(
            dir.path().join("002_events.cql"),
            "CREATE TABLE events (id timeuuid PRIMARY KEY);",
        )
        .unwrap();
        let changelog = dir.path().join("changelog.txt");
        fs::write(&changelog, "001_devices.cql\n002_events.cql\n").unwrap();

        let plan = MigrationPlan::load(&params(changelog)).unwrap();
        let names: Vec<&str> = plan.scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["001_devices.cql", "002_events.cql"]);
        assert_eq!(plan.scripts[0].statements.len(), 2);
        assert_eq!(plan.scripts[0].checksum, checksum(CREATE_DEVICES));
    }

    #[test]
    fn test_plan_uses_explicit_scripts_dir() {
        let dir = tempdir().unwrap();
        let scripts = dir.path().join("cql");
        fs::create_dir(&scripts).unwrap();
        fs::write(scripts.join("001_devices.cql"), CREATE_DEVICES).unwrap();
        let changelog = dir.path().join("changelog.txt");
        fs::write(&changelog, "001_devices.cql\n").unwrap();

        let mut parameters = params(changelog);
        parameters.scripts_dir = Some(scripts.clone());
        assert_eq!(parameters.scripts_dir(), scripts);
        assert_eq!(MigrationPlan::load(&parameters).unwrap().scripts.len(), 1);
    }

    #[test]
    fn test_unreadable_changelog_and_script() {
        let dir = tempdir().unwrap();

        let err = MigrationPlan::load(&params(dir.path().join("missing.txt"))).unwrap_err();
        assert!(matches!(err, MigrationError::Changelog { .. }));

        let changelog = dir.path().join("changelog.txt");
        fs::write(&changelog, "001_missing.cql\n").unwrap();
        let err = MigrationPlan::load(&params(changelog)).unwrap_err();
        assert!(matches!(err, MigrationError::Script { .. }));
    }

    #[test]
    fn test_bundled_changelog_loads() {
        let changelog = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations/changelog.txt");
        let plan = MigrationPlan::load(&params(changelog)).unwrap();
        let names: Vec<&str> = plan.scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["001_devices.cql", "002_device_events.cql"]);
        assert!(plan.scripts.iter().all(|s| s.statements.len() == 1));
    }

    #[test]
    fn test_pending_skips_applied_and_rejects_edits() {
        let plan = MigrationPlan {
            scripts: vec![
                MigrationScript::from_source("001_devices.cql", CREATE_DEVICES),
                MigrationScript::from_source("002_events.cql", "CREATE TABLE events (id int PRIMARY KEY);"),
            ],
        };

        let mut ledger = HashMap::new();
        let (pending, skipped) = plan.pending(&ledger).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(skipped.is_empty());

        ledger.insert("001_devices.cql".to_string(), checksum(CREATE_DEVICES));
        let (pending, skipped) = plan.pending(&ledger).unwrap();
        assert_eq!(pending[0].name, "002_events.cql");
        assert_eq!(skipped[0].name, "001_devices.cql");

        ledger.insert("002_events.cql".to_string(), checksum("something else"));
        assert!(matches!(
            plan.pending(&ledger),
            Err(MigrationError::ChecksumMismatch { .. })
        ));
    }
}
