/// Where to find the PostgreSQL server.
///
/// The URL is resolved once at startup (CLI flag, `PLANVAULT_DATABASE_URL`,
/// or the config file — see the cli crate's resolution chain) and threaded
/// through explicitly; nothing in this crate reads the environment.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// The connection URL used when nothing else is configured.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/planvault";

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// The database name: the path component of the URL.
    ///
    /// `None` if the URL has no path component.
    pub fn database_name(&self) -> Option<&str> {
        let (_, name) = self.database_url.rsplit_once('/')?;
        (!name.is_empty()).then_some(name)
    }

    /// URL of the `postgres` maintenance database on the same server.
    ///
    /// Used to issue `CREATE DATABASE` before the target database exists,
    /// and by the test harness to drop throwaway databases.
    pub fn maintenance_url(&self) -> String {
        match self.database_url.rsplit_once('/') {
            Some((server, _)) => format!("{server}/postgres"),
            None => self.database_url.clone(),
        }
    }
}
