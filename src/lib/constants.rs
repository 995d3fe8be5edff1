pub const DEFAULT_CQL_PORT: u16 = 9042;

pub const USED_HOSTS_PER_REMOTE_DC: usize = 1;

pub const MAX_KEYSPACE_NAME_LEN: usize = 48;

pub const DEFAULT_CIPHER_SUITES: [&str; 2] =
    ["TLS_RSA_WITH_AES_128_CBC_SHA", "TLS_RSA_WITH_AES_256_CBC_SHA"];

pub const MIGRATION_LEDGER_TABLE: &str = "schema_migrations";

pub const HEALTH_CHECK_QUERY: &str = "SELECT release_version FROM system.local";

pub const ENV_CONFIG_FILE: &str = "CASSANDRA_CONFIG_FILE";
pub const ENV_KEYSPACE: &str = "CASSANDRA_KEYSPACE";
pub const ENV_ENDPOINTS: &str = "CASSANDRA_ENDPOINTS";
pub const ENV_USER: &str = "CASSANDRA_USER";
pub const ENV_PASSWORD: &str = "CASSANDRA_PASSWORD";
pub const ENV_TRUSTSTORE_PATH: &str = "CASSANDRA_TRUSTSTORE_PATH";
pub const ENV_TRUSTSTORE_PASSWORD: &str = "CASSANDRA_TRUSTSTORE_PASSWORD";
pub const ENV_KEYSTORE_PATH: &str = "CASSANDRA_KEYSTORE_PATH";
pub const ENV_KEYSTORE_PASSWORD: &str = "CASSANDRA_KEYSTORE_PASSWORD";
pub const ENV_AUTO_MIGRATE: &str = "CASSANDRA_AUTO_MIGRATE";
pub const ENV_MIGRATION_FILE: &str = "CASSANDRA_MIGRATION_FILE";
pub const ENV_MIGRATION_PATH: &str = "CASSANDRA_MIGRATION_PATH";
pub const ENV_DDL_KEYSPACE_FILE: &str = "CASSANDRA_DDL_KEYSPACE_FILE";
pub const ENV_LOCAL_DC: &str = "CASSANDRA_LOCAL_DC";
pub const ENV_CIPHER_SUITES: &str = "CASSANDRA_CIPHER_SUITES";
