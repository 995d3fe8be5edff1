use scylla::client::session::Session;

use crate::constants::HEALTH_CHECK_QUERY;
use crate::error::BootstrapError;

/// Round-trips a query to the coordinator and returns its release version.
pub async fn health_check(session: &Session) -> Result<String, BootstrapError> {
    let result = session
        .query_unpaged(HEALTH_CHECK_QUERY, &[])
        .await
        .map_err(BootstrapError::connection)?;

    let rows_result = result.into_rows_result().map_err(BootstrapError::connection)?;
    let (release_version,) = rows_result
        .single_row::<(String,)>()
        .map_err(BootstrapError::connection)?;

    Ok(release_version)
}
