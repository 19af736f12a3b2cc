use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use std::error::Error;
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum DbSetupError {
    #[error("bad password variable: expected POSTGRES_PASSWORD, got {0}")]
    BadPwVariable(String),
    #[error("no password variable: expected POSTGRES_PASSWORD")]
    NoPwVariable,
}

/// Parses the `POSTGRES_PASSWORD=...` line of a password file.
fn parse_password(contents: &str) -> Result<&str, DbSetupError> {
    match contents.trim().split_once('=') {
        Some(("POSTGRES_PASSWORD", password)) => Ok(password),
        Some((other, _)) => Err(DbSetupError::BadPwVariable(other.to_owned())),
        None => Err(DbSetupError::NoPwVariable),
    }
}

/// Sets up the database connection pool
///
/// This function reads the environment variables for the database connection and sets up the
/// connection pool, then runs any migrations that are needed.
///
/// # Returns
/// `Ok(Pool<Postgres>)` if the connection is successful, or an error if not.
///
/// # Errors
/// This function will return an error if:
/// - The environment variables are not set
/// - The password file cannot be read
/// - The connection to the database cannot be established
/// - The migrations cannot be run
pub async fn db_setup() -> Result<Pool<Postgres>, Box<dyn Error>> {
    use std::env::var;
    use std::fs;

    let pg_user = var("PG_USER")?;
    let password_file = var("PG_PASSWORDFILE")?;
    let password_var = fs::read_to_string(password_file)?;
    let password = parse_password(&password_var)?;
    let pg_host = var("PG_HOST")?;
    let pg_port = var("PG_PORT")?;
    let pg_dbname = var("PG_DBNAME")?;

    let connection = db_connect(&pg_user, password, &pg_host, &pg_port, &pg_dbname).await?;
    info!("Running migrations if any are needed");
    sqlx::migrate!().run(&connection).await?;

    Ok(connection)
}

/// Connects to the database
///
/// # Parameters
/// - `pg_user`: The username for the database
/// - `password`: The password for the database
/// - `pg_host`: The hostname for the database
/// - `pg_port`: The port the database listens on
/// - `pg_dbname`: The name of the database
///
/// # Errors
/// This function will return an error if the connection to the database cannot be established.
async fn db_connect(
    pg_user: &str,
    password: &str,
    pg_host: &str,
    pg_port: &str,
    pg_dbname: &str,
) -> Result<Pool<Postgres>, sqlx::Error> {
    let url = format!(
        "postgresql://{}:{}@{}:{}/{}",
        pg_user,
        password.trim(),
        pg_host,
        pg_port,
        pg_dbname,
    );
    let url_without_pw = format!("postgresql://{pg_user}:REDACTED@{pg_host}:{pg_port}/{pg_dbname}");
    info!("Attempting Connection to: {}", url_without_pw);

    PgPoolOptions::new().max_connections(10).connect(&url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_file_parsing() {
        assert_eq!(parse_password("POSTGRES_PASSWORD=s3cret\n").unwrap(), "s3cret");
        assert!(matches!(
            parse_password("PASSWORD=s3cret"),
            Err(DbSetupError::BadPwVariable(name)) if name == "PASSWORD"
        ));
        assert!(matches!(parse_password("s3cret"), Err(DbSetupError::NoPwVariable)));
    }
}
