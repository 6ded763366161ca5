//! Run configuration: query parameters from `.env` / environment, with CLI overrides.

use thiserror::Error;

use crate::domain::QueryParameters;

pub const ENV_ENTITY_ID: &str = "CNPJ_ENTIDADE";
pub const ENV_REGION: &str = "UF_ENTIDADE";
pub const ENV_YEAR: &str = "ANO_CONSULTA";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {} (set them in .env or pass --cnpj/--uf/--ano)", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid year '{0}': expected a four-digit year")]
    InvalidYear(String),
}

/// Values given on the command line; each one wins over its environment variable.
#[derive(Debug, Clone, Default)]
pub struct QueryOverrides {
    pub entity_id: Option<String>,
    pub region: Option<String>,
    pub year: Option<String>,
}

/// Resolve the query from `.env`, the process environment and CLI overrides.
pub fn resolve_query(overrides: &QueryOverrides) -> Result<QueryParameters, ConfigError> {
    dotenvy::dotenv().ok();
    resolve_query_with(overrides, |key| std::env::var(key).ok())
}

/// Same as [`resolve_query`] with an explicit variable lookup.
pub fn resolve_query_with<F>(overrides: &QueryOverrides, lookup: F) -> Result<QueryParameters, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |over: &Option<String>, key: &str| -> Option<String> {
        over.clone()
            .or_else(|| lookup(key))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let entity_id = pick(&overrides.entity_id, ENV_ENTITY_ID);
    let region = pick(&overrides.region, ENV_REGION);
    let year = pick(&overrides.year, ENV_YEAR);

    let mut missing = Vec::new();
    if entity_id.is_none() {
        missing.push(ENV_ENTITY_ID);
    }
    if region.is_none() {
        missing.push(ENV_REGION);
    }
    if year.is_none() {
        missing.push(ENV_YEAR);
    }

    let (Some(entity_id), Some(region), Some(year)) = (entity_id, region, year) else {
        return Err(ConfigError::Missing(missing));
    };

    let year_num = year
        .parse::<i32>()
        .ok()
        .filter(|y| (1000..=9999).contains(y))
        .ok_or_else(|| ConfigError::InvalidYear(year.clone()))?;

    Ok(QueryParameters {
        entity_id,
        region: region.to_uppercase(),
        year: year_num,
    })
}
