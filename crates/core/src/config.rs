use crate::error::ConfigError;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::{Path, PathBuf};

pub const DEFAULT_INDEX_NAME: &str = "rag_documents";
pub const DEFAULT_DOCS_FOLDER: &str = "./fixed_documents";
pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Runtime configuration, resolved once at startup from the environment and
/// passed by reference to every pipeline stage.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
    pub docs_folder: PathBuf,
    /// Optional owner id stamped on every preloaded document.
    pub user_id: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Config {
    /// Resolves config from `ELASTIC_URL`/`ELASTIC_CLOUD_ID`, `ELASTIC_API_KEY`,
    /// and the optional tuning variables. Fails before any network call when a
    /// required credential is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same resolution against an arbitrary variable source, so tests do not
    /// have to mutate the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = match optional_var(&lookup, "ELASTIC_URL") {
            Some(endpoint) => endpoint,
            None => {
                let cloud_id = optional_var(&lookup, "ELASTIC_CLOUD_ID")
                    .ok_or(ConfigError::MissingVar("ELASTIC_URL or ELASTIC_CLOUD_ID"))?;
                endpoint_from_cloud_id(&cloud_id)?
            }
        };

        url::Url::parse(&endpoint).map_err(|error| ConfigError::InvalidVar {
            name: "ELASTIC_URL",
            details: error.to_string(),
        })?;

        let api_key = optional_var(&lookup, "ELASTIC_API_KEY")
            .ok_or(ConfigError::MissingVar("ELASTIC_API_KEY"))?;

        let chunk_size = parsed_var(&lookup, "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = parsed_var(&lookup, "CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidVar {
                name: "CHUNK_OVERLAP",
                details: format!("overlap {chunk_overlap} must be smaller than chunk size {chunk_size}"),
            });
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            index_name: optional_var(&lookup, "ELASTIC_INDEX")
                .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            docs_folder: PathBuf::from(
                optional_var(&lookup, "DOCS_FOLDER")
                    .unwrap_or_else(|| DEFAULT_DOCS_FOLDER.to_string()),
            ),
            user_id: optional_var(&lookup, "PRELOAD_USER_ID"),
            chunk_size,
            chunk_overlap,
            batch_size: parsed_var(&lookup, "BULK_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
        })
    }
}

/// Checks that the scan root exists before any model loading or network
/// setup happens.
pub fn ensure_folder(folder: &Path) -> Result<(), ConfigError> {
    if folder.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingFolder(folder.display().to_string()))
    }
}

fn optional_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn parsed_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match optional_var(lookup, name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
            name,
            details: format!("expected an integer, got {raw:?}"),
        }),
    }
}

/// Decodes an Elastic Cloud deployment id into an HTTPS endpoint.
///
/// The id has the shape `deployment-name:base64(host$es-uuid$kibana-uuid)`;
/// the search endpoint is `https://{es-uuid}.{host}`, with an optional
/// `:port` suffix carried over from the host segment.
pub fn endpoint_from_cloud_id(cloud_id: &str) -> Result<String, ConfigError> {
    let invalid = |details: String| ConfigError::InvalidVar {
        name: "ELASTIC_CLOUD_ID",
        details,
    };

    let (_, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| invalid("expected deployment-name:base64-payload".to_string()))?;

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|error| invalid(format!("payload is not base64: {error}")))?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| invalid("payload is not utf-8".to_string()))?;

    let mut segments = decoded.split('$');
    let host = segments
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| invalid("payload missing host segment".to_string()))?;
    let es_uuid = segments
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| invalid("payload missing elasticsearch segment".to_string()))?;

    Ok(match host.split_once(':') {
        Some((hostname, port)) => format!("https://{es_uuid}.{hostname}:{port}"),
        None => format!("https://{es_uuid}.{host}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn cloud_id(host_payload: &str) -> String {
        format!("my-deployment:{}", STANDARD.encode(host_payload))
    }

    #[test]
    fn cloud_id_decodes_to_endpoint() {
        let id = cloud_id("eu-west-1.aws.found.io$abc123$kib456");
        let endpoint = endpoint_from_cloud_id(&id).unwrap();
        assert_eq!(endpoint, "https://abc123.eu-west-1.aws.found.io");
    }

    #[test]
    fn cloud_id_keeps_custom_port() {
        let id = cloud_id("cloud.example.com:9243$esnode$kib");
        let endpoint = endpoint_from_cloud_id(&id).unwrap();
        assert_eq!(endpoint, "https://esnode.cloud.example.com:9243");
    }

    #[test]
    fn malformed_cloud_ids_are_rejected() {
        assert!(endpoint_from_cloud_id("no-separator").is_err());
        assert!(endpoint_from_cloud_id("name:!!not-base64!!").is_err());
        let missing_es = cloud_id("host.only");
        assert!(endpoint_from_cloud_id(&missing_es).is_err());
    }

    #[test]
    fn endpoint_or_cloud_id_is_required() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[])),
            Err(ConfigError::MissingVar("ELASTIC_URL or ELASTIC_CLOUD_ID"))
        ));
    }

    #[test]
    fn api_key_is_required() {
        let lookup = lookup_from(&[("ELASTIC_URL", "http://localhost:9200")]);
        assert!(matches!(
            Config::from_lookup(lookup),
            Err(ConfigError::MissingVar("ELASTIC_API_KEY"))
        ));
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let lookup = lookup_from(&[
            ("ELASTIC_URL", "http://localhost:9200"),
            ("ELASTIC_API_KEY", "secret"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]);
        assert!(matches!(
            Config::from_lookup(lookup),
            Err(ConfigError::InvalidVar {
                name: "CHUNK_OVERLAP",
                ..
            })
        ));
    }

    #[test]
    fn non_numeric_tuning_values_are_rejected() {
        let lookup = lookup_from(&[
            ("ELASTIC_URL", "http://localhost:9200"),
            ("ELASTIC_API_KEY", "secret"),
            ("BULK_BATCH_SIZE", "lots"),
        ]);
        assert!(matches!(
            Config::from_lookup(lookup),
            Err(ConfigError::InvalidVar {
                name: "BULK_BATCH_SIZE",
                ..
            })
        ));
    }

    #[test]
    fn url_takes_precedence_and_defaults_fill_in() {
        let config = Config::from_lookup(lookup_from(&[
            ("ELASTIC_URL", "http://localhost:9200/"),
            ("ELASTIC_API_KEY", "secret"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "10"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://localhost:9200");
        assert_eq!(config.index_name, DEFAULT_INDEX_NAME);
        assert_eq!(config.docs_folder, PathBuf::from(DEFAULT_DOCS_FOLDER));
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.chunk_overlap, 10);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.user_id.is_none());
    }

    #[test]
    fn cloud_id_is_used_when_no_url_is_set() {
        let id = cloud_id("eu-west-1.aws.found.io$abc123$kib456");
        let config = Config::from_lookup(lookup_from(&[
            ("ELASTIC_CLOUD_ID", id.as_str()),
            ("ELASTIC_API_KEY", "secret"),
            ("PRELOAD_USER_ID", "owner-1"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "https://abc123.eu-west-1.aws.found.io");
        assert_eq!(config.user_id.as_deref(), Some("owner-1"));
    }
}
