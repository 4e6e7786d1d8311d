//! Eager aggregate validation
//!
//! Pure checks that run before a write transaction is opened, so rejected
//! writes never touch storage. Uniqueness checks need the database and live
//! in the writer, inside the transaction.

use crate::config::PortsConfig;
use crate::directives;
use crate::errors::{AppError, Result};

/// Parsed and validated load-balance lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBalance {
    pub ips: Vec<String>,
    pub weights: Vec<u32>,
}

impl ParsedBalance {
    /// Canonical comma-joined encoding of the IP list
    pub fn ip_list(&self) -> String {
        self.ips.join(",")
    }

    /// Canonical comma-joined encoding of the weight list
    pub fn weight_list(&self) -> String {
        self.weights
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn csv_entries(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect()
}

/// Validate the upstream IP list against its weight list: equal lengths,
/// at least one upstream, every weight a non-negative integer literal.
pub fn validate_balance(ip_list: &str, weight_list: &str) -> Result<ParsedBalance> {
    let ips = csv_entries(ip_list);
    let weight_tokens = csv_entries(weight_list);

    if ips.is_empty() {
        return Err(AppError::validation("upstream ip list cannot be empty"));
    }

    if ips.len() != weight_tokens.len() {
        return Err(AppError::WeightMismatch {
            ips: ips.len(),
            weights: weight_tokens.len(),
        });
    }

    let mut weights = Vec::with_capacity(weight_tokens.len());
    for token in &weight_tokens {
        let weight = token.parse::<u32>().map_err(|_| {
            AppError::validation(format!("weight `{}` is not a non-negative integer", token))
        })?;
        weights.push(weight);
    }

    Ok(ParsedBalance {
        ips: ips.into_iter().map(str::to_string).collect(),
        weights,
    })
}

/// Check a TCP/gRPC listener port against the administrative range
pub fn validate_port(port: i32, ports: &PortsConfig) -> Result<()> {
    if ports.contains(port) {
        Ok(())
    } else {
        Err(AppError::PortOutOfRange {
            port,
            start: ports.range_start,
            end: ports.range_end,
        })
    }
}

/// Parse-validate the rewrite and transfer directive lists of an HTTP rule.
/// Returns the canonical serialized forms for storage.
pub fn validate_http_directives(
    url_rewrite: &str,
    header_transfer: &str,
) -> Result<(String, String)> {
    let rewrites = directives::parse_rewrites(url_rewrite)?;
    let transfers = directives::parse_transfers(header_transfer)?;
    Ok((
        directives::serialize_rewrites(&rewrites),
        directives::serialize_transfers(&transfers),
    ))
}

/// Parse-validate a metadata transfer directive list, returning the
/// canonical serialized form
pub fn validate_metadata_transfer(metadata_transfer: &str) -> Result<String> {
    let transfers = directives::parse_transfers(metadata_transfer)?;
    Ok(directives::serialize_transfers(&transfers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn balance_accepts_matching_lists() {
        let parsed = validate_balance("10.0.0.1, 10.0.0.2", "50,50").unwrap();
        assert_eq!(parsed.ips.len(), 2);
        assert_eq!(parsed.weights, vec![50, 50]);
        assert_eq!(parsed.ip_list(), "10.0.0.1,10.0.0.2");
        assert_eq!(parsed.weight_list(), "50,50");
    }

    #[test]
    fn balance_rejects_length_mismatch() {
        let err = validate_balance("10.0.0.1,10.0.0.2,10.0.0.3", "10,10").unwrap_err();
        assert!(matches!(err, AppError::WeightMismatch { ips: 3, weights: 2 }));
    }

    #[test]
    fn balance_rejects_non_integer_weight() {
        assert!(validate_balance("10.0.0.1", "-1").is_err());
        assert!(validate_balance("10.0.0.1", "fifty").is_err());
        assert!(validate_balance("10.0.0.1", "1.5").is_err());
    }

    #[test]
    fn balance_rejects_empty_upstreams() {
        assert!(validate_balance("", "").is_err());
    }

    #[test]
    fn port_range_enforced() {
        let ports = AppConfig::default().ports;
        assert!(validate_port(8050, &ports).is_ok());
        assert!(matches!(
            validate_port(80, &ports).unwrap_err(),
            AppError::PortOutOfRange { port: 80, .. }
        ));
    }

    #[test]
    fn http_directives_canonicalized() {
        let (rewrites, transfers) =
            validate_http_directives("^/a(.*)   $1 , ^/b(.*) $1", "add  x-a  1").unwrap();
        assert_eq!(rewrites, "^/a(.*) $1,^/b(.*) $1");
        assert_eq!(transfers, "add x-a 1");
    }

    #[test]
    fn http_directives_propagate_parse_errors() {
        assert!(validate_http_directives("only-one-field", "").is_err());
        assert!(validate_http_directives("", "add x-a").is_err());
    }
}
