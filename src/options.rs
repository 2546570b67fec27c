//! Options resolver: raw flag values + environment → validated runtime
//! configuration.
//!
//! Resolution validates everything up front so malformed input is rejected
//! before any program is loaded. The resolver has no side effects beyond
//! environment inspection and opening the event sink target, and may be
//! called repeatedly without observable state changes.

use crate::auth::{Authorizer, TerminalAuthorizer};
use crate::config::{ApiConfig, CacheOptions, Config};
use crate::error::ConfigError;
use crate::events::EventSink;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Ephemeral daemon port range, parsed from `"<start>[-<end>]"`.
///
/// An absent end parses as zero, meaning "unbounded/any".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn parse(raw: &str) -> Result<PortRange, ConfigError> {
        let bad = || ConfigError::InvalidPortRange(raw.to_string());
        let (start_text, end_text) = match raw.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (raw, None),
        };
        let start: u16 = start_text.trim().parse().map_err(|_| bad())?;
        let end: u16 = match end_text {
            Some(text) => text.trim().parse().map_err(|_| bad())?,
            None => 0,
        };
        if end != 0 && end < start {
            return Err(bad());
        }
        Ok(PortRange { start, end })
    }
}

/// One `--credential-override` entry: `<tool-ref>:<KEY>=<value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialOverride {
    pub tool_ref: String,
    pub key: String,
    pub value: String,
}

impl CredentialOverride {
    pub fn parse(raw: &str) -> Result<CredentialOverride, ConfigError> {
        let bad = || {
            ConfigError::Invalid(format!(
                "credential override must look like tool:KEY=value, got {raw}"
            ))
        };
        let (tool_ref, assignment) = raw.split_once(':').ok_or_else(bad)?;
        let (key, value) = assignment.split_once('=').ok_or_else(bad)?;
        if tool_ref.is_empty() || key.is_empty() {
            return Err(bad());
        }
        Ok(CredentialOverride {
            tool_ref: tool_ref.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Raw per-invocation flag values consumed by [`resolve`].
///
/// The CLI layer maps clap output into this shape so the resolver stays
/// independent of the argument parser.
#[derive(Debug, Clone, Default)]
pub struct OptionsInput {
    pub confirm: bool,
    pub quiet: Option<bool>,
    pub ports: Option<String>,
    pub events_stream_to: Option<String>,
    pub credential_context: String,
    pub credential_overrides: Vec<String>,
    pub workspace: Option<String>,
    pub listen_address: Option<String>,
    pub disable_cache: bool,
    pub cache_dir: Option<String>,
}

/// Validated runtime configuration. Created once per invocation; immutable
/// thereafter.
#[derive(Clone)]
pub struct RuntimeOptions {
    pub api: ApiConfig,
    pub cache: CacheOptions,
    pub credential_context: String,
    pub credential_overrides: Vec<CredentialOverride>,
    pub ports: PortRange,
    pub event_sink: Option<EventSink>,
    /// `KEY=VALUE` snapshot of the process environment, passed explicitly to
    /// every collaborator instead of being re-read later.
    pub env: Vec<String>,
    pub workspace: Option<PathBuf>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    pub quiet: bool,
    pub listen_address: String,
    pub color: bool,
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("credential_context", &self.credential_context)
            .field("ports", &self.ports)
            .field("quiet", &self.quiet)
            .field("listen_address", &self.listen_address)
            .field("has_authorizer", &self.authorizer.is_some())
            .field("has_event_sink", &self.event_sink.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolve flags + environment into a validated [`RuntimeOptions`].
pub fn resolve(input: &OptionsInput, config: &Config) -> Result<RuntimeOptions, ConfigError> {
    let ports = match input.ports.as_deref() {
        Some(raw) if !raw.is_empty() => PortRange::parse(raw)?,
        _ => PortRange::default(),
    };

    let credential_overrides = input
        .credential_overrides
        .iter()
        .map(|raw| CredentialOverride::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let event_sink = match input.events_stream_to.as_deref() {
        Some(target) if !target.is_empty() => Some(EventSink::open(target)?),
        _ => None,
    };

    let authorizer: Option<Arc<dyn Authorizer>> = input
        .confirm
        .then(|| Arc::new(TerminalAuthorizer) as Arc<dyn Authorizer>);

    let mut cache = config.cache.clone();
    if input.disable_cache {
        cache.disabled = true;
    }
    if let Some(dir) = input.cache_dir.as_deref() {
        cache.dir = PathBuf::from(dir);
    }

    Ok(RuntimeOptions {
        api: config.api.clone(),
        cache,
        credential_context: if input.credential_context.is_empty() {
            "default".to_string()
        } else {
            input.credential_context.clone()
        },
        credential_overrides,
        ports,
        event_sink,
        env: env::vars().map(|(k, v)| format!("{k}={v}")).collect(),
        workspace: input.workspace.as_deref().map(PathBuf::from),
        authorizer,
        quiet: input.quiet.unwrap_or(false),
        listen_address: input
            .listen_address
            .clone()
            .unwrap_or_else(|| config.listen_address.clone()),
        color: config.color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_range_single_bound_defaults_end_to_zero() {
        assert_eq!(
            PortRange::parse("11000").expect("parse"),
            PortRange {
                start: 11000,
                end: 0
            }
        );
    }

    #[test]
    fn port_range_both_bounds() {
        assert_eq!(
            PortRange::parse("11000-12000").expect("parse"),
            PortRange {
                start: 11000,
                end: 12000
            }
        );
    }

    #[test]
    fn port_range_tolerates_whitespace() {
        assert_eq!(
            PortRange::parse(" 8000 - 9000 ").expect("parse"),
            PortRange {
                start: 8000,
                end: 9000
            }
        );
    }

    #[test]
    fn port_range_rejects_garbage_start() {
        for raw in ["abc", "abc-100", "-100", ""] {
            let err = PortRange::parse(raw).unwrap_err();
            assert!(err.to_string().contains(raw), "raw {raw:?} got: {err}");
        }
    }

    #[test]
    fn port_range_rejects_garbage_end() {
        let err = PortRange::parse("100-xyz").unwrap_err();
        assert_eq!(err.to_string(), "invalid port range: 100-xyz");
    }

    #[test]
    fn port_range_rejects_end_below_start() {
        let err = PortRange::parse("9000-8000").unwrap_err();
        assert_eq!(err.to_string(), "invalid port range: 9000-8000");
    }

    #[test]
    fn credential_override_parses_tool_key_value() {
        let parsed = CredentialOverride::parse("example.com/cred-tool:API_TOKEN=1234")
            .expect("parse override");
        assert_eq!(parsed.tool_ref, "example.com/cred-tool");
        assert_eq!(parsed.key, "API_TOKEN");
        assert_eq!(parsed.value, "1234");
    }

    #[test]
    fn credential_override_rejects_missing_assignment() {
        assert!(CredentialOverride::parse("example.com/cred-tool").is_err());
        assert!(CredentialOverride::parse(":KEY=v").is_err());
    }

    #[test]
    fn resolve_is_idempotent() {
        let input = OptionsInput {
            ports: Some("11000-12000".into()),
            credential_context: "staging".into(),
            ..OptionsInput::default()
        };
        let config = Config::default();
        let first = resolve(&input, &config).expect("resolve");
        let second = resolve(&input, &config).expect("resolve again");
        assert_eq!(first.ports, second.ports);
        assert_eq!(first.credential_context, second.credential_context);
        assert_eq!(first.listen_address, second.listen_address);
    }

    #[test]
    fn resolve_rejects_bad_port_range_before_anything_else() {
        let input = OptionsInput {
            ports: Some("nope".into()),
            ..OptionsInput::default()
        };
        let err = resolve(&input, &Config::default()).unwrap_err();
        assert_eq!(err.to_string(), "invalid port range: nope");
    }

    #[test]
    fn resolve_installs_authorizer_only_when_confirm_set() {
        let config = Config::default();
        let without = resolve(&OptionsInput::default(), &config).expect("resolve");
        assert!(without.authorizer.is_none());

        let with = resolve(
            &OptionsInput {
                confirm: true,
                ..OptionsInput::default()
            },
            &config,
        )
        .expect("resolve");
        assert!(with.authorizer.is_some());
    }

    #[test]
    fn resolve_defaults_credential_context() {
        let resolved = resolve(&OptionsInput::default(), &Config::default()).expect("resolve");
        assert_eq!(resolved.credential_context, "default");
    }
}

#[cfg(all(test, feature = "fuzz-tests"))]
mod fuzz_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // A parsed range never carries a garbage start and always honors
        // end >= start (with 0 meaning unbounded).
        #[test]
        fn parsed_ranges_are_well_formed(raw in "\\PC*") {
            if let Ok(range) = PortRange::parse(&raw) {
                prop_assert!(range.end == 0 || range.end >= range.start);
            }
        }

        #[test]
        fn valid_ranges_round_trip(start in 1u16..=u16::MAX, span in 0u16..1000) {
            let end = start.saturating_add(span);
            let raw = format!("{start}-{end}");
            let range = PortRange::parse(&raw).expect("valid range parses");
            prop_assert_eq!(range.start, start);
            prop_assert_eq!(range.end, end);
        }
    }
}
