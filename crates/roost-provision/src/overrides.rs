//! Priority-ordered resolution of provisionable field values.

use std::collections::HashMap;

/// The per-order override sources, consulted in priority order.
pub struct OverrideSources<'a> {
    pub config_options: &'a HashMap<String, String>,
    pub custom_fields: &'a HashMap<String, String>,
}

impl OverrideSources<'_> {
    /// Resolve one field. First non-empty value wins: the order's
    /// configurable option under `key`, then its custom field under
    /// `key`, then the fixed product configuration, then `default`.
    /// `None` means the field is omitted from the outgoing request.
    ///
    /// An empty string counts as absent at every level; a present but
    /// empty high-priority source must not shadow a non-empty one
    /// below it.
    pub fn resolve(
        &self,
        key: &str,
        fixed: Option<&str>,
        default: Option<&str>,
    ) -> Option<String> {
        non_empty(self.config_options.get(key).map(String::as_str))
            .or_else(|| non_empty(self.custom_fields.get(key).map(String::as_str)))
            .or_else(|| non_empty(fixed))
            .or_else(|| non_empty(default))
            .map(str::to_string)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(
        config_options: &[(&str, &str)],
        custom_fields: &[(&str, &str)],
    ) -> (HashMap<String, String>, HashMap<String, String>) {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        (to_map(config_options), to_map(custom_fields))
    }

    #[test]
    fn order_option_wins_over_everything() {
        let (options, fields) = sources(&[("memory", "4096")], &[("memory", "2048")]);
        let resolver = OverrideSources {
            config_options: &options,
            custom_fields: &fields,
        };

        assert_eq!(
            resolver.resolve("memory", Some("1024"), Some("512")),
            Some("4096".to_string())
        );
    }

    #[test]
    fn empty_order_option_falls_through() {
        let (options, fields) = sources(&[("memory", "")], &[("memory", "2048")]);
        let resolver = OverrideSources {
            config_options: &options,
            custom_fields: &fields,
        };

        assert_eq!(
            resolver.resolve("memory", Some("1024"), None),
            Some("2048".to_string())
        );
    }

    #[test]
    fn custom_field_beats_fixed_config() {
        let (options, fields) = sources(&[], &[("io", "750")]);
        let resolver = OverrideSources {
            config_options: &options,
            custom_fields: &fields,
        };

        assert_eq!(resolver.resolve("io", Some("500"), None), Some("750".to_string()));
    }

    #[test]
    fn fixed_config_beats_default() {
        let (options, fields) = sources(&[], &[]);
        let resolver = OverrideSources {
            config_options: &options,
            custom_fields: &fields,
        };

        assert_eq!(
            resolver.resolve("startup", Some("java -jar custom.jar"), Some("java -jar server.jar")),
            Some("java -jar custom.jar".to_string())
        );
    }

    #[test]
    fn all_sources_empty_yields_none() {
        let (options, fields) = sources(&[("pack_id", "")], &[]);
        let resolver = OverrideSources {
            config_options: &options,
            custom_fields: &fields,
        };

        assert_eq!(resolver.resolve("pack_id", Some(""), None), None);
        assert_eq!(resolver.resolve("pack_id", None, None), None);
    }

    #[test]
    fn default_is_used_as_the_last_resort() {
        let (options, fields) = sources(&[], &[]);
        let resolver = OverrideSources {
            config_options: &options,
            custom_fields: &fields,
        };

        assert_eq!(
            resolver.resolve("SERVER_JARFILE", None, Some("server.jar")),
            Some("server.jar".to_string())
        );
    }
}
