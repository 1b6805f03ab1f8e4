//! Include/exclude model filtering.
//!
//! Patterns are shell globs matched against the qualified
//! `app_label.ModelName`. Exclusion always wins over inclusion; a present
//! but empty include list includes nothing.

use crate::conf::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use glob::Pattern;

/// Compiled include/exclude patterns.
#[derive(Debug, Clone)]
pub struct ModelFilter {
	include: Option<Vec<Pattern>>,
	exclude: Option<Vec<Pattern>>,
}

impl ModelFilter {
	/// Compile the config's pattern lists. A malformed glob is a
	/// configuration error, not a skip.
	pub fn from_config(config: &BridgeConfig) -> BridgeResult<Self> {
		Ok(Self {
			include: compile(config.include_models.as_deref())?,
			exclude: compile(config.exclude_models.as_deref())?,
		})
	}

	/// Filter that includes everything.
	pub fn allow_all() -> Self {
		Self {
			include: None,
			exclude: None,
		}
	}

	/// Whether a qualified `app_label.ModelName` passes the filter.
	pub fn should_include(&self, label: &str) -> bool {
		if let Some(exclude) = &self.exclude {
			if exclude.iter().any(|p| p.matches(label)) {
				return false;
			}
		}
		match &self.include {
			// An include list that is present but empty admits nothing.
			Some(include) => include.iter().any(|p| p.matches(label)),
			None => true,
		}
	}
}

fn compile(patterns: Option<&[String]>) -> BridgeResult<Option<Vec<Pattern>>> {
	patterns
		.map(|list| {
			list.iter()
				.map(|raw| {
					Pattern::new(raw).map_err(|e| {
						BridgeError::Configuration(format!("invalid model pattern '{raw}': {e}"))
					})
				})
				.collect()
		})
		.transpose()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn filter(include: Option<&[&str]>, exclude: Option<&[&str]>) -> ModelFilter {
		let mut config = BridgeConfig::new();
		config.include_models = include.map(|p| p.iter().map(|s| s.to_string()).collect());
		config.exclude_models = exclude.map(|p| p.iter().map(|s| s.to_string()).collect());
		ModelFilter::from_config(&config).unwrap()
	}

	#[test]
	fn test_no_patterns_includes_all() {
		let f = filter(None, None);
		assert!(f.should_include("blog.Article"));
		assert!(f.should_include("admin.LogEntry"));
	}

	#[test]
	fn test_exclude_wins_over_include() {
		let f = filter(Some(&["blog.*"]), Some(&["blog.Draft"]));
		assert!(f.should_include("blog.Article"));
		assert!(!f.should_include("blog.Draft"));
	}

	#[test]
	fn test_include_required_when_present() {
		let f = filter(Some(&["blog.*", "auth.User"]), None);
		assert!(f.should_include("blog.Comment"));
		assert!(f.should_include("auth.User"));
		assert!(!f.should_include("auth.Group"));
	}

	#[test]
	fn test_empty_include_list_admits_nothing() {
		let f = filter(Some(&[]), None);
		assert!(!f.should_include("blog.Article"));
	}

	#[test]
	fn test_empty_exclude_list_excludes_nothing() {
		let f = filter(None, Some(&[]));
		assert!(f.should_include("blog.Article"));
	}

	#[test]
	fn test_malformed_pattern_is_configuration_error() {
		let config = BridgeConfig::new().with_include_models(["blog.[Article"]);
		assert!(matches!(
			ModelFilter::from_config(&config),
			Err(BridgeError::Configuration(_))
		));
	}
}
