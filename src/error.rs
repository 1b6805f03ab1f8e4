//! Error taxonomy for the bridge.
//!
//! Two layers, matching how failures propagate:
//!
//! - [`BridgeError`]: fatal or caller-visible failures. Configuration
//!   problems surface from `init()`; query problems surface from the
//!   manager.
//! - [`SkipReason`]: contained, per-field or per-model outcomes recorded
//!   in the [`SynthesisReport`](crate::introspect::SynthesisReport) while
//!   the rest of the bridge keeps building. These are never raised past
//!   the synthesis boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal and caller-visible bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
	/// Invalid bridge configuration (bad glob pattern, malformed settings).
	#[error("configuration error: {0}")]
	Configuration(String),

	/// A database alias in active use has no entry in the engine map.
	#[error("database backend '{engine}' (alias '{alias}') has no async equivalent; add it to db_engine_map")]
	UnsupportedBackend { engine: String, alias: String },

	/// No database settings exist for an alias referenced by a bridged model.
	#[error("database alias '{0}' is used by at least one bridged model but has no settings entry")]
	UnknownAlias(String),

	/// Connection pool open or acquire failure.
	#[error("connection error: {0}")]
	Connection(#[from] sqlx::Error),

	/// Lookup of a model that is not present in the frozen registry.
	#[error("model '{0}' is not bridged (excluded, skipped, or failed synthesis)")]
	UnknownModel(String),

	/// A filter or value referenced a field the synthesized model does not have.
	#[error("model '{model}' has no bridged field or column '{field}'")]
	UnknownField { model: String, field: String },

	/// Statement construction failed.
	#[error("query build error: {0}")]
	QueryBuild(String),

	/// Filesystem failure while writing exported model modules.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// A row column could not be decoded into the expected value.
	#[error("failed to decode column '{column}' of '{model}': {cause}")]
	Decode {
		model: String,
		column: String,
		cause: String,
	},

	/// `get()` matched no rows.
	#[error("{0} matching query does not exist")]
	DoesNotExist(String),

	/// `get()` matched more than one row.
	#[error("get() on '{0}' returned more than one row")]
	MultipleObjectsReturned(String),
}

/// Contained per-field / per-model outcomes.
///
/// A `SkipReason` removes a field (or a whole model) from the bridge while
/// everything else continues. Absence from the frozen registry is the only
/// runtime signal; the synthesis report carries the reasons for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
	/// Field type resolved to nothing, even after the ancestor walk.
	UnsupportedFieldType { internal_type: String },
	/// Relational field carries no usable target reference.
	MissingRelationTarget,
	/// Relation target is not in the plan (excluded or skipped model).
	RelationTargetUnavailable { target: String },
	/// Relation target failed synthesis after this model was built.
	RelationTargetFailed { target: String },
	/// Model rejected by include/exclude patterns.
	ExcludedByConfig,
	/// Abstract models have no table.
	AbstractModel,
	/// Proxy models share another model's table.
	ProxyModel,
	/// Model declares no concrete fields at all.
	NoFields,
	/// No primary key survived field translation.
	NoPrimaryKey,
	/// The assembled model was rejected at synthesis time.
	SynthesisFailed { cause: String },
}

impl std::fmt::Display for SkipReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::UnsupportedFieldType { internal_type } => {
				write!(f, "unsupported field type '{internal_type}'")
			}
			Self::MissingRelationTarget => write!(f, "relation has no target model"),
			Self::RelationTargetUnavailable { target } => {
				write!(f, "relation target '{target}' is not bridged")
			}
			Self::RelationTargetFailed { target } => {
				write!(f, "relation target '{target}' failed synthesis")
			}
			Self::ExcludedByConfig => write!(f, "excluded by configuration"),
			Self::AbstractModel => write!(f, "model is abstract"),
			Self::ProxyModel => write!(f, "model is a proxy"),
			Self::NoFields => write!(f, "model has no concrete fields"),
			Self::NoPrimaryKey => write!(f, "no primary key survived translation"),
			Self::SynthesisFailed { cause } => write!(f, "synthesis failed: {cause}"),
		}
	}
}

/// Convenience alias used across the crate.
pub type BridgeResult<T> = Result<T, BridgeError>;
