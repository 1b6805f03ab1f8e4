//! Bridged model registry.
//!
//! One sequential pass synthesizes every blueprint; a model that fails is
//! simply absent afterwards, never present as a tombstone, which is what
//! lets dependent relations degrade to "dropped" instead of cascading the
//! failure. After the pass the registry freezes; all later access is
//! read-only and safe to share across tasks without locking.

use crate::error::SkipReason;
use crate::introspect::SynthesisReport;
use crate::spec::ModelSpec;
use crate::synth::{self, SynthesizedModel};
use indexmap::IndexMap;

/// The frozen name map from qualified model name to synthesized descriptor.
#[derive(Debug)]
pub struct BridgeRegistry {
	models: IndexMap<String, SynthesizedModel>,
	report: SynthesisReport,
}

impl BridgeRegistry {
	/// Run the single forward build pass.
	///
	/// Relations bind against the full plan, so forward references to models
	/// later in iteration order work. A model that fails synthesis after a
	/// dependent already bound to it is handled by the closing prune: every
	/// relation whose target did not survive is dropped and recorded. No
	/// second pass re-attempts anything; with mutual references the final
	/// relation set therefore follows iteration order, which is the
	/// documented behavior.
	pub fn build(specs: Vec<ModelSpec>, mut report: SynthesisReport) -> Self {
		let plan: IndexMap<String, ModelSpec> = specs
			.into_iter()
			.map(|s| (s.qualified_name.clone(), s))
			.collect();

		let mut models: IndexMap<String, SynthesizedModel> = IndexMap::with_capacity(plan.len());
		for spec in plan.values() {
			match synth::synthesize(spec, &plan, &mut report) {
				Ok(model) => {
					models.insert(model.qualified_name.clone(), model);
				}
				Err(failure) => {
					tracing::error!(model = %failure.model, cause = %failure.cause, "model synthesis failed");
					report.record_model(
						&failure.model,
						SkipReason::SynthesisFailed {
							cause: failure.cause,
						},
					);
				}
			}
		}

		prune_dangling_relations(&mut models, &mut report);

		Self { models, report }
	}

	pub fn get(&self, qualified_name: &str) -> Option<&SynthesizedModel> {
		self.models.get(qualified_name)
	}

	pub fn contains(&self, qualified_name: &str) -> bool {
		self.models.contains_key(qualified_name)
	}

	/// Surviving models in build order.
	pub fn models(&self) -> impl Iterator<Item = &SynthesizedModel> {
		self.models.values()
	}

	pub fn len(&self) -> usize {
		self.models.len()
	}

	pub fn is_empty(&self) -> bool {
		self.models.is_empty()
	}

	/// Everything the build left out, and why.
	pub fn report(&self) -> &SynthesisReport {
		&self.report
	}
}

/// Drop relations (and their key columns) whose target did not survive the
/// pass. Runs once, after synthesis, so a failure late in the pass still
/// degrades earlier models' relations cleanly.
fn prune_dangling_relations(
	models: &mut IndexMap<String, SynthesizedModel>,
	report: &mut SynthesisReport,
) {
	let survivors: Vec<String> = models.keys().cloned().collect();
	for model in models.values_mut() {
		let dangling: Vec<_> = model
			.relations()
			.iter()
			.filter(|r| !survivors.contains(&r.spec.target))
			.map(|r| (r.spec.field_name.clone(), r.spec.target.clone(), r.spec.source_column.clone()))
			.collect();
		for (field_name, target, source_column) in dangling {
			tracing::warn!(
				model = %model.qualified_name,
				field = %field_name,
				target = %target,
				"relation target failed synthesis; dropping relation"
			);
			report.record_field(
				model.qualified_name.clone(),
				&field_name,
				SkipReason::RelationTargetFailed {
					target: target.clone(),
				},
			);
			if let Some(column) = source_column {
				model.drop_key_column(&column);
			}
		}
		model.retain_relations(|r| survivors.contains(&r.spec.target));
	}
}
