// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batch requirement processor.
//!
//! Computes `links`, `selectable` and `alwaysVisible` for every element of a
//! model. Each outcome depends only on type and property sets, which the
//! processor never writes, so batches are evaluated in parallel against the
//! slice and applied once all batches are done.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matching::{filter_by_properties_and_type, find_property_value, satisfies_requirements};
use crate::requirements::{LinkRequirement, Requirements, SelectableRequirements};
use crate::types::{ElementData, ExpressId, Links, Property};

/// Elements processed between two progress reports.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// What to compute for each element. Absent lists leave the matching field
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_requirements: Option<Vec<LinkRequirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable_requirements: Option<Vec<SelectableRequirements>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_visible_requirements: Option<Vec<Requirements>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessProgress {
    pub processed: usize,
    pub total: usize,
}

impl ProcessProgress {
    /// Completion in percent, 100 for an empty input.
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f32 / self.total as f32 * 100.0
    }
}

#[derive(Debug, Default)]
struct Outcome {
    links: Option<Links>,
    selectable: Option<bool>,
    always_visible: Option<bool>,
}

struct Context<'a> {
    elements: &'a [ElementData],
    by_id: FxHashMap<ExpressId, usize>,
    request: &'a ProcessRequest,
}

impl<'a> Context<'a> {
    fn new(elements: &'a [ElementData], request: &'a ProcessRequest) -> Self {
        let by_id = elements
            .iter()
            .enumerate()
            .map(|(i, data)| (data.express_id, i))
            .collect();
        Self {
            elements,
            by_id,
            request,
        }
    }

    fn evaluate(&self, data: &ElementData) -> Outcome {
        let links = self
            .request
            .link_requirements
            .as_deref()
            .map(|requirements| self.links_of(data, requirements));

        let selectable = self.request.selectable_requirements.as_deref().map(|requirements| {
            let links = links.as_ref().or(data.links.as_ref());
            self.is_selectable(data, links, requirements)
        });

        let always_visible = self
            .request
            .always_visible_requirements
            .as_deref()
            .map(|requirements| {
                requirements
                    .iter()
                    .all(|requirement| satisfies_requirements(data, Some(requirement)))
            });

        Outcome {
            links,
            selectable,
            always_visible,
        }
    }

    /// Elements sharing the link property value, minus the element itself.
    /// A requirement whose property the element lacks produces no entry.
    fn links_of(&self, data: &ElementData, requirements: &[LinkRequirement]) -> Links {
        let mut links = Links::new();

        for requirement in requirements {
            let name = requirement.link_property_name.as_str();
            let Some(value) = find_property_value(data, name) else {
                continue;
            };

            let mut patterns = vec![Property {
                name: name.to_string(),
                value: Some(value.clone()),
            }];
            if let Some(extra) = requirement.requirements.required_properties.as_deref() {
                patterns.extend_from_slice(extra);
            }

            let ids = filter_by_properties_and_type(
                self.elements,
                &patterns,
                requirement.requirements.required_type.as_deref(),
            )
            .into_iter()
            .map(|linked| linked.express_id)
            .filter(|&id| id != data.express_id)
            .collect();
            links.insert(requirement.link_property_name.clone(), ids);
        }

        links
    }

    fn is_selectable(
        &self,
        data: &ElementData,
        links: Option<&Links>,
        requirements: &[SelectableRequirements],
    ) -> bool {
        requirements.iter().any(|requirement| {
            if !satisfies_requirements(data, Some(&requirement.requirements)) {
                return false;
            }
            let Some(link_requirements) = requirement.link_requirements.as_ref() else {
                return true;
            };
            links
                .into_iter()
                .flat_map(|links| links.values())
                .flatten()
                .filter_map(|id| self.by_id.get(id))
                .any(|&i| satisfies_requirements(&self.elements[i], Some(link_requirements)))
        })
    }
}

/// Processes every element in place.
///
/// `progress` is called after each batch of `batch_size` elements and once
/// at completion (also for an empty input).
pub fn process_elements<F>(
    elements: &mut [ElementData],
    request: &ProcessRequest,
    mut progress: F,
) -> Result<()>
where
    F: FnMut(ProcessProgress),
{
    let batch_size = request.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }

    let total = elements.len();
    if total == 0 {
        progress(ProcessProgress {
            processed: 0,
            total: 0,
        });
        return Ok(());
    }

    let context = Context::new(elements, request);
    let mut outcomes: Vec<Outcome> = Vec::with_capacity(total);
    let mut processed = 0;
    for batch in elements.chunks(batch_size) {
        outcomes.par_extend(batch.par_iter().map(|data| context.evaluate(data)));
        processed += batch.len();
        tracing::debug!(processed, total, "processed element batch");
        progress(ProcessProgress { processed, total });
    }

    for (data, outcome) in elements.iter_mut().zip(outcomes) {
        if let Some(links) = outcome.links {
            data.links = Some(links);
        }
        if let Some(selectable) = outcome.selectable {
            data.selectable = Some(selectable);
        }
        if let Some(always_visible) = outcome.always_visible {
            data.always_visible = Some(always_visible);
        }
    }

    tracing::info!(
        total,
        selectable = elements.iter().filter(|d| d.is_selectable()).count(),
        always_visible = elements.iter().filter(|d| d.is_always_visible()).count(),
        "element data processed"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertySet;

    fn element(id: ExpressId, ifc_type: &str, properties: Vec<Property>) -> ElementData {
        ElementData::new(id)
            .with_type(ifc_type)
            .with_property_set(PropertySet::new("Pset", properties))
    }

    #[test]
    fn progress_is_reported_per_batch_and_at_end() {
        let mut elements: Vec<_> = (0..250)
            .map(|i| element(i, "IFCWALL", vec![]))
            .collect();
        let request = ProcessRequest {
            always_visible_requirements: Some(vec![]),
            ..ProcessRequest::default()
        };

        let mut reports = Vec::new();
        process_elements(&mut elements, &request, |p| reports.push(p.processed)).unwrap();

        assert_eq!(reports, vec![100, 200, 250]);
        assert!(elements.iter().all(|d| d.is_always_visible()));
    }

    #[test]
    fn empty_input_reports_completion() {
        let mut reports = Vec::new();
        process_elements(&mut [], &ProcessRequest::default(), |p| reports.push(p)).unwrap();
        assert_eq!(reports, vec![ProcessProgress { processed: 0, total: 0 }]);
        assert_eq!(reports[0].percentage(), 100.0);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let request = ProcessRequest {
            batch_size: Some(0),
            ..ProcessRequest::default()
        };
        let mut elements = vec![ElementData::new(1)];
        assert!(matches!(
            process_elements(&mut elements, &request, |_| {}),
            Err(Error::InvalidBatchSize)
        ));
    }

    #[test]
    fn untouched_fields_stay_as_loaded() {
        let mut elements = vec![ElementData {
            selectable: Some(true),
            ..ElementData::new(1)
        }];
        process_elements(&mut elements, &ProcessRequest::default(), |_| {}).unwrap();
        assert!(elements[0].is_selectable());
        assert!(elements[0].links.is_none());
    }
}
