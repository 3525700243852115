//! Variant flattening: bake the active selection of every variant set into
//! its prim and discard the alternatives.

use crate::data::{LayerData, PrimBody};

impl LayerData {
    /// Flatten every variant set in the layer. Returns how many sets were
    /// removed, nested sets included.
    pub fn flatten_variants(&mut self) -> usize {
        self.prims
            .iter_mut()
            .map(|p| p.body.flatten_variants())
            .sum()
    }
}

impl PrimBody {
    /// Flatten the variant sets on this body and all descendants.
    ///
    /// The selected variant's opinions are weaker than the prim's own: local
    /// attributes and clips win, arcs from the variant are appended after
    /// local arcs, and children merge by name. A set without a selection (or
    /// selecting a variant that does not exist) contributes nothing.
    pub fn flatten_variants(&mut self) -> usize {
        let sets = std::mem::take(&mut self.variant_sets);
        let selections = std::mem::take(&mut self.variant_selections);
        let mut removed = sets.len();

        for (set_name, mut variants) in sets {
            let Some(selected) = selections.get(&set_name) else {
                tracing::debug!("variant set '{}' has no selection, dropping it", set_name);
                continue;
            };
            match variants.remove(selected) {
                Some(mut variant) => {
                    removed += variant.flatten_variants();
                    self.merge_weaker(variant);
                }
                None => tracing::debug!(
                    "variant set '{}' selects missing variant '{}'",
                    set_name,
                    selected
                ),
            }
        }

        for child in &mut self.children {
            removed += child.body.flatten_variants();
        }
        removed
    }

    /// Merge `weaker` opinions underneath this body's own.
    fn merge_weaker(&mut self, weaker: PrimBody) {
        self.references.extend(weaker.references);
        self.payloads.extend(weaker.payloads);
        for (name, value) in weaker.attributes {
            self.attributes.entry(name).or_insert(value);
        }
        for (name, clip) in weaker.clips {
            self.clips.entry(name).or_insert(clip);
        }
        for child in weaker.children {
            match self.children.iter_mut().find(|c| c.name == child.name) {
                Some(existing) => {
                    if existing.type_name.is_none() {
                        existing.type_name = child.type_name;
                    }
                    existing.body.merge_weaker(child.body);
                }
                None => self.children.push(child),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::data::{AttrValue, LayerData, Prim, PrimBody};

    fn variant(attr: &str, value: &str) -> PrimBody {
        PrimBody {
            attributes: [(attr.to_string(), AttrValue::Asset(value.to_string()))]
                .into_iter()
                .collect(),
            ..PrimBody::default()
        }
    }

    #[test]
    fn test_selected_variant_is_baked() {
        let mut data = LayerData::default().with_prim(
            Prim::new("Chair")
                .with_variant("look", "red", variant("tex", "red.png"))
                .with_variant("look", "blue", variant("tex", "blue.png"))
                .with_selection("look", "blue"),
        );
        assert_eq!(data.flatten_variants(), 1);
        let body = &data.prims[0].body;
        assert!(body.variant_sets.is_empty());
        assert!(body.variant_selections.is_empty());
        assert_eq!(
            body.attributes.get("tex"),
            Some(&AttrValue::Asset("blue.png".into()))
        );
        let paths: Vec<String> = data.references().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["blue.png"]);
    }

    #[test]
    fn test_local_opinion_wins() {
        let mut data = LayerData::default().with_prim(
            Prim::new("Chair")
                .with_attribute("tex", AttrValue::Asset("local.png".into()))
                .with_variant("look", "red", variant("tex", "red.png"))
                .with_selection("look", "red"),
        );
        data.flatten_variants();
        assert_eq!(
            data.prims[0].body.attributes.get("tex"),
            Some(&AttrValue::Asset("local.png".into()))
        );
    }

    #[test]
    fn test_unselected_set_contributes_nothing() {
        let mut data = LayerData::default().with_prim(
            Prim::new("Chair").with_variant("look", "red", variant("tex", "red.png")),
        );
        assert_eq!(data.flatten_variants(), 1);
        assert!(data.references().is_empty());
    }

    #[test]
    fn test_nested_sets_and_children_merge() {
        let inner = PrimBody {
            children: vec![Prim::new("Leg").with_reference("leg_long.sda")],
            ..PrimBody::default()
        };
        let outer = PrimBody {
            references: vec![crate::data::CompositionArc::new("frame.sda")],
            variant_sets: [(
                "legs".to_string(),
                [("long".to_string(), inner)].into_iter().collect(),
            )]
            .into_iter()
            .collect(),
            variant_selections: [("legs".to_string(), "long".to_string())]
                .into_iter()
                .collect(),
            ..PrimBody::default()
        };
        let mut data = LayerData::default().with_prim(
            Prim::new("Chair")
                .with_reference("base.sda")
                .with_child(Prim::new("Leg").with_attribute("h", AttrValue::Float(1.0)))
                .with_variant("model", "wood", outer)
                .with_selection("model", "wood"),
        );
        assert_eq!(data.flatten_variants(), 2);
        assert_eq!(data.variant_set_count(), 0);

        let body = &data.prims[0].body;
        let arcs: Vec<&str> = body.references.iter().map(|a| a.asset_path.as_str()).collect();
        assert_eq!(arcs, vec!["base.sda", "frame.sda"]);
        assert_eq!(body.children.len(), 1);
        let leg = &body.children[0].body;
        assert_eq!(leg.attributes.get("h"), Some(&AttrValue::Float(1.0)));
        assert_eq!(leg.references[0].asset_path, "leg_long.sda");
    }
}
