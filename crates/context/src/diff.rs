//! Context differ.
//!
//! Pure functions comparing a new context snapshot against the previous one.
//! Every comparison is by identity (`Arc::ptr_eq`), never structural: callers
//! signal "unchanged" by handing back the same `Arc`.

use std::sync::Arc;

use crate::model::{LayerRef, MapContext};

/// A layer present in the new context but not in the old one.
#[derive(Debug, Clone)]
pub struct AddedLayer {
    pub layer: LayerRef,
    /// 0-based index in the new context's layer list, background first.
    pub position: usize,
}

/// Context parameters that can be checked with [`has_param_changed`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContextParam {
    View,
    Layers,
    NoBaseMap,
}

impl ContextParam {
    pub fn name(&self) -> &'static str {
        match self {
            ContextParam::View => "view",
            ContextParam::Layers => "layers",
            ContextParam::NoBaseMap => "noBaseMap",
        }
    }
}

fn contains_layer(layers: &[LayerRef], layer: &LayerRef) -> bool {
    layers.iter().any(|l| Arc::ptr_eq(l, layer))
}

/// Layers of `new` whose identity is absent from `old`, with their position in
/// `new`.
///
/// Without a layer list in `new` nothing is added; without a baseline list in
/// `old` every layer of `new` is added.
pub fn added_layers(new: &MapContext, old: Option<&MapContext>) -> Vec<AddedLayer> {
    let Some(new_layers) = &new.layers else {
        return Vec::new();
    };
    let Some(old_layers) = old.and_then(|o| o.layers.as_ref()) else {
        return new_layers
            .iter()
            .enumerate()
            .map(|(position, layer)| AddedLayer {
                layer: Arc::clone(layer),
                position,
            })
            .collect();
    };
    if Arc::ptr_eq(new_layers, old_layers) {
        return Vec::new();
    }
    new_layers
        .iter()
        .enumerate()
        .filter(|(_, layer)| !contains_layer(old_layers, layer))
        .map(|(position, layer)| AddedLayer {
            layer: Arc::clone(layer),
            position,
        })
        .collect()
}

/// Layers of `old` whose identity is absent from `new`, in `old` order.
///
/// An empty list in `new` removes everything; an absent list removes nothing.
pub fn removed_layers(new: &MapContext, old: Option<&MapContext>) -> Vec<LayerRef> {
    let Some(old) = old else {
        return Vec::new();
    };
    let (Some(new_layers), Some(old_layers)) = (&new.layers, &old.layers) else {
        return Vec::new();
    };
    if Arc::ptr_eq(new_layers, old_layers) {
        return Vec::new();
    }
    old_layers
        .iter()
        .filter(|layer| !contains_layer(new_layers, layer))
        .cloned()
        .collect()
}

/// Whether `param` was given a new value by `new`.
///
/// A parameter missing from `new` is not part of the update and never counts
/// as changed. Shared parameters compare by identity, scalars by value.
pub fn has_param_changed(param: ContextParam, new: &MapContext, old: Option<&MapContext>) -> bool {
    match param {
        ContextParam::View => changed_by_identity(&new.view, old.map(|o| &o.view)),
        ContextParam::Layers => changed_by_identity(&new.layers, old.map(|o| &o.layers)),
        ContextParam::NoBaseMap => {
            let Some(new_value) = new.no_base_map else {
                return false;
            };
            match old.and_then(|o| o.no_base_map) {
                Some(old_value) => old_value != new_value,
                None => true,
            }
        }
    }
}

fn changed_by_identity<T>(new: &Option<Arc<T>>, old: Option<&Option<Arc<T>>>) -> bool {
    let Some(new_value) = new else {
        return false;
    };
    match old {
        Some(Some(old_value)) => !Arc::ptr_eq(new_value, old_value),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ContextParam, added_layers, has_param_changed, removed_layers};
    use crate::fixtures::{layer_wfs, layer_wms, layer_xyz};
    use crate::model::{LayerRef, MapContext, MapContextView};
    use pretty_assertions::assert_eq;

    fn ctx(layers: &[&LayerRef]) -> MapContext {
        MapContext::new().with_layers(Arc::new(layers.iter().map(|l| Arc::clone(l)).collect()))
    }

    fn positions(added: &[super::AddedLayer]) -> Vec<usize> {
        added.iter().map(|a| a.position).collect()
    }

    #[test]
    fn same_layer_list_yields_nothing() {
        let (a, b) = (layer_wms(), layer_xyz());
        let old = ctx(&[&a, &b]);
        let new = MapContext::new().with_layers(Arc::clone(old.layers.as_ref().unwrap()));
        assert!(added_layers(&new, Some(&old)).is_empty());
        assert!(removed_layers(&new, Some(&old)).is_empty());
    }

    #[test]
    fn everything_is_added_without_baseline() {
        let (a, b, c) = (layer_wms(), layer_xyz(), layer_wfs());
        let new = ctx(&[&a, &b, &c]);

        let added = added_layers(&new, None);
        assert_eq!(positions(&added), vec![0, 1, 2]);
        assert!(Arc::ptr_eq(&added[1].layer, &b));
        assert!(removed_layers(&new, None).is_empty());

        let added = added_layers(&new, Some(&MapContext::new()));
        assert_eq!(positions(&added), vec![0, 1, 2]);
    }

    #[test]
    fn nothing_is_added_without_new_layer_list() {
        let a = layer_wms();
        let old = ctx(&[&a]);
        assert!(added_layers(&MapContext::new(), Some(&old)).is_empty());
        assert!(removed_layers(&MapContext::new(), Some(&old)).is_empty());
    }

    #[test]
    fn empty_layer_list_removes_everything_in_order() {
        let (a, b, c) = (layer_wms(), layer_xyz(), layer_wfs());
        let old = ctx(&[&a, &b, &c]);
        let new = ctx(&[]);
        let removed = removed_layers(&new, Some(&old));
        assert_eq!(removed.len(), 3);
        assert!(Arc::ptr_eq(&removed[0], &a));
        assert!(Arc::ptr_eq(&removed[1], &b));
        assert!(Arc::ptr_eq(&removed[2], &c));
        assert!(added_layers(&new, Some(&old)).is_empty());
    }

    #[test]
    fn identity_not_structure_decides() {
        let (a, b, c, d) = (layer_wms(), layer_xyz(), layer_wfs(), layer_xyz());
        // Structurally equal to `a`, but a distinct allocation.
        let a2: LayerRef = Arc::new((*a).clone());
        assert_eq!(*a, *a2);

        let old = ctx(&[&a, &b, &c]);
        let new = ctx(&[&b, &d, &a, &a2]);

        let added = added_layers(&new, Some(&old));
        assert_eq!(positions(&added), vec![1, 3]);
        assert!(Arc::ptr_eq(&added[0].layer, &d));
        assert!(Arc::ptr_eq(&added[1].layer, &a2));

        let removed = removed_layers(&new, Some(&old));
        assert_eq!(removed.len(), 1);
        assert!(Arc::ptr_eq(&removed[0], &c));
    }

    #[test]
    fn view_change_detection() {
        let view = Arc::new(MapContextView::from_center([0.0, 0.0], 1.0));
        let with_view = MapContext::new().with_view(Arc::clone(&view));

        assert!(!has_param_changed(ContextParam::View, &MapContext::new(), None));
        assert!(!has_param_changed(
            ContextParam::View,
            &MapContext::new(),
            Some(&with_view)
        ));
        assert!(has_param_changed(ContextParam::View, &with_view, None));
        assert!(has_param_changed(
            ContextParam::View,
            &with_view,
            Some(&MapContext::new())
        ));
        assert!(!has_param_changed(
            ContextParam::View,
            &MapContext::new().with_view(Arc::clone(&view)),
            Some(&with_view)
        ));

        let same_shape = MapContext::new().with_view(Arc::new(MapContextView {
            zoom: Some(1.0),
            ..Default::default()
        }));
        let other_same_shape = MapContext::new().with_view(Arc::new(MapContextView {
            zoom: Some(1.0),
            ..Default::default()
        }));
        assert!(has_param_changed(
            ContextParam::View,
            &same_shape,
            Some(&other_same_shape)
        ));
    }

    #[test]
    fn no_base_map_compares_by_value() {
        let on = MapContext::new().with_no_base_map(true);
        let also_on = MapContext::new().with_no_base_map(true);
        let off = MapContext::new().with_no_base_map(false);

        assert!(has_param_changed(ContextParam::NoBaseMap, &on, None));
        assert!(!has_param_changed(ContextParam::NoBaseMap, &also_on, Some(&on)));
        assert!(has_param_changed(ContextParam::NoBaseMap, &off, Some(&on)));
        assert!(!has_param_changed(
            ContextParam::NoBaseMap,
            &MapContext::new(),
            Some(&on)
        ));
    }

    #[test]
    fn layers_param_uses_list_identity() {
        let a = layer_wms();
        let old = ctx(&[&a]);
        let same = MapContext::new().with_layers(Arc::clone(old.layers.as_ref().unwrap()));
        let rebuilt = ctx(&[&a]);
        assert!(!has_param_changed(ContextParam::Layers, &same, Some(&old)));
        assert!(has_param_changed(ContextParam::Layers, &rebuilt, Some(&old)));
    }
}
