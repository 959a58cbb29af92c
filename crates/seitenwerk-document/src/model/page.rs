// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A single page: geometry, rotation, content layers, and resources.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Object};
use seitenwerk_core::Rotation;

use super::pool::{ResourceId, ResourcePool};

/// Where a page came from, for diagnostics and fingerprint tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    pub source: String,
    /// Zero-based index within the source.
    pub index: usize,
}

/// One content stream drawn on a page.
///
/// Source layers come from the loaded file. Overlay layers are stamped by
/// the engine and always paint after every source layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLayer {
    Source(ResourceId),
    Overlay(ResourceId),
}

impl ContentLayer {
    pub fn stream(self) -> ResourceId {
        match self {
            Self::Source(id) | Self::Overlay(id) => id,
        }
    }
}

/// Resource sub-dictionaries overlays may add entries to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceCategory {
    Font,
    ExtGState,
}

impl ResourceCategory {
    pub(crate) fn key(self) -> &'static [u8] {
        match self {
            Self::Font => b"Font",
            Self::ExtGState => b"ExtGState",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    media_box: [f32; 4],
    crop_box: Option<[f32; 4]>,
    rotation: Rotation,
    resources: Option<ResourceId>,
    layers: Vec<ContentLayer>,
    overlay_resources: BTreeMap<(ResourceCategory, String), ResourceId>,
    origin: PageOrigin,
}

impl Page {
    pub(crate) fn new(media_box: [f32; 4], origin: PageOrigin) -> Self {
        Self {
            media_box,
            crop_box: None,
            rotation: Rotation::Deg0,
            resources: None,
            layers: Vec::new(),
            overlay_resources: BTreeMap::new(),
            origin,
        }
    }

    pub fn media_box(&self) -> [f32; 4] {
        self.media_box
    }

    pub fn crop_box(&self) -> Option<[f32; 4]> {
        self.crop_box
    }

    pub(crate) fn set_crop_box(&mut self, crop_box: Option<[f32; 4]>) {
        self.crop_box = crop_box;
    }

    /// The crop box clipped to the media box, or the media box when the two
    /// do not overlap.
    pub fn visible_box(&self) -> [f32; 4] {
        let Some(crop) = self.crop_box else {
            return self.media_box;
        };
        let m = self.media_box;
        let clipped = [
            crop[0].max(m[0]),
            crop[1].max(m[1]),
            crop[2].min(m[2]),
            crop[3].min(m[3]),
        ];
        if clipped[2] > clipped[0] && clipped[3] > clipped[1] {
            clipped
        } else {
            m
        }
    }

    /// Unrotated visible width in points.
    pub fn width(&self) -> f32 {
        let b = self.visible_box();
        b[2] - b[0]
    }

    pub fn height(&self) -> f32 {
        let b = self.visible_box();
        b[3] - b[1]
    }

    /// Visible size as displayed, i.e. after `/Rotate`.
    pub fn display_size(&self) -> (f32, f32) {
        if self.rotation.is_sideways() {
            (self.height(), self.width())
        } else {
            (self.width(), self.height())
        }
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub(crate) fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    pub fn origin(&self) -> &PageOrigin {
        &self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: PageOrigin) {
        self.origin = origin;
    }

    pub fn resources(&self) -> Option<ResourceId> {
        self.resources
    }

    pub(crate) fn set_resources(&mut self, resources: Option<ResourceId>) {
        self.resources = resources;
    }

    pub fn layers(&self) -> &[ContentLayer] {
        &self.layers
    }

    pub(crate) fn push_source(&mut self, stream: ResourceId) {
        self.layers.push(ContentLayer::Source(stream));
    }

    pub fn source_streams(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.layers.iter().filter_map(|layer| match layer {
            ContentLayer::Source(id) => Some(*id),
            ContentLayer::Overlay(_) => None,
        })
    }

    pub fn overlay_streams(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.layers.iter().filter_map(|layer| match layer {
            ContentLayer::Overlay(id) => Some(*id),
            ContentLayer::Source(_) => None,
        })
    }

    pub fn has_overlays(&self) -> bool {
        self.overlay_streams().next().is_some()
    }

    /// Append an overlay stream together with the named resources it uses.
    pub(crate) fn add_overlay(
        &mut self,
        stream: ResourceId,
        resources: &[(ResourceCategory, &str, ResourceId)],
    ) {
        for (category, name, id) in resources {
            self.overlay_resources
                .insert((*category, (*name).to_string()), *id);
        }
        self.layers.push(ContentLayer::Overlay(stream));
    }

    pub fn overlay_resources(&self) -> impl Iterator<Item = (ResourceCategory, &str, ResourceId)> {
        self.overlay_resources
            .iter()
            .map(|((category, name), id)| (*category, name.as_str(), *id))
    }

    /// Pool entries this page refers to directly.
    pub fn referenced_resources(&self) -> Vec<ResourceId> {
        self.resources
            .into_iter()
            .chain(self.layers.iter().map(|layer| layer.stream()))
            .chain(self.overlay_resources.values().copied())
            .collect()
    }

    /// Resource dictionary with overlay fonts and graphics states merged in.
    pub fn effective_resources(&self, pool: &ResourcePool) -> Dictionary {
        let mut dict = self
            .resources
            .and_then(|id| pool.dict_by_id(id))
            .cloned()
            .unwrap_or_default();
        for (category, name, id) in self.overlay_resources() {
            let mut sub = dict
                .get(category.key())
                .ok()
                .and_then(|obj| pool.dict(obj))
                .cloned()
                .unwrap_or_default();
            sub.set(name, id.reference());
            dict.set(category.key(), Object::Dictionary(sub));
        }
        dict
    }

    /// Copy of this page whose ids point into `into` rather than `from`.
    pub(crate) fn import(
        &self,
        from: &ResourcePool,
        into: &mut ResourcePool,
        memo: &mut HashMap<ResourceId, ResourceId>,
    ) -> Page {
        let mut remap = |id: ResourceId| into.import(from, id, memo);
        let resources = self.resources.and_then(&mut remap);
        let layers = self
            .layers
            .iter()
            .filter_map(|layer| match layer {
                ContentLayer::Source(id) => remap(*id).map(ContentLayer::Source),
                ContentLayer::Overlay(id) => remap(*id).map(ContentLayer::Overlay),
            })
            .collect();
        let overlay_resources = self
            .overlay_resources
            .iter()
            .filter_map(|(key, id)| remap(*id).map(|mapped| (key.clone(), mapped)))
            .collect();
        Page {
            media_box: self.media_box,
            crop_box: self.crop_box,
            rotation: self.rotation,
            resources,
            layers,
            overlay_resources,
            origin: self.origin.clone(),
        }
    }
}
