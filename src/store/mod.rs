//! Resource store: the editor's single-writer view of the canvas
//!
//! Holds three snapshots. `initial` is what was loaded, `previous` is what the
//! last successful save wrote, `current` is live and possibly dirty. Saving
//! writes `current` through the persistence adapter and then publishes it on
//! the sync channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, span::EnteredSpan, warn};
use uuid::Uuid;

use crate::constants::limits::MAX_IMAGE_LAYERS;
use crate::layer::{Geometry, Layer, LayerDraft, LayerId, LayerKind, LayerPatch, Locale, Snapshot};
use crate::persistence::SnapshotStore;
use crate::selection::{key_action, KeyAction, KeyInput, Selection};
use crate::sync::SyncChannel;
use crate::templates;

mod error;
pub use error::StoreError;

/// Span carrying a fresh correlation id for one store operation
fn op_span(operation: &'static str) -> EnteredSpan {
    info_span!("store", op = %Uuid::new_v4().simple(), operation).entered()
}

pub struct ResourceStore {
    current: Vec<Layer>,
    initial: Snapshot,
    previous: Snapshot,
    modified: bool,
    last_error: Option<String>,
    selection: Selection,
    locale: Locale,
    persistence: Arc<dyn SnapshotStore>,
    channel: Box<dyn SyncChannel>,
}

impl ResourceStore {
    /// Build the store from whatever is persisted
    ///
    /// Nothing persisted seeds the sample layer. A failed read starts empty
    /// and records the failure in [`Self::last_error`].
    pub fn load(persistence: Arc<dyn SnapshotStore>, channel: Box<dyn SyncChannel>, locale: Locale) -> Self {
        let _span = op_span("load");

        let (layers, last_error) = match persistence.read() {
            Ok(Some(layers)) => {
                info!(layers = layers.len(), "Loaded persisted layers");
                (dedupe_ids(layers), None)
            }
            Ok(None) => {
                info!("Nothing persisted, seeding sample layers");
                (templates::sample_snapshot(), None)
            }
            Err(e) => {
                let message = format!("Failed to load overlay layers: {e:#}");
                error!(error = %message, "Starting with an empty canvas");
                (Vec::new(), Some(message))
            }
        };

        Self {
            initial: layers.clone(),
            previous: layers.clone(),
            current: layers,
            modified: false,
            last_error,
            selection: Selection::new(),
            locale,
            persistence,
            channel,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.current
    }

    pub fn current(&self) -> Snapshot {
        self.current.clone()
    }

    pub fn initial(&self) -> &[Layer] {
        &self.initial
    }

    pub fn previous(&self) -> &[Layer] {
        &self.previous
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.current.iter().find(|l| &l.id == id)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn image_count(&self) -> usize {
        self.current.iter().filter(|l| l.is_image()).count()
    }

    /// True once no further image layer can be admitted
    pub fn check_resource_limit(&self) -> bool {
        self.image_count() >= MAX_IMAGE_LAYERS
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Human-readable description of the last failed load or save
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn position(&self, id: &LayerId) -> Option<usize> {
        self.current.iter().position(|l| &l.id == id)
    }

    fn fresh_id(&self) -> LayerId {
        loop {
            let id = LayerId::generate();
            if self.position(&id).is_none() {
                return id;
            }
        }
    }

    /// Validate and append a new layer
    pub fn add_layer(&mut self, draft: LayerDraft) -> Result<Layer, StoreError> {
        let _span = op_span("add_layer");

        if draft.kind == LayerKind::Image && self.check_resource_limit() {
            warn!(limit = MAX_IMAGE_LAYERS, "Image layer rejected");
            return Err(StoreError::ResourceLimitExceeded { limit: MAX_IMAGE_LAYERS });
        }
        if let Some(id) = &draft.id {
            if self.position(id).is_some() {
                return Err(StoreError::DuplicateId(id.clone()));
            }
        }

        let layer = draft.build(self.fresh_id(), self.locale)?;
        info!(layer = %layer.id, kind = %layer.kind(), "Added layer");
        self.current.push(layer.clone());
        self.modified = true;
        Ok(layer)
    }

    /// Merge `patch` into the layer; the layer is untouched if the result is invalid
    pub fn update_layer(&mut self, id: &LayerId, patch: &LayerPatch) -> Result<(), StoreError> {
        let _span = op_span("update_layer");

        let index = self.position(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let next = self.current[index].patched(patch, self.locale)?;
        debug!(layer = %id, name = %next.name, "Updated layer");
        self.current[index] = next;
        self.modified = true;
        Ok(())
    }

    /// Replace the full geometry of one layer
    pub fn move_or_resize(&mut self, id: &LayerId, geometry: Geometry) -> Result<(), StoreError> {
        let _span = op_span("move_or_resize");

        geometry.validate()?;
        let index = self.position(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.current[index].geometry = geometry;
        debug!(layer = %id, x = geometry.x, y = geometry.y, "Moved layer");
        self.modified = true;
        Ok(())
    }

    /// Translate every listed layer by the same delta
    ///
    /// Unknown ids are skipped. Returns how many layers moved.
    pub fn move_by_delta(&mut self, ids: &[LayerId], dx: f64, dy: f64) -> usize {
        let _span = op_span("move_by_delta");

        if !dx.is_finite() || !dy.is_finite() {
            warn!(dx, dy, "Ignoring non-finite move delta");
            return 0;
        }

        let targets: HashSet<&LayerId> = ids.iter().collect();
        let mut moved = 0;
        for layer in self.current.iter_mut().filter(|l| targets.contains(&l.id)) {
            layer.geometry = layer.geometry.translated(dx, dy);
            moved += 1;
        }
        if moved > 0 {
            debug!(count = moved, dx, dy, "Moved layers");
            self.modified = true;
        }
        moved
    }

    /// Delete one layer; absent ids are a no-op
    pub fn remove_layer(&mut self, id: &LayerId) -> bool {
        let _span = op_span("remove_layer");
        self.remove_matching(std::slice::from_ref(id)) > 0
    }

    /// Delete every listed layer, skipping absent ids
    pub fn remove_layers(&mut self, ids: &[LayerId]) -> usize {
        let _span = op_span("remove_layers");
        self.remove_matching(ids)
    }

    fn remove_matching(&mut self, ids: &[LayerId]) -> usize {
        let before = self.current.len();
        self.current.retain(|l| !ids.contains(&l.id));
        for id in ids {
            self.selection.remove(id);
        }

        let removed = before - self.current.len();
        if removed > 0 {
            info!(count = removed, "Removed layers");
            self.modified = true;
        }
        removed
    }

    /// Replace the whole canvas with fresh layers built from `drafts`
    ///
    /// Every draft is validated first; on any failure nothing changes.
    pub fn load_template(&mut self, drafts: Vec<LayerDraft>) -> Result<(), StoreError> {
        let _span = op_span("load_template");

        let images = drafts.iter().filter(|d| d.kind == LayerKind::Image).count();
        if images > MAX_IMAGE_LAYERS {
            return Err(StoreError::ResourceLimitExceeded { limit: MAX_IMAGE_LAYERS });
        }

        let mut seen = HashSet::new();
        let mut layers = Vec::with_capacity(drafts.len());
        for mut draft in drafts {
            // Template layers never keep caller ids
            draft.id = None;
            let mut id = LayerId::generate();
            while self.position(&id).is_some() || seen.contains(&id) {
                id = LayerId::generate();
            }
            seen.insert(id.clone());
            layers.push(draft.build(id, self.locale)?);
        }

        info!(layers = layers.len(), "Loaded template");
        self.current = layers;
        self.selection.clear();
        self.modified = true;
        Ok(())
    }

    /// Load one of the built-in templates by id
    pub fn load_builtin_template(&mut self, template_id: &str) -> Result<(), StoreError> {
        let template =
            templates::find(template_id).ok_or_else(|| StoreError::UnknownTemplate(template_id.to_string()))?;
        self.load_template(template.layers)
    }

    /// Persist and publish `current`
    ///
    /// Returns false on failure, leaving the dirty flag set and the failure in
    /// [`Self::last_error`].
    pub fn save(&mut self) -> bool {
        match self.try_save() {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Save failed");
                false
            }
        }
    }

    pub fn try_save(&mut self) -> Result<(), StoreError> {
        let _span = op_span("save");

        if let Err(e) = self.persistence.write(&self.current) {
            let err = StoreError::persistence(&e);
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        self.channel.post_update(&self.current);
        self.previous = self.current.clone();
        self.modified = false;
        self.last_error = None;
        info!(layers = self.current.len(), "Saved layers");
        Ok(())
    }

    /// Restore every layer's geometry from the last save
    pub fn reset_to_previous(&mut self) {
        let _span = op_span("reset_to_previous");
        let recorded = geometry_by_id(&self.previous);
        self.apply_geometry(&recorded);
    }

    /// Restore every layer's geometry from the loaded state
    pub fn reset_to_initial(&mut self) {
        let _span = op_span("reset_to_initial");
        let recorded = geometry_by_id(&self.initial);
        self.apply_geometry(&recorded);
    }

    /// Layers without a record keep their current geometry. The store is
    /// marked dirty either way.
    fn apply_geometry(&mut self, recorded: &HashMap<LayerId, Geometry>) {
        let mut restored = 0;
        for layer in &mut self.current {
            if let Some(geometry) = recorded.get(&layer.id) {
                layer.geometry = *geometry;
                restored += 1;
            }
        }
        debug!(restored, total = self.current.len(), "Reset geometry");
        self.modified = true;
    }

    /// Click on a layer; false if the id is not on the canvas
    pub fn select(&mut self, id: &LayerId, additive: bool) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.selection.select(id, additive);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Remove everything selected
    pub fn delete_selected(&mut self) -> usize {
        if let Some(id) = self.selection.single().cloned() {
            return usize::from(self.remove_layer(&id));
        }
        let ids = self.selection.ids();
        if ids.is_empty() {
            return 0;
        }
        self.remove_layers(&ids)
    }

    /// End of a drag on `id`, with the layer's new geometry
    ///
    /// Dragging a member of a multi-selection moves the whole group by the
    /// drag delta; otherwise the geometry is replaced.
    pub fn drag_stop(&mut self, id: &LayerId, geometry: Geometry) -> Result<(), StoreError> {
        if self.selection.is_multi() && self.selection.contains(id) {
            let start = self
                .get(id)
                .map(|l| l.geometry)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let ids = self.selection.ids();
            self.move_by_delta(&ids, geometry.x - start.x, geometry.y - start.y);
            return Ok(());
        }
        self.move_or_resize(id, geometry)
    }

    /// Apply a key press to the selection; true if it produced an action
    pub fn handle_key(&mut self, input: &KeyInput) -> bool {
        match key_action(&self.selection, input) {
            Some(KeyAction::Nudge { dx, dy }) => {
                let ids = self.selection.ids();
                self.move_by_delta(&ids, dx, dy);
                true
            }
            Some(KeyAction::DeleteSelected) => {
                self.delete_selected();
                true
            }
            None => false,
        }
    }

    /// Tear down the sync channel
    pub fn close(&mut self) {
        self.channel.close();
    }
}

fn geometry_by_id(snapshot: &[Layer]) -> HashMap<LayerId, Geometry> {
    snapshot.iter().map(|l| (l.id.clone(), l.geometry)).collect()
}

/// Give every repeated id a fresh one so the store starts unique
fn dedupe_ids(mut layers: Vec<Layer>) -> Vec<Layer> {
    let mut seen = HashSet::new();
    for layer in &mut layers {
        if !seen.insert(layer.id.clone()) {
            let fresh = LayerId::generate();
            warn!(layer = %layer.id, replacement = %fresh, "Duplicate layer id in persisted snapshot");
            layer.id = fresh.clone();
            seen.insert(fresh);
        }
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerContent, ShapeType};
    use crate::persistence::{FileSnapshotStore, MemorySnapshotStore, Scope};
    use crate::selection::{subscribe, Key};
    use crate::sync::LocalBus;
    use std::sync::mpsc;

    fn empty_store() -> (ResourceStore, MemorySnapshotStore) {
        let persistence = MemorySnapshotStore::new();
        persistence.write(&Vec::new()).unwrap();
        let store = ResourceStore::load(Arc::new(persistence.clone()), Box::new(LocalBus::new().channel()), Locale::En);
        (store, persistence)
    }

    fn image(n: usize) -> LayerDraft {
        LayerDraft::image(format!("file:///tmp/{n}.png"), format!("{n}.png"))
    }

    #[test]
    fn test_seeds_sample_when_nothing_persisted() {
        let store = ResourceStore::load(
            Arc::new(MemorySnapshotStore::new()),
            Box::new(LocalBus::new().channel()),
            Locale::En,
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.layers()[0].id.as_str(), "resource-1");
        assert_eq!(store.initial(), store.layers());
        assert!(!store.is_modified());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_load_failure_starts_empty_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FileSnapshotStore::new(dir.path(), &Scope::Global);
        std::fs::write(persistence.path(), "[{broken").unwrap();

        let store = ResourceStore::load(Arc::new(persistence), Box::new(LocalBus::new().channel()), Locale::En);
        assert!(store.is_empty());
        assert!(store.last_error().unwrap().contains("Failed to load"));
    }

    #[test]
    fn test_load_repairs_duplicate_ids() {
        let persistence = MemorySnapshotStore::new();
        let a = LayerDraft::text("A").build(LayerId::from("dup"), Locale::En).unwrap();
        let b = LayerDraft::text("B").build(LayerId::from("dup"), Locale::En).unwrap();
        persistence.write(&vec![a, b]).unwrap();

        let store = ResourceStore::load(Arc::new(persistence), Box::new(LocalBus::new().channel()), Locale::En);
        assert_eq!(store.len(), 2);
        assert_ne!(store.layers()[0].id, store.layers()[1].id);
    }

    #[test]
    fn test_text_layer_lifecycle() {
        let (mut store, _) = empty_store();

        let layer = store.add_layer(LayerDraft::text("SCORE").font_size(24.0)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(layer.opacity, 1.0);

        store.update_layer(&layer.id, &LayerPatch::text("SCORE: 10")).unwrap();
        assert_eq!(store.get(&layer.id).unwrap().name, "Text: SCORE: 10");

        store.update_layer(&layer.id, &LayerPatch::text("SCORE: 10 to 7")).unwrap();
        assert_eq!(store.get(&layer.id).unwrap().name, "Text: SCORE: 10 ...");

        assert!(store.remove_layer(&layer.id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let (mut store, _) = empty_store();
        let missing = LayerId::from("missing");
        assert_eq!(
            store.update_layer(&missing, &LayerPatch::text("x")),
            Err(StoreError::NotFound(missing.clone()))
        );
        assert!(!store.remove_layer(&missing));
        assert!(!store.is_modified());
    }

    #[test]
    fn test_sixteenth_image_rejected() {
        let (mut store, _) = empty_store();
        for n in 0..15 {
            store.add_layer(image(n)).unwrap();
        }
        assert!(store.check_resource_limit());

        let before = store.current();
        assert_eq!(
            store.add_layer(image(15)),
            Err(StoreError::ResourceLimitExceeded { limit: 15 })
        );
        assert_eq!(store.current(), before);
        assert_eq!(store.image_count(), 15);

        // Other kinds are still admitted
        store.add_layer(LayerDraft::shape(ShapeType::Rect)).unwrap();
    }

    #[test]
    fn test_ids_stay_unique() {
        let (mut store, _) = empty_store();
        let first = store.add_layer(LayerDraft::text("A").with_id("fixed")).unwrap();
        assert_eq!(
            store.add_layer(LayerDraft::text("B").with_id("fixed")),
            Err(StoreError::DuplicateId(first.id.clone()))
        );
        for _ in 0..20 {
            store.add_layer(LayerDraft::shape(ShapeType::Circle)).unwrap();
        }
        store
            .load_template(vec![LayerDraft::text("T").with_id("fixed"), LayerDraft::text("U").with_id("fixed")])
            .unwrap();

        let ids: HashSet<_> = store.layers().iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids.len(), store.len());
        assert!(!ids.contains(&LayerId::from("fixed")));
    }

    #[test]
    fn test_template_replaces_everything() {
        let (mut store, _) = empty_store();
        for text in ["A", "B", "C"] {
            store.add_layer(LayerDraft::text(text)).unwrap();
        }
        assert!(store.save());
        let old: Vec<_> = store.layers().iter().map(|l| l.id.clone()).collect();
        store.select(&old[0], false);

        let rect = LayerDraft::shape(ShapeType::Rect).at(0.0, 0.0).sized(100.0, 50.0).fill("#fff");
        store.load_template(vec![rect]).unwrap();

        assert_eq!(store.len(), 1);
        assert!(!old.contains(&store.layers()[0].id));
        assert!(store.is_modified());
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_empty_template_is_valid() {
        let (mut store, _) = empty_store();
        store.add_layer(LayerDraft::text("A")).unwrap();
        store.load_template(Vec::new()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalid_template_changes_nothing() {
        let (mut store, _) = empty_store();
        store.add_layer(LayerDraft::text("KEEP")).unwrap();
        let before = store.current();

        let result = store.load_template(vec![LayerDraft::text("ok"), LayerDraft::text("")]);
        assert!(matches!(result, Err(StoreError::InvalidLayer(_))));
        assert_eq!(store.current(), before);

        let too_many: Vec<_> = (0..16).map(image).collect();
        assert!(matches!(
            store.load_template(too_many),
            Err(StoreError::ResourceLimitExceeded { .. })
        ));
        assert!(matches!(
            store.load_builtin_template("nope"),
            Err(StoreError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_group_move() {
        let (mut store, _) = empty_store();
        let a = store.add_layer(LayerDraft::text("A").at(10.0, 10.0)).unwrap();
        let b = store.add_layer(LayerDraft::text("B").at(20.0, 20.0)).unwrap();
        let c = store.add_layer(LayerDraft::text("C").at(30.0, 30.0)).unwrap();

        store.select(&a.id, false);
        store.select(&b.id, true);
        assert_eq!(store.selection().len(), 2);

        let moved = store.move_by_delta(&store.selection().ids(), 5.0, -5.0);
        assert_eq!(moved, 2);
        assert_eq!(store.get(&a.id).unwrap().geometry.x, 15.0);
        assert_eq!(store.get(&a.id).unwrap().geometry.y, 5.0);
        assert_eq!(store.get(&b.id).unwrap().geometry.x, 25.0);
        assert_eq!(store.get(&b.id).unwrap().geometry.y, 15.0);
        assert_eq!(store.get(&c.id).unwrap().geometry, c.geometry);
    }

    #[test]
    fn test_move_by_delta_ignores_unknown_ids() {
        let (mut store, _) = empty_store();
        assert_eq!(store.move_by_delta(&[LayerId::from("ghost")], 1.0, 1.0), 0);
        assert!(!store.is_modified());
    }

    #[test]
    fn test_resize_rejects_zero_size() {
        let (mut store, _) = empty_store();
        let layer = store.add_layer(LayerDraft::shape(ShapeType::Rect)).unwrap();
        let result = store.move_or_resize(&layer.id, Geometry::new(0.0, 0.0, 0.0, 10.0));
        assert!(matches!(result, Err(StoreError::InvalidLayer(_))));
        assert_eq!(store.get(&layer.id).unwrap().geometry, layer.geometry);
    }

    #[test]
    fn test_reset_to_initial_restores_geometry_only() {
        let persistence = MemorySnapshotStore::new();
        let seeded = LayerDraft::text("HOME").at(10.0, 20.0).build(LayerId::from("t"), Locale::En).unwrap();
        persistence.write(&vec![seeded.clone()]).unwrap();
        let mut store = ResourceStore::load(Arc::new(persistence), Box::new(LocalBus::new().channel()), Locale::En);

        store.move_or_resize(&seeded.id, Geometry::new(300.0, 400.0, 50.0, 60.0)).unwrap();
        store.update_layer(&seeded.id, &LayerPatch::text("AWAY")).unwrap();
        assert!(store.save());

        store.reset_to_initial();
        let layer = store.get(&seeded.id).unwrap();
        assert_eq!(layer.geometry, seeded.geometry);
        match &layer.content {
            LayerContent::Text(text) => assert_eq!(text.text, "AWAY"),
            other => panic!("expected text, got {other:?}"),
        }
        assert!(store.is_modified());
    }

    #[test]
    fn test_reset_keeps_unsaved_layer_geometry() {
        let (mut store, _) = empty_store();
        let layer = store.add_layer(LayerDraft::text("NEW").at(5.0, 5.0)).unwrap();
        store.reset_to_previous();
        assert_eq!(store.get(&layer.id).unwrap().geometry, layer.geometry);
        assert!(store.is_modified());
    }

    #[test]
    fn test_save_commits_previous() {
        let (mut store, persistence) = empty_store();
        let layer = store.add_layer(LayerDraft::text("A")).unwrap();
        store.move_or_resize(&layer.id, Geometry::new(1.0, 2.0, 30.0, 40.0)).unwrap();
        assert!(store.save());
        assert!(!store.is_modified());
        assert_eq!(persistence.read().unwrap(), Some(store.current()));

        let before = store.current();
        store.reset_to_previous();
        assert_eq!(store.current(), before);
    }

    #[test]
    fn test_failed_save_keeps_dirty_state() {
        let (mut store, persistence) = empty_store();
        store.add_layer(LayerDraft::text("A")).unwrap();
        persistence.set_fail_writes(true);

        assert!(!store.save());
        assert!(store.is_modified());
        assert_eq!(store.len(), 1);
        assert!(store.last_error().unwrap().contains("unavailable"));
        assert_eq!(persistence.read().unwrap(), Some(Vec::new()));

        persistence.set_fail_writes(false);
        assert!(store.save());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_save_publishes_to_subscribers() {
        let bus = LocalBus::new();
        let mut viewer = bus.channel();
        let (tx, rx) = mpsc::channel();
        viewer
            .on_update(Box::new(move |s| {
                let _ = tx.send(s);
            }))
            .unwrap();

        let persistence = MemorySnapshotStore::new();
        let mut store = ResourceStore::load(Arc::new(persistence.clone()), Box::new(bus.channel()), Locale::En);
        store.add_layer(LayerDraft::text("LIVE")).unwrap();
        assert!(rx.try_recv().is_err());

        assert!(store.save());
        assert_eq!(rx.try_recv().unwrap(), store.current());

        // No publish when the write fails
        store.add_layer(LayerDraft::text("LOST")).unwrap();
        persistence.set_fail_writes(true);
        assert!(!store.save());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delete_selected() {
        let (mut store, _) = empty_store();
        let a = store.add_layer(LayerDraft::text("A")).unwrap();
        let b = store.add_layer(LayerDraft::text("B")).unwrap();
        let c = store.add_layer(LayerDraft::text("C")).unwrap();

        store.select(&a.id, false);
        assert_eq!(store.delete_selected(), 1);

        store.select(&b.id, false);
        store.select(&c.id, true);
        assert_eq!(store.delete_selected(), 2);
        assert!(store.is_empty());
        assert!(store.selection().is_empty());
        assert_eq!(store.delete_selected(), 0);
    }

    #[test]
    fn test_select_unknown_id_ignored() {
        let (mut store, _) = empty_store();
        assert!(!store.select(&LayerId::from("ghost"), false));
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_drag_stop_moves_group() {
        let (mut store, _) = empty_store();
        let a = store.add_layer(LayerDraft::text("A").at(0.0, 0.0)).unwrap();
        let b = store.add_layer(LayerDraft::text("B").at(50.0, 50.0)).unwrap();
        store.select(&a.id, false);
        store.select(&b.id, true);

        let dragged = a.geometry.translated(10.0, 20.0);
        store.drag_stop(&a.id, dragged).unwrap();
        assert_eq!(store.get(&b.id).unwrap().geometry.x, 60.0);
        assert_eq!(store.get(&b.id).unwrap().geometry.y, 70.0);

        // Single layer drag replaces geometry
        store.clear_selection();
        store.drag_stop(&b.id, Geometry::new(1.0, 1.0, 10.0, 10.0)).unwrap();
        assert_eq!(store.get(&b.id).unwrap().geometry, Geometry::new(1.0, 1.0, 10.0, 10.0));
    }

    #[test]
    fn test_keyboard_nudge_and_delete() {
        let (mut store, _) = empty_store();
        let layer = store.add_layer(LayerDraft::text("A").at(10.0, 10.0)).unwrap();
        store.select(&layer.id, false);

        let (sender, subscription) = subscribe();
        sender.send(KeyInput::new(Key::ArrowRight));
        sender.send(KeyInput::new(Key::ArrowDown).with_modifier());
        sender.send(KeyInput::new(Key::ArrowLeft).in_text_input());
        assert_eq!(subscription.pump(&mut store), 2);

        let geometry = store.get(&layer.id).unwrap().geometry;
        assert_eq!((geometry.x, geometry.y), (11.0, 20.0));

        sender.send(KeyInput::new(Key::Delete));
        assert_eq!(subscription.pump(&mut store), 1);
        assert!(store.is_empty());

        subscription.unsubscribe();
        assert!(!sender.send(KeyInput::new(Key::Delete)));
    }
}
