//! Session controller.
//!
//! A [`NativeMap`] owns the caller's current context and, while attached, one
//! engine. Context updates are applied to the engine as a diff against the
//! previous context, so unchanged layers are never rebuilt.

use std::rc::Rc;

use context::{ContextParam, MapContext, added_layers, has_param_changed, removed_layers};
use futures_util::future::join_all;
use layers::{
    ClickEvent, EngineFactory, EngineLayer, Fetcher, ListenerKey, MapConfig, MapEngine,
    SurfaceTarget, add_layer, features_at_coordinate, get_engine_layers, remove_layer,
    set_has_base_map, set_view, view_projection,
};
use runtime::{Activation, EventBus, ListenerId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::events::FeaturesClicked;

struct ClickSubscription {
    key: ListenerKey,
    events: mpsc::UnboundedReceiver<ClickEvent>,
}

pub struct NativeMap<F: EngineFactory> {
    factory: F,
    target: SurfaceTarget,
    fetcher: Rc<dyn Fetcher>,
    config: MapConfig,
    context: Option<MapContext>,
    engine: Option<F::Engine>,
    features_clicked: EventBus<FeaturesClicked>,
    clicks: Option<ClickSubscription>,
}

impl<F: EngineFactory> NativeMap<F> {
    pub fn new(factory: F, target: SurfaceTarget, fetcher: Rc<dyn Fetcher>, config: MapConfig) -> Self {
        Self {
            factory,
            target,
            fetcher,
            config,
            context: None,
            engine: None,
            features_clicked: EventBus::new(),
            clicks: None,
        }
    }

    pub fn context(&self) -> Option<&MapContext> {
        self.context.as_ref()
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn target(&self) -> &SurfaceTarget {
        &self.target
    }

    pub fn is_attached(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> Option<&F::Engine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut F::Engine> {
        self.engine.as_mut()
    }

    /// Replaces the context. While attached, the difference with the previous
    /// context is applied to the engine right away; otherwise the context is
    /// kept for the next [`attach`](Self::attach).
    pub fn set_context(&mut self, context: MapContext) -> Result<(), SessionError> {
        let old = self.context.replace(context);
        let (Some(engine), Some(new)) = (self.engine.as_mut(), self.context.as_ref()) else {
            return Ok(());
        };
        apply_context(engine, new, old.as_ref(), &self.config)
    }

    /// Creates the engine on the target surface and renders the current
    /// context. The engine stays attached even if the context could not be
    /// fully applied.
    pub fn attach(&mut self) -> Result<(), SessionError> {
        if self.engine.is_some() {
            debug!(surface = %self.target.id, "already attached");
            return Ok(());
        }
        info!(surface = %self.target.id, "attaching map");
        let mut engine = self.factory.create_surface_binding(&self.target);
        let no_base_map = self
            .context
            .as_ref()
            .and_then(|c| c.no_base_map)
            .unwrap_or(false);
        set_has_base_map(&mut engine, !no_base_map, &self.config);

        let engine = self.engine.insert(engine);
        let applied = match &self.context {
            Some(context) => apply_context(engine, context, None, &self.config),
            None => Ok(()),
        };
        engine.update_size();

        if !self.features_clicked.is_empty() {
            self.enable_clicks();
        }
        applied
    }

    /// Disposes the engine. Registered listeners are kept and get clicks
    /// again after the next attach.
    pub fn detach(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        if let Some(clicks) = self.clicks.take() {
            engine.un_listen(clicks.key);
        }
        engine.dispose();
        info!(surface = %self.target.id, "map detached");
    }

    /// For every layer of the current context, in order, the engine layer
    /// rendering it. Empty while detached or without context.
    pub fn engine_layers(&self) -> Vec<Option<&EngineLayer>> {
        match (&self.engine, &self.context) {
            (Some(engine), Some(context)) => get_engine_layers(engine, context),
            _ => Vec::new(),
        }
    }

    /// Registers a click listener. The engine is only watched for clicks
    /// while at least one listener is registered.
    pub fn add_features_clicked_listener(
        &mut self,
        listener: impl FnMut(&FeaturesClicked) + 'static,
    ) -> Result<ListenerId, SessionError> {
        if self.engine.is_none() {
            return Err(SessionError::NotAttached);
        }
        let (id, activation) = self.features_clicked.subscribe(listener);
        if activation == Activation::Activated {
            self.enable_clicks();
        }
        Ok(id)
    }

    pub fn remove_features_clicked_listener(&mut self, id: ListenerId) {
        if self.features_clicked.unsubscribe(id) == Activation::Deactivated {
            self.disable_clicks();
        }
    }

    pub fn is_listening_clicks(&self) -> bool {
        self.clicks.is_some()
    }

    /// Handles every click received so far. Returns the number of clicks
    /// handled.
    pub async fn process_clicks(&mut self) -> usize {
        let Some(clicks) = self.clicks.as_mut() else {
            return 0;
        };
        let mut events = Vec::new();
        while let Ok(event) = clicks.events.try_recv() {
            events.push(event);
        }
        self.dispatch_clicks(events).await
    }

    /// Waits for the next click, then handles it together with the clicks
    /// queued behind it. Returns 0 once clicks can no longer arrive.
    pub async fn next_clicks(&mut self) -> usize {
        let Some(clicks) = self.clicks.as_mut() else {
            return 0;
        };
        let Some(first) = clicks.events.recv().await else {
            return 0;
        };
        let mut events = vec![first];
        while let Ok(event) = clicks.events.try_recv() {
            events.push(event);
        }
        self.dispatch_clicks(events).await
    }

    /// Queries all clicks concurrently and emits their events in click order.
    async fn dispatch_clicks(&mut self, events: Vec<ClickEvent>) -> usize {
        let Some(engine) = self.engine.as_ref() else {
            return 0;
        };
        if events.is_empty() {
            return 0;
        }
        let empty = MapContext::new();
        let context = self.context.as_ref().unwrap_or(&empty);
        let fetcher = self.fetcher.as_ref();
        let config = &self.config;
        let results = join_all(
            events
                .iter()
                .map(|e| features_at_coordinate(engine, context, fetcher, e.coordinate, config)),
        )
        .await;

        let projection = engine.projection();
        for (event, features) in events.iter().zip(results) {
            self.features_clicked.emit(&FeaturesClicked {
                coordinate: event.coordinate,
                lon_lat: projection.to_lon_lat(event.coordinate),
                features,
            });
        }
        events.len()
    }

    fn enable_clicks(&mut self) {
        if self.clicks.is_some() {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let (sink, events) = mpsc::unbounded_channel();
        let key = engine.on_click(sink);
        debug!("watching clicks");
        self.clicks = Some(ClickSubscription { key, events });
    }

    fn disable_clicks(&mut self) {
        let Some(clicks) = self.clicks.take() else {
            return;
        };
        if let Some(engine) = self.engine.as_mut() {
            engine.un_listen(clicks.key);
        }
        debug!("stopped watching clicks");
    }
}

/// Brings the engine from `old` to `new`: added layers, removed layers, view,
/// then base map.
///
/// A step that fails is skipped and the remaining steps still run, so the
/// engine keeps matching the layer list of `new`. The first failure is
/// returned.
fn apply_context<E: MapEngine>(
    engine: &mut E,
    new: &MapContext,
    old: Option<&MapContext>,
    config: &MapConfig,
) -> Result<(), SessionError> {
    let mut failure = None;
    let view_changed = has_param_changed(ContextParam::View, new, old);
    let next_view = match (&new.view, view_changed) {
        (Some(view), true) => match view_projection(view, config) {
            Ok(projection) => Some((view, projection)),
            Err(err) => {
                warn!(error = %err, "context view not applied");
                failure = Some(SessionError::from(err));
                None
            }
        },
        _ => None,
    };
    // Layers are built in the projection the view is about to use.
    let projection = next_view
        .as_ref()
        .map_or_else(|| engine.projection(), |(_, projection)| *projection);

    let added = added_layers(new, old);
    let removed = removed_layers(new, old);
    debug!(added = added.len(), removed = removed.len(), view_changed, "applying context");
    for layer in &added {
        add_layer(engine, &layer.layer, layer.position, projection, config);
    }
    for layer in &removed {
        if let Err(err) = remove_layer(engine, layer) {
            warn!(error = %err, "context layer not removed");
            failure.get_or_insert(err.into());
        }
    }
    if let Some((view, _)) = next_view {
        if let Err(err) = set_view(engine, view, config) {
            warn!(error = %err, "context view not applied");
            failure.get_or_insert(err.into());
        }
    }
    if has_param_changed(ContextParam::NoBaseMap, new, old) {
        set_has_base_map(engine, !new.no_base_map.unwrap_or(false), config);
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
