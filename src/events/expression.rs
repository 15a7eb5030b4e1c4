use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::changer::{ChangeMode, Mutator};
use crate::core::{Extracted, TypeKey, Value};
use crate::errors::{ChangeError, SetupError};
use crate::events::registry::{EventValueRegistry, ResolvedGetter, TimeVariant};
use crate::parse::StringMode;
use crate::registry::TypeRegistry;

/// An `event-<type>` expression bound to the events of one trigger.
///
/// Keeps its own cache from concrete event class to getter; changing the
/// time variant clears it without touching the shared registry cache.
pub struct EventValueExpression {
    registry: Arc<EventValueRegistry>,
    value_type: TypeKey,
    time: TimeVariant,
    exact: bool,
    single: bool,
    events: Vec<TypeKey>,
    mutator: Option<Arc<dyn Mutator>>,
    getters: RwLock<HashMap<TypeKey, Option<Arc<ResolvedGetter>>>>,
}

impl EventValueExpression {
    pub fn new(registry: Arc<EventValueRegistry>, value_type: TypeKey) -> Self {
        Self {
            registry,
            value_type,
            time: TimeVariant::Default,
            exact: false,
            single: true,
            events: Vec::new(),
            mutator: None,
            getters: RwLock::new(HashMap::new()),
        }
    }

    /// Only accept getters declared for exactly the value type.
    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Return every extracted value instead of the first.
    pub fn plural(mut self) -> Self {
        self.single = false;
        self
    }

    /// Use this mutator instead of the value type's own.
    pub fn with_mutator(mut self, mutator: Arc<dyn Mutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }

    pub fn time(&self) -> TimeVariant {
        self.time
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    pub fn events(&self) -> &[TypeKey] {
        &self.events
    }

    /// Bind to the trigger's declared events and check that at least one of
    /// them can provide the value.
    pub fn init(&mut self, events: &[TypeKey]) -> Result<(), SetupError> {
        let getters = self.bind(events, self.time)?;
        self.events = events.to_vec();
        *self.getters.get_mut() = getters;
        Ok(())
    }

    /// Resolve every bound event for `time` without touching the current
    /// state.
    fn bind(
        &self,
        events: &[TypeKey],
        time: TimeVariant,
    ) -> Result<HashMap<TypeKey, Option<Arc<ResolvedGetter>>>, SetupError> {
        let mut getters = HashMap::with_capacity(events.len());
        let mut has_value = false;
        for &event in events {
            let getter = self.lookup(event, time)?;
            has_value |= getter.is_some()
                || self.registry.has_getter_below(event, self.value_type, time);
            getters.insert(event, getter);
        }

        if has_value {
            Ok(getters)
        } else {
            let hierarchy = self.registry.hierarchy();
            Err(SetupError::NoEventValue {
                value: hierarchy.name(self.value_type).to_string(),
                events: events
                    .iter()
                    .map(|&e| hierarchy.name(e).to_string())
                    .collect(),
            })
        }
    }

    /// Switch to another time variant. Returns `Ok(false)` and keeps the
    /// current state when none of the bound events has time states.
    pub fn set_time(&mut self, time: TimeVariant) -> Result<bool, SetupError> {
        let supported = self
            .events
            .iter()
            .any(|&e| self.registry.has_time_states(e, self.value_type, self.exact));
        if !supported {
            return Ok(false);
        }

        // A failed rebind leaves the old time and cache in place.
        let getters = self.bind(&self.events, time)?;
        self.time = time;
        *self.getters.get_mut() = getters;
        Ok(true)
    }

    /// Values for a runtime event.
    pub fn get(&self, event: &Value) -> Option<Extracted> {
        let getter = self.getter_for(event.ty())?;
        let extracted = getter.get(event)?;
        match extracted {
            Extracted::Many(values) if self.single => values.into_iter().next().map(Extracted::One),
            other => Some(other),
        }
    }

    pub fn get_values(&self, event: &Value) -> Vec<Value> {
        self.get(event).map(Extracted::into_vec).unwrap_or_default()
    }

    /// Delta types accepted for `mode`, decided at setup time.
    pub fn accept_change(&self, types: &TypeRegistry, mode: ChangeMode) -> Result<Vec<TypeKey>, SetupError> {
        self.mutator_in(types)
            .and_then(|m| m.accept_change(mode))
            .ok_or_else(|| SetupError::UnsupportedChange {
                value: types.hierarchy().name(self.value_type).to_string(),
                mode,
            })
    }

    pub fn change(
        &self,
        types: &TypeRegistry,
        event: &Value,
        delta: Option<&[Value]>,
        mode: ChangeMode,
    ) -> Result<(), ChangeError> {
        let mutator = self.mutator_in(types).ok_or(ChangeError::Unsupported(mode))?;
        let targets = self.get_values(event);
        mutator.change(&targets, delta, mode)
    }

    /// `event-<name>`, or the debug form of the current values when `debug`
    /// is set and an event is given.
    pub fn describe(&self, types: &TypeRegistry, event: Option<&Value>, debug: bool) -> String {
        match event {
            Some(event) if debug => match self.get(event) {
                Some(values) => types.display_extracted(&values, StringMode::Debug),
                None => types.display_config().none_text.clone(),
            },
            _ => {
                let name = types
                    .closest_entry(self.value_type)
                    .map(|e| e.display_name().to_string())
                    .unwrap_or_else(|| types.hierarchy().name(self.value_type).to_string());
                format!("event-{}", name)
            }
        }
    }

    fn mutator_in<'a>(&'a self, types: &'a TypeRegistry) -> Option<&'a Arc<dyn Mutator>> {
        self.mutator.as_ref().or_else(|| {
            types
                .closest_entry(self.value_type)
                .and_then(|e| e.mutator())
        })
    }

    fn lookup(
        &self,
        event: TypeKey,
        time: TimeVariant,
    ) -> Result<Option<Arc<ResolvedGetter>>, SetupError> {
        let resolved = if self.exact {
            self.registry.resolve_exact(event, self.value_type, time)
        } else {
            self.registry.resolve(event, self.value_type, time)
        };
        Ok(resolved?)
    }

    fn getter_for(&self, event: TypeKey) -> Option<Arc<ResolvedGetter>> {
        if let Some(cached) = self.getters.read().get(&event) {
            return cached.clone();
        }

        let getter = match self.lookup(event, self.time) {
            Ok(getter) => getter,
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        self.getters
            .write()
            .entry(event)
            .or_insert(getter)
            .clone()
    }
}

impl fmt::Debug for EventValueExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventValueExpression")
            .field("value_type", &self.value_type)
            .field("time", &self.time)
            .field("exact", &self.exact)
            .field("single", &self.single)
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HierarchyBuilder;
    use crate::events::EventValueBuilder;
    use crate::registry::{RegistryBuilder, TypeEntry};

    #[test]
    fn test_init_and_get() {
        let mut b = HierarchyBuilder::new();
        let event = b.declare("Event", &[]).unwrap();
        let join = b.declare("JoinEvent", &[event]).unwrap();
        let quit = b.declare("QuitEvent", &[event]).unwrap();
        let player = b.declare("Player", &[]).unwrap();
        let h = Arc::new(b.build());

        let mut types = RegistryBuilder::new(Arc::clone(&h));
        types
            .register(TypeEntry::new("player", player).with_name("player"))
            .unwrap();
        let types = types.freeze().unwrap();

        let mut builder = EventValueBuilder::new(h);
        builder.register_getter(join, player, TimeVariant::Default, move |e| {
            let name = e.downcast_ref::<String>()?;
            Some(Extracted::One(Value::new(player, name.clone())))
        });
        let events = Arc::new(builder.freeze(&types));

        let mut expr = EventValueExpression::new(Arc::clone(&events), player);
        expr.init(&[join]).unwrap();
        let got = expr.get(&Value::new(join, "alex".to_string())).unwrap();
        assert_eq!(got.len(), 1);
        assert!(expr.get(&Value::new(quit, "alex".to_string())).is_none());
        assert_eq!(expr.describe(&types, None, false), "event-player");

        let mut other = EventValueExpression::new(events, player);
        assert_eq!(
            other.init(&[quit]),
            Err(SetupError::NoEventValue {
                value: "Player".to_string(),
                events: vec!["QuitEvent".to_string()],
            })
        );
    }
}
