use std::fmt;
use std::sync::Arc;

use crate::convert::ConversionGraph;
use crate::core::{Extracted, TypeHierarchy, TypeKey, Value};
use crate::errors::ResolveError;
use crate::performance::{CacheStats, DispatchCache};
use crate::registry::TypeRegistry;

/// Whether a value reflects the state before, during or after the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeVariant {
    Before,
    Default,
    After,
}

impl TimeVariant {
    pub fn offset(self) -> i8 {
        match self {
            TimeVariant::Before => -1,
            TimeVariant::Default => 0,
            TimeVariant::After => 1,
        }
    }

    pub fn from_offset(offset: i8) -> Option<Self> {
        match offset {
            -1 => Some(TimeVariant::Before),
            0 => Some(TimeVariant::Default),
            1 => Some(TimeVariant::After),
            _ => None,
        }
    }
}

pub type GetterFn = dyn Fn(&Value) -> Option<Extracted> + Send + Sync;

/// A getter extracting one kind of value from events of a declared type.
#[derive(Clone)]
pub struct EventGetterEntry {
    event: TypeKey,
    value_type: TypeKey,
    time: TimeVariant,
    getter: Arc<GetterFn>,
    supports_multiple: bool,
}

impl EventGetterEntry {
    pub fn new(
        event: TypeKey,
        value_type: TypeKey,
        time: TimeVariant,
        getter: impl Fn(&Value) -> Option<Extracted> + Send + Sync + 'static,
    ) -> Self {
        Self {
            event,
            value_type,
            time,
            getter: Arc::new(getter),
            supports_multiple: false,
        }
    }

    /// The getter may yield several values at once.
    pub fn multiple(mut self) -> Self {
        self.supports_multiple = true;
        self
    }

    pub fn event(&self) -> TypeKey {
        self.event
    }

    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }

    pub fn time(&self) -> TimeVariant {
        self.time
    }

    pub fn supports_multiple(&self) -> bool {
        self.supports_multiple
    }
}

impl fmt::Debug for EventGetterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGetterEntry")
            .field("event", &self.event)
            .field("value_type", &self.value_type)
            .field("time", &self.time)
            .field("supports_multiple", &self.supports_multiple)
            .finish()
    }
}

/// Open set of event getters.
pub struct EventValueBuilder {
    hierarchy: Arc<TypeHierarchy>,
    getters: Vec<EventGetterEntry>,
}

impl EventValueBuilder {
    pub fn new(hierarchy: Arc<TypeHierarchy>) -> Self {
        Self {
            hierarchy,
            getters: Vec::new(),
        }
    }

    pub fn register(&mut self, entry: EventGetterEntry) {
        self.getters.push(entry);
    }

    pub fn register_getter(
        &mut self,
        event: TypeKey,
        value_type: TypeKey,
        time: TimeVariant,
        getter: impl Fn(&Value) -> Option<Extracted> + Send + Sync + 'static,
    ) {
        self.register(EventGetterEntry::new(event, value_type, time, getter));
    }

    pub fn hierarchy(&self) -> &Arc<TypeHierarchy> {
        &self.hierarchy
    }

    /// Close registration. Converted lookups use the type registry's
    /// conversion graph.
    pub fn freeze(self, types: &TypeRegistry) -> EventValueRegistry {
        EventValueRegistry {
            hierarchy: self.hierarchy,
            conversions: Arc::clone(types.conversions()),
            getters: self.getters,
            cache: DispatchCache::new(),
        }
    }
}

/// The getter chosen for one `(event class, value type, time)` request.
pub struct ResolvedGetter {
    declared_event: TypeKey,
    value_type: TypeKey,
    time: TimeVariant,
    getter: Arc<GetterFn>,
    supports_multiple: bool,
    conversion: Option<(Arc<ConversionGraph>, TypeKey)>,
}

impl ResolvedGetter {
    fn direct(entry: &EventGetterEntry) -> Self {
        Self {
            declared_event: entry.event,
            value_type: entry.value_type,
            time: entry.time,
            getter: Arc::clone(&entry.getter),
            supports_multiple: entry.supports_multiple,
            conversion: None,
        }
    }

    fn converted(entry: &EventGetterEntry, graph: Arc<ConversionGraph>, to: TypeKey) -> Self {
        Self {
            conversion: Some((graph, to)),
            ..Self::direct(entry)
        }
    }

    /// Extract values from `event`, converting them when this getter was
    /// found through the conversion graph.
    pub fn get(&self, event: &Value) -> Option<Extracted> {
        let extracted = (self.getter)(event)?;
        match &self.conversion {
            None => Some(extracted),
            Some((graph, to)) => extracted.filter_map(|v| graph.convert(&v, *to)),
        }
    }

    pub fn declared_event(&self) -> TypeKey {
        self.declared_event
    }

    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }

    pub fn time(&self) -> TimeVariant {
        self.time
    }

    pub fn supports_multiple(&self) -> bool {
        self.supports_multiple
    }

    pub fn is_converted(&self) -> bool {
        self.conversion.is_some()
    }
}

impl fmt::Debug for ResolvedGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedGetter")
            .field("declared_event", &self.declared_event)
            .field("value_type", &self.value_type)
            .field("time", &self.time)
            .field("converted", &self.is_converted())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ResolveKey {
    event: TypeKey,
    value_type: TypeKey,
    time: TimeVariant,
    exact: bool,
}

#[derive(Debug, Clone)]
enum Resolution {
    Found(Arc<ResolvedGetter>),
    Missing,
    Ambiguous(Vec<TypeKey>),
}

/// Frozen getters plus the per-concrete-class resolution cache.
pub struct EventValueRegistry {
    hierarchy: Arc<TypeHierarchy>,
    conversions: Arc<ConversionGraph>,
    getters: Vec<EventGetterEntry>,
    cache: DispatchCache<ResolveKey, Resolution>,
}

impl EventValueRegistry {
    pub fn hierarchy(&self) -> &Arc<TypeHierarchy> {
        &self.hierarchy
    }

    pub fn getters(&self) -> &[EventGetterEntry] {
        &self.getters
    }

    /// Getter for `value_type` on events of runtime class `event`.
    ///
    /// Getters of subtypes of `value_type`, and getters whose values convert
    /// to it, are considered when no exact getter exists. The outcome,
    /// including "none", is cached per concrete class.
    pub fn resolve(
        &self,
        event: TypeKey,
        value_type: TypeKey,
        time: TimeVariant,
    ) -> Result<Option<Arc<ResolvedGetter>>, ResolveError> {
        self.lookup(event, value_type, time, false)
    }

    /// Like [`resolve`](Self::resolve), restricted to getters declared for
    /// exactly `value_type`.
    pub fn resolve_exact(
        &self,
        event: TypeKey,
        value_type: TypeKey,
        time: TimeVariant,
    ) -> Result<Option<Arc<ResolvedGetter>>, ResolveError> {
        self.lookup(event, value_type, time, true)
    }

    /// Whether `event` offers `value_type` in a before or after state.
    pub fn has_time_states(&self, event: TypeKey, value_type: TypeKey, exact: bool) -> bool {
        [TimeVariant::Before, TimeVariant::After].into_iter().any(|time| {
            !matches!(
                self.resolution(event, value_type, time, exact),
                Resolution::Missing
            )
        })
    }

    /// Whether some subtype of `declared` has a getter, so a runtime event
    /// may still provide the value.
    pub fn has_getter_below(&self, declared: TypeKey, value_type: TypeKey, time: TimeVariant) -> bool {
        self.getters.iter().any(|g| {
            g.time == time
                && self.hierarchy.is_strict_subtype(g.event, declared)
                && self.hierarchy.is_assignable(g.value_type, value_type)
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of getter scans performed; each cache miss is one scan.
    pub fn scans(&self) -> u64 {
        self.cache.scans()
    }

    fn lookup(
        &self,
        event: TypeKey,
        value_type: TypeKey,
        time: TimeVariant,
        exact: bool,
    ) -> Result<Option<Arc<ResolvedGetter>>, ResolveError> {
        match self.resolution(event, value_type, time, exact) {
            Resolution::Found(getter) => Ok(Some(getter)),
            Resolution::Missing => Ok(None),
            Resolution::Ambiguous(candidates) => Err(ResolveError::Ambiguous {
                event: self.hierarchy.name(event).to_string(),
                value: self.hierarchy.name(value_type).to_string(),
                candidates: candidates
                    .into_iter()
                    .map(|k| self.hierarchy.name(k).to_string())
                    .collect(),
            }),
        }
    }

    fn resolution(&self, event: TypeKey, value_type: TypeKey, time: TimeVariant, exact: bool) -> Resolution {
        let key = ResolveKey {
            event,
            value_type,
            time,
            exact,
        };
        self.cache
            .get_or_compute(key, || self.scan(event, value_type, time, exact))
    }

    fn scan(&self, event: TypeKey, value_type: TypeKey, time: TimeVariant, exact: bool) -> Resolution {
        let applicable = |g: &EventGetterEntry| g.time == time && self.hierarchy.is_assignable(event, g.event);

        let same_type: Vec<usize> = self
            .indices(|g| applicable(g) && g.value_type == value_type)
            .collect();
        if let Some(outcome) = self.select(&same_type, |g| Resolution::Found(Arc::new(ResolvedGetter::direct(g)))) {
            return outcome;
        }
        if exact {
            return Resolution::Missing;
        }

        let subtypes: Vec<usize> = self
            .indices(|g| applicable(g) && self.hierarchy.is_strict_subtype(g.value_type, value_type))
            .collect();
        if let Some(outcome) = self.select(&subtypes, |g| Resolution::Found(Arc::new(ResolvedGetter::direct(g)))) {
            return outcome;
        }

        let convertible: Vec<usize> = self
            .indices(|g| applicable(g) && self.conversions.converter_exists(g.value_type, value_type))
            .collect();
        self.select(&convertible, |g| {
            Resolution::Found(Arc::new(ResolvedGetter::converted(
                g,
                Arc::clone(&self.conversions),
                value_type,
            )))
        })
        .unwrap_or(Resolution::Missing)
    }

    fn indices<'a>(
        &'a self,
        filter: impl Fn(&EventGetterEntry) -> bool + 'a,
    ) -> impl Iterator<Item = usize> + 'a {
        self.getters
            .iter()
            .enumerate()
            .filter(move |(_, g)| filter(g))
            .map(|(idx, _)| idx)
    }

    /// Pick among candidates of one stage: the most derived declared event
    /// wins; several unrelated declared events, or several value types on
    /// the winning event, are ambiguous.
    fn select(
        &self,
        candidates: &[usize],
        found: impl Fn(&EventGetterEntry) -> Resolution,
    ) -> Option<Resolution> {
        if candidates.is_empty() {
            return None;
        }

        let most_derived: Vec<&EventGetterEntry> = candidates
            .iter()
            .map(|&idx| &self.getters[idx])
            .filter(|g| {
                !candidates
                    .iter()
                    .any(|&other| self.hierarchy.is_strict_subtype(self.getters[other].event, g.event))
            })
            .collect();

        let mut events: Vec<TypeKey> = Vec::new();
        for g in &most_derived {
            if !events.contains(&g.event) {
                events.push(g.event);
            }
        }
        if events.len() > 1 {
            return Some(Resolution::Ambiguous(events));
        }

        let mut value_types: Vec<TypeKey> = Vec::new();
        for g in &most_derived {
            if !value_types.contains(&g.value_type) {
                value_types.push(g.value_type);
            }
        }
        if value_types.len() > 1 {
            return Some(Resolution::Ambiguous(value_types));
        }

        most_derived.first().map(|&g| found(g))
    }
}

impl fmt::Debug for EventValueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventValueRegistry")
            .field("getters", &self.getters)
            .field("cache", &self.cache.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConverterEdge;
    use crate::core::HierarchyBuilder;
    use crate::registry::RegistryBuilder;

    struct Keys {
        event: TypeKey,
        block_event: TypeKey,
        place_event: TypeKey,
        chat_event: TypeKey,
        block: TypeKey,
        location: TypeKey,
        text: TypeKey,
    }

    fn setup() -> (Arc<TypeHierarchy>, TypeRegistry, Keys) {
        let mut b = HierarchyBuilder::new();
        let object = b.declare("Object", &[]).unwrap();
        let event = b.declare("Event", &[object]).unwrap();
        let block_event = b.declare("BlockEvent", &[event]).unwrap();
        let place_event = b.declare("PlaceEvent", &[block_event]).unwrap();
        let chat_event = b.declare("ChatEvent", &[event]).unwrap();
        let block = b.declare("Block", &[object]).unwrap();
        let location = b.declare("Location", &[object]).unwrap();
        let text = b.declare("Text", &[object]).unwrap();
        let h = Arc::new(b.build());

        let mut types = RegistryBuilder::new(Arc::clone(&h));
        types.register_converter(ConverterEdge::new(block, location, move |v| {
            Some(Value::new(location, format!("at {}", v.downcast_ref::<String>()?)))
        }));
        let types = types.freeze().unwrap();

        (
            h,
            types,
            Keys {
                event,
                block_event,
                place_event,
                chat_event,
                block,
                location,
                text,
            },
        )
    }

    fn constant(ty: TypeKey, text: &'static str) -> impl Fn(&Value) -> Option<Extracted> {
        move |_| Some(Extracted::One(Value::new(ty, text.to_string())))
    }

    #[test]
    fn test_most_derived_declared_event_wins() {
        let (h, types, k) = setup();
        let mut builder = EventValueBuilder::new(h);
        builder.register_getter(k.block_event, k.block, TimeVariant::Default, constant(k.block, "generic"));
        builder.register_getter(k.place_event, k.block, TimeVariant::Default, constant(k.block, "placed"));
        let events = builder.freeze(&types);

        let getter = events
            .resolve(k.place_event, k.block, TimeVariant::Default)
            .unwrap()
            .unwrap();
        assert_eq!(getter.declared_event(), k.place_event);

        let generic = events
            .resolve(k.block_event, k.block, TimeVariant::Default)
            .unwrap()
            .unwrap();
        assert_eq!(generic.declared_event(), k.block_event);
    }

    #[test]
    fn test_negative_result_cached() {
        let (h, types, k) = setup();
        let mut builder = EventValueBuilder::new(h);
        builder.register_getter(k.block_event, k.block, TimeVariant::Default, constant(k.block, "b"));
        let events = builder.freeze(&types);

        assert!(events.resolve(k.chat_event, k.block, TimeVariant::Default).unwrap().is_none());
        assert!(events.resolve(k.chat_event, k.block, TimeVariant::Default).unwrap().is_none());
        assert_eq!(events.scans(), 1);
        assert_eq!(events.stats().hits, 1);
    }

    #[test]
    fn test_conversion_stage() {
        let (h, types, k) = setup();
        let mut builder = EventValueBuilder::new(h);
        builder.register_getter(k.block_event, k.block, TimeVariant::Default, constant(k.block, "stone"));
        let events = builder.freeze(&types);

        let getter = events
            .resolve(k.place_event, k.location, TimeVariant::Default)
            .unwrap()
            .unwrap();
        assert!(getter.is_converted());
        let place = Value::new(k.place_event, ());
        let Some(Extracted::One(loc)) = getter.get(&place) else {
            panic!("expected one location");
        };
        assert_eq!(loc.ty(), k.location);
        assert_eq!(loc.downcast_ref::<String>().unwrap(), "at stone");

        assert!(events
            .resolve_exact(k.place_event, k.location, TimeVariant::Default)
            .unwrap()
            .is_none());
        assert!(events
            .resolve(k.place_event, k.text, TimeVariant::Default)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unrelated_declared_events_are_ambiguous() {
        let mut b = HierarchyBuilder::new();
        let event = b.declare("Event", &[]).unwrap();
        let cancellable = b.declare("Cancellable", &[]).unwrap();
        let block_event = b.declare("BlockEvent", &[event]).unwrap();
        let break_event = b.declare("BreakEvent", &[block_event, cancellable]).unwrap();
        let block = b.declare("Block", &[]).unwrap();
        let h = Arc::new(b.build());
        let types = RegistryBuilder::new(Arc::clone(&h)).freeze().unwrap();

        let mut builder = EventValueBuilder::new(h);
        builder.register_getter(block_event, block, TimeVariant::Default, constant(block, "a"));
        builder.register_getter(cancellable, block, TimeVariant::Default, constant(block, "b"));
        let events = builder.freeze(&types);

        let err = events
            .resolve(break_event, block, TimeVariant::Default)
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Ambiguous {
                event: "BreakEvent".to_string(),
                value: "Block".to_string(),
                candidates: vec!["BlockEvent".to_string(), "Cancellable".to_string()],
            }
        );
    }

    #[test]
    fn test_time_states() {
        let (h, types, k) = setup();
        let mut builder = EventValueBuilder::new(h);
        builder.register_getter(k.block_event, k.block, TimeVariant::Default, constant(k.block, "now"));
        builder.register_getter(k.place_event, k.block, TimeVariant::Before, constant(k.block, "air"));
        let events = builder.freeze(&types);

        assert!(events.has_time_states(k.place_event, k.block, true));
        assert!(!events.has_time_states(k.block_event, k.block, true));
        assert!(events.has_getter_below(k.block_event, k.block, TimeVariant::Before));
        assert!(!events.has_getter_below(k.event, k.location, TimeVariant::Before));
        assert_eq!(TimeVariant::from_offset(-1), Some(TimeVariant::Before));
        assert_eq!(TimeVariant::After.offset(), 1);
    }
}
