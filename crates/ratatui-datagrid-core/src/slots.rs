use std::fmt;
use std::rc::Rc;

pub type SlotFn<P, R> = Rc<dyn Fn(&P) -> R>;
pub type PropsOverride<P> = Rc<dyn Fn(&mut P)>;

/// A named, overridable rendering extension point.
///
/// The grid only ever calls [`Slot::render`]; which function runs is decided by whether an
/// override is installed. The props override patches the props before either function sees them.
pub struct Slot<P, R> {
    name: &'static str,
    default: SlotFn<P, R>,
    component: Option<SlotFn<P, R>>,
    props: Option<PropsOverride<P>>,
}

impl<P, R> Clone for Slot<P, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            default: self.default.clone(),
            component: self.component.clone(),
            props: self.props.clone(),
        }
    }
}

impl<P, R> fmt::Debug for Slot<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("overridden", &self.component.is_some())
            .field("props_override", &self.props.is_some())
            .finish()
    }
}

impl<P: Clone, R> Slot<P, R> {
    pub fn new(name: &'static str, default: impl Fn(&P) -> R + 'static) -> Self {
        Self {
            name,
            default: Rc::new(default),
            component: None,
            props: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn with_component(mut self, f: impl Fn(&P) -> R + 'static) -> Self {
        self.component = Some(Rc::new(f));
        self
    }

    pub fn with_props(mut self, f: impl Fn(&mut P) + 'static) -> Self {
        self.props = Some(Rc::new(f));
        self
    }

    pub fn set_component(&mut self, f: Option<SlotFn<P, R>>) {
        self.component = f;
    }

    pub fn is_overridden(&self) -> bool {
        self.component.is_some()
    }

    pub fn render(&self, props: &P) -> R {
        let patched;
        let props = match &self.props {
            Some(patch) => {
                let mut p = props.clone();
                patch(&mut p);
                patched = p;
                &patched
            }
            None => props,
        };
        match &self.component {
            Some(f) => f(props),
            None => (self.default)(props),
        }
    }

    /// Renders with the default, ignoring any installed component.
    pub fn render_default(&self, props: &P) -> R {
        (self.default)(props)
    }
}
