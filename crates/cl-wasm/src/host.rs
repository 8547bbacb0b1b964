//! Host traits over live JS objects and DOM elements.
//!
//! The plugin shell hands over one `bridge` object:
//!
//! ```js
//! {
//!   views(),           // open canvas views
//!   activeView(),      // most recently focused canvas view, or null
//!   observe(el),       // MutationObserver on `style` under `el` -> lock.on_style_mutations
//!   disconnect(),
//!   listen(el),        // capture-phase pointer/key listeners on `el`, window blur
//!   unlisten(),
//!   requestFrame(),    // requestAnimationFrame -> lock.on_frame
//!   cancelFrame(),
//! }
//! ```
//!
//! Everything else is read structurally off the view objects.

use cl_core::host::{Dom, ObjectModel, Selector, Session, Workspace};
use cl_core::InlineStyle;
use js_sys::{Array, Function, Map, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlElement, Node};

pub struct JsHost {
    bridge: JsValue,
}

impl JsHost {
    pub fn new(bridge: JsValue) -> Self {
        Self { bridge }
    }

    /// Call `target[name](...args)`. `None` when there is no such method.
    fn call(target: &JsValue, name: &str, args: &[&JsValue]) -> Option<Result<JsValue, JsValue>> {
        let f = get(target, name)?.dyn_into::<Function>().ok()?;
        let result = match args {
            [] => f.call0(target),
            [a] => f.call1(target, a),
            _ => {
                let list: Array = args.iter().copied().collect();
                f.apply(target, &list)
            }
        };
        Some(result)
    }

    fn hook(&self, name: &str, args: &[&JsValue]) {
        match Self::call(&self.bridge, name, args) {
            None => log::warn!("bridge.{name} is missing"),
            Some(Err(e)) => log::warn!("bridge.{name}() threw: {e:?}"),
            Some(Ok(_)) => {}
        }
    }
}

/// `obj[key]`, skipping `null` and `undefined`.
fn get(obj: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_null() && !v.is_undefined())
}

/// Split a trailing `!important` off a declared value.
pub(crate) fn split_priority(value: &str) -> (&str, &str) {
    let value = value.trim();
    match value.strip_suffix("!important") {
        Some(rest) => (rest.trim_end(), "important"),
        None => (value, ""),
    }
}

impl Dom for JsHost {
    type Element = Element;

    fn parent(&self, el: &Element) -> Option<Element> {
        el.parent_element()
    }

    fn has_class(&self, el: &Element, class: &str) -> bool {
        el.class_list().contains(class)
    }

    fn set_class(&mut self, el: &Element, class: &str, on: bool) {
        let _ = el.class_list().toggle_with_force(class, on);
    }

    fn attribute(&self, el: &Element, name: &str) -> Option<String> {
        el.get_attribute(name)
    }

    fn inline_style(&self, el: &Element) -> String {
        el.get_attribute("style").unwrap_or_default()
    }

    fn set_style_property(&mut self, el: &Element, name: &str, value: Option<&str>) {
        if let Some(html) = el.dyn_ref::<HtmlElement>() {
            let style = html.style();
            let result = match value {
                Some(value) => {
                    let (value, priority) = split_priority(value);
                    style.set_property_with_priority(name, value, priority)
                }
                None => style.remove_property(name).map(|_| ()),
            };
            if let Err(e) = result {
                log::trace!("style.{name} rejected: {e:?}");
            }
            return;
        }
        // SVG and other non-HTML elements: rewrite the attribute.
        let mut style = InlineStyle::parse(&self.inline_style(el));
        style.set(name, value);
        let _ = el.set_attribute("style", &style.to_css_text());
    }

    fn find(&self, root: &Element, selector: Selector<'_>) -> Option<Element> {
        root.query_selector(&selector.to_css()).ok().flatten()
    }

    fn find_all(&self, root: &Element, selector: Selector<'_>) -> Vec<Element> {
        let Ok(list) = root.query_selector_all(&selector.to_css()) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn contains(&self, ancestor: &Element, el: &Element) -> bool {
        let node: &Node = el;
        ancestor.contains(Some(node))
    }

    fn closest_with_class(&self, el: &Element, class: &str) -> Option<Element> {
        el.closest(&Selector::Class(class).to_css()).ok().flatten()
    }
}

impl ObjectModel for JsHost {
    type Object = JsValue;

    fn field(&self, obj: &JsValue, name: &str) -> Option<JsValue> {
        get(obj, name).filter(JsValue::is_object)
    }

    fn number(&self, obj: &JsValue, name: &str) -> Option<f64> {
        get(obj, name)?.as_f64().filter(|v| v.is_finite())
    }

    fn set_number(&mut self, obj: &JsValue, name: &str, value: f64) -> bool {
        if self.number(obj, name).is_none() {
            return false;
        }
        Reflect::set(obj, &JsValue::from_str(name), &JsValue::from_f64(value)).unwrap_or(false)
    }

    fn string(&self, obj: &JsValue, name: &str) -> Option<String> {
        get(obj, name)?.as_string()
    }

    fn as_string(&self, obj: &JsValue) -> Option<String> {
        obj.as_string()
    }

    fn element_field(&self, obj: &JsValue, name: &str) -> Option<Element> {
        get(obj, name)?.dyn_into::<Element>().ok()
    }

    fn lookup(&self, collection: &JsValue, key: &str) -> Option<JsValue> {
        if let Some(map) = collection.dyn_ref::<Map>() {
            let v = map.get(&JsValue::from_str(key));
            return (!v.is_undefined() && !v.is_null()).then_some(v);
        }
        self.field(collection, key)
    }

    fn members(&self, collection: &JsValue) -> Option<Vec<JsValue>> {
        if let Some(array) = collection.dyn_ref::<Array>() {
            return Some(array.to_vec());
        }
        if let Some(map) = collection.dyn_ref::<Map>() {
            return Some(map.values().into_iter().filter_map(Result::ok).collect());
        }
        let iter = js_sys::try_iter(collection).ok()??;
        Some(iter.filter_map(Result::ok).collect())
    }

    fn invoke(&mut self, obj: &JsValue, method: &str) -> Option<Result<(), String>> {
        Self::call(obj, method, &[]).map(|r| r.map(|_| ()).map_err(|e| format!("{e:?}")))
    }
}

impl Workspace for JsHost {
    type View = JsValue;

    fn canvas_views(&self) -> Vec<JsValue> {
        match Self::call(&self.bridge, "views", &[]) {
            Some(Ok(views)) => self.members(&views).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn most_recent_view(&self) -> Option<JsValue> {
        Self::call(&self.bridge, "activeView", &[])?
            .ok()
            .filter(|v| v.is_object())
    }

    fn view_path(&self, view: &JsValue) -> Option<String> {
        self.field(view, "file")
            .and_then(|file| self.string(&file, "path"))
            .or_else(|| self.string(view, "path"))
    }

    fn view_container(&self, view: &JsValue) -> Option<Element> {
        self.view_canvas(view)
            .and_then(|canvas| self.element_field(&canvas, "wrapperEl"))
            .or_else(|| self.element_field(view, "containerEl"))
    }

    fn view_canvas(&self, view: &JsValue) -> Option<JsValue> {
        self.field(view, "canvas")
    }
}

impl Session for JsHost {
    fn attach_observer(&mut self, container: &Element) {
        let el: &JsValue = container;
        self.hook("observe", &[el]);
    }

    fn detach_observer(&mut self) {
        self.hook("disconnect", &[]);
    }

    fn attach_input_guard(&mut self, container: &Element) {
        let el: &JsValue = container;
        self.hook("listen", &[el]);
    }

    fn detach_input_guard(&mut self) {
        self.hook("unlisten", &[]);
    }

    fn request_frame(&mut self) {
        self.hook("requestFrame", &[]);
    }

    fn cancel_frame(&mut self) {
        self.hook("cancelFrame", &[]);
    }
}
