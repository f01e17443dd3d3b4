//! Component descriptions, as delivered by the server.

use cgmath::Vector2;
use perch_core::{ContextData, Template};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// A server-described action. Its interpretation belongs to the [`ActionHandler`](crate::ActionHandler).
pub type Action = Value;

/// A node of a component tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// The context this component declares for itself and its subtree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextData>,

    /// Bound properties, by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Template>,

    /// Set if this component is a list; lists have no static children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListModel>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Component>,
}

impl Component {
    pub fn new() -> Component {
        Component::default()
    }

    pub fn list(model: ListModel) -> Component {
        Component {
            list: Some(model),
            ..Component::default()
        }
    }

    pub fn with_context(mut self, context: ContextData) -> Component {
        self.context = Some(context);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, template: Template) -> Component {
        self.properties.insert(name.into(), template);
        self
    }

    pub fn with_child(mut self, child: Component) -> Component {
        self.children.push(child);
        self
    }

    pub fn from_json(json: &str) -> Result<Component, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Scroll axis of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Vertical,
    Horizontal,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Vertical
    }
}

impl Direction {
    /// The component of a vector along this axis.
    pub fn along(self, vector: Vector2<f64>) -> f64 {
        match self {
            Direction::Vertical => vector.y,
            Direction::Horizontal => vector.x,
        }
    }
}

/// Identifies a list template. Every cell cloned from the same template shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId(Uuid);

impl Default for TemplateId {
    fn default() -> Self {
        TemplateId(Uuid::new_v4())
    }
}

/// A virtualized list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModel {
    /// Evaluates to the array of items.
    pub data_source: Template,

    #[serde(default)]
    pub direction: Direction,

    /// The component every cell is cloned from.
    pub template: Arc<Component>,

    /// Context id under which each cell sees its item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterator_name: Option<String>,

    /// Run once the list is attached, and again for every outer item a nested list is first
    /// shown for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_init: Vec<Action>,

    /// Run once per data source when scrolling reaches the threshold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_scroll_end: Vec<Action>,

    /// Scrolled percentage at which `on_scroll_end` runs. Without one, it runs at 100%.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_threshold: Option<f64>,

    /// Host hint: the list scrolls with its enclosing scroll view instead of on its own. Not
    /// interpreted here; the renderer reads it through [`ListView::uses_parent_scroll`].
    ///
    /// [`ListView::uses_parent_scroll`]: crate::list::ListView::uses_parent_scroll
    #[serde(default)]
    pub use_parent_scroll: bool,

    #[serde(skip)]
    pub template_id: TemplateId,
}

impl ListModel {
    pub fn new(data_source: Template, template: Component) -> ListModel {
        ListModel {
            data_source,
            direction: Direction::default(),
            template: Arc::new(template),
            iterator_name: None,
            on_init: Vec::new(),
            on_scroll_end: Vec::new(),
            scroll_threshold: None,
            use_parent_scroll: false,
            template_id: TemplateId::default(),
        }
    }

    pub fn with_iterator_name(mut self, name: impl Into<String>) -> ListModel {
        self.iterator_name = Some(name.into());
        self
    }

    pub fn with_on_init(mut self, actions: Vec<Action>) -> ListModel {
        self.on_init = actions;
        self
    }

    pub fn with_on_scroll_end(mut self, actions: Vec<Action>, threshold: Option<f64>) -> ListModel {
        self.on_scroll_end = actions;
        self.scroll_threshold = threshold;
        self
    }
}
