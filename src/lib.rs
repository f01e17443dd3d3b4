//! Server-driven screens.
//!
//! A [`Screen`] takes a [`Component`] tree as described by a server, builds a view tree for it,
//! and keeps a [`Renderer`] informed of every bound property value. Lists are virtualized: see
//! [`list`]. Actions are not interpreted here but handed to an [`ActionHandler`].

mod action;
mod component;
pub mod events;
pub mod list;
mod rect;
mod renderer;
mod screen;

pub use action::{ActionHandler, RootContext};
pub use component::{Action, Component, Direction, ListModel, TemplateId};
pub use rect::Rect;
pub use renderer::{ListChange, Renderer};
pub use screen::Screen;

pub use perch_core::{
    Config, ContextData, ContextUpdateError, GlobalContext, NodeId, SetContext, Template,
};
