//! Data binding engine for server-driven UI.
//!
//! # Conceptual overview
//! Perch renders screens that are described by a server as trees of components. Components do not
//! carry fixed property values; instead, their properties are *templates* that refer to named
//! values further up the tree. This crate holds the machinery that keeps those properties up to
//! date.
//!
//! ## Nodes and the view tree
//! Every rendered component gets a [`NodeId`] from a [`ViewTree`]. The tree only knows about
//! structure (which node is a subview of which); everything else is keyed by node id. Ids are
//! generational, so an id that outlives its node never aliases a newer node.
//!
//! ## Contexts
//! A context is a named JSON value attached to a node. A node may own at most one context. When a
//! template refers to a context by id, the nearest node on the path from the referring node up to
//! the root that owns a context with that id wins, so inner contexts shadow outer ones.
//!
//! There is also the global context, with the reserved id `global`, which does not belong to any
//! node. It is a [`GlobalContext`] service shared by every screen that is handed the same instance.
//!
//! ## Templates
//! Templates are strings with embedded expressions, e.g. `Hello @{user.name}!`. A template that is
//! exactly one expression evaluates to the raw JSON value of that expression; anything else is
//! assembled into a string. Expressions are either a context id followed by a path (`user.name`,
//! `item.tags[0]`) or a literal (`true`, `42`, `'text'`).
//!
//! ## Bindings
//! A binding is a template together with an observer. Bindings are added in two phases: first
//! [`ContextManager::add_binding`] queues them on their node, and then
//! [`ContextManager::resolve_bindings`] attaches them to the contexts they reference and delivers
//! the first value. Splitting these lets a whole subtree be built before anything is evaluated, so
//! a binding can refer to a context whose owner is created after the binding itself.
//!
//! After that, every change made through [`ContextManager::update_context`] re-evaluates exactly
//! the bindings that depend on the changed context, and notifies their observers.
//!
//! ## Cascades
//! Observers often react to a value by changing another context. They cannot borrow the manager
//! while it is notifying them, so they queue the change through a [`ContextUpdater`] instead. The
//! manager applies queued changes before `update_context` returns, up to a configurable limit that
//! stops cyclic updates.

mod binding;
mod config;
mod context;
mod error;
mod expression;
mod global;
mod manager;
mod node;
mod path;
mod view_tree;

pub use binding::{Binding, BindingHandle, BindingState, Observer};
pub use config::Config;
pub use context::{ContextBinding, ContextData, SharedContext, GLOBAL_CONTEXT_ID};
pub use error::{ContextUpdateError, PathError, TemplateError};
pub use expression::{stringify, Expression, ExpressionKind, Template};
pub use global::{GlobalContext, SubscriptionId, DEFAULT_MAX_DEPTH};
pub use manager::{ContextManager, ContextUpdater, SetContext};
pub use node::{NodeArena, NodeId};
pub use path::{kind_of, Path, Segment};
pub use view_tree::{find_outermost, Ancestors, Hierarchy, ViewTree};
